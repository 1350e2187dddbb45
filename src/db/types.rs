/// A value that can be stored in the database.
#[derive(Debug, Clone)]
pub enum DbValue {
    /// NULL value
    Null,
    /// Text (unlimited length)
    Text(String),
    /// Raw bytes (stored as BYTEA)
    Bytes(Vec<u8>),
    /// Numeric string for slot values (stored as NUMERIC)
    Numeric(String),
    /// Unix timestamp (stored as TIMESTAMP WITH TIME ZONE)
    Timestamp(i64),
    /// Text array (stored as TEXT[])
    TextArray(Vec<String>),
}

impl DbValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DbValue::Null)
    }

    /// Numeric value from an unsigned slot number.
    pub fn slot(slot: u64) -> Self {
        DbValue::Numeric(slot.to_string())
    }
}

/// Database operation returned by reducers and registry writes.
#[derive(Debug, Clone)]
pub enum DbOperation {
    /// INSERT with ON CONFLICT handling (DO NOTHING when `update_columns` is empty)
    Upsert {
        table: String,
        columns: Vec<String>,
        values: Vec<DbValue>,
        /// Columns that form the unique constraint
        conflict_columns: Vec<String>,
        /// Columns to update on conflict
        update_columns: Vec<String>,
    },
    /// UPDATE with WHERE clause
    Update {
        table: String,
        set_columns: Vec<(String, DbValue)>,
        where_clause: WhereClause,
    },
    /// DELETE with WHERE clause
    Delete {
        table: String,
        where_clause: WhereClause,
    },
}

/// WHERE clause for UPDATE and DELETE operations.
#[derive(Debug, Clone)]
pub enum WhereClause {
    /// column = value
    Eq(String, DbValue),
    /// column >= value
    Gte(String, DbValue),
}
