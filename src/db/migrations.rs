//! Schema migrations.
//!
//! The index schema ships as plain `.sql` files applied in file-name order.
//! Applied names are recorded in `_migrations`, so reapplying on every start
//! is a no-op; each pending file runs in its own transaction together with
//! the row that records it.

use std::collections::HashSet;
use std::path::Path;

use deadpool_postgres::Pool;

use super::error::DbError;

pub async fn apply(pool: &Pool, dir: &Path) -> Result<(), DbError> {
    let client = pool.get().await?;
    client
        .execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                id SERIAL PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )",
            &[],
        )
        .await?;

    let applied: HashSet<String> = client
        .query("SELECT name FROM _migrations", &[])
        .await?
        .iter()
        .map(|row| row.get(0))
        .collect();
    drop(client);

    // The index cannot run without its schema; a missing directory is a
    // deployment error, not an empty set.
    if !dir.is_dir() {
        return Err(DbError::MigrationError(format!(
            "migrations directory {} not found",
            dir.display()
        )));
    }

    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".sql"))
        .collect();

    for name in pending(&mut names, &applied) {
        let sql = std::fs::read_to_string(dir.join(name))?;

        let mut client = pool.get().await?;
        let tx = client.transaction().await?;
        tx.batch_execute(&sql)
            .await
            .map_err(|e| DbError::MigrationError(format!("migration {name} failed: {e}")))?;
        tx.execute("INSERT INTO _migrations (name) VALUES ($1)", &[name])
            .await?;
        tx.commit().await?;

        tracing::info!(migration = %name, "schema migration applied");
    }
    Ok(())
}

/// Not-yet-applied migration names, in application order.
fn pending<'a>(names: &'a mut Vec<String>, applied: &HashSet<String>) -> Vec<&'a String> {
    names.sort();
    names
        .iter()
        .filter(|name| !applied.contains(*name))
        .collect()
}
