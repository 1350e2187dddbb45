//! Ledger data model shared by the sync feed, the reducers, and the read path.
//!
//! Blocks arrive from the upstream feed already decoded into these types.
//! Raw bytes persisted in the indexes (`output_by_address.raw`,
//! `transaction_by_address.raw`) are the bincode standard-config encoding of
//! `TransactionOutput` and `Transaction`; decoding them back is fallible and
//! callers decide the degrade policy.

pub mod address;
pub mod certificate;
pub mod value;

pub use address::{AddressParts, Network};
pub use certificate::{Certificate, CertificateKind, StakeCredential, Voter};
pub use value::Value;

use bincode::error::DecodeError;

pub const BINCODE_CONFIG: bincode::config::Configuration = bincode::config::standard();

#[derive(bincode::Encode, bincode::Decode, Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub hash: String,
    pub height: u64,
    pub slot: u64,
}

#[derive(bincode::Encode, bincode::Decode, Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

/// Reference to a prior transaction output.
#[derive(bincode::Encode, bincode::Decode, Clone, Debug, PartialEq, Eq)]
pub struct TransactionInput {
    pub transaction_id: String,
    pub index: u64,
}

impl TransactionInput {
    pub fn out_ref(&self) -> String {
        out_ref(&self.transaction_id, self.index)
    }
}

#[derive(bincode::Encode, bincode::Decode, Clone, Debug, PartialEq, Eq)]
pub struct TransactionOutput {
    /// Raw address bytes; decoded on demand via the address codec.
    pub address: Vec<u8>,
    pub value: Value,
}

impl TransactionOutput {
    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::encode_to_vec(self, BINCODE_CONFIG).expect("output encoding is infallible")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        bincode::decode_from_slice(bytes, BINCODE_CONFIG).map(|(output, _)| output)
    }
}

#[derive(bincode::Encode, bincode::Decode, Clone, Debug, PartialEq, Eq)]
pub struct Withdrawal {
    /// Raw reward-account bytes.
    pub account: Vec<u8>,
    pub amount: u64,
}

#[derive(bincode::Encode, bincode::Decode, Clone, Debug, PartialEq, Eq)]
pub struct VotingProcedure {
    pub voter: Voter,
    /// Hash of the governance action being voted on.
    pub gov_action_tx_hash: String,
}

#[derive(bincode::Encode, bincode::Decode, Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub hash: String,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub certificates: Vec<Certificate>,
    pub withdrawals: Vec<Withdrawal>,
    pub votes: Vec<VotingProcedure>,
}

impl Transaction {
    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::encode_to_vec(self, BINCODE_CONFIG).expect("transaction encoding is infallible")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        bincode::decode_from_slice(bytes, BINCODE_CONFIG).map(|(tx, _)| tx)
    }

    /// Out-ref of this transaction's output at `index`.
    pub fn output_ref(&self, index: u64) -> String {
        out_ref(&self.hash, index)
    }
}

/// Canonical out-ref key: `"{tx_hash}#{index}"`.
pub fn out_ref(tx_hash: &str, index: u64) -> String {
    format!("{}#{}", tx_hash, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_ref_format() {
        assert_eq!(out_ref("abcd", 3), "abcd#3");
        let input = TransactionInput {
            transaction_id: "abcd".into(),
            index: 0,
        };
        assert_eq!(input.out_ref(), "abcd#0");
    }

    #[test]
    fn transaction_bytes_roundtrip() {
        let tx = Transaction {
            hash: "ff".repeat(32),
            inputs: vec![TransactionInput {
                transaction_id: "aa".repeat(32),
                index: 1,
            }],
            outputs: vec![TransactionOutput {
                address: vec![0x61; 29],
                value: Value::coin(1_000_000).with_asset([7; 28], b"asset", 3),
            }],
            certificates: vec![Certificate::StakeRegistration {
                credential: certificate::StakeCredential::KeyHash([2; 28]),
            }],
            withdrawals: vec![Withdrawal {
                account: vec![0xe1; 29],
                amount: 55,
            }],
            votes: vec![VotingProcedure {
                voter: Voter::DRepKey([4; 28]),
                gov_action_tx_hash: "bb".repeat(32),
            }],
        };

        let decoded = Transaction::from_bytes(&tx.to_bytes()).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn corrupt_bytes_fail_to_decode() {
        assert!(Transaction::from_bytes(&[0xff, 0x00, 0x13]).is_err());
        assert!(TransactionOutput::from_bytes(&[0x01]).is_err());
    }
}
