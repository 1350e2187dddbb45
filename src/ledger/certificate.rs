//! Certificates and voters: closed, finite kind sets matched exhaustively.

use super::address::KEY_HASH_LEN;

pub type KeyHash = [u8; KEY_HASH_LEN];

#[derive(bincode::Encode, bincode::Decode, Clone, Debug, PartialEq, Eq)]
pub enum StakeCredential {
    KeyHash(KeyHash),
    ScriptHash(KeyHash),
}

#[derive(bincode::Encode, bincode::Decode, Clone, Debug, PartialEq, Eq)]
pub enum DRep {
    KeyHash(KeyHash),
    ScriptHash(KeyHash),
    Abstain,
    NoConfidence,
}

#[derive(bincode::Encode, bincode::Decode, Clone, Debug, PartialEq, Eq)]
pub enum Certificate {
    StakeRegistration {
        credential: StakeCredential,
    },
    StakeDeregistration {
        credential: StakeCredential,
    },
    StakeDelegation {
        credential: StakeCredential,
        pool_key_hash: KeyHash,
    },
    PoolRegistration {
        operator: KeyHash,
        pledge: u64,
        cost: u64,
    },
    PoolRetirement {
        pool_key_hash: KeyHash,
        epoch: u64,
    },
    Registration {
        credential: StakeCredential,
        deposit: u64,
    },
    Unregistration {
        credential: StakeCredential,
        deposit: u64,
    },
    VoteDelegation {
        credential: StakeCredential,
        drep: DRep,
    },
    StakeVoteDelegation {
        credential: StakeCredential,
        pool_key_hash: KeyHash,
        drep: DRep,
    },
    StakeRegistrationDelegation {
        credential: StakeCredential,
        pool_key_hash: KeyHash,
        deposit: u64,
    },
    VoteRegistrationDelegation {
        credential: StakeCredential,
        drep: DRep,
        deposit: u64,
    },
    StakeVoteRegistrationDelegation {
        credential: StakeCredential,
        pool_key_hash: KeyHash,
        drep: DRep,
        deposit: u64,
    },
    AuthCommitteeHot {
        cold_credential: StakeCredential,
        hot_credential: StakeCredential,
    },
    ResignCommitteeCold {
        cold_credential: StakeCredential,
    },
    DRepRegistration {
        credential: StakeCredential,
        deposit: u64,
    },
    DRepUnregistration {
        credential: StakeCredential,
        deposit: u64,
    },
    DRepUpdate {
        credential: StakeCredential,
    },
}

/// Stable numeric discriminants, exposed as the `typeId` wire value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum CertificateKind {
    StakeRegistration = 0,
    StakeDeregistration = 1,
    StakeDelegation = 2,
    PoolRegistration = 3,
    PoolRetirement = 4,
    Registration = 5,
    Unregistration = 6,
    VoteDelegation = 7,
    StakeVoteDelegation = 8,
    StakeRegistrationDelegation = 9,
    VoteRegistrationDelegation = 10,
    StakeVoteRegistrationDelegation = 11,
    AuthCommitteeHot = 12,
    ResignCommitteeCold = 13,
    DRepRegistration = 14,
    DRepUnregistration = 15,
    DRepUpdate = 16,
}

impl Certificate {
    pub fn kind(&self) -> CertificateKind {
        match self {
            Certificate::StakeRegistration { .. } => CertificateKind::StakeRegistration,
            Certificate::StakeDeregistration { .. } => CertificateKind::StakeDeregistration,
            Certificate::StakeDelegation { .. } => CertificateKind::StakeDelegation,
            Certificate::PoolRegistration { .. } => CertificateKind::PoolRegistration,
            Certificate::PoolRetirement { .. } => CertificateKind::PoolRetirement,
            Certificate::Registration { .. } => CertificateKind::Registration,
            Certificate::Unregistration { .. } => CertificateKind::Unregistration,
            Certificate::VoteDelegation { .. } => CertificateKind::VoteDelegation,
            Certificate::StakeVoteDelegation { .. } => CertificateKind::StakeVoteDelegation,
            Certificate::StakeRegistrationDelegation { .. } => {
                CertificateKind::StakeRegistrationDelegation
            }
            Certificate::VoteRegistrationDelegation { .. } => {
                CertificateKind::VoteRegistrationDelegation
            }
            Certificate::StakeVoteRegistrationDelegation { .. } => {
                CertificateKind::StakeVoteRegistrationDelegation
            }
            Certificate::AuthCommitteeHot { .. } => CertificateKind::AuthCommitteeHot,
            Certificate::ResignCommitteeCold { .. } => CertificateKind::ResignCommitteeCold,
            Certificate::DRepRegistration { .. } => CertificateKind::DRepRegistration,
            Certificate::DRepUnregistration { .. } => CertificateKind::DRepUnregistration,
            Certificate::DRepUpdate { .. } => CertificateKind::DRepUpdate,
        }
    }

    /// Certificates that represent stake lifecycle events for an address.
    pub fn is_stake_related(&self) -> bool {
        matches!(
            self.kind(),
            CertificateKind::StakeRegistration
                | CertificateKind::StakeDeregistration
                | CertificateKind::StakeDelegation
                | CertificateKind::Registration
                | CertificateKind::Unregistration
                | CertificateKind::StakeVoteDelegation
                | CertificateKind::StakeRegistrationDelegation
                | CertificateKind::StakeVoteRegistrationDelegation
        )
    }

    /// Deposit or refund coin carried by the certificate, where present.
    pub fn deposit(&self) -> Option<u64> {
        match self {
            Certificate::Registration { deposit, .. }
            | Certificate::Unregistration { deposit, .. }
            | Certificate::StakeRegistrationDelegation { deposit, .. }
            | Certificate::VoteRegistrationDelegation { deposit, .. }
            | Certificate::StakeVoteRegistrationDelegation { deposit, .. }
            | Certificate::DRepRegistration { deposit, .. }
            | Certificate::DRepUnregistration { deposit, .. } => Some(*deposit),
            _ => None,
        }
    }

    /// Hex pool id for delegation-like certificates.
    pub fn pool_id(&self) -> Option<String> {
        match self {
            Certificate::StakeDelegation { pool_key_hash, .. }
            | Certificate::StakeVoteDelegation { pool_key_hash, .. }
            | Certificate::StakeRegistrationDelegation { pool_key_hash, .. }
            | Certificate::StakeVoteRegistrationDelegation { pool_key_hash, .. }
            | Certificate::PoolRetirement { pool_key_hash, .. } => {
                Some(hex::encode(pool_key_hash))
            }
            _ => None,
        }
    }
}

/// Governance voter, tagged as on the wire.
#[derive(bincode::Encode, bincode::Decode, Clone, Debug, PartialEq, Eq)]
pub enum Voter {
    ConstitutionalCommitteeKey(KeyHash),
    ConstitutionalCommitteeScript(KeyHash),
    DRepKey(KeyHash),
    DRepScript(KeyHash),
    StakePoolKey(KeyHash),
}

impl Voter {
    pub fn tag(&self) -> i32 {
        match self {
            Voter::ConstitutionalCommitteeKey(_) => 0,
            Voter::ConstitutionalCommitteeScript(_) => 1,
            Voter::DRepKey(_) => 2,
            Voter::DRepScript(_) => 3,
            Voter::StakePoolKey(_) => 4,
        }
    }

    /// Key hash for key-based voters; script-based voters yield `None`.
    pub fn key_hash(&self) -> Option<&KeyHash> {
        match self {
            Voter::ConstitutionalCommitteeKey(hash)
            | Voter::DRepKey(hash)
            | Voter::StakePoolKey(hash) => Some(hash),
            Voter::ConstitutionalCommitteeScript(_) | Voter::DRepScript(_) => None,
        }
    }
}
