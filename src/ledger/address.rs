//! Address codec boundary.
//!
//! Raw addresses are a header byte (type nibble + network nibble) followed by
//! a 28-byte payment key hash and, for base addresses, a 28-byte stake key
//! hash. Anything that is not a key-based payment address (script, pointer,
//! malformed) is classified as undecodable and reported as `None`, never as
//! an error.

use bech32::{Bech32, Hrp};

pub const KEY_HASH_LEN: usize = 28;

const BASE_ADDRESS: u8 = 0x0;
const ENTERPRISE_ADDRESS: u8 = 0x6;
const REWARD_ACCOUNT: u8 = 0xe;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Preprod,
    Testnet,
}

impl Network {
    /// Resolve the network from its protocol magic.
    pub fn from_magic(magic: u64) -> Option<Self> {
        match magic {
            764824073 => Some(Network::Mainnet),
            1 => Some(Network::Preprod),
            2 => Some(Network::Testnet),
            _ => None,
        }
    }

    pub fn address_hrp(&self) -> &'static str {
        match self {
            Network::Mainnet => "addr",
            _ => "addr_test",
        }
    }

    pub fn reward_hrp(&self) -> &'static str {
        match self {
            Network::Mainnet => "stake",
            _ => "stake_test",
        }
    }

    fn header_bit(&self) -> u8 {
        match self {
            Network::Mainnet => 1,
            _ => 0,
        }
    }
}

/// Key hashes of a decoded payment address, hex-encoded.
///
/// `stake_hash` is the empty string for enterprise addresses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressParts {
    pub network: Network,
    pub payment_hash: String,
    pub stake_hash: String,
}

/// Decode raw payment-address bytes into their key-hash parts.
pub fn decode_raw(bytes: &[u8]) -> Option<AddressParts> {
    let header = *bytes.first()?;
    let network = match header & 0x0f {
        1 => Network::Mainnet,
        0 => Network::Testnet,
        _ => return None,
    };

    match header >> 4 {
        BASE_ADDRESS if bytes.len() == 1 + 2 * KEY_HASH_LEN => Some(AddressParts {
            network,
            payment_hash: hex::encode(&bytes[1..1 + KEY_HASH_LEN]),
            stake_hash: hex::encode(&bytes[1 + KEY_HASH_LEN..]),
        }),
        ENTERPRISE_ADDRESS if bytes.len() == 1 + KEY_HASH_LEN => Some(AddressParts {
            network,
            payment_hash: hex::encode(&bytes[1..]),
            stake_hash: String::new(),
        }),
        _ => None,
    }
}

/// Decode a bech32 payment address (`addr…` / `addr_test…`).
pub fn decode_bech32(text: &str) -> Option<AddressParts> {
    let (hrp, bytes) = bech32::decode(text).ok()?;
    if !hrp.as_str().starts_with("addr") {
        return None;
    }
    decode_raw(&bytes)
}

/// Rebuild the bech32 text form from hex key hashes.
///
/// Returns `None` when a hash is not valid hex of the expected length.
pub fn encode_bech32(payment_hash: &str, stake_hash: &str, network: Network) -> Option<String> {
    let payment = hex::decode(payment_hash).ok()?;
    if payment.len() != KEY_HASH_LEN {
        return None;
    }

    let mut bytes = Vec::with_capacity(1 + 2 * KEY_HASH_LEN);
    if stake_hash.is_empty() {
        bytes.push((ENTERPRISE_ADDRESS << 4) | network.header_bit());
        bytes.extend_from_slice(&payment);
    } else {
        let stake = hex::decode(stake_hash).ok()?;
        if stake.len() != KEY_HASH_LEN {
            return None;
        }
        bytes.push((BASE_ADDRESS << 4) | network.header_bit());
        bytes.extend_from_slice(&payment);
        bytes.extend_from_slice(&stake);
    }

    let hrp = Hrp::parse(network.address_hrp()).ok()?;
    bech32::encode::<Bech32>(hrp, &bytes).ok()
}

/// Decode a key-based reward account into its hex stake key hash.
pub fn decode_reward_account(bytes: &[u8]) -> Option<(Network, String)> {
    let header = *bytes.first()?;
    let network = match header & 0x0f {
        1 => Network::Mainnet,
        0 => Network::Testnet,
        _ => return None,
    };
    if header >> 4 != REWARD_ACCOUNT || bytes.len() != 1 + KEY_HASH_LEN {
        return None;
    }
    Some((network, hex::encode(&bytes[1..])))
}

/// Bech32 text form of a raw reward account (`stake…` / `stake_test…`).
pub fn encode_reward_bech32(bytes: &[u8]) -> Option<String> {
    let (network, _) = decode_reward_account(bytes)?;
    let hrp = Hrp::parse(network.reward_hrp()).ok()?;
    bech32::encode::<Bech32>(hrp, bytes).ok()
}

/// Raw base-address bytes for test fixtures and the feed boundary.
pub fn base_address_bytes(payment: &[u8; KEY_HASH_LEN], stake: &[u8; KEY_HASH_LEN], network: Network) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(1 + 2 * KEY_HASH_LEN);
    bytes.push((BASE_ADDRESS << 4) | network.header_bit());
    bytes.extend_from_slice(payment);
    bytes.extend_from_slice(stake);
    bytes
}

/// Raw enterprise-address bytes (payment key only).
pub fn enterprise_address_bytes(payment: &[u8; KEY_HASH_LEN], network: Network) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(1 + KEY_HASH_LEN);
    bytes.push((ENTERPRISE_ADDRESS << 4) | network.header_bit());
    bytes.extend_from_slice(payment);
    bytes
}

/// Raw key-based reward-account bytes.
pub fn reward_account_bytes(stake: &[u8; KEY_HASH_LEN], network: Network) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(1 + KEY_HASH_LEN);
    bytes.push((REWARD_ACCOUNT << 4) | network.header_bit());
    bytes.extend_from_slice(stake);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment() -> [u8; KEY_HASH_LEN] {
        [0x11; KEY_HASH_LEN]
    }

    fn stake() -> [u8; KEY_HASH_LEN] {
        [0x22; KEY_HASH_LEN]
    }

    #[test]
    fn base_address_roundtrip() {
        let raw = base_address_bytes(&payment(), &stake(), Network::Mainnet);
        let parts = decode_raw(&raw).unwrap();
        assert_eq!(parts.network, Network::Mainnet);
        assert_eq!(parts.payment_hash, hex::encode(payment()));
        assert_eq!(parts.stake_hash, hex::encode(stake()));

        let text = encode_bech32(&parts.payment_hash, &parts.stake_hash, Network::Mainnet).unwrap();
        assert!(text.starts_with("addr1"));
        assert_eq!(decode_bech32(&text).unwrap(), parts);
    }

    #[test]
    fn enterprise_address_has_empty_stake_hash() {
        let raw = enterprise_address_bytes(&payment(), Network::Testnet);
        let parts = decode_raw(&raw).unwrap();
        assert_eq!(parts.stake_hash, "");

        let text = encode_bech32(&parts.payment_hash, "", Network::Testnet).unwrap();
        assert!(text.starts_with("addr_test1"));
        assert_eq!(decode_bech32(&text).unwrap().payment_hash, parts.payment_hash);
    }

    #[test]
    fn non_standard_addresses_are_undecodable() {
        // Script-based base address (type nibble 0x1)
        let mut script = base_address_bytes(&payment(), &stake(), Network::Mainnet);
        script[0] = 0x11;
        assert_eq!(decode_raw(&script), None);

        assert_eq!(decode_raw(&[]), None);
        assert_eq!(decode_raw(&[0x01, 0xab]), None);
        assert_eq!(decode_bech32("not-bech32-at-all"), None);
    }

    #[test]
    fn reward_account_roundtrip() {
        let raw = reward_account_bytes(&stake(), Network::Mainnet);
        let (network, hash) = decode_reward_account(&raw).unwrap();
        assert_eq!(network, Network::Mainnet);
        assert_eq!(hash, hex::encode(stake()));
        assert!(encode_reward_bech32(&raw).unwrap().starts_with("stake1"));

        // Payment addresses are not reward accounts
        let base = base_address_bytes(&payment(), &stake(), Network::Mainnet);
        assert_eq!(decode_reward_account(&base), None);
    }
}
