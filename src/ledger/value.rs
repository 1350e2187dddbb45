//! Output value bag: native coin plus multi-asset bundles.

use std::collections::BTreeMap;

pub type PolicyId = [u8; 28];
pub type AssetName = Vec<u8>;

/// Hex length of a policy id within a subject string.
const POLICY_HEX_LEN: usize = 56;

#[derive(bincode::Encode, bincode::Decode, Clone, Debug, Default, PartialEq, Eq)]
pub struct Value {
    pub coin: u64,
    pub assets: BTreeMap<PolicyId, BTreeMap<AssetName, u64>>,
}

impl Value {
    pub fn coin(coin: u64) -> Self {
        Self {
            coin,
            assets: BTreeMap::new(),
        }
    }

    pub fn with_asset(mut self, policy: PolicyId, name: &[u8], quantity: u64) -> Self {
        self.assets
            .entry(policy)
            .or_default()
            .insert(name.to_vec(), quantity);
        self
    }

    /// Subject identifiers (hex policy id ++ hex asset name) carried by this
    /// value, in deterministic order.
    pub fn subjects(&self) -> Vec<String> {
        self.assets
            .iter()
            .flat_map(|(policy, bundle)| {
                let policy_hex = hex::encode(policy);
                bundle
                    .keys()
                    .map(move |name| format!("{}{}", policy_hex, hex::encode(name)))
            })
            .collect()
    }

    /// Quantity of a given subject, if present.
    pub fn quantity_of(&self, subject: &str) -> Option<u64> {
        if subject.len() < POLICY_HEX_LEN {
            return None;
        }
        let policy: PolicyId = hex::decode(&subject[..POLICY_HEX_LEN])
            .ok()?
            .try_into()
            .ok()?;
        let name = hex::decode(&subject[POLICY_HEX_LEN..]).ok()?;
        self.assets.get(&policy)?.get(&name).copied()
    }
}
