//! Transaction activity classification.
//!
//! Turns an indexed transaction into activity groups as seen from one
//! address pair. Staking, withdrawal and voting activity need the stake or
//! payment hash of the viewpoint; transfer activity additionally needs the
//! outputs this transaction consumed (looked up from the output index by
//! spending-transaction hash). Classification is read-side only and pure.

use serde::Serialize;

use crate::ledger::{address, Network, Transaction, TransactionOutput};
use crate::store::OutputRow;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Stake,
    Withdraw,
    Vote,
    Received,
    Sent,
    #[serde(rename = "self")]
    SelfTransfer,
    Other,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDetail {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub amount: u64,
    pub subject: Option<String>,
    pub address: Option<String>,
    pub pool_id: Option<String>,
    pub type_id: Option<i32>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityGroup {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub details: Vec<ActivityDetail>,
}

/// Activity shape for subject-scoped queries: one asset, so no subject or
/// certificate fields.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectActivityDetail {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub amount: u64,
    pub address: Option<String>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectActivityGroup {
    pub details: Vec<SubjectActivityDetail>,
}

/// The address pair a transaction is classified against.
#[derive(Debug, Clone)]
pub struct Viewpoint {
    pub payment: String,
    pub stake: Option<String>,
    pub network: Network,
}

impl Viewpoint {
    /// An output belongs to the viewpoint when both halves match; a missing
    /// stake filter matches only payment-only (enterprise) outputs.
    fn owns(&self, payment: &str, stake: &str) -> bool {
        payment == self.payment && stake == self.stake.as_deref().unwrap_or_default()
    }

    fn bech32(&self, payment: &str, stake: &str) -> Option<String> {
        address::encode_bech32(payment, stake, self.network)
    }
}

fn other_group() -> ActivityGroup {
    ActivityGroup {
        kind: ActivityKind::Other,
        details: vec![ActivityDetail {
            kind: ActivityKind::Other,
            amount: 0,
            subject: None,
            address: None,
            pool_id: None,
            type_id: None,
        }],
    }
}

/// Classify one indexed transaction from the given viewpoint.
///
/// `consumed` is the set of indexed outputs this transaction spent. A raw
/// transaction that fails to decode yields a single `Other` group rather
/// than an error.
pub fn classify_activities(
    raw: &[u8],
    viewpoint: &Viewpoint,
    consumed: &[&OutputRow],
) -> Vec<ActivityGroup> {
    let Ok(tx) = Transaction::from_bytes(raw) else {
        return vec![other_group()];
    };

    let mut groups = Vec::new();
    if let Some(group) = stake_group(&tx, viewpoint) {
        groups.push(group);
    }
    if let Some(group) = withdraw_group(&tx, viewpoint) {
        groups.push(group);
    }
    if let Some(group) = vote_group(&tx, viewpoint) {
        groups.push(group);
    }
    groups.extend(transfer_groups(&tx, viewpoint, consumed));
    groups
}

fn stake_group(tx: &Transaction, viewpoint: &Viewpoint) -> Option<ActivityGroup> {
    viewpoint.stake.as_ref()?;
    let details: Vec<ActivityDetail> = tx
        .certificates
        .iter()
        .filter(|cert| cert.is_stake_related())
        .map(|cert| ActivityDetail {
            kind: ActivityKind::Stake,
            amount: cert.deposit().unwrap_or(0),
            subject: Some(String::new()),
            address: None,
            pool_id: cert.pool_id(),
            type_id: Some(cert.kind() as i32),
        })
        .collect();
    (!details.is_empty()).then_some(ActivityGroup {
        kind: ActivityKind::Stake,
        details,
    })
}

fn withdraw_group(tx: &Transaction, viewpoint: &Viewpoint) -> Option<ActivityGroup> {
    let stake = viewpoint.stake.as_deref()?;
    let details: Vec<ActivityDetail> = tx
        .withdrawals
        .iter()
        .filter_map(|withdrawal| {
            let (_, account_stake) = address::decode_reward_account(&withdrawal.account)?;
            // Only the viewpoint's own reward account counts.
            if account_stake != stake {
                return None;
            }
            Some(ActivityDetail {
                kind: ActivityKind::Withdraw,
                amount: withdrawal.amount,
                subject: Some(String::new()),
                address: address::encode_reward_bech32(&withdrawal.account),
                pool_id: None,
                type_id: None,
            })
        })
        .collect();
    (!details.is_empty()).then_some(ActivityGroup {
        kind: ActivityKind::Withdraw,
        details,
    })
}

fn vote_group(tx: &Transaction, viewpoint: &Viewpoint) -> Option<ActivityGroup> {
    let details: Vec<ActivityDetail> = tx
        .votes
        .iter()
        .filter_map(|vote| {
            // Script voters have no key hash and can never be the viewpoint.
            let hash = vote.voter.key_hash()?;
            if hex::encode(hash) != viewpoint.payment {
                return None;
            }
            Some(ActivityDetail {
                kind: ActivityKind::Vote,
                amount: 0,
                subject: None,
                address: None,
                pool_id: None,
                type_id: Some(vote.voter.tag()),
            })
        })
        .collect();
    (!details.is_empty()).then_some(ActivityGroup {
        kind: ActivityKind::Vote,
        details,
    })
}

/// Transfer groups are mutually exclusive on the receiving side: when the
/// transaction spends the viewpoint's own outputs, everything it pays back
/// to the viewpoint is a self-transfer, not a receipt.
fn transfer_groups(
    tx: &Transaction,
    viewpoint: &Viewpoint,
    consumed: &[&OutputRow],
) -> Vec<ActivityGroup> {
    let sent = sent_details(viewpoint, consumed);
    let spends_own = consumed
        .iter()
        .any(|row| viewpoint.owns(&row.payment_key_hash, &row.stake_key_hash));
    let receipt_kind = if spends_own {
        ActivityKind::SelfTransfer
    } else {
        ActivityKind::Received
    };
    let to_viewpoint = outputs_to_viewpoint(tx, viewpoint, receipt_kind);

    let mut groups = Vec::new();
    if !spends_own && !to_viewpoint.is_empty() {
        groups.push(ActivityGroup {
            kind: ActivityKind::Received,
            details: to_viewpoint,
        });
        return append_sent(groups, sent);
    }
    groups = append_sent(groups, sent);
    if !to_viewpoint.is_empty() {
        groups.push(ActivityGroup {
            kind: ActivityKind::SelfTransfer,
            details: to_viewpoint,
        });
    }
    groups
}

fn append_sent(mut groups: Vec<ActivityGroup>, sent: Vec<ActivityDetail>) -> Vec<ActivityGroup> {
    if !sent.is_empty() {
        groups.push(ActivityGroup {
            kind: ActivityKind::Sent,
            details: sent,
        });
    }
    groups
}

/// Per-unit details for one output value: one entry for a non-zero coin
/// amount (empty subject) and one per non-zero asset quantity.
fn per_unit_details(
    value: &crate::ledger::Value,
    kind: ActivityKind,
    address: &Option<String>,
    details: &mut Vec<ActivityDetail>,
) {
    if value.coin > 0 {
        details.push(ActivityDetail {
            kind,
            amount: value.coin,
            subject: Some(String::new()),
            address: address.clone(),
            pool_id: None,
            type_id: None,
        });
    }
    for subject in value.subjects() {
        let Some(amount) = value.quantity_of(&subject) else {
            continue;
        };
        if amount == 0 {
            continue;
        }
        details.push(ActivityDetail {
            kind,
            amount,
            subject: Some(subject),
            address: address.clone(),
            pool_id: None,
            type_id: None,
        });
    }
}

fn outputs_to_viewpoint(
    tx: &Transaction,
    viewpoint: &Viewpoint,
    kind: ActivityKind,
) -> Vec<ActivityDetail> {
    let mut details = Vec::new();
    for output in &tx.outputs {
        let Some(parts) = address::decode_raw(&output.address) else {
            continue;
        };
        if !viewpoint.owns(&parts.payment_hash, &parts.stake_hash) {
            continue;
        }
        let bech32 = viewpoint.bech32(&parts.payment_hash, &parts.stake_hash);
        per_unit_details(&output.value, kind, &bech32, &mut details);
    }
    details
}

fn sent_details(viewpoint: &Viewpoint, consumed: &[&OutputRow]) -> Vec<ActivityDetail> {
    let address = Some(viewpoint.payment.clone());
    let mut details = Vec::new();
    for row in consumed {
        if !viewpoint.owns(&row.payment_key_hash, &row.stake_key_hash) {
            continue;
        }
        let Ok(output) = TransactionOutput::from_bytes(&row.raw) else {
            continue;
        };
        per_unit_details(&output.value, ActivityKind::Sent, &address, &mut details);
    }
    details
}

fn subject_other_group() -> SubjectActivityGroup {
    SubjectActivityGroup {
        details: vec![SubjectActivityDetail {
            kind: ActivityKind::Other,
            amount: 0,
            address: None,
        }],
    }
}

/// Classify an indexed transaction's movements of a single subject, viewed
/// from the address pair the row was indexed under. A transaction that moves
/// none of the subject for that pair (or fails to decode) yields one `Other`
/// group.
pub fn classify_subject_activities(
    raw: &[u8],
    payment: &str,
    stake: &str,
    subject: &str,
    consumed: &[&OutputRow],
) -> Vec<SubjectActivityGroup> {
    let Ok(tx) = Transaction::from_bytes(raw) else {
        return vec![subject_other_group()];
    };

    let received: Vec<SubjectActivityDetail> = tx
        .outputs
        .iter()
        .filter_map(|output| {
            let parts = address::decode_raw(&output.address)?;
            if parts.payment_hash != payment || parts.stake_hash != stake {
                return None;
            }
            let amount = output.value.quantity_of(subject)?;
            (amount > 0).then_some(SubjectActivityDetail {
                kind: ActivityKind::Received,
                amount,
                address: Some(payment.to_string()),
            })
        })
        .collect();

    let sent: Vec<SubjectActivityDetail> = consumed
        .iter()
        .filter(|row| row.payment_key_hash == payment && row.stake_key_hash == stake)
        .filter_map(|row| {
            let output = TransactionOutput::from_bytes(&row.raw).ok()?;
            let amount = output.value.quantity_of(subject)?;
            (amount > 0).then_some(SubjectActivityDetail {
                kind: ActivityKind::Sent,
                amount,
                address: Some(payment.to_string()),
            })
        })
        .collect();

    let mut groups = Vec::new();
    if !received.is_empty() {
        groups.push(SubjectActivityGroup { details: received });
    }
    if !sent.is_empty() {
        groups.push(SubjectActivityGroup { details: sent });
    }
    if groups.is_empty() {
        return vec![subject_other_group()];
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::address::{base_address_bytes, reward_account_bytes};
    use crate::ledger::{
        Certificate, StakeCredential, TransactionInput, Value, Voter, VotingProcedure, Withdrawal,
    };

    const PAYMENT: [u8; 28] = [1; 28];
    const STAKE: [u8; 28] = [2; 28];

    fn viewpoint(with_stake: bool) -> Viewpoint {
        Viewpoint {
            payment: hex::encode(PAYMENT),
            stake: with_stake.then(|| hex::encode(STAKE)),
            network: Network::Mainnet,
        }
    }

    fn own_output(value: Value) -> TransactionOutput {
        TransactionOutput {
            address: base_address_bytes(&PAYMENT, &STAKE, Network::Mainnet),
            value,
        }
    }

    fn foreign_output(value: Value) -> TransactionOutput {
        TransactionOutput {
            address: base_address_bytes(&[9; 28], &[10; 28], Network::Mainnet),
            value,
        }
    }

    fn bare_tx() -> Transaction {
        Transaction {
            hash: "aa".to_string(),
            inputs: vec![TransactionInput {
                transaction_id: "old".to_string(),
                index: 0,
            }],
            outputs: vec![],
            certificates: vec![],
            withdrawals: vec![],
            votes: vec![],
        }
    }

    fn consumed_row(payment: [u8; 28], stake: [u8; 28], coin: u64) -> OutputRow {
        OutputRow {
            out_ref: "old#0".to_string(),
            slot: 1,
            spent_tx_hash: "aa".to_string(),
            spent_slot: Some(2),
            payment_key_hash: hex::encode(payment),
            stake_key_hash: hex::encode(stake),
            raw: TransactionOutput {
                address: base_address_bytes(&payment, &stake, Network::Mainnet),
                value: Value::coin(coin),
            }
            .to_bytes(),
        }
    }

    fn kinds(groups: &[ActivityGroup]) -> Vec<ActivityKind> {
        groups.iter().map(|g| g.kind).collect()
    }

    #[test]
    fn undecodable_raw_degrades_to_other() {
        let groups = classify_activities(&[0xff, 0x01], &viewpoint(true), &[]);
        assert_eq!(kinds(&groups), vec![ActivityKind::Other]);
        assert_eq!(groups[0].details[0].amount, 0);
    }

    #[test]
    fn payment_received_without_own_spend() {
        let mut tx = bare_tx();
        tx.outputs = vec![own_output(Value::coin(5)), foreign_output(Value::coin(3))];
        let groups = classify_activities(&tx.to_bytes(), &viewpoint(true), &[]);
        assert_eq!(kinds(&groups), vec![ActivityKind::Received]);
        assert_eq!(groups[0].details.len(), 1);
        assert_eq!(groups[0].details[0].amount, 5);
        assert_eq!(groups[0].details[0].subject.as_deref(), Some(""));
        assert!(groups[0].details[0].address.as_deref().unwrap().starts_with("addr1"));
    }

    #[test]
    fn own_spend_turns_receipts_into_self_transfers() {
        let mut tx = bare_tx();
        tx.outputs = vec![own_output(Value::coin(4)), foreign_output(Value::coin(6))];
        let row = consumed_row(PAYMENT, STAKE, 10);
        let groups = classify_activities(&tx.to_bytes(), &viewpoint(true), &[&row]);
        assert_eq!(
            kinds(&groups),
            vec![ActivityKind::Sent, ActivityKind::SelfTransfer]
        );
        assert_eq!(groups[0].details[0].amount, 10); // consumed value
        assert_eq!(groups[1].details[0].amount, 4); // change back
    }

    #[test]
    fn sent_expands_consumed_assets_per_unit() {
        let policy = [7u8; 28];
        let tx = bare_tx();
        let mut row = consumed_row(PAYMENT, STAKE, 3);
        row.raw = TransactionOutput {
            address: base_address_bytes(&PAYMENT, &STAKE, Network::Mainnet),
            value: Value::coin(3).with_asset(policy, b"tok", 8),
        }
        .to_bytes();

        let groups = classify_activities(&tx.to_bytes(), &viewpoint(true), &[&row]);
        assert_eq!(kinds(&groups), vec![ActivityKind::Sent]);
        assert_eq!(groups[0].details.len(), 2);
        assert_eq!(groups[0].details[0].amount, 3);
        assert_eq!(groups[0].details[0].subject.as_deref(), Some(""));
        assert_eq!(groups[0].details[1].amount, 8);
        assert_eq!(
            groups[0].details[1].subject.as_deref(),
            Some(format!("{}{}", hex::encode(policy), hex::encode(b"tok")).as_str())
        );
    }

    #[test]
    fn coinless_consumed_output_still_reports_its_assets() {
        let policy = [7u8; 28];
        let tx = bare_tx();
        let mut row = consumed_row(PAYMENT, STAKE, 0);
        row.raw = TransactionOutput {
            address: base_address_bytes(&PAYMENT, &STAKE, Network::Mainnet),
            value: Value::coin(0).with_asset(policy, b"tok", 4),
        }
        .to_bytes();

        let groups = classify_activities(&tx.to_bytes(), &viewpoint(true), &[&row]);
        assert_eq!(kinds(&groups), vec![ActivityKind::Sent]);
        assert_eq!(groups[0].details.len(), 1);
        assert_eq!(groups[0].details[0].amount, 4);
    }

    #[test]
    fn assets_expand_to_one_detail_per_unit() {
        let policy = [7u8; 28];
        let value = Value::coin(2).with_asset(policy, b"tok", 30);
        let mut tx = bare_tx();
        tx.outputs = vec![own_output(value)];
        let groups = classify_activities(&tx.to_bytes(), &viewpoint(true), &[]);
        assert_eq!(groups[0].details.len(), 2);
        assert_eq!(groups[0].details[0].subject.as_deref(), Some(""));
        assert_eq!(groups[0].details[1].amount, 30);
        assert_eq!(
            groups[0].details[1].subject.as_deref(),
            Some(format!("{}{}", hex::encode(policy), hex::encode(b"tok")).as_str())
        );
    }

    #[test]
    fn stake_certificates_need_a_stake_viewpoint() {
        let mut tx = bare_tx();
        tx.certificates = vec![Certificate::StakeDelegation {
            credential: StakeCredential::KeyHash(STAKE),
            pool_key_hash: [9; 28],
        }];
        let with_stake = classify_activities(&tx.to_bytes(), &viewpoint(true), &[]);
        assert_eq!(kinds(&with_stake), vec![ActivityKind::Stake]);
        assert_eq!(with_stake[0].details[0].type_id, Some(2));
        assert!(with_stake[0].details[0].pool_id.is_some());

        let without_stake = classify_activities(&tx.to_bytes(), &viewpoint(false), &[]);
        assert!(kinds(&without_stake).is_empty());
    }

    #[test]
    fn withdrawals_are_filtered_to_the_viewpoint_account() {
        let mut tx = bare_tx();
        tx.withdrawals = vec![
            Withdrawal {
                account: reward_account_bytes(&STAKE, Network::Mainnet),
                amount: 11,
            },
            Withdrawal {
                account: reward_account_bytes(&[9; 28], Network::Mainnet),
                amount: 99,
            },
        ];
        let groups = classify_activities(&tx.to_bytes(), &viewpoint(true), &[]);
        assert_eq!(kinds(&groups), vec![ActivityKind::Withdraw]);
        assert_eq!(groups[0].details.len(), 1);
        assert_eq!(groups[0].details[0].amount, 11);
        assert!(groups[0].details[0].address.as_deref().unwrap().starts_with("stake1"));
    }

    #[test]
    fn only_key_voters_matching_the_payment_hash_count() {
        let mut tx = bare_tx();
        tx.votes = vec![
            VotingProcedure {
                voter: Voter::DRepKey(PAYMENT),
                gov_action_tx_hash: "gov".to_string(),
            },
            VotingProcedure {
                voter: Voter::DRepScript(PAYMENT),
                gov_action_tx_hash: "gov".to_string(),
            },
            VotingProcedure {
                voter: Voter::StakePoolKey([9; 28]),
                gov_action_tx_hash: "gov".to_string(),
            },
        ];
        let groups = classify_activities(&tx.to_bytes(), &viewpoint(true), &[]);
        assert_eq!(kinds(&groups), vec![ActivityKind::Vote]);
        assert_eq!(groups[0].details.len(), 1);
        assert_eq!(groups[0].details[0].type_id, Some(2));
    }

    #[test]
    fn subject_classification_covers_both_directions() {
        let policy = [7u8; 28];
        let subject = format!("{}{}", hex::encode(policy), hex::encode(b"tok"));

        let mut tx = bare_tx();
        tx.outputs = vec![own_output(Value::coin(1).with_asset(policy, b"tok", 5))];
        let mut row = consumed_row(PAYMENT, STAKE, 3);
        row.raw = TransactionOutput {
            address: base_address_bytes(&PAYMENT, &STAKE, Network::Mainnet),
            value: Value::coin(3).with_asset(policy, b"tok", 8),
        }
        .to_bytes();

        let groups = classify_subject_activities(
            &tx.to_bytes(),
            &hex::encode(PAYMENT),
            &hex::encode(STAKE),
            &subject,
            &[&row],
        );
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].details[0].kind, ActivityKind::Received);
        assert_eq!(groups[0].details[0].amount, 5);
        assert_eq!(groups[1].details[0].kind, ActivityKind::Sent);
        assert_eq!(groups[1].details[0].amount, 8);
    }

    #[test]
    fn subject_not_moved_for_the_pair_yields_other() {
        let tx = bare_tx();
        let groups = classify_subject_activities(
            &tx.to_bytes(),
            &hex::encode(PAYMENT),
            &hex::encode(STAKE),
            "00",
            &[],
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].details[0].kind, ActivityKind::Other);
    }
}
