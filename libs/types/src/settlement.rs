//! Settlement records and payout instructions

use crate::ids::{MarketId, UserId};
use crate::numeric::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementKind {
    /// Market resolved; winnings paid net of the creator fee
    Payout,
    /// Market voided; locked stake returned in full
    Refund,
}

/// One settlement per user per market
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SettlementKey {
    pub market_id: MarketId,
    pub user_id: UserId,
}

impl fmt::Display for SettlementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.market_id, self.user_id)
    }
}

/// Deduplication key the wallet sees on every payout
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdempotencyKey {
    Settlement(SettlementKey),
    CreatorFee { market_id: MarketId },
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdempotencyKey::Settlement(key) => write!(f, "settlement:{}", key),
            IdempotencyKey::CreatorFee { market_id } => write!(f, "creator-fee:{}", market_id),
        }
    }
}

/// Audit record of what a user received from a market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub market_id: MarketId,
    pub user_id: UserId,
    pub kind: SettlementKind,
    /// Share of the pools before fees
    pub gross_return: Money,
    /// What the wallet pays out: `gross_return - fee`
    pub payout: Money,
    pub fee: Money,
    /// Locked collateral released by this settlement
    pub stake_consumed: Money,
    /// `gross_return - stake_consumed`
    pub net_profit: Decimal,
    pub settled_at: i64,
}

impl SettlementRecord {
    pub fn key(&self) -> SettlementKey {
        SettlementKey {
            market_id: self.market_id,
            user_id: self.user_id,
        }
    }

    pub fn idempotency_key(&self) -> IdempotencyKey {
        IdempotencyKey::Settlement(self.key())
    }
}

/// Instruction handed to the wallet collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutInstruction {
    pub user_id: UserId,
    pub currency: String,
    pub amount: Money,
    /// Locked collateral the payout retires
    pub consumed_stake: Money,
    pub idempotency_key: IdempotencyKey,
}

impl PayoutInstruction {
    pub fn for_record(record: &SettlementRecord, currency: &str) -> Self {
        Self {
            user_id: record.user_id,
            currency: currency.to_string(),
            amount: record.payout,
            consumed_stake: record.stake_consumed,
            idempotency_key: record.idempotency_key(),
        }
    }
}
