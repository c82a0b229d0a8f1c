//! Idempotent settlement store
//!
//! Records are keyed by `(market, user)`. Settling a market twice returns the
//! records written the first time, and payout instructions carry the same
//! idempotency keys, so a redelivered resolution never pays twice.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

use types::errors::SettlementError;
use types::ids::{MarketId, UserId};
use types::market::Market;
use types::numeric::Money;
use types::position::Position;
use types::settlement::{IdempotencyKey, PayoutInstruction, SettlementKey, SettlementRecord};

use crate::payout::{on_market_resolved, OutcomePool};

/// What one `settle` call produced
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementOutcome {
    pub records: Vec<SettlementRecord>,
    /// One per record, in record order
    pub instructions: Vec<PayoutInstruction>,
    /// Sum of fees owed to the market creator, if any
    pub creator_fee: Option<PayoutInstruction>,
    /// True when every record already existed
    pub replayed: bool,
}

impl SettlementOutcome {
    pub fn total_payout(&self) -> Result<Money, types::errors::MoneyError> {
        Money::checked_sum(self.records.iter().map(|r| r.payout))
    }

    pub fn total_fees(&self) -> Result<Money, types::errors::MoneyError> {
        Money::checked_sum(self.records.iter().map(|r| r.fee))
    }
}

#[derive(Debug, Default)]
pub struct SettlementProcessor {
    records: RwLock<BTreeMap<SettlementKey, SettlementRecord>>,
    /// Markets whose completed settlement has been reported downstream
    announced: RwLock<HashSet<MarketId>>,
}

impl SettlementProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute and store the records for a resolved or void market
    pub fn settle(
        &self,
        market: &Market,
        positions: &[Position],
        pools: &[OutcomePool],
        settled_at: i64,
    ) -> Result<SettlementOutcome, SettlementError> {
        let computed = on_market_resolved(market, positions, pools, settled_at)?;

        let mut records = self.records.write();
        let mut stored = Vec::with_capacity(computed.len());
        let mut fresh = 0usize;
        for record in computed {
            match insert_once(&mut records, record) {
                Ok(record) => {
                    fresh += 1;
                    stored.push(record);
                }
                Err((SettlementError::Duplicate { .. }, existing)) => stored.push(existing),
                Err((other, _)) => return Err(other),
            }
        }
        drop(records);

        let replayed = fresh == 0 && !stored.is_empty();
        if replayed {
            warn!(
                market_id = %market.market_id,
                records = stored.len(),
                "Market already settled, returning existing records"
            );
        } else {
            info!(
                market_id = %market.market_id,
                status = %market.status,
                records = stored.len(),
                new_records = fresh,
                "Market settled"
            );
        }

        let instructions = stored
            .iter()
            .map(|record| PayoutInstruction::for_record(record, &market.currency))
            .collect();
        let creator_fee = creator_fee_instruction(market, &stored)?;

        Ok(SettlementOutcome {
            records: stored,
            instructions,
            creator_fee,
            replayed,
        })
    }

    /// Mark the market's payouts as complete.
    ///
    /// Returns true only for the first call per market, so a settlement that
    /// failed halfway and was retried still gets announced exactly once.
    pub fn mark_announced(&self, market_id: MarketId) -> bool {
        self.announced.write().insert(market_id)
    }

    pub fn is_announced(&self, market_id: MarketId) -> bool {
        self.announced.read().contains(&market_id)
    }

    pub fn record(&self, key: &SettlementKey) -> Option<SettlementRecord> {
        self.records.read().get(key).cloned()
    }

    pub fn records_for_market(&self, market_id: MarketId) -> Vec<SettlementRecord> {
        self.records
            .read()
            .values()
            .filter(|record| record.market_id == market_id)
            .cloned()
            .collect()
    }

    pub fn is_settled(&self, market_id: MarketId, user_id: UserId) -> bool {
        self.records
            .read()
            .contains_key(&SettlementKey { market_id, user_id })
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

/// Insert unless the key exists; a duplicate hands back the stored record
fn insert_once(
    records: &mut BTreeMap<SettlementKey, SettlementRecord>,
    record: SettlementRecord,
) -> Result<SettlementRecord, (SettlementError, SettlementRecord)> {
    let key = record.key();
    if let Some(existing) = records.get(&key) {
        return Err((
            SettlementError::Duplicate {
                market_id: key.market_id.to_string(),
                user_id: key.user_id.to_string(),
            },
            existing.clone(),
        ));
    }
    records.insert(key, record.clone());
    Ok(record)
}

fn creator_fee_instruction(
    market: &Market,
    records: &[SettlementRecord],
) -> Result<Option<PayoutInstruction>, SettlementError> {
    let total = Money::checked_sum(records.iter().map(|r| r.fee)).map_err(|source| {
        SettlementError::Arithmetic {
            market_id: market.market_id.to_string(),
            source,
        }
    })?;
    if total.is_zero() {
        return Ok(None);
    }
    Ok(Some(PayoutInstruction {
        user_id: market.creator,
        currency: market.currency.clone(),
        amount: total,
        consumed_stake: Money::zero(),
        idempotency_key: IdempotencyKey::CreatorFee {
            market_id: market.market_id,
        },
    }))
}
