//! Position tracking types
//!
//! One position per (user, outcome), folded from trades. Each position has a
//! back leg and a lay leg; net stake is `back - lay` and may be negative.

use crate::errors::MoneyError;
use crate::ids::{MarketId, OutcomeId, UserId};
use crate::numeric::{round_money, Money, Price};
use crate::order::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Position state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    #[default]
    Open,
    Settled,
}

/// Matched quantity on one side with its volume-weighted entry price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Leg {
    pub quantity: Money,
    /// Zero while the leg is empty
    pub avg_price: Decimal,
}

impl Leg {
    /// Fold in a fill:
    /// `(avg × qty + price × fill) / (qty + fill)`, half-even at 8 digits
    pub fn add(&self, price: Price, fill: Money) -> Result<Leg, MoneyError> {
        let quantity = self.quantity.checked_add(fill)?;
        if quantity.is_zero() {
            return Ok(*self);
        }
        let weighted = self
            .avg_price
            .checked_mul(self.quantity.as_decimal())
            .and_then(|old| {
                price
                    .as_decimal()
                    .checked_mul(fill.as_decimal())
                    .and_then(|new| old.checked_add(new))
            })
            .ok_or(MoneyError::Overflow)?;
        let avg_price = weighted
            .checked_div(quantity.as_decimal())
            .ok_or(MoneyError::Overflow)?;
        Ok(Leg {
            quantity,
            avg_price: round_money(avg_price),
        })
    }
}

/// Identity of a position in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionKey {
    pub market_id: MarketId,
    pub user_id: UserId,
    pub outcome_id: OutcomeId,
}

/// Per (user, outcome) exposure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub user_id: UserId,
    pub market_id: MarketId,
    pub outcome_id: OutcomeId,
    pub back: Leg,
    pub lay: Leg,
    /// `back.quantity - lay.quantity`
    pub net_stake: Decimal,
    /// Collateral moved out of reservations by fills
    pub locked: Money,
    /// Highest trade sequence folded in
    pub last_sequence: u64,
    pub status: PositionStatus,
    pub opened_at: i64,
    pub updated_at: i64,
    pub version: u64,
}

impl Position {
    pub fn new(key: PositionKey, timestamp: i64) -> Self {
        Self {
            user_id: key.user_id,
            market_id: key.market_id,
            outcome_id: key.outcome_id,
            back: Leg::default(),
            lay: Leg::default(),
            net_stake: Decimal::ZERO,
            locked: Money::zero(),
            last_sequence: 0,
            status: PositionStatus::Open,
            opened_at: timestamp,
            updated_at: timestamp,
            version: 0,
        }
    }

    pub fn key(&self) -> PositionKey {
        PositionKey {
            market_id: self.market_id,
            user_id: self.user_id,
            outcome_id: self.outcome_id,
        }
    }

    pub fn leg(&self, side: Side) -> &Leg {
        match side {
            Side::Back => &self.back,
            Side::Lay => &self.lay,
        }
    }

    /// Fold one side of a trade into the position
    ///
    /// On error the position is untouched.
    pub fn apply_fill(
        &mut self,
        side: Side,
        price: Price,
        quantity: Money,
        collateral: Money,
        sequence: u64,
        timestamp: i64,
    ) -> Result<(), MoneyError> {
        let mut back = self.back;
        let mut lay = self.lay;
        match side {
            Side::Back => back = back.add(price, quantity)?,
            Side::Lay => lay = lay.add(price, quantity)?,
        }
        let locked = self.locked.checked_add(collateral)?;

        self.back = back;
        self.lay = lay;
        self.net_stake = back.quantity.as_decimal() - lay.quantity.as_decimal();
        self.locked = locked;
        self.last_sequence = self.last_sequence.max(sequence);
        self.updated_at = timestamp;
        self.version += 1;
        Ok(())
    }

    pub fn is_flat(&self) -> bool {
        self.back.quantity.is_zero() && self.lay.quantity.is_zero()
    }

    /// Zero the position after its settlement record was written
    pub fn settle(&mut self, timestamp: i64) {
        self.back = Leg::default();
        self.lay = Leg::default();
        self.net_stake = Decimal::ZERO;
        self.locked = Money::zero();
        self.status = PositionStatus::Settled;
        self.updated_at = timestamp;
        self.version += 1;
    }
}

/// A user's positions across the outcomes of one market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPosition {
    pub user_id: UserId,
    pub market_id: MarketId,
    pub positions: Vec<Position>,
    pub total_locked: Money,
}

impl MarketPosition {
    pub fn from_positions(
        user_id: UserId,
        market_id: MarketId,
        positions: Vec<Position>,
    ) -> Result<Self, MoneyError> {
        let total_locked = Money::checked_sum(positions.iter().map(|p| p.locked))?;
        Ok(Self {
            user_id,
            market_id,
            positions,
            total_locked,
        })
    }

    pub fn outcome(&self, outcome_id: &OutcomeId) -> Option<&Position> {
        self.positions.iter().find(|p| &p.outcome_id == outcome_id)
    }
}
