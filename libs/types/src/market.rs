//! Market, outcome and lifecycle types
//!
//! Lifecycle: `open → closed → resolving → {resolved | void}`. Transitions are
//! monotonic; anything out of order fails with `InvalidTransition`. The
//! barrier that drains in-flight matching before `closed` lives in the trading
//! core, this module only owns the state machine and its invariants.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{MarketError, MoneyError};
use crate::ids::{MarketId, OutcomeId, UserId};
use crate::numeric::{Money, Price};
use crate::time::to_nanos;

/// Lowest creator fee a market may charge (0.5%)
pub const MIN_CREATOR_FEE_RATE: Decimal = Decimal::from_parts(5, 0, 0, false, 3);
/// Highest creator fee a market may charge (5%)
pub const MAX_CREATOR_FEE_RATE: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

pub const MIN_OUTCOMES: usize = 2;
pub const MAX_OUTCOMES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    /// Exactly two outcomes
    Binary,
    /// 2–10 named outcomes
    MultiOutcome,
    /// 2–10 range buckets over a numeric result
    Scalar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketStatus {
    Open,
    Closed,
    Resolving,
    Resolved,
    Void,
}

impl MarketStatus {
    /// The only edges of the lifecycle graph
    pub fn can_transition_to(&self, next: MarketStatus) -> bool {
        matches!(
            (self, next),
            (MarketStatus::Open, MarketStatus::Closed)
                | (MarketStatus::Closed, MarketStatus::Resolving)
                | (MarketStatus::Resolving, MarketStatus::Resolved)
                | (MarketStatus::Resolving, MarketStatus::Void)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MarketStatus::Resolved | MarketStatus::Void)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketStatus::Open => "open",
            MarketStatus::Closed => "closed",
            MarketStatus::Resolving => "resolving",
            MarketStatus::Resolved => "resolved",
            MarketStatus::Void => "void",
        }
    }
}

impl std::fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the winning outcome comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OracleKind {
    /// Creator or admin names the winner
    #[default]
    Manual,
    /// An external feed supplies the winner
    Automated,
}

/// Proposed or final resolution of a market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    Winner { outcome_id: OutcomeId },
    Void { reason: String },
}

/// A resolution request as submitted, kept for audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionRequest {
    pub resolution: Resolution,
    /// `None` when submitted by an automated feed
    pub requested_by: Option<UserId>,
    pub requested_at: i64,
    /// Finalization is refused before this instant
    pub dispute_until: i64,
}

/// Typed market creation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarketSpec {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub market_type: MarketType,
    pub creator: UserId,
    pub currency: String,
    /// Display text of each outcome, in order
    pub outcomes: Vec<String>,
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    /// Fraction, e.g. 0.025 for 2.5%
    pub creator_fee_rate: Decimal,
    pub min_bet: Money,
    pub max_bet: Money,
    pub resolution_source: String,
    #[serde(default)]
    pub oracle: OracleKind,
}

impl MarketSpec {
    pub fn validate(&self) -> Result<(), MarketError> {
        let invalid = |reason: String| Err(MarketError::InvalidSpec { reason });

        if self.title.trim().is_empty() {
            return invalid("title must not be empty".to_string());
        }
        if self.currency.trim().is_empty() {
            return invalid("currency must not be empty".to_string());
        }
        if self.closes_at <= self.opens_at {
            return invalid(format!(
                "closing time {} must be after opening time {}",
                self.closes_at, self.opens_at
            ));
        }
        if self.creator_fee_rate < MIN_CREATOR_FEE_RATE || self.creator_fee_rate > MAX_CREATOR_FEE_RATE {
            return invalid(format!(
                "creator fee rate {} outside [{}, {}]",
                self.creator_fee_rate, MIN_CREATOR_FEE_RATE, MAX_CREATOR_FEE_RATE
            ));
        }
        if self.min_bet.is_zero() || self.min_bet >= self.max_bet {
            return invalid(format!(
                "bet limits must satisfy 0 < min ({}) < max ({})",
                self.min_bet, self.max_bet
            ));
        }

        let count = self.outcomes.len();
        match self.market_type {
            MarketType::Binary if count != 2 => {
                return invalid(format!("binary market needs exactly 2 outcomes, got {}", count));
            }
            MarketType::MultiOutcome | MarketType::Scalar
                if !(MIN_OUTCOMES..=MAX_OUTCOMES).contains(&count) =>
            {
                return invalid(format!(
                    "market needs {}-{} outcomes, got {}",
                    MIN_OUTCOMES, MAX_OUTCOMES, count
                ));
            }
            _ => {}
        }
        if self.outcomes.iter().any(|text| text.trim().is_empty()) {
            return invalid("outcome text must not be empty".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        if !self.outcomes.iter().all(|text| seen.insert(text.trim())) {
            return invalid("outcome texts must be unique".to_string());
        }
        Ok(())
    }
}

/// One possible resolution of a market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub outcome_id: OutcomeId,
    pub market_id: MarketId,
    pub text: String,
    /// Position of the outcome in the market ("0", "1", ...)
    pub value: String,
    /// Last trade price; `None` until the first trade
    pub current_price: Option<Price>,
    /// Cumulative matched quantity
    pub total_volume: Money,
    /// Set only once the market resolves
    pub is_winner: Option<bool>,
    /// Last trade sequence recorded at the `closed` transition
    pub closing_sequence: Option<u64>,
}

impl Outcome {
    pub fn new(market_id: MarketId, text: impl Into<String>, index: usize) -> Self {
        Self {
            outcome_id: OutcomeId::new(),
            market_id,
            text: text.into(),
            value: index.to_string(),
            current_price: None,
            total_volume: Money::zero(),
            is_winner: None,
            closing_sequence: None,
        }
    }

    /// Apply a trade: last price and cumulative volume
    pub fn record_trade(&mut self, price: Price, quantity: Money) -> Result<(), MoneyError> {
        self.total_volume = self.total_volume.checked_add(quantity)?;
        self.current_price = Some(price);
        Ok(())
    }
}

/// User-created prediction market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub market_id: MarketId,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub market_type: MarketType,
    pub status: MarketStatus,
    pub creator: UserId,
    pub currency: String,
    pub opens_at: i64,  // Unix nanos
    pub closes_at: i64, // Unix nanos
    pub creator_fee_rate: Decimal,
    pub min_bet: Money,
    pub max_bet: Money,
    pub resolution_source: String,
    pub oracle: OracleKind,
    pub outcomes: Vec<Outcome>,
    pub resolution: Option<ResolutionRequest>,
    pub total_volume: Money,
    pub participant_count: u32,
    pub created_at: i64,
    pub closed_at: Option<i64>,
    pub finalized_at: Option<i64>,
    pub version: u64,
}

impl Market {
    /// Validate a spec and build an open market with fresh outcome ids
    pub fn create(spec: &MarketSpec, timestamp: i64) -> Result<Self, MarketError> {
        spec.validate()?;
        let market_id = MarketId::new();
        let outcomes = spec
            .outcomes
            .iter()
            .enumerate()
            .map(|(index, text)| Outcome::new(market_id, text.trim(), index))
            .collect();

        Ok(Self {
            market_id,
            title: spec.title.trim().to_string(),
            description: spec.description.clone(),
            category: spec.category.clone(),
            market_type: spec.market_type,
            status: MarketStatus::Open,
            creator: spec.creator,
            currency: spec.currency.clone(),
            opens_at: to_nanos(spec.opens_at),
            closes_at: to_nanos(spec.closes_at),
            creator_fee_rate: spec.creator_fee_rate,
            min_bet: spec.min_bet,
            max_bet: spec.max_bet,
            resolution_source: spec.resolution_source.clone(),
            oracle: spec.oracle,
            outcomes,
            resolution: None,
            total_volume: Money::zero(),
            participant_count: 0,
            created_at: timestamp,
            closed_at: None,
            finalized_at: None,
            version: 0,
        })
    }

    pub fn outcome(&self, outcome_id: &OutcomeId) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| &o.outcome_id == outcome_id)
    }

    pub fn outcome_ids(&self) -> impl Iterator<Item = OutcomeId> + '_ {
        self.outcomes.iter().map(|o| o.outcome_id)
    }

    /// Open status and inside the trading window
    pub fn is_trading_open(&self, now: i64) -> bool {
        self.status == MarketStatus::Open && now >= self.opens_at && now < self.closes_at
    }

    /// Open status but past the closing timestamp
    pub fn is_past_deadline(&self, now: i64) -> bool {
        self.status == MarketStatus::Open && now >= self.closes_at
    }

    /// Check a stake against the market's bet limits
    pub fn stake_in_range(&self, stake: Money) -> bool {
        stake >= self.min_bet && stake <= self.max_bet
    }

    pub fn winning_outcome(&self) -> Option<OutcomeId> {
        match (&self.status, &self.resolution) {
            (
                MarketStatus::Resolved,
                Some(ResolutionRequest {
                    resolution: Resolution::Winner { outcome_id },
                    ..
                }),
            ) => Some(*outcome_id),
            _ => None,
        }
    }

    fn transition(&mut self, next: MarketStatus, timestamp: i64) -> Result<(), MarketError> {
        if !self.status.can_transition_to(next) {
            return Err(MarketError::InvalidTransition {
                market_id: self.market_id.to_string(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.version += 1;
        if next == MarketStatus::Closed {
            self.closed_at = Some(timestamp);
        }
        if next.is_terminal() {
            self.finalized_at = Some(timestamp);
        }
        Ok(())
    }

    /// `open → closed`; the caller records each outcome's closing sequence
    pub fn close(&mut self, timestamp: i64) -> Result<(), MarketError> {
        self.transition(MarketStatus::Closed, timestamp)
    }

    /// `closed → resolving` with a proposed resolution
    pub fn request_resolution(
        &mut self,
        resolution: Resolution,
        requested_by: Option<UserId>,
        dispute_window_nanos: i64,
        timestamp: i64,
    ) -> Result<(), MarketError> {
        if let Resolution::Winner { outcome_id } = &resolution {
            if self.outcome(outcome_id).is_none() {
                return Err(MarketError::OutcomeNotInMarket {
                    market_id: self.market_id.to_string(),
                    outcome_id: outcome_id.to_string(),
                });
            }
        }
        self.transition(MarketStatus::Resolving, timestamp)?;
        self.resolution = Some(ResolutionRequest {
            resolution,
            requested_by,
            requested_at: timestamp,
            dispute_until: timestamp.saturating_add(dispute_window_nanos),
        });
        Ok(())
    }

    /// `resolving → resolved | void`, applying the pending resolution
    pub fn finalize(&mut self, timestamp: i64) -> Result<MarketStatus, MarketError> {
        let request = match (&self.status, &self.resolution) {
            (MarketStatus::Resolving, Some(request)) => request.clone(),
            _ => {
                return Err(MarketError::InvalidTransition {
                    market_id: self.market_id.to_string(),
                    from: self.status.to_string(),
                    to: MarketStatus::Resolved.to_string(),
                })
            }
        };
        if timestamp < request.dispute_until {
            return Err(MarketError::DisputeWindowOpen {
                market_id: self.market_id.to_string(),
                until: request.dispute_until,
            });
        }

        match request.resolution {
            Resolution::Winner { outcome_id } => {
                self.transition(MarketStatus::Resolved, timestamp)?;
                for outcome in &mut self.outcomes {
                    outcome.is_winner = Some(outcome.outcome_id == outcome_id);
                }
            }
            Resolution::Void { .. } => {
                self.transition(MarketStatus::Void, timestamp)?;
            }
        }
        Ok(self.status)
    }

    /// `resolving → void` after a successful dispute
    pub fn dispute(&mut self, reason: impl Into<String>, timestamp: i64) -> Result<(), MarketError> {
        self.transition(MarketStatus::Void, timestamp)?;
        if let Some(request) = self.resolution.as_mut() {
            request.resolution = Resolution::Void {
                reason: reason.into(),
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    pub(crate) fn binary_spec() -> MarketSpec {
        let opens_at = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        MarketSpec {
            title: "Will it rain in Lagos on Friday?".to_string(),
            description: None,
            category: Some("weather".to_string()),
            market_type: MarketType::Binary,
            creator: UserId::new(),
            currency: "USD".to_string(),
            outcomes: vec!["Yes".to_string(), "No".to_string()],
            opens_at,
            closes_at: opens_at + Duration::days(7),
            creator_fee_rate: dec!(0.025),
            min_bet: Money::from_str("1").unwrap(),
            max_bet: Money::from_str("10000").unwrap(),
            resolution_source: "NiMet daily report".to_string(),
            oracle: OracleKind::Manual,
        }
    }

    #[test]
    fn test_create_binary_market() {
        let market = Market::create(&binary_spec(), 0).unwrap();
        assert_eq!(market.status, MarketStatus::Open);
        assert_eq!(market.outcomes.len(), 2);
        assert_eq!(market.outcomes[1].value, "1");
        assert!(market.outcomes.iter().all(|o| o.market_id == market.market_id));
        assert!(market.closes_at > market.opens_at);
    }

    #[test]
    fn test_spec_validation() {
        let mut spec = binary_spec();
        spec.creator_fee_rate = dec!(0.051);
        assert!(matches!(spec.validate(), Err(MarketError::InvalidSpec { .. })));

        let mut spec = binary_spec();
        spec.creator_fee_rate = dec!(0.005);
        assert!(spec.validate().is_ok());
        spec.creator_fee_rate = dec!(0.05);
        assert!(spec.validate().is_ok());

        let mut spec = binary_spec();
        spec.outcomes.push("Maybe".to_string());
        assert!(spec.validate().is_err());

        let mut spec = binary_spec();
        spec.market_type = MarketType::MultiOutcome;
        spec.outcomes = (0..11).map(|i| format!("Team {}", i)).collect();
        assert!(spec.validate().is_err());
        spec.outcomes.truncate(10);
        assert!(spec.validate().is_ok());

        let mut spec = binary_spec();
        spec.closes_at = spec.opens_at;
        assert!(spec.validate().is_err());

        let mut spec = binary_spec();
        spec.min_bet = spec.max_bet;
        assert!(spec.validate().is_err());

        let mut spec = binary_spec();
        spec.outcomes = vec!["Yes".to_string(), "Yes ".to_string()];
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_spec_rejects_unknown_fields() {
        let mut value = serde_json::to_value(binary_spec()).unwrap();
        value["liquidity_pool"] = serde_json::json!({ "seed": 100 });
        assert!(serde_json::from_value::<MarketSpec>(value).is_err());
    }

    #[test]
    fn test_full_lifecycle() {
        let mut market = Market::create(&binary_spec(), 0).unwrap();
        let winner = market.outcomes[0].outcome_id;

        market.close(10).unwrap();
        assert_eq!(market.closed_at, Some(10));
        market
            .request_resolution(Resolution::Winner { outcome_id: winner }, None, 0, 20)
            .unwrap();
        assert_eq!(market.status, MarketStatus::Resolving);
        assert_eq!(market.finalize(30).unwrap(), MarketStatus::Resolved);
        assert_eq!(market.winning_outcome(), Some(winner));
        assert_eq!(market.outcomes[0].is_winner, Some(true));
        assert_eq!(market.outcomes[1].is_winner, Some(false));
    }

    #[test]
    fn test_out_of_order_transitions() {
        let mut market = Market::create(&binary_spec(), 0).unwrap();
        let winner = market.outcomes[0].outcome_id;

        let err = market
            .request_resolution(Resolution::Winner { outcome_id: winner }, None, 0, 5)
            .unwrap_err();
        assert!(matches!(err, MarketError::InvalidTransition { .. }));
        assert!(market.finalize(5).is_err());
        assert!(market.dispute("early", 5).is_err());
        assert_eq!(market.status, MarketStatus::Open);
    }

    #[test]
    fn test_terminal_states_never_transition() {
        for terminal in [MarketStatus::Resolved, MarketStatus::Void] {
            for next in [
                MarketStatus::Open,
                MarketStatus::Closed,
                MarketStatus::Resolving,
                MarketStatus::Resolved,
                MarketStatus::Void,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_dispute_window() {
        let mut market = Market::create(&binary_spec(), 0).unwrap();
        let winner = market.outcomes[1].outcome_id;
        market.close(10).unwrap();
        market
            .request_resolution(Resolution::Winner { outcome_id: winner }, None, 100, 20)
            .unwrap();

        assert!(matches!(
            market.finalize(50),
            Err(MarketError::DisputeWindowOpen { until: 120, .. })
        ));
        market.dispute("oracle feed disagreed with report", 60).unwrap();
        assert_eq!(market.status, MarketStatus::Void);
        assert!(matches!(
            market.resolution.as_ref().map(|r| &r.resolution),
            Some(Resolution::Void { .. })
        ));
        assert_eq!(market.winning_outcome(), None);
    }

    #[test]
    fn test_resolution_with_foreign_outcome() {
        let mut market = Market::create(&binary_spec(), 0).unwrap();
        market.close(10).unwrap();
        let err = market
            .request_resolution(
                Resolution::Winner {
                    outcome_id: OutcomeId::new(),
                },
                None,
                0,
                20,
            )
            .unwrap_err();
        assert!(matches!(err, MarketError::OutcomeNotInMarket { .. }));
        assert_eq!(market.status, MarketStatus::Closed);
    }

    #[test]
    fn test_trading_window() {
        let market = Market::create(&binary_spec(), 0).unwrap();
        assert!(!market.is_trading_open(market.opens_at - 1));
        assert!(market.is_trading_open(market.opens_at));
        assert!(!market.is_trading_open(market.closes_at));
        assert!(market.is_past_deadline(market.closes_at));
    }

    #[test]
    fn test_outcome_record_trade() {
        let market = Market::create(&binary_spec(), 0).unwrap();
        let mut outcome = market.outcomes[0].clone();
        outcome
            .record_trade(Price::from_str("0.4").unwrap(), Money::from_str("100").unwrap())
            .unwrap();
        outcome
            .record_trade(Price::from_str("0.45").unwrap(), Money::from_str("20").unwrap())
            .unwrap();
        assert_eq!(outcome.current_price, Some(Price::from_str("0.45").unwrap()));
        assert_eq!(outcome.total_volume, Money::from_str("120").unwrap());
    }
}
