//! Market discovery filters

use std::cmp::Reverse;
use std::collections::BTreeMap;

use types::market::{Market, MarketStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarketSort {
    /// Highest matched volume first
    #[default]
    Volume,
    /// Newest first
    Created,
    /// Soonest closing first
    Closing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketFilter {
    /// `None` lists every status
    pub status: Option<MarketStatus>,
    pub category: Option<String>,
    pub sort: MarketSort,
    pub offset: usize,
    pub limit: usize,
}

impl Default for MarketFilter {
    fn default() -> Self {
        Self {
            status: Some(MarketStatus::Open),
            category: None,
            sort: MarketSort::Volume,
            offset: 0,
            limit: 20,
        }
    }
}

impl MarketFilter {
    pub fn matches(&self, market: &Market) -> bool {
        self.status.map_or(true, |status| market.status == status)
            && self
                .category
                .as_ref()
                .map_or(true, |category| market.category.as_ref() == Some(category))
    }

    /// Filter, sort and page; ties break on market id so pages are stable
    pub fn apply(&self, markets: impl IntoIterator<Item = Market>) -> Vec<Market> {
        let mut selected: Vec<Market> = markets.into_iter().filter(|m| self.matches(m)).collect();
        match self.sort {
            MarketSort::Volume => selected.sort_by_key(|m| (Reverse(m.total_volume), m.market_id)),
            MarketSort::Created => selected.sort_by_key(|m| (Reverse(m.created_at), m.market_id)),
            MarketSort::Closing => selected.sort_by_key(|m| (m.closes_at, m.market_id)),
        }
        selected.into_iter().skip(self.offset).take(self.limit).collect()
    }
}

/// How far back `trending` looks, in nanoseconds
pub const TRENDING_WINDOW_NANOS: i64 = 24 * 60 * 60 * 1_000_000_000;

/// Default number of markets `trending` returns
pub const DEFAULT_TRENDING_LIMIT: usize = 10;

/// Open markets created within the trending window, highest volume first
pub fn trending(markets: impl IntoIterator<Item = Market>, now: i64, limit: usize) -> Vec<Market> {
    let since = now.saturating_sub(TRENDING_WINDOW_NANOS);
    let mut selected: Vec<Market> = markets
        .into_iter()
        .filter(|m| m.status == MarketStatus::Open && m.created_at >= since)
        .collect();
    selected.sort_by_key(|m| (Reverse(m.total_volume), m.market_id));
    selected.truncate(limit);
    selected
}

/// Open market count per category, in category order
pub fn category_counts<'a>(markets: impl IntoIterator<Item = &'a Market>) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for market in markets {
        if market.status != MarketStatus::Open {
            continue;
        }
        if let Some(category) = &market.category {
            *counts.entry(category.clone()).or_default() += 1;
        }
    }
    counts.into_iter().collect()
}
