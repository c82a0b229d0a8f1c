//! Append-only trade log per outcome
//!
//! Trade `n` sits at index `n - 1`; the engine numbers trades from 1 without
//! gaps. Readers take the lock only for short batch copies, so a long history
//! walk never holds up matching.

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;

use types::trade::Trade;

const CURSOR_BATCH: usize = 256;

#[derive(Debug, Default)]
pub struct TradeLog {
    trades: RwLock<Vec<Trade>>,
}

impl TradeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, trades: &[Trade]) {
        if trades.is_empty() {
            return;
        }
        let mut log = self.trades.write();
        debug_assert!(trades
            .iter()
            .zip(log.len() as u64 + 1..)
            .all(|(trade, expected)| trade.sequence == expected));
        log.extend_from_slice(trades);
    }

    pub fn len(&self) -> usize {
        self.trades.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.read().is_empty()
    }

    pub fn last_sequence(&self) -> u64 {
        self.trades.read().last().map(|t| t.sequence).unwrap_or(0)
    }

    /// Run `f` over the trades with sequence `<= up_to`
    pub fn with_trades_up_to<R>(&self, up_to: u64, f: impl FnOnce(&[Trade]) -> R) -> R {
        let log = self.trades.read();
        let end = usize::try_from(up_to).unwrap_or(usize::MAX).min(log.len());
        f(&log[..end])
    }

    fn copy_range(&self, start: usize, end: usize) -> Vec<Trade> {
        let log = self.trades.read();
        let end = end.min(log.len());
        if start >= end {
            return Vec::new();
        }
        log[start..end].to_vec()
    }
}

/// Lazy walk over trades with sequence greater than a starting point
///
/// The end is fixed when the cursor is created, so iteration always
/// terminates. Resume later by opening a new cursor at [`TradeCursor::position`].
#[derive(Debug)]
pub struct TradeCursor {
    log: Arc<TradeLog>,
    next_index: usize,
    end_index: usize,
    buffer: VecDeque<Trade>,
    position: u64,
}

impl TradeCursor {
    pub fn new(log: Arc<TradeLog>, since_sequence: u64) -> Self {
        let end_index = log.len();
        let next_index = usize::try_from(since_sequence).unwrap_or(usize::MAX).min(end_index);
        Self {
            log,
            next_index,
            end_index,
            buffer: VecDeque::new(),
            position: since_sequence,
        }
    }

    /// Sequence of the last trade yielded (or the starting point)
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() + (self.end_index - self.next_index)
    }
}

impl Iterator for TradeCursor {
    type Item = Trade;

    fn next(&mut self) -> Option<Trade> {
        if self.buffer.is_empty() && self.next_index < self.end_index {
            let batch_end = (self.next_index + CURSOR_BATCH).min(self.end_index);
            self.buffer.extend(self.log.copy_range(self.next_index, batch_end));
            self.next_index = batch_end;
        }
        let trade = self.buffer.pop_front()?;
        self.position = trade.sequence;
        Some(trade)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}
