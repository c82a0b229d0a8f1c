//! Wallet collaborator
//!
//! Balances live outside the trading core. The core only ever moves funds
//! through this trait: an order reserves its worst-case collateral, fills
//! move reserved funds into positions, unused reservations are released and
//! settlement pays out under an idempotency key.
//!
//! `InMemoryWallet` keeps `available / reserved / locked` per
//! `(user, currency)` and is what the tests and embedders use.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use types::errors::WalletError;
use types::ids::{ReservationId, UserId};
use types::numeric::Money;
use types::settlement::{IdempotencyKey, PayoutInstruction};

pub trait Wallet: Send + Sync {
    /// Move `amount` from available to reserved
    fn reserve(&self, user_id: UserId, currency: &str, amount: Money) -> Result<ReservationId, WalletError>;

    /// Return part of a reservation to available
    ///
    /// Once nothing is held the reservation is retired; stake it already
    /// locked belongs to the position from then on.
    fn release(&self, reservation_id: ReservationId, amount: Money) -> Result<(), WalletError>;

    /// Move part of a reservation into locked position collateral
    fn lock_to_position(&self, reservation_id: ReservationId, amount: Money) -> Result<(), WalletError>;

    /// Undo a `lock_to_position` that was never committed
    fn unlock_from_position(&self, reservation_id: ReservationId, amount: Money) -> Result<(), WalletError>;

    /// Retire locked stake and credit the payout
    ///
    /// Returns false when the idempotency key was already paid.
    fn payout(&self, instruction: &PayoutInstruction) -> Result<bool, WalletError>;
}

/// Funds of one user in one currency
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balance {
    pub available: Money,
    pub reserved: Money,
    pub locked: Money,
}

impl Balance {
    pub fn total(&self) -> Result<Money, types::errors::MoneyError> {
        Money::checked_sum([self.available, self.reserved, self.locked])
    }
}

#[derive(Debug, Clone)]
struct Reservation {
    user_id: UserId,
    currency: String,
    /// Still reserved, neither released nor locked
    held: Money,
    /// Locked through this reservation
    locked: Money,
}

#[derive(Debug, Default)]
struct WalletState {
    balances: HashMap<(UserId, String), Balance>,
    reservations: HashMap<ReservationId, Reservation>,
    paid: HashSet<IdempotencyKey>,
}

#[derive(Debug, Default)]
pub struct InMemoryWallet {
    state: Mutex<WalletState>,
}

impl InMemoryWallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit(&self, user_id: UserId, currency: &str, amount: Money) -> Result<(), WalletError> {
        let mut state = self.state.lock();
        let balance = state.balances.entry((user_id, currency.to_string())).or_default();
        balance.available = balance.available.checked_add(amount).map_err(unavailable)?;
        Ok(())
    }

    pub fn balance(&self, user_id: UserId, currency: &str) -> Balance {
        self.state
            .lock()
            .balances
            .get(&(user_id, currency.to_string()))
            .copied()
            .unwrap_or_default()
    }

    /// Sum of every user's funds in `currency`
    pub fn total(&self, currency: &str) -> Result<Balance, types::errors::MoneyError> {
        let state = self.state.lock();
        let mut total = Balance::default();
        for ((_, balance_currency), balance) in &state.balances {
            if balance_currency != currency {
                continue;
            }
            total.available = total.available.checked_add(balance.available)?;
            total.reserved = total.reserved.checked_add(balance.reserved)?;
            total.locked = total.locked.checked_add(balance.locked)?;
        }
        Ok(total)
    }

    pub fn is_paid(&self, key: &IdempotencyKey) -> bool {
        self.state.lock().paid.contains(key)
    }
}

impl WalletState {
    fn reservation(&mut self, reservation_id: ReservationId) -> Result<&mut Reservation, WalletError> {
        self.reservations
            .get_mut(&reservation_id)
            .ok_or_else(|| WalletError::ReservationNotFound {
                reservation_id: reservation_id.to_string(),
            })
    }

    fn balance(&mut self, user_id: UserId, currency: &str) -> &mut Balance {
        self.balances.entry((user_id, currency.to_string())).or_default()
    }

    /// Take `amount` out of a reservation's held funds
    fn take_held(&mut self, reservation_id: ReservationId, amount: Money) -> Result<(UserId, String), WalletError> {
        let reservation = self.reservation(reservation_id)?;
        reservation.held = reservation
            .held
            .checked_sub(amount)
            .map_err(|_| WalletError::InsufficientReservation {
                reservation_id: reservation_id.to_string(),
                requested: amount.to_string(),
                held: reservation.held.to_string(),
            })?;
        Ok((reservation.user_id, reservation.currency.clone()))
    }
}

impl Wallet for InMemoryWallet {
    fn reserve(&self, user_id: UserId, currency: &str, amount: Money) -> Result<ReservationId, WalletError> {
        let mut state = self.state.lock();
        let balance = state.balance(user_id, currency);
        let available = balance.available;
        balance.available =
            available
                .checked_sub(amount)
                .map_err(|_| WalletError::InsufficientBalance {
                    user_id: user_id.to_string(),
                    currency: currency.to_string(),
                    required: amount.to_string(),
                    available: available.to_string(),
                })?;
        balance.reserved = balance.reserved.checked_add(amount).map_err(unavailable)?;

        let reservation_id = ReservationId::new();
        state.reservations.insert(
            reservation_id,
            Reservation {
                user_id,
                currency: currency.to_string(),
                held: amount,
                locked: Money::zero(),
            },
        );
        debug!(%user_id, %reservation_id, %amount, "Reserved funds");
        Ok(reservation_id)
    }

    fn release(&self, reservation_id: ReservationId, amount: Money) -> Result<(), WalletError> {
        let mut state = self.state.lock();
        let (user_id, currency) = state.take_held(reservation_id, amount)?;
        let balance = state.balance(user_id, &currency);
        balance.reserved = balance.reserved.checked_sub(amount).map_err(unavailable)?;
        balance.available = balance.available.checked_add(amount).map_err(unavailable)?;
        if state.reservation(reservation_id)?.held.is_zero() {
            state.reservations.remove(&reservation_id);
            debug!(%user_id, %reservation_id, "Reservation retired");
        }
        Ok(())
    }

    fn lock_to_position(&self, reservation_id: ReservationId, amount: Money) -> Result<(), WalletError> {
        let mut state = self.state.lock();
        let (user_id, currency) = state.take_held(reservation_id, amount)?;
        let reservation = state.reservation(reservation_id)?;
        reservation.locked = reservation.locked.checked_add(amount).map_err(unavailable)?;
        let balance = state.balance(user_id, &currency);
        balance.reserved = balance.reserved.checked_sub(amount).map_err(unavailable)?;
        balance.locked = balance.locked.checked_add(amount).map_err(unavailable)?;
        Ok(())
    }

    fn unlock_from_position(&self, reservation_id: ReservationId, amount: Money) -> Result<(), WalletError> {
        let mut state = self.state.lock();
        let reservation = state.reservation(reservation_id)?;
        reservation.locked =
            reservation
                .locked
                .checked_sub(amount)
                .map_err(|_| WalletError::InsufficientReservation {
                    reservation_id: reservation_id.to_string(),
                    requested: amount.to_string(),
                    held: reservation.locked.to_string(),
                })?;
        reservation.held = reservation.held.checked_add(amount).map_err(unavailable)?;
        let (user_id, currency) = (reservation.user_id, reservation.currency.clone());
        let balance = state.balance(user_id, &currency);
        balance.locked = balance.locked.checked_sub(amount).map_err(unavailable)?;
        balance.reserved = balance.reserved.checked_add(amount).map_err(unavailable)?;
        Ok(())
    }

    fn payout(&self, instruction: &PayoutInstruction) -> Result<bool, WalletError> {
        let mut state = self.state.lock();
        if state.paid.contains(&instruction.idempotency_key) {
            return Ok(false);
        }
        let balance = state.balance(instruction.user_id, &instruction.currency);
        let locked = balance
            .locked
            .checked_sub(instruction.consumed_stake)
            .map_err(|_| WalletError::InsufficientBalance {
                user_id: instruction.user_id.to_string(),
                currency: instruction.currency.clone(),
                required: instruction.consumed_stake.to_string(),
                available: balance.locked.to_string(),
            })?;
        let available = balance
            .available
            .checked_add(instruction.amount)
            .map_err(unavailable)?;
        balance.locked = locked;
        balance.available = available;
        state.paid.insert(instruction.idempotency_key);
        debug!(
            user_id = %instruction.user_id,
            key = %instruction.idempotency_key,
            amount = %instruction.amount,
            "Paid out"
        );
        Ok(true)
    }
}

fn unavailable(err: types::errors::MoneyError) -> WalletError {
    WalletError::Unavailable {
        reason: err.to_string(),
    }
}
