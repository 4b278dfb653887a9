//! # Native-Coin Payout Accounts
//!
//! The payment leg of every settlement is denominated in the host chain's
//! native coin. Buyers attach coin value to a transaction; the core splits
//! it between the seller, the fee pool, and (where the operation refunds)
//! the buyer. This module tracks the resulting payout accounts: coin the
//! core owes to each identity as a consequence of settlement.
//!
//! Attached value itself is the execution environment's responsibility. The
//! core never debits these accounts during settlement; it only credits them.
//! A rejected transaction therefore never moves any payment: it simply never
//! credits anyone.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised on the payment leg.
#[derive(Debug, Error)]
pub enum CoinError {
    /// The attached value does not cover the amount the operation requires.
    #[error("insufficient payment: required {required}, provided {provided}")]
    InsufficientPayment {
        /// Coin the operation requires.
        required: u64,
        /// Coin the caller attached.
        provided: u64,
    },

    /// A payout credit would overflow a `u64` account.
    #[error("payout overflow crediting {amount} to {address}")]
    PayoutOverflow {
        /// The credited identity.
        address: Address,
        /// The amount that caused the overflow.
        amount: u64,
    },
}

// ---------------------------------------------------------------------------
// CoinLedger
// ---------------------------------------------------------------------------

/// Payout accounts per identity.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CoinLedger {
    accounts: HashMap<Address, u64>,
}

impl CoinLedger {
    /// Creates an empty payout ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifies that `provided` covers `required`.
    pub fn require_payment(provided: u64, required: u64) -> Result<(), CoinError> {
        if provided < required {
            return Err(CoinError::InsufficientPayment { required, provided });
        }
        Ok(())
    }

    /// Credits `amount` coin to `address`'s payout account.
    ///
    /// A zero credit is a no-op rather than an error; settlement math
    /// legitimately produces zero refunds.
    pub fn credit(&mut self, address: &str, amount: u64) -> Result<(), CoinError> {
        if amount == 0 {
            return Ok(());
        }
        let account = self.accounts.entry(address.to_string()).or_insert(0);
        *account = account
            .checked_add(amount)
            .ok_or_else(|| CoinError::PayoutOverflow {
                address: address.to_string(),
                amount,
            })?;
        Ok(())
    }

    /// Coin owed to `address`.
    pub fn balance_of(&self, address: &str) -> u64 {
        self.accounts.get(address).copied().unwrap_or(0)
    }

    /// Total coin owed across all accounts.
    pub fn total_outstanding(&self) -> u64 {
        self.accounts.values().sum()
    }
}
