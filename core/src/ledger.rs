//! # Credit Ledger
//!
//! The sole source of truth for who holds how many credits, globally and per
//! originating project. Every identity carries a pair of coupled structures:
//! a fungible global balance and a map of per-project sub-balances recording
//! where those credits came from.
//!
//! ## Invariant
//!
//! For every identity, the sum of its per-project balances equals its global
//! balance. The ledger maintains this by construction: there is no unscoped
//! transfer. Minting adds to both sides, retiring removes from both, and a
//! scoped transfer moves both in lockstep. A caller who wants to move
//! credits must always say which project they are attributed to.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::ProjectId;

/// An opaque on-chain identity, rendered as a `0x`-prefixed hex string.
pub type Address = String;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by ledger mutations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Mint, transfer, and retire amounts must be positive.
    #[error("amount must be greater than zero")]
    InvalidAmount,

    /// The holder's balance attributed to this project is too small.
    #[error(
        "insufficient project balance: {address} holds {available} credits of project {project_id}, requested {requested}"
    )]
    InsufficientProjectBalance {
        /// The debited identity.
        address: Address,
        /// The project the credits are attributed to.
        project_id: ProjectId,
        /// Credits of that project currently held.
        available: u64,
        /// Credits the operation tried to move.
        requested: u64,
    },

    /// A credit operation would overflow a `u64` balance.
    #[error("balance overflow crediting {amount} to {address}")]
    BalanceOverflow {
        /// The credited identity.
        address: Address,
        /// The amount that caused the overflow.
        amount: u64,
    },
}

// ---------------------------------------------------------------------------
// Holding
// ---------------------------------------------------------------------------

/// One identity's position: the fungible total plus its project attribution.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Holding {
    /// Fungible balance, spendable in any market.
    pub balance: u64,
    /// Portion of `balance` attributed to each originating project.
    pub project_balances: HashMap<ProjectId, u64>,
}

impl Holding {
    fn project_balance(&self, project_id: ProjectId) -> u64 {
        self.project_balances.get(&project_id).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// CreditLedger
// ---------------------------------------------------------------------------

/// Global credit ledger: holdings per identity plus the circulating supply.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CreditLedger {
    holdings: HashMap<Address, Holding>,
    total_supply: u64,
}

impl CreditLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints `amount` new credits of `project_id` to `to`.
    ///
    /// Increases the recipient's global balance, their sub-balance for the
    /// project, and the circulating supply. Whether the project is active is
    /// the registry's concern and is checked by the engine before this call.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidAmount`] on a zero amount and
    /// [`LedgerError::BalanceOverflow`] if the credit would exceed `u64::MAX`.
    pub fn mint(&mut self, to: &str, amount: u64, project_id: ProjectId) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let holding = self.holdings.entry(to.to_string()).or_default();
        let new_balance =
            holding
                .balance
                .checked_add(amount)
                .ok_or_else(|| LedgerError::BalanceOverflow {
                    address: to.to_string(),
                    amount,
                })?;
        let new_supply =
            self.total_supply
                .checked_add(amount)
                .ok_or_else(|| LedgerError::BalanceOverflow {
                    address: to.to_string(),
                    amount,
                })?;

        holding.balance = new_balance;
        *holding.project_balances.entry(project_id).or_insert(0) += amount;
        self.total_supply = new_supply;
        Ok(())
    }

    /// Moves `amount` credits of `project_id` from `from` to `to`.
    ///
    /// Debits both sides of the sender's coupled position and credits both
    /// sides of the recipient's, preserving the ledger invariant. This is
    /// the only transfer primitive; authorization (holder-signed versus
    /// operator-mediated) is decided by the engine.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidAmount`] on a zero amount,
    /// [`LedgerError::InsufficientProjectBalance`] if the sender holds fewer
    /// than `amount` credits of the project, and
    /// [`LedgerError::BalanceOverflow`] if the recipient's balance would
    /// overflow.
    pub fn transfer_scoped(
        &mut self,
        from: &str,
        to: &str,
        amount: u64,
        project_id: ProjectId,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        self.ensure_project_balance(from, amount, project_id)?;

        // Validate the credit leg before touching the debit leg, so a
        // failure here leaves the sender untouched.
        let recipient_balance = self
            .holdings
            .get(to)
            .map(|h| h.balance)
            .unwrap_or(0);
        recipient_balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::BalanceOverflow {
                address: to.to_string(),
                amount,
            })?;

        self.debit(from, amount, project_id);
        let recipient = self.holdings.entry(to.to_string()).or_default();
        recipient.balance += amount;
        *recipient.project_balances.entry(project_id).or_insert(0) += amount;
        Ok(())
    }

    /// Retires (burns) `amount` credits of `project_id` held by `holder`.
    ///
    /// Removes the credits from both sides of the holder's position and from
    /// the circulating supply. A project's cumulative issuance counter is
    /// not affected; retirement is the end of a credit's life, not an undo
    /// of its issuance.
    pub fn retire(
        &mut self,
        holder: &str,
        amount: u64,
        project_id: ProjectId,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        self.ensure_project_balance(holder, amount, project_id)?;
        self.debit(holder, amount, project_id);
        self.total_supply -= amount;
        Ok(())
    }

    /// The fungible balance held by `address`.
    pub fn balance_of(&self, address: &str) -> u64 {
        self.holdings.get(address).map(|h| h.balance).unwrap_or(0)
    }

    /// The portion of `address`'s balance attributed to `project_id`.
    pub fn project_balance_of(&self, address: &str, project_id: ProjectId) -> u64 {
        self.holdings
            .get(address)
            .map(|h| h.project_balance(project_id))
            .unwrap_or(0)
    }

    /// Circulating supply: everything minted and not yet retired.
    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    /// Number of identities with a ledger entry (including emptied ones).
    pub fn holder_count(&self) -> usize {
        self.holdings.len()
    }

    /// Verifies that `address` holds at least `amount` credits of
    /// `project_id`. Settlement paths call this to prove the credit leg can
    /// move before committing the payment leg.
    pub fn ensure_project_balance(
        &self,
        address: &str,
        amount: u64,
        project_id: ProjectId,
    ) -> Result<(), LedgerError> {
        let available = self.project_balance_of(address, project_id);
        if available < amount {
            return Err(LedgerError::InsufficientProjectBalance {
                address: address.to_string(),
                project_id,
                available,
                requested: amount,
            });
        }
        Ok(())
    }

    /// Debits both sides of a pre-validated position. Callers must have
    /// checked the project balance first; the coupled invariant then
    /// guarantees the global balance covers the amount as well.
    fn debit(&mut self, address: &str, amount: u64, project_id: ProjectId) {
        if let Some(holding) = self.holdings.get_mut(address) {
            holding.balance = holding.balance.saturating_sub(amount);
            if let Some(project) = holding.project_balances.get_mut(&project_id) {
                *project = project.saturating_sub(amount);
                if *project == 0 {
                    holding.project_balances.remove(&project_id);
                }
            }
        }
    }
}
