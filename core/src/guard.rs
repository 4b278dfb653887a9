//! # Capability Guards
//!
//! Three small, independent guards that every mutating entry point checks
//! explicitly: who may call ([`OwnerGuard`]), whether the system accepts
//! mutations at all ([`PauseGuard`]), and whether a settlement section is
//! already in flight ([`ReentrancyGuard`]).
//!
//! Each guard is a plain struct with its own tests. Composition happens in
//! [`crate::engine`], which consults the relevant guards at the top of each
//! entry point instead of inheriting their behavior.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by the capability guards.
#[derive(Debug, Error)]
pub enum GuardError {
    /// A mutating call arrived while the global pause flag is set.
    #[error("system is paused")]
    Paused,

    /// A privileged call came from an identity other than the operator.
    #[error("caller {caller} is not the operator")]
    NotOperator {
        /// The identity that attempted the call.
        caller: Address,
    },

    /// A settlement section was entered while another one is in flight.
    #[error("reentrant call rejected")]
    ReentrantCall,
}

// ---------------------------------------------------------------------------
// OwnerGuard
// ---------------------------------------------------------------------------

/// Holds the single privileged operator identity.
///
/// The operator mints, registers projects, adjusts fees, pauses the system,
/// and mediates settlement transfers. There is exactly one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OwnerGuard {
    operator: Address,
}

impl OwnerGuard {
    /// Creates a guard bound to the given operator identity.
    pub fn new(operator: Address) -> Self {
        Self { operator }
    }

    /// Rejects callers other than the operator.
    pub fn require_operator(&self, caller: &str) -> Result<(), GuardError> {
        if caller != self.operator {
            return Err(GuardError::NotOperator {
                caller: caller.to_string(),
            });
        }
        Ok(())
    }

    /// The operator identity.
    pub fn operator(&self) -> &str {
        &self.operator
    }
}

// ---------------------------------------------------------------------------
// PauseGuard
// ---------------------------------------------------------------------------

/// Global pause flag gating every mutating operation. Queries are exempt.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PauseGuard {
    paused: bool,
}

impl PauseGuard {
    /// Creates an unpaused guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects the call while the pause flag is set.
    pub fn require_active(&self) -> Result<(), GuardError> {
        if self.paused {
            return Err(GuardError::Paused);
        }
        Ok(())
    }

    /// Sets the pause flag. Idempotent.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Clears the pause flag. Idempotent.
    pub fn unpause(&mut self) {
        self.paused = false;
    }

    /// Current state of the flag.
    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

// ---------------------------------------------------------------------------
// ReentrancyGuard
// ---------------------------------------------------------------------------

/// Mutual-exclusion flag held across a settlement section.
///
/// The engine enters the guard before moving value and exits after the last
/// mutation of the section. A nested attempt to enter while the flag is held
/// fails with [`GuardError::ReentrantCall`]. Entry points are structured so
/// the section between `enter` and `exit` cannot fail, which keeps the flag
/// from being left set on an error path.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReentrancyGuard {
    entered: bool,
}

impl ReentrancyGuard {
    /// Creates a guard in the released state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the flag, rejecting nested entry.
    pub fn enter(&mut self) -> Result<(), GuardError> {
        if self.entered {
            return Err(GuardError::ReentrantCall);
        }
        self.entered = true;
        Ok(())
    }

    /// Releases the flag.
    pub fn exit(&mut self) {
        self.entered = false;
    }

    /// Whether a settlement section is currently in flight.
    pub fn is_entered(&self) -> bool {
        self.entered
    }
}
