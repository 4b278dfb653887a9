//! # Fees & Pricing
//!
//! Two small money-math components:
//!
//! - [`FeeLedger`] takes a basis-point cut of every marketplace trade and
//!   accumulates it into an operator-withdrawable pool.
//! - [`PricingControl`] sets the coin price of one credit for direct
//!   issuance purchases.
//!
//! Rates are basis points (1 bp = 0.01%), amounts are integers, division
//! floors. No floating point near money.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{BPS_DENOMINATOR, DEFAULT_CREDIT_PRICE, DEFAULT_FEE_BPS, MAX_FEE_BPS};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by fee and pricing operations.
#[derive(Debug, Error)]
pub enum FeeError {
    /// The requested fee exceeds the hard cap.
    #[error("fee of {requested} bps exceeds the cap of {max} bps")]
    FeeTooHigh {
        /// The rejected rate.
        requested: u32,
        /// The cap it broke.
        max: u32,
    },

    /// A withdrawal was attempted against an empty pool.
    #[error("no accumulated fees to withdraw")]
    NothingToWithdraw,

    /// The credit price must be positive.
    #[error("price per credit must be greater than zero")]
    InvalidPrice,

    /// The fee pool would overflow. Practically unreachable with real
    /// volumes, but the arithmetic is checked like everything else.
    #[error("fee pool overflow accruing {amount}")]
    PoolOverflow {
        /// The accrual that caused the overflow.
        amount: u64,
    },
}

// ---------------------------------------------------------------------------
// FeeLedger
// ---------------------------------------------------------------------------

/// Basis-point trade fee plus the accumulated pool.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeeLedger {
    fee_bps: u32,
    accrued: u64,
}

impl Default for FeeLedger {
    fn default() -> Self {
        Self {
            fee_bps: DEFAULT_FEE_BPS,
            accrued: 0,
        }
    }
}

impl FeeLedger {
    /// Creates a ledger at the default rate with an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// The fee for a trade of `total_cost`: `floor(total_cost * bps / 10000)`.
    ///
    /// Computed in `u128` so the product cannot overflow for any `u64` cost.
    pub fn fee_for(&self, total_cost: u64) -> u64 {
        ((total_cost as u128 * self.fee_bps as u128) / BPS_DENOMINATOR as u128) as u64
    }

    /// Updates the rate, rejecting anything above the cap.
    pub fn set_fee_bps(&mut self, bps: u32) -> Result<(), FeeError> {
        if bps > MAX_FEE_BPS {
            return Err(FeeError::FeeTooHigh {
                requested: bps,
                max: MAX_FEE_BPS,
            });
        }
        self.fee_bps = bps;
        Ok(())
    }

    /// Adds a collected fee to the pool.
    pub fn accrue(&mut self, amount: u64) -> Result<(), FeeError> {
        self.accrued = self
            .accrued
            .checked_add(amount)
            .ok_or(FeeError::PoolOverflow { amount })?;
        Ok(())
    }

    /// Empties the pool, returning the withdrawn amount.
    pub fn withdraw_all(&mut self) -> Result<u64, FeeError> {
        if self.accrued == 0 {
            return Err(FeeError::NothingToWithdraw);
        }
        Ok(std::mem::take(&mut self.accrued))
    }

    /// The current rate in basis points.
    pub fn fee_bps(&self) -> u32 {
        self.fee_bps
    }

    /// Fees collected and not yet withdrawn.
    pub fn accrued(&self) -> u64 {
        self.accrued
    }
}

// ---------------------------------------------------------------------------
// PricingControl
// ---------------------------------------------------------------------------

/// The coin price of one credit on the direct issuance path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PricingControl {
    price_per_credit: u64,
}

impl Default for PricingControl {
    fn default() -> Self {
        Self {
            price_per_credit: DEFAULT_CREDIT_PRICE,
        }
    }
}

impl PricingControl {
    /// Creates a control at the default price.
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the price. Zero is rejected; a zero price would let any
    /// payment mint unbounded credits.
    pub fn set_price(&mut self, price: u64) -> Result<(), FeeError> {
        if price == 0 {
            return Err(FeeError::InvalidPrice);
        }
        self.price_per_credit = price;
        Ok(())
    }

    /// Credits a payment buys: `floor(payment / price)`. The remainder is
    /// the caller's to refund.
    pub fn credits_for(&self, payment: u64) -> u64 {
        payment / self.price_per_credit
    }

    /// The current price per credit.
    pub fn price_per_credit(&self) -> u64 {
        self.price_per_credit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rate_takes_two_and_a_half_percent() {
        let fees = FeeLedger::new();
        assert_eq!(fees.fee_bps(), 250);
        assert_eq!(fees.fee_for(1_200), 30);
    }

    #[test]
    fn fee_floors_exactly() {
        let fees = FeeLedger::new();
        // 2.5% of 1234 is 30.85; the fee floors to 30.
        assert_eq!(fees.fee_for(1_234), 30);
        assert_eq!(fees.fee_for(39), 0);
        assert_eq!(fees.fee_for(40), 1);
    }

    #[test]
    fn fee_and_seller_amount_partition_the_cost() {
        let fees = FeeLedger::new();
        for total in [1, 39, 40, 1_200, 99_999, u64::MAX] {
            let fee = fees.fee_for(total);
            assert!(fee <= total);
            assert_eq!((total - fee) + fee, total);
        }
    }

    #[test]
    fn rate_above_cap_rejected() {
        let mut fees = FeeLedger::new();
        let err = fees.set_fee_bps(1_001).unwrap_err();
        assert!(matches!(
            err,
            FeeError::FeeTooHigh {
                requested: 1_001,
                max: 1_000,
            }
        ));
        assert_eq!(fees.fee_bps(), 250);
    }

    #[test]
    fn rate_at_cap_accepted() {
        let mut fees = FeeLedger::new();
        fees.set_fee_bps(1_000).unwrap();
        assert_eq!(fees.fee_for(10_000), 1_000);
    }

    #[test]
    fn zero_rate_accepted() {
        let mut fees = FeeLedger::new();
        fees.set_fee_bps(0).unwrap();
        assert_eq!(fees.fee_for(1_000_000), 0);
    }

    #[test]
    fn accrue_then_withdraw_empties_the_pool() {
        let mut fees = FeeLedger::new();
        fees.accrue(30).unwrap();
        fees.accrue(12).unwrap();
        assert_eq!(fees.accrued(), 42);

        assert_eq!(fees.withdraw_all().unwrap(), 42);
        assert_eq!(fees.accrued(), 0);
    }

    #[test]
    fn empty_withdrawal_rejected() {
        let mut fees = FeeLedger::new();
        assert!(matches!(
            fees.withdraw_all(),
            Err(FeeError::NothingToWithdraw)
        ));
    }

    #[test]
    fn default_price_is_three_hundred() {
        let pricing = PricingControl::new();
        assert_eq!(pricing.price_per_credit(), 300);
        assert_eq!(pricing.credits_for(900), 3);
    }

    #[test]
    fn credits_floor_and_leave_a_remainder() {
        let pricing = PricingControl::new();
        assert_eq!(pricing.credits_for(899), 2);
        assert_eq!(pricing.credits_for(299), 0);
    }

    #[test]
    fn zero_price_rejected() {
        let mut pricing = PricingControl::new();
        assert!(matches!(pricing.set_price(0), Err(FeeError::InvalidPrice)));
        assert_eq!(pricing.price_per_credit(), 300);
    }
}
