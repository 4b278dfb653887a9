//! # Protocol Constants
//!
//! Every tunable number in the settlement core lives here. If you are
//! hardcoding a constant somewhere else, move it.

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

/// Default trade fee in basis points (1 bp = 0.01%). 250 bps = 2.5%,
/// applied to every tender award and listing purchase.
pub const DEFAULT_FEE_BPS: u32 = 250;

/// Hard ceiling on the trade fee. The operator can tune the fee at runtime
/// but can never push it past 10%.
pub const MAX_FEE_BPS: u32 = 1_000;

/// Basis-point denominator. 10_000 bps = 100%.
pub const BPS_DENOMINATOR: u64 = 10_000;

// ---------------------------------------------------------------------------
// Pricing
// ---------------------------------------------------------------------------

/// Default price per credit, in coin units, for direct issuance purchases.
pub const DEFAULT_CREDIT_PRICE: u64 = 300;

// ---------------------------------------------------------------------------
// Validation Limits
// ---------------------------------------------------------------------------

/// Maximum length of project names and tender titles, in bytes.
pub const MAX_TITLE_LEN: usize = 255;

// ---------------------------------------------------------------------------
// Receipt Metering
// ---------------------------------------------------------------------------

/// Flat cost charged to every applied transaction in receipt metering.
/// The metering is synthetic: receipts need a stable, deterministic
/// `gas_used` figure for the off-chain audit trail, not a real VM cost.
pub const RECEIPT_BASE_GAS: u64 = 21_000;

/// Additional metered cost per domain event carried by a transaction.
pub const RECEIPT_EVENT_GAS: u64 = 8_000;

// ---------------------------------------------------------------------------
// Audit Chain
// ---------------------------------------------------------------------------

/// Previous-hash sentinel carried by the genesis block. The genesis block
/// has no parent, so it links to this literal instead of a digest.
pub const GENESIS_PREVIOUS_HASH: &str = "GENESIS";
