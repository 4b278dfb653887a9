//! # Canopy Core
//!
//! The settlement core of the Canopy carbon-credit registry. Everything that
//! touches a balance lives here: issuance of project-tagged credits, the
//! coupled global/per-project ledger, the tender and listing marketplaces,
//! and the fee accounting that rides on every trade.
//!
//! The crate assumes the execution model of a replicated deterministic state
//! machine: one transaction at a time, each public entry point applied in
//! full or not at all. Identity, key custody, networking, and durable storage
//! are the host's problem; this crate is the part that has to keep the books
//! straight.
//!
//! ## Architecture
//!
//! ```text
//! guard.rs     - operator / pause / reentrancy capability guards
//! ledger.rs    - credit ledger: global balance + per-project sub-balances
//! coin.rs      - native-coin payout accounts for the payment leg
//! registry.rs  - project catalog: sequential ids, issuance counters
//! market/      - tender and listing marketplaces
//! fees.rs      - basis-point trade fee and direct-issuance pricing
//! events.rs    - one typed event variant per state change
//! chain.rs     - hash-linked audit log and transaction receipts
//! engine.rs    - the public entry points, composed from all of the above
//! config.rs    - protocol constants
//! ```
//!
//! ## Design Principles
//!
//! 1. All amounts are `u64` in whole credits or coin units. No floating
//!    point anywhere near money.
//! 2. Checked arithmetic on every balance mutation. Wrapping and money do
//!    not mix.
//! 3. State transitions are explicit enum variants, not boolean flags.
//! 4. Every entry point validates completely before it mutates anything, so
//!    a rejected transaction leaves no trace.
//! 5. Every state change has exactly one corresponding [`DomainEvent`]
//!    variant, and every applied transaction one audit block.
//!
//! [`DomainEvent`]: events::DomainEvent

pub mod chain;
pub mod coin;
pub mod config;
pub mod engine;
pub mod events;
pub mod fees;
pub mod guard;
pub mod ledger;
pub mod market;
pub mod registry;

pub use chain::{AuditChain, Block, ChainError, TxReceipt};
pub use coin::{CoinError, CoinLedger};
pub use engine::{EngineError, SettlementEngine};
pub use events::DomainEvent;
pub use fees::{FeeError, FeeLedger, PricingControl};
pub use guard::{GuardError, OwnerGuard, PauseGuard, ReentrancyGuard};
pub use ledger::{Address, CreditLedger, LedgerError};
pub use market::listing::{Listing, ListingBook, ListingError, ListingId};
pub use market::tender::{
    Proposal, ProposalId, ProposalStatus, Tender, TenderError, TenderId, TenderMarket, TenderStatus,
};
pub use registry::{Project, ProjectId, ProjectRegistry, RegistryError};
