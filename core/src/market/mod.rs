//! # Marketplace Module
//!
//! The two ways credits change hands for payment:
//!
//! ```text
//! tender.rs   - buyer-initiated: a corporate requests credits, sellers
//!               compete with proposals, one proposal wins at award time
//! listing.rs  - seller-initiated: a fixed-price standing offer that buyers
//!               fill in parts until it is exhausted
//! ```
//!
//! Both books are pure state machines over append-only tables. They validate
//! their own lifecycle rules but never touch a balance: the engine owns the
//! settlement, asking a book to validate, then moving value, then asking the
//! book to commit the transition. That split is what lets an award or a
//! purchase fail after validation without leaving a half-settled order
//! behind.

pub mod listing;
pub mod tender;

pub use listing::{Listing, ListingBook, ListingError, ListingId, ListingQuote};
pub use tender::{
    Proposal, ProposalId, ProposalStatus, Tender, TenderError, TenderId, TenderMarket, TenderStatus,
};
