//! # Domain Events
//!
//! One tagged enum with exactly one variant per state change. The off-chain
//! indexer consumes these from the audit chain; each variant carries enough
//! fields to reconstruct the state transition without querying the core
//! again, which is why [`DomainEvent::Minted`] repeats the project name and
//! [`DomainEvent::TenderAwarded`] carries the full settlement split.
//!
//! The enum serializes internally tagged (`"type": "Minted"`, ...) so the
//! indexer contract is a stable set of variant names rather than positional
//! tuples.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::Address;
use crate::market::listing::ListingId;
use crate::market::tender::{ProposalId, TenderId};
use crate::registry::ProjectId;

/// Every observable state change in the settlement core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    /// A project entered the catalog.
    ProjectRegistered {
        project_id: ProjectId,
        name: String,
        owner: Address,
        estimated_credits: u64,
    },
    /// A project was switched off for further issuance.
    ProjectDeactivated { project_id: ProjectId },
    /// New credits entered circulation.
    Minted {
        to: Address,
        amount: u64,
        project_id: ProjectId,
        project_name: String,
    },
    /// Credits moved between holders, with project attribution.
    Transferred {
        from: Address,
        to: Address,
        amount: u64,
        project_id: ProjectId,
    },
    /// Credits left circulation for good.
    Retired {
        holder: Address,
        amount: u64,
        project_id: ProjectId,
    },
    /// A corporate opened a request for credits.
    TenderCreated {
        tender_id: TenderId,
        requester: Address,
        credits_required: u64,
        max_price_per_credit: u64,
        deadline: DateTime<Utc>,
    },
    /// A seller answered an open tender.
    ProposalSubmitted {
        proposal_id: ProposalId,
        tender_id: TenderId,
        proposer: Address,
        credits_offered: u64,
        price_per_credit: u64,
        project_id: ProjectId,
    },
    /// A tender settled: credits against payment, atomically.
    TenderAwarded {
        tender_id: TenderId,
        proposal_id: ProposalId,
        requester: Address,
        proposer: Address,
        credits: u64,
        total_cost: u64,
        fee: u64,
    },
    /// A tender was withdrawn; all its proposals were rejected.
    TenderCancelled { tender_id: TenderId },
    /// A seller put a fixed-price offer on the board.
    ListingCreated {
        listing_id: ListingId,
        seller: Address,
        project_id: ProjectId,
        amount: u64,
        price_per_credit: u64,
    },
    /// A listing (partially) filled.
    Traded {
        seller: Address,
        buyer: Address,
        amount: u64,
        total_price: u64,
        project_id: ProjectId,
    },
    /// Attached payment converted into freshly minted credits.
    DirectPurchase {
        buyer: Address,
        project_id: ProjectId,
        credits: u64,
        cost: u64,
    },
    /// The trade fee changed.
    FeeUpdated { new_bps: u32 },
    /// The direct-issuance credit price changed.
    PriceUpdated { new_price: u64 },
    /// The accumulated fee pool was paid out to the operator.
    FeesWithdrawn { to: Address, amount: u64 },
    /// The global pause flag changed.
    PauseSet { paused: bool },
}
