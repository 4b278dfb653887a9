//! # Tender Market
//!
//! Corporate-initiated requests for credits. The lifecycle is:
//!
//! 1. **Create**: a requester opens a tender naming how many credits they
//!    need, the most they will pay per credit, and a deadline.
//! 2. **Propose**: credit holders answer with proposals while the tender
//!    is open and before the deadline.
//! 3. **Award**: the requester picks one proposal; the winning proposal is
//!    accepted, every sibling is rejected, and the tender closes.
//! 4. **Cancel**: the requester withdraws; all proposals are rejected.
//!
//! `Open` is the only state from which anything can happen. `Awarded` and
//! `Cancelled` are terminal.
//!
//! Award is split into a validate half and a commit half so the engine can
//! run the settlement legs in between: validation proves the transition is
//! legal without mutating, commit applies it after value has moved.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::MAX_TITLE_LEN;
use crate::ledger::Address;
use crate::registry::ProjectId;

/// Sequential tender identifier, starting at 1.
pub type TenderId = u64;
/// Sequential proposal identifier, starting at 1, global across tenders.
pub type ProposalId = u64;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by tender-market operations.
#[derive(Debug, Error)]
pub enum TenderError {
    /// The referenced tender id has never been assigned.
    #[error("tender {0} not found")]
    TenderNotFound(TenderId),

    /// The referenced proposal id has never been assigned.
    #[error("proposal {0} not found")]
    ProposalNotFound(ProposalId),

    /// The tender has left the `Open` state.
    #[error("tender {tender_id} is {status}, not Open")]
    TenderNotOpen {
        /// The tender in question.
        tender_id: TenderId,
        /// Its current status.
        status: TenderStatus,
    },

    /// The tender's deadline has passed.
    #[error("tender {tender_id} expired at {deadline}")]
    TenderExpired {
        tender_id: TenderId,
        deadline: DateTime<Utc>,
    },

    /// The proposal has already been accepted or rejected.
    #[error("proposal {0} is not pending")]
    ProposalNotPending(ProposalId),

    /// The proposal belongs to a different tender.
    #[error("proposal {proposal_id} does not answer tender {tender_id}")]
    ProposalTenderMismatch {
        proposal_id: ProposalId,
        tender_id: TenderId,
    },

    /// Only the tender's requester may award or cancel it.
    #[error("caller {caller} is not the requester of tender {tender_id}")]
    NotRequester {
        caller: Address,
        tender_id: TenderId,
    },

    /// Titles must be non-empty and within the length cap.
    #[error("invalid tender title")]
    InvalidTitle,

    /// Credit counts, prices, and durations must be positive.
    #[error("{field} must be greater than zero")]
    ZeroValue {
        /// Which argument was zero.
        field: &'static str,
    },

    /// The proposal offers fewer credits than the tender requires.
    #[error("offered {offered} credits, tender requires at least {required}")]
    OfferBelowRequirement { offered: u64, required: u64 },

    /// The proposal's price exceeds the tender's ceiling.
    #[error("price {price} per credit exceeds ceiling {ceiling}")]
    PriceAboveCeiling { price: u64, ceiling: u64 },

    /// `credits_offered * price_per_credit` does not fit in a `u64`.
    #[error("settlement cost overflows for proposal {0}")]
    CostOverflow(ProposalId),
}

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

/// Lifecycle status of a tender. `Awarded` and `Cancelled` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenderStatus {
    /// Accepting proposals, awardable, cancellable.
    Open,
    /// Settled against exactly one accepted proposal.
    Awarded,
    /// Withdrawn by the requester.
    Cancelled,
}

impl std::fmt::Display for TenderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TenderStatus::Open => write!(f, "Open"),
            TenderStatus::Awarded => write!(f, "Awarded"),
            TenderStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Lifecycle status of a proposal. At most one proposal per tender ends
/// `Accepted`; the rest end `Rejected`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    /// Awaiting the requester's decision.
    Pending,
    /// Chosen at award time.
    Accepted,
    /// Passed over at award time, or orphaned by cancellation.
    Rejected,
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProposalStatus::Pending => write!(f, "Pending"),
            ProposalStatus::Accepted => write!(f, "Accepted"),
            ProposalStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A corporate request for credits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tender {
    /// Sequential id, assigned at creation.
    pub id: TenderId,
    /// The identity that opened the tender and will pay for the credits.
    pub requester: Address,
    /// Short human-readable title.
    pub title: String,
    /// Free-form description of what the requester is looking for.
    pub description: String,
    /// Minimum credits a proposal must offer.
    pub credits_required: u64,
    /// Ceiling price per credit a proposal may ask.
    pub max_price_per_credit: u64,
    /// Proposals are accepted strictly before this instant.
    pub deadline: DateTime<Utc>,
    /// Current lifecycle state.
    pub status: TenderStatus,
    /// The accepted proposal, once awarded.
    pub winning_proposal: Option<ProposalId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A seller's answer to an open tender.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Proposal {
    /// Sequential id, global across all tenders.
    pub id: ProposalId,
    /// The tender this proposal answers.
    pub tender_id: TenderId,
    /// The identity offering the credits.
    pub proposer: Address,
    /// Credits on offer. At least the tender's requirement.
    pub credits_offered: u64,
    /// Asking price per credit. At most the tender's ceiling.
    pub price_per_credit: u64,
    /// The project the offered credits are attributed to.
    pub project_id: ProjectId,
    /// Free-form pitch.
    pub description: String,
    /// Current lifecycle state.
    pub status: ProposalStatus,
    /// Submission timestamp.
    pub created_at: DateTime<Utc>,
}

impl Proposal {
    /// Total settlement cost of this proposal: credits times price.
    pub fn total_cost(&self) -> Result<u64, TenderError> {
        self.credits_offered
            .checked_mul(self.price_per_credit)
            .ok_or(TenderError::CostOverflow(self.id))
    }
}

// ---------------------------------------------------------------------------
// TenderMarket
// ---------------------------------------------------------------------------

/// Append-only tender and proposal tables with discovery indexes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TenderMarket {
    tenders: BTreeMap<TenderId, Tender>,
    proposals: BTreeMap<ProposalId, Proposal>,
    proposals_by_tender: HashMap<TenderId, Vec<ProposalId>>,
    proposals_by_proposer: HashMap<Address, Vec<ProposalId>>,
    next_tender_id: TenderId,
    next_proposal_id: ProposalId,
}

impl TenderMarket {
    /// Creates an empty market. Ids start at 1.
    pub fn new() -> Self {
        Self {
            tenders: BTreeMap::new(),
            proposals: BTreeMap::new(),
            proposals_by_tender: HashMap::new(),
            proposals_by_proposer: HashMap::new(),
            next_tender_id: 1,
            next_proposal_id: 1,
        }
    }

    /// Opens a new tender. The deadline is `now + duration_days` days.
    ///
    /// # Errors
    ///
    /// Rejects an empty or oversized title and zero credits, price, or
    /// duration.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &mut self,
        requester: &str,
        title: &str,
        description: &str,
        credits_required: u64,
        max_price_per_credit: u64,
        duration_days: u64,
        now: DateTime<Utc>,
    ) -> Result<TenderId, TenderError> {
        let title = title.trim();
        if title.is_empty() || title.len() > MAX_TITLE_LEN {
            return Err(TenderError::InvalidTitle);
        }
        if credits_required == 0 {
            return Err(TenderError::ZeroValue {
                field: "credits_required",
            });
        }
        if max_price_per_credit == 0 {
            return Err(TenderError::ZeroValue {
                field: "max_price_per_credit",
            });
        }
        if duration_days == 0 {
            return Err(TenderError::ZeroValue {
                field: "duration_days",
            });
        }

        let id = self.next_tender_id;
        self.next_tender_id += 1;
        self.tenders.insert(
            id,
            Tender {
                id,
                requester: requester.to_string(),
                title: title.to_string(),
                description: description.to_string(),
                credits_required,
                max_price_per_credit,
                deadline: now + Duration::days(duration_days as i64),
                status: TenderStatus::Open,
                winning_proposal: None,
                created_at: now,
            },
        );
        Ok(id)
    }

    /// Submits a proposal against an open, unexpired tender.
    ///
    /// The proposer's credit balance is not this book's concern; the engine
    /// checks it against the ledger before calling here.
    #[allow(clippy::too_many_arguments)]
    pub fn submit(
        &mut self,
        tender_id: TenderId,
        proposer: &str,
        credits_offered: u64,
        price_per_credit: u64,
        project_id: ProjectId,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<ProposalId, TenderError> {
        let tender = self
            .tenders
            .get(&tender_id)
            .ok_or(TenderError::TenderNotFound(tender_id))?;
        if tender.status != TenderStatus::Open {
            return Err(TenderError::TenderNotOpen {
                tender_id,
                status: tender.status,
            });
        }
        if now >= tender.deadline {
            return Err(TenderError::TenderExpired {
                tender_id,
                deadline: tender.deadline,
            });
        }
        if credits_offered < tender.credits_required {
            return Err(TenderError::OfferBelowRequirement {
                offered: credits_offered,
                required: tender.credits_required,
            });
        }
        if price_per_credit == 0 {
            return Err(TenderError::ZeroValue {
                field: "price_per_credit",
            });
        }
        if price_per_credit > tender.max_price_per_credit {
            return Err(TenderError::PriceAboveCeiling {
                price: price_per_credit,
                ceiling: tender.max_price_per_credit,
            });
        }

        let id = self.next_proposal_id;
        self.next_proposal_id += 1;
        self.proposals.insert(
            id,
            Proposal {
                id,
                tender_id,
                proposer: proposer.to_string(),
                credits_offered,
                price_per_credit,
                project_id,
                description: description.to_string(),
                status: ProposalStatus::Pending,
                created_at: now,
            },
        );
        self.proposals_by_tender
            .entry(tender_id)
            .or_default()
            .push(id);
        self.proposals_by_proposer
            .entry(proposer.to_string())
            .or_default()
            .push(id);
        Ok(id)
    }

    /// Proves that awarding `proposal_id` on `tender_id` by `caller` is a
    /// legal transition, without mutating anything. Returns the proposal the
    /// engine should settle against.
    pub fn validate_award(
        &self,
        tender_id: TenderId,
        proposal_id: ProposalId,
        caller: &str,
    ) -> Result<&Proposal, TenderError> {
        let tender = self
            .tenders
            .get(&tender_id)
            .ok_or(TenderError::TenderNotFound(tender_id))?;
        if caller != tender.requester {
            return Err(TenderError::NotRequester {
                caller: caller.to_string(),
                tender_id,
            });
        }
        if tender.status != TenderStatus::Open {
            return Err(TenderError::TenderNotOpen {
                tender_id,
                status: tender.status,
            });
        }
        let proposal = self
            .proposals
            .get(&proposal_id)
            .ok_or(TenderError::ProposalNotFound(proposal_id))?;
        if proposal.tender_id != tender_id {
            return Err(TenderError::ProposalTenderMismatch {
                proposal_id,
                tender_id,
            });
        }
        if proposal.status != ProposalStatus::Pending {
            return Err(TenderError::ProposalNotPending(proposal_id));
        }
        Ok(proposal)
    }

    /// Applies a validated award: the tender closes on the winning proposal
    /// and every sibling proposal is rejected. Call only after
    /// [`validate_award`](Self::validate_award) on the same ids succeeded
    /// within the same transaction.
    pub fn commit_award(
        &mut self,
        tender_id: TenderId,
        proposal_id: ProposalId,
    ) -> Result<(), TenderError> {
        let tender = self
            .tenders
            .get_mut(&tender_id)
            .ok_or(TenderError::TenderNotFound(tender_id))?;
        tender.status = TenderStatus::Awarded;
        tender.winning_proposal = Some(proposal_id);

        for id in self
            .proposals_by_tender
            .get(&tender_id)
            .cloned()
            .unwrap_or_default()
        {
            let proposal = self
                .proposals
                .get_mut(&id)
                .ok_or(TenderError::ProposalNotFound(id))?;
            proposal.status = if id == proposal_id {
                ProposalStatus::Accepted
            } else {
                ProposalStatus::Rejected
            };
        }
        Ok(())
    }

    /// Cancels an open tender; every proposal against it is rejected.
    pub fn cancel(&mut self, tender_id: TenderId, caller: &str) -> Result<(), TenderError> {
        let tender = self
            .tenders
            .get_mut(&tender_id)
            .ok_or(TenderError::TenderNotFound(tender_id))?;
        if caller != tender.requester {
            return Err(TenderError::NotRequester {
                caller: caller.to_string(),
                tender_id,
            });
        }
        if tender.status != TenderStatus::Open {
            return Err(TenderError::TenderNotOpen {
                tender_id,
                status: tender.status,
            });
        }
        tender.status = TenderStatus::Cancelled;

        for id in self
            .proposals_by_tender
            .get(&tender_id)
            .cloned()
            .unwrap_or_default()
        {
            if let Some(proposal) = self.proposals.get_mut(&id) {
                proposal.status = ProposalStatus::Rejected;
            }
        }
        Ok(())
    }

    /// Looks up a tender by id.
    pub fn tender(&self, id: TenderId) -> Option<&Tender> {
        self.tenders.get(&id)
    }

    /// Looks up a proposal by id.
    pub fn proposal(&self, id: ProposalId) -> Option<&Proposal> {
        self.proposals.get(&id)
    }

    /// Ids of every proposal answering `tender_id`, in submission order.
    pub fn proposals_for(&self, tender_id: TenderId) -> &[ProposalId] {
        self.proposals_by_tender
            .get(&tender_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Ids of every proposal submitted by `proposer`.
    pub fn proposals_of(&self, proposer: &str) -> &[ProposalId] {
        self.proposals_by_proposer
            .get(proposer)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of tenders ever created.
    pub fn tender_count(&self) -> usize {
        self.tenders.len()
    }
}
