//! # Settlement Engine
//!
//! The public surface of the settlement core. The engine owns every
//! component and exposes the entry points the host applies one at a time:
//! registration, minting, scoped transfers, the tender and listing
//! lifecycles, fee control, and pause control.
//!
//! ## Transaction discipline
//!
//! Each entry point follows the same shape:
//!
//! 1. consult the guards (pause, operator where privileged),
//! 2. validate everything against current state without mutating,
//! 3. commit the mutations, none of which can fail after step 2,
//! 4. append one audit block carrying the transaction's events and return
//!    its receipt.
//!
//! A rejected transaction therefore leaves no trace: no balance moved, no
//! status flipped, no event emitted. Settlement sections that move value
//! additionally hold the reentrancy flag across the commit.
//!
//! The engine samples the clock once per entry point and threads that
//! instant through every component, so a transaction is a pure function of
//! (state, inputs, timestamp).

use chrono::Utc;
use thiserror::Error;

use crate::chain::{AuditChain, Block, TxReceipt};
use crate::coin::{CoinError, CoinLedger};
use crate::events::DomainEvent;
use crate::fees::{FeeError, FeeLedger, PricingControl};
use crate::guard::{GuardError, OwnerGuard, PauseGuard, ReentrancyGuard};
use crate::ledger::{Address, CreditLedger, LedgerError};
use crate::market::listing::{Listing, ListingBook, ListingError, ListingId};
use crate::market::tender::{Proposal, ProposalId, Tender, TenderError, TenderId, TenderMarket};
use crate::registry::{Project, ProjectId, ProjectRegistry, RegistryError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Any rejection an entry point can produce. Each component keeps its own
/// error type; the engine only aggregates them.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Guard(#[from] GuardError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Coin(#[from] CoinError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Tender(#[from] TenderError),
    #[error(transparent)]
    Listing(#[from] ListingError),
    #[error(transparent)]
    Fee(#[from] FeeError),
}

fn overflow_guard(current: u64, amount: u64, address: &str) -> Result<(), CoinError> {
    current
        .checked_add(amount)
        .map(|_| ())
        .ok_or_else(|| CoinError::PayoutOverflow {
            address: address.to_string(),
            amount,
        })
}

// ---------------------------------------------------------------------------
// SettlementEngine
// ---------------------------------------------------------------------------

/// The deterministic state machine behind the registry and marketplace.
#[derive(Clone, Debug)]
pub struct SettlementEngine {
    owner: OwnerGuard,
    pause: PauseGuard,
    reentrancy: ReentrancyGuard,
    ledger: CreditLedger,
    coins: CoinLedger,
    registry: ProjectRegistry,
    tenders: TenderMarket,
    listings: ListingBook,
    fees: FeeLedger,
    pricing: PricingControl,
    chain: AuditChain,
}

impl SettlementEngine {
    /// Creates an engine with `operator` as the single privileged identity,
    /// default fee and pricing, and a fresh audit chain.
    pub fn new(operator: Address) -> Self {
        Self {
            owner: OwnerGuard::new(operator),
            pause: PauseGuard::new(),
            reentrancy: ReentrancyGuard::new(),
            ledger: CreditLedger::new(),
            coins: CoinLedger::new(),
            registry: ProjectRegistry::new(),
            tenders: TenderMarket::new(),
            listings: ListingBook::new(),
            fees: FeeLedger::new(),
            pricing: PricingControl::new(),
            chain: AuditChain::new(Utc::now()),
        }
    }

    // -----------------------------------------------------------------------
    // Projects
    // -----------------------------------------------------------------------

    /// Registers a project on behalf of `project_owner`. Operator-only.
    pub fn register_project(
        &mut self,
        caller: &str,
        name: &str,
        project_owner: &str,
        estimated_credits: u64,
    ) -> Result<(ProjectId, TxReceipt), EngineError> {
        self.pause.require_active()?;
        self.owner.require_operator(caller)?;
        let now = Utc::now();

        let project_id = self
            .registry
            .register(name, project_owner, estimated_credits, now)?;

        tracing::info!(project_id, owner = project_owner, "project registered");
        let receipt = self.chain.append(
            "register_project",
            vec![DomainEvent::ProjectRegistered {
                project_id,
                name: name.trim().to_string(),
                owner: project_owner.to_string(),
                estimated_credits,
            }],
            now,
        );
        Ok((project_id, receipt))
    }

    /// Switches a project off for further issuance. Operator-only, one-way.
    pub fn deactivate_project(
        &mut self,
        caller: &str,
        project_id: ProjectId,
    ) -> Result<TxReceipt, EngineError> {
        self.pause.require_active()?;
        self.owner.require_operator(caller)?;
        let now = Utc::now();

        self.registry.deactivate(project_id)?;

        tracing::info!(project_id, "project deactivated");
        Ok(self.chain.append(
            "deactivate_project",
            vec![DomainEvent::ProjectDeactivated { project_id }],
            now,
        ))
    }

    // -----------------------------------------------------------------------
    // Ledger
    // -----------------------------------------------------------------------

    /// Mints `amount` credits of `project_id` to `to`. Operator-only;
    /// requires an active project.
    pub fn mint(
        &mut self,
        caller: &str,
        to: &str,
        amount: u64,
        project_id: ProjectId,
    ) -> Result<TxReceipt, EngineError> {
        self.pause.require_active()?;
        self.owner.require_operator(caller)?;
        let now = Utc::now();

        if amount == 0 {
            return Err(LedgerError::InvalidAmount.into());
        }
        let project = self.registry.require_active(project_id)?;
        let project_name = project.name.clone();
        project
            .total_issued
            .checked_add(amount)
            .ok_or(RegistryError::IssuanceOverflow(project_id))?;

        self.ledger.mint(to, amount, project_id)?;
        self.registry.record_issuance(project_id, amount)?;

        tracing::info!(to, amount, project_id, "credits minted");
        Ok(self.chain.append(
            "mint",
            vec![DomainEvent::Minted {
                to: to.to_string(),
                amount,
                project_id,
                project_name,
            }],
            now,
        ))
    }

    /// Moves the caller's own credits, with project attribution.
    pub fn transfer_scoped(
        &mut self,
        caller: &str,
        to: &str,
        amount: u64,
        project_id: ProjectId,
    ) -> Result<TxReceipt, EngineError> {
        self.pause.require_active()?;
        let now = Utc::now();

        self.ledger.transfer_scoped(caller, to, amount, project_id)?;

        tracing::info!(from = caller, to, amount, project_id, "credits transferred");
        Ok(self.chain.append(
            "transfer",
            vec![DomainEvent::Transferred {
                from: caller.to_string(),
                to: to.to_string(),
                amount,
                project_id,
            }],
            now,
        ))
    }

    /// Moves credits on behalf of any holder. Operator-only; this is the
    /// primitive the settlement paths are built on, exposed for the host's
    /// operator-mediated transfers.
    pub fn transfer_scoped_as_operator(
        &mut self,
        caller: &str,
        from: &str,
        to: &str,
        amount: u64,
        project_id: ProjectId,
    ) -> Result<TxReceipt, EngineError> {
        self.pause.require_active()?;
        self.owner.require_operator(caller)?;
        let now = Utc::now();

        self.ledger.transfer_scoped(from, to, amount, project_id)?;

        tracing::info!(from, to, amount, project_id, "operator transfer");
        Ok(self.chain.append(
            "operator_transfer",
            vec![DomainEvent::Transferred {
                from: from.to_string(),
                to: to.to_string(),
                amount,
                project_id,
            }],
            now,
        ))
    }

    /// Retires the caller's own credits, removing them from circulation.
    pub fn retire(
        &mut self,
        caller: &str,
        amount: u64,
        project_id: ProjectId,
    ) -> Result<TxReceipt, EngineError> {
        self.pause.require_active()?;
        let now = Utc::now();

        self.ledger.retire(caller, amount, project_id)?;

        tracing::info!(holder = caller, amount, project_id, "credits retired");
        Ok(self.chain.append(
            "retire",
            vec![DomainEvent::Retired {
                holder: caller.to_string(),
                amount,
                project_id,
            }],
            now,
        ))
    }

    // -----------------------------------------------------------------------
    // Tenders
    // -----------------------------------------------------------------------

    /// Opens a tender in the caller's name.
    pub fn create_tender(
        &mut self,
        caller: &str,
        title: &str,
        description: &str,
        credits_required: u64,
        max_price_per_credit: u64,
        duration_days: u64,
    ) -> Result<(TenderId, TxReceipt), EngineError> {
        self.pause.require_active()?;
        let now = Utc::now();

        let tender_id = self.tenders.create(
            caller,
            title,
            description,
            credits_required,
            max_price_per_credit,
            duration_days,
            now,
        )?;
        // The deadline the market computed, for the event.
        let deadline = self
            .tenders
            .tender(tender_id)
            .map(|t| t.deadline)
            .unwrap_or(now);

        tracing::info!(tender_id, requester = caller, credits_required, "tender created");
        let receipt = self.chain.append(
            "create_tender",
            vec![DomainEvent::TenderCreated {
                tender_id,
                requester: caller.to_string(),
                credits_required,
                max_price_per_credit,
                deadline,
            }],
            now,
        );
        Ok((tender_id, receipt))
    }

    /// Submits a proposal in the caller's name against an open tender.
    ///
    /// The caller must hold at least the offered credits of the named
    /// project right now. This is a point-in-time check: the balance can
    /// move before award, and award re-validates.
    pub fn submit_proposal(
        &mut self,
        caller: &str,
        tender_id: TenderId,
        credits_offered: u64,
        price_per_credit: u64,
        project_id: ProjectId,
        description: &str,
    ) -> Result<(ProposalId, TxReceipt), EngineError> {
        self.pause.require_active()?;
        let now = Utc::now();

        self.ledger
            .ensure_project_balance(caller, credits_offered, project_id)?;
        let proposal_id = self.tenders.submit(
            tender_id,
            caller,
            credits_offered,
            price_per_credit,
            project_id,
            description,
            now,
        )?;

        tracing::info!(proposal_id, tender_id, proposer = caller, "proposal submitted");
        let receipt = self.chain.append(
            "submit_proposal",
            vec![DomainEvent::ProposalSubmitted {
                proposal_id,
                tender_id,
                proposer: caller.to_string(),
                credits_offered,
                price_per_credit,
                project_id,
            }],
            now,
        );
        Ok((proposal_id, receipt))
    }

    /// Settles a tender against one of its proposals, atomically.
    ///
    /// `payment` is the coin value the caller attached; it must cover the
    /// proposal's full cost. The proposer receives the cost minus the fee,
    /// everything else attached stays in the fee pool, and the offered
    /// credits move from proposer to caller in the same transaction. If any
    /// leg cannot settle, nothing moves and the tender stays open.
    pub fn award_tender(
        &mut self,
        caller: &str,
        tender_id: TenderId,
        proposal_id: ProposalId,
        payment: u64,
    ) -> Result<TxReceipt, EngineError> {
        self.pause.require_active()?;
        let now = Utc::now();

        // Validate the whole settlement before moving anything.
        let (proposer, credits, project_id, total_cost) = {
            let proposal = self.tenders.validate_award(tender_id, proposal_id, caller)?;
            (
                proposal.proposer.clone(),
                proposal.credits_offered,
                proposal.project_id,
                proposal.total_cost()?,
            )
        };
        let fee = self.fees.fee_for(total_cost);
        let seller_amount = total_cost - fee;

        CoinLedger::require_payment(payment, total_cost)?;
        // Attached value beyond the seller's share stays in the fee pool.
        let fee_accrual = payment - seller_amount;

        self.ledger
            .ensure_project_balance(&proposer, credits, project_id)?;
        overflow_guard(self.coins.balance_of(&proposer), seller_amount, &proposer)?;
        self.fees
            .accrued()
            .checked_add(fee_accrual)
            .ok_or(FeeError::PoolOverflow { amount: fee_accrual })?;
        self.ledger
            .balance_of(caller)
            .checked_add(credits)
            .ok_or_else(|| LedgerError::BalanceOverflow {
                address: caller.to_string(),
                amount: credits,
            })?;

        // Commit. Nothing below can fail against the state validated above.
        self.reentrancy.enter()?;
        self.coins.credit(&proposer, seller_amount)?;
        self.fees.accrue(fee_accrual)?;
        self.ledger
            .transfer_scoped(&proposer, caller, credits, project_id)?;
        self.tenders.commit_award(tender_id, proposal_id)?;
        self.reentrancy.exit();

        tracing::info!(
            tender_id,
            proposal_id,
            credits,
            total_cost,
            fee = fee_accrual,
            "tender awarded"
        );
        Ok(self.chain.append(
            "award_tender",
            vec![
                DomainEvent::Transferred {
                    from: proposer.clone(),
                    to: caller.to_string(),
                    amount: credits,
                    project_id,
                },
                DomainEvent::TenderAwarded {
                    tender_id,
                    proposal_id,
                    requester: caller.to_string(),
                    proposer,
                    credits,
                    total_cost,
                    fee: fee_accrual,
                },
            ],
            now,
        ))
    }

    /// Withdraws an open tender; every proposal against it is rejected.
    pub fn cancel_tender(
        &mut self,
        caller: &str,
        tender_id: TenderId,
    ) -> Result<TxReceipt, EngineError> {
        self.pause.require_active()?;
        let now = Utc::now();

        self.tenders.cancel(tender_id, caller)?;

        tracing::info!(tender_id, "tender cancelled");
        Ok(self.chain.append(
            "cancel_tender",
            vec![DomainEvent::TenderCancelled { tender_id }],
            now,
        ))
    }

    // -----------------------------------------------------------------------
    // Listings
    // -----------------------------------------------------------------------

    /// Puts the caller's credits on the board at a fixed price.
    ///
    /// The caller must hold the listed credits now; they are not escrowed,
    /// so each later purchase re-checks the seller's balance.
    pub fn create_listing(
        &mut self,
        caller: &str,
        project_id: ProjectId,
        amount: u64,
        price_per_credit: u64,
    ) -> Result<(ListingId, TxReceipt), EngineError> {
        self.pause.require_active()?;
        let now = Utc::now();

        self.ledger
            .ensure_project_balance(caller, amount, project_id)?;
        let listing_id = self
            .listings
            .create(caller, project_id, amount, price_per_credit, now)?;

        tracing::info!(listing_id, seller = caller, amount, "listing created");
        let receipt = self.chain.append(
            "create_listing",
            vec![DomainEvent::ListingCreated {
                listing_id,
                seller: caller.to_string(),
                project_id,
                amount,
                price_per_credit,
            }],
            now,
        );
        Ok((listing_id, receipt))
    }

    /// Buys `amount` credits from a listing, atomically.
    ///
    /// `payment` must cover `amount` at the listed price; any excess is
    /// refunded to the caller's payout account. The seller receives the
    /// price minus the fee, and the listing's remaining quantity drops,
    /// deactivating it at zero.
    pub fn purchase(
        &mut self,
        caller: &str,
        listing_id: ListingId,
        amount: u64,
        payment: u64,
    ) -> Result<TxReceipt, EngineError> {
        self.pause.require_active()?;
        let now = Utc::now();

        let quote = self.listings.quote(listing_id, amount)?;
        let fee = self.fees.fee_for(quote.total_price);
        let seller_amount = quote.total_price - fee;

        CoinLedger::require_payment(payment, quote.total_price)?;
        let refund = payment - quote.total_price;

        self.ledger
            .ensure_project_balance(&quote.seller, amount, quote.project_id)?;
        overflow_guard(self.coins.balance_of(&quote.seller), seller_amount, &quote.seller)?;
        overflow_guard(self.coins.balance_of(caller), refund, caller)?;
        self.fees
            .accrued()
            .checked_add(fee)
            .ok_or(FeeError::PoolOverflow { amount: fee })?;
        self.ledger
            .balance_of(caller)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::BalanceOverflow {
                address: caller.to_string(),
                amount,
            })?;

        // Commit. Nothing below can fail against the state validated above.
        self.reentrancy.enter()?;
        self.coins.credit(&quote.seller, seller_amount)?;
        self.fees.accrue(fee)?;
        self.coins.credit(caller, refund)?;
        self.ledger
            .transfer_scoped(&quote.seller, caller, amount, quote.project_id)?;
        self.listings.commit_fill(listing_id, amount)?;
        self.reentrancy.exit();

        tracing::info!(
            listing_id,
            buyer = caller,
            amount,
            total_price = quote.total_price,
            fee,
            "listing purchase settled"
        );
        Ok(self.chain.append(
            "purchase",
            vec![
                DomainEvent::Transferred {
                    from: quote.seller.clone(),
                    to: caller.to_string(),
                    amount,
                    project_id: quote.project_id,
                },
                DomainEvent::Traded {
                    seller: quote.seller,
                    buyer: caller.to_string(),
                    amount,
                    total_price: quote.total_price,
                    project_id: quote.project_id,
                },
            ],
            now,
        ))
    }

    // -----------------------------------------------------------------------
    // Direct issuance
    // -----------------------------------------------------------------------

    /// Converts attached payment into freshly minted credits of an active
    /// project, at the current credit price. Returns the credits minted.
    ///
    /// This is an issuance path, not a trade: supply grows, no fee is taken,
    /// the proceeds go to the operator, and any remainder below one credit's
    /// price is refunded.
    pub fn purchase_direct(
        &mut self,
        caller: &str,
        project_id: ProjectId,
        payment: u64,
    ) -> Result<(u64, TxReceipt), EngineError> {
        self.pause.require_active()?;
        let now = Utc::now();

        let project = self.registry.require_active(project_id)?;
        let project_name = project.name.clone();
        let total_issued = project.total_issued;

        let credits = self.pricing.credits_for(payment);
        if credits == 0 {
            return Err(CoinError::InsufficientPayment {
                required: self.pricing.price_per_credit(),
                provided: payment,
            }
            .into());
        }
        // credits = payment / price, so the cost cannot overflow.
        let cost = credits * self.pricing.price_per_credit();
        let refund = payment - cost;

        total_issued
            .checked_add(credits)
            .ok_or(RegistryError::IssuanceOverflow(project_id))?;
        self.ledger
            .balance_of(caller)
            .checked_add(credits)
            .ok_or_else(|| LedgerError::BalanceOverflow {
                address: caller.to_string(),
                amount: credits,
            })?;
        let operator = self.owner.operator().to_string();
        overflow_guard(self.coins.balance_of(&operator), cost, &operator)?;
        overflow_guard(self.coins.balance_of(caller), refund, caller)?;

        self.ledger.mint(caller, credits, project_id)?;
        self.registry.record_issuance(project_id, credits)?;
        self.coins.credit(&operator, cost)?;
        self.coins.credit(caller, refund)?;

        tracing::info!(buyer = caller, project_id, credits, cost, "direct purchase");
        let receipt = self.chain.append(
            "purchase_direct",
            vec![
                DomainEvent::Minted {
                    to: caller.to_string(),
                    amount: credits,
                    project_id,
                    project_name,
                },
                DomainEvent::DirectPurchase {
                    buyer: caller.to_string(),
                    project_id,
                    credits,
                    cost,
                },
            ],
            now,
        );
        Ok((credits, receipt))
    }

    // -----------------------------------------------------------------------
    // Fees, pricing, pause
    // -----------------------------------------------------------------------

    /// Updates the trade fee. Operator-only, capped.
    pub fn set_fee_bps(&mut self, caller: &str, bps: u32) -> Result<TxReceipt, EngineError> {
        self.pause.require_active()?;
        self.owner.require_operator(caller)?;
        let now = Utc::now();

        self.fees.set_fee_bps(bps)?;

        tracing::info!(new_bps = bps, "trade fee updated");
        Ok(self
            .chain
            .append("set_fee", vec![DomainEvent::FeeUpdated { new_bps: bps }], now))
    }

    /// Updates the direct-issuance credit price. Operator-only.
    pub fn set_credit_price(&mut self, caller: &str, price: u64) -> Result<TxReceipt, EngineError> {
        self.pause.require_active()?;
        self.owner.require_operator(caller)?;
        let now = Utc::now();

        self.pricing.set_price(price)?;

        tracing::info!(new_price = price, "credit price updated");
        Ok(self.chain.append(
            "set_price",
            vec![DomainEvent::PriceUpdated { new_price: price }],
            now,
        ))
    }

    /// Pays the accumulated fee pool out to the operator. Operator-only.
    pub fn withdraw_fees(&mut self, caller: &str) -> Result<TxReceipt, EngineError> {
        self.pause.require_active()?;
        self.owner.require_operator(caller)?;
        let now = Utc::now();

        let operator = self.owner.operator().to_string();
        overflow_guard(self.coins.balance_of(&operator), self.fees.accrued(), &operator)?;
        let amount = self.fees.withdraw_all()?;
        self.coins.credit(&operator, amount)?;

        tracing::info!(amount, "fees withdrawn");
        Ok(self.chain.append(
            "withdraw_fees",
            vec![DomainEvent::FeesWithdrawn {
                to: operator,
                amount,
            }],
            now,
        ))
    }

    /// Sets the global pause flag. Operator-only. While paused, every
    /// mutating entry point except [`unpause`](Self::unpause) is rejected.
    pub fn pause(&mut self, caller: &str) -> Result<TxReceipt, EngineError> {
        self.owner.require_operator(caller)?;
        let now = Utc::now();
        self.pause.pause();

        tracing::warn!("system paused");
        Ok(self
            .chain
            .append("pause", vec![DomainEvent::PauseSet { paused: true }], now))
    }

    /// Clears the global pause flag. Operator-only.
    pub fn unpause(&mut self, caller: &str) -> Result<TxReceipt, EngineError> {
        self.owner.require_operator(caller)?;
        let now = Utc::now();
        self.pause.unpause();

        tracing::info!("system unpaused");
        Ok(self
            .chain
            .append("unpause", vec![DomainEvent::PauseSet { paused: false }], now))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The privileged operator identity.
    pub fn operator(&self) -> &str {
        self.owner.operator()
    }

    /// Whether the global pause flag is set.
    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    /// Fungible credit balance of `address`.
    pub fn balance_of(&self, address: &str) -> u64 {
        self.ledger.balance_of(address)
    }

    /// Credits of `project_id` held by `address`.
    pub fn project_balance_of(&self, address: &str, project_id: ProjectId) -> u64 {
        self.ledger.project_balance_of(address, project_id)
    }

    /// Circulating credit supply.
    pub fn total_supply(&self) -> u64 {
        self.ledger.total_supply()
    }

    /// Coin owed to `address` from settlements, refunds, and withdrawals.
    pub fn coin_balance_of(&self, address: &str) -> u64 {
        self.coins.balance_of(address)
    }

    /// Looks up a project.
    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.registry.get(id)
    }

    /// Ids of every project registered for `owner`.
    pub fn projects_of(&self, owner: &str) -> &[ProjectId] {
        self.registry.projects_of(owner)
    }

    /// Looks up a tender.
    pub fn tender(&self, id: TenderId) -> Option<&Tender> {
        self.tenders.tender(id)
    }

    /// Looks up a proposal.
    pub fn proposal(&self, id: ProposalId) -> Option<&Proposal> {
        self.tenders.proposal(id)
    }

    /// Ids of every proposal answering a tender.
    pub fn proposals_for(&self, tender_id: TenderId) -> &[ProposalId] {
        self.tenders.proposals_for(tender_id)
    }

    /// Looks up a listing.
    pub fn listing(&self, id: ListingId) -> Option<&Listing> {
        self.listings.get(id)
    }

    /// The current trade fee in basis points.
    pub fn fee_bps(&self) -> u32 {
        self.fees.fee_bps()
    }

    /// Fees collected and not yet withdrawn.
    pub fn accrued_fees(&self) -> u64 {
        self.fees.accrued()
    }

    /// The current direct-issuance price per credit.
    pub fn credit_price(&self) -> u64 {
        self.pricing.price_per_credit()
    }

    /// The audit chain, for replay and integrity checks.
    pub fn chain(&self) -> &AuditChain {
        &self.chain
    }

    /// All blocks in append order.
    pub fn blocks(&self) -> &[Block] {
        self.chain.blocks()
    }

    /// The flat event stream across all blocks.
    pub fn events(&self) -> impl Iterator<Item = &DomainEvent> {
        self.chain.events()
    }
}
