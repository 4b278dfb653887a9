//! End-to-end settlement tests for the Canopy core.
//!
//! These tests exercise the full lifecycle through the public engine API:
//! project registration, minting, tender award, listing purchase, direct
//! issuance, fee accounting, and pause control. They also assert the
//! system-wide properties the core promises: supply conservation against
//! the event stream, the coupled balance invariant, single-winner awards,
//! exact fee math, atomic settlement, and audit-chain integrity.
//!
//! Each test builds its own engine. No shared state, no ordering
//! dependencies.

use canopy_core::{DomainEvent, EngineError, SettlementEngine};

const OPERATOR: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
const NGO_A: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";
const NGO_B: &str = "0x3c44cdddb6a900fa2b585dd299e03d12fa4293bc";
const CORP: &str = "0x90f79bf6eb2c4f870365e785982e1f101e93b906";

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

/// An engine with one registered project.
fn setup() -> (SettlementEngine, u64) {
    let mut engine = SettlementEngine::new(OPERATOR.to_string());
    let (project_id, _) = engine
        .register_project(OPERATOR, "Mangrove-1", NGO_A, 1_000)
        .expect("register project");
    (engine, project_id)
}

/// An engine with one project and `amount` credits minted to NGO-A.
fn setup_funded(amount: u64) -> (SettlementEngine, u64) {
    let (mut engine, project_id) = setup();
    engine
        .mint(OPERATOR, NGO_A, amount, project_id)
        .expect("mint");
    (engine, project_id)
}

/// Sums minted and retired amounts over the engine's event stream.
fn minted_and_retired(engine: &SettlementEngine) -> (u64, u64) {
    let mut minted = 0;
    let mut retired = 0;
    for event in engine.events() {
        match event {
            DomainEvent::Minted { amount, .. } => minted += amount,
            DomainEvent::Retired { amount, .. } => retired += amount,
            _ => {}
        }
    }
    (minted, retired)
}

/// Asserts the coupled invariant for every given identity across projects.
fn assert_scope_bound(engine: &SettlementEngine, identities: &[&str], projects: &[u64]) {
    for identity in identities {
        let mut scoped = 0;
        for &project in projects {
            let balance = engine.project_balance_of(identity, project);
            assert!(
                balance <= engine.balance_of(identity),
                "scoped balance exceeds global for {identity}"
            );
            scoped += balance;
        }
        assert_eq!(
            scoped,
            engine.balance_of(identity),
            "project attribution does not partition {identity}'s balance"
        );
    }
}

// ---------------------------------------------------------------------------
// 1. Registration and Minting
// ---------------------------------------------------------------------------

#[test]
fn register_and_mint_lifecycle() {
    // Register "Mangrove-1" with an estimate of 1000, mint 500 to NGO-A.
    let (engine, project_id) = setup_funded(500);

    assert_eq!(project_id, 1);
    assert_eq!(engine.balance_of(NGO_A), 500);
    assert_eq!(engine.project_balance_of(NGO_A, project_id), 500);

    let project = engine.project(project_id).expect("project exists");
    assert_eq!(project.name, "Mangrove-1");
    assert_eq!(project.estimated_credits, 1_000);
    assert_eq!(project.total_issued, 500);
    assert!(project.active);
    assert_eq!(engine.projects_of(NGO_A), &[project_id]);
}

#[test]
fn mint_from_non_operator_changes_nothing() {
    let (mut engine, project_id) = setup();
    let height = engine.chain().height();

    let result = engine.mint(NGO_A, NGO_A, 500, project_id);
    assert!(result.is_err());

    assert_eq!(engine.balance_of(NGO_A), 0);
    assert_eq!(engine.total_supply(), 0);
    assert_eq!(engine.project(project_id).unwrap().total_issued, 0);
    assert_eq!(engine.chain().height(), height);
}

#[test]
fn mint_rejected_after_deactivation() {
    let (mut engine, project_id) = setup();
    engine.deactivate_project(OPERATOR, project_id).unwrap();

    assert!(engine.mint(OPERATOR, NGO_A, 100, project_id).is_err());
    assert_eq!(engine.total_supply(), 0);
}

// ---------------------------------------------------------------------------
// 2. Tender Award Settlement
// ---------------------------------------------------------------------------

#[test]
fn award_settles_credits_payment_and_fee_exactly() {
    // Tender: 100 credits at max 10/credit for 7 days. NGO-A holds 500
    // project-1 credits and offers 150 at 8/credit. Total cost 1200,
    // fee 2.5% = 30, seller proceeds 1170.
    let (mut engine, project_id) = setup_funded(500);
    let (tender_id, _) = engine
        .create_tender(CORP, "Offset 2026 emissions", "", 100, 10, 7)
        .unwrap();
    let (proposal_id, _) = engine
        .submit_proposal(NGO_A, tender_id, 150, 8, project_id, "mangrove credits")
        .unwrap();

    engine
        .award_tender(CORP, tender_id, proposal_id, 1_200)
        .unwrap();

    assert_eq!(engine.balance_of(NGO_A), 350);
    assert_eq!(engine.project_balance_of(NGO_A, project_id), 350);
    assert_eq!(engine.balance_of(CORP), 150);
    assert_eq!(engine.project_balance_of(CORP, project_id), 150);
    assert_eq!(engine.coin_balance_of(NGO_A), 1_170);
    assert_eq!(engine.accrued_fees(), 30);

    assert_scope_bound(&engine, &[NGO_A, CORP], &[project_id]);
}

#[test]
fn award_leaves_exactly_one_accepted_proposal() {
    let (mut engine, project_id) = setup_funded(500);
    engine.mint(OPERATOR, NGO_B, 300, project_id).unwrap();

    let (tender_id, _) = engine
        .create_tender(CORP, "Offset 2026 emissions", "", 100, 10, 7)
        .unwrap();
    let (winner, _) = engine
        .submit_proposal(NGO_A, tender_id, 150, 8, project_id, "")
        .unwrap();
    let (loser_a, _) = engine
        .submit_proposal(NGO_B, tender_id, 120, 9, project_id, "")
        .unwrap();
    let (loser_b, _) = engine
        .submit_proposal(NGO_A, tender_id, 200, 7, project_id, "")
        .unwrap();

    engine.award_tender(CORP, tender_id, winner, 1_200).unwrap();

    let statuses: Vec<String> = engine
        .proposals_for(tender_id)
        .iter()
        .map(|&id| engine.proposal(id).unwrap().status.to_string())
        .collect();
    assert_eq!(
        statuses.iter().filter(|s| *s == "Accepted").count(),
        1,
        "exactly one proposal may be accepted"
    );
    assert_eq!(engine.proposal(winner).unwrap().status.to_string(), "Accepted");
    for id in [loser_a, loser_b] {
        assert_eq!(engine.proposal(id).unwrap().status.to_string(), "Rejected");
    }
    assert_eq!(engine.tender(tender_id).unwrap().winning_proposal, Some(winner));
}

#[test]
fn undersized_proposal_rejected_without_a_record() {
    // Tender requires 100, proposal offers 50.
    let (mut engine, project_id) = setup_funded(500);
    let (tender_id, _) = engine
        .create_tender(CORP, "Offset 2026 emissions", "", 100, 10, 7)
        .unwrap();

    let result = engine.submit_proposal(NGO_A, tender_id, 50, 8, project_id, "");
    assert!(matches!(result, Err(EngineError::Tender(_))));
    assert!(engine.proposals_for(tender_id).is_empty());
}

#[test]
fn failed_credit_leg_moves_no_payment() {
    // The proposer drains their balance between submission and award. The
    // award must fail whole: no payment, tender still open.
    let (mut engine, project_id) = setup_funded(150);
    let (tender_id, _) = engine
        .create_tender(CORP, "Offset 2026 emissions", "", 100, 10, 7)
        .unwrap();
    let (proposal_id, _) = engine
        .submit_proposal(NGO_A, tender_id, 150, 8, project_id, "")
        .unwrap();
    engine
        .transfer_scoped(NGO_A, NGO_B, 120, project_id)
        .unwrap();

    let result = engine.award_tender(CORP, tender_id, proposal_id, 1_200);
    assert!(matches!(result, Err(EngineError::Ledger(_))));

    assert_eq!(engine.coin_balance_of(NGO_A), 0);
    assert_eq!(engine.accrued_fees(), 0);
    assert_eq!(engine.balance_of(CORP), 0);
    assert_eq!(engine.tender(tender_id).unwrap().status.to_string(), "Open");
}

#[test]
fn cancelled_tender_rejects_award() {
    let (mut engine, project_id) = setup_funded(500);
    let (tender_id, _) = engine
        .create_tender(CORP, "Offset 2026 emissions", "", 100, 10, 7)
        .unwrap();
    let (proposal_id, _) = engine
        .submit_proposal(NGO_A, tender_id, 150, 8, project_id, "")
        .unwrap();

    engine.cancel_tender(CORP, tender_id).unwrap();
    assert_eq!(
        engine.proposal(proposal_id).unwrap().status.to_string(),
        "Rejected"
    );
    assert!(engine
        .award_tender(CORP, tender_id, proposal_id, 1_200)
        .is_err());
}

// ---------------------------------------------------------------------------
// 3. Listing Purchases
// ---------------------------------------------------------------------------

#[test]
fn listing_partial_fills_then_exhaustion() {
    // 200 credits listed; bought 80 then 120; a third purchase fails.
    let (mut engine, project_id) = setup_funded(200);
    let (listing_id, _) = engine.create_listing(NGO_A, project_id, 200, 5).unwrap();

    engine.purchase(CORP, listing_id, 80, 400).unwrap();
    let listing = engine.listing(listing_id).unwrap();
    assert!(listing.active);
    assert_eq!(listing.credits_remaining, 120);

    engine.purchase(CORP, listing_id, 120, 600).unwrap();
    let listing = engine.listing(listing_id).unwrap();
    assert!(!listing.active);
    assert_eq!(listing.credits_remaining, 0);

    let result = engine.purchase(CORP, listing_id, 1, 5);
    assert!(matches!(result, Err(EngineError::Listing(_))));

    assert_eq!(engine.balance_of(CORP), 200);
    assert_eq!(engine.balance_of(NGO_A), 0);
    assert_scope_bound(&engine, &[NGO_A, CORP], &[project_id]);
}

#[test]
fn purchase_fee_and_proceeds_partition_the_price() {
    let (mut engine, project_id) = setup_funded(200);
    let (listing_id, _) = engine.create_listing(NGO_A, project_id, 200, 7).unwrap();

    // 130 credits at 7 = 910; fee floor(910 * 250 / 10000) = 22.
    engine.purchase(CORP, listing_id, 130, 910).unwrap();

    let fee = 910 * 250 / 10_000;
    assert_eq!(fee, 22);
    assert_eq!(engine.accrued_fees(), fee);
    assert_eq!(engine.coin_balance_of(NGO_A), 910 - fee);
    assert_eq!(engine.coin_balance_of(NGO_A) + engine.accrued_fees(), 910);
}

#[test]
fn stale_listing_settlement_fails_whole() {
    // The seller spends the listed credits through a tender first.
    let (mut engine, project_id) = setup_funded(200);
    let (listing_id, _) = engine.create_listing(NGO_A, project_id, 200, 5).unwrap();
    engine
        .transfer_scoped(NGO_A, NGO_B, 150, project_id)
        .unwrap();

    let result = engine.purchase(CORP, listing_id, 100, 500);
    assert!(matches!(result, Err(EngineError::Ledger(_))));

    assert_eq!(engine.coin_balance_of(NGO_A), 0);
    assert_eq!(engine.balance_of(CORP), 0);
    assert_eq!(engine.listing(listing_id).unwrap().credits_remaining, 200);
}

// ---------------------------------------------------------------------------
// 4. Direct Issuance
// ---------------------------------------------------------------------------

#[test]
fn direct_purchase_grows_supply_instead_of_moving_it() {
    let (mut engine, project_id) = setup_funded(500);

    let (credits, _) = engine.purchase_direct(CORP, project_id, 1_500).unwrap();

    assert_eq!(credits, 5);
    assert_eq!(engine.total_supply(), 505);
    assert_eq!(engine.balance_of(NGO_A), 500, "no existing credits moved");
    assert_eq!(engine.balance_of(CORP), 5);
    assert_eq!(engine.project(project_id).unwrap().total_issued, 505);
    assert_eq!(engine.coin_balance_of(OPERATOR), 1_500);
}

// ---------------------------------------------------------------------------
// 5. System Properties
// ---------------------------------------------------------------------------

#[test]
fn supply_conservation_against_the_event_stream() {
    let (mut engine, project_id) = setup_funded(500);
    let (second_project, _) = engine
        .register_project(OPERATOR, "Seagrass-2", NGO_B, 400)
        .unwrap();
    engine.mint(OPERATOR, NGO_B, 250, second_project).unwrap();
    engine
        .transfer_scoped(NGO_A, CORP, 200, project_id)
        .unwrap();
    engine.retire(CORP, 75, project_id).unwrap();
    engine.purchase_direct(CORP, project_id, 900).unwrap();
    engine.retire(NGO_B, 50, second_project).unwrap();

    let (minted, retired) = minted_and_retired(&engine);
    assert_eq!(engine.total_supply(), minted - retired);

    let held: u64 = [NGO_A, NGO_B, CORP]
        .iter()
        .map(|id| engine.balance_of(id))
        .sum();
    assert_eq!(held, engine.total_supply());

    assert_scope_bound(&engine, &[NGO_A, NGO_B, CORP], &[project_id, second_project]);
}

#[test]
fn paused_system_rejects_every_mutator() {
    let (mut engine, project_id) = setup_funded(500);
    let (listing_id, _) = engine.create_listing(NGO_A, project_id, 100, 5).unwrap();
    let (tender_id, _) = engine
        .create_tender(CORP, "Offset 2026 emissions", "", 100, 10, 7)
        .unwrap();
    engine.pause(OPERATOR).unwrap();

    assert!(engine.register_project(OPERATOR, "P", NGO_A, 1).is_err());
    assert!(engine.mint(OPERATOR, NGO_A, 1, project_id).is_err());
    assert!(engine.transfer_scoped(NGO_A, CORP, 1, project_id).is_err());
    assert!(engine
        .transfer_scoped_as_operator(OPERATOR, NGO_A, CORP, 1, project_id)
        .is_err());
    assert!(engine.retire(NGO_A, 1, project_id).is_err());
    assert!(engine.create_tender(CORP, "T", "", 1, 1, 1).is_err());
    assert!(engine
        .submit_proposal(NGO_A, tender_id, 100, 5, project_id, "")
        .is_err());
    assert!(engine.award_tender(CORP, tender_id, 1, 1_000).is_err());
    assert!(engine.cancel_tender(CORP, tender_id).is_err());
    assert!(engine.create_listing(NGO_A, project_id, 1, 1).is_err());
    assert!(engine.purchase(CORP, listing_id, 1, 5).is_err());
    assert!(engine.purchase_direct(CORP, project_id, 300).is_err());
    assert!(engine.set_fee_bps(OPERATOR, 100).is_err());
    assert!(engine.set_credit_price(OPERATOR, 400).is_err());
    assert!(engine.withdraw_fees(OPERATOR).is_err());
    assert!(engine.deactivate_project(OPERATOR, project_id).is_err());

    // Queries still answer, and unpause restores service.
    assert_eq!(engine.balance_of(NGO_A), 500);
    engine.unpause(OPERATOR).unwrap();
    assert!(engine.mint(OPERATOR, NGO_A, 1, project_id).is_ok());
}

#[test]
fn operator_mediated_transfer_matches_holder_transfer() {
    let (mut engine, project_id) = setup_funded(300);

    engine
        .transfer_scoped_as_operator(OPERATOR, NGO_A, CORP, 120, project_id)
        .unwrap();
    assert_eq!(engine.balance_of(CORP), 120);
    assert_eq!(engine.project_balance_of(CORP, project_id), 120);

    // Non-operators cannot move other people's credits.
    assert!(engine
        .transfer_scoped_as_operator(CORP, NGO_A, CORP, 10, project_id)
        .is_err());
}

#[test]
fn fee_withdrawal_pays_the_operator_and_empties_the_pool() {
    let (mut engine, project_id) = setup_funded(200);
    let (listing_id, _) = engine.create_listing(NGO_A, project_id, 200, 5).unwrap();
    engine.purchase(CORP, listing_id, 200, 1_000).unwrap();

    let pool = engine.accrued_fees();
    assert_eq!(pool, 25);
    engine.withdraw_fees(OPERATOR).unwrap();
    assert_eq!(engine.coin_balance_of(OPERATOR), 25);
    assert_eq!(engine.accrued_fees(), 0);
    assert!(engine.withdraw_fees(OPERATOR).is_err());
}

#[test]
fn audit_chain_replays_the_whole_history() {
    let (mut engine, project_id) = setup_funded(500);
    engine
        .transfer_scoped(NGO_A, CORP, 100, project_id)
        .unwrap();
    let (listing_id, _) = engine.create_listing(NGO_A, project_id, 100, 5).unwrap();
    engine.purchase(CORP, listing_id, 40, 200).unwrap();
    engine.retire(CORP, 10, project_id).unwrap();

    engine.chain().verify().expect("chain links intact");

    // One block per applied transaction: genesis + register + mint +
    // transfer + create_listing + purchase + retire.
    assert_eq!(engine.chain().height(), 7);

    // Receipts point at real blocks.
    let last = engine.blocks().last().unwrap();
    assert_eq!(last.previous_hash, engine.blocks()[5].hash);
}

#[test]
fn receipts_carry_hash_block_and_gas() {
    let (mut engine, project_id) = setup();
    let receipt = engine.mint(OPERATOR, NGO_A, 100, project_id).unwrap();

    assert_eq!(receipt.block_number, engine.chain().height());
    assert_eq!(receipt.tx_hash.len(), 64, "hex sha-256");
    assert!(receipt.gas_used > 0);
    assert_eq!(&receipt.tx_hash, engine.chain().last_hash());
}
