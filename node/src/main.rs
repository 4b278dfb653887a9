//! # Canopy Node
//!
//! Entry point for the `canopy-node` binary: a single-process host for the
//! Canopy settlement core. It owns one engine, applies transactions to it
//! one at a time in submission order, and prints receipts and summaries to
//! stdout (logs go to stderr).
//!
//! The binary supports three subcommands:
//!
//! - `demo`   : run a scripted marketplace lifecycle with generated identities
//! - `apply`  : apply a JSON action script and print receipt JSON lines
//! - `version`: print build version information

mod cli;
mod logging;
mod script;

use anyhow::{Context, Result};
use clap::Parser;
use rand::{Rng, SeedableRng};
use serde_json::json;

use canopy_core::SettlementEngine;

use cli::{CanopyCli, Commands};
use logging::LogFormat;

fn main() -> Result<()> {
    let cli = CanopyCli::parse();

    match cli.command {
        Commands::Demo(args) => run_demo(args),
        Commands::Apply(args) => run_apply(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Generates a demo identity: 20 random bytes, hex-encoded with a 0x prefix.
fn random_address(rng: &mut impl Rng) -> String {
    let bytes: [u8; 20] = rng.gen();
    format!("0x{}", hex::encode(bytes))
}

/// Runs the full marketplace lifecycle against a fresh engine: register,
/// mint, tender, award, list, purchase, retire, withdraw. Prints a state
/// summary as JSON at the end.
fn run_demo(args: cli::DemoArgs) -> Result<()> {
    logging::init_logging(
        "canopy_node=info,canopy_core=info",
        LogFormat::from_str_lossy(&args.log_format),
    );

    let mut rng = match args.seed {
        Some(seed) => rand::rngs::StdRng::seed_from_u64(seed),
        None => rand::rngs::StdRng::from_entropy(),
    };
    let operator = random_address(&mut rng);
    let ngo = random_address(&mut rng);
    let corporate = random_address(&mut rng);

    tracing::info!(%operator, %ngo, %corporate, "demo identities generated");
    let mut engine = SettlementEngine::new(operator.clone());

    // Registration and issuance.
    let (project_id, _) = engine
        .register_project(&operator, "Mangrove Restoration Alpha", &ngo, 1_000)
        .context("register demo project")?;
    engine
        .mint(&operator, &ngo, 500, project_id)
        .context("mint demo credits")?;

    // Tender lifecycle: request, proposal, atomic award.
    let (tender_id, _) = engine
        .create_tender(
            &corporate,
            "Offset 2026 operations",
            "Looking for verified blue-carbon credits",
            100,
            10,
            7,
        )
        .context("create demo tender")?;
    let (proposal_id, _) = engine
        .submit_proposal(&ngo, tender_id, 150, 8, project_id, "Mangrove credits")
        .context("submit demo proposal")?;
    engine
        .award_tender(&corporate, tender_id, proposal_id, 1_200)
        .context("award demo tender")?;

    // Listing lifecycle: fixed-price offer, partial fill.
    let (listing_id, _) = engine
        .create_listing(&ngo, project_id, 100, 6)
        .context("create demo listing")?;
    engine
        .purchase(&corporate, listing_id, 40, 240)
        .context("purchase from demo listing")?;

    // The corporate retires part of what it bought.
    engine
        .retire(&corporate, 25, project_id)
        .context("retire demo credits")?;

    // Operator collects the accumulated fees.
    engine
        .withdraw_fees(&operator)
        .context("withdraw demo fees")?;

    engine.chain().verify().context("audit chain integrity")?;

    let summary = json!({
        "identities": { "operator": operator, "ngo": ngo, "corporate": corporate },
        "project": engine.project(project_id),
        "balances": {
            "ngo": {
                "credits": engine.balance_of(&ngo),
                "project_credits": engine.project_balance_of(&ngo, project_id),
                "coin": engine.coin_balance_of(&ngo),
            },
            "corporate": {
                "credits": engine.balance_of(&corporate),
                "project_credits": engine.project_balance_of(&corporate, project_id),
                "coin": engine.coin_balance_of(&corporate),
            },
            "operator_coin": engine.coin_balance_of(&operator),
        },
        "total_supply": engine.total_supply(),
        "fee_pool": engine.accrued_fees(),
        "chain_height": engine.chain().height(),
        "events": engine.events().count(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    tracing::info!("demo complete");
    Ok(())
}

/// Reads a script file, applies each action in order, and prints one
/// outcome JSON line per action.
fn run_apply(args: cli::ApplyArgs) -> Result<()> {
    logging::init_logging(
        "canopy_node=info,canopy_core=info",
        LogFormat::from_str_lossy(&args.log_format),
    );

    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read script {}", args.file.display()))?;
    let script = script::parse_script(&text)?;

    tracing::info!(
        actions = script.actions.len(),
        operator = %script.operator,
        "applying action script"
    );
    let mut engine = SettlementEngine::new(script.operator.clone());

    let mut applied = 0usize;
    let mut rejected = 0usize;
    for (index, action) in script.actions.iter().enumerate() {
        match script::apply_action(&mut engine, action) {
            Ok(outcome) => {
                applied += 1;
                println!("{}", outcome);
            }
            Err(error) => {
                rejected += 1;
                tracing::warn!(index, op = action.op_name(), %error, "action rejected");
                println!(
                    "{}",
                    json!({ "op": action.op_name(), "index": index, "error": error.to_string() })
                );
                if !args.keep_going {
                    anyhow::bail!("action {} ({}) rejected: {}", index, action.op_name(), error);
                }
            }
        }
    }

    engine.chain().verify().context("audit chain integrity")?;
    tracing::info!(applied, rejected, height = engine.chain().height(), "script finished");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("canopy-node {}", env!("CARGO_PKG_VERSION"));
}
