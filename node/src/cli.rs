//! # CLI Interface
//!
//! Defines the command-line argument structure for `canopy-node` using
//! `clap` derive. Supports three subcommands: `demo`, `apply`, and
//! `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Canopy settlement-core host.
///
/// A single-process driver for the Canopy carbon-credit settlement core.
/// Applies transactions one at a time, in order, exactly the way the
/// replicated deployment would, and prints the resulting receipts.
#[derive(Parser, Debug)]
#[command(
    name = "canopy-node",
    about = "Canopy settlement-core host",
    version,
    propagate_version = true
)]
pub struct CanopyCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the `canopy-node` binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scripted end-to-end marketplace lifecycle with generated
    /// identities and print the resulting state summary.
    Demo(DemoArgs),
    /// Apply a JSON action script against a fresh engine, printing one
    /// receipt JSON line per applied action.
    Apply(ApplyArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `demo` subcommand.
#[derive(Parser, Debug)]
pub struct DemoArgs {
    /// Log output format: "pretty" or "json".
    #[arg(long, env = "CANOPY_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Seed for demo identity generation. Random when omitted.
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments for the `apply` subcommand.
#[derive(Parser, Debug)]
pub struct ApplyArgs {
    /// Path to the JSON action script.
    ///
    /// The file holds an object with the operator identity and an ordered
    /// list of actions; see the `script` module for the format.
    pub file: PathBuf,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "CANOPY_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Keep applying after a rejected action instead of stopping.
    #[arg(long)]
    pub keep_going: bool,
}
