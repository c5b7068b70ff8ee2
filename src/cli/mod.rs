use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod formatters;

#[derive(Parser)]
#[command(name = "monthly-returns")]
#[command(
    version,
    about = "Monthly portfolio returns from brokerage transaction feeds"
)]
#[command(
    long_about = "Rebuild month-end portfolio values from an investment transaction feed and month-end prices, compute time-weighted or Modified Dietz returns, compare them against a weighted benchmark, audit fees, and project contribution plans with a Monte Carlo simulation."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Configuration file (defaults to $RETURNS_CONFIG, then the user config dir)
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconstruct monthly values and compute returns
    Analyze(AnalyzeArgs),

    /// Audit fees charged over a window
    Fees {
        /// Transaction feed (JSON page or array of pages)
        #[arg(long)]
        feed: PathBuf,

        /// Window start (YYYY-MM-DD or YYYY-MM)
        #[arg(long)]
        from: Option<String>,

        /// Window end (YYYY-MM-DD or YYYY-MM)
        #[arg(long)]
        to: Option<String>,
    },

    /// Monte Carlo projection of a contribution plan
    Simulate(SimulateArgs),
}

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Transaction feed (JSON page or array of pages)
    #[arg(long)]
    pub feed: PathBuf,

    /// Month-end prices CSV (ticker,date,price)
    #[arg(long)]
    pub prices: PathBuf,

    /// Benchmark constituent returns CSV (ticker,month,return)
    #[arg(long)]
    pub benchmark: Option<PathBuf>,

    /// Benchmark constituent month-end prices CSV (ticker,date,price), converted to returns
    #[arg(long)]
    pub benchmark_prices: Option<PathBuf>,

    /// Benchmark weight as TICKER=WEIGHT; repeatable, replaces the configured allocation
    #[arg(long = "weight", value_name = "TICKER=WEIGHT")]
    pub weights: Vec<String>,

    /// Window start (YYYY-MM-DD or YYYY-MM)
    #[arg(long)]
    pub from: Option<String>,

    /// Window end (YYYY-MM-DD or YYYY-MM)
    #[arg(long)]
    pub to: Option<String>,

    /// Return method: time-weighted or modified-dietz
    #[arg(long)]
    pub method: Option<String>,

    /// Cash flows: external (transfers) or trades (buys and sells)
    #[arg(long = "cash-flow-basis")]
    pub cash_flow_basis: Option<String>,

    /// Months with unpriced holdings: skip or include
    #[arg(long = "price-gaps")]
    pub price_gap_policy: Option<String>,

    /// Opening positions: empty or rewind-holdings
    #[arg(long = "opening")]
    pub opening_positions: Option<String>,

    /// Keep valuing positions through the window end after the last trade
    #[arg(long)]
    pub carry_forward: bool,

    /// Reject benchmark weights outside tolerance instead of warning
    #[arg(long)]
    pub strict: bool,

    /// Skip the holdings reconciliation
    #[arg(long)]
    pub no_reconcile: bool,

    /// Write the month-by-month audit trail CSV here
    #[arg(long = "audit-csv")]
    pub audit_csv: Option<PathBuf>,

    /// Print the warning list, not just the per-kind summary
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Args)]
pub struct SimulateArgs {
    /// Start from a named profile (see --list-presets)
    #[arg(long)]
    pub preset: Option<String>,

    /// List the available presets and exit
    #[arg(long)]
    pub list_presets: bool,

    /// Starting balance
    #[arg(long)]
    pub initial: Option<f64>,

    /// Monthly contribution
    #[arg(long)]
    pub contribution: Option<f64>,

    /// Expected annual return (0.08 = 8%)
    #[arg(long = "return")]
    pub annual_return: Option<f64>,

    /// Annual volatility (0.18 = 18%)
    #[arg(long)]
    pub volatility: Option<f64>,

    /// Horizon in years
    #[arg(long)]
    pub years: Option<u32>,

    /// Number of simulated paths
    #[arg(long)]
    pub simulations: Option<usize>,

    /// Return distribution: normal or fat-tailed
    #[arg(long)]
    pub distribution: Option<String>,

    /// Tail severity for fat-tailed returns: standard or extreme
    #[arg(long = "tails")]
    pub tail_severity: Option<String>,

    /// RNG seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,
}
