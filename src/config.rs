//! TOML configuration.
//!
//! Lookup order: explicit `--config` path, then `$RETURNS_CONFIG`, then
//! `<config_home>/monthly-returns/config.toml`. A missing default file means
//! built-in defaults; a missing explicit file is an error.

use anyhow::{anyhow, Context};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use crate::reports::analysis::OpeningPositions;
use crate::reports::benchmark::{
    normalize_allocation, Allocation, BenchmarkOptions, DEFAULT_WEIGHT_TOLERANCE,
};
use crate::reports::monthly::CashFlowBasis;
use crate::reports::returns::{PriceGapPolicy, ReturnMethod};
use crate::simulation::SimulationParams;

pub const CONFIG_ENV_VAR: &str = "RETURNS_CONFIG";
const APP_DIR: &str = "monthly-returns";
const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analysis: AnalysisConfig,
    pub benchmark: BenchmarkConfig,
    pub simulation: SimulationParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub method: ReturnMethod,
    pub cash_flow_basis: CashFlowBasis,
    pub price_gap_policy: PriceGapPolicy,
    pub carry_forward_to_end: bool,
    pub opening_positions: OpeningPositions,
    pub reconcile_holdings: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            method: ReturnMethod::default(),
            cash_flow_basis: CashFlowBasis::default(),
            price_gap_policy: PriceGapPolicy::default(),
            carry_forward_to_end: false,
            opening_positions: OpeningPositions::default(),
            reconcile_holdings: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Ticker → weight; tickers are upper-cased on load
    pub allocation: Allocation,
    pub tolerance: Decimal,
    pub strict: bool,
    /// Benchmark return CSV used when `--benchmark` is not given
    pub series: Option<PathBuf>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            allocation: Allocation::new(),
            tolerance: DEFAULT_WEIGHT_TOLERANCE,
            strict: false,
            series: None,
        }
    }
}

impl BenchmarkConfig {
    pub fn options(&self) -> BenchmarkOptions {
        BenchmarkOptions {
            tolerance: self.tolerance,
            strict: self.strict,
        }
    }
}

/// Default config file location, if the platform has a config directory
pub fn default_config_path() -> Option<PathBuf> {
    dir_spec::config_home().map(|dir| dir.join(APP_DIR).join(CONFIG_FILENAME))
}

pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config = toml::from_str(content).context("Failed to parse configuration")?;
    let allocation = std::mem::take(&mut config.benchmark.allocation);
    config.benchmark.allocation = normalize_allocation(allocation);
    Ok(config)
}

pub fn load_config_file(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid config file: {}", path.display()))
}

/// Resolve and load the configuration
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return load_config_file(path);
    }

    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(anyhow!(
                "{} points to a missing file: {}",
                CONFIG_ENV_VAR,
                path.display()
            ));
        }
        return load_config_file(&path);
    }

    match default_config_path() {
        Some(path) if path.exists() => load_config_file(&path),
        _ => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}
