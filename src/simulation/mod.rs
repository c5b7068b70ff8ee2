//! Monte Carlo projection of a monthly contribution plan.
//!
//! Returns are drawn per month from a normal or a Student-t distribution
//! (fat tails). Each month the balance is `(previous + contribution) × (1 + r)`.
//! This is sampling rather than accounting, so it works in `f64`.

mod presets;

pub use presets::Preset;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Normal, StudentT};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::AnalysisError;

pub const MAX_YEARS: u32 = 60;
pub const DEFAULT_SIMULATIONS: usize = 10_000;
const MAX_SIMULATIONS: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReturnDistribution {
    Normal,
    #[default]
    FatTailed,
}

impl ReturnDistribution {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnDistribution::Normal => "normal",
            ReturnDistribution::FatTailed => "fat-tailed",
        }
    }
}

impl FromStr for ReturnDistribution {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(ReturnDistribution::Normal),
            "fat-tailed" | "fat_tailed" | "student-t" => Ok(ReturnDistribution::FatTailed),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TailSeverity {
    #[default]
    Standard,
    Extreme,
}

impl TailSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            TailSeverity::Standard => "standard",
            TailSeverity::Extreme => "extreme",
        }
    }

    /// Student-t degrees of freedom: lower means fatter tails
    pub fn degrees_of_freedom(&self) -> f64 {
        match self {
            TailSeverity::Standard => 5.0,
            TailSeverity::Extreme => 3.0,
        }
    }
}

impl FromStr for TailSeverity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(TailSeverity::Standard),
            "extreme" => Ok(TailSeverity::Extreme),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub initial_balance: f64,
    pub monthly_contribution: f64,
    /// Expected annual return, e.g. 0.08
    pub annual_return: f64,
    /// Annual volatility, e.g. 0.18
    pub annual_volatility: f64,
    pub years: u32,
    pub simulations: usize,
    pub distribution: ReturnDistribution,
    pub tail_severity: TailSeverity,
    /// Fixed seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            initial_balance: 10_000.0,
            monthly_contribution: 500.0,
            annual_return: 0.08,
            annual_volatility: 0.18,
            years: 30,
            simulations: DEFAULT_SIMULATIONS,
            distribution: ReturnDistribution::FatTailed,
            tail_severity: TailSeverity::Standard,
            seed: None,
        }
    }
}

impl SimulationParams {
    pub fn months(&self) -> usize {
        self.years as usize * 12
    }

    /// Geometric monthly equivalent of the annual return
    pub fn monthly_return(&self) -> f64 {
        (1.0 + self.annual_return).powf(1.0 / 12.0) - 1.0
    }

    pub fn monthly_volatility(&self) -> f64 {
        self.annual_volatility / 12f64.sqrt()
    }

    /// Initial balance plus every monthly contribution
    pub fn total_contributions(&self) -> f64 {
        self.initial_balance + self.monthly_contribution * self.months() as f64
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let invalid = |msg: String| Err(AnalysisError::InvalidSimulation(msg));

        if !(1..=MAX_YEARS).contains(&self.years) {
            return invalid(format!("years must be 1..={}, got {}", MAX_YEARS, self.years));
        }
        if !(1..=MAX_SIMULATIONS).contains(&self.simulations) {
            return invalid(format!(
                "simulations must be 1..={}, got {}",
                MAX_SIMULATIONS, self.simulations
            ));
        }
        if !self.initial_balance.is_finite() || self.initial_balance < 0.0 {
            return invalid(format!("initial balance {} must be >= 0", self.initial_balance));
        }
        if !self.monthly_contribution.is_finite() || self.monthly_contribution < 0.0 {
            return invalid(format!(
                "monthly contribution {} must be >= 0",
                self.monthly_contribution
            ));
        }
        if !self.annual_return.is_finite() || self.annual_return <= -1.0 {
            return invalid(format!("annual return {} must be > -1", self.annual_return));
        }
        if !self.annual_volatility.is_finite() || self.annual_volatility < 0.0 {
            return invalid(format!(
                "annual volatility {} must be >= 0",
                self.annual_volatility
            ));
        }
        Ok(())
    }
}

/// Month-by-month percentile bands; index 0 is the starting balance
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PercentileBands {
    pub p10: Vec<f64>,
    pub p20: Vec<f64>,
    pub p50: Vec<f64>,
    pub p80: Vec<f64>,
    pub p90: Vec<f64>,
}

impl PercentileBands {
    fn push(&mut self, sorted: &[f64]) {
        self.p10.push(percentile(sorted, 10.0));
        self.p20.push(percentile(sorted, 20.0));
        self.p50.push(percentile(sorted, 50.0));
        self.p80.push(percentile(sorted, 80.0));
        self.p90.push(percentile(sorted, 90.0));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalStatistics {
    pub median: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub p10: f64,
    pub p20: f64,
    pub p80: f64,
    pub p90: f64,
    pub total_contributions: f64,
    /// Percent of paths ending above zero
    pub success_rate_positive: f64,
    /// Percent of paths ending above total contributions
    pub success_rate_beat_contributions: f64,
    /// Percent of paths ending above twice total contributions
    pub success_rate_double: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub params: SimulationParams,
    pub bands: PercentileBands,
    pub statistics: FinalStatistics,
}

enum Sampler {
    Normal(Normal<f64>),
    StudentT {
        dist: StudentT<f64>,
        loc: f64,
        scale: f64,
    },
}

impl Sampler {
    fn new(params: &SimulationParams) -> Result<Self, AnalysisError> {
        let loc = params.monthly_return();
        let vol = params.monthly_volatility();
        match params.distribution {
            ReturnDistribution::Normal => Normal::new(loc, vol)
                .map(Sampler::Normal)
                .map_err(|e| AnalysisError::InvalidSimulation(e.to_string())),
            ReturnDistribution::FatTailed => {
                let df = params.tail_severity.degrees_of_freedom();
                // Rescale so the draw's standard deviation matches `vol`
                let scale = vol * ((df - 2.0) / df).sqrt();
                StudentT::new(df)
                    .map(|dist| Sampler::StudentT { dist, loc, scale })
                    .map_err(|e| AnalysisError::InvalidSimulation(e.to_string()))
            }
        }
    }

    fn draw<R: Rng>(&self, rng: &mut R) -> f64 {
        match self {
            Sampler::Normal(dist) => rng.sample(dist),
            Sampler::StudentT { dist, loc, scale } => loc + scale * rng.sample(dist),
        }
    }
}

/// Run the simulation. All paths advance together one month at a time, so
/// memory stays proportional to the number of paths.
pub fn run(params: &SimulationParams) -> Result<SimulationResult, AnalysisError> {
    params.validate()?;
    let sampler = Sampler::new(params)?;
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    info!(
        "Simulating {} paths over {} months ({:?})",
        params.simulations,
        params.months(),
        params.distribution
    );

    let mut balances = vec![params.initial_balance; params.simulations];
    let mut bands = PercentileBands::default();
    let mut sorted = balances.clone();
    bands.push(&sorted);

    for _ in 0..params.months() {
        for balance in balances.iter_mut() {
            let r = sampler.draw(&mut rng);
            *balance = (*balance + params.monthly_contribution) * (1.0 + r);
        }
        sorted.copy_from_slice(&balances);
        sorted.sort_by(f64::total_cmp);
        bands.push(&sorted);
    }

    let statistics = final_statistics(&sorted, params.total_contributions());
    debug!("Median final balance {:.2}", statistics.median);

    Ok(SimulationResult {
        params: params.clone(),
        bands,
        statistics,
    })
}

fn final_statistics(sorted: &[f64], total_contributions: f64) -> FinalStatistics {
    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let share_above = |threshold: f64| {
        sorted.iter().filter(|v| **v > threshold).count() as f64 / n * 100.0
    };

    FinalStatistics {
        median: percentile(sorted, 50.0),
        mean,
        std_dev: variance.sqrt(),
        min: sorted.first().copied().unwrap_or(0.0),
        max: sorted.last().copied().unwrap_or(0.0),
        p10: percentile(sorted, 10.0),
        p20: percentile(sorted, 20.0),
        p80: percentile(sorted, 80.0),
        p90: percentile(sorted, 90.0),
        total_contributions,
        success_rate_positive: share_above(0.0),
        success_rate_beat_contributions: share_above(total_contributions),
        success_rate_double: share_above(total_contributions * 2.0),
    }
}

/// Percentile of ascending data with linear interpolation between ranks
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let fraction = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn test_percentile_interpolates() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&data, 50.0), 3.0);
        assert!(approx(percentile(&data, 10.0), 1.4));
        assert!(approx(percentile(&data, 90.0), 4.6));
        assert_eq!(percentile(&data, 0.0), 1.0);
        assert_eq!(percentile(&data, 100.0), 5.0);
        assert_eq!(percentile(&[], 50.0), 0.0);
        assert_eq!(percentile(&[7.0], 90.0), 7.0);
    }

    #[test]
    fn test_zero_volatility_is_deterministic() {
        let params = SimulationParams {
            initial_balance: 1000.0,
            monthly_contribution: 100.0,
            annual_return: 0.0,
            annual_volatility: 0.0,
            years: 1,
            simulations: 50,
            distribution: ReturnDistribution::Normal,
            seed: Some(1),
            ..Default::default()
        };
        let result = run(&params).unwrap();
        assert_eq!(result.bands.p50.len(), 13);
        assert!(approx(result.statistics.median, 2200.0));
        assert!(approx(result.statistics.std_dev, 0.0));
        assert!(approx(result.statistics.total_contributions, 2200.0));
        // Final equals contributions exactly: never strictly above
        assert_eq!(result.statistics.success_rate_beat_contributions, 0.0);
        assert_eq!(result.statistics.success_rate_positive, 100.0);
    }

    #[test]
    fn test_constant_return_compounds_contributions() {
        let params = SimulationParams {
            initial_balance: 0.0,
            monthly_contribution: 100.0,
            annual_return: 0.12,
            annual_volatility: 0.0,
            years: 1,
            simulations: 3,
            distribution: ReturnDistribution::FatTailed,
            seed: Some(9),
            ..Default::default()
        };
        let r = params.monthly_return();
        let expected = (1..=12).fold(0.0, |b: f64, _| (b + 100.0) * (1.0 + r));
        let result = run(&params).unwrap();
        assert!(approx(result.statistics.mean, expected));
        assert!(approx(result.bands.p90[12], expected));
    }

    #[test]
    fn test_seed_reproduces_results() {
        let params = SimulationParams {
            simulations: 200,
            years: 5,
            seed: Some(42),
            ..Default::default()
        };
        let a = run(&params).unwrap();
        let b = run(&params).unwrap();
        assert_eq!(a.statistics, b.statistics);
        assert_eq!(a.bands, b.bands);
    }

    #[test]
    fn test_bands_are_ordered() {
        let params = SimulationParams {
            simulations: 500,
            years: 10,
            seed: Some(7),
            tail_severity: TailSeverity::Extreme,
            ..Default::default()
        };
        let result = run(&params).unwrap();
        for month in 0..=params.months() {
            let b = &result.bands;
            assert!(b.p10[month] <= b.p20[month]);
            assert!(b.p20[month] <= b.p50[month]);
            assert!(b.p50[month] <= b.p80[month]);
            assert!(b.p80[month] <= b.p90[month]);
        }
        assert!(result.statistics.min <= result.statistics.median);
        assert!(result.statistics.median <= result.statistics.max);
    }

    #[test]
    fn test_monthly_conversions() {
        let params = SimulationParams {
            annual_return: 0.08,
            annual_volatility: 0.18,
            ..Default::default()
        };
        assert!(approx((1.0 + params.monthly_return()).powi(12), 1.08));
        assert!(approx(params.monthly_volatility() * 12f64.sqrt(), 0.18));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let cases = [
            SimulationParams { years: 0, ..Default::default() },
            SimulationParams { years: 61, ..Default::default() },
            SimulationParams { simulations: 0, ..Default::default() },
            SimulationParams { initial_balance: -1.0, ..Default::default() },
            SimulationParams { annual_return: -1.0, ..Default::default() },
            SimulationParams { annual_volatility: f64::NAN, ..Default::default() },
        ];
        for params in cases {
            let err = run(&params).unwrap_err();
            assert!(matches!(err, AnalysisError::InvalidSimulation(_)));
        }
    }

    #[test]
    fn test_distribution_parsing() {
        assert_eq!("Normal".parse(), Ok(ReturnDistribution::Normal));
        assert_eq!("fat-tailed".parse(), Ok(ReturnDistribution::FatTailed));
        assert_eq!("extreme".parse(), Ok(TailSeverity::Extreme));
        assert_eq!(TailSeverity::Standard.degrees_of_freedom(), 5.0);
    }
}
