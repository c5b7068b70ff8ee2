use std::fmt;
use std::str::FromStr;

use super::{ReturnDistribution, SimulationParams, TailSeverity};

/// Named investor profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    YoungInvestor,
    MidCareer,
    NearRetirement,
    AggressiveGrowth,
}

impl Preset {
    pub fn all() -> [Preset; 4] {
        [
            Preset::YoungInvestor,
            Preset::MidCareer,
            Preset::NearRetirement,
            Preset::AggressiveGrowth,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::YoungInvestor => "young-investor",
            Preset::MidCareer => "mid-career",
            Preset::NearRetirement => "near-retirement",
            Preset::AggressiveGrowth => "aggressive-growth",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Preset::YoungInvestor => "Small balance, long horizon, equity-heavy",
            Preset::MidCareer => "Established balance, steady contributions",
            Preset::NearRetirement => "Large balance, short horizon, conservative mix",
            Preset::AggressiveGrowth => "High return target with extreme tail risk",
        }
    }

    /// Preset parameters, with the default simulation count and no seed
    pub fn params(&self) -> SimulationParams {
        let (initial_balance, monthly_contribution, annual_return, annual_volatility, years) =
            match self {
                Preset::YoungInvestor => (5_000.0, 500.0, 0.09, 0.20, 40),
                Preset::MidCareer => (100_000.0, 1_500.0, 0.08, 0.16, 25),
                Preset::NearRetirement => (500_000.0, 2_000.0, 0.06, 0.12, 10),
                Preset::AggressiveGrowth => (25_000.0, 1_000.0, 0.10, 0.22, 30),
            };
        let tail_severity = match self {
            Preset::AggressiveGrowth => TailSeverity::Extreme,
            _ => TailSeverity::Standard,
        };

        SimulationParams {
            initial_balance,
            monthly_contribution,
            annual_return,
            annual_volatility,
            years,
            distribution: ReturnDistribution::FatTailed,
            tail_severity,
            ..Default::default()
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Preset::all()
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = Preset::all().iter().map(|p| p.as_str()).collect();
                format!("unknown preset '{}' (expected one of: {})", s, names.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        for preset in Preset::all() {
            assert!(preset.params().validate().is_ok(), "{}", preset);
            assert_eq!(preset.as_str().parse::<Preset>(), Ok(preset));
        }
    }

    #[test]
    fn test_aggressive_growth_uses_extreme_tails() {
        let params = Preset::AggressiveGrowth.params();
        assert_eq!(params.tail_severity, TailSeverity::Extreme);
        assert_eq!(params.years, 30);
        assert_eq!(Preset::NearRetirement.params().initial_balance, 500_000.0);
    }

    #[test]
    fn test_unknown_preset_lists_choices() {
        let err = "retired".parse::<Preset>().unwrap_err();
        assert!(err.contains("young-investor"));
        assert_eq!("Mid_Career".parse::<Preset>(), Ok(Preset::MidCareer));
    }
}
