//! Simulate command dispatcher implementation

use anyhow::{anyhow, Result};
use tracing::info;

use crate::cli::formatters::{format_presets, format_simulation};
use crate::cli::SimulateArgs;
use monthly_returns::config::Config;
use monthly_returns::simulation::{self, Preset, ReturnDistribution, SimulationParams, TailSeverity};

/// Preset (or configured) parameters with individual flags layered on top
fn build_params(args: &SimulateArgs, config: &Config) -> Result<SimulationParams> {
    let mut params = match args.preset.as_deref() {
        Some(name) => {
            let preset = name.parse::<Preset>().map_err(|e| anyhow!(e))?;
            SimulationParams {
                simulations: config.simulation.simulations,
                seed: config.simulation.seed,
                ..preset.params()
            }
        }
        None => config.simulation.clone(),
    };

    if let Some(initial) = args.initial {
        params.initial_balance = initial;
    }
    if let Some(contribution) = args.contribution {
        params.monthly_contribution = contribution;
    }
    if let Some(annual_return) = args.annual_return {
        params.annual_return = annual_return;
    }
    if let Some(volatility) = args.volatility {
        params.annual_volatility = volatility;
    }
    if let Some(years) = args.years {
        params.years = years;
    }
    if let Some(simulations) = args.simulations {
        params.simulations = simulations;
    }
    if let Some(distribution) = args.distribution.as_deref() {
        params.distribution = distribution.parse::<ReturnDistribution>().map_err(|_| {
            anyhow!("Invalid distribution '{}'. Use: normal, fat-tailed", distribution)
        })?;
    }
    if let Some(tails) = args.tail_severity.as_deref() {
        params.tail_severity = tails
            .parse::<TailSeverity>()
            .map_err(|_| anyhow!("Invalid tail severity '{}'. Use: standard, extreme", tails))?;
    }
    if args.seed.is_some() {
        params.seed = args.seed;
    }

    Ok(params)
}

pub fn dispatch_simulate(args: &SimulateArgs, config: &Config, json_output: bool) -> Result<()> {
    if args.list_presets {
        if json_output {
            let presets: Vec<_> = Preset::all()
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "name": p.as_str(),
                        "description": p.description(),
                        "params": p.params(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&presets)?);
        } else {
            print!("{}", format_presets());
        }
        return Ok(());
    }

    let params = build_params(args, config)?;
    info!(
        "Simulating {} paths over {} years",
        params.simulations, params.years
    );
    let result = simulation::run(&params)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", format_simulation(&result));
    }
    Ok(())
}
