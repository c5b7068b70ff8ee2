//! Monthly returns - portfolio return reconstruction
//!
//! This library rebuilds month-end portfolio values from a brokerage
//! transaction feed and month-end prices, derives monthly, total and
//! annualized returns, compares them with a weighted benchmark and projects
//! contribution plans with a Monte Carlo simulator.

pub mod config;
pub mod error;
pub mod importers;
pub mod models;
pub mod reports;
pub mod simulation;
pub mod utils;
pub mod warnings;
