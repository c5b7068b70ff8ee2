// Reports module - monthly aggregation, reconstruction, returns and benchmarks

pub mod analysis;
pub mod audit;
pub mod benchmark;
pub mod fees;
pub mod monthly;
pub mod positions;
pub mod reconcile;
pub mod returns;
pub mod statistics;

pub use analysis::{analyze, AnalysisInput, AnalysisOptions, AnalysisReport, OpeningPositions};
pub use audit::{audit_csv_string, write_audit_csv};
pub use benchmark::{normalize_allocation, returns_from_prices, Allocation, BenchmarkOptions};
pub use fees::{audit_fees, FeeAudit};
pub use monthly::{aggregate, AggregationOptions, CashFlowBasis};
pub use positions::{PriceSource, PriceTable, Reconstructor};
pub use returns::{PriceGapPolicy, ReturnMethod, ReturnOptions};
pub use statistics::ReturnStatistics;
