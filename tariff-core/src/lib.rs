pub mod calculator;
pub mod domain;
pub mod error;
pub mod optimizer;
pub mod params;
pub mod profile;
pub mod reconciliation;
pub mod synthesis;
pub mod tariff;

pub use calculator::BillingCalculator;
pub use domain::{MeterRecord, ProcessedTable, YearOutcome};
pub use error::{BillingError, OptimizerError, ReportError};
pub use optimizer::{PowerOptimizer, SearchBounds};
pub use params::{BillingParameters, SweepParameters};
pub use reconciliation::ReconciliationEngine;
