use serde::Serialize;

use crate::tariff::UsageBucket;

/// Failure to bill a single record or candidate.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BillingError {
    #[error("unclassifiable power: {power} kW is outside every tariff band")]
    UnclassifiablePower { power: f64 },
    #[error("no tariff defined for category {category} at {bucket}")]
    NoTariffDefined { category: u8, bucket: UsageBucket },
    #[error("usage bucket {bucket} does not apply to category {category}")]
    BucketNotInClass { category: u8, bucket: UsageBucket },
    #[error("invalid power: {power} kW cannot be billed")]
    InvalidPower { power: f64 },
}

/// Failure of the subscribed power search as a whole.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum OptimizerError {
    #[error("candidate power must be positive, got {power} kW")]
    InvalidCandidate { power: f64 },
    #[error("invalid search bounds: lower {lower_kw} kW, upper {upper_kw} kW, step {step_kw} kW")]
    InvalidBounds {
        lower_kw: u32,
        upper_kw: u32,
        step_kw: u32,
    },
    #[error("search range would evaluate {candidates} candidates, limit is {limit}")]
    SearchTooWide { candidates: usize, limit: usize },
    #[error("no candidate could be billed for year {year}")]
    NoViableCandidate { year: i32 },
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Failure of a whole-year batch report.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ReportError {
    #[error("every record of year {year} failed ({failures} records)")]
    BatchFailed { year: i32, failures: usize },
    #[error("no records loaded")]
    EmptyTable,
}
