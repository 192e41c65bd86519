use serde::Serialize;

use crate::{
    domain::{EnrichedRecord, MeterRecord},
    error::BillingError,
};

/// Result of a whole-year operation when the year may be absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum YearOutcome<T> {
    NoData { year: i32 },
    Ready(T),
}

impl<T> YearOutcome<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            YearOutcome::Ready(v) => Some(v),
            YearOutcome::NoData { .. } => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, YearOutcome::NoData { .. })
    }
}

/// Per-row status carried by batch reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowStatus {
    Computed,
    Failed { error: BillingError },
}

impl RowStatus {
    pub fn is_computed(&self) -> bool {
        matches!(self, RowStatus::Computed)
    }
}

/// A record after the enrichment pass: billed, or rejected with its reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessedRow {
    Enriched(EnrichedRecord),
    Rejected {
        record: MeterRecord,
        error: BillingError,
    },
}

impl ProcessedRow {
    pub fn record(&self) -> &MeterRecord {
        match self {
            ProcessedRow::Enriched(e) => &e.record,
            ProcessedRow::Rejected { record, .. } => record,
        }
    }

    pub fn enriched(&self) -> Option<&EnrichedRecord> {
        match self {
            ProcessedRow::Enriched(e) => Some(e),
            ProcessedRow::Rejected { .. } => None,
        }
    }

    pub fn status(&self) -> RowStatus {
        match self {
            ProcessedRow::Enriched(_) => RowStatus::Computed,
            ProcessedRow::Rejected { error, .. } => RowStatus::Failed {
                error: error.clone(),
            },
        }
    }
}

/// Enriched table of one service, ordered by reading date.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessedTable {
    rows: Vec<ProcessedRow>,
}

impl ProcessedTable {
    pub fn new(mut rows: Vec<ProcessedRow>) -> Self {
        rows.sort_by_key(|r| r.record().reading_date);
        Self { rows }
    }

    pub fn rows(&self) -> &[ProcessedRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct reading years, most recent first.
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.rows.iter().map(|r| r.record().year()).collect();
        years.sort_unstable_by(|a, b| b.cmp(a));
        years.dedup();
        years
    }

    pub fn latest_year(&self) -> Option<i32> {
        self.years().first().copied()
    }

    pub fn for_year(&self, year: i32) -> Vec<&ProcessedRow> {
        self.rows
            .iter()
            .filter(|r| r.record().year() == year)
            .collect()
    }

    pub fn records_for_year(&self, year: i32) -> Vec<&MeterRecord> {
        self.for_year(year).into_iter().map(|r| r.record()).collect()
    }

    pub fn rejected(&self) -> impl Iterator<Item = &ProcessedRow> {
        self.rows
            .iter()
            .filter(|r| matches!(r, ProcessedRow::Rejected { .. }))
    }
}
