use serde::Serialize;

use crate::{
    domain::{ProcessedRow, ProcessedTable, Reconstitution, RowStatus, YearOutcome},
    error::ReportError,
    params::BillingParameters,
};

/// Real versus recomputed invoice for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationRow {
    pub month: u8,
    pub subscribed_power: f64,
    pub peak_power_reached: f64,
    pub overrun: f64,
    pub consumption: f64,
    pub real_invoice: f64,
    pub category: Option<u8>,
    pub computed_invoice: Option<f64>,
    /// Rounded gap of the month, zero before the reference year.
    pub gap: Option<f64>,
    /// Gap with noise-level values shown as zero.
    pub display_gap: Option<f64>,
    pub has_gap: bool,
    pub reconstitution: Option<Reconstitution>,
    pub status: RowStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub year: i32,
    /// Totals cover billed months only.
    pub real_total: f64,
    pub computed_total: f64,
    /// Computed minus real over billed months, unrounded and for any year.
    pub gap_total: f64,
    pub gap_pct: f64,
    pub overrun_count: usize,
    pub complete: bool,
    pub rows: Vec<ReconciliationRow>,
}

#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    display_noise_threshold: f64,
}

impl ReconciliationEngine {
    pub fn new(params: &BillingParameters) -> Self {
        Self {
            display_noise_threshold: params.display_noise_threshold,
        }
    }

    pub fn display_gap(&self, gap: f64) -> f64 {
        if gap.abs() < self.display_noise_threshold {
            0.0
        } else {
            gap
        }
    }

    pub fn reconcile(
        &self,
        table: &ProcessedTable,
        year: i32,
    ) -> Result<YearOutcome<ReconciliationReport>, ReportError> {
        let rows = table.for_year(year);
        if rows.is_empty() {
            return Ok(YearOutcome::NoData { year });
        }

        let failures = rows.iter().filter(|r| r.enriched().is_none()).count();
        if failures == rows.len() {
            return Err(ReportError::BatchFailed { year, failures });
        }

        let mut real_total = 0.0;
        let mut computed_total = 0.0;
        let mut gap_total = 0.0;
        let mut overrun_count = 0;
        let mut out = Vec::with_capacity(rows.len());

        for row in rows {
            let record = row.record();
            if record.overrun() > 0.0 {
                overrun_count += 1;
            }

            let mut line = ReconciliationRow {
                month: record.month(),
                subscribed_power: record.subscribed_power,
                peak_power_reached: record.peak_power_reached,
                overrun: record.overrun(),
                consumption: record.total_consumption,
                real_invoice: record.amount_with_tax,
                category: None,
                computed_invoice: None,
                gap: None,
                display_gap: None,
                has_gap: false,
                reconstitution: None,
                status: row.status(),
            };

            if let ProcessedRow::Enriched(enriched) = row {
                let billing = &enriched.billing;
                real_total += record.amount_with_tax;
                computed_total += billing.invoice_with_tax;
                gap_total += billing.invoice_with_tax - record.amount_with_tax;

                let shown = self.display_gap(billing.gap);
                line.category = Some(billing.category);
                line.computed_invoice = Some(billing.invoice_with_tax);
                line.gap = Some(billing.gap);
                line.display_gap = Some(shown);
                line.has_gap = shown != 0.0;
                line.reconstitution = Some(billing.reconstitution);
            }
            out.push(line);
        }

        let gap_pct = if real_total > 0.0 {
            gap_total / real_total * 100.0
        } else {
            0.0
        };

        Ok(YearOutcome::Ready(ReconciliationReport {
            year,
            real_total,
            computed_total,
            gap_total,
            gap_pct,
            overrun_count,
            complete: failures == 0,
            rows: out,
        }))
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new(&BillingParameters::default())
    }
}
