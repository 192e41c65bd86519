use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Serialize;
use tariff_core::{
    profile::profile,
    synthesis::{summarize, summarize_scenario},
    tariff::TariffGrid,
    BillingCalculator, PowerOptimizer, ProcessedTable, ReconciliationEngine, YearOutcome,
};
use time::OffsetDateTime;

use crate::config::OptimizerConfig;

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("report io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("report serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct ReportEnvelope<'a, T: Serialize> {
    report: &'a str,
    year: Option<i32>,
    #[serde(with = "time::serde::rfc3339")]
    generated_at: OffsetDateTime,
    input_fingerprint: &'a str,
    data: &'a T,
}

/// Writes pretty JSON reports, one file per report and year.
#[derive(Debug, Clone)]
pub struct ReportExporter {
    output_dir: PathBuf,
    input_fingerprint: String,
}

impl ReportExporter {
    pub fn new(output_dir: impl Into<PathBuf>, input_fingerprint: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            input_fingerprint: input_fingerprint.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn write<T: Serialize>(
        &self,
        report: &str,
        year: Option<i32>,
        data: &T,
    ) -> Result<PathBuf, ExportError> {
        if !self.output_dir.exists() {
            fs::create_dir_all(&self.output_dir)?;
        }
        let file_name = match year {
            Some(y) => format!("{report}_{y}.json"),
            None => format!("{report}.json"),
        };
        let path = self.output_dir.join(file_name);

        let envelope = ReportEnvelope {
            report,
            year,
            generated_at: OffsetDateTime::now_utc(),
            input_fingerprint: &self.input_fingerprint,
            data,
        };
        fs::write(&path, serde_json::to_string_pretty(&envelope)?)?;

        metrics::counter!("billing_reports_written_total").increment(1);
        tracing::debug!(path = %path.display(), "report written");
        Ok(path)
    }
}

#[derive(Debug, Default)]
pub struct ReportSummary {
    pub written: Vec<PathBuf>,
    /// Reports not produced because their year holds no records.
    pub skipped: Vec<String>,
    /// Reports that could not be computed, with the reason.
    pub failed: Vec<String>,
}

impl ReportSummary {
    fn record<T: Serialize, E: std::fmt::Display>(
        &mut self,
        exporter: &ReportExporter,
        report: &str,
        year: Option<i32>,
        outcome: Result<YearOutcome<T>, E>,
    ) -> Result<(), ExportError> {
        let label = match year {
            Some(y) => format!("{report} {y}"),
            None => report.to_string(),
        };
        match outcome {
            Ok(YearOutcome::Ready(data)) => {
                self.written.push(exporter.write(report, year, &data)?);
            }
            Ok(YearOutcome::NoData { year }) => {
                tracing::info!(report, year, "no data for year, report skipped");
                self.skipped.push(label);
            }
            Err(e) => {
                tracing::warn!(report, ?year, error = %e, "report could not be computed");
                self.failed.push(format!("{label}: {e}"));
            }
        }
        Ok(())
    }
}

/// Produces every report for the table: the client profile, then per year
/// the tariff grid, reconciliation and synthesis, then the power search on
/// the optimized year with its optional manual simulation and projection.
///
/// Computation failures are logged and listed; only export errors abort.
pub fn write_reports(
    calculator: &BillingCalculator,
    optimizer: &PowerOptimizer,
    table: &ProcessedTable,
    years: &[i32],
    plan: &OptimizerConfig,
    exporter: &ReportExporter,
) -> Result<ReportSummary, ExportError> {
    let mut summary = ReportSummary::default();
    let years = if years.is_empty() {
        table.years()
    } else {
        years.to_vec()
    };

    summary.record(exporter, "profile", None, profile(calculator, table, None))?;

    let reconciliation = ReconciliationEngine::new(calculator.params());
    for &year in &years {
        let grid = TariffGrid::for_year(calculator.table(), calculator.escalation(), year);
        summary.written.push(exporter.write("tariff_grid", Some(year), &grid)?);
        summary.record(
            exporter,
            "reconciliation",
            Some(year),
            reconciliation.reconcile(table, year),
        )?;
        summary.record(exporter, "synthesis", Some(year), summarize(table, year))?;
    }

    let Some(year) = plan.year.or_else(|| table.latest_year()) else {
        return Ok(summary);
    };

    let optimized = optimizer.optimize(table, year, plan.bounds());
    if let Ok(YearOutcome::Ready(report)) = &optimized {
        tracing::info!(
            year,
            current_kw = report.current_power,
            optimal_kw = report.optimal_power,
            savings = ?report.savings,
            "subscribed power optimized"
        );
        summary.written.push(exporter.write(
            "optimized_synthesis",
            Some(year),
            &summarize_scenario(table, &report.optimal),
        )?);
    }
    summary.record(exporter, "optimization", Some(year), optimized)?;

    if let Some(power) = plan.simulate_kw {
        let simulated = optimizer.simulate(table, year, power);
        if let Ok(YearOutcome::Ready(sim)) = &simulated {
            summary.written.push(exporter.write(
                "simulated_synthesis",
                Some(year),
                &summarize_scenario(table, sim),
            )?);
        }
        summary.record(exporter, "simulation", Some(year), simulated)?;
    }

    if let Some(target) = plan.projection_year {
        let projected = optimizer.project(table, year, target, None);
        summary.record(exporter, "projection", Some(target), projected)?;
    }

    Ok(summary)
}
