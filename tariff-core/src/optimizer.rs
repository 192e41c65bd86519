//! Subscribed power search.
//!
//! Every figure comes from [`PowerOptimizer::evaluate`]: the grid sweep, the
//! manual simulation and the year projection all bill the same records the
//! same way, so a power evaluated in the sweep and simulated by hand yields
//! identical monthly bills.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    calculator::{rounded_peak_power, BillingCalculator},
    domain::{Billing, MeterRecord, ProcessedTable, RowStatus, YearOutcome},
    error::{OptimizerError, ReportError},
    params::SweepParameters,
};

/// Candidate grid: `lower_kw`, `lower_kw + step_kw`, ... up to the first
/// value at or above `upper_kw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchBounds {
    pub lower_kw: u32,
    pub upper_kw: u32,
    pub step_kw: u32,
}

impl SearchBounds {
    fn validate(&self) -> Result<(), OptimizerError> {
        if self.step_kw == 0 || self.lower_kw == 0 || self.lower_kw > self.upper_kw {
            return Err(OptimizerError::InvalidBounds {
                lower_kw: self.lower_kw,
                upper_kw: self.upper_kw,
                step_kw: self.step_kw,
            });
        }
        Ok(())
    }

    pub fn candidate_count(&self) -> usize {
        if self.step_kw == 0 || self.lower_kw > self.upper_kw {
            return 0;
        }
        let span = u64::from(self.upper_kw - self.lower_kw);
        let step = u64::from(self.step_kw);
        usize::try_from((span + step - 1) / step + 1).unwrap_or(usize::MAX)
    }

    pub fn candidates(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.candidate_count() as u64).filter_map(move |k| {
            u32::try_from(u64::from(self.lower_kw) + k * u64::from(self.step_kw)).ok()
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerStatistics {
    pub min: f64,
    pub mean: f64,
    pub p90: f64,
    pub max: f64,
}

impl PowerStatistics {
    fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;

        let pos = 0.9 * (n - 1) as f64;
        let lo = pos.floor() as usize;
        let hi = pos.ceil() as usize;
        let p90 = sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64);

        Some(Self {
            min: sorted[0],
            mean,
            p90,
            max: sorted[n - 1],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CandidateStatus {
    Complete,
    Partial { failed_months: Vec<u8> },
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthEvaluation {
    pub month: u8,
    pub peak_power_reached: f64,
    pub real_invoice: f64,
    /// Rounded peak above the evaluated subscription.
    pub overrun: bool,
    pub billing: Option<Billing>,
    pub status: RowStatus,
}

/// Months below the evaluated power's reach.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Undersized {
    pub max_peak_reached: f64,
    pub overrun_months: usize,
}

/// One year of records billed under a single subscribed power.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Simulation {
    pub power: f64,
    pub source_year: i32,
    pub tariff_year: i32,
    pub months: Vec<MonthEvaluation>,
    pub total_cost: f64,
    pub mean_monthly_cost: f64,
    pub overruns: usize,
    pub real_cost: f64,
    pub savings_vs_real: f64,
    pub savings_vs_real_pct: f64,
    pub undersized: Option<Undersized>,
    pub status: CandidateStatus,
}

impl Simulation {
    fn billed_months(&self) -> usize {
        self.months.iter().filter(|m| m.billing.is_some()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateEvaluation {
    pub power: u32,
    pub total_cost: f64,
    pub mean_monthly_cost: f64,
    pub overruns: usize,
    pub status: CandidateStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyComparison {
    pub month: u8,
    pub peak_power_reached: f64,
    pub current_category: Option<u8>,
    pub optimal_category: Option<u8>,
    pub current_invoice: Option<f64>,
    pub optimal_invoice: Option<f64>,
    pub saving: Option<f64>,
    pub gain_pct: Option<f64>,
    pub current_overrun: bool,
    pub optimal_overrun: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationReport {
    pub year: i32,
    pub bounds: SearchBounds,
    pub statistics: PowerStatistics,
    pub current_power: f64,
    pub optimal_power: u32,
    /// Absent when the recorded subscription is not a billable power.
    pub current_cost: Option<f64>,
    pub optimal_cost: f64,
    pub savings: Option<f64>,
    pub savings_pct: Option<f64>,
    pub candidates: Vec<CandidateEvaluation>,
    /// Empty without a current cost.
    pub monthly: Vec<MonthlyComparison>,
    pub optimal: Simulation,
}

impl OptimizationReport {
    pub fn cost_by_candidate(&self) -> BTreeMap<u32, f64> {
        self.candidates
            .iter()
            .map(|c| (c.power, c.total_cost))
            .collect()
    }

    pub fn overruns_by_candidate(&self) -> BTreeMap<u32, usize> {
        self.candidates.iter().map(|c| (c.power, c.overruns)).collect()
    }
}

/// Same records and power, billed with the tariffs of another year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub power: f64,
    pub source_year: i32,
    pub target_year: i32,
    pub baseline: Simulation,
    pub projected: Simulation,
    pub cost_increase: f64,
    pub cost_increase_pct: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PowerOptimizer {
    calculator: BillingCalculator,
    sweep: SweepParameters,
}

impl PowerOptimizer {
    pub fn new(calculator: BillingCalculator, sweep: SweepParameters) -> Self {
        Self { calculator, sweep }
    }

    /// Default grid for a year of records, or `None` without records.
    pub fn default_bounds(&self, records: &[&MeterRecord]) -> Option<SearchBounds> {
        let first = records.first()?;
        let step = self.sweep.step_kw.max(1);
        let peaks: Vec<f64> = records.iter().map(|r| r.peak_power_reached).collect();
        let stats = PowerStatistics::of(&peaks)?;

        let current = first.subscribed_power.trunc() as i64;
        let lower = ((0.8 * stats.mean).trunc() as i64).min(current - 100);
        let lower = lower.div_euclid(i64::from(step)) * i64::from(step);
        let lower = lower.max(i64::from(step));

        let table_top = self
            .calculator
            .table()
            .bands()
            .last()
            .map(|b| b.max_kw)
            .unwrap_or(f64::MAX);
        let upper = (1.15 * stats.max).ceil().min(table_top - 1.0) as i64;
        let upper = upper.max(lower);

        Some(SearchBounds {
            lower_kw: u32::try_from(lower).unwrap_or(u32::MAX),
            upper_kw: u32::try_from(upper).unwrap_or(u32::MAX),
            step_kw: step,
        })
    }

    /// Bills `records` under `power` with the tariffs of `tariff_year`.
    pub fn evaluate(
        &self,
        records: &[&MeterRecord],
        source_year: i32,
        tariff_year: i32,
        power: f64,
    ) -> Result<Simulation, OptimizerError> {
        if !power.is_finite() || power <= 0.0 {
            return Err(OptimizerError::InvalidCandidate { power });
        }

        let mut months = Vec::with_capacity(records.len());
        let mut total_cost = 0.0;
        let mut real_cost = 0.0;
        let mut overruns = 0;
        let mut failed_months = Vec::new();

        for record in records {
            let overrun = rounded_peak_power(record.peak_power_reached) > power;
            if overrun {
                overruns += 1;
            }
            let candidate = record.with_subscribed_power(power);
            let (billing, status) = match self.calculator.bill(&candidate, tariff_year) {
                Ok(billing) => {
                    total_cost += billing.invoice_with_tax;
                    real_cost += record.amount_with_tax;
                    (Some(billing), RowStatus::Computed)
                }
                Err(error) => {
                    failed_months.push(record.month());
                    (None, RowStatus::Failed { error })
                }
            };
            months.push(MonthEvaluation {
                month: record.month(),
                peak_power_reached: record.peak_power_reached,
                real_invoice: record.amount_with_tax,
                overrun,
                billing,
                status,
            });
        }

        let billed = months.len() - failed_months.len();
        let status = if failed_months.is_empty() {
            CandidateStatus::Complete
        } else if billed == 0 {
            CandidateStatus::Failed
        } else {
            CandidateStatus::Partial { failed_months }
        };

        let max_peak_reached = records
            .iter()
            .map(|r| r.peak_power_reached)
            .fold(f64::NEG_INFINITY, f64::max);
        let undersized = (power < max_peak_reached).then(|| Undersized {
            max_peak_reached,
            overrun_months: records
                .iter()
                .filter(|r| r.peak_power_reached > power)
                .count(),
        });

        let savings_vs_real = real_cost - total_cost;
        Ok(Simulation {
            power,
            source_year,
            tariff_year,
            months,
            total_cost,
            mean_monthly_cost: if billed > 0 {
                total_cost / billed as f64
            } else {
                0.0
            },
            overruns,
            real_cost,
            savings_vs_real,
            savings_vs_real_pct: if real_cost > 0.0 {
                savings_vs_real / real_cost * 100.0
            } else {
                0.0
            },
            undersized,
            status,
        })
    }

    /// Manual mode: one caller-chosen power over a year of records.
    pub fn simulate(
        &self,
        table: &ProcessedTable,
        year: i32,
        power: f64,
    ) -> Result<YearOutcome<Simulation>, OptimizerError> {
        let records = table.records_for_year(year);
        if records.is_empty() {
            return Ok(YearOutcome::NoData { year });
        }
        let simulation = self.evaluate(&records, year, year, power)?;
        if simulation.status == CandidateStatus::Failed {
            return Err(ReportError::BatchFailed {
                year,
                failures: records.len(),
            }
            .into());
        }
        Ok(YearOutcome::Ready(simulation))
    }

    /// Holds the power fixed and bills `source_year` records at `target_year` tariffs.
    /// Without an explicit power, the current subscription is used.
    pub fn project(
        &self,
        table: &ProcessedTable,
        source_year: i32,
        target_year: i32,
        power: Option<f64>,
    ) -> Result<YearOutcome<Projection>, OptimizerError> {
        let records = table.records_for_year(source_year);
        let Some(first) = records.first() else {
            return Ok(YearOutcome::NoData { year: source_year });
        };
        let power = power.unwrap_or(first.subscribed_power);

        let baseline = self.evaluate(&records, source_year, source_year, power)?;
        let projected = self.evaluate(&records, source_year, target_year, power)?;
        if projected.status == CandidateStatus::Failed {
            return Err(ReportError::BatchFailed {
                year: source_year,
                failures: records.len(),
            }
            .into());
        }

        let cost_increase = projected.total_cost - baseline.total_cost;
        let cost_increase_pct = if baseline.total_cost > 0.0 {
            cost_increase / baseline.total_cost * 100.0
        } else {
            0.0
        };
        Ok(YearOutcome::Ready(Projection {
            power,
            source_year,
            target_year,
            baseline,
            projected,
            cost_increase,
            cost_increase_pct,
        }))
    }

    /// Sweeps the candidate grid and keeps the cheapest power.
    ///
    /// Candidates billing the most months compete; among them the strictly
    /// lowest cost wins and equal costs go to the lowest power.
    pub fn optimize(
        &self,
        table: &ProcessedTable,
        year: i32,
        bounds: Option<SearchBounds>,
    ) -> Result<YearOutcome<OptimizationReport>, OptimizerError> {
        let records = table.records_for_year(year);
        let (Some(first), Some(default_bounds)) = (records.first(), self.default_bounds(&records))
        else {
            return Ok(YearOutcome::NoData { year });
        };
        let current_power = first.subscribed_power;

        let bounds = bounds.unwrap_or(default_bounds);
        bounds.validate()?;
        let count = bounds.candidate_count();
        if count > self.sweep.max_candidates {
            return Err(OptimizerError::SearchTooWide {
                candidates: count,
                limit: self.sweep.max_candidates,
            });
        }
        tracing::debug!(
            year,
            lower_kw = bounds.lower_kw,
            upper_kw = bounds.upper_kw,
            step_kw = bounds.step_kw,
            candidates = count,
            "sweeping subscribed power"
        );

        let mut candidates = Vec::with_capacity(count);
        let mut best: Option<(usize, Simulation)> = None;
        for power in bounds.candidates() {
            let simulation = self.evaluate(&records, year, year, f64::from(power))?;
            candidates.push(CandidateEvaluation {
                power,
                total_cost: simulation.total_cost,
                mean_monthly_cost: simulation.mean_monthly_cost,
                overruns: simulation.overruns,
                status: simulation.status.clone(),
            });

            let billed = simulation.billed_months();
            if billed == 0 {
                continue;
            }
            let better = match &best {
                None => true,
                Some((best_billed, best_sim)) => {
                    billed > *best_billed
                        || (billed == *best_billed && simulation.total_cost < best_sim.total_cost)
                }
            };
            if better {
                best = Some((billed, simulation));
            }
        }

        let Some((_, optimal)) = best else {
            return Err(OptimizerError::NoViableCandidate { year });
        };
        let current = if current_power.is_finite() && current_power > 0.0 {
            Some(self.evaluate(&records, year, year, current_power)?)
        } else {
            tracing::warn!(
                year,
                current_power,
                "recorded subscription not billable, current cost skipped"
            );
            None
        };

        let current_cost = current.as_ref().map(|c| c.total_cost);
        let savings = current_cost.map(|c| c - optimal.total_cost);
        let savings_pct = current_cost.zip(savings).map(|(c, s)| {
            if c > 0.0 {
                s / c * 100.0
            } else {
                0.0
            }
        });
        let monthly = current
            .map(|current| {
                current
                    .months
                    .iter()
                    .zip(&optimal.months)
                    .map(|(cur, opt)| compare_month(cur, opt))
                    .collect()
            })
            .unwrap_or_default();
        let peaks: Vec<f64> = records.iter().map(|r| r.peak_power_reached).collect();
        let statistics = PowerStatistics::of(&peaks).ok_or(OptimizerError::NoViableCandidate { year })?;

        Ok(YearOutcome::Ready(OptimizationReport {
            year,
            bounds,
            statistics,
            current_power,
            optimal_power: optimal.power as u32,
            current_cost,
            optimal_cost: optimal.total_cost,
            savings,
            savings_pct,
            candidates,
            monthly,
            optimal,
        }))
    }
}

fn compare_month(current: &MonthEvaluation, optimal: &MonthEvaluation) -> MonthlyComparison {
    let current_invoice = current.billing.as_ref().map(|b| b.invoice_with_tax);
    let optimal_invoice = optimal.billing.as_ref().map(|b| b.invoice_with_tax);
    let saving = current_invoice.zip(optimal_invoice).map(|(c, o)| c - o);
    let gain_pct = current_invoice
        .zip(saving)
        .filter(|(c, _)| *c != 0.0)
        .map(|(c, s)| s / c * 100.0);

    MonthlyComparison {
        month: current.month,
        peak_power_reached: current.peak_power_reached,
        current_category: current.billing.as_ref().map(|b| b.category),
        optimal_category: optimal.billing.as_ref().map(|b| b.category),
        current_invoice,
        optimal_invoice,
        saving,
        gain_pct,
        current_overrun: current.overrun,
        optimal_overrun: optimal.overrun,
    }
}
