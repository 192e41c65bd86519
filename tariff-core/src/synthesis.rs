//! Annual indicator tables: one row per indicator, one column per month.

use serde::Serialize;

use crate::{
    domain::{MeterRecord, ProcessedRow, ProcessedTable, YearOutcome},
    error::ReportError,
    optimizer::Simulation,
};

/// Indicators whose monthly values add up to a meaningful annual figure.
/// Hours, powers and power factors are never totalled.
pub const SUMMABLE_INDICATORS: &[&str] = &[
    "energy_kwh",
    "peak_energy_kwh",
    "off_peak_energy_kwh",
    "amount_without_tax",
    "power_factor_penalty",
    "amount_with_tax",
    "gap_vs_real",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    Energy,
    PeakEnergy,
    OffPeakEnergy,
    PeakPowerReached,
    PowerToUse,
    SubscribedPower,
    OperatingHours,
    PowerFactor,
    AmountWithoutTax,
    PowerFactorPenalty,
    AmountWithTax,
    GapVsReal,
}

impl Indicator {
    pub fn name(self) -> &'static str {
        match self {
            Indicator::Energy => "energy_kwh",
            Indicator::PeakEnergy => "peak_energy_kwh",
            Indicator::OffPeakEnergy => "off_peak_energy_kwh",
            Indicator::PeakPowerReached => "peak_power_reached_kw",
            Indicator::PowerToUse => "power_to_use_kw",
            Indicator::SubscribedPower => "subscribed_power_kw",
            Indicator::OperatingHours => "operating_hours",
            Indicator::PowerFactor => "power_factor",
            Indicator::AmountWithoutTax => "amount_without_tax",
            Indicator::PowerFactorPenalty => "power_factor_penalty",
            Indicator::AmountWithTax => "amount_with_tax",
            Indicator::GapVsReal => "gap_vs_real",
        }
    }

    pub fn is_summable(self) -> bool {
        SUMMABLE_INDICATORS.contains(&self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisRow {
    pub indicator: Indicator,
    pub name: &'static str,
    /// January first; `None` for months without data.
    pub months: [Option<f64>; 12],
    pub annual: Option<f64>,
}

impl SynthesisRow {
    fn new(indicator: Indicator, months: [Option<f64>; 12]) -> Self {
        let annual = indicator
            .is_summable()
            .then(|| months.iter().flatten().sum::<f64>());
        Self {
            indicator,
            name: indicator.name(),
            months,
            annual,
        }
    }

    /// Row holding one value all year, reported as such in the annual column.
    fn constant(indicator: Indicator, months: [Option<f64>; 12], value: f64) -> Self {
        Self {
            annual: Some(value),
            ..Self::new(indicator, months)
        }
    }

    pub fn month(&self, month: u8) -> Option<f64> {
        self.months.get(usize::from(month).checked_sub(1)?).copied().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisTable {
    pub year: i32,
    pub client_name: String,
    pub rows: Vec<SynthesisRow>,
    /// Months present in the input but not billed.
    pub failed_months: Vec<u8>,
}

impl SynthesisTable {
    pub fn row(&self, indicator: Indicator) -> Option<&SynthesisRow> {
        self.rows.iter().find(|r| r.indicator == indicator)
    }

    pub fn is_complete(&self) -> bool {
        self.failed_months.is_empty()
    }
}

/// First row of each calendar month.
fn by_month<T>(items: impl IntoIterator<Item = (u8, T)>) -> [Option<T>; 12] {
    let mut out: [Option<T>; 12] = std::array::from_fn(|_| None);
    for (month, item) in items {
        if let Some(slot) = out.get_mut(usize::from(month).saturating_sub(1)) {
            if slot.is_none() {
                *slot = Some(item);
            }
        }
    }
    out
}

fn column<T>(slots: &[Option<T>; 12], f: impl Fn(&T) -> Option<f64>) -> [Option<f64>; 12] {
    std::array::from_fn(|i| slots[i].as_ref().and_then(&f))
}

fn record_rows(records: &[Option<&MeterRecord>; 12], rows: &mut Vec<SynthesisRow>) {
    rows.push(SynthesisRow::new(
        Indicator::Energy,
        column(records, |r| Some(r.total_consumption)),
    ));
    rows.push(SynthesisRow::new(
        Indicator::PeakEnergy,
        column(records, |r| Some(r.peak_consumption())),
    ));
    rows.push(SynthesisRow::new(
        Indicator::OffPeakEnergy,
        column(records, |r| Some(r.off_peak_consumption())),
    ));
    rows.push(SynthesisRow::new(
        Indicator::PeakPowerReached,
        column(records, |r| Some(r.peak_power_reached)),
    ));
}

fn power_factor_rows(records: &[Option<&MeterRecord>; 12], rows: &mut Vec<SynthesisRow>) {
    let present = records.iter().flatten();
    if present.clone().any(|r| r.power_factor.is_some()) {
        rows.push(SynthesisRow::new(
            Indicator::PowerFactor,
            column(records, |r| r.power_factor),
        ));
    }
    if present.clone().any(|r| r.power_factor_penalty.is_some()) {
        rows.push(SynthesisRow::new(
            Indicator::PowerFactorPenalty,
            column(records, |r| r.power_factor_penalty),
        ));
    }
}

/// Annual synthesis of the recorded year.
///
/// Energies, peak and amounts come from the records themselves; billed power
/// and operating hours from the enrichment. Months whose record failed to
/// bill keep their recorded values and leave the derived cells empty.
pub fn summarize(
    table: &ProcessedTable,
    year: i32,
) -> Result<YearOutcome<SynthesisTable>, ReportError> {
    let rows = table.for_year(year);
    let Some(first) = rows.first() else {
        return Ok(YearOutcome::NoData { year });
    };
    let client_name = first.record().client_name.clone();

    let failed_months: Vec<u8> = rows
        .iter()
        .filter(|r| r.enriched().is_none())
        .map(|r| r.record().month())
        .collect();
    if failed_months.len() == rows.len() {
        return Err(ReportError::BatchFailed {
            year,
            failures: failed_months.len(),
        });
    }

    let slots: [Option<&ProcessedRow>; 12] =
        by_month(rows.iter().map(|r| (r.record().month(), *r)));
    let records: [Option<&MeterRecord>; 12] = std::array::from_fn(|i| slots[i].map(|r| r.record()));

    let mut out = Vec::with_capacity(11);
    record_rows(&records, &mut out);
    out.push(SynthesisRow::new(
        Indicator::PowerToUse,
        column(&slots, |r| r.enriched().map(|e| e.billing.power_to_use)),
    ));
    out.push(SynthesisRow::new(
        Indicator::OperatingHours,
        column(&slots, |r| r.enriched().map(|e| e.billing.operating_hours)),
    ));
    power_factor_rows(&records, &mut out);
    out.push(SynthesisRow::new(
        Indicator::AmountWithoutTax,
        column(&records, |r| Some(r.amount_without_tax)),
    ));
    out.push(SynthesisRow::new(
        Indicator::AmountWithTax,
        column(&records, |r| Some(r.amount_with_tax)),
    ));

    Ok(YearOutcome::Ready(SynthesisTable {
        year,
        client_name,
        rows: out,
        failed_months,
    }))
}

/// Synthesis of a simulated subscription over the records it was evaluated on.
///
/// Amounts are the simulated bills; the gap row is real minus simulated,
/// positive when the simulated power would have saved money.
pub fn summarize_scenario(table: &ProcessedTable, simulation: &Simulation) -> SynthesisTable {
    let records = table.records_for_year(simulation.source_year);
    let client_name = records
        .first()
        .map(|r| r.client_name.clone())
        .unwrap_or_default();
    let records: [Option<&MeterRecord>; 12] = by_month(records.into_iter().map(|r| (r.month(), r)));
    let months = by_month(simulation.months.iter().map(|m| (m.month, m)));
    let failed_months = simulation
        .months
        .iter()
        .filter(|m| m.billing.is_none())
        .map(|m| m.month)
        .collect();

    let mut out = Vec::with_capacity(12);
    record_rows(&records, &mut out);
    out.push(SynthesisRow::constant(
        Indicator::SubscribedPower,
        column(&months, |_| Some(simulation.power)),
        simulation.power,
    ));
    out.push(SynthesisRow::new(
        Indicator::OperatingHours,
        column(&months, |m| m.billing.as_ref().map(|b| b.operating_hours)),
    ));
    power_factor_rows(&records, &mut out);
    out.push(SynthesisRow::new(
        Indicator::AmountWithoutTax,
        column(&months, |m| m.billing.as_ref().map(|b| b.invoice_before_tax)),
    ));
    out.push(SynthesisRow::new(
        Indicator::AmountWithTax,
        column(&months, |m| m.billing.as_ref().map(|b| b.invoice_with_tax)),
    ));
    out.push(SynthesisRow::new(
        Indicator::GapVsReal,
        column(&months, |m| {
            m.billing.as_ref().map(|b| m.real_invoice - b.invoice_with_tax)
        }),
    ));

    SynthesisTable {
        year: simulation.source_year,
        client_name,
        rows: out,
        failed_months,
    }
}
