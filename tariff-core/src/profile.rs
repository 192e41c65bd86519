use serde::Serialize;

use crate::{
    calculator::BillingCalculator,
    domain::{MeterRecord, ProcessedTable, YearOutcome},
    error::{BillingError, ReportError},
    tariff::{quote, TariffQuote},
};

/// Power factor below which a month is flagged.
pub const POWER_FACTOR_FLOOR: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Spread {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl Spread {
    fn of(values: impl Iterator<Item = f64>) -> Option<Self> {
        let mut n = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            n += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        (n > 0).then(|| Self {
            min,
            max,
            mean: sum / n as f64,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerFactorSummary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub months_below_floor: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProfileTariff {
    Quoted(TariffQuote),
    Unavailable { error: BillingError },
}

/// Identity and energy profile of the loaded service for one year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientProfile {
    pub service_no: String,
    pub client_name: String,
    pub region: String,
    pub division: String,
    pub agency: String,
    /// Most recent first.
    pub years: Vec<i32>,
    pub year: i32,
    pub subscribed_power: f64,
    pub peak_power: Spread,
    pub consumption: Spread,
    pub mean_peak_energy: f64,
    pub mean_off_peak_energy: f64,
    pub peak_share_pct: f64,
    pub off_peak_share_pct: f64,
    pub mean_operating_hours: f64,
    pub power_factor: Option<PowerFactorSummary>,
    pub tariff: ProfileTariff,
}

fn power_factor_summary(records: &[&MeterRecord]) -> Option<PowerFactorSummary> {
    let values: Vec<f64> = records.iter().filter_map(|r| r.power_factor).collect();
    let spread = Spread::of(values.iter().copied())?;
    Some(PowerFactorSummary {
        mean: spread.mean,
        min: spread.min,
        max: spread.max,
        months_below_floor: values.iter().filter(|v| **v < POWER_FACTOR_FLOOR).count(),
    })
}

/// Builds the profile of `year`, or of the latest year when none is given.
///
/// The tariff is quoted for the subscribed power with the year's mean
/// operating hours, so the usage bucket matches what monthly billing uses.
pub fn profile(
    calculator: &BillingCalculator,
    table: &ProcessedTable,
    year: Option<i32>,
) -> Result<YearOutcome<ClientProfile>, ReportError> {
    let years = table.years();
    let Some(year) = year.or_else(|| years.first().copied()) else {
        return Err(ReportError::EmptyTable);
    };
    let records = table.records_for_year(year);
    let (Some(first), Some(peak_power), Some(consumption)) = (
        records.first(),
        Spread::of(records.iter().map(|r| r.peak_power_reached)),
        Spread::of(records.iter().map(|r| r.total_consumption)),
    ) else {
        return Ok(YearOutcome::NoData { year });
    };

    let n = records.len() as f64;
    let total_peak: f64 = records.iter().map(|r| r.peak_consumption()).sum();
    let total_off_peak: f64 = records.iter().map(|r| r.off_peak_consumption()).sum();
    let total_energy = total_peak + total_off_peak;
    let share = |part: f64| {
        if total_energy > 0.0 {
            part / total_energy * 100.0
        } else {
            0.0
        }
    };

    let subscribed_power = first.subscribed_power;
    let mean_operating_hours = if subscribed_power > 0.0 {
        (consumption.mean / subscribed_power).round()
    } else {
        0.0
    };
    let tariff = if subscribed_power > 0.0 {
        quote(
            calculator.table(),
            calculator.escalation(),
            subscribed_power,
            mean_operating_hours,
            year,
        )
    } else {
        Err(BillingError::InvalidPower {
            power: subscribed_power,
        })
    };
    let tariff = match tariff {
        Ok(q) => ProfileTariff::Quoted(q),
        Err(error) => ProfileTariff::Unavailable { error },
    };

    Ok(YearOutcome::Ready(ClientProfile {
        service_no: first.service_no.clone(),
        client_name: first.client_name.clone(),
        region: first.region.clone(),
        division: first.division.clone(),
        agency: first.agency.clone(),
        years,
        year,
        subscribed_power,
        peak_power,
        consumption,
        mean_peak_energy: total_peak / n,
        mean_off_peak_energy: total_off_peak / n,
        peak_share_pct: share(total_peak),
        off_peak_share_pct: share(total_off_peak),
        mean_operating_hours,
        power_factor: power_factor_summary(&records),
        tariff,
    }))
}
