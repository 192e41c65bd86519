use serde::Serialize;

use crate::{
    domain::MeterRecord,
    tariff::{ClientClass, TariffRates, UsageBucket},
};

/// Outcome of checking the real invoice against the computed one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", content = "amount", rename_all = "snake_case")]
pub enum Reconstitution {
    /// Gap within tolerance: the real amount with tax is accepted.
    Validated(f64),
    /// Gap above tolerance: the data point cannot be validated.
    Anomaly,
    /// Record predates the reconciliation model.
    OutOfScope,
}

impl Reconstitution {
    pub fn amount(self) -> Option<f64> {
        match self {
            Reconstitution::Validated(v) => Some(v),
            Reconstitution::Anomaly | Reconstitution::OutOfScope => None,
        }
    }
}

/// Every figure derived from a [`MeterRecord`] by the billing calculator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Billing {
    /// Year whose tariffs were applied; differs from the reading year in projections.
    pub tariff_year: i32,
    pub off_peak_consumption: f64,
    pub peak_consumption: f64,
    pub rounded_peak_power: f64,
    pub power_to_use: f64,
    pub overrun: f64,
    pub overrun_ratio: f64,
    pub operating_hours: f64,
    pub coefficient: f64,
    pub category: u8,
    pub class: ClientClass,
    pub bucket: UsageBucket,
    /// Escalated rates.
    pub rates: TariffRates,
    pub off_peak_charge: f64,
    pub peak_charge: f64,
    pub fixed_charge: f64,
    pub invoice_before_tax: f64,
    pub invoice_with_tax: f64,
    /// Rounded computed invoice minus real invoice, zero before the reference year.
    pub gap: f64,
    pub reconstitution: Reconstitution,
}

impl Billing {
    /// The rounded peak exceeded the subscription, so the bill used a higher power.
    pub fn exceeds_subscription(&self, subscribed_power: f64) -> bool {
        self.rounded_peak_power > subscribed_power
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRecord {
    pub record: MeterRecord,
    pub billing: Billing,
}
