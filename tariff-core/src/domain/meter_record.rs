use serde::{Deserialize, Serialize};
use time::Date;

time::serde::format_description!(reading_date_format, Date, "[year]-[month]-[day]");

/// One billing month of one service, as supplied by the utility export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterRecord {
    pub service_no: String,
    pub client_name: String,
    pub region: String,
    pub division: String,
    pub agency: String,
    #[serde(with = "reading_date_format")]
    pub reading_date: Date,
    /// Contracted power (kW), constant over a calendar year.
    pub subscribed_power: f64,
    /// Maximum power drawn during the month (kW).
    pub peak_power_reached: f64,
    /// Total metered consumption (kWh).
    pub total_consumption: f64,
    pub off_peak_import: f64,
    pub off_peak_export: f64,
    pub peak_import: f64,
    pub peak_export: f64,
    pub amount_without_tax: f64,
    pub amount_with_tax: f64,
    #[serde(default)]
    pub power_factor: Option<f64>,
    #[serde(default)]
    pub power_factor_penalty: Option<f64>,
}

impl MeterRecord {
    pub fn year(&self) -> i32 {
        self.reading_date.year()
    }

    /// Calendar month, 1 to 12.
    pub fn month(&self) -> u8 {
        u8::from(self.reading_date.month())
    }

    pub fn off_peak_consumption(&self) -> f64 {
        (self.off_peak_import + self.off_peak_export).max(0.0)
    }

    pub fn peak_consumption(&self) -> f64 {
        (self.peak_import + self.peak_export).max(0.0)
    }

    /// kW above the subscription, zero when the subscription was respected.
    pub fn overrun(&self) -> f64 {
        (self.peak_power_reached - self.subscribed_power).max(0.0)
    }

    /// A copy of this record billed under another subscription.
    pub fn with_subscribed_power(&self, subscribed_power: f64) -> Self {
        Self {
            subscribed_power,
            ..self.clone()
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use time::Month;

    pub fn record(year: i32, month: u8, subscribed: f64, peak: f64) -> MeterRecord {
        MeterRecord {
            service_no: "SRV-001".to_string(),
            client_name: "Cimenterie du Littoral".to_string(),
            region: "Littoral".to_string(),
            division: "Wouri".to_string(),
            agency: "Bassa".to_string(),
            reading_date: Date::from_calendar_date(year, Month::try_from(month).unwrap(), 28)
                .unwrap(),
            subscribed_power: subscribed,
            peak_power_reached: peak,
            total_consumption: 1_500_000.0,
            off_peak_import: 1_000_000.0,
            off_peak_export: 0.0,
            peak_import: 500_000.0,
            peak_export: 0.0,
            amount_without_tax: 80_000_000.0,
            amount_with_tax: 95_400_000.0,
            power_factor: None,
            power_factor_penalty: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::record;

    #[test]
    fn energy_splits_are_floored_at_zero() {
        let mut r = record(2024, 3, 3000.0, 2900.0);
        r.peak_import = 100.0;
        r.peak_export = -250.0;
        r.off_peak_import = 10.0;
        r.off_peak_export = 5.0;
        assert_eq!(r.peak_consumption(), 0.0);
        assert_eq!(r.off_peak_consumption(), 15.0);
    }

    #[test]
    fn overrun_only_counts_excess() {
        assert_eq!(record(2024, 1, 3000.0, 3102.0).overrun(), 102.0);
        assert_eq!(record(2024, 1, 3000.0, 2800.0).overrun(), 0.0);
    }

    #[test]
    fn reading_date_serializes_as_plain_date() {
        let r = record(2025, 7, 1000.0, 900.0);
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"reading_date\":\"2025-07-28\""));

        let back: super::MeterRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.year(), 2025);
        assert_eq!(back.month(), 7);
    }
}
