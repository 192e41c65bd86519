use std::path::PathBuf;

use tariff_core::MeterRecord;
use time::{Date, Month};

/// Writes `contents` to a per-process file under the system temp dir.
pub fn temp_file(name: &str, contents: &str) -> PathBuf {
    let path = temp_dir(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Fresh per-process path under the system temp dir, removed if present.
pub fn temp_dir(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("billing-service-{}-{name}", std::process::id()));
    if path.is_dir() {
        std::fs::remove_dir_all(&path).unwrap();
    }
    path
}

pub fn record(service_no: &str, year: i32, month: u8, subscribed: f64, peak: f64) -> MeterRecord {
    MeterRecord {
        service_no: service_no.to_string(),
        client_name: "Cimenterie du Littoral".to_string(),
        region: "Littoral".to_string(),
        division: "Wouri".to_string(),
        agency: "Bassa".to_string(),
        reading_date: Date::from_calendar_date(year, Month::try_from(month).unwrap(), 28).unwrap(),
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
