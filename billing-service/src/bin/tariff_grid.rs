use anyhow::{bail, Context, Result};
use billing_service::observability;
use std::env;
use tariff_core::{tariff::quote, BillingCalculator};

/// Prints the escalated tariff grid of a year, or with `power_kw` and
/// `operating_hours` the single applicable tariff, as JSON.
fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: tariff_grid <year> [power_kw operating_hours]");
    }
    let year: i32 = args[1].parse().context("invalid year")?;
    let calculator = BillingCalculator::default();

    let out = match (args.get(2), args.get(3)) {
        (Some(power), Some(hours)) => {
            let power: f64 = power.parse().context("invalid power_kw")?;
            let hours: f64 = hours.parse().context("invalid operating_hours")?;
            let q = quote(calculator.table(), calculator.escalation(), power, hours, year)?;
            serde_json::to_string_pretty(&q)?
        }
        (Some(_), None) => bail!("operating_hours is required with power_kw"),
        _ => {
            let grid = tariff_core::tariff::TariffGrid::for_year(
                calculator.table(),
                calculator.escalation(),
                year,
            );
            serde_json::to_string_pretty(&grid)?
        }
    };
    println!("{out}");

    Ok(())
}
