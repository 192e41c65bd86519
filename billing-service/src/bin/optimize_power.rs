use anyhow::{bail, Context, Result};
use billing_service::{
    observability,
    pipeline::Pipeline,
    sinks::SessionSink,
    sources::MeterRecordCsvFileSource,
    transform,
};
use std::{env, sync::Arc};
use tariff_core::{
    domain::{select_service, services},
    BillingCalculator, MeterRecord, PowerOptimizer, YearOutcome,
};

/// Reads a CSV of monthly readings and prints the power search of one year
/// as JSON. With `power_kw`, prints the manual simulation of that power instead.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: optimize_power <csv_file_path> [service_no] [year] [power_kw]");
    }
    let file_path = &args[1];
    let service_no = args.get(2).filter(|s| s.as_str() != "-");
    let year: Option<i32> = args.get(3).map(|y| y.parse()).transpose().context("invalid year")?;
    let power: Option<f64> = args
        .get(4)
        .map(|p| p.parse())
        .transpose()
        .context("invalid power_kw")?;

    let pipeline: Pipeline<_, MeterRecord, _> = Pipeline {
        source: MeterRecordCsvFileSource::new(file_path),
        transforms: vec![Arc::new(transform::MeterRecordValidation)],
        sink: SessionSink,
    };
    let batch = pipeline.run().await?;

    let records = match service_no {
        Some(s) => select_service(&batch.records, s),
        None => {
            let found = services(&batch.records);
            if found.len() > 1 {
                let listed: Vec<_> = found.iter().map(|s| s.service_no.as_str()).collect();
                bail!("file holds several services ({}); pass one", listed.join(", "));
            }
            batch.records
        }
    };
    if records.is_empty() {
        bail!("no usable records in {file_path}");
    }

    let calculator = BillingCalculator::default();
    let table = calculator.process(records);
    let Some(year) = year.or_else(|| table.latest_year()) else {
        bail!("no usable records in {file_path}");
    };
    let optimizer = PowerOptimizer::new(calculator, Default::default());

    let out = match power {
        Some(p) => match optimizer.simulate(&table, year, p)? {
            YearOutcome::Ready(sim) => serde_json::to_string_pretty(&sim)?,
            YearOutcome::NoData { year } => bail!("no records for {year}"),
        },
        None => match optimizer.optimize(&table, year, None)? {
            YearOutcome::Ready(report) => serde_json::to_string_pretty(&report)?,
            YearOutcome::NoData { year } => bail!("no records for {year}"),
        },
    };
    println!("{out}");

    Ok(())
}
