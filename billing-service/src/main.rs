use anyhow::Result;
use billing_service::{
    config::{AppConfig, InputFormat},
    metrics_server,
    observability,
    pipeline::{EnvelopeStream, Pipeline, Source},
    reports::{write_reports, ReportExporter},
    session::{InMemorySessionStore, SessionManager, UploadOutcome},
    sinks::SessionSink,
    sources::{MeterRecordCsvFileSource, MeterRecordNdjsonFileSource},
    transform,
};
use std::sync::Arc;
use tariff_core::{BillingCalculator, MeterRecord, PowerOptimizer};

enum InputSource {
    Csv(MeterRecordCsvFileSource),
    Ndjson(MeterRecordNdjsonFileSource),
}

#[async_trait::async_trait]
impl Source<MeterRecord> for InputSource {
    async fn stream(&self) -> EnvelopeStream<MeterRecord> {
        match self {
            Self::Csv(s) => s.stream().await,
            Self::Ndjson(s) => s.stream().await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let input = &cfg.input;
    let source = match input.format {
        InputFormat::Csv => InputSource::Csv(MeterRecordCsvFileSource::new(&input.path)),
        InputFormat::Ndjson => InputSource::Ndjson(MeterRecordNdjsonFileSource::new(&input.path)),
    };
    let pipeline: Pipeline<_, MeterRecord, _> = Pipeline {
        source,
        transforms: vec![Arc::new(transform::MeterRecordValidation)],
        sink: SessionSink,
    };
    let batch = pipeline.run().await?;

    let calculator = BillingCalculator::new(Default::default(), cfg.billing.clone());
    let sessions = SessionManager::new(InMemorySessionStore::new(), calculator.clone());
    let key = input.session_key.as_str();

    match sessions.ingest(key, batch).await? {
        UploadOutcome::Processed { service, rows, unbilled, dropped, duplicates } => {
            tracing::info!(
                service_no = %service.service_no,
                rows,
                unbilled,
                dropped,
                duplicates,
                "input processed"
            );
        }
        UploadOutcome::SelectionRequired { services } => {
            let Some(service_no) = input.service_no.as_deref() else {
                for s in &services {
                    tracing::info!(
                        service_no = %s.service_no,
                        client_name = %s.client_name,
                        rows = s.rows,
                        "service available"
                    );
                }
                anyhow::bail!(
                    "input holds {} services; set input.service_no to pick one",
                    services.len()
                );
            };
            sessions.select_service(key, service_no).await?;
        }
    }

    let table = sessions.processed(key).await?;
    let fingerprint = sessions.fingerprint(key).await.unwrap_or_default();
    let exporter = ReportExporter::new(&cfg.reports.output_dir, fingerprint);
    let optimizer = PowerOptimizer::new(calculator.clone(), cfg.optimizer.sweep.clone());

    let summary = write_reports(
        &calculator,
        &optimizer,
        &table,
        &cfg.reports.years,
        &cfg.optimizer,
        &exporter,
    )?;
    tracing::info!(
        output_dir = %exporter.output_dir().display(),
        written = summary.written.len(),
        skipped = summary.skipped.len(),
        failed = summary.failed.len(),
        "reports done"
    );
    for failure in &summary.failed {
        tracing::warn!(%failure, "report not produced");
    }

    sessions.clear(key).await;
    Ok(())
}
