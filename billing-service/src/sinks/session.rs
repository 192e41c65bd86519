use std::collections::HashSet;

use futures::{Stream, StreamExt};
use tariff_core::MeterRecord;

use crate::pipeline::{Envelope, PipelineError, Sink};

fn hash_str(hasher: &mut blake3::Hasher, s: &str) {
    hasher.update(&(s.len() as u32).to_le_bytes());
    hasher.update(s.as_bytes());
}

fn hash_f64(hasher: &mut blake3::Hasher, v: f64) {
    hasher.update(&v.to_bits().to_le_bytes());
}

fn hash_opt_f64(hasher: &mut blake3::Hasher, v: Option<f64>) {
    match v {
        Some(x) => {
            hasher.update(&[1]);
            hash_f64(hasher, x);
        }
        None => {
            hasher.update(&[0]);
        }
    }
}

/// Content hash over every field of a record.
pub fn record_fingerprint(m: &MeterRecord) -> blake3::Hash {
    let mut h = blake3::Hasher::new();
    hash_str(&mut h, &m.service_no);
    hash_str(&mut h, &m.client_name);
    hash_str(&mut h, &m.region);
    hash_str(&mut h, &m.division);
    hash_str(&mut h, &m.agency);
    h.update(&m.reading_date.to_julian_day().to_le_bytes());
    for v in [
        m.subscribed_power,
        m.peak_power_reached,
        m.total_consumption,
        m.off_peak_import,
        m.off_peak_export,
        m.peak_import,
        m.peak_export,
        m.amount_without_tax,
        m.amount_with_tax,
    ] {
        hash_f64(&mut h, v);
    }
    hash_opt_f64(&mut h, m.power_factor);
    hash_opt_f64(&mut h, m.power_factor_penalty);
    h.finalize()
}

/// Records accepted from one upload.
#[derive(Debug, Clone, Default)]
pub struct IngestedBatch {
    pub records: Vec<MeterRecord>,
    pub duplicates: usize,
    /// Rows dropped upstream (unreadable or failing validation).
    pub rejected: usize,
    /// Hash of the accepted records' fingerprints, in input order.
    pub fingerprint: String,
}

/// Collects an upload in memory, dropping exact duplicate rows.
#[derive(Debug, Default)]
pub struct SessionSink;

#[async_trait::async_trait]
impl Sink<MeterRecord> for SessionSink {
    type Output = IngestedBatch;

    async fn run<S>(&self, mut input: S) -> Result<IngestedBatch, PipelineError>
    where
        S: Stream<Item = Result<Envelope<MeterRecord>, PipelineError>> + Send + Unpin + 'static,
    {
        let mut seen = HashSet::new();
        let mut batch_hash = blake3::Hasher::new();
        let mut batch = IngestedBatch::default();

        while let Some(item) = input.next().await {
            let env = match item {
                Ok(env) => env,
                Err(e) => {
                    tracing::error!(error = %e, "record dropped before session sink");
                    batch.rejected += 1;
                    continue;
                }
            };

            let fingerprint = record_fingerprint(&env.payload);
            if !seen.insert(fingerprint) {
                tracing::debug!(position = env.position, "duplicate record skipped");
                batch.duplicates += 1;
                continue;
            }
            batch_hash.update(fingerprint.as_bytes());
            batch.records.push(env.payload);
        }

        batch.fingerprint = batch_hash.finalize().to_hex().to_string();
        metrics::counter!("billing_records_ingested_total").increment(batch.records.len() as u64);
        metrics::counter!("billing_records_duplicate_total").increment(batch.duplicates as u64);
        tracing::info!(
            records = batch.records.len(),
            duplicates = batch.duplicates,
            rejected = batch.rejected,
            "upload collected"
        );
        Ok(batch)
    }
}
