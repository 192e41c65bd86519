use std::path::PathBuf;

use async_stream::stream;
use tariff_core::MeterRecord;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};

use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};

/// NDJSON source for `MeterRecord`s.
///
/// One JSON object per line, shaped like the serialized `MeterRecord`
/// (`reading_date` as `YYYY-MM-DD`, `power_factor` fields optional).
/// Blank lines are skipped; a malformed line is reported and reading continues.
pub struct MeterRecordNdjsonFileSource {
    path: PathBuf,
}

impl MeterRecordNdjsonFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl Source<MeterRecord> for MeterRecordNdjsonFileSource {
    async fn stream(&self) -> EnvelopeStream<MeterRecord> {
        let path = self.path.clone();
        let s = stream! {
            let file = match File::open(&path).await {
                Ok(f) => f,
                Err(e) => {
                    yield Err(PipelineError::Source(format!(
                        "failed to open NDJSON file {}: {e}", path.display()
                    )));
                    return;
                }
            };
            let mut lines = BufReader::new(file).lines();
            let mut position = 0u64;

            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(PipelineError::Source(format!("failed to read NDJSON line: {e}")));
                        break;
                    }
                };
                position += 1;
                if line.trim().is_empty() {
                    continue;
                }

                match serde_json::from_str::<MeterRecord>(&line) {
                    Ok(record) => {
                        yield Ok(Envelope::new(record, position));
                    }
                    Err(e) => {
                        metrics::counter!("meter_record_ndjson_parse_errors_total").increment(1);
                        yield Err(PipelineError::Source(format!(
                            "failed to parse NDJSON line {position}: {e}"
                        )));
                    }
                }
            }
        };

        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{record, temp_file};
    use futures::StreamExt;

    #[tokio::test]
    async fn reads_lines_and_reports_bad_ones() {
        let good = serde_json::to_string(&record("SRV-001", 2024, 1, 3000.0, 3102.0)).unwrap();
        let mut with_pf = record("SRV-001", 2024, 2, 3000.0, 2900.0);
        with_pf.power_factor = Some(0.88);
        let with_pf = serde_json::to_string(&with_pf).unwrap();
        let path = temp_file(
            "records.ndjson",
            &format!("{good}\n\n{{\"service_no\": 12}}\n{with_pf}\n"),
        );

        let items: Vec<_> = MeterRecordNdjsonFileSource::new(&path)
            .stream()
            .await
            .collect()
            .await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap().payload.peak_power_reached, 3102.0);
        assert!(matches!(items[1], Err(PipelineError::Source(_))));

        let last = items[2].as_ref().unwrap();
        assert_eq!(last.position, 4);
        assert_eq!(last.payload.power_factor, Some(0.88));
    }

    #[tokio::test]
    async fn optional_fields_may_be_omitted() {
        let line = r#"{"service_no":"SRV-2","client_name":"Hotel","region":"Centre","division":"Mfoundi","agency":"Yaounde","reading_date":"2023-05-31","subscribed_power":450,"peak_power_reached":430,"total_consumption":120000,"off_peak_import":80000,"off_peak_export":0,"peak_import":40000,"peak_export":0,"amount_without_tax":9000000,"amount_with_tax":10732500}"#;
        let path = temp_file("minimal.ndjson", line);

        let items: Vec<_> = MeterRecordNdjsonFileSource::new(&path)
            .stream()
            .await
            .collect()
            .await;
        let record = &items[0].as_ref().unwrap().payload;
        assert_eq!(record.year(), 2023);
        assert_eq!(record.power_factor, None);
        assert_eq!(record.power_factor_penalty, None);
    }
}
