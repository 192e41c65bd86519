use std::{fs::File, path::PathBuf};

use csv::StringRecord;
use tariff_core::MeterRecord;
use time::{format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime};

use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};

/// CSV source for monthly `MeterRecord`s.
///
/// Columns are found by header name, case-insensitively. Each field accepts
/// its snake_case name or the column name of the utility export:
///
/// | field | export column |
/// |---|---|
/// | service_no | SERVICE_NO |
/// | client_name | CUST_NAME |
/// | region, division | REGION, DIVISION |
/// | agency | AGENCE |
/// | reading_date (`YYYY-MM-DD`, optionally followed by a time, or RFC3339) | READING_DATE |
/// | subscribed_power | SUBSCRIPTION_LOAD |
/// | peak_power_reached | PUISSANCE_ATTEINTE |
/// | total_consumption | MV_CONSUMPTION |
/// | off_peak_import, off_peak_export | ACTIVE_OFF_PEAK_IMP, ACTIVE_OFF_PEAK_EXP |
/// | peak_import, peak_export | ACTIVE_PEAK_IMP, ACTIVE_PEAK_EXP |
/// | amount_without_tax, amount_with_tax | AMOUNT_WITHOUT_TAX, AMOUNT_WITH_TAX |
/// | power_factor (optional) | COSPHI |
/// | power_factor_penalty (optional) | COSPHI_PENALTY |
///
/// A malformed row is reported as an error item and reading continues.
pub struct MeterRecordCsvFileSource {
    path: PathBuf,
    delimiter: u8,
}

impl MeterRecordCsvFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            delimiter: b',',
        }
    }

    /// Semicolon-separated exports are common in French locales.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

struct Columns<'a> {
    headers: &'a StringRecord,
    record: &'a StringRecord,
}

impl<'a> Columns<'a> {
    fn find(&self, names: [&str; 2]) -> Option<&'a str> {
        self.headers
            .iter()
            .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
            .and_then(|idx| self.record.get(idx))
            .map(str::trim)
    }

    fn text(&self, names: [&str; 2]) -> Result<String, PipelineError> {
        self.find(names)
            .map(str::to_string)
            .ok_or_else(|| PipelineError::Source(format!("missing column '{}' in CSV record", names[0])))
    }

    fn number(&self, names: [&str; 2]) -> Result<f64, PipelineError> {
        let raw = self
            .find(names)
            .ok_or_else(|| PipelineError::Source(format!("missing column '{}' in CSV record", names[0])))?;
        parse_number(raw)
            .ok_or_else(|| PipelineError::Source(format!("invalid {} '{raw}'", names[0])))
    }

    fn optional_number(&self, names: [&str; 2]) -> Result<Option<f64>, PipelineError> {
        match self.find(names) {
            None | Some("") => Ok(None),
            Some(raw) => parse_number(raw)
                .map(Some)
                .ok_or_else(|| PipelineError::Source(format!("invalid {} '{raw}'", names[0]))),
        }
    }
}

/// Accepts a decimal comma when no dot is present.
fn parse_number(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) if !raw.contains('.') => raw.replace(',', ".").parse().ok(),
        Err(_) => None,
    }
}

pub(crate) fn parse_reading_date(raw: &str) -> Result<Date, PipelineError> {
    let raw = raw.trim();
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(ts.date());
    }
    let day = raw.get(..10).unwrap_or(raw);
    Date::parse(day, format_description!("[year]-[month]-[day]"))
        .map_err(|e| PipelineError::Source(format!("invalid reading_date '{raw}': {e}")))
}

fn record_to_meter_record(
    record: &StringRecord,
    headers: &StringRecord,
) -> Result<MeterRecord, PipelineError> {
    let c = Columns { headers, record };

    Ok(MeterRecord {
        service_no: c.text(["service_no", "SERVICE_NO"])?,
        client_name: c.text(["client_name", "CUST_NAME"])?,
        region: c.find(["region", "REGION"]).unwrap_or_default().to_string(),
        division: c.find(["division", "DIVISION"]).unwrap_or_default().to_string(),
        agency: c.find(["agency", "AGENCE"]).unwrap_or_default().to_string(),
        reading_date: parse_reading_date(&c.text(["reading_date", "READING_DATE"])?)?,
        subscribed_power: c.number(["subscribed_power", "SUBSCRIPTION_LOAD"])?,
        peak_power_reached: c.number(["peak_power_reached", "PUISSANCE_ATTEINTE"])?,
        total_consumption: c.number(["total_consumption", "MV_CONSUMPTION"])?,
        off_peak_import: c.number(["off_peak_import", "ACTIVE_OFF_PEAK_IMP"])?,
        off_peak_export: c.number(["off_peak_export", "ACTIVE_OFF_PEAK_EXP"])?,
        peak_import: c.number(["peak_import", "ACTIVE_PEAK_IMP"])?,
        peak_export: c.number(["peak_export", "ACTIVE_PEAK_EXP"])?,
        amount_without_tax: c.number(["amount_without_tax", "AMOUNT_WITHOUT_TAX"])?,
        amount_with_tax: c.number(["amount_with_tax", "AMOUNT_WITH_TAX"])?,
        power_factor: c.optional_number(["power_factor", "COSPHI"])?,
        power_factor_penalty: c.optional_number(["power_factor_penalty", "COSPHI_PENALTY"])?,
    })
}

#[async_trait::async_trait]
impl Source<MeterRecord> for MeterRecordCsvFileSource {
    async fn stream(&self) -> EnvelopeStream<MeterRecord> {
        // Blocking reader inside a single task; uploads are a few hundred rows.
        let path = self.path.clone();
        let delimiter = self.delimiter;
        let s = async_stream::stream! {
            let file = match File::open(&path) {
                Ok(f) => f,
                Err(e) => {
                    yield Err(PipelineError::Source(format!(
                        "failed to open CSV file {}: {e}", path.display()
                    )));
                    return;
                }
            };
            let mut rdr = csv::ReaderBuilder::new().delimiter(delimiter).from_reader(file);
            let headers = match rdr.headers() {
                Ok(h) => h.clone(),
                Err(e) => {
                    yield Err(PipelineError::Source(format!("failed to read CSV headers: {e}")));
                    return;
                }
            };

            for (idx, result) in rdr.records().enumerate() {
                let position = idx as u64 + 1;
                let parsed = result
                    .map_err(|e| PipelineError::Source(format!("failed to read CSV record {position}: {e}")))
                    .and_then(|record| record_to_meter_record(&record, &headers));

                match parsed {
                    Ok(record) => {
                        yield Ok(Envelope::new(record, position));
                    }
                    Err(e) => {
                        metrics::counter!("meter_record_csv_parse_errors_total").increment(1);
                        yield Err(e);
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
    use crate::test_support::temp_file;
    use futures::StreamExt;
    use time::macros::date;

    #[test]
    fn reading_dates_accept_common_shapes() {
        assert_eq!(parse_reading_date("2024-03-31").unwrap(), date!(2024 - 03 - 31));
        assert_eq!(
            parse_reading_date("2024-03-31 00:00:00").unwrap(),
            date!(2024 - 03 - 31)
        );
        assert_eq!(
            parse_reading_date("2024-03-31T10:00:00Z").unwrap(),
            date!(2024 - 03 - 31)
        );
        assert!(parse_reading_date("31/03/2024").is_err());
    }

    #[test]
    fn numbers_accept_decimal_comma() {
        assert_eq!(parse_number("0,87"), Some(0.87));
        assert_eq!(parse_number(" 3102.5 "), Some(3102.5));
        assert_eq!(parse_number("1,000.5"), None);
        assert_eq!(parse_number(""), None);
    }

    #[tokio::test]
    async fn reads_export_headers_and_skips_bad_rows() {
        let path = temp_file(
            "export.csv",
            "SERVICE_NO,CUST_NAME,REGION,DIVISION,AGENCE,READING_DATE,SUBSCRIPTION_LOAD,PUISSANCE_ATTEINTE,MV_CONSUMPTION,ACTIVE_OFF_PEAK_IMP,ACTIVE_OFF_PEAK_EXP,ACTIVE_PEAK_IMP,ACTIVE_PEAK_EXP,AMOUNT_WITHOUT_TAX,AMOUNT_WITH_TAX,COSPHI\n\
             SRV-001,Cimenterie,Littoral,Wouri,Bassa,2024-01-31,3000,3102,1500000,1000000,0,500000,0,80000000,95400000,0.91\n\
             SRV-001,Cimenterie,Littoral,Wouri,Bassa,2024-02-29,3000,abc,1500000,1000000,0,500000,0,80000000,95400000,\n\
             SRV-001,Cimenterie,Littoral,Wouri,Bassa,2024-03-31,3000,2950,1400000,900000,0,500000,0,78000000,93000000,\n",
        );

        let items: Vec<_> = MeterRecordCsvFileSource::new(&path).stream().await.collect().await;
        assert_eq!(items.len(), 3);

        let first = items[0].as_ref().unwrap();
        assert_eq!(first.position, 1);
        assert_eq!(first.payload.service_no, "SRV-001");
        assert_eq!(first.payload.reading_date, date!(2024 - 01 - 31));
        assert_eq!(first.payload.peak_power_reached, 3102.0);
        assert_eq!(first.payload.power_factor, Some(0.91));

        assert!(matches!(items[1], Err(PipelineError::Source(_))));

        let third = items[2].as_ref().unwrap();
        assert_eq!(third.position, 3);
        assert_eq!(third.payload.power_factor, None);
        assert_eq!(third.payload.power_factor_penalty, None);
    }

    #[tokio::test]
    async fn reads_snake_case_headers_with_semicolons() {
        let path = temp_file(
            "snake.csv",
            "service_no;client_name;reading_date;subscribed_power;peak_power_reached;total_consumption;off_peak_import;off_peak_export;peak_import;peak_export;amount_without_tax;amount_with_tax\n\
             SRV-9;Brasserie;2023-06-30;450;430,5;120000;80000;0;40000;0;9000000;10732500\n",
        );

        let items: Vec<_> = MeterRecordCsvFileSource::new(&path)
            .with_delimiter(b';')
            .stream()
            .await
            .collect()
            .await;
        let record = &items[0].as_ref().unwrap().payload;
        assert_eq!(record.peak_power_reached, 430.5);
        assert_eq!(record.region, "");
        assert_eq!(record.amount_with_tax, 10_732_500.0);
    }

    #[tokio::test]
    async fn missing_file_is_a_single_source_error() {
        let items: Vec<_> = MeterRecordCsvFileSource::new("/nonexistent/releves.csv")
            .stream()
            .await
            .collect()
            .await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(PipelineError::Source(_))));
    }
}
