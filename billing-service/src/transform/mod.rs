use crate::pipeline::{Envelope, PipelineError, Transform};
use tariff_core::MeterRecord;
use time::{macros::date, Date};

const MIN_READING_DATE: Date = date!(2000 - 01 - 01);
const MAX_READING_DATE: Date = date!(2100 - 01 - 01);

/// Pure validation of a `MeterRecord`.
///
/// Rules:
/// - service number must be present.
/// - powers, consumption and amounts must be finite and non-negative;
///   optional power factor fields too when present.
/// - import/export energies must be finite; their sum is floored at zero
///   when billed, so a negative direction is kept.
/// - reading date must fall in [2000-01-01, 2100-01-01).
///
/// Records are rejected, never coerced.
pub fn validate_meter_record(env: Envelope<MeterRecord>) -> Result<Envelope<MeterRecord>, PipelineError> {
    let m = &env.payload;
    let reject = |reason: String| PipelineError::Transform {
        position: env.position,
        reason,
    };

    if m.service_no.trim().is_empty() {
        return Err(reject("service_no must not be empty".to_string()));
    }

    let energies = [
        ("off_peak_import", m.off_peak_import),
        ("off_peak_export", m.off_peak_export),
        ("peak_import", m.peak_import),
        ("peak_export", m.peak_export),
    ];
    for (name, v) in energies {
        if !v.is_finite() {
            return Err(reject(format!("{name} must be finite, got {v}")));
        }
    }

    let values = [
        ("subscribed_power", Some(m.subscribed_power)),
        ("peak_power_reached", Some(m.peak_power_reached)),
        ("total_consumption", Some(m.total_consumption)),
        ("amount_without_tax", Some(m.amount_without_tax)),
        ("amount_with_tax", Some(m.amount_with_tax)),
        ("power_factor", m.power_factor),
        ("power_factor_penalty", m.power_factor_penalty),
    ];
    for (name, value) in values {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                return Err(reject(format!("{name} must be finite and non-negative, got {v}")));
            }
        }
    }

    if m.reading_date < MIN_READING_DATE || m.reading_date >= MAX_READING_DATE {
        return Err(reject(format!("reading_date {} out of allowed range", m.reading_date)));
    }

    Ok(env)
}

#[derive(Clone, Default)]
pub struct MeterRecordValidation;

#[async_trait::async_trait]
impl Transform<MeterRecord, MeterRecord> for MeterRecordValidation {
    async fn apply(
        &self,
        input: Envelope<MeterRecord>,
    ) -> Result<Envelope<MeterRecord>, PipelineError> {
        match validate_meter_record(input) {
            Ok(env) => Ok(env),
            Err(e) => {
                metrics::counter!("billing_records_rejected_total").increment(1);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::record;

    fn envelope(m: MeterRecord) -> Envelope<MeterRecord> {
        Envelope::new(m, 7)
    }

    #[test]
    fn meter_record_validation_accepts_valid_record() {
        let res = validate_meter_record(envelope(record("SRV-001", 2024, 1, 3000.0, 3102.0)));
        assert!(res.is_ok());
    }

    #[test]
    fn meter_record_validation_keeps_negative_export() {
        let mut m = record("SRV-001", 2024, 1, 3000.0, 3102.0);
        m.off_peak_export = -20_000.0;
        m.peak_import = 1_000.0;
        m.peak_export = -5_000.0;
        let env = validate_meter_record(envelope(m)).unwrap();
        assert_eq!(env.payload.off_peak_consumption(), 980_000.0);
        assert_eq!(env.payload.peak_consumption(), 0.0);
    }

    #[test]
    fn meter_record_validation_rejects_negative_consumption() {
        let mut m = record("SRV-001", 2024, 1, 3000.0, 3102.0);
        m.total_consumption = -0.1;
        let res = validate_meter_record(envelope(m));
        assert!(matches!(
            res,
            Err(PipelineError::Transform { position: 7, ref reason }) if reason.starts_with("total_consumption")
        ));

        let mut m = record("SRV-001", 2024, 1, 3000.0, 3102.0);
        m.peak_export = f64::NEG_INFINITY;
        assert!(validate_meter_record(envelope(m)).is_err());
    }

    #[test]
    fn meter_record_validation_rejects_non_finite_values() {
        let mut m = record("SRV-001", 2024, 1, 3000.0, 3102.0);
        m.amount_with_tax = f64::NAN;
        assert!(validate_meter_record(envelope(m)).is_err());

        let mut m = record("SRV-001", 2024, 1, 3000.0, 3102.0);
        m.power_factor = Some(f64::INFINITY);
        assert!(validate_meter_record(envelope(m)).is_err());
    }

    #[test]
    fn meter_record_validation_rejects_out_of_range_date() {
        let m = record("SRV-001", 1999, 12, 3000.0, 3102.0);
        assert!(matches!(
            validate_meter_record(envelope(m)),
            Err(PipelineError::Transform { .. })
        ));
        let m = record("SRV-001", 2100, 1, 3000.0, 3102.0);
        assert!(validate_meter_record(envelope(m)).is_err());
    }

    #[test]
    fn meter_record_validation_rejects_blank_service() {
        let m = record("  ", 2024, 1, 3000.0, 3102.0);
        assert!(validate_meter_record(envelope(m)).is_err());
    }
}
