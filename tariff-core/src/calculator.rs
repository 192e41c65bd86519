use crate::{
    domain::{Billing, EnrichedRecord, MeterRecord, ProcessedRow, ProcessedTable, Reconstitution},
    error::BillingError,
    params::{BillingParameters, PEAK_POWER_ROUNDING_KW},
    tariff::{ClientClass, EscalationModel, TariffTable, UsageBucket},
};

/// Peak power rounded up to the next multiple of 5 kW, unchanged on exact multiples.
pub fn rounded_peak_power(peak: f64) -> f64 {
    let rem = peak.rem_euclid(PEAK_POWER_ROUNDING_KW);
    if rem == 0.0 {
        peak
    } else {
        peak - rem + PEAK_POWER_ROUNDING_KW
    }
}

/// Power actually billed: never below the subscription.
pub fn power_to_use(subscribed: f64, peak: f64) -> f64 {
    subscribed.max(rounded_peak_power(peak))
}

pub fn overrun_ratio(subscribed: f64, peak: f64) -> f64 {
    if peak - subscribed > 0.0 {
        (peak - subscribed) / (peak + subscribed)
    } else {
        0.0
    }
}

/// Turns raw monthly records into fully billed records.
#[derive(Debug, Clone, Default)]
pub struct BillingCalculator {
    table: TariffTable,
    escalation: EscalationModel,
    params: BillingParameters,
}

impl BillingCalculator {
    pub fn new(table: TariffTable, params: BillingParameters) -> Self {
        Self {
            escalation: EscalationModel::new(&params),
            table,
            params,
        }
    }

    pub fn table(&self) -> &TariffTable {
        &self.table
    }

    pub fn escalation(&self) -> &EscalationModel {
        &self.escalation
    }

    pub fn params(&self) -> &BillingParameters {
        &self.params
    }

    /// Bills `record` with the tariffs of `year_override`, or of its own reading year.
    pub fn enrich(
        &self,
        record: &MeterRecord,
        year_override: Option<i32>,
    ) -> Result<EnrichedRecord, BillingError> {
        let billing = self.bill(record, year_override.unwrap_or_else(|| record.year()))?;
        Ok(EnrichedRecord {
            record: record.clone(),
            billing,
        })
    }

    /// Enriches every record; failed rows are kept with their error.
    pub fn process(&self, records: Vec<MeterRecord>) -> ProcessedTable {
        let rows = records
            .into_iter()
            .map(|record| match self.enrich(&record, None) {
                Ok(enriched) => ProcessedRow::Enriched(enriched),
                Err(error) => {
                    tracing::warn!(
                        service_no = %record.service_no,
                        reading_date = %record.reading_date,
                        error = %error,
                        "record could not be billed"
                    );
                    ProcessedRow::Rejected { record, error }
                }
            })
            .collect();
        ProcessedTable::new(rows)
    }

    pub fn bill(&self, record: &MeterRecord, tariff_year: i32) -> Result<Billing, BillingError> {
        let rounded_peak_power = rounded_peak_power(record.peak_power_reached);
        let power_to_use = record.subscribed_power.max(rounded_peak_power);
        if !power_to_use.is_finite() || power_to_use <= 0.0 {
            return Err(BillingError::InvalidPower {
                power: power_to_use,
            });
        }

        let overrun = record.overrun();
        let overrun_ratio = overrun_ratio(record.subscribed_power, record.peak_power_reached);
        let operating_hours = (record.total_consumption / power_to_use).round();

        let category = self
            .table
            .classify(power_to_use)
            .ok_or(BillingError::UnclassifiablePower {
                power: power_to_use,
            })?;
        let class = ClientClass::of_category(category);
        let bucket = UsageBucket::select(class, operating_hours);
        let coefficient = self.escalation.coefficient(tariff_year, power_to_use);
        let rates = self.table.rate(category, bucket)?.escalated(coefficient);

        let off_peak_consumption = record.off_peak_consumption();
        let peak_consumption = record.peak_consumption();
        let off_peak_charge = off_peak_consumption * rates.off_peak;
        let peak_charge = peak_consumption * rates.peak;
        let fixed_charge = power_to_use * rates.fixed;
        let invoice_before_tax = off_peak_charge + peak_charge + fixed_charge;
        let invoice_with_tax = invoice_before_tax * (1.0 + self.params.vat_rate);
        let (gap, reconstitution) =
            self.check_invoice(record.year(), invoice_with_tax, record.amount_with_tax);

        Ok(Billing {
            tariff_year,
            off_peak_consumption,
            peak_consumption,
            rounded_peak_power,
            power_to_use,
            overrun,
            overrun_ratio,
            operating_hours,
            coefficient,
            category,
            class,
            bucket,
            rates,
            off_peak_charge,
            peak_charge,
            fixed_charge,
            invoice_before_tax,
            invoice_with_tax,
            gap,
            reconstitution,
        })
    }

    /// Gap of the rounded computed invoice against the real one, and whether
    /// the real amount can be accepted.
    pub fn check_invoice(
        &self,
        reading_year: i32,
        computed_with_tax: f64,
        real_with_tax: f64,
    ) -> (f64, Reconstitution) {
        if reading_year < self.params.reference_year {
            return (0.0, Reconstitution::OutOfScope);
        }
        let gap = computed_with_tax.round() - real_with_tax;
        if gap.abs() <= self.params.gap_tolerance {
            (gap, Reconstitution::Validated(real_with_tax))
        } else {
            (gap, Reconstitution::Anomaly)
        }
    }
}
