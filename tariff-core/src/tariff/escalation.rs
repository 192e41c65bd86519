use crate::{params::BillingParameters, tariff::ClientClass};

/// Year-indexed multiplier applied to the reference-year base rates.
///
/// The coefficient is exactly `1.0` up to and including the reference year
/// and compounds yearly after it, at a rate that depends on the client class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EscalationModel {
    reference_year: i32,
    small_rate: f64,
    large_rate: f64,
    large_threshold_kw: f64,
}

impl EscalationModel {
    pub fn new(params: &BillingParameters) -> Self {
        Self {
            reference_year: params.reference_year,
            small_rate: params.small_client_escalation_rate,
            large_rate: params.large_client_escalation_rate,
            large_threshold_kw: params.large_client_threshold_kw,
        }
    }

    pub fn reference_year(&self) -> i32 {
        self.reference_year
    }

    /// Class used for escalation: large from the threshold power upward.
    pub fn class_for_power(&self, power: f64) -> ClientClass {
        if power < self.large_threshold_kw {
            ClientClass::Small
        } else {
            ClientClass::Large
        }
    }

    pub fn coefficient(&self, year: i32, power: f64) -> f64 {
        self.coefficient_for_class(year, self.class_for_power(power))
    }

    pub fn coefficient_for_class(&self, year: i32, class: ClientClass) -> f64 {
        if year <= self.reference_year {
            return 1.0;
        }
        let rate = match class {
            ClientClass::Small => self.small_rate,
            ClientClass::Large => self.large_rate,
        };
        rate.powi(year - self.reference_year)
    }
}

impl Default for EscalationModel {
    fn default() -> Self {
        Self::new(&BillingParameters::default())
    }
}
