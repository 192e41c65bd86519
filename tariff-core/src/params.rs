use serde::{Deserialize, Serialize};

/// Value added tax applied on top of the computed before-tax invoice.
pub const VAT_RATE: f64 = 0.1925;

/// Tariff base year. Rates are published for this year and escalate after it.
/// Records older than this year are outside the reconciliation model.
pub const REFERENCE_YEAR: i32 = 2023;

/// Yearly escalation for small clients (power-to-use below [`LARGE_CLIENT_THRESHOLD_KW`]).
pub const SMALL_CLIENT_ESCALATION_RATE: f64 = 1.05;

/// Yearly escalation for large clients.
pub const LARGE_CLIENT_ESCALATION_RATE: f64 = 1.10;

/// Power-to-use from which a client is billed as a large client.
pub const LARGE_CLIENT_THRESHOLD_KW: f64 = 3000.0;

/// Maximum absolute gap between computed and real invoice for the real
/// invoice to be accepted as reconstituted.
pub const GAP_TOLERANCE: f64 = 3_000_000.0;

/// Monthly gaps strictly below this magnitude are displayed as zero.
pub const DISPLAY_NOISE_THRESHOLD: f64 = 100.0;

/// Peak power reached is rounded up to a multiple of this value.
pub const PEAK_POWER_ROUNDING_KW: f64 = 5.0;

/// Default grid step for the subscribed power sweep.
pub const SWEEP_STEP_KW: u32 = 10;

/// Upper bound on the number of candidates a single sweep may evaluate.
pub const MAX_SWEEP_CANDIDATES: usize = 2_000;

/// Runtime billing parameters.
///
/// Every field defaults to the named constant of the same meaning, so a
/// partially filled configuration section only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingParameters {
    pub vat_rate: f64,
    pub reference_year: i32,
    pub small_client_escalation_rate: f64,
    pub large_client_escalation_rate: f64,
    pub large_client_threshold_kw: f64,
    pub gap_tolerance: f64,
    pub display_noise_threshold: f64,
}

impl Default for BillingParameters {
    fn default() -> Self {
        Self {
            vat_rate: VAT_RATE,
            reference_year: REFERENCE_YEAR,
            small_client_escalation_rate: SMALL_CLIENT_ESCALATION_RATE,
            large_client_escalation_rate: LARGE_CLIENT_ESCALATION_RATE,
            large_client_threshold_kw: LARGE_CLIENT_THRESHOLD_KW,
            gap_tolerance: GAP_TOLERANCE,
            display_noise_threshold: DISPLAY_NOISE_THRESHOLD,
        }
    }
}

/// Parameters of the subscribed power sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepParameters {
    pub step_kw: u32,
    pub max_candidates: usize,
}

impl Default for SweepParameters {
    fn default() -> Self {
        Self {
            step_kw: SWEEP_STEP_KW,
            max_candidates: MAX_SWEEP_CANDIDATES,
        }
    }
}
