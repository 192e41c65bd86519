use serde::Deserialize;
use std::{fs, path::PathBuf};
use tariff_core::{BillingParameters, SearchBounds, SweepParameters};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    #[default]
    Csv,
    Ndjson,
}

fn default_session_key() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub format: InputFormat,
    /// Service to keep when the file holds several.
    pub service_no: Option<String>,
    #[serde(default = "default_session_key")]
    pub session_key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OptimizerConfig {
    #[serde(flatten)]
    pub sweep: SweepParameters,
    /// Year to optimize; the latest year when absent.
    pub year: Option<i32>,
    pub lower_kw: Option<u32>,
    pub upper_kw: Option<u32>,
    /// Also simulate this power by hand.
    pub simulate_kw: Option<f64>,
    /// Also project the optimized year onto these tariffs.
    pub projection_year: Option<i32>,
}

impl OptimizerConfig {
    /// Explicit bounds when both ends are configured.
    pub fn bounds(&self) -> Option<SearchBounds> {
        Some(SearchBounds {
            lower_kw: self.lower_kw?,
            upper_kw: self.upper_kw?,
            step_kw: self.sweep.step_kw,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportsConfig {
    pub output_dir: PathBuf,
    /// Years to report on; every year of the input when empty.
    #[serde(default)]
    pub years: Vec<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub billing: BillingParameters,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    pub reports: ReportsConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("BILLING_CONFIG").unwrap_or_else(|_| "billing-config.toml".to_string());
        let contents = fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read config {path}: {e}"))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            [input]
            path = "data/releves.csv"

            [reports]
            output_dir = "out"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.input.format, InputFormat::Csv);
        assert_eq!(cfg.input.session_key, "default");
        assert_eq!(cfg.billing, BillingParameters::default());
        assert_eq!(cfg.optimizer.sweep, SweepParameters::default());
        assert!(cfg.optimizer.bounds().is_none());
        assert!(cfg.reports.years.is_empty());
        assert!(cfg.metrics.is_none());
    }

    #[test]
    fn partial_sections_override_named_fields_only() {
        let cfg = AppConfig::from_toml(
            r#"
            [input]
            path = "data/releves.ndjson"
            format = "ndjson"
            service_no = "SRV-001"

            [billing]
            vat_rate = 0.18
            gap_tolerance = 1000000.0

            [optimizer]
            step_kw = 5
            year = 2024
            lower_kw = 2000
            upper_kw = 3500

            [reports]
            output_dir = "out"
            years = [2024, 2025]

            [metrics]
            bind_addr = "127.0.0.1:9108"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.input.format, InputFormat::Ndjson);
        assert_eq!(cfg.input.service_no.as_deref(), Some("SRV-001"));
        assert_eq!(cfg.billing.vat_rate, 0.18);
        assert_eq!(cfg.billing.gap_tolerance, 1_000_000.0);
        assert_eq!(cfg.billing.reference_year, 2023);
        assert_eq!(cfg.optimizer.sweep.step_kw, 5);
        assert_eq!(cfg.optimizer.sweep.max_candidates, 2_000);
        assert_eq!(
            cfg.optimizer.bounds(),
            Some(SearchBounds { lower_kw: 2000, upper_kw: 3500, step_kw: 5 })
        );
        assert_eq!(cfg.reports.years, vec![2024, 2025]);
        assert_eq!(cfg.metrics.unwrap().bind_addr, "127.0.0.1:9108");
    }

    #[test]
    fn unknown_format_is_rejected() {
        let res = AppConfig::from_toml(
            r#"
            [input]
            path = "x.xlsx"
            format = "xlsx"

            [reports]
            output_dir = "out"
            "#,
        );
        assert!(res.is_err());
    }
}
