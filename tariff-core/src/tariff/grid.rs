use serde::Serialize;

use crate::{
    error::BillingError,
    tariff::{ClientClass, EscalationModel, RateRow, TariffRates, TariffTable, UsageBucket},
};

/// Escalated rates of one bucket within a grid row.
#[derive(Debug, Clone, Serialize)]
pub struct BucketRates {
    pub bucket: UsageBucket,
    pub rates: RateRow,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridRow {
    pub min_kw: f64,
    pub max_kw: f64,
    pub category: u8,
    pub class: ClientClass,
    pub coefficient: f64,
    pub buckets: Vec<BucketRates>,
}

/// The full tariff sheet escalated to a given year.
#[derive(Debug, Clone, Serialize)]
pub struct TariffGrid {
    pub year: i32,
    pub rows: Vec<GridRow>,
}

impl TariffGrid {
    pub fn for_year(table: &TariffTable, escalation: &EscalationModel, year: i32) -> Self {
        let rows = table
            .bands()
            .iter()
            .map(|band| {
                let class = ClientClass::of_category(band.category);
                // same power threshold the calculator escalates by
                let coefficient = escalation.coefficient(year, band.min_kw);
                let buckets = class
                    .buckets()
                    .iter()
                    .filter_map(|&bucket| {
                        table
                            .rate_row(band.category, bucket)
                            .ok()
                            .map(|row| BucketRates {
                                bucket,
                                rates: row.scaled(coefficient),
                            })
                    })
                    .collect();
                GridRow {
                    min_kw: band.min_kw,
                    max_kw: band.max_kw,
                    category: band.category,
                    class,
                    coefficient,
                    buckets,
                }
            })
            .collect();

        Self { year, rows }
    }
}

/// Tariff applicable to a power and monthly operating time in a given year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TariffQuote {
    pub power: f64,
    pub operating_hours: f64,
    pub year: i32,
    pub category: u8,
    pub class: ClientClass,
    pub bucket: UsageBucket,
    pub interval_min_kw: f64,
    pub interval_max_kw: f64,
    pub coefficient: f64,
    pub rates: TariffRates,
}

pub fn quote(
    table: &TariffTable,
    escalation: &EscalationModel,
    power: f64,
    operating_hours: f64,
    year: i32,
) -> Result<TariffQuote, BillingError> {
    let band = table
        .bands()
        .iter()
        .find(|b| b.contains(power))
        .ok_or(BillingError::UnclassifiablePower { power })?;
    let class = ClientClass::of_category(band.category);
    let bucket = UsageBucket::select(class, operating_hours);
    let coefficient = escalation.coefficient(year, power);
    let rates = table.rate(band.category, bucket)?.escalated(coefficient);

    Ok(TariffQuote {
        power,
        operating_hours,
        year,
        category: band.category,
        class,
        bucket,
        interval_min_kw: band.min_kw,
        interval_max_kw: band.max_kw,
        coefficient,
        rates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tariff::RateCell;

    #[test]
    fn grid_lists_class_buckets_only() {
        let grid = TariffGrid::for_year(&TariffTable::STANDARD, &EscalationModel::default(), 2023);
        assert_eq!(grid.rows.len(), 12);
        assert_eq!(grid.rows[0].buckets.len(), 3);
        assert_eq!(grid.rows[5].buckets.len(), 2);
        assert_eq!(grid.rows[0].buckets[2].rates.peak, RateCell::NotApplicable);
        assert_eq!(grid.rows[5].buckets[1].rates.fixed, RateCell::Defined(7000.0));
    }

    #[test]
    fn grid_escalates_per_class() {
        let grid = TariffGrid::for_year(&TariffTable::STANDARD, &EscalationModel::default(), 2024);
        let small = &grid.rows[1];
        let large = &grid.rows[6];
        assert!((small.coefficient - 1.05).abs() < 1e-12);
        assert!((large.coefficient - 1.10).abs() < 1e-12);
        match small.buckets[0].rates.off_peak {
            RateCell::Defined(v) => assert!((v - 75.0 * 1.05).abs() < 1e-9),
            RateCell::NotApplicable => panic!("expected a rate"),
        }
    }

    #[test]
    fn grid_and_quote_share_the_escalation_threshold() {
        let params = crate::params::BillingParameters {
            large_client_threshold_kw: 2000.0,
            ..Default::default()
        };
        let model = EscalationModel::new(&params);
        let grid = TariffGrid::for_year(&TariffTable::STANDARD, &model, 2024);

        let band_5 = &grid.rows[4];
        assert_eq!(band_5.class, ClientClass::Small);
        assert!((band_5.coefficient - 1.10).abs() < 1e-12);
        let q = quote(&TariffTable::STANDARD, &model, 2500.0, 300.0, 2024).unwrap();
        assert_eq!(q.coefficient, band_5.coefficient);
        assert!((grid.rows[3].coefficient - 1.05).abs() < 1e-12);
    }

    #[test]
    fn quote_picks_band_and_bucket() {
        let q = quote(&TariffTable::STANDARD, &EscalationModel::default(), 3105.0, 483.0, 2025)
            .unwrap();
        assert_eq!(q.category, 6);
        assert_eq!(q.class, ClientClass::Large);
        assert_eq!(q.bucket, UsageBucket::Above400h);
        assert_eq!(q.interval_min_kw, 3000.0);
        assert!((q.rates.fixed - 7000.0 * 1.21).abs() < 1e-6);
    }

    #[test]
    fn quote_surfaces_lookup_failures() {
        let table = TariffTable::STANDARD;
        let model = EscalationModel::default();
        assert!(matches!(
            quote(&table, &model, 12_000.0, 100.0, 2024),
            Err(BillingError::UnclassifiablePower { .. })
        ));
        assert!(matches!(
            quote(&table, &model, 20.0, 450.0, 2024),
            Err(BillingError::NoTariffDefined { category: 1, .. })
        ));
    }
}
