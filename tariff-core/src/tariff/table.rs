use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BillingError;

/// Half-open power interval `[min_kw, max_kw)` mapped to a tariff category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerBand {
    pub min_kw: f64,
    pub max_kw: f64,
    pub category: u8,
}

impl PowerBand {
    const fn new(min_kw: f64, max_kw: f64, category: u8) -> Self {
        Self {
            min_kw,
            max_kw,
            category,
        }
    }

    pub fn contains(&self, power: f64) -> bool {
        self.min_kw <= power && power < self.max_kw
    }
}

/// Client class, derived from the tariff category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientClass {
    /// Categories 1 to 5.
    Small,
    /// Categories 6 to 12.
    Large,
}

impl ClientClass {
    pub const LAST_SMALL_CATEGORY: u8 = 5;

    pub fn of_category(category: u8) -> Self {
        if category <= Self::LAST_SMALL_CATEGORY {
            ClientClass::Small
        } else {
            ClientClass::Large
        }
    }

    /// Usage buckets published for this class, in ascending hour order.
    pub fn buckets(self) -> &'static [UsageBucket] {
        match self {
            ClientClass::Small => &[
                UsageBucket::UpTo200h,
                UsageBucket::From201To400h,
                UsageBucket::Above400h,
            ],
            ClientClass::Large => &[UsageBucket::UpTo400h, UsageBucket::Above400h],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ClientClass::Small => "small client",
            ClientClass::Large => "large client",
        }
    }
}

/// Monthly operating-time bucket selecting the rate row within a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageBucket {
    UpTo200h,
    From201To400h,
    UpTo400h,
    Above400h,
}

impl UsageBucket {
    /// Upper bounds are inclusive except for the open top bucket.
    pub fn select(class: ClientClass, operating_hours: f64) -> Self {
        match class {
            ClientClass::Small if operating_hours <= 200.0 => UsageBucket::UpTo200h,
            ClientClass::Small if operating_hours <= 400.0 => UsageBucket::From201To400h,
            ClientClass::Large if operating_hours <= 400.0 => UsageBucket::UpTo400h,
            _ => UsageBucket::Above400h,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            UsageBucket::UpTo200h => "0-200h",
            UsageBucket::From201To400h => "201-400h",
            UsageBucket::UpTo400h => "0-400h",
            UsageBucket::Above400h => ">400h",
        }
    }
}

impl fmt::Display for UsageBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A published rate, or an explicit gap in the tariff sheet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RateCell {
    Defined(f64),
    NotApplicable,
}

impl RateCell {
    pub fn value(self) -> Option<f64> {
        match self {
            RateCell::Defined(v) => Some(v),
            RateCell::NotApplicable => None,
        }
    }

    pub fn scaled(self, coefficient: f64) -> Self {
        match self {
            RateCell::Defined(v) => RateCell::Defined(v * coefficient),
            RateCell::NotApplicable => RateCell::NotApplicable,
        }
    }
}

/// Raw rate cells of one (category, bucket) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateRow {
    pub off_peak: RateCell,
    pub peak: RateCell,
    pub fixed: RateCell,
}

impl RateRow {
    pub fn scaled(self, coefficient: f64) -> Self {
        Self {
            off_peak: self.off_peak.scaled(coefficient),
            peak: self.peak.scaled(coefficient),
            fixed: self.fixed.scaled(coefficient),
        }
    }
}

/// Fully defined rates: energy rates per kWh and fixed charge per kW.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TariffRates {
    pub off_peak: f64,
    pub peak: f64,
    pub fixed: f64,
}

impl TariffRates {
    pub fn escalated(self, coefficient: f64) -> Self {
        Self {
            off_peak: self.off_peak * coefficient,
            peak: self.peak * coefficient,
            fixed: self.fixed * coefficient,
        }
    }
}

const NA: RateCell = RateCell::NotApplicable;

const fn d(v: f64) -> RateCell {
    RateCell::Defined(v)
}

const fn row(off_peak: RateCell, peak: RateCell, fixed: RateCell) -> RateRow {
    RateRow {
        off_peak,
        peak,
        fixed,
    }
}

pub const POWER_BANDS: [PowerBand; 12] = [
    PowerBand::new(0.0, 50.0, 1),
    PowerBand::new(50.0, 500.0, 2),
    PowerBand::new(500.0, 1000.0, 3),
    PowerBand::new(1000.0, 2000.0, 4),
    PowerBand::new(2000.0, 3000.0, 5),
    PowerBand::new(3000.0, 4000.0, 6),
    PowerBand::new(4000.0, 5000.0, 7),
    PowerBand::new(5000.0, 6000.0, 8),
    PowerBand::new(6000.0, 7000.0, 9),
    PowerBand::new(7000.0, 8000.0, 10),
    PowerBand::new(8000.0, 9000.0, 11),
    PowerBand::new(9000.0, 10000.0, 12),
];

/// Categories 1-5, columns 0-200h, 201-400h, >400h.
pub const SMALL_CLIENT_RATES: [[RateRow; 3]; 5] = [
    [
        row(d(95.0), d(125.0), d(0.0)),
        row(d(85.0), d(125.0), d(0.0)),
        row(d(125.0), NA, NA),
    ],
    [
        row(d(75.0), d(95.0), d(4700.0)),
        row(d(65.0), d(95.0), d(4700.0)),
        row(d(60.0), d(95.0), d(4700.0)),
    ],
    [
        row(d(70.0), d(95.0), d(5500.0)),
        row(d(60.0), d(95.0), d(5500.0)),
        row(d(55.0), d(95.0), d(5500.0)),
    ],
    [
        row(d(65.0), d(95.0), d(6000.0)),
        row(d(60.0), d(95.0), d(6000.0)),
        row(d(55.0), d(95.0), d(6000.0)),
    ],
    [
        row(d(60.0), d(95.0), d(6500.0)),
        row(d(55.0), d(95.0), d(6500.0)),
        row(d(50.0), d(95.0), d(6500.0)),
    ],
];

/// Categories 6-12, columns 0-400h, >400h.
pub const LARGE_CLIENT_RATES: [[RateRow; 2]; 7] = [
    [row(d(40.0), d(40.0), d(8200.0)), row(d(35.0), d(35.0), d(7000.0))],
    [row(d(36.0), d(36.0), d(9350.0)), row(d(30.0), d(30.0), d(8000.0))],
    [row(d(31.0), d(31.0), d(10750.0)), row(d(24.0), d(24.0), d(9200.0))],
    [row(d(25.0), d(25.0), d(12290.0)), row(d(18.0), d(18.0), d(10500.0))],
    [row(d(19.0), d(19.0), d(14050.0)), row(d(14.0), d(14.0), d(12000.0))],
    [row(d(16.0), d(16.0), d(15795.0)), row(d(11.0), d(11.0), d(13500.0))],
    [row(d(14.0), d(14.0), d(18090.0)), row(d(9.0), d(9.0), d(15500.0))],
];

/// Static tariff sheet: power bands and base rates per (category, bucket).
#[derive(Debug, Clone, PartialEq)]
pub struct TariffTable {
    bands: [PowerBand; 12],
    small: [[RateRow; 3]; 5],
    large: [[RateRow; 2]; 7],
}

impl TariffTable {
    pub const STANDARD: TariffTable = TariffTable {
        bands: POWER_BANDS,
        small: SMALL_CLIENT_RATES,
        large: LARGE_CLIENT_RATES,
    };

    pub fn bands(&self) -> &[PowerBand] {
        &self.bands
    }

    pub fn band(&self, category: u8) -> Option<&PowerBand> {
        self.bands.iter().find(|b| b.category == category)
    }

    /// Category whose band contains `power`, or `None` outside `[0, 10000)`.
    pub fn classify(&self, power: f64) -> Option<u8> {
        self.bands
            .iter()
            .find(|b| b.contains(power))
            .map(|b| b.category)
    }

    /// Raw cells for a category and bucket, including not-applicable cells.
    pub fn rate_row(&self, category: u8, bucket: UsageBucket) -> Result<RateRow, BillingError> {
        let not_in_class = BillingError::BucketNotInClass { category, bucket };
        match (category, bucket) {
            (1..=5, _) => {
                let column = match bucket {
                    UsageBucket::UpTo200h => 0,
                    UsageBucket::From201To400h => 1,
                    UsageBucket::Above400h => 2,
                    UsageBucket::UpTo400h => return Err(not_in_class),
                };
                Ok(self.small[usize::from(category - 1)][column])
            }
            (6..=12, _) => {
                let column = match bucket {
                    UsageBucket::UpTo400h => 0,
                    UsageBucket::Above400h => 1,
                    UsageBucket::UpTo200h | UsageBucket::From201To400h => {
                        return Err(not_in_class)
                    }
                };
                Ok(self.large[usize::from(category - 6)][column])
            }
            _ => Err(BillingError::NoTariffDefined { category, bucket }),
        }
    }

    /// Base rates for a category and bucket. Fails when any cell is not applicable.
    pub fn rate(&self, category: u8, bucket: UsageBucket) -> Result<TariffRates, BillingError> {
        let row = self.rate_row(category, bucket)?;
        match (row.off_peak.value(), row.peak.value(), row.fixed.value()) {
            (Some(off_peak), Some(peak), Some(fixed)) => Ok(TariffRates {
                off_peak,
                peak,
                fixed,
            }),
            _ => Err(BillingError::NoTariffDefined { category, bucket }),
        }
    }
}

impl Default for TariffTable {
    fn default() -> Self {
        Self::STANDARD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_covers_every_band_without_gaps() {
        let table = TariffTable::STANDARD;
        for pair in table.bands().windows(2) {
            assert_eq!(pair[0].max_kw, pair[1].min_kw);
            assert_eq!(pair[0].category + 1, pair[1].category);
        }

        let mut power = 0.0;
        while power < 10_000.0 {
            let matches = table.bands().iter().filter(|b| b.contains(power)).count();
            assert_eq!(matches, 1, "power {power} matched {matches} bands");
            assert!(table.classify(power).is_some());
            power += 2.5;
        }
    }

    #[test]
    fn classify_band_edges() {
        let table = TariffTable::STANDARD;
        assert_eq!(table.classify(0.0), Some(1));
        assert_eq!(table.classify(49.99), Some(1));
        assert_eq!(table.classify(50.0), Some(2));
        assert_eq!(table.classify(2999.0), Some(5));
        assert_eq!(table.classify(3000.0), Some(6));
        assert_eq!(table.classify(3105.0), Some(6));
        assert_eq!(table.classify(9999.9), Some(12));
    }

    #[test]
    fn classify_outside_bands_is_none() {
        let table = TariffTable::STANDARD;
        assert_eq!(table.classify(10_000.0), None);
        assert_eq!(table.classify(-1.0), None);
        assert_eq!(table.classify(f64::NAN), None);
    }

    #[test]
    fn bucket_boundaries() {
        assert_eq!(UsageBucket::select(ClientClass::Small, 200.0), UsageBucket::UpTo200h);
        assert_eq!(UsageBucket::select(ClientClass::Small, 201.0), UsageBucket::From201To400h);
        assert_eq!(UsageBucket::select(ClientClass::Small, 400.0), UsageBucket::From201To400h);
        assert_eq!(UsageBucket::select(ClientClass::Small, 401.0), UsageBucket::Above400h);
        assert_eq!(UsageBucket::select(ClientClass::Large, 0.0), UsageBucket::UpTo400h);
        assert_eq!(UsageBucket::select(ClientClass::Large, 400.0), UsageBucket::UpTo400h);
        assert_eq!(UsageBucket::select(ClientClass::Large, 483.0), UsageBucket::Above400h);
    }

    #[test]
    fn rate_lookup_reads_both_sheets() {
        let table = TariffTable::STANDARD;
        let small = table.rate(2, UsageBucket::From201To400h).unwrap();
        assert_eq!(small, TariffRates { off_peak: 65.0, peak: 95.0, fixed: 4700.0 });

        let large = table.rate(6, UsageBucket::Above400h).unwrap();
        assert_eq!(large, TariffRates { off_peak: 35.0, peak: 35.0, fixed: 7000.0 });

        let top = table.rate(12, UsageBucket::UpTo400h).unwrap();
        assert_eq!(top.fixed, 18090.0);
    }

    #[test]
    fn missing_cells_are_not_zero() {
        let table = TariffTable::STANDARD;
        let err = table.rate(1, UsageBucket::Above400h).unwrap_err();
        assert_eq!(
            err,
            BillingError::NoTariffDefined { category: 1, bucket: UsageBucket::Above400h }
        );

        let raw = table.rate_row(1, UsageBucket::Above400h).unwrap();
        assert_eq!(raw.off_peak, RateCell::Defined(125.0));
        assert_eq!(raw.peak, RateCell::NotApplicable);

        // a published zero fixed charge is still a defined rate
        assert_eq!(table.rate(1, UsageBucket::UpTo200h).unwrap().fixed, 0.0);
    }

    #[test]
    fn bucket_outside_class_is_rejected() {
        let table = TariffTable::STANDARD;
        assert!(matches!(
            table.rate(3, UsageBucket::UpTo400h),
            Err(BillingError::BucketNotInClass { category: 3, .. })
        ));
        assert!(matches!(
            table.rate(7, UsageBucket::UpTo200h),
            Err(BillingError::BucketNotInClass { category: 7, .. })
        ));
        assert!(matches!(
            table.rate(13, UsageBucket::Above400h),
            Err(BillingError::NoTariffDefined { category: 13, .. })
        ));
    }
}
