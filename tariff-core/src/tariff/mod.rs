pub mod escalation;
pub mod grid;
pub mod table;

pub use escalation::EscalationModel;
pub use grid::{quote, BucketRates, GridRow, TariffGrid, TariffQuote};
pub use table::{
    ClientClass, PowerBand, RateCell, RateRow, TariffRates, TariffTable, UsageBucket,
    LARGE_CLIENT_RATES, POWER_BANDS, SMALL_CLIENT_RATES,
};
