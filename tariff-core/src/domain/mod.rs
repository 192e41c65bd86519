pub mod enriched;
pub mod meter_record;
pub mod service;
pub mod table;

pub use enriched::{Billing, EnrichedRecord, Reconstitution};
pub use meter_record::MeterRecord;
pub use service::{select_service, services, ServiceSummary};
pub use table::{ProcessedRow, ProcessedTable, RowStatus, YearOutcome};
