pub mod meter_record_csv_file;
pub mod meter_record_ndjson_file;

pub use meter_record_csv_file::MeterRecordCsvFileSource;
pub use meter_record_ndjson_file::MeterRecordNdjsonFileSource;
