pub mod session;

pub use session::{record_fingerprint, IngestedBatch, SessionSink};
