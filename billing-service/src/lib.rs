pub mod pipeline;
pub mod config;
pub mod sources;
pub mod sinks;
pub mod transform;
pub mod observability;
pub mod metrics_server;
pub mod session;
pub mod reports;

#[cfg(test)]
mod test_support;

pub use pipeline::{Pipeline, Envelope};
