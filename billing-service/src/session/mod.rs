//! Per-user upload state between ingestion and report generation.

use std::{collections::HashMap, sync::Arc};

use tariff_core::{
    domain::{select_service, services, ServiceSummary},
    BillingCalculator, MeterRecord, ProcessedTable,
};
use tokio::sync::RwLock;

use crate::sinks::IngestedBatch;

/// What a session holds: the raw upload, and the enriched table once a
/// single service has been chosen.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub raw: Arc<Vec<MeterRecord>>,
    pub fingerprint: String,
    /// Rows dropped at ingestion: unreadable or failing validation.
    pub dropped: usize,
    pub duplicates: usize,
    pub selected_service: Option<String>,
    pub processed: Option<Arc<ProcessedTable>>,
}

#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn store(&self, key: &str, entry: SessionEntry);
    async fn retrieve(&self, key: &str) -> Option<SessionEntry>;
    async fn clear(&self, key: &str);
}

#[derive(Debug, Default, Clone)]
pub struct InMemorySessionStore {
    entries: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn store(&self, key: &str, entry: SessionEntry) {
        self.entries.write().await.insert(key.to_string(), entry);
    }

    async fn retrieve(&self, key: &str) -> Option<SessionEntry> {
        self.entries.read().await.get(key).cloned()
    }

    async fn clear(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("upload contained no usable records")]
    EmptyUpload,
    #[error("no upload in session '{key}'")]
    NoSession { key: String },
    #[error("service '{service_no}' is not in the uploaded file")]
    UnknownService { service_no: String },
    #[error("session '{key}' is waiting for a service selection")]
    SelectionPending { key: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// One service: the table is enriched and ready.
    Processed {
        service: ServiceSummary,
        rows: usize,
        /// Rows kept in the table that could not be billed.
        unbilled: usize,
        dropped: usize,
        duplicates: usize,
    },
    /// Several services: one must be selected before any report.
    SelectionRequired { services: Vec<ServiceSummary> },
}

pub struct SessionManager<S> {
    store: S,
    calculator: BillingCalculator,
}

impl<S: SessionStore> SessionManager<S> {
    pub fn new(store: S, calculator: BillingCalculator) -> Self {
        Self { store, calculator }
    }

    pub fn calculator(&self) -> &BillingCalculator {
        &self.calculator
    }

    /// Stores an upload; a single-service upload is enriched immediately.
    pub async fn ingest(
        &self,
        key: &str,
        batch: IngestedBatch,
    ) -> Result<UploadOutcome, SessionError> {
        if batch.records.is_empty() {
            return Err(SessionError::EmptyUpload);
        }
        let listed = services(&batch.records);
        let entry = SessionEntry {
            raw: Arc::new(batch.records),
            fingerprint: batch.fingerprint,
            dropped: batch.rejected,
            duplicates: batch.duplicates,
            selected_service: None,
            processed: None,
        };

        match listed.as_slice() {
            [only] => {
                let service_no = only.service_no.clone();
                let rows = entry.raw.as_ref().clone();
                self.process(key, entry, service_no, rows).await
            }
            _ => {
                tracing::info!(key, services = listed.len(), "upload holds several services");
                self.store.store(key, entry).await;
                Ok(UploadOutcome::SelectionRequired { services: listed })
            }
        }
    }

    /// Keeps the rows of one service from the stored upload and enriches them.
    pub async fn select_service(
        &self,
        key: &str,
        service_no: &str,
    ) -> Result<UploadOutcome, SessionError> {
        let entry = self
            .store
            .retrieve(key)
            .await
            .ok_or_else(|| SessionError::NoSession { key: key.to_string() })?;
        let rows = select_service(&entry.raw, service_no);
        if rows.is_empty() {
            return Err(SessionError::UnknownService {
                service_no: service_no.to_string(),
            });
        }
        self.process(key, entry, service_no.trim().to_string(), rows).await
    }

    async fn process(
        &self,
        key: &str,
        mut entry: SessionEntry,
        service_no: String,
        rows: Vec<MeterRecord>,
    ) -> Result<UploadOutcome, SessionError> {
        let summary = services(&rows)
            .into_iter()
            .next()
            .ok_or(SessionError::EmptyUpload)?;
        let table = self.calculator.process(rows);
        let unbilled = table.rejected().count();
        if unbilled > 0 {
            metrics::counter!("billing_enrichment_failures_total").increment(unbilled as u64);
        }
        let rows = table.rows().len();
        let (dropped, duplicates) = (entry.dropped, entry.duplicates);
        tracing::info!(
            key,
            service_no = %service_no,
            rows,
            unbilled,
            dropped,
            duplicates,
            "service table enriched"
        );

        entry.selected_service = Some(service_no);
        entry.processed = Some(Arc::new(table));
        self.store.store(key, entry).await;

        Ok(UploadOutcome::Processed {
            service: summary,
            rows,
            unbilled,
            dropped,
            duplicates,
        })
    }

    /// The enriched table of the session.
    pub async fn processed(&self, key: &str) -> Result<Arc<ProcessedTable>, SessionError> {
        let entry = self
            .store
            .retrieve(key)
            .await
            .ok_or_else(|| SessionError::NoSession { key: key.to_string() })?;
        entry
            .processed
            .ok_or_else(|| SessionError::SelectionPending { key: key.to_string() })
    }

    pub async fn fingerprint(&self, key: &str) -> Option<String> {
        self.store.retrieve(key).await.map(|e| e.fingerprint)
    }

    pub async fn clear(&self, key: &str) {
        self.store.clear(key).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::record;

    fn batch(records: Vec<MeterRecord>) -> IngestedBatch {
        IngestedBatch {
            records,
            fingerprint: "f".repeat(64),
            ..IngestedBatch::default()
        }
    }

    fn manager() -> SessionManager<InMemorySessionStore> {
        SessionManager::new(InMemorySessionStore::new(), BillingCalculator::default())
    }

    #[tokio::test]
    async fn single_service_is_processed_on_upload() {
        let m = manager();
        let outcome = m
            .ingest(
                "alice",
                batch(vec![
                    record("SRV-001", 2024, 2, 3000.0, 2900.0),
                    record("SRV-001", 2024, 1, 3000.0, 3102.0),
                ]),
            )
            .await
            .unwrap();

        let UploadOutcome::Processed { service, rows, unbilled, dropped, duplicates } = outcome
        else {
            panic!("expected processed upload");
        };
        assert_eq!(service.service_no, "SRV-001");
        assert_eq!(rows, 2);
        assert_eq!(unbilled, 0);
        assert_eq!(dropped, 0);
        assert_eq!(duplicates, 0);

        let table = m.processed("alice").await.unwrap();
        assert_eq!(table.rows()[0].record().month(), 1);
        assert_eq!(m.fingerprint("alice").await.unwrap().len(), 64);
    }

    #[tokio::test]
    async fn several_services_wait_for_selection() {
        let m = manager();
        let outcome = m
            .ingest(
                "bob",
                batch(vec![
                    record("SRV-001", 2024, 1, 3000.0, 2900.0),
                    record("SRV-002", 2024, 1, 450.0, 400.0),
                    record("SRV-002", 2024, 2, 450.0, 410.0),
                ]),
            )
            .await
            .unwrap();
        let UploadOutcome::SelectionRequired { services } = outcome else {
            panic!("expected a service list");
        };
        assert_eq!(services.len(), 2);
        assert_eq!(
            m.processed("bob").await.unwrap_err(),
            SessionError::SelectionPending { key: "bob".to_string() }
        );

        assert_eq!(
            m.select_service("bob", "SRV-404").await.unwrap_err(),
            SessionError::UnknownService { service_no: "SRV-404".to_string() }
        );

        let outcome = m.select_service("bob", " SRV-002 ").await.unwrap();
        assert!(matches!(outcome, UploadOutcome::Processed { rows: 2, .. }));
        let table = m.processed("bob").await.unwrap();
        assert!(table.rows().iter().all(|r| r.record().service_no == "SRV-002"));
    }

    #[tokio::test]
    async fn failed_rows_are_kept_and_counted() {
        let m = manager();
        let outcome = m
            .ingest(
                "carol",
                batch(vec![
                    record("SRV-001", 2024, 1, 3000.0, 2900.0),
                    record("SRV-001", 2024, 2, 12_000.0, 9000.0),
                ]),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, UploadOutcome::Processed { rows: 2, unbilled: 1, .. }));
    }

    #[tokio::test]
    async fn ingestion_counts_survive_service_selection() {
        let m = manager();
        let mut upload = batch(vec![
            record("SRV-001", 2024, 1, 3000.0, 2900.0),
            record("SRV-002", 2024, 1, 450.0, 400.0),
        ]);
        upload.rejected = 3;
        upload.duplicates = 2;
        m.ingest("frank", upload).await.unwrap();

        let outcome = m.select_service("frank", "SRV-001").await.unwrap();
        assert_eq!(
            outcome,
            UploadOutcome::Processed {
                service: services(&[record("SRV-001", 2024, 1, 3000.0, 2900.0)]).remove(0),
                rows: 1,
                unbilled: 0,
                dropped: 3,
                duplicates: 2,
            }
        );
    }

    #[tokio::test]
    async fn sessions_are_isolated_and_clearable() {
        let m = manager();
        assert_eq!(m.ingest("dan", batch(vec![])).await.unwrap_err(), SessionError::EmptyUpload);
        assert!(matches!(
            m.select_service("dan", "SRV-001").await,
            Err(SessionError::NoSession { .. })
        ));

        m.ingest("erin", batch(vec![record("SRV-001", 2024, 1, 3000.0, 2900.0)]))
            .await
            .unwrap();
        assert!(m.processed("dan").await.is_err());
        assert!(m.processed("erin").await.is_ok());

        m.clear("erin").await;
        assert!(matches!(
            m.processed("erin").await,
            Err(SessionError::NoSession { .. })
        ));
    }
}
