use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cache::RecencyCache;
use crate::config::IngestConfig;
use crate::domain::order::{validate_order, Order};
use crate::metrics::Metrics;
use crate::store::{OrderStore, StoreError};
use crate::utils::{retry_on_transient, IsTransient, RetryResult};

// ============================================================================
// Ingestion Pipeline
// ============================================================================
//
// Received → Decoded → Validated → Persisted(stored | duplicate)
//
// Decode and validation failures are terminal. A save that exhausted the
// store's own retries is retried as a whole under the pipeline's policy;
// a save the store refuses outright is terminal too.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Persisted for the first time
    Stored(Uuid),
    /// Already persisted by an earlier delivery
    Duplicate(Uuid),
    /// Payload is not an order document
    Malformed,
    /// Decoded but breaks a business rule
    Rejected { order_uid: Uuid, reason: &'static str },
    /// Valid, but the store refuses it permanently
    Unstorable(Uuid),
    /// Retry budget used up; the message must be read again later
    RetriesExhausted(Uuid),
    Cancelled,
}

impl IngestOutcome {
    /// Whether the message position may be committed.
    pub fn should_commit(&self) -> bool {
        match self {
            IngestOutcome::Stored(_)
            | IngestOutcome::Duplicate(_)
            | IngestOutcome::Malformed
            | IngestOutcome::Rejected { .. }
            | IngestOutcome::Unstorable(_) => true,
            IngestOutcome::RetriesExhausted(_) | IngestOutcome::Cancelled => false,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IngestOutcome::Stored(_) => "stored",
            IngestOutcome::Duplicate(_) => "duplicate",
            IngestOutcome::Malformed => "malformed",
            IngestOutcome::Rejected { .. } => "rejected",
            IngestOutcome::Unstorable(_) => "unstorable",
            IngestOutcome::RetriesExhausted(_) => "retries_exhausted",
            IngestOutcome::Cancelled => "cancelled",
        }
    }
}

enum Saved {
    Stored(Order),
    Duplicate,
}

/// Store failure as seen by the pipeline: worth another attempt only when
/// the store gave up on a transient condition.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct SaveFailure(StoreError);

impl IsTransient for SaveFailure {
    fn is_transient(&self) -> bool {
        matches!(self.0, StoreError::Fatal { .. }) || self.0.is_transient()
    }
}

pub struct IngestionPipeline {
    store: Arc<dyn OrderStore>,
    cache: Arc<RecencyCache>,
    config: IngestConfig,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn OrderStore>,
        cache: Arc<RecencyCache>,
        config: IngestConfig,
        metrics: Arc<Metrics>,
        cancel: CancellationToken,
    ) -> Self {
        Self { store, cache, config, metrics, cancel }
    }

    /// Runs one inbound payload to a terminal outcome.
    pub async fn process(&self, payload: &[u8]) -> IngestOutcome {
        let started = Instant::now();
        let outcome = self.run(payload).await;
        self.metrics
            .record_ingest(outcome.label(), started.elapsed().as_secs_f64());
        outcome
    }

    async fn run(&self, payload: &[u8]) -> IngestOutcome {
        let order: Order = match serde_json::from_slice(payload) {
            Ok(order) => order,
            Err(e) => {
                tracing::error!(error = %e, bytes = payload.len(), "Malformed order message, skipping");
                return IngestOutcome::Malformed;
            }
        };
        let uid = order.order_uid;

        if let Err(e) = validate_order(&order) {
            tracing::error!(order_uid = %uid, reason = e.code(), error = %e, "Invalid order, skipping");
            return IngestOutcome::Rejected { order_uid: uid, reason: e.code() };
        }

        if self.config.precheck_exists {
            match self.store.exists(uid).await {
                Ok(true) => {
                    tracing::warn!(order_uid = %uid, "Order already exists");
                    self.remember(order);
                    return IngestOutcome::Duplicate(uid);
                }
                Ok(false) => {}
                Err(StoreError::Cancelled) => return IngestOutcome::Cancelled,
                Err(e) => {
                    tracing::debug!(order_uid = %uid, error = %e, "Existence check failed, saving anyway");
                }
            }
        }

        let store = &self.store;
        let metrics = &self.metrics;
        let incoming = &order;
        let result = retry_on_transient(&self.config.retry, &self.cancel, |attempt| async move {
            if attempt > 1 {
                metrics.record_retry_attempt("ingest");
            }
            match store.save(incoming.clone()).await {
                Ok(saved) => Ok(Saved::Stored(saved)),
                Err(StoreError::AlreadyExists(_)) => Ok(Saved::Duplicate),
                Err(e) => Err(SaveFailure(e)),
            }
        })
        .await;

        match result {
            RetryResult::Success(Saved::Stored(saved)) => {
                tracing::info!(order_uid = %uid, "Order has been saved");
                self.remember(saved);
                IngestOutcome::Stored(uid)
            }
            RetryResult::Success(Saved::Duplicate) => {
                tracing::warn!(order_uid = %uid, "Order already exists");
                self.remember(order);
                IngestOutcome::Duplicate(uid)
            }
            RetryResult::Failed(e) => {
                metrics.record_retry_exhausted("ingest");
                tracing::error!(order_uid = %uid, error = %e, "Failed to process order, leaving it for redelivery");
                IngestOutcome::RetriesExhausted(uid)
            }
            RetryResult::PermanentFailure(SaveFailure(StoreError::Cancelled)) | RetryResult::Cancelled => {
                tracing::info!(order_uid = %uid, "Processing cancelled");
                IngestOutcome::Cancelled
            }
            RetryResult::PermanentFailure(e) => {
                tracing::error!(order_uid = %uid, error = %e, "Order cannot be stored, skipping");
                IngestOutcome::Unstorable(uid)
            }
        }
    }

    fn remember(&self, order: Order) {
        let evicted = self.cache.set(order);
        self.metrics.record_cache_write(self.cache.len(), evicted.is_some());
    }
}
