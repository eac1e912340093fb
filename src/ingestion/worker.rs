use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::utils::{jittered, sleep_or_cancel};

use super::pipeline::{IngestOutcome, IngestionPipeline};

/// One message read from the inbound stream.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Vec<u8>,
}

/// At-least-once source of inbound messages.
#[async_trait]
pub trait InboundStream: Send + Sync {
    async fn next(&self) -> anyhow::Result<InboundMessage>;

    /// Marks `message` and everything before it in its partition as processed.
    async fn commit(&self, message: &InboundMessage) -> anyhow::Result<()>;

    /// Rewinds so that `message` is read again.
    async fn redeliver(&self, message: &InboundMessage) -> anyhow::Result<()>;
}

// ============================================================================
// Ingestion Worker - one loop per consumer
// ============================================================================

pub struct IngestionWorker<S> {
    stream: S,
    pipeline: Arc<IngestionPipeline>,
    backoff: Duration,
    jitter: Duration,
    cancel: CancellationToken,
}

impl<S: InboundStream> IngestionWorker<S> {
    pub fn new(
        stream: S,
        pipeline: Arc<IngestionPipeline>,
        backoff: Duration,
        jitter: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self { stream, pipeline, backoff, jitter, cancel }
    }

    pub async fn run(self) {
        tracing::info!("Ingestion worker started");

        while !self.cancel.is_cancelled() {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = self.stream.next() => next,
            };

            let message = match next {
                Ok(message) => message,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read message, retrying");
                    if !self.pause().await {
                        break;
                    }
                    continue;
                }
            };

            let outcome = self.pipeline.process(&message.payload).await;
            if outcome.should_commit() {
                if let Err(e) = self.stream.commit(&message).await {
                    tracing::error!(
                        partition = message.partition,
                        offset = message.offset,
                        error = %e,
                        "Failed to commit message"
                    );
                }
                continue;
            }

            if outcome == IngestOutcome::Cancelled || !self.pause().await {
                break;
            }
            if let Err(e) = self.stream.redeliver(&message).await {
                tracing::error!(
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "Failed to rewind for redelivery"
                );
            }
        }

        tracing::info!("Ingestion worker stopped");
    }

    async fn pause(&self) -> bool {
        sleep_or_cancel(jittered(self.backoff, self.jitter), &self.cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::pipeline::tests::{fixture, sample_json};
    use crate::store::memory::InMemoryOrderStore;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use uuid::Uuid;

    enum Read {
        Message(InboundMessage),
        Error,
    }

    /// Replays scripted reads, then cancels the worker once drained.
    struct ScriptedStream {
        reads: Mutex<VecDeque<Read>>,
        store: Arc<InMemoryOrderStore>,
        /// (offset, saves seen by the store when the commit happened)
        commits: Arc<Mutex<Vec<(i64, usize)>>>,
        redeliveries: Arc<Mutex<Vec<i64>>>,
        cancel: CancellationToken,
    }

    #[async_trait]
    impl InboundStream for ScriptedStream {
        async fn next(&self) -> anyhow::Result<InboundMessage> {
            let read = self.reads.lock().pop_front();
            match read {
                Some(Read::Message(message)) => Ok(message),
                Some(Read::Error) => Err(anyhow::anyhow!("broker transport failure")),
                None => {
                    self.cancel.cancel();
                    std::future::pending().await
                }
            }
        }

        async fn commit(&self, message: &InboundMessage) -> anyhow::Result<()> {
            let saves = InMemoryOrderStore::calls(&self.store.save_calls);
            self.commits.lock().push((message.offset, saves));
            Ok(())
        }

        async fn redeliver(&self, message: &InboundMessage) -> anyhow::Result<()> {
            self.redeliveries.lock().push(message.offset);
            self.reads.lock().push_front(Read::Message(message.clone()));
            Ok(())
        }
    }

    fn message(offset: i64, payload: Vec<u8>) -> Read {
        Read::Message(InboundMessage {
            topic: "orders".to_string(),
            partition: 0,
            offset,
            payload,
        })
    }

    struct Run {
        store: Arc<InMemoryOrderStore>,
        commits: Vec<(i64, usize)>,
        redeliveries: Vec<i64>,
    }

    async fn run_worker(max_attempts: u32, failing_saves: usize, reads: Vec<Read>) -> Run {
        run_scripted(max_attempts, |store| store.fail_next_saves(failing_saves), reads).await
    }

    async fn run_scripted(
        max_attempts: u32,
        script: impl FnOnce(&InMemoryOrderStore),
        reads: Vec<Read>,
    ) -> Run {
        let f = fixture(max_attempts, false);
        script(&f.store);
        let commits = Arc::new(Mutex::new(Vec::new()));
        let redeliveries = Arc::new(Mutex::new(Vec::new()));
        let stream = ScriptedStream {
            reads: Mutex::new(reads.into_iter().collect()),
            store: f.store.clone(),
            commits: commits.clone(),
            redeliveries: redeliveries.clone(),
            cancel: f.cancel.clone(),
        };

        let worker = IngestionWorker::new(
            stream,
            Arc::new(f.pipeline),
            Duration::from_millis(1),
            Duration::ZERO,
            f.cancel.clone(),
        );
        tokio::time::timeout(Duration::from_secs(5), worker.run())
            .await
            .expect("worker did not stop");

        let commits = commits.lock().clone();
        let redeliveries = redeliveries.lock().clone();
        Run { store: f.store, commits, redeliveries }
    }

    #[tokio::test]
    async fn test_acknowledged_exactly_once_after_final_attempt() {
        let uid = Uuid::new_v4();

        // Two pipeline attempts per delivery; the fourth save overall succeeds.
        let run = run_worker(2, 3, vec![message(7, sample_json(uid, 1817))]).await;

        assert_eq!(run.commits, vec![(7, 4)]);
        assert_eq!(run.redeliveries, vec![7]);
        assert!(run.store.contains(&uid));
    }

    #[tokio::test]
    async fn test_poison_messages_are_committed() {
        let valid = Uuid::new_v4();
        let reads = vec![
            message(1, b"garbage".to_vec()),
            message(2, sample_json(Uuid::new_v4(), 0)),
            message(3, sample_json(valid, 1817)),
        ];

        let run = run_worker(3, 0, reads).await;

        assert_eq!(run.commits, vec![(1, 0), (2, 0), (3, 1)]);
        assert!(run.redeliveries.is_empty());
        assert_eq!(run.store.len(), 1);
    }

    #[tokio::test]
    async fn test_refused_save_is_committed_not_replayed() {
        let uid = Uuid::new_v4();

        let run = run_scripted(5, |store| store.refuse_next_saves(1), vec![message(4, sample_json(uid, 1817))])
            .await;

        assert_eq!(run.commits, vec![(4, 1)]);
        assert!(run.redeliveries.is_empty());
        assert!(!run.store.contains(&uid));
    }

    #[tokio::test]
    async fn test_duplicate_delivery_is_committed() {
        let uid = Uuid::new_v4();
        let payload = sample_json(uid, 1817);

        let run = run_worker(3, 0, vec![message(1, payload.clone()), message(2, payload)]).await;

        assert_eq!(run.commits.len(), 2);
        assert_eq!(run.store.len(), 1);
    }

    #[tokio::test]
    async fn test_read_errors_back_off_and_continue() {
        let uid = Uuid::new_v4();
        let reads = vec![Read::Error, Read::Error, message(5, sample_json(uid, 1817))];

        let run = run_worker(3, 0, reads).await;

        assert_eq!(run.commits, vec![(5, 1)]);
    }

    #[tokio::test]
    async fn test_worker_stops_when_cancelled() {
        let f = fixture(3, false);
        let stream = ScriptedStream {
            reads: Mutex::new(VecDeque::new()),
            store: f.store.clone(),
            commits: Arc::new(Mutex::new(Vec::new())),
            redeliveries: Arc::new(Mutex::new(Vec::new())),
            cancel: CancellationToken::new(),
        };
        let worker = IngestionWorker::new(
            stream,
            Arc::new(f.pipeline),
            Duration::from_secs(60),
            Duration::ZERO,
            f.cancel.clone(),
        );

        let handle = tokio::spawn(worker.run());
        f.cancel.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }
}
