use anyhow::{Context, Result};
use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    Message, Offset, TopicPartitionList,
};
use std::sync::Arc;
use std::time::Duration;

use crate::config::KafkaConfig;
use crate::ingestion::{InboundMessage, InboundStream};

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// Consumer-group reader for the orders topic. Offsets are committed only
/// when the ingestion worker says so.
pub struct RedpandaConsumer {
    consumer: Arc<StreamConsumer>,
}

impl RedpandaConsumer {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "10000")
            .create()
            .context("Failed to create Redpanda consumer")?;

        consumer
            .subscribe(&[config.topic.as_str()])
            .with_context(|| format!("Failed to subscribe to {}", config.topic))?;

        tracing::info!(
            brokers = %config.brokers,
            topic = %config.topic,
            group_id = %config.group_id,
            "Subscribed to Redpanda"
        );

        Ok(Self { consumer: Arc::new(consumer) })
    }
}

#[async_trait]
impl InboundStream for RedpandaConsumer {
    async fn next(&self) -> Result<InboundMessage> {
        let message = self.consumer.recv().await?;
        Ok(InboundMessage {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        })
    }

    async fn commit(&self, message: &InboundMessage) -> Result<()> {
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )?;
        self.consumer.commit(&offsets, CommitMode::Async)?;

        tracing::debug!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            "Committed message"
        );
        Ok(())
    }

    async fn redeliver(&self, message: &InboundMessage) -> Result<()> {
        // seek blocks the calling thread for up to SEEK_TIMEOUT
        let consumer = Arc::clone(&self.consumer);
        let (topic, partition, offset) = (message.topic.clone(), message.partition, message.offset);
        tokio::task::spawn_blocking(move || {
            consumer.seek(&topic, partition, Offset::Offset(offset), SEEK_TIMEOUT)
        })
        .await
        .context("Seek task failed")??;

        tracing::warn!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            "Rewound partition for redelivery"
        );
        Ok(())
    }
}
