pub(crate) mod pipeline;
mod worker;

pub use pipeline::{IngestOutcome, IngestionPipeline};
pub use worker::{InboundMessage, InboundStream, IngestionWorker};
