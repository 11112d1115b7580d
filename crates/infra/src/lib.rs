//! Infrastructure layer: queue, stores, cache, storage, pipeline wiring.

pub mod cache;
pub mod jobs;
pub mod pipeline;
pub mod storage;
pub mod store;


pub use cache::InMemoryTtlCache;
pub use jobs::{
    BackoffStrategy, ConsumerPool, ConsumerPoolConfig, HandlerOutcome, InMemoryJobQueue, Job,
    JobId, JobQueue, JobState, PoolHandle, QueueStats, RetryPolicy,
};
pub use pipeline::{Pipeline, PipelineConfig};
pub use storage::InMemoryAudioStorage;
pub use store::InMemoryRecitationStore;
