//! Background job system: durable queue, leases, retries, dead-lettering,
//! and consumer pools with bounded concurrency.
//!
//! ## Components
//!
//! - `Job`: queued unit of work with payload, retry policy and lease
//! - `JobQueue`: broker operations (enqueue/claim/complete/fail, DLQ)
//! - `InMemoryJobQueue`: in-process implementation, FIFO per queue
//! - `ConsumerPool`: N threads looping claim -> handle -> ack/nack

pub mod pool;
pub mod queue;
pub mod types;

pub use pool::{ConsumerPool, ConsumerPoolConfig, HandlerOutcome, JobHandler, PoolHandle};
pub use queue::{InMemoryJobQueue, JobQueue, JobQueueError};
pub use types::{BackoffStrategy, DeadLetterEntry, Job, JobId, JobState, QueueStats, RetryPolicy};
