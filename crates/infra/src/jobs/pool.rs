//! Consumer pools: bounded concurrency over one queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info};

use super::queue::JobQueue;
use super::types::Job;

/// What the handler made of one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Ack. Also the answer for stale deliveries skipped on purpose.
    Done,
    /// Nack with a reason; the queue schedules a retry or dead-letters.
    Retry(String),
}

/// Handler shared by every consumer thread in a pool.
pub type JobHandler = Arc<dyn Fn(&Job) -> HandlerOutcome + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ConsumerPoolConfig {
    /// Queue this pool drains.
    pub queue: String,
    /// Number of consumer threads.
    pub concurrency: usize,
    /// Sleep between claims when the queue is empty.
    pub poll_interval: Duration,
    /// Lease handed to each claim; must outlive one handler run.
    pub lease: Duration,
    /// Pool name for logs and thread names.
    pub name: String,
}

impl ConsumerPoolConfig {
    pub fn new(queue: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            concurrency: 1,
            poll_interval: Duration::from_millis(20),
            lease: Duration::from_secs(30),
            name: name.into(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }
}

/// Handle to a running pool. Dropping it without calling [`PoolHandle::shutdown`]
/// detaches the threads; shutdown is explicit by design.
pub struct PoolHandle {
    stop: Arc<AtomicBool>,
    joins: Vec<thread::JoinHandle<()>>,
    name: String,
}

impl PoolHandle {
    /// Signal every consumer to stop after its current delivery, then join.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        for join in self.joins.drain(..) {
            let _ = join.join();
        }
        info!(pool = %self.name, "consumer pool stopped");
    }
}

/// Spawns `concurrency` consumer threads over one queue.
pub struct ConsumerPool;

impl ConsumerPool {
    pub fn spawn<Q>(queue: Q, config: ConsumerPoolConfig, handler: JobHandler) -> PoolHandle
    where
        Q: JobQueue + Clone + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let mut joins = Vec::with_capacity(config.concurrency);

        for i in 0..config.concurrency {
            let queue = queue.clone();
            let config = config.clone();
            let handler = handler.clone();
            let stop = stop.clone();
            let join = thread::Builder::new()
                .name(format!("{}-{i}", config.name))
                .spawn(move || consumer_loop(queue, config, handler, stop))
                .expect("failed to spawn consumer thread");
            joins.push(join);
        }

        info!(pool = %config.name, queue = %config.queue, concurrency = config.concurrency, "consumer pool started");
        PoolHandle {
            stop,
            joins,
            name: config.name,
        }
    }
}

fn consumer_loop<Q: JobQueue>(
    queue: Q,
    config: ConsumerPoolConfig,
    handler: JobHandler,
    stop: Arc<AtomicBool>,
) {
    while !stop.load(Ordering::SeqCst) {
        match queue.claim(&config.queue, config.lease) {
            Ok(Some(job)) => {
                debug!(pool = %config.name, job_id = %job.id, job = %job.name, attempt = job.attempt, "claimed job");
                match handler(&job) {
                    HandlerOutcome::Done => {
                        if let Err(e) = queue.complete(job.id) {
                            error!(pool = %config.name, job_id = %job.id, error = %e, "failed to ack job");
                        }
                    }
                    HandlerOutcome::Retry(reason) => {
                        debug!(pool = %config.name, job_id = %job.id, reason = %reason, "job nacked");
                        if let Err(e) = queue.fail(job.id, reason) {
                            error!(pool = %config.name, job_id = %job.id, error = %e, "failed to nack job");
                        }
                    }
                }
            }
            Ok(None) => thread::sleep(config.poll_interval),
            Err(e) => {
                error!(pool = %config.name, error = %e, "failed to claim job");
                thread::sleep(config.poll_interval);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    use crate::jobs::queue::InMemoryJobQueue;
    use crate::jobs::types::RetryPolicy;

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    fn fast_config(queue: &str) -> ConsumerPoolConfig {
        ConsumerPoolConfig::new(queue, "test-pool")
            .with_poll_interval(Duration::from_millis(2))
            .with_lease(Duration::from_secs(5))
    }

    #[test]
    fn pool_drains_the_queue() {
        let queue = Arc::new(InMemoryJobQueue::new());
        for i in 0..10 {
            queue
                .enqueue_job(Job::new("q", "work", serde_json::json!({"i": i})))
                .unwrap();
        }

        let seen = Arc::new(AtomicUsize::new(0));
        let handler: JobHandler = {
            let seen = seen.clone();
            Arc::new(move |_job| {
                seen.fetch_add(1, Ordering::SeqCst);
                HandlerOutcome::Done
            })
        };

        let pool = ConsumerPool::spawn(
            queue.clone(),
            fast_config("q").with_concurrency(3),
            handler,
        );

        assert!(wait_until(Duration::from_secs(2), || {
            queue.stats("q").unwrap().completed == 10
        }));
        pool.shutdown();
        assert_eq!(seen.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn retry_outcome_feeds_the_dead_letter_queue() {
        let queue = Arc::new(InMemoryJobQueue::new());
        queue
            .enqueue_job(
                Job::new("q", "work", serde_json::json!({}))
                    .with_retry_policy(RetryPolicy::fixed(3, Duration::from_millis(0))),
            )
            .unwrap();

        let handler: JobHandler = Arc::new(|_job| HandlerOutcome::Retry("always failing".into()));
        let pool = ConsumerPool::spawn(queue.clone(), fast_config("q"), handler);

        assert!(wait_until(Duration::from_secs(2), || {
            queue.stats("q").unwrap().dead_lettered == 1
        }));
        pool.shutdown();

        let dead = queue.dead_letters("q").unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].job.attempt, 3);
    }

    #[test]
    fn shutdown_stops_consumption() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let handler: JobHandler = Arc::new(|_job| HandlerOutcome::Done);

        let pool = ConsumerPool::spawn(queue.clone(), fast_config("q"), handler);
        pool.shutdown();

        queue
            .enqueue_job(Job::new("q", "work", serde_json::json!({})))
            .unwrap();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.stats("q").unwrap().pending, 1);
    }
}
