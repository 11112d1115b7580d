//! Durable job queue with leases, retries and a dead-letter queue.
//!
//! Delivery contract is at-least-once: a claim hands out a lease, and a
//! consumer that dies without acking simply lets the lease expire, after
//! which the job is claimable again. Consumers must therefore tolerate
//! duplicate deliveries.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::Utc;
use tracing::warn;

use tilawa_recitation::ports::{JobProducer, QueueError};

use super::types::{DeadLetterEntry, Job, JobId, JobState, QueueStats};

#[derive(Debug, Clone, thiserror::Error)]
pub enum JobQueueError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("queue unavailable: {0}")]
    Unavailable(String),
}

/// Broker-side queue operations, consumed by the worker pools.
pub trait JobQueue: Send + Sync {
    /// Add a job. Returns its id; says nothing about processing.
    fn enqueue_job(&self, job: Job) -> Result<JobId, JobQueueError>;

    /// Claim the oldest claimable job on `queue` under a lease, bumping its
    /// attempt count. `None` when the queue has nothing due.
    fn claim(&self, queue: &str, lease: Duration) -> Result<Option<Job>, JobQueueError>;

    /// Ack: the delivery was fully processed.
    fn complete(&self, id: JobId) -> Result<(), JobQueueError>;

    /// Nack: schedule a retry with backoff, or dead-letter the job once its
    /// attempts are exhausted.
    fn fail(&self, id: JobId, error: String) -> Result<(), JobQueueError>;

    fn dead_letters(&self, queue: &str) -> Result<Vec<DeadLetterEntry>, JobQueueError>;

    /// Move a dead-lettered job back to pending with a fresh attempt budget.
    fn retry_dead_letter(&self, id: JobId) -> Result<Job, JobQueueError>;

    fn stats(&self, queue: &str) -> Result<QueueStats, JobQueueError>;
}

impl<T: JobQueue + ?Sized> JobQueue for std::sync::Arc<T> {
    fn enqueue_job(&self, job: Job) -> Result<JobId, JobQueueError> {
        (**self).enqueue_job(job)
    }
    fn claim(&self, queue: &str, lease: Duration) -> Result<Option<Job>, JobQueueError> {
        (**self).claim(queue, lease)
    }
    fn complete(&self, id: JobId) -> Result<(), JobQueueError> {
        (**self).complete(id)
    }
    fn fail(&self, id: JobId, error: String) -> Result<(), JobQueueError> {
        (**self).fail(id, error)
    }
    fn dead_letters(&self, queue: &str) -> Result<Vec<DeadLetterEntry>, JobQueueError> {
        (**self).dead_letters(queue)
    }
    fn retry_dead_letter(&self, id: JobId) -> Result<Job, JobQueueError> {
        (**self).retry_dead_letter(id)
    }
    fn stats(&self, queue: &str) -> Result<QueueStats, JobQueueError> {
        (**self).stats(queue)
    }
}

/// In-memory queue. FIFO per queue by enqueue time.
#[derive(Debug, Default)]
pub struct InMemoryJobQueue {
    jobs: RwLock<HashMap<JobId, Job>>,
    dead: RwLock<HashMap<JobId, DeadLetterEntry>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobQueue for InMemoryJobQueue {
    fn enqueue_job(&self, job: Job) -> Result<JobId, JobQueueError> {
        let id = job.id;
        self.jobs.write().unwrap().insert(id, job);
        Ok(id)
    }

    fn claim(&self, queue: &str, lease: Duration) -> Result<Option<Job>, JobQueueError> {
        let mut jobs = self.jobs.write().unwrap();
        let now = Utc::now();

        let next = jobs
            .values()
            .filter(|j| j.queue == queue && j.is_claimable(now))
            .min_by_key(|j| (j.created_at, j.id.0))
            .map(|j| j.id);

        match next {
            Some(id) => {
                let job = jobs.get_mut(&id).ok_or(JobQueueError::NotFound(id))?;
                job.mark_leased(now, lease);
                Ok(Some(job.clone()))
            }
            None => Ok(None),
        }
    }

    fn complete(&self, id: JobId) -> Result<(), JobQueueError> {
        let mut jobs = self.jobs.write().unwrap();
        let job = jobs.get_mut(&id).ok_or(JobQueueError::NotFound(id))?;
        job.mark_completed(Utc::now());
        Ok(())
    }

    fn fail(&self, id: JobId, error: String) -> Result<(), JobQueueError> {
        let mut jobs = self.jobs.write().unwrap();
        let job = jobs.get_mut(&id).ok_or(JobQueueError::NotFound(id))?;
        job.mark_failed(Utc::now(), error.clone());

        if matches!(job.state, JobState::DeadLettered { .. }) {
            warn!(job_id = %id, queue = %job.queue, error = %error, "job dead-lettered");
            let job = jobs.remove(&id).ok_or(JobQueueError::NotFound(id))?;
            self.dead.write().unwrap().insert(
                id,
                DeadLetterEntry {
                    job,
                    dead_lettered_at: Utc::now(),
                    reason: error,
                },
            );
        }
        Ok(())
    }

    fn dead_letters(&self, queue: &str) -> Result<Vec<DeadLetterEntry>, JobQueueError> {
        let dead = self.dead.read().unwrap();
        let mut entries: Vec<_> = dead
            .values()
            .filter(|e| e.job.queue == queue)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.dead_lettered_at);
        Ok(entries)
    }

    fn retry_dead_letter(&self, id: JobId) -> Result<Job, JobQueueError> {
        let entry = self
            .dead
            .write()
            .unwrap()
            .remove(&id)
            .ok_or(JobQueueError::NotFound(id))?;

        let mut job = entry.job;
        job.state = JobState::Pending;
        job.attempt = 0;
        job.lease_until = None;
        job.scheduled_at = None;
        job.updated_at = Utc::now();

        self.jobs.write().unwrap().insert(id, job.clone());
        Ok(job)
    }

    fn stats(&self, queue: &str) -> Result<QueueStats, JobQueueError> {
        let jobs = self.jobs.read().unwrap();
        let mut stats = QueueStats::default();
        for job in jobs.values().filter(|j| j.queue == queue) {
            match &job.state {
                JobState::Pending => stats.pending += 1,
                JobState::Leased => stats.leased += 1,
                JobState::Completed => stats.completed += 1,
                JobState::Failed { .. } => stats.failed += 1,
                JobState::DeadLettered { .. } => stats.dead_lettered += 1,
            }
        }
        stats.dead_lettered += self
            .dead
            .read()
            .unwrap()
            .values()
            .filter(|e| e.job.queue == queue)
            .count();
        Ok(stats)
    }
}

// Producer side used by the domain services. A full `Job` with the default
// retry policy is minted per payload.
impl JobProducer for InMemoryJobQueue {
    fn enqueue(
        &self,
        queue: &str,
        job_name: &str,
        payload: serde_json::Value,
    ) -> Result<(), QueueError> {
        self.enqueue_job(Job::new(queue, job_name, payload))
            .map(|_| ())
            .map_err(|e| QueueError::Unavailable(e.to_string()))
    }
}
