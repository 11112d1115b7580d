//! Job records and retry policies.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backoff strategy between retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries.
    Fixed,
    /// base * 2^(attempt - 1), capped at `max_delay`.
    Exponential,
}

/// Retry policy for one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            strategy: BackoffStrategy::Exponential,
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
        }
    }

    pub fn exponential(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            strategy: BackoffStrategy::Exponential,
        }
    }

    /// Delay before the retry that follows a failed `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let delay_ms = match self.strategy {
            BackoffStrategy::Fixed => base_ms,
            BackoffStrategy::Exponential => {
                let exp = 2_f64.powi((attempt - 1) as i32);
                (base_ms * exp).min(max_ms)
            }
        };
        Duration::from_millis(delay_ms as u64)
    }

    /// Whether another attempt may follow `attempt` failed ones.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Lifecycle of a queued job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting for a consumer.
    Pending,
    /// Claimed by a consumer; redeliverable once the lease expires.
    Leased,
    /// Acknowledged done.
    Completed,
    /// Failed, retry scheduled.
    Failed { error: String },
    /// Attempts exhausted; parked for inspection.
    DeadLettered { error: String, attempts: u32 },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::DeadLettered { .. })
    }
}

/// A queued unit of work. The payload is opaque JSON; the consumer pool
/// routes on `queue` and the handler dispatches on `name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub queue: String,
    pub name: String,
    pub payload: serde_json::Value,
    pub state: JobState,
    pub retry: RetryPolicy,
    /// Delivery attempts so far (bumped on claim).
    pub attempt: u32,
    /// Redelivery fence: while in the future, no other consumer may claim.
    pub lease_until: Option<DateTime<Utc>>,
    /// Earliest time the job may (re)run.
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        queue: impl Into<String>,
        name: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            queue: queue.into(),
            name: name.into(),
            payload,
            state: JobState::Pending,
            retry: RetryPolicy::default(),
            attempt: 0,
            lease_until: None,
            scheduled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Whether a consumer may take this job at `now`. Expired leases make a
    /// Leased job claimable again (crash recovery, at-least-once).
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        let due = self.scheduled_at.is_none_or(|at| now >= at);
        match &self.state {
            JobState::Pending | JobState::Failed { .. } => due,
            JobState::Leased => self.lease_until.is_none_or(|until| now >= until),
            JobState::Completed | JobState::DeadLettered { .. } => false,
        }
    }

    pub(crate) fn mark_leased(&mut self, now: DateTime<Utc>, lease: Duration) {
        self.state = JobState::Leased;
        self.attempt += 1;
        self.lease_until = Some(now + chrono::Duration::from_std(lease).unwrap_or_default());
        self.scheduled_at = None;
        self.updated_at = now;
    }

    pub(crate) fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.state = JobState::Completed;
        self.lease_until = None;
        self.updated_at = now;
    }

    /// Record a failed attempt: schedule a retry with backoff, or park the
    /// job once attempts run out.
    pub(crate) fn mark_failed(&mut self, now: DateTime<Utc>, error: String) {
        self.lease_until = None;
        self.updated_at = now;
        if self.retry.should_retry(self.attempt) {
            let delay = self.retry.delay_for_attempt(self.attempt);
            self.scheduled_at = Some(now + chrono::Duration::from_std(delay).unwrap_or_default());
            self.state = JobState::Failed { error };
        } else {
            self.state = JobState::DeadLettered {
                error,
                attempts: self.attempt,
            };
        }
    }
}

/// Dead-letter queue entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub job: Job,
    pub dead_lettered_at: DateTime<Utc>,
    pub reason: String,
}

/// Per-queue counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub leased: usize,
    pub completed: usize,
    pub failed: usize,
    pub dead_lettered: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles_until_the_cap() {
        let policy = RetryPolicy::exponential(
            5,
            Duration::from_millis(100),
            Duration::from_millis(300),
        );

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(300));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(300));
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(500));

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(500));
    }

    #[test]
    fn should_retry_respects_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            ..Default::default()
        };

        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn job_lifecycle() {
        let mut job = Job::new("q", "work", serde_json::json!({"key": "value"}));
        let now = Utc::now();
        assert!(job.is_claimable(now));

        job.mark_leased(now, Duration::from_secs(30));
        assert_eq!(job.state, JobState::Leased);
        assert_eq!(job.attempt, 1);
        assert!(!job.is_claimable(now));

        // Lease expiry reopens the job.
        assert!(job.is_claimable(now + chrono::Duration::seconds(31)));

        job.mark_completed(now);
        assert!(job.state.is_terminal());
    }

    #[test]
    fn failure_schedules_retry_then_dead_letters() {
        let mut job = Job::new("q", "work", serde_json::json!({}))
            .with_retry_policy(RetryPolicy::fixed(2, Duration::from_millis(10)));
        let now = Utc::now();

        job.mark_leased(now, Duration::from_secs(30));
        job.mark_failed(now, "boom".into());
        assert!(matches!(job.state, JobState::Failed { .. }));
        assert!(job.scheduled_at.is_some());
        // Not claimable until the backoff elapses.
        assert!(!job.is_claimable(now));
        assert!(job.is_claimable(now + chrono::Duration::milliseconds(11)));

        job.mark_leased(now + chrono::Duration::milliseconds(11), Duration::from_secs(30));
        job.mark_failed(now, "boom again".into());
        assert!(matches!(
            job.state,
            JobState::DeadLettered { attempts: 2, .. }
        ));
    }
}
