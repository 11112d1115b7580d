//! Wires the domain services and worker pools over shared in-memory
//! infrastructure.

use std::sync::Arc;
use std::time::Duration;

use tilawa_feed::service::FeedService;
use tilawa_feed::CacheInvalidationCoordinator;
use tilawa_recitation::analysis::{AnalysisWorker, AudioScorer, ReferenceScorer};
use tilawa_recitation::jobs::{ANALYSIS_QUEUE, AnalysisJobData, MODERATION_QUEUE, ModerationJobData};
use tilawa_recitation::moderation::{ModerationPolicy, ModerationWorker, StaticPolicy};
use tilawa_recitation::reconcile::Reconciler;
use tilawa_recitation::submission::SubmissionService;

use crate::cache::InMemoryTtlCache;
use crate::jobs::{
    ConsumerPool, ConsumerPoolConfig, HandlerOutcome, InMemoryJobQueue, JobHandler, PoolHandle,
};
use crate::storage::InMemoryAudioStorage;
use crate::store::InMemoryRecitationStore;

type Store = Arc<InMemoryRecitationStore>;
type Queue = Arc<InMemoryJobQueue>;
type Cache = Arc<InMemoryTtlCache>;
type Storage = Arc<InMemoryAudioStorage>;
type Hook = Arc<CacheInvalidationCoordinator<Cache>>;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Analysis pool width.
    pub analysis_concurrency: usize,
    /// Moderation pool width.
    pub moderation_concurrency: usize,
    pub poll_interval: Duration,
    /// Lease per claim; a worker that dies mid-job gets redelivered after
    /// this long.
    pub lease: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            analysis_concurrency: 5,
            moderation_concurrency: 10,
            poll_interval: Duration::from_millis(20),
            lease: Duration::from_secs(30),
        }
    }
}

/// The assembled pipeline: shared store, queue, cache and blob storage plus
/// the two running consumer pools. Shut down explicitly via
/// [`Pipeline::shutdown`]; nothing stops on drop.
pub struct Pipeline {
    pub store: Store,
    pub queue: Queue,
    pub cache: Cache,
    pub storage: Storage,
    hook: Hook,
    pools: Vec<PoolHandle>,
}

impl Pipeline {
    /// Start with the reference scorer and an approve-everything policy.
    pub fn start(config: PipelineConfig) -> Self {
        Self::start_with(config, ReferenceScorer, StaticPolicy::approve_all())
    }

    /// Start with injected analysis and moderation gates.
    pub fn start_with<Sc, P>(config: PipelineConfig, scorer: Sc, policy: P) -> Self
    where
        Sc: AudioScorer + 'static,
        P: ModerationPolicy + 'static,
    {
        let store: Store = Arc::new(InMemoryRecitationStore::new());
        let queue: Queue = Arc::new(InMemoryJobQueue::new());
        let cache: Cache = Arc::new(InMemoryTtlCache::new());
        let storage: Storage = Arc::new(InMemoryAudioStorage::new());
        let hook: Hook = Arc::new(CacheInvalidationCoordinator::new(cache.clone()));

        let analysis_worker = Arc::new(AnalysisWorker::new(
            store.clone(),
            store.clone(),
            queue.clone(),
            scorer,
        ));
        let analysis_handler: JobHandler = Arc::new(move |job| {
            let data: AnalysisJobData = match serde_json::from_value(job.payload.clone()) {
                Ok(data) => data,
                Err(e) => return HandlerOutcome::Retry(format!("undecodable payload: {e}")),
            };
            match analysis_worker.handle(&data) {
                Ok(_) => HandlerOutcome::Done,
                Err(e) => HandlerOutcome::Retry(e.to_string()),
            }
        });

        let moderation_worker = Arc::new(ModerationWorker::new(
            store.clone(),
            store.clone(),
            policy,
            hook.clone(),
        ));
        let moderation_handler: JobHandler = Arc::new(move |job| {
            let data: ModerationJobData = match serde_json::from_value(job.payload.clone()) {
                Ok(data) => data,
                Err(e) => return HandlerOutcome::Retry(format!("undecodable payload: {e}")),
            };
            match moderation_worker.handle(&data) {
                Ok(_) => HandlerOutcome::Done,
                Err(e) => HandlerOutcome::Retry(e.to_string()),
            }
        });

        let pools = vec![
            ConsumerPool::spawn(
                queue.clone(),
                ConsumerPoolConfig::new(ANALYSIS_QUEUE, "analysis")
                    .with_concurrency(config.analysis_concurrency)
                    .with_poll_interval(config.poll_interval)
                    .with_lease(config.lease),
                analysis_handler,
            ),
            ConsumerPool::spawn(
                queue.clone(),
                ConsumerPoolConfig::new(MODERATION_QUEUE, "moderation")
                    .with_concurrency(config.moderation_concurrency)
                    .with_poll_interval(config.poll_interval)
                    .with_lease(config.lease),
                moderation_handler,
            ),
        ];

        Self {
            store,
            queue,
            cache,
            storage,
            hook,
            pools,
        }
    }

    /// Owner-facing submission operations over the shared infrastructure.
    pub fn submissions(&self) -> SubmissionService<Store, Storage, Queue, Hook> {
        SubmissionService::new(
            self.store.clone(),
            self.storage.clone(),
            self.queue.clone(),
            self.hook.clone(),
        )
    }

    /// Cached feed reads over the shared store.
    pub fn feed(&self) -> FeedService<Store, Cache> {
        FeedService::new(self.store.clone(), self.cache.clone())
    }

    /// Sweep for records stranded by lost enqueues.
    pub fn reconciler(&self) -> Reconciler<Store, Store, Queue> {
        Reconciler::new(self.store.clone(), self.store.clone(), self.queue.clone())
    }

    /// Stop both pools and join their threads.
    pub fn shutdown(self) {
        for pool in self.pools {
            pool.shutdown();
        }
    }
}
