//! The offline context: one wired object instead of ambient singletons.

use std::future::Future;
use std::sync::Arc;

use tracing::warn;

use crate::conflict::{
    ConflictDetector, ConflictError, ConflictResolution, ConflictResolver, MergePolicy,
    ResolutionStrategy, ResourceType, StrategyPolicy, SyncConflict,
};
use crate::failure::SyncFailure;
use crate::probe::{ConnectivityProbe, FlagProbe};
use crate::queue::{ErrorQueue, QueueConfig, QueueError};
use crate::retry::RetryExecutor;
use crate::store::KeyValueStore;

/// Everything the offline layer needs, wired together explicitly.
///
/// The context owns the error queue, the retry executor, the connectivity
/// probe, and the conflict machinery. Callers construct one per app (or
/// per test) and pass it around; nothing here reaches for global state, so
/// two contexts over different stores are fully independent.
pub struct OfflineContext {
    queue: Arc<ErrorQueue>,
    retry: RetryExecutor,
    probe: Arc<dyn ConnectivityProbe>,
    detector: ConflictDetector,
    resolver: ConflictResolver,
    strategy_policy: StrategyPolicy,
}

impl OfflineContext {
    /// Start building a context over the given store.
    pub fn builder(store: Arc<dyn KeyValueStore>) -> OfflineContextBuilder {
        OfflineContextBuilder::new(store)
    }

    /// The durable error queue.
    pub fn queue(&self) -> &Arc<ErrorQueue> {
        &self.queue
    }

    /// The configured retry executor.
    pub fn retry(&self) -> &RetryExecutor {
        &self.retry
    }

    /// Run an operation with connectivity-gated retry.
    pub async fn run<F, Fut, T>(&self, operation: F) -> Result<T, SyncFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SyncFailure>>,
    {
        self.retry.execute_online(self.probe.as_ref(), operation).await
    }

    /// Run an operation with retry; when a retryable failure exhausts its
    /// attempts, capture it in the durable queue before propagating it
    /// unchanged.
    ///
    /// Non-retryable failures propagate without being queued: the caller
    /// already surfaced them once, and a replay can never succeed. The
    /// queue holds only work that stands a chance later.
    ///
    /// `payload` is stored alongside the record so the failed operation
    /// can be replayed later. A queue write failure is logged rather than
    /// surfaced, so the caller always sees the original failure.
    pub async fn run_or_queue<F, Fut, T>(
        &self,
        operation: F,
        payload: Option<serde_json::Value>,
    ) -> Result<T, SyncFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SyncFailure>>,
    {
        match self.run(operation).await {
            Ok(value) => Ok(value),
            Err(failure) => {
                if failure.is_retryable() {
                    let kind = failure.classify();
                    if let Err(queue_err) =
                        self.queue.add_error(kind, failure.message(), payload).await
                    {
                        warn!(error = %queue_err, "Failed to queue error record");
                    }
                }
                Err(failure)
            }
        }
    }

    /// Compare local and remote snapshots of an entity.
    pub fn detect_conflict(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        local: &serde_json::Value,
        remote: &serde_json::Value,
    ) -> Result<Option<SyncConflict>, ConflictError> {
        self.detector.detect(resource_type, resource_id, local, remote)
    }

    /// Settle a conflict. With `strategy` as `None`, the policy table's
    /// default for the conflict's resource type applies.
    pub fn resolve_conflict(
        &self,
        conflict: &SyncConflict,
        strategy: Option<ResolutionStrategy>,
    ) -> Result<ConflictResolution, ConflictError> {
        let strategy =
            strategy.unwrap_or_else(|| self.strategy_policy.default_strategy(&conflict.resource_type));
        self.resolver.resolve(conflict, strategy)
    }

    /// The default-strategy table in effect.
    pub fn strategy_policy(&self) -> &StrategyPolicy {
        &self.strategy_policy
    }
}

/// Builder for [`OfflineContext`].
///
/// Defaults: an always-connected probe, the default retry executor, the
/// fitness merge rules, and the [`StrategyPolicy::background_sync`]
/// profile. Interactive flows should install
/// [`StrategyPolicy::interactive_save`] instead.
pub struct OfflineContextBuilder {
    store: Arc<dyn KeyValueStore>,
    queue_config: QueueConfig,
    retry: RetryExecutor,
    probe: Arc<dyn ConnectivityProbe>,
    merge_policy: MergePolicy,
    strategy_policy: StrategyPolicy,
}

impl OfflineContextBuilder {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            queue_config: QueueConfig::default(),
            retry: RetryExecutor::new(),
            probe: Arc::new(FlagProbe::default()),
            merge_policy: MergePolicy::fitness_defaults(),
            strategy_policy: StrategyPolicy::background_sync(),
        }
    }

    pub fn queue_config(mut self, config: QueueConfig) -> Self {
        self.queue_config = config;
        self
    }

    pub fn retry(mut self, executor: RetryExecutor) -> Self {
        self.retry = executor;
        self
    }

    pub fn probe(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    pub fn strategy_policy(mut self, policy: StrategyPolicy) -> Self {
        self.strategy_policy = policy;
        self
    }

    /// Build the context and load the persisted error queue.
    pub async fn build(self) -> Result<OfflineContext, QueueError> {
        let queue = Arc::new(ErrorQueue::with_config(self.store, self.queue_config)?);
        queue.initialize().await?;

        Ok(OfflineContext {
            queue,
            retry: self.retry,
            probe: self.probe,
            detector: ConflictDetector::new(),
            resolver: ConflictResolver::new(self.merge_policy),
            strategy_policy: self.strategy_policy,
        })
    }
}
