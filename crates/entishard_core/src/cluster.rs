//! Node registry and router.
//!
//! A [`Cluster`] maps shard ids to running node actors. Each node runs as
//! one tokio task that owns its [`Node`] exclusively and processes its
//! mailbox one job at a time, so every operation on a shard observes the
//! effects of the previous one.
//!
//! Nodes activate on demand: the first [`Cluster::call`] for an origin
//! spawns its actor, which loads the shard's state before taking mail.
//! A node stops when deactivated explicitly, when the cluster shuts down,
//! or after the configured idle timeout. Stopping closes the mailbox, runs
//! the jobs already queued, and flushes the shard before the node leaves
//! the registry; calls that raced with the shutdown wait for it to finish
//! and then activate a fresh node.
//!
//! Calls are not reentrant. A job on node A that calls node B while a job
//! on B calls node A deadlocks both; modules must not build such cycles.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::id::{IdGenerator, SequenceIdGenerator};
use crate::module::{Module, ModuleDispatcher};
use crate::node::Node;
use crate::persist::PersistenceAdapter;
use crate::schema::Schema;
use crate::stats::ClusterStats;
use crate::storage::StorageMode;
use entishard_storage::{CacheClient, DocumentStore, InMemoryCache, InMemoryDocumentStore};
use futures::future::{join_all, BoxFuture};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// A unit of work run on a node.
trait Job: Send {
    fn run<'a>(self: Box<Self>, node: &'a mut Node) -> BoxFuture<'a, ()>;
}

struct Call<F, R> {
    f: F,
    reply: oneshot::Sender<R>,
}

impl<F, R> Job for Call<F, R>
where
    F: for<'a> FnOnce(&'a mut Node) -> BoxFuture<'a, R> + Send + 'static,
    R: Send + 'static,
{
    fn run<'a>(self: Box<Self>, node: &'a mut Node) -> BoxFuture<'a, ()> {
        let Call { f, reply } = *self;
        let fut = f(node);
        Box::pin(async move {
            // The caller may have given up waiting.
            let _ = reply.send(fut.await);
        })
    }
}

enum Mail {
    Call(Box<dyn Job>),
    Stop(oneshot::Sender<()>),
}

#[derive(Clone)]
struct NodeEntry {
    tx: mpsc::Sender<Mail>,
    generation: u64,
    active: Arc<AtomicBool>,
    stopped: watch::Receiver<bool>,
}

struct ClusterInner {
    config: Config,
    schema: Arc<Schema>,
    cache: Arc<dyn CacheClient>,
    persistence: PersistenceAdapter,
    modules: Arc<ModuleDispatcher>,
    ids: Arc<dyn IdGenerator>,
    stats: Arc<ClusterStats>,
    nodes: RwLock<HashMap<i64, NodeEntry>>,
    next_generation: AtomicU64,
}

/// Registry and router for the nodes of one process.
///
/// Cloning is cheap; all clones share the same registry. Call
/// [`Cluster::shutdown`] before dropping the last handle so that every
/// node flushes.
#[derive(Clone)]
pub struct Cluster {
    inner: Arc<ClusterInner>,
}

impl Cluster {
    /// Starts building a cluster.
    pub fn builder(config: Config, schema: Schema) -> ClusterBuilder {
        ClusterBuilder {
            config,
            schema,
            cache: None,
            documents: None,
            modules: ModuleDispatcher::new(),
            ids: None,
        }
    }

    /// Runs `f` on the node owning `origin`, activating it if needed, and
    /// returns its result.
    ///
    /// # Errors
    ///
    /// Returns `NodeUnavailable` if the node failed to activate or stopped
    /// before running `f`, after the configured number of retries.
    pub async fn call<R, F>(&self, origin: i64, f: F) -> CoreResult<R>
    where
        F: for<'a> FnOnce(&'a mut Node) -> BoxFuture<'a, R> + Send + 'static,
        R: Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let mut mail = Mail::Call(Box::new(Call { f, reply }));
        let mut retries = 0;
        loop {
            let entry = self.entry(origin);
            match entry.tx.send(mail).await {
                Ok(()) => break,
                Err(mpsc::error::SendError(returned)) => {
                    if retries >= self.inner.config.forward_retries {
                        return Err(CoreError::NodeUnavailable { origin });
                    }
                    retries += 1;
                    mail = returned;
                    debug!(origin, retries, "node stopping, waiting to retry");
                    let mut stopped = entry.stopped.clone();
                    let _ = stopped.wait_for(|s| *s).await;
                    self.unregister(origin, entry.generation);
                }
            }
        }
        rx.await.map_err(|_| CoreError::NodeUnavailable { origin })
    }

    /// Returns true if the node for `origin` is running and active. Never
    /// activates a node.
    #[must_use]
    pub fn is_active(&self, origin: i64) -> bool {
        self.lookup(origin)
            .is_some_and(|entry| entry.active.load(Ordering::SeqCst))
    }

    /// Returns true if a node for `origin` is running.
    #[must_use]
    pub fn is_running(&self, origin: i64) -> bool {
        self.lookup(origin).is_some()
    }

    /// Origins of every running node, sorted.
    #[must_use]
    pub fn nodes(&self) -> Vec<i64> {
        let mut origins: Vec<i64> = self.inner.nodes.read().keys().copied().collect();
        origins.sort_unstable();
        origins
    }

    /// Stops the node for `origin` after its queued jobs, flushing its
    /// shard. Returns false if no node was running.
    pub async fn deactivate(&self, origin: i64) -> bool {
        let Some(entry) = self.lookup(origin) else {
            return false;
        };
        let (reply, done) = oneshot::channel();
        if entry.tx.send(Mail::Stop(reply)).await.is_ok() && done.await.is_ok() {
            return true;
        }
        // Already stopping; wait for it.
        let mut stopped = entry.stopped.clone();
        let _ = stopped.wait_for(|s| *s).await;
        true
    }

    /// Stops every node, flushing every shard.
    pub async fn shutdown(&self) {
        let origins = self.nodes();
        info!(nodes = origins.len(), "cluster shutting down");
        join_all(origins.into_iter().map(|origin| self.deactivate(origin))).await;
    }

    /// Creates a persistent shard with a fresh origin and activates it.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the shard cannot be recorded, or
    /// `NodeUnavailable` if it fails to activate.
    pub async fn create_node(&self, mode: StorageMode) -> CoreResult<i64> {
        let origin = self.next_unique();
        self.create_node_with(origin, mode).await?;
        Ok(origin)
    }

    /// Records `origin` as persistent with `mode` and activates it.
    ///
    /// A shard's mode is fixed once recorded; the effective mode is
    /// returned. A node that is already running keeps its mode.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the shard cannot be recorded, or
    /// `NodeUnavailable` if it fails to activate.
    pub async fn create_node_with(&self, origin: i64, mode: StorageMode) -> CoreResult<StorageMode> {
        if !self.is_running(origin) {
            self.inner.persistence.mark_persistent(origin, mode).await?;
        }
        self.call(origin, |node| node.mark_persistent()).await?
    }

    /// Cluster statistics.
    #[must_use]
    pub fn stats(&self) -> &Arc<ClusterStats> {
        &self.inner.stats
    }

    /// The cluster's schema.
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.inner.schema
    }

    /// The cluster's configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The persistence adapter shared by every node.
    #[must_use]
    pub fn persistence(&self) -> &PersistenceAdapter {
        &self.inner.persistence
    }

    pub(crate) fn cache(&self) -> &Arc<dyn CacheClient> {
        &self.inner.cache
    }

    pub(crate) fn modules(&self) -> &Arc<ModuleDispatcher> {
        &self.inner.modules
    }

    /// Mints a new unique id.
    #[must_use]
    pub fn next_unique(&self) -> i64 {
        self.inner.ids.next_unique()
    }

    fn lookup(&self, origin: i64) -> Option<NodeEntry> {
        self.inner.nodes.read().get(&origin).cloned()
    }

    fn entry(&self, origin: i64) -> NodeEntry {
        if let Some(entry) = self.lookup(origin) {
            return entry;
        }
        self.inner
            .nodes
            .write()
            .entry(origin)
            .or_insert_with(|| self.spawn(origin))
            .clone()
    }

    fn unregister(&self, origin: i64, generation: u64) {
        let mut nodes = self.inner.nodes.write();
        if nodes.get(&origin).is_some_and(|e| e.generation == generation) {
            nodes.remove(&origin);
        }
    }

    fn spawn(&self, origin: i64) -> NodeEntry {
        let (tx, rx) = mpsc::channel(self.inner.config.mailbox_capacity.max(1));
        let (stopped_tx, stopped) = watch::channel(false);
        let active = Arc::new(AtomicBool::new(false));
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        debug!(origin, generation, "spawning node");
        tokio::spawn(run_node(
            self.clone(),
            origin,
            generation,
            rx,
            Arc::clone(&active),
            stopped_tx,
        ));
        NodeEntry {
            tx,
            generation,
            active,
            stopped,
        }
    }
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("nodes", &self.inner.nodes.read().len())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

async fn run_node(
    cluster: Cluster,
    origin: i64,
    generation: u64,
    mut rx: mpsc::Receiver<Mail>,
    active: Arc<AtomicBool>,
    stopped: watch::Sender<bool>,
) {
    let mut node = match Node::activate(cluster.clone(), origin, active).await {
        Ok(node) => node,
        Err(e) => {
            error!(origin, error = %e, "node activation failed");
            // Queued calls see their reply dropped.
            drop(rx);
            cluster.unregister(origin, generation);
            let _ = stopped.send(true);
            return;
        }
    };
    cluster.stats().record_activation();

    let period = cluster.config().persist_interval.max(Duration::from_millis(1));
    let idle_timeout = cluster.config().idle_timeout;
    let mut persist = tokio::time::interval_at(Instant::now() + period, period);
    persist.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_mail = Instant::now();
    let mut waiters = Vec::new();

    loop {
        let next_timer = node.next_timer();
        let timer = async move {
            match next_timer {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        let idle = async move {
            match idle_timeout {
                Some(timeout) => tokio::time::sleep_until(last_mail + timeout).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            mail = rx.recv() => {
                last_mail = Instant::now();
                match mail {
                    Some(Mail::Call(job)) => job.run(&mut node).await,
                    Some(Mail::Stop(reply)) => {
                        waiters.push(reply);
                        break;
                    }
                    None => break,
                }
            }
            _ = persist.tick() => node.scheduled_flush().await,
            () = timer => node.fire_timers(Instant::now()).await,
            () = idle => {
                info!(origin, "node idle");
                break;
            }
        }
    }

    // New calls now fail to send and wait for `stopped`.
    rx.close();
    while let Some(mail) = rx.recv().await {
        match mail {
            Mail::Call(job) => job.run(&mut node).await,
            Mail::Stop(reply) => waiters.push(reply),
        }
    }
    node.shutdown().await;
    cluster.stats().record_deactivation();
    cluster.unregister(origin, generation);
    let _ = stopped.send(true);
    for waiter in waiters {
        let _ = waiter.send(());
    }
    info!(origin, "node deactivated");
}

/// Builder for [`Cluster`].
pub struct ClusterBuilder {
    config: Config,
    schema: Schema,
    cache: Option<Arc<dyn CacheClient>>,
    documents: Option<Arc<dyn DocumentStore>>,
    modules: ModuleDispatcher,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl ClusterBuilder {
    /// Sets the cache used by cold shards. Defaults to an in-memory cache.
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn CacheClient>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets the document store for snapshots. Defaults to in-memory.
    #[must_use]
    pub fn documents(mut self, documents: Arc<dyn DocumentStore>) -> Self {
        self.documents = Some(documents);
        self
    }

    /// Registers a business module.
    #[must_use]
    pub fn module(mut self, module: Arc<dyn Module>) -> Self {
        self.modules.register(module);
        self
    }

    /// Replaces the module dispatcher.
    #[must_use]
    pub fn modules(mut self, modules: ModuleDispatcher) -> Self {
        self.modules = modules;
        self
    }

    /// Sets the id generator. Defaults to a process-local sequence.
    #[must_use]
    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Validates the schema and builds the cluster. No node runs until the
    /// first call.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` if the schema is inconsistent.
    pub fn build(self) -> CoreResult<Cluster> {
        self.schema.validate()?;
        let schema = Arc::new(self.schema);
        let documents = self
            .documents
            .unwrap_or_else(|| Arc::new(InMemoryDocumentStore::new()));
        Ok(Cluster {
            inner: Arc::new(ClusterInner {
                config: self.config,
                persistence: PersistenceAdapter::new(documents, Arc::clone(&schema)),
                schema,
                cache: self
                    .cache
                    .unwrap_or_else(|| Arc::new(InMemoryCache::default())),
                modules: Arc::new(self.modules),
                ids: self
                    .ids
                    .unwrap_or_else(|| Arc::new(SequenceIdGenerator::default())),
                stats: Arc::new(ClusterStats::new()),
                nodes: RwLock::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        })
    }
}
