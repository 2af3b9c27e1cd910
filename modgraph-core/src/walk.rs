// modgraph-core/src/walk.rs
// The traversal engine. One Session per stream() call; the seen set
// is per-session, the cache outlives it.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_recursion::async_recursion;
use futures::future::try_join_all;
use modgraph_common::error::{GraphError, Result};
use modgraph_common::module::{DepEntry, DepMap, ModuleId, ModuleRecord};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, instrument};

use crate::cache::SharedCache;
use crate::extract::{ExtractDeps, RequireScanner};
use crate::options::GraphOptions;
use crate::resolve::{NodeResolver, Resolve, ResolutionContext};
use crate::transform::{LoadTransform, TransformRegistry};

pub(crate) enum WalkTarget {
    Record(ModuleRecord),
    Id(ModuleId),
}

impl WalkTarget {
    fn id(&self) -> &ModuleId {
        match self {
            WalkTarget::Record(record) => &record.id,
            WalkTarget::Id(id) => id,
        }
    }
}

pub(crate) struct Session {
    pub(crate) opts: GraphOptions,
    pub(crate) basedir: PathBuf,
    pub(crate) extensions: Vec<String>,
    pub(crate) resolver: Arc<dyn Resolve>,
    pub(crate) loader: Arc<dyn LoadTransform>,
    pub(crate) extractor: Arc<dyn ExtractDeps>,
    pub(crate) cache: SharedCache,
    /// Directories of the caller-supplied entries; a module is
    /// top-level when it sits under one of them without passing
    /// through node_modules.
    pub(crate) entry_dirs: Vec<PathBuf>,
    /// Aggregated in-memory entry sources, consumed on first read.
    pub(crate) entry_sources: Mutex<HashMap<ModuleId, String>>,
    /// Visited identities. Write-once per id, updated synchronously
    /// before any suspension point, so duplicate concurrent
    /// discoveries collapse into a single visit.
    seen: Mutex<HashSet<ModuleId>>,
    out_tx: mpsc::Sender<Result<ModuleRecord>>,
    module_tx: broadcast::Sender<ModuleRecord>,
}

impl Session {
    pub(crate) fn new(
        opts: GraphOptions,
        basedir: PathBuf,
        entry_dirs: Vec<PathBuf>,
        entry_sources: HashMap<ModuleId, String>,
        cache: SharedCache,
        out_tx: mpsc::Sender<Result<ModuleRecord>>,
        module_tx: broadcast::Sender<ModuleRecord>,
    ) -> Self {
        let extensions = opts.resolve_extensions();
        let resolver = opts
            .resolver
            .clone()
            .unwrap_or_else(|| Arc::new(NodeResolver));
        let loader = opts
            .loader
            .clone()
            .unwrap_or_else(|| Arc::new(TransformRegistry::new()));
        let extractor = opts
            .extractor
            .clone()
            .unwrap_or_else(|| Arc::new(RequireScanner));
        Session {
            opts,
            basedir,
            extensions,
            resolver,
            loader,
            extractor,
            cache,
            entry_dirs,
            entry_sources: Mutex::new(entry_sources),
            seen: Mutex::new(HashSet::new()),
            out_tx,
            module_tx,
        }
    }

    /// Drive one traversal: fan out over the entries, join every
    /// reachable branch, surface the first failure exactly once. The
    /// channel closes when the session is dropped at the end.
    #[instrument(skip_all, fields(entries = entries.len()))]
    pub(crate) async fn run(self, entries: Vec<ModuleRecord>) {
        let walks = entries
            .into_iter()
            .map(|record| self.walk(WalkTarget::Record(record)));
        if let Err(err) = try_join_all(walks).await {
            error!("graph traversal failed: {err}");
            let _ = self.out_tx.send(Err(err)).await;
        }
        debug!("graph traversal settled");
    }

    #[async_recursion]
    pub(crate) async fn walk(&self, target: WalkTarget) -> Result<()> {
        let id = target.id().clone();
        {
            let mut seen = self.seen.lock().unwrap();
            if !seen.insert(id.clone()) {
                return Ok(());
            }
        }

        let record = match self.cache.get(&id) {
            Some(cached) => cached,
            None => match target {
                WalkTarget::Record(record) => record,
                WalkTarget::Id(id) => ModuleRecord::stub(id),
            },
        };

        if record.is_finalized() {
            debug!("{id} served from cache");
            let record = self.report(record).await;
            return self.walk_deps(&record).await;
        }

        let record = self.run_pipeline(record).await?;
        let record = self.report(record).await;
        self.walk_deps(&record).await
    }

    /// Walk all resolved sibling edges concurrently; excluded edges
    /// are skipped, already-visited ones bail out inside walk().
    async fn walk_deps(&self, record: &ModuleRecord) -> Result<()> {
        let pending: Vec<ModuleId> = record
            .deps()
            .filter_map(|(_, dep)| dep.id().cloned())
            .collect();
        if pending.is_empty() {
            return Ok(());
        }
        try_join_all(pending.into_iter().map(|id| self.walk(WalkTarget::Id(id))))
            .await
            .map(|_| ())
    }

    /// Finalize and emit a record: normalize deps, store the final
    /// object in the cache, notify the side tap, then queue it on the
    /// main output.
    async fn report(&self, mut record: ModuleRecord) -> ModuleRecord {
        if record.deps.is_none() {
            record.deps = Some(DepMap::new());
        }
        self.cache.put(record.clone());
        let _ = self.module_tx.send(record.clone());
        if self.out_tx.send(Ok(record.clone())).await.is_err() {
            debug!("output receiver dropped before {} was delivered", record.id);
        }
        record
    }

    /// Resolve one specifier relative to its requesting module. A
    /// filtered specifier maps to the excluded sentinel; a resolver
    /// failure is wrapped with the specifier and requesting identity
    /// and aborts the session.
    pub(crate) async fn resolve(&self, specifier: &str, parent: &ModuleRecord) -> Result<DepEntry> {
        if let Some(filter) = &self.opts.filter {
            if !filter(specifier) {
                debug!("specifier '{specifier}' excluded by filter (from {})", parent.id);
                return Ok(DepEntry::Excluded);
            }
        }

        let ctx = ResolutionContext {
            from: &parent.id,
            extensions: &self.extensions,
            modules: &self.opts.modules,
            paths: &self.opts.paths,
            package_filter: self.opts.package_filter.as_ref(),
        };

        match self.resolver.resolve(specifier, ctx).await {
            Ok(resolved) => {
                self.cache.upsert_stub(&resolved.id, resolved.package.clone());
                Ok(DepEntry::Resolved(resolved.id))
            }
            Err(err) => Err(GraphError::Resolve {
                specifier: specifier.to_string(),
                from: parent.id.to_string(),
                message: err.to_string(),
            }),
        }
    }

    /// Resolve a set of specifiers concurrently into the requesting
    /// module's candidate deps.
    pub(crate) async fn resolve_many(
        &self,
        specifiers: Vec<String>,
        parent: &ModuleRecord,
    ) -> Result<DepMap> {
        let resolutions = specifiers.into_iter().map(|specifier| async move {
            let dep = self.resolve(&specifier, parent).await?;
            Ok::<_, GraphError>((specifier, dep))
        });
        Ok(try_join_all(resolutions).await?.into_iter().collect())
    }
}
