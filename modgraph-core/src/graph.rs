// modgraph-core/src/graph.rs
// Public surface: construct a graph from entries + options, stream
// finalized records, aggregate, invalidate, tap.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use modgraph_common::error::Result;
use modgraph_common::module::{ModuleId, ModuleRecord};
use rand::Rng;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::cache::{GraphCache, SharedCache};
use crate::options::GraphOptions;
use crate::resolve::normalize;
use crate::walk::Session;

const OUTPUT_CHANNEL_SIZE: usize = 100;
const MODULE_EVENT_CHANNEL_SIZE: usize = 100;

/// One caller-supplied entry: a filesystem path, an in-memory source
/// (assigned a synthetic identity), or a pre-built record stub.
pub enum GraphEntry {
    Path(PathBuf),
    Source(String),
    Record(ModuleRecord),
}

impl From<PathBuf> for GraphEntry {
    fn from(path: PathBuf) -> Self {
        GraphEntry::Path(path)
    }
}

impl From<&Path> for GraphEntry {
    fn from(path: &Path) -> Self {
        GraphEntry::Path(path.to_path_buf())
    }
}

impl From<&str> for GraphEntry {
    fn from(path: &str) -> Self {
        GraphEntry::Path(PathBuf::from(path))
    }
}

impl From<ModuleRecord> for GraphEntry {
    fn from(record: ModuleRecord) -> Self {
        GraphEntry::Record(record)
    }
}

pub struct ModuleGraph {
    options: GraphOptions,
    basedir: PathBuf,
    cache: SharedCache,
    entries: Vec<ModuleId>,
    entry_sources: HashMap<ModuleId, String>,
    module_tx: broadcast::Sender<ModuleRecord>,
}

impl ModuleGraph {
    pub fn new(options: GraphOptions) -> Self {
        let basedir = options
            .basedir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")));
        let cache = options
            .cache
            .clone()
            .unwrap_or_else(|| SharedCache::new(GraphCache::new()));
        let (module_tx, _) = broadcast::channel(MODULE_EVENT_CHANNEL_SIZE);
        ModuleGraph {
            options,
            basedir,
            cache,
            entries: Vec::new(),
            entry_sources: HashMap::new(),
            module_tx,
        }
    }

    pub fn add_entry(&mut self, entry: impl Into<GraphEntry>) -> &mut Self {
        let record = match entry.into() {
            GraphEntry::Path(path) => {
                let absolute = if path.is_absolute() {
                    normalize(&path)
                } else {
                    normalize(&self.basedir.join(path))
                };
                ModuleRecord::entry_stub(ModuleId::from_path(&absolute))
            }
            GraphEntry::Source(source) => {
                let id = self.synthetic_id();
                debug!("in-memory entry assigned synthetic identity {id}");
                self.entry_sources.insert(id.clone(), source);
                ModuleRecord::entry_stub(id)
            }
            GraphEntry::Record(mut record) => {
                record.entry = true;
                record
            }
        };
        self.entries.push(record.id.clone());
        self.cache.seed_entry(record);
        self
    }

    /// Aggregate an in-memory readable source fully, then add it as
    /// an entry under a synthetic identity.
    pub async fn add_reader<R>(&mut self, mut reader: R) -> Result<&mut Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut source = String::new();
        reader.read_to_string(&mut source).await?;
        Ok(self.add_entry(GraphEntry::Source(source)))
    }

    /// Side notification channel: every finalized record is sent here
    /// before it is queued on the main output.
    pub fn subscribe_modules(&self) -> broadcast::Receiver<ModuleRecord> {
        self.module_tx.subscribe()
    }

    pub fn invalidate(&self, id: &ModuleId) {
        self.cache.invalidate(id);
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Run one traversal session. Returns the output channel: one
    /// finalized record per reachable module, exactly once, then a
    /// clean close; any failure aborts the channel with a single Err.
    pub fn stream(&self) -> mpsc::Receiver<Result<ModuleRecord>> {
        let (out_tx, out_rx) = mpsc::channel(OUTPUT_CHANNEL_SIZE);

        let entries: Vec<ModuleRecord> = self
            .entries
            .iter()
            .map(|id| {
                self.cache
                    .get(id)
                    .unwrap_or_else(|| ModuleRecord::entry_stub(id.clone()))
            })
            .collect();
        let entry_dirs: Vec<PathBuf> = self.entries.iter().map(ModuleId::dir).collect();

        let session = Session::new(
            self.options.clone(),
            self.basedir.clone(),
            entry_dirs,
            self.entry_sources.clone(),
            SharedCache::clone(&self.cache),
            out_tx,
            self.module_tx.clone(),
        );
        tokio::spawn(session.run(entries));
        out_rx
    }

    /// Whole-graph convenience form: drain the stream into a mapping
    /// from identity to record.
    pub async fn walk(&self) -> Result<BTreeMap<ModuleId, ModuleRecord>> {
        let mut rx = self.stream();
        let mut graph = BTreeMap::new();
        while let Some(item) = rx.recv().await {
            let record = item?;
            graph.insert(record.id.clone(), record);
        }
        Ok(graph)
    }

    fn synthetic_id(&self) -> ModuleId {
        let bytes: [u8; 8] = rand::rng().random();
        ModuleId::from_path(&self.basedir.join(format!("{}.js", hex::encode(bytes))))
    }
}
