// modgraph-core/src/cache.rs
// Shared record cache: one entry per module identity, shared across
// traversal sessions for incremental rebuilds. Lifecycle is owned by
// the caller that holds the Arc.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use modgraph_common::module::{ModuleId, ModuleRecord};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Default)]
pub struct GraphCache {
    records: Mutex<HashMap<ModuleId, ModuleRecord>>,
}

impl GraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ModuleId) -> Option<ModuleRecord> {
        self.records.lock().unwrap().get(id).cloned()
    }

    pub fn put(&self, record: ModuleRecord) {
        self.records.lock().unwrap().insert(record.id.clone(), record);
    }

    /// Reset a cached record to a bare stub keeping only its identity
    /// and package manifest; the next session referencing it re-runs
    /// the full pipeline.
    pub fn invalidate(&self, id: &ModuleId) {
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.get(id) {
            debug!("invalidating cached record for {id}");
            let reset = record.invalidated();
            records.insert(id.clone(), reset);
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().unwrap().is_empty()
    }

    /// Ensure a stub exists for a freshly resolved identity, filling
    /// in the manifest if the record does not carry one yet. Never
    /// clobbers an existing (possibly finalized) record.
    pub(crate) fn upsert_stub(&self, id: &ModuleId, package: Option<Arc<Value>>) {
        let mut records = self.records.lock().unwrap();
        let record = records
            .entry(id.clone())
            .or_insert_with(|| ModuleRecord::stub(id.clone()));
        if record.package.is_none() {
            record.package = package;
        }
    }

    /// Insert an entry seed unless the identity is already cached (a
    /// later session reuses the finalized record).
    pub(crate) fn seed_entry(&self, record: ModuleRecord) {
        let mut records = self.records.lock().unwrap();
        let entry = records
            .entry(record.id.clone())
            .or_insert_with(|| record.clone());
        entry.entry = true;
    }
}

pub type SharedCache = Arc<GraphCache>;

#[cfg(test)]
mod tests {
    use modgraph_common::module::DepMap;

    use super::*;

    #[test]
    fn invalidate_resets_to_stub_keeping_package() {
        let cache = GraphCache::new();
        let id = ModuleId::new("/a.js");
        let mut record = ModuleRecord::stub(id.clone());
        record.source = Some("x".to_string());
        record.deps = Some(DepMap::new());
        record.package = Some(Arc::new(serde_json::json!({"name": "pkg"})));
        cache.put(record);

        cache.invalidate(&id);
        let reset = cache.get(&id).unwrap();
        assert!(!reset.is_finalized());
        assert!(reset.source.is_none());
        assert!(reset.package.is_some());
    }

    #[test]
    fn upsert_stub_never_clobbers() {
        let cache = GraphCache::new();
        let id = ModuleId::new("/a.js");
        let mut record = ModuleRecord::stub(id.clone());
        record.source = Some("x".to_string());
        cache.put(record);

        cache.upsert_stub(&id, Some(Arc::new(serde_json::json!({"name": "pkg"}))));
        let stored = cache.get(&id).unwrap();
        assert_eq!(stored.source.as_deref(), Some("x"));
        assert!(stored.package.is_some());
    }
}
