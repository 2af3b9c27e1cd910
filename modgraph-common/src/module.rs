// modgraph-common/src/module.rs
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use serde_json::Value;

/// Canonical key identifying one module within a session. Typically an
/// absolute resolved path; in-memory entries get a synthetic generated
/// key. Two different physical sources never share an id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        ModuleId(id.into())
    }

    pub fn from_path(path: &Path) -> Self {
        ModuleId(path.to_string_lossy().into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// Directory the module lives in, used as the base for relative
    /// resolution and transform loading.
    pub fn dir(&self) -> PathBuf {
        self.as_path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"))
    }

    pub fn has_extension(&self, ext: &str) -> bool {
        self.0.ends_with(ext)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Path> for ModuleId {
    fn from(path: &Path) -> Self {
        ModuleId::from_path(path)
    }
}

impl From<PathBuf> for ModuleId {
    fn from(path: PathBuf) -> Self {
        ModuleId::from_path(&path)
    }
}

/// One resolved dependency edge. A specifier vetoed by the configured
/// filter is recorded as `Excluded` (serialized as `false`), never
/// omitted; a genuine resolution failure aborts the session instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepEntry {
    Resolved(ModuleId),
    Excluded,
}

impl DepEntry {
    pub fn id(&self) -> Option<&ModuleId> {
        match self {
            DepEntry::Resolved(id) => Some(id),
            DepEntry::Excluded => None,
        }
    }

    pub fn is_excluded(&self) -> bool {
        matches!(self, DepEntry::Excluded)
    }
}

impl Serialize for DepEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            DepEntry::Resolved(id) => id.serialize(serializer),
            DepEntry::Excluded => serializer.serialize_bool(false),
        }
    }
}

pub type DepMap = BTreeMap<String, DepEntry>;

/// The unit of work and the unit of output.
///
/// Lifecycle: created as a bare stub when first referenced, enriched
/// with `source` when read, enriched with `deps` and any
/// transform-contributed `extra` fields by the transform pipeline,
/// then reported exactly once. Invalidation resets it to a stub that
/// keeps only `id` and `package`.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub id: ModuleId,
    pub source: Option<String>,
    /// `None` until dependency extraction has run for this record.
    pub deps: Option<DepMap>,
    pub entry: bool,
    /// Nearest enclosing package manifest, kept across invalidation.
    pub package: Option<Arc<Value>>,
    /// Fields contributed by structural transforms beyond the core
    /// record shape.
    pub extra: serde_json::Map<String, Value>,
}

impl ModuleRecord {
    pub fn stub(id: ModuleId) -> Self {
        ModuleRecord {
            id,
            source: None,
            deps: None,
            entry: false,
            package: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn entry_stub(id: ModuleId) -> Self {
        ModuleRecord {
            entry: true,
            ..ModuleRecord::stub(id)
        }
    }

    /// A record is finalized once it carries both source and deps; a
    /// finalized record is immutable and reported exactly once.
    pub fn is_finalized(&self) -> bool {
        self.source.is_some() && self.deps.is_some()
    }

    /// Stub retaining only identity and manifest, the post-invalidate
    /// state.
    pub fn invalidated(&self) -> Self {
        ModuleRecord {
            package: self.package.clone(),
            entry: self.entry,
            ..ModuleRecord::stub(self.id.clone())
        }
    }

    pub fn deps(&self) -> impl Iterator<Item = (&str, &DepEntry)> {
        self.deps
            .iter()
            .flat_map(|deps| deps.iter().map(|(k, v)| (k.as_str(), v)))
    }
}

// Output shape: id, source, deps (empty map when extraction never
// ran), entry. The manifest and any pending internal state are
// stripped; transform-contributed extras ride along at the top level.
impl Serialize for ModuleRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let len = 3 + usize::from(self.source.is_some()) + self.extra.len();
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("id", &self.id)?;
        if let Some(source) = &self.source {
            map.serialize_entry("source", source)?;
        }
        match &self.deps {
            Some(deps) => map.serialize_entry("deps", deps)?,
            None => map.serialize_entry("deps", &DepMap::new())?,
        }
        map.serialize_entry("entry", &self.entry)?;
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dep_entry_serializes_excluded_as_false() {
        let mut deps = DepMap::new();
        deps.insert("./a".to_string(), DepEntry::Resolved(ModuleId::new("/a.js")));
        deps.insert("fs".to_string(), DepEntry::Excluded);
        let json = serde_json::to_value(&deps).unwrap();
        assert_eq!(json["./a"], serde_json::json!("/a.js"));
        assert_eq!(json["fs"], serde_json::json!(false));
    }

    #[test]
    fn record_output_strips_package() {
        let mut record = ModuleRecord::entry_stub(ModuleId::new("/main.js"));
        record.source = Some("module.exports = 1;".to_string());
        record.package = Some(Arc::new(serde_json::json!({"name": "pkg"})));
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("package").is_none());
        assert_eq!(json["entry"], serde_json::json!(true));
        assert_eq!(json["deps"], serde_json::json!({}));
    }

    #[test]
    fn invalidated_keeps_id_and_package() {
        let mut record = ModuleRecord::stub(ModuleId::new("/a.js"));
        record.source = Some("x".to_string());
        record.deps = Some(DepMap::new());
        record.package = Some(Arc::new(serde_json::json!({"name": "pkg"})));
        let reset = record.invalidated();
        assert_eq!(reset.id, record.id);
        assert!(reset.package.is_some());
        assert!(reset.source.is_none());
        assert!(reset.deps.is_none());
        assert!(!reset.is_finalized());
    }
}
