// modgraph-core/src/transform.rs
// Transform model: the kind (structural vs streaming) is decided once
// at construction and carried as a tagged enum, never re-inspected.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use futures::future::BoxFuture;
use modgraph_common::error::Result;
use modgraph_common::merge::RecordPatch;
use modgraph_common::module::{ModuleId, ModuleRecord};
use serde_json::Value;

/// What a transform gets to see beyond the record itself.
pub struct TransformCtx<'a> {
    pub basedir: &'a Path,
}

/// Receives the full record, returns a partial-record patch (or no
/// changes). Runs against the record as accumulated so far.
pub trait StructuralTransform: Send + Sync {
    fn apply<'a>(
        &'a self,
        record: &'a ModuleRecord,
        ctx: &'a TransformCtx<'a>,
    ) -> BoxFuture<'a, Result<Option<RecordPatch>>>;
}

/// Consumes and replaces the module's source text.
pub trait StreamingTransform: Send + Sync {
    fn rewrite<'a>(&'a self, id: &'a ModuleId, source: String) -> BoxFuture<'a, Result<String>>;
}

#[derive(Clone)]
pub enum Transform {
    Structural(Arc<dyn StructuralTransform>),
    Streaming(Arc<dyn StreamingTransform>),
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Structural(_) => f.write_str("Transform::Structural(..)"),
            Transform::Streaming(_) => f.write_str("Transform::Streaming(..)"),
        }
    }
}

/// Either a name resolved through the session's transform loader, or
/// a directly supplied transform.
#[derive(Debug, Clone)]
pub enum TransformDescriptor {
    Loadable(String),
    Supplied(Transform),
}

impl From<&str> for TransformDescriptor {
    fn from(name: &str) -> Self {
        TransformDescriptor::Loadable(name.to_string())
    }
}

impl From<String> for TransformDescriptor {
    fn from(name: String) -> Self {
        TransformDescriptor::Loadable(name)
    }
}

impl From<Transform> for TransformDescriptor {
    fn from(transform: Transform) -> Self {
        TransformDescriptor::Supplied(transform)
    }
}

/// Wrap a plain synchronous closure as a structural transform.
pub fn structural_fn<F>(f: F) -> Transform
where
    F: Fn(&ModuleRecord) -> Result<Option<RecordPatch>> + Send + Sync + 'static,
{
    struct FnStructural<F>(F);
    impl<F> StructuralTransform for FnStructural<F>
    where
        F: Fn(&ModuleRecord) -> Result<Option<RecordPatch>> + Send + Sync,
    {
        fn apply<'a>(
            &'a self,
            record: &'a ModuleRecord,
            _ctx: &'a TransformCtx<'a>,
        ) -> BoxFuture<'a, Result<Option<RecordPatch>>> {
            Box::pin(async move { (self.0)(record) })
        }
    }
    Transform::Structural(Arc::new(FnStructural(f)))
}

/// Wrap a plain synchronous closure as a streaming (source-rewriting)
/// transform.
pub fn streaming_fn<F>(f: F) -> Transform
where
    F: Fn(&ModuleId, String) -> Result<String> + Send + Sync + 'static,
{
    struct FnStreaming<F>(F);
    impl<F> StreamingTransform for FnStreaming<F>
    where
        F: Fn(&ModuleId, String) -> Result<String> + Send + Sync,
    {
        fn rewrite<'a>(
            &'a self,
            id: &'a ModuleId,
            source: String,
        ) -> BoxFuture<'a, Result<String>> {
            Box::pin(async move { (self.0)(id, source) })
        }
    }
    Transform::Streaming(Arc::new(FnStreaming(f)))
}

/// Loads a named transform, trying the requesting module's directory
/// first and the session base directory second. Both lookups failing
/// is fatal for the session.
pub trait LoadTransform: Send + Sync {
    fn load<'a>(
        &'a self,
        name: &'a str,
        from_dir: &'a Path,
    ) -> BoxFuture<'a, Result<Option<Transform>>>;
}

/// Default loader: a caller-registered table of named transforms.
/// Lookup ignores the directory; registries are how native code
/// stands in for the dynamic module loading the descriptor names.
#[derive(Default)]
pub struct TransformRegistry {
    transforms: HashMap<String, Transform>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, transform: Transform) -> &mut Self {
        self.transforms.insert(name.into(), transform);
        self
    }
}

impl LoadTransform for TransformRegistry {
    fn load<'a>(
        &'a self,
        name: &'a str,
        _from_dir: &'a Path,
    ) -> BoxFuture<'a, Result<Option<Transform>>> {
        Box::pin(async move { Ok(self.transforms.get(name).cloned()) })
    }
}

/// Extensions whose modules get the data-wrapping transform appended
/// after dependency extraction.
pub(crate) const DATA_EXTENSIONS: &[&str] = &[".json"];

pub(crate) fn is_data_module(id: &ModuleId) -> bool {
    DATA_EXTENSIONS.iter().any(|ext| id.has_extension(ext))
}

/// Built-in wrapper turning a data module's body into an exporting
/// module.
pub(crate) struct JsonTransform;

impl StructuralTransform for JsonTransform {
    fn apply<'a>(
        &'a self,
        record: &'a ModuleRecord,
        _ctx: &'a TransformCtx<'a>,
    ) -> BoxFuture<'a, Result<Option<RecordPatch>>> {
        Box::pin(async move {
            let Some(source) = &record.source else {
                return Ok(None);
            };
            let mut patch = RecordPatch::new();
            patch.insert(
                "source".to_string(),
                Value::String(format!("module.exports = {source}")),
            );
            Ok(Some(patch))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn json_transform_wraps_source() {
        let mut record = ModuleRecord::stub(ModuleId::new("/data.json"));
        record.source = Some("{\"a\": 1}".to_string());
        let ctx = TransformCtx {
            basedir: Path::new("/"),
        };
        let patch = JsonTransform.apply(&record, &ctx).await.unwrap().unwrap();
        assert_eq!(
            patch["source"],
            serde_json::json!("module.exports = {\"a\": 1}")
        );
    }

    #[tokio::test]
    async fn registry_resolves_registered_names_only() {
        let mut registry = TransformRegistry::new();
        registry.register("upper", streaming_fn(|_, source| Ok(source.to_uppercase())));
        assert!(registry
            .load("upper", Path::new("/"))
            .await
            .unwrap()
            .is_some());
        assert!(registry
            .load("missing", Path::new("/"))
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn data_module_detection() {
        assert!(is_data_module(&ModuleId::new("/a/b.json")));
        assert!(!is_data_module(&ModuleId::new("/a/b.js")));
    }
}
