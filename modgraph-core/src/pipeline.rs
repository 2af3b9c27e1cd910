// modgraph-core/src/pipeline.rs
// Per-module transform pipeline. Steps run strictly sequentially:
// streaming transforms replace `source`, and later transforms
// (including the extractor) must observe that replacement.

use modgraph_common::error::{GraphError, Result};
use modgraph_common::merge::apply_patch;
use modgraph_common::module::{DepMap, ModuleId, ModuleRecord};
use serde_json::Value;
use tracing::debug;

use crate::resolve::nearest_package;
use crate::transform::{
    is_data_module, JsonTransform, StructuralTransform, Transform, TransformCtx,
    TransformDescriptor,
};
use crate::walk::Session;

impl Session {
    pub(crate) async fn run_pipeline(&self, record: ModuleRecord) -> Result<ModuleRecord> {
        let mut record = self.read_source(record).await?;
        debug!("running transform pipeline for {}", record.id);

        // Entries are seeded without going through the resolver, so
        // their nearest manifest is discovered here; resolved
        // dependencies already carry theirs.
        if record.package.is_none() {
            record.package =
                nearest_package(record.id.as_path(), self.opts.package_filter.as_ref()).await?;
        }

        let descriptors = self.assemble_transforms(&record);
        let mut transforms = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            transforms.push(self.load_transform(&record.id, descriptor).await?);
        }

        let ctx = TransformCtx {
            basedir: &self.basedir,
        };
        for transform in transforms {
            match transform {
                Transform::Structural(transform) => {
                    let patch = transform.apply(&record, &ctx).await?;
                    record = apply_patch(&record, patch);
                }
                Transform::Streaming(transform) => {
                    let source = record.source.take().unwrap_or_default();
                    record.source = Some(transform.rewrite(&record.id, source).await?);
                }
            }
        }

        // The extractor runs after every configured transform so it
        // sees the fully transformed source.
        record = self.extract_deps(record).await?;

        if is_data_module(&record.id) {
            let patch = JsonTransform.apply(&record, &ctx).await?;
            record = apply_patch(&record, patch);
        }

        Ok(record)
    }

    async fn read_source(&self, mut record: ModuleRecord) -> Result<ModuleRecord> {
        if record.source.is_some() {
            return Ok(record);
        }
        let pending = self.entry_sources.lock().unwrap().remove(&record.id);
        if let Some(source) = pending {
            record.source = Some(source);
            return Ok(record);
        }
        record.source = Some(tokio::fs::read_to_string(record.id.as_path()).await?);
        Ok(record)
    }

    /// TransformSet order: global, then entry-scoped for top-level
    /// modules, then package-manifest-declared. The built-in
    /// extractor and data wrapper are appended by run_pipeline.
    fn assemble_transforms(&self, record: &ModuleRecord) -> Vec<TransformDescriptor> {
        let mut descriptors = self.opts.global_transforms.clone();
        if self.is_top_level(&record.id) {
            descriptors.extend(self.opts.transforms.iter().cloned());
        }
        descriptors.extend(self.package_transforms(record));
        descriptors
    }

    /// A module is top-level when it sits under some entry's
    /// directory without passing through node_modules.
    fn is_top_level(&self, id: &ModuleId) -> bool {
        let path = id.as_path();
        self.entry_dirs.iter().any(|dir| match path.strip_prefix(dir) {
            Ok(rel) => !rel.components().any(|c| c.as_os_str() == "node_modules"),
            Err(_) => false,
        })
    }

    /// Transforms declared in the nearest package manifest, located
    /// by walking the configured key path.
    fn package_transforms(&self, record: &ModuleRecord) -> Vec<TransformDescriptor> {
        if self.opts.transform_key.is_empty() {
            return Vec::new();
        }
        let Some(package) = &record.package else {
            return Vec::new();
        };
        let mut value: &Value = package;
        for key in &self.opts.transform_key {
            match value.get(key) {
                Some(next) => value = next,
                None => return Vec::new(),
            }
        }
        match value {
            Value::String(name) => vec![TransformDescriptor::Loadable(name.clone())],
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .map(|name| TransformDescriptor::Loadable(name.to_string()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Resolve a loadable descriptor against the requesting module's
    /// directory, falling back to the session base directory; both
    /// failing aborts the session.
    async fn load_transform(
        &self,
        module: &ModuleId,
        descriptor: TransformDescriptor,
    ) -> Result<Transform> {
        match descriptor {
            TransformDescriptor::Supplied(transform) => Ok(transform),
            TransformDescriptor::Loadable(name) => {
                let module_dir = module.dir();
                if let Some(transform) = self.loader.load(&name, &module_dir).await? {
                    return Ok(transform);
                }
                if let Some(transform) = self.loader.load(&name, &self.basedir).await? {
                    return Ok(transform);
                }
                Err(GraphError::TransformLoad {
                    transform: name,
                    module: module.to_string(),
                })
            }
        }
    }

    /// Mandatory extractor step: populate deps from the transformed
    /// source. Extraction failure means "no statically discoverable
    /// dependencies"; a no-parse policy hit skips extraction
    /// entirely.
    async fn extract_deps(&self, mut record: ModuleRecord) -> Result<ModuleRecord> {
        if self.opts.no_parse.skips(&record.id) {
            debug!("{} excluded from extraction by no-parse policy", record.id);
            record.deps.get_or_insert_with(DepMap::new);
            return Ok(record);
        }

        let source = record.source.as_deref().unwrap_or_default();
        let specifiers = match self.extractor.extract(source) {
            Ok(specifiers) => specifiers,
            Err(err) => {
                debug!("extraction failed for {} ({err}), treating as no deps", record.id);
                Vec::new()
            }
        };

        let resolved = self.resolve_many(specifiers, &record).await?;
        record.deps.get_or_insert_with(DepMap::new).extend(resolved);
        Ok(record)
    }
}
