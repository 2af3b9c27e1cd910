// modgraph-core/src/options.rs
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::SharedCache;
use crate::extract::{ExtractDeps, NoParse};
use crate::resolve::{PackageFilter, Resolve};
use crate::transform::{LoadTransform, TransformDescriptor};

/// Predicate vetoing a specifier before resolution is attempted; a
/// vetoed specifier lands in `deps` as the excluded sentinel.
pub type SpecifierFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Resolvable suffixes tried by default, ahead of any configured
/// extras.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".js", ".json"];

#[derive(Clone, Default)]
pub struct GraphOptions {
    /// Root for synthetic identities and the transform loader's
    /// fallback directory. Defaults to the current directory.
    pub basedir: Option<PathBuf>,
    /// Appended to [`DEFAULT_EXTENSIONS`].
    pub extensions: Vec<String>,
    /// Override for the resolution algorithm.
    pub resolver: Option<Arc<dyn Resolve>>,
    pub filter: Option<SpecifierFilter>,
    /// Entry-scoped transforms, applied only to top-level (non
    /// vendored) modules.
    pub transforms: Vec<TransformDescriptor>,
    /// Applied to every module, ahead of entry-scoped transforms.
    pub global_transforms: Vec<TransformDescriptor>,
    /// Key path into a package manifest locating package-declared
    /// transforms.
    pub transform_key: Vec<String>,
    pub no_parse: NoParse,
    /// Override for the named-transform loader.
    pub loader: Option<Arc<dyn LoadTransform>>,
    /// Override for the static dependency extractor.
    pub extractor: Option<Arc<dyn ExtractDeps>>,
    /// Externally supplied cache for incremental reuse across graphs.
    pub cache: Option<SharedCache>,
    /// Passed through verbatim to the resolver.
    pub package_filter: Option<PackageFilter>,
    /// Bare-specifier overrides, passed through to the resolver.
    pub modules: HashMap<String, PathBuf>,
    /// Extra module-search roots, passed through to the resolver.
    pub paths: Vec<PathBuf>,
}

impl GraphOptions {
    /// Full resolve extension list: defaults plus configured extras.
    pub(crate) fn resolve_extensions(&self) -> Vec<String> {
        DEFAULT_EXTENSIONS
            .iter()
            .map(|ext| ext.to_string())
            .chain(self.extensions.iter().cloned())
            .collect()
    }
}
