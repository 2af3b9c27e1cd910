// modgraph-core/src/resolve.rs
// Resolution seam: the walker only ever talks to the `Resolve` trait.
// `NodeResolver` is the default node-style filesystem implementation.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use modgraph_common::error::{GraphError, Result};
use modgraph_common::module::ModuleId;
use serde_json::Value;
use tracing::debug;

/// Applied to every package manifest the resolver reads, with the
/// manifest's directory. Passed through verbatim from the options.
pub type PackageFilter = Arc<dyn Fn(Value, &Path) -> Value + Send + Sync>;

/// Ephemeral context for one resolve call, reconstructed per attempt
/// from the requesting module.
pub struct ResolutionContext<'a> {
    pub from: &'a ModuleId,
    pub extensions: &'a [String],
    pub modules: &'a HashMap<String, PathBuf>,
    pub paths: &'a [PathBuf],
    pub package_filter: Option<&'a PackageFilter>,
}

/// Canonical identity plus the nearest enclosing package manifest.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub id: ModuleId,
    pub package: Option<Arc<Value>>,
}

pub trait Resolve: Send + Sync {
    fn resolve<'a>(
        &'a self,
        specifier: &'a str,
        ctx: ResolutionContext<'a>,
    ) -> BoxFuture<'a, Result<Resolved>>;
}

/// Node-style resolver: relative specifiers against the requesting
/// module's directory with extension and `dir/index` probing, bare
/// specifiers through the `modules` overrides, `node_modules`
/// directories walking up from the requesting module, then the
/// configured search roots.
#[derive(Debug, Default, Clone)]
pub struct NodeResolver;

impl Resolve for NodeResolver {
    fn resolve<'a>(
        &'a self,
        specifier: &'a str,
        ctx: ResolutionContext<'a>,
    ) -> BoxFuture<'a, Result<Resolved>> {
        Box::pin(async move {
            let path = resolve_path(specifier, &ctx).await?;
            let package = nearest_package(&path, ctx.package_filter).await?;
            let id = ModuleId::from_path(&path);
            debug!("resolved '{specifier}' from {} to {id}", ctx.from);
            Ok(Resolved { id, package })
        })
    }
}

async fn resolve_path(specifier: &str, ctx: &ResolutionContext<'_>) -> Result<PathBuf> {
    if specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/') {
        let base = if specifier.starts_with('/') {
            PathBuf::from(specifier)
        } else {
            ctx.from.dir().join(specifier)
        };
        if let Some(hit) = probe(&normalize(&base), ctx.extensions).await {
            return Ok(hit);
        }
        return Err(GraphError::ModuleNotFound(specifier.to_string()));
    }

    if let Some(path) = ctx.modules.get(specifier) {
        if let Some(hit) = probe(&normalize(path), ctx.extensions).await {
            return Ok(hit);
        }
    }

    let mut dir = Some(ctx.from.dir());
    while let Some(current) = dir {
        let candidate = current.join("node_modules").join(specifier);
        if let Some(hit) = probe(&candidate, ctx.extensions).await {
            return Ok(hit);
        }
        dir = current.parent().map(Path::to_path_buf);
    }

    for root in ctx.paths {
        let candidate = root.join(specifier);
        if let Some(hit) = probe(&normalize(&candidate), ctx.extensions).await {
            return Ok(hit);
        }
    }

    Err(GraphError::ModuleNotFound(specifier.to_string()))
}

/// Try `base` as a file (with extension probing), then as a directory
/// (manifest `main`, then `index` probing).
async fn probe(base: &Path, extensions: &[String]) -> Option<PathBuf> {
    if is_file(base).await {
        return Some(base.to_path_buf());
    }
    if let Some(name) = base.file_name().map(|n| n.to_string_lossy().into_owned()) {
        for ext in extensions {
            let candidate = base.with_file_name(format!("{name}{ext}"));
            if is_file(&candidate).await {
                return Some(candidate);
            }
        }
    }
    if is_dir(base).await {
        if let Some(main) = manifest_main(base).await {
            let target = normalize(&base.join(&main));
            if is_file(&target).await {
                return Some(target);
            }
            // main may itself omit the extension
            return Box::pin(probe(&target, extensions)).await;
        }
        for ext in extensions {
            let candidate = base.join(format!("index{ext}"));
            if is_file(&candidate).await {
                return Some(candidate);
            }
        }
    }
    None
}

async fn manifest_main(dir: &Path) -> Option<String> {
    let raw = tokio::fs::read_to_string(dir.join("package.json")).await.ok()?;
    let manifest: Value = serde_json::from_str(&raw).ok()?;
    manifest.get("main").and_then(Value::as_str).map(str::to_string)
}

/// Walk up from a module's path to the nearest `package.json`. Also
/// used by the pipeline for entry modules, which never pass through a
/// resolver.
pub(crate) async fn nearest_package(
    path: &Path,
    package_filter: Option<&PackageFilter>,
) -> Result<Option<Arc<Value>>> {
    let mut dir = path.parent().map(Path::to_path_buf);
    while let Some(current) = dir {
        let manifest_path = current.join("package.json");
        if is_file(&manifest_path).await {
            let raw = tokio::fs::read_to_string(&manifest_path).await?;
            let manifest: Value = serde_json::from_str(&raw)?;
            let manifest = match package_filter {
                Some(filter) => filter(manifest, &current),
                None => manifest,
            };
            return Ok(Some(Arc::new(manifest)));
        }
        dir = current.parent().map(Path::to_path_buf);
    }
    Ok(None)
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

/// Lexical normalization so the same physical file always yields the
/// same identity, without hitting the filesystem (canonicalize would
/// also chase symlinks and change the prefix).
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(Component::ParentDir);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn ctx<'a>(
        from: &'a ModuleId,
        extensions: &'a [String],
        modules: &'a HashMap<String, PathBuf>,
        paths: &'a [PathBuf],
    ) -> ResolutionContext<'a> {
        ResolutionContext {
            from,
            extensions,
            modules,
            paths,
            package_filter: None,
        }
    }

    #[tokio::test]
    async fn resolves_relative_with_extension_probing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.js"), "").unwrap();
        fs::write(dir.path().join("b.js"), "").unwrap();

        let from = ModuleId::from_path(&dir.path().join("a.js"));
        let extensions = vec![".js".to_string()];
        let modules = HashMap::new();
        let resolved = NodeResolver
            .resolve("./b", ctx(&from, &extensions, &modules, &[]))
            .await
            .unwrap();
        assert_eq!(resolved.id, ModuleId::from_path(&dir.path().join("b.js")));
    }

    #[tokio::test]
    async fn resolves_directory_index() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("a.js"), "").unwrap();
        fs::write(dir.path().join("lib/index.js"), "").unwrap();

        let from = ModuleId::from_path(&dir.path().join("a.js"));
        let extensions = vec![".js".to_string()];
        let modules = HashMap::new();
        let resolved = NodeResolver
            .resolve("./lib", ctx(&from, &extensions, &modules, &[]))
            .await
            .unwrap();
        assert_eq!(
            resolved.id,
            ModuleId::from_path(&dir.path().join("lib/index.js"))
        );
    }

    #[tokio::test]
    async fn resolves_bare_specifier_through_node_modules_with_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let pkg_dir = dir.path().join("node_modules/mod");
        fs::create_dir_all(&pkg_dir).unwrap();
        fs::write(pkg_dir.join("package.json"), r#"{"name":"mod","main":"lib.js"}"#).unwrap();
        fs::write(pkg_dir.join("lib.js"), "").unwrap();
        fs::write(dir.path().join("a.js"), "").unwrap();

        let from = ModuleId::from_path(&dir.path().join("a.js"));
        let extensions = vec![".js".to_string()];
        let modules = HashMap::new();
        let resolved = NodeResolver
            .resolve("mod", ctx(&from, &extensions, &modules, &[]))
            .await
            .unwrap();
        assert_eq!(resolved.id, ModuleId::from_path(&pkg_dir.join("lib.js")));
        let package = resolved.package.unwrap();
        assert_eq!(package["name"], serde_json::json!("mod"));
    }

    #[tokio::test]
    async fn missing_module_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.js"), "").unwrap();

        let from = ModuleId::from_path(&dir.path().join("a.js"));
        let extensions = vec![".js".to_string()];
        let modules = HashMap::new();
        let err = NodeResolver
            .resolve("./nope", ctx(&from, &extensions, &modules, &[]))
            .await
            .unwrap_err();
        assert!(err.to_string().to_lowercase().contains("cannot find module"));
    }

    #[test]
    fn normalize_is_lexical() {
        assert_eq!(
            normalize(Path::new("/a/b/../c/./d.js")),
            PathBuf::from("/a/c/d.js")
        );
    }
}
