// modgraph-core/src/lib.rs
//
// Builds the complete transitive module dependency graph for a set of
// entry sources: resolves specifiers to module identities, runs the
// per-module transform pipeline, extracts dependencies, and streams
// out each finalized record exactly once.

pub mod cache;
pub mod extract;
pub mod graph;
pub mod options;
mod pipeline;
pub mod resolve;
pub mod transform;
mod walk;

// Re-export key types
pub use cache::{GraphCache, SharedCache};
pub use extract::{ExtractDeps, NoParse, RequireScanner};
pub use graph::{GraphEntry, ModuleGraph};
pub use modgraph_common::{DepEntry, DepMap, GraphError, ModuleId, ModuleRecord, RecordPatch, Result};
pub use options::{GraphOptions, SpecifierFilter, DEFAULT_EXTENSIONS};
pub use resolve::{NodeResolver, PackageFilter, Resolve, Resolved, ResolutionContext};
pub use transform::{
    streaming_fn, structural_fn, LoadTransform, StreamingTransform, StructuralTransform,
    Transform, TransformCtx, TransformDescriptor, TransformRegistry,
};
