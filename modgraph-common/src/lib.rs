// modgraph-common/src/lib.rs
pub mod error;
pub mod merge;
pub mod module;

// Re-export key types
pub use error::{GraphError, Result};
pub use merge::{apply_patch, merge_values, RecordPatch};
pub use module::{DepEntry, DepMap, ModuleId, ModuleRecord};
