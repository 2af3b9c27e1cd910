// modgraph-common/src/merge.rs
// Deep merge of structural transform patches into a module record.

use serde_json::Value;
use tracing::warn;

use crate::module::{DepEntry, DepMap, ModuleId, ModuleRecord};

/// Partial-record patch returned by a structural transform. Keys
/// `source`, `deps` and `entry` address the typed record fields;
/// everything else is deep-merged into the record's extra fields.
pub type RecordPatch = serde_json::Map<String, Value>;

/// Merge rule over the closed set of value categories: sequences
/// concatenate (patch appended after existing), keyed mappings merge
/// recursively key-by-key, anything else the patch overwrites.
pub fn merge_values(target: &Value, patch: &Value) -> Value {
    match (target, patch) {
        (Value::Array(existing), Value::Array(incoming)) => {
            let mut merged = existing.clone();
            merged.extend(incoming.iter().cloned());
            Value::Array(merged)
        }
        (Value::Object(existing), Value::Object(incoming)) => {
            let mut merged = existing.clone();
            for (key, value) in incoming {
                let entry = match existing.get(key) {
                    Some(current) => merge_values(current, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), entry);
            }
            Value::Object(merged)
        }
        (_, overwrite) => overwrite.clone(),
    }
}

/// Fold a structural transform's patch into a record. Pure on the
/// target; an absent patch returns the target verbatim.
pub fn apply_patch(record: &ModuleRecord, patch: Option<RecordPatch>) -> ModuleRecord {
    let Some(patch) = patch else {
        return record.clone();
    };

    let mut merged = record.clone();
    for (key, value) in patch {
        if key == "id" {
            warn!("transform patch for {} tried to change id, ignoring", record.id);
            continue;
        }
        if key == "source" {
            match value {
                Value::String(source) => merged.source = Some(source),
                other => warn!(
                    "transform patch for {} carried non-string source ({other}), ignoring",
                    record.id
                ),
            }
            continue;
        }
        if key == "entry" {
            match value {
                Value::Bool(entry) => merged.entry = entry,
                other => warn!(
                    "transform patch for {} carried non-bool entry ({other}), ignoring",
                    record.id
                ),
            }
            continue;
        }
        if key == "deps" {
            let Value::Object(deps) = value else {
                warn!("transform patch for {} carried non-object deps, ignoring", record.id);
                continue;
            };
            let target = merged.deps.get_or_insert_with(DepMap::new);
            for (specifier, dep) in deps {
                match dep {
                    Value::String(id) => {
                        target.insert(specifier, DepEntry::Resolved(ModuleId::new(id)));
                    }
                    Value::Bool(false) | Value::Null => {
                        target.insert(specifier, DepEntry::Excluded);
                    }
                    other => {
                        warn!(
                            "transform patch for {} carried unusable dep entry {specifier}={other}, ignoring",
                            record.id
                        );
                    }
                }
            }
            continue;
        }
        let entry = match merged.extra.get(&key) {
            Some(current) => merge_values(current, &value),
            None => value,
        };
        merged.extra.insert(key, entry);
    }
    merged
}
