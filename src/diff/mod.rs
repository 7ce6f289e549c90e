//! Shallow diffing of record snapshots.
//!
//! Used to build minimal PATCH bodies: only fields of the original snapshot
//! are inspected, so fields the form does not represent are never sent.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

/// Changes between two collections of identifiable records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArrayDiff {
    /// Ids present in the updated collection but unknown to the original.
    pub add: Vec<i64>,
    /// Records without an id.
    pub create: Vec<Value>,
    /// Ids of the original collection missing from the updated one.
    pub remove: Vec<i64>,
    /// Changed fields per id, each entry including its `id`.
    pub update: BTreeMap<i64, Value>,
}

impl ArrayDiff {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty()
            && self.create.is_empty()
            && self.remove.is_empty()
            && self.update.is_empty()
    }
}

/// Fields of `original` whose value changed in `updated`.
///
/// Array fields are replaced by their [`ArrayDiff`], nested objects by their
/// own (non-empty) diff when both sides are objects. A field missing from
/// `updated` is reported as `null`.
pub fn diff_object(original: &Map<String, Value>, updated: &Map<String, Value>) -> Map<String, Value> {
    let mut diff = Map::new();

    for (key, value) in original {
        let new_value = updated.get(key).unwrap_or(&Value::Null);

        match value {
            Value::Array(items) => {
                let new_items = new_value.as_array().map(Vec::as_slice).unwrap_or(&[]);
                if let Some(changes) = diff_array(items, new_items) {
                    diff.insert(key.clone(), array_diff_value(changes));
                }
            }
            Value::Object(fields) => match new_value.as_object() {
                Some(new_fields) => {
                    let changes = diff_object(fields, new_fields);
                    if !changes.is_empty() {
                        diff.insert(key.clone(), Value::Object(changes));
                    }
                }
                // No longer an object (cleared or replaced): send the new value.
                None => {
                    diff.insert(key.clone(), new_value.clone());
                }
            },
            _ => {
                if new_value != value {
                    diff.insert(key.clone(), new_value.clone());
                }
            }
        }
    }

    diff
}

/// Classify the records of `updated` against `original` by `id`.
///
/// Matching is by linear scan and takes the first record with the same id,
/// so ids must be unique within each slice. Returns `None` when nothing
/// changed.
pub fn diff_array(original: &[Value], updated: &[Value]) -> Option<ArrayDiff> {
    let mut diff = ArrayDiff::default();

    for element in updated {
        let Some(id) = record_id(element) else {
            diff.create.push(element.clone());
            continue;
        };

        match original.iter().find(|candidate| record_id(candidate) == Some(id)) {
            Some(found) => {
                let changes = match (found.as_object(), element.as_object()) {
                    (Some(before), Some(after)) => diff_object(before, after),
                    _ => Map::new(),
                };
                if !changes.is_empty() {
                    let mut entry = Map::new();
                    entry.insert("id".to_string(), Value::from(id));
                    entry.extend(changes);
                    diff.update.insert(id, Value::Object(entry));
                }
            }
            None => diff.add.push(id),
        }
    }

    for element in original {
        if let Some(id) = record_id(element) {
            if !updated.iter().any(|candidate| record_id(candidate) == Some(id)) {
                diff.remove.push(id);
            }
        }
    }

    if diff.is_empty() {
        None
    } else {
        Some(diff)
    }
}

/// Diff two typed records through their JSON form.
pub fn diff_records<T: Serialize>(original: &T, updated: &T) -> Result<Map<String, Value>, serde_json::Error> {
    let original = to_map(original)?;
    let updated = to_map(updated)?;
    Ok(diff_object(&original, &updated))
}

/// Serialize a record into a JSON field map.
pub fn to_map<T: Serialize>(record: &T) -> Result<Map<String, Value>, serde_json::Error> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            Ok(map)
        }
    }
}

/// A record's id; absent, null, zero and non-object records have none.
fn record_id(record: &Value) -> Option<i64> {
    record
        .as_object()
        .and_then(|fields| fields.get("id"))
        .and_then(Value::as_i64)
        .filter(|id| *id != 0)
}

fn array_diff_value(diff: ArrayDiff) -> Value {
    let update = diff
        .update
        .into_iter()
        .map(|(id, changes)| (id.to_string(), changes))
        .collect::<Map<String, Value>>();

    serde_json::json!({
        "add": diff.add,
        "create": diff.create,
        "remove": diff.remove,
        "update": update,
    })
}
