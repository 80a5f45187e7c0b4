//! Flattening of nested entity data into dotted-path updates.

use serde_json::{Map, Value};
use tracing::debug;

use crate::keys;

/// Root segment for paths into an entity's `data`.
pub const UPDATE_ROOT: &str = keys::DATA;

/// Flatten `map` into `"<root>.<path>" -> leaf` entries.
///
/// Every non-object leaf is emitted, including `false`, `0` and arrays; `null`
/// leaves are skipped. With an empty `root` the paths carry no prefix, which
/// makes flattening already-flat input a no-op.
pub fn flatten_update(root: &str, map: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    flatten_into(&mut out, root, map);
    out
}

fn flatten_into(out: &mut Map<String, Value>, prefix: &str, map: &Map<String, Value>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) => flatten_into(out, &path, nested),
            Value::Null => {}
            leaf => {
                out.insert(path, leaf.clone());
            }
        }
    }
}

/// A partial update for an entity document: its `data` flattened under
/// [`UPDATE_ROOT`], plus `name` and `img` when present.
pub fn build_update_data(entity: &Value) -> Map<String, Value> {
    let name = entity.get(keys::NAME).and_then(Value::as_str).unwrap_or("<unnamed>");
    debug!("building update data for {name}");

    let mut update = match entity.get(keys::DATA) {
        Some(Value::Object(data)) => flatten_update(UPDATE_ROOT, data),
        _ => Map::new(),
    };
    for field in [keys::NAME, keys::IMG] {
        if let Some(value) = entity.get(field).filter(|v| !v.is_null()) {
            update.insert(field.to_string(), value.clone());
        }
    }
    update
}
