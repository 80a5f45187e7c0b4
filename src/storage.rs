use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::{ReferenceEntity, child_object};
use crate::error::ErrorKind;
use crate::keys::EntityKind;

/// The host's persistent entity storage.
pub trait EntityStore {
    /// First local entity of `kind` whose import id matches.
    fn find_by_import_id(&self, kind: EntityKind, import_id: &str) -> Option<ReferenceEntity>;

    /// Create a record, returning its storage id.
    fn create_entity(&mut self, kind: EntityKind, record: Value) -> Result<String, ErrorKind>;

    /// Update the record `id` in place. Top-level keys of `record` replace the
    /// stored ones; dotted keys (`data.stats.credits.value`) set a single leaf.
    fn update_entity(&mut self, kind: EntityKind, id: &str, record: Value) -> Result<(), ErrorKind>;
}

/// An [`EntityStore`] held in memory, serializable so the CLI can persist it
/// between runs.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    entities: BTreeMap<EntityKind, Vec<ReferenceEntity>>,
    #[serde(default)]
    next_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity as-is, bypassing id allocation.
    pub fn insert(&mut self, kind: EntityKind, entity: ReferenceEntity) {
        self.entities.entry(kind).or_default().push(entity);
    }

    pub fn entities(&self, kind: EntityKind) -> &[ReferenceEntity] {
        self.entities.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn get(&self, kind: EntityKind, id: &str) -> Option<&ReferenceEntity> {
        self.entities(kind).iter().find(|e| e.id() == Some(id))
    }

    fn allocate_id(&mut self, kind: EntityKind) -> String {
        loop {
            self.next_id += 1;
            let id = format!("{kind}-{}", self.next_id);
            if self.entities.values().flatten().all(|e| e.id() != Some(id.as_str())) {
                return id;
            }
        }
    }
}

fn commit_error(kind: EntityKind, detail: impl Into<String>) -> ErrorKind {
    ErrorKind::CommitError {
        kind: kind.to_string(),
        detail: detail.into(),
    }
}

impl EntityStore for MemoryStore {
    fn find_by_import_id(&self, kind: EntityKind, import_id: &str) -> Option<ReferenceEntity> {
        self.entities(kind)
            .iter()
            .find(|e| e.import_id() == Some(import_id))
            .cloned()
    }

    fn create_entity(&mut self, kind: EntityKind, record: Value) -> Result<String, ErrorKind> {
        let mut entity = ReferenceEntity::from_value(record).map_err(|e| commit_error(kind, e.to_string()))?;
        let id = self.allocate_id(kind);
        entity.set_id(id.clone());
        self.insert(kind, entity);
        Ok(id)
    }

    fn update_entity(&mut self, kind: EntityKind, id: &str, record: Value) -> Result<(), ErrorKind> {
        let Value::Object(fields) = record else {
            return Err(commit_error(kind, "update is not an object"));
        };
        let entity = self
            .entities
            .get_mut(&kind)
            .and_then(|entities| entities.iter_mut().find(|e| e.id() == Some(id)))
            .ok_or_else(|| commit_error(kind, format!("no record with id {id}")))?;

        let document = entity.as_map_mut();
        for (key, value) in fields {
            if key.contains('.') {
                set_path(document, &key, value);
            } else {
                document.insert(key, value);
            }
        }
        // The id is not updatable
        entity.set_id(id);
        Ok(())
    }
}

fn set_path(document: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(leaf) = segments.pop() else {
        return;
    };
    let parent = segments
        .into_iter()
        .fold(document, |map, segment| child_object(map, segment));
    parent.insert(leaf.to_string(), value);
}
