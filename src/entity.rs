use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ErrorKind;
use crate::keys;

/// A pre-built template entity (species, career, talent, weapon, ...) as the
/// host stores it.
///
/// The document is otherwise opaque: only the handful of fields the importer
/// reads or customizes get accessors. Entities handed out by the resolver are
/// clones, so mutating one never touches the cached copy.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceEntity(Map<String, Value>);

impl ReferenceEntity {
    pub fn new(document: Map<String, Value>) -> Self {
        Self(document)
    }

    /// Wrap a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self, ErrorKind> {
        match value {
            Value::Object(document) => Ok(Self(document)),
            other => Err(ErrorKind::ParseError {
                detail: format!("entity document is not an object: {other}"),
            }),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    /// The catalog-internal identifier.
    pub fn id(&self) -> Option<&str> {
        self.0.get(keys::ID).and_then(Value::as_str)
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.0.insert(keys::ID.to_string(), Value::String(id.into()));
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get(keys::NAME).and_then(Value::as_str)
    }

    pub fn entity_type(&self) -> Option<&str> {
        self.0.get(keys::TYPE).and_then(Value::as_str)
    }

    /// The stable import id tying this entity to the export tool's key.
    pub fn import_id(&self) -> Option<&str> {
        self.lookup(&[keys::FLAGS, keys::IMPORT_ID])
            .and_then(Value::as_str)
    }

    /// Follow a path of object keys.
    pub fn lookup(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.0.get(*first)?, |value, key| value.get(*key))
    }

    /// The `data` object, created if missing.
    pub fn data_mut(&mut self) -> &mut Map<String, Value> {
        child_object(&mut self.0, keys::DATA)
    }

    /// A named section under `data` (`attributes`, `talents`, ...), created if
    /// missing.
    pub fn section_mut(&mut self, section: &str) -> &mut Map<String, Value> {
        child_object(self.data_mut(), section)
    }

    pub fn attributes_mut(&mut self) -> &mut Map<String, Value> {
        self.section_mut(keys::ATTRIBUTES)
    }

    /// Sets `data.quantity.value`.
    pub fn set_quantity(&mut self, count: i64) {
        self.section_mut(keys::QUANTITY)
            .insert(keys::ATTR_VALUE.to_string(), Value::from(count));
    }
}

impl From<ReferenceEntity> for Value {
    fn from(entity: ReferenceEntity) -> Self {
        entity.into_value()
    }
}

/// Object stored under `key`, replacing anything that isn't an object.
pub(crate) fn child_object<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let slot = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(object) => object,
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn accessors() {
        let entity = ReferenceEntity::from_value(json!({
            "_id": "abc123",
            "name": "Human",
            "type": "species",
            "flags": { "ffgimportid": "HUMAN" },
            "data": { "attributes": {} }
        }))
        .unwrap();

        assert_eq!(entity.id(), Some("abc123"));
        assert_eq!(entity.name(), Some("Human"));
        assert_eq!(entity.entity_type(), Some("species"));
        assert_eq!(entity.import_id(), Some("HUMAN"));
        assert!(entity.lookup(&["data", "attributes"]).is_some());
        assert!(entity.lookup(&["data", "talents"]).is_none());
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(ReferenceEntity::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn sections_are_created_on_demand() {
        let mut entity = ReferenceEntity::default();
        entity.set_quantity(3);
        entity
            .attributes_mut()
            .insert("attr1".to_string(), json!({ "mod": "Soak" }));

        assert_eq!(
            entity.lookup(&["data", "quantity", "value"]),
            Some(&json!(3))
        );
        assert_eq!(
            entity.lookup(&["data", "attributes", "attr1", "mod"]),
            Some(&json!("Soak"))
        );
    }

    #[test]
    fn clones_are_independent() {
        let original = ReferenceEntity::from_value(json!({ "data": { "attributes": {} } })).unwrap();
        let mut copy = original.clone();
        copy.attributes_mut().insert("attr1".to_string(), json!({}));
        assert_eq!(original.lookup(&["data", "attributes"]), Some(&json!({})));
    }
}
