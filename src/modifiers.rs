//! Attribute modifiers and the builders that derive them from export data.
//!
//! Reference entities carry their bonuses as a mapping of attribute key to
//! [`AttributeModifier`]. The builders here translate the export's modifier
//! descriptors (`<Mod>`, `<DieModifier>`, stat blocks, weapon qualities) into
//! that shape.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::Resolver;
use crate::keys::{self, EntityKind};
use crate::skills::{Characteristic, ENCUMBRANCE_KEY, SkillTable};
use crate::xml::NormalizedNode;

/// Category of an [`AttributeModifier`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModType {
    #[serde(rename = "Characteristic")]
    Characteristic,
    #[serde(rename = "Career Skill")]
    CareerSkill,
    #[serde(rename = "Skill Boost")]
    SkillBoost,
    #[serde(rename = "Skill Setback")]
    SkillSetback,
    #[serde(rename = "Skill Remove Setback")]
    SkillRemoveSetback,
    #[serde(rename = "Skill Add Advantage")]
    SkillAddAdvantage,
    #[serde(rename = "Skill Add Threat")]
    SkillAddThreat,
    #[serde(rename = "Skill Add Success")]
    SkillAddSuccess,
    #[serde(rename = "Skill Add Failure")]
    SkillAddFailure,
    #[serde(rename = "Skill Rank")]
    SkillRank,
    #[serde(rename = "Stat")]
    Stat,
}

impl ModType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModType::Characteristic => "Characteristic",
            ModType::CareerSkill => "Career Skill",
            ModType::SkillBoost => "Skill Boost",
            ModType::SkillSetback => "Skill Setback",
            ModType::SkillRemoveSetback => "Skill Remove Setback",
            ModType::SkillAddAdvantage => "Skill Add Advantage",
            ModType::SkillAddThreat => "Skill Add Threat",
            ModType::SkillAddSuccess => "Skill Add Success",
            ModType::SkillAddFailure => "Skill Add Failure",
            ModType::SkillRank => "Skill Rank",
            ModType::Stat => "Stat",
        }
    }
}

impl std::fmt::Display for ModType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModValue {
    Number(i64),
    Flag(bool),
}

impl ModValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ModValue::Number(n) => Some(*n),
            ModValue::Flag(_) => None,
        }
    }
}

impl From<i64> for ModValue {
    fn from(n: i64) -> Self {
        ModValue::Number(n)
    }
}

impl From<ModValue> for Value {
    fn from(value: ModValue) -> Self {
        match value {
            ModValue::Number(n) => Value::from(n),
            ModValue::Flag(b) => Value::Bool(b),
        }
    }
}

/// A canonical bonus: what it targets (`mod`), its category and magnitude.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeModifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(rename = "mod")]
    pub mod_name: String,
    pub modtype: ModType,
    pub value: ModValue,
    #[serde(rename = "isCheckbox", default, skip_serializing_if = "Option::is_none")]
    pub is_checkbox: Option<bool>,
}

impl AttributeModifier {
    pub fn new(mod_name: impl Into<String>, modtype: ModType, value: i64) -> Self {
        Self {
            key: None,
            mod_name: mod_name.into(),
            modtype,
            value: ModValue::Number(value),
            is_checkbox: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_checkbox(mut self, is_checkbox: bool) -> Self {
        self.is_checkbox = Some(is_checkbox);
        self
    }

    /// The host's JSON shape for this modifier.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(is_checkbox) = self.is_checkbox {
            map.insert("isCheckbox".to_string(), Value::Bool(is_checkbox));
        }
        if let Some(key) = &self.key {
            map.insert(keys::ATTR_KEY.to_string(), Value::String(key.clone()));
        }
        map.insert(keys::ATTR_MOD.to_string(), Value::String(self.mod_name.clone()));
        map.insert(
            keys::ATTR_MODTYPE.to_string(),
            Value::String(self.modtype.as_str().to_string()),
        );
        map.insert(keys::ATTR_VALUE.to_string(), self.value.into());
        Value::Object(map)
    }

    /// Whether a raw attribute document targets the same thing with the same
    /// magnitude.
    pub fn matches(&self, raw: &Value) -> bool {
        raw.get(keys::ATTR_MOD).and_then(Value::as_str) == Some(self.mod_name.as_str())
            && raw.get(keys::ATTR_MODTYPE).and_then(Value::as_str) == Some(self.modtype.as_str())
            && match self.value {
                ModValue::Number(n) => raw.get(keys::ATTR_VALUE).and_then(raw_attr_value) == Some(n),
                ModValue::Flag(b) => raw.get(keys::ATTR_VALUE).and_then(Value::as_bool) == Some(b),
            }
    }
}

/// Integer reading of a stored attribute value. Reference entities store some
/// values as numeric strings.
pub fn raw_attr_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A raw modifier descriptor from the export (`<Mod>` or `<DieModifier>`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModifierDescriptor {
    pub key: Option<String>,
    pub count: Option<i64>,
    pub skill_is_career: bool,
    pub boost: Option<i64>,
    pub add_setback: Option<i64>,
    pub remove_setback: Option<i64>,
    pub advantage: Option<i64>,
    pub threat: Option<i64>,
    pub success: Option<i64>,
    pub failure: Option<i64>,
    pub force: Option<i64>,
}

impl ModifierDescriptor {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Default::default()
        }
    }

    /// Read a descriptor element. Die modifiers name their skill with
    /// `SkillKey` instead of `Key`.
    pub fn from_node(node: &NormalizedNode) -> Self {
        let int = |name: &str| node.get(name).and_then(NormalizedNode::as_i64);
        let key = ["Key", "SkillKey"]
            .iter()
            .find_map(|name| node.get(name).and_then(NormalizedNode::non_empty_text))
            .map(str::to_string);

        Self {
            key,
            count: int("Count"),
            skill_is_career: node
                .get("SkillIsCareer")
                .and_then(NormalizedNode::as_bool)
                .unwrap_or(false),
            boost: int("BoostCount"),
            add_setback: int("AddSetbackCount"),
            remove_setback: int("SetbackCount"),
            advantage: int("AdvantageCount"),
            threat: int("ThreatCount"),
            success: int("SuccessCount"),
            failure: int("FailureCount"),
            force: int("ForceCount"),
        }
    }

    fn has_die_counts(&self) -> bool {
        self.die_counts().iter().any(|(count, _)| count.is_some()) || self.force.is_some()
    }

    /// Die-count fields in precedence order; a later present field wins.
    fn die_counts(&self) -> [(Option<i64>, ModType); 7] {
        [
            (self.boost, ModType::SkillBoost),
            (self.add_setback, ModType::SkillSetback),
            (self.remove_setback, ModType::SkillRemoveSetback),
            (self.advantage, ModType::SkillAddAdvantage),
            (self.threat, ModType::SkillAddThreat),
            (self.success, ModType::SkillAddSuccess),
            (self.failure, ModType::SkillAddFailure),
        ]
    }
}

/// Translate one descriptor, or `None` if its key isn't a characteristic,
/// known skill or the encumbrance code.
pub fn attribute_for(descriptor: &ModifierDescriptor, skills: &SkillTable) -> Option<AttributeModifier> {
    let key = descriptor.key.as_deref()?;
    let mut value = descriptor.count.unwrap_or(0);

    if let Some(characteristic) = Characteristic::from_code(key) {
        return Some(AttributeModifier::new(
            characteristic.name(),
            ModType::Characteristic,
            value,
        ));
    }

    if let Some(name) = skills.name_for_key(key) {
        let modtype = if descriptor.skill_is_career {
            ModType::CareerSkill
        } else if descriptor.has_die_counts() {
            // A force die alone still reads as a boost with the plain count
            let mut modtype = ModType::SkillBoost;
            for (count, die_type) in descriptor.die_counts() {
                if let Some(count) = count {
                    modtype = die_type;
                    value = count;
                }
            }
            modtype
        } else {
            ModType::SkillRank
        };
        return Some(AttributeModifier::new(name, modtype, value));
    }

    if key == ENCUMBRANCE_KEY {
        return Some(AttributeModifier::new("Encumbrance", ModType::Stat, value));
    }

    None
}

/// Fold every recognizable modifier under `node` into a mapping keyed by
/// `mod` name. `node` is the element holding `<Mod>` children; each may carry
/// its own key or a `DieModifiers` block. Later modifiers replace earlier ones
/// with the same name.
pub fn attributes_from_mods(node: &NormalizedNode, skills: &SkillTable) -> BTreeMap<String, AttributeModifier> {
    let mut attributes = BTreeMap::new();
    let mut add = |descriptor: ModifierDescriptor| {
        if let Some(attribute) = attribute_for(&descriptor, skills) {
            attributes.insert(attribute.mod_name.clone(), attribute);
        }
    };

    for modifier in node.children("Mod") {
        if modifier.get("Key").is_some_and(|k| !k.is_empty()) {
            add(ModifierDescriptor::from_node(modifier));
        } else if let Some(die_modifiers) = modifier.get("DieModifiers") {
            for die in die_modifiers.children("DieModifier") {
                add(ModifierDescriptor::from_node(die));
            }
        }
    }

    attributes
}

const STAT_FIELDS: &[(&str, &str)] = &[
    ("SoakValue", "Soak"),
    ("ForceRating", "ForcePool"),
    ("StrainThreshold", "Strain"),
    ("DefenseRanged", "Defence-Ranged"),
    ("DefenseMelee", "Defence-Melee"),
    ("WoundThreshold", "Wounds"),
];

/// Stat bonuses from an attribute block (`SoakValue`, `WoundThreshold`, ...),
/// keyed by `mod` name.
pub fn stat_attributes(node: &NormalizedNode) -> BTreeMap<String, AttributeModifier> {
    STAT_FIELDS
        .iter()
        .filter_map(|(field, stat)| {
            let value = node.get(field)?.as_i64()?;
            Some((stat.to_string(), AttributeModifier::new(*stat, ModType::Stat, value)))
        })
        .collect()
}

/// Rendered qualities and the attributes some of them imply.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Qualities {
    pub labels: Vec<String>,
    pub attributes: BTreeMap<String, AttributeModifier>,
}

/// Read a `<Qualities>` block. Each quality renders as `"<Key> <Count>"`;
/// `DEFENSIVE` also grants a melee defence stat under a fresh attribute key.
///
/// With a `resolver`, a quality whose descriptor is found in a catalog renders
/// as a link to that descriptor instead.
pub fn quality_attributes(
    qualities: &NormalizedNode,
    keys: &mut AttributeKeys,
    mut resolver: Option<&mut Resolver<'_>>,
) -> Qualities {
    let mut out = Qualities::default();
    for quality in qualities.children("Quality") {
        let Some(key) = quality.get("Key").and_then(NormalizedNode::non_empty_text) else {
            continue;
        };
        let count = quality.get("Count").and_then(NormalizedNode::as_i64);
        let label = match count {
            Some(count) => format!("{key} {count}"),
            None => key.to_string(),
        };

        let link = resolver
            .as_deref_mut()
            .and_then(|resolver| resolver.find_by_import_id(EntityKind::JournalEntry, key, None))
            .and_then(|found| Some((found.catalog?, found.entity.id()?.to_string())));
        out.labels.push(match link {
            Some((catalog, id)) => descriptor_link(&catalog, &id, &label),
            None => label,
        });

        if key == "DEFENSIVE" {
            out.attributes.insert(
                keys.next_key(),
                AttributeModifier::new("Defence-Melee", ModType::Stat, count.unwrap_or(0)).with_checkbox(false),
            );
        }
    }
    out
}

fn descriptor_link(catalog: &str, id: &str, label: &str) -> String {
    format!(r#"<a class="entity-link" draggable="true" data-pack="{catalog}" data-id="{id}">{label}</a>"#)
}

/// Allocates synthetic attribute keys (`attr1`, `attr2`, ...) for one owner.
///
/// The counter starts past the owner's current attribute count and only moves
/// forward. A key the owner already uses is never handed out.
#[derive(Clone, Debug, Default)]
pub struct AttributeKeys {
    taken: BTreeSet<String>,
    next: usize,
}

impl AttributeKeys {
    pub fn for_existing<I, S>(existing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let taken: BTreeSet<String> = existing.into_iter().map(Into::into).collect();
        let next = taken.len() + 1;
        Self { taken, next }
    }

    /// Allocator for the keys of an attributes mapping.
    pub fn for_map(attributes: &Map<String, Value>) -> Self {
        Self::for_existing(attributes.keys().cloned())
    }

    pub fn next_key(&mut self) -> String {
        loop {
            let key = format!("attr{}", self.next);
            self.next += 1;
            if self.taken.insert(key.clone()) {
                return key;
            }
        }
    }
}
