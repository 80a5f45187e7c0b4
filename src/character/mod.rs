//! The canonical character record and the assembler that builds it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::ReferenceEntity;
use crate::error::ErrorKind;
use crate::modifiers::AttributeModifier;
use crate::skills::{Characteristic, SkillTable};

pub mod assembler;

pub use assembler::Assembler;

/// Name given to characters whose export carries none.
pub const DEFAULT_NAME: &str = "No Name";

pub const CHARACTER_TYPE: &str = "character";

/// Receives progress checkpoints (0-100) while an import runs.
pub trait ImportProgress {
    fn report(&mut self, percent: u8);
}

impl<F: FnMut(u8)> ImportProgress for F {
    fn report(&mut self, percent: u8) {
        self(percent)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CharacterRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub flags: RecordFlags,
    pub data: CharacterData,
    pub items: Vec<ReferenceEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordFlags {
    #[serde(rename = "ffgimportid")]
    pub import_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterData {
    pub attributes: BTreeMap<String, AttributeModifier>,
    pub characteristics: BTreeMap<String, CharacteristicValue>,
    pub skills: BTreeMap<String, SkillState>,
    pub stats: Stats,
    pub experience: ExperienceTotals,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacteristicValue {
    pub value: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillState {
    pub rank: i64,
    pub careerskill: bool,
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<bool>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub skill_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub characteristic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(rename = "forcePool")]
    pub force_pool: ForcePool,
    pub credits: Credits,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForcePool {
    pub max: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credits {
    pub value: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceTotals {
    pub total: i64,
    pub available: i64,
}

impl CharacterRecord {
    /// A blank character: every characteristic at 0 and every skill in
    /// `skills` untrained.
    pub fn new(import_id: impl Into<String>, name: impl Into<String>, skills: &SkillTable) -> Self {
        let characteristics = Characteristic::ALL
            .iter()
            .map(|c| (c.name().to_string(), CharacteristicValue::default()))
            .collect();

        let skills = skills
            .iter()
            .map(|skill| {
                let custom = skill.custom.as_ref();
                let state = SkillState {
                    rank: 0,
                    careerskill: false,
                    key: skill.key.to_string(),
                    custom: custom.map(|_| true),
                    skill_type: custom.map(|c| c.skill_type.to_string()),
                    characteristic: custom.map(|c| c.characteristic.name().to_string()),
                    label: custom.map(|c| c.label.to_string()),
                };
                (skill.name.to_string(), state)
            })
            .collect();

        Self {
            id: None,
            name: name.into(),
            record_type: CHARACTER_TYPE.to_string(),
            flags: RecordFlags {
                import_id: import_id.into(),
            },
            data: CharacterData {
                characteristics,
                skills,
                ..Default::default()
            },
            items: Vec::new(),
            img: None,
        }
    }

    pub fn import_id(&self) -> &str {
        &self.flags.import_id
    }

    /// Items whose `type` is `item_type`.
    pub fn items_of_type<'s>(&'s self, item_type: &'s str) -> impl Iterator<Item = &'s ReferenceEntity> + 's {
        self.items
            .iter()
            .filter(move |item| item.entity_type() == Some(item_type))
    }

    pub fn to_value(&self) -> Result<Value, ErrorKind> {
        Ok(serde_json::to_value(self)?)
    }
}
