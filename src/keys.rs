//! Constants for the field names of host entity documents.
//!
//! Reference entities and committed records are plain JSON objects; these
//! replace string literals that would otherwise be scattered through the
//! resolver and assembler.

// Top-level entity fields
pub const ID: &str = "_id";
pub const NAME: &str = "name";
pub const TYPE: &str = "type";
pub const IMG: &str = "img";
pub const ITEMS: &str = "items";
pub const DATA: &str = "data";
pub const FLAGS: &str = "flags";

// Flag holding the stable import id
pub const IMPORT_ID: &str = "ffgimportid";

// Sections under `data`
pub const ATTRIBUTES: &str = "attributes";
pub const TALENTS: &str = "talents";
pub const UPGRADES: &str = "upgrades";
pub const QUANTITY: &str = "quantity";

// Attribute fields
pub const ATTR_KEY: &str = "key";
pub const ATTR_MOD: &str = "mod";
pub const ATTR_MODTYPE: &str = "modtype";
pub const ATTR_VALUE: &str = "value";

// Talent slot and upgrade fields
pub const ITEM_ID: &str = "itemId";
pub const IS_RANKED: &str = "isRanked";
pub const RANK: &str = "rank";
pub const ACTIVATION: &str = "activation";
pub const IS_LEARNED: &str = "islearned";

/// Prefix of talent slot names on a specialization (`talent0`, `talent1`, ...).
pub const TALENT_SLOT_PREFIX: &str = "talent";
/// Prefix of upgrade slot names on a force power (`upgrade0`, ...).
pub const UPGRADE_SLOT_PREFIX: &str = "upgrade";

pub fn talent_slot(index: usize) -> String {
    format!("{TALENT_SLOT_PREFIX}{index}")
}

pub fn upgrade_slot(index: usize) -> String {
    format!("{UPGRADE_SLOT_PREFIX}{index}")
}

/// Kind of document a catalog holds or a store persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum EntityKind {
    Actor,
    Item,
    JournalEntry,
}

impl EntityKind {
    pub const ALL: &[EntityKind] = &[Self::Actor, Self::Item, Self::JournalEntry];

    /// The name the host uses for this kind.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Actor => "Actor",
            Self::Item => "Item",
            Self::JournalEntry => "JournalEntry",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.key() == key)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}
