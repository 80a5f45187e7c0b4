use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Read;
use std::sync::LazyLock;

use tracing::{debug, warn};

fn read_vfs_file(vfs: &vfs::VfsPath, path: &str) -> Result<Vec<u8>, vfs::VfsError> {
    let mut buf = Vec::new();
    vfs.join(path)?
        .open_file()?
        .read_to_end(&mut buf)
        .map_err(vfs::VfsError::from)?;
    Ok(buf)
}

/// Default skill table (hardcoded, no data files needed).
pub static DEFAULT_SKILLS: LazyLock<SkillTable> = LazyLock::new(SkillTable::defaults);

/// The file path within the export tool's data directory for skill definitions.
pub const SKILLS_PATH: &str = "Skills.xml";

/// Key the export tool uses for the encumbrance-capacity modifier.
pub const ENCUMBRANCE_KEY: &str = "ENCTADD";

/// The six characteristics, by their export codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Characteristic {
    Brawn,
    Agility,
    Intellect,
    Cunning,
    Willpower,
    Presence,
}

impl Characteristic {
    pub const ALL: &[Characteristic] = &[
        Self::Brawn,
        Self::Agility,
        Self::Intellect,
        Self::Cunning,
        Self::Willpower,
        Self::Presence,
    ];

    /// The code used by the export tool (`BR`, `AG`, ...).
    pub fn code(&self) -> &'static str {
        match self {
            Self::Brawn => "BR",
            Self::Agility => "AG",
            Self::Intellect => "INT",
            Self::Cunning => "CUN",
            Self::Willpower => "WIL",
            Self::Presence => "PR",
        }
    }

    /// Display name, which is also the canonical modifier target.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Brawn => "Brawn",
            Self::Agility => "Agility",
            Self::Intellect => "Intellect",
            Self::Cunning => "Cunning",
            Self::Willpower => "Willpower",
            Self::Presence => "Presence",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }
}

/// Extra definition carried by skills that aren't part of the core list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomSkill {
    pub skill_type: Cow<'static, str>,
    pub characteristic: Characteristic,
    pub label: Cow<'static, str>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkillDefinition {
    pub key: Cow<'static, str>,
    pub name: Cow<'static, str>,
    pub custom: Option<CustomSkill>,
}

/// Maps export skill keys to canonical skill names.
#[derive(Clone, Debug)]
pub struct SkillTable {
    skills: Vec<SkillDefinition>,
    by_key: HashMap<Cow<'static, str>, usize>,
}

const CORE_SKILLS: &[(&str, &str)] = &[
    ("ASTRO", "Astrogation"),
    ("ATHL", "Athletics"),
    ("BRAWL", "Brawl"),
    ("CHARM", "Charm"),
    ("COERC", "Coercion"),
    ("COMP", "Computers"),
    ("COOL", "Cool"),
    ("COORD", "Coordination"),
    ("DECEP", "Deception"),
    ("DISC", "Discipline"),
    ("GUNN", "Gunnery"),
    ("LEAD", "Leadership"),
    ("LTSABER", "Lightsaber"),
    ("MECH", "Mechanics"),
    ("MED", "Medicine"),
    ("MELEE", "Melee"),
    ("NEG", "Negotiation"),
    ("PERC", "Perception"),
    ("PILOTPL", "Piloting: Planetary"),
    ("PILOTSP", "Piloting: Space"),
    ("RANGHVY", "Ranged: Heavy"),
    ("RANGLT", "Ranged: Light"),
    ("RESIL", "Resilience"),
    ("SKUL", "Skulduggery"),
    ("STEAL", "Stealth"),
    ("SW", "Streetwise"),
    ("SURV", "Survival"),
    ("VIGIL", "Vigilance"),
    ("CORE", "Knowledge: Core Worlds"),
    ("EDU", "Knowledge: Education"),
    ("LORE", "Knowledge: Lore"),
    ("OUT", "Knowledge: Outer Rim"),
    ("UND", "Knowledge: Underworld"),
    ("WARF", "Knowledge: Warfare"),
    ("XEN", "Knowledge: Xenology"),
];

impl SkillTable {
    /// Load from the export tool's data directory, falling back to defaults if
    /// the file can't be read.
    pub fn load(vfs: &vfs::VfsPath) -> Self {
        match read_vfs_file(vfs, SKILLS_PATH) {
            Ok(buf) => Self::from_xml(&buf),
            Err(e) => {
                debug!("no skill definitions at {SKILLS_PATH}, using defaults: {e}");
                DEFAULT_SKILLS.clone()
            }
        }
    }

    /// Extend the defaults with skills defined in a `Skills.xml` document.
    ///
    /// Keys already in the table keep their canonical names; the export tool's
    /// own spelling differs from the names reference entities use. Unknown keys
    /// are added as custom skills.
    pub fn from_xml(xml: &[u8]) -> Self {
        let mut table = DEFAULT_SKILLS.clone();
        let xml_str = match std::str::from_utf8(xml) {
            Ok(s) => s,
            Err(_) => return table,
        };
        let doc = match roxmltree::Document::parse(xml_str) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("failed to parse skill definitions, using defaults: {e}");
                return table;
            }
        };

        for skill in doc.descendants().filter(|n| n.has_tag_name("Skill")) {
            let child_text = |name: &str| {
                skill
                    .children()
                    .find(|c| c.has_tag_name(name))
                    .and_then(|c| c.text())
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
            };
            let (Some(key), Some(name)) = (child_text("Key"), child_text("Name")) else {
                continue;
            };
            if table.contains_key(key) {
                continue;
            }

            let characteristic = child_text("CharKey")
                .and_then(Characteristic::from_code)
                .unwrap_or(Characteristic::Intellect);
            let skill_type = match child_text("TypeValue") {
                Some("stCombat") => "Combat",
                Some("stKnowledge") => "Knowledge",
                _ => "General",
            };
            table.insert(SkillDefinition {
                key: Cow::Owned(key.to_string()),
                name: Cow::Owned(name.to_string()),
                custom: Some(CustomSkill {
                    skill_type: Cow::Borrowed(skill_type),
                    characteristic,
                    label: Cow::Owned(name.to_string()),
                }),
            });
        }

        table
    }

    /// The core skill list plus the `Cybernetics` custom skill.
    pub fn defaults() -> Self {
        let mut table = Self {
            skills: Vec::with_capacity(CORE_SKILLS.len() + 1),
            by_key: HashMap::with_capacity(CORE_SKILLS.len() + 1),
        };
        for (key, name) in CORE_SKILLS {
            table.insert(SkillDefinition {
                key: Cow::Borrowed(key),
                name: Cow::Borrowed(name),
                custom: None,
            });
        }
        table.insert(SkillDefinition {
            key: Cow::Borrowed("CYBERNETICS"),
            name: Cow::Borrowed("Cybernetics"),
            custom: Some(CustomSkill {
                skill_type: Cow::Borrowed("General"),
                characteristic: Characteristic::Intellect,
                label: Cow::Borrowed("Cybernetics"),
            }),
        });
        table
    }

    fn insert(&mut self, skill: SkillDefinition) {
        self.by_key.insert(skill.key.clone(), self.skills.len());
        self.skills.push(skill);
    }

    pub fn get(&self, key: &str) -> Option<&SkillDefinition> {
        self.by_key.get(key).map(|&idx| &self.skills[idx])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// Canonical skill name for an export key.
    pub fn name_for_key(&self, key: &str) -> Option<&str> {
        self.get(key).map(|skill| skill.name.as_ref())
    }

    /// Skills in table order.
    pub fn iter(&self) -> impl Iterator<Item = &SkillDefinition> {
        self.skills.iter()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

impl Default for SkillTable {
    fn default() -> Self {
        Self::defaults()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn characteristic_codes() {
        assert_eq!(Characteristic::from_code("BR"), Some(Characteristic::Brawn));
        assert_eq!(Characteristic::from_code("PR").map(|c| c.name()), Some("Presence"));
        assert_eq!(Characteristic::from_code("XX"), None);
    }

    #[test]
    fn defaults_include_custom_cybernetics() {
        let table = SkillTable::defaults();
        assert_eq!(table.name_for_key("ATHL"), Some("Athletics"));
        assert_eq!(table.name_for_key("PILOTSP"), Some("Piloting: Space"));
        let cyber = table.get("CYBERNETICS").unwrap();
        assert_eq!(cyber.custom.as_ref().unwrap().characteristic, Characteristic::Intellect);
        assert_eq!(table.len(), CORE_SKILLS.len() + 1);
    }

    #[test]
    fn xml_adds_unknown_skills_only() {
        let xml = br#"<Skills>
            <Skill><Key>ATHL</Key><Name>Athletics (Br)</Name><CharKey>BR</CharKey></Skill>
            <Skill><Key>KNOWFORB</Key><Name>Knowledge: Forbidden</Name><CharKey>INT</CharKey><TypeValue>stKnowledge</TypeValue></Skill>
        </Skills>"#;
        let table = SkillTable::from_xml(xml);
        assert_eq!(table.name_for_key("ATHL"), Some("Athletics"));
        let forbidden = table.get("KNOWFORB").unwrap();
        assert_eq!(forbidden.name, "Knowledge: Forbidden");
        assert_eq!(forbidden.custom.as_ref().unwrap().skill_type, "Knowledge");
    }

    #[test]
    fn malformed_xml_falls_back_to_defaults() {
        let table = SkillTable::from_xml(b"<Skills><Skill>");
        assert_eq!(table.len(), SkillTable::defaults().len());
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let vfs = vfs::VfsPath::new(vfs::MemoryFS::new());
        assert!(SkillTable::load(&vfs).contains_key("COOL"));
    }
}
