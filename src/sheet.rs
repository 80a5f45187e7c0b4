//! Typed view of a character export.
//!
//! [`CharacterSheet::decode`] is the only place that knows the export's
//! element names. It checks the shape of every section it reads and turns
//! each repeated collection into a `Vec`, so the assembler never has to ask
//! whether a collection held one entry or many.

use tracing::debug;

use crate::error::{ErrorKind, parse_error};
use crate::skills::Characteristic;
use crate::xml::{self, NormalizedNode};

const ROOT: &str = "Character";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CharacterSheet {
    /// The export's stable character key, used as the import id.
    pub key: String,
    pub name: Option<String>,
    pub credits: Option<i64>,
    pub experience: Experience,
    pub characteristics: Vec<CharacteristicEntry>,
    pub skills: Vec<SkillEntry>,
    pub species_key: Option<String>,
    pub career: Career,
    pub specializations: Vec<SpecializationEntry>,
    pub force_powers: Vec<ForcePowerEntry>,
    pub weapons: Vec<EquipmentEntry>,
    pub armor: Vec<EquipmentEntry>,
    pub gear: Vec<EquipmentEntry>,
    /// Base64 image data, as embedded in the export.
    pub portrait: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Experience {
    pub starting: i64,
    pub species: i64,
    pub purchased: i64,
    pub used: i64,
}

impl Experience {
    /// Saturates rather than overflowing on out-of-range counters.
    pub fn total(&self) -> i64 {
        self.starting.saturating_add(self.species).saturating_add(self.purchased)
    }

    pub fn available(&self) -> i64 {
        self.total().saturating_sub(self.used)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CharacteristicEntry {
    pub characteristic: Characteristic,
    pub purchased_ranks: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SkillEntry {
    pub key: String,
    pub is_career: bool,
    pub purchased_ranks: Option<i64>,
    pub species_ranks: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Career {
    pub key: Option<String>,
    pub starting_spec_key: Option<String>,
    /// Skill keys granted a free rank by the career.
    pub career_skills: Vec<String>,
    /// Skill keys granted a free rank by the starting specialization.
    pub spec_skills: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpecializationEntry {
    pub key: Option<String>,
    pub is_starting: bool,
    /// Positional: entry `i` corresponds to the template's slot `talent<i>`.
    pub talents: Vec<TalentEntry>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TalentEntry {
    pub key: Option<String>,
    pub purchased: bool,
    pub bonus_chars: Vec<BonusChar>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BonusChar {
    pub characteristic: Characteristic,
    pub bonus: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ForcePowerEntry {
    pub key: Option<String>,
    /// Positional: the first four are base abilities, the rest map to upgrades.
    pub abilities: Vec<ForceAbilityEntry>,
}

impl ForcePowerEntry {
    pub fn any_purchased(&self) -> bool {
        self.abilities.iter().any(|ability| ability.purchased)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ForceAbilityEntry {
    pub key: Option<String>,
    pub purchased: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EquipmentEntry {
    pub item_key: String,
    pub count: Option<i64>,
}

impl CharacterSheet {
    /// Normalize and decode raw export markup.
    pub fn parse(text: &str) -> Result<Self, ErrorKind> {
        Self::decode(&xml::normalize(text)?)
    }

    pub fn decode(root: &NormalizedNode) -> Result<Self, ErrorKind> {
        let character = match root.get(ROOT) {
            Some(node @ NormalizedNode::Map(_)) => node,
            Some(_) => return Err(parse_error(format!("<{ROOT}> has no content"))),
            None => return Err(parse_error(format!("document root is not <{ROOT}>"))),
        };

        let key = text(character, "Key")
            .ok_or_else(|| parse_error(format!("<{ROOT}> is missing its Key")))?;

        let name = match section(character, "Description")? {
            Some(description) => text(description, "CharName"),
            None => None,
        };

        let mut sheet = CharacterSheet {
            key,
            name,
            credits: int(character, "Credits"),
            experience: decode_experience(character)?,
            species_key: section(character, "Species")?.and_then(|s| text(s, "SpeciesKey")),
            portrait: text(character, "Portrait"),
            ..Default::default()
        };

        for entry in entries(character, "Characteristics", "CharCharacteristic")? {
            let Some(code) = text(entry, "Key") else {
                continue;
            };
            let Some(characteristic) = Characteristic::from_code(&code) else {
                debug!("skipping unknown characteristic {code}");
                continue;
            };
            sheet.characteristics.push(CharacteristicEntry {
                characteristic,
                purchased_ranks: section(entry, "Rank")?.and_then(|rank| int(rank, "PurchasedRanks")),
            });
        }

        for entry in entries(character, "Skills", "CharSkill")? {
            let Some(key) = text(entry, "Key") else {
                continue;
            };
            let rank = section(entry, "Rank")?;
            sheet.skills.push(SkillEntry {
                key,
                is_career: flag(entry, "isCareer"),
                purchased_ranks: rank.and_then(|r| int(r, "PurchasedRanks")),
                species_ranks: rank.and_then(|r| int(r, "SpeciesRanks")),
            });
        }

        if let Some(career) = section(character, "Career")? {
            sheet.career = Career {
                key: text(career, "CareerKey"),
                starting_spec_key: text(career, "StartingSpecKey"),
                career_skills: key_list(career, "CareerSkills")?,
                spec_skills: key_list(career, "CareerSpecSkills")?,
            };
        }

        for entry in entries(character, "Specializations", "CharSpecialization")? {
            let mut talents = Vec::new();
            for talent in entries(entry, "Talents", "CharTalent")? {
                talents.push(decode_talent(talent)?);
            }
            sheet.specializations.push(SpecializationEntry {
                key: text(entry, "Key"),
                is_starting: flag(entry, "isStartingSpec"),
                talents,
            });
        }

        for entry in entries(character, "ForcePowers", "CharForcePower")? {
            let abilities = entries(entry, "ForceAbilities", "CharForceAbility")?
                .into_iter()
                .map(|ability| ForceAbilityEntry {
                    key: text(ability, "Key"),
                    purchased: flag(ability, "Purchased"),
                })
                .collect();
            sheet.force_powers.push(ForcePowerEntry {
                key: text(entry, "Key"),
                abilities,
            });
        }

        sheet.weapons = decode_equipment(character, "Weapons", "CharWeapon")?;
        sheet.armor = decode_equipment(character, "Armor", "CharArmor")?;
        sheet.gear = decode_equipment(character, "Gear", "CharGear")?;

        Ok(sheet)
    }

    /// The specialization entry that stands for the career's starting
    /// specialization, if any.
    pub fn starting_specialization(&self) -> Option<usize> {
        if self.specializations.len() == 1 {
            return Some(0);
        }
        self.specializations.iter().position(|spec| {
            spec.is_starting
                || (spec.key.is_some() && spec.key == self.career.starting_spec_key)
        })
    }
}

fn decode_experience(character: &NormalizedNode) -> Result<Experience, ErrorKind> {
    let Some(experience) = section(character, "Experience")? else {
        return Ok(Experience::default());
    };
    let ranks = section(experience, "ExperienceRanks")?;
    let rank = |name: &str| ranks.and_then(|r| int(r, name)).unwrap_or(0);

    Ok(Experience {
        starting: rank("StartingRanks"),
        species: rank("SpeciesRanks"),
        purchased: rank("PurchasedRanks"),
        used: int(experience, "UsedExperience")
            .or_else(|| ranks.and_then(|r| int(r, "UsedExperience")))
            .unwrap_or(0),
    })
}

fn decode_talent(talent: &NormalizedNode) -> Result<TalentEntry, ErrorKind> {
    let mut bonus_chars = Vec::new();
    for bonus in entries(talent, "BonusChars", "BonusChar")? {
        let characteristic = text(bonus, "CharKey").and_then(|code| Characteristic::from_code(&code));
        match (characteristic, int(bonus, "Bonus")) {
            (Some(characteristic), Some(bonus)) => bonus_chars.push(BonusChar { characteristic, bonus }),
            _ => debug!("skipping malformed talent bonus {bonus:?}"),
        }
    }

    Ok(TalentEntry {
        key: text(talent, "Key"),
        purchased: flag(talent, "Purchased"),
        bonus_chars,
    })
}

fn decode_equipment(
    character: &NormalizedNode,
    section_name: &str,
    entry_name: &str,
) -> Result<Vec<EquipmentEntry>, ErrorKind> {
    let mut equipment = Vec::new();
    for entry in entries(character, section_name, entry_name)? {
        let Some(item_key) = text(entry, "ItemKey") else {
            debug!("skipping {entry_name} without an ItemKey");
            continue;
        };
        equipment.push(EquipmentEntry {
            item_key,
            count: int(entry, "Count"),
        });
    }
    Ok(equipment)
}

/// A child that must be a mapping. Empty elements read as absent.
fn section<'a>(node: &'a NormalizedNode, name: &str) -> Result<Option<&'a NormalizedNode>, ErrorKind> {
    match node.get(name) {
        None => Ok(None),
        Some(child) if child.is_empty() => Ok(None),
        Some(child @ NormalizedNode::Map(_)) => Ok(Some(child)),
        Some(NormalizedNode::Text(t)) => Err(parse_error(format!("expected <{name}> to contain elements, found text {t:?}"))),
        Some(NormalizedNode::List(_)) => Err(parse_error(format!("expected a single <{name}>, found several"))),
    }
}

/// All `entry` elements under `section`, in document order. Empty entries are
/// kept so positional collections stay aligned.
fn entries<'a>(
    node: &'a NormalizedNode,
    section_name: &str,
    entry: &str,
) -> Result<Vec<&'a NormalizedNode>, ErrorKind> {
    let Some(section) = section(node, section_name)? else {
        return Ok(Vec::new());
    };
    let items = match section.get(entry) {
        Some(NormalizedNode::List(items)) => items.iter().collect(),
        Some(item) => vec![item],
        None => Vec::new(),
    };
    for item in &items {
        if let NormalizedNode::Text(t) = item
            && !t.trim().is_empty()
        {
            return Err(parse_error(format!(
                "expected <{section_name}>/<{entry}> to contain elements, found text {t:?}"
            )));
        }
    }
    Ok(items)
}

/// `<Key>` values listed under `section`.
fn key_list(node: &NormalizedNode, section_name: &str) -> Result<Vec<String>, ErrorKind> {
    let Some(section) = section(node, section_name)? else {
        return Ok(Vec::new());
    };
    Ok(section
        .children("Key")
        .into_iter()
        .filter_map(NormalizedNode::non_empty_text)
        .map(str::to_string)
        .collect())
}

fn text(node: &NormalizedNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(NormalizedNode::non_empty_text)
        .map(str::to_string)
}

fn int(node: &NormalizedNode, name: &str) -> Option<i64> {
    let raw = node.get(name)?;
    let value = raw.as_i64();
    if value.is_none() && !raw.is_empty() {
        debug!("ignoring non-numeric <{name}>: {raw:?}");
    }
    value
}

fn flag(node: &NormalizedNode, name: &str) -> bool {
    node.get(name).and_then(NormalizedNode::as_bool).unwrap_or(false)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::SAMPLE_CHARACTER;

    #[test]
    fn decodes_sample_character() {
        let sheet = CharacterSheet::parse(SAMPLE_CHARACTER).unwrap();

        assert_eq!(sheet.key, "a1b2c3d4");
        assert_eq!(sheet.name.as_deref(), Some("Kira Venn"));
        assert_eq!(sheet.credits, Some(500));
        assert_eq!(sheet.experience.total(), 140);
        assert_eq!(sheet.experience.available(), 15);
        assert_eq!(sheet.species_key.as_deref(), Some("HUMAN"));
        assert_eq!(sheet.career.key.as_deref(), Some("SMUG"));
        assert_eq!(sheet.career.career_skills, vec!["ATHL", "PERC"]);
        assert_eq!(sheet.career.spec_skills, vec!["PILOTSP"]);
        assert_eq!(sheet.characteristics.len(), 6);
        assert_eq!(sheet.characteristics[1].characteristic, Characteristic::Agility);
        assert_eq!(sheet.characteristics[1].purchased_ranks, Some(3));
        assert!(sheet.portrait.is_some());
    }

    #[test]
    fn single_entries_decode_to_vectors() {
        let sheet = CharacterSheet::parse(SAMPLE_CHARACTER).unwrap();

        // One specialization, one force power and one armor entry in the sample
        assert_eq!(sheet.specializations.len(), 1);
        assert_eq!(sheet.specializations[0].talents.len(), 2);
        assert_eq!(sheet.force_powers.len(), 1);
        assert_eq!(sheet.armor.len(), 1);
        assert_eq!(sheet.weapons.len(), 2);
        assert_eq!(sheet.weapons[0].count, Some(2));
        assert_eq!(sheet.weapons[1].count, None);
        assert_eq!(sheet.starting_specialization(), Some(0));
    }

    #[test]
    fn talent_bonuses_and_purchase_flags() {
        let sheet = CharacterSheet::parse(SAMPLE_CHARACTER).unwrap();
        let talents = &sheet.specializations[0].talents;

        assert!(talents[0].purchased);
        assert_eq!(
            talents[0].bonus_chars,
            vec![BonusChar {
                characteristic: Characteristic::Brawn,
                bonus: 1
            }]
        );
        assert!(!talents[1].purchased);
        assert!(sheet.force_powers[0].any_purchased());
    }

    #[test]
    fn missing_sections_are_empty() {
        let sheet = CharacterSheet::parse("<Character><Key>K1</Key><Gear/></Character>").unwrap();
        assert_eq!(sheet.key, "K1");
        assert!(sheet.name.is_none());
        assert!(sheet.skills.is_empty());
        assert!(sheet.gear.is_empty());
        assert_eq!(sheet.experience, Experience::default());
        assert_eq!(sheet.starting_specialization(), None);
    }

    #[test]
    fn rejects_wrong_root_and_missing_key() {
        let err = CharacterSheet::parse("<Vehicle><Key>K1</Key></Vehicle>").unwrap_err();
        assert!(matches!(err, ErrorKind::ParseError { .. }));

        let err = CharacterSheet::parse("<Character><Description/></Character>").unwrap_err();
        assert!(matches!(err, ErrorKind::ParseError { .. }));
    }

    #[test]
    fn rejects_text_where_elements_expected() {
        let err = CharacterSheet::parse("<Character><Key>K1</Key><Skills>lots</Skills></Character>").unwrap_err();
        assert!(matches!(err, ErrorKind::ParseError { .. }));

        let err = CharacterSheet::parse(
            "<Character><Key>K1</Key><Weapons><CharWeapon>BLASTER</CharWeapon></Weapons></Character>",
        )
        .unwrap_err();
        assert!(matches!(err, ErrorKind::ParseError { .. }));
    }

    #[test]
    fn unparseable_counts_are_absent() {
        let sheet = CharacterSheet::parse(
            "<Character><Key>K1</Key><Credits>lots</Credits>\
             <Gear><CharGear><ItemKey>STIM</ItemKey><Count>x</Count></CharGear></Gear></Character>",
        )
        .unwrap();
        assert_eq!(sheet.credits, None);
        assert_eq!(sheet.gear[0].count, None);
    }

    #[test]
    fn huge_experience_counters_saturate() {
        let xml = SAMPLE_CHARACTER.replace(
            "<StartingRanks>110</StartingRanks>",
            "<StartingRanks>9223372036854775807</StartingRanks>",
        );
        let sheet = CharacterSheet::parse(&xml).unwrap();
        assert_eq!(sheet.experience.total(), i64::MAX);
        assert_eq!(sheet.experience.available(), i64::MAX - 125);

        let experience = Experience {
            starting: i64::MIN,
            species: -1,
            purchased: 0,
            used: 1,
        };
        assert_eq!(experience.total(), i64::MIN);
        assert_eq!(experience.available(), i64::MIN);
    }

    #[test]
    fn starting_specialization_by_key() {
        let mut sheet = CharacterSheet::default();
        sheet.career.starting_spec_key = Some("PILOT".to_string());
        sheet.specializations = vec![
            SpecializationEntry {
                key: Some("SCOUNDREL".to_string()),
                ..Default::default()
            },
            SpecializationEntry {
                key: Some("PILOT".to_string()),
                ..Default::default()
            },
        ];
        assert_eq!(sheet.starting_specialization(), Some(1));
    }
}
