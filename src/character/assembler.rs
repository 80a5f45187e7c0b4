use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::assets::AssetImporter;
use crate::catalog::Resolver;
use crate::character::{CharacterRecord, DEFAULT_NAME, ExperienceTotals, ImportProgress};
use crate::entity::{ReferenceEntity, child_object};
use crate::error::ErrorKind;
use crate::keys::{self, EntityKind};
use crate::modifiers::{AttributeKeys, AttributeModifier, ModType, ModValue, raw_attr_value};
use crate::options::ImportOptions;
use crate::sheet::{CharacterSheet, EquipmentEntry, SpecializationEntry, TalentEntry};
use crate::skills::SkillTable;

/// Progress reported once each phase finishes.
mod checkpoint {
    pub const SKILLS: u8 = 10;
    pub const SPECIES: u8 = 20;
    pub const CAREER: u8 = 30;
    pub const SPECIALIZATIONS: u8 = 40;
    pub const FORCE_POWERS: u8 = 50;
    pub const WEAPONS: u8 = 60;
    pub const ARMOR: u8 = 70;
    pub const GEAR: u8 = 80;
    pub const PORTRAIT: u8 = 90;
}

/// Talent slot fields copied from the talent template, with the value used
/// when the template can't be fetched.
fn talent_fields() -> [(&'static str, [&'static str; 3], Value); 3] {
    [
        (keys::IS_RANKED, [keys::DATA, "ranks", "ranked"], Value::Bool(false)),
        (keys::RANK, [keys::DATA, "ranks", "current"], Value::from(0)),
        (keys::ACTIVATION, [keys::DATA, "activation", "value"], Value::from("Passive")),
    ]
}

fn miss(kind: EntityKind, import_id: &str) -> ErrorKind {
    ErrorKind::ResolutionMiss {
        kind: kind.to_string(),
        import_id: import_id.to_string(),
    }
}

/// Builds a [`CharacterRecord`] from a decoded sheet.
///
/// Runs the phases in a fixed order. A failing phase (or a failing entry in
/// a collection) is logged and skipped; assembly itself never fails.
pub struct Assembler<'a> {
    resolver: Resolver<'a>,
    assets: AssetImporter<'a>,
    skills: &'a SkillTable,
    options: &'a ImportOptions,
    progress: &'a mut dyn ImportProgress,
    last_checkpoint: u8,
}

impl<'a> Assembler<'a> {
    pub fn new(
        resolver: Resolver<'a>,
        assets: AssetImporter<'a>,
        skills: &'a SkillTable,
        options: &'a ImportOptions,
        progress: &'a mut dyn ImportProgress,
    ) -> Self {
        Self {
            resolver,
            assets,
            skills,
            options,
            progress,
            last_checkpoint: 0,
        }
    }

    pub fn assemble(mut self, sheet: &CharacterSheet) -> CharacterRecord {
        let name = sheet.name.as_deref().unwrap_or(DEFAULT_NAME);
        let mut record = CharacterRecord::new(&sheet.key, name, self.skills);
        record.data.stats.credits.value = sheet.credits.unwrap_or(0);
        record.data.experience = ExperienceTotals {
            total: sheet.experience.total(),
            available: sheet.experience.available(),
        };

        self.apply_characteristics(sheet, &mut record);
        let species_skills = self.apply_skills(sheet, &mut record);
        self.checkpoint(checkpoint::SKILLS);

        let result = self.add_species(sheet, &species_skills, &mut record);
        self.finish_phase("species", result, checkpoint::SPECIES);

        let result = self.add_career(sheet, &mut record);
        self.finish_phase("career", result, checkpoint::CAREER);

        self.add_specializations(sheet, &mut record);
        self.checkpoint(checkpoint::SPECIALIZATIONS);

        self.add_force_powers(sheet, &mut record);
        self.checkpoint(checkpoint::FORCE_POWERS);

        self.add_equipment("weapon", &sheet.weapons, &mut record);
        self.checkpoint(checkpoint::WEAPONS);
        self.add_equipment("armor", &sheet.armor, &mut record);
        self.checkpoint(checkpoint::ARMOR);
        self.add_equipment("gear", &sheet.gear, &mut record);
        self.checkpoint(checkpoint::GEAR);

        let result = self.add_portrait(sheet, &mut record);
        self.finish_phase("portrait", result, checkpoint::PORTRAIT);

        record
    }

    fn checkpoint(&mut self, percent: u8) {
        if percent > self.last_checkpoint {
            self.last_checkpoint = percent;
            self.progress.report(percent);
        }
    }

    fn finish_phase(&mut self, phase: &str, result: Result<(), ErrorKind>, percent: u8) {
        if let Err(e) = result {
            warn!("skipping {phase}: {e}");
        }
        self.checkpoint(percent);
    }

    fn apply_characteristics(&self, sheet: &CharacterSheet, record: &mut CharacterRecord) {
        for entry in &sheet.characteristics {
            let name = entry.characteristic.name();
            let value = entry.purchased_ranks.unwrap_or(0);
            record.data.attributes.insert(
                name.to_string(),
                AttributeModifier::new(name, ModType::Characteristic, value).with_key(name),
            );
            if let Some(characteristic) = record.data.characteristics.get_mut(name) {
                characteristic.value = value;
            }
        }
    }

    /// Returns the species-granted ranks, which belong on the species item
    /// rather than the character.
    fn apply_skills(&self, sheet: &CharacterSheet, record: &mut CharacterRecord) -> Vec<AttributeModifier> {
        let mut species_skills = Vec::new();
        for entry in &sheet.skills {
            let Some(name) = self.skills.name_for_key(&entry.key) else {
                debug!("skipping unknown skill {}", entry.key);
                continue;
            };
            let Some(state) = record.data.skills.get_mut(name) else {
                continue;
            };
            if entry.is_career {
                state.careerskill = true;
            }

            let attribute = record
                .data
                .attributes
                .entry(name.to_string())
                .or_insert_with(|| AttributeModifier::new(name, ModType::SkillRank, 0).with_key(name));

            match (entry.purchased_ranks, entry.species_ranks) {
                (Some(ranks), _) => {
                    state.rank = ranks;
                    attribute.value = ModValue::Number(ranks);
                }
                (None, Some(ranks)) => {
                    species_skills.push(AttributeModifier::new(name, ModType::SkillRank, ranks).with_key(name));
                }
                (None, None) => {
                    state.rank = 0;
                    attribute.value = ModValue::Number(0);
                }
            }
        }
        species_skills
    }

    fn resolve_item(&mut self, import_id: &str) -> Result<ReferenceEntity, ErrorKind> {
        self.resolver
            .find_by_import_id(EntityKind::Item, import_id, None)
            .map(|resolved| resolved.entity)
            .ok_or_else(|| miss(EntityKind::Item, import_id))
    }

    fn add_species(
        &mut self,
        sheet: &CharacterSheet,
        species_skills: &[AttributeModifier],
        record: &mut CharacterRecord,
    ) -> Result<(), ErrorKind> {
        let Some(key) = sheet.species_key.as_deref() else {
            debug!("character has no species");
            return Ok(());
        };
        let mut species = self.resolve_item(key)?;

        // The export doesn't say whether a species rank was chosen or fixed,
        // so only add ranks the template doesn't already grant.
        let attributes = species.attributes_mut();
        let mut attr_keys = AttributeKeys::for_map(attributes);
        for skill in species_skills {
            if !attributes.values().any(|raw| skill.matches(raw)) {
                attributes.insert(attr_keys.next_key(), skill.to_value());
            }
        }

        record.items.push(species);
        Ok(())
    }

    /// Add one free rank per granted skill to the template's `Skill Rank`
    /// attributes.
    fn overlay_skill_ranks(&self, entity: &mut ReferenceEntity, skill_keys: &[String]) {
        let attributes = entity.attributes_mut();
        let mut attr_keys = AttributeKeys::for_map(attributes);

        for key in skill_keys {
            let Some(name) = self.skills.name_for_key(key) else {
                debug!("skipping unknown granted skill {key}");
                continue;
            };

            let existing = attributes.values_mut().find(|raw| {
                raw.get(keys::ATTR_MODTYPE).and_then(Value::as_str) == Some(ModType::SkillRank.as_str())
                    && raw.get(keys::ATTR_MOD).and_then(Value::as_str) == Some(name)
            });

            match existing.and_then(Value::as_object_mut) {
                Some(attribute) => {
                    let value = attribute.get(keys::ATTR_VALUE).and_then(raw_attr_value).unwrap_or(0);
                    attribute.insert(keys::ATTR_VALUE.to_string(), Value::from(value.saturating_add(1)));
                    if !attribute.get(keys::ATTR_KEY).is_some_and(|k| !k.is_null()) {
                        attribute.insert(keys::ATTR_KEY.to_string(), Value::from(name));
                    }
                }
                None => {
                    let attribute = AttributeModifier::new(name, ModType::SkillRank, 1).with_key(name);
                    attributes.insert(attr_keys.next_key(), attribute.to_value());
                }
            }
        }
    }

    fn add_career(&mut self, sheet: &CharacterSheet, record: &mut CharacterRecord) -> Result<(), ErrorKind> {
        let Some(key) = sheet.career.key.as_deref() else {
            debug!("character has no career");
            return Ok(());
        };
        let mut career = self.resolve_item(key)?;
        self.overlay_skill_ranks(&mut career, &sheet.career.career_skills);
        record.items.push(career);
        Ok(())
    }

    fn starting_template(&mut self, sheet: &CharacterSheet) -> Option<ReferenceEntity> {
        let key = sheet.career.starting_spec_key.as_deref()?;
        match self.resolve_item(key) {
            Ok(mut template) => {
                self.overlay_skill_ranks(&mut template, &sheet.career.spec_skills);
                Some(template)
            }
            Err(e) => {
                warn!("unable to add starting specialization: {e}");
                None
            }
        }
    }

    fn add_specializations(&mut self, sheet: &CharacterSheet, record: &mut CharacterRecord) {
        let mut starting = self.starting_template(sheet);
        let starting_index = sheet.starting_specialization();

        let total = sheet.specializations.len()
            + sheet
                .specializations
                .iter()
                .map(|spec| spec.talents.len())
                .sum::<usize>();
        let mut done = 0;

        for (index, spec) in sheet.specializations.iter().enumerate() {
            let template = if Some(index) == starting_index && starting.is_some() {
                starting.take()
            } else {
                match spec.key.as_deref().map(|key| self.resolve_item(key)) {
                    Some(Ok(entity)) => Some(entity),
                    Some(Err(e)) => {
                        warn!("unable to add specialization: {e}");
                        None
                    }
                    None => {
                        debug!("skipping specialization without a key");
                        None
                    }
                }
            };

            if let Some(mut entity) = template {
                self.apply_talents(&mut entity, spec, &mut done, total);
                record.items.push(entity);
            } else {
                done += spec.talents.len();
            }

            done += 1;
            self.spec_progress(done, total);
        }

        // A starting specialization the export didn't list still belongs on
        // the character.
        if let Some(entity) = starting {
            record.items.push(entity);
        }
    }

    fn spec_progress(&mut self, done: usize, total: usize) {
        if total > 0 {
            let sub = (done * 10 / total).min(10) as u8;
            self.checkpoint(checkpoint::CAREER + sub);
        }
    }

    fn apply_talents(&mut self, entity: &mut ReferenceEntity, spec: &SpecializationEntry, done: &mut usize, total: usize) {
        for (index, talent) in spec.talents.iter().enumerate() {
            if talent.purchased {
                self.learn_talent(entity, index, talent);
            }
            *done += 1;
            self.spec_progress(*done, total);
        }
    }

    fn learn_talent(&mut self, entity: &mut ReferenceEntity, index: usize, talent: &TalentEntry) {
        let slot_name = keys::talent_slot(index);
        let item_id = entity
            .lookup(&[keys::DATA, keys::TALENTS, slot_name.as_str(), keys::ITEM_ID])
            .and_then(Value::as_str)
            .map(str::to_string);

        let template = item_id
            .as_deref()
            .and_then(|id| self.resolver.find_by_id(EntityKind::Item, id));
        if template.is_none() {
            debug!(
                "no talent template for {} in slot {slot_name}",
                talent.key.as_deref().unwrap_or("<unknown>")
            );
        }

        let Some(slot) = entity
            .section_mut(keys::TALENTS)
            .get_mut(&slot_name)
            .and_then(Value::as_object_mut)
        else {
            warn!(
                "{} has no talent slot {slot_name}",
                entity.name().unwrap_or("<unnamed specialization>")
            );
            return;
        };

        for (field, path, default) in talent_fields() {
            match &template {
                Some(template) => {
                    slot.insert(field.to_string(), template.lookup(&path).cloned().unwrap_or(default));
                }
                None => {
                    slot.entry(field).or_insert(default);
                }
            }
        }
        slot.insert(keys::IS_LEARNED.to_string(), Value::Bool(true));

        if !talent.bonus_chars.is_empty() {
            add_bonus_chars(child_object(slot, keys::ATTRIBUTES), talent);
        }
    }

    fn add_force_powers(&mut self, sheet: &CharacterSheet, record: &mut CharacterRecord) {
        for power in sheet.force_powers.iter().filter(|power| power.any_purchased()) {
            let Some(key) = power.key.as_deref() else {
                continue;
            };
            let mut force = match self.resolve_item(key) {
                Ok(force) => force,
                Err(e) => {
                    warn!("unable to add force power: {e}");
                    continue;
                }
            };

            let learned: Vec<String> = power
                .abilities
                .iter()
                .enumerate()
                .skip(4)
                .filter(|(_, ability)| ability.purchased)
                .map(|(index, _)| keys::upgrade_slot(index - 4))
                .collect();
            if !learned.is_empty() {
                let upgrades = force.section_mut(keys::UPGRADES);
                for slot_name in learned {
                    match upgrades.get_mut(&slot_name).and_then(Value::as_object_mut) {
                        Some(upgrade) => {
                            upgrade.insert(keys::IS_LEARNED.to_string(), Value::Bool(true));
                        }
                        None => debug!("force power {key} has no {slot_name}"),
                    }
                }
            }

            record.items.push(force);
        }
    }

    fn add_equipment(&mut self, label: &str, entries: &[EquipmentEntry], record: &mut CharacterRecord) {
        for entry in entries {
            let mut item = match self.resolve_item(&entry.item_key) {
                Ok(item) => item,
                Err(e) => {
                    warn!("unable to add {label}: {e}");
                    continue;
                }
            };
            if let Some(count) = entry.count {
                item.set_quantity(count);
            }
            record.items.push(item);
        }
    }

    fn add_portrait(&mut self, sheet: &CharacterSheet, record: &mut CharacterRecord) -> Result<(), ErrorKind> {
        let Some(encoded) = sheet.portrait.as_deref() else {
            return Ok(());
        };
        let encoded: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = STANDARD.decode(encoded)?;

        let filename = format!("{}.png", sheet.key);
        let path = self
            .assets
            .store_bytes(&self.options.portrait_dir(), &filename, &bytes, "image/png")?;
        record.img = Some(path);
        Ok(())
    }
}

fn add_bonus_chars(attributes: &mut Map<String, Value>, talent: &TalentEntry) {
    let mut attr_keys = AttributeKeys::for_map(attributes);
    for bonus in &talent.bonus_chars {
        let attribute = AttributeModifier::new(bonus.characteristic.name(), ModType::Characteristic, bonus.bonus)
            .with_checkbox(false);
        attributes.insert(attr_keys.next_key(), attribute.to_value());
    }
}
