//! Fixtures shared by the unit tests.

use serde_json::{Value, json};

use crate::catalog::{CatalogMetadata, MemoryCatalog};
use crate::entity::ReferenceEntity;
use crate::keys::EntityKind;

/// A PNG signature followed by the start of an IHDR chunk.
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR\x00\x00\x00\x01";

pub const SAMPLE_CHARACTER: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Character xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <Key>a1b2c3d4</Key>
  <Description>
    <CharName>Kira Venn</CharName>
    <PlayerName>Sam</PlayerName>
  </Description>
  <Credits>500</Credits>
  <Experience>
    <ExperienceRanks>
      <StartingRanks>110</StartingRanks>
      <SpeciesRanks>0</SpeciesRanks>
      <PurchasedRanks>30</PurchasedRanks>
    </ExperienceRanks>
    <UsedExperience>125</UsedExperience>
  </Experience>
  <Characteristics>
    <CharCharacteristic><Key>BR</Key><Rank><StartRanks>2</StartRanks><PurchasedRanks>2</PurchasedRanks></Rank></CharCharacteristic>
    <CharCharacteristic><Key>AG</Key><Rank><PurchasedRanks>3</PurchasedRanks></Rank></CharCharacteristic>
    <CharCharacteristic><Key>INT</Key><Rank><PurchasedRanks>2</PurchasedRanks></Rank></CharCharacteristic>
    <CharCharacteristic><Key>CUN</Key><Rank><PurchasedRanks>2</PurchasedRanks></Rank></CharCharacteristic>
    <CharCharacteristic><Key>WIL</Key><Rank><PurchasedRanks>2</PurchasedRanks></Rank></CharCharacteristic>
    <CharCharacteristic><Key>PR</Key><Rank><PurchasedRanks>2</PurchasedRanks></Rank></CharCharacteristic>
  </Characteristics>
  <Skills>
    <CharSkill><Key>ATHL</Key><isCareer>true</isCareer><Rank><PurchasedRanks>2</PurchasedRanks></Rank></CharSkill>
    <CharSkill><Key>COOL</Key><Rank><SpeciesRanks>1</SpeciesRanks></Rank></CharSkill>
    <CharSkill><Key>PERC</Key><isCareer>true</isCareer><Rank><SpeciesRanks>1</SpeciesRanks></Rank></CharSkill>
    <CharSkill><Key>ASTRO</Key></CharSkill>
    <CharSkill><Key>BOGUS</Key><Rank><PurchasedRanks>5</PurchasedRanks></Rank></CharSkill>
  </Skills>
  <Species><SpeciesKey>HUMAN</SpeciesKey></Species>
  <Career>
    <CareerKey>SMUG</CareerKey>
    <StartingSpecKey>PILOT</StartingSpecKey>
    <CareerSkills><Key>ATHL</Key><Key>PERC</Key></CareerSkills>
    <CareerSpecSkills><Key>PILOTSP</Key></CareerSpecSkills>
  </Career>
  <Specializations>
    <CharSpecialization>
      <Key>PILOT</Key>
      <isStartingSpec>true</isStartingSpec>
      <Talents>
        <CharTalent>
          <Key>GRIT</Key>
          <Purchased>true</Purchased>
          <BonusChars><BonusChar><CharKey>BR</CharKey><Bonus>1</Bonus></BonusChar></BonusChars>
        </CharTalent>
        <CharTalent><Key>QUICKST</Key></CharTalent>
      </Talents>
    </CharSpecialization>
  </Specializations>
  <ForcePowers>
    <CharForcePower>
      <Key>FORCEMOVE</Key>
      <ForceAbilities>
        <CharForceAbility><Key>MOVEBASIC</Key><Purchased>true</Purchased></CharForceAbility>
        <CharForceAbility><Key>MOVECONTROL1</Key></CharForceAbility>
        <CharForceAbility><Key>MOVECONTROL2</Key></CharForceAbility>
        <CharForceAbility><Key>MOVECONTROL3</Key></CharForceAbility>
        <CharForceAbility><Key>MOVESTRENGTH</Key><Purchased>true</Purchased></CharForceAbility>
        <CharForceAbility><Key>MOVERANGE</Key><Purchased>false</Purchased></CharForceAbility>
      </ForceAbilities>
    </CharForcePower>
  </ForcePowers>
  <Weapons>
    <CharWeapon><ItemKey>BLASTPISTOL</ItemKey><Count>2</Count></CharWeapon>
    <CharWeapon><ItemKey>VIBROKNIFE</ItemKey></CharWeapon>
  </Weapons>
  <Armor>
    <CharArmor><ItemKey>PADDED</ItemKey></CharArmor>
  </Armor>
  <Gear>
    <CharGear><ItemKey>STIMPACK</ItemKey><Count>3</Count></CharGear>
  </Gear>
  <Portrait>iVBORw0KGgoAAAAN
    SUhEUgAAAAE=</Portrait>
</Character>
"#;

pub fn entity(value: Value) -> ReferenceEntity {
    ReferenceEntity::from_value(value).unwrap()
}

fn item(id: &str, import_id: &str, name: &str, item_type: &str, data: Value) -> ReferenceEntity {
    entity(json!({
        "_id": id,
        "name": name,
        "type": item_type,
        "flags": { "ffgimportid": import_id },
        "data": data
    }))
}

pub fn item_catalog_metadata(name: &str) -> CatalogMetadata {
    CatalogMetadata {
        name: name.to_string(),
        entity_type: EntityKind::Item,
        locked: false,
    }
}

/// Reference entities for everything [`SAMPLE_CHARACTER`] refers to.
pub fn sample_catalog() -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new();
    for name in ["species", "careers", "specializations", "talents", "forcepowers", "equipment"] {
        catalog.add_catalog(name, item_catalog_metadata(name));
    }

    catalog.add_entity(
        "species",
        item(
            "sp-human",
            "HUMAN",
            "Human",
            "species",
            json!({ "attributes": { "attr1": { "mod": "Cool", "modtype": "Skill Rank", "value": 1 } } }),
        ),
    );
    catalog.add_entity(
        "careers",
        item(
            "car-smug",
            "SMUG",
            "Smuggler",
            "career",
            json!({ "attributes": { "attr1": { "mod": "Athletics", "modtype": "Skill Rank", "value": 3 } } }),
        ),
    );
    catalog.add_entity(
        "specializations",
        item(
            "spec-pilot",
            "PILOT",
            "Pilot",
            "specialization",
            json!({
                "attributes": {},
                "talents": {
                    "talent0": { "name": "Grit", "itemId": "tal-grit", "attributes": {} },
                    "talent1": { "name": "Quick Strike", "itemId": "tal-quick", "attributes": {} }
                }
            }),
        ),
    );
    catalog.add_entity(
        "talents",
        item(
            "tal-grit",
            "GRIT",
            "Grit",
            "talent",
            json!({ "ranks": { "ranked": true, "current": 1 }, "activation": { "value": "Passive" } }),
        ),
    );
    catalog.add_entity(
        "forcepowers",
        item(
            "fp-move",
            "FORCEMOVE",
            "Move",
            "forcepower",
            json!({
                "upgrades": {
                    "upgrade0": { "islearned": false },
                    "upgrade1": { "islearned": false }
                }
            }),
        ),
    );
    for (id, key, name, item_type) in [
        ("w-blaster", "BLASTPISTOL", "Blaster Pistol", "weapon"),
        ("w-knife", "VIBROKNIFE", "Vibro-knife", "weapon"),
        ("a-padded", "PADDED", "Padded Armor", "armour"),
        ("g-stim", "STIMPACK", "Stimpack", "gear"),
    ] {
        catalog.add_entity("equipment", item(id, key, name, item_type, json!({})));
    }

    catalog
}
