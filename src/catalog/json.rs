use std::io::Read;

use itertools::Itertools;
use serde_json::Value;
use tracing::{debug, warn};
use vfs::VfsPath;

use crate::catalog::{Catalog, CatalogMetadata, IndexEntry};
use crate::entity::ReferenceEntity;
use crate::error::ErrorKind;

/// Name of the metadata file in each catalog directory.
pub const METADATA_FILE: &str = "catalog.json";

/// A [`Catalog`] read from a directory tree:
///
/// ```text
/// <root>/<catalog>/catalog.json   {"name": ..., "entity": "Item", "locked": false}
/// <root>/<catalog>/<id>.json      one reference entity per file
/// ```
///
/// Entities without an `_id` take their file stem as the id.
pub struct JsonCatalog {
    catalogs: Vec<(String, CatalogMetadata, VfsPath)>,
}

impl JsonCatalog {
    /// Discover catalogs under `root`. Directories without readable metadata
    /// are skipped. Catalogs enumerate in directory-name order.
    pub fn open(root: &VfsPath) -> Result<Self, ErrorKind> {
        let dirs = root
            .read_dir()?
            .filter(|p| p.is_dir().unwrap_or(false))
            .sorted_by_key(|p| p.filename());

        let mut catalogs = Vec::new();
        for dir in dirs {
            let id = dir.filename();
            let metadata = match read_json(&dir.join(METADATA_FILE)?) {
                Ok(value) => serde_json::from_value::<CatalogMetadata>(value)?,
                Err(e) => {
                    debug!("skipping {id}: no readable {METADATA_FILE}: {e}");
                    continue;
                }
            };
            catalogs.push((id, metadata, dir));
        }

        Ok(Self { catalogs })
    }

    fn dir(&self, catalog: &str) -> Result<&VfsPath, ErrorKind> {
        self.catalogs
            .iter()
            .find(|(id, _, _)| id == catalog)
            .map(|(_, _, dir)| dir)
            .ok_or_else(|| ErrorKind::CatalogError {
                catalog: catalog.to_string(),
                detail: "no such catalog".to_string(),
            })
    }

    fn entity_files(&self, catalog: &str) -> Result<Vec<VfsPath>, ErrorKind> {
        let mut files: Vec<VfsPath> = self
            .dir(catalog)?
            .read_dir()?
            .filter(|p| {
                let name = p.filename();
                name.ends_with(".json") && name != METADATA_FILE
            })
            .collect();
        files.sort_by_key(|p| p.filename());
        Ok(files)
    }
}

fn read_json(path: &VfsPath) -> Result<Value, ErrorKind> {
    let mut buf = String::new();
    path.open_file()?.read_to_string(&mut buf)?;
    Ok(serde_json::from_str(&buf)?)
}

fn read_entity(path: &VfsPath) -> Result<ReferenceEntity, ErrorKind> {
    let mut entity = ReferenceEntity::from_value(read_json(path)?)?;
    if entity.id().is_none() {
        let filename = path.filename();
        let stem = filename.strip_suffix(".json").unwrap_or(&filename);
        entity.set_id(stem);
    }
    Ok(entity)
}

impl Catalog for JsonCatalog {
    fn list_catalogs(&self) -> Vec<String> {
        self.catalogs.iter().map(|(id, _, _)| id.clone()).collect()
    }

    fn catalog_metadata(&self, catalog: &str) -> Option<CatalogMetadata> {
        self.catalogs
            .iter()
            .find(|(id, _, _)| id == catalog)
            .map(|(_, metadata, _)| metadata.clone())
    }

    fn catalog_index(&self, catalog: &str) -> Result<Vec<IndexEntry>, ErrorKind> {
        Ok(self
            .catalog_content(catalog)?
            .iter()
            .filter_map(IndexEntry::for_entity)
            .collect())
    }

    fn catalog_entity(&self, catalog: &str, internal_id: &str) -> Result<Option<ReferenceEntity>, ErrorKind> {
        let path = self.dir(catalog)?.join(format!("{internal_id}.json"))?;
        if path.exists()? {
            let entity = read_entity(&path)?;
            if entity.id() == Some(internal_id) {
                return Ok(Some(entity));
            }
        }

        // File names needn't match ids
        Ok(self
            .catalog_content(catalog)?
            .into_iter()
            .find(|entity| entity.id() == Some(internal_id)))
    }

    fn catalog_content(&self, catalog: &str) -> Result<Vec<ReferenceEntity>, ErrorKind> {
        let mut content = Vec::new();
        for file in self.entity_files(catalog)? {
            match read_entity(&file) {
                Ok(entity) => content.push(entity),
                Err(e) => warn!("skipping unreadable entity {}: {e}", file.as_str()),
            }
        }
        Ok(content)
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use serde_json::json;

    use super::*;
    use crate::keys::EntityKind;

    fn write(root: &VfsPath, path: &str, value: Value) {
        let file = root.join(path).unwrap();
        file.parent().create_dir_all().unwrap();
        file.create_file()
            .unwrap()
            .write_all(value.to_string().as_bytes())
            .unwrap();
    }

    fn fixture() -> VfsPath {
        let root = VfsPath::new(vfs::MemoryFS::new());
        write(&root, "b-talents/catalog.json", json!({ "name": "Talents", "entity": "Item", "locked": true }));
        write(
            &root,
            "b-talents/tal1.json",
            json!({ "name": "Grit", "flags": { "ffgimportid": "GRIT" } }),
        );
        write(&root, "a-species/catalog.json", json!({ "entity": "Item" }));
        write(
            &root,
            "a-species/human.json",
            json!({ "_id": "sp1", "name": "Human", "flags": { "ffgimportid": "HUMAN" } }),
        );
        write(&root, "a-species/broken.json", json!([1, 2, 3]));
        root.join("no-metadata").unwrap().create_dir().unwrap();
        root
    }

    #[test]
    fn discovers_catalogs_in_name_order() {
        let catalog = JsonCatalog::open(&fixture()).unwrap();
        assert_eq!(catalog.list_catalogs(), vec!["a-species", "b-talents"]);

        let metadata = catalog.catalog_metadata("b-talents").unwrap();
        assert_eq!(metadata.entity_type, EntityKind::Item);
        assert!(metadata.locked);
        assert!(catalog.catalog_metadata("no-metadata").is_none());
    }

    #[test]
    fn ids_fall_back_to_file_stem() {
        let catalog = JsonCatalog::open(&fixture()).unwrap();
        let index = catalog.catalog_index("b-talents").unwrap();
        assert_eq!(
            index,
            vec![IndexEntry {
                internal_id: "tal1".to_string(),
                import_id: Some("GRIT".to_string())
            }]
        );
        let grit = catalog.catalog_entity("b-talents", "tal1").unwrap().unwrap();
        assert_eq!(grit.name(), Some("Grit"));
    }

    #[test]
    fn entity_lookup_when_file_name_differs_from_id() {
        let catalog = JsonCatalog::open(&fixture()).unwrap();
        let human = catalog.catalog_entity("a-species", "sp1").unwrap().unwrap();
        assert_eq!(human.import_id(), Some("HUMAN"));
        // The non-object file is skipped rather than failing the catalog
        assert_eq!(catalog.catalog_content("a-species").unwrap().len(), 1);
    }
}
