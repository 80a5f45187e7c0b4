//! Reference entity catalogs.
//!
//! A catalog is a named collection of reference entities of one kind (the
//! host's "compendium packs"). The [`Catalog`] trait is the collaborator the
//! importer searches; [`resolver::Resolver`] layers the import-scoped cache
//! on top of it.

use std::cell::Cell;

use serde::{Deserialize, Serialize};

use crate::entity::ReferenceEntity;
use crate::error::ErrorKind;
use crate::keys::EntityKind;

pub mod json;
pub mod resolver;

pub use json::JsonCatalog;
pub use resolver::{ImportCache, ResolvedEntity, Resolver};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "entity")]
    pub entity_type: EntityKind,
    /// Locked catalogs may be searched but their content is never cached.
    #[serde(default)]
    pub locked: bool,
}

/// One row of a catalog's index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub internal_id: String,
    pub import_id: Option<String>,
}

impl IndexEntry {
    pub fn for_entity(entity: &ReferenceEntity) -> Option<Self> {
        Some(Self {
            internal_id: entity.id()?.to_string(),
            import_id: entity.import_id().map(str::to_string),
        })
    }
}

pub trait Catalog {
    /// Catalog ids in enumeration order.
    fn list_catalogs(&self) -> Vec<String>;

    fn catalog_metadata(&self, catalog: &str) -> Option<CatalogMetadata>;

    fn catalog_index(&self, catalog: &str) -> Result<Vec<IndexEntry>, ErrorKind>;

    fn catalog_entity(&self, catalog: &str, internal_id: &str) -> Result<Option<ReferenceEntity>, ErrorKind>;

    /// Every entity in the catalog, in index order.
    fn catalog_content(&self, catalog: &str) -> Result<Vec<ReferenceEntity>, ErrorKind> {
        let mut content = Vec::new();
        for entry in self.catalog_index(catalog)? {
            if let Some(entity) = self.catalog_entity(catalog, &entry.internal_id)? {
                content.push(entity);
            }
        }
        Ok(content)
    }
}

struct MemoryCatalogEntry {
    id: String,
    metadata: CatalogMetadata,
    entities: Vec<ReferenceEntity>,
}

/// A [`Catalog`] held entirely in memory. Counts fetches so callers can
/// observe caching.
#[derive(Default)]
pub struct MemoryCatalog {
    catalogs: Vec<MemoryCatalogEntry>,
    index_fetches: Cell<usize>,
    content_fetches: Cell<usize>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty catalog. Catalogs enumerate in insertion order.
    pub fn add_catalog(&mut self, id: impl Into<String>, metadata: CatalogMetadata) {
        self.catalogs.push(MemoryCatalogEntry {
            id: id.into(),
            metadata,
            entities: Vec::new(),
        });
    }

    /// Add an entity to an existing catalog. Returns false if the catalog
    /// doesn't exist.
    pub fn add_entity(&mut self, catalog: &str, entity: ReferenceEntity) -> bool {
        match self.catalogs.iter_mut().find(|c| c.id == catalog) {
            Some(entry) => {
                entry.entities.push(entity);
                true
            }
            None => false,
        }
    }

    pub fn index_fetches(&self) -> usize {
        self.index_fetches.get()
    }

    pub fn content_fetches(&self) -> usize {
        self.content_fetches.get()
    }

    fn entry(&self, catalog: &str) -> Result<&MemoryCatalogEntry, ErrorKind> {
        self.catalogs
            .iter()
            .find(|c| c.id == catalog)
            .ok_or_else(|| ErrorKind::CatalogError {
                catalog: catalog.to_string(),
                detail: "no such catalog".to_string(),
            })
    }
}

impl Catalog for MemoryCatalog {
    fn list_catalogs(&self) -> Vec<String> {
        self.catalogs.iter().map(|c| c.id.clone()).collect()
    }

    fn catalog_metadata(&self, catalog: &str) -> Option<CatalogMetadata> {
        self.entry(catalog).ok().map(|c| c.metadata.clone())
    }

    fn catalog_index(&self, catalog: &str) -> Result<Vec<IndexEntry>, ErrorKind> {
        self.index_fetches.set(self.index_fetches.get() + 1);
        Ok(self
            .entry(catalog)?
            .entities
            .iter()
            .filter_map(IndexEntry::for_entity)
            .collect())
    }

    fn catalog_entity(&self, catalog: &str, internal_id: &str) -> Result<Option<ReferenceEntity>, ErrorKind> {
        Ok(self
            .entry(catalog)?
            .entities
            .iter()
            .find(|e| e.id() == Some(internal_id))
            .cloned())
    }

    fn catalog_content(&self, catalog: &str) -> Result<Vec<ReferenceEntity>, ErrorKind> {
        self.content_fetches.set(self.content_fetches.get() + 1);
        Ok(self.entry(catalog)?.entities.clone())
    }
}
