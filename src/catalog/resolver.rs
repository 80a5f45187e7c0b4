use std::collections::HashMap;

use tracing::{debug, warn};

use crate::catalog::{Catalog, CatalogMetadata, IndexEntry};
use crate::entity::ReferenceEntity;
use crate::keys::EntityKind;
use crate::storage::EntityStore;

/// Catalog content fetched during one import.
///
/// Only unlocked catalogs are cached. Content is keyed by import id; when a
/// catalog holds the same import id twice the first entity wins.
#[derive(Debug, Default)]
pub struct ImportCache {
    content: HashMap<String, HashMap<String, ReferenceEntity>>,
    indexes: HashMap<String, Vec<IndexEntry>>,
}

impl ImportCache {
    pub fn clear(&mut self) {
        self.content.clear();
        self.indexes.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.indexes.is_empty()
    }

    pub fn is_cached(&self, catalog: &str) -> bool {
        self.content.contains_key(catalog)
    }
}

/// A resolved reference entity and where it came from. `catalog` is `None`
/// for entities found in local storage.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedEntity {
    pub catalog: Option<String>,
    pub entity: ReferenceEntity,
}

/// Looks up reference entities by import id or internal id, local storage
/// first and then catalogs in enumeration order.
///
/// Every entity handed out is a clone; callers may customize it freely.
pub struct Resolver<'a> {
    catalog: &'a dyn Catalog,
    store: &'a dyn EntityStore,
    cache: &'a mut ImportCache,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a dyn Catalog, store: &'a dyn EntityStore, cache: &'a mut ImportCache) -> Self {
        Self { catalog, store, cache }
    }

    pub fn find_local_by_import_id(&self, kind: EntityKind, import_id: &str) -> Option<ReferenceEntity> {
        self.store.find_by_import_id(kind, import_id)
    }

    pub fn find_by_import_id(
        &mut self,
        kind: EntityKind,
        import_id: &str,
        catalog_hint: Option<&str>,
    ) -> Option<ResolvedEntity> {
        if let Some(entity) = self.find_local_by_import_id(kind, import_id) {
            return Some(ResolvedEntity { catalog: None, entity });
        }

        let catalogs = match catalog_hint {
            Some(hint) => vec![hint.to_string()],
            None => self.catalog.list_catalogs(),
        };

        for catalog in catalogs {
            let Some(metadata) = self.catalog.catalog_metadata(&catalog) else {
                debug!("catalog {catalog} has no metadata, skipping");
                continue;
            };
            if metadata.entity_type != kind {
                continue;
            }

            if let Some(entity) = self.search_catalog(&catalog, &metadata, import_id) {
                return Some(ResolvedEntity {
                    catalog: Some(catalog),
                    entity,
                });
            }
        }

        debug!("no {kind} entity with import id {import_id}");
        None
    }

    fn search_catalog(&mut self, catalog: &str, metadata: &CatalogMetadata, import_id: &str) -> Option<ReferenceEntity> {
        if metadata.locked {
            return match self.catalog.catalog_content(catalog) {
                Ok(content) => content.into_iter().find(|e| e.import_id() == Some(import_id)),
                Err(e) => {
                    warn!("failed to search locked catalog {catalog}: {e}");
                    None
                }
            };
        }

        if !self.cache.is_cached(catalog) {
            debug!("caching catalog content {catalog}");
            let content = match self.catalog.catalog_content(catalog) {
                Ok(content) => content,
                Err(e) => {
                    warn!("failed to fetch catalog {catalog}: {e}");
                    return None;
                }
            };
            let by_import_id = self.cache.content.entry(catalog.to_string()).or_default();
            for entity in content {
                if let Some(id) = entity.import_id().map(str::to_string) {
                    by_import_id.entry(id).or_insert(entity);
                }
            }
        } else {
            debug!("using cached content for {catalog}");
        }

        self.cache
            .content
            .get(catalog)
            .and_then(|by_import_id| by_import_id.get(import_id))
            .cloned()
    }

    /// Resolve by catalog-internal id, as talent slots reference their
    /// templates.
    pub fn find_by_id(&mut self, kind: EntityKind, id: &str) -> Option<ReferenceEntity> {
        for catalog in self.catalog.list_catalogs() {
            let Some(metadata) = self.catalog.catalog_metadata(&catalog) else {
                continue;
            };
            if metadata.entity_type != kind {
                continue;
            }

            if let Some(entity) = self
                .cache
                .content
                .get(&catalog)
                .and_then(|content| content.values().find(|e| e.id() == Some(id)))
            {
                return Some(entity.clone());
            }

            if !self.cache.indexes.contains_key(&catalog) {
                match self.catalog.catalog_index(&catalog) {
                    Ok(index) => {
                        self.cache.indexes.insert(catalog.clone(), index);
                    }
                    Err(e) => {
                        warn!("failed to fetch index of catalog {catalog}: {e}");
                        continue;
                    }
                }
            }

            let listed = self
                .cache
                .indexes
                .get(&catalog)
                .is_some_and(|index| index.iter().any(|entry| entry.internal_id == id));
            if !listed {
                continue;
            }

            match self.catalog.catalog_entity(&catalog, id) {
                Ok(Some(entity)) => return Some(entity),
                Ok(None) => debug!("catalog {catalog} lists {id} but has no such entity"),
                Err(e) => warn!("failed to fetch {id} from catalog {catalog}: {e}"),
            }
        }

        debug!("no {kind} entity with id {id}");
        None
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::storage::MemoryStore;

    fn entity(id: &str, import_id: &str, name: &str) -> ReferenceEntity {
        ReferenceEntity::from_value(json!({
            "_id": id,
            "name": name,
            "type": "species",
            "flags": { "ffgimportid": import_id },
            "data": { "attributes": {} }
        }))
        .unwrap()
    }

    fn metadata(kind: EntityKind, locked: bool) -> CatalogMetadata {
        CatalogMetadata {
            name: String::new(),
            entity_type: kind,
            locked,
        }
    }

    fn two_catalogs() -> MemoryCatalog {
        let mut catalog = MemoryCatalog::new();
        catalog.add_catalog("core", metadata(EntityKind::Item, false));
        catalog.add_catalog("expansion", metadata(EntityKind::Item, false));
        catalog.add_catalog("journal", metadata(EntityKind::JournalEntry, false));
        catalog.add_entity("core", entity("c1", "HUMAN", "Human (Core)"));
        catalog.add_entity("expansion", entity("e1", "HUMAN", "Human (Expansion)"));
        catalog.add_entity("expansion", entity("e2", "DROID", "Droid"));
        catalog.add_entity("journal", entity("j1", "WOOKIEE", "Wookiee"));
        catalog
    }

    #[test]
    fn duplicate_import_id_resolves_to_first_catalog() {
        let catalog = two_catalogs();
        let store = MemoryStore::new();
        let mut cache = ImportCache::default();
        let mut resolver = Resolver::new(&catalog, &store, &mut cache);

        let resolved = resolver.find_by_import_id(EntityKind::Item, "HUMAN", None).unwrap();
        assert_eq!(resolved.catalog.as_deref(), Some("core"));
        assert_eq!(resolved.entity.name(), Some("Human (Core)"));
        // The scan stops at the first match
        assert!(!cache.is_cached("expansion"));
    }

    #[test]
    fn content_is_fetched_once_per_import() {
        let catalog = two_catalogs();
        let store = MemoryStore::new();
        let mut cache = ImportCache::default();
        let mut resolver = Resolver::new(&catalog, &store, &mut cache);

        assert!(resolver.find_by_import_id(EntityKind::Item, "DROID", None).is_some());
        assert!(resolver.find_by_import_id(EntityKind::Item, "DROID", None).is_some());
        assert!(resolver.find_by_import_id(EntityKind::Item, "HUMAN", None).is_some());
        assert_eq!(catalog.content_fetches(), 2);
    }

    #[test]
    fn type_mismatch_and_miss() {
        let catalog = two_catalogs();
        let store = MemoryStore::new();
        let mut cache = ImportCache::default();
        let mut resolver = Resolver::new(&catalog, &store, &mut cache);

        assert!(resolver.find_by_import_id(EntityKind::Item, "WOOKIEE", None).is_none());
        assert!(resolver.find_by_import_id(EntityKind::JournalEntry, "WOOKIEE", None).is_some());
        assert!(resolver.find_by_import_id(EntityKind::Item, "NOPE", None).is_none());
    }

    #[test]
    fn catalog_hint_limits_search() {
        let catalog = two_catalogs();
        let store = MemoryStore::new();
        let mut cache = ImportCache::default();
        let mut resolver = Resolver::new(&catalog, &store, &mut cache);

        let resolved = resolver
            .find_by_import_id(EntityKind::Item, "HUMAN", Some("expansion"))
            .unwrap();
        assert_eq!(resolved.entity.id(), Some("e1"));
        assert!(resolver.find_by_import_id(EntityKind::Item, "HUMAN", Some("missing")).is_none());
    }

    #[test]
    fn local_entities_take_precedence() {
        let catalog = two_catalogs();
        let mut store = MemoryStore::new();
        store.insert(EntityKind::Item, entity("local1", "HUMAN", "Human (Local)"));
        let mut cache = ImportCache::default();
        let mut resolver = Resolver::new(&catalog, &store, &mut cache);

        let resolved = resolver.find_by_import_id(EntityKind::Item, "HUMAN", None).unwrap();
        assert_eq!(resolved.catalog, None);
        assert_eq!(resolved.entity.name(), Some("Human (Local)"));
        assert_eq!(catalog.content_fetches(), 0);
    }

    #[test]
    fn locked_catalogs_are_searched_not_cached() {
        let mut catalog = MemoryCatalog::new();
        catalog.add_catalog("locked", metadata(EntityKind::Item, true));
        catalog.add_entity("locked", entity("l1", "HUMAN", "Human"));
        let store = MemoryStore::new();
        let mut cache = ImportCache::default();
        let mut resolver = Resolver::new(&catalog, &store, &mut cache);

        assert!(resolver.find_by_import_id(EntityKind::Item, "HUMAN", None).is_some());
        assert!(resolver.find_by_import_id(EntityKind::Item, "HUMAN", None).is_some());
        assert_eq!(catalog.content_fetches(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn resolved_entities_are_copies() {
        let catalog = two_catalogs();
        let store = MemoryStore::new();
        let mut cache = ImportCache::default();
        let mut resolver = Resolver::new(&catalog, &store, &mut cache);

        let mut first = resolver.find_by_import_id(EntityKind::Item, "DROID", None).unwrap();
        first.entity.set_quantity(5);
        let second = resolver.find_by_import_id(EntityKind::Item, "DROID", None).unwrap();
        assert!(second.entity.lookup(&["data", "quantity"]).is_none());
    }

    #[test]
    fn find_by_internal_id() {
        let catalog = two_catalogs();
        let store = MemoryStore::new();
        let mut cache = ImportCache::default();
        let mut resolver = Resolver::new(&catalog, &store, &mut cache);

        let droid = resolver.find_by_id(EntityKind::Item, "e2").unwrap();
        assert_eq!(droid.import_id(), Some("DROID"));
        assert!(resolver.find_by_id(EntityKind::Item, "j1").is_none());
        assert!(resolver.find_by_id(EntityKind::Item, "missing").is_none());

        // Indexes are fetched once per catalog
        let fetches = catalog.index_fetches();
        resolver.find_by_id(EntityKind::Item, "e2");
        assert_eq!(catalog.index_fetches(), fetches);
    }
}
