//! Top-level import entry point.
//!
//! [`Importer::import_character`] owns the state scoped to one import (the
//! catalog cache and the uploaded-asset set), runs the assembler and commits
//! the result. That state is cleared when the import returns, whether it
//! succeeded or not.

use std::ops::{Deref, DerefMut};

use serde_json::Value;
use tracing::{error, info};

use crate::assets::{AssetHost, AssetImporter, StoredAssets};
use crate::catalog::{Catalog, ImportCache, Resolver};
use crate::character::{Assembler, CharacterRecord, ImportProgress};
use crate::error::{Error, ErrorKind};
use crate::flatten::build_update_data;
use crate::keys::EntityKind;
use crate::options::ImportOptions;
use crate::sheet::CharacterSheet;
use crate::skills::SkillTable;
use crate::storage::EntityStore;
use crate::xml;

/// State that lives for exactly one import.
#[derive(Debug, Default)]
pub struct ImportContext {
    pub cache: ImportCache,
    pub stored_assets: StoredAssets,
}

impl ImportContext {
    pub fn clear(&mut self) {
        self.cache.clear();
        self.stored_assets.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty() && self.stored_assets.is_empty()
    }
}

/// Clears the context when dropped.
struct ContextGuard<'c>(&'c mut ImportContext);

impl<'c> ContextGuard<'c> {
    fn new(context: &'c mut ImportContext) -> Self {
        context.clear();
        Self(context)
    }
}

impl Deref for ContextGuard<'_> {
    type Target = ImportContext;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl DerefMut for ContextGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        self.0.clear();
    }
}

#[derive(Clone, Debug)]
pub struct ImportOutcome {
    /// Storage id of the committed record.
    pub id: String,
    /// False when an existing record was updated.
    pub created: bool,
    pub record: CharacterRecord,
}

pub struct Importer<'a> {
    catalog: &'a dyn Catalog,
    store: &'a mut dyn EntityStore,
    assets: &'a mut dyn AssetHost,
    skills: &'a SkillTable,
    options: &'a ImportOptions,
    context: ImportContext,
}

impl<'a> Importer<'a> {
    pub fn new(
        catalog: &'a dyn Catalog,
        store: &'a mut dyn EntityStore,
        assets: &'a mut dyn AssetHost,
        skills: &'a SkillTable,
        options: &'a ImportOptions,
    ) -> Self {
        Self {
            catalog,
            store,
            assets,
            skills,
            options,
            context: ImportContext::default(),
        }
    }

    pub fn context(&self) -> &ImportContext {
        &self.context
    }

    /// Import a character from raw file contents.
    pub fn import_bytes(&mut self, bytes: &[u8], progress: &mut dyn ImportProgress) -> Result<ImportOutcome, Error> {
        let sheet = xml::normalize_bytes(bytes).and_then(|tree| CharacterSheet::decode(&tree));
        self.import_sheet(sheet, progress)
    }

    /// Import a character export, creating its record or updating the one
    /// previously imported from the same export key.
    ///
    /// Only a malformed document or a failed commit is an error; anything
    /// else that goes wrong is logged and the affected part is left out.
    pub fn import_character(&mut self, xml: &str, progress: &mut dyn ImportProgress) -> Result<ImportOutcome, Error> {
        self.import_sheet(CharacterSheet::parse(xml), progress)
    }

    fn import_sheet(
        &mut self,
        sheet: Result<CharacterSheet, ErrorKind>,
        progress: &mut dyn ImportProgress,
    ) -> Result<ImportOutcome, Error> {
        let result = self.run_import(sheet, progress);
        if let Err(e) = &result {
            error!("error while importing character: {e}");
        }
        result
    }

    fn run_import(
        &mut self,
        sheet: Result<CharacterSheet, ErrorKind>,
        progress: &mut dyn ImportProgress,
    ) -> Result<ImportOutcome, Error> {
        let mut context = ContextGuard::new(&mut self.context);
        let sheet = sheet?;

        let record = {
            let ImportContext { cache, stored_assets } = &mut *context;
            let resolver = Resolver::new(self.catalog, &*self.store, cache);
            let assets = AssetImporter::new(&mut *self.assets, stored_assets, self.options.asset_source());
            Assembler::new(resolver, assets, self.skills, self.options, progress).assemble(&sheet)
        };

        let outcome = commit(&mut *self.store, self.options, record)?;
        progress.report(100);
        Ok(outcome)
    }
}

fn as_commit_error(err: ErrorKind) -> ErrorKind {
    match err {
        err @ ErrorKind::CommitError { .. } => err,
        other => ErrorKind::CommitError {
            kind: EntityKind::Actor.to_string(),
            detail: other.to_string(),
        },
    }
}

fn commit(
    store: &mut dyn EntityStore,
    options: &ImportOptions,
    mut record: CharacterRecord,
) -> Result<ImportOutcome, ErrorKind> {
    let existing = store
        .find_by_import_id(EntityKind::Actor, record.import_id())
        .and_then(|actor| actor.id().map(str::to_string));

    match existing {
        Some(id) => {
            record.id = Some(id.clone());
            let document = record.to_value().map_err(as_commit_error)?;
            let update = if options.partial_update() {
                Value::Object(build_update_data(&document))
            } else {
                document
            };
            store
                .update_entity(EntityKind::Actor, &id, update)
                .map_err(as_commit_error)?;
            info!("updated character {} ({id})", record.name);
            Ok(ImportOutcome {
                id,
                created: false,
                record,
            })
        }
        None => {
            let document = record.to_value().map_err(as_commit_error)?;
            let id = store
                .create_entity(EntityKind::Actor, document)
                .map_err(as_commit_error)?;
            record.id = Some(id.clone());
            info!("created character {} ({id})", record.name);
            Ok(ImportOutcome {
                id,
                created: true,
                record,
            })
        }
    }
}
