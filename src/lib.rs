/// Binary asset extraction, type sniffing and upload
pub mod assets;
/// Reference entity catalogs and the import-scoped resolver
pub mod catalog;
/// Canonical character records and the phase-by-phase assembler
pub mod character;
/// Opaque reference entities as stored by the host
pub mod entity;
/// Error definitions
pub mod error;
/// Flattening of nested entity data into dotted-path updates
pub mod flatten;
/// Top-level import entry point and import-scoped state
pub mod importer;
/// Field names and entity kinds used by the host's entity documents
pub mod keys;
/// Attribute modifiers and the builders that derive them from export data
pub mod modifiers;
/// Import configuration
pub mod options;
/// Typed view of a character export, decoded from the normalized tree
pub mod sheet;
/// Canonical skill and characteristic tables
pub mod skills;
/// Entity storage collaborator
pub mod storage;
/// Normalization of export markup into a generic tree
pub mod xml;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, ErrorKind};
pub use importer::{ImportOutcome, Importer};
pub use options::ImportOptions;
