use thiserror::Error;

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
}

#[derive(Error, Debug)]
pub enum ErrorKind {
    /// The export document is not well-formed or is missing required structure.
    /// Fatal for the whole import.
    #[error("Parse error: {detail}")]
    ParseError { detail: String },
    /// A reference lookup found nothing. Callers log this and skip the
    /// enclosing item.
    #[error("No {kind} entity found for import id {import_id}")]
    ResolutionMiss { kind: String, import_id: String },
    /// Directory creation or upload failed. The asset is omitted.
    #[error("Asset error for {path}: {detail}")]
    AssetError { path: String, detail: String },
    /// The storage collaborator rejected the final create/update. Fatal.
    #[error("Failed to commit {kind} record: {detail}")]
    CommitError { kind: String, detail: String },
    #[error("Catalog {catalog} unavailable: {detail}")]
    CatalogError { catalog: String, detail: String },
    #[error("Error serializing or deserializing json: {err}")]
    SerdeJson {
        #[from]
        err: serde_json::Error,
    },
    #[error("Invalid base64 payload: {err}")]
    Base64Error {
        #[from]
        err: base64::DecodeError,
    },
    #[error("VFS error")]
    VfsError(#[from] vfs::VfsError),
    #[error("IO error")]
    IoError(#[from] std::io::Error),
}

impl ErrorKind {
    /// Whether this error must abort the whole import rather than a single
    /// phase or entry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorKind::ParseError { .. } | ErrorKind::CommitError { .. }
        )
    }
}

impl From<roxmltree::Error> for ErrorKind {
    fn from(e: roxmltree::Error) -> Self {
        ErrorKind::ParseError {
            detail: format!("{e}"),
        }
    }
}

impl From<roxmltree::Error> for Error {
    fn from(e: roxmltree::Error) -> Self {
        Self { kind: e.into() }
    }
}

impl std::convert::From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error { kind }
    }
}

impl std::convert::From<serde_json::Error> for Error {
    fn from(x: serde_json::Error) -> Error {
        Error { kind: x.into() }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.kind, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.kind)
    }
}

pub(crate) fn parse_error(detail: impl Into<String>) -> ErrorKind {
    ErrorKind::ParseError {
        detail: detail.into(),
    }
}
