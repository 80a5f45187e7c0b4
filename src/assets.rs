//! Binary asset extraction, type sniffing and upload.

use std::collections::HashSet;
use std::io::{Read, Write};

use itertools::Itertools;
use tracing::{debug, warn};
use vfs::VfsPath;

use crate::error::ErrorKind;

/// The host's file storage.
pub trait AssetHost {
    /// Create the directory `path` under the storage root `root`. The parent
    /// must already exist.
    fn ensure_directory(&mut self, root: &str, path: &str) -> Result<(), ErrorKind>;

    fn upload(&mut self, root: &str, path: &str, filename: &str, bytes: &[u8], mime: &str) -> Result<(), ErrorKind>;
}

/// An [`AssetHost`] writing into a [`VfsPath`]: a physical directory for the
/// CLI, or a `MemoryFS` in tests. Each storage root is a subdirectory.
pub struct VfsAssetHost {
    root: VfsPath,
}

impl VfsAssetHost {
    pub fn new(root: VfsPath) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &VfsPath {
        &self.root
    }

    fn source(&self, root: &str) -> Result<VfsPath, ErrorKind> {
        let source = self.root.join(root)?;
        if !source.exists()? {
            source.create_dir_all()?;
        }
        Ok(source)
    }
}

impl AssetHost for VfsAssetHost {
    fn ensure_directory(&mut self, root: &str, path: &str) -> Result<(), ErrorKind> {
        let dir = self.source(root)?.join(path)?;
        if dir.exists()? {
            return Ok(());
        }
        dir.create_dir()?;
        Ok(())
    }

    fn upload(&mut self, root: &str, path: &str, filename: &str, bytes: &[u8], mime: &str) -> Result<(), ErrorKind> {
        let dir = self.source(root)?.join(path)?;
        if !dir.is_dir()? {
            return Err(ErrorKind::AssetError {
                path: dir.as_str().to_string(),
                detail: "destination directory does not exist".to_string(),
            });
        }
        debug!("writing {filename} ({} bytes, {mime:?}) to {}", bytes.len(), dir.as_str());
        dir.join(filename)?.create_file()?.write_all(bytes)?;
        Ok(())
    }
}

/// Media type for a file's leading bytes, or `""` when unrecognized.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    let Some(header) = bytes.get(..4) else {
        return "";
    };
    match hex::encode(header).as_str() {
        "89504e47" => "image/png",
        "47494638" => "image/gif",
        "ffd8ffe0" | "ffd8ffe1" | "ffd8ffe2" | "ffd8ffe3" | "ffd8ffe8" => "image/jpeg",
        "52494646" => "image/webp",
        "3c3f786d" | "3c737667" => "image/svg+xml",
        _ => "",
    }
}

/// Destination paths already stored during the current import.
#[derive(Debug, Default)]
pub struct StoredAssets(HashSet<String>);

impl StoredAssets {
    pub fn contains(&self, path: &str) -> bool {
        self.0.contains(path)
    }

    pub fn insert(&mut self, path: String) -> bool {
        self.0.insert(path)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Stores assets through an [`AssetHost`], uploading each destination path at
/// most once per import.
pub struct AssetImporter<'a> {
    host: &'a mut dyn AssetHost,
    stored: &'a mut StoredAssets,
    source: &'a str,
}

impl<'a> AssetImporter<'a> {
    pub fn new(host: &'a mut dyn AssetHost, stored: &'a mut StoredAssets, source: &'a str) -> Self {
        Self { host, stored, source }
    }

    /// Create every directory along `path`, outermost first. Directories that
    /// already exist are fine; any failure is only logged since the upload
    /// will report a directory that is really missing.
    pub fn ensure_path(&mut self, path: &str) {
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);
            if let Err(e) = self.host.ensure_directory(self.source, &current) {
                debug!("error verifying path {}/{current}: {e}", self.source);
            }
        }
    }

    /// Upload `bytes` as `<directory>/<filename>` and return that path.
    ///
    /// The media type is sniffed from the content, falling back to
    /// `default_mime` when unrecognized.
    pub fn store_bytes(
        &mut self,
        directory: &str,
        filename: &str,
        bytes: &[u8],
        default_mime: &str,
    ) -> Result<String, ErrorKind> {
        let directory = directory.trim_matches('/');
        let stored_path = format!("{directory}/{filename}");
        if self.stored.contains(&stored_path) {
            debug!("{stored_path} already stored during this import");
            return Ok(stored_path);
        }

        let mime = match sniff_mime(bytes) {
            "" => {
                debug!("unrecognized file signature for {filename}");
                default_mime
            }
            mime => mime,
        };

        self.ensure_path(directory);
        self.host
            .upload(self.source, directory, filename, bytes, mime)
            .map_err(|e| ErrorKind::AssetError {
                path: stored_path.clone(),
                detail: e.to_string(),
            })?;

        self.stored.insert(stored_path.clone());
        Ok(stored_path)
    }

    /// Copy the archive member `path_in_archive` into `destination`, keeping
    /// its file name.
    pub fn extract_and_store(
        &mut self,
        path_in_archive: &str,
        archive: &VfsPath,
        destination: &str,
    ) -> Result<String, ErrorKind> {
        let filename = path_in_archive
            .rsplit(['/', '\\'])
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ErrorKind::AssetError {
                path: path_in_archive.to_string(),
                detail: "archive path has no file name".to_string(),
            })?;

        let stored_path = format!("{}/{filename}", destination.trim_matches('/'));
        if self.stored.contains(&stored_path) {
            return Ok(stored_path);
        }

        let bytes = read_member(archive, path_in_archive).map_err(|e| {
            warn!("error reading {path_in_archive} from archive: {e}");
            ErrorKind::AssetError {
                path: path_in_archive.to_string(),
                detail: e.to_string(),
            }
        })?;
        self.store_bytes(destination, filename, &bytes, "")
    }
}

fn read_member(archive: &VfsPath, path: &str) -> Result<Vec<u8>, ErrorKind> {
    let mut bytes = Vec::new();
    archive
        .join(path.trim_start_matches('/'))?
        .open_file()?
        .read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// The archive member holding the image for an item, matched by the export's
/// `<kind>Images/<item_type><key>` naming.
pub fn find_image_member(archive: &VfsPath, kind: &str, item_type: &str, key: &str) -> Option<String> {
    let needle = format!("{kind}Images/{item_type}{key}");
    archive
        .walk_dir()
        .ok()?
        .filter_map(Result::ok)
        .filter(|path| path.as_str().contains(&needle))
        .map(|path| path.as_str().trim_start_matches('/').to_string())
        .sorted()
        .next()
}
