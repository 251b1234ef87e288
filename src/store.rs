//! Storage collaborators: where documents come from and where the catalog goes.
//!
//! The pipeline only knows the two traits below. [`FsDocumentSource`] and
//! [`JsonFileSink`] are the filesystem implementations used by the CLI; an
//! object-store backend implements the same traits.
//!
//! ## Keys
//!
//! Keys are `/`-separated paths relative to the store root, e.g.
//! `business/2024-3-7-6f1c….pdf`. Listing is recursive and returns keys in
//! lexicographic order, the same order an object store lists them in.

use crate::catalog::Catalog;
use crate::error::StoreError;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Source of candidate documents.
pub trait DocumentSource: Send + Sync {
    /// All keys starting with `prefix`, in enumeration order.
    fn list_keys(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Raw bytes of one document.
    fn fetch_bytes(&self, key: &str) -> impl Future<Output = Result<Vec<u8>, StoreError>> + Send;

    /// Move a document out of the unprocessed set.
    fn mark_processed(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Destination of the parsed catalog.
pub trait CatalogSink: Send + Sync {
    fn write_catalog(
        &self,
        catalog: &Catalog,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

// ── Filesystem source ────────────────────────────────────────────────────────

/// Documents stored as files under an "unprocessed" directory tree.
///
/// Marking a document processed moves it to the same relative path under
/// the "processed" directory.
#[derive(Debug, Clone)]
pub struct FsDocumentSource {
    unprocessed_root: PathBuf,
    processed_root: PathBuf,
}

impl FsDocumentSource {
    pub fn new(unprocessed_root: impl Into<PathBuf>, processed_root: impl Into<PathBuf>) -> Self {
        Self {
            unprocessed_root: unprocessed_root.into(),
            processed_root: processed_root.into(),
        }
    }

    pub fn unprocessed_root(&self) -> &Path {
        &self.unprocessed_root
    }

    pub fn processed_root(&self) -> &Path {
        &self.processed_root
    }
}

/// Map a key onto a path under `root`, rejecting anything that could escape it.
fn key_path(root: &Path, key: &str) -> Result<PathBuf, StoreError> {
    let malformed = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if malformed {
        return Err(StoreError::InvalidKey {
            key: key.to_string(),
        });
    }

    let mut path = root.to_path_buf();
    for seg in key.split('/') {
        path.push(seg);
    }
    Ok(path)
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl DocumentSource for FsDocumentSource {
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut pending = vec![(self.unprocessed_root.clone(), String::new())];

        while let Some((dir, rel)) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| io_err(&dir, e))?;

            while let Some(entry) = entries.next_entry().await.map_err(|e| io_err(&dir, e))? {
                let name = entry.file_name().to_string_lossy().into_owned();
                // Dotfiles include our own in-flight temp files
                if name.starts_with('.') {
                    continue;
                }
                let key = format!("{rel}{name}");
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| io_err(&entry.path(), e))?;

                if file_type.is_dir() {
                    let dir_key = format!("{key}/");
                    if dir_key.starts_with(prefix) || prefix.starts_with(&dir_key) {
                        pending.push((entry.path(), dir_key));
                    }
                } else if file_type.is_file() && key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        debug!("Listed {} keys under '{}'", keys.len(), prefix);
        Ok(keys)
    }

    async fn fetch_bytes(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = key_path(&self.unprocessed_root, key)?;
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StoreError::NotFound {
                    key: key.to_string(),
                }
            } else {
                io_err(&path, e)
            }
        })
    }

    async fn mark_processed(&self, key: &str) -> Result<(), StoreError> {
        let from = key_path(&self.unprocessed_root, key)?;
        let to = key_path(&self.processed_root, key)?;

        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(parent, e))?;
        }

        match tokio::fs::rename(&from, &to).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    key: key.to_string(),
                });
            }
            // Typically a cross-device move: fall back to copy + delete
            Err(_) => {
                tokio::fs::copy(&from, &to)
                    .await
                    .map_err(|e| io_err(&to, e))?;
                tokio::fs::remove_file(&from)
                    .await
                    .map_err(|e| io_err(&from, e))?;
            }
        }

        debug!("Marked '{}' processed", key);
        Ok(())
    }
}

// ── JSON file sink ───────────────────────────────────────────────────────────

/// Writes the catalog as pretty-printed JSON to a single file.
///
/// Uses atomic write (temp file + rename) so readers never see a partial file.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogSink for JsonFileSink {
    async fn write_catalog(&self, catalog: &Catalog) -> Result<(), StoreError> {
        let json = catalog.to_json_pretty()?;
        let path = &self.path;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| io_err(parent, e))?;
            }
        }

        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json.as_bytes())
            .await
            .map_err(|e| io_err(&tmp_path, e))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| io_err(path, e))?;

        info!("Wrote {} items to {}", catalog.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LineItem;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn seed(root: &Path, rel: &str, body: &[u8]) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn key_path_rejects_traversal() {
        let root = Path::new("/data");
        for bad in ["", "/etc/passwd", "../x.pdf", "a/../../x.pdf", "a//b.pdf", "a\\b.pdf", "./a.pdf"] {
            assert!(
                matches!(key_path(root, bad), Err(StoreError::InvalidKey { .. })),
                "{bad:?} should be rejected"
            );
        }
        assert_eq!(
            key_path(root, "business/a.pdf").unwrap(),
            PathBuf::from("/data/business/a.pdf")
        );
    }

    #[tokio::test]
    async fn list_is_recursive_sorted_and_prefixed() {
        let tmp = TempDir::new().unwrap();
        let unprocessed = tmp.path().join("unprocessed");
        seed(&unprocessed, "b.png", b"x");
        seed(&unprocessed, "a.pdf", b"x");
        seed(&unprocessed, "business/z.pdf", b"x");
        seed(&unprocessed, "business/m.pdf", b"x");
        seed(&unprocessed, ".DS_Store", b"x");

        let source = FsDocumentSource::new(&unprocessed, tmp.path().join("processed"));

        let all = source.list_keys("").await.unwrap();
        assert_eq!(all, vec!["a.pdf", "b.png", "business/m.pdf", "business/z.pdf"]);

        let business = source.list_keys("business/").await.unwrap();
        assert_eq!(business, vec!["business/m.pdf", "business/z.pdf"]);
    }

    #[tokio::test]
    async fn list_missing_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let source = FsDocumentSource::new(tmp.path().join("nope"), tmp.path().join("done"));
        assert!(matches!(
            source.list_keys("").await,
            Err(StoreError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn fetch_and_mark_processed_moves_file() {
        let tmp = TempDir::new().unwrap();
        let unprocessed = tmp.path().join("unprocessed");
        let processed = tmp.path().join("processed");
        seed(&unprocessed, "business/r1.pdf", b"%PDF-1.7");

        let source = FsDocumentSource::new(&unprocessed, &processed);
        assert_eq!(source.fetch_bytes("business/r1.pdf").await.unwrap(), b"%PDF-1.7");

        source.mark_processed("business/r1.pdf").await.unwrap();
        assert!(!unprocessed.join("business/r1.pdf").exists());
        assert!(processed.join("business/r1.pdf").exists());

        assert!(matches!(
            source.fetch_bytes("business/r1.pdf").await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            source.mark_processed("business/r1.pdf").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn json_sink_writes_atomically() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out/all-text.json");
        let sink = JsonFileSink::new(&path);

        let catalog = Catalog::from(vec![LineItem {
            name: "Widget".into(),
            size: "1 X 100GR".into(),
            uom: "EA".into(),
            price: Decimal::new(199, 2),
        }]);
        sink.write_catalog(&catalog).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let back: Catalog = serde_json::from_str(&written).unwrap();
        assert_eq!(back.items[0].name, "Widget");
        assert!(!path.with_extension("json.tmp").exists());
    }
}
