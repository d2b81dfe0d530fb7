/// Validated persistence of uploaded images and documents
use crate::{
    config::StorageConfig,
    error::{MediaError, MediaResult},
    media::{
        policy::{
            declared_extension, random_file_stem, sanitize_category, RelativeMediaPath,
            UploadKind, DEFAULT_DOCUMENT_CATEGORY,
        },
        sandbox::PathSandbox,
        source::ChunkSource,
        spool::{spool_to_file, CommitMode},
    },
};
use std::sync::Arc;
use tokio::fs;

/// Outcome of a best-effort delete
///
/// Deletion is advisory cleanup; none of these outcomes is an error the
/// caller has to propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The file was removed
    Removed,
    /// Nothing to remove (empty path or file already gone)
    Missing,
    /// The path failed sandbox validation and was ignored
    Rejected,
    /// The filesystem refused the removal
    Failed,
}

/// Stores uploaded files under `uploads/<category>/` with random names
#[derive(Debug, Clone)]
pub struct UploadStore {
    sandbox: Arc<PathSandbox>,
    max_image_bytes: u64,
    max_document_bytes: u64,
}

impl UploadStore {
    pub fn new(sandbox: Arc<PathSandbox>, config: &StorageConfig) -> Self {
        Self {
            sandbox,
            max_image_bytes: config.max_image_bytes,
            max_document_bytes: config.max_document_bytes,
        }
    }

    /// Persist an image upload
    ///
    /// Only the extension of `filename` is kept; the on-disk name is random.
    pub async fn save_image(
        &self,
        source: &mut dyn ChunkSource,
        filename: &str,
        category: &str,
    ) -> MediaResult<RelativeMediaPath> {
        self.save(source, filename, category, UploadKind::Image, self.max_image_bytes)
            .await
    }

    /// Persist a document upload; a blank category means `documents`
    pub async fn save_document(
        &self,
        source: &mut dyn ChunkSource,
        filename: &str,
        category: &str,
    ) -> MediaResult<RelativeMediaPath> {
        let category = match sanitize_category(category) {
            c if c.is_empty() => DEFAULT_DOCUMENT_CATEGORY.to_string(),
            c => c,
        };
        self.save(
            source,
            filename,
            &category,
            UploadKind::Document,
            self.max_document_bytes,
        )
        .await
    }

    async fn save(
        &self,
        source: &mut dyn ChunkSource,
        filename: &str,
        category: &str,
        kind: UploadKind,
        max_bytes: u64,
    ) -> MediaResult<RelativeMediaPath> {
        if filename.trim().is_empty() {
            return Err(MediaError::InvalidInput("No file was sent".to_string()));
        }

        let extension = declared_extension(filename)
            .filter(|ext| kind.allows(ext))
            .ok_or_else(|| {
                MediaError::UnsupportedFormat(format!(
                    "Unsupported {} format: {}",
                    kind.label(),
                    filename
                ))
            })?;

        let category = sanitize_category(category);
        let dir = self.sandbox.ensure_subdir(&category).await?;
        let name = format!("{}{}", random_file_stem(), extension);
        let destination = dir.join(&name);

        let spooled = spool_to_file(source, &destination, max_bytes, CommitMode::Replace).await?;

        let path = RelativeMediaPath::in_category(&category, &name);
        tracing::info!(
            path = %path,
            size = spooled.size,
            kind = kind.label(),
            "Stored upload"
        );
        Ok(path)
    }

    /// Remove a stored file, never failing
    ///
    /// Paths that escape the storage root are ignored. A symlink is unlinked
    /// itself; its target is left alone.
    pub async fn delete(&self, relative: &str) -> DeleteOutcome {
        let relative = relative.trim();
        if relative.is_empty() {
            return DeleteOutcome::Missing;
        }

        let path = match self.sandbox.resolve_entry(relative).await {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(path = %relative, "Ignoring delete of invalid path: {}", e);
                return DeleteOutcome::Rejected;
            }
        };

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(path = %relative, "Deleted media file");
                DeleteOutcome::Removed
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DeleteOutcome::Missing,
            Err(e) => {
                tracing::warn!(path = %relative, "Failed to delete media file: {}", e);
                DeleteOutcome::Failed
            }
        }
    }

    /// Delete `previous` when an entity's stored path changed away from it
    ///
    /// Passing `current = None` releases the file of a deleted entity.
    pub async fn release_replaced(
        &self,
        previous: Option<&str>,
        current: Option<&str>,
    ) -> Option<DeleteOutcome> {
        let previous = previous.map(str::trim).filter(|p| !p.is_empty())?;
        if current.map(str::trim) == Some(previous) {
            return None;
        }
        Some(self.delete(previous).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MediaConfig;
    use crate::media::source::ReaderSource;
    use std::io::Cursor;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    fn store() -> (TempDir, UploadStore) {
        let dir = tempdir().unwrap();
        let config = MediaConfig::for_root(dir.path());
        let sandbox = Arc::new(PathSandbox::new(dir.path()).unwrap());
        let store = UploadStore::new(sandbox, &config.storage);
        (dir, store)
    }

    fn source(data: Vec<u8>) -> ReaderSource<Cursor<Vec<u8>>> {
        ReaderSource::new(Cursor::new(data))
    }

    fn png_bytes(len: usize) -> Vec<u8> {
        let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
        data.resize(len, 0xAB);
        data
    }

    fn files_in(dir: &Path) -> usize {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    #[tokio::test]
    async fn test_save_image_returns_random_name_with_extension() {
        let (dir, store) = store();
        let data = png_bytes(10 * 1024);

        let path = store
            .save_image(&mut source(data.clone()), "photo.PNG", "members")
            .await
            .unwrap();

        let (prefix, name) = path.as_str().rsplit_once('/').unwrap();
        assert_eq!(prefix, "uploads/members");
        let (stem, ext) = name.split_once('.').unwrap();
        assert_eq!(ext, "png");
        assert_eq!(stem.len(), 32);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit()));

        let stored = std::fs::read(dir.path().join(path.as_str())).unwrap();
        assert_eq!(stored, data);
    }

    #[tokio::test]
    async fn test_save_image_names_never_collide() {
        let (_dir, store) = store();

        let a = store
            .save_image(&mut source(png_bytes(64)), "same.png", "members")
            .await
            .unwrap();
        let b = store
            .save_image(&mut source(png_bytes(64)), "same.png", "members")
            .await
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_save_image_at_ceiling_succeeds() {
        let (_dir, store) = store();

        let result = store
            .save_image(&mut source(png_bytes(512 * 1024)), "max.jpg", "members")
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_save_image_too_large_writes_nothing() {
        let (dir, store) = store();

        let err = store
            .save_image(&mut source(png_bytes(512 * 1024 + 1)), "big.png", "members")
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::PayloadTooLarge { max } if max == 512 * 1024));
        assert_eq!(files_in(&dir.path().join("uploads/members")), 0);
    }

    #[tokio::test]
    async fn test_save_image_rejects_unsupported_extension() {
        let (dir, store) = store();

        for name in ["image.bmp", "doc.pdf", "noext", "archive.png.exe"] {
            let err = store
                .save_image(&mut source(png_bytes(16)), name, "members")
                .await
                .unwrap_err();
            assert!(matches!(err, MediaError::UnsupportedFormat(_)), "{}", name);
        }
        assert!(!dir.path().join("uploads").exists());
    }

    #[tokio::test]
    async fn test_save_image_requires_filename() {
        let (_dir, store) = store();

        let err = store
            .save_image(&mut source(png_bytes(16)), "  ", "members")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_save_image_empty_stream() {
        let (_dir, store) = store();

        let err = store
            .save_image(&mut source(Vec::new()), "empty.png", "members")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::EmptyPayload));
    }

    #[tokio::test]
    async fn test_save_image_sanitizes_category() {
        let (dir, store) = store();

        let path = store
            .save_image(&mut source(png_bytes(16)), "a.gif", "../../trails/")
            .await
            .unwrap();

        assert!(path.as_str().starts_with("uploads/trails/"));
        assert!(dir.path().join(path.as_str()).is_file());
    }

    #[tokio::test]
    async fn test_save_document_defaults_category() {
        let (_dir, store) = store();

        let path = store
            .save_document(&mut source(b"%PDF-1.4".to_vec()), "Report.PDF", "")
            .await
            .unwrap();
        assert!(path.as_str().starts_with("uploads/documents/"));
        assert!(path.as_str().ends_with(".pdf"));
    }

    #[tokio::test]
    async fn test_save_document_allows_larger_payloads() {
        let (_dir, store) = store();

        let path = store
            .save_document(&mut source(vec![b'a'; 600 * 1024]), "notes.txt", "minutes")
            .await
            .unwrap();
        assert!(path.as_str().starts_with("uploads/minutes/"));

        let err = store
            .save_document(&mut source(vec![0u8; 16]), "photo.png", "documents")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_file() {
        let (dir, store) = store();
        let path = store
            .save_image(&mut source(png_bytes(16)), "a.png", "members")
            .await
            .unwrap();

        assert_eq!(store.delete(path.as_str()).await, DeleteOutcome::Removed);
        assert!(!dir.path().join(path.as_str()).exists());
        assert_eq!(store.delete(path.as_str()).await, DeleteOutcome::Missing);
    }

    #[tokio::test]
    async fn test_delete_outside_root_is_noop() {
        let outside = tempdir().unwrap();
        let victim = outside.path().join("victim.txt");
        std::fs::write(&victim, b"keep me").unwrap();

        let (_dir, store) = store();
        let escape = format!("../../../../../../../..{}", victim.display());

        assert_eq!(store.delete(&escape).await, DeleteOutcome::Rejected);
        assert_eq!(
            store.delete(&victim.display().to_string()).await,
            DeleteOutcome::Rejected
        );
        assert_eq!(store.delete("").await, DeleteOutcome::Missing);
        assert!(victim.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_delete_unlinks_symlink_not_target() {
        let (dir, store) = store();
        let target = store
            .save_image(&mut source(png_bytes(16)), "kept.png", "members")
            .await
            .unwrap();
        let link = dir.path().join("uploads/members/alias.png");
        std::os::unix::fs::symlink(dir.path().join(target.as_str()), &link).unwrap();

        assert_eq!(
            store.delete("uploads/members/alias.png").await,
            DeleteOutcome::Removed
        );
        assert!(std::fs::symlink_metadata(&link).is_err());
        assert!(dir.path().join(target.as_str()).is_file());
    }

    #[tokio::test]
    async fn test_release_replaced() {
        let (dir, store) = store();
        let old = store
            .save_image(&mut source(png_bytes(16)), "old.png", "members")
            .await
            .unwrap();
        let new = store
            .save_image(&mut source(png_bytes(16)), "new.png", "members")
            .await
            .unwrap();

        assert_eq!(
            store
                .release_replaced(Some(new.as_str()), Some(new.as_str()))
                .await,
            None
        );
        assert_eq!(store.release_replaced(None, Some(new.as_str())).await, None);
        assert_eq!(
            store
                .release_replaced(Some(old.as_str()), Some(new.as_str()))
                .await,
            Some(DeleteOutcome::Removed)
        );
        assert!(!dir.path().join(old.as_str()).exists());
        assert!(dir.path().join(new.as_str()).exists());
    }
}
