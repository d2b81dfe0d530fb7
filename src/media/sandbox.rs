/// Storage root containment
///
/// Every path the subsystem reads, writes or deletes goes through
/// [`PathSandbox::resolve`], which checks containment on the canonicalized
/// path so symlinks cannot be used to step outside the root.
use crate::{
    error::{MediaError, MediaResult},
    media::policy::{sanitize_category, UPLOADS_DIR},
};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Resolves caller paths against a fixed, canonical storage root
#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: PathBuf,
}

impl PathSandbox {
    /// Create a sandbox for an existing directory
    pub fn new(root: &Path) -> MediaResult<Self> {
        let root = root.canonicalize().map_err(|e| {
            MediaError::StorageUnavailable(format!(
                "Cannot canonicalize storage root {}: {}",
                root.display(),
                e
            ))
        })?;

        if !root.is_dir() {
            return Err(MediaError::StorageUnavailable(format!(
                "Storage root is not a directory: {}",
                root.display()
            )));
        }

        Ok(Self { root })
    }

    /// Canonical storage root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a root-relative path to an absolute path inside the root
    ///
    /// The target does not need to exist. Fails with `InvalidPath` on `..`
    /// segments, absolute paths, or any resolution that lands outside the root.
    pub async fn resolve(&self, relative: &str) -> MediaResult<PathBuf> {
        let normalized = Self::normalize(relative)?;
        self.contain(relative, &self.root.join(normalized)).await
    }

    /// Resolve a path like [`resolve`](Self::resolve) but leave the last
    /// component unresolved
    ///
    /// The parent directory is canonicalized and checked for containment; the
    /// entry itself is returned as named, so a symlink stays a symlink. Used
    /// when acting on the directory entry rather than its target.
    pub async fn resolve_entry(&self, relative: &str) -> MediaResult<PathBuf> {
        let mut normalized = Self::normalize(relative)?;
        let name = normalized
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| MediaError::InvalidPath(relative.trim().to_string()))?;
        normalized.pop();

        let mut parent = self.contain(relative, &self.root.join(normalized)).await?;
        parent.push(name);
        Ok(parent)
    }

    /// Lexically validate a root-relative path, keeping only its normal components
    fn normalize(relative: &str) -> MediaResult<PathBuf> {
        let relative = relative.trim();
        if relative.is_empty() {
            return Err(MediaError::InvalidInput("Path is empty".to_string()));
        }
        if relative.contains('\0') {
            return Err(MediaError::InvalidPath(relative.to_string()));
        }

        let candidate = Path::new(relative);
        for component in candidate.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(MediaError::InvalidPath(relative.to_string()));
                }
            }
        }
        if relative.starts_with('\\') || relative.split(['/', '\\']).any(|s| s == "..") {
            return Err(MediaError::InvalidPath(relative.to_string()));
        }

        Ok(candidate
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect())
    }

    /// Canonicalize `joined` and require it to stay under the root
    async fn contain(&self, relative: &str, joined: &Path) -> MediaResult<PathBuf> {
        let resolved = self.canonicalize_existing_prefix(joined).await?;

        if !resolved.starts_with(&self.root) {
            tracing::warn!(
                path = %relative.trim(),
                resolved = %resolved.display(),
                "Rejected path escaping storage root"
            );
            return Err(MediaError::InvalidPath(relative.trim().to_string()));
        }

        Ok(resolved)
    }

    /// Sanitize `category` and make sure `uploads/<category>` exists
    ///
    /// Safe to call concurrently for the same category.
    pub async fn ensure_subdir(&self, category: &str) -> MediaResult<PathBuf> {
        let category = sanitize_category(category);
        if category.is_empty() {
            return Err(MediaError::InvalidInput("Category is empty".to_string()));
        }

        let dir = self
            .resolve(&format!("{}/{}", UPLOADS_DIR, category))
            .await?;

        match fs::create_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => {}
            Err(e) => {
                return Err(MediaError::Io(e));
            }
        }

        // Re-check now that every component exists and can be canonicalized.
        let dir = fs::canonicalize(&dir).await?;
        if !dir.starts_with(&self.root) {
            return Err(MediaError::InvalidPath(category));
        }

        Ok(dir)
    }

    /// Root-relative, forward-slash form of an absolute path inside the root
    pub fn relative_of(&self, absolute: &Path) -> MediaResult<String> {
        let stripped = absolute
            .strip_prefix(&self.root)
            .map_err(|_| MediaError::InvalidPath(absolute.display().to_string()))?;

        let parts = stripped
            .components()
            .map(|c| match c {
                Component::Normal(part) => part
                    .to_str()
                    .map(str::to_string)
                    .ok_or_else(|| MediaError::InvalidPath(absolute.display().to_string())),
                _ => Err(MediaError::InvalidPath(absolute.display().to_string())),
            })
            .collect::<MediaResult<Vec<_>>>()?;

        Ok(parts.join("/"))
    }

    /// Canonicalize the deepest existing ancestor of `path` and re-append the rest
    async fn canonicalize_existing_prefix(&self, path: &Path) -> MediaResult<PathBuf> {
        let mut existing = path.to_path_buf();
        let mut missing = Vec::new();

        loop {
            match fs::symlink_metadata(&existing).await {
                Ok(_) => break,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    let name = existing
                        .file_name()
                        .map(|n| n.to_os_string())
                        .ok_or_else(|| MediaError::InvalidPath(path.display().to_string()))?;
                    missing.push(name);
                    if !existing.pop() {
                        return Err(MediaError::InvalidPath(path.display().to_string()));
                    }
                }
                Err(e) => return Err(MediaError::Io(e)),
            }
        }

        // A dangling symlink exists but cannot be canonicalized; treat it as an escape.
        let mut resolved = fs::canonicalize(&existing)
            .await
            .map_err(|_| MediaError::InvalidPath(path.display().to_string()))?;
        for name in missing.into_iter().rev() {
            resolved.push(name);
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sandbox(dir: &Path) -> PathSandbox {
        PathSandbox::new(dir).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_inside_root() {
        let dir = tempdir().unwrap();
        let sandbox = sandbox(dir.path());

        let resolved = sandbox.resolve("uploads/members/a.png").await.unwrap();
        assert!(resolved.starts_with(sandbox.root()));
        assert!(resolved.ends_with("uploads/members/a.png"));
    }

    #[tokio::test]
    async fn test_resolve_rejects_traversal() {
        let dir = tempdir().unwrap();
        let sandbox = sandbox(dir.path());

        for path in [
            "../etc/passwd",
            "uploads/../../x",
            "uploads/members/../a.png",
            "..",
            "/etc/passwd",
            "uploads\\..\\..\\x",
        ] {
            let err = sandbox.resolve(path).await.unwrap_err();
            assert!(
                matches!(err, MediaError::InvalidPath(_)),
                "{} resolved: {:?}",
                path,
                err
            );
        }
    }

    #[tokio::test]
    async fn test_resolve_rejects_empty() {
        let dir = tempdir().unwrap();
        let sandbox = sandbox(dir.path());

        assert!(matches!(
            sandbox.resolve("   ").await,
            Err(MediaError::InvalidInput(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_resolve_rejects_symlink_escape() {
        let outside = tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), b"secret").unwrap();

        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("uploads")).unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("uploads/link")).unwrap();
        let sandbox = sandbox(dir.path());

        assert!(matches!(
            sandbox.resolve("uploads/link/secret.txt").await,
            Err(MediaError::InvalidPath(_))
        ));
        // Files that do not exist yet behind the link are rejected too.
        assert!(matches!(
            sandbox.resolve("uploads/link/new.txt").await,
            Err(MediaError::InvalidPath(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_resolve_rejects_dangling_symlink() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("uploads")).unwrap();
        std::os::unix::fs::symlink("/nonexistent/target", dir.path().join("uploads/dangling"))
            .unwrap();
        let sandbox = sandbox(dir.path());

        assert!(matches!(
            sandbox.resolve("uploads/dangling").await,
            Err(MediaError::InvalidPath(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_resolve_entry_keeps_final_symlink() {
        let dir = tempdir().unwrap();
        let docs = dir.path().join("uploads/documents");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(docs.join("real.pdf"), b"%PDF").unwrap();
        std::os::unix::fs::symlink(docs.join("real.pdf"), docs.join("alias.pdf")).unwrap();
        let sandbox = sandbox(dir.path());

        let entry = sandbox
            .resolve_entry("uploads/documents/alias.pdf")
            .await
            .unwrap();
        assert!(entry.starts_with(sandbox.root()));
        assert!(entry.ends_with("alias.pdf"));

        let target = sandbox.resolve("uploads/documents/alias.pdf").await.unwrap();
        assert!(target.ends_with("real.pdf"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_resolve_entry_rejects_escaping_parent() {
        let outside = tempdir().unwrap();
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("uploads")).unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("uploads/link")).unwrap();
        let sandbox = sandbox(dir.path());

        assert!(matches!(
            sandbox.resolve_entry("uploads/link/file.pdf").await,
            Err(MediaError::InvalidPath(_))
        ));
        assert!(matches!(
            sandbox.resolve_entry("../x").await,
            Err(MediaError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_subdir_creates_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let sandbox = sandbox(dir.path());

        let first = sandbox.ensure_subdir("/members/").await.unwrap();
        let second = sandbox.ensure_subdir("members").await.unwrap();
        assert_eq!(first, second);
        assert!(first.is_dir());
        assert!(first.ends_with("uploads/members"));
    }

    #[tokio::test]
    async fn test_ensure_subdir_strips_traversal() {
        let dir = tempdir().unwrap();
        let sandbox = sandbox(dir.path());

        let created = sandbox.ensure_subdir("../../escape").await.unwrap();
        assert!(created.starts_with(sandbox.root()));
        assert!(created.ends_with("uploads/escape"));
    }

    #[tokio::test]
    async fn test_ensure_subdir_rejects_empty_category() {
        let dir = tempdir().unwrap();
        let sandbox = sandbox(dir.path());

        assert!(matches!(
            sandbox.ensure_subdir("/../").await,
            Err(MediaError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_subdir_concurrent_callers() {
        let dir = tempdir().unwrap();
        let sandbox = sandbox(dir.path());

        let tasks = (0..16)
            .map(|_| {
                let sandbox = sandbox.clone();
                tokio::spawn(async move { sandbox.ensure_subdir("trails").await })
            })
            .collect::<Vec<_>>();

        for result in futures::future::join_all(tasks).await {
            assert!(result.unwrap().is_ok());
        }
    }

    #[tokio::test]
    async fn test_relative_of() {
        let dir = tempdir().unwrap();
        let sandbox = sandbox(dir.path());

        let absolute = sandbox.resolve("uploads/documents/x.pdf").await.unwrap();
        assert_eq!(
            sandbox.relative_of(&absolute).unwrap(),
            "uploads/documents/x.pdf"
        );
        assert!(sandbox.relative_of(Path::new("/elsewhere/x")).is_err());
    }

    #[tokio::test]
    async fn test_new_rejects_missing_root() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");

        assert!(matches!(
            PathSandbox::new(&missing),
            Err(MediaError::StorageUnavailable(_))
        ));
    }
}
