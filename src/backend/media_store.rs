use std::fs;
use std::path::{Path, PathBuf};

use url::Url;

use super::{BackendError, ObjectStore};

/// Object store on the local filesystem. Objects live under `root` and are
/// served publicly below `public_base` (the server mounts `root` at `/media`).
pub struct FsObjectStore {
    root: PathBuf,
    public_base: Url,
}

fn is_safe_component(component: &str) -> bool {
    !component.is_empty()
        && component != "."
        && component != ".."
        && component
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base: &str) -> Result<Self, BackendError> {
        // Url::join drops the last segment unless the base ends with a slash.
        let mut base = public_base.trim_end_matches('/').to_string();
        base.push('/');
        Ok(Self {
            root: root.into(),
            public_base: Url::parse(&base)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Public URL an object stored at `path` is reachable under.
    pub fn url_for(&self, path: &str) -> Result<String, BackendError> {
        Ok(self.public_base.join(path)?.to_string())
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, BackendError> {
        if !path.split('/').all(is_safe_component) {
            return Err(BackendError::NotFound(format!("invalid object path '{}'", path)));
        }
        Ok(path.split('/').fold(self.root.clone(), |acc, part| acc.join(part)))
    }

    fn path_for_url(&self, url: &str) -> Result<PathBuf, BackendError> {
        let parsed = Url::parse(url)?;
        let relative = parsed
            .as_str()
            .strip_prefix(self.public_base.as_str())
            .ok_or_else(|| BackendError::NotFound(format!("'{}' is not served by this store", url)))?;
        self.resolve(relative)
    }
}

impl ObjectStore for FsObjectStore {
    fn upload(&self, path: &str, bytes: &[u8]) -> Result<String, BackendError> {
        let full_path = self.resolve(path)?;
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full_path, bytes)?;
        log::info!("Stored object '{}' ({} bytes)", path, bytes.len());
        self.url_for(path)
    }

    fn delete(&self, url: &str) -> Result<(), BackendError> {
        let full_path = self.path_for_url(url)?;
        fs::remove_file(&full_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_then_delete_by_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), "http://localhost:8080/media").unwrap();

        let url = store.upload("post_images/1700000000000_cake.jpg", b"jpeg").unwrap();
        assert_eq!(url, "http://localhost:8080/media/post_images/1700000000000_cake.jpg");
        let on_disk = dir.path().join("post_images").join("1700000000000_cake.jpg");
        assert_eq!(fs::read(&on_disk).unwrap(), b"jpeg");

        store.delete(&url).unwrap();
        assert!(!on_disk.exists());
    }

    #[test]
    fn rejects_paths_escaping_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), "http://localhost/media/").unwrap();
        assert!(store.upload("../outside.txt", b"x").is_err());
        assert!(store.delete("http://localhost/media/post_images/../../etc/passwd").is_err());
    }

    #[test]
    fn foreign_urls_are_not_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), "http://localhost/media").unwrap();
        assert!(matches!(
            store.delete("https://elsewhere.example/media/a.jpg"),
            Err(BackendError::NotFound(_))
        ));
    }

    #[test]
    fn deleting_a_missing_object_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), "http://localhost/media").unwrap();
        assert!(matches!(
            store.delete("http://localhost/media/post_images/gone.png"),
            Err(BackendError::Io(_))
        ));
    }
}
