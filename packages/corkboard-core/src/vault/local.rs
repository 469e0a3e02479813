/// Local filesystem vault.
///
/// - Rooted at one directory; vault paths never escape it
/// - Atomic writes (write to .tmp, fsync, rename; new files are hard-linked
///   into place so an existing entry is never clobbered)
/// - Trash is a `.trash` folder under the root, names de-duplicated
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{Entry, EntryKind, EntryMeta, Vault};
use crate::error::{Result, StorageError};
use crate::paths;

pub const TRASH_FOLDER: &str = ".trash";

pub struct LocalVault {
    root: PathBuf,
}

impl LocalVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a vault path onto the filesystem, rejecting `..` segments.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let normalized = paths::normalize_path(path);
        if normalized.split('/').any(|seg| seg == "..") {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        let mut full = self.root.clone();
        for seg in normalized.split('/').filter(|s| !s.is_empty()) {
            full.push(seg);
        }
        Ok(full)
    }

    fn meta_from(metadata: &std::fs::Metadata) -> EntryMeta {
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        EntryMeta {
            kind: if metadata.is_dir() {
                EntryKind::Folder
            } else {
                EntryKind::File
            },
            size: metadata.len(),
            modified,
        }
    }

    async fn write_synced(path: &Path, content: &str) -> std::io::Result<()> {
        let mut file = fs::File::create(path).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await
    }

    /// Atomic write with fsync: write to .tmp, fsync, rename.
    async fn atomic_write(path: &Path, content: &str) -> std::io::Result<()> {
        let tmp_path = path.with_extension("corkboard.tmp");
        Self::write_synced(&tmp_path, content).await?;
        if let Err(e) = fs::rename(&tmp_path, path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e);
        }
        Ok(())
    }

    /// `create_new` fallback for filesystems without hard links.
    async fn create_in_place(full: &Path, path: &str, content: &str) -> Result<()> {
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(full)
            .await
        {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(path.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        Ok(())
    }

    async fn occupied(path: &Path) -> bool {
        fs::symlink_metadata(path).await.is_ok()
    }
}

#[async_trait]
impl Vault for LocalVault {
    async fn stat(&self, path: &str) -> Result<Option<EntryMeta>> {
        let full = self.resolve(path)?;
        match fs::metadata(&full).await {
            Ok(metadata) => Ok(Some(Self::meta_from(&metadata))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, dir: &str) -> Result<Vec<Entry>> {
        let full = self.resolve(dir)?;
        let mut reader = match fs::read_dir(&full).await {
            Ok(r) => r,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(dir.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let name = match entry.file_name().to_str() {
                Some(n) => n.to_string(),
                None => continue,
            };
            if name.starts_with('.') {
                continue;
            }
            let kind = match entry.file_type().await {
                Ok(t) if t.is_dir() => EntryKind::Folder,
                Ok(_) => EntryKind::File,
                Err(_) => continue,
            };
            entries.push(Entry {
                path: paths::join(dir, &name),
                kind,
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    async fn create_folder(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        fs::create_dir_all(&full).await?;
        Ok(())
    }

    async fn create(&self, path: &str, content: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        if Self::occupied(&full).await {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }

        // Fully written temp file, then a hard link: the target never exists
        // half-written and an entry created meanwhile is not clobbered.
        let tmp_path = full.with_extension("corkboard.tmp");
        if let Err(e) = Self::write_synced(&tmp_path, content).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        let linked = fs::hard_link(&tmp_path, &full).await;
        let _ = fs::remove_file(&tmp_path).await;
        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StorageError::AlreadyExists(path.to_string()))
            }
            Err(e) => {
                log::debug!(
                    "[corkboard.vault] Hard link unavailable for {} ({}), writing in place",
                    path,
                    e
                );
                Self::create_in_place(&full, path, content).await
            }
        }
    }

    async fn modify(&self, path: &str, content: &str) -> Result<()> {
        let full = self.resolve(path)?;
        match fs::metadata(&full).await {
            Ok(m) if m.is_dir() => return Err(StorageError::OccupiedPath(path.to_string())),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => return Err(e.into()),
        }
        Self::atomic_write(&full, content).await?;
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        match fs::read_to_string(&full).await {
            Ok(s) => Ok(s),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        if !Self::occupied(&src).await {
            return Err(StorageError::NotFound(from.to_string()));
        }
        if Self::occupied(&dst).await {
            return Err(StorageError::AlreadyExists(to.to_string()));
        }
        fs::rename(&src, &dst).await?;
        Ok(())
    }

    async fn trash(&self, path: &str) -> Result<()> {
        let src = self.resolve(path)?;
        if !Self::occupied(&src).await {
            return Err(StorageError::NotFound(path.to_string()));
        }
        let trash_dir = self.root.join(TRASH_FOLDER);
        fs::create_dir_all(&trash_dir).await?;

        let name = paths::file_name(path);
        let mut target = trash_dir.join(&name);
        if Self::occupied(&target).await {
            let mut found = None;
            for candidate in paths::dedup_candidates(&name) {
                let p = trash_dir.join(&candidate);
                if !Self::occupied(&p).await {
                    found = Some(p);
                    break;
                }
            }
            target = found.ok_or_else(|| StorageError::AlreadyExists(name.clone()))?;
        }

        fs::rename(&src, &target).await?;
        log::debug!("[corkboard.vault] Trashed {} -> {:?}", path, target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_read_modify() {
        let tmp = TempDir::new().unwrap();
        let vault = LocalVault::new(tmp.path());

        vault.create("Corkboard/Ideas/a.md", "one").await.unwrap();
        assert_eq!(vault.read("Corkboard/Ideas/a.md").await.unwrap(), "one");

        vault.modify("Corkboard/Ideas/a.md", "two").await.unwrap();
        assert_eq!(vault.read("Corkboard/Ideas/a.md").await.unwrap(), "two");

        let meta = vault.stat("Corkboard/Ideas/a.md").await.unwrap().unwrap();
        assert!(meta.is_file());
        assert_eq!(meta.size, 3);
    }

    #[tokio::test]
    async fn test_create_refuses_existing() {
        let tmp = TempDir::new().unwrap();
        let vault = LocalVault::new(tmp.path());
        vault.create("a.md", "x").await.unwrap();
        let err = vault.create("a.md", "y").await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
        assert_eq!(vault.read("a.md").await.unwrap(), "x");
    }

    #[tokio::test]
    async fn test_create_leaves_no_temp_file() {
        let tmp = TempDir::new().unwrap();
        let vault = LocalVault::new(tmp.path());
        vault.create("b/a.md", "body").await.unwrap();

        let names: Vec<_> = std::fs::read_dir(tmp.path().join("b"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["a.md".to_string()]);
        assert_eq!(std::fs::read_to_string(tmp.path().join("b/a.md")).unwrap(), "body");
    }

    #[tokio::test]
    async fn test_modify_folder_is_occupied() {
        let tmp = TempDir::new().unwrap();
        let vault = LocalVault::new(tmp.path());
        vault.create_folder("dir.md").await.unwrap();
        let err = vault.modify("dir.md", "x").await.unwrap_err();
        assert!(matches!(err, StorageError::OccupiedPath(_)));
    }

    #[tokio::test]
    async fn test_list_hides_dot_entries_and_sorts() {
        let tmp = TempDir::new().unwrap();
        let vault = LocalVault::new(tmp.path());
        vault.create("root/b.md", "").await.unwrap();
        vault.create("root/a.md", "").await.unwrap();
        vault.create_folder("root/sub").await.unwrap();
        vault.create("root/.hidden", "").await.unwrap();

        let entries = vault.list("root").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(names, vec!["root/a.md", "root/b.md", "root/sub"]);
        assert_eq!(entries[2].kind, EntryKind::Folder);
    }

    #[tokio::test]
    async fn test_trash_dedups_names() {
        let tmp = TempDir::new().unwrap();
        let vault = LocalVault::new(tmp.path());
        vault.create("x/a.md", "first").await.unwrap();
        vault.trash("x/a.md").await.unwrap();
        vault.create("x/a.md", "second").await.unwrap();
        vault.trash("x/a.md").await.unwrap();

        assert!(!vault.exists("x/a.md").await.unwrap());
        let trash = tmp.path().join(TRASH_FOLDER);
        assert_eq!(std::fs::read_to_string(trash.join("a.md")).unwrap(), "first");
        assert_eq!(std::fs::read_to_string(trash.join("a-1.md")).unwrap(), "second");
    }

    #[tokio::test]
    async fn test_rename_refuses_occupied_target() {
        let tmp = TempDir::new().unwrap();
        let vault = LocalVault::new(tmp.path());
        vault.create("a.json", "a").await.unwrap();
        vault.create("b.json", "b").await.unwrap();
        assert!(vault.rename("a.json", "b.json").await.is_err());
        vault.rename("a.json", "a.json.migrated").await.unwrap();
        assert_eq!(vault.read("a.json.migrated").await.unwrap(), "a");
    }

    #[tokio::test]
    async fn test_rejects_parent_segments() {
        let tmp = TempDir::new().unwrap();
        let vault = LocalVault::new(tmp.path());
        let err = vault.read("../etc/passwd").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));
    }
}
