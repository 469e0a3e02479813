/// Board name <-> folder mapping.
///
/// A board is an immediate sub-folder of the storage root. Its configuration
/// lives in plugin settings keyed by the folder path, not in the folder.
use std::sync::Arc;

use crate::error::{Result, StorageError};
use crate::paths;
use crate::settings::Settings;
use crate::types::BoardConfig;
use crate::vault::Vault;

/// Reserved folder under the storage root holding legacy JSON boards.
pub const LEGACY_FOLDER: &str = "_legacy";

pub struct BoardDirectory<V: Vault> {
    vault: Arc<V>,
    settings: Settings,
}

impl<V: Vault> BoardDirectory<V> {
    pub fn new(vault: Arc<V>, settings: Settings) -> Self {
        Self { vault, settings }
    }

    pub fn root(&self) -> String {
        paths::normalize_path(&self.settings.storage_path())
    }

    pub fn board_path(&self, name: &str) -> String {
        paths::join(&self.root(), name)
    }

    pub fn legacy_path(&self) -> String {
        paths::join(&self.root(), LEGACY_FOLDER)
    }

    /// Create the storage root if it is missing.
    pub async fn ensure_root(&self) -> Result<()> {
        let root = self.root();
        match self.vault.stat(&root).await? {
            Some(meta) if meta.is_folder() => Ok(()),
            Some(_) => Err(StorageError::OccupiedPath(root)),
            None => {
                log::info!("[corkboard.boards] Creating storage folder {}", root);
                self.vault.create_folder(&root).await
            }
        }
    }

    /// Names of all boards, in listing order.
    pub async fn list_boards(&self) -> Result<Vec<String>> {
        self.ensure_root().await?;
        let entries = self.vault.list(&self.root()).await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.kind == crate::vault::EntryKind::Folder)
            .map(|e| paths::file_name(&e.path))
            .filter(|name| name != LEGACY_FOLDER && !name.starts_with('.'))
            .collect())
    }

    pub async fn board_exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .vault
            .stat(&self.board_path(name))
            .await?
            .is_some_and(|m| m.is_folder()))
    }

    /// Create a board folder and its default configuration.
    /// Returns the sanitized name actually used.
    pub async fn create_board(&self, name: &str) -> Result<String> {
        let sanitized = paths::sanitize_name(name);
        if sanitized.is_empty() || sanitized == LEGACY_FOLDER || sanitized.starts_with('.') {
            return Err(StorageError::InvalidPath(name.to_string()));
        }
        self.ensure_root().await?;

        let path = self.board_path(&sanitized);
        if self.vault.stat(&path).await?.is_some() {
            log::warn!("[corkboard.boards] Board already exists: {}", sanitized);
            return Err(StorageError::BoardExists(sanitized));
        }

        self.vault.create_folder(&path).await?;
        self.settings.update(|s| {
            s.boards.insert(path.clone(), BoardConfig::new_board());
        })?;
        log::info!("[corkboard.boards] Created board {} at {}", sanitized, path);
        Ok(sanitized)
    }

    /// Move a board folder to the trash and forget its configuration.
    ///
    /// Returns `Ok(false)` when there was nothing to delete or the trash
    /// failed. Keeping at least one board is the caller's job.
    pub async fn delete_board(&self, name: &str) -> Result<bool> {
        let path = self.board_path(name);
        match self.vault.stat(&path).await? {
            Some(meta) if meta.is_folder() => {}
            _ => return Ok(false),
        }
        if let Err(e) = self.vault.trash(&path).await {
            log::warn!("[corkboard.boards] Failed to trash board {}: {}", path, e);
            return Ok(false);
        }
        self.settings.update(|s| {
            s.boards.remove(&path);
        })?;
        log::info!("[corkboard.boards] Deleted board {}", name);
        Ok(true)
    }

    pub fn board_config(&self, name: &str) -> BoardConfig {
        let path = self.board_path(name);
        self.settings
            .get()
            .boards
            .get(&path)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_board_config(&self, name: &str, config: BoardConfig) -> Result<()> {
        let path = self.board_path(name);
        self.settings.update(|s| {
            s.boards.insert(path, config);
        })
    }
}
