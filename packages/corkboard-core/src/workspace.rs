/// Plugin-level facade wiring the board components together.
///
/// Every dependency is passed in explicitly: one vault, one settings handle.
/// Saves to the same board are serialized by a per-board async lock, so a
/// second save waits for the first instead of racing it.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::boards::BoardDirectory;
use crate::cache::MetadataCache;
use crate::error::{Result, StorageError};
use crate::migrate::{LegacyMigrator, MigrationReport};
use crate::reconcile::{Reconciler, SaveReport};
use crate::settings::Settings;
use crate::types::{Board, BoardConfig, Note};
use crate::vault::Vault;

/// Board created when the storage folder holds none.
pub const DEFAULT_BOARD_NAME: &str = "My Board";

pub struct Corkboard<V: Vault> {
    settings: Settings,
    cache: Arc<MetadataCache>,
    boards: Arc<BoardDirectory<V>>,
    reconciler: Arc<Reconciler<V>>,
    migrator: LegacyMigrator<V>,
    /// board name -> save lock
    save_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<V: Vault> Corkboard<V> {
    pub fn new(vault: Arc<V>, settings: Settings) -> Self {
        let cache = Arc::new(MetadataCache::new());
        let boards = Arc::new(BoardDirectory::new(vault.clone(), settings.clone()));
        let reconciler = Arc::new(Reconciler::new(vault.clone(), cache.clone()));
        let migrator = LegacyMigrator::new(
            vault,
            settings.clone(),
            boards.clone(),
            reconciler.clone(),
        );
        Self {
            settings,
            cache,
            boards,
            reconciler,
            migrator,
            save_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn boards(&self) -> &BoardDirectory<V> {
        &self.boards
    }

    pub fn reconciler(&self) -> &Reconciler<V> {
        &self.reconciler
    }

    fn save_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.save_locks.lock().unwrap();
        locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Prepare storage: create the root, migrate legacy boards, make sure a
    /// board exists. Returns the board to show first.
    pub async fn init(&self) -> Result<String> {
        self.boards.ensure_root().await?;

        let report = self.migrate().await?;
        if !report.is_empty() {
            log::info!(
                "[corkboard.init] Migration: {} migrated, {} skipped, {} failed",
                report.migrated.len(),
                report.skipped.len(),
                report.failed.len()
            );
        }

        let mut names = self.boards.list_boards().await?;
        if names.is_empty() {
            names.push(self.boards.create_board(DEFAULT_BOARD_NAME).await?);
        }

        let active = match self.settings.get().last_board {
            Some(last) if names.contains(&last) => last,
            _ => names[0].clone(),
        };
        self.select_board(&active)?;
        Ok(active)
    }

    pub async fn migrate(&self) -> Result<MigrationReport> {
        self.migrator.migrate().await
    }

    pub async fn list_boards(&self) -> Result<Vec<String>> {
        self.boards.list_boards().await
    }

    pub async fn create_board(&self, name: &str) -> Result<String> {
        self.boards.create_board(name).await
    }

    pub fn active_board(&self) -> Option<String> {
        self.settings.get().last_board
    }

    pub fn select_board(&self, name: &str) -> Result<()> {
        self.settings
            .update(|s| s.last_board = Some(name.to_string()))
    }

    /// Delete a board, refusing to remove the last one.
    /// Returns the board selected afterwards.
    pub async fn delete_board(&self, name: &str) -> Result<String> {
        let names = self.boards.list_boards().await?;
        if !names.iter().any(|n| n == name) {
            return Err(StorageError::BoardNotFound(name.to_string()));
        }
        if names.len() <= 1 {
            log::warn!("[corkboard.boards] Refusing to delete the last board {}", name);
            return Err(StorageError::LastBoard(name.to_string()));
        }

        let lock = self.save_lock(name);
        let _guard = lock.lock().await;

        if !self.boards.delete_board(name).await? {
            return Err(StorageError::BoardNotFound(name.to_string()));
        }
        self.cache.invalidate_dir(&self.boards.board_path(name));
        self.save_locks.lock().unwrap().remove(name);

        let current = self.active_board();
        let next = match current {
            Some(c) if c != name && names.contains(&c) => c,
            _ => names
                .iter()
                .find(|n| n.as_str() != name)
                .cloned()
                .ok_or_else(|| StorageError::LastBoard(name.to_string()))?,
        };
        self.select_board(&next)?;
        Ok(next)
    }

    /// Load a board's configuration and notes.
    pub async fn open_board(&self, name: &str) -> Result<Board> {
        if !self.boards.board_exists(name).await? {
            return Err(StorageError::BoardNotFound(name.to_string()));
        }
        let notes = self
            .reconciler
            .load_board(&self.boards.board_path(name))
            .await?;
        self.select_board(name)?;
        Ok(Board {
            name: name.to_string(),
            config: self.boards.board_config(name),
            notes,
        })
    }

    /// Reconcile a board folder with `notes`. Storage locators of newly
    /// written notes are recorded in `notes`.
    pub async fn save_board(&self, name: &str, notes: &mut [Note]) -> Result<SaveReport> {
        let lock = self.save_lock(name);
        let _guard = lock.lock().await;
        self.reconciler
            .save_board(&self.boards.board_path(name), notes)
            .await
    }

    pub fn board_config(&self, name: &str) -> BoardConfig {
        self.boards.board_config(name)
    }

    pub fn set_board_config(&self, name: &str, config: BoardConfig) -> Result<()> {
        self.boards.set_board_config(name, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::PluginSettings;
    use crate::vault::MemoryVault;

    fn corkboard() -> (Arc<MemoryVault>, Corkboard<MemoryVault>) {
        let vault = Arc::new(MemoryVault::new());
        let settings = Settings::in_memory(PluginSettings::default());
        (vault.clone(), Corkboard::new(vault, settings))
    }

    #[tokio::test]
    async fn test_init_creates_default_board() {
        let (vault, cb) = corkboard();
        let active = cb.init().await.unwrap();
        assert_eq!(active, DEFAULT_BOARD_NAME);
        assert!(vault.contains("Corkboard/My Board"));
        assert_eq!(cb.active_board().as_deref(), Some(DEFAULT_BOARD_NAME));
    }

    #[tokio::test]
    async fn test_init_restores_last_board() {
        let (vault, cb) = corkboard();
        vault.put_folder("Corkboard/Alpha");
        vault.put_folder("Corkboard/Beta");
        cb.select_board("Beta").unwrap();
        assert_eq!(cb.init().await.unwrap(), "Beta");

        cb.select_board("Gone").unwrap();
        assert_eq!(cb.init().await.unwrap(), "Alpha");
    }

    #[tokio::test]
    async fn test_delete_last_board_is_rejected() {
        let (vault, cb) = corkboard();
        cb.init().await.unwrap();
        let err = cb.delete_board(DEFAULT_BOARD_NAME).await.unwrap_err();
        assert!(matches!(err, StorageError::LastBoard(_)));
        assert!(vault.contains("Corkboard/My Board"));
    }

    #[tokio::test]
    async fn test_delete_reselects_survivor() {
        let (_vault, cb) = corkboard();
        cb.init().await.unwrap();
        cb.create_board("Second").await.unwrap();
        cb.select_board("Second").unwrap();

        let next = cb.delete_board("Second").await.unwrap();
        assert_eq!(next, DEFAULT_BOARD_NAME);
        assert_eq!(cb.active_board().as_deref(), Some(DEFAULT_BOARD_NAME));
        assert_eq!(cb.list_boards().await.unwrap(), vec![DEFAULT_BOARD_NAME.to_string()]);
    }

    #[tokio::test]
    async fn test_delete_unknown_board() {
        let (_vault, cb) = corkboard();
        cb.init().await.unwrap();
        let err = cb.delete_board("Nope").await.unwrap_err();
        assert!(matches!(err, StorageError::BoardNotFound(_)));
    }

    #[tokio::test]
    async fn test_open_missing_board() {
        let (_vault, cb) = corkboard();
        assert!(matches!(
            cb.open_board("Nope").await.unwrap_err(),
            StorageError::BoardNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_saves_are_serialized() {
        let (vault, cb) = corkboard();
        cb.init().await.unwrap();
        let mut first = vec![Note::new("a").with_content("one")];
        let mut second = vec![Note::new("a").with_content("two")];

        let (r1, r2) = tokio::join!(
            cb.save_board(DEFAULT_BOARD_NAME, &mut first),
            cb.save_board(DEFAULT_BOARD_NAME, &mut second)
        );
        assert_eq!(r1.unwrap().created, 1);
        // The second save sees the first one's file instead of racing its create.
        assert_eq!(r2.unwrap().updated, 1);
        assert!(vault
            .file("Corkboard/My Board/a.md")
            .unwrap()
            .ends_with("two"));
    }

    #[tokio::test]
    async fn test_delete_board_drops_its_save_lock() {
        let (_vault, cb) = corkboard();
        cb.create_board("Keep").await.unwrap();
        cb.create_board("Gone").await.unwrap();
        cb.save_board("Gone", &mut vec![Note::new("a")]).await.unwrap();
        assert!(cb.save_locks.lock().unwrap().contains_key("Gone"));

        cb.delete_board("Gone").await.unwrap();
        assert!(!cb.save_locks.lock().unwrap().contains_key("Gone"));
    }
}
