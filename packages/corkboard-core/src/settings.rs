/// Plugin-wide settings.
///
/// Persisted as one JSON document. Every field has a serde default, so a
/// partial or older document is merged over the hard defaults on load.
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::BoardConfig;

pub const DEFAULT_STORAGE_PATH: &str = "Corkboard";
pub const SETTINGS_FILE_NAME: &str = "corkboard.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSettings {
    /// Vault folder holding one sub-folder per board.
    #[serde(default = "default_storage_path")]
    pub storage_path: String,
    /// Board configuration keyed by normalized board folder path.
    #[serde(default)]
    pub boards: BTreeMap<String, BoardConfig>,
    /// Legacy file names already migrated.
    #[serde(default)]
    pub migrated_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_board: Option<String>,
}

fn default_storage_path() -> String {
    DEFAULT_STORAGE_PATH.to_string()
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            boards: BTreeMap::new(),
            migrated_files: Vec::new(),
            last_board: None,
        }
    }
}

/// Where settings live between runs.
pub trait SettingsStore: Send + Sync {
    /// Load settings, falling back to defaults when nothing usable is stored.
    fn load(&self) -> PluginSettings;

    fn save(&self, settings: &PluginSettings) -> Result<()>;
}

/// JSON file on disk.
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> PluginSettings {
        match fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!(
                    "[corkboard.settings] Failed to parse {}: {}",
                    self.path.display(),
                    e
                );
                PluginSettings::default()
            }),
            Err(_) => {
                log::info!(
                    "[corkboard.settings] No settings at {}, using defaults",
                    self.path.display()
                );
                PluginSettings::default()
            }
        }
    }

    fn save(&self, settings: &PluginSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        let tmp_path = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// Keeps settings in memory only; `saved()` exposes the last persisted copy.
#[derive(Default)]
pub struct MemorySettingsStore {
    saved: Mutex<Option<PluginSettings>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(settings: PluginSettings) -> Self {
        Self {
            saved: Mutex::new(Some(settings)),
        }
    }

    pub fn saved(&self) -> Option<PluginSettings> {
        self.saved.lock().unwrap().clone()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> PluginSettings {
        self.saved().unwrap_or_default()
    }

    fn save(&self, settings: &PluginSettings) -> Result<()> {
        *self.saved.lock().unwrap() = Some(settings.clone());
        Ok(())
    }
}

/// Shared settings handle passed to every component that needs settings.
#[derive(Clone)]
pub struct Settings {
    store: Arc<dyn SettingsStore>,
    current: Arc<RwLock<PluginSettings>>,
}

impl Settings {
    /// Load from `store` once; later reads come from memory.
    pub fn load(store: Arc<dyn SettingsStore>) -> Self {
        let current = store.load();
        Self {
            store,
            current: Arc::new(RwLock::new(current)),
        }
    }

    pub fn in_memory(settings: PluginSettings) -> Self {
        Self::load(Arc::new(MemorySettingsStore::with(settings)))
    }

    pub fn get(&self) -> PluginSettings {
        self.current.read().unwrap().clone()
    }

    pub fn storage_path(&self) -> String {
        self.current.read().unwrap().storage_path.clone()
    }

    /// Mutate and persist. The in-memory copy keeps the change even if the
    /// store fails to persist it.
    pub fn update<R>(&self, f: impl FnOnce(&mut PluginSettings) -> R) -> Result<R> {
        let (result, snapshot) = {
            let mut current = self.current.write().unwrap();
            let result = f(&mut current);
            (result, current.clone())
        };
        self.store.save(&snapshot)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WallStyle;
    use tempfile::TempDir;

    #[test]
    fn test_partial_document_merges_over_defaults() {
        let settings: PluginSettings =
            serde_json::from_str(r#"{"migratedFiles":["Ideas.json"]}"#).unwrap();
        assert_eq!(settings.storage_path, DEFAULT_STORAGE_PATH);
        assert_eq!(settings.migrated_files, vec!["Ideas.json".to_string()]);
        assert!(settings.boards.is_empty());
    }

    #[test]
    fn test_json_store_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = JsonSettingsStore::new(tmp.path().join("nested").join(SETTINGS_FILE_NAME));

        let mut settings = PluginSettings::default();
        settings.boards.insert(
            "Corkboard/Ideas".to_string(),
            BoardConfig {
                wall_style: WallStyle::Grid,
                ..Default::default()
            },
        );
        store.save(&settings).unwrap();

        assert_eq!(store.load(), settings);
    }

    #[test]
    fn test_json_store_defaults_on_garbage() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(SETTINGS_FILE_NAME);
        fs::write(&path, "{not json").unwrap();
        assert_eq!(JsonSettingsStore::new(&path).load(), PluginSettings::default());
        assert_eq!(
            JsonSettingsStore::new(tmp.path().join("missing.json")).load(),
            PluginSettings::default()
        );
    }

    #[test]
    fn test_update_persists() {
        let store = Arc::new(MemorySettingsStore::new());
        let settings = Settings::load(store.clone());
        settings
            .update(|s| s.last_board = Some("Ideas".to_string()))
            .unwrap();
        assert_eq!(settings.get().last_board.as_deref(), Some("Ideas"));
        assert_eq!(store.saved().unwrap().last_board.as_deref(), Some("Ideas"));
    }
}
