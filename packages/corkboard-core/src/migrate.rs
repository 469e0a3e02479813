/// One-shot upgrade from one JSON file per board to one folder per board.
///
/// Non-destructive: a migrated file is renamed to `<name>.migrated` and kept.
/// Files already listed in `migrated_files` are never touched again, and a
/// file that fails is left unmarked so the next pass retries it.
use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::Value;

use crate::boards::BoardDirectory;
use crate::error::{Result, StorageError};
use crate::paths;
use crate::reconcile::{Reconciler, SAVE_BATCH_SIZE};
use crate::settings::{Settings, SETTINGS_FILE_NAME};
use crate::types::{
    BackgroundStyle, BoardConfig, Note, NoteColor, NoteShape, NoteSize, NoteStyle, PinKind,
    PinPosition, WallStyle,
};
use crate::vault::{EntryKind, Vault};

pub const LEGACY_EXTENSION: &str = "json";
pub const MIGRATED_SUFFIX: &str = ".migrated";

/// Contents of one legacy board file.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyBoard {
    pub notes: Vec<Note>,
    pub wall_style: Option<WallStyle>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Names of the boards written.
    pub migrated: Vec<String>,
    /// Legacy files with nothing to migrate.
    pub skipped: Vec<String>,
    /// `(file, error)` for files left for the next pass.
    pub failed: Vec<(String, String)>,
}

impl MigrationReport {
    pub fn is_empty(&self) -> bool {
        self.migrated.is_empty() && self.skipped.is_empty() && self.failed.is_empty()
    }
}

fn number(obj: &serde_json::Map<String, Value>, key: &str) -> Option<f64> {
    let v = match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    v.filter(|v| v.is_finite())
}

fn text<'a>(obj: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

/// Identifier for a legacy note that has none. Stable across passes so a
/// retried migration rewrites the same file.
pub fn legacy_note_id(board: &str, index: usize) -> String {
    format!("legacy-{}-{}", paths::sanitize_name(board), index)
}

/// Read one legacy note object. Missing or odd fields take defaults;
/// anything that is not an object is skipped. `fallback_id` is used when the
/// object carries no usable id.
pub fn note_from_legacy(value: &Value, fallback_id: String) -> Option<Note> {
    let obj = value.as_object()?;
    let id = match obj.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => fallback_id,
    };
    let word = |key: &str| text(obj, key).unwrap_or_default();

    Some(Note {
        id,
        x: number(obj, "x").unwrap_or(0.0),
        y: number(obj, "y").unwrap_or(0.0),
        color: NoteColor::from_keyword_or_default(word("color")),
        size: NoteSize::from_keyword_or_default(word("size")),
        shape: NoteShape::from_keyword_or_default(word("shape")),
        style: NoteStyle::from_keyword_or_default(word("style")),
        background: BackgroundStyle::from_keyword_or_default(word("background")),
        background_image: text(obj, "backgroundImage")
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        rotation: number(obj, "rotation").unwrap_or(0.0),
        original_rotation: number(obj, "originalRotation"),
        pin: PinKind::from_keyword_or_default(word("pin")),
        pin_position: PinPosition::from_keyword_or_default(word("pinPosition")),
        content: text(obj, "content")
            .or_else(|| text(obj, "text"))
            .unwrap_or_default()
            .to_string(),
        file_path: String::new(),
    })
}

fn notes_from_legacy(items: &[Value], board: &str) -> Vec<Note> {
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| note_from_legacy(item, legacy_note_id(board, i)))
        .collect()
}

/// Parse legacy JSON for `board`: a bare array of notes, or
/// `{ "notes": [...], "wallStyle": ... }`.
/// `Ok(None)` means the document holds nothing to migrate.
pub fn parse_legacy(
    content: &str,
    board: &str,
) -> std::result::Result<Option<LegacyBoard>, serde_json::Error> {
    let value: Value = serde_json::from_str(content)?;
    let legacy = match &value {
        Value::Array(items) => Some(LegacyBoard {
            notes: notes_from_legacy(items, board),
            wall_style: None,
        }),
        Value::Object(obj) => match obj.get("notes") {
            Some(Value::Array(items)) => Some(LegacyBoard {
                notes: notes_from_legacy(items, board),
                wall_style: text(obj, "wallStyle").map(WallStyle::from_keyword_or_default),
            }),
            _ => None,
        },
        _ => None,
    };
    Ok(legacy)
}

pub struct LegacyMigrator<V: Vault> {
    vault: Arc<V>,
    settings: Settings,
    boards: Arc<BoardDirectory<V>>,
    reconciler: Arc<Reconciler<V>>,
}

impl<V: Vault> LegacyMigrator<V> {
    pub fn new(
        vault: Arc<V>,
        settings: Settings,
        boards: Arc<BoardDirectory<V>>,
        reconciler: Arc<Reconciler<V>>,
    ) -> Self {
        Self {
            vault,
            settings,
            boards,
            reconciler,
        }
    }

    /// Legacy files still waiting for migration.
    async fn pending_files(&self) -> Result<Vec<String>> {
        self.boards.ensure_root().await?;
        let legacy_dir = self.boards.legacy_path();
        let scan_dir = match self.vault.stat(&legacy_dir).await? {
            Some(meta) if meta.is_folder() => legacy_dir,
            _ => self.boards.root(),
        };
        let migrated = self.settings.get().migrated_files;

        Ok(self
            .vault
            .list(&scan_dir)
            .await?
            .into_iter()
            .filter(|e| e.kind == EntryKind::File)
            .filter(|e| paths::extension(&e.path).as_deref() == Some(LEGACY_EXTENSION))
            .filter(|e| {
                let name = paths::file_name(&e.path);
                name != SETTINGS_FILE_NAME && !migrated.contains(&name)
            })
            .map(|e| e.path)
            .collect())
    }

    /// Run one migration pass over every pending legacy file.
    pub async fn migrate(&self) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();

        for path in self.pending_files().await? {
            let file_name = paths::file_name(&path);
            match self.migrate_file(&path).await {
                Ok(Some(board)) => {
                    if let Err(e) = self.settings.update(|s| s.migrated_files.push(file_name.clone())) {
                        log::warn!(
                            "[corkboard.migrate] Could not persist migrated list after {}: {}",
                            file_name,
                            e
                        );
                    }
                    let renamed = format!("{}{}", path, MIGRATED_SUFFIX);
                    if let Err(e) = self.vault.rename(&path, &renamed).await {
                        log::warn!(
                            "[corkboard.migrate] Migrated {} but could not rename it: {}",
                            path,
                            e
                        );
                    }
                    log::info!("[corkboard.migrate] Migrated {} -> board {}", path, board);
                    report.migrated.push(board);
                }
                Ok(None) => {
                    log::info!("[corkboard.migrate] Nothing to migrate in {}", path);
                    report.skipped.push(file_name);
                }
                Err(e) => {
                    log::warn!("[corkboard.migrate] Failed to migrate {}: {}", path, e);
                    report.failed.push((file_name, e.to_string()));
                }
            }
        }

        if !report.failed.is_empty() {
            log::warn!(
                "[corkboard.migrate] {} legacy board(s) could not be migrated; they will be retried",
                report.failed.len()
            );
        }
        Ok(report)
    }

    /// Migrate one legacy file. Returns the board name, or `None` when the
    /// file has nothing to migrate.
    async fn migrate_file(&self, path: &str) -> Result<Option<String>> {
        let name = paths::sanitize_name(&paths::file_stem(path));
        if name.is_empty() {
            return Err(StorageError::InvalidPath(path.to_string()));
        }

        let content = self.vault.read(path).await?;
        let legacy = parse_legacy(&content, &name).map_err(|e| StorageError::Parse {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let Some(legacy) = legacy else {
            return Ok(None);
        };
        let board_dir = self.boards.board_path(&name);
        match self.vault.stat(&board_dir).await? {
            Some(meta) if meta.is_folder() => {}
            Some(_) => return Err(StorageError::OccupiedPath(board_dir)),
            None => self.vault.create_folder(&board_dir).await?,
        }

        let existing = self.settings.get().boards.get(&board_dir).cloned();
        let config = BoardConfig {
            wall_style: legacy.wall_style.unwrap_or_default(),
            ..existing.unwrap_or_else(BoardConfig::new_board)
        };
        self.boards.set_board_config(&name, config)?;

        let mut notes = legacy.notes;
        for note in notes.iter_mut() {
            note.file_path.clear();
        }
        for batch in notes.chunks(SAVE_BATCH_SIZE) {
            let results = join_all(
                batch
                    .iter()
                    .map(|note| self.reconciler.save_note(&board_dir, note)),
            )
            .await;
            for (note, result) in batch.iter().zip(results) {
                if let Err(e) = result {
                    log::warn!(
                        "[corkboard.migrate] Could not write note {} from {}: {}",
                        note.id,
                        path,
                        e
                    );
                    return Err(e);
                }
            }
        }
        Ok(Some(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_form() {
        let board = parse_legacy(
            r#"{"notes":[{"id":"1","x":10.6,"y":5.2,"color":"pink","text":"hi"}],"wallStyle":"grid"}"#,
            "Ideas",
        )
        .unwrap()
        .unwrap();
        assert_eq!(board.wall_style, Some(WallStyle::Grid));
        assert_eq!(board.notes.len(), 1);
        let note = &board.notes[0];
        assert_eq!(note.id, "1");
        assert_eq!(note.x, 10.6);
        assert_eq!(note.color, NoteColor::Pink);
        assert_eq!(note.content, "hi");
    }

    #[test]
    fn test_parse_array_form() {
        let board = parse_legacy(r#"[{"id":7,"content":"a"},"junk",{"x":"3"}]"#, "Old")
            .unwrap()
            .unwrap();
        assert_eq!(board.wall_style, None);
        assert_eq!(board.notes.len(), 2);
        assert_eq!(board.notes[0].id, "7");
        assert_eq!(board.notes[1].x, 3.0);
        assert_eq!(board.notes[1].id, "legacy-Old-2");
    }

    #[test]
    fn test_missing_ids_are_stable_across_parses() {
        let json = r#"[{"content":"no id"},{"id":"  ","content":"blank id"}]"#;
        let first = parse_legacy(json, "Old").unwrap().unwrap();
        let second = parse_legacy(json, "Old").unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.notes[0].id, "legacy-Old-0");
        assert_eq!(first.notes[1].id, "legacy-Old-1");
    }

    #[test]
    fn test_parse_nothing_to_migrate() {
        assert_eq!(parse_legacy(r#"{"wallStyle":"grid"}"#, "b").unwrap(), None);
        assert_eq!(parse_legacy(r#"{"notes":"nope"}"#, "b").unwrap(), None);
        assert_eq!(parse_legacy("42", "b").unwrap(), None);
        assert!(parse_legacy("{broken", "b").is_err());
    }
}
