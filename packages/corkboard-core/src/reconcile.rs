/// Board folder <-> in-memory notes synchronization.
///
/// Saving writes only what changed:
/// - header differs from the cached header -> overwrite without reading
/// - header and content fingerprint match the cache -> skip, no read
/// - otherwise read the file and compare bytes, overwrite on mismatch
///
/// Notes are written in fixed-size batches; writes within a batch run
/// concurrently on the calling task, batches run in sequence. Orphaned note
/// files are trashed only after every batch has settled.
use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::join_all;

use crate::cache::{CachedNote, ContentFingerprint, MetadataCache};
use crate::codec;
use crate::error::{Result, StorageError};
use crate::paths;
use crate::types::{Note, NoteHeader};
use crate::vault::{EntryKind, EntryMeta, Vault};

/// Notes written (or read) concurrently per batch.
pub const SAVE_BATCH_SIZE: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveAction {
    Created,
    Updated,
    Unchanged,
}

/// Result of saving one note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub path: String,
    pub action: SaveAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Orphaned note files moved to the trash.
    pub trashed: Vec<String>,
    /// `(note id, error)` for notes that could not be saved.
    pub failed: Vec<(String, String)>,
}

impl SaveReport {
    fn count(&mut self, action: SaveAction) {
        match action {
            SaveAction::Created => self.created += 1,
            SaveAction::Updated => self.updated += 1,
            SaveAction::Unchanged => self.unchanged += 1,
        }
    }

    pub fn writes(&self) -> usize {
        self.created + self.updated
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Where a note will be written and what is there now.
struct Target {
    path: String,
    meta: Option<EntryMeta>,
    cached: Option<CachedNote>,
    /// Full content, when it had to be read to identify the file.
    content: Option<String>,
}

pub struct Reconciler<V: Vault> {
    vault: Arc<V>,
    cache: Arc<MetadataCache>,
}

impl<V: Vault> Reconciler<V> {
    pub fn new(vault: Arc<V>, cache: Arc<MetadataCache>) -> Self {
        Self { vault, cache }
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// Decide whether the existing file at `path` backs note `id`.
    /// Consults the cache first and reads the file only on a miss.
    async fn identify(
        &self,
        path: &str,
        meta: EntryMeta,
        id: &str,
    ) -> Result<Option<Target>> {
        if let Some(cached) = self.cache.lookup(path, &meta) {
            if cached.header.id != id {
                return Ok(None);
            }
            return Ok(Some(Target {
                path: path.to_string(),
                meta: Some(meta),
                cached: Some(cached),
                content: None,
            }));
        }

        let content = self.vault.read(path).await?;
        match codec::decode_header(&content) {
            Some(header) if header.id == id => Ok(Some(Target {
                path: path.to_string(),
                meta: Some(meta),
                cached: None,
                content: Some(content),
            })),
            _ => Ok(None),
        }
    }

    async fn resolve_target(&self, board_dir: &str, note: &Note) -> Result<Target> {
        if note.is_persisted() {
            let path = paths::normalize_path(&note.file_path);
            match self.vault.stat(&path).await? {
                Some(meta) if meta.is_file() => {
                    if let Some(target) = self.identify(&path, meta, &note.id).await? {
                        return Ok(target);
                    }
                    log::warn!(
                        "[corkboard.reconcile] {} no longer backs note {}, relocating",
                        path,
                        note.id
                    );
                }
                _ => log::debug!(
                    "[corkboard.reconcile] Backing file {} for note {} is gone, re-creating",
                    path,
                    note.id
                ),
            }
        }

        let name = paths::note_file_name(&note.id);
        let base = paths::join(board_dir, &name);
        let candidates = std::iter::once(base.clone())
            .chain(paths::dedup_candidates(&name).map(|n| paths::join(board_dir, &n)));

        for path in candidates {
            match self.vault.stat(&path).await? {
                None => {
                    return Ok(Target {
                        path,
                        meta: None,
                        cached: None,
                        content: None,
                    })
                }
                Some(meta) if meta.is_folder() => {
                    if path == base {
                        return Err(StorageError::OccupiedPath(path));
                    }
                }
                Some(meta) => {
                    if let Some(target) = self.identify(&path, meta, &note.id).await? {
                        return Ok(target);
                    }
                }
            }
        }
        Err(StorageError::AlreadyExists(base))
    }

    /// Write `content` and re-record the cache entry from what was written.
    async fn write(&self, path: &str, header: NoteHeader, content: &str, create: bool) -> Result<()> {
        self.cache.invalidate(path);
        if create {
            self.vault.create(path, content).await?;
        } else {
            self.vault.modify(path, content).await?;
        }
        if let Some(meta) = self.vault.stat(path).await? {
            self.cache.record(path, header, content, meta);
        }
        Ok(())
    }

    /// Bring the backing file of one note in line with the note.
    pub async fn save_note(&self, board_dir: &str, note: &Note) -> Result<SaveOutcome> {
        let board_dir = paths::normalize_path(board_dir);
        let content = codec::encode_note(note);
        let header = note.header();
        let target = self.resolve_target(&board_dir, note).await?;
        let path = target.path;

        let meta = match target.meta {
            None => {
                self.write(&path, header, &content, true).await?;
                log::debug!("[corkboard.reconcile] Created {}", path);
                return Ok(SaveOutcome {
                    path,
                    action: SaveAction::Created,
                });
            }
            Some(meta) => meta,
        };

        let current = match (target.cached, target.content) {
            (_, Some(current)) => current,
            (Some(cached), None) => {
                if cached.header != header {
                    self.write(&path, header, &content, false).await?;
                    log::debug!("[corkboard.reconcile] Header changed, rewrote {}", path);
                    return Ok(SaveOutcome {
                        path,
                        action: SaveAction::Updated,
                    });
                }
                if cached.fingerprint == ContentFingerprint::from_content(&content) {
                    return Ok(SaveOutcome {
                        path,
                        action: SaveAction::Unchanged,
                    });
                }
                self.vault.read(&path).await?
            }
            (None, None) => self.vault.read(&path).await?,
        };

        if current == content {
            self.cache.record(&path, header, &current, meta);
            return Ok(SaveOutcome {
                path,
                action: SaveAction::Unchanged,
            });
        }

        self.write(&path, header, &content, false).await?;
        log::debug!("[corkboard.reconcile] Content changed, rewrote {}", path);
        Ok(SaveOutcome {
            path,
            action: SaveAction::Updated,
        })
    }

    /// Save every note of a board and trash orphaned note files.
    ///
    /// Per-note failures are logged and reported, never propagated. Storage
    /// locators of created or relocated notes are written back into `notes`.
    pub async fn save_board(&self, board_dir: &str, notes: &mut [Note]) -> Result<SaveReport> {
        let board_dir = paths::normalize_path(board_dir);
        match self.vault.stat(&board_dir).await? {
            Some(meta) if meta.is_folder() => {}
            Some(_) => return Err(StorageError::OccupiedPath(board_dir)),
            None => self.vault.create_folder(&board_dir).await?,
        }

        let mut report = SaveReport::default();
        let mut touched: HashSet<String> = HashSet::new();
        let mut failed_ids: HashSet<String> = HashSet::new();

        for batch in notes.chunks_mut(SAVE_BATCH_SIZE) {
            let results = join_all(batch.iter().map(|note| self.save_note(&board_dir, note))).await;

            for (note, result) in batch.iter_mut().zip(results) {
                match result {
                    Ok(outcome) => {
                        report.count(outcome.action);
                        if note.file_path != outcome.path {
                            note.file_path = outcome.path.clone();
                        }
                        touched.insert(outcome.path);
                    }
                    Err(e) => {
                        log::warn!(
                            "[corkboard.reconcile] Failed to save note {}: {}",
                            note.id,
                            e
                        );
                        if note.is_persisted() {
                            touched.insert(paths::normalize_path(&note.file_path));
                        }
                        failed_ids.insert(note.id.clone());
                        report.failed.push((note.id.clone(), e.to_string()));
                    }
                }
            }
        }

        report.trashed = self.trash_orphans(&board_dir, &touched, &failed_ids).await?;

        log::info!(
            "[corkboard.reconcile] Saved {}: {} created, {} updated, {} unchanged, {} trashed, {} failed",
            board_dir,
            report.created,
            report.updated,
            report.unchanged,
            report.trashed.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Header of the note file at `path`, or `None` if it is not a note file.
    async fn note_header(&self, path: &str) -> Result<Option<NoteHeader>> {
        let meta = match self.vault.stat(path).await? {
            Some(meta) if meta.is_file() => meta,
            _ => return Ok(None),
        };
        if let Some(cached) = self.cache.lookup(path, &meta) {
            return Ok(Some(cached.header));
        }
        let content = self.vault.read(path).await?;
        let header = codec::decode_header(&content);
        if let Some(h) = &header {
            self.cache.record(path, h.clone(), &content, meta);
        }
        Ok(header)
    }

    async fn trash_orphans(
        &self,
        board_dir: &str,
        touched: &HashSet<String>,
        failed_ids: &HashSet<String>,
    ) -> Result<Vec<String>> {
        let candidates: Vec<String> = self
            .vault
            .list(board_dir)
            .await?
            .into_iter()
            .filter(|e| e.kind == EntryKind::File && paths::is_note_file(&e.path))
            .filter(|e| !touched.contains(&e.path))
            .map(|e| e.path)
            .collect();

        let mut orphans = Vec::new();
        for batch in candidates.chunks(SAVE_BATCH_SIZE) {
            let headers = join_all(batch.iter().map(|p| self.note_header(p))).await;
            for (path, header) in batch.iter().zip(headers) {
                match header {
                    Ok(Some(h)) if !failed_ids.contains(&h.id) => orphans.push(path.clone()),
                    Ok(_) => {}
                    Err(e) => log::warn!(
                        "[corkboard.reconcile] Could not inspect {}: {}",
                        path,
                        e
                    ),
                }
            }
        }

        let results = join_all(orphans.iter().map(|p| self.vault.trash(p))).await;
        let mut trashed = Vec::new();
        for (path, result) in orphans.into_iter().zip(results) {
            match result {
                Ok(()) => {
                    self.cache.invalidate(&path);
                    log::debug!("[corkboard.reconcile] Trashed orphan {}", path);
                    trashed.push(path);
                }
                Err(e) => log::warn!(
                    "[corkboard.reconcile] Failed to trash orphan {}: {}",
                    path,
                    e
                ),
            }
        }
        Ok(trashed)
    }

    async fn load_note(&self, path: &str) -> Result<Option<Note>> {
        let meta = match self.vault.stat(path).await? {
            Some(meta) if meta.is_file() => meta,
            _ => return Ok(None),
        };
        let content = self.vault.read(path).await?;
        let Some(mut note) = codec::decode_note(&content) else {
            return Ok(None);
        };
        self.cache.record(path, note.header(), &content, meta);
        note.file_path = path.to_string();
        Ok(Some(note))
    }

    /// Read every note file of a board folder, ordered by file path.
    /// Files that cannot be read are logged and skipped.
    pub async fn load_board(&self, board_dir: &str) -> Result<Vec<Note>> {
        let board_dir = paths::normalize_path(board_dir);
        let files: Vec<String> = self
            .vault
            .list(&board_dir)
            .await?
            .into_iter()
            .filter(|e| e.kind == EntryKind::File && paths::is_note_file(&e.path))
            .map(|e| e.path)
            .collect();

        let mut notes = Vec::new();
        for batch in files.chunks(SAVE_BATCH_SIZE) {
            let results = join_all(batch.iter().map(|p| self.load_note(p))).await;
            for (path, result) in batch.iter().zip(results) {
                match result {
                    Ok(Some(note)) => notes.push(note),
                    Ok(None) => {}
                    Err(e) => log::warn!("[corkboard.reconcile] Failed to load {}: {}", path, e),
                }
            }
        }
        log::info!(
            "[corkboard.reconcile] Loaded {} notes from {}",
            notes.len(),
            board_dir
        );
        Ok(notes)
    }
}
