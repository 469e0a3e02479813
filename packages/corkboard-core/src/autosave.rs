/// Debounced board saving.
///
/// Each request replaces the board's pending snapshot and re-arms its timer;
/// the snapshot is saved once the board has been quiet for the delay.
/// Saved snapshots (with storage locators filled in) are broadcast so the
/// owner of the notes can fold the locators back in.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;

use crate::reconcile::SaveReport;
use crate::types::Note;
use crate::vault::Vault;
use crate::workspace::Corkboard;

pub const AUTOSAVE_DELAY: Duration = Duration::from_secs(1);

/// A finished save.
#[derive(Debug, Clone)]
pub struct SavedSnapshot {
    pub board: String,
    pub notes: Vec<Note>,
    pub report: SaveReport,
}

struct Pending {
    notes: Vec<Note>,
    generation: u64,
}

pub struct AutoSaver<V: Vault + 'static> {
    corkboard: Arc<Corkboard<V>>,
    delay: Duration,
    pending: Arc<Mutex<HashMap<String, Pending>>>,
    generation: Arc<AtomicU64>,
    saved_tx: broadcast::Sender<SavedSnapshot>,
}

impl<V: Vault + 'static> AutoSaver<V> {
    pub fn new(corkboard: Arc<Corkboard<V>>) -> Self {
        Self::with_delay(corkboard, AUTOSAVE_DELAY)
    }

    pub fn with_delay(corkboard: Arc<Corkboard<V>>, delay: Duration) -> Self {
        let (saved_tx, _) = broadcast::channel(64);
        Self {
            corkboard,
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(1)),
            saved_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SavedSnapshot> {
        self.saved_tx.subscribe()
    }

    pub fn has_pending(&self, board: &str) -> bool {
        self.pending.lock().unwrap().contains_key(board)
    }

    /// Schedule a save of `notes` for `board`, superseding any pending one.
    /// Must be called from within a tokio runtime.
    pub fn request(&self, board: &str, notes: Vec<Note>) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        self.pending
            .lock()
            .unwrap()
            .insert(board.to_string(), Pending { notes, generation });

        let corkboard = self.corkboard.clone();
        let pending = self.pending.clone();
        let saved_tx = self.saved_tx.clone();
        let delay = self.delay;
        let board = board.to_string();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let due = {
                let mut pending = pending.lock().unwrap();
                match pending.get(&board) {
                    Some(p) if p.generation == generation => pending.remove(&board),
                    _ => None,
                }
            };
            if let Some(p) = due {
                save_and_publish(&corkboard, &saved_tx, board, p.notes).await;
            }
        });
    }

    /// Save every pending snapshot now.
    ///
    /// A board whose save fails does not stop the others; its snapshot goes
    /// back to pending (unless a newer request replaced it) and the failure
    /// is reported.
    pub async fn flush(&self) -> FlushReport {
        let drained: Vec<(String, Pending)> = self.pending.lock().unwrap().drain().collect();
        let mut report = FlushReport::default();
        for (board, p) in drained {
            let mut notes = p.notes.clone();
            match self.corkboard.save_board(&board, &mut notes).await {
                Ok(save) => {
                    let snapshot = SavedSnapshot {
                        board,
                        notes,
                        report: save,
                    };
                    let _ = self.saved_tx.send(snapshot.clone());
                    report.saved.push(snapshot);
                }
                Err(e) => {
                    log::warn!("[corkboard.autosave] Flush of {} failed: {}", board, e);
                    report.failed.push((board.clone(), e.to_string()));
                    self.pending.lock().unwrap().entry(board).or_insert(p);
                }
            }
        }
        report
    }
}

/// Outcome of [`AutoSaver::flush`].
#[derive(Debug, Clone, Default)]
pub struct FlushReport {
    pub saved: Vec<SavedSnapshot>,
    /// `(board, error)` for snapshots left pending.
    pub failed: Vec<(String, String)>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

async fn save_and_publish<V: Vault>(
    corkboard: &Corkboard<V>,
    saved_tx: &broadcast::Sender<SavedSnapshot>,
    board: String,
    mut notes: Vec<Note>,
) {
    match corkboard.save_board(&board, &mut notes).await {
        Ok(report) => {
            if !report.is_clean() {
                log::warn!(
                    "[corkboard.autosave] {} note(s) on {} were not saved",
                    report.failed.len(),
                    board
                );
            }
            let _ = saved_tx.send(SavedSnapshot {
                board,
                notes,
                report,
            });
        }
        Err(e) => log::error!("[corkboard.autosave] Save of {} failed: {}", board, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{PluginSettings, Settings};
    use crate::store::NoteStore;
    use crate::vault::MemoryVault;

    async fn setup() -> (Arc<MemoryVault>, AutoSaver<MemoryVault>) {
        let vault = Arc::new(MemoryVault::new());
        let corkboard = Arc::new(Corkboard::new(
            vault.clone(),
            Settings::in_memory(PluginSettings::default()),
        ));
        corkboard.create_board("Ideas").await.unwrap();
        (vault, AutoSaver::new(corkboard))
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_requests_collapse_into_one_save() {
        let (vault, saver) = setup().await;
        let mut rx = saver.subscribe();

        saver.request("Ideas", vec![Note::new("a").with_content("v1")]);
        tokio::time::sleep(AUTOSAVE_DELAY / 2).await;
        saver.request("Ideas", vec![Note::new("a").with_content("v2")]);
        assert!(saver.has_pending("Ideas"));

        let saved = rx.recv().await.unwrap();
        assert_eq!(saved.board, "Ideas");
        assert_eq!(saved.report.created, 1);
        assert_eq!(vault.stats().creates, 1);
        assert!(vault.file("Corkboard/Ideas/a.md").unwrap().ends_with("v2"));
        assert!(!saver.has_pending("Ideas"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_saves_immediately_and_locators_flow_back() {
        let (vault, saver) = setup().await;
        let mut store = NoteStore::new();
        store.add(Note::new("a")).unwrap();

        saver.request("Ideas", store.snapshot());
        let flushed = saver.flush().await;
        assert!(flushed.is_clean());
        let saved = flushed.saved;
        assert_eq!(saved.len(), 1);
        assert!(vault.contains("Corkboard/Ideas/a.md"));

        assert_eq!(store.apply_locators(&saved[0].notes), 1);
        assert_eq!(store.get("a").unwrap().file_path, "Corkboard/Ideas/a.md");

        // The timer fires later but finds nothing left to save.
        tokio::time::sleep(AUTOSAVE_DELAY * 2).await;
        assert_eq!(vault.stats().creates, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_failure_spares_other_boards() {
        let (vault, saver) = setup().await;
        // A file where the board folder should be makes that save fail.
        vault.put_file("Corkboard/Blocked", "not a folder");

        saver.request("Blocked", vec![Note::new("x")]);
        saver.request("Ideas", vec![Note::new("a")]);
        let flushed = saver.flush().await;

        assert_eq!(flushed.saved.len(), 1);
        assert_eq!(flushed.saved[0].board, "Ideas");
        assert_eq!(flushed.failed.len(), 1);
        assert_eq!(flushed.failed[0].0, "Blocked");
        assert!(vault.contains("Corkboard/Ideas/a.md"));
        assert!(saver.has_pending("Blocked"));
        assert!(!saver.has_pending("Ideas"));
    }
}
