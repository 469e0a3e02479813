/// Owned metadata index for note files.
///
/// Keyed by vault path. An entry is only trusted while the file's size and
/// modification stamp still match what was recorded, so edits made outside
/// this process drop out of the cache on the next lookup.
///
/// Known limitation: an external edit that keeps the size and lands within
/// the filesystem's timestamp granularity is not detected.
use std::collections::HashMap;
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use crate::types::NoteHeader;
use crate::vault::EntryMeta;

/// SHA-256 fingerprint of the exact file bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentFingerprint(pub String);

impl ContentFingerprint {
    pub fn from_content(content: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }
}

#[derive(Debug, Clone)]
pub struct CachedNote {
    pub header: NoteHeader,
    pub fingerprint: ContentFingerprint,
    stamp: EntryMeta,
}

#[derive(Default)]
pub struct MetadataCache {
    entries: Mutex<HashMap<String, CachedNote>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached header for `path` if the entry still matches `current`.
    /// A stale entry is evicted.
    pub fn lookup(&self, path: &str, current: &EntryMeta) -> Option<CachedNote> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(path) {
            Some(entry) if entry.stamp == *current => Some(entry.clone()),
            Some(_) => {
                log::debug!("[corkboard.cache] Stale entry for {}", path);
                entries.remove(path);
                None
            }
            None => None,
        }
    }

    /// Record what is now on disk at `path`.
    pub fn record(&self, path: &str, header: NoteHeader, content: &str, stamp: EntryMeta) {
        self.entries.lock().unwrap().insert(
            path.to_string(),
            CachedNote {
                header,
                fingerprint: ContentFingerprint::from_content(content),
                stamp,
            },
        );
    }

    pub fn invalidate(&self, path: &str) {
        self.entries.lock().unwrap().remove(path);
    }

    /// Drop every entry under a folder.
    pub fn invalidate_dir(&self, dir: &str) {
        let prefix = format!("{}/", dir);
        self.entries
            .lock()
            .unwrap()
            .retain(|path, _| !path.starts_with(&prefix));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
