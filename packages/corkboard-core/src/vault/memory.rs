/// In-memory vault.
///
/// Used as the I/O double in tests and by embedders without a filesystem.
/// Every trait call is counted in [`IoStats`]; `put_*` helpers seed content
/// without touching the counters.
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Entry, EntryKind, EntryMeta, Vault};
use crate::error::{Result, StorageError};
use crate::paths;

/// Per-operation call counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoStats {
    pub stats: usize,
    pub lists: usize,
    pub folder_creates: usize,
    pub creates: usize,
    pub modifies: usize,
    pub reads: usize,
    pub renames: usize,
    pub trashes: usize,
}

impl IoStats {
    /// Calls that changed file content.
    pub fn writes(&self) -> usize {
        self.creates + self.modifies
    }
}

#[derive(Debug, Clone)]
enum Node {
    File { content: String, modified: u128 },
    Folder,
}

#[derive(Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    trashed: Vec<(String, Option<String>)>,
    stats: IoStats,
    clock: u128,
    failing: HashSet<String>,
}

impl State {
    fn tick(&mut self) -> u128 {
        self.clock += 1;
        self.clock
    }

    fn ensure_parents(&mut self, path: &str) -> Result<()> {
        let mut dir = paths::parent(path);
        let mut missing = Vec::new();
        while !dir.is_empty() {
            match self.nodes.get(&dir) {
                Some(Node::Folder) => break,
                Some(Node::File { .. }) => return Err(StorageError::OccupiedPath(dir)),
                None => {
                    missing.push(dir.clone());
                    dir = paths::parent(&dir);
                }
            }
        }
        for d in missing {
            self.nodes.insert(d, Node::Folder);
        }
        Ok(())
    }

    fn write_file(&mut self, path: &str, content: &str) -> Result<()> {
        self.ensure_parents(path)?;
        let modified = self.tick();
        self.nodes.insert(
            path.to_string(),
            Node::File {
                content: content.to_string(),
                modified,
            },
        );
        Ok(())
    }

    fn check_failing(&self, path: &str) -> Result<()> {
        if self.failing.contains(path) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("injected failure for {}", path),
            )));
        }
        Ok(())
    }

    fn descendants(&self, path: &str) -> Vec<String> {
        let prefix = format!("{}/", path);
        self.nodes
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect()
    }
}

#[derive(Default)]
pub struct MemoryVault {
    state: Mutex<State>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> IoStats {
        self.state.lock().unwrap().stats
    }

    pub fn reset_stats(&self) {
        self.state.lock().unwrap().stats = IoStats::default();
    }

    /// Seed or externally edit a file without counting I/O.
    pub fn put_file(&self, path: &str, content: &str) {
        let path = paths::normalize_path(path);
        let _ = self.state.lock().unwrap().write_file(&path, content);
    }

    /// Seed a folder without counting I/O.
    pub fn put_folder(&self, path: &str) {
        let path = paths::normalize_path(path);
        let mut state = self.state.lock().unwrap();
        if state.ensure_parents(&path).is_ok() {
            state.nodes.insert(path, Node::Folder);
        }
    }

    /// Content of a file, bypassing the counters.
    pub fn file(&self, path: &str) -> Option<String> {
        match self.state.lock().unwrap().nodes.get(&paths::normalize_path(path)) {
            Some(Node::File { content, .. }) => Some(content.clone()),
            _ => None,
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .nodes
            .contains_key(&paths::normalize_path(path))
    }

    /// Paths moved to the trash, in order.
    pub fn trashed(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .trashed
            .iter()
            .map(|(p, _)| p.clone())
            .collect()
    }

    /// Make every create/modify/trash of `path` fail with an I/O error.
    pub fn fail_writes_to(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(paths::normalize_path(path));
    }

    /// Undo every [`MemoryVault::fail_writes_to`].
    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failing.clear();
    }
}

#[async_trait]
impl Vault for MemoryVault {
    async fn stat(&self, path: &str) -> Result<Option<EntryMeta>> {
        let path = paths::normalize_path(path);
        let mut state = self.state.lock().unwrap();
        state.stats.stats += 1;
        if path.is_empty() {
            return Ok(Some(EntryMeta {
                kind: EntryKind::Folder,
                size: 0,
                modified: 0,
            }));
        }
        Ok(state.nodes.get(&path).map(|node| match node {
            Node::File { content, modified } => EntryMeta {
                kind: EntryKind::File,
                size: content.len() as u64,
                modified: *modified,
            },
            Node::Folder => EntryMeta {
                kind: EntryKind::Folder,
                size: 0,
                modified: 0,
            },
        }))
    }

    async fn list(&self, dir: &str) -> Result<Vec<Entry>> {
        let dir = paths::normalize_path(dir);
        let mut state = self.state.lock().unwrap();
        state.stats.lists += 1;
        if !dir.is_empty() && !matches!(state.nodes.get(&dir), Some(Node::Folder)) {
            return Err(StorageError::NotFound(dir));
        }
        Ok(state
            .nodes
            .iter()
            .filter(|(path, _)| paths::parent(path) == dir)
            .filter(|(path, _)| !paths::file_name(path).starts_with('.'))
            .map(|(path, node)| Entry {
                path: path.clone(),
                kind: match node {
                    Node::File { .. } => EntryKind::File,
                    Node::Folder => EntryKind::Folder,
                },
            })
            .collect())
    }

    async fn create_folder(&self, path: &str) -> Result<()> {
        let path = paths::normalize_path(path);
        let mut state = self.state.lock().unwrap();
        state.stats.folder_creates += 1;
        match state.nodes.get(&path) {
            Some(Node::Folder) => Ok(()),
            Some(Node::File { .. }) => Err(StorageError::AlreadyExists(path)),
            None => {
                state.ensure_parents(&path)?;
                state.nodes.insert(path, Node::Folder);
                Ok(())
            }
        }
    }

    async fn create(&self, path: &str, content: &str) -> Result<()> {
        tokio::task::yield_now().await;
        let path = paths::normalize_path(path);
        let mut state = self.state.lock().unwrap();
        state.stats.creates += 1;
        state.check_failing(&path)?;
        if state.nodes.contains_key(&path) {
            return Err(StorageError::AlreadyExists(path));
        }
        state.write_file(&path, content)
    }

    async fn modify(&self, path: &str, content: &str) -> Result<()> {
        tokio::task::yield_now().await;
        let path = paths::normalize_path(path);
        let mut state = self.state.lock().unwrap();
        state.stats.modifies += 1;
        state.check_failing(&path)?;
        match state.nodes.get(&path) {
            Some(Node::File { .. }) => state.write_file(&path, content),
            Some(Node::Folder) => Err(StorageError::OccupiedPath(path)),
            None => Err(StorageError::NotFound(path)),
        }
    }

    async fn read(&self, path: &str) -> Result<String> {
        tokio::task::yield_now().await;
        let path = paths::normalize_path(path);
        let mut state = self.state.lock().unwrap();
        state.stats.reads += 1;
        match state.nodes.get(&path) {
            Some(Node::File { content, .. }) => Ok(content.clone()),
            _ => Err(StorageError::NotFound(path)),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from = paths::normalize_path(from);
        let to = paths::normalize_path(to);
        let mut state = self.state.lock().unwrap();
        state.stats.renames += 1;
        if state.nodes.contains_key(&to) {
            return Err(StorageError::AlreadyExists(to));
        }
        let node = state
            .nodes
            .remove(&from)
            .ok_or_else(|| StorageError::NotFound(from.clone()))?;
        for child in state.descendants(&from) {
            if let Some(n) = state.nodes.remove(&child) {
                let moved = format!("{}{}", to, &child[from.len()..]);
                state.nodes.insert(moved, n);
            }
        }
        state.ensure_parents(&to)?;
        state.nodes.insert(to, node);
        Ok(())
    }

    async fn trash(&self, path: &str) -> Result<()> {
        tokio::task::yield_now().await;
        let path = paths::normalize_path(path);
        let mut state = self.state.lock().unwrap();
        state.stats.trashes += 1;
        state.check_failing(&path)?;
        let node = state
            .nodes
            .remove(&path)
            .ok_or_else(|| StorageError::NotFound(path.clone()))?;
        for child in state.descendants(&path) {
            state.nodes.remove(&child);
        }
        let content = match node {
            Node::File { content, .. } => Some(content),
            Node::Folder => None,
        };
        state.trashed.push((path, content));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_calls_but_not_seeding() {
        let vault = MemoryVault::new();
        vault.put_file("b/a.md", "seed");
        assert_eq!(vault.stats(), IoStats::default());

        vault.read("b/a.md").await.unwrap();
        vault.modify("b/a.md", "next").await.unwrap();
        let stats = vault.stats();
        assert_eq!(stats.reads, 1);
        assert_eq!(stats.modifies, 1);
        assert_eq!(stats.writes(), 1);
        assert_eq!(vault.file("b/a.md").as_deref(), Some("next"));
    }

    #[tokio::test]
    async fn test_modify_bumps_stamp() {
        let vault = MemoryVault::new();
        vault.put_file("a.md", "x");
        let before = vault.stat("a.md").await.unwrap().unwrap();
        vault.modify("a.md", "y").await.unwrap();
        let after = vault.stat("a.md").await.unwrap().unwrap();
        assert!(after.modified > before.modified);
    }

    #[tokio::test]
    async fn test_list_immediate_children_only() {
        let vault = MemoryVault::new();
        vault.put_file("root/a/1.md", "");
        vault.put_file("root/b.md", "");
        let entries = vault.list("root").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(names, vec!["root/a", "root/b.md"]);
        assert!(vault.list("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_trash_folder_removes_children() {
        let vault = MemoryVault::new();
        vault.put_file("root/a/1.md", "");
        vault.trash("root/a").await.unwrap();
        assert!(!vault.contains("root/a/1.md"));
        assert_eq!(vault.trashed(), vec!["root/a".to_string()]);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let vault = MemoryVault::new();
        vault.fail_writes_to("a.md");
        assert!(vault.create("a.md", "x").await.is_err());
        assert!(!vault.contains("a.md"));
    }

    #[tokio::test]
    async fn test_rename_moves_children() {
        let vault = MemoryVault::new();
        vault.put_file("old/1.md", "one");
        vault.rename("old", "new").await.unwrap();
        assert_eq!(vault.file("new/1.md").as_deref(), Some("one"));
        assert!(!vault.contains("old"));
    }
}
