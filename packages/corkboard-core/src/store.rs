/// In-memory notes of one open board.
///
/// Single owner; the reconciler works on a [`NoteStore::snapshot`] and the
/// owner folds storage locators back in with [`NoteStore::apply_locators`].
use crate::codec;
use crate::error::{Result, StorageError};
use crate::types::Note;

#[derive(Debug, Clone, Default)]
pub struct NoteStore {
    notes: Vec<Note>,
    straightened: bool,
}

impl NoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt loaded notes. A board counts as straightened when any note
    /// carries a pre-straighten rotation.
    pub fn from_notes(notes: Vec<Note>) -> Self {
        let straightened = notes.iter().any(|n| n.original_rotation.is_some());
        Self {
            notes,
            straightened,
        }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn next_id(&self) -> String {
        loop {
            let id = codec::generate_id();
            if self.get(&id).is_none() {
                return id;
            }
        }
    }

    /// Append a note. Identifiers must be unique within the board.
    pub fn add(&mut self, mut note: Note) -> Result<&Note> {
        if note.id.is_empty() {
            note.id = self.next_id();
        }
        if self.get(&note.id).is_some() {
            return Err(StorageError::AlreadyExists(note.id));
        }
        if self.straightened && note.original_rotation.is_none() {
            note.original_rotation = Some(note.rotation);
            note.rotation = 0.0;
        }
        self.notes.push(note);
        Ok(&self.notes[self.notes.len() - 1])
    }

    /// Edit a note in place. The identifier and locator cannot change.
    pub fn update(&mut self, id: &str, f: impl FnOnce(&mut Note)) -> Result<()> {
        let note = self
            .notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        let (id, file_path) = (note.id.clone(), note.file_path.clone());
        f(&mut *note);
        note.id = id;
        note.file_path = file_path;
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<Note> {
        let idx = self.notes.iter().position(|n| n.id == id)?;
        Some(self.notes.remove(idx))
    }

    pub fn snapshot(&self) -> Vec<Note> {
        self.notes.clone()
    }

    /// Copy storage locators from a saved snapshot, matched by id.
    /// Returns how many notes changed.
    pub fn apply_locators(&mut self, saved: &[Note]) -> usize {
        let mut changed = 0;
        for saved_note in saved.iter().filter(|n| n.is_persisted()) {
            if let Some(note) = self.notes.iter_mut().find(|n| n.id == saved_note.id) {
                if note.file_path != saved_note.file_path {
                    note.file_path = saved_note.file_path.clone();
                    changed += 1;
                }
            }
        }
        changed
    }

    pub fn is_straightened(&self) -> bool {
        self.straightened
    }

    /// Straighten every note (remembering its rotation) or restore the
    /// remembered rotations.
    pub fn set_straightened(&mut self, on: bool) {
        if on == self.straightened {
            return;
        }
        for note in &mut self.notes {
            if on {
                if note.original_rotation.is_none() {
                    note.original_rotation = Some(note.rotation);
                }
                note.rotation = 0.0;
            } else if let Some(original) = note.original_rotation.take() {
                note.rotation = original;
            }
        }
        self.straightened = on;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotated(id: &str, rotation: f64) -> Note {
        Note {
            rotation,
            ..Note::new(id)
        }
    }

    #[test]
    fn test_add_rejects_duplicate_ids() {
        let mut store = NoteStore::new();
        store.add(Note::new("a")).unwrap();
        assert!(store.add(Note::new("a")).is_err());
        let generated = store.add(Note::new("")).unwrap().id.clone();
        assert!(generated.starts_with("note-"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_update_keeps_identity() {
        let mut store = NoteStore::new();
        store.add(Note::new("a")).unwrap();
        store
            .update("a", |n| {
                n.id = "hijack".to_string();
                n.content = "edited".to_string();
            })
            .unwrap();
        assert_eq!(store.get("a").unwrap().content, "edited");
        assert!(store.update("missing", |_| {}).is_err());
    }

    #[test]
    fn test_straighten_round_trip() {
        let mut store = NoteStore::new();
        store.add(rotated("a", 5.0)).unwrap();
        store.add(rotated("b", -2.5)).unwrap();

        store.set_straightened(true);
        assert!(store.notes().iter().all(|n| n.rotation == 0.0));
        assert_eq!(store.get("a").unwrap().original_rotation, Some(5.0));

        // Notes added while straightened join the straight layout.
        store.add(rotated("c", 9.0)).unwrap();
        assert_eq!(store.get("c").unwrap().rotation, 0.0);

        store.set_straightened(false);
        assert_eq!(store.get("a").unwrap().rotation, 5.0);
        assert_eq!(store.get("b").unwrap().rotation, -2.5);
        assert_eq!(store.get("c").unwrap().rotation, 9.0);
        assert!(store.notes().iter().all(|n| n.original_rotation.is_none()));
    }

    #[test]
    fn test_from_notes_detects_straightened() {
        let mut note = Note::new("a");
        note.original_rotation = Some(3.0);
        assert!(NoteStore::from_notes(vec![note]).is_straightened());
        assert!(!NoteStore::from_notes(vec![Note::new("b")]).is_straightened());
    }

    #[test]
    fn test_apply_locators() {
        let mut store = NoteStore::new();
        store.add(Note::new("a")).unwrap();
        store.add(Note::new("b")).unwrap();

        let mut saved = store.snapshot();
        saved[0].file_path = "Corkboard/Ideas/a.md".to_string();
        store.remove("b");

        assert_eq!(store.apply_locators(&saved), 1);
        assert_eq!(store.get("a").unwrap().file_path, "Corkboard/Ideas/a.md");
        assert_eq!(store.apply_locators(&saved), 0);
    }
}
