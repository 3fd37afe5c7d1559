//! In-process note collection.
//!
//! Lighter than a repository: one owned map behind an operations facade.
//! Unlike the repositories, [`NoteOperations::get_all`] treats an empty
//! collection as an error so callers must handle "no notes" explicitly.

use std::collections::HashMap;

use thiserror::Error;

use crate::clock::{system_clock, uuid_generator, Clock, IdGenerator};
use crate::error::ValidationError;
use crate::note::{create_note, update_note, NewNote, Note, NotePatch};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoteError {
    #[error("Failed to create note: {0}")]
    Create(ValidationError),
    #[error("Failed to update note: {0}")]
    Update(ValidationError),
    #[error("note with id {0} not found")]
    NotFound(String),
    #[error("no notes found")]
    Empty,
}

pub struct NoteCollection {
    notes: HashMap<String, Note>,
    ids: IdGenerator,
    clock: Clock,
}

impl Default for NoteCollection {
    fn default() -> Self {
        Self::new(uuid_generator(), system_clock())
    }
}

impl NoteCollection {
    pub fn new(ids: IdGenerator, clock: Clock) -> Self {
        Self {
            notes: HashMap::new(),
            ids,
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Returns the facade through which notes are read and mutated.
    pub fn operations(&mut self) -> NoteOperations<'_> {
        NoteOperations { collection: self }
    }
}

pub struct NoteOperations<'a> {
    collection: &'a mut NoteCollection,
}

impl NoteOperations<'_> {
    pub fn get(&self, id: &str) -> Result<Note, NoteError> {
        self.collection
            .notes
            .get(id)
            .cloned()
            .ok_or_else(|| NoteError::NotFound(id.to_string()))
    }

    /// All notes, oldest first. Fails with [`NoteError::Empty`] when there are none.
    pub fn get_all(&self) -> Result<Vec<Note>, NoteError> {
        if self.collection.notes.is_empty() {
            return Err(NoteError::Empty);
        }
        let mut notes: Vec<Note> = self.collection.notes.values().cloned().collect();
        notes.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(notes)
    }

    pub fn add(&mut self, data: NewNote) -> Result<Note, NoteError> {
        let now = (self.collection.clock)();
        let note = create_note(data, &*self.collection.ids, now).map_err(NoteError::Create)?;
        self.collection.notes.insert(note.id.clone(), note.clone());
        Ok(note)
    }

    pub fn update(&mut self, id: &str, patch: NotePatch) -> Result<Note, NoteError> {
        let existing = self.get(id)?;
        let now = (self.collection.clock)();
        let note = update_note(&existing, patch, now).map_err(NoteError::Update)?;
        self.collection.notes.insert(note.id.clone(), note.clone());
        Ok(note)
    }

    /// Removes a note. Removing an unknown id succeeds.
    pub fn remove(&mut self, id: &str) -> Result<(), NoteError> {
        self.collection.notes.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{fixed_clock, sequential_ids};
    use chrono::{TimeZone, Utc};

    fn collection() -> NoteCollection {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        NoteCollection::new(sequential_ids(), fixed_clock(at))
    }

    fn note(content: &str) -> NewNote {
        NewNote {
            content: content.to_string(),
        }
    }

    #[test]
    fn get_all_fails_when_empty() {
        let mut notes = collection();
        assert_eq!(notes.operations().get_all(), Err(NoteError::Empty));
    }

    #[test]
    fn add_then_get() {
        let mut notes = collection();
        let mut ops = notes.operations();
        let created = ops.add(note("Follow up with Acme")).expect("valid note");

        assert_eq!(created.id, "00000000-0000-4000-8000-000000000001");
        assert_eq!(created.created_at, created.updated_at);
        assert_eq!(ops.get(&created.id).unwrap(), created);
        assert_eq!(ops.get_all().unwrap(), vec![created]);
    }

    #[test]
    fn add_rejects_empty_content() {
        let mut notes = collection();
        let err = notes.operations().add(note("")).unwrap_err();
        assert!(err.to_string().starts_with("Failed to create note:"));
        assert!(notes.is_empty());
    }

    #[test]
    fn update_keeps_identity_and_advances_timestamp() {
        let mut notes = collection();
        let mut ops = notes.operations();
        let created = ops.add(note("draft")).unwrap();
        let updated = ops
            .update(
                &created.id,
                NotePatch {
                    content: Some("final".into()),
                },
            )
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(ops.get(&created.id).unwrap().content, "final");
    }

    #[test]
    fn invalid_update_leaves_note_untouched() {
        let mut notes = collection();
        let mut ops = notes.operations();
        let created = ops.add(note("keep me")).unwrap();
        let patch = NotePatch {
            content: Some("   ".into()),
        };
        assert!(matches!(
            ops.update(&created.id, patch),
            Err(NoteError::Update(_))
        ));
        assert_eq!(ops.get(&created.id).unwrap(), created);
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let mut notes = collection();
        let err = notes
            .operations()
            .update("missing", NotePatch::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "note with id missing not found");
    }

    #[test]
    fn remove_is_idempotent() {
        let mut notes = collection();
        let mut ops = notes.operations();
        let created = ops.add(note("temporary")).unwrap();
        ops.remove(&created.id).unwrap();
        ops.remove(&created.id).unwrap();
        assert!(matches!(ops.get(&created.id), Err(NoteError::NotFound(_))));
        assert_eq!(ops.get_all(), Err(NoteError::Empty));
    }

    #[test]
    fn collections_are_isolated() {
        let mut first = collection();
        let mut second = collection();
        first.operations().add(note("only in first")).unwrap();
        assert_eq!(second.operations().get_all(), Err(NoteError::Empty));
    }
}
