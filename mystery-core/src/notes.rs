//! The player's notebook.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: u32,
    pub content: String,
}

/// Free-form notes. There is always at least one note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notebook {
    notes: Vec<Note>,
    next_id: u32,
}

impl Default for Notebook {
    fn default() -> Self {
        Self {
            notes: vec![Note {
                id: 1,
                content: String::new(),
            }],
            next_id: 2,
        }
    }
}

impl Notebook {
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn get(&self, id: u32) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    /// Append an empty note and return its id.
    pub fn add(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        self.notes.push(Note {
            id,
            content: String::new(),
        });
        id
    }

    /// Replace a note's text. Returns false for an unknown id.
    pub fn update(&mut self, id: u32, content: impl Into<String>) -> bool {
        match self.notes.iter_mut().find(|n| n.id == id) {
            Some(note) => {
                note.content = content.into();
                true
            }
            None => false,
        }
    }

    /// Remove a note. The last remaining note is kept.
    pub fn delete(&mut self, id: u32) -> bool {
        if self.notes.len() <= 1 {
            return false;
        }
        let before = self.notes.len();
        self.notes.retain(|n| n.id != id);
        self.notes.len() != before
    }

    /// Repair a notebook loaded from an older or edited save.
    pub(crate) fn normalize(&mut self) {
        if self.notes.is_empty() {
            *self = Self::default();
            return;
        }
        let max = self.notes.iter().map(|n| n.id).max().unwrap_or(0);
        if max == u32::MAX {
            // no room above the highest id
            for (note, id) in self.notes.iter_mut().zip(1..) {
                note.id = id;
            }
            self.next_id = self.notes.len() as u32 + 1;
            return;
        }
        self.next_id = self.next_id.max(max + 1);
    }
}
