//! Note Tools
//!
//! `save_note` keeps short notes and `list_notes` reads them back. Both share
//! one in-memory `NoteBook`, which holds at most `capacity` notes and drops
//! the oldest when full.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use agent_core::{Arguments, ParameterSchema, Result as CoreResult, Tool, ToolSchema};

use crate::error::ToolkitError;

const PREVIEW_CHARS: usize = 50;
const MAX_NOTE_CHARS: usize = 4_000;

/// Notes kept before the oldest is evicted
pub const DEFAULT_NOTE_CAPACITY: usize = 100;

/// A saved note
#[derive(Clone, Debug, Serialize)]
pub struct Note {
    pub id: String,
    pub content: String,
    pub saved_at: DateTime<Utc>,
}

/// Bounded note store shared by the note tools
#[derive(Debug)]
pub struct NoteBook {
    notes: Mutex<VecDeque<Note>>,
    capacity: usize,
}

impl Default for NoteBook {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_NOTE_CAPACITY)
    }
}

impl NoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            notes: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Store a note, evicting the oldest when the book is full
    pub fn add(&self, content: impl Into<String>) -> Note {
        let note = Note {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            saved_at: Utc::now(),
        };

        let mut notes = self.notes.lock().unwrap_or_else(PoisonError::into_inner);
        while notes.len() >= self.capacity {
            if let Some(evicted) = notes.pop_front() {
                tracing::debug!(note = %evicted.id, "Note book full, evicted oldest note");
            }
        }
        notes.push_back(note.clone());
        note
    }

    /// Snapshot of every stored note, oldest first
    pub fn notes(&self) -> Vec<Note> {
        self.notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// The `limit` most recent notes, oldest first
    pub fn recent(&self, limit: usize) -> Vec<Note> {
        let notes = self.notes.lock().unwrap_or_else(PoisonError::into_inner);
        notes
            .iter()
            .skip(notes.len().saturating_sub(limit))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.notes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tool for saving notes
#[derive(Debug)]
pub struct SaveNoteTool {
    book: Arc<NoteBook>,
}

impl SaveNoteTool {
    pub fn new(book: Arc<NoteBook>) -> Self {
        Self { book }
    }
}

#[async_trait]
impl Tool for SaveNoteTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "save_note".into(),
            description: "Save a short note for later reference.".into(),
            parameters: vec![ParameterSchema::required("content", "string", "Note text")],
            category: Some("productivity".into()),
            has_side_effects: true,
        }
    }

    async fn execute(&self, args: &Arguments) -> CoreResult<Value> {
        let content = args
            .get("content")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if content.is_empty() {
            return Err(ToolkitError::InvalidInput("note content must not be empty".into()).into());
        }
        if content.chars().count() > MAX_NOTE_CHARS {
            return Err(ToolkitError::InvalidInput(format!(
                "note is longer than {} characters",
                MAX_NOTE_CHARS
            ))
            .into());
        }

        let note = self.book.add(content);
        let preview: String = note.content.chars().take(PREVIEW_CHARS).collect();

        Ok(json!({
            "id": note.id,
            "saved_at": note.saved_at.to_rfc3339(),
            "preview": preview,
        }))
    }
}

/// Tool for reading back recent notes
#[derive(Debug)]
pub struct ListNotesTool {
    book: Arc<NoteBook>,
}

impl ListNotesTool {
    pub fn new(book: Arc<NoteBook>) -> Self {
        Self { book }
    }
}

#[async_trait]
impl Tool for ListNotesTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "list_notes".into(),
            description: "List the most recently saved notes, oldest first.".into(),
            parameters: vec![ParameterSchema::optional("limit", "integer", "Notes to return (1-20)")
                .with_default(json!(5))],
            category: Some("productivity".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, args: &Arguments) -> CoreResult<Value> {
        let limit = args
            .get("limit")
            .and_then(Value::as_f64)
            .map_or(5, |n| n.clamp(1.0, 20.0) as usize);

        let notes = self.book.recent(limit);
        Ok(json!({
            "count": notes.len(),
            "notes": notes,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools(capacity: usize) -> (Arc<NoteBook>, SaveNoteTool, ListNotesTool) {
        let book = Arc::new(NoteBook::with_capacity(capacity));
        (book.clone(), SaveNoteTool::new(book.clone()), ListNotesTool::new(book))
    }

    #[tokio::test]
    async fn test_saves_and_previews() {
        let (book, tool, _) = tools(DEFAULT_NOTE_CAPACITY);
        let long = "x".repeat(120);
        let args = tool.schema().validate(&json!({"content": long})).unwrap();
        let value = tool.execute(&args).await.unwrap();

        assert_eq!(value["preview"].as_str().unwrap().len(), PREVIEW_CHARS);
        assert_eq!(book.len(), 1);
        assert_eq!(book.notes()[0].content.len(), 120);
    }

    #[tokio::test]
    async fn test_empty_or_oversized_note_is_a_fault() {
        let (book, tool, _) = tools(DEFAULT_NOTE_CAPACITY);
        let args = tool.schema().validate(&json!({"content": ""})).unwrap();
        assert!(tool.execute(&args).await.is_err());

        let huge = "y".repeat(MAX_NOTE_CHARS + 1);
        let args = tool.schema().validate(&json!({"content": huge})).unwrap();
        assert!(tool.execute(&args).await.is_err());
        assert!(book.is_empty());
    }

    #[tokio::test]
    async fn test_full_book_evicts_oldest() {
        let (book, save, list) = tools(3);
        for i in 0..10 {
            let args = save.schema().validate(&json!({"content": format!("note {}", i)})).unwrap();
            save.execute(&args).await.unwrap();
        }

        assert_eq!(book.len(), 3);
        let kept: Vec<String> = book.notes().into_iter().map(|n| n.content).collect();
        assert_eq!(kept, vec!["note 7", "note 8", "note 9"]);

        let args = list.schema().validate(&json!({"limit": 2})).unwrap();
        let value = list.execute(&args).await.unwrap();
        assert_eq!(value["count"], 2);
        assert_eq!(value["notes"][0]["content"], "note 8");
        assert_eq!(value["notes"][1]["content"], "note 9");
    }

    #[test]
    fn test_zero_capacity_still_keeps_latest() {
        let book = NoteBook::with_capacity(0);
        book.add("a");
        book.add("b");
        assert_eq!(book.capacity(), 1);
        assert_eq!(book.recent(10)[0].content, "b");
    }
}
