//! Shared clipboard backing the sync hub.
//!
//! Entries live in insertion order; an entry's id is its insertion index,
//! so ids stay dense after deletions and views present the newest entry
//! first.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// A clipboard entry with its current positional id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClipboardEntry {
    pub id: usize,
    pub content: String,
    /// Milliseconds since the Unix epoch at creation.
    pub timestamp: i64,
}

#[derive(Debug)]
struct Entry {
    content: String,
    created_at: i64,
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// In-memory clipboard. Not thread safe; owned by the hub loop.
#[derive(Debug, Default)]
pub struct Clipboard {
    entries: Vec<Entry>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new entry.
    pub fn add(&mut self, content: String) {
        self.entries.push(Entry {
            content,
            created_at: now_millis(),
        });
    }

    /// Remove the entry with the given id. Returns false if no such
    /// entry exists; remaining ids compact.
    pub fn delete(&mut self, id: usize) -> bool {
        if id < self.entries.len() {
            self.entries.remove(id);
            true
        } else {
            false
        }
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries most recent first.
    pub fn entries(&self) -> Vec<ClipboardEntry> {
        self.entries
            .iter()
            .enumerate()
            .rev()
            .map(|(id, entry)| ClipboardEntry {
                id,
                content: entry.content.clone(),
                timestamp: entry.created_at,
            })
            .collect()
    }

    /// Serialize the current entries for a clipboard download.
    pub fn dump_json(&self) -> String {
        serde_json::to_string_pretty(&self.entries()).unwrap_or_else(|_| "[]".to_string())
    }
}
