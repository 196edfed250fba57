//! Task list data model
//!
//! A [`TaskList`] is a transient working copy of the list file: it is built
//! empty, filled by [`TaskList::load`], mutated, optionally written back with
//! [`TaskList::save`] and then dropped. Mutations never touch the disk on their
//! own; the caller decides when to persist.
//!
//! Items are addressed by positional ID (`index + 1`). Deleting an item shifts
//! the IDs of every item after it down by one.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lock;

/// A single entry in the list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    /// Description, fixed at creation
    pub task: String,

    /// Completion flag
    #[serde(default)]
    pub done: bool,

    /// When the item was added
    pub created_at: DateTime<Utc>,

    /// When the item was marked complete
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskItem {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            done: false,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Ordered, insertion-order list of task items
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskList {
    items: Vec<TaskItem>,
}

impl TaskList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with the list stored at `path`
    ///
    /// A missing or empty file is an empty list, which is how a fresh
    /// deployment starts out.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                self.items.clear();
                return Ok(());
            }
            Err(err) => return Err(Error::Io(err)),
        };

        if content.trim().is_empty() {
            self.items.clear();
            return Ok(());
        }

        self.items = serde_json::from_str(&content)?;
        Ok(())
    }

    /// Write the full list to `path`, replacing whatever was there
    ///
    /// Goes through a temp file and a rename so a crash mid-write leaves the
    /// previous document intact.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.items)?;
        lock::write_atomic(path, json.as_bytes())
    }

    /// Append a new, incomplete item
    pub fn add(&mut self, task: impl Into<String>) {
        self.items.push(TaskItem::new(task));
    }

    /// Mark item `id` done
    ///
    /// # Panics
    /// If `id` is outside `1..=len()`; callers validate first.
    pub fn complete(&mut self, id: usize) {
        let item = &mut self.items[id - 1];
        item.done = true;
        item.completed_at = Some(Utc::now());
    }

    /// Remove item `id`; later items move up one position
    ///
    /// # Panics
    /// If `id` is outside `1..=len()`; callers validate first.
    pub fn delete(&mut self, id: usize) {
        self.items.remove(id - 1);
    }

    /// # Panics
    /// If `id` is outside `1..=len()`; callers validate first.
    pub fn get_one(&self, id: usize) -> &TaskItem {
        &self.items[id - 1]
    }

    pub fn get_all(&self) -> &[TaskItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
