use crate::error::{Result, TodoError};
use crate::task::{normalize_category, normalize_title, NewTask, Priority, Task, TaskPatch};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::Path;

pub const UNCATEGORIZED: &str = "uncategorized";
const ID_SPACE_EXHAUSTED: &str = "task id space exhausted";

/// On-disk layout. `next_id` is persisted so ids are never reused.
#[derive(Deserialize, Debug)]
struct Document {
    #[serde(default)]
    next_id: u64,
    tasks: Vec<Task>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Ascending due date, undated tasks last.
    Due,
    /// High, then medium, then low.
    Priority,
}

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub category: Option<String>,
    pub priority: Option<Priority>,
    pub done: Option<bool>,
    pub sort: Option<SortKey>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub done: usize,
    pub pending: usize,
    /// Pending tasks per priority; every priority is present.
    pub by_priority: BTreeMap<Priority, usize>,
    /// Pending tasks per category.
    pub by_category: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Store {
    next_id: u64,
    tasks: Vec<Task>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            next_id: 1,
            tasks: Vec::new(),
        }
    }
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the task file. A missing or blank file is an empty store.
    ///
    /// Accepts both the `{ "next_id", "tasks" }` document and a bare array
    /// of tasks.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no task file at {}, starting empty", path.display());
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path).map_err(|e| TodoError::storage(path, e))?;
        if content.trim().is_empty() {
            return Ok(Self::new());
        }

        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| TodoError::storage(path, e))?;
        let doc = if value.is_array() {
            Document {
                next_id: 0,
                tasks: serde_json::from_value(value).map_err(|e| TodoError::storage(path, e))?,
            }
        } else {
            serde_json::from_value(value).map_err(|e| TodoError::storage(path, e))?
        };

        let mut seen = HashSet::new();
        for task in &doc.tasks {
            if !seen.insert(task.id) {
                return Err(TodoError::storage(path, format!("duplicate task id {}", task.id)));
            }
        }
        let mut floor = 1;
        for task in &doc.tasks {
            let after = task
                .id
                .checked_add(1)
                .ok_or_else(|| TodoError::storage(path, ID_SPACE_EXHAUSTED))?;
            floor = floor.max(after);
        }
        let store = Self {
            next_id: doc.next_id.max(floor),
            tasks: doc.tasks,
        };
        log::debug!("loaded {} task(s) from {}", store.tasks.len(), path.display());
        Ok(store)
    }

    /// Rewrites the whole task file: temp file in the same directory, fsync,
    /// then rename over the target.
    pub fn save(&self, path: &Path) -> Result<()> {
        let doc = DocumentRef {
            next_id: self.next_id,
            tasks: &self.tasks,
        };
        let content = serde_json::to_string_pretty(&doc).map_err(|e| TodoError::storage(path, e))?;

        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = dir {
            fs::create_dir_all(dir).map_err(|e| TodoError::storage(path, e))?;
        }
        let file_name = path
            .file_name()
            .ok_or_else(|| TodoError::storage(path, "path has no file name"))?;
        let temp_name = format!(".{}.tmp.{}", file_name.to_string_lossy(), std::process::id());
        let temp_path = match dir {
            Some(dir) => dir.join(temp_name),
            None => temp_name.into(),
        };

        let write = || -> std::io::Result<()> {
            {
                let mut file = fs::File::create(&temp_path)?;
                file.write_all(content.as_bytes())?;
                file.write_all(b"\n")?;
                file.sync_all()?;
            }
            fs::rename(&temp_path, path)?;
            #[cfg(unix)]
            {
                if let Some(dir) = dir {
                    fs::File::open(dir)?.sync_all()?;
                }
            }
            Ok(())
        };
        if let Err(e) = write() {
            let _ = fs::remove_file(&temp_path);
            return Err(TodoError::storage(path, e));
        }
        log::debug!("saved {} task(s) to {}", self.tasks.len(), path.display());
        Ok(())
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    #[cfg(test)]
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    #[cfg(test)]
    pub fn get(&self, id: u64) -> Result<&Task> {
        self.tasks
            .iter()
            .find(|t| t.id == id)
            .ok_or(TodoError::NotFound(id))
    }

    fn get_mut(&mut self, id: u64) -> Result<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(TodoError::NotFound(id))
    }

    pub fn add(&mut self, new: NewTask) -> Result<&Task> {
        let next_id = self
            .next_id
            .checked_add(1)
            .ok_or_else(|| TodoError::validation(ID_SPACE_EXHAUSTED))?;
        let task = Task {
            id: self.next_id,
            title: normalize_title(&new.title)?,
            priority: new.priority,
            due_date: new.due_date,
            category: new.category.as_deref().and_then(normalize_category),
            done: false,
            created_at: Local::now().naive_local(),
        };
        self.next_id = next_id;
        log::info!("added task #{}", task.id);
        self.tasks.push(task);
        Ok(&self.tasks[self.tasks.len() - 1])
    }

    /// Applies `patch` to the task. Nothing changes unless every field is valid.
    pub fn edit(&mut self, id: u64, patch: TaskPatch) -> Result<&Task> {
        if patch.is_empty() {
            return Err(TodoError::validation("nothing to update"));
        }
        let title = patch.title.as_deref().map(normalize_title).transpose()?;
        let task = self.get_mut(id)?;
        if let Some(title) = title {
            task.title = title;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = due_date;
        }
        if let Some(category) = patch.category {
            task.category = category.as_deref().and_then(normalize_category);
        }
        log::info!("edited task #{}", id);
        Ok(&*task)
    }

    pub fn delete(&mut self, id: u64) -> Result<Task> {
        let index = self
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(TodoError::NotFound(id))?;
        log::info!("deleted task #{}", id);
        Ok(self.tasks.remove(index))
    }

    pub fn mark_done(&mut self, id: u64) -> Result<&Task> {
        self.set_done(id, true)
    }

    pub fn mark_undone(&mut self, id: u64) -> Result<&Task> {
        self.set_done(id, false)
    }

    fn set_done(&mut self, id: u64, done: bool) -> Result<&Task> {
        let task = self.get_mut(id)?;
        task.done = done;
        log::info!("task #{} done={}", id, done);
        Ok(&*task)
    }

    /// Removes every completed task and returns how many were dropped.
    pub fn clear_completed(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| !t.done);
        let removed = before - self.tasks.len();
        log::info!("cleared {} completed task(s)", removed);
        removed
    }

    pub fn list(&self, query: &ListQuery) -> Vec<&Task> {
        let category = query.category.as_deref().and_then(normalize_category);
        let mut tasks: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| category.is_none() || t.category == category)
            .filter(|t| query.priority.map_or(true, |p| t.priority == p))
            .filter(|t| query.done.map_or(true, |d| t.done == d))
            .collect();

        // sort_by_key is stable, so ties keep insertion order.
        match query.sort {
            Some(SortKey::Due) => tasks.sort_by_key(|t| (t.due_date.is_none(), t.due_date)),
            Some(SortKey::Priority) => tasks.sort_by_key(|t| t.priority),
            None => {}
        }
        tasks
    }

    pub fn stats(&self) -> Stats {
        let mut by_priority: BTreeMap<Priority, usize> =
            Priority::ALL.iter().map(|p| (*p, 0)).collect();
        let mut by_category = BTreeMap::new();
        let mut done = 0;

        for task in &self.tasks {
            if task.done {
                done += 1;
                continue;
            }
            *by_priority.entry(task.priority).or_default() += 1;
            let category = task.category.clone().unwrap_or_else(|| UNCATEGORIZED.to_string());
            *by_category.entry(category).or_default() += 1;
        }

        Stats {
            total: self.tasks.len(),
            done,
            pending: self.tasks.len() - done,
            by_priority,
            by_category,
        }
    }
}

/// Serialized form of `Document`, borrowing the task list.
#[derive(Serialize)]
struct DocumentRef<'a> {
    next_id: u64,
    tasks: &'a [Task],
}
