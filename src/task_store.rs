use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Every user's tasks, keyed by the stringified user id.
///
/// A `BTreeMap` keeps the serialized key order stable, so saving a freshly
/// loaded list reproduces the file byte for byte.
pub type TaskList = BTreeMap<String, Vec<String>>;

/// Errors raised while reading or writing the task file
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read task file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("task file {} is not valid JSON: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write task file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Why a delete request did not remove anything
#[derive(Error, Debug)]
pub enum DeleteError {
    #[error("'{0}' is not a task number")]
    InvalidNumber(String),

    #[error("task number {index} is out of range (list has {len} tasks)")]
    OutOfRange { index: i64, len: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// JSON file backed store of per-user task lists.
///
/// Each operation reloads the whole file, mutates it in memory and writes it
/// back. The cycles are serialized through `lock` so two handlers in this
/// process can never interleave and drop each other's update.
pub struct TaskStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every user's tasks. A missing file is an empty list.
    pub async fn load(&self) -> Result<TaskList, StoreError> {
        let _guard = self.lock.lock().await;
        read_task_file(&self.path)
    }

    /// Replace the stored lists with `tasks`.
    pub async fn save(&self, tasks: &TaskList) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        write_task_file(&self.path, tasks)
    }

    /// Append `text` to the user's list, creating the list on first use.
    ///
    /// Returns the new length of the list.
    pub async fn add_task(&self, user_id: &str, text: &str) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;

        let mut data = read_task_file(&self.path)?;
        let tasks = data.entry(user_id.to_string()).or_default();
        tasks.push(text.to_string());
        let len = tasks.len();

        write_task_file(&self.path, &data)?;
        info!(user_id, len, "Added task");

        Ok(len)
    }

    /// The user's tasks paired with their 1-based display numbers.
    pub async fn list_tasks(&self, user_id: &str) -> Result<Vec<(usize, String)>, StoreError> {
        let tasks = self.tasks(user_id).await?;
        Ok(tasks.into_iter().enumerate().map(|(i, task)| (i + 1, task)).collect())
    }

    /// The user's tasks in stored order, empty if the user never added one.
    pub async fn tasks(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let mut data = self.load().await?;
        Ok(data.remove(user_id).unwrap_or_default())
    }

    /// Remove the task shown at display number `raw_index`.
    ///
    /// `raw_index` is the text the user typed; digits from the scripts in
    /// `DIGIT_ZEROS` count as well as ASCII ones. The file is only rewritten when
    /// a task was actually removed.
    pub async fn delete_task(&self, user_id: &str, raw_index: &str) -> Result<String, DeleteError> {
        let index = parse_index(raw_index).ok_or_else(|| DeleteError::InvalidNumber(raw_index.to_string()))?;

        let _guard = self.lock.lock().await;
        let mut data = read_task_file(&self.path)?;

        let tasks = data.get_mut(user_id);
        let len = tasks.as_ref().map_or(0, |tasks| tasks.len());
        let position = usize::try_from(index)
            .ok()
            .and_then(|index| index.checked_sub(1))
            .filter(|position| *position < len);

        let (Some(tasks), Some(position)) = (tasks, position) else {
            return Err(DeleteError::OutOfRange { index, len });
        };

        let removed = tasks.remove(position);
        write_task_file(&self.path, &data)?;
        info!(user_id, index, "Deleted task");

        Ok(removed)
    }
}

/// First code point of each non-ASCII block of ten decimal digits accepted in
/// task numbers.
const DIGIT_ZEROS: [u32; 20] = [
    0x0660, // Arabic-Indic
    0x06F0, // Extended Arabic-Indic (Persian, Urdu)
    0x07C0, // NKo
    0x0966, // Devanagari
    0x09E6, // Bengali
    0x0A66, // Gurmukhi
    0x0AE6, // Gujarati
    0x0B66, // Oriya
    0x0BE6, // Tamil
    0x0C66, // Telugu
    0x0CE6, // Kannada
    0x0D66, // Malayalam
    0x0E50, // Thai
    0x0ED0, // Lao
    0x0F20, // Tibetan
    0x1040, // Myanmar
    0x17E0, // Khmer
    0x1810, // Mongolian
    0x1946, // Limbu
    0xFF10, // Fullwidth
];

fn parse_index(raw: &str) -> Option<i64> {
    let normalized: String = raw.trim().chars().map(|c| ascii_digit(c).unwrap_or(c)).collect();
    normalized.parse().ok()
}

fn ascii_digit(c: char) -> Option<char> {
    let code = u32::from(c);
    DIGIT_ZEROS
        .iter()
        .find(|zero| (**zero..**zero + 10).contains(&code))
        .and_then(|zero| char::from_digit(code - zero, 10))
}

fn read_task_file(path: &Path) -> Result<TaskList, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Task file {} does not exist yet", path.display());
            return Ok(TaskList::new());
        }
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Write through a temporary file in the same directory and rename it over the
/// target, so a crash mid-write leaves the previous file intact.
fn write_task_file(path: &Path, tasks: &TaskList) -> Result<(), StoreError> {
    let write_error = |source: io::Error| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir).map_err(write_error)?;
    serde_json::to_writer(&mut file, tasks).map_err(|e| write_error(e.into()))?;
    file.flush().map_err(write_error)?;
    file.persist(path).map_err(|e| write_error(e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> TaskStore {
        TaskStore::new(dir.path().join("todo_data.json"))
    }

    #[tokio::test]
    async fn load_without_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert!(store.load().await.unwrap().is_empty());
        assert!(store.list_tasks("42").await.unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn added_task_is_last_after_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.add_task("42", "Buy milk").await.unwrap();
        let len = store.add_task("42", "Buy milk").await.unwrap();
        assert_eq!(len, 2);

        let reopened = store_in(&dir);
        let data = reopened.load().await.unwrap();
        assert_eq!(data["42"], vec!["Buy milk", "Buy milk"]);
    }

    #[tokio::test]
    async fn users_have_separate_lists() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.add_task("1", "a").await.unwrap();
        store.add_task("2", "b").await.unwrap();

        assert_eq!(store.list_tasks("1").await.unwrap(), vec![(1, "a".to_string())]);
        assert_eq!(store.list_tasks("2").await.unwrap(), vec![(1, "b".to_string())]);
    }

    #[tokio::test]
    async fn delete_shifts_later_tasks_down() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        for task in ["one", "two", "three"] {
            store.add_task("7", task).await.unwrap();
        }

        let removed = store.delete_task("7", " 2 ").await.unwrap();
        assert_eq!(removed, "two");

        let listed = store_in(&dir).list_tasks("7").await.unwrap();
        assert_eq!(listed, vec![(1, "one".to_string()), (2, "three".to_string())]);
    }

    #[test]
    fn task_numbers_accept_other_scripts_digits() {
        assert_eq!(parse_index("\u{0661}"), Some(1));
        assert_eq!(parse_index(" \u{0661}\u{0662} "), Some(12));
        assert_eq!(parse_index("\u{06F3}"), Some(3));
        assert_eq!(parse_index("\u{0967}0"), Some(10));
        assert_eq!(parse_index("\u{FF15}"), Some(5));
        assert_eq!(parse_index("-\u{0661}"), Some(-1));
        assert_eq!(parse_index("\u{0661}a"), None);
        assert_eq!(parse_index("\u{00B9}"), None);
        assert_eq!(parse_index(""), None);
    }

    #[tokio::test]
    async fn delete_by_arabic_indic_number() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        for task in ["أول", "ثاني"] {
            store.add_task("7", task).await.unwrap();
        }

        assert_eq!(store.delete_task("7", "\u{0662}").await.unwrap(), "ثاني");
        assert!(matches!(
            store.delete_task("7", "\u{0665}").await,
            Err(DeleteError::OutOfRange { index: 5, len: 1 })
        ));
        assert_eq!(store.tasks("7").await.unwrap(), vec!["أول"]);
    }

    #[tokio::test]
    async fn rejected_delete_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.add_task("7", "only").await.unwrap();
        let before = fs::read(store.path()).unwrap();

        for raw in ["0", "2", "-1", "99999999999999999999"] {
            let err = store.delete_task("7", raw).await.unwrap_err();
            assert!(
                matches!(err, DeleteError::OutOfRange { .. } | DeleteError::InvalidNumber(_)),
                "{raw}: {err}"
            );
        }
        assert!(matches!(
            store.delete_task("7", "first").await,
            Err(DeleteError::InvalidNumber(_))
        ));
        assert!(matches!(
            store.delete_task("8", "1").await,
            Err(DeleteError::OutOfRange { index: 1, len: 0 })
        ));

        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn save_of_loaded_list_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.add_task("b", "ünïcode \"quoted\"").await.unwrap();
        store.add_task("a", "second user").await.unwrap();
        let before = fs::read(store.path()).unwrap();

        let data = store.load().await.unwrap();
        store.save(&data).await.unwrap();

        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn reads_lists_written_by_other_tools() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), r#"{"42": ["مهمة", "x"], "43": []}"#).unwrap();

        assert_eq!(store.tasks("42").await.unwrap(), vec!["مهمة", "x"]);
        assert!(store.tasks("43").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "{not json").unwrap();

        assert!(matches!(store.load().await, Err(StoreError::Corrupt { .. })));
        assert!(matches!(
            store.delete_task("1", "1").await,
            Err(DeleteError::Store(StoreError::Corrupt { .. }))
        ));
    }

    #[tokio::test]
    async fn concurrent_adds_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(store_in(&dir));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let user_id = format!("user{}", i % 4);
                    let task = i.to_string();
                    store.add_task(&user_id, &task).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let data = store.load().await.unwrap();
        assert_eq!(data.values().map(Vec::len).sum::<usize>(), 16);
    }
}
