use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::{SettingsFile, Task, TasksFile};

const CACHE_FILE: &str = "cache.json";
const SETTINGS_FILE: &str = "settings.json";
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Local key-value persistence for the task list. Only ever a pre-load cache: the remote
/// collection always supersedes it.
pub trait TaskCache: Send + Sync {
    fn get(&self) -> Option<Vec<Task>>;
    fn put(&self, tasks: &[Task]);
}

/// JSON files under one data directory.
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_dirs(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn load_tasks(&self) -> Result<TasksFile, StorageError> {
        self.load_json(self.root.join(CACHE_FILE))
    }

    pub fn load_settings(&self) -> Result<SettingsFile, StorageError> {
        self.load_json(self.root.join(SETTINGS_FILE))
    }

    pub fn save_tasks(&self, data: &TasksFile) -> Result<(), StorageError> {
        self.write_atomic(self.root.join(CACHE_FILE), data)
    }

    pub fn save_settings(&self, data: &SettingsFile) -> Result<(), StorageError> {
        self.write_atomic(self.root.join(SETTINGS_FILE), data)
    }

    fn load_json<T: DeserializeOwned>(&self, path: PathBuf) -> Result<T, StorageError> {
        let mut file = File::open(path)?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        Ok(serde_json::from_str(&buf)?)
    }

    fn write_atomic<T: Serialize>(&self, path: PathBuf, data: &T) -> Result<(), StorageError> {
        let temp_path = path.with_extension("tmp");
        let json = serde_json::to_vec_pretty(data)?;
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(temp_path, path)?;
        Ok(())
    }
}

impl TaskCache for Storage {
    fn get(&self) -> Option<Vec<Task>> {
        match self.load_tasks() {
            Ok(file) => Some(file.tasks),
            Err(StorageError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                log::warn!("ignoring unreadable task cache dir={} error={err}", self.root.display());
                None
            }
        }
    }

    fn put(&self, tasks: &[Task]) {
        let file = TasksFile {
            schema_version: SCHEMA_VERSION,
            tasks: tasks.to_vec(),
        };
        if let Err(err) = self.ensure_dirs().and_then(|()| self.save_tasks(&file)) {
            log::warn!("failed to write task cache dir={} error={err}", self.root.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Settings;

    #[test]
    fn cache_round_trips_through_the_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("nested"));
        assert!(storage.get().is_none());

        let tasks = vec![
            Task::new(1, "a"),
            Task {
                id: 2,
                text: "b".to_string(),
                completed: true,
            },
        ];
        storage.put(&tasks);
        assert!(dir.path().join("nested").join("cache.json").is_file());
        assert!(!dir.path().join("nested").join("cache.tmp").exists());
        assert_eq!(storage.get(), Some(tasks));

        let file = storage.load_tasks().unwrap();
        assert_eq!(file.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn corrupt_cache_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cache.json"), b"{ not json").unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        assert!(matches!(storage.load_tasks(), Err(StorageError::Json(_))));
        assert!(storage.get().is_none());
    }

    #[test]
    fn put_swallows_write_failures() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the cache file should be makes the rename fail.
        fs::create_dir_all(dir.path().join("cache.json")).unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        storage.put(&[Task::new(1, "a")]);
        assert!(dir.path().join("cache.json").is_dir());
    }

    #[test]
    fn settings_round_trip_and_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        assert!(matches!(storage.load_settings(), Err(StorageError::Io(_))));

        let settings = Settings {
            api_url: "http://tasks.internal".to_string(),
            page_size: 10,
            ..Settings::default()
        };
        storage
            .save_settings(&SettingsFile {
                schema_version: SCHEMA_VERSION,
                settings: settings.clone(),
            })
            .unwrap();
        assert_eq!(storage.load_settings().unwrap().settings, settings);
    }
}
