// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Flat JSON key/value file. Writes go through a temp file and a rename so a
/// crash never leaves a half-written preference file behind.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>, AppError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(AppError::Config(format!(
                    "Failed to read preferences {}: {e}",
                    self.path.display()
                )));
            }
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => {
                tracing::warn!(
                    target: "config",
                    path = %self.path.display(),
                    "preference file is not a JSON object; ignoring it"
                );
                Ok(Map::new())
            }
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, AppError> {
        Ok(self.read_all()?.get(key).and_then(Value::as_bool))
    }

    pub fn set_bool(&self, key: &str, value: bool) -> Result<(), AppError> {
        let mut map = self.read_all()?;
        map.insert(key.to_string(), Value::Bool(value));
        self.write_all(&map)
    }

    fn write_all(&self, map: &Map<String, Value>) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Config(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }
        let body = serde_json::to_string_pretty(map)
            .map_err(|e| AppError::Config(format!("Failed to encode preferences: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|e| {
                AppError::Config(format!(
                    "Failed to write preferences {}: {e}",
                    self.path.display()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_unset() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::new(dir.path().join("preferences.json"));
        assert_eq!(store.get_bool("eoaModeEnabled").unwrap(), None);
    }

    #[test]
    fn set_persists_and_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("preferences.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"theme":"dark"}"#).unwrap();

        let store = PreferenceStore::new(&path);
        store.set_bool("eoaModeEnabled", true).unwrap();

        let reopened = PreferenceStore::new(&path);
        assert_eq!(reopened.get_bool("eoaModeEnabled").unwrap(), Some(true));
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"theme\": \"dark\""));
    }

    #[test]
    fn corrupt_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        fs::write(&path, "[1,2,3]").unwrap();
        let store = PreferenceStore::new(&path);
        assert_eq!(store.get_bool("eoaModeEnabled").unwrap(), None);
        store.set_bool("eoaModeEnabled", false).unwrap();
        assert_eq!(store.get_bool("eoaModeEnabled").unwrap(), Some(false));
    }
}
