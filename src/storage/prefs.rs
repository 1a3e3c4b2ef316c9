use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

pub const CONTENT_BLURRED_KEY: &str = "contentBlurred";
pub const THEME_KEY: &str = "theme";

const TMP_EXTENSION: &str = "json.tmp";

/// JSON key/value preferences backed by a file, with an in-process map
/// used whenever the file cannot be read or written. Failures are logged
/// and never surface to callers.
#[derive(Debug)]
pub struct PreferenceStore {
    path: Option<PathBuf>,
    memory: Mutex<HashMap<String, Value>>,
}

impl PreferenceStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            memory: Mutex::new(HashMap::new()),
        }
    }

    /// No persistent backing at all; values live until the process exits.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            memory: Mutex::new(HashMap::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        if let Some(path) = &self.path {
            match read_map(path).and_then(|map| decode(&map, key)) {
                Ok(Some(value)) => return value,
                Ok(None) => return default,
                Err(err) => {
                    tracing::warn!(?err, key, "preference file unavailable, using memory");
                }
            }
        }
        self.memory
            .lock()
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or(default)
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(?err, key, "preference value not serializable");
                return;
            }
        };
        if let Some(path) = &self.path {
            let result = read_map(path).and_then(|mut map| {
                map.insert(key.to_string(), value.clone());
                write_map(path, &map)
            });
            match result {
                Ok(()) => return,
                Err(err) => {
                    tracing::warn!(?err, key, "preference file unavailable, using memory");
                }
            }
        }
        self.memory.lock().insert(key.to_string(), value);
    }

    pub fn remove(&self, key: &str) {
        if let Some(path) = &self.path {
            let result = read_map(path).and_then(|mut map| {
                if map.remove(key).is_some() {
                    write_map(path, &map)?;
                }
                Ok(())
            });
            match result {
                Ok(()) => return,
                Err(err) => {
                    tracing::warn!(?err, key, "preference file unavailable, using memory");
                }
            }
        }
        self.memory.lock().remove(key);
    }
}

fn read_map(path: &Path) -> Result<Map<String, Value>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("reading preferences {}", path.display()))
        }
    };
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    serde_json::from_str(&raw).with_context(|| format!("parsing preferences {}", path.display()))
}

fn decode<T: DeserializeOwned>(map: &Map<String, Value>, key: &str) -> Result<Option<T>> {
    map.get(key)
        .map(|value| {
            serde_json::from_value(value.clone())
                .with_context(|| format!("decoding preference '{key}'"))
        })
        .transpose()
}

fn write_map(path: &Path, map: &Map<String, Value>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(map).context("serializing preferences")?;
    let tmp = path.with_extension(TMP_EXTENSION);
    fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}
