//! Persistence of per-slot stream configurations.
//!
//! The logical schema is a flat key-value table, one row per player slot:
//!
//! ```text
//! count   = N
//! uri0    = rtsp://192.168.0.90/axis-media/media.amp
//! name0   = Front door
//! user0   = root
//! pass0   = pass
//! uri1    = ...
//! ```
//!
//! The key-value mechanism itself sits behind [`KvBackend`]. The whole table
//! is the unit of persistence: [`ConfigStore::save`] rewrites every slot and
//! commits once.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::PlayerConfiguration;
use crate::error::{Result, ViewerError};

const KEY_COUNT: &str = "count";

fn row_key(column: &str, slot: usize) -> String {
    format!("{column}{slot}")
}

/// Key-value backend holding the configuration table.
pub trait KvBackend: Send {
    fn get_string(&self, key: &str) -> Option<String>;
    fn get_int(&self, key: &str) -> Option<i64>;
    fn put_string(&mut self, key: &str, value: &str);
    fn put_int(&mut self, key: &str, value: i64);
    /// Make all puts since the last commit durable.
    fn commit(&mut self) -> Result<()>;
}

/// In-process backend. Clones share the same table, so a "restart" can be
/// modelled by building a second store over a clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    table: Arc<Mutex<Map<String, Value>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }
}

impl KvBackend for MemoryBackend {
    fn get_string(&self, key: &str) -> Option<String> {
        self.table.lock().get(key)?.as_str().map(str::to_string)
    }

    fn get_int(&self, key: &str) -> Option<i64> {
        self.table.lock().get(key)?.as_i64()
    }

    fn put_string(&mut self, key: &str, value: &str) {
        self.table
            .lock()
            .insert(key.to_string(), Value::String(value.to_string()));
    }

    fn put_int(&mut self, key: &str, value: i64) {
        self.table.lock().insert(key.to_string(), Value::from(value));
    }

    fn commit(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Backend persisted as a single JSON object on disk.
///
/// Puts are buffered in memory; [`commit`](KvBackend::commit) writes a
/// sibling temporary file and renames it over the target.
#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
    table: Map<String, Value>,
}

impl JsonFileBackend {
    /// Open `path`, treating a missing file as an empty table.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let table = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Map::new(),
            Ok(text) => match serde_json::from_str::<Value>(&text)? {
                Value::Object(map) => map,
                _ => {
                    return Err(ViewerError::Store(format!(
                        "{} does not contain a JSON object",
                        path.display()
                    )));
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), keys = table.len(), "store file opened");
        Ok(Self { path, table })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KvBackend for JsonFileBackend {
    fn get_string(&self, key: &str) -> Option<String> {
        self.table.get(key)?.as_str().map(str::to_string)
    }

    fn get_int(&self, key: &str) -> Option<i64> {
        self.table.get(key)?.as_i64()
    }

    fn put_string(&mut self, key: &str, value: &str) {
        self.table
            .insert(key.to_string(), Value::String(value.to_string()));
    }

    fn put_int(&mut self, key: &str, value: i64) {
        self.table.insert(key.to_string(), Value::from(value));
    }

    fn commit(&mut self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.table)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), "store file written");
        Ok(())
    }
}

/// Ordered table of player configurations over a [`KvBackend`].
pub struct ConfigStore {
    backend: Box<dyn KvBackend>,
    defaults: PlayerConfiguration,
    slots: usize,
}

impl ConfigStore {
    pub fn new(backend: Box<dyn KvBackend>, defaults: PlayerConfiguration, slots: usize) -> Self {
        Self {
            backend,
            defaults,
            slots,
        }
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Read every slot. Slots without a usable URI keep the default
    /// configuration; other columns default to empty strings.
    pub fn load(&self) -> Vec<PlayerConfiguration> {
        if let Some(count) = self.backend.get_int(KEY_COUNT) {
            tracing::debug!(stored = count, slots = self.slots, "loading configuration table");
        }

        (0..self.slots)
            .map(|slot| {
                let uri = match self.backend.get_string(&row_key("uri", slot)) {
                    Some(uri) if !uri.is_empty() => uri,
                    _ => return self.defaults.clone(),
                };
                let config = PlayerConfiguration {
                    uri,
                    user: self.get_column("user", slot),
                    pass: self.get_column("pass", slot),
                    name: self.get_column("name", slot),
                };
                if let Err(e) = config.validate() {
                    tracing::warn!(slot, error = %e, "stored URI rejected, using default");
                    return self.defaults.clone();
                }
                tracing::debug!(slot, uri = %config.uri, "configuration restored");
                config
            })
            .collect()
    }

    fn get_column(&self, column: &str, slot: usize) -> String {
        self.backend
            .get_string(&row_key(column, slot))
            .unwrap_or_default()
    }

    /// Rewrite every slot and commit once.
    ///
    /// `configs` must hold exactly one entry per slot.
    pub fn save(&mut self, configs: &[PlayerConfiguration]) -> Result<()> {
        if configs.len() != self.slots {
            return Err(ViewerError::Store(format!(
                "expected {} entries, got {}",
                self.slots,
                configs.len()
            )));
        }

        self.backend.put_int(KEY_COUNT, configs.len() as i64);
        for (slot, config) in configs.iter().enumerate() {
            self.backend.put_string(&row_key("uri", slot), &config.uri);
            self.backend.put_string(&row_key("name", slot), &config.name);
            self.backend.put_string(&row_key("user", slot), &config.user);
            self.backend.put_string(&row_key("pass", slot), &config.pass);
        }
        self.backend.commit()?;
        tracing::info!(slots = configs.len(), "configuration saved");
        Ok(())
    }
}

/// Runtime intent of one player, captured on suspend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendedSession {
    pub config: PlayerConfiguration,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub desired_playing: bool,
}

/// Short-lived snapshot used instead of the store when the process only
/// suspended rather than exited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendSnapshot {
    pub active: usize,
    pub sessions: Vec<SuspendedSession>,
}

impl SuspendSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
