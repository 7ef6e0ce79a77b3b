// src/record/registry.rs

//! Keyed store of process records shared by every caller.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::errors::{ExecError, Result};
use crate::record::{RecordHandle, RecordSnapshot};

/// Process-wide mapping from record identifier to [`RecordHandle`].
///
/// This is a service value, not a global: clone it into every component
/// that needs it. All clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry {
    records: Arc<Mutex<HashMap<String, RecordHandle>>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a record, optionally creating it.
    ///
    /// With `create_if_absent = true` this never returns `None`; creation and
    /// insertion happen under the map lock, so concurrent callers asking for
    /// the same id get the same record.
    pub fn get(&self, id: &str, create_if_absent: bool) -> Option<RecordHandle> {
        let mut records = self.records.lock();
        if let Some(record) = records.get(id) {
            return Some(record.clone());
        }
        if !create_if_absent {
            return None;
        }
        let record = RecordHandle::new();
        records.insert(id.to_string(), record.clone());
        debug!(record = %id, "created process record");
        Some(record)
    }

    pub fn get_or_create(&self, id: &str) -> RecordHandle {
        let mut records = self.records.lock();
        records
            .entry(id.to_string())
            .or_insert_with(|| {
                debug!(record = %id, "created process record");
                RecordHandle::new()
            })
            .clone()
    }

    /// Get or create the record for `id` and mark it queued, in one step
    /// under the map lock so a concurrent sweep cannot drop it in between.
    pub(crate) fn reserve(&self, id: &str) -> RecordHandle {
        let mut records = self.records.lock();
        let record = records
            .entry(id.to_string())
            .or_insert_with(|| {
                debug!(record = %id, "created process record");
                RecordHandle::new()
            })
            .clone();
        record.set_queued(true);
        record
    }

    /// Look up an existing record; unknown ids yield [`ExecError::NotFound`].
    pub fn lookup(&self, id: &str) -> Result<RecordHandle> {
        self.get(id, false)
            .ok_or_else(|| ExecError::NotFound(id.to_string()))
    }

    pub fn snapshot(&self, id: &str) -> Result<RecordSnapshot> {
        self.lookup(id).map(|record| record.snapshot())
    }

    /// Insert or replace the record stored under `id`.
    pub fn put(&self, id: &str, record: RecordHandle) {
        self.records.lock().insert(id.to_string(), record);
    }

    /// Remove a record. Removing an unknown id is a no-op.
    pub fn remove(&self, id: &str) -> Option<RecordHandle> {
        let removed = self.records.lock().remove(id);
        if removed.is_some() {
            debug!(record = %id, "removed process record");
        }
        removed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.lock().contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.records.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Remove settled or never-started records idle for longer than `ttl`.
    ///
    /// Running records and records with a launch waiting for a worker are
    /// never swept. Returns the removed ids.
    pub fn sweep_idle(&self, ttl: Duration) -> Vec<String> {
        let mut records = self.records.lock();
        let stale: Vec<String> = records
            .iter()
            .filter(|(_, record)| {
                record.with(|r| !r.is_running() && !r.is_queued() && r.idle_for() > ttl)
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            records.remove(id);
        }
        if !stale.is_empty() {
            debug!(removed = stale.len(), ?ttl, "swept idle process records");
        }
        stale
    }
}
