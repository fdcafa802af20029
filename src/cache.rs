//! Cross-run "already delivered" cache.
//!
//! Flat JSON file `{ "<key>": { "ts": <unix secs> } }`, read once at start and
//! written once at the end. Records older than the TTL are pruned at load and
//! never reported as live, even if still in memory.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::error::{truncate_diag, CacheError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheRecord {
    pub ts: u64,
}

#[derive(Debug, Clone)]
pub struct SeenCache {
    records: BTreeMap<String, CacheRecord>,
    ttl_secs: u64,
    // keys marked during this run, in order, for rollback
    marked: Vec<String>,
}

impl SeenCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            records: BTreeMap::new(),
            ttl_secs,
            marked: Vec::new(),
        }
    }

    /// Build from existing records, dropping the expired ones.
    pub fn from_records(records: BTreeMap<String, CacheRecord>, ttl_secs: u64, now: u64) -> Self {
        let mut c = Self {
            records,
            ttl_secs,
            marked: Vec::new(),
        };
        c.prune(now);
        c
    }

    /// Read the raw records. A missing file is an empty map.
    pub fn read_records(path: &Path) -> Result<BTreeMap<String, CacheRecord>, CacheError> {
        let s = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if s.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&s)?)
    }

    /// Load and prune. Unreadable or corrupt files are a cold start, not an error.
    pub fn load(path: &Path, ttl_secs: u64, now: u64) -> Self {
        match Self::read_records(path) {
            Ok(records) => {
                let before = records.len();
                let c = Self::from_records(records, ttl_secs, now);
                tracing::info!(
                    target: "cache",
                    path = %path.display(),
                    loaded = before,
                    live = c.len(),
                    "cache loaded"
                );
                c
            }
            Err(e) => {
                tracing::warn!(
                    target: "cache",
                    path = %path.display(),
                    error = %truncate_diag(&e, 120),
                    "cache unreadable, starting cold"
                );
                Self::new(ttl_secs)
            }
        }
    }

    fn is_fresh(&self, rec: &CacheRecord, now: u64) -> bool {
        now.saturating_sub(rec.ts) <= self.ttl_secs
    }

    /// Drop expired records; returns how many were removed.
    pub fn prune(&mut self, now: u64) -> usize {
        let ttl = self.ttl_secs;
        let before = self.records.len();
        self.records
            .retain(|_, rec| now.saturating_sub(rec.ts) <= ttl);
        before - self.records.len()
    }

    /// Present and not expired.
    pub fn is_live(&self, key: &str, now: u64) -> bool {
        self.records
            .get(key)
            .is_some_and(|rec| self.is_fresh(rec, now))
    }

    /// Record a delivery of `key` at `now`.
    pub fn mark(&mut self, key: &str, now: u64) {
        let prev = self
            .records
            .insert(key.to_string(), CacheRecord { ts: now });
        if prev.is_none() {
            self.marked.push(key.to_string());
        }
    }

    /// Keys first marked during this run.
    pub fn marked_this_run(&self) -> &[String] {
        &self.marked
    }

    /// Forget everything first marked during this run (delivery never happened).
    pub fn rollback_run(&mut self) -> usize {
        let keys = std::mem::take(&mut self.marked);
        for k in &keys {
            self.records.remove(k);
        }
        keys.len()
    }

    pub fn get(&self, key: &str) -> Option<CacheRecord> {
        self.records.get(key).copied()
    }

    pub fn records(&self) -> &BTreeMap<String, CacheRecord> {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write atomically (tmp file + rename), creating parent dirs.
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&self.records)?;
        let mut f = fs::File::create(&tmp)?;
        f.write_all(json.as_bytes())?;
        f.sync_all()?;
        fs::rename(tmp, path)?;
        Ok(())
    }
}
