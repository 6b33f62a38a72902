// ============================================================================
// Draft Persistence
// ============================================================================
//
// One versioned JSON record per (site, work log) pair in a key-value store.
// Saves are debounced; v1 records are upgraded on read and rewritten.

use crate::config::EditorConfig;
use crate::debounce::Debouncer;
use crate::document::DocumentForm;
use crate::error::{CertError, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const SAVE_DEBOUNCE_MS: u64 = 600;

/// Current on-disk record version.
pub const DRAFT_VERSION: u64 = 2;

const KEY_PREFIX: &str = "completion-cert-draft";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DraftKey {
    pub site_id: String,
    pub work_log_id: String,
}

impl DraftKey {
    pub fn new(site_id: impl Into<String>, work_log_id: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            work_log_id: work_log_id.into(),
        }
    }

    pub fn storage_key(&self) -> String {
        format!("{}:{}:{}", KEY_PREFIX, self.site_id, self.work_log_id)
    }

    pub fn source_key(&self) -> String {
        format!("{}:{}", self.site_id, self.work_log_id)
    }
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRecord {
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    pub source_key: String,
    pub form: DocumentForm,
}

/// v1 kept the confirmation date as an ISO `YYYY-MM-DD` string.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FormV1 {
    site_name: String,
    company_name: String,
    work_period: String,
    work_content: String,
    notes: String,
    signer_name: String,
    confirm_date: String,
    recipient: String,
    signature_raster: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftRecordV1 {
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    source_key: String,
    #[serde(default)]
    form: FormV1,
}

impl DraftRecordV1 {
    fn upgrade(self) -> DraftRecord {
        let f = self.form;
        DraftRecord {
            version: DRAFT_VERSION,
            updated_at: self.updated_at.unwrap_or_else(Utc::now),
            source_key: self.source_key,
            form: DocumentForm {
                site_name: f.site_name,
                company_name: f.company_name,
                work_period: f.work_period,
                work_content: f.work_content,
                notes: f.notes,
                signer_name: f.signer_name,
                confirm_date_text: localize_date(&f.confirm_date),
                recipient: f.recipient,
                signature_raster: f.signature_raster,
            },
        }
    }
}

/// `2024-05-01` -> `2024년 5월 1일`. Anything unparsable is kept as is.
pub fn localize_date(iso: &str) -> String {
    match NaiveDate::parse_from_str(iso.trim(), "%Y-%m-%d") {
        Ok(date) => format_localized(date),
        Err(_) => {
            if !iso.is_empty() {
                warn!(value = %iso, "v1 date is not ISO, carrying over verbatim");
            }
            iso.to_string()
        }
    }
}

pub fn format_localized(date: NaiveDate) -> String {
    format!("{}년 {}월 {}일", date.year(), date.month(), date.day())
}

enum Parsed {
    Current(DraftRecord),
    Migrated(DraftRecord),
}

fn parse_record(raw: &str) -> Result<Parsed> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    // Records written before versioning have no `version` at all.
    let version = match value.get("version") {
        None => 1,
        Some(v) => v
            .as_u64()
            .ok_or_else(|| CertError::DraftError(format!("Invalid draft version: {}", v)))?,
    };
    match version {
        1 => {
            let v1: DraftRecordV1 = serde_json::from_value(value)?;
            Ok(Parsed::Migrated(v1.upgrade()))
        }
        DRAFT_VERSION => Ok(Parsed::Current(serde_json::from_value(value)?)),
        other => Err(CertError::UnsupportedDraftVersion(other)),
    }
}

// ============================================================================
// Key-Value Stores
// ============================================================================

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: String) -> Result<()>;
    fn keys(&self) -> Result<Vec<String>>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }
}

/// All entries in one JSON object on disk. A missing file is an empty store.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content)
            .map_err(|e| CertError::DraftError(format!("{}: {}", self.path.display(), e)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.read_all()?.into_keys().collect())
    }
}

// ============================================================================
// Draft Store
// ============================================================================

pub struct DraftStore<S: KeyValueStore> {
    store: S,
    pending: Debouncer<(DraftKey, DocumentForm)>,
}

impl<S: KeyValueStore> std::fmt::Debug for DraftStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftStore")
            .field("pending", &self.pending.pending().map(|(k, _)| k))
            .finish_non_exhaustive()
    }
}

impl<S: KeyValueStore> DraftStore<S> {
    pub fn new(store: S, debounce: Duration) -> Self {
        Self {
            store,
            pending: Debouncer::new(debounce),
        }
    }

    pub fn from_config(store: S, config: &EditorConfig) -> Self {
        Self::new(store, Duration::from_millis(config.save_debounce_ms))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Latest record for `key`. A v1 record comes back upgraded and is
    /// rewritten as v2 before returning.
    pub fn load(&mut self, key: &DraftKey) -> Result<Option<DraftRecord>> {
        self.load_raw(&key.storage_key())
    }

    fn load_raw(&mut self, storage_key: &str) -> Result<Option<DraftRecord>> {
        let Some(raw) = self.store.get(storage_key)? else {
            return Ok(None);
        };
        match parse_record(&raw)? {
            Parsed::Current(record) => Ok(Some(record)),
            Parsed::Migrated(record) => {
                self.store.set(storage_key, serde_json::to_string(&record)?)?;
                info!(key = %storage_key, "Migrated v1 draft to v{}", DRAFT_VERSION);
                Ok(Some(record))
            }
        }
    }

    /// Overwrite the record for `key` immediately.
    pub fn save_now(&mut self, key: &DraftKey, form: &DocumentForm) -> Result<DraftRecord> {
        let record = DraftRecord {
            version: DRAFT_VERSION,
            updated_at: Utc::now(),
            source_key: key.source_key(),
            form: form.clone(),
        };
        self.store.set(&key.storage_key(), serde_json::to_string(&record)?)?;
        debug!(key = %key.storage_key(), "Draft saved");
        Ok(record)
    }

    /// Debounced save. A pending save for a different key is written first.
    pub fn schedule_save(&mut self, key: &DraftKey, form: &DocumentForm, now: Instant) -> Result<()> {
        if self.pending.pending().is_some_and(|(pending, _)| pending != key) {
            self.flush()?;
        }
        self.pending.schedule(now, (key.clone(), form.clone()));
        Ok(())
    }

    /// Write the pending save if its window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Result<Option<DraftRecord>> {
        match self.pending.poll(now) {
            Some((key, form)) => self.save_now(&key, &form).map(Some),
            None => Ok(None),
        }
    }

    pub fn flush(&mut self) -> Result<Option<DraftRecord>> {
        match self.pending.flush() {
            Some((key, form)) => self.save_now(&key, &form).map(Some),
            None => Ok(None),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_pending()
    }

    /// The record a session should start from. A scoped session only gets a
    /// record whose `sourceKey` is its own; an unscoped one gets the most
    /// recently updated record across all keys.
    pub fn restore(&mut self, session: Option<&DraftKey>) -> Result<Option<DraftRecord>> {
        match session {
            Some(key) => {
                let record = self.load(key)?;
                Ok(record.filter(|r| {
                    let matches = r.source_key == key.source_key();
                    if !matches {
                        warn!(expected = %key.source_key(), found = %r.source_key, "Draft belongs to another session");
                    }
                    matches
                }))
            }
            None => {
                let prefix = format!("{}:", KEY_PREFIX);
                let keys: Vec<String> = self
                    .store
                    .keys()?
                    .into_iter()
                    .filter(|k| k.starts_with(&prefix))
                    .collect();
                let mut latest: Option<DraftRecord> = None;
                for key in keys {
                    match self.load_raw(&key) {
                        Ok(Some(record)) => {
                            if latest.as_ref().map_or(true, |l| record.updated_at > l.updated_at) {
                                latest = Some(record);
                            }
                        }
                        Ok(None) => {}
                        Err(e) => warn!(key = %key, error = %e, "Skipping unreadable draft"),
                    }
                }
                Ok(latest)
            }
        }
    }
}
