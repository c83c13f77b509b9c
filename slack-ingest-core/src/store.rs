//! File persistence for [`IngestState`].
//!
//! Two small files survive restarts:
//!
//! * the watermark file holds the raw `ts` string of the newest accepted
//!   event (nothing else, no trailing newline);
//! * the seen-ids file holds a JSON document of `{id, seen_at}` entries.
//!   A plain newline-separated id list is still accepted on load.
//!
//! Both files are replaced atomically (temp file in the same directory,
//! then rename).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::state::{IngestState, RetentionPolicy, SeenEntry, SeenIds, SlackTs, Watermark};

/// Current seen-ids file schema.
pub const SEEN_IDS_SCHEMA_VERSION: u32 = 1;

/// Errors that can occur while loading or saving state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem error
    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// State could not be encoded or decoded
    #[error("invalid state file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Seen-ids file written by a newer version
    #[error("unsupported seen-ids schema in {path}: expected {expected}, found {found}")]
    UnsupportedSchema {
        path: PathBuf,
        expected: u32,
        found: u32,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct SeenIdsFile {
    schema_version: u32,
    #[serde(default)]
    entries: Vec<SeenEntry>,
}

/// Loads and saves [`IngestState`] as two files.
#[derive(Debug, Clone)]
pub struct StateStore {
    watermark_path: PathBuf,
    seen_ids_path: PathBuf,
    policy: RetentionPolicy,
}

impl StateStore {
    pub fn new(
        watermark_path: impl Into<PathBuf>,
        seen_ids_path: impl Into<PathBuf>,
        policy: RetentionPolicy,
    ) -> Self {
        Self {
            watermark_path: watermark_path.into(),
            seen_ids_path: seen_ids_path.into(),
            policy,
        }
    }

    pub fn watermark_path(&self) -> &Path {
        &self.watermark_path
    }

    pub fn seen_ids_path(&self) -> &Path {
        &self.seen_ids_path
    }

    /// Load persisted state.
    ///
    /// The two files are independent: a missing or unreadable one falls
    /// back to its empty value without touching the other.
    pub fn load(&self, now: i64) -> IngestState {
        let watermark = self.load_watermark().unwrap_or_else(|e| {
            warn!(error = %e, "Watermark unavailable, starting unset");
            Watermark::default()
        });
        let seen_ids = self.load_seen_ids(now).unwrap_or_else(|e| {
            warn!(error = %e, "Seen ids unavailable, starting empty");
            SeenIds::new(self.policy)
        });
        debug!(
            watermark = ?watermark.get().map(SlackTs::as_str),
            seen_ids = seen_ids.len(),
            "Loaded ingest state"
        );
        IngestState {
            watermark,
            seen_ids,
        }
    }

    /// Persist `state`, replacing both files.
    pub fn save(&self, state: &IngestState) -> Result<(), StoreError> {
        if let Some(ts) = state.watermark.get() {
            write_atomic(&self.watermark_path, ts.as_str().as_bytes())?;
        }

        let file = SeenIdsFile {
            schema_version: SEEN_IDS_SCHEMA_VERSION,
            entries: state.seen_ids.entries().cloned().collect(),
        };
        let payload = serde_json::to_vec(&file).map_err(|source| StoreError::Json {
            path: self.seen_ids_path.clone(),
            source,
        })?;
        write_atomic(&self.seen_ids_path, &payload)
    }

    fn load_watermark(&self) -> Result<Watermark, StoreError> {
        let Some(raw) = read_optional(&self.watermark_path)? else {
            return Ok(Watermark::default());
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Watermark::default());
        }
        match raw.parse::<SlackTs>() {
            Ok(ts) => Ok(Watermark::new(Some(ts))),
            Err(e) => {
                warn!(
                    path = %self.watermark_path.display(),
                    error = %e,
                    "Ignoring unreadable watermark"
                );
                Ok(Watermark::default())
            }
        }
    }

    fn load_seen_ids(&self, now: i64) -> Result<SeenIds, StoreError> {
        let Some(raw) = read_optional(&self.seen_ids_path)? else {
            return Ok(SeenIds::new(self.policy));
        };
        let trimmed = raw.trim();

        if !trimmed.starts_with('{') {
            // Plain id-per-line list; the ids carry no timestamp, so they
            // start their retention period now.
            let entries = trimmed
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(|id| SeenEntry {
                    id: id.into(),
                    seen_at: now,
                });
            return Ok(SeenIds::from_entries(entries, self.policy, now));
        }

        let file: SeenIdsFile =
            serde_json::from_str(trimmed).map_err(|source| StoreError::Json {
                path: self.seen_ids_path.clone(),
                source,
            })?;
        if file.schema_version != SEEN_IDS_SCHEMA_VERSION {
            return Err(StoreError::UnsupportedSchema {
                path: self.seen_ids_path.clone(),
                expected: SEEN_IDS_SCHEMA_VERSION,
                found: file.schema_version,
            });
        }
        Ok(SeenIds::from_entries(file.entries, self.policy, now))
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Io {
            action: "failed to read",
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Write `contents` to `path` via a sibling temp file and rename.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let io_err = |action: &'static str, path: &Path| {
        let path = path.to_path_buf();
        move |source| StoreError::Io {
            action,
            path,
            source,
        }
    };

    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err("failed to create", parent))?;
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(format!(".tmp-{}", std::process::id()));
    let temp_path = path.with_file_name(temp_name);

    std::fs::write(&temp_path, contents).map_err(io_err("failed to write", &temp_path))?;
    std::fs::rename(&temp_path, path).map_err(io_err("failed to replace", path))?;
    Ok(())
}
