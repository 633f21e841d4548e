use crate::model::{AthRecord, IndexSymbol, StorageError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, error, info, warn};

/// On-disk shape of one entry. Values stay strings so decimals survive the
/// round trip without passing through a float.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    ath_value: String,
    ath_date: String,
    updated_at: String,
}

impl From<&AthRecord> for StoredRecord {
    fn from(record: &AthRecord) -> Self {
        Self {
            ath_value: record.ath_value.to_string(),
            ath_date: record.ath_date.format("%Y-%m-%d").to_string(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

impl StoredRecord {
    fn into_record(self, symbol: IndexSymbol) -> Result<AthRecord, String> {
        let ath_value = Decimal::from_str(self.ath_value.trim())
            .map_err(|e| format!("bad ath_value {:?}: {}", self.ath_value, e))?;
        let ath_date = NaiveDate::parse_from_str(self.ath_date.trim(), "%Y-%m-%d")
            .map_err(|e| format!("bad ath_date {:?}: {}", self.ath_date, e))?;
        let updated_at = parse_timestamp(&self.updated_at)
            .ok_or_else(|| format!("bad updated_at {:?}", self.updated_at))?;

        Ok(AthRecord {
            symbol,
            ath_value,
            ath_date,
            updated_at,
        })
    }
}

/// RFC 3339 first; timestamps written without an offset are taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

fn parse_entry(symbol: IndexSymbol, value: Value) -> Result<AthRecord, String> {
    let stored: StoredRecord = serde_json::from_value(value).map_err(|e| e.to_string())?;
    stored.into_record(symbol)
}

/// Result of an [`AthStore::update`] call.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The record was written to disk.
    Written,
    /// A higher value was already stored, nothing was written.
    KeptHigher,
}

/// ATH records persisted in a single JSON file keyed by ticker code.
///
/// Reads never fail: a missing or corrupted file is treated as empty state.
/// Writes replace the whole file through a temp file and an atomic rename, so
/// readers see either the old or the new content. The store assumes a single
/// writer process.
#[derive(Debug, Clone)]
pub struct AthStore {
    path: PathBuf,
}

impl AthStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, symbol: IndexSymbol) -> Option<AthRecord> {
        self.get_all().remove(&symbol)
    }

    pub fn get_all(&self) -> BTreeMap<IndexSymbol, AthRecord> {
        let mut records = BTreeMap::new();

        let data = self.load().unwrap_or_else(|e| {
            warn!("Failed to read ATH file {}: {}", self.path.display(), e);
            Map::new()
        });

        for (key, value) in data {
            let Some(symbol) = IndexSymbol::from_code(&key) else {
                debug!("Ignoring unknown key {:?} in ATH file", key);
                continue;
            };
            match parse_entry(symbol, value) {
                Ok(record) => {
                    records.insert(symbol, record);
                }
                Err(reason) => warn!("Invalid ATH record for {}, skipping: {}", key, reason),
            }
        }

        records
    }

    /// Upserts one record and rewrites the file.
    ///
    /// A record lower than the stored value is refused so the ATH never goes
    /// down; equal or higher values replace the stored entry. A file that
    /// exists but cannot be read is left alone and reported as
    /// [`StorageError::Read`]; corrupted JSON is replaced.
    pub fn update(&self, record: &AthRecord) -> Result<UpdateOutcome, StorageError> {
        let mut data = self.load().map_err(|source| {
            error!(
                "Refusing to rewrite unreadable ATH file {}: {}",
                self.path.display(),
                source
            );
            StorageError::Read {
                path: self.path.clone(),
                source,
            }
        })?;
        let code = record.symbol.code();

        let existing = data
            .get(code)
            .cloned()
            .and_then(|v| parse_entry(record.symbol, v).ok());
        if let Some(existing) = existing {
            if existing.ath_value > record.ath_value {
                warn!(
                    "Refusing to lower ATH for {}: stored {:.2}, submitted {:.2}",
                    record.symbol, existing.ath_value, record.ath_value
                );
                return Ok(UpdateOutcome::KeptHigher);
            }
        }

        data.insert(code.to_string(), serde_json::to_value(StoredRecord::from(record))?);
        self.save(&data)?;

        info!(
            "Updated ATH for {}: {:.2} on {}",
            record.symbol, record.ath_value, record.ath_date
        );
        Ok(UpdateOutcome::Written)
    }

    /// Missing, malformed or non-object content reads as empty. Only I/O
    /// failures other than `NotFound` are returned.
    fn load(&self) -> io::Result<Map<String, Value>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("ATH file not found at {}, starting fresh", self.path.display());
                return Ok(Map::new());
            }
            Err(e) => return Err(e),
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => {
                warn!(
                    "ATH file {} does not hold a JSON object, ignoring it",
                    self.path.display()
                );
                Ok(Map::new())
            }
            Err(e) => {
                warn!("Invalid JSON in ATH file {}: {}", self.path.display(), e);
                Ok(Map::new())
            }
        }
    }

    fn save(&self, data: &Map<String, Value>) -> Result<(), StorageError> {
        let mut body = serde_json::to_vec_pretty(data)?;
        body.push(b'\n');

        self.write_atomic(&body).map_err(|source| {
            error!("Failed to save ATH file {}: {}", self.path.display(), source);
            StorageError::Write {
                path: self.path.clone(),
                source,
            }
        })
    }

    // The temp file is removed on drop if anything below fails.
    fn write_atomic(&self, body: &[u8]) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".ath_")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        tmp.write_all(body)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
