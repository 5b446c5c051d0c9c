//! Where lab progress lives between sessions

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result, bail};

use super::Config;
use super::progress::LabRecord;

/// Durable storage for lab progress, keyed by lab number
pub trait ProgressStore: Send + Sync {
    /// Load the record for a lab; a lab never seen before yields a fresh record
    fn load(&self, lab_number: u32) -> Result<LabRecord>;

    fn save(&self, lab_number: u32, record: &LabRecord) -> Result<()>;
}

/// One pretty-printed JSON file per lab
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    base_dir: PathBuf,
}

impl JsonFileStore {
    /// Store under the platform data directory
    pub fn new() -> Result<Self> {
        Self::with_base_dir(Config::labs_dir()?)
    }

    pub fn with_base_dir(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir)
            .with_context(|| format!("Failed to create progress directory {:?}", base_dir))?;
        Ok(Self { base_dir })
    }

    pub fn file_path(&self, lab_number: u32) -> PathBuf {
        self.base_dir.join(format!("lab{lab_number}-progress.json"))
    }
}

impl ProgressStore for JsonFileStore {
    fn load(&self, lab_number: u32) -> Result<LabRecord> {
        let path = self.file_path(lab_number);
        if !path.exists() {
            return Ok(LabRecord::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read progress from {:?}", path))?;
        match serde_json::from_str(&contents) {
            Ok(record) => Ok(record),
            Err(e) => {
                tracing::warn!("Ignoring unreadable progress file {:?}: {}", path, e);
                Ok(LabRecord::default())
            }
        }
    }

    fn save(&self, lab_number: u32, record: &LabRecord) -> Result<()> {
        let path = self.file_path(lab_number);
        let tmp_path = path.with_extension("tmp");

        let json =
            serde_json::to_string_pretty(record).with_context(|| "Failed to serialize progress")?;
        let mut file = fs::File::create(&tmp_path)
            .with_context(|| format!("Failed to create {:?}", tmp_path))?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to write progress to {:?}", path))?;
        Ok(())
    }
}

/// Keeps records in memory only
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<u32, LabRecord>>,
    fail_saves: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose saves always fail, for exercising degraded persistence
    pub fn failing() -> Self {
        Self { fail_saves: true, ..Self::default() }
    }

    /// Seed a record
    pub fn with_record(self, lab_number: u32, record: LabRecord) -> Self {
        if let Ok(mut records) = self.records.lock() {
            records.insert(lab_number, record);
        }
        self
    }

    /// Last saved record for a lab
    pub fn snapshot(&self, lab_number: u32) -> Option<LabRecord> {
        self.records.lock().ok()?.get(&lab_number).cloned()
    }
}

impl ProgressStore for MemoryStore {
    fn load(&self, lab_number: u32) -> Result<LabRecord> {
        let records = self.records.lock().map_err(|_| anyhow::anyhow!("progress store poisoned"))?;
        Ok(records.get(&lab_number).cloned().unwrap_or_default())
    }

    fn save(&self, lab_number: u32, record: &LabRecord) -> Result<()> {
        if self.fail_saves {
            bail!("storage unavailable");
        }
        let mut records =
            self.records.lock().map_err(|_| anyhow::anyhow!("progress store poisoned"))?;
        records.insert(lab_number, record.clone());
        Ok(())
    }
}
