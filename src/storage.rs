//! JSON record files.
//!
//! Every record goes to `<base>_<n>.json` in the output directory, where `n`
//! is the smallest positive integer whose file does not exist yet. Files are
//! created with `create_new`, so a file that appears between the existence
//! check and the write is skipped rather than overwritten.
//!
//! Output is pretty-printed UTF-8; non-ASCII characters are written as-is.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{SensorError, SensorResult};
use crate::reading::{AverageRecord, Reading};

/// Highest suffix probed before giving up
const MAX_SUFFIX: u32 = 100_000;

#[derive(Serialize)]
struct SessionFileRef<'a> {
    leituras: &'a [Reading],
}

/// Contents of a continuous session file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionFile {
    #[serde(rename = "leituras")]
    pub readings: Vec<Reading>,
}

/// Writes reading, session and average records to one directory.
#[derive(Debug, Clone)]
pub struct RecordStore {
    directory: PathBuf,
}

impl RecordStore {
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn candidate(&self, base: &str, n: u32) -> PathBuf {
        self.directory.join(format!("{}_{}.json", base, n))
    }

    /// Path the next record under `base` would be written to.
    pub fn next_free_path(&self, base: &str) -> SensorResult<PathBuf> {
        (1..=MAX_SUFFIX)
            .map(|n| self.candidate(base, n))
            .find(|path| !path.exists())
            .ok_or_else(|| no_free_name(base))
    }

    /// Create a brand-new file under `base`, never touching existing ones.
    fn create_new(&self, base: &str) -> SensorResult<(File, PathBuf)> {
        fs::create_dir_all(&self.directory)?;

        for n in 1..=MAX_SUFFIX {
            let path = self.candidate(base, n);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((file, path)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(no_free_name(base))
    }

    fn write_new<S: Serialize + ?Sized>(&self, base: &str, value: &S) -> SensorResult<PathBuf> {
        let bytes = serde_json::to_vec_pretty(value)?;
        let (mut file, path) = self.create_new(base)?;
        if let Err(e) = file.write_all(&bytes).and_then(|()| file.sync_all()) {
            drop(file);
            if let Err(cleanup) = fs::remove_file(&path) {
                warn!("Could not remove partial file {}: {}", path.display(), cleanup);
            }
            return Err(e.into());
        }
        debug!("Wrote {}", path.display());
        Ok(path)
    }

    /// Persist one reading as a standalone record.
    pub fn save_reading(&self, base: &str, reading: &Reading) -> SensorResult<PathBuf> {
        let path = self.write_new(base, reading)?;
        info!("Saved reading to {}", path.display());
        Ok(path)
    }

    /// Persist an average together with its samples.
    pub fn save_average(&self, base: &str, record: &AverageRecord) -> SensorResult<PathBuf> {
        let path = self.write_new(base, record)?;
        info!("Saved average of {} samples to {}", record.samples.len(), path.display());
        Ok(path)
    }

    /// Create a continuous session file holding an empty reading list.
    pub fn create_session(&self, base: &str) -> SensorResult<PathBuf> {
        let path = self.write_new(base, &SessionFileRef { leituras: &[] })?;
        info!("Opened session file {}", path.display());
        Ok(path)
    }

    /// Replace the contents of a session file with `readings`.
    pub fn rewrite_session(&self, path: &Path, readings: &[Reading]) -> SensorResult<()> {
        let bytes = serde_json::to_vec_pretty(&SessionFileRef { leituras: readings })?;
        fs::write(path, bytes)?;
        debug!("Rewrote {} with {} readings", path.display(), readings.len());
        Ok(())
    }

    pub fn load_reading(path: &Path) -> SensorResult<Reading> {
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }

    pub fn load_session(path: &Path) -> SensorResult<SessionFile> {
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }

    pub fn load_average(path: &Path) -> SensorResult<AverageRecord> {
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }
}

fn no_free_name(base: &str) -> SensorError {
    std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free file name for base {}", base),
    )
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Parameter;
    use chrono::Local;
    use std::collections::HashMap;

    fn reading(ph: f64) -> Reading {
        Reading::from_values([(Parameter::Ph, Some(ph))], Local::now())
    }

    #[test]
    fn test_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        fs::write(dir.path().join("base_1.json"), "keep").unwrap();

        assert_eq!(store.next_free_path("base").unwrap(), dir.path().join("base_2.json"));
        let path = store.save_reading("base", &reading(6.5)).unwrap();

        assert_eq!(path, dir.path().join("base_2.json"));
        assert_eq!(fs::read_to_string(dir.path().join("base_1.json")).unwrap(), "keep");
        assert_eq!(RecordStore::load_reading(&path).unwrap().get(Parameter::Ph), Some(6.5));
    }

    #[test]
    fn test_unserializable_value_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let value: HashMap<(u8, u8), u8> = HashMap::from([((1, 2), 3)]);

        let err = store.write_new("base", &value).unwrap_err();
        assert!(matches!(err, SensorError::Json(_)));
        assert!(!dir.path().join("base_1.json").exists());

        let path = store.save_reading("base", &reading(6.5)).unwrap();
        assert_eq!(path, dir.path().join("base_1.json"));
    }

    #[test]
    fn test_fills_smallest_gap() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        fs::write(dir.path().join("base_1.json"), "{}").unwrap();
        fs::write(dir.path().join("base_3.json"), "{}").unwrap();

        let path = store.save_reading("base", &reading(7.0)).unwrap();
        assert_eq!(path, dir.path().join("base_2.json"));
        let path = store.save_reading("base", &reading(7.0)).unwrap();
        assert_eq!(path, dir.path().join("base_4.json"));
    }

    #[test]
    fn test_session_file_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("nested"));

        let path = store.create_session("continuo").unwrap();
        let json: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({ "leituras": [] }));

        let readings = vec![reading(6.0), reading(6.1)];
        store.rewrite_session(&path, &readings).unwrap();
        let loaded = RecordStore::load_session(&path).unwrap();
        assert_eq!(loaded.readings, readings);
    }

    #[test]
    fn test_average_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let record = AverageRecord::compute(vec![reading(6.0), reading(6.4)], Local::now());

        let path = store.save_average("media", &record).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();

        assert_eq!(json["media"]["ph"], 6.2);
        assert_eq!(json["leituras"].as_array().unwrap().len(), 2);
        assert_eq!(json["timestamp"], json["media"]["timestamp"]);
        assert_eq!(RecordStore::load_average(&path).unwrap(), record);
    }
}
