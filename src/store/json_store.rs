use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::{debug, warn};
use serde::Serialize;

use crate::store::schema::{EXPORT_VERSION, ExportData, ProgressData};

const PROGRESS_FILE: &str = "progress.json";

pub struct JsonStore {
    base_dir: PathBuf,
}

impl JsonStore {
    pub fn new() -> Result<Self> {
        let base_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("finessr");
        Self::with_base_dir(base_dir)
    }

    pub fn with_base_dir(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir)
            .with_context(|| format!("creating data directory {}", base_dir.display()))?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let path = self.file_path(name);
        let tmp_path = path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(data)?;
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Load persisted progress. A missing file is a fresh start; anything
    /// unreadable or from another schema version is discarded with a warning.
    pub fn load_progress(&self) -> ProgressData {
        let path = self.file_path(PROGRESS_FILE);
        if !path.exists() {
            debug!("no progress file at {}, starting fresh", path.display());
            return ProgressData::default();
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("could not read {}: {e}; starting fresh", path.display());
                return ProgressData::default();
            }
        };

        match serde_json::from_str::<ProgressData>(&content) {
            Ok(data) if data.needs_reset() => {
                warn!(
                    "progress schema version {} is not supported; starting fresh",
                    data.schema_version
                );
                ProgressData::default()
            }
            Ok(data) => data,
            Err(e) => {
                warn!("could not parse {}: {e}; starting fresh", path.display());
                ProgressData::default()
            }
        }
    }

    pub fn save_progress(&self, data: &ProgressData) -> Result<()> {
        self.save(PROGRESS_FILE, data)
    }

    pub fn write_export(data: &ExportData, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        fs::write(path, json).with_context(|| format!("writing export to {}", path.display()))?;
        Ok(())
    }

    pub fn read_export(path: &Path) -> Result<ExportData> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading export from {}", path.display()))?;
        let data: ExportData = serde_json::from_str(&content)?;
        Ok(data)
    }

    /// Replace stored progress with an export's. The previous file is kept
    /// as a .bak until the new one is in place.
    pub fn import_all(&self, data: &ExportData) -> Result<()> {
        if data.finessr_export_version != EXPORT_VERSION {
            bail!(
                "Unsupported export version: {} (expected {})",
                data.finessr_export_version,
                EXPORT_VERSION
            );
        }
        if data.progress.needs_reset() {
            bail!(
                "Unsupported progress schema version: {}",
                data.progress.schema_version
            );
        }

        let final_path = self.file_path(PROGRESS_FILE);
        let bak_path = final_path.with_extension("json.bak");
        let had_original = final_path.exists();

        if had_original {
            fs::rename(&final_path, &bak_path)
                .with_context(|| "Import failed during commit (backup)")?;
        }

        if let Err(e) = self.save_progress(&data.progress) {
            if had_original {
                let _ = fs::rename(&bak_path, &final_path);
            }
            bail!("Import failed during commit: {e}");
        }

        if had_original {
            let _ = fs::remove_file(&bak_path);
        }
        Ok(())
    }

    /// Check for a leftover .bak from an interrupted import and restore it
    /// if the progress file itself went missing. Returns true if one was found.
    pub fn check_interrupted_import(&self) -> bool {
        let final_path = self.file_path(PROGRESS_FILE);
        let bak_path = final_path.with_extension("json.bak");
        if !bak_path.exists() {
            return false;
        }
        if final_path.exists() {
            let _ = fs::remove_file(&bak_path);
        } else {
            warn!("restoring progress from interrupted import");
            let _ = fs::rename(&bak_path, &final_path);
        }
        true
    }
}
