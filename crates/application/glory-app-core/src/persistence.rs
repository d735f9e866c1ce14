use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;

use crate::domain::GlorySettings;
use crate::ports::SettingsRepo;

const QUALIFIER: &str = "com";
const ORG: &str = "getglory";
const APP: &str = "studio";

/// Settings stored as pretty JSON under the platform config directory.
#[derive(Debug, Clone, Default)]
pub struct FilePersistence {
    dir: Option<PathBuf>,
}

impl FilePersistence {
    pub fn new() -> Self {
        Self { dir: None }
    }

    /// Keep everything under `dir` instead of the platform config directory.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    fn config_dir(&self) -> Result<PathBuf> {
        let dir = match &self.dir {
            Some(dir) => dir.clone(),
            None => ProjectDirs::from(QUALIFIER, ORG, APP)
                .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
                .config_dir()
                .to_path_buf(),
        };
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(dir)
    }

    fn settings_path(&self) -> Result<PathBuf> {
        Ok(self.config_dir()?.join("settings.json"))
    }

    pub fn load_settings(&self) -> Result<GlorySettings> {
        let path = self.settings_path()?;
        if !path.exists() {
            return Ok(GlorySettings::default());
        }
        let content = fs::read_to_string(&path).context("Failed to read settings")?;
        let settings: GlorySettings =
            serde_json::from_str(&content).context("Failed to parse settings")?;
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &GlorySettings) -> Result<()> {
        let path = self.settings_path()?;
        let json = serde_json::to_string_pretty(settings)?;
        atomic_write(&path, json.as_bytes()).context("Failed to write settings")?;
        Ok(())
    }
}

impl SettingsRepo for FilePersistence {
    fn load(&self) -> Result<GlorySettings> {
        self.load_settings()
    }

    fn save(&self, settings: &GlorySettings) -> Result<()> {
        self.save_settings(settings)
    }
}

fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp_path = {
        let mut name = path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    };

    let mut file = fs::File::create(&tmp_path)
        .with_context(|| format!("Failed to create temp file {}", tmp_path.display()))?;
    file.write_all(contents)
        .with_context(|| format!("Failed to write temp file {}", tmp_path.display()))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync temp file {}", tmp_path.display()))?;
    drop(file);

    match fs::rename(&tmp_path, path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            fs::remove_file(path).ok();
            fs::rename(&tmp_path, path).with_context(|| {
                format!("Failed to replace destination file {}", path.display())
            })?;
        }
        Err(e) => {
            return Err(e).with_context(|| {
                format!(
                    "Failed to rename temp file {} to {}",
                    tmp_path.display(),
                    path.display()
                )
            });
        }
    }

    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_settings_fall_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = FilePersistence::in_dir(tmp.path().join("nested"));
        assert_eq!(repo.load().unwrap(), GlorySettings::default());
    }

    #[test]
    fn settings_survive_a_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = FilePersistence::in_dir(tmp.path());
        let settings = GlorySettings {
            autosave_period_ms: 5_000,
            preserve_admin_sessions: false,
            ..GlorySettings::default()
        };
        repo.save(&settings).unwrap();

        let loaded = FilePersistence::in_dir(tmp.path()).load().unwrap();
        assert_eq!(loaded, settings);
        assert!(!tmp.path().join("settings.json.tmp").exists());
    }

    #[test]
    fn partial_files_keep_defaults_for_missing_fields() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("settings.json"), r#"{"autosave_period_ms": 4000}"#).unwrap();
        let loaded = FilePersistence::in_dir(tmp.path()).load().unwrap();
        assert_eq!(loaded.autosave_period_ms, 4_000);
        assert_eq!(
            loaded.session_window_ms,
            glory_config::SESSION_NAVIGATION_WINDOW_MS
        );
    }
}
