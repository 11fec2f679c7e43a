//! Operational helpers: logging setup and on-disk session saves.

use std::{
    fs,
    path::{Path, PathBuf},
};

use timeweave_types::{config::OpsConfig, persist::SavedSession, Result, TimeweaveError};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| TimeweaveError::Ops(format!("failed to create log filter: {err}")))?;

    fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| TimeweaveError::Ops(format!("tracing init error: {err}")))?;
    Ok(())
}

pub fn ensure_save_dir(path: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(path);
    fs::create_dir_all(&dir)
        .map_err(|err| TimeweaveError::Ops(format!("failed to create save dir: {err}")))?;
    info!("Save directory ready at {:?}", dir);
    Ok(dir)
}

/// Directory of `<name>.json` session saves.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn open(dir: &str) -> Result<Self> {
        Ok(Self {
            dir: ensure_save_dir(dir)?,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(TimeweaveError::Persistence(format!(
                "invalid save name '{name}'"
            )));
        }
        Ok(self.dir.join(format!("{name}.json")))
    }

    /// Writes to a temporary file first so a crash never leaves a torn save.
    pub fn save(&self, name: &str, session: &SavedSession) -> Result<PathBuf> {
        let path = self.path_for(name)?;
        let staging = self
            .dir
            .join(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()));
        let json = session.to_json()?;
        fs::write(&staging, json).map_err(|err| {
            TimeweaveError::Persistence(format!("failed to write {}: {err}", staging.display()))
        })?;
        fs::rename(&staging, &path).map_err(|err| {
            TimeweaveError::Persistence(format!("failed to move save into place: {err}"))
        })?;
        info!(
            "Saved {} timelines to {}",
            session.timelines.len(),
            path.display()
        );
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<SavedSession> {
        let path = self.path_for(name)?;
        let text = fs::read_to_string(&path).map_err(|err| {
            TimeweaveError::Persistence(format!("unable to read {}: {err}", path.display()))
        })?;
        let session = SavedSession::from_json(&text)?;
        let legacy = session.legacy_snapshot_count();
        if legacy > 0 {
            warn!("{} holds {legacy} legacy snapshots", path.display());
        }
        Ok(session)
    }

    pub fn list(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|err| TimeweaveError::Persistence(format!("unable to list saves: {err}")))?;
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().map_or(false, |ext| ext == "json"))
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .filter(|name| !name.starts_with('.'))
            .collect();
        names.sort();
        Ok(names)
    }
}
