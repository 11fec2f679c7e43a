use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{board::PieceKind, fen, Result, TimeweaveError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Starting position of the root timeline.
    #[serde(default = "default_initial_fen")]
    pub initial_fen: String,
    /// Promotion applied when a request reaches the last rank without naming a piece.
    #[serde(default = "default_promotion")]
    pub default_promotion: PieceKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsConfig {
    pub log_level: String,
    pub save_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuConfig {
    pub max_plies: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeweaveConfig {
    pub session: SessionConfig,
    pub bus: BusConfig,
    pub ops: OpsConfig,
    pub cpu: CpuConfig,
}

fn default_initial_fen() -> String {
    fen::STARTING_POSITION.into()
}

fn default_promotion() -> PieceKind {
    PieceKind::Queen
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_fen: default_initial_fen(),
            default_promotion: default_promotion(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        fen::parse(&self.initial_fen).map_err(|err| {
            TimeweaveError::Configuration(format!("session.initial_fen is invalid: {err}"))
        })?;
        if !self.default_promotion.is_promotion_target() {
            return Err(TimeweaveError::Configuration(
                "session.default_promotion must be a queen, rook, bishop or knight".into(),
            ));
        }
        Ok(())
    }
}

impl Default for TimeweaveConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            bus: BusConfig { capacity: 256 },
            ops: OpsConfig {
                log_level: "info".into(),
                save_dir: "saves".into(),
            },
            cpu: CpuConfig { max_plies: 40 },
        }
    }
}

impl TimeweaveConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            TimeweaveError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            TimeweaveError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.session.validate()?;
        if self.bus.capacity == 0 {
            return Err(TimeweaveError::Configuration(
                "bus.capacity must be greater than zero".into(),
            ));
        }
        if self.ops.log_level.trim().is_empty() {
            return Err(TimeweaveError::Configuration(
                "ops.log_level must not be empty".into(),
            ));
        }
        if self.cpu.max_plies == 0 {
            return Err(TimeweaveError::Configuration(
                "cpu.max_plies must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
