//! Configuration for the bingo runtime: match rules, menus and logging

use crate::goal::{Difficulty, GoalPool};
use crate::win::WinCondition;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration, usually read from `config.toml` in the plugin data folder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BingoConfig {
    #[serde(rename = "match")]
    pub match_settings: MatchSettings,
    pub goals: GoalPoolSettings,
    pub menu: MenuSettings,
    pub logging: LoggingSettings,
}

/// Rules applied to every match created by the runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchSettings {
    pub win_condition: WinCondition,
    /// Global time limit; required for timed matches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit_minutes: Option<u32>,
    pub max_team_size: usize,
    /// Number of goals drawn onto the board at start
    pub board_size: usize,
    pub difficulty: Difficulty,
    /// Fixed seed for reproducible boards
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Where the goal pool comes from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalPoolSettings {
    /// JSON or TOML goal list; the built-in pool is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Sign menu behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuSettings {
    /// Seconds an opened sign stays valid before it is discarded
    pub session_lifetime_secs: u64,
}

/// Log output settings consumed by the plugin crate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing` filter directive, e.g. `info` or `bingo_core=debug`
    pub level: String,
    pub json: bool,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            win_condition: WinCondition::FullBoard,
            time_limit_minutes: None,
            max_team_size: 5,
            board_size: 25,
            difficulty: Difficulty::Medium,
            seed: None,
        }
    }
}

impl Default for MenuSettings {
    fn default() -> Self {
        Self {
            session_lifetime_secs: 30,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl MatchSettings {
    /// Time limit as a duration, if one is configured
    pub fn time_limit(&self) -> Option<chrono::Duration> {
        self.time_limit_minutes
            .map(|minutes| chrono::Duration::minutes(i64::from(minutes)))
    }

    /// Check that the rules describe a playable match
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_team_size == 0 {
            return Err(ConfigError::Invalid("Max team size must be at least 1".to_string()));
        }

        if self.board_size == 0 {
            return Err(ConfigError::Invalid("Board size cannot be 0".to_string()));
        }

        if self.time_limit_minutes == Some(0) {
            return Err(ConfigError::Invalid("Time limit cannot be 0 minutes".to_string()));
        }

        match self.win_condition {
            WinCondition::Line if board_side(self.board_size).is_none() => {
                Err(ConfigError::Invalid(format!(
                    "Line wins need a square board, {} goals is not a square",
                    self.board_size
                )))
            }
            WinCondition::Timed if self.time_limit_minutes.is_none() => Err(ConfigError::Invalid(
                "Timed matches need a time limit".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Side length of a square board, if `goals` is a perfect square
pub fn board_side(goals: usize) -> Option<usize> {
    let side = (goals as f64).sqrt().round() as usize;
    (side * side == goals && side > 0).then_some(side)
}

impl BingoConfig {
    /// Load configuration from file with format detection
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileNotFound(format!("{}: {}", path.display(), e)))?;

        let config: BingoConfig = ConfigFormat::from_extension(path).parse(&content)?;
        config.validate()?;

        tracing::debug!("Loaded bingo configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = ConfigFormat::from_extension(path).render(self)?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::FileNotFound(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.match_settings.validate()?;

        if self.menu.session_lifetime_secs == 0 {
            return Err(ConfigError::Invalid("Menu session lifetime cannot be 0".to_string()));
        }

        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid("Log level cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Resolve the goal pool, relative paths being taken from `base_dir`
    pub fn load_goal_pool(&self, base_dir: &Path) -> Result<GoalPool, ConfigError> {
        let pool = match &self.goals.path {
            Some(path) if path.is_absolute() => GoalPool::load_from_file(path)?,
            Some(path) => GoalPool::load_from_file(base_dir.join(path))?,
            None => GoalPool::builtin(),
        };

        let eligible = pool.eligible_count(self.match_settings.difficulty);
        if eligible < self.match_settings.board_size {
            return Err(ConfigError::Invalid(format!(
                "Goal pool has {} goals for {:?} difficulty, board needs {}",
                eligible, self.match_settings.difficulty, self.match_settings.board_size
            )));
        }

        Ok(pool)
    }

    pub fn session_lifetime(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.menu.session_lifetime_secs as i64)
    }
}

/// Configuration file format detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn from_extension(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::Json,
            _ => Self::Toml,
        }
    }

    pub fn parse<T: serde::de::DeserializeOwned>(self, content: &str) -> Result<T, ConfigError> {
        match self {
            Self::Json => serde_json::from_str(content)
                .map_err(|e| ConfigError::ParseFailed(format!("JSON parse error: {}", e))),
            Self::Toml => toml::from_str(content)
                .map_err(|e| ConfigError::ParseFailed(format!("TOML parse error: {}", e))),
        }
    }

    pub fn render<T: Serialize>(self, value: &T) -> Result<String, ConfigError> {
        match self {
            Self::Json => serde_json::to_string_pretty(value)
                .map_err(|e| ConfigError::ParseFailed(format!("JSON serialize error: {}", e))),
            Self::Toml => toml::to_string_pretty(value)
                .map_err(|e| ConfigError::ParseFailed(format!("TOML serialize error: {}", e))),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
