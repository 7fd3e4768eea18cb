use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{hlog_debug, Error, Result};

/// How a worker delivers its mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubmitMode {
    /// Post a task to the owner thread.
    #[default]
    ViaQueue,
    /// Run the mutation on the worker's own thread. Racy; only exists to
    /// show what the queue prevents.
    Direct,
}

impl SubmitMode {
    pub fn label(&self) -> &'static str {
        match self {
            SubmitMode::ViaQueue => "queue",
            SubmitMode::Direct => "DIRECT (racy)",
        }
    }
}

/// Sleep between two worker cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DelayPolicy {
    Fixed { ms: u64 },
    /// Uniform in `0..=max_ms`.
    Random { max_ms: u64 },
}

impl DelayPolicy {
    pub fn next(&self, rng: &mut impl Rng) -> Duration {
        match *self {
            DelayPolicy::Fixed { ms } => Duration::from_millis(ms),
            DelayPolicy::Random { max_ms } => Duration::from_millis(rng.gen_range(0..=max_ms)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default)]
    pub mode: SubmitMode,
    pub delay: DelayPolicy,
}

impl WorkerConfig {
    pub fn inserter_default() -> Self {
        Self {
            mode: SubmitMode::ViaQueue,
            delay: DelayPolicy::Random { max_ms: 10_000 },
        }
    }

    pub fn colorer_default() -> Self {
        Self {
            mode: SubmitMode::ViaQueue,
            delay: DelayPolicy::Fixed { ms: 250 },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Worker inserting random letters into the text field.
    #[serde(default = "WorkerConfig::inserter_default")]
    pub inserter: WorkerConfig,
    /// Worker recolouring random buttons.
    #[serde(default = "WorkerConfig::colorer_default")]
    pub colorer: WorkerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inserter: WorkerConfig::inserter_default(),
            colorer: WorkerConfig::colorer_default(),
        }
    }
}

impl Config {
    pub fn app_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or(Error::NoHomeDir)?
            .join(".handler-demo"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::app_dir()?.join("config.toml"))
    }

    /// Load from the default location, falling back to defaults if absent.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        hlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            hlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        hlog_debug!(
            "Config loaded: inserter={:?} colorer={:?}",
            config.inserter,
            config.colorer
        );
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, self.to_toml()?)?;
        hlog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Delays must be able to exceed zero: `Fixed { ms: 0 }` and
    /// `Random { max_ms: 0 }` are rejected.
    pub fn validate(&self) -> Result<()> {
        for (name, worker) in [("inserter", &self.inserter), ("colorer", &self.colorer)] {
            let zero = match worker.delay {
                DelayPolicy::Fixed { ms } => ms == 0,
                DelayPolicy::Random { max_ms } => max_ms == 0,
            };
            if zero {
                return Err(Error::Validation(format!(
                    "{}: delay must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }
}
