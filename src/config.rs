//! Configuration for the orchestrator.
//!
//! Configuration sources (highest priority first):
//! 1. Command-line flags / environment (ASTRA_CONFIG, ASTRA_HOME, ASTRA_ENGINE)
//! 2. Config file (YAML, only when passed explicitly)
//! 3. Defaults (~/.astra, `astra-engine` on PATH)
//!
//! The resolved [`Config`] is built once at startup and handed to every
//! component; nothing below the CLI looks at the environment or the current
//! directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Default engine timeout when the config file doesn't set one
const DEFAULT_ENGINE_TIMEOUT_SECS: u64 = 30;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Storage root (relative to config file)
    pub home: Option<String>,
    /// Run records directory (relative to home)
    pub runs: Option<String>,
    /// Event log file (relative to home)
    pub events: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    pub binary: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultsConfig {
    pub tenant_id: Option<String>,
    pub actor: Option<String>,
    pub approver: Option<String>,
    pub risk_level: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyConfig {
    /// File whose SHA-256 becomes the policy snapshot hash
    pub snapshot_path: Option<String>,
}

/// Explicit overrides supplied by the caller (CLI flags or env)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub home: Option<PathBuf>,
    pub engine: Option<PathBuf>,
}

/// How to invoke the decision engine process
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub binary: PathBuf,
    /// Extra arguments placed before the operation name
    pub args: Vec<String>,
    pub timeout: Duration,
}

/// Provenance used when a command doesn't specify its own
#[derive(Debug, Clone, PartialEq)]
pub struct RunDefaults {
    pub tenant_id: String,
    pub actor: String,
    pub approver: String,
    pub risk_level: String,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            tenant_id: "tenant_local".to_string(),
            actor: "user:demo".to_string(),
            approver: "approver:demo".to_string(),
            risk_level: "high".to_string(),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage root
    pub home: PathBuf,
    /// One JSON record per run
    pub runs_dir: PathBuf,
    /// Append-only JSONL event log
    pub events_path: PathBuf,
    pub engine: EngineSettings,
    pub defaults: RunDefaults,
    /// Policy file hashed into the snapshot hash (if configured)
    pub policy_snapshot_path: Option<PathBuf>,
    /// Config file the values came from (if any)
    pub config_file: Option<PathBuf>,
    /// Schema version declared by that file
    pub config_version: Option<String>,
}

impl Config {
    /// Default layout rooted at `home`
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            runs_dir: home.join("runs"),
            events_path: home.join("events.ndjson"),
            home,
            engine: EngineSettings {
                binary: PathBuf::from("astra-engine"),
                args: Vec::new(),
                timeout: Duration::from_secs(DEFAULT_ENGINE_TIMEOUT_SECS),
            },
            defaults: RunDefaults::default(),
            policy_snapshot_path: None,
            config_file: None,
            config_version: None,
        }
    }

    /// Replace the engine binary
    pub fn with_engine(mut self, binary: impl Into<PathBuf>) -> Self {
        self.engine.binary = binary.into();
        self
    }

    /// Load configuration from all sources
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        let file = match &overrides.config_file {
            Some(path) => Some((path.clone(), load_config_file(path)?)),
            None => None,
        };

        let home = match (&overrides.home, &file) {
            (Some(home), _) => home.clone(),
            (None, Some((path, cfg))) if cfg.paths.home.is_some() => {
                let base = path.parent().unwrap_or(Path::new("."));
                resolve_path(base, cfg.paths.home.as_deref().unwrap_or("."))
            }
            _ => default_home()?,
        };

        let mut config = Self::with_home(home);

        if let Some((path, cfg)) = file {
            config.apply_file(cfg);
            config.config_file = Some(path);
        }

        if let Some(engine) = &overrides.engine {
            config.engine.binary = engine.clone();
        }

        Ok(config)
    }

    fn apply_file(&mut self, cfg: ConfigFile) {
        self.config_version = cfg.version;

        if let Some(runs) = cfg.paths.runs {
            self.runs_dir = resolve_path(&self.home, &runs);
        }
        if let Some(events) = cfg.paths.events {
            self.events_path = resolve_path(&self.home, &events);
        }

        if let Some(binary) = cfg.engine.binary {
            self.engine.binary = PathBuf::from(binary);
        }
        self.engine.args = cfg.engine.args;
        if let Some(secs) = cfg.engine.timeout_seconds {
            self.engine.timeout = Duration::from_secs(secs);
        }

        let defaults = &mut self.defaults;
        if let Some(tenant_id) = cfg.defaults.tenant_id {
            defaults.tenant_id = tenant_id;
        }
        if let Some(actor) = cfg.defaults.actor {
            defaults.actor = actor;
        }
        if let Some(approver) = cfg.defaults.approver {
            defaults.approver = approver;
        }
        if let Some(risk_level) = cfg.defaults.risk_level {
            defaults.risk_level = risk_level;
        }

        if let Some(snapshot) = cfg.policy.snapshot_path {
            self.policy_snapshot_path = Some(resolve_path(&self.home, &snapshot));
        }
    }
}

/// ~/.astra
fn default_home() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".astra"))
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
