//! Daemon configuration: TOML file (`config.toml` in the data directory)
//! with serde defaults, overridable per-field from CLI flags in `main`.

use crate::trigger::DEFAULT_TRIGGER_PHRASES;
use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

const DEFAULT_PORT: u16 = 4560;
const DEFAULT_MIN_FRAGMENTS: u32 = 3;
const DEFAULT_TARGET_FRAGMENTS: u32 = 5;
const DEFAULT_MAX_FRAGMENTS: u32 = 10;
const DEFAULT_MIN_DISCARD_LEN: usize = 15;
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_SWEEP_PERIOD_SECS: u64 = 5;
const DEFAULT_ABANDON_TIMEOUT_SECS: u64 = 60;
const DEFAULT_FINALIZE_TIMEOUT_SECS: u64 = 60;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── AggregationSettings ─────────────────────────────────────────────────────

/// Aggregation thresholds (`[aggregation]` in config.toml).
///
/// These are the knobs of the state machine; the control flow never hard-codes
/// them. MIN/TARGET/MAX trade classifier-call cost against responsiveness.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregationSettings {
    /// Fragments required before any finalization path opens (default: 3).
    pub min_fragments: u32,
    /// Fragment count at which the completeness classifier starts being
    /// consulted (default: 5). Below this, content is almost certainly
    /// incomplete and the external call is skipped.
    pub target_fragments: u32,
    /// Hard safety bound — force finalize at this count (default: 10).
    pub max_fragments: u32,
    /// Off-topic sessions with trimmed content shorter than this are
    /// discarded as accidental triggers (default: 15).
    pub min_discard_len: usize,
    /// Seconds of silence after which a collecting session is force-finalized
    /// by the sweeper (default: 5).
    pub idle_timeout_secs: u64,
    /// Sweeper wake-up period in seconds (default: 5).
    pub sweep_period_secs: u64,
    /// Seconds of silence after which an under-minimum session is discarded
    /// as abandoned (default: 60).
    pub abandon_timeout_secs: u64,
    /// Upper bound on one finalizer invocation in seconds (default: 60).
    pub finalize_timeout_secs: u64,
    /// Trigger phrases. Matching is case- and whitespace-insensitive.
    pub trigger_phrases: Vec<String>,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            min_fragments: DEFAULT_MIN_FRAGMENTS,
            target_fragments: DEFAULT_TARGET_FRAGMENTS,
            max_fragments: DEFAULT_MAX_FRAGMENTS,
            min_discard_len: DEFAULT_MIN_DISCARD_LEN,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            sweep_period_secs: DEFAULT_SWEEP_PERIOD_SECS,
            abandon_timeout_secs: DEFAULT_ABANDON_TIMEOUT_SECS,
            finalize_timeout_secs: DEFAULT_FINALIZE_TIMEOUT_SECS,
            trigger_phrases: DEFAULT_TRIGGER_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl AggregationSettings {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_period(&self) -> Duration {
        Duration::from_secs(self.sweep_period_secs)
    }

    pub fn abandon_timeout(&self) -> Duration {
        Duration::from_secs(self.abandon_timeout_secs)
    }

    pub fn finalize_timeout(&self) -> Duration {
        Duration::from_secs(self.finalize_timeout_secs)
    }
}

// ─── LlmSettings ─────────────────────────────────────────────────────────────

/// Chat-completions endpoint used by the completeness classifier and the
/// report generator (`[llm]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmSettings {
    /// OpenAI-compatible base URL.
    pub base_url: String,
    /// Model id sent with every request.
    pub model: String,
    /// Name of the environment variable holding the API key. The key itself
    /// never lives in the config file.
    pub api_key_env: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

// ─── TrackerSettings ─────────────────────────────────────────────────────────

/// Issue-tracker REST API (`[tracker]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// API base URL (GitHub-compatible REST).
    pub api_base: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Footer line appended to every created issue body.
    pub footer: String,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            timeout_secs: 30,
            footer: "Created via scribed".to_string(),
        }
    }
}

// ─── DaemonConfig ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Bind address for the REST server (default: 127.0.0.1).
    pub bind_address: String,
    /// REST server port.
    pub port: u16,
    /// Data directory for the owner database and logs.
    pub data_dir: PathBuf,
    pub aggregation: AggregationSettings,
    pub llm: LlmSettings,
    pub tracker: TrackerSettings,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: DEFAULT_PORT,
            data_dir: default_data_dir(),
            aggregation: AggregationSettings::default(),
            llm: LlmSettings::default(),
            tracker: TrackerSettings::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".scribed")
}

impl DaemonConfig {
    /// Load from `<data_dir>/config.toml` if present, else defaults.
    /// An explicit `path` wins over the data-dir location and must exist.
    pub fn load(path: Option<&Path>, data_dir: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let dir = data_dir
                    .map(Path::to_path_buf)
                    .unwrap_or_else(default_data_dir);
                let candidate = dir.join("config.toml");
                if candidate.is_file() {
                    Self::from_file(&candidate)?
                } else {
                    Self::default()
                }
            }
        };
        if let Some(dir) = data_dir {
            config.data_dir = dir.to_path_buf();
        }
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        info!(path = %path.display(), "loaded config file");
        Ok(config)
    }
}
