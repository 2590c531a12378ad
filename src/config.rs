//! Configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--config`, `--batch-size`, `--delimiter`, etc.)
//! 2. `$KEYSCOPE_CONFIG` environment variable (path to config file)
//! 3. Project-local `.keyscope.toml` in the current working directory
//! 4. Global `~/.config/keyscope/config.toml`
//! 5. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::browse::hydrate::{DEFAULT_DEBOUNCE, DEFAULT_MAX_KEYS};
use crate::browse::scan::{ScanSettings, DEFAULT_BATCH_SIZE, DEFAULT_MIN_COUNT};
use crate::browse::search::{SearchState, DEFAULT_MATCH_THRESHOLD};

// ── Section configs ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable mouse support.
    pub mouse: Option<bool>,
    /// Event loop tick in milliseconds.
    pub tick_ms: Option<u64>,
}

/// Scan request sizing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ScanConfig {
    pub batch_size: Option<usize>,
    /// Floor applied to every count hint.
    pub min_count: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct HydrationConfig {
    pub debounce_ms: Option<u64>,
    /// Cap on names per metadata request.
    pub max_keys: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TreeConfig {
    pub delimiter: Option<String>,
    /// Build trees on the blocking pool. `false` forces the inline path.
    pub offload: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SearchConfig {
    pub match_threshold: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together (CLI overrides file, file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub scan: ScanConfig,
    pub hydration: HydrationConfig,
    pub tree: TreeConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

// ── Default constants ────────────────────────────────────────────────────────

pub const DEFAULT_TICK_MS: u64 = 50;
pub const DEFAULT_DELIMITER: &str = ":";
pub const DEFAULT_LOG_LEVEL: &str = "info";

// ── Config file locator ──────────────────────────────────────────────────────

/// Candidate config file paths in priority order, excluding `--config`.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var("KEYSCOPE_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".keyscope.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("keyscope").join("config.toml"));
    }

    paths
}

/// Read and parse a TOML config file. Missing files are `None`; unparseable
/// ones are `None` with a warning, since logging may not be up yet the
/// warning also goes to stderr.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            eprintln!(
                "Warning: failed to parse config file {}: {}",
                path.display(),
                e
            );
            warn!(path = %path.display(), error = %e, "config file skipped");
            None
        }
    }
}

// ── Merge logic ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Merge `other` on top of `self`; `other`'s `Some` values win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            general: GeneralConfig {
                mouse: other.general.mouse.or(self.general.mouse),
                tick_ms: other.general.tick_ms.or(self.general.tick_ms),
            },
            scan: ScanConfig {
                batch_size: other.scan.batch_size.or(self.scan.batch_size),
                min_count: other.scan.min_count.or(self.scan.min_count),
            },
            hydration: HydrationConfig {
                debounce_ms: other.hydration.debounce_ms.or(self.hydration.debounce_ms),
                max_keys: other.hydration.max_keys.or(self.hydration.max_keys),
            },
            tree: TreeConfig {
                delimiter: other.tree.delimiter.clone().or(self.tree.delimiter),
                offload: other.tree.offload.or(self.tree.offload),
            },
            search: SearchConfig {
                match_threshold: other
                    .search
                    .match_threshold
                    .or(self.search.match_threshold),
            },
            logging: LoggingConfig {
                level: other.logging.level.clone().or(self.logging.level),
                file: other.logging.file.clone().or(self.logging.file),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` is an explicit config file path from `--config`.
    /// `cli_overrides` are partial overrides derived from CLI flags.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        let mut config = AppConfig::default();

        // Lowest priority first so higher layers overwrite.
        for path in candidate_paths().iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            if let Some(file_cfg) = load_file(cli_path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    pub fn mouse_enabled(&self) -> bool {
        self.general.mouse.unwrap_or(true)
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.general.tick_ms.unwrap_or(DEFAULT_TICK_MS).max(1))
    }

    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            batch_size: self.scan.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1),
            min_count: self.scan.min_count.unwrap_or(DEFAULT_MIN_COUNT),
        }
    }

    pub fn hydration_debounce(&self) -> Duration {
        self.hydration
            .debounce_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DEBOUNCE)
    }

    pub fn hydration_max_keys(&self) -> usize {
        self.hydration.max_keys.unwrap_or(DEFAULT_MAX_KEYS).max(1)
    }

    pub fn delimiter(&self) -> &str {
        self.tree.delimiter.as_deref().unwrap_or(DEFAULT_DELIMITER)
    }

    /// Whether tree jobs run on the blocking pool.
    pub fn tree_offload(&self) -> bool {
        self.tree.offload.unwrap_or(true)
    }

    /// Search settings with no pattern yet.
    pub fn search_state(&self) -> SearchState {
        SearchState {
            pattern: None,
            match_threshold: self
                .search
                .match_threshold
                .unwrap_or(DEFAULT_MATCH_THRESHOLD),
        }
    }

    pub fn log_level(&self) -> &str {
        self.logging.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Log file path; `<data_local_dir>/keyscope/keyscope.log` unless set.
    pub fn log_file(&self) -> Option<PathBuf> {
        self.logging.file.clone().or_else(|| {
            dirs::data_local_dir().map(|dir| dir.join("keyscope").join("keyscope.log"))
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
