//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/scoville/scoville.toml`
//! 3. Local config: `<dir>/.scoville.toml` (normally the working directory)
//! 4. Environment variables: `SCOVILLE_*` prefix, `__` between sections
//!
//! Command line flags override all of these.

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::services::{
    DEFAULT_HEATMAP_MAX_ZOOM, DEFAULT_PERCENTILES, DEFAULT_SUB_ZOOMS,
};
use crate::application::ApplicationError;
use crate::infrastructure::server::DEFAULT_MAX_ZOOM;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_JOBS: usize = 1;
pub const DEFAULT_OUTLIERS: usize = 3;

/// Proxy server settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to serve tiles on
    pub port: u16,
    /// Tiles at this zoom and deeper get a 404
    pub max_zoom: u8,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_zoom: DEFAULT_MAX_ZOOM,
        }
    }
}

/// Heatmap tile settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HeatmapConfig {
    /// Zoom levels below the requested tile to sample
    pub sub_zooms: u8,
    /// Never sample deeper than this zoom
    pub max_zoom: u8,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            sub_zooms: DEFAULT_SUB_ZOOMS,
            max_zoom: DEFAULT_HEATMAP_MAX_ZOOM,
        }
    }
}

/// Percentile and outlier settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StatsConfig {
    pub percentiles: Vec<f64>,
    /// Worker threads fetching and aggregating tiles
    pub jobs: usize,
    /// Outliers reported per layer
    pub outliers: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            percentiles: DEFAULT_PERCENTILES.to_vec(),
            jobs: DEFAULT_JOBS,
            outliers: DEFAULT_OUTLIERS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawServerConfig {
    pub port: Option<u16>,
    pub max_zoom: Option<u8>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawHeatmapConfig {
    pub sub_zooms: Option<u8>,
    pub max_zoom: Option<u8>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawStatsConfig {
    pub percentiles: Option<Vec<f64>>,
    pub jobs: Option<usize>,
    pub outliers: Option<usize>,
}

/// Raw settings for intermediate parsing (`None` means "not specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub cache_dir: Option<PathBuf>,
    pub user_agent: Option<String>,
    pub timeout_secs: Option<u64>,
    pub server: RawServerConfig,
    pub heatmap: RawHeatmapConfig,
    pub stats: RawStatsConfig,
}

/// Unified configuration for scoville.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Directory of the tile cache used with `--cache`
    pub cache_dir: PathBuf,
    /// User agent sent with HTTP requests
    pub user_agent: String,
    /// HTTP request timeout
    pub timeout_secs: u64,
    pub server: ServerConfig,
    pub heatmap: HeatmapConfig,
    pub stats: StatsConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            user_agent: format!("scoville/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            server: ServerConfig::default(),
            heatmap: HeatmapConfig::default(),
            stats: StatsConfig::default(),
        }
    }
}

/// Get the default cache directory (XDG cache dir, else `./.cache`).
fn default_cache_dir() -> PathBuf {
    ProjectDirs::from("", "", "scoville")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".cache"))
}

/// Get the XDG config directory for scoville.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "scoville").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("scoville.toml"))
}

/// Get the path to the local config file in a directory.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(".scoville.toml")
}

/// Expand `~`, `$VAR` and `${VAR}`; unknown variables leave the input as is.
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }

    /// Expand shell variables and tilde in path-like fields.
    fn expand_paths(&mut self) {
        let expanded = expand_path(self.cache_dir.to_string_lossy().as_ref());
        self.cache_dir = PathBuf::from(expanded);
    }

    /// Merge overlay config onto self (base): overlay wins where specified.
    /// Lists are replaced, not merged.
    pub fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            cache_dir: overlay
                .cache_dir
                .clone()
                .unwrap_or_else(|| self.cache_dir.clone()),
            user_agent: overlay
                .user_agent
                .clone()
                .unwrap_or_else(|| self.user_agent.clone()),
            timeout_secs: overlay.timeout_secs.unwrap_or(self.timeout_secs),
            server: ServerConfig {
                port: overlay.server.port.unwrap_or(self.server.port),
                max_zoom: overlay.server.max_zoom.unwrap_or(self.server.max_zoom),
            },
            heatmap: HeatmapConfig {
                sub_zooms: overlay.heatmap.sub_zooms.unwrap_or(self.heatmap.sub_zooms),
                max_zoom: overlay.heatmap.max_zoom.unwrap_or(self.heatmap.max_zoom),
            },
            stats: StatsConfig {
                percentiles: overlay
                    .stats
                    .percentiles
                    .clone()
                    .unwrap_or_else(|| self.stats.percentiles.clone()),
                jobs: overlay.stats.jobs.unwrap_or(self.stats.jobs),
                outliers: overlay.stats.outliers.unwrap_or(self.stats.outliers),
            },
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local_dir` - Directory searched for `.scoville.toml`
    ///
    /// # Precedence (lowest to highest)
    /// 1. Compiled defaults
    /// 2. Global config: `$XDG_CONFIG_HOME/scoville/scoville.toml`
    /// 3. Local config: `<local_dir>/.scoville.toml`
    /// 4. Environment variables: `SCOVILLE_*` prefix
    pub fn load(local_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw);
            }
        }

        if let Some(dir) = local_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        current = Self::apply_env_overrides(current, Self::environment())?;

        current.expand_paths();

        Ok(current)
    }

    /// The `SCOVILLE_*` environment source, e.g. `SCOVILLE_SERVER__PORT=9000`
    /// or `SCOVILLE_STATS__PERCENTILES=50,99`.
    pub fn environment() -> Environment {
        Environment::with_prefix("SCOVILLE")
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("stats.percentiles")
            .try_parsing(true)
    }

    /// Apply environment variables as explicit overrides.
    pub fn apply_env_overrides(mut settings: Self, env: Environment) -> Result<Self, ApplicationError> {
        let config = Config::builder().add_source(env).build().map_err(config_err)?;

        if let Ok(val) = config.get_string("cache_dir") {
            settings.cache_dir = PathBuf::from(val);
        }
        if let Ok(val) = config.get_string("user_agent") {
            settings.user_agent = val;
        }
        if let Some(val) = get_opt::<u64>(&config, "timeout_secs")? {
            settings.timeout_secs = val;
        }
        if let Some(val) = get_opt::<u16>(&config, "server.port")? {
            settings.server.port = val;
        }
        if let Some(val) = get_opt::<u8>(&config, "server.max_zoom")? {
            settings.server.max_zoom = val;
        }
        if let Some(val) = get_opt::<u8>(&config, "heatmap.sub_zooms")? {
            settings.heatmap.sub_zooms = val;
        }
        if let Some(val) = get_opt::<u8>(&config, "heatmap.max_zoom")? {
            settings.heatmap.max_zoom = val;
        }
        if let Some(val) = get_opt::<Vec<f64>>(&config, "stats.percentiles")? {
            settings.stats.percentiles = val;
        }
        if let Some(val) = get_opt::<usize>(&config, "stats.jobs")? {
            settings.stats.jobs = val;
        }
        if let Some(val) = get_opt::<usize>(&config, "stats.outliers")? {
            settings.stats.outliers = val;
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# scoville configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/scoville/scoville.toml
#   Local:  ./.scoville.toml
#   Env:    SCOVILLE_* environment variables, e.g. SCOVILLE_SERVER__PORT=9000
#
# Command line flags override everything.

# Tile cache used by --cache (~ and $VAR are expanded)
# cache_dir = "~/.cache/scoville"

# User agent for tile requests
# user_agent = "scoville"

# HTTP request timeout in seconds
# timeout_secs = 30

[server]
# Port the proxy listens on
# port = 8000

# Tiles at this zoom and deeper are not served
# max_zoom = 16

[heatmap]
# Zoom levels below the requested tile to sample
# sub_zooms = 3

# Never sample deeper than this zoom
# max_zoom = 16

[stats]
# Percentiles to report, each within [0, 100]
# percentiles = [50, 90, 99, 99.9]

# Worker threads for fetching and aggregation
# jobs = 1

# Outliers per layer
# outliers = 3
"#
        .to_string()
    }
}

/// Typed lookup that tolerates a missing key but not a malformed value.
fn get_opt<'de, T: Deserialize<'de>>(config: &Config, key: &str) -> Result<Option<T>, ApplicationError> {
    match config.get::<T>(key) {
        Ok(val) => Ok(Some(val)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(ApplicationError::Config {
            message: format!("{key}: {e}"),
        }),
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
