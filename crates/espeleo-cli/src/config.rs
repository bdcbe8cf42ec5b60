//! Configuration Vault – reads/writes `~/.espeleo/config.toml`.

use espeleo_planner::PlannerConfig;
use espeleo_types::GraphMetricType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted user configuration stored in `~/.espeleo/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Metrics planned when no `--metric` flag is given.
    #[serde(default = "default_metrics")]
    pub default_metrics: Vec<GraphMetricType>,

    /// Run metrics concurrently by default.
    #[serde(default)]
    pub concurrent: bool,

    /// Thresholds and weights handed to the planner.
    #[serde(default)]
    pub planner: PlannerConfig,
}

fn default_metrics() -> Vec<GraphMetricType> {
    vec![
        GraphMetricType::Shortest,
        GraphMetricType::Flattest,
        GraphMetricType::Energy,
        GraphMetricType::Combined,
        GraphMetricType::Straightest,
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_metrics: default_metrics(),
            concurrent: false,
            planner: PlannerConfig::default(),
        }
    }
}

/// Return the path to `~/.espeleo/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".espeleo").join("config.toml")
}

/// Load the config from a specific path.  Returns `None` if the file does
/// not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg)?;
    Ok(Some(cfg))
}

/// Load `path`, falling back to defaults (plus environment overrides) when
/// the file is absent.
pub fn load_or_default(path: &Path) -> Result<Config, String> {
    match load_from(path)? {
        Some(cfg) => Ok(cfg),
        None => {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg)?;
            Ok(cfg)
        }
    }
}

/// Apply `ESPELEO_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ESPELEO_METRICS` | `default_metrics` (comma separated) |
/// | `ESPELEO_CONCURRENT` | `concurrent` (`true`/`false`/`1`/`0`) |
/// | `ESPELEO_TRAVERSABILITY_THRESHOLD` | `planner.traversability_threshold` |
/// | `ESPELEO_BORDER_THRESHOLD` | `planner.border_threshold` |
///
/// Numeric values that do not parse are ignored; an unknown metric name is
/// an error.
pub fn apply_env_overrides(cfg: &mut Config) -> Result<(), String> {
    if let Ok(v) = std::env::var("ESPELEO_METRICS") {
        cfg.default_metrics = parse_metric_list(&v)?;
    }
    if let Ok(v) = std::env::var("ESPELEO_CONCURRENT") {
        match v.trim() {
            "1" | "true" => cfg.concurrent = true,
            "0" | "false" => cfg.concurrent = false,
            _ => {}
        }
    }
    if let Ok(v) = std::env::var("ESPELEO_TRAVERSABILITY_THRESHOLD")
        && let Ok(deg) = v.parse::<f64>()
    {
        cfg.planner.traversability_threshold = deg;
    }
    if let Ok(v) = std::env::var("ESPELEO_BORDER_THRESHOLD")
        && let Ok(m) = v.parse::<f64>()
    {
        cfg.planner.border_threshold = m;
    }
    Ok(())
}

/// Parse `"shortest, energy"` into metrics.
pub fn parse_metric_list(raw: &str) -> Result<Vec<GraphMetricType>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<GraphMetricType>().map_err(|e| e.to_string()))
        .collect()
}

/// Save the config to a specific path, creating the parent directory.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
