//! Configuration Vault – reads/writes `~/.voxnav/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use voxnav_hal::sim::Scene;
use voxnav_perception::SamplerConfig;
use voxnav_runtime::{ControlConfig, NavigatorConfig, ProcessPlannerConfig};

/// Persisted user configuration stored in `~/.voxnav/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Executable that plans routes (e.g. `python3`).
    #[serde(default = "default_planner_command")]
    pub planner_command: String,

    /// Arguments passed to the planner executable.
    #[serde(default = "default_planner_args")]
    pub planner_args: Vec<String>,

    /// Seconds before a silent planner is killed.  `0` waits forever.
    #[serde(default = "default_planner_timeout_secs")]
    pub planner_timeout_secs: u64,

    /// Chunks sampled in each direction around the agent.
    #[serde(default = "default_chunk_radius")]
    pub chunk_radius: u32,

    /// Highest y scanned in each column.
    #[serde(default = "default_scan_ceiling")]
    pub scan_ceiling: i32,

    /// Lowest y scanned in each column.
    #[serde(default = "default_scan_floor")]
    pub scan_floor: i32,

    #[serde(default = "default_waypoint_timeout_secs")]
    pub waypoint_timeout_secs: u64,

    #[serde(default = "default_arrival_radius")]
    pub arrival_radius: f64,

    /// TOML scene for the simulated world.  The built-in platform is used
    /// when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_path: Option<String>,
}

fn default_planner_command() -> String {
    "python3".to_string()
}
fn default_planner_args() -> Vec<String> {
    vec!["brain/brain_cli.py".to_string()]
}
fn default_planner_timeout_secs() -> u64 {
    60
}
fn default_chunk_radius() -> u32 {
    SamplerConfig::default().chunk_radius
}
fn default_scan_ceiling() -> i32 {
    SamplerConfig::default().ceiling
}
fn default_scan_floor() -> i32 {
    SamplerConfig::default().floor
}
fn default_waypoint_timeout_secs() -> u64 {
    ControlConfig::default().timeout.as_secs()
}
fn default_arrival_radius() -> f64 {
    ControlConfig::default().arrival_radius
}

impl Default for Config {
    fn default() -> Self {
        Self {
            planner_command: default_planner_command(),
            planner_args: default_planner_args(),
            planner_timeout_secs: default_planner_timeout_secs(),
            chunk_radius: default_chunk_radius(),
            scan_ceiling: default_scan_ceiling(),
            scan_floor: default_scan_floor(),
            waypoint_timeout_secs: default_waypoint_timeout_secs(),
            arrival_radius: default_arrival_radius(),
            scene_path: None,
        }
    }
}

impl Config {
    pub fn planner_config(&self) -> ProcessPlannerConfig {
        ProcessPlannerConfig {
            program: self.planner_command.clone(),
            args: self.planner_args.clone(),
            timeout: (self.planner_timeout_secs > 0)
                .then(|| Duration::from_secs(self.planner_timeout_secs)),
            working_dir: None,
        }
    }

    pub fn navigator_config(&self) -> NavigatorConfig {
        NavigatorConfig {
            sampler: SamplerConfig {
                chunk_radius: self.chunk_radius,
                ceiling: self.scan_ceiling,
                floor: self.scan_floor,
            },
            control: ControlConfig {
                timeout: Duration::from_secs(self.waypoint_timeout_secs),
                arrival_radius: self.arrival_radius,
                ..ControlConfig::default()
            },
            ..NavigatorConfig::default()
        }
    }

    /// The configured scene, or the default platform.
    pub fn scene(&self) -> Result<Scene, String> {
        match &self.scene_path {
            Some(path) => load_scene(Path::new(path)),
            None => Ok(Scene::default()),
        }
    }
}

/// Parse a scene description from a TOML file.
pub fn load_scene(path: &Path) -> Result<Scene, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read scene at {}: {}", path.display(), e))?;
    toml::from_str(&raw).map_err(|e| format!("Failed to parse scene: {}", e))
}

/// Return the path to `~/.voxnav/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".voxnav").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path, then apply env overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    let mut cfg = read_from(path)?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// The file as written, without env overrides.
pub(crate) fn read_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    toml::from_str(&raw)
        .map(Some)
        .map_err(|e| format!("Failed to parse config: {}", e))
}

/// Apply `VOXNAV_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `VOXNAV_PLANNER` | `planner_command` (+ `planner_args` when the value has several words) |
/// | `VOXNAV_CHUNK_RADIUS` | `chunk_radius` |
/// | `VOXNAV_WAYPOINT_TIMEOUT_SECS` | `waypoint_timeout_secs` |
/// | `VOXNAV_SCENE` | `scene_path` |
///
/// Unparseable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("VOXNAV_PLANNER") {
        let mut words = v.split_whitespace().map(str::to_string);
        if let Some(program) = words.next() {
            cfg.planner_command = program;
            let args: Vec<String> = words.collect();
            if !args.is_empty() {
                cfg.planner_args = args;
            }
        }
    }
    if let Ok(v) = std::env::var("VOXNAV_CHUNK_RADIUS") {
        if let Ok(radius) = v.parse::<u32>() {
            cfg.chunk_radius = radius;
        }
    }
    if let Ok(v) = std::env::var("VOXNAV_WAYPOINT_TIMEOUT_SECS") {
        if let Ok(secs) = v.parse::<u64>() {
            cfg.waypoint_timeout_secs = secs;
        }
    }
    if let Ok(v) = std::env::var("VOXNAV_SCENE") {
        cfg.scene_path = Some(v);
    }
}

/// Save the config to disk, creating `~/.voxnav/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Owner only (rwx------).
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
