//! Server configuration – reads `~/.myrobot/server.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use myrobot_plugin::DEFAULT_SRV_NAME;
use myrobot_types::PluginError;
use serde::{Deserialize, Serialize};

/// Settings for the stub control-service node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Node name stamped on log lines.
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Service name the responder advertises.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Pending requests buffered before callers wait for queue space.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

fn default_node_name() -> String {
    "minimal_service".to_string()
}
fn default_service_name() -> String {
    DEFAULT_SRV_NAME.to_string()
}
fn default_queue_depth() -> usize {
    32
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            service_name: default_service_name(),
            queue_depth: default_queue_depth(),
        }
    }
}

/// Return the path to `~/.myrobot/server.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".myrobot").join("server.toml")
}

/// Load the config from disk and apply environment overrides.  Returns
/// `None` if the file does not exist.
pub fn load() -> Result<Option<ServerConfig>, PluginError> {
    let Some(mut cfg) = load_from(&config_path())? else {
        return Ok(None);
    };
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Load the config from a specific path, without environment overrides.
pub fn load_from(path: &Path) -> Result<Option<ServerConfig>, PluginError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        PluginError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let cfg: ServerConfig = toml::from_str(&raw)
        .map_err(|e| PluginError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Load the config, falling back to defaults (plus env overrides) when the
/// file is absent.
pub fn load_or_default() -> Result<ServerConfig, PluginError> {
    match load()? {
        Some(cfg) => Ok(cfg),
        None => {
            let mut cfg = ServerConfig::default();
            apply_env_overrides(&mut cfg);
            Ok(cfg)
        }
    }
}

/// Apply `MYROBOT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `MYROBOT_NODE_NAME` | `node_name` |
/// | `MYROBOT_SERVICE_NAME` | `service_name` |
/// | `MYROBOT_QUEUE_DEPTH` | `queue_depth` |
pub fn apply_env_overrides(cfg: &mut ServerConfig) {
    if let Ok(v) = std::env::var("MYROBOT_NODE_NAME")
        && !v.is_empty()
    {
        cfg.node_name = v;
    }
    if let Ok(v) = std::env::var("MYROBOT_SERVICE_NAME")
        && !v.is_empty()
    {
        cfg.service_name = v;
    }
    if let Ok(v) = std::env::var("MYROBOT_QUEUE_DEPTH")
        && let Ok(depth) = v.parse::<usize>()
        && depth > 0
    {
        cfg.queue_depth = depth;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_robot_endpoint() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.node_name, "minimal_service");
        assert_eq!(cfg.service_name, "robot_control_service");
        assert_eq!(cfg.queue_depth, 32);
    }

    #[test]
    fn config_path_points_to_myrobot_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".myrobot"));
        assert!(p.to_string_lossy().ends_with("server.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        let result = load_from(&path).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("server.toml");
        std::fs::write(&path, "service_name = \"base/control\"\n").expect("write");

        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.service_name, "base/control");
        assert_eq!(cfg.node_name, "minimal_service");
        assert_eq!(cfg.queue_depth, 32);
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("server.toml");
        std::fs::write(&path, "queue_depth = \"many\"\n").expect("write");

        let err = load_from(&path).expect_err("must fail");
        assert!(matches!(err, PluginError::Config(_)));
    }

    // Env-var tests share process state, so each one touches a distinct
    // variable.

    #[test]
    fn apply_env_overrides_changes_service_name() {
        // SAFETY: only this test touches MYROBOT_SERVICE_NAME.
        unsafe { std::env::set_var("MYROBOT_SERVICE_NAME", "robot_control_service_2") };
        let mut cfg = ServerConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.service_name, "robot_control_service_2");
        unsafe { std::env::remove_var("MYROBOT_SERVICE_NAME") };
    }

    #[test]
    fn apply_env_overrides_changes_node_name() {
        // SAFETY: only this test touches MYROBOT_NODE_NAME.
        unsafe { std::env::set_var("MYROBOT_NODE_NAME", "bench_stub") };
        let mut cfg = ServerConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.node_name, "bench_stub");
        unsafe { std::env::remove_var("MYROBOT_NODE_NAME") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_queue_depth() {
        // SAFETY: only this test touches MYROBOT_QUEUE_DEPTH.
        unsafe { std::env::set_var("MYROBOT_QUEUE_DEPTH", "0") };
        let mut cfg = ServerConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.queue_depth, 32);
        unsafe { std::env::remove_var("MYROBOT_QUEUE_DEPTH") };
    }
}
