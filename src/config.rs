use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::platform::{NativePlatform, Platform};

pub const DEFAULT_PORT: u16 = 9855;
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Resolved runtime settings. Precedence: CLI flags, then `SCRIPTSHED_*`
/// environment variables, then `config.toml` in the data directory, then
/// built-in defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub scripts_dir: PathBuf,
    pub container: bool,
    pub host_access: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    host: Option<String>,
    port: Option<u16>,
    scripts_dir: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Self {
        Self::load_with_overrides(None, None)
    }

    pub fn load_with_overrides(host: Option<String>, port: Option<u16>) -> Self {
        let data_dir = NativePlatform::data_dir();
        let file = read_config_file(&data_dir.join("config.toml"));

        let host = host
            .or_else(|| std::env::var("SCRIPTSHED_HOST").ok().filter(|v| !v.is_empty()))
            .or(file.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = port
            .or_else(|| std::env::var("SCRIPTSHED_PORT").ok().and_then(|v| v.parse().ok()))
            .or(file.port)
            .unwrap_or(DEFAULT_PORT);
        let scripts_dir = std::env::var("SCRIPTSHED_SCRIPTS_DIR")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or(file.scripts_dir)
            .unwrap_or_else(|| data_dir.join("scripts"));

        let container = std::env::var("SCRIPTSHED_CONTAINER")
            .map(|v| v == "1")
            .unwrap_or(false)
            || Path::new("/.dockerenv").exists();
        let host_access = std::env::var("SCRIPTSHED_HOST_ROOT")
            .map(|v| !v.is_empty())
            .unwrap_or(false);

        Self {
            host,
            port,
            data_dir,
            scripts_dir,
            container,
            host_access,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Browser-facing URL. A wildcard bind is not something a browser can open.
    pub fn dashboard_url(&self) -> String {
        let host = if self.host == "0.0.0.0" {
            "127.0.0.1"
        } else {
            self.host.as_str()
        };
        format!("http://{}:{}", host, self.port)
    }

    pub fn run_dir(&self) -> PathBuf {
        self.data_dir.join("run")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.run_dir().join("scriptshed.pid")
    }

    pub fn log_file(&self) -> PathBuf {
        self.run_dir().join("scriptshed.log")
    }
}

fn read_config_file(path: &Path) -> ConfigFile {
    let Ok(raw) = std::fs::read_to_string(path) else {
        return ConfigFile::default();
    };
    match toml::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("Ignoring malformed config at {}: {}", path.display(), e);
            ConfigFile::default()
        }
    }
}
