//! Global configuration for ansible-role-test
//!
//! Located at `~/.config/ansible-role-test/config.toml`

use crate::{ConfigError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Ansible versions the harness knows how to provision
pub const ANSIBLE_VERSIONS: &[&str] = &["1.8", "1.9", "latest"];

/// Global ansible-role-test configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub daemon: DaemonConfig,
    pub defaults: DefaultsConfig,
}

/// How to reach the container daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Daemon endpoint: `unix:///path`, a bare socket path, `tcp://host:port`,
    /// `http://...` or `https://...`
    pub host: String,
    /// Request timeout applied by the connection
    pub timeout_secs: u64,
    /// Use TLS for TCP endpoints
    pub tls_verify: bool,
    /// Directory holding `key.pem`, `cert.pem` and `ca.pem`
    pub cert_path: Option<String>,
    /// Grace period handed to the daemon when stopping a container
    pub stop_timeout_secs: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: "unix:///var/run/docker.sock".to_string(),
            timeout_secs: 120,
            tls_verify: false,
            cert_path: None,
            stop_timeout_secs: 10,
        }
    }
}

impl DaemonConfig {
    /// Resolve the certificate directory, expanding `~`
    pub fn cert_dir(&self) -> Option<PathBuf> {
        self.cert_path
            .as_deref()
            .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()))
    }
}

/// Default settings for test runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Image to use per ansible version
    pub images: BTreeMap<String, String>,
    /// Run test containers privileged
    pub privileged: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            images: default_images(),
            privileged: false,
        }
    }
}

fn default_images() -> BTreeMap<String, String> {
    ANSIBLE_VERSIONS
        .iter()
        .map(|v| (v.to_string(), format!("ansiblerole/test:{}", v)))
        .collect()
}

impl DefaultsConfig {
    /// Image for the given ansible version, falling back to the built-in table
    pub fn image_for(&self, version: &str) -> Option<String> {
        self.images
            .get(version)
            .cloned()
            .or_else(|| default_images().remove(version))
    }
}

impl GlobalConfig {
    /// Load global configuration from the default path, then apply
    /// `DOCKER_HOST`, `DOCKER_TLS_VERIFY` and `DOCKER_CERT_PATH`
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load global configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;

        tracing::debug!("Loaded config from {:?}: daemon={}", path, config.daemon.host);

        Ok(config)
    }

    /// Override daemon settings from the docker client environment
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("DOCKER_HOST").filter(|h| !h.is_empty()) {
            self.daemon.host = host;
        }
        if let Some(verify) = lookup("DOCKER_TLS_VERIFY") {
            self.daemon.tls_verify = !verify.is_empty() && verify != "0";
        }
        if let Some(cert_path) = lookup("DOCKER_CERT_PATH").filter(|p| !p.is_empty()) {
            self.daemon.cert_path = Some(cert_path);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.daemon.host.trim().is_empty() {
            return Err(ConfigError::Invalid("daemon.host must not be empty".to_string()));
        }
        if self.daemon.tls_verify && self.daemon.cert_path.is_none() {
            return Err(ConfigError::Invalid(
                "daemon.tls_verify requires daemon.cert_path".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let dirs =
            ProjectDirs::from("", "", "ansible-role-test").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GlobalConfig::default();
        assert_eq!(config.daemon.host, "unix:///var/run/docker.sock");
        assert_eq!(config.daemon.timeout_secs, 120);
        assert_eq!(config.daemon.stop_timeout_secs, 10);
        assert!(!config.defaults.privileged);
        assert_eq!(
            config.defaults.image_for("latest").as_deref(),
            Some("ansiblerole/test:latest")
        );
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[daemon]
host = "tcp://10.0.0.5:2376"
tls_verify = true
cert_path = "/etc/docker/certs"

[defaults]
privileged = true

[defaults.images]
latest = "registry.local/ansible:2"
"#;

        let config: GlobalConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.daemon.host, "tcp://10.0.0.5:2376");
        assert!(config.daemon.tls_verify);
        assert_eq!(config.daemon.timeout_secs, 120);
        assert!(config.defaults.privileged);
        assert_eq!(
            config.defaults.image_for("latest").as_deref(),
            Some("registry.local/ansible:2")
        );
        // Versions missing from the file fall back to the built-in table
        assert_eq!(
            config.defaults.image_for("1.9").as_deref(),
            Some("ansiblerole/test:1.9")
        );
        assert_eq!(config.defaults.image_for("0.9"), None);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = GlobalConfig::load_from(&tmp.path().join("nope.toml")).unwrap();
        assert_eq!(config.daemon.host, "unix:///var/run/docker.sock");
    }

    #[test]
    fn test_load_rejects_tls_without_certs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[daemon]\nhost = \"tcp://h:2376\"\ntls_verify = true\n").unwrap();
        let err = GlobalConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[daemon\n").unwrap();
        let err = GlobalConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TomlParseError { .. }));
    }

    #[test]
    fn test_apply_env_overrides_daemon() {
        let mut config = GlobalConfig::default();
        config.apply_env(|key| match key {
            "DOCKER_HOST" => Some("tcp://docker.example:2376".to_string()),
            "DOCKER_TLS_VERIFY" => Some("1".to_string()),
            "DOCKER_CERT_PATH" => Some("/certs".to_string()),
            _ => None,
        });
        assert_eq!(config.daemon.host, "tcp://docker.example:2376");
        assert!(config.daemon.tls_verify);
        assert_eq!(config.daemon.cert_dir(), Some(PathBuf::from("/certs")));
    }

    #[test]
    fn test_apply_env_ignores_empty_host() {
        let mut config = GlobalConfig::default();
        config.apply_env(|key| match key {
            "DOCKER_HOST" => Some(String::new()),
            "DOCKER_TLS_VERIFY" => Some("0".to_string()),
            _ => None,
        });
        assert_eq!(config.daemon.host, "unix:///var/run/docker.sock");
        assert!(!config.daemon.tls_verify);
    }
}
