//! Overlay configuration.
//!
//! Describes which archives to mount and which host-only operations may be
//! forwarded, in TOML:
//!
//! ```toml
//! passthrough = ["chmod", "watch"]
//!
//! [[mount]]
//! archive = "/pkg/app.zip"
//!
//! [[mount]]
//! archive = "assets.bin"
//! algorithm = "aes-256-gcm"
//! password_env = "ASSETS_KEY"
//! ```
//!
//! Relative archive paths are resolved against the config file's directory
//! when loaded with [`OverlayConfig::load`], and against the working
//! directory otherwise.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Error type for config operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("password environment variable not set: {0}")]
    MissingPasswordEnv(String),

    #[error("both password and password_env given for {0}")]
    ConflictingPassword(PathBuf),
}

/// One `[[mount]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MountConfig {
    /// Archive file; also the mount root.
    pub archive: PathBuf,
    /// Decryption algorithm, if the archive is encrypted.
    #[serde(default)]
    pub algorithm: Option<String>,
    /// Literal password.
    #[serde(default)]
    pub password: Option<String>,
    /// Environment variable holding the password.
    #[serde(default)]
    pub password_env: Option<String>,
}

impl MountConfig {
    pub fn new(archive: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
            algorithm: None,
            password: None,
            password_env: None,
        }
    }

    /// Resolve the password from the literal or the named environment variable.
    pub fn password(&self) -> Result<Option<String>, ConfigError> {
        match (&self.password, &self.password_env) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingPassword(self.archive.clone())),
            (Some(password), None) => Ok(Some(password.clone())),
            (None, Some(var)) => std::env::var(var)
                .map(Some)
                .map_err(|_| ConfigError::MissingPasswordEnv(var.clone())),
            (None, None) => Ok(None),
        }
    }
}

/// Top-level overlay configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverlayConfig {
    /// Host-only operations the dispatcher may forward.
    #[serde(default)]
    pub passthrough: Vec<String>,
    /// Archives to mount, in order.
    #[serde(default, rename = "mount")]
    pub mounts: Vec<MountConfig>,
}

impl OverlayConfig {
    /// Read and parse a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;

        if let Some(base) = path.parent() {
            for mount in &mut config.mounts {
                if mount.archive.is_relative() {
                    mount.archive = base.join(&mount.archive);
                }
            }
        }

        tracing::debug!(
            path = %path.display(),
            mounts = config.mounts.len(),
            "loaded overlay config"
        );
        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
passthrough = ["chmod", "watch"]

[[mount]]
archive = "/pkg/app.zip"

[[mount]]
archive = "assets.bin"
algorithm = "aes-256-gcm"
password = "hunter2"
"#;

    #[test]
    fn test_parse() {
        let config = OverlayConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.passthrough, vec!["chmod", "watch"]);
        assert_eq!(config.mounts.len(), 2);
        assert_eq!(config.mounts[0], MountConfig::new("/pkg/app.zip"));
        assert_eq!(config.mounts[1].algorithm.as_deref(), Some("aes-256-gcm"));
        assert_eq!(config.mounts[1].password().unwrap().as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_empty_config() {
        let config = OverlayConfig::from_toml_str("").unwrap();
        assert_eq!(config, OverlayConfig::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = OverlayConfig::from_toml_str("[[mount]]\narchive = \"a.zip\"\nkey = \"x\"\n");
        assert!(matches!(err, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_password_env() {
        let mut mount = MountConfig::new("a.zip");
        mount.password_env = Some("ARCMOUNT_TEST_UNSET_PASSWORD_VAR".into());
        assert!(matches!(
            mount.password(),
            Err(ConfigError::MissingPasswordEnv(var)) if var == "ARCMOUNT_TEST_UNSET_PASSWORD_VAR"
        ));

        // PATH is always present in the test environment.
        mount.password_env = Some("PATH".into());
        assert!(mount.password().unwrap().is_some());

        mount.password = Some("literal".into());
        assert!(matches!(mount.password(), Err(ConfigError::ConflictingPassword(_))));
    }

    #[test]
    fn test_load_rebases_relative_archives() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("overlay.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = OverlayConfig::load(&path).unwrap();
        assert_eq!(config.mounts[0].archive, PathBuf::from("/pkg/app.zip"));
        assert_eq!(config.mounts[1].archive, dir.path().join("assets.bin"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = OverlayConfig::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
