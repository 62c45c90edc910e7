//! Connection configuration.
//!
//! The remote client is configured by a small triple: client name, config
//! file and keyring. It can come from a conventional args string
//! (`-n=client.admin -c=/etc/remote.conf -k=/etc/keyring`), from the
//! `REMOTEFS_ARGS` environment variable holding such a string, or from a
//! TOML file:
//!
//! ```toml
//! name = "client.admin"
//! config_path = "/etc/remote.conf"
//! keyring_path = "~/.remote/keyring"
//! ```
//!
//! Paths have a leading `~` expanded to the home directory.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable holding the args string read by [`RemoteConfig::from_env`].
pub const ARGS_ENV: &str = "REMOTEFS_ARGS";

/// Prefix stripped from the client name to get the mount id.
const CLIENT_PREFIX: &str = "client.";

/// Errors from loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// How to reach the remote filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Client name, usually `client.<id>`.
    pub name: Option<String>,
    /// Client configuration file. `None` uses the client's default search.
    pub config_path: Option<PathBuf>,
    /// Keyring file holding the client's credentials.
    pub keyring_path: Option<PathBuf>,
}

impl RemoteConfig {
    /// Parse a whitespace-separated args string.
    ///
    /// Recognises `-n=`/`--name=`, `-c=` and `-k=`. Unknown tokens are
    /// ignored and a later token overrides an earlier one.
    pub fn parse_args(args: &str) -> Self {
        let mut config = Self::default();
        for token in args.split_whitespace() {
            if let Some(name) = token
                .strip_prefix("-n=")
                .or_else(|| token.strip_prefix("--name="))
            {
                config.name = Some(name.to_string());
            } else if let Some(path) = token.strip_prefix("-c=") {
                config.config_path = Some(expand(path));
            } else if let Some(path) = token.strip_prefix("-k=") {
                config.keyring_path = Some(expand(path));
            }
        }
        config
    }

    /// Read [`ARGS_ENV`]. An unset variable gives the default config.
    pub fn from_env() -> Self {
        match std::env::var(ARGS_ENV) {
            Ok(args) => Self::parse_args(&args),
            Err(_) => Self::default(),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        let mut config: Self = toml::from_str(text)?;
        config.config_path = config.config_path.map(expand_path);
        config.keyring_path = config.keyring_path.map(expand_path);
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Client name with any `client.` prefix removed.
    pub fn mount_id(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(|name| name.strip_prefix(CLIENT_PREFIX).unwrap_or(name))
    }
}

fn expand(path: &str) -> PathBuf {
    shellexpand::tilde(path).as_ref().into()
}

fn expand_path(path: PathBuf) -> PathBuf {
    match path.to_str() {
        Some(text) => expand(text),
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_args() {
        let config = RemoteConfig::parse_args("-n=client.admin -c=/etc/r.conf -k=/etc/keyring");
        assert_eq!(config.name.as_deref(), Some("client.admin"));
        assert_eq!(config.config_path, Some(PathBuf::from("/etc/r.conf")));
        assert_eq!(config.keyring_path, Some(PathBuf::from("/etc/keyring")));
        assert_eq!(config.mount_id(), Some("admin"));
    }

    #[test]
    fn test_parse_args_long_name_and_overrides() {
        let config = RemoteConfig::parse_args("--name=client.a  --verbose -n=client.b junk");
        assert_eq!(config.name.as_deref(), Some("client.b"));
        assert!(config.config_path.is_none());
        assert!(config.keyring_path.is_none());
    }

    #[test]
    fn test_parse_args_empty() {
        assert_eq!(RemoteConfig::parse_args(""), RemoteConfig::default());
        assert_eq!(RemoteConfig::parse_args("   \t "), RemoteConfig::default());
    }

    #[test]
    fn test_mount_id() {
        let mut config = RemoteConfig::default();
        assert_eq!(config.mount_id(), None);

        config.name = Some("backup".into());
        assert_eq!(config.mount_id(), Some("backup"));

        config.name = Some("client.".into());
        assert_eq!(config.mount_id(), Some(""));
    }

    #[test]
    fn test_tilde_expansion() {
        let config = RemoteConfig::parse_args("-k=~/keyring");
        let keyring = config.keyring_path.unwrap();
        assert!(!keyring.starts_with("~"));
        assert!(keyring.ends_with("keyring"));
    }

    #[test]
    fn test_from_toml_str() {
        let config = RemoteConfig::from_toml_str(
            r#"
            name = "client.fs"
            keyring_path = "/k"
            "#,
        )
        .unwrap();
        assert_eq!(config.mount_id(), Some("fs"));
        assert_eq!(config.keyring_path, Some(PathBuf::from("/k")));
        assert!(config.config_path.is_none());

        assert!(RemoteConfig::from_toml_str("name = 3").is_err());
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "config_path = \"/etc/remote.conf\"").unwrap();
        let config = RemoteConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.config_path, Some(PathBuf::from("/etc/remote.conf")));

        let err = RemoteConfig::from_toml_file(Path::new("/nonexistent/remotefs.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
