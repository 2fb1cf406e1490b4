//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("tq.db"),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: defaults, the user config file, `config_path`, then
    /// `TQ_*` environment variables.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("TQ_"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for tq.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tq"))
}

/// Returns the platform-specific data directory for tq.
///
/// On Linux: `~/.local/share/tq`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("tq"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_tq() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "tq");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("tq.db"));
    }

    #[test]
    fn test_explicit_config_file_overrides_default() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("custom.toml", r#"database_path = "/tmp/custom.db""#)?;
            let config = Config::load_from(Some(Path::new("custom.toml")))?;
            assert_eq!(config.database_path, PathBuf::from("/tmp/custom.db"));
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_config_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("custom.toml", r#"database_path = "/tmp/custom.db""#)?;
            jail.set_env("TQ_DATABASE_PATH", "/tmp/from-env.db");
            let config = Config::load_from(Some(Path::new("custom.toml")))?;
            assert_eq!(config.database_path, PathBuf::from("/tmp/from-env.db"));
            Ok(())
        });
    }
}
