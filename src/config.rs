//! Service configuration.
//!
//! Relative paths in the configuration are resolved against the directory of the
//! configuration file.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{CertMgrError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Path of the ACME provider configuration.
    #[serde(default)]
    pub acme_config: String,
    /// Where the registry keeps its state.
    #[serde(default)]
    pub state_path: String,
    #[serde(skip)]
    pub config_dir: PathBuf,
}

impl Config {
    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading config");
        let config_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let source = config::File::from(path).format(config::FileFormat::Yaml);
        let config = config::Config::builder()
            .add_source(source)
            .build()?;
        Self::from_config(config, config_dir)
    }

    /// Parses YAML content; relative paths resolve against `config_dir`.
    pub fn from_yaml_str(content: &str, config_dir: impl Into<PathBuf>) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Yaml))
            .build()?;
        Self::from_config(config, config_dir.into())
    }

    fn from_config(config: config::Config, config_dir: PathBuf) -> Result<Self> {
        let mut parsed: Self = config.try_deserialize()?;
        parsed.config_dir = config_dir;
        if !parsed.state_path.is_empty() {
            parsed.state_path = path_string(&parsed.resolve_config_file(&parsed.state_path))?;
        }
        Ok(parsed)
    }

    /// Resolves a path from the configuration: absolute paths are kept, relative ones are
    /// joined to the configuration directory.
    pub fn resolve_config_file(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }

    /// The resolved path of the ACME provider configuration.
    pub fn acme_config_path(&self) -> PathBuf {
        self.resolve_config_file(&self.acme_config)
    }
}

fn path_string(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| CertMgrError::Config(format!("non UTF-8 path '{}'", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let config = Config::from_yaml_str(
            "acme_config: acme.yaml\nstate_path: state\n",
            "/etc/certmgr",
        )
        .unwrap();
        assert_eq!(config.acme_config, "acme.yaml");
        assert_eq!(
            config.acme_config_path(),
            PathBuf::from("/etc/certmgr/acme.yaml")
        );
        assert_eq!(config.state_path, "/etc/certmgr/state");
    }

    #[test]
    fn absolute_paths_are_kept() {
        let config = Config::from_yaml_str(
            "acme_config: /srv/acme.yaml\nstate_path: /var/lib/certmgr\n",
            "/etc/certmgr",
        )
        .unwrap();
        assert_eq!(config.acme_config_path(), PathBuf::from("/srv/acme.yaml"));
        assert_eq!(config.state_path, "/var/lib/certmgr");
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "acme_config: acme.yaml").unwrap();
        let config = Config::load(file.path()).unwrap();
        let dir = file.path().parent().unwrap();
        assert_eq!(config.acme_config_path(), dir.join("acme.yaml"));
        assert_eq!(config.state_path, "");
    }

    #[test]
    fn broken_yaml_is_a_config_error() {
        let err = Config::from_yaml_str("acme_config: [", "/etc").unwrap_err();
        assert!(matches!(err, CertMgrError::Config(_)));
    }
}
