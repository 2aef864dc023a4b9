use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const CONFIG_FILE: &str = "shape.toml";

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    #[default]
    Glsl,
    Cpp,
}

/// Settings read from `shape.toml`.
///
/// ```toml
/// deprecation_level = 2
/// verbose = true
/// target = "cpp"
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SystemConfig {
    /// 0 silences deprecated syntax, 1 warns once per feature, 2 rejects it.
    pub deprecation_level: u8,
    /// Warn at every occurrence instead of once per feature.
    pub verbose: bool,
    pub target: Target,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            deprecation_level: 1,
            verbose: false,
            target: Target::Glsl,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {error}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("invalid configuration in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

impl SystemConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        Self::from_toml_str(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: error.to_string(),
        })
    }

    /// Loads `shape.toml` from the directory containing `input`, falling back to
    /// the defaults when there is none.
    pub fn load_beside(input: &Path) -> Result<Self, ConfigError> {
        let dir = input
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        let candidate = dir.join(CONFIG_FILE);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn deprecation_level(&self) -> u8 {
        self.deprecation_level.min(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let config = SystemConfig::from_toml_str("verbose = true").expect("parse");
        assert!(config.verbose);
        assert_eq!(config.deprecation_level, 1);
        assert_eq!(config.target, Target::Glsl);
    }

    #[test]
    fn reads_every_setting() {
        let config =
            SystemConfig::from_toml_str("deprecation_level = 2\ntarget = \"cpp\"").expect("parse");
        assert_eq!(config.deprecation_level(), 2);
        assert_eq!(config.target, Target::Cpp);
    }

    #[test]
    fn rejects_unknown_keys_and_targets() {
        assert!(SystemConfig::from_toml_str("colour = 1").is_err());
        assert!(SystemConfig::from_toml_str("target = \"hlsl\"").is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = SystemConfig::load(Path::new("/nonexistent/shape.toml")).expect_err("missing");
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
