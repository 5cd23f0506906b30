use crate::domain::ports::ConfigProvider;
use crate::utils::error::{FsError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub container: ContainerConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub path: Option<String>,
    pub block_size: Option<u64>,
    pub header_size: Option<u64>,
    pub sync_on_flush: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    /// `compact` or `json`
    pub format: Option<String>,
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 2] = ["compact", "json"];

impl TomlConfig {
    /// Loads the configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Parses the configuration from a TOML string, substituting `${VAR}` first.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// Replaces `${VAR}` with the environment value; unknown variables stay as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| FsError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    pub fn json_logs(&self) -> bool {
        self.logging
            .as_ref()
            .and_then(|l| l.format.as_deref())
            .map(|format| format == "json")
            .unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn container_path(&self) -> Option<&str> {
        self.container.path.as_deref()
    }

    fn block_size(&self) -> Option<u64> {
        self.container.block_size
    }

    fn header_size(&self) -> Option<u64> {
        self.container.header_size
    }

    fn sync_on_flush(&self) -> Option<bool> {
        self.container.sync_on_flush
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        if let Some(path) = &self.container.path {
            validation::validate_path("container.path", path)?;
        }
        if let Some(block_size) = self.container.block_size {
            validation::validate_power_of_two("container.block_size", block_size)?;
            validation::validate_range(
                "container.block_size",
                block_size,
                super::MIN_BLOCK_SIZE,
                super::MAX_BLOCK_SIZE,
            )?;
        }
        if let Some(header_size) = self.container.header_size {
            validation::validate_multiple_of("container.header_size", header_size, 512)?;
            validation::validate_range(
                "container.header_size",
                header_size,
                super::MIN_HEADER_SIZE,
                u64::from(u32::MAX),
            )?;
        }
        if let Some(logging) = &self.logging {
            if let Some(level) = &logging.level {
                validation::validate_one_of("logging.level", level, &LOG_LEVELS)?;
            }
            if let Some(format) = &logging.format {
                validation::validate_one_of("logging.format", format, &LOG_FORMATS)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_basic_toml_config() {
        let toml_content = r#"
[container]
path = "data.cfs"
block_size = 1024
header_size = 8192

[logging]
level = "debug"
format = "json"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.container_path(), Some("data.cfs"));
        assert_eq!(config.block_size(), Some(1024));
        assert_eq!(config.header_size(), Some(8192));
        assert_eq!(config.log_level(), Some("debug"));
        assert!(config.json_logs());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert!(config.container_path().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("CFS_TEST_CONTAINER", "/tmp/from-env.cfs");

        let toml_content = r#"
[container]
path = "${CFS_TEST_CONTAINER}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.container_path(), Some("/tmp/from-env.cfs"));

        std::env::remove_var("CFS_TEST_CONTAINER");
    }

    #[test]
    fn test_config_validation() {
        let config = TomlConfig::from_toml_str("[container]\nblock_size = 3000\n").unwrap();
        assert!(config.validate().is_err());

        let config = TomlConfig::from_toml_str("[logging]\nlevel = \"loud\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml() {
        let result = TomlConfig::from_toml_str("[container\npath = ");
        assert!(matches!(result, Err(FsError::TomlError(_))));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[container]\npath = \"file.cfs\"\nsync_on_flush = true\n")
            .unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.container_path(), Some("file.cfs"));
        assert_eq!(config.sync_on_flush(), Some(true));
    }
}
