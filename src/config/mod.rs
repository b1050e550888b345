#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use toml_config::FileConfig;

use crate::core::engine::{MAX_INDENT_SIZE, MIN_INDENT_SIZE};
use crate::domain::model::FormatOptions;
use crate::utils::error::{Result, ServiceError};
use crate::utils::validation::{self, Validate};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const DEFAULT_BIND: &str = "127.0.0.1:4000";
pub const DEFAULT_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Fully resolved service settings: defaults, then the settings file, then
/// command-line flags.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub bind: String,
    pub allowed_origins: Vec<String>,
    pub upload_dir: PathBuf,
    pub max_body_bytes: usize,
    pub indent_size: usize,
    pub log_level: Option<String>,
    pub log_json: bool,
    pub verbose: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            allowed_origins: vec![DEFAULT_ORIGIN.to_string()],
            upload_dir: std::env::temp_dir().join("formatkit-uploads"),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            indent_size: FormatOptions::default().indent_size,
            log_level: None,
            log_json: false,
            verbose: false,
        }
    }
}

impl ServiceConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::default();
        config.apply_file(FileConfig::from_file(path)?);
        Ok(config)
    }

    /// Overlays every value present in the file.
    pub fn apply_file(&mut self, file: FileConfig) {
        if let Some(server) = file.server {
            if let Some(bind) = server.bind {
                self.bind = bind;
            }
            if let Some(origins) = server.allowed_origins {
                self.allowed_origins = origins;
            }
            if let Some(max_body_bytes) = server.max_body_bytes {
                self.max_body_bytes = max_body_bytes;
            }
        }
        if let Some(dir) = file.upload.and_then(|upload| upload.dir) {
            self.upload_dir = dir;
        }
        if let Some(indent_size) = file.format.and_then(|format| format.indent_size) {
            self.indent_size = indent_size;
        }
        if let Some(logging) = file.logging {
            if logging.level.is_some() {
                self.log_level = logging.level;
            }
            if let Some(json) = logging.json {
                self.log_json = json;
            }
        }
    }

    pub fn format_options(&self) -> FormatOptions {
        FormatOptions::with_indent(self.indent_size)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .map_err(|e| ServiceError::InvalidConfigValueError {
                field: "server.bind".to_string(),
                value: self.bind.clone(),
                reason: format!("Invalid socket address: {}", e),
            })
    }
}

impl Validate for ServiceConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("server.bind", &self.bind)?;
        validation::validate_socket_addr("server.bind", &self.bind)?;

        for origin in &self.allowed_origins {
            validation::validate_origin("server.allowed_origins", origin)?;
        }

        validation::validate_dir_path("upload.dir", &self.upload_dir)?;
        validation::validate_at_least("server.max_body_bytes", self.max_body_bytes, 1)?;
        validation::validate_range(
            "format.indent_size",
            self.indent_size,
            MIN_INDENT_SIZE,
            MAX_INDENT_SIZE,
        )?;

        if let Some(level) = &self.log_level {
            validation::validate_one_of("logging.level", level, LOG_LEVELS)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind, "127.0.0.1:4000");
        assert_eq!(config.allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.format_options(), FormatOptions::default());
        assert!(config.upload_dir.ends_with("formatkit-uploads"));
    }

    #[test]
    fn test_apply_file_overrides_only_present_values() {
        let file = FileConfig::from_toml_str(
            r#"
[server]
max_body_bytes = 10

[logging]
level = "warn"
"#,
        )
        .unwrap();

        let mut config = ServiceConfig::default();
        config.apply_file(file);

        assert_eq!(config.max_body_bytes, 10);
        assert_eq!(config.log_level.as_deref(), Some("warn"));
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.indent_size, 4);
    }

    #[test]
    fn test_validation_failures() {
        let invalid = [
            ServiceConfig {
                bind: "localhost".to_string(),
                ..ServiceConfig::default()
            },
            ServiceConfig {
                allowed_origins: vec!["ftp://example.com".to_string()],
                ..ServiceConfig::default()
            },
            ServiceConfig {
                upload_dir: PathBuf::new(),
                ..ServiceConfig::default()
            },
            ServiceConfig {
                max_body_bytes: 0,
                ..ServiceConfig::default()
            },
            ServiceConfig {
                indent_size: 17,
                ..ServiceConfig::default()
            },
            ServiceConfig {
                log_level: Some("loud".to_string()),
                ..ServiceConfig::default()
            },
        ];

        for config in invalid {
            assert!(config.validate().is_err(), "expected invalid: {config:?}");
        }
    }
}
