use crate::utils::error::{Result, ServiceError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Optional settings file. Every section and key may be omitted; missing
/// values fall back to the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerSection>,
    pub upload: Option<UploadSection>,
    pub format: Option<FormatSection>,
    pub logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    pub bind: Option<String>,
    pub allowed_origins: Option<Vec<String>>,
    pub max_body_bytes: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadSection {
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatSection {
    pub indent_size: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    pub level: Option<String>,
    pub json: Option<bool>,
}

static ENV_PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

impl FileConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ServiceError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| ServiceError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value. Unknown variables are
    /// left as written.
    fn substitute_env_vars(content: &str) -> String {
        let re = ENV_PLACEHOLDER.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[server]
bind = "0.0.0.0:8080"
allowed_origins = ["http://localhost:3000", "https://app.example.com"]
max_body_bytes = 1048576

[upload]
dir = "/var/tmp/formatkit"

[format]
indent_size = 2

[logging]
level = "debug"
json = true
"#;

        let config = FileConfig::from_toml_str(toml_content).unwrap();
        let server = config.server.unwrap();
        assert_eq!(server.bind.as_deref(), Some("0.0.0.0:8080"));
        assert_eq!(server.allowed_origins.unwrap().len(), 2);
        assert_eq!(server.max_body_bytes, Some(1_048_576));
        assert_eq!(
            config.upload.unwrap().dir,
            Some(PathBuf::from("/var/tmp/formatkit"))
        );
        assert_eq!(config.format.unwrap().indent_size, Some(2));
        assert_eq!(config.logging.unwrap().json, Some(true));
    }

    #[test]
    fn test_empty_config_is_all_defaults() {
        assert_eq!(FileConfig::from_toml_str("").unwrap(), FileConfig::default());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("FORMATKIT_TEST_BIND", "127.0.0.1:9999");

        let toml_content = r#"
[server]
bind = "${FORMATKIT_TEST_BIND}"
allowed_origins = ["${FORMATKIT_TEST_UNSET_ORIGIN}"]
"#;

        let config = FileConfig::from_toml_str(toml_content).unwrap();
        let server = config.server.unwrap();
        assert_eq!(server.bind.as_deref(), Some("127.0.0.1:9999"));
        assert_eq!(
            server.allowed_origins.unwrap(),
            vec!["${FORMATKIT_TEST_UNSET_ORIGIN}".to_string()]
        );

        std::env::remove_var("FORMATKIT_TEST_BIND");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = FileConfig::from_toml_str("[server\nbind = 1").unwrap_err();
        assert!(matches!(err, ServiceError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[format]\nindent_size = 8\n")
            .unwrap();

        let config = FileConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.format.unwrap().indent_size, Some(8));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = FileConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ServiceError::IoError(_)));
    }
}
