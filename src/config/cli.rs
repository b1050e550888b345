use super::ServiceConfig;
use crate::utils::error::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "formatkit")]
#[command(about = "HTTP service that converts, formats and validates text formats")]
pub struct CliConfig {
    #[arg(long, help = "Path to a TOML settings file")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Socket address to listen on, e.g. 127.0.0.1:4000")]
    pub bind: Option<String>,

    #[arg(long = "allowed-origin", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    #[arg(long)]
    pub upload_dir: Option<PathBuf>,

    #[arg(long)]
    pub max_body_bytes: Option<usize>,

    #[arg(long)]
    pub indent_size: Option<usize>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Write logs as JSON lines")]
    pub log_json: bool,
}

impl CliConfig {
    /// Builds the effective settings: defaults, then `--config`, then flags.
    pub fn resolve(&self) -> Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::from_file(path)?,
            None => ServiceConfig::default(),
        };
        self.apply_to(&mut config);
        Ok(config)
    }

    fn apply_to(&self, config: &mut ServiceConfig) {
        if let Some(bind) = &self.bind {
            config.bind = bind.clone();
        }
        if !self.allowed_origins.is_empty() {
            config.allowed_origins = self.allowed_origins.clone();
        }
        if let Some(dir) = &self.upload_dir {
            config.upload_dir = dir.clone();
        }
        if let Some(max_body_bytes) = self.max_body_bytes {
            config.max_body_bytes = max_body_bytes;
        }
        if let Some(indent_size) = self.indent_size {
            config.indent_size = indent_size;
        }
        config.verbose |= self.verbose;
        config.log_json |= self.log_json;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_no_flags_gives_defaults() {
        let cli = CliConfig::try_parse_from(["formatkit"]).unwrap();
        assert_eq!(cli.resolve().unwrap(), ServiceConfig::default());
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[server]\nbind = \"0.0.0.0:9000\"\nmax_body_bytes = 64\n\n[format]\nindent_size = 8\n")
            .unwrap();
        let path = file.path().to_string_lossy().to_string();

        let cli = CliConfig::try_parse_from([
            "formatkit",
            "--config",
            &path,
            "--indent-size",
            "2",
            "--allowed-origin",
            "http://a.test,https://b.test",
            "--verbose",
        ])
        .unwrap();
        let config = cli.resolve().unwrap();

        assert_eq!(config.bind, "0.0.0.0:9000");
        assert_eq!(config.max_body_bytes, 64);
        assert_eq!(config.indent_size, 2);
        assert_eq!(config.allowed_origins, vec!["http://a.test", "https://b.test"]);
        assert!(config.verbose);
    }

    #[test]
    fn test_missing_config_file_fails() {
        let cli = CliConfig::try_parse_from(["formatkit", "--config", "/no/such/file.toml"]).unwrap();
        assert!(cli.resolve().is_err());
    }
}
