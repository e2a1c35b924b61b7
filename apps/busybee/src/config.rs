use anyhow::{Context, Result, ensure};
use okapi_deploy::OkapiConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment prefix; `BUSYBEE__OKAPI__URL` maps to `okapi.url`
pub const ENV_PREFIX: &str = "BUSYBEE__";

/// Effective application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub okapi: OkapiConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset and no `-v` is given
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            json: false,
        }
    }
}

/// Values given on the command line; they win over every other layer.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub okapi_url: Option<String>,
    pub verbose: u8,
}

impl AppConfig {
    /// Layered load: defaults, then the YAML file, then `BUSYBEE__*` variables.
    ///
    /// # Errors
    /// Returns an error if the file cannot be parsed or a value has the wrong shape.
    pub fn load_layered(config_path: &Path) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Yaml},
        };

        Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Yaml::file(config_path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("failed to load config from {}", config_path.display()))
    }

    /// Like [`AppConfig::load_layered`], or environment over defaults when no file is given.
    ///
    /// # Errors
    /// Fails if an explicitly given file does not exist or cannot be loaded.
    pub fn load_or_default(config_path: Option<&Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Serialized},
        };

        if let Some(path) = config_path {
            ensure!(
                path.is_file(),
                "config file does not exist: {}",
                path.display()
            );
            return Self::load_layered(path);
        }

        Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("failed to load config from environment")
    }

    pub fn apply_cli_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(url) = &overrides.okapi_url {
            self.okapi.url.clone_from(url);
        }
        match overrides.verbose {
            0 => {}
            1 => "info".clone_into(&mut self.logging.level),
            2 => "debug".clone_into(&mut self.logging.level),
            _ => "trace".clone_into(&mut self.logging.level),
        }
    }

    /// # Errors
    /// Returns the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        self.okapi.validate().context("invalid okapi configuration")
    }

    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_saphyr::to_string(self).context("failed to serialize config to YAML")
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use okapi_deploy::EnableStrategy;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("busybee.yaml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn yaml_overrides_defaults_per_field() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            r#"
okapi:
  url: "http://okapi.internal:9130"
  request_timeout: "3s"
  enable:
    strategy: unconditional-install
    retry:
      max_retries: 2
logging:
  json: true
"#,
        );

        let config = AppConfig::load_layered(&path).unwrap();
        assert_eq!(config.okapi.url, "http://okapi.internal:9130");
        assert_eq!(config.okapi.request_timeout, Duration::from_secs(3));
        assert_eq!(config.okapi.supertenant, "supertenant");
        assert_eq!(
            config.okapi.enable.strategy,
            EnableStrategy::UnconditionalInstall
        );
        assert_eq!(config.okapi.enable.retry.max_retries, 2);
        assert_eq!(
            config.okapi.enable.retry.initial_backoff,
            Duration::from_secs(2)
        );
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = AppConfig::load_or_default(Some(Path::new("/nonexistent/busybee.yaml")))
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn unknown_keys_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "okapi:\n  tenant: diku\n");
        assert!(AppConfig::load_layered(&path).is_err());
    }

    #[test]
    fn cli_overrides_win() {
        let mut config = AppConfig::default();
        config.apply_cli_overrides(&CliOverrides {
            okapi_url: Some("http://other:9130".to_owned()),
            verbose: 2,
        });
        assert_eq!(config.okapi.url, "http://other:9130");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn verbose_levels_matrix() {
        for (verbose, expected) in [(0, "warn"), (1, "info"), (2, "debug"), (3, "trace"), (7, "trace")] {
            let mut config = AppConfig::default();
            config.apply_cli_overrides(&CliOverrides {
                okapi_url: None,
                verbose,
            });
            assert_eq!(config.logging.level, expected, "verbose={verbose}");
        }
    }

    #[test]
    fn yaml_output_round_trips() {
        let config = AppConfig::default();
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("supertenant"));
        assert!(yaml.contains("check-then-create"));

        let dir = TempDir::new().unwrap();
        let path = write(&dir, &yaml);
        assert_eq!(AppConfig::load_layered(&path).unwrap(), config);
    }

    #[test]
    fn validate_reports_bad_settings() {
        let mut config = AppConfig::default();
        config.okapi.enable.retry.statuses = vec![42];
        assert!(config.validate().is_err());
    }
}
