use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cli::{Cli, Command, ValidateArgs, VerbosityLevel};
use crate::converter::ConversionOptions;
use crate::error::{ConfigError, ConfigResult as Result};
use crate::http_client::HttpClientConfig;
use crate::output::OutputFormat;
use crate::validator::ValidationConfig;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub validation: ValidationSettings,
    pub network: NetworkSettings,
    pub output: OutputSettings,
    pub conversion: ConversionSettings,
}

/// Validation-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ValidationSettings {
    /// Report missing recommended fields
    pub strict: bool,
    /// Resolve schemas from `schema_dir` instead of the network
    pub offline: bool,
    pub schema_dir: Option<PathBuf>,
    /// Number of files validated concurrently
    pub threads: Option<usize>,
}

/// Schema download configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkSettings {
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OutputSettings {
    pub format: OutputFormat,
    pub verbose: bool,
    pub quiet: bool,
}

/// Formatting of converted documents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConversionSettings {
    pub pretty: bool,
    pub indent: usize,
    pub include_attributes: bool,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            retry_attempts: 0,
            retry_delay_ms: 500,
        }
    }
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            pretty: true,
            indent: 2,
            include_attributes: true,
        }
    }
}

const CONFIG_NAMES: &[&str] = &["nfo.toml", ".nfo.toml", "nfo.json"];

pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        let mut config = match &cli.config {
            Some(path) => Self::load_from_file(path).await?,
            None => Self::find_config_file().await?.unwrap_or_default(),
        };

        config = Self::apply_environment_overrides(config)?;
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => match toml::from_str::<Config>(&content) {
                Ok(config) => Ok(config),
                Err(_) => Ok(serde_json::from_str(&content)?),
            },
        }
    }

    /// Find configuration file in the working directory, then the user config dir
    pub async fn find_config_file() -> Result<Option<Config>> {
        for name in CONFIG_NAMES {
            let path = PathBuf::from(name);
            if path.exists() {
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("nfo");
            for name in CONFIG_NAMES {
                let path = app_config_dir.join(name);
                if path.exists() {
                    return Ok(Some(Self::load_from_file(&path).await?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(offline) = env.get("NFO_OFFLINE") {
            config.validation.offline = parse_env("NFO_OFFLINE", &offline)?;
        }

        if let Some(schema_dir) = env.get("NFO_SCHEMA_DIR") {
            config.validation.schema_dir = Some(PathBuf::from(schema_dir));
        }

        if let Some(strict) = env.get("NFO_STRICT") {
            config.validation.strict = parse_env("NFO_STRICT", &strict)?;
        }

        if let Some(threads) = env.get("NFO_THREADS") {
            config.validation.threads = Some(parse_env("NFO_THREADS", &threads)?);
        }

        if let Some(timeout) = env.get("NFO_TIMEOUT") {
            config.network.timeout_seconds = parse_env("NFO_TIMEOUT", &timeout)?;
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if cli.verbose {
            config.output.verbose = true;
            config.output.quiet = false;
        }
        if cli.quiet {
            config.output.quiet = true;
            config.output.verbose = false;
        }

        if let Command::Validate(args) = &cli.command {
            config = Self::merge_validate_args(config, args);
        }
        config
    }

    fn merge_validate_args(mut config: Config, args: &ValidateArgs) -> Config {
        if args.strict {
            config.validation.strict = true;
        }
        if args.offline {
            config.validation.offline = true;
        }
        if let Some(schema_dir) = &args.schema_dir {
            config.validation.schema_dir = Some(schema_dir.clone());
        }
        if args.threads.is_some() {
            config.validation.threads = args.threads;
        }
        if let Some(timeout) = args.timeout {
            config.network.timeout_seconds = timeout;
        }
        if let Some(format) = args.format {
            config.output.format = format;
        }
        config
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if config.validation.threads == Some(0) {
            return Err(ConfigError::Validation(
                "Number of threads must be greater than 0".to_string(),
            ));
        }

        if config.validation.offline && config.validation.schema_dir.is_none() {
            return Err(ConfigError::Validation(
                "Offline mode requires a schema directory".to_string(),
            ));
        }

        if config.network.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        Ok(())
    }

    /// Schema directory to use, or `None` to fetch schemas over HTTP
    pub fn offline_schema_dir(config: &Config) -> Option<&Path> {
        if config.validation.offline {
            config.validation.schema_dir.as_deref()
        } else {
            None
        }
    }

    pub fn get_thread_count(config: &Config) -> usize {
        config.validation.threads.unwrap_or_else(num_cpus::get)
    }

    /// Verbosity after the file, environment and CLI layers are merged
    pub fn verbosity(config: &Config) -> VerbosityLevel {
        if config.output.quiet {
            VerbosityLevel::Quiet
        } else if config.output.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    pub fn http_client_config(config: &Config) -> HttpClientConfig {
        HttpClientConfig {
            timeout_seconds: config.network.timeout_seconds,
            retry_attempts: config.network.retry_attempts,
            retry_delay_ms: config.network.retry_delay_ms,
            ..HttpClientConfig::default()
        }
    }

    pub fn validation_config(config: &Config) -> ValidationConfig {
        ValidationConfig {
            strict: config.validation.strict,
            threads: Self::get_thread_count(config),
        }
    }

    /// Conversion options seeded from the `[conversion]` section
    pub fn conversion_options(config: &Config) -> ConversionOptions {
        ConversionOptions {
            pretty: config.conversion.pretty,
            indent: config.conversion.indent,
            include_attributes: config.conversion.include_attributes,
            ..ConversionOptions::default()
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Environment(format!("Invalid {} value: {}", key, value)))
}
