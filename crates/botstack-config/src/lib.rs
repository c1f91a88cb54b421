// botstack-config - Stack configuration for the bot backend
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from BOTSTACK_CONFIG env var
// 3. Config file contents from BOTSTACK_CONFIG_CONTENT env var
// 4. Default config file locations (./botstack.toml, ./.botstack.toml)
// 5. Built-in defaults (lowest priority)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, ENV_PREFIX};
pub use validation::{parse_s3_uri, VALID_RETENTION_DAYS};

/// Function timeout. Not configurable.
pub const FUNCTION_TIMEOUT_SECS: u32 = 180;

/// Function memory size in MB. Not configurable.
pub const FUNCTION_MEMORY_MB: u32 = 256;

/// Two years, the CloudWatch retention step closest to 730 days.
pub const DEFAULT_RETENTION_DAYS: u32 = 731;

/// Every model invoke action must start with this (e.g. `bedrock:InvokeModel`).
pub const MODEL_INVOKE_ACTION_PREFIX: &str = "bedrock:Invoke";

/// Environment key the handler reads the secret address from.
pub const SECRET_ENV_KEY: &str = "token";

/// Main stack configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackConfig {
    #[serde(default)]
    pub stack: StackSettings,

    #[serde(default)]
    pub secret: SecretConfig,

    #[serde(default)]
    pub function: FunctionConfig,

    #[serde(default)]
    pub layer: LayerConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub cli: CliConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StackSettings {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl Default for StackSettings {
    fn default() -> Self {
        Self {
            name: "slack-bot".to_string(),
            description: "Slack bot backed by a generative model".to_string(),
            region: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretConfig {
    pub name: String,
    /// Reference an existing secret by ARN instead of creating one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_arn: Option<String>,
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            name: "SlackBotToken".to_string(),
            existing_arn: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionConfig {
    pub name: String,
    pub handler: String,
    /// S3 URI of the handler artifact (s3://bucket/key.zip)
    pub code: String,
    pub runtime: Runtime,
    pub architecture: Architecture,
}

impl Default for FunctionConfig {
    fn default() -> Self {
        Self {
            name: "slack-bot-handler".to_string(),
            handler: "SlackBot.handler".to_string(),
            code: String::new(),
            runtime: Runtime::Python312,
            architecture: Architecture::X86_64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    pub name: String,
    pub description: String,
    /// S3 URI of the layer bundle (s3://bucket/key.zip)
    pub code: String,
    pub compatible_runtimes: Vec<Runtime>,
    pub compatible_architectures: Vec<Architecture>,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            name: "slack-bot-deps".to_string(),
            description: "Shared libraries for the bot handler".to_string(),
            code: String::new(),
            compatible_runtimes: vec![Runtime::Python312],
            compatible_architectures: vec![Architecture::X86_64, Architecture::Arm64],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub invoke_actions: Vec<String>,
    /// Resource scope of the invoke grant. `*` unless narrowed on purpose.
    pub resource_scope: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            invoke_actions: vec!["bedrock:InvokeModel".to_string()],
            resource_scope: "*".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub retention_days: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub name: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: "slack-bot-api".to_string(),
        }
    }
}

/// CLI logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Error returned when a runtime or architecture name is not recognized
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unsupported runtime: {0}. Supported: {supported}", supported = Runtime::SUPPORTED)]
    Runtime(String),

    #[error("Unsupported architecture: {0}. Supported: {supported}", supported = Architecture::SUPPORTED)]
    Architecture(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Runtime {
    #[serde(rename = "python3.11")]
    Python311,
    #[serde(rename = "python3.12")]
    Python312,
    #[serde(rename = "python3.13")]
    Python313,
    #[serde(rename = "nodejs20.x")]
    Nodejs20,
    #[serde(rename = "provided.al2023")]
    ProvidedAl2023,
}

impl Runtime {
    pub const SUPPORTED: &'static str =
        "python3.11, python3.12, python3.13, nodejs20.x, provided.al2023";

    pub fn as_str(&self) -> &'static str {
        match self {
            Runtime::Python311 => "python3.11",
            Runtime::Python312 => "python3.12",
            Runtime::Python313 => "python3.13",
            Runtime::Nodejs20 => "nodejs20.x",
            Runtime::ProvidedAl2023 => "provided.al2023",
        }
    }
}

impl std::fmt::Display for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Runtime {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "python3.11" => Ok(Runtime::Python311),
            "python3.12" | "python" => Ok(Runtime::Python312),
            "python3.13" => Ok(Runtime::Python313),
            "nodejs20.x" | "node" => Ok(Runtime::Nodejs20),
            "provided.al2023" | "provided" => Ok(Runtime::ProvidedAl2023),
            _ => Err(ParseError::Runtime(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    #[serde(rename = "x86_64")]
    X86_64,
    Arm64,
}

impl Architecture {
    pub const SUPPORTED: &'static str = "x86_64, arm64";

    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::X86_64 => "x86_64",
            Architecture::Arm64 => "arm64",
        }
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Architecture {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "x86_64" | "amd64" => Ok(Architecture::X86_64),
            "arm64" | "aarch64" => Ok(Architecture::Arm64),
            _ => Err(ParseError::Architecture(s.to_string())),
        }
    }
}

impl StackConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration from a specific file path (for CLI usage).
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Merge another config into this one (used for TOML layering).
    pub fn merge(&mut self, other: StackConfig) {
        self.stack = other.stack;
        self.secret = other.secret;
        self.function = other.function;
        self.layer = other.layer;
        self.model = other.model;
        self.logging = other.logging;
        self.gateway = other.gateway;
        self.cli = other.cli;
    }

    /// Apply environment overrides from a custom source.
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Build a configuration from inline TOML plus overrides supplied by an
    /// `EnvSource`. Does not touch the host environment or filesystem.
    pub fn load_with_env<E: EnvSource>(inline_config: Option<&str>, env: &E) -> Result<Self> {
        let mut config = StackConfig::default();

        if let Some(inline) = inline_config {
            let file_config: StackConfig =
                toml::from_str(inline).context("Failed to parse inline config content")?;
            config.merge(file_config);
        }

        config.apply_env_overrides_from(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML (used by the `create` wizard).
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize stack config")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_from_str() {
        assert_eq!("python3.12".parse::<Runtime>().unwrap(), Runtime::Python312);
        assert_eq!("python".parse::<Runtime>().unwrap(), Runtime::Python312);
        assert_eq!("nodejs20.x".parse::<Runtime>().unwrap(), Runtime::Nodejs20);
        assert_eq!(
            "ruby3.2".parse::<Runtime>().unwrap_err(),
            ParseError::Runtime("ruby3.2".to_string())
        );
    }

    #[test]
    fn test_architecture_from_str() {
        assert_eq!(
            "aarch64".parse::<Architecture>().unwrap(),
            Architecture::Arm64
        );
        assert_eq!(
            "X86_64".parse::<Architecture>().unwrap(),
            Architecture::X86_64
        );
        assert!("mips".parse::<Architecture>().is_err());
    }

    #[test]
    fn test_default_configs() {
        let config = StackConfig::default();
        assert_eq!(config.secret.name, "SlackBotToken");
        assert_eq!(config.logging.retention_days, 731);
        assert_eq!(config.model.resource_scope, "*");
        assert_eq!(config.cli.log_format, LogFormat::Text);
        assert!(config
            .layer
            .compatible_runtimes
            .contains(&config.function.runtime));
    }

    #[test]
    fn test_partial_toml_keeps_section_defaults() {
        let parsed: StackConfig = toml::from_str(
            r#"
            [function]
            code = "s3://artifacts/bot.zip"
            architecture = "arm64"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.function.code, "s3://artifacts/bot.zip");
        assert_eq!(parsed.function.architecture, Architecture::Arm64);
        assert_eq!(parsed.function.handler, "SlackBot.handler");
        assert_eq!(parsed.logging.retention_days, DEFAULT_RETENTION_DAYS);
    }

    #[test]
    fn test_toml_roundtrip_preserves_runtime_names() {
        let config = StackConfig::default();
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("runtime = \"python3.12\""));
        assert!(rendered.contains("\"x86_64\""));
    }
}
