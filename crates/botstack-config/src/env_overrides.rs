use super::{Architecture, LogFormat, Runtime, StackConfig};
use anyhow::{anyhow, Context, Result};

pub const ENV_PREFIX: &str = "BOTSTACK_";

/// Abstraction over environment-variable lookups so tests and embedders can
/// supply their own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the BOTSTACK_ prefix
    /// Used for AWS standard variables (AWS_REGION, etc.)
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the stack config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut StackConfig, env: &E) -> Result<()> {
    // Stack identity
    if let Some(name) = get_env_string(env, "STACK_NAME")? {
        config.stack.name = name;
    }
    if let Some(region) = get_env_string(env, "REGION")? {
        config.stack.region = Some(region);
    } else if config.stack.region.is_none() {
        // AWS standard region variables (without BOTSTACK_ prefix)
        config.stack.region = get_raw_env_string(env, "AWS_REGION")?
            .or(get_raw_env_string(env, "AWS_DEFAULT_REGION")?);
    }

    // Secret
    if let Some(name) = get_env_string(env, "SECRET_NAME")? {
        config.secret.name = name;
    }
    if let Some(arn) = get_env_string(env, "SECRET_ARN")? {
        config.secret.existing_arn = if arn.is_empty() { None } else { Some(arn) };
    }

    // Function and layer artifacts
    if let Some(code) = get_env_string(env, "FUNCTION_CODE")? {
        config.function.code = code;
    }
    if let Some(handler) = get_env_string(env, "FUNCTION_HANDLER")? {
        config.function.handler = handler;
    }
    if let Some(runtime) = get_env_string(env, "RUNTIME")? {
        config.function.runtime = runtime
            .parse::<Runtime>()
            .context("Invalid BOTSTACK_RUNTIME value")?;
    }
    if let Some(arch) = get_env_string(env, "ARCHITECTURE")? {
        config.function.architecture = arch
            .parse::<Architecture>()
            .context("Invalid BOTSTACK_ARCHITECTURE value")?;
    }
    if let Some(code) = get_env_string(env, "LAYER_CODE")? {
        config.layer.code = code;
    }

    // Model grant scope
    if let Some(scope) = get_env_string(env, "MODEL_RESOURCE")? {
        config.model.resource_scope = scope;
    }

    // Log retention
    if let Some(days) = get_env_u32(env, "LOG_RETENTION_DAYS")? {
        config.logging.retention_days = days;
    }

    // CLI logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL")? {
        config.cli.log_level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT")? {
        config.cli.log_format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    Ok(())
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get(key))
}

/// Get a raw environment variable without the BOTSTACK_ prefix
fn get_raw_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get_raw(key))
}

fn get_env_u32<E: EnvSource>(env: &E, key: &str) -> Result<Option<u32>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .parse::<u32>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapEnv(HashMap<String, String>);

    impl MapEnv {
        fn new(pairs: &[(&str, &str)]) -> Self {
            Self(
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            )
        }
    }

    impl EnvSource for MapEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(&format!("{}{}", ENV_PREFIX, key)).cloned()
        }

        fn get_raw(&self, key: &str) -> Option<String> {
            self.0.get(key).cloned()
        }
    }

    #[test]
    fn overrides_take_priority() {
        let env = MapEnv::new(&[
            ("BOTSTACK_STACK_NAME", "prod-bot"),
            ("BOTSTACK_SECRET_ARN", "arn:aws:secretsmanager:us-east-1:123456789012:secret:SlackBotToken"),
            ("BOTSTACK_ARCHITECTURE", "arm64"),
            ("BOTSTACK_LOG_RETENTION_DAYS", "30"),
            ("BOTSTACK_LOG_FORMAT", "JSON"),
        ]);
        let mut config = StackConfig::default();
        apply_env_overrides(&mut config, &env).unwrap();

        assert_eq!(config.stack.name, "prod-bot");
        assert!(config.secret.existing_arn.is_some());
        assert_eq!(config.function.architecture, Architecture::Arm64);
        assert_eq!(config.logging.retention_days, 30);
        assert_eq!(config.cli.log_format, LogFormat::Json);
    }

    #[test]
    fn region_falls_back_to_aws_variables() {
        let env = MapEnv::new(&[("AWS_DEFAULT_REGION", "eu-west-1")]);
        let mut config = StackConfig::default();
        apply_env_overrides(&mut config, &env).unwrap();
        assert_eq!(config.stack.region.as_deref(), Some("eu-west-1"));

        let env = MapEnv::new(&[
            ("AWS_REGION", "eu-west-1"),
            ("BOTSTACK_REGION", "us-west-2"),
        ]);
        let mut config = StackConfig::default();
        apply_env_overrides(&mut config, &env).unwrap();
        assert_eq!(config.stack.region.as_deref(), Some("us-west-2"));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let env = MapEnv::new(&[("BOTSTACK_LOG_RETENTION_DAYS", "two years")]);
        let mut config = StackConfig::default();
        let err = apply_env_overrides(&mut config, &env).unwrap_err();
        assert!(err.to_string().contains("BOTSTACK_LOG_RETENTION_DAYS"));
    }

    #[test]
    fn invalid_runtime_is_rejected() {
        let env = MapEnv::new(&[("BOTSTACK_RUNTIME", "cobol")]);
        let mut config = StackConfig::default();
        assert!(apply_env_overrides(&mut config, &env).is_err());
    }
}
