// Configuration validation
//
// Validates that required fields are present and values are sensible

use super::*;
use anyhow::{bail, Result};

/// Retention periods CloudWatch Logs accepts, in days.
pub const VALID_RETENTION_DAYS: &[u32] = &[
    1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557, 2922,
    3288, 3653,
];

pub fn validate_config(config: &StackConfig) -> Result<()> {
    validate_stack_settings(&config.stack)?;
    validate_secret_config(&config.secret)?;
    validate_function_config(&config.function)?;
    validate_layer_config(&config.layer)?;
    validate_model_config(&config.model)?;
    validate_logging_config(&config.logging)?;

    if config.gateway.name.is_empty() {
        bail!("gateway.name must not be empty");
    }

    Ok(())
}

fn validate_stack_settings(config: &StackSettings) -> Result<()> {
    if config.name.is_empty() {
        bail!(
            "Stack name is required\n\n\
            How to fix:\n\
              • Environment: export {}STACK_NAME=slack-bot\n\
              • TOML: [stack]\n              name = \"slack-bot\"\n",
            ENV_PREFIX
        );
    }

    // CloudFormation stack names: letters, digits and hyphens, leading letter
    let valid_chars = config
        .name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-');
    let leading_letter = config
        .name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic());
    if !valid_chars || !leading_letter || config.name.len() > 128 {
        bail!(
            "Invalid stack name '{}': must start with a letter and contain only letters, digits and hyphens (max 128)",
            config.name
        );
    }

    Ok(())
}

fn validate_secret_config(config: &SecretConfig) -> Result<()> {
    if config.name.is_empty() {
        bail!("secret.name must not be empty");
    }

    if let Some(arn) = &config.existing_arn {
        if !arn.starts_with("arn:") || !arn.contains(":secretsmanager:") {
            bail!(
                "secret.existing_arn must be a Secrets Manager ARN, got '{}'\n\n\
                How to fix:\n\
                  • Environment: export {}SECRET_ARN=arn:aws:secretsmanager:<region>:<account>:secret:<name>\n\
                  • Or remove existing_arn to let the stack create the secret\n",
                arn,
                ENV_PREFIX
            );
        }
    }

    Ok(())
}

fn validate_function_config(config: &FunctionConfig) -> Result<()> {
    if config.name.is_empty() {
        bail!("function.name must not be empty");
    }

    if config.handler.is_empty() {
        bail!("function.handler must not be empty");
    }

    if config.code.is_empty() {
        bail!(
            "Function code location is required\n\n\
            How to fix:\n\
              • Environment: export {}FUNCTION_CODE=s3://my-artifacts/slackbot.zip\n\
              • TOML: [function]\n              code = \"s3://my-artifacts/slackbot.zip\"\n",
            ENV_PREFIX
        );
    }

    validate_s3_uri(&config.code).map_err(|e| anyhow::anyhow!("function.code: {}", e))?;

    Ok(())
}

fn validate_layer_config(config: &LayerConfig) -> Result<()> {
    if config.name.is_empty() {
        bail!("layer.name must not be empty");
    }

    if config.code.is_empty() {
        bail!(
            "Layer bundle location is required\n\n\
            How to fix:\n\
              • Environment: export {}LAYER_CODE=s3://my-artifacts/layer.zip\n\
              • TOML: [layer]\n              code = \"s3://my-artifacts/layer.zip\"\n",
            ENV_PREFIX
        );
    }

    validate_s3_uri(&config.code).map_err(|e| anyhow::anyhow!("layer.code: {}", e))?;

    if config.compatible_runtimes.is_empty() {
        bail!("layer.compatible_runtimes must list at least one runtime");
    }

    if config.compatible_architectures.is_empty() {
        bail!("layer.compatible_architectures must list at least one architecture");
    }

    Ok(())
}

fn validate_model_config(config: &ModelConfig) -> Result<()> {
    if config.invoke_actions.is_empty() {
        bail!("model.invoke_actions must list at least one action");
    }

    if let Some(action) = config
        .invoke_actions
        .iter()
        .find(|a| !a.starts_with(MODEL_INVOKE_ACTION_PREFIX))
    {
        bail!(
            "model.invoke_actions contains '{}', which is not a model invoke action\n\n\
            How to fix:\n\
              • TOML: [model]\n              invoke_actions = [\"bedrock:InvokeModel\"]\n\
              • Streaming handlers may add \"bedrock:InvokeModelWithResponseStream\"\n",
            action
        );
    }

    if config.resource_scope.is_empty() {
        bail!("model.resource_scope must not be empty (use \"*\" for all models)");
    }

    Ok(())
}

fn validate_logging_config(config: &LoggingConfig) -> Result<()> {
    if !VALID_RETENTION_DAYS.contains(&config.retention_days) {
        bail!(
            "logging.retention_days = {} is not a CloudWatch retention period\n\n\
            Accepted values: {:?}\n\n\
            How to fix:\n\
              • Environment: export {}LOG_RETENTION_DAYS=731\n",
            config.retention_days,
            VALID_RETENTION_DAYS,
            ENV_PREFIX
        );
    }

    Ok(())
}

/// Check that a string looks like `s3://bucket/key`.
pub(crate) fn validate_s3_uri(input: &str) -> std::result::Result<(), String> {
    let Some(path) = input.strip_prefix("s3://") else {
        return Err(format!("S3 URI must start with 's3://', got '{}'", input));
    };
    match path.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok(()),
        _ => Err(
            "S3 URI must include both bucket and key (e.g., s3://bucket/key.zip)".to_string(),
        ),
    }
}

/// Split `s3://bucket/key` into its bucket and key.
pub fn parse_s3_uri(uri: &str) -> Result<(&str, &str)> {
    validate_s3_uri(uri).map_err(|e| anyhow::anyhow!(e))?;
    let path = uri.strip_prefix("s3://").unwrap_or(uri);
    path.split_once('/')
        .ok_or_else(|| anyhow::anyhow!("Invalid S3 URI format: {}", uri))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> StackConfig {
        let mut config = StackConfig::default();
        config.function.code = "s3://artifacts/slackbot.zip".to_string();
        config.layer.code = "s3://artifacts/layer.zip".to_string();
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_function_code() {
        let mut config = valid_config();
        config.function.code.clear();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("BOTSTACK_FUNCTION_CODE"));
    }

    #[test]
    fn test_s3_uri_validation() {
        assert!(validate_s3_uri("s3://bucket/key.zip").is_ok());
        assert!(validate_s3_uri("s3://bucket").is_err());
        assert!(validate_s3_uri("s3://bucket/").is_err());
        assert!(validate_s3_uri("https://bucket/key.zip").is_err());
    }

    #[test]
    fn test_parse_s3_uri() {
        let (bucket, key) = parse_s3_uri("s3://artifacts/lambda/bot.zip").unwrap();
        assert_eq!(bucket, "artifacts");
        assert_eq!(key, "lambda/bot.zip");
    }

    #[test]
    fn test_retention_must_be_cloudwatch_value() {
        let mut config = valid_config();
        config.logging.retention_days = 730;
        assert!(validate_config(&config).is_err());

        config.logging.retention_days = 14;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_stack_name_rules() {
        let mut config = valid_config();
        config.stack.name = "1-bot".to_string();
        assert!(validate_config(&config).is_err());

        config.stack.name = "bot_stack".to_string();
        assert!(validate_config(&config).is_err());

        config.stack.name = "bot-stack-2".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_existing_secret_arn_shape() {
        let mut config = valid_config();
        config.secret.existing_arn = Some("SlackBotToken".to_string());
        assert!(validate_config(&config).is_err());

        config.secret.existing_arn = Some(
            "arn:aws:secretsmanager:us-east-1:123456789012:secret:SlackBotToken-AbCdEf"
                .to_string(),
        );
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_model_actions() {
        let mut config = valid_config();
        config.model.invoke_actions.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_model_actions_must_invoke_models() {
        let mut config = valid_config();
        config.model.invoke_actions = vec!["s3:GetObject".to_string()];
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("'s3:GetObject'"));

        config.model.invoke_actions = vec![
            "bedrock:InvokeModel".to_string(),
            "bedrock:InvokeModelWithResponseStream".to_string(),
        ];
        assert!(validate_config(&config).is_ok());
    }
}
