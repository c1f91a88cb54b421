//! Assembles the canonical bot stack from configuration

use std::collections::BTreeMap;

use botstack_config::{
    parse_s3_uri, StackConfig, FUNCTION_MEMORY_MB, FUNCTION_TIMEOUT_SECS, SECRET_ENV_KEY,
};
use tracing::{debug, info, warn};

use crate::access_log::access_log_format;
use crate::error::{Result, StackError};
use crate::graph::DeletionPolicy;
use crate::lint::{ScopeSelector, Suppression};
use crate::model::{
    AccessLogSettings, EnvValue, Function, Grant, HttpApi, Integration, InvokePermission,
    LayerVersion, LogGroup, LogicalId, Resource, Role, Route, RouteKey, S3Location, Secret,
    SecretOrigin, Stage, TracingMode, Value, TRACE_WRITE_ACTIONS,
};
use crate::stack::Stack;

/// Logical ids of the canonical stack
pub mod ids {
    pub const SECRET: &str = "BotTokenSecret";
    pub const ROLE: &str = "BotFunctionRole";
    pub const LAYER: &str = "BotDependencyLayer";
    pub const FUNCTION_LOGS: &str = "BotFunctionLogGroup";
    pub const FUNCTION: &str = "BotFunction";
    pub const API: &str = "BotHttpApi";
    pub const INTEGRATION: &str = "BotApiIntegration";
    pub const ROUTE: &str = "BotCatchAllRoute";
    pub const ACCESS_LOGS: &str = "BotApiAccessLogs";
    pub const STAGE: &str = "BotApiStage";
    pub const PERMISSION: &str = "BotApiInvokePermission";
}

pub const LAMBDA_PRINCIPAL: &str = "lambda.amazonaws.com";
pub const PAYLOAD_FORMAT_VERSION: &str = "2.0";
pub const DEFAULT_STAGE: &str = "$default";
/// Tag marking a secret whose generated value must be replaced before use
pub const ROTATE_MARKER_TAG: &str = "botstack:rotate-before-use";

pub struct StackBuilder<'a> {
    config: &'a StackConfig,
}

impl<'a> StackBuilder<'a> {
    pub fn from_config(config: &'a StackConfig) -> Self {
        Self { config }
    }

    pub fn build(self) -> Result<Stack> {
        let config = self.config;
        let mut stack = Stack::new(&config.stack.name, &config.stack.description);

        let secret_id = LogicalId::new(ids::SECRET);
        let role_id = LogicalId::new(ids::ROLE);
        let layer_id = LogicalId::new(ids::LAYER);
        let function_logs_id = LogicalId::new(ids::FUNCTION_LOGS);
        let function_id = LogicalId::new(ids::FUNCTION);
        let api_id = LogicalId::new(ids::API);
        let integration_id = LogicalId::new(ids::INTEGRATION);
        let route_id = LogicalId::new(ids::ROUTE);
        let access_logs_id = LogicalId::new(ids::ACCESS_LOGS);
        let stage_id = LogicalId::new(ids::STAGE);

        // Secret
        let secret = Secret {
            name: config.secret.name.clone(),
            description: format!("Bot token for {}", config.stack.name),
            origin: match &config.secret.existing_arn {
                Some(arn) => SecretOrigin::Imported { arn: arn.clone() },
                None => SecretOrigin::PendingRotation {
                    key: SECRET_ENV_KEY.to_string(),
                },
            },
        };
        let address = secret.address(&secret_id);
        let imported = secret.is_imported();
        let secret_node = stack.graph.add(secret_id.clone(), Resource::Secret(secret))?;
        if !imported {
            secret_node.suppress(Suppression::new(
                "SMG4",
                ScopeSelector::All,
                "Token is issued by Slack and rotated outside this stack",
            ));
        }
        debug!(secret = %address, imported, "Declared secret");

        // Execution identity
        let role = Role {
            service_principal: LAMBDA_PRINCIPAL.to_string(),
            grants: vec![
                Grant::basic_execution(),
                Grant::secret_read(&address),
                Grant::model_invoke(&config.model.invoke_actions, &config.model.resource_scope),
            ],
        };
        let role_node = stack.graph.add(role_id.clone(), Resource::Role(role))?;
        role_node
            .depends_on(&secret_id)
            .suppress(Suppression::new(
                "IAM4",
                ScopeSelector::Policy("AWSLambdaBasicExecutionRole".to_string()),
                "Basic execution policy only allows writes to the function's own log streams",
            ))
            .suppress(Suppression::new(
                "IAM5",
                ScopeSelector::Action("xray:*".to_string()),
                format!(
                    "{} do not support resource-level permissions",
                    TRACE_WRITE_ACTIONS.join(" and ")
                ),
            ));
        if config.model.resource_scope == "*" {
            warn!(
                actions = ?config.model.invoke_actions,
                "model invoke grant is scoped to all resources"
            );
            for action in &config.model.invoke_actions {
                role_node.suppress(Suppression::new(
                    "IAM5",
                    ScopeSelector::Action(action.clone()),
                    "Model is chosen by the handler at runtime; narrow with model.resource_scope",
                ));
            }
        }

        // Dependency layer
        stack
            .graph
            .add(
                layer_id.clone(),
                Resource::Layer(LayerVersion {
                    name: config.layer.name.clone(),
                    description: config.layer.description.clone(),
                    code: s3_location("layer.code", &config.layer.code)?,
                    compatible_runtimes: config.layer.compatible_runtimes.clone(),
                    compatible_architectures: config.layer.compatible_architectures.clone(),
                }),
            )?
            .deletion_policy(DeletionPolicy::Delete);

        // Function and its log sink
        stack
            .graph
            .add(
                function_logs_id.clone(),
                Resource::LogGroup(LogGroup {
                    name: format!("/aws/lambda/{}", config.function.name),
                    retention_days: config.logging.retention_days,
                    writer: function_id.clone(),
                }),
            )?
            .deletion_policy(DeletionPolicy::Delete);

        let mut environment = BTreeMap::new();
        environment.insert(
            SECRET_ENV_KEY.to_string(),
            EnvValue::SecretAddress(address.clone()),
        );
        stack
            .graph
            .add(
                function_id.clone(),
                Resource::Function(Function {
                    name: config.function.name.clone(),
                    handler: config.function.handler.clone(),
                    code: s3_location("function.code", &config.function.code)?,
                    runtime: config.function.runtime,
                    architecture: config.function.architecture,
                    timeout_secs: FUNCTION_TIMEOUT_SECS,
                    memory_mb: FUNCTION_MEMORY_MB,
                    role: role_id.clone(),
                    layers: vec![layer_id.clone()],
                    environment,
                    tracing: TracingMode::Active,
                    log_group: function_logs_id.clone(),
                }),
            )?
            .depends_on(&secret_id);

        // Gateway
        stack.graph.add(
            api_id.clone(),
            Resource::HttpApi(HttpApi {
                name: config.gateway.name.clone(),
                description: format!("Public endpoint for {}", config.function.name),
            }),
        )?;
        stack.graph.add(
            integration_id.clone(),
            Resource::Integration(Integration {
                api: api_id.clone(),
                function: function_id.clone(),
                payload_format_version: PAYLOAD_FORMAT_VERSION.to_string(),
            }),
        )?;
        stack.graph.add(
            route_id.clone(),
            Resource::Route(Route {
                api: api_id.clone(),
                key: RouteKey::catch_all(),
                integration: integration_id.clone(),
            }),
        )?;
        stack
            .graph
            .add(
                access_logs_id.clone(),
                Resource::LogGroup(LogGroup {
                    name: format!("/aws/apigateway/{}-access", config.gateway.name),
                    retention_days: config.logging.retention_days,
                    writer: stage_id.clone(),
                }),
            )?
            .deletion_policy(DeletionPolicy::Delete);
        stack
            .graph
            .add(
                stage_id.clone(),
                Resource::Stage(Stage {
                    api: api_id.clone(),
                    name: DEFAULT_STAGE.to_string(),
                    auto_deploy: true,
                    access_log: Some(AccessLogSettings {
                        destination: access_logs_id.clone(),
                        format: access_log_format(),
                    }),
                }),
            )?
            .depends_on(&route_id);
        stack.graph.add(
            ids::PERMISSION,
            Resource::Permission(InvokePermission {
                function: function_id.clone(),
                api: api_id.clone(),
            }),
        )?;

        stack
            .add_output(
                "SecretConsoleUrl",
                "Console page where the bot token is stored",
                secret_console_url(&config.secret.name, config.secret.existing_arn.as_deref()),
            )
            .add_output(
                "ApiUrl",
                "Public URL of the bot endpoint",
                Value::get_att(&api_id, "ApiEndpoint"),
            );

        info!(
            stack = %stack.name,
            resources = stack.graph.len(),
            imported_secret = imported,
            "Assembled stack"
        );
        Ok(stack)
    }
}

const CONSOLE_SECRET_PATH: &str = "console.aws.amazon.com/secretsmanager/home";

/// Console page of the token secret. An imported secret is addressed by the
/// region and name in its ARN, not by `secret.name`.
fn secret_console_url(name: &str, existing_arn: Option<&str>) -> Value {
    match existing_arn.and_then(split_secret_arn) {
        Some((region, imported_name)) => Value::literal(format!(
            "https://{}?region={}#!/secret?name={}",
            CONSOLE_SECRET_PATH, region, imported_name
        )),
        None => Value::Sub(format!(
            "https://{}?region=${{AWS::Region}}#!/secret?name={}",
            CONSOLE_SECRET_PATH, name
        )),
    }
}

/// Region and secret name of
/// `arn:<partition>:secretsmanager:<region>:<account>:secret:<name>-<suffix>`.
/// The six-character suffix Secrets Manager appends is dropped.
fn split_secret_arn(arn: &str) -> Option<(&str, &str)> {
    let mut parts = arn.splitn(7, ':');
    let region = parts.nth(3)?;
    let resource_type = parts.nth(1)?;
    let full_name = parts.next()?;
    if resource_type != "secret" || region.is_empty() || full_name.is_empty() {
        return None;
    }
    let name = match full_name.rsplit_once('-') {
        Some((name, suffix))
            if !name.is_empty()
                && suffix.len() == 6
                && suffix.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            name
        }
        _ => full_name,
    };
    Some((region, name))
}

fn s3_location(field: &str, uri: &str) -> Result<S3Location> {
    let (bucket, key) = parse_s3_uri(uri)
        .map_err(|e| StackError::invalid_config(format!("{}: {}", field, e)))?;
    Ok(S3Location {
        bucket: bucket.to_string(),
        key: key.to_string(),
    })
}
