//! CloudFormation template synthesis
//!
//! A stack is rendered only after it validates and lints clean. Resources
//! are emitted in materialization order with explicit `DependsOn`.
//! Imported resources are not emitted, and edges to them are dropped.

use serde_json::{json, Map, Value as Json};
use tracing::{debug, info};

use crate::builder::ROTATE_MARKER_TAG;
use crate::error::Result;
use crate::graph::Node;
use crate::leak::LeakScanner;
use crate::lint::{LintReport, Linter};
use crate::model::{LogicalId, Resource, SecretOrigin, Value};
use crate::stack::Stack;
use crate::validate::validate;

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";
/// Metadata key carrying a resource's suppression records
pub const SUPPRESSIONS_METADATA_KEY: &str = "botstack_lint";
const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Default)]
pub struct SynthOptions {
    /// Values that must never appear in the template (e.g. a real token)
    pub known_sensitive_values: Vec<String>,
}

/// A rendered template with the lint report it passed
#[derive(Debug, Clone)]
pub struct Synthesized {
    pub template: Json,
    pub report: LintReport,
    pub order: Vec<LogicalId>,
}

impl Synthesized {
    pub fn to_pretty_json(&self) -> String {
        // Json -> String cannot fail
        serde_json::to_string_pretty(&self.template).unwrap_or_default()
    }
}

pub fn synthesize(stack: &Stack, options: &SynthOptions) -> Result<Synthesized> {
    synthesize_with(stack, &Linter::with_default_rules(), options)
}

pub fn synthesize_with(
    stack: &Stack,
    linter: &Linter,
    options: &SynthOptions,
) -> Result<Synthesized> {
    validate(stack)?;

    let report = linter.lint(stack)?;
    report.ensure_clean()?;

    let order = stack.graph.materialization_order()?;
    let mut resources = Map::new();
    for node in &order {
        if node.resource.is_external() {
            debug!(resource = %node.id, "Skipping imported resource");
            continue;
        }
        resources.insert(node.id.to_string(), render_node(stack, node));
    }

    let mut outputs = Map::new();
    for output in &stack.outputs {
        outputs.insert(
            output.key.clone(),
            json!({
                "Description": output.description,
                "Value": output.value.to_json(),
            }),
        );
    }

    let template = json!({
        "AWSTemplateFormatVersion": TEMPLATE_FORMAT_VERSION,
        "Description": stack.description,
        "Resources": resources,
        "Outputs": outputs,
    });

    let scanner = options
        .known_sensitive_values
        .iter()
        .fold(LeakScanner::new(), |scanner, value| scanner.with_known_value(value.clone()));
    scanner.scan(&template)?;

    info!(
        stack = %stack.name,
        resources = resources_len(&template),
        suppressed = report.suppressed.len(),
        "Synthesized template"
    );

    Ok(Synthesized {
        template,
        report,
        order: order.into_iter().map(|n| n.id.clone()).collect(),
    })
}

fn resources_len(template: &Json) -> usize {
    template["Resources"].as_object().map_or(0, |r| r.len())
}

fn render_node(stack: &Stack, node: &Node) -> Json {
    let mut entry = Map::new();
    entry.insert("Type".into(), json!(node.resource.type_name()));

    let depends_on: Vec<&str> = node
        .depends_on
        .iter()
        .filter(|dep| stack.node(dep).is_some_and(|d| !d.resource.is_external()))
        .map(|dep| dep.as_str())
        .collect();
    if !depends_on.is_empty() {
        entry.insert("DependsOn".into(), json!(depends_on));
    }

    entry.insert("DeletionPolicy".into(), json!(node.deletion_policy.as_str()));
    entry.insert(
        "UpdateReplacePolicy".into(),
        json!(node.deletion_policy.as_str()),
    );

    if !node.suppressions.is_empty() {
        let mut metadata = Map::new();
        metadata.insert(
            SUPPRESSIONS_METADATA_KEY.to_string(),
            json!({ "suppressions": node.suppressions }),
        );
        entry.insert("Metadata".into(), Json::Object(metadata));
    }

    entry.insert("Properties".into(), properties(node));
    Json::Object(entry)
}

fn properties(node: &Node) -> Json {
    match &node.resource {
        Resource::Secret(secret) => {
            let mut props = json!({
                "Name": secret.name,
                "Description": secret.description,
            });
            if let SecretOrigin::PendingRotation { key } = &secret.origin {
                props["GenerateSecretString"] = json!({
                    "SecretStringTemplate": "{}",
                    "GenerateStringKey": key,
                    "PasswordLength": 32,
                    "ExcludePunctuation": true,
                });
                props["Tags"] = json!([{ "Key": ROTATE_MARKER_TAG, "Value": "true" }]);
            }
            props
        }
        Resource::Role(role) => json!({
            "AssumeRolePolicyDocument": {
                "Version": POLICY_VERSION,
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": { "Service": role.service_principal },
                    "Action": "sts:AssumeRole",
                }],
            },
            "ManagedPolicyArns": role.managed_policies().map(Value::to_json).collect::<Vec<_>>(),
            "Policies": [{
                "PolicyName": format!("{}Grants", node.id),
                "PolicyDocument": {
                    "Version": POLICY_VERSION,
                    "Statement": role.statements().map(|s| s.to_json()).collect::<Vec<_>>(),
                },
            }],
        }),
        Resource::Layer(layer) => json!({
            "LayerName": layer.name,
            "Description": layer.description,
            "Content": layer.code.to_json(),
            "CompatibleRuntimes": layer
                .compatible_runtimes
                .iter()
                .map(|r| r.as_str())
                .collect::<Vec<_>>(),
            "CompatibleArchitectures": layer
                .compatible_architectures
                .iter()
                .map(|a| a.as_str())
                .collect::<Vec<_>>(),
        }),
        Resource::Function(function) => {
            let variables: Map<String, Json> = function
                .environment
                .iter()
                .map(|(key, value)| (key.clone(), value.to_value().to_json()))
                .collect();
            json!({
                "FunctionName": function.name,
                "Handler": function.handler,
                "Runtime": function.runtime.as_str(),
                "Architectures": [function.architecture.as_str()],
                "Code": function.code.to_json(),
                "Timeout": function.timeout_secs,
                "MemorySize": function.memory_mb,
                "Role": Value::get_att(&function.role, "Arn").to_json(),
                "Layers": function
                    .layers
                    .iter()
                    .map(|l| Value::Ref(l.clone()).to_json())
                    .collect::<Vec<_>>(),
                "Environment": { "Variables": variables },
                "TracingConfig": { "Mode": function.tracing.as_str() },
                "LoggingConfig": { "LogGroup": Value::Ref(function.log_group.clone()).to_json() },
            })
        }
        Resource::LogGroup(group) => json!({
            "LogGroupName": group.name,
            "RetentionInDays": group.retention_days,
        }),
        Resource::HttpApi(api) => json!({
            "Name": api.name,
            "Description": api.description,
            "ProtocolType": "HTTP",
        }),
        Resource::Integration(integration) => json!({
            "ApiId": Value::Ref(integration.api.clone()).to_json(),
            "IntegrationType": "AWS_PROXY",
            "IntegrationUri": Value::get_att(&integration.function, "Arn").to_json(),
            "PayloadFormatVersion": integration.payload_format_version,
        }),
        Resource::Route(route) => json!({
            "ApiId": Value::Ref(route.api.clone()).to_json(),
            "RouteKey": route.key.to_string(),
            "Target": Value::Sub(format!("integrations/${{{}}}", route.integration)).to_json(),
        }),
        Resource::Stage(stage) => {
            let mut props = json!({
                "ApiId": Value::Ref(stage.api.clone()).to_json(),
                "StageName": stage.name,
                "AutoDeploy": stage.auto_deploy,
            });
            if let Some(settings) = &stage.access_log {
                props["AccessLogSettings"] = json!({
                    "DestinationArn": Value::get_att(&settings.destination, "Arn").to_json(),
                    "Format": settings.format,
                });
            }
            props
        }
        Resource::Permission(permission) => json!({
            "Action": "lambda:InvokeFunction",
            "FunctionName": Value::Ref(permission.function.clone()).to_json(),
            "Principal": "apigateway.amazonaws.com",
            "SourceArn": Value::Sub(format!(
                "arn:${{AWS::Partition}}:execute-api:${{AWS::Region}}:${{AWS::AccountId}}:${{{}}}/*/*",
                permission.api
            )).to_json(),
        }),
    }
}
