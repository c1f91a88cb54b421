//! Resource descriptors for the bot stack
//!
//! These are provisioning-time descriptions, not runtime objects. Each
//! descriptor knows which other resources it references so the graph can
//! derive materialization order without a framework in the loop.

use botstack_config::{Architecture, Runtime};
use serde_json::{json, Value as Json};
use std::collections::BTreeMap;
use std::fmt;

/// Logical id of a resource within the stack (CloudFormation logical id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalId(String);

impl LogicalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LogicalId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A property value: either a literal or an expression the provider resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Literal(String),
    /// Resource's primary identifier (ARN for secrets, name for functions, ...)
    Ref(LogicalId),
    GetAtt(LogicalId, String),
    /// String with `${...}` substitutions
    Sub(String),
}

impl Value {
    pub fn literal(value: impl Into<String>) -> Self {
        Value::Literal(value.into())
    }

    pub fn get_att(id: &LogicalId, attribute: &str) -> Self {
        Value::GetAtt(id.clone(), attribute.to_string())
    }

    pub fn to_json(&self) -> Json {
        match self {
            Value::Literal(s) => Json::String(s.clone()),
            Value::Ref(id) => json!({ "Ref": id.as_str() }),
            Value::GetAtt(id, attr) => json!({ "Fn::GetAtt": [id.as_str(), attr] }),
            Value::Sub(template) => json!({ "Fn::Sub": template }),
        }
    }

    /// Literal text, if this value is a plain literal
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Value::Literal(s) => Some(s),
            _ => None,
        }
    }

    /// Raw text of the value as it appears in the template
    pub fn text(&self) -> &str {
        match self {
            Value::Literal(s) | Value::Sub(s) => s,
            Value::Ref(id) | Value::GetAtt(id, _) => id.as_str(),
        }
    }

    /// Resources this value refers to. Pseudo parameters (`AWS::*`) are skipped.
    pub fn references(&self) -> Vec<LogicalId> {
        match self {
            Value::Literal(_) => Vec::new(),
            Value::Ref(id) | Value::GetAtt(id, _) => vec![id.clone()],
            Value::Sub(template) => sub_references(template),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Literal(s) => f.write_str(s),
            Value::Ref(id) => write!(f, "!Ref {}", id),
            Value::GetAtt(id, attr) => write!(f, "!GetAtt {}.{}", id, attr),
            Value::Sub(template) => write!(f, "!Sub '{}'", template),
        }
    }
}

fn sub_references(template: &str) -> Vec<LogicalId> {
    let mut refs = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        let name = &after[..end];
        // `${!Literal}` escapes, `${AWS::Region}` is a pseudo parameter
        if !name.starts_with('!') && !name.contains("::") {
            let resource = name.split('.').next().unwrap_or(name);
            let id = LogicalId::new(resource);
            if !refs.contains(&id) {
                refs.push(id);
            }
        }
        rest = &after[end + 1..];
    }
    refs
}

/// S3 location of a code bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    pub key: String,
}

impl S3Location {
    pub fn to_json(&self) -> Json {
        json!({ "S3Bucket": self.bucket, "S3Key": self.key })
    }
}

impl fmt::Display for S3Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Where the secret lives. Only this is ever handed to other resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretAddress {
    /// Secret created by this stack; resolves to its ARN at materialization
    Managed(LogicalId),
    /// Secret that already exists, by complete ARN
    Imported(String),
}

impl SecretAddress {
    pub fn to_value(&self) -> Value {
        match self {
            SecretAddress::Managed(id) => Value::Ref(id.clone()),
            SecretAddress::Imported(arn) => Value::Literal(arn.clone()),
        }
    }
}

impl fmt::Display for SecretAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretAddress::Managed(id) => write!(f, "arn of {}", id),
            SecretAddress::Imported(arn) => f.write_str(arn),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretOrigin {
    /// Created with a generated filler under `key`. Must be rotated before use.
    PendingRotation { key: String },
    /// Existing secret; this stack only references it
    Imported { arn: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret {
    pub name: String,
    pub description: String,
    pub origin: SecretOrigin,
}

impl Secret {
    pub fn address(&self, id: &LogicalId) -> SecretAddress {
        match &self.origin {
            SecretOrigin::PendingRotation { .. } => SecretAddress::Managed(id.clone()),
            SecretOrigin::Imported { arn } => SecretAddress::Imported(arn.clone()),
        }
    }

    pub fn is_imported(&self) -> bool {
        matches!(self.origin, SecretOrigin::Imported { .. })
    }
}

/// The three grants an execution identity must hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GrantKind {
    BasicExecution,
    SecretRead,
    ModelInvoke,
}

impl GrantKind {
    pub const REQUIRED: [GrantKind; 3] = [
        GrantKind::BasicExecution,
        GrantKind::SecretRead,
        GrantKind::ModelInvoke,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GrantKind::BasicExecution => "basic-execution",
            GrantKind::SecretRead => "secret-read",
            GrantKind::ModelInvoke => "model-invoke",
        }
    }
}

impl fmt::Display for GrantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyStatement {
    pub sid: String,
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
}

impl PolicyStatement {
    pub fn to_json(&self) -> Json {
        json!({
            "Sid": self.sid,
            "Effect": "Allow",
            "Action": self.actions,
            "Resource": self.resources.iter().map(Value::to_json).collect::<Vec<_>>(),
        })
    }

    pub fn has_wildcard_resource(&self) -> bool {
        self.resources
            .iter()
            .any(|r| r.as_literal().is_some_and(|s| s.contains('*')))
    }
}

pub const BASIC_EXECUTION_POLICY: &str =
    "arn:${AWS::Partition}:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

/// Read access to the token secret.
///
/// Decryption is covered only for secrets encrypted with the AWS managed key
/// (`aws/secretsmanager`). A secret under a customer managed KMS key also
/// needs `kms:Decrypt` on that key, which this grant does not carry.
pub const SECRET_READ_ACTIONS: [&str; 2] = [
    "secretsmanager:GetSecretValue",
    "secretsmanager:DescribeSecret",
];

pub const TRACE_WRITE_ACTIONS: [&str; 2] = ["xray:PutTraceSegments", "xray:PutTelemetryRecords"];

/// A permission grant: a managed policy, an inline statement, or both
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub kind: GrantKind,
    pub managed_policy: Option<Value>,
    pub statement: Option<PolicyStatement>,
}

impl Grant {
    /// Log writes through the AWS managed policy, trace writes inline.
    pub fn basic_execution() -> Self {
        Self {
            kind: GrantKind::BasicExecution,
            managed_policy: Some(Value::Sub(BASIC_EXECUTION_POLICY.to_string())),
            statement: Some(PolicyStatement {
                sid: "TraceWrite".to_string(),
                actions: TRACE_WRITE_ACTIONS.iter().map(|a| a.to_string()).collect(),
                resources: vec![Value::literal("*")],
            }),
        }
    }

    /// Read the secret at `address`. See [`SECRET_READ_ACTIONS`] for the
    /// decryption limit.
    pub fn secret_read(address: &SecretAddress) -> Self {
        Self {
            kind: GrantKind::SecretRead,
            managed_policy: None,
            statement: Some(PolicyStatement {
                sid: "SecretRead".to_string(),
                actions: SECRET_READ_ACTIONS.iter().map(|a| a.to_string()).collect(),
                resources: vec![address.to_value()],
            }),
        }
    }

    pub fn model_invoke(actions: &[String], resource_scope: &str) -> Self {
        Self {
            kind: GrantKind::ModelInvoke,
            managed_policy: None,
            statement: Some(PolicyStatement {
                sid: "ModelInvoke".to_string(),
                actions: actions.to_vec(),
                resources: vec![Value::literal(resource_scope)],
            }),
        }
    }
}

/// Execution identity assumed by the function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub service_principal: String,
    pub grants: Vec<Grant>,
}

impl Role {
    pub fn grant(&self, kind: GrantKind) -> Option<&Grant> {
        self.grants.iter().find(|g| g.kind == kind)
    }

    pub fn statements(&self) -> impl Iterator<Item = &PolicyStatement> {
        self.grants.iter().filter_map(|g| g.statement.as_ref())
    }

    pub fn managed_policies(&self) -> impl Iterator<Item = &Value> {
        self.grants.iter().filter_map(|g| g.managed_policy.as_ref())
    }
}

/// Versioned bundle of shared libraries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerVersion {
    pub name: String,
    pub description: String,
    pub code: S3Location,
    pub compatible_runtimes: Vec<Runtime>,
    pub compatible_architectures: Vec<Architecture>,
}

impl LayerVersion {
    pub fn supports(&self, runtime: Runtime, architecture: Architecture) -> bool {
        self.compatible_runtimes.contains(&runtime)
            && self.compatible_architectures.contains(&architecture)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingMode {
    Active,
    PassThrough,
}

impl TracingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TracingMode::Active => "Active",
            TracingMode::PassThrough => "PassThrough",
        }
    }
}

/// Function environment value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvValue {
    SecretAddress(SecretAddress),
    Literal(String),
}

impl EnvValue {
    pub fn to_value(&self) -> Value {
        match self {
            EnvValue::SecretAddress(address) => address.to_value(),
            EnvValue::Literal(s) => Value::Literal(s.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub handler: String,
    pub code: S3Location,
    pub runtime: Runtime,
    pub architecture: Architecture,
    pub timeout_secs: u32,
    pub memory_mb: u32,
    pub role: LogicalId,
    pub layers: Vec<LogicalId>,
    pub environment: BTreeMap<String, EnvValue>,
    pub tracing: TracingMode,
    pub log_group: LogicalId,
}

/// Append-only log destination owned by the component that writes to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogGroup {
    pub name: String,
    pub retention_days: u32,
    /// Component that writes here. Ownership only, not a dependency.
    pub writer: LogicalId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpApi {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Any,
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Any => "ANY",
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteKey {
    pub method: HttpMethod,
    pub path: String,
}

impl RouteKey {
    pub fn catch_all() -> Self {
        Self {
            method: HttpMethod::Any,
            path: "/".to_string(),
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method.as_str(), self.path)
    }
}

/// Proxy integration forwarding requests to a function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Integration {
    pub api: LogicalId,
    pub function: LogicalId,
    pub payload_format_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub api: LogicalId,
    pub key: RouteKey,
    pub integration: LogicalId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessLogSettings {
    pub destination: LogicalId,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub api: LogicalId,
    pub name: String,
    pub auto_deploy: bool,
    pub access_log: Option<AccessLogSettings>,
}

/// Lets the gateway invoke the function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokePermission {
    pub function: LogicalId,
    pub api: LogicalId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Secret,
    Identity,
    Layer,
    Function,
    LogSink,
    Gateway,
    Integration,
    Route,
    Stage,
    Permission,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Secret => "secret",
            ResourceKind::Identity => "identity",
            ResourceKind::Layer => "layer",
            ResourceKind::Function => "function",
            ResourceKind::LogSink => "log-sink",
            ResourceKind::Gateway => "gateway",
            ResourceKind::Integration => "integration",
            ResourceKind::Route => "route",
            ResourceKind::Stage => "stage",
            ResourceKind::Permission => "permission",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Secret(Secret),
    Role(Role),
    Layer(LayerVersion),
    Function(Function),
    LogGroup(LogGroup),
    HttpApi(HttpApi),
    Integration(Integration),
    Route(Route),
    Stage(Stage),
    Permission(InvokePermission),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Secret(_) => ResourceKind::Secret,
            Resource::Role(_) => ResourceKind::Identity,
            Resource::Layer(_) => ResourceKind::Layer,
            Resource::Function(_) => ResourceKind::Function,
            Resource::LogGroup(_) => ResourceKind::LogSink,
            Resource::HttpApi(_) => ResourceKind::Gateway,
            Resource::Integration(_) => ResourceKind::Integration,
            Resource::Route(_) => ResourceKind::Route,
            Resource::Stage(_) => ResourceKind::Stage,
            Resource::Permission(_) => ResourceKind::Permission,
        }
    }

    /// CloudFormation resource type
    pub fn type_name(&self) -> &'static str {
        match self {
            Resource::Secret(_) => "AWS::SecretsManager::Secret",
            Resource::Role(_) => "AWS::IAM::Role",
            Resource::Layer(_) => "AWS::Lambda::LayerVersion",
            Resource::Function(_) => "AWS::Lambda::Function",
            Resource::LogGroup(_) => "AWS::Logs::LogGroup",
            Resource::HttpApi(_) => "AWS::ApiGatewayV2::Api",
            Resource::Integration(_) => "AWS::ApiGatewayV2::Integration",
            Resource::Route(_) => "AWS::ApiGatewayV2::Route",
            Resource::Stage(_) => "AWS::ApiGatewayV2::Stage",
            Resource::Permission(_) => "AWS::Lambda::Permission",
        }
    }

    /// Imported resources exist already and are never created or deleted here.
    pub fn is_external(&self) -> bool {
        matches!(self, Resource::Secret(secret) if secret.is_imported())
    }

    /// Resources this one references through its properties
    pub fn references(&self) -> Vec<LogicalId> {
        let mut refs: Vec<LogicalId> = Vec::new();
        let mut push = |id: &LogicalId| {
            if !refs.contains(id) {
                refs.push(id.clone());
            }
        };

        match self {
            Resource::Secret(_) | Resource::HttpApi(_) => {}
            Resource::Role(role) => {
                for value in role
                    .statements()
                    .flat_map(|s| s.resources.iter())
                    .chain(role.managed_policies())
                {
                    for id in value.references() {
                        push(&id);
                    }
                }
            }
            // writer is ownership metadata; the writer depends on the group
            Resource::Layer(_) | Resource::LogGroup(_) => {}
            Resource::Function(function) => {
                push(&function.role);
                for layer in &function.layers {
                    push(layer);
                }
                push(&function.log_group);
                for value in function.environment.values() {
                    for id in value.to_value().references() {
                        push(&id);
                    }
                }
            }
            Resource::Integration(integration) => {
                push(&integration.api);
                push(&integration.function);
            }
            Resource::Route(route) => {
                push(&route.api);
                push(&route.integration);
            }
            Resource::Stage(stage) => {
                push(&stage.api);
                if let Some(settings) = &stage.access_log {
                    push(&settings.destination);
                }
            }
            Resource::Permission(permission) => {
                push(&permission.function);
                push(&permission.api);
            }
        }

        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_references_skip_pseudo_parameters() {
        let value = Value::Sub(
            "arn:${AWS::Partition}:execute-api:${AWS::Region}:${AWS::AccountId}:${BotHttpApi}/*/*"
                .to_string(),
        );
        assert_eq!(value.references(), vec![LogicalId::new("BotHttpApi")]);

        let value = Value::Sub("integrations/${BotApiIntegration}".to_string());
        assert_eq!(value.references(), vec![LogicalId::new("BotApiIntegration")]);

        let value = Value::Sub("${!Literal} ${Api.ApiEndpoint} ${Api}".to_string());
        assert_eq!(value.references(), vec![LogicalId::new("Api")]);
    }

    #[test]
    fn test_secret_address_values() {
        let managed = SecretAddress::Managed(LogicalId::new("BotTokenSecret"));
        assert_eq!(managed.to_value(), Value::Ref(LogicalId::new("BotTokenSecret")));

        let arn = "arn:aws:secretsmanager:us-east-1:123456789012:secret:SlackBotToken";
        let imported = SecretAddress::Imported(arn.to_string());
        assert_eq!(imported.to_value(), Value::literal(arn));
        assert!(imported.to_value().references().is_empty());
    }

    #[test]
    fn test_layer_support_matrix() {
        let layer = LayerVersion {
            name: "deps".into(),
            description: String::new(),
            code: S3Location {
                bucket: "b".into(),
                key: "k.zip".into(),
            },
            compatible_runtimes: vec![Runtime::Python312],
            compatible_architectures: vec![Architecture::X86_64],
        };
        assert!(layer.supports(Runtime::Python312, Architecture::X86_64));
        assert!(!layer.supports(Runtime::Python312, Architecture::Arm64));
        assert!(!layer.supports(Runtime::Python313, Architecture::X86_64));
    }

    #[test]
    fn test_model_invoke_grant_is_wildcard_by_default() {
        let grant = Grant::model_invoke(&["bedrock:InvokeModel".to_string()], "*");
        let statement = grant.statement.as_ref().unwrap();
        assert!(statement.has_wildcard_resource());
        assert_eq!(statement.to_json()["Resource"], json!(["*"]));
    }

    #[test]
    fn test_secret_read_grant_is_secrets_manager_only() {
        let arn = "arn:aws:secretsmanager:us-east-1:123456789012:secret:SlackBotToken";
        let grant = Grant::secret_read(&SecretAddress::Imported(arn.to_string()));
        let statement = grant.statement.as_ref().unwrap();
        assert!(statement.actions.iter().all(|a| a.starts_with("secretsmanager:")));
        assert!(!statement.actions.iter().any(|a| a == "kms:Decrypt"));
        assert_eq!(statement.resources, vec![Value::literal(arn)]);
    }

    #[test]
    fn test_route_key_display() {
        assert_eq!(RouteKey::catch_all().to_string(), "ANY /");
    }
}
