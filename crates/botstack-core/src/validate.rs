//! Pre-submission checks
//!
//! Everything here runs before a template is rendered. Each check fails with
//! the first violation it finds, carrying a stable error code.

use std::collections::HashMap;

use botstack_config::{
    FUNCTION_MEMORY_MB, FUNCTION_TIMEOUT_SECS, MODEL_INVOKE_ACTION_PREFIX, SECRET_ENV_KEY,
    VALID_RETENTION_DAYS,
};
use tracing::{debug, info};

use crate::error::{Result, StackError};
use crate::model::{
    EnvValue, GrantKind, LogicalId, PolicyStatement, Resource, ResourceKind, Role,
    SecretAddress, SecretOrigin, TracingMode, Value, BASIC_EXECUTION_POLICY,
    SECRET_READ_ACTIONS,
};
use crate::stack::Stack;

/// Run every check in order.
pub fn validate(stack: &Stack) -> Result<()> {
    check_references(stack)?;
    check_fixed_settings(stack)?;
    check_layer_compatibility(stack)?;
    check_identity_binding(stack)?;
    check_grants(stack)?;
    check_secret_indirection(stack)?;
    check_route_table(stack)?;
    check_log_sinks(stack)?;
    check_ordering(stack)?;
    info!(stack = %stack.name, resources = stack.graph.len(), "Stack passed validation");
    Ok(())
}

fn kind_of(stack: &Stack, id: &LogicalId) -> Option<ResourceKind> {
    stack.node(id).map(|n| n.resource.kind())
}

fn expect_kind(
    stack: &Stack,
    from: &LogicalId,
    target: &LogicalId,
    kind: ResourceKind,
) -> Result<()> {
    match kind_of(stack, target) {
        None => Err(StackError::unknown_dependency(from.as_str(), target.as_str())),
        Some(actual) if actual != kind => Err(StackError::invalid_reference(
            from.as_str(),
            target.as_str(),
            format!("a {} but found a {}", kind, actual),
        )),
        Some(_) => Ok(()),
    }
}

/// Typed references point at the right kind of resource, and nothing
/// references an imported resource by logical id.
pub fn check_references(stack: &Stack) -> Result<()> {
    for node in stack.graph.nodes() {
        let id = &node.id;
        match &node.resource {
            Resource::Function(function) => {
                expect_kind(stack, id, &function.role, ResourceKind::Identity)?;
                for layer in &function.layers {
                    expect_kind(stack, id, layer, ResourceKind::Layer)?;
                }
                expect_kind(stack, id, &function.log_group, ResourceKind::LogSink)?;
            }
            Resource::Integration(integration) => {
                expect_kind(stack, id, &integration.api, ResourceKind::Gateway)?;
                expect_kind(stack, id, &integration.function, ResourceKind::Function)?;
            }
            Resource::Route(route) => {
                expect_kind(stack, id, &route.api, ResourceKind::Gateway)?;
                expect_kind(stack, id, &route.integration, ResourceKind::Integration)?;
            }
            Resource::Stage(stage) => {
                expect_kind(stack, id, &stage.api, ResourceKind::Gateway)?;
                if let Some(settings) = &stage.access_log {
                    expect_kind(stack, id, &settings.destination, ResourceKind::LogSink)?;
                }
            }
            Resource::Permission(permission) => {
                expect_kind(stack, id, &permission.function, ResourceKind::Function)?;
                expect_kind(stack, id, &permission.api, ResourceKind::Gateway)?;
            }
            Resource::Secret(_)
            | Resource::Role(_)
            | Resource::Layer(_)
            | Resource::LogGroup(_)
            | Resource::HttpApi(_) => {}
        }

        for target in node.resource.references() {
            match stack.node(&target) {
                None => return Err(StackError::unknown_dependency(id.as_str(), target.as_str())),
                Some(t) if t.resource.is_external() => {
                    return Err(StackError::invalid_reference(
                        id.as_str(),
                        target.as_str(),
                        "a resource created by this stack, not an imported one",
                    ))
                }
                Some(_) => {}
            }
        }
    }

    for output in &stack.outputs {
        for target in output.value.references() {
            if !stack.graph.contains(&target) {
                return Err(StackError::unknown_dependency(
                    format!("Outputs.{}", output.key),
                    target.as_str(),
                ));
            }
        }
    }
    Ok(())
}

/// Timeout, memory and tracing are fixed for every function.
pub fn check_fixed_settings(stack: &Stack) -> Result<()> {
    for (id, function) in stack.functions() {
        if function.timeout_secs != FUNCTION_TIMEOUT_SECS {
            return Err(StackError::invalid_config(format!(
                "function '{}' timeout is {}s, must be {}s",
                id, function.timeout_secs, FUNCTION_TIMEOUT_SECS
            )));
        }
        if function.memory_mb != FUNCTION_MEMORY_MB {
            return Err(StackError::invalid_config(format!(
                "function '{}' memory is {} MB, must be {} MB",
                id, function.memory_mb, FUNCTION_MEMORY_MB
            )));
        }
        if function.tracing != TracingMode::Active {
            return Err(StackError::invalid_config(format!(
                "function '{}' tracing must be Active",
                id
            )));
        }
    }
    Ok(())
}

/// Function runtime and architecture must both be in every layer's set.
pub fn check_layer_compatibility(stack: &Stack) -> Result<()> {
    for (id, function) in stack.functions() {
        for layer_id in &function.layers {
            let Some(Resource::Layer(layer)) = stack.node(layer_id).map(|n| &n.resource) else {
                continue;
            };
            if !layer.supports(function.runtime, function.architecture) {
                return Err(StackError::incompatible_layer(
                    id.as_str(),
                    layer_id.as_str(),
                    function.runtime.as_str(),
                    function.architecture.as_str(),
                    join(layer.compatible_runtimes.iter().map(|r| r.as_str())),
                    join(layer.compatible_architectures.iter().map(|a| a.as_str())),
                ));
            }
        }
    }
    Ok(())
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(", ")
}

/// Each function has its own identity, trusted by the function service.
pub fn check_identity_binding(stack: &Stack) -> Result<()> {
    let mut bound: HashMap<&LogicalId, &LogicalId> = HashMap::new();
    for (id, function) in stack.functions() {
        if let Some(other) = bound.insert(&function.role, id) {
            return Err(StackError::identity_binding(
                id.as_str(),
                format!("identity '{}' is already bound to '{}'", function.role, other),
            ));
        }
    }

    for (role_id, role) in stack.roles() {
        let Some(function) = bound.get(role_id) else {
            return Err(StackError::identity_binding(
                role_id.as_str(),
                "identity is not bound to any function",
            ));
        };
        if role.service_principal != crate::builder::LAMBDA_PRINCIPAL {
            return Err(StackError::identity_binding(
                function.as_str(),
                format!(
                    "identity trusts '{}' instead of '{}'",
                    role.service_principal,
                    crate::builder::LAMBDA_PRINCIPAL
                ),
            ));
        }
    }
    Ok(())
}

/// Exactly the three required grants, the read grant on the function's own
/// secret.
pub fn check_grants(stack: &Stack) -> Result<()> {
    for (role_id, role) in stack.roles() {
        for kind in GrantKind::REQUIRED {
            match role.grants.iter().filter(|g| g.kind == kind).count() {
                0 => return Err(StackError::missing_grant(role_id.as_str(), kind.as_str())),
                1 => {}
                n => {
                    return Err(StackError::unexpected_grant(
                        role_id.as_str(),
                        format!("{} declared {} times", kind, n),
                    ))
                }
            }
        }

        if let Some(basic) = role.grant(GrantKind::BasicExecution) {
            let managed = basic.managed_policy.as_ref().map(|p| p.text());
            if managed != Some(BASIC_EXECUTION_POLICY) {
                return Err(StackError::missing_grant(
                    role_id.as_str(),
                    "basic-execution (managed log-write policy)",
                ));
            }
        }

        for grant in &role.grants {
            if grant.kind != GrantKind::BasicExecution && grant.managed_policy.is_some() {
                return Err(StackError::unexpected_grant(
                    role_id.as_str(),
                    format!("{} attaches a managed policy", grant.kind),
                ));
            }
        }

        // the read grant must target the secret of the function using this role
        let bound_secret = stack
            .functions()
            .find(|(_, f)| f.role == *role_id)
            .and_then(|(_, f)| match f.environment.get(SECRET_ENV_KEY) {
                Some(EnvValue::SecretAddress(address)) => Some(address.to_value()),
                _ => None,
            });
        check_secret_read(role_id, role, bound_secret.as_ref())?;
        check_model_invoke(role_id, role)?;
    }
    Ok(())
}

fn statement_of<'a>(
    role_id: &LogicalId,
    role: &'a Role,
    kind: GrantKind,
) -> Result<&'a PolicyStatement> {
    role.grant(kind)
        .and_then(|g| g.statement.as_ref())
        .ok_or_else(|| {
            StackError::missing_grant(role_id.as_str(), format!("{} (no policy statement)", kind))
        })
}

fn check_secret_read(role_id: &LogicalId, role: &Role, secret: Option<&Value>) -> Result<()> {
    let statement = statement_of(role_id, role, GrantKind::SecretRead)?;
    if let Some(action) = SECRET_READ_ACTIONS
        .iter()
        .find(|a| !statement.actions.iter().any(|have| have.as_str() == **a))
    {
        return Err(StackError::missing_grant(
            role_id.as_str(),
            format!("secret-read (statement lacks {})", action),
        ));
    }
    match secret {
        Some(expected) if statement.resources != [expected.clone()] => {
            Err(StackError::missing_grant(
                role_id.as_str(),
                format!("secret-read on {}", expected),
            ))
        }
        None if statement.resources.is_empty() => Err(StackError::missing_grant(
            role_id.as_str(),
            "secret-read (statement names no resource)",
        )),
        _ => Ok(()),
    }
}

fn check_model_invoke(role_id: &LogicalId, role: &Role) -> Result<()> {
    let statement = statement_of(role_id, role, GrantKind::ModelInvoke)?;
    if !statement
        .actions
        .iter()
        .any(|a| a.starts_with(MODEL_INVOKE_ACTION_PREFIX))
    {
        return Err(StackError::missing_grant(
            role_id.as_str(),
            format!("model-invoke (no {}* action)", MODEL_INVOKE_ACTION_PREFIX),
        ));
    }
    if let Some(other) = statement
        .actions
        .iter()
        .find(|a| !a.starts_with(MODEL_INVOKE_ACTION_PREFIX))
    {
        return Err(StackError::unexpected_grant(
            role_id.as_str(),
            format!("model-invoke also allows {}", other),
        ));
    }
    if statement.resources.is_empty() {
        return Err(StackError::missing_grant(
            role_id.as_str(),
            "model-invoke (statement names no resource)",
        ));
    }

    let scope: Vec<String> = statement.resources.iter().map(|r| r.to_string()).collect();
    debug!(role = %role_id, scope = ?scope, "Model invoke grant scope");
    Ok(())
}

fn secret_node_for<'a>(stack: &'a Stack, address: &SecretAddress) -> Option<&'a LogicalId> {
    match address {
        SecretAddress::Managed(id) => stack
            .secrets()
            .find(|(sid, secret)| *sid == id && !secret.is_imported())
            .map(|(sid, _)| sid),
        SecretAddress::Imported(arn) => stack
            .secrets()
            .find(|(_, secret)| {
                matches!(&secret.origin, SecretOrigin::Imported { arn: a } if a == arn)
            })
            .map(|(sid, _)| sid),
    }
}

/// The function gets the secret's address under `token`, never its value.
pub fn check_secret_indirection(stack: &Stack) -> Result<()> {
    for (id, function) in stack.functions() {
        let location = format!("environment of '{}'", id);
        match function.environment.get(SECRET_ENV_KEY) {
            Some(EnvValue::SecretAddress(address)) => {
                if secret_node_for(stack, address).is_none() {
                    return Err(StackError::secret_exposure(
                        location,
                        format!(
                            "'{}' points at a secret this stack does not declare",
                            SECRET_ENV_KEY
                        ),
                    ));
                }
            }
            Some(EnvValue::Literal(_)) => {
                return Err(StackError::secret_exposure(
                    location,
                    format!(
                        "'{}' holds a literal; it must hold the secret address",
                        SECRET_ENV_KEY
                    ),
                ));
            }
            None => {
                return Err(StackError::secret_exposure(
                    location,
                    format!("'{}' is not set", SECRET_ENV_KEY),
                ));
            }
        }

        for (key, value) in &function.environment {
            if value.to_value().text().contains("{{resolve:secretsmanager") {
                return Err(StackError::secret_exposure(
                    location,
                    format!("'{}' resolves the secret value at materialization", key),
                ));
            }
        }
    }

    for output in &stack.outputs {
        if output.value.text().contains("{{resolve:secretsmanager") {
            return Err(StackError::secret_exposure(
                format!("output '{}'", output.key),
                "output resolves the secret value",
            ));
        }
    }

    for (id, stage) in stack.stages() {
        if let Some(settings) = &stage.access_log {
            if settings.format.contains("{{resolve:") || settings.format.contains("stageVariables")
            {
                return Err(StackError::secret_exposure(
                    format!("access log format of '{}'", id),
                    "format may only use request context variables",
                ));
            }
        }
    }
    Ok(())
}

/// Each gateway has one route, `ANY /`, through one integration to a function.
pub fn check_route_table(stack: &Stack) -> Result<()> {
    for (api_id, _) in stack.apis() {
        let routes: Vec<_> = stack.routes().filter(|(_, r)| r.api == *api_id).collect();
        let [(_, route)] = routes.as_slice() else {
            return Err(StackError::route_table(
                api_id.as_str(),
                format!("expected exactly one route, found {}", routes.len()),
            ));
        };
        if route.key != crate::model::RouteKey::catch_all() {
            return Err(StackError::route_table(
                api_id.as_str(),
                format!("route is '{}', expected 'ANY /'", route.key),
            ));
        }

        let integrations: Vec<_> = stack
            .integrations()
            .filter(|(_, i)| i.api == *api_id)
            .collect();
        if integrations.len() != 1 {
            return Err(StackError::route_table(
                api_id.as_str(),
                format!(
                    "expected exactly one integration target, found {}",
                    integrations.len()
                ),
            ));
        }
        let (integration_id, integration) = integrations[0];
        if route.integration != *integration_id {
            return Err(StackError::route_table(
                api_id.as_str(),
                format!("route targets '{}', not the API's integration", route.integration),
            ));
        }
        if kind_of(stack, &integration.function) != Some(ResourceKind::Function) {
            return Err(StackError::route_table(
                api_id.as_str(),
                format!("integration target '{}' is not a function", integration.function),
            ));
        }
    }
    Ok(())
}

/// One sink per emitter, owned by that emitter, with a valid retention.
pub fn check_log_sinks(stack: &Stack) -> Result<()> {
    let mut per_writer: HashMap<&LogicalId, usize> = HashMap::new();
    for (id, group) in stack.log_groups() {
        if !VALID_RETENTION_DAYS.contains(&group.retention_days) {
            return Err(StackError::log_sink(
                id.as_str(),
                format!("retention of {} days is not a supported value", group.retention_days),
            ));
        }
        match kind_of(stack, &group.writer) {
            Some(ResourceKind::Function) | Some(ResourceKind::Stage) => {}
            _ => {
                return Err(StackError::log_sink(
                    id.as_str(),
                    format!("writer '{}' is not a function or stage", group.writer),
                ))
            }
        }
        *per_writer.entry(&group.writer).or_default() += 1;
    }

    let emitters = stack
        .functions()
        .map(|(id, f)| (id, Some(&f.log_group)))
        .chain(
            stack
                .stages()
                .map(|(id, s)| (id, s.access_log.as_ref().map(|a| &a.destination))),
        );
    for (emitter, sink) in emitters {
        let Some(sink) = sink else {
            // stages without access logs are reported by the linter
            continue;
        };
        let owner = stack.log_groups().find(|(id, _)| *id == sink).map(|(_, g)| &g.writer);
        if owner != Some(emitter) {
            return Err(StackError::log_sink(
                sink.as_str(),
                format!("'{}' writes here but does not own it", emitter),
            ));
        }
        let count = per_writer.get(emitter).copied().unwrap_or(0);
        if count != 1 {
            return Err(StackError::log_sink(
                sink.as_str(),
                format!("'{}' owns {} log sinks, expected exactly one", emitter, count),
            ));
        }
    }
    Ok(())
}

/// Materialization order honors the stack's required sequence.
pub fn check_ordering(stack: &Stack) -> Result<()> {
    let positions = stack.graph.positions()?;
    let before = |first: &LogicalId, second: &LogicalId| -> Result<()> {
        match (positions.get(first), positions.get(second)) {
            (Some(a), Some(b)) if a < b => Ok(()),
            (Some(_), Some(_)) => Err(StackError::ordering(first.as_str(), second.as_str())),
            _ => Ok(()),
        }
    };

    for (id, function) in stack.functions() {
        before(&function.role, id)?;
        for layer in &function.layers {
            before(layer, id)?;
        }
        before(&function.log_group, id)?;
        if let Some(EnvValue::SecretAddress(address)) = function.environment.get(SECRET_ENV_KEY) {
            if let Some(secret) = secret_node_for(stack, address) {
                before(secret, &function.role)?;
                before(secret, id)?;
            }
        }
    }

    for (stage_id, stage) in stack.stages() {
        for (_, integration) in stack.integrations().filter(|(_, i)| i.api == stage.api) {
            before(&integration.function, stage_id)?;
        }
        if let Some(settings) = &stage.access_log {
            before(&settings.destination, stage_id)?;
        }
    }
    Ok(())
}
