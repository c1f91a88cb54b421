//! Error types for stack assembly and pre-submission checks

use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E101: Function runtime/architecture not in the layer's compatibility set
    E101IncompatibleLayer,
    /// E102: Identity is missing a required grant
    E102MissingGrant,
    /// E103: Identity carries a grant outside the required set
    E103UnexpectedGrant,
    /// E104: Resource graph contains a cycle
    E104DependencyCycle,
    /// E105: Resource depends on an undeclared resource
    E105UnknownDependency,
    /// E106: Two resources share a logical id
    E106DuplicateResource,
    /// E107: Gateway route table is not a single catch-all route
    E107RouteTable,
    /// E108: Secret value could reach configuration, outputs or logs
    E108SecretExposure,
    /// E109: Unsuppressed policy lint findings
    E109LintViolation,
    /// E110: Suppression record is malformed
    E110InvalidSuppression,
    /// E111: Function identity binding is wrong
    E111IdentityBinding,
    /// E112: Log sink ownership is wrong
    E112LogSink,
    /// E113: Resource materializes before something it must follow
    E113Ordering,
    /// E114: Resource references the wrong kind of resource
    E114InvalidReference,
    /// E115: Stack configuration cannot be turned into resources
    E115InvalidConfig,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E101IncompatibleLayer => "E101",
            Self::E102MissingGrant => "E102",
            Self::E103UnexpectedGrant => "E103",
            Self::E104DependencyCycle => "E104",
            Self::E105UnknownDependency => "E105",
            Self::E106DuplicateResource => "E106",
            Self::E107RouteTable => "E107",
            Self::E108SecretExposure => "E108",
            Self::E109LintViolation => "E109",
            Self::E110InvalidSuppression => "E110",
            Self::E111IdentityBinding => "E111",
            Self::E112LogSink => "E112",
            Self::E113Ordering => "E113",
            Self::E114InvalidReference => "E114",
            Self::E115InvalidConfig => "E115",
        }
    }
}

/// Errors raised before a stack is handed to the provider
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StackError {
    #[error("[{code}] Function '{function}' ({runtime}/{architecture}) is not compatible with layer '{layer}'\n\nLayer supports runtimes [{runtimes}] on [{architectures}]")]
    IncompatibleLayer {
        code: &'static str,
        function: String,
        layer: String,
        runtime: String,
        architecture: String,
        runtimes: String,
        architectures: String,
    },

    #[error("[{code}] Identity '{role}' is missing the {grant} grant")]
    MissingGrant {
        code: &'static str,
        role: String,
        grant: String,
    },

    #[error("[{code}] Identity '{role}' has an unexpected grant: {detail}")]
    UnexpectedGrant {
        code: &'static str,
        role: String,
        detail: String,
    },

    #[error("[{code}] Dependency cycle between resources: {}", .cycle.join(" -> "))]
    DependencyCycle {
        code: &'static str,
        cycle: Vec<String>,
    },

    #[error("[{code}] Resource '{resource}' depends on undeclared resource '{missing}'")]
    UnknownDependency {
        code: &'static str,
        resource: String,
        missing: String,
    },

    #[error("[{code}] Resource '{id}' is declared more than once")]
    DuplicateResource { code: &'static str, id: String },

    #[error("[{code}] Invalid route table for API '{api}': {message}")]
    RouteTable {
        code: &'static str,
        api: String,
        message: String,
    },

    #[error("[{code}] Secret exposure in {location}: {message}")]
    SecretExposure {
        code: &'static str,
        location: String,
        message: String,
    },

    #[error("[{code}] {count} unsuppressed policy finding(s):\n{summary}")]
    LintViolation {
        code: &'static str,
        count: usize,
        summary: String,
    },

    #[error("[{code}] Invalid suppression of {rule_id} on '{resource}': {reason}")]
    InvalidSuppression {
        code: &'static str,
        resource: String,
        rule_id: String,
        reason: String,
    },

    #[error("[{code}] Identity binding for function '{function}': {message}")]
    IdentityBinding {
        code: &'static str,
        function: String,
        message: String,
    },

    #[error("[{code}] Log sink '{sink}': {message}")]
    LogSink {
        code: &'static str,
        sink: String,
        message: String,
    },

    #[error("[{code}] '{after}' must materialize after '{before}'")]
    Ordering {
        code: &'static str,
        before: String,
        after: String,
    },

    #[error("[{code}] Resource '{resource}' references '{target}': expected {expected}")]
    InvalidReference {
        code: &'static str,
        resource: String,
        target: String,
        expected: String,
    },

    #[error("[{code}] Invalid stack configuration: {message}")]
    InvalidConfig { code: &'static str, message: String },
}

impl StackError {
    pub fn incompatible_layer(
        function: impl Into<String>,
        layer: impl Into<String>,
        runtime: impl Into<String>,
        architecture: impl Into<String>,
        runtimes: impl Into<String>,
        architectures: impl Into<String>,
    ) -> Self {
        Self::IncompatibleLayer {
            code: ErrorCode::E101IncompatibleLayer.as_str(),
            function: function.into(),
            layer: layer.into(),
            runtime: runtime.into(),
            architecture: architecture.into(),
            runtimes: runtimes.into(),
            architectures: architectures.into(),
        }
    }

    pub fn missing_grant(role: impl Into<String>, grant: impl Into<String>) -> Self {
        Self::MissingGrant {
            code: ErrorCode::E102MissingGrant.as_str(),
            role: role.into(),
            grant: grant.into(),
        }
    }

    pub fn unexpected_grant(role: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::UnexpectedGrant {
            code: ErrorCode::E103UnexpectedGrant.as_str(),
            role: role.into(),
            detail: detail.into(),
        }
    }

    pub fn dependency_cycle(cycle: Vec<String>) -> Self {
        Self::DependencyCycle {
            code: ErrorCode::E104DependencyCycle.as_str(),
            cycle,
        }
    }

    pub fn unknown_dependency(resource: impl Into<String>, missing: impl Into<String>) -> Self {
        Self::UnknownDependency {
            code: ErrorCode::E105UnknownDependency.as_str(),
            resource: resource.into(),
            missing: missing.into(),
        }
    }

    pub fn duplicate_resource(id: impl Into<String>) -> Self {
        Self::DuplicateResource {
            code: ErrorCode::E106DuplicateResource.as_str(),
            id: id.into(),
        }
    }

    pub fn route_table(api: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RouteTable {
            code: ErrorCode::E107RouteTable.as_str(),
            api: api.into(),
            message: message.into(),
        }
    }

    pub fn secret_exposure(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SecretExposure {
            code: ErrorCode::E108SecretExposure.as_str(),
            location: location.into(),
            message: message.into(),
        }
    }

    pub fn lint_violation(count: usize, summary: impl Into<String>) -> Self {
        Self::LintViolation {
            code: ErrorCode::E109LintViolation.as_str(),
            count,
            summary: summary.into(),
        }
    }

    pub fn invalid_suppression(
        resource: impl Into<String>,
        rule_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidSuppression {
            code: ErrorCode::E110InvalidSuppression.as_str(),
            resource: resource.into(),
            rule_id: rule_id.into(),
            reason: reason.into(),
        }
    }

    pub fn identity_binding(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IdentityBinding {
            code: ErrorCode::E111IdentityBinding.as_str(),
            function: function.into(),
            message: message.into(),
        }
    }

    pub fn log_sink(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LogSink {
            code: ErrorCode::E112LogSink.as_str(),
            sink: sink.into(),
            message: message.into(),
        }
    }

    pub fn ordering(before: impl Into<String>, after: impl Into<String>) -> Self {
        Self::Ordering {
            code: ErrorCode::E113Ordering.as_str(),
            before: before.into(),
            after: after.into(),
        }
    }

    pub fn invalid_reference(
        resource: impl Into<String>,
        target: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidReference {
            code: ErrorCode::E114InvalidReference.as_str(),
            resource: resource.into(),
            target: target.into(),
            expected: expected.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            code: ErrorCode::E115InvalidConfig.as_str(),
            message: message.into(),
        }
    }

    /// Stable code of this error, e.g. "E101"
    pub fn code(&self) -> &'static str {
        match self {
            Self::IncompatibleLayer { code, .. }
            | Self::MissingGrant { code, .. }
            | Self::UnexpectedGrant { code, .. }
            | Self::DependencyCycle { code, .. }
            | Self::UnknownDependency { code, .. }
            | Self::DuplicateResource { code, .. }
            | Self::RouteTable { code, .. }
            | Self::SecretExposure { code, .. }
            | Self::LintViolation { code, .. }
            | Self::InvalidSuppression { code, .. }
            | Self::IdentityBinding { code, .. }
            | Self::LogSink { code, .. }
            | Self::Ordering { code, .. }
            | Self::InvalidReference { code, .. }
            | Self::InvalidConfig { code, .. } => *code,
        }
    }
}

/// Result type alias for StackError
pub type Result<T> = std::result::Result<T, StackError>;
