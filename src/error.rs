//! Error taxonomy shared by every component.
//!
//! Components return `AppError` at their boundary; binaries and the
//! scheduler glue code use `anyhow::Result` and `.context(...)` on top.

use std::fmt;

/// Error category, not type — several distinct failures share a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Validation,
    Execution,
    ExternalApi,
    Blockchain,
    State,
    System,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Network => "network",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Execution => "execution",
            ErrorCategory::ExternalApi => "external_api",
            ErrorCategory::Blockchain => "blockchain",
            ErrorCategory::State => "state",
            ErrorCategory::System => "system",
            ErrorCategory::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// Default severity for a category, per the taxonomy table in spec §7.
/// Individual call sites may escalate (e.g. a `Blockchain` error whose
/// message indicates a terminal program rejection rather than a transient
/// RPC hiccup) by constructing `AppError` directly instead of via `from_category`.
fn default_severity(category: ErrorCategory) -> Severity {
    match category {
        ErrorCategory::Configuration => Severity::Critical,
        ErrorCategory::Network => Severity::Medium,
        ErrorCategory::Validation => Severity::Low,
        ErrorCategory::Execution => Severity::High,
        ErrorCategory::ExternalApi => Severity::Medium,
        ErrorCategory::Blockchain => Severity::High,
        ErrorCategory::State => Severity::High,
        ErrorCategory::System => Severity::Critical,
        ErrorCategory::Unknown => Severity::Medium,
    }
}

#[derive(Debug, thiserror::Error)]
#[error("[{category}/{severity}] {message}")]
pub struct AppError {
    pub category: ErrorCategory,
    pub severity: Severity,
    pub message: String,
    pub context: Option<String>,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl AppError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            severity: default_severity(category),
            category,
            message: message.into(),
            context: None,
            source: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Configuration, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Network, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, message)
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Execution, message)
    }

    pub fn external_api(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::ExternalApi, message)
    }

    pub fn blockchain(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Blockchain, message)
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::State, message)
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::System, message)
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        // Cancellation is not retryable even though it resembles a network error.
        Self::new(ErrorCategory::System, message).with_severity(Severity::Medium)
    }

    /// Circuit breaker rejected the call before it reached the network.
    /// `Execution`, not `Network`/`ExternalApi`/`Blockchain`, so `is_retryable`
    /// returns false and the retry layer never attempts it.
    pub fn circuit_open(key: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Execution, format!("circuit breaker open for '{}'", key.into()))
    }

    /// Whether the retry layer (§4.10) should attempt this error again.
    /// Circuit-open errors construct themselves with `Execution` and a
    /// distinguishing message rather than a dedicated category, and are
    /// filtered out by the breaker before reaching the retry wrapper.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category,
            ErrorCategory::Network | ErrorCategory::ExternalApi | ErrorCategory::Blockchain
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
