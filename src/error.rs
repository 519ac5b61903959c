use std::fmt;
use thiserror::Error;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "config.failure_threshold")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected range, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_validator", "registry")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the resilience layer itself.
///
/// These errors come from misconfiguration, never from the operations the
/// layer protects; wrapped-call outcomes travel through [`CallError`]
/// instead. Internal locks recover from poisoning rather than surfacing it,
/// so construction-time validation is the only fallible path.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } => Some(context),
        }
    }
}

/// Outcome of a guarded call.
///
/// `Inner` carries the wrapped operation's own error unchanged; the two
/// rejection variants mean the operation was never invoked. Callers that only
/// care about "did the guard refuse" can use [`CallError::is_rejection`].
#[derive(Debug)]
pub enum CallError<E> {
    /// The circuit was OPEN (or every half-open probe slot was taken).
    CircuitOpen {
        /// Name of the breaker that refused the call.
        name: String,
        /// Time until the next probe becomes possible, when known.
        retry_after_ms: Option<u64>,
    },
    /// The token bucket had no tokens available.
    RateLimited {
        name: String,
        /// Estimated wait until one token is available, when known.
        retry_after_ms: Option<u64>,
    },
    /// The operation ran and failed with its own error.
    Inner(E),
}

impl<E> CallError<E> {
    /// True when the guard refused the call without invoking the operation.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, CallError::Inner(_))
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CallError::CircuitOpen { .. })
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CallError::RateLimited { .. })
    }

    /// Suggested wait before retrying, for rejection variants that know one.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            CallError::CircuitOpen { retry_after_ms, .. }
            | CallError::RateLimited { retry_after_ms, .. } => *retry_after_ms,
            CallError::Inner(_) => None,
        }
    }

    /// Recover the wrapped operation's error, if the operation actually ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CallError::Inner(inner) => Some(inner),
            _ => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for CallError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::CircuitOpen {
                name,
                retry_after_ms,
            } => match retry_after_ms {
                Some(ms) => write!(f, "circuit '{}' is open (retry in {}ms)", name, ms),
                None => write!(f, "circuit '{}' is open", name),
            },
            CallError::RateLimited {
                name,
                retry_after_ms,
            } => match retry_after_ms {
                Some(ms) => write!(f, "rate limit exceeded for '{}' (retry in {}ms)", name, ms),
                None => write!(f, "rate limit exceeded for '{}'", name),
            },
            CallError::Inner(inner) => write!(f, "{}", inner),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CallError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CallError::Inner(inner) => Some(inner),
            _ => None,
        }
    }
}
