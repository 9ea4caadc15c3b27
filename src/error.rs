use std::time::Duration;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "config.chunk_size")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "http_worker", "dispatcher")
    pub source: Option<String>,
    /// Index of the batch the error belongs to, when there is one.
    pub batch_index: Option<usize>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
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

    pub fn with_batch_index(mut self, index: usize) -> Self {
        self.batch_index = Some(index);
        self
    }
}

/// Which part of a remote call ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    Connect,
    Request,
    Read,
}

impl std::fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TimeoutPhase::Connect => "connect",
            TimeoutPhase::Request => "request",
            TimeoutPhase::Read => "read",
        };
        f.write_str(s)
    }
}

/// Unified error type for batch dispatch.
///
/// Per-attempt failures (`Timeout`, `Transport`, `RemoteStatus`, `Decode`) are retryable and
/// are absorbed by the retry wrapper; `RetryExhausted` ends the whole dispatch.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Timeout during {phase} phase{}", format_after(.after))]
    Timeout {
        phase: TimeoutPhase,
        after: Option<Duration>,
    },

    #[error("Network transport error: {message}{}", format_context(.context))]
    Transport {
        message: String,
        context: ErrorContext,
    },

    #[error("Remote error: HTTP {status}: {body}")]
    RemoteStatus { status: u16, body: String },

    #[error("Decode error: {message}{}", format_context(.context))]
    Decode {
        message: String,
        context: ErrorContext,
    },

    #[error("processing failed after retries (batch {index}, {attempts} attempts)")]
    RetryExhausted {
        index: usize,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },
}

fn format_after(after: &Option<Duration>) -> String {
    match after {
        Some(d) => format!(" after {}ms", d.as_millis()),
        None => String::new(),
    }
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
    if let Some(index) = ctx.batch_index {
        parts.push(format!("batch: {}", index));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::configuration_with_context(msg, ErrorContext::new())
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::runtime_with_context(msg, ErrorContext::new())
    }

    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    pub fn transport_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Transport {
            message: msg.into(),
            context,
        }
    }

    pub fn decode_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Decode {
            message: msg.into(),
            context,
        }
    }

    /// Whether the retry wrapper may attempt the call again.
    ///
    /// Every remote status is retryable, client errors included.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. }
                | Error::Transport { .. }
                | Error::RemoteStatus { .. }
                | Error::Decode { .. }
        )
    }

    /// Batch index the error is attributed to, if any.
    pub fn batch_index(&self) -> Option<usize> {
        match self {
            Error::RetryExhausted { index, .. } => Some(*index),
            _ => self.context().and_then(|c| c.batch_index),
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Transport { context, .. }
            | Error::Decode { context, .. }
            | Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }
}
