//! # Engine Errors
//!
//! Structured error types for chain building and message processing.
//!
//! Configuration-time failures (`Configuration`) are raised while phases and
//! flows are assembled, before any message runs. Everything else is raised
//! while a message traverses its chain, and always after the completion sweep
//! for the handlers that already ran.

use thiserror::Error;

/// Failure raised by a single handler's `invoke`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    /// Human readable description of the failure
    pub message: String,

    /// Optional protocol fault code (e.g. `Client`, `Server`, `MustUnderstand`)
    pub fault_code: Option<String>,

    /// Application faults are expected business outcomes and are not logged as errors
    pub application_fault: bool,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fault_code: None,
            application_fault: false,
        }
    }

    /// A fault caused by the content of the message itself
    pub fn client(message: impl Into<String>) -> Self {
        Self::new(message).with_fault_code(crate::constants::fault_codes::CLIENT)
    }

    /// A business-level fault raised by application code
    pub fn application(message: impl Into<String>) -> Self {
        Self {
            application_fault: true,
            ..Self::new(message)
        }
    }

    pub fn with_fault_code(mut self, code: impl Into<String>) -> Self {
        self.fault_code = Some(code.into());
        self
    }
}

/// Crate-wide error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Cyclic or contradictory ordering constraints, incompatible redeployment,
    /// duplicate first/last claims
    #[error("Configuration error: {component}: {reason}")]
    Configuration { component: String, reason: String },

    /// No chain or operation could be determined for a message
    #[error("No chain resolvable for {target}: {reason}")]
    UnresolvedChain { target: String, reason: String },

    /// A handler failed during traversal
    #[error("Processing fault in handler '{handler}' of phase '{phase}': {source}")]
    ProcessingFault {
        phase: String,
        handler: String,
        source: HandlerError,
    },

    /// An invocation result outside continue/suspend/abort
    #[error("Unrecognized invocation response '{value}' encountered in {context}")]
    UnrecognizedResponse { context: String, value: String },

    /// The chain completed but there was nothing to deliver to
    #[error("No terminal sink available for {flow} flow: {reason}")]
    MissingTerminalSink { flow: String, reason: String },

    /// A mandatory extension header was not processed by any handler
    #[error("Mandatory header '{header}' was not understood")]
    MustUnderstand { header: String },

    /// A terminal receiver or transport sender failed
    #[error("Delivery through {sink} failed: {reason}")]
    Delivery { sink: String, reason: String },

    /// Operation not valid for the current context state
    #[error("Invalid context state: {reason}")]
    InvalidState { reason: String },
}

impl EngineError {
    /// Create a configuration error
    pub fn configuration(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            component: component.into(),
            reason: reason.into(),
        }
    }

    /// Create an unresolved chain error
    pub fn unresolved_chain(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnresolvedChain {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a handler failure with its position in the chain
    pub fn processing_fault(
        phase: impl Into<String>,
        handler: impl Into<String>,
        source: HandlerError,
    ) -> Self {
        Self::ProcessingFault {
            phase: phase.into(),
            handler: handler.into(),
            source,
        }
    }

    /// Create an unrecognized response error
    pub fn unrecognized_response(context: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UnrecognizedResponse {
            context: context.into(),
            value: value.into(),
        }
    }

    /// Create a missing terminal sink error
    pub fn missing_terminal_sink(flow: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MissingTerminalSink {
            flow: flow.into(),
            reason: reason.into(),
        }
    }

    /// Create a delivery error
    pub fn delivery(sink: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Delivery {
            sink: sink.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }

    /// Whether this fault is an expected application-level outcome
    pub fn is_application_fault(&self) -> bool {
        matches!(
            self,
            Self::ProcessingFault { source, .. } if source.application_fault
        )
    }

    /// Protocol fault code to report to the peer, if any
    pub fn fault_code(&self) -> Option<&str> {
        match self {
            Self::ProcessingFault { source, .. } => source.fault_code.as_deref(),
            Self::MustUnderstand { .. } => Some(crate::constants::fault_codes::MUST_UNDERSTAND),
            Self::UnresolvedChain { .. } => Some(crate::constants::fault_codes::CLIENT),
            _ => None,
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
