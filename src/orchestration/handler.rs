//! # Handler Capability
//!
//! The single polymorphic seam every processing unit implements. Handlers are
//! shared across concurrently processed messages, so all per-message state
//! lives in the [`ProcessingContext`] passed to each call.

use crate::context::ProcessingContext;
use crate::error::{EngineError, HandlerError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome of invoking a handler, a phase, or a whole flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationResponse {
    /// Proceed to the next handler
    Continue,
    /// Stop here and keep the cursor for a later resume
    Suspend,
    /// Stop processing; completion callbacks still run
    Abort,
}

impl InvocationResponse {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Suspend => "suspend",
            Self::Abort => "abort",
        }
    }
}

impl fmt::Display for InvocationResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvocationResponse {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" => Ok(Self::Continue),
            "suspend" => Ok(Self::Suspend),
            "abort" => Ok(Self::Abort),
            _ => Err(EngineError::unrecognized_response("invocation response", s)),
        }
    }
}

/// A named unit of message processing.
///
/// `flow_complete` is called exactly once for every `invoke` that ran, in
/// reverse invocation order, whether the flow succeeded, aborted or failed.
#[async_trait::async_trait]
pub trait Handler: Send + Sync {
    /// Name, unique within the owning phase
    fn name(&self) -> &str;

    async fn invoke(
        &self,
        ctx: &mut ProcessingContext,
    ) -> Result<InvocationResponse, HandlerError>;

    /// Completion notification; must not fail
    async fn flow_complete(&self, _ctx: &mut ProcessingContext) {}
}

impl fmt::Debug for dyn Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("name", &self.name()).finish()
    }
}
