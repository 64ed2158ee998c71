//! Terminal sinks and delivery notifications.
//!
//! A [`MessageReceiver`] consumes a fully processed inbound message and a
//! [`TransportSender`] physically delivers an outbound one. Both run only after
//! every phase returned continue.

use crate::context::ProcessingContext;
use crate::error::{EngineError, EngineResult};

/// Business-logic sink for the inbound flow
#[async_trait::async_trait]
pub trait MessageReceiver: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this receiver takes over the must-understand obligation for
    /// headers no handler processed
    fn defers_must_understand(&self) -> bool {
        false
    }

    async fn receive(&self, ctx: &mut ProcessingContext) -> EngineResult<()>;
}

/// Outbound delivery sink
#[async_trait::async_trait]
pub trait TransportSender: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, ctx: &ProcessingContext) -> EngineResult<()>;
}

/// Receives the outcome of a fire-and-forget delivery the caller did not wait for
pub trait DeliveryCallback: Send + Sync {
    fn on_error(&self, error: &EngineError);

    fn on_complete(&self);
}
