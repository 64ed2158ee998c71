use crate::context::ProcessingContext;
use crate::error::HandlerError;
use crate::orchestration::{Handler, InvocationResponse};
use tracing::info;

/// Traces every message passing through its slot
#[derive(Debug, Clone)]
pub struct LoggingHandler {
    name: String,
}

impl LoggingHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait::async_trait]
impl Handler for LoggingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        ctx: &mut ProcessingContext,
    ) -> Result<InvocationResponse, HandlerError> {
        info!(
            handler = %self.name,
            message_id = %ctx.message_id(),
            flow = %ctx.flow(),
            operation = ctx.operation.as_deref().unwrap_or(""),
            action = ctx.action.as_deref().unwrap_or(""),
            headers = ctx.headers.len(),
            "📨 MESSAGE: passing through"
        );
        Ok(InvocationResponse::Continue)
    }

    async fn flow_complete(&self, ctx: &mut ProcessingContext) {
        info!(
            handler = %self.name,
            message_id = %ctx.message_id(),
            flow = %ctx.flow(),
            failed = ctx.failure_cause().is_some(),
            "📨 MESSAGE: flow complete"
        );
    }
}
