use crate::context::ProcessingContext;
use crate::error::HandlerError;
use crate::orchestration::{Handler, InvocationResponse};
use crate::registry::OperationRegistry;
use std::sync::Arc;
use tracing::debug;

/// Resolves the target operation from the message action.
///
/// Leaves the context untouched when an operation is already set or the
/// action is unknown; the dispatch phase's post-conditions decide whether an
/// unresolved message is a fault.
pub struct DispatchHandler {
    name: String,
    operations: Arc<OperationRegistry>,
}

impl DispatchHandler {
    pub fn new(name: impl Into<String>, operations: Arc<OperationRegistry>) -> Self {
        Self {
            name: name.into(),
            operations,
        }
    }
}

#[async_trait::async_trait]
impl Handler for DispatchHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        ctx: &mut ProcessingContext,
    ) -> Result<InvocationResponse, HandlerError> {
        if ctx.operation.is_some() {
            return Ok(InvocationResponse::Continue);
        }

        if let Some(action) = ctx.action.as_deref() {
            if let Some(operation) = self.operations.find_by_action(action) {
                debug!(
                    message_id = %ctx.message_id(),
                    action = %action,
                    operation = %operation.name,
                    "Operation dispatched by action"
                );
                ctx.operation = Some(operation.name.clone());
            }
        }

        Ok(InvocationResponse::Continue)
    }
}
