//! Post-conditions of the dispatch phase.
//!
//! Once the dispatch phase's handlers have run, an operation must be known.
//! Its operation-specific inbound phases are then appended to the message's
//! own execution chain, so the rest of the inbound traversal runs them.

use super::phase::PhaseConditions;
use crate::context::{Flow, ProcessingContext};
use crate::error::{EngineError, EngineResult};
use crate::registry::OperationRegistry;
use std::sync::Arc;
use tracing::debug;

pub struct DispatchConditions {
    operations: Arc<OperationRegistry>,
    single_operation_fallback: bool,
}

impl DispatchConditions {
    pub fn new(operations: Arc<OperationRegistry>, single_operation_fallback: bool) -> Self {
        Self {
            operations,
            single_operation_fallback,
        }
    }
}

impl PhaseConditions for DispatchConditions {
    fn check_postconditions(&self, phase: &str, ctx: &mut ProcessingContext) -> EngineResult<()> {
        let operation = match ctx.operation.as_deref() {
            Some(name) => self.operations.get(name).ok_or_else(|| {
                EngineError::unresolved_chain(
                    format!("operation '{name}'"),
                    "operation is not registered",
                )
            })?,
            None if self.single_operation_fallback => {
                self.operations.single().ok_or_else(|| {
                    EngineError::unresolved_chain(
                        format!("message {}", ctx.message_id()),
                        "no operation resolved and no single operation to fall back to",
                    )
                })?
            }
            None => {
                return Err(EngineError::unresolved_chain(
                    format!("message {}", ctx.message_id()),
                    format!("no operation resolved by phase '{phase}'"),
                ))
            }
        };

        let remaining = match ctx.flow() {
            Flow::InFault => operation.in_fault_phases.clone(),
            _ => operation.in_phases.clone(),
        };

        debug!(
            message_id = %ctx.message_id(),
            operation = %operation.name,
            appended_phases = remaining.len(),
            "Dispatch resolved operation"
        );

        ctx.operation = Some(operation.name.clone());
        ctx.extend_execution_chain(remaining);
        Ok(())
    }
}
