//! # Registry
//!
//! Configuration collaborators consumed by the engine: the global phase
//! lists per flow, registered operations, and the default transport sender.
//! [`ChainProvider`] is the seam the engine reads them through.

pub mod engine_registry;
pub mod operation_registry;

pub use engine_registry::EngineRegistry;
pub use operation_registry::{OperationDescriptor, OperationRegistry};

use crate::context::Flow;
use crate::error::{EngineError, EngineResult};
use crate::orchestration::{Phase, TransportSender};
use std::sync::Arc;

/// Source of the ordered phases a message runs through
pub trait ChainProvider: Send + Sync {
    /// Global phases of a flow, in order
    fn global_phases(&self, flow: Flow) -> Vec<Arc<Phase>>;

    fn operation(&self, name: &str) -> Option<Arc<OperationDescriptor>>;

    /// Default outbound sink
    fn transport_sender(&self) -> Option<Arc<dyn TransportSender>>;

    /// Operation-specific phases of a flow
    fn operation_phases(&self, flow: Flow, operation: &str) -> EngineResult<Vec<Arc<Phase>>> {
        let descriptor = self.operation(operation).ok_or_else(|| {
            EngineError::unresolved_chain(
                format!("operation '{operation}'"),
                "operation is not registered",
            )
        })?;
        Ok(descriptor.phases(flow).to_vec())
    }
}
