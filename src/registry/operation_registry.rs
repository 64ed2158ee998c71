//! Operation descriptors and the concurrent operation table.

use crate::context::{ExchangePattern, Flow};
use crate::error::{EngineError, EngineResult};
use crate::orchestration::{MessageReceiver, Phase};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// A service operation: its operation-specific phases per flow and the
/// business-logic receiver inbound messages are delivered to.
#[derive(Clone)]
pub struct OperationDescriptor {
    pub name: String,
    pub action: Option<String>,
    pub exchange_pattern: ExchangePattern,
    pub in_phases: Vec<Arc<Phase>>,
    pub out_phases: Vec<Arc<Phase>>,
    pub in_fault_phases: Vec<Arc<Phase>>,
    pub out_fault_phases: Vec<Arc<Phase>>,
    pub receiver: Option<Arc<dyn MessageReceiver>>,
}

impl OperationDescriptor {
    pub fn new(name: impl Into<String>, exchange_pattern: ExchangePattern) -> Self {
        Self {
            name: name.into(),
            action: None,
            exchange_pattern,
            in_phases: Vec::new(),
            out_phases: Vec::new(),
            in_fault_phases: Vec::new(),
            out_fault_phases: Vec::new(),
            receiver: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_receiver(mut self, receiver: Arc<dyn MessageReceiver>) -> Self {
        self.receiver = Some(receiver);
        self
    }

    pub fn with_phases(mut self, flow: Flow, phases: Vec<Phase>) -> Self {
        let phases = phases.into_iter().map(Arc::new).collect();
        match flow {
            Flow::In => self.in_phases = phases,
            Flow::Out => self.out_phases = phases,
            Flow::InFault => self.in_fault_phases = phases,
            Flow::OutFault => self.out_fault_phases = phases,
        }
        self
    }

    /// Operation-specific phases for a flow
    pub fn phases(&self, flow: Flow) -> &[Arc<Phase>] {
        match flow {
            Flow::In => &self.in_phases,
            Flow::Out => &self.out_phases,
            Flow::InFault => &self.in_fault_phases,
            Flow::OutFault => &self.out_fault_phases,
        }
    }
}

impl fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |phases: &[Arc<Phase>]| {
            phases
                .iter()
                .map(|p| p.name().to_string())
                .collect::<Vec<_>>()
        };
        f.debug_struct("OperationDescriptor")
            .field("name", &self.name)
            .field("action", &self.action)
            .field("exchange_pattern", &self.exchange_pattern)
            .field("in_phases", &names(&self.in_phases))
            .field("out_phases", &names(&self.out_phases))
            .field("in_fault_phases", &names(&self.in_fault_phases))
            .field("out_fault_phases", &names(&self.out_fault_phases))
            .field(
                "receiver",
                &self.receiver.as_ref().map(|r| r.name().to_string()),
            )
            .finish()
    }
}

/// Concurrent table of registered operations, indexed by name and action
#[derive(Debug, Default)]
pub struct OperationRegistry {
    operations: DashMap<String, Arc<OperationDescriptor>>,
    actions: DashMap<String, String>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, descriptor: OperationDescriptor) -> EngineResult<Arc<OperationDescriptor>> {
        if self.operations.contains_key(&descriptor.name) {
            return Err(EngineError::configuration(
                format!("operation '{}'", descriptor.name),
                "already registered",
            ));
        }
        if let Some(action) = &descriptor.action {
            if let Some(owner) = self.actions.get(action) {
                return Err(EngineError::configuration(
                    format!("operation '{}'", descriptor.name),
                    format!("action '{action}' already mapped to '{}'", owner.value()),
                ));
            }
        }

        let descriptor = Arc::new(descriptor);
        if let Some(action) = &descriptor.action {
            self.actions.insert(action.clone(), descriptor.name.clone());
        }
        self.operations
            .insert(descriptor.name.clone(), Arc::clone(&descriptor));

        info!(
            operation = %descriptor.name,
            action = descriptor.action.as_deref().unwrap_or(""),
            pattern = ?descriptor.exchange_pattern,
            "Operation registered"
        );
        Ok(descriptor)
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<OperationDescriptor>> {
        let (_, descriptor) = self.operations.remove(name)?;
        if let Some(action) = &descriptor.action {
            self.actions.remove(action);
        }
        Some(descriptor)
    }

    pub fn get(&self, name: &str) -> Option<Arc<OperationDescriptor>> {
        self.operations.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn find_by_action(&self, action: &str) -> Option<Arc<OperationDescriptor>> {
        let name = self.actions.get(action)?.value().clone();
        self.get(&name)
    }

    /// The only registered operation, if exactly one exists
    pub fn single(&self) -> Option<Arc<OperationDescriptor>> {
        if self.operations.len() != 1 {
            return None;
        }
        self.operations
            .iter()
            .next()
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.operations.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
