//! # Processing Context
//!
//! Per-message mutable state. A context carries the message's own data
//! (operation, headers, properties) together with the execution machinery the
//! engine drives: the snapshot of phases chosen for this message, the phase
//! and handler cursors, the history of handlers that ran, the pause flag and
//! the failure cause.
//!
//! Cursors, history and the pause flag are only mutated by the engine and by
//! phases. Handlers read and write message data.

pub mod checkpoint;
pub mod exchange;

pub use checkpoint::{ExecutedRecord, ExecutionCheckpoint};
pub use exchange::{ExchangeContext, ExchangePattern, MessageLabel};

use crate::error::EngineError;
use crate::orchestration::{DeliveryCallback, Handler, Phase, TransportSender};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Direction and category of a message's traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    In,
    Out,
    InFault,
    OutFault,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::In => "in",
            Flow::Out => "out",
            Flow::InFault => "in_fault",
            Flow::OutFault => "out_fault",
        }
    }

    pub fn is_inbound(&self) -> bool {
        matches!(self, Flow::In | Flow::InFault)
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protocol extension header carried by the message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderBlock {
    pub name: String,
    /// Targeted role; `None` targets the ultimate receiver
    pub role: Option<String>,
    pub must_understand: bool,
    pub processed: bool,
}

impl HeaderBlock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: None,
            must_understand: false,
            processed: false,
        }
    }

    pub fn mandatory(name: impl Into<String>) -> Self {
        Self {
            must_understand: true,
            ..Self::new(name)
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// One entry of the executed history
#[derive(Clone)]
pub struct ExecutedHandler {
    phase: String,
    handler: Arc<dyn Handler>,
}

impl ExecutedHandler {
    pub fn phase(&self) -> &str {
        &self.phase
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    pub fn handler_name(&self) -> &str {
        self.handler.name()
    }
}

impl fmt::Debug for ExecutedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.phase, self.handler.name())
    }
}

#[derive(Clone)]
pub struct ProcessingContext {
    message_id: Uuid,
    flow: Flow,
    current_phase_index: usize,
    current_handler_index: usize,
    execution_chain: Vec<Arc<Phase>>,
    executed: Vec<ExecutedHandler>,
    paused: bool,
    failure_cause: Option<EngineError>,
    exchange: Option<Arc<ExchangeContext>>,
    transport_sender: Option<Arc<dyn TransportSender>>,
    delivery_callback: Option<Arc<dyn DeliveryCallback>>,

    /// Operation resolved for this message
    pub operation: Option<String>,
    pub action: Option<String>,
    pub headers: Vec<HeaderBlock>,
    pub properties: HashMap<String, Value>,
    /// The message itself is a fault
    pub is_fault: bool,
    /// A fault was raised while processing the related request
    pub processing_fault: bool,
    pub server_side: bool,
    /// Deliver outbound messages on the worker pool without waiting
    pub fire_and_forget: bool,
}

impl Default for ProcessingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingContext {
    pub fn new() -> Self {
        Self {
            message_id: Uuid::new_v4(),
            flow: Flow::In,
            current_phase_index: 0,
            current_handler_index: 0,
            execution_chain: Vec::new(),
            executed: Vec::new(),
            paused: false,
            failure_cause: None,
            exchange: None,
            transport_sender: None,
            delivery_callback: None,
            operation: None,
            action: None,
            headers: Vec::new(),
            properties: HashMap::new(),
            is_fault: false,
            processing_fault: false,
            server_side: false,
            fire_and_forget: false,
        }
    }

    /// Context for a message arriving at a service
    pub fn server() -> Self {
        Self {
            server_side: true,
            ..Self::new()
        }
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_header(mut self, header: HeaderBlock) -> Self {
        self.headers.push(header);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_exchange(mut self, exchange: Arc<ExchangeContext>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    pub fn with_transport_sender(mut self, sender: Arc<dyn TransportSender>) -> Self {
        self.transport_sender = Some(sender);
        self
    }

    pub fn with_delivery_callback(mut self, callback: Arc<dyn DeliveryCallback>) -> Self {
        self.delivery_callback = Some(callback);
        self
    }

    pub fn with_fire_and_forget(mut self) -> Self {
        self.fire_and_forget = true;
        self
    }

    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    pub fn flow(&self) -> Flow {
        self.flow
    }

    pub fn current_phase_index(&self) -> usize {
        self.current_phase_index
    }

    pub fn current_handler_index(&self) -> usize {
        self.current_handler_index
    }

    pub fn execution_chain(&self) -> &[Arc<Phase>] {
        &self.execution_chain
    }

    pub fn execution_chain_names(&self) -> Vec<String> {
        self.execution_chain
            .iter()
            .map(|phase| phase.name().to_string())
            .collect()
    }

    pub fn executed(&self) -> &[ExecutedHandler] {
        &self.executed
    }

    pub fn executed_names(&self) -> Vec<String> {
        self.executed
            .iter()
            .map(|entry| entry.handler_name().to_string())
            .collect()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn failure_cause(&self) -> Option<&EngineError> {
        self.failure_cause.as_ref()
    }

    pub fn exchange(&self) -> Option<&Arc<ExchangeContext>> {
        self.exchange.as_ref()
    }

    pub fn transport_sender(&self) -> Option<&Arc<dyn TransportSender>> {
        self.transport_sender.as_ref()
    }

    pub fn delivery_callback(&self) -> Option<&Arc<dyn DeliveryCallback>> {
        self.delivery_callback.as_ref()
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: Value) {
        self.properties.insert(key.into(), value);
    }

    pub fn header(&self, name: &str) -> Option<&HeaderBlock> {
        self.headers.iter().find(|h| h.name == name)
    }

    /// Mark every header with this name processed; returns whether one existed
    pub fn mark_header_processed(&mut self, name: &str) -> bool {
        let mut found = false;
        for header in self.headers.iter_mut().filter(|h| h.name == name) {
            header.processed = true;
            found = true;
        }
        found
    }

    /// Serializable snapshot of the context's progress and message data
    pub fn checkpoint(&self) -> ExecutionCheckpoint {
        ExecutionCheckpoint {
            message_id: self.message_id,
            flow: self.flow,
            chain: self.execution_chain_names(),
            current_phase_index: self.current_phase_index,
            current_handler_index: self.current_handler_index,
            executed: self
                .executed
                .iter()
                .map(|entry| ExecutedRecord {
                    phase: entry.phase.clone(),
                    handler: entry.handler_name().to_string(),
                })
                .collect(),
            operation: self.operation.clone(),
            action: self.action.clone(),
            headers: self.headers.clone(),
            properties: self.properties.clone(),
            paused: self.paused,
            is_fault: self.is_fault,
            processing_fault: self.processing_fault,
            server_side: self.server_side,
            fire_and_forget: self.fire_and_forget,
            created_at: Utc::now(),
        }
    }

    pub(crate) fn from_checkpoint(
        checkpoint: ExecutionCheckpoint,
        chain: Vec<Arc<Phase>>,
        executed: Vec<(String, Arc<dyn Handler>)>,
    ) -> Self {
        Self {
            message_id: checkpoint.message_id,
            flow: checkpoint.flow,
            current_phase_index: checkpoint.current_phase_index,
            current_handler_index: checkpoint.current_handler_index,
            execution_chain: chain,
            executed: executed
                .into_iter()
                .map(|(phase, handler)| ExecutedHandler { phase, handler })
                .collect(),
            paused: checkpoint.paused,
            operation: checkpoint.operation,
            action: checkpoint.action,
            headers: checkpoint.headers,
            properties: checkpoint.properties,
            is_fault: checkpoint.is_fault,
            processing_fault: checkpoint.processing_fault,
            server_side: checkpoint.server_side,
            fire_and_forget: checkpoint.fire_and_forget,
            ..Self::new()
        }
    }

    /// Start a new traversal: tag the flow and snapshot its chain. The
    /// executed history is kept so one completion sweep covers every stage.
    pub(crate) fn reset_execution(&mut self, flow: Flow, chain: Vec<Arc<Phase>>) {
        self.flow = flow;
        self.execution_chain = chain;
        self.current_phase_index = 0;
        self.current_handler_index = 0;
    }

    /// Append phases to this message's chain only
    pub fn extend_execution_chain(&mut self, phases: impl IntoIterator<Item = Arc<Phase>>) {
        self.execution_chain.extend(phases);
    }

    pub(crate) fn current_phase(&self) -> Option<Arc<Phase>> {
        self.execution_chain.get(self.current_phase_index).cloned()
    }

    pub(crate) fn advance_phase(&mut self) {
        self.current_phase_index += 1;
        self.current_handler_index = 0;
    }

    pub(crate) fn set_current_handler_index(&mut self, index: usize) {
        self.current_handler_index = index;
    }

    pub(crate) fn record_executed(&mut self, phase: &str, handler: Arc<dyn Handler>) {
        self.executed.push(ExecutedHandler {
            phase: phase.to_string(),
            handler,
        });
    }

    pub(crate) fn take_executed(&mut self) -> Vec<ExecutedHandler> {
        std::mem::take(&mut self.executed)
    }

    pub(crate) fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Keep the first failure; later ones do not overwrite it
    pub(crate) fn record_failure(&mut self, error: &EngineError) {
        if self.failure_cause.is_none() {
            self.failure_cause = Some(error.clone());
        }
    }

    /// Copy handed to the delivery pool, without execution history
    pub(crate) fn delivery_snapshot(&self) -> Self {
        Self {
            executed: Vec::new(),
            ..self.clone()
        }
    }
}

impl fmt::Debug for ProcessingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingContext")
            .field("message_id", &self.message_id)
            .field("flow", &self.flow)
            .field("current_phase_index", &self.current_phase_index)
            .field("current_handler_index", &self.current_handler_index)
            .field("execution_chain", &self.execution_chain_names())
            .field("executed", &self.executed)
            .field("paused", &self.paused)
            .field("failure_cause", &self.failure_cause)
            .field("operation", &self.operation)
            .field("server_side", &self.server_side)
            .finish()
    }
}
