#![allow(dead_code)]

pub mod strategies;

use parking_lot::Mutex;
use phase_engine::config::EngineConfig;
use phase_engine::context::{ExchangePattern, Flow, ProcessingContext};
use phase_engine::error::{EngineError, EngineResult, HandlerError};
use phase_engine::orchestration::{
    DeliveryCallback, Engine, Handler, InvocationResponse, MessageReceiver, Phase, PhaseRule,
    TransportSender,
};
use phase_engine::registry::{EngineRegistry, OperationDescriptor};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Ordered log of everything test doubles observed
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Entries starting with `prefix`, with the prefix stripped
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .filter_map(|entry| entry.strip_prefix(prefix).map(str::to_string))
            .collect()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == entry).count()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

pub enum Behavior {
    Continue,
    Suspend,
    /// Suspend on the first invocation only
    SuspendOnce(AtomicBool),
    Abort,
    Fail(HandlerError),
    Increment(Arc<AtomicUsize>),
    ClaimHeader(String),
}

impl Behavior {
    pub fn suspend_once() -> Self {
        Behavior::SuspendOnce(AtomicBool::new(false))
    }
}

/// Handler recording `invoke:<name>` and `complete:<name>` into a journal
pub struct RecordingHandler {
    name: String,
    behavior: Behavior,
    journal: Journal,
}

impl RecordingHandler {
    pub fn new(name: &str, behavior: Behavior, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            behavior,
            journal: journal.clone(),
        })
    }

    pub fn continuing(name: &str, journal: &Journal) -> Arc<Self> {
        Self::new(name, Behavior::Continue, journal)
    }
}

#[async_trait::async_trait]
impl Handler for RecordingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        ctx: &mut ProcessingContext,
    ) -> Result<InvocationResponse, HandlerError> {
        self.journal.push(format!("invoke:{}", self.name));
        match &self.behavior {
            Behavior::Continue => Ok(InvocationResponse::Continue),
            Behavior::Suspend => Ok(InvocationResponse::Suspend),
            Behavior::SuspendOnce(done) => {
                if done.swap(true, Ordering::SeqCst) {
                    Ok(InvocationResponse::Continue)
                } else {
                    Ok(InvocationResponse::Suspend)
                }
            }
            Behavior::Abort => Ok(InvocationResponse::Abort),
            Behavior::Fail(err) => Err(err.clone()),
            Behavior::Increment(counter) => {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(InvocationResponse::Continue)
            }
            Behavior::ClaimHeader(header) => {
                ctx.mark_header_processed(header);
                Ok(InvocationResponse::Continue)
            }
        }
    }

    async fn flow_complete(&self, _ctx: &mut ProcessingContext) {
        self.journal.push(format!("complete:{}", self.name));
    }
}

/// Business receiver counting deliveries
pub struct RecordingReceiver {
    journal: Journal,
    defers: bool,
    fail: bool,
    pub received: AtomicUsize,
}

impl RecordingReceiver {
    pub fn new(journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            journal: journal.clone(),
            defers: false,
            fail: false,
            received: AtomicUsize::new(0),
        })
    }

    pub fn deferring(journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            journal: journal.clone(),
            defers: true,
            fail: false,
            received: AtomicUsize::new(0),
        })
    }

    pub fn failing(journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            journal: journal.clone(),
            defers: false,
            fail: true,
            received: AtomicUsize::new(0),
        })
    }

    pub fn count(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MessageReceiver for RecordingReceiver {
    fn name(&self) -> &str {
        "recording-receiver"
    }

    fn defers_must_understand(&self) -> bool {
        self.defers
    }

    async fn receive(&self, _ctx: &mut ProcessingContext) -> EngineResult<()> {
        self.received.fetch_add(1, Ordering::SeqCst);
        self.journal.push("receive");
        if self.fail {
            return Err(EngineError::delivery("recording-receiver", "backend unavailable"));
        }
        Ok(())
    }
}

/// Transport sender that can be held open, or made to fail
pub struct RecordingSender {
    journal: Journal,
    fail: bool,
    gate: Option<Arc<Notify>>,
    pub delivered: AtomicUsize,
}

impl RecordingSender {
    pub fn new(journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            journal: journal.clone(),
            fail: false,
            gate: None,
            delivered: AtomicUsize::new(0),
        })
    }

    pub fn failing(journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            journal: journal.clone(),
            fail: true,
            gate: None,
            delivered: AtomicUsize::new(0),
        })
    }

    /// Sender whose deliveries block until `gate` is notified
    pub fn gated(journal: &Journal, gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            journal: journal.clone(),
            fail: false,
            gate: Some(gate),
            delivered: AtomicUsize::new(0),
        })
    }

    pub fn count(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TransportSender for RecordingSender {
    fn name(&self) -> &str {
        "recording-sender"
    }

    async fn deliver(&self, ctx: &ProcessingContext) -> EngineResult<()> {
        self.journal.push(format!("deliver:{}", ctx.flow()));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail {
            return Err(EngineError::delivery("recording-sender", "connection refused"));
        }
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingCallback {
    pub journal: Journal,
}

impl DeliveryCallback for RecordingCallback {
    fn on_error(&self, error: &EngineError) {
        self.journal.push(format!("on_error:{error}"));
    }

    fn on_complete(&self) {
        self.journal.push("on_complete");
    }
}

pub const OPERATION: &str = "placeOrder";

/// Engine over the default phase layout with one registered operation
pub struct Harness {
    pub registry: Arc<EngineRegistry>,
    pub engine: Engine,
    pub journal: Journal,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let registry = Arc::new(EngineRegistry::from_config(&config).unwrap());
        let engine = Engine::new(registry.clone(), &config);
        Self {
            registry,
            engine,
            journal: Journal::new(),
        }
    }

    pub fn handler(&self, flow: Flow, phase: &str, handler: Arc<dyn Handler>) {
        self.registry
            .add_handler(flow, phase, handler, PhaseRule::default())
            .unwrap();
    }

    pub fn register(&self, descriptor: OperationDescriptor) {
        self.registry.register_operation(descriptor).unwrap();
    }

    /// Register the default operation delivering to `receiver`
    pub fn register_with_receiver(&self, receiver: Arc<dyn MessageReceiver>) {
        self.register(
            OperationDescriptor::new(OPERATION, ExchangePattern::InOut).with_receiver(receiver),
        );
    }

    pub fn inbound(&self) -> ProcessingContext {
        ProcessingContext::server().with_operation(OPERATION)
    }

    pub fn outbound(&self) -> ProcessingContext {
        ProcessingContext::new().with_operation(OPERATION)
    }
}

/// Phase holding the given handlers in order
pub fn phase_of(name: &str, handlers: Vec<Arc<dyn Handler>>) -> Phase {
    let mut phase = Phase::new(name);
    for handler in handlers {
        phase.add_handler(handler).unwrap();
    }
    phase
}
