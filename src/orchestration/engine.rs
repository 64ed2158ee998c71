//! # Engine
//!
//! Drives whole-message lifecycles across phase chains:
//!
//! - `receive` runs the inbound (or inbound fault) chain, checks mandatory
//!   headers and delivers to the operation's receiver.
//! - `send` runs the operation's outbound phases followed by the global
//!   outbound phases and hands the message to a transport sender, optionally
//!   on the delivery pool.
//! - `send_fault` runs the operation-level fault chain, then the global fault
//!   chain, then delivers.
//! - `resume` continues a suspended message from its preserved cursors.
//!
//! Every handler recorded in the context's executed history receives exactly
//! one completion callback, in reverse order, whatever the outcome, except
//! when the flow suspends: completion then waits for the resumed flow to end.

use super::handler::InvocationResponse;
use super::sink::{MessageReceiver, TransportSender};
use crate::config::EngineConfig;
use crate::constants::{properties, roles};
use crate::context::{
    ExchangePattern, ExecutionCheckpoint, Flow, MessageLabel, ProcessingContext,
};
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEventKind, EventPublisher};
use crate::execution::DeliveryPool;
use crate::logging::{log_error, log_flow_operation};
use crate::orchestration::{Handler, Phase};
use crate::registry::ChainProvider;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct Engine {
    provider: Arc<dyn ChainProvider>,
    pool: DeliveryPool,
    events: EventPublisher,
    roles: HashSet<String>,
}

impl Engine {
    pub fn new(provider: Arc<dyn ChainProvider>, config: &EngineConfig) -> Self {
        Self::with_components(
            provider,
            DeliveryPool::from_config(&config.worker_pool),
            EventPublisher::new(config.events.channel_capacity),
            config.engine.roles.iter().cloned(),
        )
    }

    pub fn with_components(
        provider: Arc<dyn ChainProvider>,
        pool: DeliveryPool,
        events: EventPublisher,
        roles: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            provider,
            pool,
            events,
            roles: roles.into_iter().collect(),
        }
    }

    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    pub fn delivery_pool(&self) -> &DeliveryPool {
        &self.pool
    }

    /// Process an inbound message
    pub async fn receive(&self, ctx: &mut ProcessingContext) -> EngineResult<InvocationResponse> {
        Self::ensure_not_paused(ctx)?;
        let flow = if ctx.is_fault || ctx.processing_fault {
            Flow::InFault
        } else {
            Flow::In
        };
        ctx.reset_execution(flow, self.provider.global_phases(flow));
        self.log_start("receive", ctx);

        self.drive_receive(ctx, false).await
    }

    /// Process an outbound message
    pub async fn send(&self, ctx: &mut ProcessingContext) -> EngineResult<InvocationResponse> {
        Self::ensure_not_paused(ctx)?;
        let chain = match self.outbound_chain(ctx, Flow::Out) {
            Ok(chain) => chain,
            Err(err) => {
                ctx.record_failure(&err);
                return Err(err);
            }
        };
        ctx.reset_execution(Flow::Out, chain);
        self.log_start("send", ctx);

        self.drive_send(ctx, false).await
    }

    /// Process an outbound fault: the operation-level fault chain first, then
    /// the global fault chain.
    pub async fn send_fault(&self, ctx: &mut ProcessingContext) -> EngineResult<InvocationResponse> {
        Self::ensure_not_paused(ctx)?;
        if let Some(operation) = ctx.operation.clone() {
            let chain = match self.provider.operation_phases(Flow::OutFault, &operation) {
                Ok(chain) => chain,
                Err(err) => {
                    ctx.record_failure(&err);
                    return Err(err);
                }
            };
            ctx.reset_execution(Flow::OutFault, chain);
            self.log_start("send_fault", ctx);

            match self.invoke_phases(ctx, false).await {
                Ok(InvocationResponse::Continue) => {}
                Ok(InvocationResponse::Suspend) => {
                    warn!(
                        message_id = %ctx.message_id(),
                        operation = %operation,
                        "Fault flow suspended in the operation fault chain; resumption may function incorrectly"
                    );
                    return self
                        .settle(ctx, "send_fault", Ok(InvocationResponse::Suspend))
                        .await;
                }
                other => return self.settle(ctx, "send_fault", other).await,
            }
        } else {
            ctx.reset_execution(Flow::OutFault, Vec::new());
            self.log_start("send_fault", ctx);
        }

        self.run_global_fault_chain(ctx).await
    }

    /// Continue a suspended message where it stopped
    pub async fn resume(&self, ctx: &mut ProcessingContext) -> EngineResult<InvocationResponse> {
        if !ctx.is_paused() {
            return Err(EngineError::invalid_state(format!(
                "message {} is not suspended",
                ctx.message_id()
            )));
        }
        ctx.set_paused(false);

        log_flow_operation(
            "resume",
            &ctx.message_id().to_string(),
            ctx.flow().as_str(),
            "resumed",
            None,
        );

        match ctx.flow() {
            Flow::In | Flow::InFault => self.drive_receive(ctx, true).await,
            Flow::Out => self.drive_send(ctx, true).await,
            Flow::OutFault => self.resume_fault(ctx).await,
        }
    }

    /// Rebuild a context from a checkpoint against the current configuration
    pub fn restore(&self, checkpoint: ExecutionCheckpoint) -> EngineResult<ProcessingContext> {
        let flow = checkpoint.flow;
        let mut candidates: Vec<Arc<Phase>> = Vec::new();
        let operation_phases = match checkpoint.operation.as_deref() {
            Some(operation) => self.provider.operation_phases(flow, operation)?,
            None => Vec::new(),
        };
        if flow.is_inbound() {
            candidates.extend(self.provider.global_phases(flow));
            candidates.extend(operation_phases);
        } else {
            candidates.extend(operation_phases);
            candidates.extend(self.provider.global_phases(flow));
        }

        let mut chain = Vec::with_capacity(checkpoint.chain.len());
        let mut cursor = 0;
        for name in &checkpoint.chain {
            let offset = candidates[cursor..]
                .iter()
                .position(|phase| phase.name() == name)
                .ok_or_else(|| {
                    EngineError::unresolved_chain(
                        format!("phase '{name}'"),
                        "no longer part of the configured chain",
                    )
                })?;
            chain.push(Arc::clone(&candidates[cursor + offset]));
            cursor += offset + 1;
        }

        let mut executed: Vec<(String, Arc<dyn Handler>)> = Vec::new();
        for record in &checkpoint.executed {
            let handler = candidates
                .iter()
                .filter(|phase| phase.name() == record.phase)
                .find_map(|phase| phase.handler(&record.handler).cloned())
                .ok_or_else(|| {
                    EngineError::unresolved_chain(
                        format!("handler '{}' of phase '{}'", record.handler, record.phase),
                        "no longer deployed",
                    )
                })?;
            executed.push((record.phase.clone(), handler));
        }

        if checkpoint.paused && checkpoint.current_phase_index >= chain.len() {
            return Err(EngineError::invalid_state(
                "suspended phase index lies outside the restored chain",
            ));
        }

        info!(
            message_id = %checkpoint.message_id,
            flow = %flow,
            phases = chain.len(),
            executed = executed.len(),
            "Processing context restored from checkpoint"
        );

        Ok(ProcessingContext::from_checkpoint(checkpoint, chain, executed))
    }

    /// A suspended context may only continue through `resume`
    fn ensure_not_paused(ctx: &ProcessingContext) -> EngineResult<()> {
        if ctx.is_paused() {
            return Err(EngineError::invalid_state(format!(
                "message {} is suspended; resume it instead of starting a new flow",
                ctx.message_id()
            )));
        }
        Ok(())
    }

    fn outbound_chain(&self, ctx: &ProcessingContext, flow: Flow) -> EngineResult<Vec<Arc<Phase>>> {
        let operation = ctx.operation.as_deref().ok_or_else(|| {
            EngineError::unresolved_chain(
                format!("message {}", ctx.message_id()),
                "no operation set for outbound message",
            )
        })?;
        let mut chain = self.provider.operation_phases(flow, operation)?;
        chain.extend(self.provider.global_phases(flow));
        Ok(chain)
    }

    async fn drive_receive(
        &self,
        ctx: &mut ProcessingContext,
        resuming: bool,
    ) -> EngineResult<InvocationResponse> {
        let outcome = match self.invoke_phases(ctx, resuming).await {
            Ok(InvocationResponse::Continue) => self
                .finish_receive(ctx)
                .await
                .map(|_| InvocationResponse::Continue),
            other => other,
        };
        self.settle(ctx, "receive", outcome).await
    }

    async fn drive_send(
        &self,
        ctx: &mut ProcessingContext,
        resuming: bool,
    ) -> EngineResult<InvocationResponse> {
        let outcome = match self.invoke_phases(ctx, resuming).await {
            Ok(InvocationResponse::Continue) => {
                self.deliver(ctx).await.map(|_| InvocationResponse::Continue)
            }
            other => other,
        };
        self.settle(ctx, "send", outcome).await
    }

    async fn run_global_fault_chain(
        &self,
        ctx: &mut ProcessingContext,
    ) -> EngineResult<InvocationResponse> {
        ctx.reset_execution(Flow::OutFault, self.provider.global_phases(Flow::OutFault));

        let outcome = match self.invoke_phases(ctx, false).await {
            Ok(InvocationResponse::Continue) => {
                self.deliver(ctx).await.map(|_| InvocationResponse::Continue)
            }
            Ok(InvocationResponse::Suspend) => {
                warn!(
                    message_id = %ctx.message_id(),
                    "Fault flow suspended in the global fault chain; resumption may function incorrectly"
                );
                Ok(InvocationResponse::Suspend)
            }
            other => other,
        };
        self.settle(ctx, "send_fault", outcome).await
    }

    /// Resuming a fault flow assumes the suspension happened in the
    /// operation-level fault chain: the current chain is finished, then the
    /// global fault chain always runs from its start.
    async fn resume_fault(&self, ctx: &mut ProcessingContext) -> EngineResult<InvocationResponse> {
        match self.invoke_phases(ctx, true).await {
            Ok(InvocationResponse::Continue) => self.run_global_fault_chain(ctx).await,
            Ok(InvocationResponse::Suspend) => {
                warn!(
                    message_id = %ctx.message_id(),
                    "Fault flow suspended again after resume; resumption may function incorrectly"
                );
                self.settle(ctx, "send_fault", Ok(InvocationResponse::Suspend))
                    .await
            }
            other => self.settle(ctx, "send_fault", other).await,
        }
    }

    /// Run the context's chain from its phase cursor
    async fn invoke_phases(
        &self,
        ctx: &mut ProcessingContext,
        resuming: bool,
    ) -> EngineResult<InvocationResponse> {
        let mut resuming = resuming;

        while let Some(phase) = ctx.current_phase() {
            let response = if std::mem::take(&mut resuming) {
                phase.resume(ctx).await?
            } else {
                phase.invoke(ctx).await?
            };

            if response != InvocationResponse::Continue {
                return Ok(response);
            }
            ctx.advance_phase();
        }

        Ok(InvocationResponse::Continue)
    }

    async fn finish_receive(&self, ctx: &mut ProcessingContext) -> EngineResult<()> {
        let receiver = if ctx.server_side {
            let operation_name = ctx.operation.clone().ok_or_else(|| {
                EngineError::unresolved_chain(
                    format!("message {}", ctx.message_id()),
                    "no operation resolved for inbound message",
                )
            })?;
            let operation = self.provider.operation(&operation_name).ok_or_else(|| {
                EngineError::unresolved_chain(
                    format!("operation '{operation_name}'"),
                    "operation is not registered",
                )
            })?;
            let receiver = operation.receiver.clone().ok_or_else(|| {
                EngineError::missing_terminal_sink(
                    ctx.flow().as_str(),
                    format!("operation '{operation_name}' has no message receiver"),
                )
            })?;
            Some(receiver)
        } else {
            None
        };

        self.check_must_understand(ctx, receiver.as_ref())?;

        if let Some(receiver) = receiver {
            debug!(
                message_id = %ctx.message_id(),
                receiver = %receiver.name(),
                "Delivering to message receiver"
            );
            receiver.receive(ctx).await?;
        }
        Ok(())
    }

    fn targets_this_node(&self, role: Option<&str>) -> bool {
        match role {
            None => true,
            Some(role) => role == roles::NEXT || self.roles.contains(role),
        }
    }

    fn check_must_understand(
        &self,
        ctx: &mut ProcessingContext,
        receiver: Option<&Arc<dyn MessageReceiver>>,
    ) -> EngineResult<()> {
        let understood = ctx
            .exchange()
            .map(|exchange| exchange.understood_headers())
            .unwrap_or_default();

        let unprocessed: Vec<String> = ctx
            .headers
            .iter()
            .filter(|header| header.must_understand && !header.processed)
            .filter(|header| self.targets_this_node(header.role.as_deref()))
            .filter(|header| !understood.contains(&header.name))
            .map(|header| header.name.clone())
            .collect();

        let Some(first) = unprocessed.first().cloned() else {
            return Ok(());
        };

        if receiver.is_some_and(|receiver| receiver.defers_must_understand()) {
            debug!(
                message_id = %ctx.message_id(),
                headers = ?unprocessed,
                "Must-understand obligation deferred to receiver"
            );
            ctx.set_property(properties::UNPROCESSED_HEADER_NAMES, json!(unprocessed));
            return Ok(());
        }

        Err(EngineError::MustUnderstand { header: first })
    }

    fn resolve_sender(&self, ctx: &ProcessingContext) -> EngineResult<Arc<dyn TransportSender>> {
        ctx.transport_sender()
            .cloned()
            .or_else(|| self.provider.transport_sender())
            .ok_or_else(|| {
                EngineError::missing_terminal_sink(
                    ctx.flow().as_str(),
                    "no transport sender configured",
                )
            })
    }

    async fn deliver(&self, ctx: &mut ProcessingContext) -> EngineResult<()> {
        let sender = self.resolve_sender(ctx)?;

        if ctx.fire_and_forget {
            self.submit_delivery(sender, ctx.delivery_snapshot());
            return Ok(());
        }

        debug!(
            message_id = %ctx.message_id(),
            sender = %sender.name(),
            "Delivering through transport sender"
        );
        sender.deliver(ctx).await
    }

    fn submit_delivery(&self, sender: Arc<dyn TransportSender>, snapshot: ProcessingContext) {
        let events = self.events.clone();
        let message_id = snapshot.message_id();
        let flow = snapshot.flow();
        let sender_name = sender.name().to_string();

        events.publish(
            EngineEventKind::DeliverySubmitted,
            message_id,
            flow,
            json!({ "sender": sender_name }),
        );

        let label = format!("deliver:{sender_name}");
        self.pool.submit(
            &label,
            Box::pin(async move {
                match sender.deliver(&snapshot).await {
                    Ok(()) => {
                        debug!(message_id = %message_id, sender = %sender_name, "Fire-and-forget delivery completed");
                        events.publish(
                            EngineEventKind::DeliveryCompleted,
                            message_id,
                            flow,
                            json!({ "sender": sender_name }),
                        );
                    }
                    Err(err) => {
                        log_error(
                            "delivery_pool",
                            &format!("deliver:{sender_name}"),
                            &err.to_string(),
                            Some(&message_id.to_string()),
                        );
                        if let Some(callback) = snapshot.delivery_callback() {
                            callback.on_error(&err);
                            callback.on_complete();
                        }
                        events.publish(
                            EngineEventKind::DeliveryFailed,
                            message_id,
                            flow,
                            json!({ "sender": sender_name, "error": err.to_string() }),
                        );
                    }
                }
            }),
        );
    }

    /// Apply the outcome of a traversal: completion sweep, abort unwinding,
    /// failure recording, events.
    async fn settle(
        &self,
        ctx: &mut ProcessingContext,
        operation: &str,
        outcome: EngineResult<InvocationResponse>,
    ) -> EngineResult<InvocationResponse> {
        let message_id = ctx.message_id().to_string();
        let flow = ctx.flow();

        match outcome {
            Ok(InvocationResponse::Continue) => {
                self.flow_complete(ctx).await;
                log_flow_operation(operation, &message_id, flow.as_str(), "completed", None);
                self.events.publish(
                    EngineEventKind::FlowCompleted,
                    ctx.message_id(),
                    flow,
                    json!({ "operation": ctx.operation }),
                );
                Ok(InvocationResponse::Continue)
            }
            Ok(InvocationResponse::Suspend) => {
                ctx.set_paused(true);
                let phase = ctx
                    .current_phase()
                    .map(|phase| phase.name().to_string())
                    .unwrap_or_default();
                log_flow_operation(
                    operation,
                    &message_id,
                    flow.as_str(),
                    "suspended",
                    Some(phase.as_str()),
                );
                self.events.publish(
                    EngineEventKind::FlowSuspended,
                    ctx.message_id(),
                    flow,
                    json!({ "phase": phase, "handler_index": ctx.current_handler_index() }),
                );
                Ok(InvocationResponse::Suspend)
            }
            Ok(InvocationResponse::Abort) => {
                self.flow_complete(ctx).await;
                if flow.is_inbound() {
                    if let Some(exchange) = ctx.exchange() {
                        if exchange.pattern() == ExchangePattern::OutIn {
                            exchange.remove_message(MessageLabel::In);
                            exchange.set_complete(false);
                        }
                    }
                }
                log_flow_operation(operation, &message_id, flow.as_str(), "aborted", None);
                self.events.publish(
                    EngineEventKind::FlowAborted,
                    ctx.message_id(),
                    flow,
                    json!({ "operation": ctx.operation }),
                );
                Ok(InvocationResponse::Abort)
            }
            Err(err) => {
                ctx.record_failure(&err);
                self.flow_complete(ctx).await;

                if err.is_application_fault() {
                    debug!(message_id = %message_id, flow = %flow, error = %err, "Application fault during {operation}");
                } else {
                    error!(message_id = %message_id, flow = %flow, error = %err, "Processing failed during {operation}");
                }
                self.events.publish(
                    EngineEventKind::FlowFaulted,
                    ctx.message_id(),
                    flow,
                    json!({ "error": err.to_string(), "fault_code": err.fault_code() }),
                );
                Err(err)
            }
        }
    }

    /// Completion callbacks for every handler that ran, most recent first
    async fn flow_complete(&self, ctx: &mut ProcessingContext) {
        let executed = ctx.take_executed();
        debug!(
            message_id = %ctx.message_id(),
            handlers = executed.len(),
            "Running completion callbacks"
        );
        for entry in executed.iter().rev() {
            entry.handler().flow_complete(ctx).await;
        }
    }

    fn log_start(&self, operation: &str, ctx: &ProcessingContext) {
        let phases = ctx.execution_chain_names().join(",");
        log_flow_operation(
            operation,
            &ctx.message_id().to_string(),
            ctx.flow().as_str(),
            "started",
            Some(phases.as_str()),
        );
    }
}
