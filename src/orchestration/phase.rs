//! # Phase
//!
//! A named, ordered group of handlers executed as one resumable sub-chain.
//!
//! Phases are built at configuration time and shared read-only by every
//! message afterwards. Per-message progress is kept in the context's handler
//! cursor: a handler that returns anything but continue leaves the cursor on
//! itself, and a later resume picks up with the handler after it.

use super::handler::{Handler, InvocationResponse};
use crate::context::ProcessingContext;
use crate::deployment::{Deployable, DeployableChain};
use crate::error::{EngineError, EngineResult};
use crate::logging::log_handler_invocation;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Hooks run around a phase: before its first handler and after its last
pub trait PhaseConditions: Send + Sync {
    fn check_preconditions(&self, _phase: &str, _ctx: &mut ProcessingContext) -> EngineResult<()> {
        Ok(())
    }

    fn check_postconditions(&self, _phase: &str, _ctx: &mut ProcessingContext) -> EngineResult<()> {
        Ok(())
    }
}

/// Placement rule for inserting a handler into a phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseRule {
    pub first: bool,
    pub last: bool,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl PhaseRule {
    /// Append at the end, ahead of any last-slot occupant
    pub fn unconstrained() -> Self {
        Self::default()
    }

    pub fn first() -> Self {
        Self {
            first: true,
            ..Self::default()
        }
    }

    pub fn last() -> Self {
        Self {
            last: true,
            ..Self::default()
        }
    }

    pub fn before(name: impl Into<String>) -> Self {
        Self {
            before: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn after(name: impl Into<String>) -> Self {
        Self {
            after: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn and_before(mut self, name: impl Into<String>) -> Self {
        self.before = Some(name.into());
        self
    }

    pub fn and_after(mut self, name: impl Into<String>) -> Self {
        self.after = Some(name.into());
        self
    }

    pub fn and_last(mut self) -> Self {
        self.last = true;
        self
    }
}

#[derive(Clone)]
pub struct Phase {
    name: String,
    handlers: Vec<Arc<dyn Handler>>,
    first_set: bool,
    last_set: bool,
    conditions: Option<Arc<dyn PhaseConditions>>,
}

impl Phase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: Vec::new(),
            first_set: false,
            last_set: false,
            conditions: None,
        }
    }

    pub fn with_conditions(mut self, conditions: Arc<dyn PhaseConditions>) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Build a phase whose handler order is resolved from deployables.
    pub fn resolved(
        name: impl Into<String>,
        deployables: impl IntoIterator<Item = Deployable<dyn Handler>>,
    ) -> EngineResult<Self> {
        let name = name.into();
        let mut chain = DeployableChain::new();
        let (mut first_set, mut last_set) = (false, false);
        for deployable in deployables {
            first_set |= deployable.is_first();
            last_set |= deployable.is_last();
            chain.deploy(deployable)?;
        }

        let handlers = chain.rebuild().map_err(|err| match err {
            EngineError::Configuration { component, reason } => EngineError::configuration(
                format!("phase '{name}'"),
                format!("{component}: {reason}"),
            ),
            other => other,
        })?;

        Ok(Self {
            name,
            handlers,
            first_set,
            last_set,
            conditions: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handlers(&self) -> &[Arc<dyn Handler>] {
        &self.handlers
    }

    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub fn handler(&self, name: &str) -> Option<&Arc<dyn Handler>> {
        self.handlers.iter().find(|h| h.name() == name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn is_first_set(&self) -> bool {
        self.first_set
    }

    pub fn is_last_set(&self) -> bool {
        self.last_set
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.handlers.iter().position(|h| h.name() == name)
    }

    fn rule_error(&self, handler: &str, reason: impl fmt::Display) -> EngineError {
        EngineError::configuration(
            format!("phase '{}'", self.name),
            format!("cannot insert handler '{handler}': {reason}"),
        )
    }

    /// Insert a handler according to `rule`.
    pub fn insert(&mut self, handler: Arc<dyn Handler>, rule: PhaseRule) -> EngineResult<()> {
        let handler_name = handler.name().to_string();

        if self.position(&handler_name).is_some() {
            return Err(self.rule_error(&handler_name, "a handler with this name already exists"));
        }
        if (rule.first || rule.last) && (rule.before.is_some() || rule.after.is_some()) {
            return Err(self.rule_error(
                &handler_name,
                "first or last placement cannot be combined with before/after",
            ));
        }

        if self.first_set && self.last_set && self.handlers.len() == 1 {
            return Err(self.rule_error(
                &handler_name,
                "the phase is held by a handler that is both first and last",
            ));
        }

        if rule.first && rule.last {
            if !self.handlers.is_empty() {
                return Err(self.rule_error(
                    &handler_name,
                    "a handler that is both first and last must be alone in its phase",
                ));
            }
            self.handlers.push(handler);
            self.first_set = true;
            self.last_set = true;
            return Ok(());
        }

        if rule.first {
            if self.first_set {
                return Err(self.rule_error(&handler_name, "first slot already occupied"));
            }
            self.handlers.insert(0, handler);
            self.first_set = true;
            return Ok(());
        }

        if rule.last {
            if self.last_set {
                return Err(self.rule_error(&handler_name, "last slot already occupied"));
            }
            self.handlers.push(handler);
            self.last_set = true;
            return Ok(());
        }

        let after_index = match &rule.after {
            Some(after) => Some(self.position(after).ok_or_else(|| {
                self.rule_error(&handler_name, format!("no handler named '{after}'"))
            })?),
            None => None,
        };
        let before_index = rule.before.as_deref().and_then(|before| self.position(before));

        let index = match (after_index, before_index) {
            (Some(after), Some(before)) => {
                if after >= before {
                    return Err(self.rule_error(
                        &handler_name,
                        "'after' handler is not positioned ahead of the 'before' handler",
                    ));
                }
                after + 1
            }
            (Some(after), None) => {
                if self.last_set && after + 1 == self.handlers.len() {
                    return Err(self.rule_error(
                        &handler_name,
                        "cannot be placed after the last-slot handler",
                    ));
                }
                after + 1
            }
            (None, Some(before)) => {
                if self.first_set && before == 0 {
                    return Err(self.rule_error(
                        &handler_name,
                        "cannot be placed before the first-slot handler",
                    ));
                }
                before
            }
            (None, None) => (self.handlers.len() - usize::from(self.last_set))
                .max(usize::from(self.first_set)),
        };

        self.handlers.insert(index, handler);
        Ok(())
    }

    /// Convenience for unconstrained insertion
    pub fn add_handler(&mut self, handler: Arc<dyn Handler>) -> EngineResult<()> {
        self.insert(handler, PhaseRule::unconstrained())
    }

    /// Invoke the phase from the context's handler cursor
    pub async fn invoke(&self, ctx: &mut ProcessingContext) -> EngineResult<InvocationResponse> {
        self.run(ctx, false).await
    }

    /// Continue after the handler that suspended; it is not invoked again
    pub async fn resume(&self, ctx: &mut ProcessingContext) -> EngineResult<InvocationResponse> {
        self.run(ctx, true).await
    }

    async fn run(
        &self,
        ctx: &mut ProcessingContext,
        resuming: bool,
    ) -> EngineResult<InvocationResponse> {
        let mut index = ctx.current_handler_index();

        if resuming {
            index += 1;
        } else if index == 0 {
            if let Some(conditions) = &self.conditions {
                conditions.check_preconditions(&self.name, ctx)?;
            }
        }

        while let Some(handler) = self.handlers.get(index) {
            ctx.set_current_handler_index(index);
            ctx.record_executed(&self.name, Arc::clone(handler));
            log_handler_invocation(&self.name, handler.name(), &ctx.message_id().to_string());

            let response = handler
                .invoke(ctx)
                .await
                .map_err(|source| EngineError::processing_fault(&self.name, handler.name(), source))?;

            if response != InvocationResponse::Continue {
                debug!(
                    phase = %self.name,
                    handler = %handler.name(),
                    response = %response,
                    message_id = %ctx.message_id(),
                    "Phase stopped before completion"
                );
                return Ok(response);
            }
            index += 1;
        }

        ctx.set_current_handler_index(0);

        if let Some(conditions) = &self.conditions {
            conditions.check_postconditions(&self.name, ctx)?;
        }

        Ok(InvocationResponse::Continue)
    }
}

impl fmt::Debug for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Phase")
            .field("name", &self.name)
            .field("handlers", &self.handler_names())
            .field("first_set", &self.first_set)
            .field("last_set", &self.last_set)
            .field("has_conditions", &self.conditions.is_some())
            .finish()
    }
}
