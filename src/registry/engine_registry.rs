//! # Engine Registry
//!
//! Holds the global phase lists of every flow, the operation table and the
//! default transport sender. Flow tables are copy-on-write: administrative
//! changes build a new list and swap it in, so messages that already took a
//! snapshot keep running against the phases they started with.

use super::operation_registry::{OperationDescriptor, OperationRegistry};
use super::ChainProvider;
use crate::config::{EngineConfig, PhaseLayout};
use crate::context::Flow;
use crate::deployment::{Deployable, DeployableChain};
use crate::error::{EngineError, EngineResult};
use crate::orchestration::{DispatchConditions, Handler, Phase, PhaseRule, TransportSender};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

type PhaseList = Arc<Vec<Arc<Phase>>>;

#[derive(Debug, Clone)]
struct FlowTables {
    in_flow: PhaseList,
    out_flow: PhaseList,
    in_fault_flow: PhaseList,
    out_fault_flow: PhaseList,
}

impl FlowTables {
    fn get(&self, flow: Flow) -> &PhaseList {
        match flow {
            Flow::In => &self.in_flow,
            Flow::Out => &self.out_flow,
            Flow::InFault => &self.in_fault_flow,
            Flow::OutFault => &self.out_fault_flow,
        }
    }

    fn set(&mut self, flow: Flow, phases: PhaseList) {
        match flow {
            Flow::In => self.in_flow = phases,
            Flow::Out => self.out_flow = phases,
            Flow::InFault => self.in_fault_flow = phases,
            Flow::OutFault => self.out_fault_flow = phases,
        }
    }
}

pub struct EngineRegistry {
    flows: RwLock<FlowTables>,
    operations: Arc<OperationRegistry>,
    transport_sender: RwLock<Option<Arc<dyn TransportSender>>>,
}

impl EngineRegistry {
    /// Build empty global phases from the configured layout. The dispatch
    /// phase of both inbound flows carries the dispatch post-conditions.
    pub fn from_config(config: &EngineConfig) -> EngineResult<Self> {
        Self::from_layout(&config.phases, config.engine.single_operation_fallback)
    }

    pub fn from_layout(layout: &PhaseLayout, single_operation_fallback: bool) -> EngineResult<Self> {
        layout
            .validate()
            .map_err(|e| EngineError::configuration("phase layout", e.to_string()))?;

        let operations = Arc::new(OperationRegistry::new());
        let conditions = Arc::new(DispatchConditions::new(
            Arc::clone(&operations),
            single_operation_fallback,
        ));

        let build = |names: &[String], inbound: bool| -> PhaseList {
            Arc::new(
                names
                    .iter()
                    .map(|name| {
                        let phase = Phase::new(name.as_str());
                        if inbound && *name == layout.dispatch_phase {
                            Arc::new(phase.with_conditions(conditions.clone()))
                        } else {
                            Arc::new(phase)
                        }
                    })
                    .collect(),
            )
        };

        let flows = FlowTables {
            in_flow: build(&layout.in_flow, true),
            out_flow: build(&layout.out_flow, false),
            in_fault_flow: build(&layout.in_fault_flow, true),
            out_fault_flow: build(&layout.out_fault_flow, false),
        };

        info!(
            in_phases = flows.in_flow.len(),
            out_phases = flows.out_flow.len(),
            in_fault_phases = flows.in_fault_flow.len(),
            out_fault_phases = flows.out_fault_flow.len(),
            dispatch_phase = %layout.dispatch_phase,
            "Engine registry initialized"
        );

        Ok(Self {
            flows: RwLock::new(flows),
            operations,
            transport_sender: RwLock::new(None),
        })
    }

    pub fn operations(&self) -> &Arc<OperationRegistry> {
        &self.operations
    }

    pub fn register_operation(
        &self,
        descriptor: OperationDescriptor,
    ) -> EngineResult<Arc<OperationDescriptor>> {
        self.operations.register(descriptor)
    }

    pub fn set_transport_sender(&self, sender: Arc<dyn TransportSender>) {
        info!(sender = %sender.name(), "Default transport sender configured");
        *self.transport_sender.write() = Some(sender);
    }

    pub fn phase(&self, flow: Flow, name: &str) -> Option<Arc<Phase>> {
        self.flows
            .read()
            .get(flow)
            .iter()
            .find(|phase| phase.name() == name)
            .cloned()
    }

    pub fn phase_names(&self, flow: Flow) -> Vec<String> {
        self.flows
            .read()
            .get(flow)
            .iter()
            .map(|phase| phase.name().to_string())
            .collect()
    }

    /// Insert a handler into a global phase
    pub fn add_handler(
        &self,
        flow: Flow,
        phase_name: &str,
        handler: Arc<dyn Handler>,
        rule: PhaseRule,
    ) -> EngineResult<()> {
        let mut flows = self.flows.write();
        let current = flows.get(flow);
        let index = current
            .iter()
            .position(|phase| phase.name() == phase_name)
            .ok_or_else(|| {
                EngineError::configuration(
                    format!("{flow} flow"),
                    format!("no phase named '{phase_name}'"),
                )
            })?;

        let handler_name = handler.name().to_string();
        let mut phase = Phase::clone(&current[index]);
        phase.insert(handler, rule)?;

        let mut updated = Vec::clone(current);
        updated[index] = Arc::new(phase);
        flows.set(flow, Arc::new(updated));

        info!(
            flow = %flow,
            phase = %phase_name,
            handler = %handler_name,
            "Handler added to global phase"
        );
        Ok(())
    }

    /// Insert a new phase into a global flow. The existing phases keep their
    /// relative order; the deployable's constraints place the new one. A
    /// deployable without a target gets a fresh empty phase.
    pub fn insert_phase(&self, flow: Flow, mut deployable: Deployable<Phase>) -> EngineResult<()> {
        if deployable.target().is_none() {
            deployable.set_target(Arc::new(Phase::new(deployable.name())));
        }
        let name = deployable.name().to_string();

        let mut flows = self.flows.write();
        let current = flows.get(flow);

        let mut chain = DeployableChain::new();
        let mut previous: Option<&str> = None;
        for phase in current.iter() {
            chain.deploy(Deployable::with_target(phase.name(), Arc::clone(phase)))?;
            if let Some(previous) = previous {
                chain.add_relationship(previous, phase.name());
            }
            previous = Some(phase.name());
        }
        chain.deploy(deployable)?;

        let rebuilt = chain.rebuild()?;
        flows.set(flow, Arc::new(rebuilt));

        info!(flow = %flow, phase = %name, "Phase inserted into global flow");
        Ok(())
    }
}

impl ChainProvider for EngineRegistry {
    fn global_phases(&self, flow: Flow) -> Vec<Arc<Phase>> {
        Vec::clone(self.flows.read().get(flow))
    }

    fn operation(&self, name: &str) -> Option<Arc<OperationDescriptor>> {
        self.operations.get(name)
    }

    fn transport_sender(&self) -> Option<Arc<dyn TransportSender>> {
        self.transport_sender.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProcessingContext;
    use crate::error::HandlerError;
    use crate::orchestration::InvocationResponse;

    struct Noop(&'static str);

    #[async_trait::async_trait]
    impl Handler for Noop {
        fn name(&self) -> &str {
            self.0
        }

        async fn invoke(
            &self,
            _ctx: &mut ProcessingContext,
        ) -> Result<InvocationResponse, HandlerError> {
            Ok(InvocationResponse::Continue)
        }
    }

    fn registry() -> EngineRegistry {
        EngineRegistry::from_config(&EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_default_layout() {
        let registry = registry();
        assert_eq!(
            registry.phase_names(Flow::OutFault),
            vec!["OperationOutFault", "PolicyDetermination", "MessageOut", "Security"]
        );
    }

    #[test]
    fn test_add_handler_is_copy_on_write() {
        let registry = registry();
        let snapshot = registry.global_phases(Flow::In);

        registry
            .add_handler(Flow::In, "Security", Arc::new(Noop("verify")), PhaseRule::default())
            .unwrap();

        let security = registry.phase(Flow::In, "Security").unwrap();
        assert_eq!(security.handler_names(), vec!["verify"]);

        let old_security = snapshot.iter().find(|p| p.name() == "Security").unwrap();
        assert!(old_security.is_empty());
    }

    #[test]
    fn test_add_handler_to_unknown_phase() {
        let registry = registry();
        let err = registry
            .add_handler(Flow::Out, "Nowhere", Arc::new(Noop("x")), PhaseRule::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::Configuration { .. }));
    }

    #[test]
    fn test_insert_phase_between_existing() {
        let registry = registry();
        registry
            .insert_phase(
                Flow::In,
                Deployable::new("RMPhase").after("Security").before("PreDispatch"),
            )
            .unwrap();

        assert_eq!(
            registry.phase_names(Flow::In),
            vec![
                "Transport",
                "Addressing",
                "Security",
                "RMPhase",
                "PreDispatch",
                "Dispatch",
                "OperationIn"
            ]
        );
    }

    #[test]
    fn test_insert_existing_phase_name_rejected() {
        let registry = registry();
        let before = registry.phase_names(Flow::Out);
        assert!(registry
            .insert_phase(Flow::Out, Deployable::new("MessageOut"))
            .is_err());
        assert_eq!(registry.phase_names(Flow::Out), before);
    }
}
