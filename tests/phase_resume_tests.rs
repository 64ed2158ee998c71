mod common;

use common::*;
use phase_engine::config::EngineConfig;
use phase_engine::constants::phases;
use phase_engine::context::{ExchangePattern, ExecutionCheckpoint, Flow, ProcessingContext};
use phase_engine::error::EngineError;
use phase_engine::events::EngineEventKind;
use phase_engine::orchestration::{Engine, InvocationResponse};
use phase_engine::registry::OperationDescriptor;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_phase_resume_continues_after_suspending_handler() {
    let journal = Journal::new();
    let phase = phase_of(
        "Security",
        vec![
            RecordingHandler::continuing("h1", &journal),
            RecordingHandler::new("h2", Behavior::Suspend, &journal),
            RecordingHandler::continuing("h3", &journal),
        ],
    );
    let mut ctx = ProcessingContext::new();

    let response = assert_ok!(phase.invoke(&mut ctx).await);
    assert_eq!(response, InvocationResponse::Suspend);
    assert_eq!(ctx.current_handler_index(), 1);
    assert_eq!(ctx.executed_names(), vec!["h1", "h2"]);

    let response = assert_ok!(phase.resume(&mut ctx).await);
    assert_eq!(response, InvocationResponse::Continue);
    assert_eq!(ctx.executed_names(), vec!["h1", "h2", "h3"]);
    assert_eq!(ctx.current_handler_index(), 0);
    assert_eq!(journal.count("invoke:h2"), 1);
    assert_eq!(journal.with_prefix("invoke:"), vec!["h1", "h2", "h3"]);
    assert!(journal.with_prefix("complete:").is_empty());
}

#[tokio::test]
async fn test_suspend_defers_completion_until_resumed_flow_ends() {
    let harness = Harness::new();
    let journal = &harness.journal;
    harness.handler(Flow::In, phases::TRANSPORT, RecordingHandler::continuing("h1", journal));
    harness.handler(
        Flow::In,
        phases::SECURITY,
        RecordingHandler::new("h2", Behavior::Suspend, journal),
    );
    harness.handler(Flow::In, phases::OPERATION_IN, RecordingHandler::continuing("h3", journal));
    let receiver = RecordingReceiver::new(journal);
    harness.register_with_receiver(receiver.clone());
    let mut events = harness.engine.events().subscribe();

    let mut ctx = harness.inbound();
    let response = assert_ok!(harness.engine.receive(&mut ctx).await);

    assert_eq!(response, InvocationResponse::Suspend);
    assert!(ctx.is_paused());
    assert_eq!(ctx.current_phase_index(), 2);
    assert_eq!(receiver.count(), 0);
    assert!(journal.with_prefix("complete:").is_empty());
    assert_eq!(
        events.recv().await.unwrap().kind,
        EngineEventKind::FlowSuspended
    );

    let response = assert_ok!(harness.engine.resume(&mut ctx).await);

    assert_eq!(response, InvocationResponse::Continue);
    assert!(!ctx.is_paused());
    assert_eq!(receiver.count(), 1);
    assert_eq!(
        journal.entries(),
        vec![
            "invoke:h1",
            "invoke:h2",
            "invoke:h3",
            "receive",
            "complete:h3",
            "complete:h2",
            "complete:h1"
        ]
    );
}

#[tokio::test]
async fn test_suspend_in_last_handler_of_phase_moves_to_next_phase() {
    let harness = Harness::new();
    let journal = &harness.journal;
    harness.handler(
        Flow::In,
        phases::TRANSPORT,
        RecordingHandler::new("only", Behavior::Suspend, journal),
    );
    harness.handler(Flow::In, phases::ADDRESSING, RecordingHandler::continuing("next", journal));
    harness.register_with_receiver(RecordingReceiver::new(journal));

    let mut ctx = harness.inbound();
    assert_eq!(
        assert_ok!(harness.engine.receive(&mut ctx).await),
        InvocationResponse::Suspend
    );
    assert_eq!(
        assert_ok!(harness.engine.resume(&mut ctx).await),
        InvocationResponse::Continue
    );
    assert_eq!(journal.with_prefix("invoke:"), vec!["only", "next"]);
    assert_eq!(journal.with_prefix("complete:"), vec!["next", "only"]);
}

#[tokio::test]
async fn test_resume_requires_suspended_context() {
    let harness = Harness::new();
    harness.register_with_receiver(RecordingReceiver::new(&harness.journal));

    let mut fresh = harness.inbound();
    let err = assert_err!(harness.engine.resume(&mut fresh).await);
    assert!(matches!(err, EngineError::InvalidState { .. }));

    assert_ok!(harness.engine.receive(&mut fresh).await);
    assert_err!(harness.engine.resume(&mut fresh).await);
}

#[tokio::test]
async fn test_suspended_context_cannot_start_a_new_flow() {
    let harness = Harness::new();
    let journal = &harness.journal;
    harness.handler(
        Flow::In,
        phases::TRANSPORT,
        RecordingHandler::new("hold", Behavior::Suspend, journal),
    );
    harness.register_with_receiver(RecordingReceiver::new(journal));
    harness
        .registry
        .set_transport_sender(RecordingSender::new(journal));

    let mut ctx = harness.inbound();
    assert_eq!(
        assert_ok!(harness.engine.receive(&mut ctx).await),
        InvocationResponse::Suspend
    );

    let err = assert_err!(harness.engine.receive(&mut ctx).await);
    assert!(matches!(err, EngineError::InvalidState { .. }));
    assert_err!(harness.engine.send(&mut ctx).await);
    assert_err!(harness.engine.send_fault(&mut ctx).await);

    assert!(ctx.is_paused());
    assert_eq!(ctx.flow(), Flow::In);
    assert_eq!(ctx.executed_names(), vec!["hold"]);
    assert!(journal.with_prefix("complete:").is_empty());

    assert_ok!(harness.engine.resume(&mut ctx).await);
    assert_eq!(journal.with_prefix("invoke:"), vec!["hold"]);
    assert_eq!(journal.with_prefix("complete:"), vec!["hold"]);
}

#[tokio::test]
async fn test_send_suspend_and_resume_delivers_once() {
    let harness = Harness::new();
    let journal = &harness.journal;
    harness.handler(Flow::Out, phases::POLICY_DETERMINATION, RecordingHandler::continuing("policy", journal));
    harness.handler(
        Flow::Out,
        phases::MESSAGE_OUT,
        RecordingHandler::new("rm-hold", Behavior::Suspend, journal),
    );
    harness.register(OperationDescriptor::new(OPERATION, ExchangePattern::OutOnly));
    let sender = RecordingSender::new(journal);
    harness.registry.set_transport_sender(sender.clone());

    let mut ctx = harness.outbound();
    assert_eq!(
        assert_ok!(harness.engine.send(&mut ctx).await),
        InvocationResponse::Suspend
    );
    assert_eq!(sender.count(), 0);

    assert_eq!(
        assert_ok!(harness.engine.resume(&mut ctx).await),
        InvocationResponse::Continue
    );
    assert_eq!(sender.count(), 1);
    assert_eq!(
        journal.entries(),
        vec![
            "invoke:policy",
            "invoke:rm-hold",
            "deliver:out",
            "complete:rm-hold",
            "complete:policy"
        ]
    );
}

#[tokio::test]
async fn test_operation_fault_chain_suspend_resumes_into_global_chain() {
    let harness = Harness::new();
    let journal = &harness.journal;
    harness.handler(
        Flow::OutFault,
        phases::MESSAGE_OUT,
        RecordingHandler::continuing("global-fault", journal),
    );
    harness.register(
        OperationDescriptor::new(OPERATION, ExchangePattern::InOut).with_phases(
            Flow::OutFault,
            vec![phase_of(
                "OrderFaultPolicy",
                vec![RecordingHandler::new("hold", Behavior::Suspend, journal)],
            )],
        ),
    );
    harness
        .registry
        .set_transport_sender(RecordingSender::new(journal));

    let mut ctx = harness.inbound();
    assert_eq!(
        assert_ok!(harness.engine.send_fault(&mut ctx).await),
        InvocationResponse::Suspend
    );
    assert_eq!(journal.entries(), vec!["invoke:hold"]);

    assert_eq!(
        assert_ok!(harness.engine.resume(&mut ctx).await),
        InvocationResponse::Continue
    );
    assert_eq!(
        journal.entries(),
        vec![
            "invoke:hold",
            "invoke:global-fault",
            "deliver:out_fault",
            "complete:global-fault",
            "complete:hold"
        ]
    );
}

/// Resuming a fault flow always restarts the global fault chain, so a
/// suspension inside it re-runs the handlers that already ran there.
#[tokio::test]
async fn test_global_fault_chain_suspend_reruns_global_handlers_on_resume() {
    let harness = Harness::new();
    let journal = &harness.journal;
    harness.handler(
        Flow::OutFault,
        phases::POLICY_DETERMINATION,
        RecordingHandler::continuing("g1", journal),
    );
    harness.handler(
        Flow::OutFault,
        phases::MESSAGE_OUT,
        RecordingHandler::new("g2", Behavior::suspend_once(), journal),
    );
    let sender = RecordingSender::new(journal);
    harness.registry.set_transport_sender(sender.clone());

    let mut ctx = ProcessingContext::server();
    ctx.is_fault = true;
    assert_eq!(
        assert_ok!(harness.engine.send_fault(&mut ctx).await),
        InvocationResponse::Suspend
    );

    assert_eq!(
        assert_ok!(harness.engine.resume(&mut ctx).await),
        InvocationResponse::Continue
    );
    assert_eq!(journal.count("invoke:g1"), 2);
    assert_eq!(journal.count("invoke:g2"), 2);
    assert_eq!(sender.count(), 1);
    assert_eq!(
        journal.with_prefix("complete:"),
        vec!["g2", "g1", "g2", "g1"]
    );
}

#[tokio::test]
async fn test_checkpoint_restore_and_resume() {
    let harness = Harness::new();
    let journal = &harness.journal;
    harness.handler(Flow::In, phases::TRANSPORT, RecordingHandler::continuing("h1", journal));
    harness.handler(
        Flow::In,
        phases::SECURITY,
        RecordingHandler::new("h2", Behavior::Suspend, journal),
    );
    harness.handler(Flow::In, phases::OPERATION_IN, RecordingHandler::continuing("h3", journal));
    let receiver = RecordingReceiver::new(journal);
    harness.register_with_receiver(receiver.clone());

    let mut ctx = harness
        .inbound()
        .with_property("order_id", serde_json::json!("A-1001"));
    assert_ok!(harness.engine.receive(&mut ctx).await);

    let json = ctx.checkpoint().to_json().unwrap();
    drop(ctx);
    let checkpoint = ExecutionCheckpoint::from_json(&json).unwrap();
    assert_eq!(checkpoint.executed.len(), 2);

    // a second engine over the same configuration, as after a restart
    let engine = Engine::new(harness.registry.clone(), &EngineConfig::default());
    let mut restored = assert_ok!(engine.restore(checkpoint));

    assert!(restored.is_paused());
    assert_eq!(restored.executed_names(), vec!["h1", "h2"]);
    assert_eq!(
        restored.property("order_id"),
        Some(&serde_json::json!("A-1001"))
    );

    assert_eq!(
        assert_ok!(engine.resume(&mut restored).await),
        InvocationResponse::Continue
    );
    assert_eq!(receiver.count(), 1);
    assert_eq!(journal.count("invoke:h2"), 1);
    assert_eq!(journal.with_prefix("complete:"), vec!["h3", "h2", "h1"]);
}

#[tokio::test]
async fn test_restore_rejects_phase_no_longer_configured() {
    let harness = Harness::new();
    harness.handler(
        Flow::In,
        phases::SECURITY,
        RecordingHandler::new("h1", Behavior::Suspend, &harness.journal),
    );
    harness.register_with_receiver(RecordingReceiver::new(&harness.journal));

    let mut ctx = harness.inbound();
    assert_ok!(harness.engine.receive(&mut ctx).await);

    let mut checkpoint = ctx.checkpoint();
    checkpoint.chain.push("Retired".to_string());
    let err = assert_err!(harness.engine.restore(checkpoint));
    assert!(matches!(err, EngineError::UnresolvedChain { .. }));

    let mut checkpoint = ctx.checkpoint();
    checkpoint.executed[0].handler = "removed-handler".to_string();
    assert_err!(harness.engine.restore(checkpoint));
}
