//! # Orchestration
//!
//! The runtime half of the engine: the [`Handler`] capability, [`Phase`]
//! sub-chains with resumable cursors, the terminal sinks, and the [`Engine`]
//! that drives receive, send, send-fault and resume across a message's chain.
//!
//! ## Core Components
//!
//! - **Handler**: one named processing unit returning continue, suspend or abort
//! - **Phase**: ordered, shared group of handlers built once at configuration time
//! - **DispatchConditions**: post-conditions resolving the operation on inbound flows
//! - **Engine**: lifecycle driver with the completion-callback guarantee

pub mod dispatch;
pub mod engine;
pub mod handler;
pub mod phase;
pub mod sink;

pub use dispatch::DispatchConditions;
pub use engine::Engine;
pub use handler::{Handler, InvocationResponse};
pub use phase::{Phase, PhaseConditions, PhaseRule};
pub use sink::{DeliveryCallback, MessageReceiver, TransportSender};
