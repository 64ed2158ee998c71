#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Phase Engine
//!
//! Message-processing core for a SOAP/RPC engine: chains of handlers grouped
//! into ordered phases, run against in-flight messages on the inbound and
//! outbound paths, with suspend/resume at exact cursor positions and a
//! completion callback for every handler that ran.
//!
//! ## Architecture
//!
//! Configuration time builds phases and flows through the dependency
//! resolver. Per message, the engine snapshots the phases of the message's
//! flow into its [`ProcessingContext`] and drives them until the chain
//! completes, suspends, aborts or fails.
//!
//! ## Module Organization
//!
//! - [`deployment`] - Dependency resolver producing total orders from constraints
//! - [`orchestration`] - Handler capability, phases and the engine
//! - [`context`] - Per-message state, exchange bookkeeping and checkpoints
//! - [`registry`] - Global flows, operations and the chain provider seam
//! - [`handlers`] - Bundled handler variants
//! - [`execution`] - Delivery pool for fire-and-forget sends
//! - [`events`] - Lifecycle event publishing
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use phase_engine::config::EngineConfig;
//! use phase_engine::registry::EngineRegistry;
//! use phase_engine::{Engine, ProcessingContext};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::default();
//! let registry = Arc::new(EngineRegistry::from_config(&config)?);
//! let engine = Engine::new(registry, &config);
//!
//! let mut ctx = ProcessingContext::server().with_operation("getQuote");
//! let response = engine.receive(&mut ctx).await?;
//! println!("inbound flow finished with {response}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod deployment;
pub mod error;
pub mod events;
pub mod execution;
pub mod handlers;
pub mod logging;
pub mod orchestration;
pub mod registry;

pub use config::{ConfigManager, EngineConfig};
pub use context::{ExchangeContext, ExchangePattern, Flow, HeaderBlock, ProcessingContext};
pub use deployment::{Deployable, DeployableChain};
pub use error::{EngineError, EngineResult, HandlerError};
pub use events::{EngineEvent, EngineEventKind, EventPublisher};
pub use execution::DeliveryPool;
pub use orchestration::{
    DeliveryCallback, Engine, Handler, InvocationResponse, MessageReceiver, Phase, PhaseRule,
    TransportSender,
};
pub use registry::{ChainProvider, EngineRegistry, OperationDescriptor, OperationRegistry};
