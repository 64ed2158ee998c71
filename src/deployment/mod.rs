//! # Deployment Ordering
//!
//! Configuration-time resolution of named, partially ordered nodes into a
//! single deterministic chain. Used to order handlers within a phase and
//! phases within a flow. All failures here are configuration errors raised
//! before any message is processed.

pub mod chain;
pub mod deployable;

pub use chain::DeployableChain;
pub use deployable::Deployable;
