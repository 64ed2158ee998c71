//! Execution resources used outside the caller's task.

pub mod worker_pool;

pub use worker_pool::DeliveryPool;
