//! Bundled handler variants.

pub mod dispatch_handler;
pub mod header_handler;
pub mod logging_handler;
pub mod validation_handler;

pub use dispatch_handler::DispatchHandler;
pub use header_handler::HeaderProcessingHandler;
pub use logging_handler::LoggingHandler;
pub use validation_handler::ValidationHandler;
