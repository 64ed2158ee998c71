//! # Engine Constants
//!
//! Well-known phase names, context property keys, fault codes and event names
//! shared by the engine, the registry and the bundled handlers.

/// Canonical global phase names
pub mod phases {
    pub const TRANSPORT: &str = "Transport";
    pub const ADDRESSING: &str = "Addressing";
    pub const SECURITY: &str = "Security";
    pub const PRE_DISPATCH: &str = "PreDispatch";
    pub const DISPATCH: &str = "Dispatch";
    pub const OPERATION_IN: &str = "OperationIn";
    pub const OPERATION_IN_FAULT: &str = "OperationInFault";
    pub const OPERATION_OUT: &str = "OperationOut";
    pub const OPERATION_OUT_FAULT: &str = "OperationOutFault";
    pub const POLICY_DETERMINATION: &str = "PolicyDetermination";
    pub const MESSAGE_OUT: &str = "MessageOut";
}

/// Keys of well-known processing context properties
pub mod properties {
    /// Names of mandatory headers deferred to the receiver
    pub const UNPROCESSED_HEADER_NAMES: &str = "unprocessed_header_names";
}

/// Protocol fault codes attached to engine errors
pub mod fault_codes {
    pub const CLIENT: &str = "Client";
    pub const SERVER: &str = "Server";
    pub const MUST_UNDERSTAND: &str = "MustUnderstand";
}

/// Header roles that always target the current node
pub mod roles {
    pub const NEXT: &str = "next";
}

/// Names of events published by the engine
pub mod events {
    pub const FLOW_COMPLETED: &str = "flow.completed";
    pub const FLOW_SUSPENDED: &str = "flow.suspended";
    pub const FLOW_ABORTED: &str = "flow.aborted";
    pub const FLOW_FAULTED: &str = "flow.faulted";
    pub const DELIVERY_SUBMITTED: &str = "delivery.submitted";
    pub const DELIVERY_COMPLETED: &str = "delivery.completed";
    pub const DELIVERY_FAILED: &str = "delivery.failed";
}
