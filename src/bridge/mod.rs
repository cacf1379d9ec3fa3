pub mod request;
pub mod service;

pub use request::{BridgeRequest, BridgeResponse, Operation};
pub use service::{ProcessorBridge, ProcessorBridgeBuilder, ProcessorService};
