//! Dispatch event names

mod event_types;

pub use event_types::GatewayEventType;
