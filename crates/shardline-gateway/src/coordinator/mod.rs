//! Multi-shard supervision and identify pacing

mod coordinator;
mod descriptor;
mod identify;

pub use coordinator::{CoordinatorSettings, SessionCoordinator};
pub use descriptor::{GatewayDescriptor, SessionStartLimit};
pub use identify::{IdentifyPermit, IdentifyQueue};
