//! Message routing between loaded components.
//!
//! Point-to-point and broadcast delivery. Nothing is queued or retried: a
//! message is attempted exactly once per call.

mod message;
mod router;

pub use message::{ComponentMessage, Destination, MessageType, COMPONENT_UPDATED};
pub use router::{BroadcastReport, DeliveryFailure, MessageRouter, MessageSink, RouterError, RouterStats};
