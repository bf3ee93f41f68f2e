//! The cancelable-event protocol gating every state-changing operation.

mod bus;
mod event;

pub use bus::{LifecycleBus, LifecycleListener};
pub use event::{EventDetail, EventOutcome, LifecycleEvent, NavigationKind, WaitOptions};
