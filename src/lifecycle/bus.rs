//! The shared dispatch bus for lifecycle events.
//!
//! Listeners are synchronous callbacks invoked during dispatch; they may
//! read the event, prevent its default action, or register deferred tasks
//! through the wait protocol. Connecting with an already-used uid replaces
//! the previous registration.

use std::sync::Arc;

use parking_lot::RwLock;

use super::event::{LifecycleEvent, NavigationKind};

/// A listener invoked for each dispatched event.
pub type LifecycleListener = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

struct Registration {
	kinds: Option<Vec<NavigationKind>>,
	uid: Option<String>,
	listener: LifecycleListener,
}

impl Registration {
	fn wants(&self, kind: NavigationKind) -> bool {
		match &self.kinds {
			None => true,
			Some(kinds) => kinds.contains(&kind),
		}
	}
}

/// The shared event bus.
#[derive(Default)]
pub struct LifecycleBus {
	listeners: RwLock<Vec<Registration>>,
}

impl LifecycleBus {
	/// Creates an empty bus.
	pub fn new() -> Self {
		Self::default()
	}

	/// Connects a listener.
	///
	/// `kinds: None` receives every event. A listener connected with the
	/// same `uid` as an existing one replaces it.
	pub fn connect(
		&self,
		listener: LifecycleListener,
		kinds: Option<&[NavigationKind]>,
		uid: Option<&str>,
	) {
		let mut listeners = self.listeners.write();
		if let Some(uid) = uid {
			listeners.retain(|r| r.uid.as_deref() != Some(uid));
		}
		listeners.push(Registration {
			kinds: kinds.map(<[_]>::to_vec),
			uid: uid.map(str::to_string),
			listener,
		});
	}

	/// Disconnects the listener registered under `uid`.
	///
	/// Returns `true` if a listener was removed.
	pub fn disconnect(&self, uid: &str) -> bool {
		let mut listeners = self.listeners.write();
		let before = listeners.len();
		listeners.retain(|r| r.uid.as_deref() != Some(uid));
		listeners.len() < before
	}

	/// Dispatches an event to every matching listener, synchronously.
	///
	/// The listener set is snapshotted first, so listeners may connect or
	/// disconnect during dispatch.
	pub fn dispatch(&self, event: &LifecycleEvent) {
		let snapshot: Vec<LifecycleListener> = {
			let listeners = self.listeners.read();
			listeners
				.iter()
				.filter(|r| r.wants(event.kind()))
				.map(|r| Arc::clone(&r.listener))
				.collect()
		};
		for listener in snapshot {
			listener(event);
		}
	}

	/// Returns the number of connected listeners.
	pub fn listener_count(&self) -> usize {
		self.listeners.read().len()
	}
}

impl std::fmt::Debug for LifecycleBus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LifecycleBus")
			.field("listeners", &self.listener_count())
			.finish()
	}
}
