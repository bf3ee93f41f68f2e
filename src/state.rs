//! Navigation state and state-blob diffing.

use serde::{Deserialize, Serialize};
use url::Url;

/// The free-form, application-defined state blob attached to a history
/// entry.
pub type StateBlob = serde_json::Map<String, serde_json::Value>;

/// The live navigation state: current location, state blob, and history
/// position.
///
/// Only one instance is live at a time; it is mutated only by the
/// navigation controller at defined transition points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationState {
	/// The current absolute URL.
	pub url: Url,
	/// The state blob for this entry.
	pub state: StateBlob,
	/// Position within the host history stack.
	pub position: usize,
}

impl NavigationState {
	/// Creates a state for a fresh entry with an empty blob.
	pub fn new(url: Url, position: usize) -> Self {
		Self {
			url,
			state: StateBlob::new(),
			position,
		}
	}
}

/// The result of comparing two state blobs.
///
/// Computed fresh per navigation; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateDiff {
	/// Keys present in the new blob only, with their new values.
	pub added: StateBlob,
	/// Keys present in the old blob only.
	pub removed: Vec<String>,
	/// Keys present in both with differing values, with their new values.
	pub changed: StateBlob,
}

impl StateDiff {
	/// Diffs `new` against `old`.
	pub fn between(new: &StateBlob, old: &StateBlob) -> Self {
		let mut diff = Self::default();
		for (key, value) in new {
			match old.get(key) {
				None => {
					diff.added.insert(key.clone(), value.clone());
				}
				Some(previous) if previous != value => {
					diff.changed.insert(key.clone(), value.clone());
				}
				Some(_) => {}
			}
		}
		for key in old.keys() {
			if !new.contains_key(key) {
				diff.removed.push(key.clone());
			}
		}
		diff
	}

	/// Returns `true` if the blobs were equal.
	pub fn is_empty(&self) -> bool {
		self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
	}
}
