//! The insertion-ordered route registry.
//!
//! Lookup is a linear scan in registration order — deliberately
//! unprioritized; callers control precedence purely through registration
//! order. Registering a pattern with the same source text as an existing
//! entry silently overwrites it in place, preserving its position.

use std::fmt;

use url::Url;

use crate::content::HandlerFn;
use crate::error::NavigationError;
use crate::pattern::{PathPattern, PatternMatch};

/// What a route resolves through: a remote-module specifier or an inline
/// handler function.
#[derive(Clone)]
pub enum RouteTarget {
	/// A remote-module specifier, resolved against the base URL.
	Module(String),
	/// An inline async handler.
	Inline(HandlerFn),
}

impl fmt::Debug for RouteTarget {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Module(specifier) => f.debug_tuple("Module").field(specifier).finish(),
			Self::Inline(_) => write!(f, "Inline"),
		}
	}
}

/// A registered (pattern, target) binding.
#[derive(Debug, Clone)]
pub struct RouteEntry {
	pattern: PathPattern,
	target: RouteTarget,
}

impl RouteEntry {
	/// Returns the entry's pattern.
	pub fn pattern(&self) -> &PathPattern {
		&self.pattern
	}

	/// Returns the entry's target.
	pub fn target(&self) -> &RouteTarget {
		&self.target
	}
}

/// An insertion-ordered mapping from pattern to route target.
#[derive(Debug, Default)]
pub struct RouteRegistry {
	entries: Vec<RouteEntry>,
}

impl RouteRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Compiles `pattern` against `base` and registers it.
	///
	/// # Errors
	///
	/// Returns [`NavigationError::InvalidPattern`] if compilation fails.
	pub fn register(
		&mut self,
		pattern: &str,
		base: Option<&Url>,
		target: RouteTarget,
	) -> Result<(), NavigationError> {
		let pattern = PathPattern::parse(pattern, base)?;
		self.register_compiled(pattern, target);
		Ok(())
	}

	/// Registers a pre-compiled pattern, overwriting a duplicate in place.
	pub fn register_compiled(&mut self, pattern: PathPattern, target: RouteTarget) {
		let entry = RouteEntry { pattern, target };
		if let Some(existing) = self
			.entries
			.iter_mut()
			.find(|e| e.pattern == entry.pattern)
		{
			*existing = entry;
		} else {
			self.entries.push(entry);
		}
	}

	/// Returns the first entry whose pattern matches `url`, with its
	/// captures.
	pub fn find(&self, url: &Url) -> Option<(&RouteEntry, PatternMatch)> {
		self.entries
			.iter()
			.find_map(|entry| entry.pattern.exec(url).map(|m| (entry, m)))
	}

	/// Returns the first matching pattern for `url`.
	pub fn find_pattern(&self, url: &Url) -> Option<&PathPattern> {
		self.find(url).map(|(entry, _)| entry.pattern())
	}

	/// Empties the registry.
	pub fn clear(&mut self) {
		self.entries.clear();
	}

	/// Iterates entries in registration order.
	pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
		self.entries.iter()
	}

	/// Returns the number of entries.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns `true` if no routes are registered.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
