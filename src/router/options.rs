//! The declarative route table and `init` options.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::cancel::CancellationToken;
use crate::content::HandlerFn;
use crate::loader::{CrossOriginMode, FetchPriority, ReferrerPolicy};
use crate::registry::RouteTarget;

/// What a route-table entry binds a pattern to.
#[derive(Clone)]
pub enum RouteSpec {
	/// A remote-module specifier.
	Module(String),
	/// An inline handler function.
	Inline(HandlerFn),
}

impl RouteSpec {
	pub(crate) fn into_target(self) -> RouteTarget {
		match self {
			Self::Module(specifier) => RouteTarget::Module(specifier),
			Self::Inline(handler) => RouteTarget::Inline(handler),
		}
	}
}

impl fmt::Debug for RouteSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Module(specifier) => f.debug_tuple("Module").field(specifier).finish(),
			Self::Inline(_) => write!(f, "Inline"),
		}
	}
}

impl From<&str> for RouteSpec {
	fn from(specifier: &str) -> Self {
		Self::Module(specifier.to_string())
	}
}

impl From<String> for RouteSpec {
	fn from(specifier: String) -> Self {
		Self::Module(specifier)
	}
}

impl From<HandlerFn> for RouteSpec {
	fn from(handler: HandlerFn) -> Self {
		Self::Inline(handler)
	}
}

/// An insertion-ordered mapping of pattern strings to route specs.
///
/// Deserializes from a JSON object of pattern → module specifier, in
/// document order.
#[derive(Clone, Default)]
pub struct RouteTable {
	entries: Vec<(String, RouteSpec)>,
}

impl RouteTable {
	/// Creates an empty table.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends an entry.
	pub fn route(mut self, pattern: impl Into<String>, spec: impl Into<RouteSpec>) -> Self {
		self.entries.push((pattern.into(), spec.into()));
		self
	}

	/// Iterates entries in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &RouteSpec)> {
		self.entries
			.iter()
			.map(|(pattern, spec)| (pattern.as_str(), spec))
	}

	/// Returns the number of entries.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns `true` if the table has no entries.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub(crate) fn into_entries(self) -> Vec<(String, RouteSpec)> {
		self.entries
	}
}

impl fmt::Debug for RouteTable {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_map()
			.entries(self.entries.iter().map(|(p, s)| (p, s)))
			.finish()
	}
}

impl<P: Into<String>, S: Into<RouteSpec>> FromIterator<(P, S)> for RouteTable {
	fn from_iter<I: IntoIterator<Item = (P, S)>>(iter: I) -> Self {
		Self {
			entries: iter
				.into_iter()
				.map(|(pattern, spec)| (pattern.into(), spec.into()))
				.collect(),
		}
	}
}

impl<'de> Deserialize<'de> for RouteTable {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		struct TableVisitor;

		impl<'de> Visitor<'de> for TableVisitor {
			type Value = RouteTable;

			fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str("a map of URL patterns to module specifiers")
			}

			fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
			where
				A: MapAccess<'de>,
			{
				let mut table = RouteTable::new();
				while let Some((pattern, specifier)) = map.next_entry::<String, String>()? {
					table.entries.push((pattern, RouteSpec::Module(specifier)));
				}
				Ok(table)
			}
		}

		deserializer.deserialize_map(TableVisitor)
	}
}

/// Scroll restoration mode recorded for the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScrollRestoration {
	/// The host restores scroll positions.
	#[default]
	Auto,
	/// The application restores scroll positions itself.
	Manual,
}

/// View-transition configuration, passed through to the render surface.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TransitionSpec {
	/// Keyframes, in whatever shape the surface expects.
	#[serde(default)]
	pub keyframes: serde_json::Value,
	/// Animation options.
	#[serde(default)]
	pub options: serde_json::Value,
}

/// Options recognized by [`Router::init`](crate::router::Router::init).
///
/// The serializable subset deserializes with serde; the handler- and
/// token-valued fields are set programmatically.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterOptions {
	/// Preload every remote handler (and remote not-found handler) at
	/// init.
	pub preload_all: bool,
	/// Construct the hover preloader.
	pub observe_hover_preload: bool,
	/// The not-found handler.
	#[serde(deserialize_with = "de_not_found")]
	pub not_found: Option<RouteSpec>,
	/// Base URL for pattern compilation and normalization; defaults to
	/// the history host's current origin.
	pub base_url: Option<Url>,
	/// CORS mode for engine-issued resource requests.
	pub cross_origin: CrossOriginMode,
	/// Referrer policy for engine-issued resource requests.
	pub referrer_policy: ReferrerPolicy,
	/// Fetch priority for engine-issued resource requests.
	pub fetch_priority: FetchPriority,
	/// The `as` hint used when preloading handler modules.
	pub preload_as: String,
	/// Selector of the render root, recorded for the surface.
	pub root_selector: Option<String>,
	/// Selector of the interception root, recorded for the host.
	pub intercept_root_selector: Option<String>,
	/// View-transition configuration, recorded for the surface.
	pub transition: Option<TransitionSpec>,
	/// Scroll restoration mode, recorded for the host.
	pub scroll_restoration: ScrollRestoration,
	/// An external token that also fires the init-returned token.
	#[serde(skip)]
	pub external_token: Option<CancellationToken>,
}

impl Default for RouterOptions {
	fn default() -> Self {
		Self {
			preload_all: false,
			observe_hover_preload: false,
			not_found: None,
			base_url: None,
			cross_origin: CrossOriginMode::default(),
			referrer_policy: ReferrerPolicy::default(),
			fetch_priority: FetchPriority::default(),
			preload_as: "script".to_string(),
			root_selector: None,
			intercept_root_selector: None,
			transition: None,
			scroll_restoration: ScrollRestoration::default(),
			external_token: None,
		}
	}
}

fn de_not_found<'de, D>(deserializer: D) -> Result<Option<RouteSpec>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<String>::deserialize(deserializer)?.map(RouteSpec::Module))
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_route_table_preserves_document_order() {
		let table: RouteTable = serde_json::from_value(json!({
			"/a": "./views/a.js",
			"/a/:id": "./views/detail.js",
			"/b": "./views/b.js",
		}))
		.unwrap();

		let patterns: Vec<_> = table.iter().map(|(pattern, _)| pattern).collect();
		assert_eq!(patterns, vec!["/a", "/a/:id", "/b"]);
	}

	#[test]
	fn test_route_table_builder() {
		let table = RouteTable::new()
			.route("/", "./views/home.js")
			.route("/about", "./views/about.js");
		assert_eq!(table.len(), 2);
	}

	#[test]
	fn test_options_deserialize_defaults() {
		let options: RouterOptions = serde_json::from_value(json!({})).unwrap();
		assert!(!options.preload_all);
		assert_eq!(options.preload_as, "script");
		assert_eq!(options.fetch_priority, FetchPriority::Low);
		assert_eq!(options.scroll_restoration, ScrollRestoration::Auto);
	}

	#[test]
	fn test_options_deserialize_full() {
		let options: RouterOptions = serde_json::from_value(json!({
			"preload_all": true,
			"observe_hover_preload": true,
			"not_found": "./views/404.js",
			"base_url": "https://app.example.com/",
			"cross_origin": "use-credentials",
			"referrer_policy": "origin",
			"fetch_priority": "high",
			"scroll_restoration": "manual",
		}))
		.unwrap();

		assert!(options.preload_all);
		assert!(matches!(options.not_found, Some(RouteSpec::Module(ref s)) if s == "./views/404.js"));
		assert_eq!(options.cross_origin, CrossOriginMode::UseCredentials);
		assert_eq!(options.referrer_policy, ReferrerPolicy::Origin);
		assert_eq!(options.fetch_priority, FetchPriority::High);
		assert_eq!(options.scroll_restoration, ScrollRestoration::Manual);
	}
}
