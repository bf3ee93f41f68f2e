//! URL pattern compilation and matching.
//!
//! [`PathPattern`] is a compiled matcher over the structured parts of a
//! URL (scheme, userinfo, host, port, path, query, fragment). Each part is
//! compiled independently; parts the pattern does not mention match
//! implicitly. Supported syntax per part:
//!
//! - literal text, matched exactly
//! - `:name` — a named parameter capturing one path segment
//! - `:name(regex)` — a named parameter with an inline constraint
//! - `:name?` — an optional trailing parameter (the preceding `/` is
//!   optional too)
//! - `*` — a wildcard matching anything, including separators
//!
//! A successful [`exec`](PathPattern::exec) produces a [`PatternMatch`]
//! with a per-part mapping of captured parameter names to string values.
//! Patterns are immutable once compiled; equality is by source text.

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};
use url::Url;

use crate::error::NavigationError;

/// Maximum allowed length for a pattern string in bytes.
const MAX_PATTERN_LENGTH: usize = 1024;

/// Maximum allowed number of path segments in a pattern.
const MAX_PATH_SEGMENTS: usize = 32;

/// Maximum allowed size for a compiled part regex (in bytes).
const MAX_REGEX_SIZE: usize = 1 << 20; // 1 MiB

/// A compiled sub-pattern for one URL part.
///
/// `regex: None` is the implicit wildcard for parts the pattern does not
/// constrain.
#[derive(Debug, Clone)]
struct Component {
	regex: Option<Regex>,
	names: Vec<String>,
}

impl Component {
	fn wildcard() -> Self {
		Self {
			regex: None,
			names: Vec::new(),
		}
	}

	fn captures(&self, value: &str) -> Option<HashMap<String, String>> {
		let Some(regex) = &self.regex else {
			return Some(HashMap::new());
		};
		let caps = regex.captures(value)?;
		let mut groups = HashMap::new();
		for name in &self.names {
			if let Some(m) = caps.name(name) {
				groups.insert(name.clone(), m.as_str().to_string());
			}
		}
		Some(groups)
	}
}

/// Captured parameter values from a successful pattern test, grouped by
/// URL part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternMatch {
	/// Parameters captured from the scheme.
	pub scheme: HashMap<String, String>,
	/// Parameters captured from the userinfo.
	pub userinfo: HashMap<String, String>,
	/// Parameters captured from the host.
	pub host: HashMap<String, String>,
	/// Parameters captured from the port.
	pub port: HashMap<String, String>,
	/// Parameters captured from the path.
	pub path: HashMap<String, String>,
	/// Parameters captured from the query.
	pub query: HashMap<String, String>,
	/// Parameters captured from the fragment.
	pub fragment: HashMap<String, String>,
}

impl PatternMatch {
	/// Looks a captured parameter up by name across all parts.
	///
	/// Path captures take precedence, then query, fragment, host, scheme,
	/// userinfo, port.
	pub fn group(&self, name: &str) -> Option<&str> {
		[
			&self.path,
			&self.query,
			&self.fragment,
			&self.host,
			&self.scheme,
			&self.userinfo,
			&self.port,
		]
		.into_iter()
		.find_map(|part| part.get(name).map(String::as_str))
	}

	/// Returns `true` if no parameters were captured anywhere.
	pub fn is_empty(&self) -> bool {
		self.path.is_empty()
			&& self.query.is_empty()
			&& self.fragment.is_empty()
			&& self.host.is_empty()
			&& self.scheme.is_empty()
			&& self.userinfo.is_empty()
			&& self.port.is_empty()
	}
}

/// A compiled matcher over the structured parts of a URL.
#[derive(Debug, Clone)]
pub struct PathPattern {
	source: String,
	scheme: Component,
	userinfo: Component,
	host: Component,
	port: Component,
	path: Component,
	query: Component,
	fragment: Component,
}

impl PathPattern {
	/// Compiles a pattern string, resolving relative patterns against
	/// `base`.
	///
	/// # Errors
	///
	/// Returns [`NavigationError::InvalidPattern`] if the pattern exceeds
	/// the length or segment limits, contains an unnamed or duplicate
	/// parameter, has an unbalanced constraint group, or compiles to an
	/// invalid regex.
	pub fn parse(source: &str, base: Option<&Url>) -> Result<Self, NavigationError> {
		if source.len() > MAX_PATTERN_LENGTH {
			return Err(invalid(
				source,
				format!(
					"pattern length {} exceeds the maximum of {} bytes",
					source.len(),
					MAX_PATTERN_LENGTH
				),
			));
		}

		let parts = split_pattern(source, base)?;

		if let Some(path) = &parts.path {
			let segments = path.split('/').count();
			if segments > MAX_PATH_SEGMENTS {
				return Err(invalid(
					source,
					format!(
						"pattern has {} path segments, exceeding the maximum of {}",
						segments, MAX_PATH_SEGMENTS
					),
				));
			}
		}

		Ok(Self {
			scheme: compile_component(source, parts.scheme.as_deref())?,
			userinfo: compile_component(source, parts.userinfo.as_deref())?,
			host: compile_component(source, parts.host.as_deref())?,
			port: compile_component(source, parts.port.as_deref())?,
			path: compile_component(source, parts.path.as_deref())?,
			query: compile_component(source, parts.query.as_deref())?,
			fragment: compile_component(source, parts.fragment.as_deref())?,
			source: source.to_string(),
		})
	}

	/// Returns the original pattern source text.
	pub fn source(&self) -> &str {
		&self.source
	}

	/// Tests whether a URL satisfies every part of this pattern.
	pub fn test(&self, url: &Url) -> bool {
		self.exec(url).is_some()
	}

	/// Matches a URL against this pattern, producing per-part captures.
	///
	/// Every part must independently satisfy its sub-pattern; parts the
	/// pattern does not constrain always match.
	pub fn exec(&self, url: &Url) -> Option<PatternMatch> {
		let userinfo = match url.password() {
			Some(password) => format!("{}:{}", url.username(), password),
			None => url.username().to_string(),
		};
		let port = url.port().map(|p| p.to_string()).unwrap_or_default();

		Some(PatternMatch {
			scheme: self.scheme.captures(url.scheme())?,
			userinfo: self.userinfo.captures(&userinfo)?,
			host: self.host.captures(url.host_str().unwrap_or_default())?,
			port: self.port.captures(&port)?,
			path: self.path.captures(url.path())?,
			query: self.query.captures(url.query().unwrap_or_default())?,
			fragment: self.fragment.captures(url.fragment().unwrap_or_default())?,
		})
	}

	/// Extracts a single named parameter from a URL in one shot.
	pub fn extract(&self, url: &Url, name: &str) -> Option<String> {
		self.exec(url)
			.and_then(|m| m.group(name).map(str::to_string))
	}
}

impl PartialEq for PathPattern {
	fn eq(&self, other: &Self) -> bool {
		self.source == other.source
	}
}

impl Eq for PathPattern {}

impl std::fmt::Display for PathPattern {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.source)
	}
}

fn invalid(pattern: &str, reason: impl Into<String>) -> NavigationError {
	NavigationError::InvalidPattern {
		pattern: pattern.to_string(),
		reason: reason.into(),
	}
}

/// The raw per-part slices of a pattern string. `None` means the pattern
/// does not constrain that part.
#[derive(Debug, Default)]
struct RawParts {
	scheme: Option<String>,
	userinfo: Option<String>,
	host: Option<String>,
	port: Option<String>,
	path: Option<String>,
	query: Option<String>,
	fragment: Option<String>,
}

/// Splits a pattern string into URL parts.
///
/// `?` only terminates the path when it cannot be an optional-parameter
/// modifier, i.e. when it does not directly follow a parameter name, a
/// constraint group, or a wildcard.
fn split_pattern(source: &str, base: Option<&Url>) -> Result<RawParts, NavigationError> {
	let mut parts = RawParts::default();

	let rest = if let Some(idx) = source.find("://") {
		parts.scheme = Some(source[..idx].to_string());
		let after = &source[idx + 3..];
		let authority_end = find_depth0(after, |c, _| c == '/' || c == '#').unwrap_or(after.len());
		let authority = &after[..authority_end];
		if let Some(at) = find_depth0(authority, |c, _| c == '@') {
			parts.userinfo = Some(authority[..at].to_string());
			split_host_port(&authority[at + 1..], &mut parts);
		} else {
			split_host_port(authority, &mut parts);
		}
		after[authority_end..].to_string()
	} else if source.starts_with('/') {
		source.to_string()
	} else {
		// Relative pattern: resolve against the base URL's directory.
		let Some(base) = base else {
			return Err(invalid(source, "relative pattern requires a base URL"));
		};
		let base_path = base.path();
		let dir_end = base_path.rfind('/').map(|i| i + 1).unwrap_or(0);
		format!("{}{}", &base_path[..dir_end], source)
	};

	if rest.is_empty() {
		return Ok(parts);
	}

	let (main, query, fragment) = split_terminal(&rest);
	if !main.is_empty() || query.is_some() || fragment.is_some() {
		parts.path = Some(if main.is_empty() {
			"/".to_string()
		} else {
			main.to_string()
		});
	}
	parts.query = query.map(str::to_string);
	parts.fragment = fragment.map(str::to_string);
	Ok(parts)
}

/// Splits `host[:port]`. A `:` followed by a letter or underscore starts a
/// host parameter (`:tenant.example.com`), not a port.
fn split_host_port(host_port: &str, parts: &mut RawParts) {
	let separator = rfind_depth0(host_port, ':').filter(|&i| {
		!host_port[i + 1..]
			.chars()
			.next()
			.is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
	});
	if let Some(colon) = separator {
		parts.host = Some(host_port[..colon].to_string());
		parts.port = Some(host_port[colon + 1..].to_string());
	} else if !host_port.is_empty() {
		parts.host = Some(host_port.to_string());
	}
}

/// Splits `path[?query][#fragment]`, honoring the `?`-as-modifier rule.
fn split_terminal(s: &str) -> (&str, Option<&str>, Option<&str>) {
	let mut depth = 0usize;
	let mut in_param = false;
	let mut prev: Option<char> = None;
	let mut query_at: Option<usize> = None;
	let mut frag_at: Option<usize> = None;

	for (i, c) in s.char_indices() {
		match c {
			'(' => {
				depth += 1;
				in_param = false;
			}
			')' => depth = depth.saturating_sub(1),
			':' if depth == 0 => in_param = true,
			'#' if depth == 0 => {
				frag_at = Some(i);
				break;
			}
			'?' if depth == 0 => {
				let is_modifier = in_param || prev == Some(')') || prev == Some('*');
				if !is_modifier && query_at.is_none() {
					query_at = Some(i);
				}
				in_param = false;
			}
			other => {
				if in_param && !(other.is_ascii_alphanumeric() || other == '_') {
					in_param = false;
				}
			}
		}
		prev = Some(c);
	}

	let main_end = query_at.or(frag_at).unwrap_or(s.len());
	let query = query_at.map(|q| {
		let end = frag_at.unwrap_or(s.len());
		&s[q + 1..end]
	});
	let fragment = frag_at.map(|f| &s[f + 1..]);
	(&s[..main_end], query, fragment)
}

fn find_depth0(s: &str, pred: impl Fn(char, usize) -> bool) -> Option<usize> {
	let mut depth = 0usize;
	for (i, c) in s.char_indices() {
		match c {
			'(' => depth += 1,
			')' => depth = depth.saturating_sub(1),
			c if depth == 0 && pred(c, i) => return Some(i),
			_ => {}
		}
	}
	None
}

fn rfind_depth0(s: &str, needle: char) -> Option<usize> {
	let mut depth = 0usize;
	let mut found = None;
	for (i, c) in s.char_indices() {
		match c {
			'(' => depth += 1,
			')' => depth = depth.saturating_sub(1),
			c if depth == 0 && c == needle => found = Some(i),
			_ => {}
		}
	}
	found
}

/// Compiles one part's text into an anchored regex, extracting parameter
/// names.
fn compile_component(source: &str, text: Option<&str>) -> Result<Component, NavigationError> {
	let Some(text) = text else {
		return Ok(Component::wildcard());
	};
	if text == "*" {
		return Ok(Component::wildcard());
	}

	let mut regex_str = String::from("^");
	let mut names: Vec<String> = Vec::new();
	let mut chars = text.chars().peekable();

	while let Some(c) = chars.next() {
		match c {
			':' => {
				let mut name = String::new();
				while let Some(&next) = chars.peek() {
					if next.is_ascii_alphanumeric() || next == '_' {
						name.push(next);
						chars.next();
					} else {
						break;
					}
				}
				if name.is_empty() {
					return Err(invalid(source, "parameter is missing a name"));
				}
				if !name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
					return Err(invalid(
						source,
						format!("parameter name '{}' must start with a letter", name),
					));
				}
				if names.contains(&name) {
					return Err(invalid(source, format!("duplicate parameter '{}'", name)));
				}

				let mut constraint = None;
				if chars.peek() == Some(&'(') {
					chars.next();
					let mut depth = 1usize;
					let mut inner = String::new();
					for next in chars.by_ref() {
						match next {
							'(' => {
								depth += 1;
								inner.push(next);
							}
							')' => {
								depth -= 1;
								if depth == 0 {
									break;
								}
								inner.push(next);
							}
							_ => inner.push(next),
						}
					}
					if depth != 0 {
						return Err(invalid(
							source,
							format!("unbalanced constraint group for parameter '{}'", name),
						));
					}
					constraint = Some(inner);
				}

				let optional = if chars.peek() == Some(&'?') {
					chars.next();
					true
				} else {
					false
				};

				let group = constraint.unwrap_or_else(|| "[^/]+".to_string());
				if optional {
					// An optional trailing parameter absorbs its leading slash.
					if regex_str.ends_with("\\/") {
						regex_str.truncate(regex_str.len() - 2);
						regex_str.push_str(&format!("(?:/(?P<{}>{}))?", name, group));
					} else {
						regex_str.push_str(&format!("(?P<{}>{})?", name, group));
					}
				} else {
					regex_str.push_str(&format!("(?P<{}>{})", name, group));
				}
				names.push(name);
			}
			'*' => regex_str.push_str(".*"),
			'/' | '.' | '+' | '?' | '(' | ')' | '[' | ']' | '^' | '$' | '|' | '\\' | '{'
			| '}' => {
				regex_str.push('\\');
				regex_str.push(c);
			}
			_ => regex_str.push(c),
		}
	}
	regex_str.push('$');

	let regex = RegexBuilder::new(&regex_str)
		.size_limit(MAX_REGEX_SIZE)
		.build()
		.map_err(|e| invalid(source, format!("failed to compile part regex: {}", e)))?;

	Ok(Component {
		regex: Some(regex),
		names,
	})
}
