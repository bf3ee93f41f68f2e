//! Navigation engine error types.
//!
//! This module defines all error types used throughout the engine. Handler
//! and resolution failures degrade to rendered error text at the resolver
//! boundary; only input validation and pre-commit cancellation surface as
//! `Err` to callers.

use thiserror::Error;

use crate::cancel::AbortReason;

/// Result type for navigation operations.
pub type NavigationResult<T> = Result<T, NavigationError>;

/// Navigation engine errors.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum NavigationError {
	/// A route pattern could not be compiled.
	#[error("invalid route pattern '{pattern}': {reason}")]
	InvalidPattern {
		/// The offending pattern source text.
		pattern: String,
		/// Why compilation failed.
		reason: String,
	},

	/// An input could not be normalized to an absolute URL.
	#[error("cannot resolve '{input}' to an absolute URL: {reason}")]
	InvalidUrl {
		/// The raw input.
		input: String,
		/// Parser diagnostic.
		reason: String,
	},

	/// A handler module was missing or failed to load.
	#[error("failed to resolve handler '{specifier}': {reason}")]
	HandlerResolution {
		/// The module specifier that failed.
		specifier: String,
		/// Why loading failed.
		reason: String,
	},

	/// A handler produced a missing or invalid shape.
	#[error("handler for '{url}' has a missing or invalid shape: {detail}")]
	HandlerContract {
		/// The URL being resolved.
		url: String,
		/// What was wrong with the shape.
		detail: String,
	},

	/// The operation was cancelled by a caller- or engine-derived token.
	#[error("navigation aborted: {0}")]
	Aborted(AbortReason),

	/// A preload/prefetch request failed to load.
	#[error("failed to load resource '{url}': {reason}")]
	ResourceLoad {
		/// The resource URL.
		url: String,
		/// Load diagnostic.
		reason: String,
	},

	/// One or more bulk route registrations failed.
	#[error(transparent)]
	RouteInit(#[from] AggregateRouteInitError),

	/// Multiple deferred lifecycle tasks failed.
	#[error(transparent)]
	Aggregate(AggregateError),
}

/// A single failed registration from a bulk `init`.
#[derive(Debug, Clone)]
pub struct RegistrationFailure {
	/// The pattern that failed to register.
	pub pattern: String,
	/// The underlying error.
	pub error: NavigationError,
}

/// Collected failures from bulk route registration.
///
/// Raised only after every registration has settled; the successfully
/// registered entries remain in the registry.
#[derive(Debug, Clone, Default)]
pub struct AggregateRouteInitError {
	/// All failed registrations, in table order.
	pub failures: Vec<RegistrationFailure>,
}

impl std::fmt::Display for AggregateRouteInitError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} route registration(s) failed", self.failures.len())?;
		for failure in &self.failures {
			write!(f, "; '{}': {}", failure.pattern, failure.error)?;
		}
		Ok(())
	}
}

impl std::error::Error for AggregateRouteInitError {}

/// Collected failures from an event's deferred tasks.
#[derive(Debug, Clone, Default)]
pub struct AggregateError {
	/// Every task failure, in registration order.
	pub errors: Vec<NavigationError>,
}

impl std::fmt::Display for AggregateError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} deferred task(s) failed", self.errors.len())?;
		for error in &self.errors {
			write!(f, "; {}", error)?;
		}
		Ok(())
	}
}

impl std::error::Error for AggregateError {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_invalid_pattern_display() {
		let err = NavigationError::InvalidPattern {
			pattern: "/x/:".to_string(),
			reason: "parameter is missing a name".to_string(),
		};
		assert_eq!(
			err.to_string(),
			"invalid route pattern '/x/:': parameter is missing a name"
		);
	}

	#[test]
	fn test_aggregate_route_init_display() {
		let err = AggregateRouteInitError {
			failures: vec![RegistrationFailure {
				pattern: "/a/(".to_string(),
				error: NavigationError::InvalidPattern {
					pattern: "/a/(".to_string(),
					reason: "unbalanced group".to_string(),
				},
			}],
		};
		let rendered = err.to_string();
		assert!(rendered.contains("1 route registration(s) failed"));
		assert!(rendered.contains("/a/("));
	}

	#[test]
	fn test_aggregate_error_counts_all() {
		let err = AggregateError {
			errors: vec![
				NavigationError::Aborted(AbortReason::Timeout),
				NavigationError::ResourceLoad {
					url: "https://example.com/app.js".to_string(),
					reason: "connection refused".to_string(),
				},
			],
		};
		assert!(err.to_string().starts_with("2 deferred task(s) failed"));
	}
}
