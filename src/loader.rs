//! Resource preloading with composable cancellation.
//!
//! Four request kinds share one cancellation-aware primitive. Preload and
//! module-preload combine the caller's token with an internal
//! default-timeout deadline token via any-of composition and settle
//! exactly once — resolving on load success, rejecting with the load error
//! or cancellation reason otherwise — discarding the backing artifact on
//! both paths. Requests are never retained for reuse; there is no shared
//! cache across calls. Prefetch, preconnect, and dns-hint are
//! fire-and-forget.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::cancel::CancellationToken;
use crate::error::NavigationError;
use crate::host::{ModuleHost, ResourceHost};
use crate::registry::{RouteRegistry, RouteTarget};

/// Default timeout for preload and module-preload requests.
pub const DEFAULT_PRELOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// The intent of a resource request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
	/// Preload a handler module.
	ModulePreload,
	/// Preload a generic resource.
	Preload,
	/// Hint a likely future fetch.
	Prefetch,
	/// Open a connection early.
	Preconnect,
	/// Resolve DNS early.
	DnsHint,
}

impl fmt::Display for ResourceKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::ModulePreload => write!(f, "modulepreload"),
			Self::Preload => write!(f, "preload"),
			Self::Prefetch => write!(f, "prefetch"),
			Self::Preconnect => write!(f, "preconnect"),
			Self::DnsHint => write!(f, "dns-prefetch"),
		}
	}
}

/// CORS mode for resource delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrossOriginMode {
	/// Anonymous CORS requests.
	#[default]
	Anonymous,
	/// Credentialed CORS requests.
	UseCredentials,
}

impl fmt::Display for CrossOriginMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Anonymous => write!(f, "anonymous"),
			Self::UseCredentials => write!(f, "use-credentials"),
		}
	}
}

/// Referrer policy for resource delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferrerPolicy {
	/// Send no referrer at all.
	#[default]
	NoReferrer,
	/// Send no referrer on downgrade.
	NoReferrerWhenDowngrade,
	/// Send the origin only.
	Origin,
	/// Send the origin cross-origin, the full URL same-origin.
	OriginWhenCrossOrigin,
	/// Send only for same-origin requests.
	SameOrigin,
	/// Send the origin, unless downgrading.
	StrictOrigin,
	/// The platform default.
	StrictOriginWhenCrossOrigin,
	/// Always send the full URL.
	UnsafeUrl,
}

impl fmt::Display for ReferrerPolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::NoReferrer => write!(f, "no-referrer"),
			Self::NoReferrerWhenDowngrade => write!(f, "no-referrer-when-downgrade"),
			Self::Origin => write!(f, "origin"),
			Self::OriginWhenCrossOrigin => write!(f, "origin-when-cross-origin"),
			Self::SameOrigin => write!(f, "same-origin"),
			Self::StrictOrigin => write!(f, "strict-origin"),
			Self::StrictOriginWhenCrossOrigin => write!(f, "strict-origin-when-cross-origin"),
			Self::UnsafeUrl => write!(f, "unsafe-url"),
		}
	}
}

/// Fetch priority for resource delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchPriority {
	/// Let the host decide.
	Auto,
	/// Deprioritized.
	#[default]
	Low,
	/// Prioritized.
	High,
}

impl fmt::Display for FetchPriority {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Auto => write!(f, "auto"),
			Self::Low => write!(f, "low"),
			Self::High => write!(f, "high"),
		}
	}
}

/// Delivery options for a resource request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceOptions {
	/// The `as` destination hint.
	pub as_kind: Option<String>,
	/// The expected MIME type.
	pub mime: Option<String>,
	/// Subresource integrity metadata.
	pub integrity: Option<String>,
	/// CORS mode.
	pub cross_origin: CrossOriginMode,
	/// Referrer policy.
	pub referrer_policy: ReferrerPolicy,
	/// Fetch priority.
	pub priority: FetchPriority,
	/// Media condition gating the request.
	pub media: Option<String>,
}

/// A transient resource request. Never cached by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
	/// The target URL.
	pub url: Url,
	/// The request intent.
	pub kind: ResourceKind,
	/// Delivery options.
	pub options: ResourceOptions,
}

/// Issues preload/prefetch/preconnect/dns-hint requests with cancellation.
pub struct ResourceLoader {
	host: Arc<dyn ResourceHost>,
	timeout: Duration,
}

impl ResourceLoader {
	/// Creates a loader with the default preload timeout.
	pub fn new(host: Arc<dyn ResourceHost>) -> Self {
		Self {
			host,
			timeout: DEFAULT_PRELOAD_TIMEOUT,
		}
	}

	/// Overrides the default preload timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	/// Preloads a handler module.
	///
	/// # Errors
	///
	/// Returns [`NavigationError::Aborted`] if `token` cancels (or the
	/// default timeout elapses) first, or [`NavigationError::ResourceLoad`]
	/// if the load fails.
	pub async fn preload_module(
		&self,
		url: &Url,
		options: ResourceOptions,
		token: Option<CancellationToken>,
	) -> Result<(), NavigationError> {
		self.load(ResourceKind::ModulePreload, url, options, token)
			.await
	}

	/// Preloads a generic resource.
	///
	/// # Errors
	///
	/// Same contract as [`preload_module`](Self::preload_module).
	pub async fn preload(
		&self,
		url: &Url,
		options: ResourceOptions,
		token: Option<CancellationToken>,
	) -> Result<(), NavigationError> {
		self.load(ResourceKind::Preload, url, options, token).await
	}

	async fn load(
		&self,
		kind: ResourceKind,
		url: &Url,
		options: ResourceOptions,
		token: Option<CancellationToken>,
	) -> Result<(), NavigationError> {
		// Reject before creating the artifact when already cancelled.
		if let Some(token) = &token {
			if let Some(reason) = token.reason() {
				return Err(NavigationError::Aborted(reason));
			}
		}

		let combined = match token {
			Some(token) => {
				CancellationToken::any([token, CancellationToken::deadline(self.timeout)])
			}
			None => CancellationToken::deadline(self.timeout),
		};

		let request = ResourceRequest {
			url: url.clone(),
			kind,
			options,
		};
		let artifact = self.host.begin(&request);

		tokio::select! {
			result = artifact.completion() => {
				artifact.discard();
				match result {
					Ok(()) => {
						debug!(%url, %kind, "resource loaded");
						Ok(())
					}
					Err(error) => {
						warn!(%url, %kind, %error, "resource load failed");
						Err(error)
					}
				}
			}
			reason = combined.cancelled() => {
				artifact.discard();
				debug!(%url, %kind, %reason, "resource load cancelled");
				Err(NavigationError::Aborted(reason))
			}
		}
	}

	/// Hints a likely future fetch. Fire-and-forget.
	pub fn prefetch(&self, url: &Url, options: ResourceOptions) {
		self.fire(ResourceKind::Prefetch, url, options);
	}

	/// Opens a connection early. Fire-and-forget.
	pub fn preconnect(&self, url: &Url, options: ResourceOptions) {
		self.fire(ResourceKind::Preconnect, url, options);
	}

	/// Resolves DNS early. Fire-and-forget.
	pub fn dns_hint(&self, url: &Url, options: ResourceOptions) {
		self.fire(ResourceKind::DnsHint, url, options);
	}

	fn fire(&self, kind: ResourceKind, url: &Url, options: ResourceOptions) {
		let request = ResourceRequest {
			url: url.clone(),
			kind,
			options,
		};
		// No completion future and no cancellation wiring.
		drop(self.host.begin(&request));
		debug!(%url, %kind, "resource hint issued");
	}
}

impl fmt::Debug for ResourceLoader {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ResourceLoader")
			.field("timeout", &self.timeout)
			.finish()
	}
}

/// Hints read off an anchor-like element at hover time.
#[derive(Debug, Clone, Default)]
pub struct ElementHints {
	/// The element opted out of hover preloading.
	pub opted_out: bool,
	/// Element-level `as` hint.
	pub as_kind: Option<String>,
	/// Element-level MIME type hint.
	pub mime: Option<String>,
}

/// Hover-triggered preloading over the route registry.
///
/// The host observes anchor-like elements (excluding opted-out ones) and
/// calls [`activate`](Self::activate) when one is hovered. Activation is
/// one-shot per URL.
pub struct HoverPreloader {
	registry: Arc<RwLock<RouteRegistry>>,
	modules: Arc<dyn ModuleHost>,
	loader: Arc<ResourceLoader>,
	base: Url,
	defaults: ResourceOptions,
	activated: Mutex<HashSet<String>>,
}

impl HoverPreloader {
	/// Creates a preloader over `registry`.
	pub fn new(
		registry: Arc<RwLock<RouteRegistry>>,
		modules: Arc<dyn ModuleHost>,
		loader: Arc<ResourceLoader>,
		base: Url,
		defaults: ResourceOptions,
	) -> Self {
		Self {
			registry,
			modules,
			loader,
			base,
			defaults,
			activated: Mutex::new(HashSet::new()),
		}
	}

	/// Handles a hover on a link to `url`.
	///
	/// If the URL matches a registered route with a remote handler, the
	/// handler module is preloaded; otherwise the URL gets a generic
	/// preload with `as`/`type` from the element hints, defaulting to
	/// `fetch`/`text/html`.
	///
	/// # Errors
	///
	/// Propagates the underlying preload failure.
	pub async fn activate(
		&self,
		url: &Url,
		hints: &ElementHints,
	) -> Result<(), NavigationError> {
		if hints.opted_out {
			return Ok(());
		}
		if !self.activated.lock().insert(url.to_string()) {
			// One-shot trigger already consumed.
			return Ok(());
		}

		let module_specifier = {
			let registry = self.registry.read();
			registry.find(url).and_then(|(entry, _)| match entry.target() {
				RouteTarget::Module(specifier) => Some(specifier.clone()),
				RouteTarget::Inline(_) => None,
			})
		};

		match module_specifier {
			Some(specifier) => {
				let Some(target) = self.modules.resolve_specifier(&specifier, &self.base) else {
					debug!(%specifier, "specifier has no preloadable URL");
					return Ok(());
				};
				self.loader
					.preload_module(&target, self.defaults.clone(), None)
					.await
			}
			None => {
				let mut options = self.defaults.clone();
				options.as_kind = hints
					.as_kind
					.clone()
					.or_else(|| Some("fetch".to_string()));
				options.mime = hints.mime.clone().or_else(|| Some("text/html".to_string()));
				self.loader.preload(url, options, None).await
			}
		}
	}
}

impl fmt::Debug for HoverPreloader {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("HoverPreloader")
			.field("base", &self.base.as_str())
			.field("activated", &self.activated.lock().len())
			.finish()
	}
}
