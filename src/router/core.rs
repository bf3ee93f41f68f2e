//! The navigation controller.
//!
//! [`Router`] is an explicit context object owned by the embedding
//! application — there is no hidden global state. It orchestrates the
//! registry, resolver, loader, and lifecycle bus into the public
//! operations (`navigate`, `back`, `forward`, `go`, `reload`, `init`) and
//! owns current-location/state bookkeeping.
//!
//! Across concurrent `navigate` calls there is **no serialization**: both
//! run interleaved and the last content swap wins the visible result. This
//! is a documented, preserved behavior; embedders that need ordering must
//! serialize their own calls.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use http::Method;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, warn};
use url::Url;

use super::options::{RouteSpec, RouteTable, RouterOptions};
use crate::cancel::{AbortReason, CancellationSource, CancellationToken};
use crate::content::{
	is_no_body_method, Content, DisposerStack, DocumentPayload, FormPayload,
};
use crate::error::{AggregateRouteInitError, NavigationError, RegistrationFailure};
use crate::host::{
	DocumentFetcher, ErrorReporter, HistoryHost, MetadataSink, ModuleHost, NullMetadata,
	RenderSurface, ResourceArtifact, ResourceHost, StateStore, TracingReporter,
};
use crate::lifecycle::{EventDetail, LifecycleBus, LifecycleEvent, NavigationKind};
use crate::loader::{HoverPreloader, ResourceLoader, ResourceOptions, ResourceRequest};
use crate::pattern::PathPattern;
use crate::registry::{RouteRegistry, RouteTarget};
use crate::resolver::{ContentResolver, Resolution, ResolveRequest};
use crate::state::{NavigationState, StateBlob, StateDiff};

use crate::host::memory::{MemoryStateStore, StaticModuleHost};

/// Grace period before a superseded navigation's token is cancelled, so
/// the outgoing navigation's own terminating `load` event is never
/// mistaken for a supersession.
const SUPERSEDE_GRACE: Duration = Duration::from_millis(50);

/// Options for a single `navigate`/`submit` call.
#[derive(Debug, Clone)]
pub struct NavigateOptions {
	/// The navigation method.
	pub method: Method,
	/// A form payload; folded into the query string for no-body methods.
	pub form: Option<FormPayload>,
	/// Caller cancellation token.
	pub token: Option<CancellationToken>,
}

impl Default for NavigateOptions {
	fn default() -> Self {
		Self {
			method: Method::GET,
			form: None,
			token: None,
		}
	}
}

/// A link activation reported by the host's interception layer.
#[derive(Debug, Clone)]
pub struct LinkActivation {
	/// The link's href, raw.
	pub href: String,
	/// The link opted out of interception (`rel~="external"`).
	pub external: bool,
	/// The activation came from a trusted user gesture.
	pub trusted: bool,
}

/// A form submission reported by the host's interception layer.
#[derive(Debug, Clone)]
pub struct FormActivation {
	/// The form's action, raw.
	pub action: String,
	/// The form method.
	pub method: Method,
	/// The collected form fields.
	pub form: FormPayload,
	/// The submission came from a trusted user gesture.
	pub trusted: bool,
}

/// The in-flight navigation the engine considers current.
#[derive(Default)]
struct ActiveNavigation {
	source: Option<CancellationSource>,
	disposers: DisposerStack,
}

enum Commit {
	Done(Content),
	Redirect(Url),
}

struct RouterInner {
	registry: Arc<RwLock<RouteRegistry>>,
	bus: LifecycleBus,
	resolver: ContentResolver,
	loader: Arc<ResourceLoader>,
	modules: Arc<dyn ModuleHost>,
	surface: Arc<dyn RenderSurface>,
	history: Arc<dyn HistoryHost>,
	store: Arc<dyn StateStore>,
	reporter: Arc<dyn ErrorReporter>,
	options: RwLock<RouterOptions>,
	hover: RwLock<Option<Arc<HoverPreloader>>>,
	current_url: Mutex<Url>,
	active: Mutex<ActiveNavigation>,
	jumps: watch::Sender<u64>,
	pop_installed: AtomicBool,
}

/// The navigation engine's context object.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Router {
	inner: Arc<RouterInner>,
}

impl Router {
	/// Starts building a router.
	pub fn builder() -> RouterBuilder {
		RouterBuilder::default()
	}

	/// Returns the lifecycle bus, for connecting listeners.
	pub fn bus(&self) -> &LifecycleBus {
		&self.inner.bus
	}

	/// Returns the hover preloader, when `init` constructed one.
	pub fn hover_preloader(&self) -> Option<Arc<HoverPreloader>> {
		self.inner.hover.read().clone()
	}

	/// Returns the first registered pattern matching `url`.
	pub fn find_path(&self, url: &Url) -> Option<PathPattern> {
		self.inner.registry.read().find_pattern(url).cloned()
	}

	/// Registers a single route outside of `init`.
	///
	/// # Errors
	///
	/// Returns [`NavigationError::InvalidPattern`] if the pattern does not
	/// compile.
	pub fn register(&self, pattern: &str, spec: RouteSpec) -> Result<(), NavigationError> {
		let base = self.base();
		self.inner
			.registry
			.write()
			.register(pattern, Some(&base), spec.into_target())
	}

	/// Installs (or clears) the not-found handler outside of `init`.
	pub fn set_not_found(&self, spec: Option<RouteSpec>) {
		self.inner
			.resolver
			.set_not_found(spec.map(RouteSpec::into_target));
	}

	/// Empties the route registry. Teardown helper.
	pub fn clear_routes(&self) {
		self.inner.registry.write().clear();
	}

	/// The base URL used for normalization and pattern compilation.
	pub fn base(&self) -> Url {
		if let Some(base) = self.inner.options.read().base_url.clone() {
			return base;
		}
		let current = self.inner.history.current().url;
		current.join("/").unwrap_or(current)
	}

	/// Initializes the engine: bulk-registers the route table, installs
	/// the not-found handler and host pop listener, optionally preloads
	/// remote handlers and constructs the hover preloader, and performs
	/// one navigate-free resolution of the current location.
	///
	/// Returns a cancellation token that fires on the very next
	/// navigation, for one-shot startup cleanup. When
	/// `options.external_token` is set, its cancellation also fires the
	/// returned token.
	///
	/// # Errors
	///
	/// Returns [`NavigationError::RouteInit`] when any registration
	/// failed; failures are collected across the whole table, never
	/// fail-fast, and the successful entries stay registered.
	pub async fn init(
		&self,
		table: RouteTable,
		options: RouterOptions,
	) -> Result<CancellationToken, NavigationError> {
		*self.inner.options.write() = options.clone();
		let base = self.base();

		let mut failures = Vec::new();
		{
			let mut registry = self.inner.registry.write();
			for (pattern, spec) in table.into_entries() {
				match PathPattern::parse(&pattern, Some(&base)) {
					Ok(compiled) => registry.register_compiled(compiled, spec.into_target()),
					Err(error) => failures.push(RegistrationFailure { pattern, error }),
				}
			}
		}
		if !failures.is_empty() {
			return Err(NavigationError::RouteInit(AggregateRouteInitError {
				failures,
			}));
		}

		if let Some(not_found) = options.not_found.clone() {
			self.inner
				.resolver
				.set_not_found(Some(not_found.into_target()));
		}

		if options.preload_all {
			self.preload_registered(&base, &options);
		}

		if options.observe_hover_preload {
			let defaults = ResourceOptions {
				as_kind: Some(options.preload_as.clone()),
				cross_origin: options.cross_origin,
				referrer_policy: options.referrer_policy,
				priority: options.fetch_priority,
				..ResourceOptions::default()
			};
			*self.inner.hover.write() = Some(Arc::new(HoverPreloader::new(
				Arc::clone(&self.inner.registry),
				Arc::clone(&self.inner.modules),
				Arc::clone(&self.inner.loader),
				base.clone(),
				defaults,
			)));
		}

		// Host pop listener.
		let router = self.clone();
		self.inner.history.set_pop_handler(Arc::new(move |popped: NavigationState| {
			let router = router.clone();
			tokio::spawn(async move {
				router.handle_pop(popped).await;
			});
		}));
		self.inner.pop_installed.store(true, Ordering::Release);

		// Initial, navigate-free resolution of the current location.
		let current = self.inner.history.current();
		let (token, disposers) = self.begin_navigation(None);
		let resolution = self
			.inner
			.resolver
			.resolve(
				&current.url,
				ResolveRequest {
					state: self.inner.store.current(),
					method: Method::GET,
					form: None,
					token,
					disposers,
				},
			)
			.await;
		match resolution {
			Resolution::Content(content) => {
				if let Err(error) = self.inner.surface.replace_content(content).await {
					self.inner.reporter.report(&error);
				}
			}
			Resolution::Redirect(next) => {
				let _ = self.renavigate(next).await;
			}
		}

		// Startup cleanup token: cancelled by the very next navigation.
		let startup = CancellationSource::new();
		let startup_token = startup.token();
		let slot = Arc::new(Mutex::new(Some(startup)));
		{
			let slot = Arc::clone(&slot);
			let inner = Arc::downgrade(&self.inner);
			self.inner.bus.connect(
				Arc::new(move |_event: &LifecycleEvent| {
					if let Some(source) = slot.lock().take() {
						source.cancel(AbortReason::Superseded);
					}
					if let Some(inner) = inner.upgrade() {
						inner.bus.disconnect("startup-cleanup");
					}
				}),
				Some(&[NavigationKind::Navigate, NavigationKind::Submit]),
				Some("startup-cleanup"),
			);
		}
		if let Some(external) = options.external_token.clone() {
			let slot = Arc::clone(&slot);
			tokio::spawn(async move {
				let reason = external.cancelled().await;
				if let Some(source) = slot.lock().take() {
					source.cancel(reason);
				}
			});
		}

		Ok(startup_token)
	}

	/// Navigates to `url`, pushing `new_state` onto the history stack.
	///
	/// Returns `Ok(Some(content))` when the navigation committed,
	/// `Ok(None)` when it was a no-op, was prevented, or its commit was
	/// rolled back (the commit error goes to the out-of-band reporter).
	///
	/// # Errors
	///
	/// Returns [`NavigationError::InvalidUrl`] for an unnormalizable
	/// input, or [`NavigationError::Aborted`] when `options.token` was
	/// already cancelled at entry.
	pub async fn navigate(
		&self,
		url: &str,
		new_state: StateBlob,
		options: NavigateOptions,
	) -> Result<Option<Content>, NavigationError> {
		self.navigate_with_kind(NavigationKind::Navigate, url, new_state, options)
			.await
	}

	/// Navigates as a form submission (`submit` lifecycle reason).
	///
	/// Same contract as [`navigate`](Self::navigate).
	///
	/// # Errors
	///
	/// See [`navigate`](Self::navigate).
	pub async fn submit(
		&self,
		action: &str,
		new_state: StateBlob,
		options: NavigateOptions,
	) -> Result<Option<Content>, NavigationError> {
		self.navigate_with_kind(NavigationKind::Submit, action, new_state, options)
			.await
	}

	async fn navigate_with_kind(
		&self,
		kind: NavigationKind,
		url: &str,
		new_state: StateBlob,
		options: NavigateOptions,
	) -> Result<Option<Content>, NavigationError> {
		// Normalization is a single linear pass at the operation entry.
		let base = self.base();
		let mut target = Url::options()
			.base_url(Some(&base))
			.parse(url)
			.map_err(|error| NavigationError::InvalidUrl {
				input: url.to_string(),
				reason: error.to_string(),
			})?;

		// No-body methods fold the form payload into the query string.
		let mut form = options.form;
		if is_no_body_method(&options.method) {
			if let Some(payload) = form.take() {
				let mut pairs = target.query_pairs_mut();
				for (name, value) in payload.iter() {
					pairs.append_pair(name, value);
				}
			}
		}

		let current = self.inner.history.current();
		if target == current.url {
			debug!(%target, "navigation to the current location is a no-op");
			return Ok(None);
		}

		if let Some(token) = &options.token {
			if let Some(reason) = token.reason() {
				return Err(NavigationError::Aborted(reason));
			}
		}

		let old_state = self.inner.store.current();
		let diff = StateDiff::between(&new_state, &old_state);

		debug!(%kind, %target, phase = "requesting", "dispatching pre-navigation event");
		let event = LifecycleEvent::new(
			kind,
			EventDetail {
				old_url: current.url.clone(),
				new_url: Some(target.clone()),
				old_state: old_state.clone(),
				new_state: Some(new_state.clone()),
				method: options.method.clone(),
				form: form.clone(),
				delta: None,
			},
		);
		self.dispatch(&event);
		let outcome = event.close().await;
		if let Some(error) = outcome.error {
			self.inner.reporter.report(&error);
		}
		if outcome.prevented {
			// Point of no return not crossed: no history push happened.
			debug!(%target, phase = "cancelled", "navigation prevented");
			return Ok(None);
		}

		debug!(%target, phase = "committing", "committing navigation");
		let (token, disposers) = self.begin_navigation(options.token.clone());
		let commit = self
			.commit(
				&target,
				current.url.clone(),
				&new_state,
				&diff,
				options.method.clone(),
				form,
				token,
				disposers,
			)
			.await;
		match commit {
			Ok(Commit::Done(content)) => Ok(Some(content)),
			Ok(Commit::Redirect(next)) => {
				debug!(%next, "handler redirected; navigating");
				self.renavigate(next).await
			}
			Err(error) => {
				// Restore address-bar consistency, then report out-of-band.
				warn!(%error, "commit failed; rolling back");
				self.inner.history.back();
				self.inner.reporter.report(&error);
				Ok(None)
			}
		}
	}

	#[allow(clippy::too_many_arguments)]
	async fn commit(
		&self,
		target: &Url,
		old_url: Url,
		new_state: &StateBlob,
		diff: &StateDiff,
		method: Method,
		form: Option<FormPayload>,
		token: CancellationToken,
		disposers: DisposerStack,
	) -> Result<Commit, NavigationError> {
		self.inner.history.push(target, new_state);

		let resolution = self
			.inner
			.resolver
			.resolve(
				target,
				ResolveRequest {
					state: new_state.clone(),
					method: method.clone(),
					form,
					token,
					disposers,
				},
			)
			.await;
		let content = match resolution {
			Resolution::Redirect(next) => return Ok(Commit::Redirect(next)),
			Resolution::Content(content) => content,
		};

		self.inner.store.apply(diff);
		self.inner.surface.replace_content(content.clone()).await?;
		*self.inner.current_url.lock() = target.clone();
		self.fire_load(old_url, target, method).await;
		Ok(Commit::Done(content))
	}

	/// Jumps one entry back, after a cancelable `back` event.
	///
	/// Resolves once the pop-driven resolution completes, so programmatic
	/// jumps can be serialized. Returns whether the jump proceeded.
	///
	/// # Errors
	///
	/// Currently infallible; the `Result` reserves the error channel.
	pub async fn back(&self) -> Result<bool, NavigationError> {
		self.jump(NavigationKind::Back, -1).await
	}

	/// Jumps one entry forward. See [`back`](Self::back).
	///
	/// # Errors
	///
	/// See [`back`](Self::back).
	pub async fn forward(&self) -> Result<bool, NavigationError> {
		self.jump(NavigationKind::Forward, 1).await
	}

	/// Jumps by `delta` entries. See [`back`](Self::back).
	///
	/// # Errors
	///
	/// See [`back`](Self::back).
	pub async fn go(&self, delta: i32) -> Result<bool, NavigationError> {
		self.jump(NavigationKind::Go, delta).await
	}

	/// Re-resolves the current location via a delta-zero history jump,
	/// after a cancelable `reload` event.
	///
	/// # Errors
	///
	/// See [`back`](Self::back).
	pub async fn reload(&self) -> Result<bool, NavigationError> {
		self.jump(NavigationKind::Reload, 0).await
	}

	async fn jump(&self, kind: NavigationKind, delta: i32) -> Result<bool, NavigationError> {
		let current = self.inner.history.current();
		let event = LifecycleEvent::new(
			kind,
			EventDetail {
				old_url: current.url.clone(),
				new_url: None,
				old_state: self.inner.store.current(),
				new_state: None,
				method: Method::GET,
				form: None,
				delta: Some(delta),
			},
		);
		self.dispatch(&event);
		let outcome = event.close().await;
		if let Some(error) = outcome.error {
			self.inner.reporter.report(&error);
		}
		if outcome.prevented {
			debug!(%kind, "jump prevented");
			return Ok(false);
		}

		let wait = self.inner.pop_installed.load(Ordering::Acquire);
		let mut rx = self.inner.jumps.subscribe();
		let seen = *rx.borrow();

		match kind {
			NavigationKind::Back => self.inner.history.back(),
			NavigationKind::Forward => self.inner.history.forward(),
			_ => self.inner.history.go(delta),
		}

		if wait {
			// Await the pop-driven resolution (or a prevented pop) so
			// callers can serialize programmatic jumps.
			let _ = rx.wait_for(|completed| *completed > seen).await;
		}
		Ok(true)
	}

	/// Handles a host pop notification: dispatches the `pop` event,
	/// notifies the state diff, re-resolves the popped location, and
	/// fires `load`.
	///
	/// Preventing the `pop` event skips re-resolution only — the host
	/// cursor has already moved.
	pub async fn handle_pop(&self, popped: NavigationState) {
		let previous_url = self.inner.current_url.lock().clone();
		let event = LifecycleEvent::new(
			NavigationKind::Pop,
			EventDetail {
				old_url: previous_url.clone(),
				new_url: Some(popped.url.clone()),
				old_state: self.inner.store.current(),
				new_state: Some(popped.state.clone()),
				method: Method::GET,
				form: None,
				delta: None,
			},
		);
		self.dispatch(&event);
		let outcome = event.close().await;
		if let Some(error) = outcome.error {
			self.inner.reporter.report(&error);
		}
		if outcome.prevented {
			debug!(url = %popped.url, "pop prevented; skipping re-resolution");
			self.complete_jump();
			return;
		}

		let old_state = self.inner.store.current();
		let diff = StateDiff::between(&popped.state, &old_state);
		self.inner.store.apply(&diff);

		let (token, disposers) = self.begin_navigation(None);
		let resolution = self
			.inner
			.resolver
			.resolve(
				&popped.url,
				ResolveRequest {
					state: popped.state.clone(),
					method: Method::GET,
					form: None,
					token,
					disposers,
				},
			)
			.await;
		match resolution {
			Resolution::Redirect(next) => {
				self.complete_jump();
				let _ = self.renavigate(next).await;
			}
			Resolution::Content(content) => match self.inner.surface.replace_content(content).await
			{
				Ok(()) => {
					*self.inner.current_url.lock() = popped.url.clone();
					self.fire_load(previous_url, &popped.url, Method::GET).await;
				}
				Err(error) => {
					self.inner.reporter.report(&error);
					self.complete_jump();
				}
			},
		}
	}

	/// Reports a link activation from the interception layer.
	///
	/// Same-origin, trusted, non-external activations become navigations;
	/// anything else is left to the host (`Ok(None)`).
	///
	/// # Errors
	///
	/// See [`navigate`](Self::navigate).
	pub async fn handle_link(
		&self,
		activation: LinkActivation,
	) -> Result<Option<Content>, NavigationError> {
		if !activation.trusted || activation.external {
			return Ok(None);
		}
		let base = self.base();
		let Ok(target) = Url::options().base_url(Some(&base)).parse(&activation.href) else {
			debug!(href = %activation.href, "unparseable link target; not intercepted");
			return Ok(None);
		};
		if target.origin() != base.origin() {
			debug!(%target, "cross-origin link; not intercepted");
			return Ok(None);
		}
		let state = self.inner.store.current();
		self.navigate(target.as_str(), state, NavigateOptions::default())
			.await
	}

	/// Reports a form submission from the interception layer.
	///
	/// Same-origin, trusted submissions become `submit` navigations with
	/// method/payload folding; anything else is left to the host.
	///
	/// # Errors
	///
	/// See [`navigate`](Self::navigate).
	pub async fn handle_submit(
		&self,
		activation: FormActivation,
	) -> Result<Option<Content>, NavigationError> {
		if !activation.trusted {
			return Ok(None);
		}
		let base = self.base();
		let Ok(action) = Url::options().base_url(Some(&base)).parse(&activation.action) else {
			debug!(action = %activation.action, "unparseable form action; not intercepted");
			return Ok(None);
		};
		if action.origin() != base.origin() {
			debug!(%action, "cross-origin form; not intercepted");
			return Ok(None);
		}
		let state = self.inner.store.current();
		self.navigate_with_kind(
			NavigationKind::Submit,
			action.as_str(),
			state,
			NavigateOptions {
				method: activation.method,
				form: Some(activation.form),
				token: None,
			},
		)
		.await
	}

	/// Dispatches an event, superseding the previous navigation's token
	/// for every state-changing kind.
	fn dispatch(&self, event: &LifecycleEvent) {
		if event.kind() != NavigationKind::Load {
			let previous = self.inner.active.lock().source.take();
			if let Some(source) = previous {
				tokio::spawn(async move {
					tokio::time::sleep(SUPERSEDE_GRACE).await;
					source.cancel(AbortReason::Superseded);
				});
			}
		}
		self.inner.bus.dispatch(event);
	}

	/// Installs a fresh active navigation, draining the previous page's
	/// disposer stack.
	fn begin_navigation(
		&self,
		external: Option<CancellationToken>,
	) -> (CancellationToken, DisposerStack) {
		let source = CancellationSource::new();
		let token = match external {
			Some(external) => CancellationToken::any([external, source.token()]),
			None => source.token(),
		};
		let disposers = DisposerStack::new();
		let previous = {
			let mut active = self.inner.active.lock();
			std::mem::replace(
				&mut *active,
				ActiveNavigation {
					source: Some(source),
					disposers: disposers.clone(),
				},
			)
		};
		previous.disposers.drain();
		(token, disposers)
	}

	async fn fire_load(&self, old_url: Url, new_url: &Url, method: Method) {
		let event = LifecycleEvent::new(
			NavigationKind::Load,
			EventDetail {
				old_url,
				new_url: Some(new_url.clone()),
				old_state: self.inner.store.current(),
				new_state: None,
				method,
				form: None,
				delta: None,
			},
		);
		self.inner.bus.dispatch(&event);
		let outcome = event.close().await;
		if let Some(error) = outcome.error {
			self.inner.reporter.report(&error);
		}
		self.complete_jump();
	}

	fn complete_jump(&self) {
		self.inner.jumps.send_modify(|completed| *completed += 1);
	}

	fn renavigate(&self, next: Url) -> BoxFuture<'static, Result<Option<Content>, NavigationError>> {
		let router = self.clone();
		async move {
			let state = router.inner.store.current();
			router
				.navigate(next.as_str(), state, NavigateOptions::default())
				.await
		}
		.boxed()
	}

	fn preload_registered(&self, base: &Url, options: &RouterOptions) {
		let mut specifiers: Vec<String> = self
			.inner
			.registry
			.read()
			.iter()
			.filter_map(|entry| match entry.target() {
				RouteTarget::Module(specifier) => Some(specifier.clone()),
				RouteTarget::Inline(_) => None,
			})
			.collect();
		if let Some(RouteSpec::Module(specifier)) = &options.not_found {
			specifiers.push(specifier.clone());
		}

		let resource_options = ResourceOptions {
			as_kind: Some(options.preload_as.clone()),
			cross_origin: options.cross_origin,
			referrer_policy: options.referrer_policy,
			priority: options.fetch_priority,
			..ResourceOptions::default()
		};
		for specifier in specifiers {
			let Some(target) = self.inner.modules.resolve_specifier(&specifier, base) else {
				debug!(%specifier, "specifier has no preloadable URL; skipping preload");
				continue;
			};
			let loader = Arc::clone(&self.inner.loader);
			let resource_options = resource_options.clone();
			tokio::spawn(async move {
				if let Err(error) = loader.preload_module(&target, resource_options, None).await {
					debug!(%target, %error, "module preload failed");
				}
			});
		}
	}
}

impl fmt::Debug for Router {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Router")
			.field("routes", &self.inner.registry.read().len())
			.field("current_url", &self.inner.current_url.lock().as_str())
			.finish()
	}
}

/// Builds a [`Router`] from its host collaborators.
///
/// `history` and `surface` are required; the rest default to in-memory or
/// no-op implementations.
#[derive(Default)]
pub struct RouterBuilder {
	history: Option<Arc<dyn HistoryHost>>,
	surface: Option<Arc<dyn RenderSurface>>,
	store: Option<Arc<dyn StateStore>>,
	modules: Option<Arc<dyn ModuleHost>>,
	fetcher: Option<Arc<dyn DocumentFetcher>>,
	resources: Option<Arc<dyn ResourceHost>>,
	metadata: Option<Arc<dyn MetadataSink>>,
	reporter: Option<Arc<dyn ErrorReporter>>,
	preload_timeout: Option<Duration>,
}

impl RouterBuilder {
	/// Sets the history host. Required.
	pub fn history(mut self, history: Arc<dyn HistoryHost>) -> Self {
		self.history = Some(history);
		self
	}

	/// Sets the render surface. Required.
	pub fn surface(mut self, surface: Arc<dyn RenderSurface>) -> Self {
		self.surface = Some(surface);
		self
	}

	/// Sets the state store. Defaults to an in-memory store.
	pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
		self.store = Some(store);
		self
	}

	/// Sets the module host. Defaults to an empty static host.
	pub fn modules(mut self, modules: Arc<dyn ModuleHost>) -> Self {
		self.modules = Some(modules);
		self
	}

	/// Sets the fallback document fetcher. Defaults to one that fails
	/// every fetch.
	pub fn fetcher(mut self, fetcher: Arc<dyn DocumentFetcher>) -> Self {
		self.fetcher = Some(fetcher);
		self
	}

	/// Sets the resource host. Defaults to one whose requests complete
	/// immediately.
	pub fn resources(mut self, resources: Arc<dyn ResourceHost>) -> Self {
		self.resources = Some(resources);
		self
	}

	/// Sets the metadata sink. Defaults to a no-op sink.
	pub fn metadata(mut self, metadata: Arc<dyn MetadataSink>) -> Self {
		self.metadata = Some(metadata);
		self
	}

	/// Sets the error reporter. Defaults to a `tracing`-backed reporter.
	pub fn reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
		self.reporter = Some(reporter);
		self
	}

	/// Overrides the preload timeout.
	pub fn preload_timeout(mut self, timeout: Duration) -> Self {
		self.preload_timeout = Some(timeout);
		self
	}

	/// Builds the router.
	///
	/// # Panics
	///
	/// Panics if `history` or `surface` is missing.
	pub fn build(self) -> Router {
		let history = self.history.expect("RouterBuilder requires a history host");
		let surface = self.surface.expect("RouterBuilder requires a render surface");
		let store = self
			.store
			.unwrap_or_else(|| Arc::new(MemoryStateStore::new()));
		let modules = self
			.modules
			.unwrap_or_else(|| Arc::new(StaticModuleHost::new()));
		let fetcher = self.fetcher.unwrap_or_else(|| Arc::new(NoFetcher));
		let resources = self
			.resources
			.unwrap_or_else(|| Arc::new(InertResourceHost));
		let metadata = self.metadata.unwrap_or_else(|| Arc::new(NullMetadata));
		let reporter = self.reporter.unwrap_or_else(|| Arc::new(TracingReporter));

		let registry = Arc::new(RwLock::new(RouteRegistry::new()));
		let epoch = Instant::now();
		let resolver = ContentResolver::new(
			Arc::clone(&registry),
			Arc::clone(&modules),
			Arc::clone(&fetcher),
			Arc::clone(&metadata),
			Arc::clone(&reporter),
			epoch,
		);
		let mut loader = ResourceLoader::new(Arc::clone(&resources));
		if let Some(timeout) = self.preload_timeout {
			loader = loader.with_timeout(timeout);
		}
		let current_url = history.current().url;
		let (jumps, _) = watch::channel(0u64);

		Router {
			inner: Arc::new(RouterInner {
				registry,
				bus: LifecycleBus::new(),
				resolver,
				loader: Arc::new(loader),
				modules,
				surface,
				history,
				store,
				reporter,
				options: RwLock::new(RouterOptions::default()),
				hover: RwLock::new(None),
				current_url: Mutex::new(current_url),
				active: Mutex::new(ActiveNavigation::default()),
				jumps,
				pop_installed: AtomicBool::new(false),
			}),
		}
	}
}

impl fmt::Debug for RouterBuilder {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RouterBuilder")
			.field("has_history", &self.history.is_some())
			.field("has_surface", &self.surface.is_some())
			.finish()
	}
}

/// Default fetcher: every uncovered route fails to fetch.
struct NoFetcher;

#[async_trait]
impl DocumentFetcher for NoFetcher {
	async fn fetch_document(
		&self,
		url: &Url,
		_method: &Method,
		_body: Option<&FormPayload>,
	) -> Result<DocumentPayload, NavigationError> {
		Err(NavigationError::ResourceLoad {
			url: url.to_string(),
			reason: "no document fetcher configured".to_string(),
		})
	}
}

/// Default resource host: requests complete immediately.
struct InertResourceHost;

impl ResourceHost for InertResourceHost {
	fn begin(&self, _request: &ResourceRequest) -> Box<dyn ResourceArtifact> {
		Box::new(InertArtifact)
	}
}

struct InertArtifact;

#[async_trait]
impl ResourceArtifact for InertArtifact {
	async fn completion(&self) -> Result<(), NavigationError> {
		Ok(())
	}

	fn discard(&self) {}
}
