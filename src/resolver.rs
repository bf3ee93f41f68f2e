//! Turning a matched (or unmatched) location into renderable content.
//!
//! The resolver invokes the bound handler with a frozen argument bundle
//! and exhaustively maps its outcome to [`Content`]. Failures never
//! propagate past this boundary: any resolution-time error, and any
//! cancellation observed on the bundle's token, degrades to rendered
//! error text — a broken route must never take the page down with it.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use http::Method;
use parking_lot::RwLock;
use tracing::{debug, warn};
use url::Url;

use crate::cancel::CancellationToken;
use crate::content::{
	ComponentRegistry, Content, DisposerStack, FormPayload, HandlerArgs, HandlerFn,
	HandlerOutcome, MetaField,
};
use crate::error::NavigationError;
use crate::host::{DocumentFetcher, ErrorReporter, MetadataSink, ModuleHost};
use crate::registry::{RouteRegistry, RouteTarget};

/// A function-shaped outcome may re-enter resolution at most this many
/// times before the chain is treated as a broken contract.
const MAX_DEFER_DEPTH: usize = 32;

/// What a resolution produced.
#[derive(Debug, Clone)]
pub enum Resolution {
	/// Renderable content for the surface.
	Content(Content),
	/// A nested navigation target; rendered by navigating, not swapping.
	Redirect(Url),
}

/// Per-resolution inputs.
#[derive(Clone)]
pub struct ResolveRequest {
	/// The state blob at resolution time.
	pub state: crate::state::StateBlob,
	/// The navigation method.
	pub method: Method,
	/// The form payload, when one survived method folding.
	pub form: Option<FormPayload>,
	/// Cancellation token for this resolution.
	pub token: CancellationToken,
	/// Teardown stack for the rendered page.
	pub disposers: DisposerStack,
}

/// Resolves locations into renderable content.
pub struct ContentResolver {
	registry: Arc<RwLock<RouteRegistry>>,
	modules: Arc<dyn ModuleHost>,
	fetcher: Arc<dyn DocumentFetcher>,
	metadata: Arc<dyn MetadataSink>,
	reporter: Arc<dyn ErrorReporter>,
	components: ComponentRegistry,
	not_found: RwLock<Option<RouteTarget>>,
	epoch: Instant,
}

impl ContentResolver {
	/// Creates a resolver over the shared registry and hosts.
	pub fn new(
		registry: Arc<RwLock<RouteRegistry>>,
		modules: Arc<dyn ModuleHost>,
		fetcher: Arc<dyn DocumentFetcher>,
		metadata: Arc<dyn MetadataSink>,
		reporter: Arc<dyn ErrorReporter>,
		epoch: Instant,
	) -> Self {
		Self {
			registry,
			modules,
			fetcher,
			metadata,
			reporter,
			components: ComponentRegistry::new(),
			not_found: RwLock::new(None),
			epoch,
		}
	}

	/// Installs (or clears) the custom not-found handler.
	pub fn set_not_found(&self, target: Option<RouteTarget>) {
		*self.not_found.write() = target;
	}

	/// Returns whether a custom not-found handler is installed.
	pub fn has_not_found(&self) -> bool {
		self.not_found.read().is_some()
	}

	/// Resolves `url` into content.
	///
	/// Never fails: errors degrade to [`Content::ErrorText`] after being
	/// reported out-of-band.
	pub async fn resolve(&self, url: &Url, request: ResolveRequest) -> Resolution {
		match self.resolve_inner(url, &request).await {
			Ok(resolution) => resolution,
			Err(error) => {
				warn!(%url, %error, "resolution failed");
				self.reporter.report(&error);
				Resolution::Content(Content::ErrorText(error.to_string()))
			}
		}
	}

	async fn resolve_inner(
		&self,
		url: &Url,
		request: &ResolveRequest,
	) -> Result<Resolution, NavigationError> {
		let matched = {
			let registry = self.registry.read();
			registry
				.find(url)
				.map(|(entry, captures)| (entry.target().clone(), captures))
		};

		match matched {
			Some((target, captures)) => {
				let args = self.build_args(url, Some(captures), request);
				self.invoke_target(&target, args).await
			}
			None => {
				let not_found = self.not_found.read().clone();
				match not_found {
					Some(target) => {
						debug!(%url, method = %request.method, "no route matched; using not-found handler");
						let args = self.build_args(url, None, request);
						self.invoke_target(&target, args).await
					}
					None => {
						debug!(%url, "no route matched; fetching document");
						let document = self
							.fetcher
							.fetch_document(url, &request.method, request.form.as_ref())
							.await?;
						Ok(Resolution::Content(Content::Document(document)))
					}
				}
			}
		}
	}

	fn build_args(
		&self,
		url: &Url,
		captures: Option<crate::pattern::PatternMatch>,
		request: &ResolveRequest,
	) -> HandlerArgs {
		HandlerArgs {
			url: url.clone(),
			matches: captures,
			state: request.state.clone(),
			method: request.method.clone(),
			timestamp_ms: self.epoch.elapsed().as_secs_f64() * 1000.0,
			token: request.token.clone(),
			form: request.form.clone(),
			disposers: request.disposers.clone(),
		}
	}

	async fn invoke_target(
		&self,
		target: &RouteTarget,
		args: HandlerArgs,
	) -> Result<Resolution, NavigationError> {
		let (handler, meta): (HandlerFn, Option<(Option<MetaField>, Option<MetaField>)>) =
			match target {
				RouteTarget::Module(specifier) => {
					let module = self.modules.load_module(specifier).await?;
					if let Some(reason) = args.token.reason() {
						return Err(NavigationError::Aborted(reason));
					}
					let handler =
						module
							.default
							.ok_or_else(|| NavigationError::HandlerContract {
								url: args.url.to_string(),
								detail: format!("module '{}' has no default handler", specifier),
							})?;
					(handler, Some((module.title, module.description)))
				}
				RouteTarget::Inline(handler) => (handler.clone(), None),
			};

		let mut outcome = handler(args.clone()).await;
		let mut depth = 0usize;
		let content = loop {
			match outcome {
				HandlerOutcome::Defer(next) => {
					depth += 1;
					if depth > MAX_DEFER_DEPTH {
						return Err(NavigationError::HandlerContract {
							url: args.url.to_string(),
							detail: format!(
								"function-shaped results re-entered resolution more than {} times",
								MAX_DEFER_DEPTH
							),
						});
					}
					outcome = next(args.clone()).await;
				}
				HandlerOutcome::Document(document) => break Content::Document(document),
				HandlerOutcome::Fragment(fragment) => break Content::Fragment(fragment),
				HandlerOutcome::Markup(markup) => break Content::Markup(markup),
				HandlerOutcome::Node(node) => break Content::Node(node),
				HandlerOutcome::Component(spec) => {
					let name = self.components.ensure_defined(&spec);
					debug!(component = %name, "instantiating component");
					break Content::Node((spec.construct)(&args));
				}
				HandlerOutcome::Failure(error) => {
					self.reporter.report(&error);
					break Content::ErrorText(error.to_string());
				}
				HandlerOutcome::Redirect(next) => return Ok(Resolution::Redirect(next)),
			}
		};

		if let Some(reason) = args.token.reason() {
			return Err(NavigationError::Aborted(reason));
		}

		// Metadata updates happen exactly once per successful resolution,
		// after content is ready.
		if let Some((title, description)) = meta {
			if let Some(title) = title {
				self.metadata.set_title(&title.value(&args));
			}
			if let Some(description) = description {
				self.metadata.set_description(&description.value(&args));
			}
		}

		Ok(Resolution::Content(content))
	}
}

impl fmt::Debug for ContentResolver {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ContentResolver")
			.field("components", &self.components)
			.field("has_not_found", &self.has_not_found())
			.finish()
	}
}
