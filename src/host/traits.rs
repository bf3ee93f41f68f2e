//! The collaborator traits at the engine boundary.
//!
//! The engine never touches a real page, history stack, or network; it
//! drives these interfaces and leaves their implementation to the
//! embedder. `host::memory` provides in-memory implementations.

use std::sync::Arc;

use async_trait::async_trait;
use http::Method;
use url::Url;

use crate::content::{Content, DocumentPayload, FormPayload, RouteModule};
use crate::error::NavigationError;
use crate::loader::ResourceRequest;
use crate::state::{NavigationState, StateBlob, StateDiff};

/// The surface resolved content is rendered into.
///
/// Accepts whole-content replacement; component subtrees arrive as opaque
/// [`Content::Node`] handles and are expected to be inserted isolated.
#[async_trait]
pub trait RenderSurface: Send + Sync {
	/// Replaces all rendered content.
	async fn replace_content(&self, content: Content) -> Result<(), NavigationError>;
}

/// Callback invoked when the user pops a history entry.
pub type PopHandler = Arc<dyn Fn(NavigationState) + Send + Sync>;

/// The host history stack.
pub trait HistoryHost: Send + Sync {
	/// Pushes a new entry.
	fn push(&self, url: &Url, state: &StateBlob);
	/// Moves one entry back.
	fn back(&self);
	/// Moves one entry forward.
	fn forward(&self);
	/// Moves by `delta` entries; `0` re-emits the current entry.
	fn go(&self, delta: i32);
	/// Returns the current entry.
	fn current(&self) -> NavigationState;
	/// Installs the pop notification handler.
	fn set_pop_handler(&self, handler: PopHandler);
}

/// Fetch-and-parse primitive for the uncovered-route fallback.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
	/// Fetches `url` as a document.
	async fn fetch_document(
		&self,
		url: &Url,
		method: &Method,
		body: Option<&FormPayload>,
	) -> Result<DocumentPayload, NavigationError>;
}

/// Sink for page metadata updates.
pub trait MetadataSink: Send + Sync {
	/// Sets the page title.
	fn set_title(&self, title: &str);
	/// Sets the page description.
	fn set_description(&self, description: &str);
}

/// A metadata sink that discards updates.
#[derive(Debug, Default)]
pub struct NullMetadata;

impl MetadataSink for NullMetadata {
	fn set_title(&self, _title: &str) {}
	fn set_description(&self, _description: &str) {}
}

/// The external application-state store.
pub trait StateStore: Send + Sync {
	/// Returns the current state blob.
	fn current(&self) -> StateBlob;
	/// Applies a diff notification.
	fn apply(&self, diff: &StateDiff);
}

/// Resolves remote-module specifiers to loaded handler modules.
#[async_trait]
pub trait ModuleHost: Send + Sync {
	/// Loads the module named by `specifier`.
	async fn load_module(&self, specifier: &str) -> Result<RouteModule, NavigationError>;

	/// Resolves a specifier to a preloadable URL, if it has one.
	///
	/// The default treats the specifier as a URL, absolute or relative to
	/// `base`. Hosts with bare-specifier resolution override this.
	fn resolve_specifier(&self, specifier: &str, base: &Url) -> Option<Url> {
		Url::options().base_url(Some(base)).parse(specifier).ok()
	}
}

/// Begins resource requests on behalf of the loader.
pub trait ResourceHost: Send + Sync {
	/// Starts a request, returning its backing artifact.
	fn begin(&self, request: &ResourceRequest) -> Box<dyn ResourceArtifact>;
}

/// The backing artifact of an in-flight resource request.
#[async_trait]
pub trait ResourceArtifact: Send + Sync {
	/// Resolves on load success, or fails with the load error.
	///
	/// Only preload and module-preload artifacts are awaited; the
	/// fire-and-forget kinds are begun and dropped.
	async fn completion(&self) -> Result<(), NavigationError>;

	/// Removes the backing artifact.
	fn discard(&self);
}

/// Out-of-band error channel for failures that must not reach callers.
pub trait ErrorReporter: Send + Sync {
	/// Reports an error.
	fn report(&self, error: &NavigationError);
}

/// The default reporter: logs through `tracing`.
#[derive(Debug, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
	fn report(&self, error: &NavigationError) {
		tracing::error!(%error, "navigation error");
	}
}
