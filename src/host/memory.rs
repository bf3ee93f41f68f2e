//! In-memory host implementations.
//!
//! These back the test suite and make the engine usable headless: a
//! history stack modeled on the browser primitive, a recording render
//! surface, a plain state store, a scripted resource host, and a static
//! module host.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use http::Method;
use parking_lot::{Mutex, RwLock};
use url::Url;

use super::traits::{
	DocumentFetcher, ErrorReporter, HistoryHost, MetadataSink, ModuleHost, PopHandler,
	RenderSurface, ResourceArtifact, ResourceHost, StateStore,
};
use crate::content::{Content, DocumentPayload, FormPayload, RouteModule};
use crate::error::NavigationError;
use crate::loader::ResourceRequest;
use crate::state::{NavigationState, StateBlob, StateDiff};

/// An in-memory history stack.
///
/// Pushing truncates any forward entries, as the browser primitive does;
/// back/forward/go clamp to the stack bounds and re-emit the entry through
/// the pop handler.
pub struct InMemoryHistory {
	inner: Mutex<HistoryInner>,
	pop_handler: Mutex<Option<PopHandler>>,
	pushes: AtomicUsize,
}

struct HistoryInner {
	entries: Vec<(Url, StateBlob)>,
	index: usize,
}

impl InMemoryHistory {
	/// Creates a history whose single entry is `initial`.
	pub fn new(initial: Url) -> Self {
		Self {
			inner: Mutex::new(HistoryInner {
				entries: vec![(initial, StateBlob::new())],
				index: 0,
			}),
			pop_handler: Mutex::new(None),
			pushes: AtomicUsize::new(0),
		}
	}

	/// Returns the number of entries on the stack.
	pub fn len(&self) -> usize {
		self.inner.lock().entries.len()
	}

	/// Returns `true` if the stack holds a single entry.
	pub fn is_empty(&self) -> bool {
		self.len() <= 1
	}

	/// Returns the number of pushes performed.
	pub fn push_count(&self) -> usize {
		self.pushes.load(Ordering::SeqCst)
	}

	fn jump(&self, delta: i32) {
		let popped = {
			let mut inner = self.inner.lock();
			let target = inner.index as i64 + delta as i64;
			let target = target.clamp(0, inner.entries.len() as i64 - 1) as usize;
			inner.index = target;
			let (url, state) = inner.entries[target].clone();
			NavigationState {
				url,
				state,
				position: target,
			}
		};
		let handler = self.pop_handler.lock().clone();
		if let Some(handler) = handler {
			handler(popped);
		}
	}
}

impl HistoryHost for InMemoryHistory {
	fn push(&self, url: &Url, state: &StateBlob) {
		let mut inner = self.inner.lock();
		let cut = inner.index + 1;
		inner.entries.truncate(cut);
		inner.entries.push((url.clone(), state.clone()));
		inner.index += 1;
		self.pushes.fetch_add(1, Ordering::SeqCst);
	}

	fn back(&self) {
		self.jump(-1);
	}

	fn forward(&self) {
		self.jump(1);
	}

	fn go(&self, delta: i32) {
		self.jump(delta);
	}

	fn current(&self) -> NavigationState {
		let inner = self.inner.lock();
		let (url, state) = inner.entries[inner.index].clone();
		NavigationState {
			url,
			state,
			position: inner.index,
		}
	}

	fn set_pop_handler(&self, handler: PopHandler) {
		*self.pop_handler.lock() = Some(handler);
	}
}

/// A render surface that records every swap.
#[derive(Default)]
pub struct RecordingSurface {
	swaps: Mutex<Vec<Content>>,
}

impl RecordingSurface {
	/// Creates an empty surface.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the most recently swapped content.
	pub fn current(&self) -> Option<Content> {
		self.swaps.lock().last().cloned()
	}

	/// Returns the number of content swaps.
	pub fn swap_count(&self) -> usize {
		self.swaps.lock().len()
	}

	/// Returns every swap in order.
	pub fn swaps(&self) -> Vec<Content> {
		self.swaps.lock().clone()
	}
}

#[async_trait]
impl RenderSurface for RecordingSurface {
	async fn replace_content(&self, content: Content) -> Result<(), NavigationError> {
		self.swaps.lock().push(content);
		Ok(())
	}
}

/// A render surface that fails every swap, for rollback tests.
#[derive(Default)]
pub struct FailingSurface {
	attempts: AtomicUsize,
}

impl FailingSurface {
	/// Creates a failing surface.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the number of swap attempts.
	pub fn attempts(&self) -> usize {
		self.attempts.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl RenderSurface for FailingSurface {
	async fn replace_content(&self, _content: Content) -> Result<(), NavigationError> {
		self.attempts.fetch_add(1, Ordering::SeqCst);
		Err(NavigationError::HandlerResolution {
			specifier: "render surface".to_string(),
			reason: "surface rejected the content".to_string(),
		})
	}
}

/// A plain in-memory state store that records received diffs.
#[derive(Default)]
pub struct MemoryStateStore {
	state: Mutex<StateBlob>,
	diffs: Mutex<Vec<StateDiff>>,
}

impl MemoryStateStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a store with an initial blob.
	pub fn with_state(state: StateBlob) -> Self {
		Self {
			state: Mutex::new(state),
			diffs: Mutex::new(Vec::new()),
		}
	}

	/// Returns the diffs received so far.
	pub fn diffs(&self) -> Vec<StateDiff> {
		self.diffs.lock().clone()
	}
}

impl StateStore for MemoryStateStore {
	fn current(&self) -> StateBlob {
		self.state.lock().clone()
	}

	fn apply(&self, diff: &StateDiff) {
		{
			let mut state = self.state.lock();
			for (key, value) in &diff.added {
				state.insert(key.clone(), value.clone());
			}
			for (key, value) in &diff.changed {
				state.insert(key.clone(), value.clone());
			}
			for key in &diff.removed {
				state.remove(key);
			}
		}
		self.diffs.lock().push(diff.clone());
	}
}

/// A metadata sink that records the latest title and description.
#[derive(Default)]
pub struct RecordingMetadata {
	title: Mutex<Option<String>>,
	description: Mutex<Option<String>>,
}

impl RecordingMetadata {
	/// Creates an empty sink.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the last title set.
	pub fn title(&self) -> Option<String> {
		self.title.lock().clone()
	}

	/// Returns the last description set.
	pub fn description(&self) -> Option<String> {
		self.description.lock().clone()
	}
}

impl MetadataSink for RecordingMetadata {
	fn set_title(&self, title: &str) {
		*self.title.lock() = Some(title.to_string());
	}

	fn set_description(&self, description: &str) {
		*self.description.lock() = Some(description.to_string());
	}
}

/// A module host backed by a static specifier → module map.
#[derive(Default)]
pub struct StaticModuleHost {
	modules: RwLock<HashMap<String, RouteModule>>,
}

impl StaticModuleHost {
	/// Creates an empty host.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a module under `specifier`.
	pub fn with_module(self, specifier: impl Into<String>, module: RouteModule) -> Self {
		self.modules.write().insert(specifier.into(), module);
		self
	}

	/// Inserts a module under `specifier`.
	pub fn insert(&self, specifier: impl Into<String>, module: RouteModule) {
		self.modules.write().insert(specifier.into(), module);
	}
}

#[async_trait]
impl ModuleHost for StaticModuleHost {
	async fn load_module(&self, specifier: &str) -> Result<RouteModule, NavigationError> {
		self.modules
			.read()
			.get(specifier)
			.cloned()
			.ok_or_else(|| NavigationError::HandlerResolution {
				specifier: specifier.to_string(),
				reason: "module not found".to_string(),
			})
	}
}

/// A document fetcher backed by a static URL → document map.
#[derive(Default)]
pub struct StaticDocumentFetcher {
	documents: RwLock<HashMap<String, DocumentPayload>>,
	requests: Mutex<Vec<(Url, Method)>>,
}

impl StaticDocumentFetcher {
	/// Creates an empty fetcher.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a document for `url`.
	pub fn with_document(self, url: impl Into<String>, document: DocumentPayload) -> Self {
		self.documents.write().insert(url.into(), document);
		self
	}

	/// Inserts a document for `url`.
	pub fn insert(&self, url: impl Into<String>, document: DocumentPayload) {
		self.documents.write().insert(url.into(), document);
	}

	/// Returns every fetch performed.
	pub fn requests(&self) -> Vec<(Url, Method)> {
		self.requests.lock().clone()
	}
}

#[async_trait]
impl DocumentFetcher for StaticDocumentFetcher {
	async fn fetch_document(
		&self,
		url: &Url,
		method: &Method,
		_body: Option<&FormPayload>,
	) -> Result<DocumentPayload, NavigationError> {
		self.requests.lock().push((url.clone(), method.clone()));
		self.documents
			.read()
			.get(url.as_str())
			.cloned()
			.ok_or_else(|| NavigationError::ResourceLoad {
				url: url.to_string(),
				reason: "no such document".to_string(),
			})
	}
}

/// A resource host whose artifacts settle on a script: after `delay`,
/// succeed or fail.
pub struct ScriptedResourceHost {
	delay: Duration,
	fail: bool,
	begun: Mutex<Vec<ResourceRequest>>,
	discarded: Arc<AtomicUsize>,
}

impl ScriptedResourceHost {
	/// Creates a host whose artifacts load successfully after `delay`.
	pub fn succeeding_after(delay: Duration) -> Self {
		Self {
			delay,
			fail: false,
			begun: Mutex::new(Vec::new()),
			discarded: Arc::new(AtomicUsize::new(0)),
		}
	}

	/// Creates a host whose artifacts fail after `delay`.
	pub fn failing_after(delay: Duration) -> Self {
		Self {
			fail: true,
			..Self::succeeding_after(delay)
		}
	}

	/// Returns every request begun.
	pub fn begun(&self) -> Vec<ResourceRequest> {
		self.begun.lock().clone()
	}

	/// Returns the number of artifacts discarded.
	pub fn discarded(&self) -> usize {
		self.discarded.load(Ordering::SeqCst)
	}
}

impl ResourceHost for ScriptedResourceHost {
	fn begin(&self, request: &ResourceRequest) -> Box<dyn ResourceArtifact> {
		self.begun.lock().push(request.clone());
		Box::new(ScriptedArtifact {
			url: request.url.clone(),
			delay: self.delay,
			fail: self.fail,
			discarded: Arc::clone(&self.discarded),
		})
	}
}

struct ScriptedArtifact {
	url: Url,
	delay: Duration,
	fail: bool,
	discarded: Arc<AtomicUsize>,
}

#[async_trait]
impl ResourceArtifact for ScriptedArtifact {
	async fn completion(&self) -> Result<(), NavigationError> {
		tokio::time::sleep(self.delay).await;
		if self.fail {
			Err(NavigationError::ResourceLoad {
				url: self.url.to_string(),
				reason: "scripted failure".to_string(),
			})
		} else {
			Ok(())
		}
	}

	fn discard(&self) {
		self.discarded.fetch_add(1, Ordering::SeqCst);
	}
}

/// An error reporter that records every report.
#[derive(Default)]
pub struct RecordingReporter {
	errors: Mutex<Vec<String>>,
}

impl RecordingReporter {
	/// Creates an empty reporter.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns every reported error, rendered.
	pub fn errors(&self) -> Vec<String> {
		self.errors.lock().clone()
	}
}

impl ErrorReporter for RecordingReporter {
	fn report(&self, error: &NavigationError) {
		self.errors.lock().push(error.to_string());
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn url(s: &str) -> Url {
		Url::parse(s).unwrap()
	}

	#[test]
	fn test_history_push_and_current() {
		let history = InMemoryHistory::new(url("https://app.example.com/"));
		history.push(&url("https://app.example.com/a"), &StateBlob::new());

		let current = history.current();
		assert_eq!(current.url.as_str(), "https://app.example.com/a");
		assert_eq!(current.position, 1);
	}

	#[test]
	fn test_history_back_fires_pop_handler() {
		let history = Arc::new(InMemoryHistory::new(url("https://app.example.com/")));
		history.push(&url("https://app.example.com/a"), &StateBlob::new());

		let popped = Arc::new(Mutex::new(Vec::new()));
		let seen = Arc::clone(&popped);
		history.set_pop_handler(Arc::new(move |state: NavigationState| {
			seen.lock().push(state.url.to_string());
		}));

		history.back();
		assert_eq!(popped.lock().clone(), vec!["https://app.example.com/"]);
		assert_eq!(history.current().position, 0);
	}

	#[test]
	fn test_history_push_truncates_forward_entries() {
		let history = InMemoryHistory::new(url("https://app.example.com/"));
		history.push(&url("https://app.example.com/a"), &StateBlob::new());
		history.push(&url("https://app.example.com/b"), &StateBlob::new());
		history.back();
		history.push(&url("https://app.example.com/c"), &StateBlob::new());

		assert_eq!(history.len(), 3);
		history.forward();
		assert_eq!(history.current().url.as_str(), "https://app.example.com/c");
	}

	#[test]
	fn test_history_back_clamps_at_start() {
		let history = InMemoryHistory::new(url("https://app.example.com/"));
		history.back();
		assert_eq!(history.current().position, 0);
	}

	#[tokio::test]
	async fn test_recording_surface() {
		let surface = RecordingSurface::new();
		surface
			.replace_content(Content::Markup("<p>hi</p>".to_string()))
			.await
			.unwrap();
		assert_eq!(surface.swap_count(), 1);
		assert_eq!(
			surface.current(),
			Some(Content::Markup("<p>hi</p>".to_string()))
		);
	}

	#[test]
	fn test_state_store_applies_diffs() {
		use serde_json::json;

		let store = MemoryStateStore::new();
		let old = store.current();
		let mut new = StateBlob::new();
		new.insert("user".to_string(), json!("ada"));

		store.apply(&StateDiff::between(&new, &old));
		assert_eq!(store.current(), new);
		assert_eq!(store.diffs().len(), 1);
	}

	#[tokio::test]
	async fn test_static_module_host_missing_module() {
		let host = StaticModuleHost::new();
		let result = host.load_module("./views/home.js").await;
		assert!(matches!(
			result,
			Err(NavigationError::HandlerResolution { .. })
		));
	}
}
