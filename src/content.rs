//! Renderable content, handler outcomes, and the handler argument bundle.
//!
//! Handlers return a [`HandlerOutcome`] — an exhaustively matched tagged
//! variant produced at the handler-invocation boundary — which the
//! resolver maps to the [`Content`] handed to the render surface.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use http::Method;
use parking_lot::{Mutex, RwLock};
use url::Url;
use uuid::Uuid;

use crate::cancel::CancellationToken;
use crate::error::NavigationError;
use crate::pattern::PatternMatch;
use crate::state::StateBlob;

/// Returns `true` for HTTP methods whose form payload is folded into the
/// URL query string instead of sent as a body.
pub fn is_no_body_method(method: &Method) -> bool {
	*method == Method::GET
		|| *method == Method::HEAD
		|| *method == Method::DELETE
		|| *method == Method::OPTIONS
}

/// An ordered multimap of form field name/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormPayload {
	fields: Vec<(String, String)>,
}

impl FormPayload {
	/// Creates an empty payload.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a field, preserving insertion order and duplicates.
	pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
		self.fields.push((name.into(), value.into()));
	}

	/// Iterates fields in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.fields
			.iter()
			.map(|(name, value)| (name.as_str(), value.as_str()))
	}

	/// Returns the number of fields.
	pub fn len(&self) -> usize {
		self.fields.len()
	}

	/// Returns `true` if the payload has no fields.
	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}

	/// Encodes the payload as an `application/x-www-form-urlencoded`
	/// string.
	pub fn to_query_string(&self) -> String {
		serde_urlencoded::to_string(&self.fields).unwrap_or_default()
	}
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for FormPayload {
	fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
		Self {
			fields: iter
				.into_iter()
				.map(|(name, value)| (name.into(), value.into()))
				.collect(),
		}
	}
}

/// A parsed document: optional head markup plus body markup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentPayload {
	/// Head markup; `None` leaves the current head untouched.
	pub head: Option<String>,
	/// Body markup, replacing the render root's content.
	pub body: String,
}

impl DocumentPayload {
	/// Creates a body-only document.
	pub fn body_only(body: impl Into<String>) -> Self {
		Self {
			head: None,
			body: body.into(),
		}
	}
}

/// An opaque handle to an embedder-owned node subtree.
///
/// The engine never inspects the node; it only threads the handle from a
/// handler to the render surface. Equality is by identity.
#[derive(Clone)]
pub struct NodeHandle(Arc<dyn Any + Send + Sync>);

impl NodeHandle {
	/// Wraps an embedder value.
	pub fn new<T: Any + Send + Sync>(value: T) -> Self {
		Self(Arc::new(value))
	}

	/// Borrows the wrapped value back, if the type matches.
	pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
		self.0.downcast_ref()
	}
}

impl fmt::Debug for NodeHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "NodeHandle")
	}
}

impl PartialEq for NodeHandle {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

impl Eq for NodeHandle {}

/// Content handed to the render surface after resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
	/// A structured document; the surface replaces head and body.
	Document(DocumentPayload),
	/// A template-like fragment; its content is used as-is.
	Fragment(String),
	/// An embedder node subtree, inserted isolated.
	Node(NodeHandle),
	/// Raw, sanitizable markup.
	Markup(String),
	/// A rendered error message.
	ErrorText(String),
}

/// A stack of cleanup closures a handler registers for teardown.
///
/// Drained (in reverse registration order) when the page the handler
/// rendered is navigated away from.
#[derive(Clone, Default)]
pub struct DisposerStack {
	inner: Arc<Mutex<Vec<Box<dyn FnOnce() + Send>>>>,
}

impl DisposerStack {
	/// Creates an empty stack.
	pub fn new() -> Self {
		Self::default()
	}

	/// Pushes a cleanup closure.
	pub fn push(&self, disposer: impl FnOnce() + Send + 'static) {
		self.inner.lock().push(Box::new(disposer));
	}

	/// Returns the number of pending disposers.
	pub fn len(&self) -> usize {
		self.inner.lock().len()
	}

	/// Returns `true` if no disposers are registered.
	pub fn is_empty(&self) -> bool {
		self.inner.lock().is_empty()
	}

	/// Runs and removes every disposer, most recent first.
	pub fn drain(&self) {
		let disposers = std::mem::take(&mut *self.inner.lock());
		for disposer in disposers.into_iter().rev() {
			disposer();
		}
	}
}

impl fmt::Debug for DisposerStack {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DisposerStack")
			.field("pending", &self.len())
			.finish()
	}
}

/// The frozen argument bundle a handler is invoked with.
#[derive(Clone)]
pub struct HandlerArgs {
	/// The URL being resolved.
	pub url: Url,
	/// Pattern captures; `None` for the not-found handler.
	pub matches: Option<PatternMatch>,
	/// The state blob at invocation time.
	pub state: StateBlob,
	/// The navigation method.
	pub method: Method,
	/// Milliseconds since the router was constructed.
	pub timestamp_ms: f64,
	/// Cancellation token for this resolution.
	pub token: CancellationToken,
	/// The form payload, when one survived method folding.
	pub form: Option<FormPayload>,
	/// Teardown stack for the rendered page.
	pub disposers: DisposerStack,
}

impl fmt::Debug for HandlerArgs {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("HandlerArgs")
			.field("url", &self.url.as_str())
			.field("method", &self.method)
			.field("matched", &self.matches.is_some())
			.field("timestamp_ms", &self.timestamp_ms)
			.finish()
	}
}

/// The future a handler returns.
pub type HandlerFuture = BoxFuture<'static, HandlerOutcome>;

/// An inline route handler.
pub type HandlerFn = Arc<dyn Fn(HandlerArgs) -> HandlerFuture + Send + Sync>;

/// Wraps an async closure as a [`HandlerFn`].
pub fn handler_fn<F, Fut>(handler: F) -> HandlerFn
where
	F: Fn(HandlerArgs) -> Fut + Send + Sync + 'static,
	Fut: std::future::Future<Output = HandlerOutcome> + Send + 'static,
{
	Arc::new(move |args| handler(args).boxed())
}

/// What a handler resolved to, matched exhaustively by the resolver.
#[derive(Clone)]
pub enum HandlerOutcome {
	/// A structured document, used as-is.
	Document(DocumentPayload),
	/// A template-like fragment, its content used as-is.
	Fragment(String),
	/// A component constructor; instantiated with the argument bundle and
	/// auto-registered under a generated name if not already defined.
	Component(ComponentSpec),
	/// A renderable node, used directly.
	Node(NodeHandle),
	/// A raw/sanitizable markup string.
	Markup(String),
	/// A URL: triggers a nested navigation instead of rendering.
	Redirect(Url),
	/// An error value, reported and rendered as a message.
	Failure(NavigationError),
	/// A plain function, re-invoked with the same bundle; its result
	/// re-enters resolution.
	Defer(HandlerFn),
}

impl fmt::Debug for HandlerOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Document(_) => write!(f, "HandlerOutcome::Document"),
			Self::Fragment(_) => write!(f, "HandlerOutcome::Fragment"),
			Self::Component(_) => write!(f, "HandlerOutcome::Component"),
			Self::Node(_) => write!(f, "HandlerOutcome::Node"),
			Self::Markup(_) => write!(f, "HandlerOutcome::Markup"),
			Self::Redirect(url) => write!(f, "HandlerOutcome::Redirect({})", url),
			Self::Failure(err) => write!(f, "HandlerOutcome::Failure({})", err),
			Self::Defer(_) => write!(f, "HandlerOutcome::Defer"),
		}
	}
}

/// A constructor-shaped handler result implementing the component
/// contract.
#[derive(Clone)]
pub struct ComponentSpec {
	/// Preferred tag name; a name is generated when absent.
	pub tag: Option<String>,
	/// Instantiates the component subtree from the argument bundle.
	pub construct: Arc<dyn Fn(&HandlerArgs) -> NodeHandle + Send + Sync>,
}

impl ComponentSpec {
	/// Creates an unnamed component spec.
	pub fn new(construct: impl Fn(&HandlerArgs) -> NodeHandle + Send + Sync + 'static) -> Self {
		Self {
			tag: None,
			construct: Arc::new(construct),
		}
	}

	/// Sets the preferred tag name.
	pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
		self.tag = Some(tag.into());
		self
	}
}

impl fmt::Debug for ComponentSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ComponentSpec")
			.field("tag", &self.tag)
			.finish()
	}
}

/// Define-once bookkeeping for component constructors.
///
/// Constructors are keyed by identity; the first instantiation registers
/// the component under its preferred tag or a generated name, later
/// instantiations reuse it.
#[derive(Default)]
pub struct ComponentRegistry {
	defined: RwLock<HashMap<usize, String>>,
}

impl ComponentRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the registered name for a spec, defining it on first use.
	pub fn ensure_defined(&self, spec: &ComponentSpec) -> String {
		let key = Arc::as_ptr(&spec.construct) as *const () as usize;
		if let Some(name) = self.defined.read().get(&key) {
			return name.clone();
		}
		let name = spec
			.tag
			.clone()
			.unwrap_or_else(|| format!("nuages-el-{}", Uuid::new_v4()));
		self.defined
			.write()
			.entry(key)
			.or_insert_with(|| name.clone())
			.clone()
	}

	/// Returns the number of defined components.
	pub fn len(&self) -> usize {
		self.defined.read().len()
	}

	/// Returns `true` if nothing has been defined yet.
	pub fn is_empty(&self) -> bool {
		self.defined.read().is_empty()
	}
}

impl fmt::Debug for ComponentRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ComponentRegistry")
			.field("defined", &self.len())
			.finish()
	}
}

/// A title/description side-channel value exposed by a handler module.
#[derive(Clone)]
pub enum MetaField {
	/// A literal value.
	Literal(String),
	/// A value computed from the argument bundle.
	Computed(Arc<dyn Fn(&HandlerArgs) -> String + Send + Sync>),
}

impl MetaField {
	/// Evaluates the field against an argument bundle.
	pub fn value(&self, args: &HandlerArgs) -> String {
		match self {
			Self::Literal(value) => value.clone(),
			Self::Computed(compute) => compute(args),
		}
	}
}

impl fmt::Debug for MetaField {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
			Self::Computed(_) => write!(f, "Computed"),
		}
	}
}

/// A loaded remote handler module.
#[derive(Clone, Default)]
pub struct RouteModule {
	/// The default handler; a module without one breaks the handler
	/// contract.
	pub default: Option<HandlerFn>,
	/// Optional page title side channel.
	pub title: Option<MetaField>,
	/// Optional page description side channel.
	pub description: Option<MetaField>,
}

impl RouteModule {
	/// Creates a module exposing only a default handler.
	pub fn with_handler(handler: HandlerFn) -> Self {
		Self {
			default: Some(handler),
			title: None,
			description: None,
		}
	}

	/// Sets the title side channel.
	pub fn title(mut self, title: MetaField) -> Self {
		self.title = Some(title);
		self
	}

	/// Sets the description side channel.
	pub fn description(mut self, description: MetaField) -> Self {
		self.description = Some(description);
		self
	}
}

impl fmt::Debug for RouteModule {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RouteModule")
			.field("has_default", &self.default.is_some())
			.field("title", &self.title)
			.field("description", &self.description)
			.finish()
	}
}
