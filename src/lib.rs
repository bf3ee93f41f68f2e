//! Client-side navigation engine for single-page applications.
//!
//! Nuages intercepts in-page link/form activity, matches the target
//! location against a registered route table, resolves the corresponding
//! content without a full page load, and keeps the host history stack
//! consistent with application state. The page itself — DOM, network,
//! history — stays behind the host traits in [`host`], so the engine runs
//! anywhere, headless included.
//!
//! # Architecture
//!
//! - [`pattern`] / [`registry`] — compiled component-wise URL patterns in
//!   an insertion-ordered, first-match-wins registry.
//! - [`cancel`] — one-shot, composable cancellation tokens.
//! - [`lifecycle`] — the cancelable-event protocol gating every
//!   state-changing operation, with deferred-task registration.
//! - [`resolver`] — turns a matched (or unmatched) location into
//!   renderable content; failures degrade to rendered error text.
//! - [`loader`] — preload/prefetch/preconnect/dns-hint with composable
//!   cancellation, plus hover-triggered preloading.
//! - [`router`] — the [`Router`](router::Router) context object
//!   orchestrating navigate/back/forward/go/reload/init.
//!
//! # Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use nuages::prelude::*;
//! use nuages::host::memory::{InMemoryHistory, RecordingSurface};
//!
//! let history = Arc::new(InMemoryHistory::new("https://app.example.com/".parse()?));
//! let surface = Arc::new(RecordingSurface::new());
//! let router = Router::builder()
//!     .history(history)
//!     .surface(surface)
//!     .build();
//!
//! let table = RouteTable::new()
//!     .route("/", "./views/home.js")
//!     .route("/product/:sku(\\d+)", "./views/product.js");
//! let startup = router.init(table, RouterOptions::default()).await?;
//!
//! router.navigate("/product/42", Default::default(), Default::default()).await?;
//! assert!(startup.is_cancelled());
//! ```
//!
//! # Concurrency
//!
//! Execution is cooperative and designed for a single-threaded executor.
//! Within one navigation the ordering is strict: lifecycle dispatch, then
//! history mutation, then content resolution, then state notification,
//! then content swap, then `load`. Across navigations there is no
//! serialization — concurrent `navigate` calls interleave and the last
//! content swap wins.

pub mod cancel;
pub mod content;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod loader;
pub mod pattern;
pub mod registry;
pub mod resolver;
pub mod router;
pub mod state;

/// The commonly used types, re-exported.
pub mod prelude {
	pub use crate::cancel::{AbortReason, CancellationSource, CancellationToken};
	pub use crate::content::{
		handler_fn, Content, DocumentPayload, FormPayload, HandlerArgs, HandlerOutcome,
	};
	pub use crate::error::{NavigationError, NavigationResult};
	pub use crate::lifecycle::NavigationKind;
	pub use crate::pattern::PathPattern;
	pub use crate::router::{
		NavigateOptions, RouteSpec, RouteTable, Router, RouterBuilder, RouterOptions,
	};
	pub use crate::state::{StateBlob, StateDiff};
}
