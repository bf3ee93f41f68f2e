//! Composable one-shot cancellation tokens.
//!
//! [`CancellationToken`] is a one-way latch: unset until cancelled, then
//! permanently cancelled with an [`AbortReason`]. Tokens compose — a token
//! derived with [`CancellationToken::any`] cancels as soon as any of its
//! inputs cancels, reporting the first-cancelled input's reason, and a
//! [`CancellationToken::deadline`] token cancels itself once its deadline
//! passes. [`CancellationSource`] is the cancel-capable handle; dropping a
//! source does **not** cancel its tokens.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, select_all};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;

/// Why a token was cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AbortReason {
	/// A deadline token's timeout elapsed.
	Timeout,
	/// A newer navigation superseded the operation.
	Superseded,
	/// The owning lifecycle event finished closing.
	EventClosed,
	/// Caller-supplied reason.
	Explicit(String),
}

impl fmt::Display for AbortReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Timeout => write!(f, "timed out"),
			Self::Superseded => write!(f, "superseded by a newer navigation"),
			Self::EventClosed => write!(f, "lifecycle event closed"),
			Self::Explicit(reason) => write!(f, "{}", reason),
		}
	}
}

struct TokenInner {
	reason: Mutex<Option<AbortReason>>,
	signal: watch::Sender<bool>,
	deadline: Option<Instant>,
	parents: Vec<CancellationToken>,
}

impl TokenInner {
	fn latched(deadline: Option<Instant>, parents: Vec<CancellationToken>) -> Arc<Self> {
		let (signal, _) = watch::channel(false);
		Arc::new(Self {
			reason: Mutex::new(None),
			signal,
			deadline,
			parents,
		})
	}

	fn cancel(&self, reason: AbortReason) {
		{
			let mut slot = self.reason.lock();
			// First reason wins; later cancels are no-ops.
			if slot.is_some() {
				return;
			}
			*slot = Some(reason);
		}
		let _ = self.signal.send_replace(true);
	}
}

/// The control handle that triggers cancellation.
///
/// Dropping the source does not cancel the token — call
/// [`cancel`](Self::cancel) explicitly.
pub struct CancellationSource {
	inner: Arc<TokenInner>,
}

impl CancellationSource {
	/// Creates a new source with an uncancelled token.
	pub fn new() -> Self {
		Self {
			inner: TokenInner::latched(None, Vec::new()),
		}
	}

	/// Obtains a cloneable token observing this source.
	pub fn token(&self) -> CancellationToken {
		CancellationToken {
			inner: Arc::clone(&self.inner),
		}
	}

	/// Signals cancellation with the given reason.
	///
	/// Idempotent: the first reason wins and later calls are ignored.
	pub fn cancel(&self, reason: AbortReason) {
		self.inner.cancel(reason);
	}

	/// Returns `true` if cancellation has been requested.
	pub fn is_cancelled(&self) -> bool {
		self.inner.reason.lock().is_some()
	}
}

impl Default for CancellationSource {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for CancellationSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CancellationSource")
			.field("cancelled", &self.is_cancelled())
			.finish()
	}
}

/// A cloneable, composable one-shot cancellation token.
#[derive(Clone)]
pub struct CancellationToken {
	inner: Arc<TokenInner>,
}

impl CancellationToken {
	/// Returns a token that is never cancelled.
	pub fn never() -> Self {
		Self {
			inner: TokenInner::latched(None, Vec::new()),
		}
	}

	/// Returns a token that cancels itself with [`AbortReason::Timeout`]
	/// once `after` has elapsed.
	pub fn deadline(after: Duration) -> Self {
		Self {
			inner: TokenInner::latched(Some(Instant::now() + after), Vec::new()),
		}
	}

	/// Composes tokens: the derived token is cancelled as soon as any
	/// input is, reporting the first-cancelled input's reason.
	pub fn any<I>(tokens: I) -> Self
	where
		I: IntoIterator<Item = CancellationToken>,
	{
		Self {
			inner: TokenInner::latched(None, tokens.into_iter().collect()),
		}
	}

	/// Returns `true` if this token, its deadline, or any composed input
	/// has been cancelled.
	pub fn is_cancelled(&self) -> bool {
		self.reason().is_some()
	}

	/// Returns the cancellation reason, if cancelled.
	///
	/// Inputs of a composed token are checked in composition order.
	pub fn reason(&self) -> Option<AbortReason> {
		if let Some(reason) = self.inner.reason.lock().clone() {
			return Some(reason);
		}
		if let Some(deadline) = self.inner.deadline {
			if Instant::now() >= deadline {
				return Some(AbortReason::Timeout);
			}
		}
		self.inner.parents.iter().find_map(|parent| parent.reason())
	}

	/// Resolves once the token is cancelled, yielding the reason.
	pub async fn cancelled(&self) -> AbortReason {
		self.wait_cancelled().await
	}

	fn wait_cancelled(&self) -> BoxFuture<'static, AbortReason> {
		let token = self.clone();
		async move {
			loop {
				if let Some(reason) = token.reason() {
					return reason;
				}
				let mut rx = token.inner.signal.subscribe();
				let mut waiters: Vec<BoxFuture<'static, ()>> = Vec::new();
				waiters.push(
					async move {
						let _ = rx.wait_for(|fired| *fired).await;
					}
					.boxed(),
				);
				if let Some(deadline) = token.inner.deadline {
					waiters.push(tokio::time::sleep_until(deadline).boxed());
				}
				for parent in &token.inner.parents {
					waiters.push(parent.wait_cancelled().map(|_| ()).boxed());
				}
				select_all(waiters).await;
			}
		}
		.boxed()
	}
}

impl fmt::Debug for CancellationToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CancellationToken")
			.field("reason", &self.reason())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_token_starts_uncancelled() {
		let source = CancellationSource::new();
		assert!(!source.token().is_cancelled());
		assert!(!source.is_cancelled());
	}

	#[test]
	fn test_cancel_propagates_to_all_clones() {
		let source = CancellationSource::new();
		let t1 = source.token();
		let t2 = t1.clone();
		source.cancel(AbortReason::Superseded);
		assert_eq!(t1.reason(), Some(AbortReason::Superseded));
		assert_eq!(t2.reason(), Some(AbortReason::Superseded));
	}

	#[test]
	fn test_first_reason_wins() {
		let source = CancellationSource::new();
		source.cancel(AbortReason::Explicit("first".to_string()));
		source.cancel(AbortReason::Explicit("second".to_string()));
		assert_eq!(
			source.token().reason(),
			Some(AbortReason::Explicit("first".to_string()))
		);
	}

	#[test]
	fn test_drop_source_does_not_cancel() {
		let source = CancellationSource::new();
		let token = source.token();
		drop(source);
		assert!(!token.is_cancelled());
	}

	#[test]
	fn test_never_is_never_cancelled() {
		assert!(!CancellationToken::never().is_cancelled());
	}

	#[test]
	fn test_any_reflects_first_cancelled_input() {
		let a = CancellationSource::new();
		let b = CancellationSource::new();
		let combined = CancellationToken::any([a.token(), b.token()]);
		assert!(!combined.is_cancelled());

		b.cancel(AbortReason::Explicit("b went away".to_string()));
		assert!(combined.is_cancelled());
		assert_eq!(
			combined.reason(),
			Some(AbortReason::Explicit("b went away".to_string()))
		);
		// The other input is unaffected.
		assert!(!a.is_cancelled());
	}

	#[tokio::test]
	async fn test_cancelled_future_resolves_on_cancel() {
		let source = CancellationSource::new();
		let token = source.token();
		let waiter = tokio::spawn(async move { token.cancelled().await });

		tokio::task::yield_now().await;
		source.cancel(AbortReason::EventClosed);

		assert_eq!(waiter.await.unwrap(), AbortReason::EventClosed);
	}

	#[tokio::test(start_paused = true)]
	async fn test_deadline_token_times_out() {
		let token = CancellationToken::deadline(Duration::from_millis(100));
		assert!(!token.is_cancelled());
		assert_eq!(token.cancelled().await, AbortReason::Timeout);
		assert_eq!(token.reason(), Some(AbortReason::Timeout));
	}

	#[tokio::test(start_paused = true)]
	async fn test_any_of_deadline_and_source() {
		let source = CancellationSource::new();
		let combined = CancellationToken::any([
			source.token(),
			CancellationToken::deadline(Duration::from_secs(5)),
		]);

		let waiter = tokio::spawn({
			let combined = combined.clone();
			async move { combined.cancelled().await }
		});
		tokio::task::yield_now().await;
		source.cancel(AbortReason::Explicit("done".to_string()));

		assert_eq!(
			waiter.await.unwrap(),
			AbortReason::Explicit("done".to_string())
		);
	}

	#[tokio::test]
	async fn test_cancelled_resolves_immediately_when_already_cancelled() {
		let source = CancellationSource::new();
		source.cancel(AbortReason::Timeout);
		assert_eq!(source.token().cancelled().await, AbortReason::Timeout);
	}
}
