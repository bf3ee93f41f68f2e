//! Lifecycle events and the deferred-task "wait" protocol.
//!
//! Every state-changing operation constructs one [`LifecycleEvent`],
//! dispatches it on the bus, and then closes it. Closing awaits the
//! settlement of every deferred task registered through
//! [`wait_until`](LifecycleEvent::wait_until) — settle-all, never
//! short-circuiting on the first failure — and collects every failure into
//! the aggregated error before the event's own token is cancelled.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::{BoxFuture, join_all};
use futures::FutureExt;
use http::Method;
use parking_lot::Mutex;
use url::Url;

use crate::cancel::{AbortReason, CancellationSource, CancellationToken};
use crate::content::FormPayload;
use crate::error::{AggregateError, NavigationError};
use crate::state::StateBlob;

/// The fixed set of lifecycle event reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationKind {
	/// A programmatic or link-driven navigation.
	Navigate,
	/// A programmatic back jump.
	Back,
	/// A programmatic forward jump.
	Forward,
	/// A reload of the current location.
	Reload,
	/// A host-initiated history pop.
	Pop,
	/// A programmatic delta jump.
	Go,
	/// Content has been swapped in. Never cancelable.
	Load,
	/// A form submission.
	Submit,
}

impl NavigationKind {
	/// Returns whether events of this kind can be prevented.
	pub fn is_cancelable(self) -> bool {
		self != Self::Load
	}
}

impl fmt::Display for NavigationKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Navigate => write!(f, "navigate"),
			Self::Back => write!(f, "back"),
			Self::Forward => write!(f, "forward"),
			Self::Reload => write!(f, "reload"),
			Self::Pop => write!(f, "pop"),
			Self::Go => write!(f, "go"),
			Self::Load => write!(f, "load"),
			Self::Submit => write!(f, "submit"),
		}
	}
}

/// The payload carried by a lifecycle event.
#[derive(Debug, Clone)]
pub struct EventDetail {
	/// The location before the transition.
	pub old_url: Url,
	/// The destination, when known at dispatch time.
	pub new_url: Option<Url>,
	/// The state blob before the transition.
	pub old_state: StateBlob,
	/// The destination state blob, when known.
	pub new_state: Option<StateBlob>,
	/// The navigation method.
	pub method: Method,
	/// The form payload, when one survived method folding.
	pub form: Option<FormPayload>,
	/// The history delta for go-style jumps.
	pub delta: Option<i32>,
}

/// Options for [`LifecycleEvent::wait_until_with`].
#[derive(Debug, Clone, Default)]
pub struct WaitOptions {
	/// Cancels the deferred task when fired.
	pub token: Option<CancellationToken>,
	/// When the token cancels while the task is outstanding and the event
	/// is cancelable, not yet prevented, and not yet closed, mark the
	/// default action prevented. Explicit opt-in, replacing the implicit
	/// coupling of supplying a token at all.
	pub veto_on_cancel: bool,
}

/// What closing an event produced.
#[derive(Debug)]
pub struct EventOutcome {
	/// Whether the default action ended up prevented.
	pub prevented: bool,
	/// The aggregated deferred-task error, if any task failed.
	pub error: Option<NavigationError>,
}

type DeferredTask = BoxFuture<'static, Result<(), NavigationError>>;

struct EventFlags {
	cancelable: bool,
	prevented: AtomicBool,
	closed: AtomicBool,
}

/// A cancelable or informational notification marking a navigation-engine
/// transition.
///
/// Created per dispatch, discarded after closing.
pub struct LifecycleEvent {
	kind: NavigationKind,
	detail: EventDetail,
	source: CancellationSource,
	token: CancellationToken,
	flags: Arc<EventFlags>,
	tasks: Mutex<Vec<DeferredTask>>,
}

impl LifecycleEvent {
	/// Creates an event; `load` events are non-cancelable, every other
	/// kind is cancelable.
	pub fn new(kind: NavigationKind, detail: EventDetail) -> Self {
		let source = CancellationSource::new();
		let token = source.token();
		Self {
			kind,
			detail,
			source,
			token,
			flags: Arc::new(EventFlags {
				cancelable: kind.is_cancelable(),
				prevented: AtomicBool::new(false),
				closed: AtomicBool::new(false),
			}),
			tasks: Mutex::new(Vec::new()),
		}
	}

	/// Returns the event's reason tag.
	pub fn kind(&self) -> NavigationKind {
		self.kind
	}

	/// Returns the event's payload.
	pub fn detail(&self) -> &EventDetail {
		&self.detail
	}

	/// Returns whether the event can be prevented.
	pub fn cancelable(&self) -> bool {
		self.flags.cancelable
	}

	/// Returns whether the default action has been prevented.
	pub fn default_prevented(&self) -> bool {
		self.flags.prevented.load(Ordering::Acquire)
	}

	/// Returns whether the event has been closed.
	pub fn closed(&self) -> bool {
		self.flags.closed.load(Ordering::Acquire)
	}

	/// Returns the event's internal cancellation token.
	///
	/// The token cancels when the event is aborted, and in any case once
	/// the event closes.
	pub fn token(&self) -> CancellationToken {
		self.token.clone()
	}

	/// Marks the default action prevented. Ignored for non-cancelable or
	/// already-closed events.
	pub fn prevent_default(&self) {
		if self.flags.cancelable && !self.closed() {
			self.flags.prevented.store(true, Ordering::Release);
		}
	}

	/// Immediately cancels the event's internal token, independent of
	/// [`close`](Self::close).
	pub fn abort(&self, reason: AbortReason) {
		self.source.cancel(reason);
	}

	/// Registers a deferred task whose settlement must be observed before
	/// the event closes.
	///
	/// # Errors
	///
	/// Returns [`NavigationError::Aborted`] if the event is already
	/// closed.
	pub fn wait_until<F>(&self, task: F) -> Result<(), NavigationError>
	where
		F: std::future::Future<Output = Result<(), NavigationError>> + Send + 'static,
	{
		self.wait_until_with(task, WaitOptions::default())
	}

	/// Registers a deferred task with cancellation wiring.
	///
	/// # Errors
	///
	/// Returns [`NavigationError::Aborted`] if the event is already closed
	/// or `options.token` is already cancelled.
	pub fn wait_until_with<F>(
		&self,
		task: F,
		options: WaitOptions,
	) -> Result<(), NavigationError>
	where
		F: std::future::Future<Output = Result<(), NavigationError>> + Send + 'static,
	{
		if self.closed() {
			return Err(NavigationError::Aborted(AbortReason::EventClosed));
		}
		if let Some(token) = &options.token {
			if let Some(reason) = token.reason() {
				return Err(NavigationError::Aborted(reason));
			}
		}

		let deferred: DeferredTask = match options.token {
			None => task.boxed(),
			Some(token) => {
				let flags = Arc::clone(&self.flags);
				let veto = options.veto_on_cancel;
				async move {
					tokio::select! {
						result = task => result,
						reason = token.cancelled() => {
							let open = !flags.closed.load(Ordering::Acquire);
							if veto && flags.cancelable && open {
								flags.prevented.store(true, Ordering::Release);
							}
							Err(NavigationError::Aborted(reason))
						}
					}
				}
				.boxed()
			}
		};

		self.tasks.lock().push(deferred);
		Ok(())
	}

	/// Closes the event: awaits every deferred task, aggregates failures,
	/// cancels the internal token, and reports whether the default action
	/// ended up prevented.
	pub async fn close(&self) -> EventOutcome {
		let mut errors = Vec::new();
		// Tasks may register further tasks while we await; drain until dry.
		loop {
			let batch = {
				let mut tasks = self.tasks.lock();
				if tasks.is_empty() {
					break;
				}
				std::mem::take(&mut *tasks)
			};
			for result in join_all(batch).await {
				if let Err(error) = result {
					errors.push(error);
				}
			}
		}

		self.flags.closed.store(true, Ordering::Release);
		self.source.cancel(AbortReason::EventClosed);

		let error = match errors.len() {
			0 => None,
			1 => errors.pop(),
			_ => Some(NavigationError::Aggregate(AggregateError { errors })),
		};
		EventOutcome {
			prevented: self.default_prevented(),
			error,
		}
	}
}

impl fmt::Debug for LifecycleEvent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LifecycleEvent")
			.field("kind", &self.kind)
			.field("cancelable", &self.flags.cancelable)
			.field("prevented", &self.default_prevented())
			.field("closed", &self.closed())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	fn detail() -> EventDetail {
		EventDetail {
			old_url: Url::parse("https://app.example.com/").unwrap(),
			new_url: Some(Url::parse("https://app.example.com/next").unwrap()),
			old_state: StateBlob::new(),
			new_state: Some(StateBlob::new()),
			method: Method::GET,
			form: None,
			delta: None,
		}
	}

	#[tokio::test]
	async fn test_close_without_tasks() {
		let event = LifecycleEvent::new(NavigationKind::Navigate, detail());
		let outcome = event.close().await;
		assert!(!outcome.prevented);
		assert!(outcome.error.is_none());
		assert!(event.closed());
	}

	#[tokio::test]
	async fn test_close_cancels_internal_token() {
		let event = LifecycleEvent::new(NavigationKind::Navigate, detail());
		let token = event.token();
		event.close().await;
		assert_eq!(token.reason(), Some(AbortReason::EventClosed));
	}

	#[tokio::test]
	async fn test_abort_cancels_before_close() {
		let event = LifecycleEvent::new(NavigationKind::Navigate, detail());
		event.abort(AbortReason::Explicit("stop".to_string()));
		assert_eq!(
			event.token().reason(),
			Some(AbortReason::Explicit("stop".to_string()))
		);
	}

	#[tokio::test]
	async fn test_prevent_default_on_cancelable_event() {
		let event = LifecycleEvent::new(NavigationKind::Navigate, detail());
		event.prevent_default();
		assert!(event.close().await.prevented);
	}

	#[tokio::test]
	async fn test_load_event_cannot_be_prevented() {
		let event = LifecycleEvent::new(NavigationKind::Load, detail());
		assert!(!event.cancelable());
		event.prevent_default();
		assert!(!event.close().await.prevented);
	}

	#[tokio::test]
	async fn test_wait_until_settles_before_close() {
		let event = LifecycleEvent::new(NavigationKind::Navigate, detail());
		let (tx, rx) = tokio::sync::oneshot::channel::<()>();
		event
			.wait_until(async move {
				let _ = rx.await;
				Ok(())
			})
			.unwrap();

		tokio::spawn(async move {
			tokio::task::yield_now().await;
			let _ = tx.send(());
		});

		let outcome = event.close().await;
		assert!(outcome.error.is_none());
	}

	#[tokio::test]
	async fn test_single_task_failure_reported_singular() {
		let event = LifecycleEvent::new(NavigationKind::Navigate, detail());
		event
			.wait_until(async {
				Err(NavigationError::ResourceLoad {
					url: "https://example.com/a.js".to_string(),
					reason: "offline".to_string(),
				})
			})
			.unwrap();

		let outcome = event.close().await;
		assert!(matches!(
			outcome.error,
			Some(NavigationError::ResourceLoad { .. })
		));
	}

	#[tokio::test]
	async fn test_multiple_failures_aggregate() {
		let event = LifecycleEvent::new(NavigationKind::Navigate, detail());
		for n in 0..2 {
			event
				.wait_until(async move {
					Err(NavigationError::Aborted(AbortReason::Explicit(format!(
						"task {}",
						n
					))))
				})
				.unwrap();
		}

		let outcome = event.close().await;
		match outcome.error {
			Some(NavigationError::Aggregate(aggregate)) => {
				assert_eq!(aggregate.errors.len(), 2);
			}
			other => panic!("expected aggregate error, got {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_all_tasks_settle_despite_early_failure() {
		// Settle-all: the failing task must not short-circuit the other.
		let event = LifecycleEvent::new(NavigationKind::Navigate, detail());
		let finished = Arc::new(AtomicBool::new(false));
		event
			.wait_until(async { Err(NavigationError::Aborted(AbortReason::Timeout)) })
			.unwrap();
		event
			.wait_until({
				let finished = Arc::clone(&finished);
				async move {
					tokio::task::yield_now().await;
					finished.store(true, Ordering::Release);
					Ok(())
				}
			})
			.unwrap();

		let outcome = event.close().await;
		assert!(finished.load(Ordering::Acquire));
		assert!(matches!(
			outcome.error,
			Some(NavigationError::Aborted(AbortReason::Timeout))
		));
	}

	#[tokio::test]
	async fn test_wait_until_rejects_after_close() {
		let event = LifecycleEvent::new(NavigationKind::Navigate, detail());
		event.close().await;
		let result = event.wait_until(async { Ok(()) });
		assert!(matches!(
			result,
			Err(NavigationError::Aborted(AbortReason::EventClosed))
		));
	}

	#[tokio::test]
	async fn test_wait_until_rejects_cancelled_token() {
		let event = LifecycleEvent::new(NavigationKind::Navigate, detail());
		let source = CancellationSource::new();
		source.cancel(AbortReason::Superseded);

		let result = event.wait_until_with(
			async { Ok(()) },
			WaitOptions {
				token: Some(source.token()),
				veto_on_cancel: true,
			},
		);
		assert!(matches!(
			result,
			Err(NavigationError::Aborted(AbortReason::Superseded))
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_token_cancel_vetoes_default_action() {
		let event = LifecycleEvent::new(NavigationKind::Navigate, detail());
		let source = CancellationSource::new();
		event
			.wait_until_with(
				async {
					tokio::time::sleep(Duration::from_secs(60)).await;
					Ok(())
				},
				WaitOptions {
					token: Some(source.token()),
					veto_on_cancel: true,
				},
			)
			.unwrap();

		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(10)).await;
			source.cancel(AbortReason::Explicit("veto".to_string()));
		});

		let outcome = event.close().await;
		assert!(outcome.prevented);
		assert!(matches!(
			outcome.error,
			Some(NavigationError::Aborted(AbortReason::Explicit(_)))
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_token_cancel_without_veto_does_not_prevent() {
		let event = LifecycleEvent::new(NavigationKind::Navigate, detail());
		let source = CancellationSource::new();
		event
			.wait_until_with(
				async {
					tokio::time::sleep(Duration::from_secs(60)).await;
					Ok(())
				},
				WaitOptions {
					token: Some(source.token()),
					veto_on_cancel: false,
				},
			)
			.unwrap();

		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(10)).await;
			source.cancel(AbortReason::Superseded);
		});

		let outcome = event.close().await;
		assert!(!outcome.prevented);
	}
}
