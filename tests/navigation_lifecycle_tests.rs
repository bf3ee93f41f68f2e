// Navigation controller tests over the in-memory hosts: commit ordering,
// no-op detection, prevention, rollback, and jump serialization.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use http::Method;
use parking_lot::Mutex;
use url::Url;

use nuages::cancel::{AbortReason, CancellationSource, CancellationToken};
use nuages::content::{handler_fn, Content, FormPayload, HandlerArgs, HandlerOutcome, MetaField, RouteModule};
use nuages::error::NavigationError;
use nuages::host::memory::{
	FailingSurface, InMemoryHistory, MemoryStateStore, RecordingMetadata, RecordingReporter,
	RecordingSurface, StaticModuleHost,
};
use nuages::host::{HistoryHost, StateStore};
use nuages::lifecycle::{LifecycleEvent, NavigationKind, WaitOptions};
use nuages::router::{NavigateOptions, RouteSpec, RouteTable, Router, RouterOptions};
use nuages::state::StateBlob;

const ORIGIN: &str = "https://app.example.com/";

struct Fixture {
	router: Router,
	history: Arc<InMemoryHistory>,
	surface: Arc<RecordingSurface>,
	store: Arc<MemoryStateStore>,
	modules: Arc<StaticModuleHost>,
	metadata: Arc<RecordingMetadata>,
	reporter: Arc<RecordingReporter>,
}

fn fixture() -> Fixture {
	let history = Arc::new(InMemoryHistory::new(Url::parse(ORIGIN).unwrap()));
	let surface = Arc::new(RecordingSurface::new());
	let store = Arc::new(MemoryStateStore::new());
	let modules = Arc::new(StaticModuleHost::new());
	let metadata = Arc::new(RecordingMetadata::new());
	let reporter = Arc::new(RecordingReporter::new());
	let router = Router::builder()
		.history(history.clone())
		.surface(surface.clone())
		.store(store.clone())
		.modules(modules.clone())
		.metadata(metadata.clone())
		.reporter(reporter.clone())
		.build();
	Fixture {
		router,
		history,
		surface,
		store,
		modules,
		metadata,
		reporter,
	}
}

fn markup_route(text: &str) -> RouteSpec {
	let text = text.to_string();
	RouteSpec::Inline(handler_fn(move |_args: HandlerArgs| {
		let text = text.clone();
		async move { HandlerOutcome::Markup(text) }
	}))
}

fn basic_table() -> RouteTable {
	RouteTable::new()
		.route("/", markup_route("home"))
		.route("/a", markup_route("page a"))
}

async fn init(fixture: &Fixture, table: RouteTable) -> CancellationToken {
	fixture
		.router
		.init(table, RouterOptions::default())
		.await
		.expect("init should succeed")
}

// Test: init performs one navigate-free resolution of the current location
#[tokio::test]
async fn test_init_resolves_initial_location() {
	let fixture = fixture();
	init(&fixture, basic_table()).await;

	assert_eq!(fixture.surface.swap_count(), 1);
	assert_eq!(
		fixture.surface.current(),
		Some(Content::Markup("home".to_string()))
	);
	assert_eq!(fixture.history.push_count(), 0);
}

// Test: a committed navigation pushes history, swaps content, fires load
#[tokio::test]
async fn test_navigate_commits() {
	let fixture = fixture();
	init(&fixture, basic_table()).await;

	let loads = Arc::new(AtomicUsize::new(0));
	{
		let loads = Arc::clone(&loads);
		fixture.router.bus().connect(
			Arc::new(move |_event: &LifecycleEvent| {
				loads.fetch_add(1, Ordering::SeqCst);
			}),
			Some(&[NavigationKind::Load]),
			None,
		);
	}

	let content = fixture
		.router
		.navigate("/a", StateBlob::new(), NavigateOptions::default())
		.await
		.unwrap();

	assert_eq!(content, Some(Content::Markup("page a".to_string())));
	assert_eq!(fixture.history.push_count(), 1);
	assert_eq!(
		fixture.history.current().url.as_str(),
		"https://app.example.com/a"
	);
	assert_eq!(fixture.surface.current(), Some(Content::Markup("page a".to_string())));
	assert_eq!(loads.load(Ordering::SeqCst), 1);
}

// Test: navigating to the current location is a strict no-op
#[tokio::test]
async fn test_navigate_to_current_location_is_noop() {
	let fixture = fixture();
	init(&fixture, basic_table()).await;
	let swaps_before = fixture.surface.swap_count();

	let dispatches = Arc::new(AtomicUsize::new(0));
	{
		let dispatches = Arc::clone(&dispatches);
		fixture.router.bus().connect(
			Arc::new(move |_event: &LifecycleEvent| {
				dispatches.fetch_add(1, Ordering::SeqCst);
			}),
			None,
			None,
		);
	}

	let result = fixture
		.router
		.navigate(ORIGIN, StateBlob::new(), NavigateOptions::default())
		.await
		.unwrap();

	assert_eq!(result, None);
	assert_eq!(dispatches.load(Ordering::SeqCst), 0);
	assert_eq!(fixture.history.push_count(), 0);
	assert_eq!(fixture.surface.swap_count(), swaps_before);
}

// Test: preventing the navigate event stops the commit before any push
#[tokio::test]
async fn test_prevented_navigation_returns_none() {
	let fixture = fixture();
	init(&fixture, basic_table()).await;

	fixture.router.bus().connect(
		Arc::new(|event: &LifecycleEvent| event.prevent_default()),
		Some(&[NavigationKind::Navigate]),
		Some("blocker"),
	);

	let result = fixture
		.router
		.navigate("/a", StateBlob::new(), NavigateOptions::default())
		.await
		.unwrap();

	assert_eq!(result, None);
	assert_eq!(fixture.history.push_count(), 0);
	assert_eq!(
		fixture.surface.current(),
		Some(Content::Markup("home".to_string()))
	);
}

// Test: a wait_until token cancelling before close vetoes the navigation
#[tokio::test(start_paused = true)]
async fn test_wait_until_token_cancel_vetoes_navigation() {
	let fixture = fixture();
	init(&fixture, basic_table()).await;

	let source = Arc::new(CancellationSource::new());
	{
		let source = Arc::clone(&source);
		fixture.router.bus().connect(
			Arc::new(move |event: &LifecycleEvent| {
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
			}),
			Some(&[NavigationKind::Navigate]),
			None,
		);
	}

	{
		let source = Arc::clone(&source);
		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(10)).await;
			source.cancel(AbortReason::Explicit("session expired".to_string()));
		});
	}

	let result = fixture
		.router
		.navigate("/a", StateBlob::new(), NavigateOptions::default())
		.await
		.unwrap();

	assert_eq!(result, None);
	assert_eq!(fixture.history.push_count(), 0);
}

// Test: navigate → back → forward reproduces the original content
#[tokio::test]
async fn test_back_forward_content_equivalence() {
	let fixture = fixture();
	init(&fixture, basic_table()).await;

	let first = fixture
		.router
		.navigate("/a", StateBlob::new(), NavigateOptions::default())
		.await
		.unwrap()
		.expect("navigation should commit");

	assert!(fixture.router.back().await.unwrap());
	assert_eq!(
		fixture.surface.current(),
		Some(Content::Markup("home".to_string()))
	);

	assert!(fixture.router.forward().await.unwrap());
	assert_eq!(fixture.surface.current(), Some(first));
	assert_eq!(
		fixture.history.current().url.as_str(),
		"https://app.example.com/a"
	);
}

// Test: a commit-phase failure triggers a corrective back() and an
// out-of-band report, without surfacing the error to the caller
#[tokio::test]
async fn test_commit_failure_rolls_back() {
	let history = Arc::new(InMemoryHistory::new(Url::parse(ORIGIN).unwrap()));
	let surface = Arc::new(FailingSurface::new());
	let reporter = Arc::new(RecordingReporter::new());
	let router = Router::builder()
		.history(history.clone())
		.surface(surface.clone())
		.reporter(reporter.clone())
		.build();

	router
		.init(basic_table(), RouterOptions::default())
		.await
		.unwrap();
	let reports_after_init = reporter.errors().len();

	let result = router
		.navigate("/a", StateBlob::new(), NavigateOptions::default())
		.await
		.unwrap();

	assert_eq!(result, None);
	assert_eq!(history.current().url.as_str(), ORIGIN);
	assert!(reporter.errors().len() > reports_after_init);
}

// Test: init collects all registration failures into one aggregate and
// keeps the valid entries registered
#[tokio::test]
async fn test_init_collects_registration_failures() {
	let fixture = fixture();
	let table = RouteTable::new()
		.route("/", markup_route("home"))
		.route("/x/:n(\\d+", markup_route("broken"))
		.route("/y/:", markup_route("also broken"))
		.route("/ok", markup_route("fine"));

	let error = fixture
		.router
		.init(table, RouterOptions::default())
		.await
		.expect_err("init should aggregate failures");

	match error {
		NavigationError::RouteInit(aggregate) => {
			let patterns: Vec<_> = aggregate
				.failures
				.iter()
				.map(|f| f.pattern.as_str())
				.collect();
			assert_eq!(patterns, vec!["/x/:n(\\d+", "/y/:"]);
		}
		other => panic!("expected RouteInit, got {}", other),
	}

	// The valid entries settled and stayed registered.
	let ok = Url::parse("https://app.example.com/ok").unwrap();
	assert!(fixture.router.find_path(&ok).is_some());
}

// Test: the init-returned token fires on the very next navigation
#[tokio::test]
async fn test_startup_token_fires_on_first_navigation() {
	let fixture = fixture();
	let startup = init(&fixture, basic_table()).await;
	assert!(!startup.is_cancelled());

	fixture
		.router
		.navigate("/a", StateBlob::new(), NavigateOptions::default())
		.await
		.unwrap();

	assert_eq!(startup.reason(), Some(AbortReason::Superseded));
}

// Test: an external token passed at init also fires the startup token
#[tokio::test(start_paused = true)]
async fn test_external_token_fires_startup_token() {
	let fixture = fixture();
	let external = CancellationSource::new();
	let options = RouterOptions {
		external_token: Some(external.token()),
		..RouterOptions::default()
	};
	let startup = fixture
		.router
		.init(basic_table(), options)
		.await
		.unwrap();

	external.cancel(AbortReason::Explicit("teardown".to_string()));
	tokio::time::sleep(Duration::from_millis(5)).await;

	assert_eq!(
		startup.reason(),
		Some(AbortReason::Explicit("teardown".to_string()))
	);
}

// Test: an unmatched route reaches the not-found handler with the literal
// method and URL
#[tokio::test]
async fn test_not_found_handler_sees_method_and_url() {
	let fixture = fixture();
	let table = RouteTable::new()
		.route("/", markup_route("home"))
		.route("/x/:n(\\d+)", markup_route("matched"));
	let options = RouterOptions {
		not_found: Some(RouteSpec::Inline(handler_fn(|args: HandlerArgs| async move {
			assert!(args.matches.is_none());
			HandlerOutcome::Markup(format!("{} {} [404 Not Found]", args.method, args.url))
		}))),
		..RouterOptions::default()
	};
	fixture.router.init(table, options).await.unwrap();

	let content = fixture
		.router
		.navigate("/x/abc", StateBlob::new(), NavigateOptions::default())
		.await
		.unwrap();
	assert_eq!(
		content,
		Some(Content::Markup(
			"GET https://app.example.com/x/abc [404 Not Found]".to_string()
		))
	);

	let content = fixture
		.router
		.navigate("/x/42", StateBlob::new(), NavigateOptions::default())
		.await
		.unwrap();
	assert_eq!(content, Some(Content::Markup("matched".to_string())));
}

// Test: a GET submission folds the form payload into the query string and
// drops the payload; a POST submission keeps both intact
#[tokio::test]
async fn test_no_body_method_folds_form_into_query() {
	let fixture = fixture();
	let seen: Arc<Mutex<Vec<(String, Option<FormPayload>)>>> = Arc::new(Mutex::new(Vec::new()));
	let table = RouteTable::new()
		.route("/", markup_route("home"))
		.route("/search", {
			let seen = Arc::clone(&seen);
			RouteSpec::Inline(handler_fn(move |args: HandlerArgs| {
				let seen = Arc::clone(&seen);
				async move {
					seen.lock().push((args.url.to_string(), args.form.clone()));
					HandlerOutcome::Markup("results".to_string())
				}
			}))
		});
	init(&fixture, table).await;

	let mut form = FormPayload::new();
	form.append("q", "rust");
	fixture
		.router
		.submit(
			"/search",
			StateBlob::new(),
			NavigateOptions {
				method: Method::GET,
				form: Some(form.clone()),
				token: None,
			},
		)
		.await
		.unwrap();

	fixture
		.router
		.submit(
			"/search",
			StateBlob::new(),
			NavigateOptions {
				method: Method::POST,
				form: Some(form),
				token: None,
			},
		)
		.await
		.unwrap();

	let seen = seen.lock();
	assert_eq!(seen[0].0, "https://app.example.com/search?q=rust");
	assert_eq!(seen[0].1, None);
	assert_eq!(seen[1].0, "https://app.example.com/search");
	assert!(seen[1].1.is_some());
}

// Test: an already-cancelled caller token rejects with its reason and
// never renders
#[tokio::test]
async fn test_cancelled_token_rejects_navigation() {
	let fixture = fixture();
	init(&fixture, basic_table()).await;
	let swaps_before = fixture.surface.swap_count();

	let source = CancellationSource::new();
	source.cancel(AbortReason::Explicit("gone".to_string()));

	let result = fixture
		.router
		.navigate(
			"/a",
			StateBlob::new(),
			NavigateOptions {
				token: Some(source.token()),
				..NavigateOptions::default()
			},
		)
		.await;

	assert!(matches!(
		result,
		Err(NavigationError::Aborted(AbortReason::Explicit(_)))
	));
	assert_eq!(fixture.surface.swap_count(), swaps_before);
	assert_eq!(fixture.history.push_count(), 0);
	// The rejection went to the caller, not the out-of-band channel.
	assert!(fixture.reporter.errors().is_empty());
}

// Test: reload re-resolves the current location without pushing history
#[tokio::test]
async fn test_reload_re_resolves_current_location() {
	let fixture = fixture();
	let resolutions = Arc::new(AtomicUsize::new(0));
	let table = RouteTable::new().route("/", {
		let resolutions = Arc::clone(&resolutions);
		RouteSpec::Inline(handler_fn(move |_args: HandlerArgs| {
			let n = resolutions.fetch_add(1, Ordering::SeqCst) + 1;
			async move { HandlerOutcome::Markup(format!("render {}", n)) }
		}))
	});
	init(&fixture, table).await;
	assert_eq!(resolutions.load(Ordering::SeqCst), 1);

	assert!(fixture.router.reload().await.unwrap());

	assert_eq!(resolutions.load(Ordering::SeqCst), 2);
	assert_eq!(fixture.history.push_count(), 0);
	assert_eq!(
		fixture.surface.current(),
		Some(Content::Markup("render 2".to_string()))
	);
}

// Test: a redirect-shaped handler result navigates instead of rendering
#[tokio::test]
async fn test_redirect_outcome_triggers_nested_navigation() {
	let fixture = fixture();
	let table = basic_table().route(
		"/old",
		RouteSpec::Inline(handler_fn(|_args: HandlerArgs| async {
			HandlerOutcome::Redirect(Url::parse("https://app.example.com/a").unwrap())
		})),
	);
	init(&fixture, table).await;

	let content = fixture
		.router
		.navigate("/old", StateBlob::new(), NavigateOptions::default())
		.await
		.unwrap();

	assert_eq!(content, Some(Content::Markup("page a".to_string())));
	assert_eq!(
		fixture.history.current().url.as_str(),
		"https://app.example.com/a"
	);
	assert_eq!(fixture.history.push_count(), 2);
}

// Test: module side-channel metadata lands in the sink after a committed
// navigation
#[tokio::test]
async fn test_module_metadata_applied() {
	let fixture = fixture();
	fixture.modules.insert(
		"./views/img.js",
		RouteModule::with_handler(handler_fn(|_args: HandlerArgs| async {
			HandlerOutcome::Markup("<svg/>".to_string())
		}))
		.title(MetaField::Literal("Random Image".to_string())),
	);
	let table = basic_table().route("/img", RouteSpec::Module("./views/img.js".to_string()));
	init(&fixture, table).await;

	fixture
		.router
		.navigate("/img", StateBlob::new(), NavigateOptions::default())
		.await
		.unwrap();

	assert_eq!(fixture.metadata.title(), Some("Random Image".to_string()));
}

// Test: state diffs flow through the store on commit
#[tokio::test]
async fn test_state_diff_applied_on_commit() {
	use serde_json::json;

	let fixture = fixture();
	init(&fixture, basic_table()).await;

	let mut state = StateBlob::new();
	state.insert("user".to_string(), json!("ada"));
	fixture
		.router
		.navigate("/a", state.clone(), NavigateOptions::default())
		.await
		.unwrap();

	assert_eq!(fixture.store.current(), state);
	let diffs = fixture.store.diffs();
	assert_eq!(diffs.len(), 1);
	assert_eq!(diffs[0].added.get("user"), Some(&json!("ada")));
}

// Test: concurrent navigations both commit and the last swap wins; no
// hidden queuing
#[tokio::test(start_paused = true)]
async fn test_concurrent_navigations_last_swap_wins() {
	let fixture = fixture();
	let slow = RouteSpec::Inline(handler_fn(|_args: HandlerArgs| async {
		tokio::time::sleep(Duration::from_millis(5)).await;
		HandlerOutcome::Markup("slow".to_string())
	}));
	let fast = RouteSpec::Inline(handler_fn(|_args: HandlerArgs| async {
		tokio::time::sleep(Duration::from_millis(1)).await;
		HandlerOutcome::Markup("fast".to_string())
	}));
	let table = RouteTable::new()
		.route("/", markup_route("home"))
		.route("/slow", slow)
		.route("/fast", fast);
	init(&fixture, table).await;

	let (first, second) = tokio::join!(
		fixture
			.router
			.navigate("/slow", StateBlob::new(), NavigateOptions::default()),
		fixture
			.router
			.navigate("/fast", StateBlob::new(), NavigateOptions::default()),
	);

	assert_eq!(first.unwrap(), Some(Content::Markup("slow".to_string())));
	assert_eq!(second.unwrap(), Some(Content::Markup("fast".to_string())));
	assert_eq!(fixture.history.push_count(), 2);
	// The slower resolution swapped last and owns the visible result.
	assert_eq!(
		fixture.surface.current(),
		Some(Content::Markup("slow".to_string()))
	);
}

// Test: trusted same-origin link activations navigate; external and
// cross-origin ones are left to the host
#[tokio::test]
async fn test_link_interception() {
	use nuages::router::LinkActivation;

	let fixture = fixture();
	init(&fixture, basic_table()).await;

	let handled = fixture
		.router
		.handle_link(LinkActivation {
			href: "/a".to_string(),
			external: false,
			trusted: true,
		})
		.await
		.unwrap();
	assert_eq!(handled, Some(Content::Markup("page a".to_string())));

	let cross_origin = fixture
		.router
		.handle_link(LinkActivation {
			href: "https://other.example.net/a".to_string(),
			external: false,
			trusted: true,
		})
		.await
		.unwrap();
	assert_eq!(cross_origin, None);

	let external = fixture
		.router
		.handle_link(LinkActivation {
			href: "/".to_string(),
			external: true,
			trusted: true,
		})
		.await
		.unwrap();
	assert_eq!(external, None);
}

// Test: disposers registered by a page run when it is navigated away from
#[tokio::test]
async fn test_disposers_run_on_next_navigation() {
	let fixture = fixture();
	let disposed = Arc::new(AtomicUsize::new(0));
	let table = basic_table().route("/page", {
		let disposed = Arc::clone(&disposed);
		RouteSpec::Inline(handler_fn(move |args: HandlerArgs| {
			let disposed = Arc::clone(&disposed);
			async move {
				args.disposers.push(move || {
					disposed.fetch_add(1, Ordering::SeqCst);
				});
				HandlerOutcome::Markup("page".to_string())
			}
		}))
	});
	init(&fixture, table).await;

	fixture
		.router
		.navigate("/page", StateBlob::new(), NavigateOptions::default())
		.await
		.unwrap();
	assert_eq!(disposed.load(Ordering::SeqCst), 0);

	fixture
		.router
		.navigate("/a", StateBlob::new(), NavigateOptions::default())
		.await
		.unwrap();
	assert_eq!(disposed.load(Ordering::SeqCst), 1);
}
