// Pattern matching and registration-order tests through the public
// router surface.

use std::sync::Arc;

use rstest::rstest;
use url::Url;

use nuages::content::{handler_fn, Content, HandlerArgs, HandlerOutcome};
use nuages::host::memory::{InMemoryHistory, RecordingSurface};
use nuages::pattern::PathPattern;
use nuages::router::{NavigateOptions, RouteSpec, RouteTable, Router, RouterOptions};
use nuages::state::StateBlob;

const ORIGIN: &str = "https://app.example.com/";

fn url(s: &str) -> Url {
	Url::parse(s).unwrap()
}

fn tagged(tag: &str) -> RouteSpec {
	let tag = tag.to_string();
	RouteSpec::Inline(handler_fn(move |args: HandlerArgs| {
		let tag = tag.clone();
		async move {
			let captured = args
				.matches
				.as_ref()
				.and_then(|m| m.group("id").or_else(|| m.group("n")))
				.unwrap_or("-")
				.to_string();
			HandlerOutcome::Markup(format!("{}:{}", tag, captured))
		}
	}))
}

async fn router_with(table: RouteTable) -> (Router, Arc<RecordingSurface>) {
	let history = Arc::new(InMemoryHistory::new(url(ORIGIN)));
	let surface = Arc::new(RecordingSurface::new());
	let router = Router::builder()
		.history(history)
		.surface(surface.clone())
		.build();
	router.init(table, RouterOptions::default()).await.unwrap();
	(router, surface)
}

async fn rendered(router: &Router, path: &str) -> String {
	match router
		.navigate(path, StateBlob::new(), NavigateOptions::default())
		.await
		.unwrap()
	{
		Some(Content::Markup(markup)) => markup,
		other => panic!("expected markup for {}, got {:?}", path, other),
	}
}

// Test: the lowest-index matching pattern wins, never a later one
#[tokio::test]
async fn test_first_registered_match_wins() {
	let table = RouteTable::new()
		.route("/", tagged("home"))
		.route("/items/new/", tagged("new"))
		.route("/items/:id/", tagged("detail"));
	let (router, _surface) = router_with(table).await;

	assert_eq!(rendered(&router, "/items/new/").await, "new:-");
	assert_eq!(rendered(&router, "/items/42/").await, "detail:42");
}

// Test: {"/a": H1, "/a/:id": H2} — /a/5 resolves via H2, /a via H1
#[tokio::test]
async fn test_prefix_pattern_does_not_shadow_deeper_routes() {
	let table = RouteTable::new()
		.route("/", tagged("home"))
		.route("/a", tagged("h1"))
		.route("/a/:id", tagged("h2"));
	let (router, _surface) = router_with(table).await;

	assert_eq!(rendered(&router, "/a/5").await, "h2:5");
	assert_eq!(rendered(&router, "/a").await, "h1:-");
}

// Test: inline regex constraints gate matching per segment
#[rstest]
#[case("/x/42", "x:42")]
#[case("/x/007", "x:007")]
#[tokio::test]
async fn test_constrained_parameter_matches(#[case] path: &str, #[case] expected: &str) {
	let table = RouteTable::new()
		.route("/", tagged("home"))
		.route(r"/x/:n(\d+)", tagged("x"));
	let (router, _surface) = router_with(table).await;

	assert_eq!(rendered(&router, path).await, expected);
}

// Test: a constrained mismatch falls through to the not-found handler
#[tokio::test]
async fn test_constrained_mismatch_reaches_not_found() {
	let history = Arc::new(InMemoryHistory::new(url(ORIGIN)));
	let surface = Arc::new(RecordingSurface::new());
	let router = Router::builder()
		.history(history)
		.surface(surface.clone())
		.build();

	let table = RouteTable::new()
		.route("/", tagged("home"))
		.route(r"/x/:n(\d+)", tagged("x"));
	let options = RouterOptions {
		not_found: Some(RouteSpec::Inline(handler_fn(
			|args: HandlerArgs| async move {
				HandlerOutcome::Markup(format!("{} {} [404 Not Found]", args.method, args.url))
			},
		))),
		..RouterOptions::default()
	};
	router.init(table, options).await.unwrap();

	assert_eq!(
		rendered(&router, "/x/abc").await,
		"GET https://app.example.com/x/abc [404 Not Found]"
	);
}

// Test: find_path exposes the first matching registered pattern
#[tokio::test]
async fn test_find_path_returns_first_match() {
	let table = RouteTable::new()
		.route("/", tagged("home"))
		.route("/items/:id/", tagged("detail"));
	let (router, _surface) = router_with(table).await;

	let found = router
		.find_path(&url("https://app.example.com/items/9/"))
		.expect("pattern should match");
	assert_eq!(found.source(), "/items/:id/");
	assert!(router
		.find_path(&url("https://app.example.com/missing"))
		.is_none());
}

// Test: one-shot parameter extraction against an arbitrary URL
#[rstest]
#[case("https://app.example.com/page/bacon/5", Some("5"))]
#[case("https://app.example.com/page/bacon/abc", None)]
fn test_pattern_extract(#[case] target: &str, #[case] expected: Option<&str>) {
	let pattern = PathPattern::parse(r"/page/bacon/:lines(\d+)", Some(&url(ORIGIN))).unwrap();
	assert_eq!(
		pattern.extract(&url(target), "lines"),
		expected.map(str::to_string)
	);
}

// Test: captures arrive per URL part
#[tokio::test]
async fn test_query_and_path_captures() {
	let table = RouteTable::new().route("/", tagged("home")).route(
		"/search/:topic/?page=:page",
		RouteSpec::Inline(handler_fn(|args: HandlerArgs| async move {
			let matches = args.matches.as_ref().unwrap();
			HandlerOutcome::Markup(format!(
				"{}@{}",
				matches.path.get("topic").map(String::as_str).unwrap_or("-"),
				matches.query.get("page").map(String::as_str).unwrap_or("-"),
			))
		})),
	);
	let (router, _surface) = router_with(table).await;

	assert_eq!(rendered(&router, "/search/rust/?page=2").await, "rust@2");
}
