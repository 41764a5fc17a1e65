// Parallel router tests
//
// Verifies that:
// 1. Every route receives the same body and the same request id
// 2. The merger is invoked exactly once per request
// 3. A failing route fails the whole request

use async_trait::async_trait;
use modelserve::errors::ServingResult;
use modelserve::models::ModelServer;
use modelserve::router::{Body, MergeInput, MergedOutput, Merger, NameMerger, ParallelRouter};
use modelserve::ServingError;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock model that records what it received
struct MockModel {
    name: String,
    output: Value,
    should_fail: bool,
    seen: Arc<Mutex<Vec<Body>>>,
}

impl MockModel {
    fn new(name: &str, output: Value) -> Self {
        Self {
            name: name.to_string(),
            output,
            should_fail: false,
            seen: Arc::new(Mutex::new(vec![])),
        }
    }

    fn failing(name: &str) -> Self {
        Self {
            should_fail: true,
            ..Self::new(name, Value::Null)
        }
    }
}

#[async_trait]
impl ModelServer for MockModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn predict(&self, body: &Body) -> ServingResult<Vec<Value>> {
        self.seen.lock().unwrap().push(body.clone());
        if self.should_fail {
            return Err(ServingError::PredictionError(format!(
                "{} cannot score this input",
                self.name
            )));
        }
        Ok(self.output.as_array().cloned().unwrap_or_default())
    }
}

/// Model whose prediction panics
struct PanickingModel;

#[async_trait]
impl ModelServer for PanickingModel {
    fn name(&self) -> &str {
        "panicky"
    }

    async fn predict(&self, _body: &Body) -> ServingResult<Vec<Value>> {
        panic!("scorer crashed");
    }
}

/// Merger that counts invocations and remembers request ids
struct CountingMerger {
    calls: Arc<AtomicUsize>,
    ids: Arc<Mutex<Vec<String>>>,
}

impl Merger for CountingMerger {
    fn merge(&self, body: &Body, results: &MergeInput) -> ServingResult<MergedOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.ids
            .lock()
            .unwrap()
            .extend(results.values().map(|r| r.id.clone()));
        NameMerger::new().merge(body, results)
    }
}

fn body() -> Body {
    json!({"inputs": [[5.1, 3.5, 1.4, 0.2]]})
        .as_object()
        .unwrap()
        .clone()
}

#[tokio::test]
async fn test_all_routes_invoked_and_merged_once() {
    let champion = MockModel::new("sepal_length_cm", json!([0, 2]));
    let challenger = MockModel::new("petal_width_cm", json!([1, 2]));
    let champion_seen = Arc::clone(&champion.seen);
    let challenger_seen = Arc::clone(&challenger.seen);

    let calls = Arc::new(AtomicUsize::new(0));
    let ids = Arc::new(Mutex::new(vec![]));
    let merger = CountingMerger {
        calls: Arc::clone(&calls),
        ids: Arc::clone(&ids),
    };

    let mut router = ParallelRouter::new(Box::new(merger));
    router.add_route("champion", Arc::new(champion)).unwrap();
    router.add_route("challenger", Arc::new(challenger)).unwrap();

    let merged = router.run(body()).await.unwrap();

    assert_eq!(
        Value::Object(merged),
        json!({"sepal_length_cm": [0, 2], "petal_width_cm": [1, 2]})
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(champion_seen.lock().unwrap().as_slice(), &[body()]);
    assert_eq!(challenger_seen.lock().unwrap().as_slice(), &[body()]);

    let ids = ids.lock().unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0], ids[1], "routes of one request share an id");
}

#[tokio::test]
async fn test_failing_route_fails_request() {
    let calls = Arc::new(AtomicUsize::new(0));
    let merger = CountingMerger {
        calls: Arc::clone(&calls),
        ids: Arc::new(Mutex::new(vec![])),
    };

    let mut router = ParallelRouter::new(Box::new(merger));
    router
        .add_route("champion", Arc::new(MockModel::new("m1", json!([0]))))
        .unwrap();
    router
        .add_route("challenger", Arc::new(MockModel::failing("m2")))
        .unwrap();

    let err = router.run(body()).await.unwrap_err();
    assert!(matches!(err, ServingError::PredictionError(_)));
    assert!(err.to_string().contains("m2"));
    assert_eq!(calls.load(Ordering::SeqCst), 0, "merge must not run");
}

#[tokio::test]
async fn test_first_failure_by_route_key_is_reported() {
    let mut router = ParallelRouter::default();
    router.add_route("zeta", Arc::new(MockModel::failing("z"))).unwrap();
    router.add_route("alpha", Arc::new(MockModel::failing("a"))).unwrap();

    let err = router.run(body()).await.unwrap_err();
    assert!(err.to_string().contains("a cannot score"));
}

#[tokio::test]
async fn test_panicking_route_is_a_server_error() {
    let mut router = ParallelRouter::default();
    router
        .add_route("champion", Arc::new(MockModel::new("m1", json!([0]))))
        .unwrap();
    router.add_route("challenger", Arc::new(PanickingModel)).unwrap();

    let err = router.run(body()).await.unwrap_err();
    assert!(matches!(
        &err,
        ServingError::RouteAborted { route, .. } if route == "challenger"
    ));
    assert!(!err.is_client_error());
}

#[tokio::test]
async fn test_missing_inputs_rejected_before_predict() {
    let model = MockModel::new("m", json!([0]));
    let seen = Arc::clone(&model.seen);

    let mut router = ParallelRouter::default();
    router.add_route("only", Arc::new(model)).unwrap();

    let bad = json!({"sepal_length": 5.1}).as_object().unwrap().clone();
    let err = router.run(bad).await.unwrap_err();
    assert!(matches!(err, ServingError::InvalidRequest(_)));
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_no_routes_merges_to_empty() {
    let router = ParallelRouter::default();
    assert!(router.run(body()).await.unwrap().is_empty());

    let strict = ParallelRouter::new(Box::new(NameMerger::new().require_results(true)));
    assert!(matches!(
        strict.run(body()).await,
        Err(ServingError::EmptyInput)
    ));
}

#[test]
fn test_duplicate_route_key_rejected() {
    let mut router = ParallelRouter::default();
    router
        .add_route("champion", Arc::new(MockModel::new("a", json!([]))))
        .unwrap();
    let err = router
        .add_route("champion", Arc::new(MockModel::new("b", json!([]))))
        .unwrap_err();
    assert!(matches!(err, ServingError::InvalidConfig(_)));
}
