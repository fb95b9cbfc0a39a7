//! Batch feed engine integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::stream;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vespa_client::{
    DocumentOperation, DocumentOperationKind, FeedOptions, FeedOutcome, HttpConfig, HttpTransport,
    VespaError, feed_iterable,
};

fn transport(uri: &str) -> HttpTransport {
    HttpTransport::new(
        HttpConfig::builder(uri)
            .retries(0)
            .retry_delay(Duration::from_millis(5))
            .build(),
    )
    .expect("transport")
}

fn doc(id: &str) -> DocumentOperation {
    DocumentOperation::new(id).fields(json!({"title": format!("doc {id}")}))
}

type Outcomes = Arc<Mutex<Vec<(String, bool)>>>;

fn collecting_sink(outcomes: &Outcomes) -> impl Fn(FeedOutcome) + Send + Sync + 'static {
    let outcomes = Arc::clone(outcomes);
    move |outcome: FeedOutcome| {
        outcomes
            .lock()
            .unwrap()
            .push((outcome.id, outcome.result.is_ok()));
    }
}

#[tokio::test]
async fn every_item_is_reported_and_failures_stay_isolated() {
    let server = MockServer::start().await;
    // Document "3" hits a conditional-put failure; everything else succeeds.
    Mock::given(method("POST"))
        .and(path("/document/v1/doc/doc/docid/3"))
        .respond_with(ResponseTemplate::new(412).set_body_json(json!({
            "message": "cond failed",
            "errors": [{"code": 12, "message": "cond failed"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "ok"})))
        .mount(&server)
        .await;

    let outcomes: Outcomes = Arc::new(Mutex::new(Vec::new()));
    let items = vec![
        doc("1"),
        doc("2"),
        DocumentOperation::default().fields(json!({"title": "no id"})),
        doc("3"),
        doc("4"),
    ];

    feed_iterable(
        &transport(&server.uri()),
        stream::iter(items),
        FeedOptions::new("doc"),
        collecting_sink(&outcomes),
    )
    .await
    .expect("batch resolves");

    let mut seen = outcomes.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen.len(), 5);
    assert!(seen.contains(&("unknown".to_string(), false)));
    assert!(seen.contains(&("3".to_string(), false)));
    for id in ["1", "2", "4"] {
        assert!(seen.contains(&(id.to_string(), true)), "missing success for {id}");
    }
}

#[tokio::test]
async fn missing_fields_become_per_item_configuration_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let errors: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let errors_clone = Arc::clone(&errors);

    feed_iterable(
        &transport(&server.uri()),
        stream::iter(vec![DocumentOperation::new("1")]), // no fields
        FeedOptions::new("doc"),
        move |outcome| {
            if let Err(e) = outcome.result {
                assert!(matches!(e, VespaError::Configuration(_)));
                errors_clone.lock().unwrap().push(outcome.id);
            }
        },
    )
    .await
    .expect("batch resolves");

    assert_eq!(errors.lock().unwrap().as_slice(), ["1"]);
    // The invalid item never reached the wire.
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrency_stays_under_the_worker_cap() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(150)))
        .expect(4)
        .mount(&server)
        .await;

    let completed = Arc::new(AtomicUsize::new(0));
    let completed_clone = Arc::clone(&completed);
    let start = Instant::now();

    feed_iterable(
        &transport(&server.uri()),
        stream::iter((1..=4).map(|i| doc(&i.to_string()))),
        FeedOptions::new("doc").max_workers(2),
        move |outcome| {
            assert!(outcome.result.is_ok());
            completed_clone.fetch_add(1, Ordering::SeqCst);
        },
    )
    .await
    .expect("batch resolves");

    // Two waves of two 150ms requests each.
    assert!(start.elapsed() >= Duration::from_millis(300));
    assert_eq!(completed.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn update_batches_send_puts_with_wrapped_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let outcomes: Outcomes = Arc::new(Mutex::new(Vec::new()));
    feed_iterable(
        &transport(&server.uri()),
        stream::iter(vec![doc("1"), doc("2")]),
        FeedOptions::new("doc").operation(DocumentOperationKind::Update),
        collecting_sink(&outcomes),
    )
    .await
    .expect("batch resolves");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        assert!(body.get("fields").is_some());
    }
}

#[tokio::test]
async fn delete_batches_need_no_fields() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let outcomes: Outcomes = Arc::new(Mutex::new(Vec::new()));
    feed_iterable(
        &transport(&server.uri()),
        stream::iter(vec![DocumentOperation::new("1"), DocumentOperation::new("2")]),
        FeedOptions::new("doc").operation(DocumentOperationKind::Delete),
        collecting_sink(&outcomes),
    )
    .await
    .expect("batch resolves");

    assert_eq!(outcomes.lock().unwrap().len(), 2);
    assert!(outcomes.lock().unwrap().iter().all(|(_, ok)| *ok));
}

#[tokio::test]
async fn panicking_sink_does_not_abort_the_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let delivered = Arc::new(AtomicUsize::new(0));
    let delivered_clone = Arc::clone(&delivered);

    feed_iterable(
        &transport(&server.uri()),
        stream::iter(vec![doc("1"), doc("2"), doc("3")]),
        FeedOptions::new("doc"),
        move |outcome| {
            delivered_clone.fetch_add(1, Ordering::SeqCst);
            if outcome.id == "2" {
                panic!("sink bug");
            }
        },
    )
    .await
    .expect("batch resolves despite sink panic");

    assert_eq!(delivered.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn batch_wide_defaults_reach_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let outcomes: Outcomes = Arc::new(Mutex::new(Vec::new()));
    feed_iterable(
        &transport(&server.uri()),
        stream::iter(vec![doc("1")]),
        FeedOptions::new("doc")
            .namespace("myns")
            .condition("doc.active==true")
            .create(true),
        collecting_sink(&outcomes),
    )
    .await
    .expect("batch resolves");

    let requests = server.received_requests().await.unwrap();
    let request = &requests[0];
    assert_eq!(request.url.path(), "/document/v1/myns/doc/docid/1");
    let query: Vec<(String, String)> = request
        .url
        .query_pairs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    assert!(query.contains(&("condition".into(), "doc.active==true".into())));
    assert!(query.contains(&("create".into(), "true".into())));
}

#[tokio::test]
async fn empty_schema_fails_before_any_request() {
    let server = MockServer::start().await;
    let err = feed_iterable(
        &transport(&server.uri()),
        stream::iter(vec![doc("1")]),
        FeedOptions::new(""),
        |_| {},
    )
    .await
    .unwrap_err();

    assert!(matches!(err, VespaError::Configuration(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}
