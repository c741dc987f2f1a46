//! Pull transport integration tests: HTTP polling against a local feed server.

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use matchstream::transport::{Fetcher, HttpFetcher, PullOptions};
use matchstream::types::EventId;
use matchstream::{EventKind, EventTranslator, PullTransport, Transport};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SERVER_DATE: &str = "Sat, 01 Jun 2024 12:00:00 GMT";

/// Scripted feed: serves up to `batch` events after the requested cursor.
#[derive(Clone)]
struct FeedServer {
    events: Arc<Vec<Value>>,
    batch: usize,
    age: Option<&'static str>,
    cursors: Arc<Mutex<Vec<Option<String>>>>,
}

impl FeedServer {
    fn new(events: Vec<Value>, batch: usize) -> Self {
        Self {
            events: Arc::new(events),
            batch,
            age: None,
            cursors: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn requested_cursors(&self) -> Vec<Option<String>> {
        self.cursors.lock().unwrap().clone()
    }
}

async fn serve_events(
    State(feed): State<FeedServer>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let cursor = params.get("last-event-id").cloned();
    feed.cursors.lock().unwrap().push(cursor.clone());

    let start = cursor
        .as_deref()
        .and_then(|c| feed.events.iter().position(|e| e["event_id"] == c))
        .map_or(0, |i| i + 1);
    let batch: Vec<Value> = feed.events.iter().skip(start).take(feed.batch).cloned().collect();

    let mut headers = vec![(header::DATE, SERVER_DATE)];
    if let Some(age) = feed.age {
        headers.push((header::AGE, age));
    }
    (axum::response::AppendHeaders(headers), Json(batch))
}

/// Helper: spin up the feed on a random port, return its endpoint URL.
async fn start_feed(feed: FeedServer) -> String {
    let app = Router::new()
        .route("/events", get(serve_events))
        .with_state(feed);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/events")
}

fn event(id: &str, name: &str, attributes: Value) -> Value {
    json!({
        "event_id": id,
        "event_name": name,
        "event_attributes": attributes,
        "occurred_on": "2024-06-01T12:00:00Z",
    })
}

fn match_script() -> Vec<Value> {
    vec![
        event(
            "1",
            "SportingEventCreated",
            json!({"name": "Final", "homeTeam": "Home", "awayTeam": "Away", "scheduledAt": "2024-06-01T12:00:00Z"}),
        ),
        event("2", "StartPeriod", json!({"period": 1, "time": 0})),
        event(
            "3",
            "StartPossession",
            json!({"id": "p1", "time": 12.5, "startPossessionAttributes": {"teamId": "home"}}),
        ),
        event("4", "Shot", json!({"id": "s1", "time": 20, "shotAttributes": {"onTarget": true}})),
        event("5", "WeatherUpdate", json!({"rain": false})),
        event("6", "StartPossession", json!({"id": "p2", "time": 30})),
        event("7", "ObservationRemoved", json!({"id": "p2"})),
        event("8", "EndPeriod", json!({"period": 1, "time": 2700})),
        event("9", "StartPeriod", json!({"period": "2", "time": 3600})),
        event("10", "EndPeriod", json!({"period": 2, "time": 6300})),
        event("11", "Shot", json!({"id": "late", "time": 6400})),
    ]
}

#[tokio::test]
async fn test_fetch_reads_headers_and_sends_cursor() {
    let mut feed = FeedServer::new(match_script(), 3);
    feed.age = Some("7");
    let endpoint = start_feed(feed.clone()).await;
    let fetcher = HttpFetcher::new(reqwest::Client::new(), endpoint);

    let first = fetcher.fetch(None).await.unwrap();
    assert_eq!(first.date.as_deref(), Some(SERVER_DATE));
    assert_eq!(first.age.as_deref(), Some("7"));
    let ids: Vec<_> = first.events.iter().map(|e| e.event_id.to_string()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);

    let second = fetcher.fetch(Some(EventId::from("3"))).await.unwrap();
    assert_eq!(second.events[0].event_name, "Shot");

    assert_eq!(feed.requested_cursors(), vec![None, Some("3".to_string())]);
}

#[tokio::test]
async fn test_poll_once_stamps_batch_with_server_time() {
    let mut feed = FeedServer::new(match_script(), 2);
    feed.age = Some("5");
    let endpoint = start_feed(feed).await;
    let transport = PullTransport::new(
        Arc::new(HttpFetcher::new(reqwest::Client::new(), endpoint)),
        PullOptions::default(),
    );
    let stamps = Arc::new(Mutex::new(Vec::new()));
    let sink = stamps.clone();
    transport.subscribe(
        "StartPeriod",
        Arc::new(move |d: &matchstream::transport::Delivery| sink.lock().unwrap().push(d.timestamp)),
    );

    assert_eq!(transport.poll_once().await.unwrap(), 2);

    assert_eq!(transport.cursor(), Some(EventId::from("2")));
    let stamps = stamps.lock().unwrap();
    assert_eq!(stamps.len(), 1);
    assert_eq!(stamps[0].to_rfc3339(), "2024-06-01T12:00:05+00:00");
}

#[tokio::test]
async fn test_http_error_keeps_cursor() {
    let app = Router::new().route(
        "/events",
        get(|| async { axum::http::StatusCode::SERVICE_UNAVAILABLE }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let transport = PullTransport::new(
        Arc::new(HttpFetcher::new(reqwest::Client::new(), format!("http://{addr}/events"))),
        PullOptions::default(),
    );

    let err = transport.poll_once().await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(transport.cursor(), None);
}

#[tokio::test]
async fn test_session_runs_until_final_period_ends() {
    let feed = FeedServer::new(match_script(), 4);
    let endpoint = start_feed(feed.clone()).await;
    let transport = PullTransport::new(
        Arc::new(HttpFetcher::new(reqwest::Client::new(), endpoint)),
        PullOptions {
            interval: Duration::from_millis(20),
            request_timeout: Duration::from_secs(5),
        },
    );
    let translator = EventTranslator::new(Arc::new(transport.clone()), 2);

    let emitted = Arc::new(Mutex::new(Vec::new()));
    for kind in EventKind::ALL {
        let emitted = emitted.clone();
        translator.on(kind, move |event, _| {
            emitted.lock().unwrap().push((kind, event.attributes()))
        });
    }

    let handle = transport.start();
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("session did not finish")
        .unwrap()
        .unwrap();

    assert!(transport.is_stopped());
    // The batch holding the final endPeriod is still dispatched to its end.
    assert_eq!(transport.cursor(), Some(EventId::from("11")));
    assert_eq!(
        feed.requested_cursors(),
        vec![None, Some("4".to_string()), Some("8".to_string())]
    );

    let emitted = emitted.lock().unwrap();
    let kinds: Vec<_> = emitted.iter().map(|(kind, _)| kind.as_str()).collect();
    assert_eq!(
        kinds,
        vec![
            "sportingEventCreated",
            "startPeriod",
            "startPossession",
            "shot",
            "endPossession",
            "startPossession",
            "observationRemoved",
            "endPossession",
            "endPeriod",
            "startPeriod",
            "endPeriod",
            "shot",
        ]
    );

    let shot = &emitted[3].1;
    assert_eq!(shot["time"], json!({"time": 20.0, "period": 1}));
    assert_eq!(shot["onTarget"], json!(true));
    assert_eq!(shot["possession"]["id"], json!("p1"));

    // p1 handed over to p2 just before p2 started.
    let handover = &emitted[4].1;
    assert_eq!(handover["id"], json!("p1"));
    let end = handover["endTime"]["time"].as_f64().unwrap();
    assert!((end - (30.0 - 0.0001)).abs() < 1e-9);

    // p2 was retracted, so the period end closes p1 again.
    let closing = &emitted[7].1;
    assert_eq!(closing["id"], json!("p1"));
    assert_eq!(closing["endTime"], json!({"time": 2700.0, "period": 1}));

    assert_eq!(emitted[9].1["period"], json!(2));
    assert_eq!(emitted[11].1["id"], json!("late"));
    assert_eq!(emitted[11].1["time"], json!({"time": 2800.0, "period": 2}));
}
