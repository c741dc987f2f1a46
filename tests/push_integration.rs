//! Push transport integration tests: Server-Sent Events from a local feed server.

use axum::response::sse::{Event, Sse};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use futures::stream::{self, Stream, StreamExt};
use matchstream::transport::{Clock, Delivery};
use matchstream::{EventKind, EventTranslator, Error, PushTransport, Transport};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug)]
struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

type Scripted = (u32, &'static str, Value);

fn sse_event((id, name, attributes): &Scripted) -> Event {
    let data = json!({
        "eventAttributes": attributes,
        "occurredOn": "2024-06-01T12:00:00Z",
    });
    Event::default()
        .event(*name)
        .id(id.to_string())
        .data(data.to_string())
}

fn session() -> Vec<Scripted> {
    vec![
        (1, "StartPeriod", json!({"period": 1, "time": 100})),
        (2, "StartPossession", json!({"id": "p1", "time": 110})),
        (3, "Goal", json!({"id": "g1", "time": 125, "goalAttributes": {"scorer": 9}})),
        (4, "EndPeriod", json!({"period": 1, "time": 200})),
    ]
}

/// Helper: serve `script` as one SSE response, then either close or hang.
async fn start_feed(script: Vec<Scripted>, hold_open: bool) -> String {
    let script = Arc::new(script);
    let app = Router::new().route(
        "/stream",
        get(move || {
            let events: Vec<Event> = script.iter().map(sse_event).collect();
            async move {
                let body: std::pin::Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>> =
                    if hold_open {
                        Box::pin(stream::iter(events.into_iter().map(Ok)).chain(stream::pending()))
                    } else {
                        Box::pin(stream::iter(events.into_iter().map(Ok)))
                    };
                Sse::new(body)
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/stream")
}

fn fixed_transport(endpoint: String) -> (PushTransport, DateTime<Utc>) {
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 30).unwrap();
    let transport = PushTransport::with_clock(reqwest::Client::new(), endpoint, Arc::new(FixedClock(at)));
    (transport, at)
}

#[tokio::test]
async fn test_stream_drives_translator_until_final_period() {
    let endpoint = start_feed(session(), true).await;
    let (transport, at) = fixed_transport(endpoint);
    let translator = EventTranslator::new(Arc::new(transport.clone()), 1);

    let emitted = Arc::new(Mutex::new(Vec::new()));
    for kind in EventKind::ALL {
        let emitted = emitted.clone();
        translator.on(kind, move |event, timestamp| {
            emitted
                .lock()
                .unwrap()
                .push((kind, event.attributes(), timestamp))
        });
    }

    // The server never closes the stream; only the final endPeriod ends the session.
    tokio::time::timeout(Duration::from_secs(10), transport.start())
        .await
        .expect("session did not finish")
        .unwrap()
        .unwrap();

    assert!(transport.is_stopped());
    let emitted = emitted.lock().unwrap();
    let kinds: Vec<_> = emitted.iter().map(|(kind, _, _)| kind.as_str()).collect();
    assert_eq!(
        kinds,
        vec!["startPeriod", "startPossession", "goal", "endPossession", "endPeriod"]
    );
    assert!(emitted.iter().all(|(_, _, ts)| *ts == at));

    let goal = &emitted[2].1;
    assert_eq!(goal["time"], json!({"time": 25.0, "period": 1}));
    assert_eq!(goal["scorer"], json!(9));
    assert_eq!(goal["possession"]["startTime"], json!({"time": 10.0, "period": 1}));

    assert_eq!(emitted[3].1["endTime"], json!({"time": 100.0, "period": 1}));
}

#[tokio::test]
async fn test_closed_stream_finishes_task() {
    let endpoint = start_feed(session().into_iter().take(2).collect(), false).await;
    let (transport, _) = fixed_transport(endpoint);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    transport.subscribe(
        "StartPossession",
        Arc::new(move |d: &Delivery| sink.lock().unwrap().push(d.event_id.clone())),
    );

    tokio::time::timeout(Duration::from_secs(10), transport.start())
        .await
        .expect("stream did not end")
        .unwrap()
        .unwrap();

    assert!(!transport.is_stopped());
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(seen.lock().unwrap()[0].as_ref().map(|id| id.as_str()), Some("2"));
}

#[tokio::test]
async fn test_stop_closes_open_stream() {
    let endpoint = start_feed(Vec::new(), true).await;
    let (transport, _) = fixed_transport(endpoint);

    let handle = transport.start();
    tokio::time::sleep(Duration::from_millis(100)).await;
    transport.stop();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("stop did not end the stream")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_connect_failure_is_reported() {
    // Bind temporarily to get a free port, then drop immediately
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (transport, _) = fixed_transport(format!("http://{addr}/stream"));
    let result = transport.start().await.unwrap();

    assert!(matches!(result, Err(Error::Http(_))));
}
