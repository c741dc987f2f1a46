//! matchstream - tail a live match feed.
//!
//! Connects to a feed endpoint in push or pull mode, rebuilds the match
//! timeline and prints every application event to stdout as one JSON line:
//!
//! ```text
//! {"event":"startPossession","timestamp":"2024-06-01T12:00:05+00:00","attributes":{...}}
//! ```
//!
//! Exits when the final period ends, when a push stream closes, or on Ctrl-C.

use clap::Parser;
use matchstream::types::{Config, FeedMode};
use matchstream::{observability, transport, EventKind, EventTranslator};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "matchstream", version, about = "Tail a live match feed as JSON lines")]
struct Args {
    /// Feed endpoint URL (SSE stream in push mode, JSON resource in pull mode).
    #[arg(long, env = "MATCHSTREAM_ENDPOINT")]
    endpoint: String,

    /// Delivery mode: push or pull.
    #[arg(long, env = "MATCHSTREAM_MODE", default_value = "pull")]
    mode: FeedMode,

    /// Seconds between polls (pull mode).
    #[arg(long, env = "MATCHSTREAM_POLL_INTERVAL", default_value = "5", value_parser = parse_seconds)]
    poll_interval: Duration,

    /// Seconds before a fetch (or the push connect) is abandoned.
    #[arg(long, env = "MATCHSTREAM_REQUEST_TIMEOUT", default_value = "30", value_parser = parse_seconds)]
    request_timeout: Duration,

    /// Number of periods after which the session is finished.
    #[arg(long, env = "MATCHSTREAM_PERIOD_COUNT", default_value_t = 2)]
    period_count: u32,

    /// Emit logs as JSON.
    #[arg(long, env = "MATCHSTREAM_JSON_LOGS")]
    json_logs: bool,
}

impl Args {
    fn into_config(self) -> Config {
        let mut config = Config::default();
        config.feed.endpoint = self.endpoint;
        config.feed.mode = self.mode;
        config.feed.poll_interval = self.poll_interval;
        config.feed.request_timeout = self.request_timeout;
        config.session.period_count = self.period_count;
        config.observability.json_logs = self.json_logs;
        config
    }
}

fn parse_seconds(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("{raw:?} is not a number of seconds"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("{raw:?} is not a valid duration: {e}"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Args::parse().into_config();
    config.validate()?;

    observability::init_tracing_with(&config.observability);

    let transport = transport::from_config(&config.feed)?;
    let translator = EventTranslator::new(transport.clone(), config.session.period_count);

    for kind in EventKind::ALL {
        translator.on(kind, move |event, timestamp| {
            let line = serde_json::json!({
                "event": kind.as_str(),
                "timestamp": timestamp.to_rfc3339(),
                "attributes": event.attributes(),
            });
            println!("{line}");
        });
    }

    tracing::info!(
        "matchstream starting: endpoint={}, mode={:?}, periods={}",
        config.feed.endpoint,
        config.feed.mode,
        config.session.period_count
    );

    let mut feed = transport.start();
    tokio::select! {
        result = &mut feed => result??,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, stopping feed");
            transport.stop();
            // A pull cycle already in flight still completes.
            feed.await??;
        }
    }

    tracing::info!("matchstream finished: state={:?}", translator.current_state());
    Ok(())
}
