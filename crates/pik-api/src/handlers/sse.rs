//! Server-sent ledger fan-out (spec §6 `GET /api/events/stream`, §4.3).
//!
//! Axum's own [`axum::response::sse::Sse`] wraps every frame, including
//! keep-alives, in its own comment format; the wire contract here (a
//! `connected` frame, `event: <type>` per ledger event, and a `: heartbeat
//! <iso8601>` comment) doesn't match that shape, so the stream is built by
//! hand over a raw `text/event-stream` body instead.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderValue},
    response::Response,
};
use chrono::Utc;

use crate::state::AppState;

pub async fn stream(State(state): State<Arc<AppState>>) -> Response {
    let mut subscription = state.ledger.subscribe();
    let bus = state.ledger.bus();

    let body_stream = async_stream::stream! {
        let connected = serde_json::json!({
            "clients": bus.subscriber_count(),
            "timestamp": Utc::now().to_rfc3339(),
        });
        yield Ok::<Bytes, std::convert::Infallible>(Bytes::from(format!("event: connected\ndata:{connected}\n\n")));

        let mut heartbeat = tokio::time::interval(Duration::from_secs(30));
        heartbeat.tick().await;

        loop {
            tokio::select! {
                event = subscription.recv() => {
                    match event {
                        Some(projection) => {
                            let data = serde_json::json!({
                                "event_id": projection.event_id,
                                "root_id": projection.root_id,
                                "source_id": projection.source_id,
                                "payload": projection.payload,
                                "changes": projection.changes,
                                "created_at": projection.created_at,
                            });
                            yield Ok(Bytes::from(format!("event: {}\ndata: {}\n\n", projection.event_type, data)));
                        }
                        None => break,
                    }
                }
                _ = heartbeat.tick() => {
                    yield Ok(Bytes::from(format!(": heartbeat {}\n\n", Utc::now().to_rfc3339())));
                }
            }
        }
    };

    let mut response = Response::new(Body::from_stream(body_stream));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("X-Accel-Buffering", HeaderValue::from_static("no"));
    response
}
