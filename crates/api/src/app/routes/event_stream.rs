//! Server-Sent Events feed of committed domain events.
//!
//! Consumed by the notification collaborator; every event published on the
//! in-process bus is forwarded as one `event` message.

use std::convert::Infallible;
use std::time::{Duration, Instant};

use axum::{
    Router,
    extract::Extension,
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
    routing::get,
};
use serde_json::{Value as JsonValue, json};
use tokio::sync::mpsc::unbounded_channel;
use tokio_stream::wrappers::UnboundedReceiverStream;

use clearway_events::{EventBus, EventEnvelope};

use crate::app::services::SharedServices;
use crate::context::UserContext;

const HEARTBEAT_EVERY: Duration = Duration::from_secs(15);
const PAYLOAD_PREVIEW_CHARS: usize = 500;

pub fn router() -> Router {
    Router::new().route("/stream", get(stream_events))
}

/// GET /events/stream
pub async fn stream_events(
    Extension(services): Extension<SharedServices>,
    Extension(user): Extension<UserContext>,
) -> Response {
    // Subscribe before responding so nothing committed after the handshake is missed.
    let subscription = services.bus().subscribe();
    tracing::info!(user_id = %user.user_id(), "event stream opened");

    let (tx, rx) = unbounded_channel::<Result<SseEvent, Infallible>>();

    tokio::task::spawn_blocking(move || {
        let mut last_sent = Instant::now();

        loop {
            match subscription.recv_timeout(Duration::from_millis(1000)) {
                Ok(envelope) => {
                    let data = match serde_json::to_string(&envelope_to_json(&envelope)) {
                        Ok(s) => s,
                        Err(_) => continue,
                    };
                    if tx.send(Ok(SseEvent::default().event("event").data(data))).is_err() {
                        break;
                    }
                    last_sent = Instant::now();
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                    if last_sent.elapsed() > HEARTBEAT_EVERY {
                        let heartbeat = SseEvent::default().event("heartbeat").data("{}");
                        if tx.send(Ok(heartbeat)).is_err() {
                            break;
                        }
                        last_sent = Instant::now();
                    }
                }
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        tracing::debug!("event stream closed");
    });

    Sse::new(UnboundedReceiverStream::new(rx))
        .keep_alive(KeepAlive::new().interval(HEARTBEAT_EVERY))
        .into_response()
}

fn envelope_to_json(envelope: &EventEnvelope<JsonValue>) -> JsonValue {
    json!({
        "event_id": envelope.event_id().to_string(),
        "event_type": envelope.event_type(),
        "aggregate_id": envelope.aggregate_id().to_string(),
        "aggregate_type": envelope.aggregate_type(),
        "sequence_number": envelope.sequence_number(),
        "occurred_at": envelope.occurred_at().to_rfc3339(),
        "payload_preview": truncate_payload(envelope.payload()),
    })
}

/// Payload text cut to a bounded preview, on a char boundary.
fn truncate_payload(payload: &JsonValue) -> String {
    let text = payload.to_string();
    match text.char_indices().nth(PAYLOAD_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text,
    }
}
