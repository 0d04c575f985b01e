//! Server-sent event transport for executor events.
//!
//! Each event becomes one `data: <json>\n\n` frame. Idle periods are filled
//! with `:keepalive` comments. When the client goes away the response body
//! is dropped, which cancels the execution feeding the channel.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::http::HeaderValue;
use axum::http::header::HeaderName;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::Stream;
use ghostrun_core::Event;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

/// Relay `events` to the client until the executor closes the channel.
///
/// Dropping the response cancels `cancel`.
pub fn sse_response(
    events: mpsc::Receiver<Event>,
    cancel: CancellationToken,
    keepalive: Duration,
) -> Response {
    let events = CancelOnDrop {
        inner: ReceiverStream::new(events),
        _guard: cancel.drop_guard(),
    };
    let stream = events.map(|event| {
        debug!(kind = ?event.kind, tool = ?event.tool_name, "SSE sending");
        Ok::<_, Infallible>(to_sse_event(&event))
    });

    let mut response = Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(keepalive).text("keepalive"))
        .into_response();
    // Disable proxy buffering (nginx)
    response.headers_mut().insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    response
}

/// Event stream that cancels its execution when dropped.
struct CancelOnDrop {
    inner: ReceiverStream<Event>,
    _guard: DropGuard,
}

impl Stream for CancelOnDrop {
    type Item = Event;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}

fn to_sse_event(event: &Event) -> SseEvent {
    SseEvent::default().json_data(event).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to encode event");
        SseEvent::default().data(r#"{"type":"error","message":"Failed to encode event"}"#)
    })
}
