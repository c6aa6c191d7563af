use axum::{
    extract::{Path, State},
    response::{sse::Event, Sse},
};
use futures::stream::Stream;
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio_stream::wrappers::{BroadcastStream, ReceiverStream};
use tokio_stream::StreamExt;

use shiptrack_realtime::StreamEvent;

use crate::state::AppState;

fn stream_event_to_axum(event: StreamEvent) -> Event {
    Event::default()
        .event(&event.event_type)
        .data(event.data.to_string())
        .id(event.id)
}

/// SSE feed of tracking updates for one shipment
///
/// Named `tracking_update`/`status_change` events, heartbeat comments on
/// the shared tick, keep-alive comments from axum. The subscription is
/// torn down when the client goes away, wherever in the stream that
/// happens.
pub async fn tracking_events(
    State(state): State<AppState>,
    Path(tracking_number): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (subscriber, receiver) = state.publisher.subscribe(&tracking_number);
    let subscriber_id = subscriber.id.clone();

    tracing::info!(
        subscriber_id = %subscriber_id,
        tracking_number = %tracking_number,
        "SSE stream opened"
    );

    let event_stream = ReceiverStream::new(receiver)
        .map(|event| Ok::<_, Infallible>(stream_event_to_axum(event)));

    let heartbeat_stream = BroadcastStream::new(state.publisher.subscribe_heartbeat())
        .filter_map(|result| result.ok())
        .map(|ts| Ok::<_, Infallible>(Event::default().comment(format!("heartbeat {ts}"))));

    let merged = futures::stream::select(event_stream, heartbeat_stream);

    let publisher = state.publisher.clone();
    let cleanup_id = subscriber_id.clone();
    let final_stream = CleanupStream {
        inner: Box::pin(merged),
        cleanup: Some(Box::new(move || {
            tracing::info!(subscriber_id = %cleanup_id, "SSE stream closed, cleaning up");
            publisher.unsubscribe(&cleanup_id);
        })),
    };

    Sse::new(final_stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(10))
            .text("keep-alive"),
    )
}

/// Runs its cleanup when the response stream is dropped, however the
/// connection ended
struct CleanupStream<S> {
    inner: Pin<Box<S>>,
    cleanup: Option<Box<dyn FnOnce() + Send>>,
}

impl<S> Drop for CleanupStream<S> {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

impl<S: Stream> Stream for CleanupStream<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
