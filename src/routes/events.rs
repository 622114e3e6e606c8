use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use super::AppState;

/// GET /api/v1/events
///
/// Live crawl events as SSE, one event per `CrawlEvent` named by its kind.
/// Slow consumers get a `lagged` event with the number of events missed.
pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.ctx.events.subscribe();

    let connected =
        stream::once(async { Ok::<_, Infallible>(Event::default().event("connected").data("ok")) });

    let events = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => Event::default()
                .event(event.kind.as_str())
                .json_data(&event)
                .ok()
                .map(Ok),
            Err(BroadcastStreamRecvError::Lagged(n)) => Event::default()
                .event("lagged")
                .json_data(serde_json::json!({ "missed": n }))
                .ok()
                .map(Ok),
        }
    });

    Sse::new(connected.chain(events)).keep_alive(KeepAlive::default())
}
