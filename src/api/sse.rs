//! Server-Sent Events support

use crate::runtime::ConversationView;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;

/// Stream the current view, then every change after it
pub fn sse_stream(
    view_rx: watch::Receiver<ConversationView>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Intermediate values may be skipped; each event is a full snapshot
    let snapshots = WatchStream::new(view_rx).map(|view| Ok(snapshot_event(&view)));

    Sse::new(snapshots).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn snapshot_event(view: &ConversationView) -> Event {
    match Event::default().event("snapshot").json_data(view) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode view snapshot");
            Event::default().event("error").data(e.to_string())
        }
    }
}
