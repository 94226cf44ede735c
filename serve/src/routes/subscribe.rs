//! `GET /subscribe/{run_id}` (base spec §6): joins a run's live SSE fan-out. Emits an
//! `event: connected` handshake, replays everything already mirrored to Redis so a late
//! joiner sees a prefix of the persisted sequence rather than a gap, then relays live
//! frames until the mirror's in-process channel for that run closes. axum's built-in
//! `KeepAlive` covers the "periodic comment every 30s of idle" requirement without a
//! manual timer.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};

use crate::app::AppState;

pub async fn handle(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before replaying so no live frame emitted between the replay read and
    // the broadcast subscription can be missed.
    let mut frames = state.mirror.subscribe(&run_id).await;
    let replayed = state.mirror.replay(&run_id).await.unwrap_or_else(|e| {
        tracing::warn!(run_id, error = %e.client_message(), "redis replay failed, subscriber starts live-only");
        Vec::new()
    });

    let stream = async_stream::stream! {
        yield Ok::<_, Infallible>(Event::default().event("connected").data("{}"));

        for frame in replayed {
            yield Ok(Event::default().event(frame.event_type).data(frame.payload));
        }

        loop {
            match frames.recv().await {
                Ok(frame) => yield Ok(Event::default().event(frame.event_type).data(frame.payload)),
                // A lagged receiver has a gap in the live feed; re-reading the
                // (small, bounded) mirror re-establishes a contiguous prefix instead
                // of silently skipping frames.
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                    match state.mirror.replay(&run_id).await {
                        Ok(catch_up) => {
                            for frame in catch_up {
                                yield Ok(Event::default().event(frame.event_type).data(frame.payload));
                            }
                        }
                        Err(e) => {
                            tracing::warn!(run_id, error = %e.client_message(), "redis replay after lag failed");
                        }
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
        yield Ok(Event::default().data("[DONE]"));
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keep-alive"),
    )
}
