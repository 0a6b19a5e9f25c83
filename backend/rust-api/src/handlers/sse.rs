use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use super::ApiError;
use crate::{
    metrics::SSE_CONNECTIONS_ACTIVE,
    models::{events::StateChanged, SessionEvent},
    services::AppState,
};

/// SSE endpoint for interview events
/// GET /api/v1/interviews/{id}/stream
pub async fn interview_stream(
    State(state): State<Arc<AppState>>,
    Path(interview_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let controller = state.registry.get(&interview_id).await?;
    tracing::info!("Client connected to SSE stream: interview={}", interview_id);

    // Subscribe before reading the state so no transition is missed.
    let receiver = controller.subscribe();
    let current = SessionEvent::StateChanged(StateChanged {
        interview_id: interview_id.clone(),
        state: controller.state().await,
        timestamp: state.clock.now(),
    });

    Ok(Sse::new(create_event_stream(current, receiver)).keep_alive(KeepAlive::default()))
}

/// Decrements the connection gauge when the stream is dropped.
struct ConnectionGuard;

impl ConnectionGuard {
    fn new() -> Self {
        SSE_CONNECTIONS_ACTIVE.inc();
        ConnectionGuard
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        SSE_CONNECTIONS_ACTIVE.dec();
    }
}

struct StreamState {
    pending: Option<SessionEvent>,
    receiver: broadcast::Receiver<SessionEvent>,
    finished: bool,
    _guard: ConnectionGuard,
}

/// Current state first, then live events until the interview is terminal.
fn create_event_stream(
    current: SessionEvent,
    receiver: broadcast::Receiver<SessionEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let initial = StreamState {
        pending: Some(current),
        receiver,
        finished: false,
        _guard: ConnectionGuard::new(),
    };

    stream::unfold(initial, |mut st| async move {
        if st.finished {
            return None;
        }

        let next = match st.pending.take() {
            Some(event) => event,
            None => loop {
                match st.receiver.recv().await {
                    Ok(event) => break event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "SSE subscriber lagged, skipping events");
                    }
                    Err(RecvError::Closed) => return None,
                }
            },
        };

        st.finished = next.is_final();
        let event = Event::default()
            .event(next.event_name())
            .data(next.to_sse_data());
        Some((Ok(event), st))
    })
}
