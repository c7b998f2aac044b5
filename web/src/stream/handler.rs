use crate::{AppState, Error};
use axum::extract::State;
use axum::http::header::{HeaderName, CACHE_CONTROL, CONNECTION};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use futures::StreamExt;
use log::*;
use sse::Session;
use std::convert::Infallible;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// GET a long-lived event stream of data changes.
///
/// The first event is `connected`. Every change is then delivered as an
/// `update` event whose data is the change payload, with `: heartbeat`
/// comments in between to keep intermediaries from closing the connection.
#[utoipa::path(
    get,
    path = "/events/stream",
    responses(
        (status = 200, description = "Event stream of live data changes", content_type = "text/event-stream", body = String),
        (status = 503, description = "Live updates are temporarily unavailable")
    )
)]
pub async fn stream(State(app_state): State<AppState>) -> Result<impl IntoResponse, Error> {
    let subscriber = app_state.sse_hub.register().await?;
    debug!("Establishing SSE stream for subscriber {}", subscriber.id());

    let session = Session::new(subscriber, app_state.config().heartbeat_interval());

    // When the client goes away hyper drops this stream, which drops the
    // session and unregisters its subscriber.
    let events = session
        .into_stream(app_state.shutdown_signal())
        .map(|frame| Ok::<Event, Infallible>(frame.into_event()));

    let headers = [
        (CACHE_CONTROL, "no-cache"),
        (CONNECTION, "keep-alive"),
        (X_ACCEL_BUFFERING, "no"),
    ];

    Ok((headers, Sse::new(events)))
}
