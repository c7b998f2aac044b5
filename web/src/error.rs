use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use sse::error::{Error as SseError, ErrorKind as SseErrorKind};

use log::*;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(SseError);

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

// Only failures before a stream starts reach here. Once the first frame is
// written the response status is fixed and errors end the stream instead.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self.0.error_kind {
            SseErrorKind::HubStopped => {
                error!("Rejecting request, SSE hub is not running");
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE UNAVAILABLE").into_response()
            }
            SseErrorKind::MalformedPayload(kind) => {
                warn!("Malformed payload in request handling: {kind:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR").into_response()
            }
        }
    }
}

impl<E> From<E> for Error
where
    E: Into<SseError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_stopped_maps_to_service_unavailable() {
        let response = Error::from(SseError::hub_stopped()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_malformed_payload_maps_to_internal_error() {
        let err = sse::Payload::try_from("").unwrap_err();
        let response = Error::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
