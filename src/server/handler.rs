// src/server/handler.rs
//! Request handler seam shared by every process role.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, error, trace};

use crate::config::constants::{STATUS_BAD_REQUEST, STATUS_NOT_FOUND};
use crate::protocol::{decode_request, encode_response, request_name, Request, Response};

/// Encoded fallback used when a response cannot be serialized
const FALLBACK_RESPONSE: &[u8] = br#"{"type":"error","code":500,"message":"internal error"}"#;

/// Answers requests for one overlay process
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, request: Request) -> Response;
}

/// Decode a request frame, run it through `handler` and encode the answer.
///
/// Never fails: undecodable frames get a 400 response.
pub async fn dispatch(handler: &dyn RequestHandler, frame: &[u8]) -> Bytes {
    let response = match decode_request(frame) {
        Ok(request) => {
            trace!("Handling {} request", request_name(&request));
            handler.handle(request).await
        }
        Err(e) => {
            debug!("Rejecting undecodable request: {}", e);
            Response::error(STATUS_BAD_REQUEST, "malformed request")
        }
    };

    encode_response(&response).unwrap_or_else(|e| {
        error!("Failed to encode response: {}", e);
        Bytes::from_static(FALLBACK_RESPONSE)
    })
}

/// Standard answer for a request the role does not serve
pub fn unsupported(request: &Request) -> Response {
    Response::error(
        STATUS_NOT_FOUND,
        format!("{} is not supported here", request_name(request)),
    )
}
