// src/protocol/serialization.rs
//! Protocol message serialization and deserialization.
//!
//! Messages are JSON documents carried as single length-delimited frames.

use bytes::Bytes;
use tracing::trace;

use crate::config::constants::MAX_MESSAGE_SIZE;
use crate::protocol::types::{MessageError, Request, Response};

/// Serialize a request to a frame
pub fn encode_request(request: &Request) -> Result<Bytes, MessageError> {
    let json = serde_json::to_vec(request)?;
    check_size(json.len())?;
    trace!("Serialized {} request, size: {} bytes", request_name(request), json.len());
    Ok(Bytes::from(json))
}

/// Deserialize a request frame
pub fn decode_request(frame: &[u8]) -> Result<Request, MessageError> {
    check_size(frame.len())?;
    let request: Request = serde_json::from_slice(frame)?;
    trace!("Deserialized {} request, size: {} bytes", request_name(&request), frame.len());
    Ok(request)
}

/// Serialize a response to a frame
pub fn encode_response(response: &Response) -> Result<Bytes, MessageError> {
    let json = serde_json::to_vec(response)?;
    check_size(json.len())?;
    Ok(Bytes::from(json))
}

/// Deserialize a response frame
pub fn decode_response(frame: &[u8]) -> Result<Response, MessageError> {
    check_size(frame.len())?;
    if frame.is_empty() {
        return Err(MessageError::InvalidFormat("empty response".into()));
    }
    Ok(serde_json::from_slice(frame)?)
}

/// Get the name of a request for logging
pub fn request_name(request: &Request) -> &'static str {
    match request {
        Request::Status => "Status",
        Request::RegisterNode { .. } => "RegisterNode",
        Request::GetNodeRegistry => "GetNodeRegistry",
        Request::Onion { .. } => "Onion",
        Request::Deliver { .. } => "Deliver",
        Request::SendMessage { .. } => "SendMessage",
        Request::GetLastReceivedEncryptedMessage => "GetLastReceivedEncryptedMessage",
        Request::GetLastReceivedDecryptedMessage => "GetLastReceivedDecryptedMessage",
        Request::GetLastMessageDestination => "GetLastMessageDestination",
        Request::GetLastReceivedMessage => "GetLastReceivedMessage",
        Request::GetLastSentMessage => "GetLastSentMessage",
        Request::GetLastCircuit => "GetLastCircuit",
    }
}

fn check_size(len: usize) -> Result<(), MessageError> {
    if len > MAX_MESSAGE_SIZE {
        return Err(MessageError::MessageTooLarge);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_frame() {
        let request = Request::Onion { layer: "a:b:c".into() };
        let frame = encode_request(&request).unwrap();
        assert_eq!(decode_request(&frame).unwrap(), request);
    }

    #[test]
    fn test_oversized_request_rejected() {
        let request = Request::Deliver {
            message: "x".repeat(MAX_MESSAGE_SIZE),
        };
        assert!(matches!(encode_request(&request), Err(MessageError::MessageTooLarge)));
    }

    #[test]
    fn test_garbage_frames() {
        assert!(matches!(decode_request(b"{not json"), Err(MessageError::Serialization(_))));
        assert!(matches!(decode_request(br#"{"type":"teleport"}"#), Err(MessageError::Serialization(_))));
        assert!(matches!(decode_response(b""), Err(MessageError::InvalidFormat(_))));
    }
}
