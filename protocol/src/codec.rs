//! Frame encoding. Every websocket frame is one byte of frame kind followed by a postcard payload.

use crate::messages::AgentRequest;
use crate::{EXECUTE_TURN, SHUTDOWN};
use bytes::{BufMut, Bytes, BytesMut};
use postcard::{from_bytes, to_stdvec};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("expected frame kind {expected}, got {found}")]
    UnexpectedKind { expected: u8, found: u8 },
    #[error("malformed payload: {0}")]
    Payload(#[from] postcard::Error),
}

/// Prefixes the postcard encoding of `payload` with `kind`.
pub fn encode_frame<T: Serialize>(kind: u8, payload: &T) -> Result<Bytes, FrameError> {
    let raw = to_stdvec(payload)?;
    let mut msg = BytesMut::with_capacity(1 + raw.len());
    msg.put_u8(kind);
    msg.put_slice(&raw);
    Ok(msg.freeze())
}

/// Raw text frame, used for closing messages.
pub fn encode_text_frame(kind: u8, text: &str) -> Bytes {
    let raw = text.as_bytes();
    let mut msg = BytesMut::with_capacity(1 + raw.len());
    msg.put_u8(kind);
    msg.put_slice(raw);
    msg.freeze()
}

/// The frame kind, i.e. the first byte.
pub fn frame_kind(bytes: &[u8]) -> Result<u8, FrameError> {
    bytes.first().copied().ok_or(FrameError::Empty)
}

/// Checks the frame kind and decodes the payload behind it.
pub fn decode_frame<T: DeserializeOwned>(expected: u8, bytes: &[u8]) -> Result<T, FrameError> {
    let found = frame_kind(bytes)?;
    if found != expected {
        return Err(FrameError::UnexpectedKind { expected, found });
    }
    Ok(from_bytes(&bytes[1..])?)
}

impl AgentRequest {
    pub fn to_frame(&self) -> Result<Bytes, FrameError> {
        match self {
            AgentRequest::ExecuteTurn(neighbors) => encode_frame(EXECUTE_TURN, neighbors),
            AgentRequest::Shutdown(reason) => encode_frame(SHUTDOWN, reason),
        }
    }

    pub fn from_frame(bytes: &[u8]) -> Result<Self, FrameError> {
        match frame_kind(bytes)? {
            EXECUTE_TURN => Ok(AgentRequest::ExecuteTurn(decode_frame(EXECUTE_TURN, bytes)?)),
            SHUTDOWN => Ok(AgentRequest::Shutdown(decode_frame(SHUTDOWN, bytes)?)),
            found => Err(FrameError::UnexpectedKind {
                expected: EXECUTE_TURN,
                found,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{ArenaRequest, Neighbors};
    use crate::{ARENA_CALL, ARENA_REPLY, Point};

    #[test]
    fn decode_rejects_wrong_kind() {
        let frame = encode_frame(ARENA_CALL, &ArenaRequest::IsGameStarted).unwrap();
        let result = decode_frame::<ArenaRequest>(ARENA_REPLY, &frame);
        assert!(matches!(
            result,
            Err(FrameError::UnexpectedKind {
                expected: ARENA_REPLY,
                found: ARENA_CALL
            })
        ));
    }

    #[test]
    fn decode_rejects_empty_and_truncated_frames() {
        assert!(matches!(
            decode_frame::<ArenaRequest>(ARENA_CALL, &[]),
            Err(FrameError::Empty)
        ));
        let frame = encode_frame(
            ARENA_CALL,
            &ArenaRequest::SetStatusText {
                reference: 3,
                text: "Wandering".into(),
            },
        )
        .unwrap();
        let truncated = &frame[..frame.len() - 2];
        assert!(matches!(
            decode_frame::<ArenaRequest>(ARENA_CALL, truncated),
            Err(FrameError::Payload(_))
        ));
    }

    #[test]
    fn agent_requests_pick_their_frame_kind() {
        let mut neighbors = Neighbors::new();
        neighbors.insert(4, Point::new(1, 2));
        let turn = AgentRequest::ExecuteTurn(neighbors);
        let frame = turn.to_frame().unwrap();
        assert_eq!(frame[0], EXECUTE_TURN);
        assert_eq!(AgentRequest::from_frame(&frame).unwrap(), turn);

        let frame = AgentRequest::Shutdown("game over".into()).to_frame().unwrap();
        assert_eq!(frame[0], SHUTDOWN);
    }
}
