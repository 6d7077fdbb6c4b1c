//! Messages exchanged between the main context and the worker.
//!
//! An [`Envelope`] is what crosses the channel. Its fields are optional so
//! that a malformed message can be represented and rejected explicitly;
//! [`Envelope::decode`] turns it into a typed [`Message`].

use serde::{Deserialize, Serialize};
use spectromesh_core::{MeshBounds, ProtocolError};

/// Identifies one of the two output slots of the double buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SlotId {
    #[default]
    One,
    Two,
}

impl SlotId {
    /// Returns the opposite slot.
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }
}

impl From<SlotId> for u8 {
    fn from(slot: SlotId) -> Self {
        match slot {
            SlotId::One => 1,
            SlotId::Two => 2,
        }
    }
}

impl TryFrom<u8> for SlotId {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(ProtocolError::InvalidBufferIndex(other)),
        }
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Message type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// A magnitude frame travelling to the worker.
    #[serde(rename = "0")]
    Source,
    /// A serialized vertex buffer travelling back.
    #[serde(rename = "1")]
    Result,
}

/// A message as it travels between contexts.
///
/// The payload is moved, never shared: once posted, the sender no longer
/// owns the bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: Option<MessageKind>,
    pub data: Option<Vec<u8>>,
    #[serde(rename = "bufferIndex")]
    pub buffer_index: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<MeshBounds>,
}

/// A validated message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Ingest `frame` and produce a result tagged `slot`.
    Source { slot: SlotId, frame: Vec<u8> },
    /// The serialized output computed for the request tagged `slot`.
    Result {
        slot: SlotId,
        payload: Vec<u8>,
        bounds: MeshBounds,
    },
}

impl Envelope {
    /// Wraps a magnitude frame for the worker.
    pub fn source(slot: SlotId, frame: Vec<u8>) -> Self {
        Self {
            kind: Some(MessageKind::Source),
            data: Some(frame),
            buffer_index: Some(slot.into()),
            bounds: None,
        }
    }

    /// Wraps a serialized result for the main context.
    pub fn result(slot: SlotId, payload: Vec<u8>, bounds: MeshBounds) -> Self {
        Self {
            kind: Some(MessageKind::Result),
            data: Some(payload),
            buffer_index: Some(slot.into()),
            bounds: Some(bounds),
        }
    }

    /// Checks the envelope's structure and converts it to a [`Message`].
    pub fn decode(self) -> Result<Message, ProtocolError> {
        let kind = self.kind.ok_or(ProtocolError::MissingKind)?;
        let data = self.data.ok_or(ProtocolError::MissingPayload)?;
        let slot = SlotId::try_from(self.buffer_index.ok_or(ProtocolError::MissingBufferIndex)?)?;

        Ok(match kind {
            MessageKind::Source => Message::Source { slot, frame: data },
            MessageKind::Result => Message::Result {
                slot,
                payload: data,
                bounds: self.bounds.unwrap_or_default(),
            },
        })
    }
}

impl From<Message> for Envelope {
    fn from(message: Message) -> Self {
        match message {
            Message::Source { slot, frame } => Self::source(slot, frame),
            Message::Result {
                slot,
                payload,
                bounds,
            } => Self::result(slot, payload, bounds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_ids() {
        assert_eq!(SlotId::One.other(), SlotId::Two);
        assert_eq!(SlotId::Two.other(), SlotId::One);
        assert_eq!(u8::from(SlotId::Two), 2);
        assert_eq!(SlotId::try_from(1), Ok(SlotId::One));
        assert_eq!(SlotId::try_from(3), Err(ProtocolError::InvalidBufferIndex(3)));
        assert_eq!(SlotId::Two.to_string(), "2");
    }

    #[test]
    fn test_decode_source() {
        let message = Envelope::source(SlotId::Two, vec![1, 2, 3]).decode().unwrap();
        assert_eq!(
            message,
            Message::Source {
                slot: SlotId::Two,
                frame: vec![1, 2, 3]
            }
        );
    }

    #[test]
    fn test_decode_result_keeps_bounds() {
        let bounds = MeshBounds {
            min_x: 0.0,
            max_x: 4.0,
            min_z: 1.0,
            max_z: 2.0,
        };
        let envelope = Envelope::result(SlotId::One, vec![0; 72], bounds);
        let Message::Result { bounds: got, .. } = envelope.decode().unwrap() else {
            panic!("expected a result");
        };
        assert_eq!(got, bounds);
    }

    #[test]
    fn test_malformed_envelopes() {
        let missing_kind = Envelope {
            data: Some(vec![]),
            buffer_index: Some(1),
            ..Envelope::default()
        };
        assert_eq!(missing_kind.decode(), Err(ProtocolError::MissingKind));

        let missing_data = Envelope {
            kind: Some(MessageKind::Source),
            buffer_index: Some(1),
            ..Envelope::default()
        };
        assert_eq!(missing_data.decode(), Err(ProtocolError::MissingPayload));

        let missing_index = Envelope {
            kind: Some(MessageKind::Result),
            data: Some(vec![]),
            ..Envelope::default()
        };
        assert_eq!(
            missing_index.decode(),
            Err(ProtocolError::MissingBufferIndex)
        );

        let bad_index = Envelope {
            buffer_index: Some(0),
            ..Envelope::source(SlotId::One, vec![])
        };
        assert_eq!(bad_index.decode(), Err(ProtocolError::InvalidBufferIndex(0)));
    }

    #[test]
    fn test_json_wire_format() {
        let json = serde_json::to_string(&Envelope::source(SlotId::One, vec![7, 8])).unwrap();
        assert_eq!(json, r#"{"type":"0","data":[7,8],"bufferIndex":1}"#);

        let parsed: Envelope = serde_json::from_str(r#"{"type":"1","bufferIndex":2}"#).unwrap();
        assert_eq!(parsed.decode(), Err(ProtocolError::MissingPayload));
    }
}
