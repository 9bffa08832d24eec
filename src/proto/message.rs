use bytes::Buf;
use bytes::Bytes;
use bytes::BytesMut;

use super::Command;
use super::MessageHeader;
use crate::ProtocolError;

/// One complete inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub body: Bytes,
}

/// Split the next complete message off the front of `buf`.
///
/// `Ok(None)` means more bytes are needed. A payload larger than `limit` is
/// a protocol violation; the caller is expected to drop the circuit.
pub fn take_message(
    buf: &mut BytesMut,
    limit: usize,
) -> Result<Option<Message>, ProtocolError> {
    let Some((header, header_len)) = MessageHeader::decode(&buf[..]) else {
        return Ok(None);
    };

    let payload = header.payload_size as usize;
    if payload > limit {
        return Err(ProtocolError::PayloadTooLarge { size: payload, limit });
    }
    if buf.len() < header_len + payload {
        return Ok(None);
    }

    buf.advance(header_len);
    let body = buf.split_to(payload).freeze();
    Ok(Some(Message { header, body }))
}

/// Read a NUL-terminated (or body-terminated) string.
pub fn read_string(body: &[u8]) -> String {
    let end = body.iter().position(|b| *b == 0).unwrap_or(body.len());
    String::from_utf8_lossy(&body[..end]).into_owned()
}

/// Body of an error response: the offending request header followed by a
/// context string.
pub fn parse_error_body(body: &[u8]) -> Result<(MessageHeader, String), ProtocolError> {
    let Some((request, header_len)) = MessageHeader::decode(body) else {
        return Err(ProtocolError::MalformedBody {
            command: Command::Error.code(),
            reason: "embedded request header truncated",
        });
    };
    Ok((request, read_string(&body[header_len..])))
}
