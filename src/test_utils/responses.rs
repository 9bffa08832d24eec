//! Server side of the circuit: encoders for the responses a server sends.

use bytes::BufMut;
use bytes::Bytes;
use bytes::BytesMut;

use crate::proto::align_payload;
use crate::AccessRights;
use crate::ChannelId;
use crate::Command;
use crate::DbrType;
use crate::IoId;
use crate::MessageHeader;
use crate::Status;

fn response(
    command: Command,
    data_type: u16,
    count: u32,
    param1: u32,
    param2: u32,
    payload: &[u8],
) -> Bytes {
    let len = align_payload(payload.len());
    let mut buf = BytesMut::new();
    MessageHeader::new(command.code(), len as u32, data_type, count, param1, param2).encode(&mut buf);
    buf.put_slice(payload);
    buf.put_bytes(0, len - payload.len());
    buf.freeze()
}

pub fn version_response(minor_version: u16) -> Bytes {
    response(Command::Version, 0, u32::from(minor_version), 0, 0, &[])
}

pub fn create_channel_reply(
    cid: ChannelId,
    sid: u32,
    native_type: DbrType,
    native_count: u32,
) -> Bytes {
    response(Command::CreateChannel, native_type.0, native_count, cid.0, sid, &[])
}

pub fn create_channel_fail(cid: ChannelId) -> Bytes {
    response(Command::CreateChannelFail, 0, 0, cid.0, 0, &[])
}

pub fn access_rights_response(
    cid: ChannelId,
    rights: AccessRights,
) -> Bytes {
    response(Command::AccessRights, 0, 0, cid.0, rights.0, &[])
}

pub fn event_response(
    io: IoId,
    status: Status,
    data_type: DbrType,
    count: u32,
    value: &[u8],
) -> Bytes {
    response(Command::EventAdd, data_type.0, count, status.code(), io.0, value)
}

pub fn read_notify_reply(
    io: IoId,
    status: Status,
    data_type: DbrType,
    count: u32,
    value: &[u8],
) -> Bytes {
    response(Command::ReadNotify, data_type.0, count, status.code(), io.0, value)
}

pub fn write_notify_reply(
    io: IoId,
    status: Status,
    data_type: DbrType,
    count: u32,
) -> Bytes {
    response(Command::WriteNotify, data_type.0, count, status.code(), io.0, &[])
}

/// Error response quoting `request`
pub fn error_response(
    request: MessageHeader,
    status: Status,
    context: &str,
) -> Bytes {
    let mut body = BytesMut::new();
    request.encode(&mut body);
    body.put_slice(context.as_bytes());
    body.put_u8(0);
    response(Command::Error, 0, 0, 0, status.code(), &body)
}

pub fn echo_response() -> Bytes {
    response(Command::Echo, 0, 0, 0, 0, &[])
}

pub fn server_disconnect(cid: ChannelId) -> Bytes {
    response(Command::ServerDisconnect, 0, 0, cid.0, 0, &[])
}

/// DOUBLE elements as they travel on the wire
pub fn doubles(values: &[f64]) -> Bytes {
    let mut buf = BytesMut::new();
    for v in values {
        buf.put_f64(*v);
    }
    buf.freeze()
}
