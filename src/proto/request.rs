//! Encoders for the requests a client sends over a virtual circuit.

use bytes::BufMut;
use bytes::BytesMut;

use super::align_payload;
use super::Command;
use super::DbrType;
use super::EventMask;
use super::MessageHeader;

/// Size of the event-add payload: three f32 deadbands, the mask, padding
const EVENT_ADD_PAYLOAD: u32 = 16;

fn put_padded(
    buf: &mut BytesMut,
    bytes: &[u8],
    padded_len: usize,
) {
    buf.put_slice(bytes);
    buf.put_bytes(0, padded_len - bytes.len());
}

/// NUL-terminated string payload padded to the message alignment.
fn string_payload_len(s: &str) -> usize {
    align_payload(s.len() + 1)
}

pub(crate) fn encode_version(
    buf: &mut BytesMut,
    priority: u8,
    minor_version: u16,
) {
    MessageHeader::new(
        Command::Version.code(),
        0,
        u16::from(priority),
        u32::from(minor_version),
        0,
        0,
    )
    .encode(buf);
}

fn encode_string_message(
    buf: &mut BytesMut,
    command: Command,
    param1: u32,
    param2: u32,
    s: &str,
) {
    let len = string_payload_len(s);
    MessageHeader::new(command.code(), len as u32, 0, 0, param1, param2).encode(buf);
    put_padded(buf, s.as_bytes(), len);
}

pub(crate) fn encode_client_name(
    buf: &mut BytesMut,
    user: &str,
) {
    encode_string_message(buf, Command::ClientName, 0, 0, user);
}

pub(crate) fn encode_host_name(
    buf: &mut BytesMut,
    host: &str,
) {
    encode_string_message(buf, Command::HostName, 0, 0, host);
}

pub(crate) fn encode_create_channel(
    buf: &mut BytesMut,
    cid: u32,
    minor_version: u16,
    name: &str,
) {
    encode_string_message(buf, Command::CreateChannel, cid, u32::from(minor_version), name);
}

pub(crate) fn encode_read_notify(
    buf: &mut BytesMut,
    data_type: DbrType,
    count: u32,
    sid: u32,
    ioid: u32,
) {
    MessageHeader::new(Command::ReadNotify.code(), 0, data_type.0, count, sid, ioid).encode(buf);
}

fn encode_value_message(
    buf: &mut BytesMut,
    command: Command,
    data_type: DbrType,
    count: u32,
    param1: u32,
    param2: u32,
    value: &[u8],
) {
    let len = align_payload(value.len());
    MessageHeader::new(command.code(), len as u32, data_type.0, count, param1, param2).encode(buf);
    put_padded(buf, value, len);
}

/// Plain write without completion.
///
/// Parameter 2 carries the client channel id so that an error reply can be
/// routed back to the channel.
pub(crate) fn encode_write(
    buf: &mut BytesMut,
    data_type: DbrType,
    count: u32,
    sid: u32,
    cid: u32,
    value: &[u8],
) {
    encode_value_message(buf, Command::Write, data_type, count, sid, cid, value);
}

pub(crate) fn encode_write_notify(
    buf: &mut BytesMut,
    data_type: DbrType,
    count: u32,
    sid: u32,
    ioid: u32,
    value: &[u8],
) {
    encode_value_message(buf, Command::WriteNotify, data_type, count, sid, ioid, value);
}

pub(crate) fn encode_event_add(
    buf: &mut BytesMut,
    data_type: DbrType,
    count: u32,
    sid: u32,
    ioid: u32,
    mask: EventMask,
) {
    MessageHeader::new(Command::EventAdd.code(), EVENT_ADD_PAYLOAD, data_type.0, count, sid, ioid).encode(buf);
    // deadbands are unused by servers and always sent as zero
    buf.put_f32(0.0);
    buf.put_f32(0.0);
    buf.put_f32(0.0);
    buf.put_u16(mask.0);
    buf.put_u16(0);
}

pub(crate) fn encode_event_cancel(
    buf: &mut BytesMut,
    data_type: DbrType,
    count: u32,
    sid: u32,
    ioid: u32,
) {
    MessageHeader::new(Command::EventCancel.code(), 0, data_type.0, count, sid, ioid).encode(buf);
}

pub(crate) fn encode_clear_channel(
    buf: &mut BytesMut,
    sid: u32,
    cid: u32,
) {
    MessageHeader::new(Command::ClearChannel.code(), 0, 0, 0, sid, cid).encode(buf);
}

pub(crate) fn encode_echo(buf: &mut BytesMut) {
    MessageHeader::new(Command::Echo.code(), 0, 0, 0, 0, 0).encode(buf);
}
