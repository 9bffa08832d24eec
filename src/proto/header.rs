use bytes::Buf;
use bytes::BufMut;
use bytes::BytesMut;

/// Size of the standard header
pub const HEADER_SIZE: usize = 16;

/// Size of the header when the large-array extension is present
pub const EXTENDED_HEADER_SIZE: usize = HEADER_SIZE + 8;

const EXTENSION_MARKER: u16 = 0xFFFF;

/// Decoded message header.
///
/// `payload_size` and `count` are widened to `u32`; the encoder switches to
/// the extended form when either does not fit the 16-bit fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageHeader {
    pub command: u16,
    pub payload_size: u32,
    pub data_type: u16,
    pub count: u32,
    pub param1: u32,
    pub param2: u32,
}

impl MessageHeader {
    pub fn new(
        command: u16,
        payload_size: u32,
        data_type: u16,
        count: u32,
        param1: u32,
        param2: u32,
    ) -> Self {
        Self {
            command,
            payload_size,
            data_type,
            count,
            param1,
            param2,
        }
    }

    pub fn is_extended(&self) -> bool {
        self.payload_size >= u32::from(EXTENSION_MARKER) || self.count > u32::from(u16::MAX)
    }

    pub fn encoded_len(&self) -> usize {
        if self.is_extended() {
            EXTENDED_HEADER_SIZE
        } else {
            HEADER_SIZE
        }
    }

    pub fn encode(
        &self,
        buf: &mut BytesMut,
    ) {
        buf.reserve(self.encoded_len());
        buf.put_u16(self.command);
        if self.is_extended() {
            buf.put_u16(EXTENSION_MARKER);
            buf.put_u16(self.data_type);
            buf.put_u16(0);
            buf.put_u32(self.param1);
            buf.put_u32(self.param2);
            buf.put_u32(self.payload_size);
            buf.put_u32(self.count);
        } else {
            buf.put_u16(self.payload_size as u16);
            buf.put_u16(self.data_type);
            buf.put_u16(self.count as u16);
            buf.put_u32(self.param1);
            buf.put_u32(self.param2);
        }
    }

    /// Decode a header from the front of `src`.
    ///
    /// Returns `None` while `src` does not yet hold a complete header, otherwise
    /// the header and the number of bytes it occupied.
    pub fn decode(src: &[u8]) -> Option<(MessageHeader, usize)> {
        if src.len() < HEADER_SIZE {
            return None;
        }
        let mut cursor = src;
        let command = cursor.get_u16();
        let payload_size = cursor.get_u16();
        let data_type = cursor.get_u16();
        let count = cursor.get_u16();
        let param1 = cursor.get_u32();
        let param2 = cursor.get_u32();

        if payload_size == EXTENSION_MARKER && count == 0 {
            if src.len() < EXTENDED_HEADER_SIZE {
                return None;
            }
            let payload_size = cursor.get_u32();
            let count = cursor.get_u32();
            return Some((
                MessageHeader::new(command, payload_size, data_type, count, param1, param2),
                EXTENDED_HEADER_SIZE,
            ));
        }

        Some((
            MessageHeader::new(
                command,
                u32::from(payload_size),
                data_type,
                u32::from(count),
                param1,
                param2,
            ),
            HEADER_SIZE,
        ))
    }
}
