//! R30x packet framing.
//!
//! Layout (big-endian):
//! - start code: 2 bytes (`0xEF01`)
//! - module address: 4 bytes
//! - packet identifier: 1 byte
//! - length: 2 bytes (payload + checksum)
//! - payload: `length - 2` bytes
//! - checksum: 2 bytes, wrapping sum of identifier, length bytes and payload

use thiserror_no_std::Error;

pub const START_CODE: u16 = 0xEF01;

/// Start code, address, identifier and length
pub const HEADER_LEN: usize = 9;

pub const CHECKSUM_LEN: usize = 2;

/// Largest payload the module emits (data packets of 256 bytes)
pub const MAX_PAYLOAD_LEN: usize = 256;

pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_PAYLOAD_LEN + CHECKSUM_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Command = 0x01,
    Data = 0x02,
    Ack = 0x07,
    EndData = 0x08,
}

impl TryFrom<u8> for PacketKind {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Command),
            0x02 => Ok(Self::Data),
            0x07 => Ok(Self::Ack),
            0x08 => Ok(Self::EndData),
            other => Err(PacketError::UnknownKind(other)),
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    #[error("bad start code 0x{0:04X}")]
    BadStartCode(u16),
    #[error("unknown packet identifier 0x{0:02X}")]
    UnknownKind(u8),
    #[error("invalid length field {0}")]
    InvalidLength(u16),
    #[error("checksum mismatch (expected 0x{expected:04X}, got 0x{actual:04X})")]
    BadChecksum { expected: u16, actual: u16 },
    #[error("expected an acknowledgement, got {0:?}")]
    UnexpectedKind(PacketKind),
    #[error("empty acknowledgement")]
    EmptyAck,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub address: u32,
    pub kind: PacketKind,
    pub payload: heapless::Vec<u8, MAX_PAYLOAD_LEN>,
}

impl Packet {
    /// Build a command packet; payloads longer than a frame are cut off.
    pub fn command(address: u32, payload: &[u8]) -> Self {
        let mut buffer = heapless::Vec::new();
        let len = payload.len().min(MAX_PAYLOAD_LEN);
        // Length is bounded by the capacity above
        let _ = buffer.extend_from_slice(&payload[..len]);
        Self {
            address,
            kind: PacketKind::Command,
            payload: buffer,
        }
    }

    /// Value of the length field (payload plus checksum).
    pub fn length_field(&self) -> u16 {
        (self.payload.len() + CHECKSUM_LEN) as u16
    }

    pub fn checksum(&self) -> u16 {
        checksum(self.kind as u8, self.length_field(), &self.payload)
    }

    /// Serialize into a complete frame.
    pub fn encode(&self) -> heapless::Vec<u8, MAX_FRAME_LEN> {
        let mut frame = heapless::Vec::new();
        // Every part fits: the payload is capped at MAX_PAYLOAD_LEN
        let _ = frame.extend_from_slice(&START_CODE.to_be_bytes());
        let _ = frame.extend_from_slice(&self.address.to_be_bytes());
        let _ = frame.push(self.kind as u8);
        let _ = frame.extend_from_slice(&self.length_field().to_be_bytes());
        let _ = frame.extend_from_slice(&self.payload);
        let _ = frame.extend_from_slice(&self.checksum().to_be_bytes());
        frame
    }

    /// Total frame length announced by a header, or `None` if `header` is short.
    pub fn frame_len(header: &[u8]) -> Result<Option<usize>, PacketError> {
        if header.len() < HEADER_LEN {
            return Ok(None);
        }
        let start = u16::from_be_bytes([header[0], header[1]]);
        if start != START_CODE {
            return Err(PacketError::BadStartCode(start));
        }
        PacketKind::try_from(header[6])?;
        let length = u16::from_be_bytes([header[7], header[8]]);
        if (length as usize) < CHECKSUM_LEN || length as usize > MAX_PAYLOAD_LEN + CHECKSUM_LEN {
            return Err(PacketError::InvalidLength(length));
        }
        Ok(Some(HEADER_LEN + length as usize))
    }

    /// Decode the first frame in `buf`.
    ///
    /// Returns `Ok(None)` while the frame is incomplete, otherwise the packet
    /// and the number of bytes it occupied.
    pub fn decode(buf: &[u8]) -> Result<Option<(Self, usize)>, PacketError> {
        let Some(total) = Self::frame_len(buf)? else {
            return Ok(None);
        };
        if buf.len() < total {
            return Ok(None);
        }

        let address = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]);
        let kind = PacketKind::try_from(buf[6])?;
        let length = u16::from_be_bytes([buf[7], buf[8]]);
        let payload_bytes = &buf[HEADER_LEN..total - CHECKSUM_LEN];
        let actual = u16::from_be_bytes([buf[total - 2], buf[total - 1]]);
        let expected = checksum(kind as u8, length, payload_bytes);
        if expected != actual {
            return Err(PacketError::BadChecksum { expected, actual });
        }

        let mut payload = heapless::Vec::new();
        let _ = payload.extend_from_slice(payload_bytes);

        Ok(Some((
            Self {
                address,
                kind,
                payload,
            },
            total,
        )))
    }
}

fn checksum(kind: u8, length: u16, payload: &[u8]) -> u16 {
    let [len_hi, len_lo] = length.to_be_bytes();
    payload.iter().fold(
        u16::from(kind)
            .wrapping_add(u16::from(len_hi))
            .wrapping_add(u16::from(len_lo)),
        |sum, byte| sum.wrapping_add(u16::from(*byte)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_image_frame() {
        let frame = Packet::command(0xFFFF_FFFF, &[0x01]).encode();

        assert_eq!(
            frame.as_slice(),
            &[0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x00, 0x03, 0x01, 0x00, 0x05]
        );
    }

    #[test]
    fn test_store_frame_checksum() {
        // Store char buffer 1 at id 42
        let packet = Packet::command(0xFFFF_FFFF, &[0x06, 0x01, 0x00, 42]);

        assert_eq!(packet.length_field(), 6);
        assert_eq!(packet.checksum(), 0x01 + 0x06 + 0x06 + 0x01 + 42);
    }

    #[test]
    fn test_decode_ack() {
        let ack = [
            0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x07, 0x00, 0x03, 0x00, 0x00, 0x0A,
        ];
        let (packet, used) = Packet::decode(&ack).unwrap().unwrap();

        assert_eq!(used, ack.len());
        assert_eq!(packet.kind, PacketKind::Ack);
        assert_eq!(packet.payload.as_slice(), &[0x00]);
    }

    #[test]
    fn test_decode_incomplete() {
        let partial = [0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x07, 0x00, 0x03, 0x00];

        assert_eq!(Packet::decode(&partial[..4]), Ok(None));
        assert_eq!(Packet::decode(&partial), Ok(None));
    }

    #[test]
    fn test_decode_rejects_corruption() {
        let bad_start = [0xEE, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x07, 0x00, 0x03];
        assert_eq!(
            Packet::decode(&bad_start),
            Err(PacketError::BadStartCode(0xEE01))
        );

        let bad_sum = [
            0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x07, 0x00, 0x03, 0x00, 0x00, 0x0B,
        ];
        assert_eq!(
            Packet::decode(&bad_sum),
            Err(PacketError::BadChecksum {
                expected: 0x0A,
                actual: 0x0B
            })
        );

        let bad_kind = [0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x05, 0x00, 0x03];
        assert_eq!(
            Packet::decode(&bad_kind),
            Err(PacketError::UnknownKind(0x05))
        );
    }
}
