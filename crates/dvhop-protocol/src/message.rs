//! Flooding message and its wire encoding.
//!
//! Wire layout, network byte order, no padding:
//!
//! ```text
//! offset  size  field
//!      0     8  x position (f64)
//!      8     8  y position (f64)
//!     16     4  sequence number (u32)
//!     20     2  hop count (u16)
//!     22     4  beacon address (IPv4)
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use dvhop_geometry::Point2;
use dvhop_table::BeaconId;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// One hop-count report about one beacon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloodingMessage {
    /// Beacon the report is about.
    pub beacon: BeaconId,
    /// Beacon position.
    pub position: Point2,
    /// Sender's sequence number.
    pub seq_no: u32,
    /// Hops between the sender and the beacon.
    pub hop_count: u16,
}

impl FloodingMessage {
    /// Encoded size in bytes.
    pub const WIRE_SIZE: usize = 8 + 8 + 4 + 2 + 4;

    /// Create a new message.
    pub const fn new(beacon: BeaconId, position: Point2, seq_no: u32, hop_count: u16) -> Self {
        Self {
            beacon,
            position,
            seq_no,
            hop_count,
        }
    }

    /// Encode into a fresh buffer.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::WIRE_SIZE);
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Append the encoding to `buf`.
    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_f64(self.position.x);
        buf.put_f64(self.position.y);
        buf.put_u32(self.seq_no);
        buf.put_u16(self.hop_count);
        buf.put_u32(self.beacon.to_bits());
    }

    /// Decode a message occupying exactly `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < Self::WIRE_SIZE {
            return Err(DecodeError::Truncated {
                expected: Self::WIRE_SIZE,
                actual: bytes.len(),
            });
        }
        if bytes.len() > Self::WIRE_SIZE {
            return Err(DecodeError::TrailingBytes {
                expected: Self::WIRE_SIZE,
                actual: bytes.len(),
            });
        }

        let mut buf = bytes;
        let x = buf.get_f64();
        let y = buf.get_f64();
        let seq_no = buf.get_u32();
        let hop_count = buf.get_u16();
        let beacon = BeaconId::from_bits(buf.get_u32());

        let position = Point2::new(x, y);
        if !position.is_finite() {
            return Err(DecodeError::NonFiniteCoordinate { x, y });
        }

        Ok(Self {
            beacon,
            position,
            seq_no,
            hop_count,
        })
    }
}

impl std::fmt::Display for FloodingMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Beacon {} at {} seq {} hops {}",
            self.beacon, self.position, self.seq_no, self.hop_count
        )
    }
}
