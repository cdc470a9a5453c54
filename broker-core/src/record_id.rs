use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io;

/// A 128-bit record identifier: `hi` is the segment number, `lo` is the sequence number within
/// the stream. Wire and on-disk form is 16 bytes, big-endian `hi` then big-endian `lo`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RecordId {
    pub hi: u64,
    pub lo: u64,
}

impl RecordId {
    pub const WIRE_SIZE: usize = 16;

    #[inline]
    pub fn new(hi: u64, lo: u64) -> Self {
        RecordId { hi, lo }
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; Self::WIRE_SIZE] {
        let mut buf = [0u8; Self::WIRE_SIZE];
        {
            let mut cursor: &mut [u8] = &mut buf;
            cursor.write_u64::<BigEndian>(self.hi).expect("fixed-size buffer");
            cursor.write_u64::<BigEndian>(self.lo).expect("fixed-size buffer");
        }
        buf
    }

    #[inline]
    pub fn write_to<W: io::Write>(self, mut w: W) -> io::Result<()> {
        w.write_u64::<BigEndian>(self.hi)?;
        w.write_u64::<BigEndian>(self.lo)
    }

    #[inline]
    pub fn read_from<R: io::Read>(mut r: R) -> io::Result<Self> {
        let hi = r.read_u64::<BigEndian>()?;
        let lo = r.read_u64::<BigEndian>()?;
        Ok(RecordId { hi, lo })
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hi, self.lo)
    }
}
