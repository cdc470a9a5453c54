use std::io;

/// A single-producer append buffer with two watermarks `low <= high <= capacity`, backed by a
/// pooled byte buffer. No reader ever sees bytes outside `[low, high)`. This type is not
/// internally synchronized; the caller (the segment writer) holds a lock around it.
pub struct WatermarkBuffer {
    buf: Vec<u8>,
    low: usize,
    high: usize,
}

impl WatermarkBuffer {
    /// Wraps a pool-provided buffer. `prefilled` bytes at the front are treated as already
    /// durable (both watermarks start there), letting a segment resume at the correct offset
    /// after prefilling from an existing file.
    pub fn new(buf: Vec<u8>, prefilled: usize) -> Self {
        debug_assert!(prefilled <= buf.len());
        WatermarkBuffer {
            buf,
            low: prefilled,
            high: prefilled,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn low(&self) -> usize {
        self.low
    }

    #[inline]
    pub fn high(&self) -> usize {
        self.high
    }

    /// Raw access to the backing storage, used to write the length-prefixed record header
    /// directly at a known offset.
    #[inline]
    pub fn backing_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Copies `data` at `high` if it fits, advancing `high` and returning `(new_high, true)`.
    /// Otherwise returns `(high, false)` without modifying any state; this is the "buffer full"
    /// signal that drives rollover.
    pub fn write(&mut self, data: &[u8]) -> (usize, bool) {
        if data.len() + self.high > self.buf.len() {
            return (self.high, false);
        }

        self.buf[self.high..self.high + data.len()].copy_from_slice(data);
        self.high += data.len();
        (self.high, true)
    }

    /// Writes `buf[low..high]` to `writer`, advancing `low` by each successful chunk length and
    /// stopping on the first error. Partial progress is visible to callers on error.
    pub fn drain<W: io::Write>(&mut self, writer: &mut W) -> io::Result<usize> {
        let mut written = 0;

        while self.low < self.high {
            let n = writer.write(&self.buf[self.low..self.high])?;

            if n == 0 {
                return Err(io::Error::from(io::ErrorKind::WriteZero));
            }

            self.low += n;
            written += n;
        }

        Ok(written)
    }

    /// Reserves `n` bytes starting at `high` without copying anything into them, returning the
    /// offset the reservation begins at. Used by the segment writer to lay out a length header
    /// and payload as a single contiguous write.
    pub fn advance_high(&mut self, n: usize) -> Option<usize> {
        if n + self.high > self.buf.len() {
            return None;
        }
        let offset = self.high;
        self.high += n;
        Some(offset)
    }

    /// Resets both watermarks to zero. Does not erase the backing bytes.
    pub fn clear(&mut self) {
        self.low = 0;
        self.high = 0;
    }

    /// Reclaims the backing buffer, e.g. to return it to the pool it came from.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_advances_high_and_reports_ok() {
        let mut buf = WatermarkBuffer::new(vec![0u8; 16], 0);
        let (high, ok) = buf.write(b"hello");
        assert!(ok);
        assert_eq!(high, 5);
        assert_eq!(&buf.backing_mut()[..5], b"hello");
    }

    #[test]
    fn write_rejects_without_mutating_state_when_full() {
        let mut buf = WatermarkBuffer::new(vec![0u8; 4], 0);
        let (high, ok) = buf.write(b"hello");
        assert!(!ok);
        assert_eq!(high, 0);
        assert_eq!(buf.high(), 0);
    }

    #[test]
    fn drain_advances_low_and_stops_on_error() {
        let mut buf = WatermarkBuffer::new(vec![0u8; 16], 0);
        buf.write(b"hello world");

        let mut sink = Vec::new();
        let n = buf.drain(&mut sink).unwrap();
        assert_eq!(n, 11);
        assert_eq!(sink, b"hello world");
        assert_eq!(buf.low(), buf.high());
    }

    #[test]
    fn clear_resets_watermarks_without_wiping_bytes() {
        let mut buf = WatermarkBuffer::new(vec![0u8; 16], 0);
        buf.write(b"data");
        buf.clear();
        assert_eq!(buf.low(), 0);
        assert_eq!(buf.high(), 0);
    }

    #[test]
    fn prefilled_offset_is_preserved() {
        let buf = WatermarkBuffer::new(vec![0u8; 16], 6);
        assert_eq!(buf.low(), 6);
        assert_eq!(buf.high(), 6);
    }
}
