/// A growable, wrap-around byte ring used as per-connection scratch space for the wire parser.
/// Starts out backed by a pool-provided buffer; grows (doubling) past that initial capacity when
/// a single frame would not otherwise fit, per the wire protocol's recommendation to prefer a
/// growable buffer over capping accepted frame size to the request pool's buffer size.
pub struct ConnRing {
    buf: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
    buffered: usize,
}

impl ConnRing {
    pub fn new(backing: Vec<u8>) -> Self {
        ConnRing {
            buf: backing,
            read_pos: 0,
            write_pos: 0,
            buffered: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffered
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffered == 0
    }

    pub fn extend_from_slice(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        self.ensure_capacity(self.buffered + data.len());

        let cap = self.buf.len();
        let first = cap - self.write_pos;

        if data.len() <= first {
            self.buf[self.write_pos..self.write_pos + data.len()].copy_from_slice(data);
        } else {
            self.buf[self.write_pos..cap].copy_from_slice(&data[..first]);
            self.buf[..data.len() - first].copy_from_slice(&data[first..]);
        }

        self.write_pos = (self.write_pos + data.len()) % cap;
        self.buffered += data.len();
    }

    /// Returns a contiguous copy of the first `n` buffered bytes without consuming them, or
    /// `None` if fewer than `n` bytes are currently buffered.
    pub fn peek(&self, n: usize) -> Option<Vec<u8>> {
        if n > self.buffered {
            return None;
        }

        let cap = self.buf.len();
        let mut out = vec![0u8; n];
        let first = (cap - self.read_pos).min(n);
        out[..first].copy_from_slice(&self.buf[self.read_pos..self.read_pos + first]);
        if n > first {
            out[first..n].copy_from_slice(&self.buf[..n - first]);
        }
        Some(out)
    }

    /// Advances the read cursor past `n` already-peeked bytes.
    pub fn consume(&mut self, n: usize) {
        assert!(n <= self.buffered, "cannot consume past what is buffered");
        self.read_pos = (self.read_pos + n) % self.buf.len();
        self.buffered -= n;
    }

    fn ensure_capacity(&mut self, needed: usize) {
        if needed <= self.buf.len() {
            return;
        }

        let mut new_cap = self.buf.len().max(1);
        while new_cap < needed {
            new_cap *= 2;
        }

        let existing = self.peek(self.buffered).unwrap_or_default();
        let mut new_buf = vec![0u8; new_cap];
        new_buf[..existing.len()].copy_from_slice(&existing);

        self.buf = new_buf;
        self.read_pos = 0;
        self.write_pos = self.buffered;
    }

    /// Reclaims the backing buffer, e.g. to return it to the pool it came from. Only returns the
    /// original pool-sized allocation if the ring never had to grow past it.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}
