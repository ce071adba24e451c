//! Circular byte buffer (§4.1).
//!
//! Grounded on the teacher crate's [`crate`-internal `ring_buffer.rs`] wraparound
//! memcpy structure, but without its `AtomicU32` indices: every caller of this
//! type already holds the platform mutex (§5), so `read_offset`/`write_offset`/
//! `count` are plain `usize` fields rather than atomics synchronized between a
//! producer and a consumer running without a shared lock.

/// A fixed-capacity ring over caller-provided backing storage.
///
/// Never overwrites committed data: a `write` that would not fit is rejected
/// wholesale rather than partially applied, and the ring never exposes a
/// pointer that straddles the wraparound point — reads and writes are always
/// expressed as one or two plain memcpys internally.
pub struct CircularBuffer<'a> {
    storage: &'a mut [u8],
    read_offset: usize,
    write_offset: usize,
    count: usize,
}

impl<'a> CircularBuffer<'a> {
    /// Takes ownership of `storage` as the ring's backing region.
    pub fn init(storage: &'a mut [u8]) -> Self {
        Self {
            storage,
            read_offset: 0,
            write_offset: 0,
            count: 0,
        }
    }

    /// Total capacity of the backing storage, in bytes.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Bytes of free space available for a `write`.
    pub fn write_size(&self) -> usize {
        self.storage.len() - self.count
    }

    /// Bytes currently committed and available for `read`/`consume`.
    pub fn read_size(&self) -> usize {
        self.count
    }

    fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Resets bookkeeping to an empty ring without touching the backing
    /// storage's contents. For test use, mirroring the teacher crate's
    /// `#[cfg(test)] reset()` convention.
    #[cfg(test)]
    pub(crate) fn clear(&mut self) {
        self.read_offset = 0;
        self.write_offset = 0;
        self.count = 0;
    }

    /// Appends `bytes` to the ring, all-or-nothing.
    ///
    /// Returns `false` (and leaves the ring unchanged) if `bytes` does not
    /// fit in the current free space.
    pub fn write(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() > self.write_size() {
            return false;
        }
        if bytes.is_empty() {
            return true;
        }

        let cap = self.storage.len();
        let first_len = (cap - self.write_offset).min(bytes.len());
        self.storage[self.write_offset..self.write_offset + first_len]
            .copy_from_slice(&bytes[..first_len]);
        let remaining = bytes.len() - first_len;
        if remaining > 0 {
            self.storage[..remaining].copy_from_slice(&bytes[first_len..]);
        }

        self.write_offset = (self.write_offset + bytes.len()) % cap.max(1);
        self.count += bytes.len();
        true
    }

    /// Patches `bytes` into the committed region, `offset_from_end` bytes
    /// before the current write cursor (i.e. `offset_from_end == count`
    /// addresses the oldest committed byte).
    ///
    /// Used to flip a log entry's header bits in place without shifting any
    /// other storage. Returns `false` if the patch would read or write
    /// outside the committed region.
    pub fn write_at_offset_from_end(&mut self, offset_from_end: usize, bytes: &[u8]) -> bool {
        if offset_from_end > self.count || bytes.len() > offset_from_end {
            return false;
        }
        let cap = self.storage.len();
        let start = (self.write_offset + cap - offset_from_end) % cap.max(1);

        let first_len = (cap - start).min(bytes.len());
        self.storage[start..start + first_len].copy_from_slice(&bytes[..first_len]);
        let remaining = bytes.len() - first_len;
        if remaining > 0 {
            self.storage[..remaining].copy_from_slice(&bytes[first_len..]);
        }
        true
    }

    /// Un-writes the most recently written `n` bytes.
    ///
    /// Used by [`crate::event_storage::EventStorage`] to roll back a
    /// transaction that was written directly into the ring ahead of being
    /// committed: since those bytes sit at the tail, past any previously
    /// committed record, rewinding the write cursor can't disturb anything
    /// a reader has seen or could see.
    pub fn rewind_write(&mut self, n: usize) -> bool {
        if n > self.count {
            return false;
        }
        let cap = self.storage.len();
        self.write_offset = (self.write_offset + cap - n % cap.max(1)) % cap.max(1);
        self.count -= n;
        true
    }

    /// Discards the oldest `n` committed bytes, making room for writes.
    ///
    /// Returns `false` (no-op) if `n` exceeds the currently committed count.
    pub fn consume(&mut self, n: usize) -> bool {
        if n > self.count {
            return false;
        }
        let cap = self.storage.len();
        self.read_offset = (self.read_offset + n) % cap.max(1);
        self.count -= n;
        true
    }

    /// Reads `out.len()` committed bytes starting `at` bytes past the
    /// current read cursor into `out`.
    ///
    /// Returns `false` if the requested range is not entirely committed.
    pub fn read(&self, at: usize, out: &mut [u8]) -> bool {
        self.read_with_callback(at, out.len(), |chunk, offset_in_out| {
            out[offset_in_out..offset_in_out + chunk.len()].copy_from_slice(chunk);
        })
    }

    /// Callback-style read: invokes `cb(slice, offset_in_request)` once or
    /// twice (the second time only if the read straddles the wraparound
    /// point), covering `n` bytes starting `at` bytes past the read cursor.
    ///
    /// Returns `false` (and never calls `cb`) if the range `[at, at+n)` is
    /// not entirely within the committed region.
    pub fn read_with_callback(
        &self,
        at: usize,
        n: usize,
        mut cb: impl FnMut(&[u8], usize),
    ) -> bool {
        if at + n > self.count {
            return false;
        }
        if n == 0 {
            return true;
        }
        let cap = self.storage.len();
        let start = (self.read_offset + at) % cap.max(1);
        let first_len = (cap - start).min(n);
        cb(&self.storage[start..start + first_len], 0);
        let remaining = n - first_len;
        if remaining > 0 {
            cb(&self.storage[..remaining], first_len);
        }
        true
    }
}
