//! Transactional, variable-length record ring (§4.2).
//!
//! Grounded on `memfault_events_storage_boot`/`begin_write_cb`/`append_data_cb`/
//! `finish_write_cb` from `original_source/components/core` (filtered out of
//! the retrieved source tree itself, but exercised in detail by
//! `tests/src/test_memfault_event_storage.cpp`, which this module's tests
//! mirror directly — see scenario A in §8).

use crate::ring::CircularBuffer;

/// 2-byte `{length: u16}` header prefixing every committed record.
const RECORD_HEADER_LEN: usize = 2;

/// A single open write transaction: how many payload bytes were reserved,
/// and how many have been appended so far (bytes appended past the reserved
/// length are dropped, per §4.2).
struct WriteTxn {
    reserved: usize,
    written: usize,
}

/// Transactional ring of variable-length records, with at most one open
/// write transaction at a time.
pub struct EventStorage<'a> {
    ring: CircularBuffer<'a>,
    txn: Option<WriteTxn>,
}

impl<'a> EventStorage<'a> {
    /// Takes ownership of `storage` as the backing ring.
    pub fn boot(storage: &'a mut [u8]) -> Self {
        Self {
            ring: CircularBuffer::init(storage),
            txn: None,
        }
    }

    /// Total size of the backing storage, including the per-record overhead.
    pub fn storage_size(&self) -> usize {
        self.ring.capacity()
    }

    /// Opens a write transaction and returns the payload space available.
    ///
    /// Returns `0` (and opens no transaction) if a transaction is already
    /// open, or if there isn't even room for the 2-byte record header.
    ///
    /// The header's 2 bytes are reserved immediately (written as a zeroed
    /// placeholder) so that payload appended by [`Self::append`] always
    /// lands right after it; [`Self::finish_write`] later patches the
    /// placeholder in place with the real length.
    pub fn begin_write(&mut self) -> usize {
        if self.txn.is_some() {
            return 0;
        }
        let free = self.ring.write_size();
        if free <= RECORD_HEADER_LEN {
            return 0;
        }
        let reserved = free - RECORD_HEADER_LEN;
        self.ring.write(&[0u8; RECORD_HEADER_LEN]);
        self.txn = Some(WriteTxn {
            reserved,
            written: 0,
        });
        reserved
    }

    /// Appends `data` to the open transaction.
    ///
    /// Bytes past the space reserved by `begin_write` are silently dropped.
    /// A no-op if no transaction is open.
    pub fn append(&mut self, data: &[u8]) {
        let Some(txn) = self.txn.as_mut() else {
            return;
        };
        let remaining = txn.reserved - txn.written;
        let to_write = data.len().min(remaining);
        if to_write == 0 {
            return;
        }
        self.ring.write(&data[..to_write]);
        txn.written += to_write;
    }

    /// Commits or discards the open transaction.
    ///
    /// `rollback = false` patches the 2-byte length header in front of the
    /// appended payload, making the record visible to readers. `rollback =
    /// true` un-writes the header placeholder and any appended payload. A
    /// no-op if no transaction is open.
    pub fn finish_write(&mut self, rollback: bool) {
        let Some(txn) = self.txn.take() else {
            return;
        };
        if rollback {
            self.ring.rewind_write(txn.written + RECORD_HEADER_LEN);
            return;
        }
        let header = (txn.written as u16).to_le_bytes();
        self.ring
            .write_at_offset_from_end(txn.written + RECORD_HEADER_LEN, &header);
    }

    /// Bytes reserved by an in-progress write transaction (header placeholder
    /// + payload written so far), which must not be mistaken for a
    /// committed record by a reader even though the ring itself already
    /// counts them as occupying space.
    fn in_progress_reserved_bytes(&self) -> usize {
        self.txn
            .as_ref()
            .map(|t| t.written + RECORD_HEADER_LEN)
            .unwrap_or(0)
    }

    /// Bytes of the ring that are actually committed and visible to a reader.
    fn committed_size(&self) -> usize {
        self.ring.read_size() - self.in_progress_reserved_bytes()
    }

    /// Test-only reset to an empty, fresh-boot equivalent state.
    #[cfg(test)]
    pub(crate) fn reset(&mut self) {
        self.ring.clear();
        self.txn = None;
    }

    fn head_record_len(&self) -> Option<u16> {
        if self.committed_size() < RECORD_HEADER_LEN {
            return None;
        }
        let mut hdr = [0u8; RECORD_HEADER_LEN];
        if !self.ring.read(0, &mut hdr) {
            return None;
        }
        Some(u16::from_le_bytes(hdr))
    }
}

impl crate::source::DataSource for EventStorage<'_> {
    fn has_message(&mut self, size: &mut usize) -> bool {
        match self.head_record_len() {
            Some(len) => {
                *size = len as usize;
                true
            }
            None => {
                *size = 0;
                false
            }
        }
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> bool {
        let Some(len) = self.head_record_len() else {
            return false;
        };
        if offset + buf.len() > len as usize {
            return false;
        }
        self.ring.read(RECORD_HEADER_LEN + offset, buf)
    }

    fn mark_sent(&mut self) {
        if let Some(len) = self.head_record_len() {
            self.ring.consume(RECORD_HEADER_LEN + len as usize);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::source::DataSource;

    #[test]
    fn scenario_a_single_event_round_trip() {
        // Scenario A from §8: 11-byte backing buffer, 2-byte overhead.
        let mut storage = [0u8; 11];
        let mut es = EventStorage::boot(&mut storage);

        assert_eq!(es.begin_write(), 9);
        assert_eq!(es.begin_write(), 0, "second begin_write must return 0");

        es.append(&[1, 2, 3, 4]);
        es.finish_write(false);

        let mut size = 0;
        assert!(es.has_message(&mut size));
        assert_eq!(size, 4);

        let mut out = [0u8; 4];
        assert!(es.read(0, &mut out));
        assert_eq!(out, [1, 2, 3, 4]);

        es.mark_sent();
        assert!(!es.has_message(&mut size));
        assert_eq!(size, 0);
    }

    #[test]
    fn rollback_leaves_no_record_and_is_idempotent() {
        let mut storage = [0u8; 11];
        let mut es = EventStorage::boot(&mut storage);
        assert_eq!(es.begin_write(), 9);
        es.append(&[1, 2, 3]);
        es.finish_write(true);
        // idempotent: a second finish_write with no open transaction is a no-op
        es.finish_write(true);

        let mut size = 0;
        assert!(!es.has_message(&mut size));
    }

    #[test]
    fn append_past_reserved_space_is_silently_dropped() {
        let mut storage = [0u8; 6];
        let mut es = EventStorage::boot(&mut storage);
        let reserved = es.begin_write();
        assert_eq!(reserved, 4);
        es.append(&[1, 2, 3, 4, 5, 6, 7, 8]);
        es.finish_write(false);

        let mut size = 0;
        assert!(es.has_message(&mut size));
        assert_eq!(size, 4);
    }

    #[test]
    fn multiple_events_drain_in_fifo_order() {
        let mut storage = [0u8; 15];
        let mut es = EventStorage::boot(&mut storage);
        for i in 0u8..3 {
            es.begin_write();
            es.append(&[i]);
            es.finish_write(false);
        }
        for i in 0u8..3 {
            let mut size = 0;
            assert!(es.has_message(&mut size));
            assert_eq!(size, 1);
            let mut out = [0u8; 1];
            assert!(es.read(0, &mut out));
            assert_eq!(out[0], i);
            es.mark_sent();
        }
        let mut size = 0;
        assert!(!es.has_message(&mut size));
    }
}
