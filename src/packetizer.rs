//! Source multiplex, source-tag header injection, and drain state machine
//! (§4.7).
//!
//! Grounded on `memfault_packetizer_begin`/`memfault_packetizer_get_next`/
//! `memfault_packetizer_get_chunk` from `original_source/components/core/src/
//! memfault_data_packetizer.c`. The C source closes over a single global
//! array of `sMemfaultMessageCfg` function-pointer records polled in a fixed
//! order; this crate closes the same set at compile time (Design Note
//! "Static dispatch over abstract sources") as four generic type parameters
//! rather than an array of trait objects, so the poll order coredump →
//! heartbeat → log → CDR is fixed by the type itself, not a runtime loop.
//!
//! Unlike the C source's global source table, `Packetizer` holds no
//! reference to the sources themselves between calls — only the drain
//! state machine (`active`, `mask`, config). Each entry point takes the
//! four sources as explicit `&mut` parameters. This lets an owner (e.g.
//! [`crate::sdk::Sdk`]) hold both the sources and the packetizer as
//! sibling fields without a self-referential struct.

use crate::chunk::{ChunkStatus, Chunker, MIN_CHUNK_BUF_LEN};
use crate::source::DataSource;
use core::marker::PhantomData;

bitflags::bitflags! {
    /// Which sources the packetizer is currently allowed to poll.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
    pub struct SourceMask: u8 {
        const COREDUMP = 1 << 0;
        const HEARTBEAT_EVENT = 1 << 1;
        const LOG = 1 << 2;
        const CDR = 1 << 3;
    }
}

/// Tag written into bits 0–3 of the packetizer header byte (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
enum SourceKind {
    Coredump = 1,
    HeartbeatEvent = 2,
    Log = 3,
    Cdr = 4,
}

/// Fixed byte the packetizer substitutes for any message range it could not
/// read from the active source, matching the original source's scrub
/// literal. See the correctness caveat on [`Packetizer::get_next`].
const SCRUB_SENTINEL: u8 = 0xEF;

/// Upper bound on a message's raw payload the packetizer will eagerly
/// RLE-encode at `begin` time, mirroring the Log Data Source's and CDR
/// registry's own fixed encode-once scratch buffers. A message larger than
/// this is sent uncompressed even with RLE enabled.
const RLE_RAW_CAP: usize = 256;
/// Worst case (no repeated bytes) doubles the input, since every distinct
/// byte still becomes its own `(count=1, byte)` pair.
const RLE_SCRATCH_CAP: usize = RLE_RAW_CAP * 2;

/// Populated by [`Packetizer::begin`] on success.
#[derive(Debug, Clone, Copy, Default, defmt::Format)]
pub struct PacketizerMeta {
    /// Total on-wire length if the active message were sent as one chunk.
    pub single_chunk_message_length: usize,
    /// Whether the active message already had some chunks sent before this
    /// `begin` call (i.e. a transport is resuming after a reset).
    pub send_in_progress: bool,
}

struct ActiveMessage {
    source: SourceKind,
    chunker: Chunker,
    /// `Some(len)` iff this message's body was RLE-encoded into `rle_scratch`
    /// at `begin` time, `len` bytes of it valid. Decided once here (rather
    /// than re-derived from `rle_enabled` at read time) so the header's RLE
    /// bit can never disagree with what `get_next` actually sends — a
    /// message can still exceed `RLE_RAW_CAP` and fall back to raw passthrough
    /// while RLE stays enabled for the next one.
    rle_len: Option<usize>,
}

/// The four sources a single `Packetizer` call needs, gathered into one
/// argument so call sites don't repeat a four-tuple everywhere.
pub struct Sources<'s, C, H, L, D> {
    pub coredump: &'s mut C,
    pub heartbeat: &'s mut H,
    pub log: &'s mut L,
    pub cdr: &'s mut D,
}

/// Multiplexes over the four closed data sources, producing one framed,
/// source-tagged message at a time and handing it to a [`Chunker`].
///
/// Holds only drain state; the sources themselves are passed to each call
/// via [`Sources`]. `C`/`H`/`L`/`D` fix the poll order's four slots at
/// compile time even though no instance of them is stored here.
pub struct Packetizer<C, H, L, D> {
    mask: SourceMask,
    multi_chunk: bool,
    rle_enabled: bool,
    active: Option<ActiveMessage>,
    /// Scratch buffer `begin` RLE-encodes a source's body into, up front,
    /// following this crate's encode-once-into-a-fixed-buffer idiom (see
    /// `log_source.rs`, `cdr.rs`).
    rle_scratch: [u8; RLE_SCRATCH_CAP],
    _sources: PhantomData<(C, H, L, D)>,
}

impl<C, H, L, D> Packetizer<C, H, L, D>
where
    C: DataSource,
    H: DataSource,
    L: DataSource,
    D: DataSource,
{
    pub fn new(multi_chunk: bool) -> Self {
        Self {
            mask: SourceMask::all(),
            multi_chunk,
            rle_enabled: false,
            active: None,
            rle_scratch: [0u8; RLE_SCRATCH_CAP],
            _sources: PhantomData,
        }
    }

    /// Restricts polling to a subset of sources. Aborts any in-progress
    /// message, per §4.7.
    pub fn set_active_sources(&mut self, mask: SourceMask) {
        self.mask = mask;
        self.active = None;
    }

    /// Enables or disables eager RLE-encoding of each message body before
    /// transport. Returns [`crate::error::Error::NotSupported`] when the
    /// `rle` feature is disabled, matching §7's "gated off at build-time".
    #[cfg(feature = "rle")]
    pub fn set_rle_enabled(&mut self, enabled: bool) -> Result<(), crate::error::Error> {
        self.rle_enabled = enabled;
        Ok(())
    }

    /// Always fails: the `rle` feature is disabled.
    #[cfg(not(feature = "rle"))]
    pub fn set_rle_enabled(&mut self, _enabled: bool) -> Result<(), crate::error::Error> {
        Err(crate::error::Error::NotSupported)
    }

    fn poll_sources(&self, sources: &mut Sources<'_, C, H, L, D>) -> Option<(SourceKind, usize)> {
        let mut size = 0usize;
        if self.mask.contains(SourceMask::COREDUMP) && sources.coredump.has_message(&mut size) {
            return Some((SourceKind::Coredump, size));
        }
        if self.mask.contains(SourceMask::HEARTBEAT_EVENT)
            && sources.heartbeat.has_message(&mut size)
        {
            return Some((SourceKind::HeartbeatEvent, size));
        }
        if self.mask.contains(SourceMask::LOG) && sources.log.has_message(&mut size) {
            return Some((SourceKind::Log, size));
        }
        if self.mask.contains(SourceMask::CDR) && sources.cdr.has_message(&mut size) {
            return Some((SourceKind::Cdr, size));
        }
        None
    }

    fn read_source(
        sources: &mut Sources<'_, C, H, L, D>,
        source: SourceKind,
        offset: usize,
        buf: &mut [u8],
    ) -> bool {
        match source {
            SourceKind::Coredump => sources.coredump.read(offset, buf),
            SourceKind::HeartbeatEvent => sources.heartbeat.read(offset, buf),
            SourceKind::Log => sources.log.read(offset, buf),
            SourceKind::Cdr => sources.cdr.read(offset, buf),
        }
    }

    /// Bounds-checked copy out of the RLE scratch buffer, matching the
    /// `bool`-on-out-of-range contract [`Self::read_source`] gives its
    /// callers.
    fn read_scratch(scratch: &[u8], offset: usize, buf: &mut [u8]) -> bool {
        if offset + buf.len() > scratch.len() {
            return false;
        }
        buf.copy_from_slice(&scratch[offset..offset + buf.len()]);
        true
    }

    fn mark_source_sent(sources: &mut Sources<'_, C, H, L, D>, source: SourceKind) {
        match source {
            SourceKind::Coredump => sources.coredump.mark_sent(),
            SourceKind::HeartbeatEvent => sources.heartbeat.mark_sent(),
            SourceKind::Log => sources.log.mark_sent(),
            SourceKind::Cdr => sources.cdr.mark_sent(),
        }
    }

    fn header_byte(source: SourceKind, rle_active: bool) -> u8 {
        let mut b = source as u8;
        if rle_active {
            b |= 0x80;
        }
        b
    }

    /// Attempts to RLE-encode `payload_size` bytes read from `source` into
    /// `scratch`, returning the encoded length on success. `None` if the
    /// `rle` feature is disabled, the payload exceeds [`RLE_RAW_CAP`], the
    /// source read fails, or the encoding didn't fit `scratch` — in every
    /// `None` case the caller falls back to sending the raw bytes, so the
    /// header's RLE bit must reflect this return value exactly, never the
    /// `rle_enabled` toggle alone.
    #[cfg(feature = "rle")]
    fn try_rle_encode(
        sources: &mut Sources<'_, C, H, L, D>,
        source: SourceKind,
        payload_size: usize,
        scratch: &mut [u8; RLE_SCRATCH_CAP],
    ) -> Option<usize> {
        if payload_size == 0 || payload_size > RLE_RAW_CAP {
            return None;
        }
        let mut raw = [0u8; RLE_RAW_CAP];
        if !Self::read_source(sources, source, 0, &mut raw[..payload_size]) {
            return None;
        }
        let mut state = crate::rle::RleState::default();
        let (consumed, written) = crate::rle::encode(&mut state, &raw[..payload_size], scratch);
        if consumed != payload_size {
            return None;
        }
        Some(written)
    }

    #[cfg(not(feature = "rle"))]
    fn try_rle_encode(
        _sources: &mut Sources<'_, C, H, L, D>,
        _source: SourceKind,
        _payload_size: usize,
        _scratch: &mut [u8; RLE_SCRATCH_CAP],
    ) -> Option<usize> {
        None
    }

    /// Starts draining the next available message, if none is currently
    /// active. Polls sources in the fixed order coredump, heartbeat, log,
    /// CDR, honoring [`Self::set_active_sources`].
    ///
    /// Returns `false` (and leaves `meta` untouched) if no source has data.
    pub fn begin(
        &mut self,
        sources: &mut Sources<'_, C, H, L, D>,
        meta: &mut PacketizerMeta,
    ) -> bool {
        if let Some(active) = &self.active {
            meta.single_chunk_message_length = active.chunker.single_chunk_message_length();
            meta.send_in_progress = active.chunker.read_offset() > 0;
            return true;
        }
        let Some((source, payload_size)) = self.poll_sources(sources) else {
            return false;
        };
        let rle_len = if self.rle_enabled {
            Self::try_rle_encode(sources, source, payload_size, &mut self.rle_scratch)
        } else {
            None
        };
        let body_size = rle_len.unwrap_or(payload_size);
        // +1 for the packetizer header byte this layer injects.
        let total_size = body_size + 1;
        let chunker = Chunker::new(total_size, self.multi_chunk);
        meta.single_chunk_message_length = chunker.single_chunk_message_length();
        meta.send_in_progress = false;
        self.active = Some(ActiveMessage {
            source,
            chunker,
            rle_len,
        });
        true
    }

    /// Produces the next chunk of the active message into `buf`.
    ///
    /// Requires a prior successful [`Self::begin`]; returns
    /// `ChunkStatus::NoMoreData` with `0` written otherwise, or if
    /// `buf.len() < MIN_CHUNK_BUF_LEN` (logged, state untouched).
    ///
    /// # Correctness caveat
    /// If the active source's `read` fails for some byte range, that range
    /// is filled with a fixed sentinel (`0xEF`) rather than aborting the
    /// message — the resulting chunk still passes its own CRC, since the CRC
    /// covers the sentinel bytes actually sent, not the original source
    /// content. A receiver that must detect this should cross-check payload
    /// length against the source-reported size out of band.
    pub fn get_next(
        &mut self,
        sources: &mut Sources<'_, C, H, L, D>,
        buf: &mut [u8],
    ) -> (ChunkStatus, usize) {
        if buf.len() < MIN_CHUNK_BUF_LEN {
            defmt::error!("packetizer: get_next buffer below MIN_CHUNK_BUF_LEN");
            return (ChunkStatus::NoMoreData, 0);
        }
        let Some(mut active) = self.active.take() else {
            return (ChunkStatus::NoMoreData, 0);
        };
        let source = active.source;
        let rle_len = active.rle_len;
        let header_byte = Self::header_byte(source, rle_len.is_some());
        let scratch = &self.rle_scratch;

        let (status, written) = active.chunker.next_chunk(buf, |offset, out| {
            let (body_offset, body_out) = if offset == 0 {
                out[0] = header_byte;
                (0, &mut out[1..])
            } else {
                (offset - 1, &mut out[..])
            };
            if body_out.is_empty() {
                return;
            }
            let ok = match rle_len {
                Some(len) => Self::read_scratch(&scratch[..len], body_offset, body_out),
                None => Self::read_source(sources, source, body_offset, body_out),
            };
            if !ok {
                defmt::warn!("packetizer: source read failed, scrubbing");
                body_out.fill(SCRUB_SENTINEL);
            }
        });

        match status {
            ChunkStatus::EndOfChunk => {
                Self::mark_source_sent(sources, source);
            }
            ChunkStatus::MoreDataForChunk => {
                self.active = Some(active);
            }
            ChunkStatus::NoMoreData => {}
        }
        (status, written)
    }

    /// Aborts the active message without marking it sent; the same message
    /// is re-offered from offset 0 on the next successful `begin`.
    pub fn abort(&mut self) {
        self.active = None;
    }

    /// `true` iff a message is already active, or at least one source
    /// reports data. Performs no state change beyond what the polled
    /// sources' own idempotent `has_message` does.
    pub fn data_available(&self, sources: &mut Sources<'_, C, H, L, D>) -> bool {
        if self.active.is_some() {
            return true;
        }
        self.poll_sources(sources).is_some()
    }

    /// Convenience wrapper: calls `begin` if needed, then issues one
    /// `get_next`. Intended for callers that always operate in single-chunk
    /// mode (i.e. `multi_chunk = false` at construction).
    pub fn get_chunk(&mut self, sources: &mut Sources<'_, C, H, L, D>, buf: &mut [u8]) -> bool {
        let mut meta = PacketizerMeta::default();
        if self.active.is_none() && !self.begin(sources, &mut meta) {
            return false;
        }
        let (status, written) = self.get_next(sources, buf);
        written > 0 && status != ChunkStatus::NoMoreData
    }
}
