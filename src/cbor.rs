//! Thin `minicbor` wrapper for the three wire payload shapes in §6: event,
//! CDR metadata, and log-event.
//!
//! No crate in the retrieved example pack encodes CBOR (see SPEC_FULL.md
//! §10), so `minicbor` is used directly rather than hand-rolled framing;
//! this module only fixes the key-id table and writes into a caller-owned
//! fixed buffer via minicbor's `Write` trait over a plain slice.

use minicbor::encode::write::Write as CborWrite;
use minicbor::Encoder;

/// Integer key-id table for the event/log/CDR CBOR maps. Not specified by
/// the distilled spec or the filtered `original_source` excerpt; chosen by
/// this crate and recorded in DESIGN.md.
pub mod keys {
    pub const EVENT_TYPE: u8 = 0;
    pub const SCHEMA_VERSION: u8 = 1;
    pub const DEVICE_SERIAL: u8 = 2;
    pub const DEVICE_SW_TYPE: u8 = 3;
    pub const DEVICE_SW_VERSION: u8 = 4;
    pub const DEVICE_HW_VERSION: u8 = 5;
    pub const CAPTURE_TIME: u8 = 6;
    pub const INFO: u8 = 7;

    pub const CDR_START_TIME: u8 = 0;
    pub const CDR_DURATION_MS: u8 = 1;
    pub const CDR_MIME_TYPES: u8 = 2;
    pub const CDR_REASON: u8 = 3;
    pub const CDR_DATA_LEN: u8 = 4;

    pub const LOG_ENTRIES: u8 = 0;
}

pub const SCHEMA_VERSION: u32 = 1;

/// A fixed-size output window minicbor can write into without allocating.
/// Tracks how many bytes have actually been written so the caller can slice
/// the result, and reports an error rather than panicking if the encoding
/// overruns the window (the caller is expected to size windows generously
/// since every payload's size is known up front from its source).
pub struct SliceWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

#[derive(Debug, Clone, Copy, defmt::Format)]
pub struct Overrun;

impl<'a> SliceWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn written(&self) -> usize {
        self.pos
    }
}

impl CborWrite for SliceWriter<'_> {
    type Error = Overrun;

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            return Err(Overrun);
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }
}

/// Device identity fields carried in the event and CDR metadata maps.
pub struct DeviceIds<'a> {
    pub serial: &'a str,
    pub sw_type: &'a str,
    pub sw_version: &'a str,
    pub hw_version: &'a str,
}

fn encode_device_ids(
    enc: &mut Encoder<&mut SliceWriter<'_>>,
    ids: &DeviceIds<'_>,
) -> Result<(), minicbor::encode::Error<Overrun>> {
    enc.u8(keys::DEVICE_SERIAL)?.str(ids.serial)?;
    enc.u8(keys::DEVICE_SW_TYPE)?.str(ids.sw_type)?;
    enc.u8(keys::DEVICE_SW_VERSION)?.str(ids.sw_version)?;
    enc.u8(keys::DEVICE_HW_VERSION)?.str(ids.hw_version)?;
    Ok(())
}

/// Encodes the log-event payload: a map with entries array, each entry
/// `[level, text]` or `[unix_ts, level, text]` per the `write_entry`
/// callback's choices. Returns the number of bytes written, or `None` if
/// the output window overran.
pub fn encode_log_event(
    out: &mut [u8],
    event_type: u32,
    ids: &DeviceIds<'_>,
    capture_time_unix_sec: u32,
    entry_count: usize,
    mut write_entry: impl FnMut(&mut Encoder<&mut SliceWriter<'_>>, usize) -> Result<(), Overrun>,
) -> Option<usize> {
    let mut writer = SliceWriter::new(out);
    {
        let mut enc = Encoder::new(&mut writer);
        enc.map(6).ok()?;
        enc.u8(keys::EVENT_TYPE).ok()?.u32(event_type).ok()?;
        enc.u8(keys::SCHEMA_VERSION).ok()?.u32(SCHEMA_VERSION).ok()?;
        encode_device_ids(&mut enc, ids).ok()?;
        enc.u8(keys::CAPTURE_TIME).ok()?.u32(capture_time_unix_sec).ok()?;
        enc.u8(keys::INFO).ok()?;
        enc.map(1).ok()?;
        enc.u8(keys::LOG_ENTRIES).ok()?;
        enc.array(entry_count as u64).ok()?;
        for i in 0..entry_count {
            write_entry(&mut enc, i).ok()?;
        }
    }
    Some(writer.written())
}

/// Encodes the CDR metadata map (everything before the raw recording
/// bytes). `mime_types` is iterated most-specific-first, matching §6.
pub fn encode_cdr_metadata(
    out: &mut [u8],
    start_time_unix_sec: u32,
    duration_ms: u32,
    mime_types: &[&str],
    reason: &str,
    data_len: u32,
) -> Option<usize> {
    let mut writer = SliceWriter::new(out);
    {
        let mut enc = Encoder::new(&mut writer);
        enc.map(5).ok()?;
        enc.u8(keys::CDR_START_TIME).ok()?.u32(start_time_unix_sec).ok()?;
        enc.u8(keys::CDR_DURATION_MS).ok()?.u32(duration_ms).ok()?;
        enc.u8(keys::CDR_MIME_TYPES).ok()?;
        enc.array(mime_types.len() as u64).ok()?;
        for mime in mime_types {
            enc.str(mime).ok()?;
        }
        enc.u8(keys::CDR_REASON).ok()?.str(reason).ok()?;
        enc.u8(keys::CDR_DATA_LEN).ok()?.u32(data_len).ok()?;
    }
    Some(writer.written())
}
