//! The application-facing facade: one value owning every singleton the
//! distilled spec expressed as global mutable state (§9 Design Note "Global
//! mutable state").
//!
//! Grounded on the teacher crate's top-level `lib.rs`, which owns its ring
//! buffer and logger state behind a single public entry point rather than
//! module-level statics.

use crate::cdr::CdrRegistry;
use crate::cbor::DeviceIds;
use crate::config::Config;
use crate::coredump_source::CoredumpSource;
use crate::event_storage::EventStorage;
#[cfg(feature = "heap-stats")]
use crate::heap_stats::HeapStatsPool;
use crate::log_buffer::{LogBuffer, LogLevel, RecordType};
use crate::log_source::LogDataSource;
use crate::packetizer::{ChunkStatus, Packetizer, PacketizerMeta, SourceMask, Sources};
use crate::platform::{CurrentTime, Platform};

/// Owns every piece of backing storage and state this crate needs, wired
/// together behind `begin`/`get_next`/`abort`/`data_available`/`get_chunk`.
///
/// `CDR_N`/`HEAP_N` are the CDR registry and heap-stats pool capacities,
/// fixed at compile time as const generics per §10 "Configuration".
pub struct Sdk<'a, const CDR_N: usize, const HEAP_N: usize> {
    event_storage: EventStorage<'a>,
    coredump: CoredumpSource<'a>,
    log: LogBuffer<'a>,
    log_source: LogDataSource<'a>,
    cdr: CdrRegistry<'a, CDR_N>,
    #[cfg(feature = "heap-stats")]
    heap_stats: HeapStatsPool<HEAP_N>,
    packetizer: Packetizer<CoredumpSource<'a>, EventStorage<'a>, LogDataSource<'a>, CdrRegistry<'a, CDR_N>>,
}

impl<'a, const CDR_N: usize, const HEAP_N: usize> Sdk<'a, CDR_N, HEAP_N> {
    /// `event_storage_region` and `log_region` are caller-owned backing
    /// buffers, sized by the application; they live as long as the `Sdk`.
    pub fn new(
        config: Config,
        event_storage_region: &'a mut [u8],
        log_region: &'a mut [u8],
        device_ids: DeviceIds<'a>,
    ) -> Self {
        let mut log = LogBuffer::boot(log_region);
        log.set_min_save_level(config.min_save_level);

        let mut packetizer = Packetizer::new(config.enable_multi_packet_chunk);
        packetizer.set_active_sources(config.initial_source_mask);

        Self {
            event_storage: EventStorage::boot(event_storage_region),
            coredump: CoredumpSource::empty(),
            log,
            log_source: LogDataSource::new(device_ids),
            cdr: CdrRegistry::new(),
            #[cfg(feature = "heap-stats")]
            heap_stats: HeapStatsPool::new(),
            packetizer,
        }
    }

    fn sources(&mut self) -> Sources<'_, CoredumpSource<'a>, EventStorage<'a>, LogDataSource<'a>, CdrRegistry<'a, CDR_N>> {
        Sources {
            coredump: &mut self.coredump,
            heartbeat: &mut self.event_storage,
            log: &mut self.log_source,
            cdr: &mut self.cdr,
        }
    }

    // -- Producer-side APIs --------------------------------------------

    pub fn log_buffer_mut(&mut self) -> &mut LogBuffer<'a> {
        &mut self.log
    }

    #[cfg(feature = "heap-stats")]
    pub fn heap_stats_mut(&mut self) -> &mut HeapStatsPool<HEAP_N> {
        &mut self.heap_stats
    }

    pub fn cdr_registry_mut(&mut self) -> &mut CdrRegistry<'a, CDR_N> {
        &mut self.cdr
    }

    /// Records a newly captured coredump region for the packetizer to pick
    /// up on its next poll.
    pub fn set_coredump_region(&mut self, region: &'a [u8]) {
        self.coredump.set_region(region);
    }

    pub fn begin_event_write(&mut self) -> usize {
        self.event_storage.begin_write()
    }

    pub fn append_event(&mut self, data: &[u8]) {
        self.event_storage.append(data)
    }

    pub fn finish_event_write(&mut self, rollback: bool) {
        self.event_storage.finish_write(rollback)
    }

    pub fn save_log(&mut self, level: LogLevel, bytes: &[u8]) -> bool {
        self.log.save(level, RecordType::Preformatted, None, bytes)
    }

    /// Freezes the log buffer and snapshots currently-unsent entries as one
    /// event, if any exist. A no-op if nothing is unsent or a snapshot is
    /// already in flight.
    pub fn trigger_log_collection(&mut self, now_unix_sec: u32) -> bool {
        self.log_source.trigger_collection(&mut self.log, now_unix_sec)
    }

    /// Same as [`Self::trigger_log_collection`], deriving the capture time
    /// from the platform's clock instead of a caller-supplied value. Falls
    /// back to `0` if the platform cannot currently report a time.
    pub fn trigger_log_collection_now(&mut self, platform: &impl Platform) -> bool {
        let now_unix_sec = match platform.time_get_current() {
            CurrentTime::UnixEpochTimeSec(t) => t,
            CurrentTime::Unknown => 0,
        };
        self.trigger_log_collection(now_unix_sec)
    }

    /// Drains every unread log entry through the platform's raw log sink
    /// (§4.3 export path), mirroring `memfault_log_export_logs`.
    pub fn export_logs(&mut self, platform: &mut impl Platform) {
        self.log.export_all(platform);
    }

    /// Logs the platform's device identity and elapsed uptime through its own
    /// raw log sink, mirroring `memfault_demo_cli_cmd_get_device_info`.
    pub fn log_platform_diagnostics(&mut self, platform: &mut impl Platform) {
        let mut serial = [0u8; 32];
        let mut sw_type = [0u8; 32];
        let mut sw_version = [0u8; 32];
        let mut hw_version = [0u8; 32];
        let (serial_len, sw_type_len, sw_version_len, hw_version_len) = {
            let info = platform.get_device_info();
            (
                copy_str(&mut serial, info.serial),
                copy_str(&mut sw_type, info.sw_type),
                copy_str(&mut sw_version, info.sw_version),
                copy_str(&mut hw_version, info.hw_version),
            )
        };
        let uptime_ms = platform.time_since_boot_ms();

        platform.log_raw(b"S/N: ");
        platform.log_raw(&serial[..serial_len]);
        platform.log_raw(b"SW type: ");
        platform.log_raw(&sw_type[..sw_type_len]);
        platform.log_raw(b"SW version: ");
        platform.log_raw(&sw_version[..sw_version_len]);
        platform.log_raw(b"HW version: ");
        platform.log_raw(&hw_version[..hw_version_len]);
        platform.log_raw(b"uptime_ms: ");
        let mut digits = [0u8; 20];
        let n = format_u64_decimal(&mut digits, uptime_ms);
        platform.log_raw(&digits[..n]);
    }

    // -- Transport-facing drain API --------------------------------------

    pub fn begin(&mut self, meta: &mut PacketizerMeta) -> bool {
        let mut sources = self.sources();
        self.packetizer.begin(&mut sources, meta)
    }

    pub fn get_next(&mut self, buf: &mut [u8]) -> (ChunkStatus, usize) {
        let mut sources = self.sources();
        let result = self.packetizer.get_next(&mut sources, buf);
        // The log source's mark_sent only flips an internal pending flag
        // (it can't reach the live log buffer from inside the DataSource
        // trait's fixed three-method signature); apply it here.
        self.log_source.finalize_if_pending(&mut self.log);
        result
    }

    pub fn abort(&mut self) {
        self.packetizer.abort()
    }

    pub fn data_available(&mut self) -> bool {
        let mut sources = self.sources();
        self.packetizer.data_available(&mut sources)
    }

    pub fn get_chunk(&mut self, buf: &mut [u8]) -> bool {
        let mut sources = self.sources();
        let result = self.packetizer.get_chunk(&mut sources, buf);
        self.log_source.finalize_if_pending(&mut self.log);
        result
    }

    pub fn set_active_sources(&mut self, mask: SourceMask) {
        self.packetizer.set_active_sources(mask)
    }

    /// Enables or disables eager RLE-encoding of each drained message body.
    /// Fails with [`crate::error::Error::NotSupported`] when the `rle`
    /// feature is disabled.
    pub fn set_rle_enabled(&mut self, enabled: bool) -> Result<(), crate::error::Error> {
        self.packetizer.set_rle_enabled(enabled)
    }

    /// Resets every piece of state to a fresh-boot equivalent, for test use
    /// only — mirrors Design Note "a `#[cfg(test)] reset()` replaces the
    /// current implicit reset".
    #[cfg(test)]
    pub fn reset(&mut self, device_ids: DeviceIds<'a>) {
        self.event_storage.reset();
        self.coredump = CoredumpSource::empty();
        self.log.reset();
        self.log_source = LogDataSource::new(device_ids);
        self.cdr = CdrRegistry::new();
        #[cfg(feature = "heap-stats")]
        {
            self.heap_stats = HeapStatsPool::new();
        }
        self.packetizer.abort();
    }
}

/// Copies as much of `s` as fits into `out`, returning the number of bytes
/// written. No `alloc` is available to own a platform-reported `&str` beyond
/// the borrow's lifetime, so diagnostics that outlive it copy into a
/// caller-sized stack buffer instead.
fn copy_str(out: &mut [u8], s: &str) -> usize {
    let n = s.len().min(out.len());
    out[..n].copy_from_slice(&s.as_bytes()[..n]);
    n
}

/// Writes the decimal digits of `n` into `out`, returning the number of
/// bytes written. `out` must be at least 20 bytes (a `u64`'s digit count).
fn format_u64_decimal(out: &mut [u8], mut n: u64) -> usize {
    let mut digits = [0u8; 20];
    let mut ndigits = 0;
    loop {
        digits[ndigits] = b'0' + (n % 10) as u8;
        ndigits += 1;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    for i in 0..ndigits {
        out[i] = digits[ndigits - 1 - i];
    }
    ndigits
}
