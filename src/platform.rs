//! Narrow platform collaborator interfaces, per §6.
//!
//! The core never talks to hardware directly. Everything it needs from the
//! surrounding firmware — wall-clock time, device identity, a place to send
//! exported log text, a monotonic clock, and mutual exclusion — comes through
//! this module.

/// Mutual exclusion for the single platform mutex described in §5.
///
/// Backed by [`critical_section`], the same crate the teacher logger uses to
/// guard its ring buffer index updates. Unlike that teacher's lock-free SPSC
/// design, every mutable structure in this crate (event storage, log buffer,
/// packetizer state, heap-stats pool, CDR registry) is only ever touched from
/// inside a [`Lock::with`] section, so there is no atomic bookkeeping to get
/// right beyond what `critical_section` already provides.
pub struct Lock;

impl Lock {
    /// Runs `f` with the platform mutex held.
    ///
    /// Non-blocking: `critical_section`'s default `std` backend (used by this
    /// crate's own tests) is a plain `Mutex`, never a spin loop, so this
    /// satisfies the "non-blocking in test harness" contract from §6 trivially.
    #[inline]
    pub fn with<R>(f: impl FnOnce() -> R) -> R {
        critical_section::with(|_| f())
    }
}

/// A point in time as reported by the platform's time source.
///
/// Mirrors `sMemfaultCurrentTime`: the platform may simply not know the
/// current time (e.g. before NTP sync), which is represented as `Unknown`
/// rather than an error, since the absence of a clock is routine rather than
/// exceptional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum CurrentTime {
    /// The platform cannot currently report a time.
    Unknown,
    /// Unix epoch time, in seconds.
    UnixEpochTimeSec(u32),
}

/// Static device identity strings reported by the platform.
#[derive(Debug, Clone, Copy, defmt::Format)]
pub struct DeviceInfo<'a> {
    /// Unique device serial number / identifier.
    pub serial: &'a str,
    /// Software type (e.g. "main-fw").
    pub sw_type: &'a str,
    /// Software version (e.g. "1.2.3").
    pub sw_version: &'a str,
    /// Hardware version / revision string.
    pub hw_version: &'a str,
}

/// Capabilities the core requires from the surrounding firmware.
///
/// `lock`/`unlock` from §6 are intentionally not methods here: they are
/// provided by [`Lock`], which is backed by `critical_section` rather than a
/// platform-supplied implementation, so two customization points can't
/// disagree about what "locked" means.
pub trait Platform {
    /// Returns the best current estimate of wall-clock time.
    fn time_get_current(&self) -> CurrentTime;

    /// Returns static device identity strings.
    fn get_device_info(&self) -> DeviceInfo<'_>;

    /// Sink for pre-formatted export bytes (used by [`crate::log_buffer::LogBuffer::export_all`]
    /// and as the default target for internal diagnostics when the `defmt`
    /// feature's global logger is not wired up to anything else).
    fn log_raw(&mut self, bytes: &[u8]);

    /// Monotonic milliseconds elapsed since the last reset.
    fn time_since_boot_ms(&self) -> u64;
}
