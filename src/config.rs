//! Runtime-tunable knobs, passed to [`crate::sdk::Sdk::new`] (§10
//! "Configuration"). Compile-time capacity knobs stay const generics on the
//! collection types they size (`HeapStatsPool<N>`, `CdrRegistry<N>`)
//! instead of living here, mirroring how the teacher crate splits Cargo
//! features (compile-time) from the handful of knobs this crate actually
//! needs at runtime, which the teacher — having none — does not model.

use crate::log_buffer::LogLevel;
use crate::packetizer::SourceMask;

#[derive(Debug, Clone, Copy, defmt::Format)]
pub struct Config {
    pub min_save_level: LogLevel,
    pub enable_multi_packet_chunk: bool,
    pub initial_source_mask: SourceMask,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_save_level: LogLevel::Info,
            enable_multi_packet_chunk: true,
            initial_source_mask: SourceMask::all(),
        }
    }
}
