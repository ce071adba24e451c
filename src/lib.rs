#![no_std]
#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

//! Device-side storage and chunked transport pipeline for an embedded
//! telemetry SDK.
//!
//! Producers stage coredumps, heartbeat events, logs, and custom data
//! recordings in bounded, caller-allocated storage (see [`event_storage`],
//! [`log_buffer`], [`coredump_source`], [`cdr`]). A single [`packetizer`]
//! multiplexes over them in a fixed poll order and hands framed, source-tagged
//! messages to a [`chunk::Chunker`], which splits them into self-delimiting,
//! CRC-verified chunks any transport can forward over a byte stream.
//!
//! [`sdk::Sdk`] wires all of this into one application-facing value; most
//! users only need that module.

pub mod cbor;
pub mod cdr;
pub mod chunk;
pub mod config;
pub mod coredump_source;
pub mod crc;
pub mod error;
pub mod event_storage;
#[cfg(feature = "heap-stats")]
pub mod heap_stats;
pub mod log_buffer;
pub mod log_source;
pub mod packetizer;
pub mod platform;
#[cfg(feature = "rle")]
pub mod rle;
mod ring;
pub mod sdk;
pub mod source;

pub use cbor::DeviceIds;
pub use config::Config;
pub use error::Error;
pub use platform::{CurrentTime, DeviceInfo, Platform};
pub use sdk::Sdk;
