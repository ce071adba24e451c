//! Crate-wide error kind, per §7.
//!
//! `Ok` and `Timeout` from the distilled spec's error table are deliberately
//! not variants here: `Ok` is just `Result::Ok`, and `Timeout` is a
//! transport-owned concept this crate never constructs (see SPEC_FULL.md §7).

/// Failure reason returned by fallible public APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum Error {
    /// A `NULL`-equivalent or otherwise malformed argument, such as a
    /// buffer shorter than [`crate::chunk::MIN_CHUNK_BUF_LEN`].
    InvalidInput,
    /// No message is available from the relevant source right now.
    Empty,
    /// The event storage ring or circular buffer cannot fit the request.
    Full,
    /// No coredump, CDR, or log snapshot is present.
    DoesNotExist,
    /// The operation is gated off at build time (a Cargo feature is disabled).
    NotSupported,
}
