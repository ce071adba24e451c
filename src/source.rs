//! The abstract Data Source contract (§3).
//!
//! Per Design Note "Static dispatch over abstract sources": the C SDK
//! expresses this as a struct of three function pointers
//! (`has_more_msgs_cb`/`read_msg_cb`/`mark_msg_read_cb`); here it's a trait,
//! and the *set* of sources the packetizer polls is closed by
//! [`crate::packetizer::SourceMask`] rather than an open-ended registry (with
//! the sole exception of the CDR registry, §4.5, which is itself one closed
//! source from the packetizer's point of view).

/// One of the packetizer's four pollable sources.
///
/// # Invariants (see §3)
/// - While a message is "active" (between the `has_message` call that first
///   reported it and the matching `mark_sent`), its total size and the bytes
///   at any offset `< size` must be stable.
/// - `has_message` may be called repeatedly and must be idempotent.
/// - After `mark_sent`, the source discards that message; the next
///   `has_message` reveals the next one, if any.
/// - Sources are independent: draining one must never mutate another.
pub trait DataSource {
    /// Reports whether a message is available, writing its total size to
    /// `size` if so.
    fn has_message(&mut self, size: &mut usize) -> bool;

    /// Reads `buf.len()` bytes of the active message starting at `offset`.
    ///
    /// Returns `false` if the requested range isn't available; the caller
    /// (the packetizer) treats that as a transient failure, not a protocol
    /// error (§4.7, §7).
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> bool;

    /// Discards the active message, advancing to the next one.
    fn mark_sent(&mut self);
}
