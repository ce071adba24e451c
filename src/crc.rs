//! Pure CRC helpers used by the chunk framing (§4.6) and the log region
//! descriptor checksum (§4.3).
//!
//! Both are expressed as `(state, bytes) -> state` per the "CRC and RLE"
//! design note: no internal buffering, no static tables beyond what the
//! `crc` crate itself precomputes.

use crc::{Crc, Table};

const CRC32: Crc<u32, Table<1>> = Crc::<u32, Table<1>>::new(&crc::CRC_32_ISO_HDLC);
const CRC16_CCITT: Crc<u16, Table<1>> = Crc::<u16, Table<1>>::new(&crc::CRC_16_IBM_3740);

/// Feeds `bytes` into a fresh digest seeded from `state` and returns the
/// updated running CRC32.
///
/// This crate never needs to resume a `crc::Digest` across calls (the
/// digest type borrows the table), so the "state" is just the finalized
/// `u32` and each call re-derives a digest via `Crc::digest_with_initial`.
pub fn crc32_update(state: u32, bytes: &[u8]) -> u32 {
    let mut digest = CRC32.digest_with_initial(state);
    digest.update(bytes);
    digest.finalize()
}

/// Initial value to seed [`crc32_update`] with for a fresh message.
pub fn crc32_initial() -> u32 {
    CRC32.digest().finalize()
}

/// One-shot CRC16-CCITT (false) computation, matching
/// `memfault_crc16_ccitt_compute` semantics used for the log region
/// descriptor checksum.
pub fn crc16_ccitt(initial: u16, bytes: &[u8]) -> u16 {
    let mut digest = CRC16_CCITT.digest_with_initial(initial);
    digest.update(bytes);
    digest.finalize()
}

/// Initial value used when starting a fresh CRC16-CCITT computation.
pub const CRC16_CCITT_INITIAL_VALUE: u16 = 0xFFFF;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn crc32_is_order_sensitive_and_deterministic() {
        let a = crc32_update(crc32_initial(), b"hello world");
        let b = crc32_update(crc32_initial(), b"hello world");
        assert_eq!(a, b);

        let split_a = crc32_update(crc32_initial(), b"hello ");
        let split = crc32_update(split_a, b"world");
        assert_eq!(split, a, "CRC of two halves must match CRC of the whole");
    }

    #[test]
    fn crc16_ccitt_matches_known_vector() {
        // "123456789" -> 0x29B1 is the standard CRC-16/CCITT-FALSE check value.
        let crc = crc16_ccitt(CRC16_CCITT_INITIAL_VALUE, b"123456789");
        assert_eq!(crc, 0x29B1);
    }
}
