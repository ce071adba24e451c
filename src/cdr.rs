//! Custom Data Recording registry: a multi-producer adapter presenting one
//! closed [`crate::source::DataSource`] to the packetizer (§4.5).
//!
//! Grounded on `memfault_custom_data_recording.c`: registration is fallible
//! against a fixed capacity (const generic `N` here, `MEMFAULT_CDR_MAX_DATA_SOURCES`
//! there), the first producer reporting data in registration order becomes
//! active, and its metadata is CBOR-encoded exactly once into an internal
//! buffer rather than re-encoded on every `read`. Feature-gated behind `cdr`.

use crate::cbor::encode_cdr_metadata;
use crate::error::Error;
use crate::source::DataSource;

/// Upper bound on a single producer's pre-serialized metadata map. Generous
/// enough for the five CDR metadata fields plus a handful of MIME types.
const METADATA_BUF_LEN: usize = 256;

/// Metadata reported by a [`CdrSource`] when it has a recording ready.
pub struct CdrMeta<'a> {
    pub start_time_unix_sec: u32,
    pub duration_ms: u32,
    /// Most-specific-first, per §6.
    pub mime_types: &'a [&'a str],
    pub reason: &'a str,
    pub data_len: u32,
}

/// One custom-data-recording producer.
///
/// # Invariant
/// While this producer's data is active (reported via `has_cdr` until the
/// matching `mark_read`), the reported size and content must not change.
pub trait CdrSource {
    fn has_cdr(&mut self, meta: &mut Option<CdrMeta<'_>>) -> bool;
    fn read_data(&mut self, offset: usize, buf: &mut [u8]) -> bool;
    fn mark_read(&mut self);
}

struct ActiveCdr {
    producer_index: usize,
    metadata_len: usize,
    data_len: usize,
}

/// Registry of up to `N` statically configured CDR producers.
pub struct CdrRegistry<'a, const N: usize> {
    producers: [Option<&'a mut dyn CdrSource>; N],
    registered: usize,
    active: Option<ActiveCdr>,
    metadata_buf: [u8; METADATA_BUF_LEN],
}

impl<'a, const N: usize> CdrRegistry<'a, N> {
    pub fn new() -> Self {
        Self {
            producers: [const { None }; N],
            registered: 0,
            active: None,
            metadata_buf: [0u8; METADATA_BUF_LEN],
        }
    }

    /// Adds a producer. Fails with [`Error::Full`] once `N` producers are
    /// already registered — this crate surfaces that failure to the caller
    /// rather than silently dropping the producer. Fails with
    /// [`Error::NotSupported`] when the `cdr` feature is disabled.
    #[cfg(feature = "cdr")]
    pub fn register_source(&mut self, source: &'a mut dyn CdrSource) -> Result<(), Error> {
        if self.registered >= N {
            return Err(Error::Full);
        }
        self.producers[self.registered] = Some(source);
        self.registered += 1;
        Ok(())
    }

    /// Always fails: the `cdr` feature is disabled.
    #[cfg(not(feature = "cdr"))]
    pub fn register_source(&mut self, _source: &'a mut dyn CdrSource) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn encode_active_metadata(&mut self, index: usize, meta: &CdrMeta<'_>) -> Option<usize> {
        let len = encode_cdr_metadata(
            &mut self.metadata_buf,
            meta.start_time_unix_sec,
            meta.duration_ms,
            meta.mime_types,
            meta.reason,
            meta.data_len,
        )?;
        self.active = Some(ActiveCdr {
            producer_index: index,
            metadata_len: len,
            data_len: meta.data_len as usize,
        });
        Some(len)
    }
}

impl<const N: usize> Default for CdrRegistry<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> DataSource for CdrRegistry<'_, N> {
    fn has_message(&mut self, size: &mut usize) -> bool {
        if let Some(active) = &self.active {
            *size = active.metadata_len + active.data_len;
            return true;
        }
        for index in 0..self.registered {
            let Some(producer) = self.producers[index].as_deref_mut() else {
                continue;
            };
            let mut meta = None;
            if producer.has_cdr(&mut meta) {
                let Some(meta) = meta else {
                    defmt::warn!("cdr: has_cdr returned true without metadata");
                    continue;
                };
                let Some(metadata_len) = self.encode_active_metadata(index, &meta) else {
                    defmt::error!("cdr: metadata encoding overran internal buffer");
                    continue;
                };
                *size = metadata_len + meta.data_len as usize;
                return true;
            }
        }
        *size = 0;
        false
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> bool {
        let Some(active) = &self.active else {
            return false;
        };
        let metadata_len = active.metadata_len;
        let data_len = active.data_len;
        let producer_index = active.producer_index;
        if offset + buf.len() > metadata_len + data_len {
            return false;
        }

        if offset < metadata_len {
            let from_meta = (metadata_len - offset).min(buf.len());
            buf[..from_meta].copy_from_slice(&self.metadata_buf[offset..offset + from_meta]);
            if from_meta < buf.len() {
                let Some(producer) = self.producers[producer_index].as_deref_mut() else {
                    return false;
                };
                return producer.read_data(0, &mut buf[from_meta..]);
            }
            true
        } else {
            let Some(producer) = self.producers[producer_index].as_deref_mut() else {
                return false;
            };
            producer.read_data(offset - metadata_len, buf)
        }
    }

    fn mark_sent(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        if let Some(producer) = self.producers[active.producer_index].as_deref_mut() {
            producer.mark_read();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct FakeCdr {
        data: &'static [u8],
        ready: bool,
        read_count: u32,
    }

    impl CdrSource for FakeCdr {
        fn has_cdr(&mut self, meta: &mut Option<CdrMeta<'_>>) -> bool {
            if !self.ready {
                return false;
            }
            *meta = Some(CdrMeta {
                start_time_unix_sec: 1,
                duration_ms: 10,
                mime_types: &["application/octet-stream"],
                reason: "test",
                data_len: self.data.len() as u32,
            });
            true
        }

        fn read_data(&mut self, offset: usize, buf: &mut [u8]) -> bool {
            if offset + buf.len() > self.data.len() {
                return false;
            }
            buf.copy_from_slice(&self.data[offset..offset + buf.len()]);
            true
        }

        fn mark_read(&mut self) {
            self.read_count += 1;
            self.ready = false;
        }
    }

    #[test]
    fn metadata_then_payload_read_across_boundary() {
        static DATA: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];
        let mut source = FakeCdr {
            data: &DATA,
            ready: true,
            read_count: 0,
        };
        let mut registry: CdrRegistry<2> = CdrRegistry::new();
        registry.register_source(&mut source).unwrap();

        let mut size = 0;
        assert!(registry.has_message(&mut size));
        assert!(size > DATA.len());

        // read spanning the metadata/payload boundary
        let boundary = size - DATA.len();
        let mut buf = vec_like(size);
        assert!(registry.read(boundary - 1, &mut buf[..2]));
        assert_eq!(buf[1], DATA[0]);

        registry.mark_sent();
        assert_eq!(source.read_count, 1);
        let mut size2 = 0;
        assert!(!registry.has_message(&mut size2));
    }

    #[test]
    fn registration_fails_once_at_capacity() {
        static DATA: [u8; 1] = [0];
        let mut a = FakeCdr {
            data: &DATA,
            ready: false,
            read_count: 0,
        };
        let mut b = FakeCdr {
            data: &DATA,
            ready: false,
            read_count: 0,
        };
        let mut registry: CdrRegistry<1> = CdrRegistry::new();
        assert!(registry.register_source(&mut a).is_ok());
        assert_eq!(registry.register_source(&mut b), Err(Error::Full));
    }

    /// Tiny const-sized stack buffer helper so these tests don't need `alloc`.
    fn vec_like(_n: usize) -> [u8; 16] {
        [0u8; 16]
    }
}
