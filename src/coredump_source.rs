//! Coredump Data Source: presents an already-captured crash region as a
//! single message.
//!
//! Crash-frame capture itself is an out-of-scope external collaborator
//! (§1): this module only exposes whatever bytes the platform's coredump
//! storage already holds as one Data Source, mirroring how
//! `memfault_data_source_has_coredump`/`memfault_coredump_read` front the
//! platform's flash-backed coredump region in the original source.

use crate::source::DataSource;

/// Presents a caller-supplied coredump region (if any) as a single message.
/// Holds at most one coredump at a time; `mark_sent` discards it.
pub struct CoredumpSource<'a> {
    region: Option<&'a [u8]>,
}

impl<'a> CoredumpSource<'a> {
    pub fn empty() -> Self {
        Self { region: None }
    }

    /// Makes a freshly captured coredump region available for draining.
    /// Overwrites any previously set, undrained region.
    pub fn set_region(&mut self, region: &'a [u8]) {
        self.region = Some(region);
    }
}

impl DataSource for CoredumpSource<'_> {
    fn has_message(&mut self, size: &mut usize) -> bool {
        match self.region {
            Some(region) => {
                *size = region.len();
                true
            }
            None => {
                *size = 0;
                false
            }
        }
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> bool {
        let Some(region) = self.region else {
            return false;
        };
        if offset + buf.len() > region.len() {
            return false;
        }
        buf.copy_from_slice(&region[offset..offset + buf.len()]);
        true
    }

    fn mark_sent(&mut self) {
        self.region = None;
    }
}
