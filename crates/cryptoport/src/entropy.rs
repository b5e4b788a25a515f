//! Secure random source.
//!
//! A single trait seam over "fill this buffer with cryptographically secure
//! bytes" so the sampler and the random-bytes handler can be driven by a
//! scripted source in tests. The OS-backed source fails closed: if the
//! platform generator reports an error, the call errors and nothing weaker is
//! consulted.

use crate::DriverError;

pub trait EntropySource {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), DriverError>;

    /// Draw one full-width random word.
    fn next_u64(&mut self) -> Result<u64, DriverError> {
        let mut raw = [0u8; 8];
        self.fill(&mut raw)?;
        Ok(u64::from_ne_bytes(raw))
    }
}

/// The platform generator (`getrandom`).
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), DriverError> {
        getrandom::getrandom(buf).map_err(|_| DriverError::EntropyUnavailable)
    }
}
