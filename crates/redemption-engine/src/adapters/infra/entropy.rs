use crate::domain::errors::EntropyError;
use crate::ports::outbound::EntropySource;
use rand::rngs::OsRng;
use rand::RngCore;

/// Token entropy straight from the operating system.
///
/// Uses the fallible `try_fill_bytes` so an OS failure surfaces as
/// `EntropyError` instead of a panic.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropySource;

impl EntropySource for OsEntropySource {
    fn fill(&self, dest: &mut [u8]) -> Result<(), EntropyError> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| EntropyError::Unavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fills_buffer() {
        let mut a = [0u8; 24];
        let mut b = [0u8; 24];
        OsEntropySource.fill(&mut a).unwrap();
        OsEntropySource.fill(&mut b).unwrap();
        assert_ne!(a, b);
    }
}
