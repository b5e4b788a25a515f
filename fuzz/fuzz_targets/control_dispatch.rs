#![no_main]

use libfuzzer_sys::fuzz_target;

use cryptoport::{control_with, DriverError, EntropySource, CMD_RAND_BYTES};

/// Deterministic stand-in for the platform generator; fuzzing should not
/// depend on real entropy.
struct Counter(u64);

impl EntropySource for Counter {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), DriverError> {
        for b in buf.iter_mut() {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
            *b = (self.0 >> 56) as u8;
        }
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let command = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let mut payload = data[4..].to_vec();
    if payload.len() > 4096 {
        payload.truncate(4096);
    }
    // Keep random-bytes requests from asking the harness for gigabytes.
    if command == CMD_RAND_BYTES && payload.len() == 6 {
        payload[0] = 0;
        payload[1] = 0;
    }

    let mut entropy = Counter(u64::from_le_bytes([
        data[0], data[1], data[2], data[3], 0, 0, 0, 1,
    ]));
    let mut scratch = [0u8; 64];
    let _ = control_with(&mut entropy, command, &payload, &mut scratch);
});
