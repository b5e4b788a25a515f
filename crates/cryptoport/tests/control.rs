//! Dispatch-level tests against the documented control protocol.

use cryptoport::{
    control, control_with, wire, Command, DriverError, EntropySource, Reply,
    CMD_INFO, CMD_MD5, CMD_RAND_BYTES, CMD_RAND_UNIFORM, CMD_SHA, CMD_SHA_MAC,
    IMPLEMENTED_COMMANDS,
};

/// Fills every buffer with one repeated byte; optionally dies after a number
/// of calls.
struct Fixed {
    byte: u8,
    calls_left: Option<u32>,
}

impl Fixed {
    fn forever(byte: u8) -> Self {
        Fixed {
            byte,
            calls_left: None,
        }
    }

    fn failing() -> Self {
        Fixed {
            byte: 0,
            calls_left: Some(0),
        }
    }
}

impl EntropySource for Fixed {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), DriverError> {
        if let Some(left) = &mut self.calls_left {
            if *left == 0 {
                return Err(DriverError::EntropyUnavailable);
            }
            *left -= 1;
        }
        buf.fill(self.byte);
        Ok(())
    }
}

fn uniform_payload(from: &[u8], to: &[u8]) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&(from.len() as u32).to_be_bytes());
    payload.extend_from_slice(from);
    payload.extend_from_slice(&(to.len() as u32).to_be_bytes());
    payload.extend_from_slice(to);
    payload
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[test]
fn info_returns_capability_set() {
    let mut scratch = [0u8; 64];
    let reply = control(CMD_INFO, &[], &mut scratch).unwrap();
    assert_eq!(reply.as_slice(), &IMPLEMENTED_COMMANDS);
}

#[test]
fn info_commands_all_dispatch() {
    let mut scratch = [0u8; 64];
    let reply = control(CMD_INFO, &[], &mut scratch).unwrap();
    for &id in reply.as_slice() {
        assert!(
            Command::parse(id as u32).is_some(),
            "advertised command {id} does not dispatch"
        );
    }
}

#[test]
fn md5_reference_vectors() {
    let mut scratch = [0u8; 64];
    let reply = control(CMD_MD5, b"", &mut scratch).unwrap();
    assert_eq!(hex(reply.as_slice()), "d41d8cd98f00b204e9800998ecf8427e");
    let reply = control(CMD_MD5, b"abc", &mut scratch).unwrap();
    assert_eq!(hex(reply.as_slice()), "900150983cd24fb0d6963f7d28e17f72");
}

#[test]
fn sha1_reference_vectors() {
    let mut scratch = [0u8; 64];
    let reply = control(CMD_SHA, b"", &mut scratch).unwrap();
    assert_eq!(
        hex(reply.as_slice()),
        "da39a3ee5e6b4b0d3255bfef95601890afd80709"
    );
    let reply = control(CMD_SHA, b"abc", &mut scratch).unwrap();
    assert_eq!(
        hex(reply.as_slice()),
        "a9993e364706816aba3e25717850c26c9cd0d89d"
    );
}

#[test]
fn digests_are_deterministic() {
    let mut a = [0u8; 64];
    let mut b = [0u8; 64];
    let first = control(CMD_SHA, b"determinism", &mut a).unwrap();
    let second = control(CMD_SHA, b"determinism", &mut b).unwrap();
    assert_eq!(first.as_slice(), second.as_slice());
}

#[test]
fn sha_mac_rfc2202_vector() {
    // RFC 2202 test case 1: key = 20 x 0x0b, data = "Hi There".
    let mut payload = Vec::new();
    payload.extend_from_slice(&20u32.to_be_bytes());
    payload.extend_from_slice(&[0x0b; 20]);
    payload.extend_from_slice(b"Hi There");

    let mut scratch = [0u8; 64];
    let reply = control(CMD_SHA_MAC, &payload, &mut scratch).unwrap();
    assert_eq!(
        hex(reply.as_slice()),
        "b617318655057264e28bc0b6fb378c8ef146be00"
    );
}

#[test]
fn sha_mac_empty_key_and_message() {
    // klen = 0 and no message bytes is a valid, if unusual, request.
    let mut scratch = [0u8; 64];
    let reply = control(CMD_SHA_MAC, &0u32.to_be_bytes(), &mut scratch).unwrap();
    assert_eq!(reply.len(), 20);
}

#[test]
fn rand_bytes_forces_masked_bits() {
    let mut payload = Vec::new();
    payload.extend_from_slice(&5u32.to_be_bytes());
    payload.push(0x80); // top mask
    payload.push(0x01); // bottom mask

    // All-zero and all-one draws bracket every possible generator output.
    for byte in [0x00, 0xff] {
        let mut src = Fixed::forever(byte);
        let mut scratch = [0u8; 64];
        let reply = control_with(&mut src, CMD_RAND_BYTES, &payload, &mut scratch).unwrap();
        let out = reply.as_slice();
        assert_eq!(out.len(), 5);
        assert_eq!(out[4] & 0x80, 0x80, "top mask not forced");
        assert_eq!(out[0] & 0x01, 0x01, "bottom mask not forced");
    }

    // And with the real generator, repeatedly.
    for _ in 0..32 {
        let mut scratch = [0u8; 64];
        let reply = control(CMD_RAND_BYTES, &payload, &mut scratch).unwrap();
        let out = reply.as_slice();
        assert_eq!(out[4] & 0x80, 0x80);
        assert_eq!(out[0] & 0x01, 0x01);
    }
}

#[test]
fn rand_bytes_zero_length() {
    let mut payload = Vec::new();
    payload.extend_from_slice(&0u32.to_be_bytes());
    payload.push(0x80);
    payload.push(0x01);
    let mut scratch = [0u8; 64];
    let reply = control(CMD_RAND_BYTES, &payload, &mut scratch).unwrap();
    assert!(reply.is_empty());
}

#[test]
fn rand_bytes_entropy_failure_propagates() {
    let mut payload = Vec::new();
    payload.extend_from_slice(&8u32.to_be_bytes());
    payload.extend_from_slice(&[0, 0]);
    let mut src = Fixed::failing();
    let mut scratch = [0u8; 64];
    assert_eq!(
        control_with(&mut src, CMD_RAND_BYTES, &payload, &mut scratch).unwrap_err(),
        DriverError::EntropyUnavailable
    );
}

#[test]
fn rand_uniform_reply_layout() {
    let payload = uniform_payload(&[0x10], &[0x20]);
    let mut scratch = [0u8; 64];
    let reply = control(CMD_RAND_UNIFORM, &payload, &mut scratch).unwrap();
    let out = reply.as_slice();
    assert_eq!(out.len(), 12);
    assert_eq!(wire::read_u32_be(out, 0), Some(8));
    let value = wire::decode_bound(&out[4..]).unwrap();
    assert!((0x10..0x20).contains(&value));
}

#[test]
fn rand_uniform_supports_asymmetric_bound_widths() {
    // from omitted entirely (zero-width bound), to spanning two bytes.
    let payload = uniform_payload(&[], &[0x01, 0x00]);
    for _ in 0..64 {
        let mut scratch = [0u8; 64];
        let reply = control(CMD_RAND_UNIFORM, &payload, &mut scratch).unwrap();
        let value = wire::decode_bound(&reply.as_slice()[4..]).unwrap();
        assert!(value < 256);
    }
}

#[test]
fn rand_uniform_degenerate_range() {
    let mut scratch = [0u8; 64];
    for (from, to) in [(&[5u8][..], &[5u8][..]), (&[9u8][..], &[3u8][..])] {
        let payload = uniform_payload(from, to);
        assert_eq!(
            control(CMD_RAND_UNIFORM, &payload, &mut scratch).unwrap_err(),
            DriverError::DegenerateRange
        );
    }
}

#[test]
fn rand_uniform_entropy_failure() {
    let payload = uniform_payload(&[0], &[100]);
    let mut src = Fixed::failing();
    let mut scratch = [0u8; 64];
    assert_eq!(
        control_with(&mut src, CMD_RAND_UNIFORM, &payload, &mut scratch).unwrap_err(),
        DriverError::EntropyUnavailable
    );
}

#[test]
fn rand_uniform_is_uniform_over_small_range() {
    // Chi-squared against a uniform [0, 4): df = 3, critical value 21.1
    // (p ~ 1e-4) keeps false failures out of CI while still catching a
    // modulo-bias style skew.
    let payload = uniform_payload(&[0], &[4]);
    let samples = 4096u32;
    let mut counts = [0u32; 4];
    for _ in 0..samples {
        let mut scratch = [0u8; 64];
        let reply = control(CMD_RAND_UNIFORM, &payload, &mut scratch).unwrap();
        let value = wire::decode_bound(&reply.as_slice()[4..]).unwrap();
        counts[value as usize] += 1;
    }
    let expected = samples as f64 / 4.0;
    let chi2: f64 = counts
        .iter()
        .map(|&c| {
            let d = c as f64 - expected;
            d * d / expected
        })
        .sum();
    assert!(chi2 < 21.1, "chi2 = {chi2}, counts = {counts:?}");
}

#[test]
fn unsupported_command_leaves_scratch_untouched() {
    let mut scratch = [0xAAu8; 64];
    // 13 is the upstream DES-CBC slot, reserved but not implemented.
    let err = control(13, b"payload", &mut scratch).unwrap_err();
    assert_eq!(err, DriverError::UnsupportedCommand(13));
    assert!(scratch.iter().all(|&b| b == 0xAA));
}

#[test]
fn small_replies_borrow_large_replies_allocate() {
    let mut scratch = [0u8; 64];
    let base = scratch.as_ptr();
    let reply = control(CMD_SHA, b"fits in scratch", &mut scratch).unwrap();
    assert!(!reply.is_owned());
    assert_eq!(reply.as_slice().as_ptr(), base);

    let mut payload = Vec::new();
    payload.extend_from_slice(&128u32.to_be_bytes());
    payload.extend_from_slice(&[0, 0]);
    let mut scratch = [0u8; 64];
    let reply = control(CMD_RAND_BYTES, &payload, &mut scratch).unwrap();
    assert!(reply.is_owned());
    assert_eq!(reply.len(), 128);
    if let Reply::Owned(v) = reply {
        assert_eq!(v.capacity(), 128);
    }
}
