//! Control-port crypto driver.
//!
//! The host hands us a numeric command plus an opaque payload and a scratch
//! buffer; we hand back a reply sized to exactly the result length, written
//! into the scratch buffer when it fits and freshly allocated otherwise.
//! Command numbering follows the upstream control protocol; everything the
//! capability query advertises has a matching arm in [`control`], and the
//! reserved identifiers around them (block ciphers, RSA/DSA/DH, incremental
//! hash contexts) fail as unsupported.
//!
//! The dispatcher holds no cross-call state: every call is synchronous, and
//! concurrent calls are safe because each one works only on its own
//! arguments.

use std::fmt;

use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::{Digest, Sha1};

pub mod entropy;
pub mod reply;
pub mod uniform;
pub mod wire;

pub use entropy::{EntropySource, OsEntropy};
pub use reply::Reply;

pub const CMD_INFO: u32 = 0;
pub const CMD_MD5: u32 = 1;
pub const CMD_SHA: u32 = 5;
pub const CMD_SHA_MAC: u32 = 11;
pub const CMD_RAND_BYTES: u32 = 19;
pub const CMD_RAND_UNIFORM: u32 = 20;

pub const MD5_DIGEST_LEN: usize = 16;
pub const SHA1_DIGEST_LEN: usize = 20;

/// Commands advertised by the capability query, in protocol order.
///
/// Must stay in lock-step with the dispatch table; `Command::code` is matched
/// exhaustively so a new variant cannot compile without forcing a look here.
pub const IMPLEMENTED_COMMANDS: [u8; 5] = [
    CMD_MD5 as u8,
    CMD_SHA as u8,
    CMD_SHA_MAC as u8,
    CMD_RAND_BYTES as u8,
    CMD_RAND_UNIFORM as u8,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Info,
    Md5,
    Sha,
    ShaMac,
    RandBytes,
    RandUniform,
}

impl Command {
    pub fn parse(id: u32) -> Option<Self> {
        match id {
            CMD_INFO => Some(Command::Info),
            CMD_MD5 => Some(Command::Md5),
            CMD_SHA => Some(Command::Sha),
            CMD_SHA_MAC => Some(Command::ShaMac),
            CMD_RAND_BYTES => Some(Command::RandBytes),
            CMD_RAND_UNIFORM => Some(Command::RandUniform),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Command::Info => CMD_INFO,
            Command::Md5 => CMD_MD5,
            Command::Sha => CMD_SHA,
            Command::ShaMac => CMD_SHA_MAC,
            Command::RandBytes => CMD_RAND_BYTES,
            Command::RandUniform => CMD_RAND_UNIFORM,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverError {
    /// Payload length or shape violates the command's contract.
    MalformedPayload,
    /// Identifier is reserved by the protocol but not implemented here.
    UnsupportedCommand(u32),
    /// The reply buffer could not be sized.
    AllocationFailure,
    /// The platform random generator failed.
    EntropyUnavailable,
    /// Sampling was requested over `[from, to)` with `to <= from`.
    DegenerateRange,
}

impl DriverError {
    /// Stable reason atom for the host boundary.
    pub fn reason(self) -> &'static str {
        match self {
            DriverError::MalformedPayload => "malformed_payload",
            DriverError::UnsupportedCommand(_) => "unsupported_command",
            DriverError::AllocationFailure => "allocation_failure",
            DriverError::EntropyUnavailable => "entropy_unavailable",
            DriverError::DegenerateRange => "degenerate_range",
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::MalformedPayload => f.write_str("malformed control payload"),
            DriverError::UnsupportedCommand(id) => {
                write!(f, "unsupported control command {id}")
            }
            DriverError::AllocationFailure => f.write_str("reply buffer allocation failed"),
            DriverError::EntropyUnavailable => f.write_str("secure random source unavailable"),
            DriverError::DegenerateRange => f.write_str("empty sampling range"),
        }
    }
}

impl std::error::Error for DriverError {}

/// Dispatch one control request using the platform random source.
///
/// `scratch` is the host's reply buffer; see [`Reply`] for the reuse rules.
/// On error nothing has been written to `scratch`.
pub fn control<'a>(
    command: u32,
    payload: &[u8],
    scratch: &'a mut [u8],
) -> Result<Reply<'a>, DriverError> {
    control_with(&mut OsEntropy, command, payload, scratch)
}

/// [`control`] with an explicit entropy source.
pub fn control_with<'a>(
    entropy: &mut dyn EntropySource,
    command: u32,
    payload: &[u8],
    scratch: &'a mut [u8],
) -> Result<Reply<'a>, DriverError> {
    let Some(command) = Command::parse(command) else {
        eprintln!("cryptoport: unsupported control command {command}");
        return Err(DriverError::UnsupportedCommand(command));
    };
    match command {
        Command::Info => info(scratch),
        Command::Md5 => md5_digest(payload, scratch),
        Command::Sha => sha1_digest(payload, scratch),
        Command::ShaMac => sha1_mac(payload, scratch),
        Command::RandBytes => rand_bytes(entropy, payload, scratch),
        Command::RandUniform => rand_uniform(entropy, payload, scratch),
    }
}

fn info(scratch: &mut [u8]) -> Result<Reply<'_>, DriverError> {
    let mut reply = Reply::acquire(scratch, IMPLEMENTED_COMMANDS.len())?;
    reply.as_mut_slice().copy_from_slice(&IMPLEMENTED_COMMANDS);
    Ok(reply)
}

fn md5_digest<'a>(payload: &[u8], scratch: &'a mut [u8]) -> Result<Reply<'a>, DriverError> {
    let mut reply = Reply::acquire(scratch, MD5_DIGEST_LEN)?;
    reply.as_mut_slice().copy_from_slice(&Md5::digest(payload));
    Ok(reply)
}

fn sha1_digest<'a>(payload: &[u8], scratch: &'a mut [u8]) -> Result<Reply<'a>, DriverError> {
    let mut reply = Reply::acquire(scratch, SHA1_DIGEST_LEN)?;
    reply.as_mut_slice().copy_from_slice(&Sha1::digest(payload));
    Ok(reply)
}

/// Payload: `u32be klen`, `klen` key bytes, message as the remainder.
fn sha1_mac<'a>(payload: &[u8], scratch: &'a mut [u8]) -> Result<Reply<'a>, DriverError> {
    let klen = wire::read_u32_be(payload, 0).ok_or(DriverError::MalformedPayload)? as usize;
    if klen > payload.len() - 4 {
        return Err(DriverError::MalformedPayload);
    }
    let key = &payload[4..4 + klen];
    let message = &payload[4 + klen..];

    let mut mac =
        Hmac::<Sha1>::new_from_slice(key).map_err(|_| DriverError::MalformedPayload)?;
    mac.update(message);
    let tag = mac.finalize().into_bytes();

    let mut reply = Reply::acquire(scratch, SHA1_DIGEST_LEN)?;
    reply.as_mut_slice().copy_from_slice(&tag);
    Ok(reply)
}

/// Payload: `u32be n`, `u8 top_mask`, `u8 bottom_mask`, exactly 6 bytes.
///
/// The top mask is OR-ed into the last reply byte and the bottom mask into
/// the first, letting the host force high/low bits (odd numbers, guaranteed
/// bit length). `n == 0` yields an empty reply and no masking.
fn rand_bytes<'a>(
    entropy: &mut dyn EntropySource,
    payload: &[u8],
    scratch: &'a mut [u8],
) -> Result<Reply<'a>, DriverError> {
    if payload.len() != 6 {
        return Err(DriverError::MalformedPayload);
    }
    let n = wire::read_u32_be(payload, 0).ok_or(DriverError::MalformedPayload)?;
    let n = usize::try_from(n).map_err(|_| DriverError::AllocationFailure)?;
    let top_mask = payload[4];
    let bottom_mask = payload[5];

    let mut reply = Reply::acquire(scratch, n)?;
    let out = reply.as_mut_slice();
    entropy.fill(out)?;
    if let Some(last) = out.last_mut() {
        *last |= top_mask;
    }
    if let Some(first) = out.first_mut() {
        *first |= bottom_mask;
    }
    Ok(reply)
}

/// Payload: `u32be from_len`, from bytes, `u32be to_len`, to bytes, with
/// nothing trailing. Bounds are 0-8 byte big-endian integers.
///
/// Reply: `u32be 8` followed by the sampled value as 8 big-endian bytes.
fn rand_uniform<'a>(
    entropy: &mut dyn EntropySource,
    payload: &[u8],
    scratch: &'a mut [u8],
) -> Result<Reply<'a>, DriverError> {
    if payload.len() < 8 {
        return Err(DriverError::MalformedPayload);
    }
    let from_len = wire::read_u32_be(payload, 0).ok_or(DriverError::MalformedPayload)? as usize;
    let from_bytes = payload
        .get(4..)
        .and_then(|rest| rest.get(..from_len))
        .ok_or(DriverError::MalformedPayload)?;
    let rest = &payload[4 + from_len..];
    let to_len = wire::read_u32_be(rest, 0).ok_or(DriverError::MalformedPayload)? as usize;
    let to_bytes = rest
        .get(4..)
        .and_then(|tail| tail.get(..to_len))
        .ok_or(DriverError::MalformedPayload)?;
    if rest.len() != 4 + to_len {
        return Err(DriverError::MalformedPayload);
    }

    let from = wire::decode_bound(from_bytes).ok_or(DriverError::MalformedPayload)?;
    let to = wire::decode_bound(to_bytes).ok_or(DriverError::MalformedPayload)?;

    let sampled = uniform::uniform_in_range(entropy, from, to);
    if sampled >= to {
        // The sampler's sentinel: either the range was empty to begin with or
        // a draw failed partway through.
        return Err(if to <= from {
            DriverError::DegenerateRange
        } else {
            DriverError::EntropyUnavailable
        });
    }

    let mut reply = Reply::acquire(scratch, 4 + 8)?;
    let out = reply.as_mut_slice();
    wire::write_u32_be(out, 0, 8);
    wire::write_u64_be(out, 4, sampled);
    Ok(reply)
}
