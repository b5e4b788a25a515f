//! Stdio frame transport for the control-port crypto driver.
//!
//! Request frames on stdin: `[command: u32 le][len: u32 le][payload]`.
//! Response frames on stdout: `[1][len][reply payload]` on success,
//! `[0][len][rendered error term]` on failure. The frame header is
//! little-endian; payload contents follow the control protocol's big-endian
//! layouts.

use std::io::{self, Read, Write};

use anyhow::{Context, Result};
use cryptoport_registry::{driver_init, open, DriverEntry};

const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// The host-side reply buffer handed to every dispatch. Small on purpose so
/// digest-sized replies reuse it and longer ones take the allocation path.
const SCRATCH_LEN: usize = 64;

fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    let mut off = 0usize;
    while off < buf.len() {
        let n = reader.read(&mut buf[off..])?;
        if n == 0 {
            if off == 0 {
                return Ok(false);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "unexpected EOF",
            ));
        }
        off += n;
    }
    Ok(true)
}

fn dispatch_frame(entry: &DriverEntry, command: u32, payload: &[u8]) -> (u32, Vec<u8>) {
    let mut scratch = [0u8; SCRATCH_LEN];
    match (entry.control)(command, payload, &mut scratch) {
        Ok(reply) => (1, reply.as_slice().to_vec()),
        Err(err) => (
            0,
            cryptoport_term::error(err.reason()).to_string().into_bytes(),
        ),
    }
}

fn run() -> Result<()> {
    let entry = driver_init(open("crypto")?).context("resolve crypto driver")?;

    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();

    let mut hdr = [0u8; 8];
    loop {
        if !read_exact_or_eof(&mut stdin, &mut hdr)? {
            break;
        }
        let command = u32::from_le_bytes([hdr[0], hdr[1], hdr[2], hdr[3]]);
        let len_u32 = u32::from_le_bytes([hdr[4], hdr[5], hdr[6], hdr[7]]);
        let len = usize::try_from(len_u32).unwrap_or(usize::MAX);
        if len > MAX_FRAME_LEN {
            anyhow::bail!("request frame too large: {len_u32} bytes");
        }

        let mut payload = vec![0u8; len];
        if len != 0 {
            stdin.read_exact(&mut payload).context("read frame payload")?;
        }

        let (tag, body) = dispatch_frame(entry, command, &payload);
        stdout.write_all(&tag.to_le_bytes())?;
        stdout.write_all(&(body.len() as u32).to_le_bytes())?;
        if !body.is_empty() {
            stdout.write_all(&body)?;
        }
        stdout.flush()?;
    }

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("cryptoport-hostd: {e:#}");
        std::process::exit(1);
    }
}
