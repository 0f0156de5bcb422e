//! Length-prefixed frames over any `Read`/`Write` stream.
//!
//! Each frame is: `[u32 big-endian length][payload]`. Handshake tokens are
//! UTF-8 strings carried in the same framing; RPC envelopes are postcard
//! bytes.

use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};

/// Maximum allowed frame payload (16 MiB).
pub const MAX_FRAME: u32 = 16 * 1024 * 1024;

/// Writes `payload` as a single length-prefixed frame and flushes.
pub fn write_frame<W: Write>(w: &mut W, payload: &[u8]) -> io::Result<()> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|&n| n <= MAX_FRAME)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "frame exceeds 16 MiB limit"))?;
    w.write_all(&len.to_be_bytes())?;
    w.write_all(payload)?;
    w.flush()
}

/// Reads one length-prefixed frame from `r`.
///
/// Blocks until the full prefix and payload have arrived. A stream that
/// ends early yields [`io::ErrorKind::UnexpectedEof`].
pub fn read_frame(r: &mut impl Read) -> io::Result<Vec<u8>> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    let len = u32::from_be_bytes(buf);
    if len > MAX_FRAME {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds 16 MiB limit"),
        ));
    }
    let mut payload = vec![0u8; len as usize];
    r.read_exact(&mut payload)?;
    Ok(payload)
}

/// Writes a handshake token.
pub fn write_token<W: Write>(w: &mut W, token: &str) -> io::Result<()> {
    write_frame(w, token.as_bytes())
}

/// Reads a handshake token, rejecting invalid UTF-8.
pub fn read_token(r: &mut impl Read) -> io::Result<String> {
    String::from_utf8(read_frame(r)?).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Writes a bare big-endian `i32` (the interface version) and flushes.
pub fn write_i32<W: Write>(w: &mut W, value: i32) -> io::Result<()> {
    w.write_all(&value.to_be_bytes())?;
    w.flush()
}

/// Reads a bare big-endian `i32`.
pub fn read_i32(r: &mut impl Read) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

/// Encodes `msg` with postcard and writes it as one frame.
pub fn send<W: Write>(w: &mut W, msg: &impl Serialize) -> io::Result<()> {
    let payload =
        postcard::to_allocvec(msg).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    write_frame(w, &payload)
}

/// Reads one frame and decodes it with postcard.
pub fn recv<T: for<'de> Deserialize<'de>>(r: &mut impl Read) -> io::Result<T> {
    let payload = read_frame(r)?;
    postcard::from_bytes(&payload).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
