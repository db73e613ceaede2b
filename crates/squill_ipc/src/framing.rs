use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{self, Read, Write};

const MAX_MSG_SIZE: u32 = 16 * 1024 * 1024;

/// Write one length-prefixed frame: 4-byte big-endian length, then a JSON
/// payload. JSON keeps the frames self-describing; both ends of the pipe are
/// always the same build, so no version negotiation is needed.
pub fn send_msg<W: Write, T: Serialize>(mut writer: W, msg: &T) -> io::Result<()> {
    let bytes = serde_json::to_vec(msg).map_err(io::Error::other)?;
    let len = bytes.len() as u32;

    if len > MAX_MSG_SIZE {
        return Err(io::Error::other("message too large"));
    }

    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame written by `send_msg`.
pub fn recv_msg<R: Read, T: DeserializeOwned>(mut reader: R) -> io::Result<T> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_be_bytes(len_bytes) as usize;

    if len > MAX_MSG_SIZE as usize {
        return Err(io::Error::other("message too large"));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;

    serde_json::from_slice(&buf).map_err(io::Error::other)
}
