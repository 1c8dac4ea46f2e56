//! Length-prefixed framing over any async byte stream.
//!
//! A frame is a 4-byte big-endian length followed by that many bytes of
//! bincode payload. Both directions of the protocol use the same framing:
//! `Handshake` and `MatchState` from the server, `ClientInput` from clients.

use crate::error::NetError;
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const HEADER_LEN: usize = 4;
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Fixed-width integers, trailing bytes rejected. Serialized bytes are the
/// same as `bincode::serialize`.
fn wire_options() -> impl Options {
    bincode::DefaultOptions::new().with_fixint_encoding()
}

/// Serializes `payload` and prefixes it with its length.
pub fn encode<T: Serialize>(payload: &T) -> Result<Vec<u8>, NetError> {
    let body = wire_options().serialize(payload)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(NetError::Oversized { len: body.len() });
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decodes a frame body (without its header) into `T`.
pub fn decode_payload<T: DeserializeOwned>(body: &[u8]) -> Result<T, NetError> {
    Ok(wire_options()
        .with_limit(MAX_FRAME_LEN as u64)
        .deserialize(body)?)
}

/// Reads until `buf` is full or the stream reports end of file.
///
/// Returns how many bytes were read, which is less than `buf.len()` only
/// when the peer closed the stream.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize, NetError>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Reads one complete frame body.
///
/// Not cancel safe: dropping the future mid-frame loses the bytes already
/// consumed, so only cancel it when the stream is being abandoned.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, NetError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    let received = read_full(reader, &mut header).await?;
    if received == 0 {
        return Err(NetError::Closed);
    }
    if received < HEADER_LEN {
        return Err(NetError::Framing {
            expected: HEADER_LEN,
            received,
        });
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(NetError::Oversized { len });
    }

    let mut body = vec![0u8; len];
    let received = read_full(reader, &mut body).await?;
    if received < len {
        return Err(NetError::Framing {
            expected: len,
            received,
        });
    }

    Ok(body)
}

pub async fn read_message<T, R>(reader: &mut R) -> Result<T, NetError>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let body = read_frame(reader).await?;
    decode_payload(&body)
}

/// Writes an already encoded frame.
pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<(), NetError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn write_message<T, W>(writer: &mut W, payload: &T) -> Result<(), NetError>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let frame = encode(payload)?;
    write_frame(writer, &frame).await
}
