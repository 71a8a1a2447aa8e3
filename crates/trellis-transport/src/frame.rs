//! Multipart frame codec.
//!
//! One message on the wire is `u32 frame_count`, then per frame
//! `u32 length` + bytes (all big-endian). Limits guard against hostile or
//! corrupted peers.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum size of a single frame.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Maximum number of frames in one message.
pub const MAX_FRAMES: usize = 1024;

/// Encodes a multipart message into one contiguous buffer.
pub fn encode_message(frames: &[Vec<u8>]) -> Vec<u8> {
    let payload: usize = frames.iter().map(|f| 4 + f.len()).sum();
    let mut out = Vec::with_capacity(4 + payload);
    out.extend_from_slice(&(frames.len() as u32).to_be_bytes());
    for frame in frames {
        out.extend_from_slice(&(frame.len() as u32).to_be_bytes());
        out.extend_from_slice(frame);
    }
    out
}

/// Writes an encoded message to the stream.
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    writer.write_all(bytes).await?;
    writer.flush().await
}

/// Reads one multipart message. Returns `Ok(None)` on clean end of stream.
pub async fn read_message<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> io::Result<Option<Vec<Vec<u8>>>> {
    let count = match read_u32(reader).await {
        Ok(count) => count as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };
    if count > MAX_FRAMES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message claims {count} frames (limit {MAX_FRAMES})"),
        ));
    }
    let mut frames = Vec::with_capacity(count);
    for _ in 0..count {
        let len = read_u32(reader).await? as usize;
        if len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {len} bytes exceeds limit {MAX_FRAME_LEN}"),
            ));
        }
        let mut frame = vec![0u8; len];
        reader.read_exact(&mut frame).await?;
        frames.push(frame);
    }
    Ok(Some(frames))
}

async fn read_u32<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).await?;
    Ok(u32::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip_over_a_stream() {
        let (mut tx, mut rx) = tokio::io::duplex(4096);
        let frames = vec![b"{\"a\":1}".to_vec(), Vec::new(), b"xyz".to_vec()];
        let bytes = encode_message(&frames);
        write_message(&mut tx, &bytes).await.unwrap();
        let read = read_message(&mut rx).await.unwrap().unwrap();
        assert_eq!(read, frames);
    }

    #[tokio::test]
    async fn clean_eof_yields_none() {
        let (tx, mut rx) = tokio::io::duplex(64);
        drop(tx);
        assert!(read_message(&mut rx).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_frame_count_is_rejected() {
        let (mut tx, mut rx) = tokio::io::duplex(64);
        tx.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
        let err = read_message(&mut rx).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn two_messages_back_to_back() {
        let (mut tx, mut rx) = tokio::io::duplex(4096);
        let first = vec![b"one".to_vec()];
        let second = vec![b"two".to_vec(), b"2".to_vec()];
        write_message(&mut tx, &encode_message(&first)).await.unwrap();
        write_message(&mut tx, &encode_message(&second)).await.unwrap();
        assert_eq!(read_message(&mut rx).await.unwrap().unwrap(), first);
        assert_eq!(read_message(&mut rx).await.unwrap().unwrap(), second);
    }
}
