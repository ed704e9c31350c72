//! Async read/write of wire messages

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{HEADER_LEN, encode_header, parse_header};
use crate::types::Frame;
use crate::{Result, StreamError};

/// Initial payload allocation; larger payloads grow as bytes arrive
const PAYLOAD_CHUNK: usize = 64 * 1024;

/// Read one complete wire message.
///
/// A single `read` may return fewer bytes than requested; this keeps reading
/// until the header and then the payload are complete. A zero-length read
/// before that point means the peer closed and fails with `ConnectionClosed`.
pub async fn read_frame<R>(reader: &mut R, max_frame_len: u64) -> Result<Frame>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; HEADER_LEN];
    read_full(reader, &mut header, "length header").await?;
    let len = parse_header(header, max_frame_len)?;

    // The header never sizes the allocation on its own.
    let mut payload = Vec::with_capacity(len.min(PAYLOAD_CHUNK));
    let read = (&mut *reader)
        .take(len as u64)
        .read_to_end(&mut payload)
        .await
        .map_err(|e| StreamError::io("reading payload", e))?;
    if read < len {
        return Err(StreamError::connection_closed(format!(
            "peer closed after {} of {} payload bytes",
            read, len
        )));
    }
    Ok(Frame::from(payload))
}

async fn read_full<R>(reader: &mut R, buf: &mut [u8], part: &str) -> Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader
            .read(&mut buf[filled..])
            .await
            .map_err(|e| StreamError::io(format!("reading {}", part), e))?;
        if n == 0 {
            return Err(StreamError::connection_closed(format!(
                "peer closed after {} of {} {} bytes",
                filled,
                buf.len(),
                part
            )));
        }
        filled += n;
    }
    Ok(())
}

/// Write one wire message and flush it.
///
/// Returns the number of bytes put on the wire (payload plus header).
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer
        .write_all(&encode_header(frame.len()))
        .await
        .map_err(|e| StreamError::io("writing length header", e))?;
    writer.write_all(frame.as_bytes()).await.map_err(|e| StreamError::io("writing payload", e))?;
    writer.flush().await.map_err(|e| StreamError::io("flushing frame", e))?;
    Ok(frame.wire_len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TrickleReader;
    use crate::wire::{DEFAULT_MAX_FRAME_LEN, MAX_FRAME_LEN_LIMIT, encode};

    #[tokio::test]
    async fn reads_frames_one_byte_at_a_time() {
        let payloads: Vec<Vec<u8>> =
            vec![Vec::new(), b"a".to_vec(), (0..=255u8).cycle().take(70_000).collect()];
        let bytes: Vec<u8> =
            payloads.iter().flat_map(|p| encode(&Frame::from(p.clone()))).collect();

        let mut reader = TrickleReader::new(bytes, 1);
        for expected in &payloads {
            let frame = read_frame(&mut reader, DEFAULT_MAX_FRAME_LEN).await.unwrap();
            assert_eq!(frame.as_bytes(), expected.as_slice());
        }

        let err = read_frame(&mut reader, DEFAULT_MAX_FRAME_LEN).await.unwrap_err();
        assert!(matches!(err, StreamError::ConnectionClosed { .. }));
    }

    #[tokio::test]
    async fn closed_mid_header_is_connection_closed() {
        let mut reader = TrickleReader::new(vec![0, 0, 0, 0, 0], 2);
        let err = read_frame(&mut reader, DEFAULT_MAX_FRAME_LEN).await.unwrap_err();
        assert!(matches!(err, StreamError::ConnectionClosed { .. }));
        assert!(err.to_string().contains("length header"));
    }

    #[tokio::test]
    async fn closed_mid_payload_is_connection_closed() {
        let mut bytes = encode(&Frame::from(vec![7u8; 100]));
        bytes.truncate(HEADER_LEN + 40);

        let mut reader = TrickleReader::new(bytes, 16);
        let err = read_frame(&mut reader, DEFAULT_MAX_FRAME_LEN).await.unwrap_err();
        assert!(matches!(err, StreamError::ConnectionClosed { .. }));
        assert!(err.to_string().contains("40 of 100"));
    }

    #[tokio::test]
    async fn oversized_claim_is_rejected_without_reading_payload() {
        let bytes = (1024u64).to_be_bytes().to_vec();
        let mut reader = TrickleReader::new(bytes, 8);
        let err = read_frame(&mut reader, 512).await.unwrap_err();
        assert!(matches!(err, StreamError::MalformedHeader { .. }));
    }

    #[tokio::test]
    async fn huge_claim_with_unbounded_limit_does_not_allocate() {
        let mut bytes = (1u64 << 62).to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 32]);
        let mut reader = TrickleReader::new(bytes, 8);
        let err = read_frame(&mut reader, u64::MAX).await.unwrap_err();
        assert!(matches!(err, StreamError::MalformedHeader { .. }));
    }

    #[tokio::test]
    async fn large_claim_within_limit_fails_on_short_stream() {
        let mut bytes = (256u64 * 1024 * 1024).to_be_bytes().to_vec();
        bytes.extend_from_slice(&[1u8; 1000]);
        let mut reader = TrickleReader::new(bytes, 300);
        let err = read_frame(&mut reader, MAX_FRAME_LEN_LIMIT).await.unwrap_err();
        assert!(matches!(err, StreamError::ConnectionClosed { .. }));
        assert!(err.to_string().contains("1000 of 268435456"), "{err}");
    }

    #[tokio::test]
    async fn write_then_read_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let writer = tokio::spawn(async move {
            let mut total = 0;
            for i in 0..5u8 {
                total += write_frame(&mut client, &Frame::from(vec![i; 300])).await.unwrap();
            }
            total
        });

        for i in 0..5u8 {
            let frame = read_frame(&mut server, DEFAULT_MAX_FRAME_LEN).await.unwrap();
            assert_eq!(frame.as_bytes(), vec![i; 300].as_slice());
        }
        assert_eq!(writer.await.unwrap(), 5 * 308);
    }
}
