//! One request/response round trip with the reader process.
//!
//! The reader answers each request with exactly one newline-terminated
//! line. A fresh buffered reader is used per round trip and dropped
//! afterwards, so bytes the process wrote past the first newline are
//! discarded rather than carried into the next tick.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::warn;

/// Write `request` and read back one line, newline included.
///
/// A failed write is logged and the read is still attempted. End of
/// stream before a newline is reported as [`io::ErrorKind::UnexpectedEof`].
pub async fn exchange<W, R>(stdin: &mut W, stdout: &mut R, request: &[u8]) -> io::Result<Vec<u8>>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    if let Err(e) = write_request(stdin, request).await {
        warn!(error = %e, "unable to write request to stdin");
    }

    let mut reader = BufReader::new(stdout);
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line).await?;

    if line.last() != Some(&b'\n') {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("stream closed after {} bytes without a newline", line.len()),
        ));
    }
    Ok(line)
}

async fn write_request<W>(stdin: &mut W, request: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    stdin.write_all(request).await?;
    stdin.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt};

    #[tokio::test]
    async fn writes_request_and_reads_line() {
        let (mut stdin, mut child_in) = duplex(64);
        let (mut child_out, mut stdout) = duplex(64);

        let child = tokio::spawn(async move {
            let mut buf = [0u8; 12];
            child_in.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"get_sensors\n");
            child_out.write_all(b"[]\n").await.unwrap();
            child_out
        });

        let line = exchange(&mut stdin, &mut stdout, b"get_sensors\n").await.unwrap();
        assert_eq!(line, b"[]\n");
        child.await.unwrap();
    }

    #[tokio::test]
    async fn bytes_after_first_line_are_dropped() {
        let (mut stdin, _child_in) = duplex(64);
        let (mut child_out, mut stdout) = duplex(64);

        child_out.write_all(b"first\nsecond\n").await.unwrap();
        drop(child_out);

        let line = exchange(&mut stdin, &mut stdout, b"get_sensors\n").await.unwrap();
        assert_eq!(line, b"first\n");

        // The buffered "second" line went away with the reader.
        let err = exchange(&mut stdin, &mut stdout, b"get_sensors\n").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn closed_stream_is_unexpected_eof() {
        let (mut stdin, _child_in) = duplex(64);
        let (child_out, mut stdout) = duplex(64);
        drop(child_out);

        let err = exchange(&mut stdin, &mut stdout, b"get_sensors\n").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn partial_line_is_unexpected_eof() {
        let (mut stdin, _child_in) = duplex(64);
        let (mut child_out, mut stdout) = duplex(64);
        child_out.write_all(b"[{\"Id\":").await.unwrap();
        drop(child_out);

        let err = exchange(&mut stdin, &mut stdout, b"get_sensors\n").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn failed_write_still_reads() {
        let (mut stdin, child_in) = duplex(64);
        drop(child_in);
        let (mut child_out, mut stdout) = duplex(64);
        child_out.write_all(b"late answer\n").await.unwrap();

        let line = exchange(&mut stdin, &mut stdout, b"get_sensors\n").await.unwrap();
        assert_eq!(line, b"late answer\n");
    }
}
