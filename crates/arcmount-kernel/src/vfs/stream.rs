//! One-shot read streams.

use bytes::Bytes;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Readable stream returned by `open_read_stream`.
///
/// Archive streams are fully materialized up front and serve both `Read`
/// and `AsyncRead`. Host streams read a bounded window of the real file:
/// `Host` from the sync path, `HostAsync` from [`VfsOps`](super::VfsOps).
/// A `HostAsync` stream only supports `AsyncRead`.
#[derive(Debug)]
pub enum ReadStream {
    Archive(Cursor<Bytes>),
    Host(io::Take<File>),
    HostAsync(tokio::io::Take<tokio::fs::File>),
}

impl ReadStream {
    /// Stream over an in-memory slice.
    pub fn from_bytes(data: Bytes) -> Self {
        ReadStream::Archive(Cursor::new(data))
    }

    /// Drain the stream into a buffer.
    ///
    /// A `HostAsync` stream is converted back to a blocking file, which
    /// fails while an async read is still in flight.
    pub fn into_bytes(self) -> io::Result<Bytes> {
        match self {
            ReadStream::Archive(cursor) => {
                let pos = cursor.position() as usize;
                let data = cursor.into_inner();
                Ok(data.slice(pos.min(data.len())..))
            }
            ReadStream::Host(mut file) => {
                let mut buf = Vec::new();
                file.read_to_end(&mut buf)?;
                Ok(Bytes::from(buf))
            }
            ReadStream::HostAsync(take) => {
                let limit = take.limit();
                let file = take
                    .into_inner()
                    .try_into_std()
                    .map_err(|_| io::Error::other("host stream has a pending async read"))?;
                ReadStream::Host(file.take(limit)).into_bytes()
            }
        }
    }
}

impl Read for ReadStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ReadStream::Archive(cursor) => cursor.read(buf),
            ReadStream::Host(file) => file.read(buf),
            ReadStream::HostAsync(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "async host stream cannot be read synchronously",
            )),
        }
    }
}

/// A sync `Host` stream is read inline; it only comes from the sync path.
impl AsyncRead for ReadStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ReadStream::Archive(cursor) => Pin::new(cursor).poll_read(cx, buf),
            ReadStream::Host(file) => {
                let n = file.read(buf.initialize_unfilled())?;
                buf.advance(n);
                Poll::Ready(Ok(()))
            }
            ReadStream::HostAsync(file) => Pin::new(file).poll_read(cx, buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_read() {
        let mut stream = ReadStream::from_bytes(Bytes::from_static(b"hello"));
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_async_read() {
        let mut stream = ReadStream::from_bytes(Bytes::from_static(b"hello"));
        let mut out = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut stream, &mut out)
            .await
            .unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn test_into_bytes_after_partial_read() {
        let mut stream = ReadStream::from_bytes(Bytes::from_static(b"abcdef"));
        let mut head = [0u8; 2];
        stream.read_exact(&mut head).unwrap();
        assert_eq!(stream.into_bytes().unwrap(), Bytes::from_static(b"cdef"));
    }

    #[test]
    fn test_host_stream_window() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"0123456789").unwrap();
        let handle = File::open(file.path()).unwrap();
        let stream = ReadStream::Host(handle.take(3));
        assert_eq!(stream.into_bytes().unwrap(), Bytes::from_static(b"012"));
    }

    #[tokio::test]
    async fn test_host_async_stream() {
        use tokio::io::AsyncReadExt as _;

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"0123456789").unwrap();

        let handle = tokio::fs::File::open(file.path()).await.unwrap();
        let mut stream = ReadStream::HostAsync(handle.take(4));
        let mut out = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut stream, &mut out)
            .await
            .unwrap();
        assert_eq!(out, b"0123");

        let mut buf = [0u8; 1];
        let err = Read::read(&mut stream, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);

        let handle = tokio::fs::File::open(file.path()).await.unwrap();
        let stream = ReadStream::HostAsync(handle.take(u64::MAX));
        assert_eq!(
            stream.into_bytes().unwrap(),
            Bytes::from_static(b"0123456789")
        );
    }
}
