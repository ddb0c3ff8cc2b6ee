//! Component H: Stream Adapters.
//!
//! Tagged-union byte source/sink so callers can hand in either a sync
//! (`std::io`) or async (`tokio::io`) reader/writer without the engine
//! probing at runtime — per the original design's explicit guidance not to
//! probe. Sync variants run inside `spawn_blocking` so a slow synchronous
//! call never stalls the runtime, the Rust equivalent of the original
//! client's `await asyncio.sleep(0.0)` yield-back after a sync `.read()`.
//!
//! Grounded on `examples/original_source/aioboto3/s3/inject.py`'s
//! `_sync_to_async`-style wrapping around file-like objects.

use std::io::{self, Read, Seek, Write};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

/// A byte source a caller hands to the upload orchestrator.
pub enum ByteSource {
    Sync(Box<dyn io::Read + Send>),
    Async(Box<dyn AsyncRead + Send + Unpin>),
}

impl ByteSource {
    /// Read up to `buf.len()` bytes, returning the number read (0 at EOF).
    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ByteSource::Async(r) => r.read(buf).await,
            ByteSource::Sync(r) => {
                // `io::Read` is not `Send`-safe to call across an await
                // point from inside this function's own stack, so the
                // read happens in a blocking-pool thread; this is the only
                // place a sync source touches tokio.
                let mut owned = std::mem::replace(r, Box::new(io::empty()));
                let mut owned_buf = vec![0u8; buf.len()];
                let (n, owned, owned_buf) = tokio::task::spawn_blocking(move || {
                    let n = owned.read(&mut owned_buf).unwrap_or(0);
                    (n, owned, owned_buf)
                })
                .await
                .unwrap_or((0, owned, owned_buf));
                *r = owned;
                buf[..n].copy_from_slice(&owned_buf[..n]);
                Ok(n)
            }
        }
    }
}

/// Something a caller can write to, and optionally seek within.
pub trait SeekWrite: io::Write + io::Seek {}
impl<T: io::Write + io::Seek> SeekWrite for T {}

/// A byte sink the download orchestrator writes decrypted chunks into.
pub enum ByteSink {
    SeekWrite(Box<dyn SeekWrite + Send>),
    WriteOnly(Box<dyn AsyncWrite + Send + Unpin>),
}

impl ByteSink {
    pub fn is_seekable(&self) -> bool {
        matches!(self, ByteSink::SeekWrite(_))
    }

    /// Write `data` at `offset`. Only valid for the seekable variant —
    /// callers must route non-seekable sinks through the reassembly
    /// buffer in `download.rs` instead.
    pub async fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        match self {
            ByteSink::SeekWrite(w) => {
                let mut owned = std::mem::replace(w, Box::new(io::Cursor::new(Vec::new())));
                let data = data.to_vec();
                let owned = tokio::task::spawn_blocking(move || -> io::Result<_> {
                    owned.seek(io::SeekFrom::Start(offset))?;
                    owned.write_all(&data)?;
                    Ok(owned)
                })
                .await
                .map_err(|e| io::Error::other(e.to_string()))??;
                *w = owned;
                Ok(())
            }
            ByteSink::WriteOnly(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "write_at requires a seekable sink",
            )),
        }
    }

    /// Append `data` at the sink's current write position. Valid for
    /// both variants; the non-seekable reassembly task only ever calls
    /// this with strictly ascending, contiguous offsets.
    pub async fn write_next(&mut self, data: Bytes) -> io::Result<()> {
        match self {
            ByteSink::WriteOnly(w) => w.write_all(&data).await,
            ByteSink::SeekWrite(w) => {
                let mut owned = std::mem::replace(w, Box::new(io::Cursor::new(Vec::new())));
                let owned = tokio::task::spawn_blocking(move || -> io::Result<_> {
                    owned.write_all(&data)?;
                    Ok(owned)
                })
                .await
                .map_err(|e| io::Error::other(e.to_string()))??;
                *w = owned;
                Ok(())
            }
        }
    }
}

/// Async-seekable sink wrapper, for callers who already have a
/// `tokio::io::AsyncSeek + AsyncWrite` (e.g. `tokio::fs::File`) and would
/// rather not cross into `spawn_blocking`.
pub struct AsyncSeekSink<W>(pub W);

impl<W: AsyncWrite + AsyncSeek + Unpin> AsyncSeekSink<W> {
    pub async fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.0.seek(io::SeekFrom::Start(offset)).await?;
        self.0.write_all(data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sync_source_reads_through_blocking_pool() {
        let data: &[u8] = b"hello stream adapters";
        let mut source = ByteSource::Sync(Box::new(io::Cursor::new(data.to_vec())));
        let mut buf = vec![0u8; data.len()];
        let n = source.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], data);
    }

    #[tokio::test]
    async fn async_source_reads_directly() {
        let data: &[u8] = b"async hello";
        let mut source = ByteSource::Async(Box::new(io::Cursor::new(data.to_vec())));
        let mut buf = vec![0u8; data.len()];
        let n = source.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], data);
    }

    #[tokio::test]
    async fn seekable_sink_writes_at_offset() {
        let cursor = io::Cursor::new(vec![0u8; 16]);
        let mut sink = ByteSink::SeekWrite(Box::new(cursor));
        sink.write_at(4, b"abcd").await.unwrap();
        if let ByteSink::SeekWrite(w) = &sink {
            // SAFETY-free downcast isn't available generically here; this
            // test only exercises that write_at doesn't error.
            let _ = w;
        }
    }
}
