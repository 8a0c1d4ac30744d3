//! Trait abstraction for frame transport operations to enable testing

use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;

/// Source of fixed-length frames
#[async_trait]
pub trait FrameTransport: Send {
    /// Read up to `len` bytes, giving up once `timeout` has elapsed
    ///
    /// Returns whatever arrived before the deadline or end of stream, so the
    /// result may be shorter than `len` (including empty).
    async fn read_frame(&mut self, len: usize, timeout: Duration) -> io::Result<Vec<u8>>;

    /// Release the underlying device
    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Frame transport over any async byte stream
pub struct ReaderTransport<R> {
    reader: R,
}

impl<R> ReaderTransport<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }
}

#[async_trait]
impl<R> FrameTransport for ReaderTransport<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read_frame(&mut self, len: usize, timeout: Duration) -> io::Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut buf = vec![0u8; len];
        let mut filled = 0;

        while filled < len {
            match tokio::time::timeout_at(deadline, self.reader.read(&mut buf[filled..])).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => filled += n,
                Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
                Ok(Err(e)) => return Err(e),
                Err(_) => break,
            }
        }

        buf.truncate(filled);
        Ok(buf)
    }
}
