//! Reliable ordered byte-stream transports.
//!
//! [`Transport`] abstracts over a plain TCP stream and a TLS 1.3 session so
//! the pipeline above runs identically on both. Three operations matter:
//!
//! - scalar sends and exact-length receives, which loop internally until the
//!   full length has transferred (via the [`AsyncWrite`]/[`AsyncRead`]
//!   implementations);
//! - [`Transport::sendv_all`], which delivers a sequence of buffers as if
//!   concatenated, choosing between an in-memory coalesce for small payloads
//!   and OS-level scatter/gather for large ones;
//! - the coalesce hint, which asks the kernel to withhold small segments
//!   pending further writes. It is advisory and never affects correctness.
//!
//! TLS has no scatter/gather: [`sendv_chunked`] funnels the iovec through
//! record-sized chunks (≤ [`TLS_CHUNK_SIZE`] bytes per logical write) while
//! preserving the illusion that the full concatenation was delivered in one
//! piece.

pub(crate) mod tls;

use std::{
    io::{self, IoSlice},
    pin::Pin,
    task::{Context, Poll},
};

use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf},
    net::TcpStream,
};
use tokio_rustls::client::TlsStream;

/// Payloads at or below this size are coalesced into one contiguous buffer
/// instead of going through scatter/gather, to minimize syscalls.
pub(crate) const COALESCE_LIMIT: usize = 4096;

/// Upper bound on a single logical TLS write, slightly below the 16 KiB
/// record ceiling to leave room for record overhead.
pub(crate) const TLS_CHUNK_SIZE: usize = 16_000;

/// A connected stream to the server, plain or TLS.
#[derive(Debug)]
pub(crate) enum Transport {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Transport {
    fn tcp(&self) -> &TcpStream {
        match self {
            Self::Plain(stream) => stream,
            Self::Tls(stream) => stream.get_ref().0,
        }
    }

    /// Hints the kernel to withhold small segments pending further writes.
    ///
    /// Implemented by suspending TCP_NODELAY, the portable cork emulation.
    /// Best effort: failures are ignored.
    pub(crate) fn enable_coalesce(&self) {
        let _ = self.tcp().set_nodelay(false);
    }

    /// Releases withheld segments and restores immediate transmission.
    pub(crate) fn disable_coalesce(&self) {
        let _ = self.tcp().set_nodelay(true);
    }

    /// Sends the whole buffer, then flushes.
    pub(crate) async fn send_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write_all(buf).await?;
        self.flush().await
    }

    /// Sends the buffers as if concatenated, preserving order, then flushes.
    pub(crate) async fn sendv_all(&mut self, bufs: &mut [IoSlice<'_>]) -> io::Result<()> {
        let total: usize = bufs.iter().map(|b| b.len()).sum();

        if total <= COALESCE_LIMIT && matches!(self, Self::Plain(_)) {
            let mut flat = [0u8; COALESCE_LIMIT];
            let mut at = 0;
            for buf in bufs.iter() {
                flat[at..at + buf.len()].copy_from_slice(buf);
                at += buf.len();
            }
            return self.send_all(&flat[..total]).await;
        }

        match self {
            Self::Plain(stream) => {
                let mut bufs = bufs;
                while !bufs.is_empty() {
                    let n = stream.write_vectored(bufs).await?;
                    if n == 0 {
                        return Err(io::ErrorKind::WriteZero.into());
                    }
                    IoSlice::advance_slices(&mut bufs, n);
                }
            }
            Self::Tls(stream) => sendv_chunked(stream.as_mut(), bufs).await?,
        }
        self.flush().await
    }
}

/// Writes the concatenation of `bufs` through chunks of at most
/// [`TLS_CHUNK_SIZE`] bytes. Buffer boundaries are not preserved on the
/// wire; the byte stream is.
pub(crate) async fn sendv_chunked<W>(writer: &mut W, bufs: &[IoSlice<'_>]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut chunk = vec![0u8; TLS_CHUNK_SIZE];
    let mut used = 0;
    for buf in bufs {
        let mut rest: &[u8] = buf;
        while !rest.is_empty() {
            let n = (TLS_CHUNK_SIZE - used).min(rest.len());
            chunk[used..used + n].copy_from_slice(&rest[..n]);
            used += n;
            rest = &rest[n..];
            if used == TLS_CHUNK_SIZE {
                writer.write_all(&chunk).await?;
                used = 0;
            }
        }
    }
    if used > 0 {
        writer.write_all(&chunk[..used]).await?;
    }
    Ok(())
}

impl AsyncRead for Transport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Transport::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Transport::Plain(stream) => Pin::new(stream).poll_write_vectored(cx, bufs),
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_write_vectored(cx, bufs),
        }
    }

    fn is_write_vectored(&self) -> bool {
        match self {
            Transport::Plain(stream) => stream.is_write_vectored(),
            Transport::Tls(stream) => stream.is_write_vectored(),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::{
        io::AsyncReadExt,
        net::{TcpListener, TcpStream},
    };

    use super::*;

    /// Test writer recording every individual write call.
    struct RecordingWriter {
        writes: Vec<Vec<u8>>,
    }

    impl RecordingWriter {
        fn new() -> Self {
            Self { writes: Vec::new() }
        }

        fn concatenated(&self) -> Vec<u8> {
            self.writes.concat()
        }
    }

    impl AsyncWrite for RecordingWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            self.get_mut().writes.push(buf.to_vec());
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn chunked_send_preserves_concatenation() {
        // An iovec of total size 50_000 must reach the peer as the exact
        // concatenation of its buffers.
        let a = vec![0xAAu8; 20_000];
        let b = vec![0xBBu8; 15_000];
        let c = vec![0xCCu8; 15_000];
        let bufs = [IoSlice::new(&a), IoSlice::new(&b), IoSlice::new(&c)];

        let mut writer = RecordingWriter::new();
        sendv_chunked(&mut writer, &bufs).await.unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&a);
        expected.extend_from_slice(&b);
        expected.extend_from_slice(&c);
        assert_eq!(writer.concatenated(), expected);

        // Every logical write stays at or below the record ceiling.
        for write in &writer.writes {
            assert!(write.len() <= TLS_CHUNK_SIZE);
        }
        assert_eq!(
            writer.writes.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![16_000, 16_000, 16_000, 2_000]
        );
    }

    #[tokio::test]
    async fn chunked_send_small_iovec_single_write() {
        let a = b"hello ".to_vec();
        let b = b"world".to_vec();
        let bufs = [IoSlice::new(&a), IoSlice::new(&b)];

        let mut writer = RecordingWriter::new();
        sendv_chunked(&mut writer, &bufs).await.unwrap();

        assert_eq!(writer.writes, vec![b"hello world".to_vec()]);
    }

    async fn tcp_pair() -> (Transport, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (peer, _) = listener.accept().await.unwrap();
        (Transport::Plain(client), peer)
    }

    #[tokio::test]
    async fn sendv_coalesces_small_payloads() {
        let (mut transport, mut peer) = tcp_pair().await;

        let parts: Vec<Vec<u8>> = (0u8..16).map(|i| vec![i; 64]).collect();
        let mut bufs: Vec<IoSlice<'_>> = parts.iter().map(|p| IoSlice::new(p)).collect();
        transport.sendv_all(&mut bufs).await.unwrap();

        let mut received = vec![0u8; 16 * 64];
        peer.read_exact(&mut received).await.unwrap();
        assert_eq!(received, parts.concat());
    }

    #[tokio::test]
    async fn sendv_vectored_large_payloads() {
        let (mut transport, mut peer) = tcp_pair().await;

        let parts: Vec<Vec<u8>> = (0u8..5).map(|i| vec![i; 10_000]).collect();
        let expected = parts.concat();

        let reader = tokio::spawn(async move {
            let mut received = vec![0u8; 50_000];
            peer.read_exact(&mut received).await.unwrap();
            received
        });

        let mut bufs: Vec<IoSlice<'_>> = parts.iter().map(|p| IoSlice::new(p)).collect();
        transport.sendv_all(&mut bufs).await.unwrap();

        assert_eq!(reader.await.unwrap(), expected);
    }

    #[tokio::test]
    async fn coalesce_hint_is_best_effort() {
        let (transport, _peer) = tcp_pair().await;
        transport.enable_coalesce();
        transport.disable_coalesce();
    }
}
