//! Byte transport under a session.
//!
//! Knows nothing about the protocol: it opens a stream, reads an exact number
//! of bytes under the read timeout, writes and flushes, and closes. Any read
//! failure closes the stream so a half-read frame can never be mistaken for
//! the start of the next one.

use crate::error::ClientError;
use log::debug;
use shared::FRAME_SIZE;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Opens the byte stream a [`Transport`] runs over.
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    fn connect(&self, address: &str) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Plain TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, address: &str) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(address).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

pub struct Transport<S> {
    stream: Option<S>,
    read_timeout: Duration,
    /// Bytes pulled off the stream by [`Transport::is_data_available`].
    lookahead: Vec<u8>,
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, read_timeout: Duration) -> Self {
        Self {
            stream: Some(stream),
            read_timeout,
            lookahead: Vec::new(),
        }
    }

    /// Connects through `connector`, giving up after the read timeout.
    pub async fn connect<C>(
        connector: &C,
        address: &str,
        read_timeout: Duration,
    ) -> Result<Self, ClientError>
    where
        C: Connector<Stream = S>,
    {
        match timeout(read_timeout, connector.connect(address)).await {
            Ok(Ok(stream)) => Ok(Self::new(stream, read_timeout)),
            Ok(Err(source)) => Err(ClientError::ConnectFailed {
                address: address.to_string(),
                source,
            }),
            Err(_) => Err(ClientError::ConnectFailed {
                address: address.to_string(),
                source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
            }),
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Waits for exactly `size` bytes.
    pub async fn read_fixed(&mut self, size: usize) -> Result<Vec<u8>, ClientError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(ClientError::ConnectionClosed);
        };

        let mut buffer = vec![0u8; size];
        let buffered = self.lookahead.len().min(size);
        buffer[..buffered].copy_from_slice(&self.lookahead[..buffered]);
        self.lookahead.drain(..buffered);
        if buffered == size {
            return Ok(buffer);
        }

        let result = match timeout(self.read_timeout, stream.read_exact(&mut buffer[buffered..])).await
        {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                Err(ClientError::ConnectionClosed)
            }
            Ok(Err(err)) => Err(ClientError::ReadFailed(err)),
            Err(_) => Err(ClientError::ReadTimedOut(self.read_timeout)),
        };

        if let Err(err) = result {
            debug!("Read failed, closing transport: {}", err);
            self.close().await;
            return Err(err);
        }
        Ok(buffer)
    }

    /// Writes every byte and flushes.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(ClientError::ConnectionClosed);
        };
        stream.write_all(bytes).await.map_err(ClientError::WriteFailed)?;
        stream.flush().await.map_err(ClientError::WriteFailed)
    }

    /// Safe to call any number of times.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(err) = stream.shutdown().await {
                debug!("Shutdown after close failed: {}", err);
            }
        }
        self.lookahead.clear();
    }

    /// Checks without waiting whether bytes are ready to be read.
    ///
    /// Whatever is already available is kept aside and handed out by the next
    /// [`Transport::read_fixed`].
    pub async fn is_data_available(&mut self) -> bool {
        if !self.lookahead.is_empty() {
            return true;
        }
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };

        let mut scratch = [0u8; FRAME_SIZE];
        match timeout(Duration::ZERO, stream.read(&mut scratch)).await {
            Ok(Ok(read)) if read > 0 => {
                self.lookahead.extend_from_slice(&scratch[..read]);
                true
            }
            _ => false,
        }
    }
}
