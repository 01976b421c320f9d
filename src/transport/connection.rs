//! Framed GBXRemote connection.
//!
//! [`Transport`] owns the byte stream: it performs the handshake, writes
//! request frames and de-frames responses and callbacks. It is generic over
//! the stream so tests can drive it with `tokio::io::duplex`.
//!
//! # Example
//!
//! ```ignore
//! use gbxremote_client::transport::{Transport, TransportConfig};
//!
//! let mut transport = Transport::connect("127.0.0.1", 5000, TransportConfig::default()).await?;
//! transport.send_frame(0x8000_0000, &payload).await?;
//! let frame = transport.receive_frame().await?;
//! transport.close().await?;
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{GbxError, Result};
use crate::protocol::{
    build_frame, decode_handshake_text, validate_handshake_len, Frame, FrameBuffer,
    ProtocolVersion, HANDSHAKE_PREFIX_SIZE,
};

/// Size of the scratch buffer for socket reads.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// How V1 response frames, which carry no handle, are treated.
///
/// Read literally, a V1 frame has handle 0 and every V1 response fails the
/// "connection interrupted" check. Whether real V1 servers send a handle is
/// unconfirmed, so both readings are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum V1Handles {
    /// A V1 frame counts as handle 0 and is rejected.
    #[default]
    Strict,
    /// A V1 frame is the reply to the single in-flight request.
    Implicit,
}

/// Transport settings.
#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    /// Upper bound on every socket read. `None` blocks indefinitely.
    pub read_timeout: Option<Duration>,
    /// Treatment of handle-less V1 frames.
    pub v1_handles: V1Handles,
}

/// A connection that has completed the GBXRemote handshake.
pub struct Transport<S> {
    stream: S,
    version: ProtocolVersion,
    config: TransportConfig,
    frames: FrameBuffer,
    ready: VecDeque<Frame>,
    read_buf: Vec<u8>,
}

impl Transport<TcpStream> {
    /// Open a TCP connection and perform the handshake.
    pub async fn connect(host: &str, port: u16, config: TransportConfig) -> Result<Self> {
        tracing::info!(
            "Connecting to dedicated socket TCP at address {}:{}",
            host,
            port
        );
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        Self::handshake(stream, config).await
    }
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Read the server's protocol header and select the protocol version.
    ///
    /// No other I/O happens until a frame is sent.
    pub async fn handshake(mut stream: S, config: TransportConfig) -> Result<Self> {
        let timeout = config.read_timeout;

        let mut prefix = [0u8; HANDSHAKE_PREFIX_SIZE];
        read_exact(&mut stream, &mut prefix, timeout).await?;
        let len = u32::from_le_bytes(prefix);
        validate_handshake_len(len)?;

        let mut text = vec![0u8; len as usize];
        read_exact(&mut stream, &mut text, timeout).await?;
        let text = decode_handshake_text(&text)?;
        tracing::debug!("Handshake header: {}", text);

        let version = ProtocolVersion::from_handshake(text)?;
        tracing::info!("Using GBXRemote protocol version {}", version.number());

        Ok(Self {
            stream,
            version,
            frames: FrameBuffer::new(version),
            config,
            ready: VecDeque::new(),
            read_buf: vec![0u8; READ_CHUNK_SIZE],
        })
    }

    /// Protocol version negotiated during the handshake.
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Settings this transport was opened with.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Write one request frame: length, handle, payload.
    ///
    /// The handle is written regardless of the negotiated version.
    pub async fn send_frame(&mut self, handle: u32, payload: &[u8]) -> Result<()> {
        let bytes = build_frame(handle, payload)?;
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        tracing::trace!("Sent {} bytes", bytes.len());
        Ok(())
    }

    /// Read the next response or callback frame.
    ///
    /// Blocks until a complete frame is available. Any error leaves the
    /// connection unusable.
    pub async fn receive_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return self.check_frame(frame);
            }
            if let Some(err) = self.frames.take_error() {
                return Err(err);
            }

            let n = with_timeout(
                self.config.read_timeout,
                self.stream.read(&mut self.read_buf),
            )
            .await?;
            if n == 0 {
                return Err(GbxError::ConnectionClosed);
            }
            tracing::trace!("Received {} bytes", n);

            let frames = self.frames.push(&self.read_buf[..n])?;
            self.ready.extend(frames);
        }
    }

    fn check_frame(&self, frame: Frame) -> Result<Frame> {
        let handle = match (frame.handle(), self.config.v1_handles) {
            (Some(handle), _) => Some(handle),
            (None, V1Handles::Strict) => Some(0),
            (None, V1Handles::Implicit) => None,
        };
        tracing::trace!(
            "Response vsize:{} vhandle:{:?}",
            frame.header.payload_length,
            handle
        );

        if handle == Some(0) || frame.header.payload_length == 0 {
            return Err(GbxError::Protocol("connection interrupted!".to_string()));
        }
        Ok(frame)
    }

    /// Shut the stream down and release it.
    pub async fn close(mut self) -> Result<()> {
        tracing::debug!("Closing the connection");
        self.stream.shutdown().await?;
        Ok(())
    }
}

async fn read_exact<S: AsyncRead + Unpin>(
    stream: &mut S,
    buf: &mut [u8],
    timeout: Option<Duration>,
) -> Result<()> {
    match with_timeout(timeout, stream.read_exact(buf)).await {
        Ok(_) => Ok(()),
        Err(GbxError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(GbxError::ConnectionClosed)
        }
        Err(e) => Err(e),
    }
}

async fn with_timeout<T>(
    limit: Option<Duration>,
    fut: impl Future<Output = std::io::Result<T>>,
) -> Result<T> {
    match limit {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(GbxError::Timeout(limit)),
        },
        None => Ok(fut.await?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{FrameHeader, MAX_PAYLOAD_SIZE};
    use tokio::io::{duplex, DuplexStream};

    fn handshake_bytes(text: &str) -> Vec<u8> {
        let mut bytes = (text.len() as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(text.as_bytes());
        bytes
    }

    async fn connected(
        version_text: &str,
        config: TransportConfig,
    ) -> (Transport<DuplexStream>, DuplexStream) {
        let (client, mut server) = duplex(8 * 1024 * 1024);
        server.write_all(&handshake_bytes(version_text)).await.unwrap();
        let transport = Transport::handshake(client, config).await.unwrap();
        (transport, server)
    }

    #[tokio::test]
    async fn test_handshake_v2() {
        let (transport, _server) = connected("GBXRemote 2", TransportConfig::default()).await;
        assert_eq!(transport.version(), ProtocolVersion::V2);
    }

    #[tokio::test]
    async fn test_handshake_v1() {
        let (transport, _server) = connected("GBXRemote 1", TransportConfig::default()).await;
        assert_eq!(transport.version(), ProtocolVersion::V1);
    }

    #[tokio::test]
    async fn test_handshake_unsupported_text() {
        let (client, mut server) = duplex(1024);
        server.write_all(&[4, 0, 0, 0]).await.unwrap();
        server.write_all(b"GBX1").await.unwrap();

        let result = Transport::handshake(client, TransportConfig::default()).await;
        let err = result.err().unwrap();
        assert!(err.to_string().contains("unsupported protocol version"));
    }

    #[tokio::test]
    async fn test_handshake_length_out_of_range() {
        let (client, mut server) = duplex(1024);
        server.write_all(&65u32.to_le_bytes()).await.unwrap();

        let err = Transport::handshake(client, TransportConfig::default())
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("wrong lowlevel protocol header"));

        let (client, mut server) = duplex(1024);
        server.write_all(&0u32.to_le_bytes()).await.unwrap();
        assert!(Transport::handshake(client, TransportConfig::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_handshake_peer_closed() {
        let (client, mut server) = duplex(1024);
        server.write_all(&[11, 0]).await.unwrap();
        drop(server);

        let err = Transport::handshake(client, TransportConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, GbxError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let (client, _server) = duplex(1024);
        let config = TransportConfig {
            read_timeout: Some(Duration::from_millis(20)),
            ..Default::default()
        };

        let err = Transport::handshake(client, config).await.err().unwrap();
        assert!(matches!(err, GbxError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_send_frame_layout() {
        let (mut transport, mut server) = connected("GBXRemote 2", TransportConfig::default()).await;

        transport.send_frame(0x8000_0005, b"call").await.unwrap();

        let mut buf = [0u8; 12];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf[0..4], &[4, 0, 0, 0]);
        assert_eq!(&buf[4..8], &[0x05, 0, 0, 0x80]);
        assert_eq!(&buf[8..], b"call");
    }

    #[tokio::test]
    async fn test_send_frame_writes_handle_under_v1() {
        let (mut transport, mut server) = connected("GBXRemote 1", TransportConfig::default()).await;

        transport.send_frame(0x8000_0000, b"x").await.unwrap();

        let mut buf = [0u8; 9];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf[4..8], &0x8000_0000u32.to_le_bytes());
    }

    #[tokio::test]
    async fn test_send_frame_rejects_oversized_request() {
        let (mut transport, _server) = connected("GBXRemote 2", TransportConfig::default()).await;
        let payload = vec![0u8; MAX_PAYLOAD_SIZE as usize + 1];

        let err = transport.send_frame(0x8000_0000, &payload).await.unwrap_err();
        assert!(err.to_string().contains("request too large"));
    }

    #[tokio::test]
    async fn test_receive_frame_split_across_writes() {
        let (mut transport, mut server) = connected("GBXRemote 2", TransportConfig::default()).await;
        let bytes = build_frame(0x8000_0001, b"split payload").unwrap();

        let writer = tokio::spawn(async move {
            for chunk in bytes.chunks(3) {
                server.write_all(chunk).await.unwrap();
                tokio::task::yield_now().await;
            }
            server
        });

        let frame = transport.receive_frame().await.unwrap();
        assert_eq!(frame.handle(), Some(0x8000_0001));
        assert_eq!(frame.payload(), b"split payload");
        let _server = writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_receive_frames_in_order() {
        let (mut transport, mut server) = connected("GBXRemote 2", TransportConfig::default()).await;
        let mut bytes = build_frame(0x0000_0001, b"first").unwrap();
        bytes.extend(build_frame(0x8000_0000, b"second").unwrap());
        server.write_all(&bytes).await.unwrap();

        assert_eq!(transport.receive_frame().await.unwrap().payload(), b"first");
        assert_eq!(transport.receive_frame().await.unwrap().payload(), b"second");
    }

    #[tokio::test]
    async fn test_receive_zero_handle_is_interrupted() {
        let (mut transport, mut server) = connected("GBXRemote 2", TransportConfig::default()).await;
        server.write_all(&build_frame(0, b"data").unwrap()).await.unwrap();

        let err = transport.receive_frame().await.unwrap_err();
        assert!(err.to_string().contains("connection interrupted"));
    }

    #[tokio::test]
    async fn test_receive_zero_length_is_interrupted() {
        let (mut transport, mut server) = connected("GBXRemote 2", TransportConfig::default()).await;
        server.write_all(&FrameHeader::new(0, 0x8000_0000).encode()).await.unwrap();

        let err = transport.receive_frame().await.unwrap_err();
        assert!(err.to_string().contains("connection interrupted"));
    }

    #[tokio::test]
    async fn test_receive_oversized_frame() {
        let (mut transport, mut server) = connected("GBXRemote 2", TransportConfig::default()).await;
        server
            .write_all(&FrameHeader::new(MAX_PAYLOAD_SIZE + 1, 0x8000_0000).encode())
            .await
            .unwrap();

        let err = transport.receive_frame().await.unwrap_err();
        assert!(err.to_string().contains("response too large"));
    }

    #[tokio::test]
    async fn test_frames_ahead_of_oversized_header_delivered_first() {
        let (mut transport, mut server) = connected("GBXRemote 2", TransportConfig::default()).await;
        let mut bytes = build_frame(0x0000_0005, b"callback").unwrap();
        bytes.extend(build_frame(0x8000_0000, b"reply").unwrap());
        bytes.extend(FrameHeader::new(MAX_PAYLOAD_SIZE + 1, 0x8000_0001).encode());
        server.write_all(&bytes).await.unwrap();

        assert_eq!(transport.receive_frame().await.unwrap().handle(), Some(5));
        assert_eq!(transport.receive_frame().await.unwrap().payload(), b"reply");
        let err = transport.receive_frame().await.unwrap_err();
        assert!(err.to_string().contains("response too large (4194305)"));
    }

    #[tokio::test]
    async fn test_receive_peer_closed() {
        let (mut transport, server) = connected("GBXRemote 2", TransportConfig::default()).await;
        drop(server);

        let err = transport.receive_frame().await.unwrap_err();
        assert!(matches!(err, GbxError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_receive_timeout() {
        let config = TransportConfig {
            read_timeout: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let (mut transport, _server) = connected("GBXRemote 2", config).await;

        let err = transport.receive_frame().await.unwrap_err();
        assert!(matches!(err, GbxError::Timeout(d) if d == Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn test_v1_strict_rejects_handleless_frame() {
        let (mut transport, mut server) = connected("GBXRemote 1", TransportConfig::default()).await;
        server.write_all(&[3, 0, 0, 0]).await.unwrap();
        server.write_all(b"abc").await.unwrap();

        let err = transport.receive_frame().await.unwrap_err();
        assert!(err.to_string().contains("connection interrupted"));
    }

    #[tokio::test]
    async fn test_v1_implicit_accepts_handleless_frame() {
        let config = TransportConfig {
            v1_handles: V1Handles::Implicit,
            ..Default::default()
        };
        let (mut transport, mut server) = connected("GBXRemote 1", config).await;
        server.write_all(&[3, 0, 0, 0]).await.unwrap();
        server.write_all(b"abc").await.unwrap();

        let frame = transport.receive_frame().await.unwrap();
        assert_eq!(frame.handle(), None);
        assert_eq!(frame.payload(), b"abc");
    }

    #[tokio::test]
    async fn test_close_shuts_down_stream() {
        let (transport, mut server) = connected("GBXRemote 2", TransportConfig::default()).await;
        transport.close().await.unwrap();

        let mut buf = [0u8; 1];
        assert_eq!(server.read(&mut buf).await.unwrap(), 0);
    }
}
