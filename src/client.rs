//! Client builder and session surface.
//!
//! The [`ClientBuilder`] provides a fluent API for configuring the
//! connection. The [`Client`] is the session:
//! 1. Connect and read the protocol header
//! 2. Issue queries, surfacing callbacks as they arrive
//! 3. Optionally catalog the server's methods
//! 4. Close (or drop) to release the socket
//!
//! # Example
//!
//! ```ignore
//! use gbxremote_client::{Client, codec::{Value, XmlRpcCodec}};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::builder("127.0.0.1", 5000)
//!         .read_timeout(std::time::Duration::from_secs(10))
//!         .connect(XmlRpcCodec)
//!         .await?;
//!
//!     match client.query("GetVersion", &[]).await? {
//!         Ok(version) => println!("{:?}", version),
//!         Err(fault) => eprintln!("{}", fault),
//!     }
//!
//!     let catalog = client.populate_catalog().await?;
//!     for descriptor in catalog.descriptors() {
//!         println!("{} - {}", descriptor, descriptor.help);
//!     }
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::catalog::MethodCatalog;
use crate::codec::{PayloadCodec, Reply, Value};
use crate::dispatch::{CallbackSink, Dispatcher, LogCallbacks};
use crate::error::Result;
use crate::protocol::ProtocolVersion;
use crate::transport::{Transport, TransportConfig, V1Handles};

/// Builder for configuring and opening a GBXRemote session.
pub struct ClientBuilder {
    host: String,
    port: u16,
    config: TransportConfig,
    callbacks: Box<dyn CallbackSink>,
}

impl ClientBuilder {
    /// Create a builder targeting `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            config: TransportConfig::default(),
            callbacks: Box::new(LogCallbacks),
        }
    }

    /// Bound every socket read.
    ///
    /// Default: none (a stalled server blocks the caller).
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = Some(timeout);
        self
    }

    /// Choose how handle-less V1 frames are treated.
    ///
    /// Default: [`V1Handles::Strict`]
    pub fn v1_handles(mut self, mode: V1Handles) -> Self {
        self.config.v1_handles = mode;
        self
    }

    /// Route callbacks to `sink` instead of the log.
    pub fn callback_sink(mut self, sink: impl CallbackSink + 'static) -> Self {
        self.callbacks = Box::new(sink);
        self
    }

    /// Connect over TCP and perform the handshake.
    pub async fn connect<C: PayloadCodec>(self, codec: C) -> Result<Client<C>> {
        let transport = Transport::connect(&self.host, self.port, self.config).await?;
        Ok(Client::from_parts(transport, codec, self.callbacks))
    }

    /// Perform the handshake over an already-open stream.
    ///
    /// Host and port are ignored.
    pub async fn handshake<S, C>(self, stream: S, codec: C) -> Result<Client<C, S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        C: PayloadCodec,
    {
        let transport = Transport::handshake(stream, self.config).await?;
        Ok(Client::from_parts(transport, codec, self.callbacks))
    }
}

/// A connected GBXRemote session.
///
/// Dropping the client releases the socket; [`Client::close`] also shuts
/// the write side down cleanly.
pub struct Client<C, S = TcpStream> {
    dispatcher: Dispatcher<S, C>,
    catalog: Option<MethodCatalog>,
}

impl Client<()> {
    /// Create a new client builder.
    pub fn builder(host: impl Into<String>, port: u16) -> ClientBuilder {
        ClientBuilder::new(host, port)
    }
}

impl<C, S> Client<C, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
    C: PayloadCodec,
{
    fn from_parts(transport: Transport<S>, codec: C, callbacks: Box<dyn CallbackSink>) -> Self {
        Self {
            dispatcher: Dispatcher::new(transport, codec).with_boxed_callback_sink(callbacks),
            catalog: None,
        }
    }

    /// Protocol version negotiated during the handshake.
    pub fn version(&self) -> ProtocolVersion {
        self.dispatcher.version()
    }

    /// Call `method` and wait for its reply.
    ///
    /// A server fault is `Ok(Err(fault))`; any `Err` means the session
    /// is unusable and the caller must reconnect.
    pub async fn query(&mut self, method: &str, params: &[Value]) -> Result<Reply> {
        self.dispatcher.query(method, params).await
    }

    /// Build the method catalog, once per session.
    pub async fn populate_catalog(&mut self) -> Result<&MethodCatalog> {
        if self.catalog.is_none() {
            let catalog = MethodCatalog::populate(&mut self.dispatcher).await?;
            tracing::info!("Cataloged {} methods", catalog.len());
            self.catalog = Some(catalog);
        }
        Ok(&*self.catalog.get_or_insert_with(MethodCatalog::default))
    }

    /// Catalog built by [`Client::populate_catalog`], if any.
    pub fn catalog(&self) -> Option<&MethodCatalog> {
        self.catalog.as_ref()
    }

    /// Borrow the dispatcher for lower-level access.
    pub fn dispatcher(&mut self) -> &mut Dispatcher<S, C> {
        &mut self.dispatcher
    }

    /// Close the session and release the socket.
    pub async fn close(self) -> Result<()> {
        self.dispatcher.close().await
    }
}
