//! Request/response correlation and callback surfacing.
//!
//! The [`Dispatcher`] issues a fresh handle per request, writes the encoded
//! call, and reads frames until the one carrying that handle arrives.
//! Frames whose handle has the high bit clear are server callbacks: they go
//! to the registered [`CallbackSink`] in arrival order and never satisfy a
//! pending query.
//!
//! `query` takes `&mut self`, so one request is in flight at a time.
//! Callers that need concurrent RPCs open several connections.

use std::fmt;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::codec::{PayloadCodec, Reply, Value};
use crate::error::Result;
use crate::protocol::{is_callback_handle, Frame, HandleGenerator, ProtocolVersion};
use crate::transport::Transport;

/// A server-initiated notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callback {
    /// Handle from the wire (high bit clear).
    pub handle: u32,
    /// Method name, when the dispatcher's codec could decode the payload.
    pub method: Option<String>,
    /// Raw callback payload.
    pub payload: Bytes,
}

impl fmt::Display for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.method {
            Some(method) => write!(f, "{} (handle {:#x})", method, self.handle),
            None => write!(
                f,
                "<{} bytes> (handle {:#x})",
                self.payload.len(),
                self.handle
            ),
        }
    }
}

impl Callback {
    /// Decode the payload as a method call.
    pub fn decode<C: PayloadCodec + ?Sized>(&self, codec: &C) -> Result<(String, Vec<Value>)> {
        codec.decode_call(&self.payload)
    }
}

/// Receiver for callback frames.
pub trait CallbackSink: Send {
    /// Called once per callback frame, in arrival order.
    fn on_callback(&mut self, callback: Callback);
}

/// Default sink: logs each callback's method name at info level, or its
/// payload length when the name could not be decoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCallbacks;

impl CallbackSink for LogCallbacks {
    fn on_callback(&mut self, callback: Callback) {
        tracing::info!("Received callback: {}", callback);
    }
}

impl<F> CallbackSink for F
where
    F: FnMut(Callback) + Send,
{
    fn on_callback(&mut self, callback: Callback) {
        self(callback)
    }
}

/// Sink that forwards callbacks into a channel, for async consumers.
#[derive(Debug, Clone)]
pub struct ChannelCallbacks {
    tx: mpsc::UnboundedSender<Callback>,
}

impl ChannelCallbacks {
    /// Create a sink and the receiver that drains it.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Callback>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl CallbackSink for ChannelCallbacks {
    fn on_callback(&mut self, callback: Callback) {
        if self.tx.send(callback).is_err() {
            tracing::debug!("Callback receiver dropped, discarding callback");
        }
    }
}

/// Sends requests over a [`Transport`] and matches replies by handle.
pub struct Dispatcher<S, C> {
    transport: Transport<S>,
    codec: C,
    handles: HandleGenerator,
    callbacks: Box<dyn CallbackSink>,
}

impl<S, C> Dispatcher<S, C>
where
    S: AsyncRead + AsyncWrite + Unpin,
    C: PayloadCodec,
{
    /// Create a dispatcher that logs callbacks.
    pub fn new(transport: Transport<S>, codec: C) -> Self {
        Self {
            transport,
            codec,
            handles: HandleGenerator::new(),
            callbacks: Box::new(LogCallbacks),
        }
    }

    /// Replace the callback sink.
    pub fn with_callback_sink(self, sink: impl CallbackSink + 'static) -> Self {
        self.with_boxed_callback_sink(Box::new(sink))
    }

    pub(crate) fn with_boxed_callback_sink(mut self, sink: Box<dyn CallbackSink>) -> Self {
        self.callbacks = sink;
        self
    }

    /// Replace the handle sequence.
    pub fn with_handles(mut self, handles: HandleGenerator) -> Self {
        self.handles = handles;
        self
    }

    /// Allocate the next request handle. No I/O.
    pub fn next_handle(&mut self) -> u32 {
        self.handles.next_handle()
    }

    /// Protocol version of the underlying connection.
    pub fn version(&self) -> ProtocolVersion {
        self.transport.version()
    }

    /// Payload codec in use.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Call `method` and wait for its reply.
    ///
    /// A server fault comes back as `Ok(Err(fault))`. The outer error is
    /// reserved for transport and codec failures, after which the
    /// connection should be dropped.
    pub async fn query(&mut self, method: &str, params: &[Value]) -> Result<Reply> {
        let handle = self.next_handle();
        let payload = self.codec.encode_call(method, params)?;
        self.transport.send_frame(handle, &payload).await?;

        tracing::trace!("Looking for response with handle: {:#x}", handle);
        let frame = self.wait_for_reply(handle).await?;

        let reply = self.codec.decode_reply(frame.payload())?;
        if let Err(fault) = &reply {
            tracing::debug!("{} returned {}", method, fault);
        }
        Ok(reply)
    }

    async fn wait_for_reply(&mut self, handle: u32) -> Result<Frame> {
        loop {
            let frame = self.transport.receive_frame().await?;
            match frame.handle() {
                // V1 with implicit handles: whatever arrives answers the request
                None => return Ok(frame),
                Some(h) if is_callback_handle(h) => {
                    let callback = self.callback(h, frame.payload);
                    self.callbacks.on_callback(callback);
                }
                Some(h) if h == handle => return Ok(frame),
                Some(h) => {
                    tracing::warn!(
                        "Discarding reply for handle {:#x} while waiting for {:#x}",
                        h,
                        handle
                    );
                }
            }
        }
    }

    fn callback(&self, handle: u32, payload: Bytes) -> Callback {
        let method = match self.codec.decode_call(&payload) {
            Ok((method, _)) => Some(method),
            Err(e) => {
                tracing::debug!("Undecodable callback {:#x}: {}", handle, e);
                None
            }
        };
        Callback {
            handle,
            method,
            payload,
        }
    }

    /// Close the connection.
    pub async fn close(self) -> Result<()> {
        self.transport.close().await
    }
}
