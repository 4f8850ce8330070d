//! Endpoint builder and runtime loop.
//!
//! An [`Endpoint`] is one side of a bridge over a bidirectional message
//! channel. Both sides are symmetric: each exposes local objects, calls
//! methods on the peer's objects through proxies, and answers the peer's
//! commands.
//!
//! The [`EndpointBuilder`] provides a fluent API for configuring the
//! resolver, custom commands and buffer sizes. Spawning an endpoint:
//! 1. Register the built-in and custom commands
//! 2. Spawn the writer task on the write half
//! 3. Spawn the read loop on the read half
//!
//! The read loop decodes one message per line. Replies settle the most
//! recent pending call; any other known command is handled in its own task
//! so that a handler waiting on a callback to the peer never stalls the
//! loop. Unknown commands are dropped without a reply.
//!
//! # Example
//!
//! ```ignore
//! use objwire::{Endpoint, Namespace, Value};
//!
//! #[tokio::main]
//! async fn main() -> objwire::Result<()> {
//!     let (reader, writer) = tokio::io::split(stream);
//!     let endpoint = Endpoint::builder()
//!         .namespace(Namespace::new().with_global("greeting", "hi"))
//!         .spawn(reader, writer)?;
//!
//!     let text = endpoint.global("greeting").await?;
//!     let upper = endpoint.call(&text, "toUpperCase", vec![]).await?;
//!     assert_eq!(upper, Value::from("HI"));
//!
//!     endpoint.wait_for_shutdown().await
//! }
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};

use bytes::Bytes;
use serde_json::Value as JsonValue;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{oneshot, Mutex, Notify};
use tokio::task::JoinHandle;

use crate::codec::{truncate_for_log, Codec, JsonCodec};
use crate::correlation::{CallStack, PendingReply};
use crate::dispatch::{Command, CommandContext, CommandTable, FnCommand, Namespace, Resolver};
use crate::error::{BridgeError, Result};
use crate::protocol::{commands, LineBuffer, WireMessage, DEFAULT_MAX_LINE_LENGTH};
use crate::proxy::{Caller, RemoteProxy};
use crate::registry::{InstanceId, ObjectRegistry};
use crate::value::{BoxFuture, Value};
use crate::writer::{spawn_writer_task, WriterConfig, WriterHandle, DEFAULT_CHANNEL_CAPACITY};

/// Default size of the buffer used for each socket read.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Tunables for one endpoint.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Longest accepted incoming line, terminator excluded.
    pub max_line_length: usize,
    /// Capacity of the outgoing line queue.
    pub channel_capacity: usize,
    /// Size of the buffer used for each read.
    pub read_buffer_size: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

/// Builder for configuring and spawning an endpoint.
pub struct EndpointBuilder {
    instance: Option<InstanceId>,
    resolver: Arc<dyn Resolver>,
    commands: Vec<(String, Arc<dyn Command>)>,
    config: EndpointConfig,
}

impl EndpointBuilder {
    /// Create a new builder with an empty namespace.
    pub fn new() -> Self {
        Self {
            instance: None,
            resolver: Arc::new(Namespace::new()),
            commands: Vec::new(),
            config: EndpointConfig::default(),
        }
    }

    /// Use a fixed instance identifier instead of a generated one.
    ///
    /// The identifier must differ from the peer's.
    pub fn instance(mut self, instance: InstanceId) -> Self {
        self.instance = Some(instance);
        self
    }

    /// Resolve `global` and `import` through `resolver`.
    pub fn resolver<R: Resolver>(mut self, resolver: R) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Resolve `global` and `import` from a map-backed namespace.
    pub fn namespace(self, namespace: Namespace) -> Self {
        self.resolver(namespace)
    }

    /// Register a custom command handled by an async closure.
    ///
    /// `return` and `error` are reserved; using them makes
    /// [`spawn`](Self::spawn) fail.
    pub fn command<F, Fut>(self, name: &str, handler: F) -> Self
    where
        F: Fn(CommandContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.command_handler(name, FnCommand::new(handler))
    }

    /// Register a custom command implemented as a [`Command`].
    pub fn command_handler<C: Command>(mut self, name: &str, command: C) -> Self {
        self.commands.push((name.to_string(), Arc::new(command)));
        self
    }

    /// Set the maximum incoming line length.
    ///
    /// Default: 16 MiB
    pub fn max_line_length(mut self, limit: usize) -> Self {
        self.config.max_line_length = limit;
        self
    }

    /// Set the outgoing queue capacity.
    ///
    /// Default: 1024
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Set the read buffer size.
    ///
    /// Default: 64 KiB
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: EndpointConfig) -> Self {
        self.config = config;
        self
    }

    /// Start the endpoint over a reader/writer pair.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// `ReservedCommand` if a custom command uses a reserved name.
    pub fn spawn<R, W>(self, reader: R, writer: W) -> Result<Endpoint>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Endpoint::start(self, reader, writer)
    }
}

impl Default for EndpointBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running endpoint.
///
/// Dropping the handle does not stop the connection; the read loop keeps
/// serving the peer until it disconnects or [`close`](Self::close) is
/// called.
pub struct Endpoint {
    inner: Arc<Inner>,
    /// Asks the read loop to stop.
    closing: Arc<Notify>,
    /// Outcome of the read loop.
    shutdown_rx: oneshot::Receiver<Result<()>>,
    /// Writer task handle.
    _writer_task: JoinHandle<Result<()>>,
}

impl Endpoint {
    /// Create a new endpoint builder.
    pub fn builder() -> EndpointBuilder {
        EndpointBuilder::new()
    }

    /// Start an endpoint with default settings.
    ///
    /// # Errors
    ///
    /// See [`EndpointBuilder::spawn`].
    pub fn spawn<R, W>(reader: R, writer: W) -> Result<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        EndpointBuilder::new().spawn(reader, writer)
    }

    fn start<R, W>(builder: EndpointBuilder, reader: R, writer: W) -> Result<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let EndpointBuilder {
            instance,
            resolver,
            commands,
            config,
        } = builder;

        let mut table = CommandTable::with_builtins();
        for (name, command) in commands {
            table.register(&name, command)?;
        }

        let instance = instance.unwrap_or_else(InstanceId::generate);
        let (writer, writer_task) = spawn_writer_task(
            writer,
            WriterConfig {
                channel_capacity: config.channel_capacity,
            },
        );

        let registry = Arc::new(StdMutex::new(ObjectRegistry::new()));
        let inner = Arc::new_cyclic(|me: &Weak<Inner>| {
            let link: Weak<dyn Caller> = me.clone();
            Inner {
                codec: Arc::new(Codec::new(instance, registry, link)),
                calls: Mutex::new(CallStack::new()),
                writer: StdMutex::new(Some(writer)),
                commands: table,
                resolver,
            }
        });

        let closing = Arc::new(Notify::new());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let loop_inner = Arc::clone(&inner);
        let loop_closing = Arc::clone(&closing);

        tokio::spawn(async move {
            let result = loop_inner.read_loop(reader, &config, &loop_closing).await;
            match &result {
                Ok(()) => tracing::debug!("endpoint {} disconnected", loop_inner.codec.instance()),
                Err(e) => tracing::error!("Read loop error: {}", e),
            }
            loop_inner.shut_down().await;
            let _ = shutdown_tx.send(result);
        });

        tracing::debug!("endpoint {} started", inner.codec.instance());
        Ok(Endpoint {
            inner,
            closing,
            shutdown_rx,
            _writer_task: writer_task,
        })
    }

    /// Get this endpoint's instance identifier.
    pub fn instance(&self) -> &InstanceId {
        self.inner.codec.instance()
    }

    /// Get the codec, and through it the object registry.
    pub fn codec(&self) -> &Codec {
        &self.inner.codec
    }

    /// Invoke `method` on `target` at the peer.
    ///
    /// `target` is usually a proxy obtained from an earlier reply.
    pub async fn call(&self, target: &Value, method: &str, args: Vec<Value>) -> Result<Value> {
        let mut call_args = Vec::with_capacity(args.len() + 2);
        call_args.push(target.clone());
        call_args.push(Value::from(method));
        call_args.extend(args);
        self.inner.request(commands::CALL, call_args).await
    }

    /// Read a global name from the peer's namespace.
    pub async fn global(&self, name: &str) -> Result<Value> {
        self.inner.request(commands::GLOBAL, vec![Value::from(name)]).await
    }

    /// Load a module on the peer.
    pub async fn import(&self, name: &str) -> Result<Value> {
        self.inner.request(commands::IMPORT, vec![Value::from(name)]).await
    }

    /// Ask the peer to drop its registry entry for `target`.
    ///
    /// Later calls through any copy of the handle fail with the peer's
    /// not-found error.
    pub async fn delete(&self, target: &Value) -> Result<()> {
        self.inner
            .request(commands::DELETE, vec![target.clone()])
            .await
            .map(drop)
    }

    /// Send an arbitrary command and wait for its reply.
    ///
    /// # Errors
    ///
    /// `ReservedCommand` for `return` and `error`, otherwise whatever the
    /// peer replies.
    pub async fn request(&self, command: &str, args: Vec<Value>) -> Result<Value> {
        self.inner.request(command, args).await
    }

    /// Send a command and get the pending reply without waiting for it.
    ///
    /// Replies are matched in LIFO order: the future returned here is
    /// settled by the first reply that arrives while it is the most recent
    /// open call.
    pub async fn begin_call(&self, command: &str, args: Vec<Value>) -> Result<PendingReply> {
        self.inner.begin_call(command, &args).await
    }

    /// Number of outgoing calls awaiting a reply.
    pub async fn pending_calls(&self) -> usize {
        self.inner.calls.lock().await.len()
    }

    /// Check whether the connection has shut down.
    pub fn is_closed(&self) -> bool {
        self.inner.writer_slot().is_none()
    }

    /// Stop the read loop.
    ///
    /// Pending calls fail with `ConnectionClosed` and the write half is shut
    /// down once queued lines are flushed.
    pub fn close(&self) {
        self.closing.notify_one();
    }

    /// Wait until the read loop ends (peer disconnect, [`close`](Self::close)
    /// or a fatal protocol error).
    ///
    /// # Errors
    ///
    /// The error that ended the read loop, if any.
    pub async fn wait_for_shutdown(self) -> Result<()> {
        self.shutdown_rx.await.unwrap_or(Ok(()))
    }
}

/// State shared by the endpoint handle, the read loop, handler tasks and
/// (weakly) every proxy thawed by this endpoint.
struct Inner {
    codec: Arc<Codec>,
    calls: Mutex<CallStack>,
    /// Taken on shutdown so the writer task can finish.
    writer: StdMutex<Option<WriterHandle>>,
    commands: CommandTable,
    resolver: Arc<dyn Resolver>,
}

impl Inner {
    fn writer_slot(&self) -> std::sync::MutexGuard<'_, Option<WriterHandle>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn writer(&self) -> Result<WriterHandle> {
        self.writer_slot().clone().ok_or(BridgeError::ConnectionClosed)
    }

    /// Main read loop - reads lines and dispatches them.
    async fn read_loop<R: AsyncRead + Unpin>(
        self: &Arc<Self>,
        mut reader: R,
        config: &EndpointConfig,
        closing: &Notify,
    ) -> Result<()> {
        let mut lines = LineBuffer::with_max_line_length(config.max_line_length);
        let mut buf = vec![0u8; config.read_buffer_size.max(1)];

        loop {
            let n = tokio::select! {
                read = reader.read(&mut buf) => read?,
                _ = closing.notified() => {
                    tracing::debug!("endpoint {} closing", self.codec.instance());
                    return Ok(());
                }
            };

            if n == 0 {
                if !lines.is_empty() {
                    tracing::debug!("discarding {} bytes of unterminated input", lines.len());
                }
                return Ok(());
            }

            for line in lines.push(&buf[..n])? {
                self.dispatch_line(line).await?;
            }
        }
    }

    /// Handle one incoming line.
    ///
    /// Errors returned here are fatal to the connection.
    async fn dispatch_line(self: &Arc<Self>, line: Bytes) -> Result<()> {
        tracing::trace!("<- {}", truncate_for_log(&line));
        let message = JsonCodec::decode(&line)?;

        if message.is_reply() {
            let (kind, payload) = message.into_reply_payload();
            let outcome = if kind == commands::RETURN {
                self.codec.thaw(payload)
            } else {
                Err(BridgeError::Remote(error_reason(payload)))
            };
            return self.calls.lock().await.complete(&kind, outcome);
        }

        let Some(command) = self.commands.get(&message.command) else {
            tracing::debug!("ignoring unknown command '{}'", message.command);
            return Ok(());
        };

        // Thaw in arrival order, before a later `delete` can retire a handle.
        let args = message
            .args
            .into_iter()
            .map(|arg| self.codec.thaw(arg))
            .collect::<Result<Vec<_>>>();
        let ctx = CommandContext::new(message.command, Arc::clone(&self.codec), Arc::clone(&self.resolver));
        let inner = Arc::clone(self);

        tokio::spawn(async move {
            let outcome = match args {
                Ok(args) => command.execute(ctx.clone(), args).await,
                Err(e) => Err(e),
            };
            inner.reply(ctx.command(), outcome).await;
        });

        Ok(())
    }

    /// Send the `return` or `error` reply for a handled command.
    async fn reply(&self, command: &str, outcome: Result<Value>) {
        let message = match outcome.and_then(|value| self.codec.freeze(&value)) {
            Ok(frozen) => WireMessage::new(commands::RETURN, vec![frozen]),
            Err(err) => {
                tracing::debug!("'{}' failed: {}", command, err);
                WireMessage::new(commands::ERROR, vec![JsonValue::String(err.reply_text())])
            }
        };

        if let Err(e) = self.send(&message).await {
            tracing::debug!("reply to '{}' dropped: {}", command, e);
        }
    }

    async fn send(&self, message: &WireMessage) -> Result<()> {
        let line = JsonCodec::encode(message)?;
        tracing::trace!("-> {}", truncate_for_log(&line));
        self.writer()?.send(Bytes::from(line)).await
    }

    /// Push a pending call and send its message.
    ///
    /// The call stack stays locked until the line is queued, so the stack
    /// order of concurrent callers matches their order on the wire. Queue
    /// space is reserved before the push: a caller dropped while waiting for
    /// space leaves neither a record nor a line behind.
    async fn begin_call(&self, command: &str, args: &[Value]) -> Result<PendingReply> {
        if commands::is_reserved(command) {
            return Err(BridgeError::ReservedCommand(command.to_string()));
        }

        let frozen = args
            .iter()
            .map(|arg| self.codec.freeze(arg))
            .collect::<Result<Vec<_>>>()?;
        let line = JsonCodec::encode(&WireMessage::new(command, frozen))?;

        let mut calls = self.calls.lock().await;
        if calls.is_closed() {
            return Err(BridgeError::ConnectionClosed);
        }
        let writer = self.writer()?;
        let permit = writer.reserve().await?;

        let reply = calls.push(command);
        tracing::trace!("-> {}", truncate_for_log(&line));
        permit.send(Bytes::from(line));

        Ok(reply)
    }

    async fn request(&self, command: &str, args: Vec<Value>) -> Result<Value> {
        self.begin_call(command, &args).await?.await
    }

    /// Fail pending calls and release the writer.
    async fn shut_down(&self) {
        let mut calls = self.calls.lock().await;
        calls.close();
        self.writer_slot().take();
    }
}

impl Caller for Inner {
    fn forward(
        self: Arc<Self>,
        target: RemoteProxy,
        method: String,
        args: Vec<Value>,
    ) -> BoxFuture<'static, Result<Value>> {
        Box::pin(async move {
            let mut call_args = Vec::with_capacity(args.len() + 2);
            call_args.push(Value::from(target));
            call_args.push(Value::from(method));
            call_args.extend(args);
            self.request(commands::CALL, call_args).await
        })
    }
}

/// Text of an `error` payload. Peers send a string; anything else is kept
/// as its JSON text.
fn error_reason(payload: JsonValue) -> String {
    match payload {
        JsonValue::String(reason) => reason,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, split, AsyncBufReadExt, AsyncWriteExt, BufReader};

    /// Endpoint wired to a raw peer that the test drives line by line.
    fn endpoint_with_raw_peer(
        builder: EndpointBuilder,
    ) -> (
        Endpoint,
        tokio::io::Lines<BufReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>>,
        tokio::io::WriteHalf<tokio::io::DuplexStream>,
    ) {
        let (local, remote) = duplex(64 * 1024);
        let (reader, writer) = split(local);
        let endpoint = builder.spawn(reader, writer).unwrap();

        let (peer_reader, peer_writer) = split(remote);
        (endpoint, BufReader::new(peer_reader).lines(), peer_writer)
    }

    #[test]
    fn test_config_default() {
        let config = EndpointConfig::default();
        assert_eq!(config.max_line_length, DEFAULT_MAX_LINE_LENGTH);
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
    }

    #[test]
    fn test_builder_configuration() {
        let builder = Endpoint::builder()
            .max_line_length(1024)
            .channel_capacity(8)
            .read_buffer_size(256)
            .instance(InstanceId::new("RS-fixed"));

        assert_eq!(builder.config.max_line_length, 1024);
        assert_eq!(builder.config.channel_capacity, 8);
        assert_eq!(builder.config.read_buffer_size, 256);
        assert_eq!(builder.instance, Some(InstanceId::new("RS-fixed")));
    }

    #[tokio::test]
    async fn test_reserved_command_rejected_at_spawn() {
        let (local, _remote) = duplex(1024);
        let (reader, writer) = split(local);

        let result = Endpoint::builder()
            .command("error", |_ctx, _args| async { Ok(Value::Null) })
            .spawn(reader, writer);
        assert!(matches!(result, Err(BridgeError::ReservedCommand(_))));
    }

    #[tokio::test]
    async fn test_request_reserved_name() {
        let (endpoint, _lines, _writer) = endpoint_with_raw_peer(Endpoint::builder());
        let err = endpoint.request("return", vec![]).await.unwrap_err();
        assert!(matches!(err, BridgeError::ReservedCommand(_)));
        assert_eq!(endpoint.pending_calls().await, 0);
    }

    #[tokio::test]
    async fn test_outgoing_global_wire_format() {
        let (endpoint, mut lines, mut peer) = endpoint_with_raw_peer(Endpoint::builder());

        let pending = endpoint.begin_call("global", vec![Value::from("x")]).await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), r#"["global","x"]"#);
        assert_eq!(endpoint.pending_calls().await, 1);

        peer.write_all(b"[\"return\",5]\n").await.unwrap();
        assert_eq!(pending.await.unwrap(), Value::from(5));
        assert_eq!(endpoint.pending_calls().await, 0);
    }

    #[tokio::test]
    async fn test_incoming_global_is_answered() {
        let builder = Endpoint::builder()
            .instance(InstanceId::new("RS-a"))
            .namespace(Namespace::new().with_global("greeting", "hi"));
        let (_endpoint, mut lines, mut peer) = endpoint_with_raw_peer(builder);

        peer.write_all(b"[\"global\",\"greeting\"]\n").await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), r#"["return","hi"]"#);

        peer.write_all(b"[\"global\",\"nope\"]\n").await.unwrap();
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            r#"["error","Unknown global: 'nope'"]"#
        );
    }

    #[tokio::test]
    async fn test_unknown_command_gets_no_reply() {
        let builder = Endpoint::builder().namespace(Namespace::new().with_global("n", 1));
        let (_endpoint, mut lines, mut peer) = endpoint_with_raw_peer(builder);

        peer.write_all(b"[\"frobnicate\",1,2]\n[\"global\",\"n\"]\n").await.unwrap();

        // The first reply on the wire answers the second message.
        assert_eq!(lines.next_line().await.unwrap().unwrap(), r#"["return",1]"#);
    }

    #[tokio::test]
    async fn test_stray_reply_is_fatal() {
        let (endpoint, _lines, mut peer) = endpoint_with_raw_peer(Endpoint::builder());

        peer.write_all(b"[\"return\",null]\n").await.unwrap();

        let err = endpoint.wait_for_shutdown().await.unwrap_err();
        assert!(matches!(err, BridgeError::ProtocolDesync(_)));
    }

    #[tokio::test]
    async fn test_malformed_line_is_fatal() {
        let (endpoint, _lines, mut peer) = endpoint_with_raw_peer(Endpoint::builder());

        peer.write_all(b"{\"not\":\"an array\"}\n").await.unwrap();
        assert!(matches!(
            endpoint.wait_for_shutdown().await,
            Err(BridgeError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_non_string_error_payload() {
        let (endpoint, mut lines, mut peer) = endpoint_with_raw_peer(Endpoint::builder());

        let pending = endpoint.begin_call("import", vec![Value::from("m")]).await.unwrap();
        lines.next_line().await.unwrap();
        peer.write_all(b"[\"error\",{\"code\":3}]\n").await.unwrap();

        let err = pending.await.unwrap_err();
        assert_eq!(err.to_string(), r#"{"code":3}"#);
    }

    #[tokio::test]
    async fn test_unfreezable_result_becomes_error_reply() {
        let mut map = std::collections::BTreeMap::new();
        map.insert("_remote_proxy".to_string(), Value::from(1));
        let builder = Endpoint::builder().namespace(Namespace::new().with_global("m", Value::Map(map)));
        let (endpoint, mut lines, mut peer) = endpoint_with_raw_peer(builder);

        peer.write_all(b"[\"global\",\"m\"]\n").await.unwrap();
        let line = lines.next_line().await.unwrap().unwrap();
        assert!(line.starts_with(r#"["error","Invalid argument"#), "{}", line);

        let mut args = std::collections::BTreeMap::new();
        args.insert("_remote_proxy".to_string(), Value::Null);
        let err = endpoint.begin_call("keep", vec![Value::Map(args)]).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument(_)));
        assert_eq!(endpoint.pending_calls().await, 0);
    }

    #[tokio::test]
    async fn test_cancelled_call_leaves_no_record() {
        // A tiny pipe nobody reads keeps the writer stuck on the first line.
        let (local, remote) = duplex(8);
        let (reader, writer) = split(local);
        let endpoint = Endpoint::builder().channel_capacity(1).spawn(reader, writer).unwrap();

        let first = endpoint.begin_call("global", vec![Value::from("one")]).await.unwrap();
        let second = endpoint.begin_call("global", vec![Value::from("two")]).await.unwrap();

        let third = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            endpoint.begin_call("global", vec![Value::from("three")]),
        )
        .await;
        assert!(third.is_err());
        assert_eq!(endpoint.pending_calls().await, 2);

        let (peer_reader, mut peer) = split(remote);
        let mut lines = BufReader::new(peer_reader).lines();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), r#"["global","one"]"#);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), r#"["global","two"]"#);

        peer.write_all(b"[\"return\",\"reply-two\"]\n[\"return\",\"reply-one\"]\n")
            .await
            .unwrap();
        assert_eq!(second.await.unwrap(), Value::from("reply-two"));
        assert_eq!(first.await.unwrap(), Value::from("reply-one"));
    }

    #[tokio::test]
    async fn test_disconnect_fails_pending_calls() {
        let (endpoint, lines, peer) = endpoint_with_raw_peer(Endpoint::builder());

        let pending = endpoint.begin_call("import", vec![Value::from("m")]).await.unwrap();
        drop(lines);
        drop(peer);

        assert!(matches!(pending.await, Err(BridgeError::ConnectionClosed)));
        let err = endpoint.global("x").await.unwrap_err();
        assert!(matches!(err, BridgeError::ConnectionClosed));
        assert!(endpoint.is_closed());
    }

    #[tokio::test]
    async fn test_close_stops_read_loop() {
        let (endpoint, mut lines, _peer) = endpoint_with_raw_peer(Endpoint::builder());

        endpoint.close();
        assert!(endpoint.wait_for_shutdown().await.is_ok());

        // Write half is shut down once the endpoint state is released.
        assert!(lines.next_line().await.unwrap().is_none());
    }
}
