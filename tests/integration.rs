//! Integration tests for objwire.
//!
//! Two endpoints talk over an in-memory duplex pipe, or one endpoint talks
//! to a raw peer that writes and reads lines directly.

use std::sync::{Arc, Mutex};

use objwire::{
    BoxFuture, BridgeError, Endpoint, EndpointBuilder, Handle, InstanceId, Invocation, Namespace, ObjectRef,
    RemoteObject, RemoteProxy, Result, Value,
};
use tokio::io::{
    duplex, split, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
};

// ============================================================================
// Test objects
// ============================================================================

/// Module exposing constructors for the other test objects.
struct Objects;

impl RemoteObject for Objects {
    fn type_name(&self) -> &str {
        "objects"
    }

    fn invoke(self: Arc<Self>, call: Invocation) -> BoxFuture<'static, Result<Value>> {
        Box::pin(async move {
            let arg = call.str_arg(0)?.to_string();
            match call.method() {
                "Concat" => Ok(Value::object(Concat::new(arg))),
                "Source" => Ok(Value::object(Source(arg))),
                "BadSource" => Ok(Value::object(BadSource(arg))),
                _ => Err(call.no_such_method("objects")),
            }
        })
    }
}

/// Concatenates its own string, an optional source's string and an argument.
struct Concat {
    own: String,
    source: Mutex<Option<Value>>,
}

impl Concat {
    fn new(own: String) -> Self {
        Self {
            own,
            source: Mutex::new(None),
        }
    }
}

impl RemoteObject for Concat {
    fn type_name(&self) -> &str {
        "Concat"
    }

    fn invoke(self: Arc<Self>, call: Invocation) -> BoxFuture<'static, Result<Value>> {
        Box::pin(async move {
            match call.method() {
                "set_source" => {
                    *self.source.lock().unwrap() = Some(call.arg(0)?.clone());
                    Ok(Value::Null)
                }
                "concat" => {
                    let other = call.str_arg(0)?.to_string();
                    let source = self.source.lock().unwrap().clone();
                    let source_str = match source {
                        Some(source) => match source.invoke("get_string", vec![]).await {
                            Ok(value) => value.as_str().unwrap_or_default().to_string(),
                            Err(e) => format!("[{}]", e.reply_text()),
                        },
                        None => String::new(),
                    };
                    Ok(Value::from(format!("{}{}{}", self.own, source_str, other)))
                }
                "breakdown" => Err(BridgeError::failed(call.str_arg(0)?)),
                _ => Err(call.no_such_method("Concat")),
            }
        })
    }
}

/// Provides a string.
struct Source(String);

impl RemoteObject for Source {
    fn type_name(&self) -> &str {
        "Source"
    }

    fn invoke(self: Arc<Self>, call: Invocation) -> BoxFuture<'static, Result<Value>> {
        Box::pin(async move {
            match call.method() {
                "get_string" => Ok(Value::from(self.0.clone())),
                _ => Err(call.no_such_method("Source")),
            }
        })
    }
}

/// Fails when asked for a string.
struct BadSource(String);

impl RemoteObject for BadSource {
    fn type_name(&self) -> &str {
        "BadSource"
    }

    fn invoke(self: Arc<Self>, call: Invocation) -> BoxFuture<'static, Result<Value>> {
        Box::pin(async move {
            match call.method() {
                "get_string" => Err(BridgeError::failed(self.0.clone())),
                _ => Err(call.no_such_method("BadSource")),
            }
        })
    }
}

/// Answers `get_string` by calling `concat("y")` on another object.
struct ChainSource(Value);

impl RemoteObject for ChainSource {
    fn invoke(self: Arc<Self>, call: Invocation) -> BoxFuture<'static, Result<Value>> {
        Box::pin(async move {
            match call.method() {
                "get_string" => self.0.invoke("concat", vec![Value::from("y")]).await,
                _ => Err(call.no_such_method("ChainSource")),
            }
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

type PeerLines = Lines<BufReader<ReadHalf<DuplexStream>>>;

fn server_builder() -> EndpointBuilder {
    EndpointBuilder::new().namespace(
        Namespace::new()
            .with_module("objects", Value::object(Objects))
            .with_global("greeting", "hi"),
    )
}

/// Spawn two endpoints connected to each other.
fn connect_pair(server: EndpointBuilder, client: EndpointBuilder) -> (Endpoint, Endpoint) {
    let (a, b) = duplex(64 * 1024);
    let (server_reader, server_writer) = split(a);
    let (client_reader, client_writer) = split(b);

    (
        server.spawn(server_reader, server_writer).unwrap(),
        client.spawn(client_reader, client_writer).unwrap(),
    )
}

/// Spawn one endpoint and return the raw other end of its channel.
fn raw_peer(builder: EndpointBuilder) -> (Endpoint, PeerLines, WriteHalf<DuplexStream>) {
    let (a, b) = duplex(64 * 1024);
    let (reader, writer) = split(a);
    let endpoint = builder.spawn(reader, writer).unwrap();

    let (peer_reader, peer_writer) = split(b);
    (endpoint, BufReader::new(peer_reader).lines(), peer_writer)
}

async fn next_line(lines: &mut PeerLines) -> String {
    lines.next_line().await.unwrap().expect("channel closed")
}

/// Create a `Concat("one")` on the server through the `objects` module.
async fn concat_object(client: &Endpoint) -> Value {
    let objects = client.import("objects").await.unwrap();
    client
        .call(&objects, "Concat", vec![Value::from("one")])
        .await
        .unwrap()
}

// ============================================================================
// Interaction scenarios
// ============================================================================

#[tokio::test]
async fn test_call() {
    let (_server, client) = connect_pair(server_builder(), EndpointBuilder::new());
    let robj = concat_object(&client).await;

    let result = client.call(&robj, "concat", vec![Value::from("two")]).await.unwrap();
    assert_eq!(result, Value::from("onetwo"));
}

#[tokio::test]
async fn test_proxy_invoke() {
    let (_server, client) = connect_pair(server_builder(), EndpointBuilder::new());
    let robj = concat_object(&client).await;

    let proxy = robj.as_object().and_then(ObjectRef::as_proxy).unwrap();
    assert!(proxy.is_connected());
    assert!(proxy.property_names().is_empty());

    let result = proxy.call("concat", vec![Value::from("two")]).await.unwrap();
    assert_eq!(result, Value::from("onetwo"));
}

#[tokio::test]
async fn test_callback() {
    let (_server, client) = connect_pair(server_builder(), EndpointBuilder::new());
    let robj = concat_object(&client).await;

    robj.invoke("set_source", vec![Value::object(Source("three".into()))])
        .await
        .unwrap();

    let result = robj.invoke("concat", vec![Value::from("four")]).await.unwrap();
    assert_eq!(result, Value::from("onethreefour"));
}

#[tokio::test]
async fn test_nested_callbacks() {
    let (_server, client) = connect_pair(server_builder(), EndpointBuilder::new());
    let objects = client.import("objects").await.unwrap();
    let outer = objects.invoke("Concat", vec![Value::from("one")]).await.unwrap();
    let inner = objects.invoke("Concat", vec![Value::from("x")]).await.unwrap();

    // outer.concat -> client ChainSource.get_string -> server inner.concat
    outer
        .invoke("set_source", vec![Value::object(ChainSource(inner))])
        .await
        .unwrap();

    let result = outer.invoke("concat", vec![Value::from("z")]).await.unwrap();
    assert_eq!(result, Value::from("onexyz"));
    assert_eq!(client.pending_calls().await, 0);
}

#[tokio::test]
async fn test_remote_exception() {
    let (_server, client) = connect_pair(server_builder(), EndpointBuilder::new());
    let robj = concat_object(&client).await;

    let err = robj
        .invoke("breakdown", vec![Value::from("five\n")])
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Remote(_)));
    assert_eq!(err.to_string(), "five\n");
}

#[tokio::test]
async fn test_local_exception() {
    let (_server, client) = connect_pair(server_builder(), EndpointBuilder::new());
    let robj = concat_object(&client).await;

    robj.invoke("set_source", vec![Value::object(BadSource("six\n".into()))])
        .await
        .unwrap();

    let result = robj.invoke("concat", vec![Value::from("seven")]).await.unwrap();
    assert_eq!(result, Value::from("one[six\n]seven"));
}

#[tokio::test]
async fn test_unknown_method_observed_remotely() {
    let (_server, client) = connect_pair(server_builder(), EndpointBuilder::new());
    let robj = concat_object(&client).await;

    let err = robj.invoke("explode", vec![]).await.unwrap_err();
    assert_eq!(err.to_string(), "'Concat' object has no method 'explode'");
}

#[tokio::test]
async fn test_delete_then_stale_handle() {
    let (server, client) = connect_pair(server_builder(), EndpointBuilder::new());
    let robj = concat_object(&client).await;
    assert_eq!(server.codec().lock_registry().len(), 2);

    client.delete(&robj).await.unwrap();
    assert_eq!(server.codec().lock_registry().len(), 1);

    let err = robj.invoke("concat", vec![Value::from("two")]).await.unwrap_err();
    assert!(err.to_string().starts_with("Object not found"));

    let err = client.delete(&robj).await.unwrap_err();
    assert!(err.to_string().starts_with("Object not found"));
}

#[tokio::test]
async fn test_delete_leaves_other_entries() {
    let (_server, client) = connect_pair(server_builder(), EndpointBuilder::new());
    let objects = client.import("objects").await.unwrap();
    let first = objects.invoke("Concat", vec![Value::from("a")]).await.unwrap();
    let second = objects.invoke("Concat", vec![Value::from("b")]).await.unwrap();

    client.delete(&first).await.unwrap();

    let result = second.invoke("concat", vec![Value::from("c")]).await.unwrap();
    assert_eq!(result, Value::from("bc"));
}

#[tokio::test]
async fn test_dropping_proxy_does_not_delete() {
    let (_server, client) = connect_pair(server_builder(), EndpointBuilder::new());
    let robj = concat_object(&client).await;

    robj.invoke("set_source", vec![Value::object(Source("kept".into()))])
        .await
        .unwrap();
    assert_eq!(client.codec().lock_registry().len(), 1);

    client.delete(&robj).await.unwrap();
    drop(robj);

    // The server's proxy to the source is gone; the client's entry is not.
    assert_eq!(client.codec().lock_registry().len(), 1);
}

#[tokio::test]
async fn test_global_and_import() {
    let (_server, client) = connect_pair(server_builder(), EndpointBuilder::new());

    let greeting = client.global("greeting").await.unwrap();
    assert_eq!(greeting, Value::from("hi"));
    let upper = client.call(&greeting, "toUpperCase", vec![]).await.unwrap();
    assert_eq!(upper, Value::from("HI"));

    let first = client.import("objects").await.unwrap();
    let second = client.import("objects").await.unwrap();
    assert_eq!(first, second);

    let err = client.import("nope").await.unwrap_err();
    assert_eq!(err.to_string(), "No module named 'nope'");
    let err = client.global("nope").await.unwrap_err();
    assert_eq!(err.to_string(), "Unknown global: 'nope'");
}

#[tokio::test]
async fn test_custom_command() {
    let server = server_builder().command("echo", |ctx, args| async move {
        assert_eq!(ctx.command(), "echo");
        Ok(Value::List(args))
    });
    let (_server, client) = connect_pair(server, EndpointBuilder::new());

    let result = client
        .request("echo", vec![Value::from(1), Value::from("a")])
        .await
        .unwrap();
    assert_eq!(result, Value::List(vec![Value::from(1), Value::from("a")]));
}

#[tokio::test]
async fn test_proxy_fails_after_endpoint_gone() {
    let (_server, client) = connect_pair(server_builder(), EndpointBuilder::new());
    let robj = concat_object(&client).await;

    client.close();
    client.wait_for_shutdown().await.unwrap();

    let err = robj.invoke("concat", vec![Value::from("two")]).await.unwrap_err();
    assert!(matches!(err, BridgeError::ConnectionClosed));
}

// ============================================================================
// Properties
// ============================================================================

/// A foreign handle passed back to its owner resolves to the original object.
#[tokio::test]
async fn test_remote_pass_through_preserves_identity() {
    let (server, client) = connect_pair(server_builder(), EndpointBuilder::new());
    let objects = client.import("objects").await.unwrap();
    let robj = objects.invoke("Concat", vec![Value::from("one")]).await.unwrap();
    let source = objects.invoke("Source", vec![Value::from("-")]).await.unwrap();
    let registered = server.codec().lock_registry().len();

    robj.invoke("set_source", vec![source]).await.unwrap();

    // No new registration on either side: the handle went home unchanged.
    assert_eq!(server.codec().lock_registry().len(), registered);
    assert!(client.codec().lock_registry().is_empty());

    let result = robj.invoke("concat", vec![Value::from("two")]).await.unwrap();
    assert_eq!(result, Value::from("one-two"));
}

/// Endpoint 1 calls `toUpperCase` on handle 0 of instance A, a registered "hi".
#[tokio::test]
async fn test_end_to_end_upper_case() {
    let server = EndpointBuilder::new().instance(InstanceId::new("A"));
    let (server, client) = connect_pair(server, EndpointBuilder::new());

    let hi: Arc<dyn RemoteObject> = Arc::new(String::from("hi"));
    assert_eq!(server.codec().lock_registry().register(&hi), 0);

    let target = Value::from(RemoteProxy::detached(Handle::new(0, InstanceId::new("A"))));
    let result = client.call(&target, "toUpperCase", vec![]).await.unwrap();
    assert_eq!(result, Value::from("HI"));
}

#[tokio::test]
async fn test_end_to_end_upper_case_wire() {
    let (endpoint, mut lines, mut peer) = raw_peer(EndpointBuilder::new().instance(InstanceId::new("A")));

    let hi: Arc<dyn RemoteObject> = Arc::new(String::from("hi"));
    endpoint.codec().lock_registry().register(&hi);

    peer.write_all(b"[\"call\",{\"_remote_proxy\":{\"id\":0,\"instance\":\"A\"}},\"toUpperCase\"]\n")
        .await
        .unwrap();
    assert_eq!(next_line(&mut lines).await, r#"["return","HI"]"#);
}

/// Unknown commands produce no reply and leave the registry alone.
#[tokio::test]
async fn test_unknown_command_scenario() {
    let (endpoint, mut lines, mut peer) = raw_peer(server_builder());

    peer.write_all(b"[\"frobnicate\",1,2]\n").await.unwrap();
    peer.write_all(b"[\"global\",\"greeting\"]\n").await.unwrap();

    assert_eq!(next_line(&mut lines).await, r#"["return","hi"]"#);
    assert!(endpoint.codec().lock_registry().is_empty());
}

/// With calls A then B outstanding, the first reply settles B.
#[tokio::test]
async fn test_lifo_correlation() {
    let (endpoint, mut lines, mut peer) = raw_peer(EndpointBuilder::new());

    let a = endpoint.begin_call("global", vec![Value::from("a")]).await.unwrap();
    let b = endpoint.begin_call("global", vec![Value::from("b")]).await.unwrap();
    assert_eq!(next_line(&mut lines).await, r#"["global","a"]"#);
    assert_eq!(next_line(&mut lines).await, r#"["global","b"]"#);

    peer.write_all(b"[\"return\",\"first\"]\n[\"error\",\"second\"]\n")
        .await
        .unwrap();

    assert_eq!(b.await.unwrap(), Value::from("first"));
    assert_eq!(a.await.unwrap_err().to_string(), "second");
}

/// Local objects handed to the peer are frozen to handles of this instance.
#[tokio::test]
async fn test_outgoing_handles() {
    let (endpoint, mut lines, _peer) = raw_peer(EndpointBuilder::new().instance(InstanceId::new("RS-me")));
    let source = Value::object(Source("s".into()));

    let _pending = endpoint
        .begin_call("keep", vec![source.clone(), source, Value::from(vec![Value::from(1)])])
        .await
        .unwrap();

    let handle = r#"{"_remote_proxy":{"id":0,"instance":"RS-me"}}"#;
    assert_eq!(
        next_line(&mut lines).await,
        format!(r#"["keep",{},{},[1]]"#, handle, handle)
    );
}

/// A reply whose payload names a deleted local object rejects the call.
#[tokio::test]
async fn test_stale_handle_in_reply() {
    let (endpoint, mut lines, mut peer) = raw_peer(EndpointBuilder::new().instance(InstanceId::new("RS-me")));

    let pending = endpoint.begin_call("global", vec![Value::from("x")]).await.unwrap();
    next_line(&mut lines).await;
    peer.write_all(b"[\"return\",{\"_remote_proxy\":{\"id\":9,\"instance\":\"RS-me\"}}]\n")
        .await
        .unwrap();

    assert!(matches!(pending.await, Err(BridgeError::NotFound(_))));
}

/// Thawing a stale handle in a command's arguments yields an error reply.
#[tokio::test]
async fn test_stale_handle_in_arguments() {
    let (_endpoint, mut lines, mut peer) = raw_peer(EndpointBuilder::new().instance(InstanceId::new("RS-me")));

    peer.write_all(b"[\"call\",{\"_remote_proxy\":{\"id\":3,\"instance\":\"RS-me\"}},\"get_string\"]\n")
        .await
        .unwrap();

    let line = next_line(&mut lines).await;
    assert!(line.starts_with(r#"["error","Object not found"#), "{}", line);
}
