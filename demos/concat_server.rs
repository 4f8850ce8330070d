//! Concat Server - exposes an `objects` module over TCP.
//!
//! This example demonstrates:
//! - Implementing [`RemoteObject`] for plain Rust types
//! - Publishing a module through a [`Namespace`]
//! - Calling back into objects that live on the client
//!
//! Run with: `cargo run --example concat_server -- 127.0.0.1:7000`
//! then start `concat_client` against the same address.

use std::sync::{Arc, Mutex, PoisonError};

use objwire::transport::Server;
use objwire::{BoxFuture, BridgeError, EndpointBuilder, Invocation, Namespace, RemoteObject, Result, Value};
use tracing_subscriber::EnvFilter;

/// Constructors handed out by `import("objects")`.
struct Objects;

impl RemoteObject for Objects {
    fn type_name(&self) -> &str {
        "objects"
    }

    fn invoke(self: Arc<Self>, call: Invocation) -> BoxFuture<'static, Result<Value>> {
        Box::pin(async move {
            match call.method() {
                "Concat" => Ok(Value::object(Concat {
                    own: call.str_arg(0)?.to_string(),
                    source: Mutex::new(None),
                })),
                _ => Err(call.no_such_method("objects")),
            }
        })
    }
}

/// Joins its own string, the string of an optional source and an argument.
struct Concat {
    own: String,
    source: Mutex<Option<Value>>,
}

impl Concat {
    fn source(&self) -> Option<Value> {
        self.source.lock().unwrap_or_else(PoisonError::into_inner).clone()
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
                    let source = call.arg(0)?.clone();
                    *self.source.lock().unwrap_or_else(PoisonError::into_inner) = Some(source);
                    Ok(Value::Null)
                }
                "concat" => {
                    let other = call.str_arg(0)?.to_string();
                    // A failing source is reported inline, not propagated.
                    let middle = match self.source() {
                        Some(source) => match source.invoke("get_string", vec![]).await {
                            Ok(value) => value.as_str().unwrap_or_default().to_string(),
                            Err(e) => format!("[{}]", e.reply_text()),
                        },
                        None => String::new(),
                    };
                    tracing::info!("concat({:?}) with source {:?}", other, middle);
                    Ok(Value::from(format!("{}{}{}", self.own, middle, other)))
                }
                "breakdown" => Err(BridgeError::failed(call.str_arg(0)?)),
                _ => Err(call.no_such_method("Concat")),
            }
        })
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addr = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:7000".to_string());
    let server = Server::bind(&addr).await?;

    server
        .serve(|| EndpointBuilder::new().namespace(Namespace::new().with_module("objects", Value::object(Objects))))
        .await?;

    Ok(())
}
