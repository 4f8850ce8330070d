//! Concat Client - drives `concat_server` and serves callbacks to it.
//!
//! Run with: `cargo run --example concat_client -- 127.0.0.1:7000`

use std::sync::Arc;

use objwire::transport::connect;
use objwire::{BoxFuture, BridgeError, EndpointBuilder, Invocation, RemoteObject, Result, Value};
use tracing_subscriber::EnvFilter;

/// Local object the server calls back into.
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

/// Source whose `get_string` always fails.
struct BadSource(String);

impl RemoteObject for BadSource {
    fn invoke(self: Arc<Self>, call: Invocation) -> BoxFuture<'static, Result<Value>> {
        Box::pin(async move { Err(BridgeError::failed(format!("{} ({})", self.0, call.method()))) })
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addr = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:7000".to_string());
    let endpoint = connect(&addr, EndpointBuilder::new()).await?;

    let objects = endpoint.import("objects").await?;
    let concat = endpoint.call(&objects, "Concat", vec![Value::from("one")]).await?;

    let plain = concat.invoke("concat", vec![Value::from("two")]).await?;
    println!("concat: {:?}", plain);

    concat
        .invoke("set_source", vec![Value::object(Source("three".into()))])
        .await?;
    let with_source = concat.invoke("concat", vec![Value::from("four")]).await?;
    println!("with callback: {:?}", with_source);

    concat
        .invoke("set_source", vec![Value::object(BadSource("six".into()))])
        .await?;
    let with_failure = concat.invoke("concat", vec![Value::from("seven")]).await?;
    println!("with failing callback: {:?}", with_failure);

    match concat.invoke("breakdown", vec![Value::from("five")]).await {
        Ok(value) => println!("breakdown unexpectedly returned {:?}", value),
        Err(e) => println!("remote error: {}", e),
    }

    endpoint.delete(&concat).await?;
    endpoint.close();
    endpoint.wait_for_shutdown().await?;

    Ok(())
}
