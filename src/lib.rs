//! # objwire
//!
//! Bidirectional remote-object bridge over a message channel.
//!
//! Two endpoints connected by any ordered byte stream can each call methods
//! on objects that live on the other side. Objects never cross the wire:
//! they stay in their owner's registry and travel as handles, which the
//! receiving side turns into proxies. Calling a proxy sends a `call` to the
//! owner and resolves with its reply.
//!
//! ## Architecture
//!
//! - **Registry**: append-only table of local objects exposed to the peer
//! - **Codec**: freeze/thaw between live values and JSON, one message per line
//! - **Correlation**: LIFO stack matching replies to outgoing calls
//! - **Endpoint**: read loop dispatching `call`, `global`, `import`,
//!   `delete` and custom commands, each handler in its own task
//!
//! ## Example
//!
//! ```ignore
//! use objwire::transport::connect;
//! use objwire::{EndpointBuilder, Value};
//!
//! #[tokio::main]
//! async fn main() -> objwire::Result<()> {
//!     let endpoint = connect("127.0.0.1:7000", EndpointBuilder::new()).await?;
//!
//!     let objects = endpoint.import("objects").await?;
//!     let concat = endpoint.call(&objects, "Concat", vec![Value::from("one")]).await?;
//!     let text = concat.invoke("concat", vec![Value::from("two")]).await?;
//!     println!("{:?}", text);
//!
//!     endpoint.wait_for_shutdown().await
//! }
//! ```

pub mod codec;
pub mod correlation;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod proxy;
pub mod registry;
pub mod transport;
pub mod value;

mod endpoint;
mod writer;

pub use dispatch::{Command, CommandContext, CommandTable, Namespace, Resolver};
pub use endpoint::{Endpoint, EndpointBuilder, EndpointConfig, DEFAULT_READ_BUFFER_SIZE};
pub use error::{BridgeError, Result};
pub use proxy::RemoteProxy;
pub use registry::{Handle, InstanceId, ObjectRegistry};
pub use value::{BoxFuture, Invocation, ObjectRef, RemoteObject, Value};
