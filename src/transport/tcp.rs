//! TCP socket glue.
//!
//! - [`connect`] - dial a server and run one endpoint over the stream
//! - [`Server`] - accept connections, one endpoint each
//!
//! # Example
//!
//! ```ignore
//! use objwire::transport::{connect, Server};
//! use objwire::{EndpointBuilder, Namespace};
//!
//! let server = Server::bind("127.0.0.1:0").await?;
//! let addr = server.local_addr()?;
//! tokio::spawn(server.serve(|| EndpointBuilder::new().namespace(Namespace::new())));
//!
//! let endpoint = connect(addr, EndpointBuilder::new()).await?;
//! ```

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use crate::endpoint::{Endpoint, EndpointBuilder};
use crate::error::Result;

/// Connect to `addr` and spawn an endpoint over the connection.
pub async fn connect<A: ToSocketAddrs>(addr: A, builder: EndpointBuilder) -> Result<Endpoint> {
    let stream = TcpStream::connect(addr).await?;
    tracing::debug!("connected to {}", stream.peer_addr()?);
    spawn_on(stream, builder)
}

fn spawn_on(stream: TcpStream, builder: EndpointBuilder) -> Result<Endpoint> {
    stream.set_nodelay(true)?;
    let (reader, writer) = stream.into_split();
    builder.spawn(reader, writer)
}

/// TCP listener handing each connection to a fresh endpoint.
pub struct Server {
    listener: TcpListener,
}

impl Server {
    /// Bind to `addr`.
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// Get the bound address (useful after binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept a single connection and spawn an endpoint on it.
    pub async fn accept(&self, builder: EndpointBuilder) -> Result<(Endpoint, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await?;
        let endpoint = spawn_on(stream, builder)?;
        Ok((endpoint, addr))
    }

    /// Accept connections until the listener fails.
    ///
    /// `factory` builds the endpoint configuration for each connection, so
    /// every peer gets its own registry and call stack. Endpoints run until
    /// their peer disconnects.
    pub async fn serve<F>(self, factory: F) -> Result<()>
    where
        F: Fn() -> EndpointBuilder + Send,
    {
        tracing::info!("listening on {}", self.local_addr()?);

        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::error!("accept error: {}", e);
                    return Err(e.into());
                }
            };

            match spawn_on(stream, factory()) {
                Ok(endpoint) => {
                    tracing::debug!("accepted {} as {}", addr, endpoint.instance());
                    tokio::spawn(async move {
                        if let Err(e) = endpoint.wait_for_shutdown().await {
                            tracing::warn!("connection from {} ended: {}", addr, e);
                        }
                    });
                }
                Err(e) => tracing::error!("failed to start endpoint for {}: {}", addr, e),
            }
        }
    }
}
