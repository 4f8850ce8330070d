//! Dedicated writer task for outgoing lines.
//!
//! Every outgoing message (calls issued locally, replies produced by
//! spawned handlers) is an encoded line handed to one writer task through
//! an mpsc channel. Ordering on the wire is the order in which sends reach
//! the channel, and a line is never interleaved with another.
//!
//! # Architecture
//!
//! ```text
//! Outgoing calls ─┐
//! Handler 1      ─┼─► mpsc::Sender<Bytes> ─► Writer Task ─► channel
//! Handler N      ─┘
//! ```
//!
//! Lines ready at the same time are written together with `write_vectored`,
//! each followed by its `\n` terminator.

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{BridgeError, Result};

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Maximum lines to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// Line terminator.
const NEWLINE: &[u8] = b"\n";

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Channel capacity for the line queue. Senders wait when it is full.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Handle for sending lines to the writer task.
///
/// This is cheaply cloneable and can be shared across handlers.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<Bytes>,
}

impl WriterHandle {
    /// Queue one encoded message, without its terminator.
    ///
    /// Waits while the channel is full.
    ///
    /// # Errors
    ///
    /// `ConnectionClosed` if the writer task has stopped.
    pub async fn send(&self, line: Bytes) -> Result<()> {
        self.tx
            .send(line)
            .await
            .map_err(|_| BridgeError::ConnectionClosed)
    }

    /// Wait for a free slot in the queue.
    ///
    /// Cancel-safe: dropping the future before it resolves takes nothing.
    /// Sending through the returned permit never waits.
    ///
    /// # Errors
    ///
    /// `ConnectionClosed` if the writer task has stopped.
    pub async fn reserve(&self) -> Result<mpsc::Permit<'_, Bytes>> {
        self.tx
            .reserve()
            .await
            .map_err(|_| BridgeError::ConnectionClosed)
    }
}

/// Spawn the writer task and return a handle for sending lines.
///
/// The task ends once every handle is dropped, after flushing and shutting
/// down `writer`. It also ends, with an error, on the first failed write.
pub fn spawn_writer_task<W>(writer: W, config: WriterConfig) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

/// Main writer loop - receives lines and writes them out in batches.
async fn writer_loop<W>(mut rx: mpsc::Receiver<Bytes>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);

    while let Some(first) = rx.recv().await {
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(line) => batch.push(line),
                Err(_) => break,
            }
        }

        if let Err(e) = write_batch(&mut writer, &batch).await {
            tracing::debug!("writer stopped: {}", e);
            return Err(e);
        }
        batch.clear();
    }

    writer.shutdown().await?;
    Ok(())
}

/// Write a batch of lines using scatter/gather I/O (write_vectored).
async fn write_batch<W>(writer: &mut W, batch: &[Bytes]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if batch.is_empty() {
        return Ok(());
    }

    let total_size: usize = batch.iter().map(|line| line.len() + NEWLINE.len()).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(BridgeError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for the data left after `skip_bytes` were written.
fn build_remaining_slices(batch: &[Bytes], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len() * 2);
    let mut offset = 0;

    for line in batch {
        for part in [&line[..], NEWLINE] {
            let end = offset + part.len();
            if skip_bytes < end && !part.is_empty() {
                let start = skip_bytes.saturating_sub(offset);
                slices.push(IoSlice::new(&part[start..]));
            }
            offset = end;
        }
    }

    slices
}
