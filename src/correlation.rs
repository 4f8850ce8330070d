//! Call correlation: matching replies to outstanding outgoing calls.
//!
//! Correlation is positional. Every outgoing call pushes a record onto a
//! stack; every `return` or `error` pops the most recently pushed record
//! that is still open. There is no call identifier on the wire.
//!
//! This handles re-entrant calls correctly: a handler that issues its own
//! call before replying pushes above the caller's record, and its reply is
//! consumed first. It does **not** handle two independent calls outstanding
//! at once whose replies come back in issue order: the first reply resolves
//! the second call. That misattribution cannot be detected without call ids,
//! so callers sharing an endpoint must keep outstanding calls strictly
//! nested. A reply arriving with nothing open is detected and reported as
//! [`BridgeError::ProtocolDesync`].

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{BridgeError, Result};
use crate::value::Value;

/// One in-flight outgoing call.
struct PendingCall {
    /// Short description for logs, e.g. `call concat`.
    label: String,
    /// Completion slot.
    reply: oneshot::Sender<Result<Value>>,
}

/// Future resolving with the reply to one outgoing call.
///
/// Resolves to `ConnectionClosed` if the endpoint shuts down first.
#[derive(Debug)]
pub struct PendingReply {
    rx: oneshot::Receiver<Result<Value>>,
}

impl Future for PendingReply {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(BridgeError::ConnectionClosed)))
    }
}

/// LIFO stack of pending calls.
#[derive(Default)]
pub struct CallStack {
    open: Vec<PendingCall>,
    /// Set once the connection is gone; later pushes fail immediately.
    closed: bool,
}

impl CallStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new outgoing call and get the future for its reply.
    ///
    /// After [`close`](Self::close) the returned future resolves to
    /// `ConnectionClosed` and nothing is recorded.
    pub fn push(&mut self, label: impl Into<String>) -> PendingReply {
        let (tx, rx) = oneshot::channel();
        if self.closed {
            return PendingReply { rx };
        }
        self.open.push(PendingCall {
            label: label.into(),
            reply: tx,
        });
        PendingReply { rx }
    }

    /// Resolve the most recent open call with `value`.
    ///
    /// # Errors
    ///
    /// `ProtocolDesync` if no call is open.
    pub fn complete_return(&mut self, value: Value) -> Result<()> {
        self.complete("return", Ok(value))
    }

    /// Reject the most recent open call with the peer's `reason`.
    ///
    /// # Errors
    ///
    /// `ProtocolDesync` if no call is open.
    pub fn complete_error(&mut self, reason: String) -> Result<()> {
        self.complete("error", Err(BridgeError::Remote(reason)))
    }

    /// Settle the most recent open call with an arbitrary outcome.
    ///
    /// # Errors
    ///
    /// `ProtocolDesync` if no call is open.
    pub fn complete(&mut self, kind: &str, outcome: Result<Value>) -> Result<()> {
        let pending = self.open.pop().ok_or_else(|| {
            BridgeError::ProtocolDesync(format!("received '{}' with no call outstanding", kind))
        })?;

        tracing::trace!("'{}' settles {} ({} still open)", kind, pending.label, self.open.len());
        if pending.reply.send(outcome).is_err() {
            tracing::warn!("caller of {} went away before its reply arrived", pending.label);
        }
        Ok(())
    }

    /// Fail every open call with `ConnectionClosed` and refuse new ones.
    pub fn close(&mut self) {
        if !self.open.is_empty() {
            tracing::debug!("closing {} pending call(s)", self.open.len());
        }
        self.closed = true;
        self.open.clear();
    }

    /// Check whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of open calls.
    pub fn len(&self) -> usize {
        self.open.len()
    }

    /// Check if no call is open.
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}
