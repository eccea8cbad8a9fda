//! TCP receiver: owns the listening socket and spawns one handler task per
//! accepted connection.
//!
//! # Lifecycle
//!
//! `Created -> Listening -> Stopped`. A receiver listens at most once.
//!
//! [`TcpReceiver::stop`] only closes the listening socket. Connections that
//! are already open keep their handler task and keep delivering records until
//! the client disconnects or the idle timeout fires.

use points_cache::Record;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::connection::{ConnectionOptions, handle_connection};
use crate::metrics::{ACCEPT_ERRORS, CONNECTIONS_ACCEPTED, CONNECTIONS_ACTIVE, record_close};

/// Delay before retrying after `accept` fails.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Receiver lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Created,
    Listening,
    Stopped,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::Created => "created",
            State::Listening => "listening",
            State::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Errors returned by [`TcpReceiver::listen`].
#[derive(Debug, thiserror::Error)]
pub enum ReceiverError {
    /// The address could not be bound.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// `listen` was called on a receiver that is not in the `Created` state.
    #[error("receiver is already {0}")]
    InvalidState(State),
}

/// Accepts TCP connections and feeds parsed records into a bounded queue.
pub struct TcpReceiver {
    out: mpsc::Sender<Record>,
    options: ConnectionOptions,
    state: State,
    local_addr: Option<SocketAddr>,
    exit: Option<oneshot::Sender<()>>,
    accept_task: Option<JoinHandle<()>>,
}

impl TcpReceiver {
    /// Create a receiver that forwards records to `out`.
    ///
    /// Every connection holds a clone of `out`; the queue closes once the
    /// receiver and all of its connections are gone.
    pub fn new(out: mpsc::Sender<Record>, options: ConnectionOptions) -> Self {
        Self {
            out,
            options,
            state: State::Created,
            local_addr: None,
            exit: None,
            accept_task: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The bound address, once listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Bind `address` and start accepting connections in the background.
    ///
    /// Returns as soon as the socket is bound, with the actual local address
    /// (useful when binding port 0). Must be called from within a tokio
    /// runtime.
    pub async fn listen(&mut self, address: SocketAddr) -> Result<SocketAddr, ReceiverError> {
        if self.state != State::Created {
            return Err(ReceiverError::InvalidState(self.state));
        }

        let bind_error = |source| ReceiverError::Bind { address, source };
        let listener = TcpListener::bind(address).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        let (exit_tx, exit_rx) = oneshot::channel();
        let out = self.out.clone();
        let options = self.options;
        self.accept_task = Some(tokio::spawn(accept_loop(listener, exit_rx, out, options)));
        self.exit = Some(exit_tx);
        self.local_addr = Some(local_addr);
        self.state = State::Listening;

        tracing::info!(address = %local_addr, "receiver listening");
        Ok(local_addr)
    }

    /// Stop accepting new connections.
    ///
    /// The shutdown signal is consumed by the first call, so calling this
    /// again has no further effect. Open connections are not interrupted.
    pub fn stop(&mut self) {
        if let Some(exit) = self.exit.take() {
            let _ = exit.send(());
        }
        self.state = State::Stopped;
    }

    /// Wait for the accept loop to exit and the listening socket to close.
    ///
    /// Returns immediately if the receiver never listened or was already
    /// joined. Call [`TcpReceiver::stop`] first, or this waits forever.
    pub async fn join(&mut self) {
        if let Some(task) = self.accept_task.take()
            && let Err(e) = task.await
        {
            tracing::error!(error = %e, "accept loop panicked");
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    mut exit: oneshot::Receiver<()>,
    out: mpsc::Sender<Record>,
    options: ConnectionOptions,
) {
    loop {
        tokio::select! {
            biased;

            // Fires on stop() and also if the receiver is dropped.
            _ = &mut exit => break,

            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    CONNECTIONS_ACCEPTED.increment();
                    CONNECTIONS_ACTIVE.increment();
                    tracing::debug!(%peer, "accepted connection");

                    let out = out.clone();
                    tokio::spawn(async move {
                        let reason = handle_connection(stream, peer, out, options).await;
                        tracing::debug!(%peer, ?reason, "connection closed");
                        record_close(reason);
                        CONNECTIONS_ACTIVE.decrement();
                    });
                }
                Err(e) => {
                    ACCEPT_ERRORS.increment();
                    tracing::warn!(error = %e, "failed to accept connection");
                    if accept_backoff(&mut exit).await {
                        break;
                    }
                }
            },
        }
    }

    drop(listener);
    tracing::info!("receiver stopped accepting connections");
}

/// Pause after a failed accept so errors like EMFILE do not spin the loop.
///
/// Returns true if the exit signal fired while waiting.
async fn accept_backoff(exit: &mut oneshot::Receiver<()>) -> bool {
    tokio::select! {
        biased;
        _ = exit => true,
        _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => false,
    }
}
