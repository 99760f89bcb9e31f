//! Per-socket driver task.
//!
//! Each open connection gets one Tokio task running [`run_socket`]. It
//! owns the connection and does two things, one at a time:
//!   1. forwards every received frame to the supervisor
//!   2. carries out the send/ping/close requests made through the
//!      [`SocketHandle`]
//!
//! When the connection ends for any reason the task reports
//! `SocketClosed` once and exits.

use std::time::Duration;

use hintforge_transport::{Connection, TransportError};
use tokio::sync::{mpsc, oneshot};

use crate::supervisor::SupervisorEvent;

pub(crate) enum SocketCommand {
    Send(String),
    Ping(oneshot::Sender<Result<(), TransportError>>),
    Close,
}

/// Cheap, cloneable access to a running driver task.
#[derive(Debug, Clone)]
pub(crate) struct SocketHandle {
    sender: mpsc::UnboundedSender<SocketCommand>,
}

impl std::fmt::Debug for SocketCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Send(frame) => f.debug_tuple("Send").field(frame).finish(),
            Self::Ping(_) => f.write_str("Ping"),
            Self::Close => f.write_str("Close"),
        }
    }
}

pub(crate) fn socket_channel() -> (SocketHandle, mpsc::UnboundedReceiver<SocketCommand>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (SocketHandle { sender }, receiver)
}

fn task_gone() -> TransportError {
    TransportError::ConnectionClosed("socket task has ended".into())
}

impl SocketHandle {
    /// Queues one text frame. Frames go out in the order queued.
    pub(crate) fn send(&self, frame: String) -> Result<(), TransportError> {
        self.sender
            .send(SocketCommand::Send(frame))
            .map_err(|_| task_gone())
    }

    /// Pings the server and waits for the result.
    pub(crate) async fn ping(&self) -> Result<(), TransportError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(SocketCommand::Ping(reply_tx))
            .map_err(|_| task_gone())?;
        reply_rx.await.map_err(|_| task_gone())?
    }

    /// Asks the driver to close the socket normally. Idempotent.
    pub(crate) fn close(&self) {
        let _ = self.sender.send(SocketCommand::Close);
    }
}

/// Runs one connection until it closes.
pub(crate) async fn run_socket<C: Connection>(
    conn: C,
    session: u64,
    mut commands: mpsc::UnboundedReceiver<SocketCommand>,
    events: mpsc::UnboundedSender<SupervisorEvent>,
    ping_timeout: Duration,
) {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, session, "socket driver started");

    let reason = loop {
        tokio::select! {
            frame = conn.recv() => match frame {
                Ok(Some(data)) => {
                    tracing::trace!(%conn_id, bytes = data.len(), "frame received");
                    if events.send(SupervisorEvent::Frame { session, data }).is_err() {
                        break "supervisor stopped".to_owned();
                    }
                }
                Ok(None) => break "closed by server".to_owned(),
                Err(e) => break e.to_string(),
            },
            command = commands.recv() => match command {
                Some(SocketCommand::Send(frame)) => {
                    if let Err(e) = conn.send(&frame).await {
                        tracing::warn!(%conn_id, error = %e, "send failed");
                        break e.to_string();
                    }
                }
                Some(SocketCommand::Ping(reply)) => {
                    let result = match tokio::time::timeout(ping_timeout, conn.ping()).await {
                        Ok(result) => result,
                        Err(_) => Err(TransportError::Timeout(ping_timeout)),
                    };
                    let _ = reply.send(result);
                }
                Some(SocketCommand::Close) | None => {
                    if let Err(e) = conn.close().await {
                        tracing::debug!(%conn_id, error = %e, "close failed");
                    }
                    break "closed by client".to_owned();
                }
            },
        }
    };

    tracing::info!(%conn_id, session, %reason, "socket closed");
    let _ = events.send(SupervisorEvent::SocketClosed { session, reason });
}
