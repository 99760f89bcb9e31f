//! In-process connector for supervisor tests.
//!
//! Every successful `connect` creates a channel pair: the client half is
//! handed to the supervisor, the server half ([`MockServer`]) to the test.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hintforge::prelude::*;
use hintforge_transport::ConnectionId;
use serde_json::Value;
use tokio::sync::mpsc;

// =========================================================================
// Connector
// =========================================================================

#[derive(Default)]
struct Shared {
    urls: Mutex<Vec<String>>,
    refuse: AtomicBool,
    hang: AtomicBool,
    hanging: AtomicUsize,
    next_id: AtomicU64,
}

/// Counts a hanging connect for as long as its future is alive.
struct HangingDial(Arc<Shared>);

impl Drop for HangingDial {
    fn drop(&mut self) {
        self.0.hanging.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct MockConnector {
    shared: Arc<Shared>,
    servers: mpsc::UnboundedSender<MockServer>,
}

/// The test's side: receives every server half the connector creates.
pub struct MockServers {
    shared: Arc<Shared>,
    servers: mpsc::UnboundedReceiver<MockServer>,
}

pub fn mock_connector() -> (MockConnector, MockServers) {
    let shared = Arc::new(Shared::default());
    let (tx, rx) = mpsc::unbounded_channel();
    (
        MockConnector {
            shared: Arc::clone(&shared),
            servers: tx,
        },
        MockServers {
            shared,
            servers: rx,
        },
    )
}

impl MockServers {
    /// Waits for the next accepted connection.
    pub async fn accept(&mut self) -> MockServer {
        tokio::time::timeout(Duration::from_secs(120), self.servers.recv())
            .await
            .expect("no connection within 120s")
            .expect("connector dropped")
    }

    /// URLs of every connect attempt, refused or not.
    pub fn urls(&self) -> Vec<String> {
        self.shared.urls.lock().unwrap().clone()
    }

    /// Make future connects fail with `ConnectFailed`.
    pub fn refuse(&self, refuse: bool) {
        self.shared.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Make future connects pend forever.
    pub fn hang(&self, hang: bool) {
        self.shared.hang.store(hang, Ordering::SeqCst);
    }

    /// Hanging connects whose futures have not been dropped yet.
    pub fn hanging(&self) -> usize {
        self.shared.hanging.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn connect(&self, url: &str) -> Result<MockConnection, TransportError> {
        self.shared.urls.lock().unwrap().push(url.to_owned());
        if self.shared.hang.load(Ordering::SeqCst) {
            self.shared.hanging.fetch_add(1, Ordering::SeqCst);
            let _dial = HangingDial(Arc::clone(&self.shared));
            std::future::pending::<()>().await;
        }
        if self.shared.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused",
            )));
        }

        let (to_client, from_server) = mpsc::unbounded_channel();
        let (to_server, from_client) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let fail_pings = Arc::new(AtomicBool::new(false));
        let ping_delay_ms = Arc::new(AtomicU64::new(0));
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);

        let server = MockServer {
            url: url.to_owned(),
            to_client: Some(to_client),
            from_client,
            closed: Arc::clone(&closed),
            fail_pings: Arc::clone(&fail_pings),
            ping_delay_ms: Arc::clone(&ping_delay_ms),
        };
        let _ = self.servers.send(server);

        Ok(MockConnection {
            id: ConnectionId::new(id),
            incoming: tokio::sync::Mutex::new(from_server),
            outgoing: to_server,
            closed,
            fail_pings,
            ping_delay_ms,
        })
    }
}

// =========================================================================
// Connection (client half)
// =========================================================================

pub struct MockConnection {
    id: ConnectionId,
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    outgoing: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
    fail_pings: Arc<AtomicBool>,
    ping_delay_ms: Arc<AtomicU64>,
}

impl Connection for MockConnection {
    async fn send(&self, data: &str) -> Result<(), TransportError> {
        self.outgoing
            .send(data.to_owned())
            .map_err(|_| TransportError::ConnectionClosed("server gone".into()))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.incoming.lock().await.recv().await)
    }

    async fn ping(&self) -> Result<(), TransportError> {
        let delay = self.ping_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_pings.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed(std::io::Error::other("ping refused")));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

// =========================================================================
// Server half
// =========================================================================

pub struct MockServer {
    pub url: String,
    to_client: Option<mpsc::UnboundedSender<Vec<u8>>>,
    from_client: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
    fail_pings: Arc<AtomicBool>,
    ping_delay_ms: Arc<AtomicU64>,
}

impl MockServer {
    /// Sends one frame holding `records` (a JSON array).
    pub fn send(&self, records: Value) {
        if let Some(tx) = &self.to_client {
            let _ = tx.send(records.to_string().into_bytes());
        }
    }

    /// Waits for the next frame from the client.
    pub async fn recv(&mut self) -> Vec<Value> {
        let frame = tokio::time::timeout(Duration::from_secs(120), self.from_client.recv())
            .await
            .expect("no frame within 120s")
            .expect("client side gone");
        serde_json::from_str(&frame).expect("frame is a JSON array")
    }

    /// The next frame, or `None` if nothing arrives within `wait`.
    pub async fn try_recv_within(&mut self, wait: Duration) -> Option<Vec<Value>> {
        match tokio::time::timeout(wait, self.from_client.recv()).await {
            Ok(Some(frame)) => serde_json::from_str(&frame).ok(),
            _ => None,
        }
    }

    /// Ends the connection from the server side.
    pub fn drop_connection(&mut self) {
        self.to_client = None;
    }

    /// Whether the client closed the connection.
    pub fn client_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn fail_pings(&self, fail: bool) {
        self.fail_pings.store(fail, Ordering::SeqCst);
    }

    /// Makes every ping take `delay` before it resolves.
    pub fn delay_pings(&self, delay: Duration) {
        self.ping_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

// =========================================================================
// Fixtures
// =========================================================================

/// Lets every task that can make progress do so. Timers only fire once
/// the runtime is idle, so with paused time this is a reliable barrier.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub async fn wait_for_state(handle: &SupervisorHandle, wanted: ConnectionState) {
    let mut rx = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(300), rx.wait_for(|s| *s == wanted))
        .await
        .unwrap_or_else(|_| panic!("state never became {wanted}"))
        .expect("supervisor stopped");
}

pub fn connected() -> Value {
    serde_json::json!([{
        "cmd": "Connected",
        "checked_locations": [1],
        "missing_locations": ["5", "6"],
        "slot_info": {
            "1": {"name": "Alice", "game": "Zelda"},
            "2": {"name": "Bob", "game": "Metroid"}
        },
        "players": [
            {"team": 0, "slot": 1, "alias": "Alice", "name": "Alice"},
            {"team": 0, "slot": 2, "alias": "Bob", "name": "Bob"}
        ]
    }])
}

pub fn command_names(frame: &[Value]) -> Vec<&str> {
    frame.iter().filter_map(|c| c["cmd"].as_str()).collect()
}

/// A config with the keepalive far enough out that it never interferes
/// unless a test waits for it.
pub fn quiet_config() -> ClientConfig {
    ClientConfig {
        keepalive_interval_secs: 600,
        ..ClientConfig::default()
    }
}
