//! The connection supervisor: an actor task that owns the session.
//!
//! Everything that mutates client state (the session, datapack cache,
//! difficulty weights, pending-hint queue and connection state) lives in
//! one Tokio task. The outside world talks to it through a
//! [`SupervisorHandle`]; socket drivers and timers report back through an
//! internal event channel. There is exactly one writer, so nothing here
//! needs a lock.
//!
//! ```text
//!  SupervisorHandle ──commands──┐
//!                               ▼
//!  socket driver ───events──→ ConnectionSupervisor ──effects──→ socket / timers / notices
//!  timers ──────────events──┘       │
//!                                   └── keepalive tick: ping or reconnect
//! ```
//!
//! Every event carries the id of the session it belongs to. Events for a
//! session that is no longer the active one are dropped, which is how a
//! grace-window timer started by a torn-down session becomes harmless.

use std::sync::Arc;
use std::time::Duration;

use hintforge_protocol::{ClientCommand, JsonCodec, LooseId, ServerCommand, decode_frame, encode_frame};
use hintforge_session::{
    DifficultyWeights, Effect, FollowUp, Notice, SessionClient, SessionDeps, SessionError,
    SessionSnapshot,
};
use hintforge_store::{DataCache, JsonFileStore, KeyValueStore, MemoryStore, PendingHintQueue};
use hintforge_tick::KeepaliveScheduler;
use hintforge_transport::{Connector, TransportError, WebSocketConnector};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::driver::{SocketHandle, run_socket, socket_channel};
use crate::{ClientConfig, ConnectionState, Credentials, HintforgeError, LogNoticeSink, NoticeSink};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Requests from a [`SupervisorHandle`].
enum SupervisorCommand {
    Connect {
        credentials: Credentials,
        reply: oneshot::Sender<()>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    AttemptReconnect {
        reply: oneshot::Sender<()>,
    },
    PuzzleCompleted {
        difficulty: String,
        reply: oneshot::Sender<RewardOutcome>,
    },
    Snapshot {
        reply: oneshot::Sender<Option<SessionSnapshot>>,
    },
    HintProbabilities {
        difficulty: String,
        reply: oneshot::Sender<String>,
    },
    PendingCount {
        reply: oneshot::Sender<usize>,
    },
    Shutdown,
}

/// Reports from socket drivers and timers, tagged with their session.
#[derive(Debug)]
pub(crate) enum SupervisorEvent {
    SocketUp { session: u64, socket: SocketHandle },
    Frame { session: u64, data: Vec<u8> },
    SocketClosed { session: u64, reason: String },
    FollowUp { session: u64, step: FollowUp },
    ConnectTimeout { session: u64 },
    PingResult {
        session: u64,
        result: Result<(), TransportError>,
    },
}

/// What became of a solved puzzle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardOutcome {
    /// A hint request for this location went out.
    Sent(LooseId),
    /// Offline: the request was queued for the next matching session.
    Queued(LooseId),
    /// No hint this time.
    Withheld(SessionError),
}

// ---------------------------------------------------------------------------
// SupervisorHandle
// ---------------------------------------------------------------------------

/// Handle to a running supervisor. Cheap to clone.
#[derive(Clone)]
pub struct SupervisorHandle {
    sender: mpsc::Sender<SupervisorCommand>,
    state: watch::Receiver<ConnectionState>,
}

impl SupervisorHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SupervisorCommand,
    ) -> Result<T, HintforgeError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| HintforgeError::SupervisorGone)?;
        reply_rx.await.map_err(|_| HintforgeError::SupervisorGone)
    }

    /// Connects to `host:port` as `slot_name`. Does nothing while already
    /// connecting or connected.
    pub async fn connect(
        &self,
        host: &str,
        port: u16,
        slot_name: &str,
        password: &str,
    ) -> Result<(), HintforgeError> {
        let credentials = Credentials::new(host, port, slot_name, password);
        self.request(|reply| SupervisorCommand::Connect { credentials, reply })
            .await
    }

    /// Closes the session and stops reconnecting.
    pub async fn disconnect(&self) -> Result<(), HintforgeError> {
        self.request(|reply| SupervisorCommand::Disconnect { reply }).await
    }

    /// Reconnects with the cached credentials if automatic reconnection is
    /// on and no socket is open. Embedders call this when the app regains
    /// focus.
    pub async fn attempt_reconnect(&self) -> Result<(), HintforgeError> {
        self.request(|reply| SupervisorCommand::AttemptReconnect { reply })
            .await
    }

    /// Reports a solved puzzle of `difficulty` and rolls for a hint.
    pub async fn puzzle_completed(&self, difficulty: &str) -> Result<RewardOutcome, HintforgeError> {
        let difficulty = difficulty.to_owned();
        self.request(|reply| SupervisorCommand::PuzzleCompleted { difficulty, reply })
            .await
    }

    /// A copy of the active session's state, if there is a session.
    pub async fn snapshot(&self) -> Result<Option<SessionSnapshot>, HintforgeError> {
        self.request(|reply| SupervisorCommand::Snapshot { reply }).await
    }

    /// The current weights for `difficulty`, e.g. `"80 Prog, 20 Non-prog, 0 No Hint"`.
    pub async fn hint_probabilities(&self, difficulty: &str) -> Result<String, HintforgeError> {
        let difficulty = difficulty.to_owned();
        self.request(|reply| SupervisorCommand::HintProbabilities { difficulty, reply })
            .await
    }

    pub async fn pending_count(&self) -> Result<usize, HintforgeError> {
        self.request(|reply| SupervisorCommand::PendingCount { reply })
            .await
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// A receiver that sees every state change from now on.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Stops the supervisor task, closing any open socket.
    pub async fn shutdown(&self) -> Result<(), HintforgeError> {
        self.sender
            .send(SupervisorCommand::Shutdown)
            .await
            .map_err(|_| HintforgeError::SupervisorGone)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Assembles a supervisor. Obtained from [`ConnectionSupervisor::builder`].
#[derive(Default)]
pub struct SupervisorBuilder {
    config: ClientConfig,
    store: Option<Arc<dyn KeyValueStore>>,
    notices: Option<Arc<dyn NoticeSink>>,
    datapacks: Option<DataCache>,
}

impl SupervisorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Key/value store for credentials and pending hints. Defaults to
    /// `config.state_file`, or memory when that is unset.
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Defaults to [`LogNoticeSink`].
    pub fn notices(mut self, notices: impl NoticeSink) -> Self {
        self.notices = Some(Arc::new(notices));
        self
    }

    /// Defaults to a cache under `config.data_dir`, or memory when that
    /// is unset.
    pub fn datapacks(mut self, datapacks: DataCache) -> Self {
        self.datapacks = Some(datapacks);
        self
    }

    /// Spawns the supervisor task. Must be called inside a Tokio runtime.
    pub fn spawn<K: Connector>(self, connector: K) -> SupervisorHandle {
        let config = self.config;
        let store = self.store.unwrap_or_else(|| default_store(&config));
        let notices = self.notices.unwrap_or_else(|| Arc::new(LogNoticeSink));
        let datapacks = self.datapacks.unwrap_or_else(|| match &config.data_dir {
            Some(dir) => DataCache::open(dir),
            None => DataCache::in_memory(),
        });
        let pending = PendingHintQueue::load(Arc::clone(&store), config.pending_leftovers);

        let mut keepalive = KeepaliveScheduler::with_interval(config.keepalive_interval());
        keepalive.pause();

        let (command_tx, command_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let supervisor = ConnectionSupervisor {
            config,
            connector: Arc::new(connector),
            codec: JsonCodec,
            store,
            notices,
            datapacks,
            weights: DifficultyWeights::default(),
            pending,
            state: state_tx,
            auto_reconnect: false,
            session: None,
            next_session: 0,
            keepalive,
            commands: command_rx,
            events_tx: event_tx,
            events: event_rx,
        };
        tokio::spawn(supervisor.run());

        SupervisorHandle {
            sender: command_tx,
            state: state_rx,
        }
    }
}

fn default_store(config: &ClientConfig) -> Arc<dyn KeyValueStore> {
    if let Some(path) = &config.state_file {
        match JsonFileStore::open(path) {
            Ok(store) => return Arc::new(store),
            Err(error) => {
                tracing::warn!(%error, "state file unusable; keeping state in memory");
            }
        }
    }
    Arc::new(MemoryStore::new())
}

// ---------------------------------------------------------------------------
// The actor
// ---------------------------------------------------------------------------

struct ActiveSession {
    id: u64,
    client: SessionClient,
    /// `None` until the socket is up, and again once it has closed.
    socket: Option<SocketHandle>,
    /// The connect task while it is still dialing. Once the socket is up
    /// the task becomes its driver and ends on its own after a close.
    dial: Option<JoinHandle<()>>,
}

impl ActiveSession {
    /// Closes an open socket normally and abandons a dial still in flight.
    fn release(self) {
        if let Some(socket) = self.socket {
            socket.close();
        }
        if let Some(dial) = self.dial {
            dial.abort();
        }
    }
}

/// The supervisor task's state.
pub struct ConnectionSupervisor<K: Connector = WebSocketConnector> {
    config: ClientConfig,
    connector: Arc<K>,
    codec: JsonCodec,
    store: Arc<dyn KeyValueStore>,
    notices: Arc<dyn NoticeSink>,
    datapacks: DataCache,
    weights: DifficultyWeights,
    pending: PendingHintQueue,
    state: watch::Sender<ConnectionState>,
    auto_reconnect: bool,
    session: Option<ActiveSession>,
    next_session: u64,
    keepalive: KeepaliveScheduler,
    commands: mpsc::Receiver<SupervisorCommand>,
    events_tx: mpsc::UnboundedSender<SupervisorEvent>,
    events: mpsc::UnboundedReceiver<SupervisorEvent>,
}

impl ConnectionSupervisor {
    /// Starts building a supervisor.
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }
}

impl<K: Connector> ConnectionSupervisor<K> {
    async fn run(mut self) {
        tracing::info!("connection supervisor started");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(SupervisorCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = self.events.recv() => self.handle_event(event),
                _ = self.keepalive.wait_for_tick() => self.on_keepalive(),
            }
        }

        if let Some(active) = self.session.take() {
            active.release();
        }
        tracing::info!("connection supervisor stopped");
    }

    fn handle_command(&mut self, command: SupervisorCommand) {
        match command {
            SupervisorCommand::Connect { credentials, reply } => {
                self.connect(credentials);
                let _ = reply.send(());
            }
            SupervisorCommand::Disconnect { reply } => {
                self.disconnect();
                let _ = reply.send(());
            }
            SupervisorCommand::AttemptReconnect { reply } => {
                self.attempt_reconnect();
                let _ = reply.send(());
            }
            SupervisorCommand::PuzzleCompleted { difficulty, reply } => {
                let _ = reply.send(self.grant_reward(&difficulty));
            }
            SupervisorCommand::Snapshot { reply } => {
                let _ = reply.send(self.session.as_ref().map(|a| a.client.snapshot()));
            }
            SupervisorCommand::HintProbabilities { difficulty, reply } => {
                let _ = reply.send(self.weights.describe(&difficulty));
            }
            SupervisorCommand::PendingCount { reply } => {
                let _ = reply.send(self.pending.len());
            }
            SupervisorCommand::Shutdown => {}
        }
    }

    // -- State --------------------------------------------------------------

    fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn transition(&mut self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::info!(from = %previous, to = %next, "connection state changed");
        }
    }

    fn is_active(&self, session: u64) -> bool {
        self.session.as_ref().is_some_and(|a| a.id == session)
    }

    // -- Public operations --------------------------------------------------

    fn connect(&mut self, credentials: Credentials) {
        let state = self.current();
        if state.is_busy() {
            tracing::debug!(%state, "connect ignored");
            return;
        }

        self.auto_reconnect = true;
        if let Err(error) = credentials.save(self.store.as_ref()) {
            tracing::warn!(%error, "could not cache credentials");
        }
        self.transition(ConnectionState::Connecting);

        if let Some(old) = self.session.take() {
            old.release();
        }
        self.next_session += 1;
        let session = self.next_session;

        let url = credentials.url();
        tracing::info!(session, %url, slot = %credentials.slot_name, "connecting");
        let connector = Arc::clone(&self.connector);
        let events = self.events_tx.clone();
        let ping_timeout = self.config.ping_timeout();
        let task = tokio::spawn(async move {
            match connector.connect(&url).await {
                Ok(conn) => {
                    let (socket, commands) = socket_channel();
                    if events.send(SupervisorEvent::SocketUp { session, socket }).is_ok() {
                        run_socket(conn, session, commands, events, ping_timeout).await;
                    }
                }
                Err(error) => {
                    let _ = events.send(SupervisorEvent::SocketClosed {
                        session,
                        reason: error.to_string(),
                    });
                }
            }
        });
        self.session = Some(ActiveSession {
            id: session,
            client: SessionClient::new(
                self.config.session.clone(),
                &credentials.slot_name,
                &credentials.password,
            ),
            socket: None,
            dial: Some(task),
        });

        self.schedule(self.config.connect_timeout(), SupervisorEvent::ConnectTimeout { session });
        self.keepalive.resume();
    }

    fn disconnect(&mut self) {
        self.auto_reconnect = false;
        if let Some(active) = self.session.take() {
            tracing::info!(session = active.id, "disconnecting");
            active.release();
        }
        self.keepalive.pause();
        self.transition(ConnectionState::Disconnected);
    }

    fn attempt_reconnect(&mut self) {
        if !self.auto_reconnect {
            tracing::debug!("reconnect skipped: automatic reconnection is off");
            return;
        }
        if self.session.as_ref().is_some_and(|a| a.socket.is_some()) {
            tracing::debug!("reconnect skipped: socket is open");
            return;
        }
        match Credentials::load(self.store.as_ref()) {
            Ok(credentials) => self.connect(credentials),
            Err(error) => tracing::warn!(%error, "reconnect aborted"),
        }
    }

    fn grant_reward(&mut self, difficulty: &str) -> RewardOutcome {
        let Some(active) = &self.session else {
            tracing::info!(difficulty, "no session; no hint granted");
            return RewardOutcome::Withheld(SessionError::NoProgressionRecords);
        };

        let location = {
            let mut rng = rand::rng();
            match active.client.choose_reward(difficulty, &self.weights, &mut rng) {
                Ok(location) => location,
                Err(error) => {
                    tracing::info!(difficulty, %error, "no hint granted");
                    return RewardOutcome::Withheld(error);
                }
            }
        };
        let command = match active.client.hint_request(&location) {
            Ok(command) => command,
            Err(error) => {
                tracing::warn!(%location, %error, "cannot request hint");
                return RewardOutcome::Withheld(error);
            }
        };

        let socket = active.socket.as_ref().filter(|_| active.client.is_open());
        if let Some(socket) = socket {
            match send_frame(&self.codec, socket, std::slice::from_ref(&command)) {
                Ok(()) => {
                    tracing::info!(difficulty, %location, "hint requested");
                    return RewardOutcome::Sent(location);
                }
                Err(error) => tracing::warn!(%error, "hint request not sent; queueing"),
            }
        }

        let slot_name = active.client.slot_name().to_owned();
        let password = active.client.password().to_owned();
        if let Err(error) = self.pending.enqueue(command, &slot_name, &password) {
            tracing::warn!(%error, "pending hint not persisted");
        }
        tracing::info!(difficulty, %location, pending = self.pending.len(), "hint request queued");
        RewardOutcome::Queued(location)
    }

    // -- Events -------------------------------------------------------------

    fn handle_event(&mut self, event: SupervisorEvent) {
        match event {
            SupervisorEvent::SocketUp { session, socket } => {
                let Some(active) = self.session.as_mut().filter(|a| a.id == session) else {
                    tracing::debug!(session, "socket for stale session; closing");
                    socket.close();
                    return;
                };
                active.socket = Some(socket);
                active.dial = None;
                let effects = active.client.open();
                self.perform(effects);
            }
            SupervisorEvent::Frame { session, data } => {
                if self.is_active(session) {
                    self.on_frame(&data);
                }
            }
            SupervisorEvent::SocketClosed { session, reason } => {
                if self.is_active(session) {
                    self.on_socket_closed(&reason);
                }
            }
            SupervisorEvent::FollowUp { session, step } => {
                let Some(active) = self.session.as_mut().filter(|a| a.id == session) else {
                    return;
                };
                let effects = active.client.follow_up(step);
                self.perform(effects);
            }
            SupervisorEvent::ConnectTimeout { session } => {
                if self.is_active(session) && self.current() == ConnectionState::Connecting {
                    tracing::warn!(session, "connect attempt timed out");
                    self.transition(ConnectionState::TimedOut);
                }
            }
            SupervisorEvent::PingResult { session, result } => {
                if self.is_active(session) {
                    self.on_ping_result(result);
                }
            }
        }
    }

    fn on_frame(&mut self, data: &[u8]) {
        let records = match decode_frame(&self.codec, data) {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!(%error, "dropping undecodable frame");
                return;
            }
        };
        for record in records {
            match record {
                Ok(command) => self.on_command(command),
                Err(error) => tracing::warn!(%error, "skipping malformed record"),
            }
        }
    }

    fn on_command(&mut self, command: ServerCommand) {
        let Some(active) = self.session.as_mut() else {
            return;
        };
        let mut deps = SessionDeps {
            datapacks: &mut self.datapacks,
            weights: &mut self.weights,
        };
        let effects = active.client.handle(command, &mut deps);
        self.perform(effects);
    }

    fn on_socket_closed(&mut self, reason: &str) {
        if let Some(active) = self.session.as_mut() {
            active.client.mark_closed();
            active.socket = None;
            active.dial = None;
        }
        tracing::info!(%reason, "session socket closed");
        if self.current() == ConnectionState::Connected {
            self.transition(ConnectionState::Disconnected);
        }
    }

    fn on_keepalive(&mut self) {
        if !self.auto_reconnect {
            return;
        }
        let socket = self
            .session
            .as_ref()
            .and_then(|a| a.socket.clone().map(|socket| (a.id, socket)));
        let Some((session, socket)) = socket else {
            self.attempt_reconnect();
            return;
        };
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = socket.ping().await;
            let _ = events.send(SupervisorEvent::PingResult { session, result });
        });
    }

    /// A successful ping promotes the state to `Connected` even if the
    /// server never answered `Connect`: the promotion means the socket is
    /// alive, not that the handshake completed. Such a session never runs
    /// `Opened`, so pending hints stay queued and the keepalive keeps
    /// pinging instead of reconnecting.
    fn on_ping_result(&mut self, result: Result<(), TransportError>) {
        match result {
            Ok(()) => {
                if self.current() != ConnectionState::Connected {
                    tracing::info!("ping succeeded; marking connected");
                    self.transition(ConnectionState::Connected);
                }
            }
            Err(error) => {
                tracing::warn!(%error, "keepalive ping failed");
                if let Some(active) = self.session.as_mut() {
                    active.client.mark_closed();
                    if let Some(socket) = active.socket.take() {
                        socket.close();
                    }
                }
                if self.current() == ConnectionState::Connected {
                    self.transition(ConnectionState::Disconnected);
                }
                self.attempt_reconnect();
            }
        }
    }

    // -- Effects ------------------------------------------------------------

    fn perform(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send(commands) => self.send(&commands),
                Effect::Opened => {
                    self.transition(ConnectionState::Connected);
                    self.dispatch_pending();
                }
                Effect::Schedule { delay, step } => {
                    if let Some(session) = self.session.as_ref().map(|a| a.id) {
                        self.schedule(delay, SupervisorEvent::FollowUp { session, step });
                    }
                }
                Effect::Notify(notice) => {
                    self.notices.notify(&notice);
                    if let Notice::NewHint {
                        message,
                        for_local_slot: true,
                    } = &notice
                    {
                        self.notices.push(message);
                    }
                }
                Effect::Disconnect => self.disconnect(),
            }
        }
    }

    fn send(&self, commands: &[ClientCommand]) {
        let Some(socket) = self.session.as_ref().and_then(|a| a.socket.as_ref()) else {
            tracing::debug!(count = commands.len(), "no open socket; commands dropped");
            return;
        };
        if let Err(error) = send_frame(&self.codec, socket, commands) {
            tracing::warn!(%error, "send failed");
        }
    }

    fn dispatch_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let Some(active) = &self.session else {
            return;
        };
        let Some(socket) = &active.socket else {
            return;
        };
        let codec = &self.codec;
        let result = self.pending.dispatch_all(
            active.client.slot_name(),
            active.client.password(),
            |command| send_frame(codec, socket, std::slice::from_ref(command)),
        );
        match result {
            Ok(summary) => tracing::info!(
                sent = summary.sent,
                skipped = summary.skipped,
                failed = summary.failed,
                remaining = summary.remaining,
                "dispatched pending hints"
            ),
            Err(error) => tracing::warn!(%error, "pending hints not persisted after dispatch"),
        }
    }

    fn schedule(&self, delay: Duration, event: SupervisorEvent) {
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(event);
        });
    }
}

fn send_frame(
    codec: &JsonCodec,
    socket: &SocketHandle,
    commands: &[ClientCommand],
) -> Result<(), HintforgeError> {
    let frame = encode_frame(codec, commands)?;
    tracing::debug!(
        commands = ?commands.iter().map(ClientCommand::name).collect::<Vec<_>>(),
        "sending frame"
    );
    socket.send(frame)?;
    Ok(())
}
