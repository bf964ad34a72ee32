//! Network infrastructure for the client: the connection resolver.
//!
//! A pairing payload can carry several candidate addresses (Wi-Fi,
//! Ethernet, VPN) but only some of them are reachable from the phone.  The
//! resolver tries them in order with a per-attempt timeout and binds the
//! session to the first address that completes the auth handshake.
//!
//! Architecture:
//! - [`RelayClient`] owns the WebSocket session and a background resolver
//!   task; at most one of each exists per client.
//! - Lifecycle changes are delivered to the caller as [`ClientEvent`]s on
//!   an `mpsc` channel.
//! - Outbound commands go through a shared sink slot, which is `None`
//!   whenever no session is active.
//!
//! # Reconnection
//!
//! Once a session was active, a drop enters an endless retry loop against
//! the *bound* address only, at a fixed interval.  The other candidates
//! are never retried: the address that worked once is overwhelmingly
//! likely to be the right one, and probing dead candidates from a phone
//! radio is expensive.  An auth rejection is terminal in every phase;
//! retrying a bad token cannot succeed.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use pocketpad_core::{AuthStatus, ClientCommand, MouseButtonName, PairingPayload, ServerMessage};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Errors surfaced by the client network layer.
#[derive(Debug, Error)]
pub enum ClientNetworkError {
    /// The pairing payload contained no candidate addresses.
    #[error("pairing payload carries no addresses to connect to")]
    NoCandidates,
    /// A command was submitted while no session was active.
    #[error("not connected to a relay")]
    NotConnected,
}

/// Configuration for the connection resolver.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Candidate addresses in preference order.  An entry may embed its
    /// own port (`"10.0.0.5:4810"`), which overrides `port` for that
    /// candidate.
    pub addresses: Vec<String>,
    /// Default relay port for candidates without an embedded port.
    pub port: u16,
    /// Token presented in the auth handshake.
    pub token: String,
    /// Budget for one connection attempt, handshake included.
    pub attempt_timeout: Duration,
    /// Pause between reconnect attempts to the bound address.
    pub reconnect_interval: Duration,
}

impl ConnectionConfig {
    /// Builds a config from a scanned pairing payload.
    ///
    /// # Errors
    ///
    /// Returns [`ClientNetworkError::NoCandidates`] when the payload has
    /// neither an `ips` list nor a legacy `ip` field.
    pub fn from_payload(payload: &PairingPayload) -> Result<Self, ClientNetworkError> {
        let addresses = payload.candidates();
        if addresses.is_empty() {
            return Err(ClientNetworkError::NoCandidates);
        }
        Ok(Self {
            addresses,
            port: payload.port,
            token: payload.token.clone(),
            attempt_timeout: Duration::from_secs(3),
            reconnect_interval: Duration::from_secs(3),
        })
    }

    /// Resolves one candidate to a `host:port` endpoint, honouring an
    /// embedded per-candidate port.
    fn endpoint(&self, address: &str) -> String {
        if address.contains(':') {
            address.to_string()
        } else {
            format!("{address}:{}", self.port)
        }
    }
}

/// Lifecycle of the client's single session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection and none in progress.
    Idle,
    /// Walking the candidate list.
    Connecting,
    /// Authenticated session established.
    Active,
    /// Session dropped; retrying the bound address.
    Reconnecting,
    /// Closed by explicit request.
    Disconnected,
    /// Terminal: candidates exhausted or auth rejected.
    Failed,
}

/// Events emitted by the resolver to the caller (typically the UI).
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// An attempt against this candidate address started.
    Connecting { address: String },
    /// Authenticated session established on this address.
    Active { address: String, pro: bool },
    /// The relay rejected the auth handshake.  Terminal.
    AuthRejected { message: Option<String> },
    /// An active session dropped.
    Disconnected,
    /// Retrying the bound address after a drop.
    Reconnecting { address: String },
    /// Every candidate failed.  Terminal.
    Failed,
}

/// Outcome of one connection attempt against one endpoint.
enum Attempt {
    /// Handshake completed.  The caller installs the sink and drives the
    /// stream; nothing is shared until it does.
    Established {
        sink: WsSink,
        stream: WsStream,
        pro: bool,
    },
    /// The relay answered the handshake with an auth error.
    Rejected { message: Option<String> },
    /// Timeout, refused connection, or a broken handshake.
    Unreachable(String),
}

/// Client-side connection manager.
///
/// Create with [`RelayClient::new`], start with [`RelayClient::connect`].
/// `connect` may be called again at any time; the previous resolver and
/// session are abandoned first.  [`RelayClient::disconnect`] clears the
/// pairing, so resuming after it requires a new client built from a fresh
/// payload.
pub struct RelayClient {
    config: StdMutex<Option<ConnectionConfig>>,
    state: StdMutex<SessionState>,
    sink: Mutex<Option<WsSink>>,
    events: mpsc::Sender<ClientEvent>,
    resolver: StdMutex<Option<JoinHandle<()>>>,
}

impl RelayClient {
    /// Creates a client in the [`SessionState::Idle`] state and returns
    /// the event channel the caller should drain.
    pub fn new(config: ConnectionConfig) -> (Arc<Self>, mpsc::Receiver<ClientEvent>) {
        let (tx, rx) = mpsc::channel(64);
        let client = Arc::new(Self {
            config: StdMutex::new(Some(config)),
            state: StdMutex::new(SessionState::Idle),
            sink: Mutex::new(None),
            events: tx,
            resolver: StdMutex::new(None),
        });
        (client, rx)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(SessionState::Failed)
    }

    /// Starts (or restarts) the resolver.
    ///
    /// A resolver already running is aborted first, so the newest call
    /// always wins; its session, if any, is torn down with it.  After
    /// [`Self::disconnect`] the pairing is gone and this is a no-op.
    pub fn connect(self: Arc<Self>) {
        let config = match self.config.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        };
        let Some(config) = config else {
            warn!("connect ignored: the pairing was cleared by disconnect");
            return;
        };

        let this = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            this.run_resolver(config).await;
        });

        if let Ok(mut slot) = self.resolver.lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
    }

    /// Tears the session down, stops reconnecting, and forgets the
    /// pairing.  Terminal: connecting again takes a new client built from
    /// a fresh payload.
    pub async fn disconnect(&self) {
        if let Ok(mut slot) = self.resolver.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
        if let Ok(mut config) = self.config.lock() {
            *config = None;
        }
        *self.sink.lock().await = None;
        self.set_state(SessionState::Disconnected);
        self.emit(ClientEvent::Disconnected).await;
    }

    // ── Outbound commands ─────────────────────────────────────────────────────

    /// Sends one input command on the active session.
    ///
    /// # Errors
    ///
    /// Returns [`ClientNetworkError::NotConnected`] when no session is
    /// active; the caller should drop the gesture rather than queue it
    /// (stale input replayed after a reconnect is worse than lost input).
    pub async fn send_command(&self, command: &ClientCommand) -> Result<(), ClientNetworkError> {
        if self.state() != SessionState::Active {
            return Err(ClientNetworkError::NotConnected);
        }

        let json = match serde_json::to_string(command) {
            Ok(json) => json,
            Err(e) => {
                warn!("failed to serialize {}: {e}", command.kind());
                return Ok(());
            }
        };

        let mut guard = self.sink.lock().await;
        match guard.as_mut() {
            Some(sink) => {
                if let Err(e) = sink.send(Message::Text(json)).await {
                    // The read loop will notice the drop and reconnect.
                    debug!("send failed, session dropping: {e}");
                }
                Ok(())
            }
            None => Err(ClientNetworkError::NotConnected),
        }
    }

    // The gesture vocabulary, as named senders.  Unlike [`Self::send_command`]
    // these drop the command silently when no session is active: gestures
    // made mid-reconnect are stale by the time a session returns.

    /// Sends a relative move delta in touch units.
    pub async fn move_delta(&self, dx: f64, dy: f64) {
        self.send_quiet(ClientCommand::Move { dx, dy }).await;
    }

    /// Sends a click, optionally doubled.
    pub async fn click(&self, button: MouseButtonName, double: bool) {
        self.send_quiet(ClientCommand::Click { button, double }).await;
    }

    /// Presses a button without releasing it (drag start).
    pub async fn mouse_down(&self, button: MouseButtonName) {
        self.send_quiet(ClientCommand::MouseDown { button }).await;
    }

    /// Releases a held button (drag end).
    pub async fn mouse_up(&self, button: MouseButtonName) {
        self.send_quiet(ClientCommand::MouseUp { button }).await;
    }

    /// Sends a scroll delta in touch units.
    pub async fn scroll(&self, dx: f64, dy: f64) {
        self.send_quiet(ClientCommand::Scroll { dx, dy }).await;
    }

    /// Types literal text or a `{BACKSPACE}`-style special-key token.
    pub async fn keypress(&self, key: impl Into<String>) {
        self.send_quiet(ClientCommand::Keypress { key: key.into() }).await;
    }

    async fn send_quiet(&self, command: ClientCommand) {
        if let Err(e) = self.send_command(&command).await {
            debug!("{} dropped: {e}", command.kind());
        }
    }

    // ── Resolver ──────────────────────────────────────────────────────────────

    /// Full lifecycle: candidate walk, then the active/reconnect loop.
    async fn run_resolver(self: Arc<Self>, config: ConnectionConfig) {
        self.set_state(SessionState::Connecting);

        // Phase 1: first handshake wins, in payload order.
        let mut bound: Option<(String, WsStream)> = None;
        for address in &config.addresses {
            let endpoint = config.endpoint(address);
            self.emit(ClientEvent::Connecting {
                address: address.clone(),
            })
            .await;

            match self.attempt(&config, &endpoint).await {
                Attempt::Established { sink, stream, pro } => {
                    info!("session established with {endpoint}");
                    *self.sink.lock().await = Some(sink);
                    self.set_state(SessionState::Active);
                    self.emit(ClientEvent::Active {
                        address: address.clone(),
                        pro,
                    })
                    .await;
                    bound = Some((address.clone(), stream));
                    break;
                }
                Attempt::Rejected { message } => {
                    warn!("relay at {endpoint} rejected auth");
                    self.fail(ClientEvent::AuthRejected { message }).await;
                    return;
                }
                Attempt::Unreachable(reason) => {
                    debug!("candidate {endpoint} unreachable: {reason}");
                }
            }
        }

        let (address, mut stream) = match bound {
            Some(b) => b,
            None => {
                warn!("all {} candidate(s) failed", config.addresses.len());
                self.fail(ClientEvent::Failed).await;
                return;
            }
        };
        let endpoint = config.endpoint(&address);

        // Phase 2: drive the session; on drop, retry the bound address only.
        loop {
            self.read_until_closed(&mut stream).await;

            *self.sink.lock().await = None;
            self.set_state(SessionState::Reconnecting);
            self.emit(ClientEvent::Disconnected).await;
            info!(
                "session with {endpoint} dropped; reconnecting every {:?}",
                config.reconnect_interval
            );

            stream = loop {
                time::sleep(config.reconnect_interval).await;
                self.emit(ClientEvent::Reconnecting {
                    address: address.clone(),
                })
                .await;

                match self.attempt(&config, &endpoint).await {
                    Attempt::Established { sink, stream, pro } => {
                        info!("session re-established with {endpoint}");
                        *self.sink.lock().await = Some(sink);
                        self.set_state(SessionState::Active);
                        self.emit(ClientEvent::Active {
                            address: address.clone(),
                            pro,
                        })
                        .await;
                        break stream;
                    }
                    Attempt::Rejected { message } => {
                        // The relay restarted and minted a new token; only
                        // a fresh pairing can fix that.
                        warn!("relay at {endpoint} rejected auth on reconnect");
                        self.fail(ClientEvent::AuthRejected { message }).await;
                        return;
                    }
                    Attempt::Unreachable(reason) => {
                        debug!("reconnect to {endpoint} failed: {reason}");
                    }
                }
            };
        }
    }

    /// One bounded connection attempt: TCP + WebSocket upgrade + auth
    /// handshake, all within `attempt_timeout`.
    ///
    /// Side-effect free until it returns: a timed-out attempt is dropped
    /// whole, so no half-established session can leak into the sink slot.
    async fn attempt(&self, config: &ConnectionConfig, endpoint: &str) -> Attempt {
        let url = format!("ws://{endpoint}");
        let token = config.token.clone();

        let handshake = async {
            let (ws, _) = match connect_async(&url).await {
                Ok(ok) => ok,
                Err(e) => return Attempt::Unreachable(format!("connect: {e}")),
            };
            let (mut sink, mut stream) = ws.split();

            let auth = ClientCommand::Auth { token };
            let json = match serde_json::to_string(&auth) {
                Ok(json) => json,
                Err(e) => return Attempt::Unreachable(format!("encode auth: {e}")),
            };
            if let Err(e) = sink.send(Message::Text(json)).await {
                return Attempt::Unreachable(format!("send auth: {e}"));
            }

            // The reply is the first text frame; transport frames may
            // precede it.
            loop {
                let frame = match stream.next().await {
                    Some(Ok(f)) => f,
                    Some(Err(e)) => return Attempt::Unreachable(format!("handshake read: {e}")),
                    None => return Attempt::Unreachable("closed during handshake".to_string()),
                };
                let text = match frame {
                    Message::Text(text) => text,
                    Message::Ping(_) | Message::Pong(_) => continue,
                    _ => return Attempt::Unreachable("non-text handshake reply".to_string()),
                };
                return match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(ServerMessage::Auth { status, message, pro }) => match status {
                        AuthStatus::Ok => Attempt::Established {
                            sink,
                            stream,
                            pro: pro.unwrap_or(false),
                        },
                        AuthStatus::Error => Attempt::Rejected { message },
                    },
                    Err(e) => Attempt::Unreachable(format!("bad handshake reply: {e}")),
                };
            }
        };

        match time::timeout(config.attempt_timeout, handshake).await {
            Ok(outcome) => outcome,
            Err(_) => Attempt::Unreachable("attempt timed out".to_string()),
        }
    }

    /// Consumes inbound frames until the session ends.  The relay pushes
    /// nothing after the handshake, so this loop exists purely to detect
    /// the drop.
    async fn read_until_closed(&self, stream: &mut WsStream) {
        loop {
            match stream.next().await {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("session read error: {e}");
                    break;
                }
            }
        }
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn set_state(&self, state: SessionState) {
        if let Ok(mut guard) = self.state.lock() {
            *guard = state;
        }
    }

    async fn emit(&self, event: ClientEvent) {
        // A full or dropped receiver only costs us the notification.
        let _ = self.events.send(event).await;
    }

    async fn fail(&self, event: ClientEvent) {
        *self.sink.lock().await = None;
        self.set_state(SessionState::Failed);
        self.emit(event).await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(addresses: Vec<&str>) -> ConnectionConfig {
        ConnectionConfig {
            addresses: addresses.into_iter().map(String::from).collect(),
            port: 4724,
            token: "tok".to_string(),
            attempt_timeout: Duration::from_millis(200),
            reconnect_interval: Duration::from_millis(100),
        }
    }

    #[test]
    fn test_from_payload_copies_candidates_port_and_token() {
        let payload = PairingPayload::new(
            vec!["192.168.1.8".into(), "10.0.0.8".into()],
            4724,
            "abcd1234".into(),
            "desk".into(),
        );

        let config = ConnectionConfig::from_payload(&payload).unwrap();
        assert_eq!(config.addresses, vec!["192.168.1.8", "10.0.0.8"]);
        assert_eq!(config.port, 4724);
        assert_eq!(config.token, "abcd1234");
        assert_eq!(config.attempt_timeout, Duration::from_secs(3));
        assert_eq!(config.reconnect_interval, Duration::from_secs(3));
    }

    #[test]
    fn test_from_payload_without_addresses_is_an_error() {
        let json = r#"{"port":4724,"token":"t","name":"x"}"#;
        let payload: PairingPayload = serde_json::from_str(json).unwrap();
        assert!(matches!(
            ConnectionConfig::from_payload(&payload),
            Err(ClientNetworkError::NoCandidates)
        ));
    }

    #[test]
    fn test_endpoint_appends_default_port() {
        let config = test_config(vec!["192.168.1.8"]);
        assert_eq!(config.endpoint("192.168.1.8"), "192.168.1.8:4724");
    }

    #[test]
    fn test_endpoint_honours_embedded_port() {
        let config = test_config(vec!["192.168.1.8:5000"]);
        assert_eq!(config.endpoint("192.168.1.8:5000"), "192.168.1.8:5000");
    }

    #[test]
    fn test_new_client_starts_idle() {
        let (client, _rx) = RelayClient::new(test_config(vec!["10.0.0.1"]));
        assert_eq!(client.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_send_command_while_idle_is_rejected() {
        let (client, _rx) = RelayClient::new(test_config(vec!["10.0.0.1"]));
        let result = client
            .send_command(&ClientCommand::Move { dx: 1.0, dy: 1.0 })
            .await;
        assert!(matches!(result, Err(ClientNetworkError::NotConnected)));
    }

    #[tokio::test]
    async fn test_named_senders_drop_silently_while_idle() {
        let (client, _rx) = RelayClient::new(test_config(vec!["10.0.0.1"]));

        // None of these may panic or error without a session.
        client.move_delta(1.0, 2.0).await;
        client.click(MouseButtonName::Left, false).await;
        client.mouse_down(MouseButtonName::Left).await;
        client.mouse_up(MouseButtonName::Left).await;
        client.scroll(0.0, -1.0).await;
        client.keypress("{ENTER}").await;

        assert_eq!(client.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_disconnect_is_terminal_and_emits_event() {
        let (client, mut rx) = RelayClient::new(test_config(vec!["10.0.0.1"]));
        client.disconnect().await;
        assert_eq!(client.state(), SessionState::Disconnected);
        assert_eq!(rx.recv().await, Some(ClientEvent::Disconnected));
    }

    #[tokio::test]
    async fn test_connect_after_disconnect_does_not_resume_the_old_pairing() {
        let (client, mut rx) = RelayClient::new(test_config(vec!["10.0.0.1"]));
        client.disconnect().await;
        assert_eq!(rx.recv().await, Some(ClientEvent::Disconnected));

        // The pairing is gone, so no resolver may start.
        Arc::clone(&client).connect();
        time::sleep(Duration::from_millis(150)).await;
        assert_eq!(client.state(), SessionState::Disconnected);
        assert!(rx.try_recv().is_err(), "no events after a cleared pairing");
    }
}
