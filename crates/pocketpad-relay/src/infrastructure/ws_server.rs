//! WebSocket server: accept loop, auth handshake and per-session loop.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming TCP connections from mobile clients.
//! 3. Upgrading each connection to a WebSocket session.
//! 4. Enforcing the auth-first handshake (token + authorization policy).
//! 5. Running the authenticated session loop: decoding input commands,
//!    feeding `move` deltas through the motion buffer, and forwarding
//!    everything else to the bridge via the dispatch plan.
//! 6. Gracefully shutting down when the `running` flag is cleared.
//!
//! # Scalability
//!
//! Each client session runs in its own Tokio task.  The accept loop never
//! blocks on a session: it accepts a connection and immediately spawns a
//! task for it before accepting the next one.  In practice one phone is
//! connected at a time, but nothing in the design assumes that.
//!
//! # Shutdown
//!
//! Shutdown is triggered by a shared `AtomicBool` that is set by a Ctrl+C
//! signal handler (see `main.rs`).  The accept loop uses a short timeout on
//! `accept()` so it can poll the flag even when no clients are connecting.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{interval, timeout, Interval};
use tokio_tungstenite::{
    accept_async,
    tungstenite::Message as WsMessage,
    WebSocketStream,
};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use pocketpad_core::{
    decode_client_frame, BridgeCommand, ClientCommand, FrameOutcome, MotionBuffer, MotionTick,
    ServerMessage, SmoothingConfig, TICK_INTERVAL,
};

use crate::application::authorize::{Entitlements, SessionAuthorizer};
use crate::application::dispatch::{translate_command, DispatchConfig, Outgoing};
use crate::domain::config::RelayConfig;
use crate::infrastructure::bridge::BridgeTransport;

/// State shared by every session task: the token to check, the policy to
/// consult and the bridge to write to.
struct SessionShared {
    token: String,
    authorizer: Arc<dyn SessionAuthorizer>,
    bridge: Arc<dyn BridgeTransport>,
    smoothing: SmoothingConfig,
    dispatch: DispatchConfig,
}

/// The relay's WebSocket listener.
///
/// `bind` and `run` are separate so the caller can read the bound address
/// (for the pairing payload, and for tests binding port 0) before the
/// accept loop starts.
pub struct RelayServer {
    listener: TcpListener,
    shared: Arc<SessionShared>,
}

impl RelayServer {
    /// Binds the TCP listener and prepares the shared session state.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound (port in use,
    /// missing bind permission, unparseable bind address).
    pub async fn bind(
        config: &RelayConfig,
        token: String,
        authorizer: Arc<dyn SessionAuthorizer>,
        bridge: Arc<dyn BridgeTransport>,
    ) -> anyhow::Result<Self> {
        let bind_addr = format!("{}:{}", config.bind_address, config.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("failed to bind relay listener on {bind_addr}"))?;

        let shared = Arc::new(SessionShared {
            token,
            authorizer,
            bridge,
            smoothing: SmoothingConfig {
                sensitivity: config.sensitivity,
                ..SmoothingConfig::default()
            },
            dispatch: DispatchConfig {
                scroll_sensitivity: config.scroll_sensitivity,
                double_click_delay: Duration::from_millis(config.double_click_delay_ms),
            },
        });

        Ok(Self { listener, shared })
    }

    /// The address the listener actually bound, with the resolved port.
    ///
    /// # Errors
    ///
    /// Propagates the OS error if the local address cannot be read.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop until `running` is cleared.
    pub async fn run(self, running: Arc<AtomicBool>) -> anyhow::Result<()> {
        if let Ok(addr) = self.local_addr() {
            info!("relay listening on {addr}");
        }

        loop {
            if !running.load(Ordering::Relaxed) {
                info!("shutdown flag set; stopping accept loop");
                break;
            }

            // Short timeout so the loop can poll the shutdown flag even
            // when no clients are connecting.
            let accept_result = timeout(Duration::from_millis(200), self.listener.accept()).await;

            match accept_result {
                Ok(Ok((stream, peer_addr))) => {
                    // One id per session so interleaved session logs stay
                    // attributable.
                    let session_id = Uuid::new_v4();
                    info!("new client connection from {peer_addr} (session {session_id})");
                    let shared = Arc::clone(&self.shared);
                    let span = info_span!("session", id = %session_id);
                    tokio::spawn(
                        async move {
                            handle_client_session(stream, peer_addr, shared).await;
                        }
                        .instrument(span),
                    );
                }
                Ok(Err(e)) => {
                    // Transient accept error; keep the relay alive.
                    error!("accept error: {e}");
                }
                Err(_) => {
                    // Timeout, loop back to check the flag.
                }
            }
        }

        Ok(())
    }
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Entry point of each per-session task.  Wraps [`run_session`] and logs
/// the outcome; `?`-style propagation stays inside the inner function.
async fn handle_client_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    shared: Arc<SessionShared>,
) {
    match run_session(raw_stream, peer_addr, shared).await {
        Ok(()) => info!("session {peer_addr} closed"),
        Err(e) => warn!("session {peer_addr} closed with error: {e:#}"),
    }
}

/// Runs the complete lifecycle of one client session: WebSocket upgrade,
/// auth handshake, then the input loop.
async fn run_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    shared: Arc<SessionShared>,
) -> anyhow::Result<()> {
    let mut ws = accept_async(raw_stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    let entitlements = match authenticate(&mut ws, peer_addr, &shared).await? {
        Some(e) => e,
        None => {
            // Rejection already answered and logged; close and stop.
            ws.close(None).await.ok();
            return Ok(());
        }
    };

    info!(
        "session {peer_addr} authenticated (pro = {})",
        entitlements.pro
    );
    run_input_loop(&mut ws, peer_addr, &shared).await;
    Ok(())
}

/// Enforces the auth-first handshake.
///
/// The first text frame on a fresh socket must be a well-formed `auth`
/// command.  Outcomes:
///
/// - correct token and policy approval → `auth` ok reply, returns the
///   session's entitlements;
/// - wrong token → `auth` error reply without a message (the client shows
///   a generic failure), returns `None`;
/// - policy denial → `auth` error reply carrying the reason, returns `None`;
/// - anything else first (another command, malformed JSON, a binary frame)
///   → protocol violation, no reply at all, returns `None`.
async fn authenticate(
    ws: &mut WebSocketStream<TcpStream>,
    peer_addr: SocketAddr,
    shared: &SessionShared,
) -> anyhow::Result<Option<Entitlements>> {
    loop {
        let frame = match ws.next().await {
            Some(Ok(f)) => f,
            Some(Err(e)) => {
                debug!("session {peer_addr}: socket error before auth: {e}");
                return Ok(None);
            }
            None => {
                debug!("session {peer_addr}: closed before auth");
                return Ok(None);
            }
        };

        let text = match frame {
            WsMessage::Text(text) => text,
            // Transport-level frames carry no commands; keep waiting.
            WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
            WsMessage::Close(_) => {
                debug!("session {peer_addr}: closed before auth");
                return Ok(None);
            }
            other => {
                warn!("session {peer_addr}: non-text frame before auth ({other:?})");
                return Ok(None);
            }
        };

        let token = match decode_client_frame(&text) {
            FrameOutcome::Command(ClientCommand::Auth { token }) => token,
            outcome => {
                // An unauthenticated peer gets no diagnostics to probe with.
                warn!("session {peer_addr}: first frame was not auth ({outcome:?})");
                return Ok(None);
            }
        };

        if token != shared.token {
            warn!("session {peer_addr}: auth failed (bad token)");
            send_reply(ws, &ServerMessage::auth_error(None)).await;
            return Ok(None);
        }

        return match shared.authorizer.authorize().await {
            Ok(entitlements) => {
                send_reply(ws, &ServerMessage::auth_ok(entitlements.pro)).await;
                Ok(Some(entitlements))
            }
            Err(reason) => {
                warn!("session {peer_addr}: authorization denied: {reason}");
                send_reply(ws, &ServerMessage::auth_error(Some(reason))).await;
                Ok(None)
            }
        };
    }
}

/// The authenticated input loop.
///
/// Owns this session's [`MotionBuffer`].  The drain ticker is armed only
/// while the buffer holds pending motion; with no gesture in flight the
/// loop is purely event-driven and costs nothing.
async fn run_input_loop(
    ws: &mut WebSocketStream<TcpStream>,
    peer_addr: SocketAddr,
    shared: &SessionShared,
) {
    let mut buffer = MotionBuffer::new(shared.smoothing);
    let mut ticker: Option<Interval> = None;

    loop {
        tokio::select! {
            frame = ws.next() => {
                let frame = match frame {
                    Some(Ok(f)) => f,
                    Some(Err(e)) => {
                        debug!("session {peer_addr}: socket error: {e}");
                        break;
                    }
                    None => break,
                };

                match frame {
                    WsMessage::Text(text) => {
                        handle_frame(&text, peer_addr, shared, &mut buffer).await;
                        if ticker.is_none() && !buffer.is_drained() {
                            ticker = Some(interval(TICK_INTERVAL));
                        }
                    }
                    WsMessage::Binary(_) => {
                        // The protocol is JSON text frames only.
                        warn!("session {peer_addr}: unexpected binary frame (ignored)");
                    }
                    WsMessage::Ping(_) | WsMessage::Pong(_) => {}
                    WsMessage::Close(_) => break,
                    WsMessage::Frame(_) => {
                        debug!("session {peer_addr}: raw frame (ignored)");
                    }
                }
            }

            _ = tick_when_armed(&mut ticker) => {
                match buffer.tick() {
                    MotionTick::Drained => {
                        // Disarm until the next move command.
                        ticker = None;
                    }
                    MotionTick::Settled => {}
                    MotionTick::Move { dx, dy } => {
                        shared.bridge.send(&BridgeCommand::Move { dx, dy }).await;
                    }
                }
            }
        }
    }
}

/// Resolves on the next drain tick, or never when the ticker is disarmed.
async fn tick_when_armed(ticker: &mut Option<Interval>) {
    match ticker.as_mut() {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Decodes and executes one authenticated text frame.
async fn handle_frame(
    text: &str,
    peer_addr: SocketAddr,
    shared: &SessionShared,
    buffer: &mut MotionBuffer,
) {
    let command = match decode_client_frame(text) {
        FrameOutcome::Command(cmd) => cmd,
        FrameOutcome::UnknownKind(kind) => {
            // Newer clients may send kinds this relay predates.
            debug!("session {peer_addr}: ignoring unknown command kind {kind:?}");
            return;
        }
        FrameOutcome::Malformed(reason) => {
            // One bad frame never ends an authenticated session.
            warn!("session {peer_addr}: malformed frame ignored: {reason}");
            return;
        }
    };

    match &command {
        ClientCommand::Auth { .. } => {
            // Already authenticated; a repeat auth is harmless noise.
            debug!("session {peer_addr}: redundant auth ignored");
        }
        ClientCommand::Move { dx, dy } => {
            buffer.push(*dx, *dy);
        }
        _ => {
            for outgoing in translate_command(&command, &shared.dispatch) {
                match outgoing {
                    Outgoing::Now(cmd) => shared.bridge.send(&cmd).await,
                    Outgoing::After(delay, cmd) => {
                        let bridge = Arc::clone(&shared.bridge);
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            bridge.send(&cmd).await;
                        });
                    }
                }
            }
        }
    }
}

/// Serializes and sends one handshake reply, absorbing send failures (a
/// peer that vanished mid-handshake needs no further handling).
async fn send_reply(ws: &mut WebSocketStream<TcpStream>, message: &ServerMessage) {
    match serde_json::to_string(message) {
        Ok(json) => {
            if ws.send(WsMessage::Text(json)).await.is_err() {
                debug!("handshake reply not delivered (peer gone)");
            }
        }
        Err(e) => error!("failed to serialize handshake reply: {e}"),
    }
}
