//! All PocketPad relay protocol message types.
//!
//! The wire format is newline-free JSON, one object per WebSocket text frame.
//! Every object carries a `"type"` field naming the command kind; all other
//! fields are flattened into the same object.  For example:
//!
//! ```json
//! {"type":"move","dx":4.5,"dy":-1.25}
//! {"type":"click","button":"right","double":false}
//! ```
//!
//! Serde's `#[serde(tag = "type")]` attribute handles the discriminant
//! automatically.
//!
//! # Direction
//!
//! [`ClientCommand`] flows client → relay.  [`ServerMessage`] flows
//! relay → client and exists only for the auth handshake result; the relay
//! never pushes anything else back.  Using two distinct types makes it a
//! compile-time error to send a command in the wrong direction.
//!
//! # Decode leniency
//!
//! An authenticated session must survive bad frames: an unrecognised command
//! kind is silently ignored and malformed JSON is logged and ignored, but
//! neither closes the socket.  [`decode_client_frame`] distinguishes the two
//! cases so the session handler can apply the right policy.

use serde::{Deserialize, Serialize};

// ── Mouse buttons ─────────────────────────────────────────────────────────────

/// Mouse button identifier as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButtonName {
    /// The default when a click/drag command omits the button.
    #[default]
    Left,
    Right,
    Middle,
}

// ── Client → relay commands ───────────────────────────────────────────────────

/// All commands a mobile client can send to the relay.
///
/// `auth` must be the first message on a new socket; every later message is
/// interpreted as an input command.  Commands are not queued at the protocol
/// layer: only `move` passes through the motion buffer, everything else is
/// forwarded to the bridge immediately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientCommand {
    /// Opens the session.  Must carry the shared token from the pairing
    /// payload; a mismatch closes the socket.
    Auth { token: String },

    /// Relative gesture delta in touch units (scaled by the relay's
    /// sensitivity factor before reaching the cursor).
    Move { dx: f64, dy: f64 },

    /// Full click (down + up).  `double` requests a second click shortly
    /// after the first.
    Click {
        #[serde(default)]
        button: MouseButtonName,
        #[serde(default)]
        double: bool,
    },

    /// Button press without release, the start of a drag.
    #[serde(rename = "mousedown")]
    MouseDown {
        #[serde(default)]
        button: MouseButtonName,
    },

    /// Button release ending a drag.
    #[serde(rename = "mouseup")]
    MouseUp {
        #[serde(default)]
        button: MouseButtonName,
    },

    /// Scroll delta; vertical and horizontal.
    Scroll { dx: f64, dy: f64 },

    /// Literal text or a bracket-delimited special-key token such as
    /// `{BACKSPACE}`, `{ENTER}`, `{TAB}` or `{ESC}`.
    Keypress { key: String },
}

impl ClientCommand {
    /// Returns the wire-level `"type"` string for this command.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientCommand::Auth { .. } => "auth",
            ClientCommand::Move { .. } => "move",
            ClientCommand::Click { .. } => "click",
            ClientCommand::MouseDown { .. } => "mousedown",
            ClientCommand::MouseUp { .. } => "mouseup",
            ClientCommand::Scroll { .. } => "scroll",
            ClientCommand::Keypress { .. } => "keypress",
        }
    }
}

/// Command kinds the protocol knows about.  Used by [`decode_client_frame`]
/// to tell "unknown kind" apart from "known kind with bad fields".
const KNOWN_KINDS: [&str; 7] = [
    "auth",
    "move",
    "click",
    "mousedown",
    "mouseup",
    "scroll",
    "keypress",
];

// ── Relay → client messages ───────────────────────────────────────────────────

/// Auth handshake result status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    Ok,
    Error,
}

/// Messages the relay sends back to the client.
///
/// The handshake is the only relay → client traffic; input flows one way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Result of the auth handshake.
    Auth {
        status: AuthStatus,
        /// Human-readable rejection reason, present only on errors that
        /// should be surfaced to the user (e.g. an authorization denial).
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        /// Entitlement flag carried on success.
        #[serde(skip_serializing_if = "Option::is_none")]
        pro: Option<bool>,
    },
}

impl ServerMessage {
    /// Builds a successful auth response carrying the pro entitlement flag.
    pub fn auth_ok(pro: bool) -> Self {
        ServerMessage::Auth {
            status: AuthStatus::Ok,
            message: None,
            pro: Some(pro),
        }
    }

    /// Builds an auth rejection, optionally with a user-facing reason.
    pub fn auth_error(message: Option<String>) -> Self {
        ServerMessage::Auth {
            status: AuthStatus::Error,
            message,
            pro: None,
        }
    }
}

// ── Frame decoding ────────────────────────────────────────────────────────────

/// Outcome of decoding one inbound text frame.
#[derive(Debug, PartialEq)]
pub enum FrameOutcome {
    /// A well-formed command.
    Command(ClientCommand),
    /// Valid JSON with a `"type"` the protocol does not know.  Policy:
    /// ignore without an error response.
    UnknownKind(String),
    /// Unparseable JSON, or a known kind with missing/invalid fields.
    /// Policy: log and ignore; a single bad frame never ends the session.
    Malformed(String),
}

/// Decodes one raw text frame into a [`FrameOutcome`].
///
/// The two-step decode (JSON value first, typed command second) exists so
/// the caller can distinguish an unrecognised command kind from a genuinely
/// malformed frame; the protocol treats them differently in logs.
pub fn decode_client_frame(raw: &str) -> FrameOutcome {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => return FrameOutcome::Malformed(format!("invalid JSON: {e}")),
    };

    let kind = match value.get("type").and_then(|t| t.as_str()) {
        Some(k) => k.to_owned(),
        None => return FrameOutcome::Malformed("missing \"type\" field".to_string()),
    };

    match serde_json::from_value::<ClientCommand>(value) {
        Ok(cmd) => FrameOutcome::Command(cmd),
        Err(e) => {
            if KNOWN_KINDS.contains(&kind.as_str()) {
                FrameOutcome::Malformed(format!("bad {kind} payload: {e}"))
            } else {
                FrameOutcome::UnknownKind(kind)
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
