//! Touch gesture interpretation.
//!
//! Maps raw touch events from the trackpad surface to protocol commands.
//! The tricky part is that a single tap is ambiguous for a short while: it
//! might become a double tap, or the start of a double-tap-hold drag.  Taps
//! are therefore held back for a batching window before being committed as
//! single clicks.
//!
//! | gesture                         | commands                        |
//! |---------------------------------|---------------------------------|
//! | tap                             | `click` (after the window)      |
//! | tap, tap within the window      | `click` with `double`           |
//! | tap, then pan within the window | `mousedown`, moves, `mouseup`   |
//! | pan                             | `move` per delta                |
//! | two-finger tap                  | `click` with `button: right`    |
//!
//! The interpreter is a pure state machine: the caller supplies millisecond
//! timestamps with each event and arms a timer for
//! [`GestureInterpreter::pending_flush_at`] to deliver the deferred single
//! click via [`GestureInterpreter::on_timer`].

use pocketpad_core::{ClientCommand, MouseButtonName};

/// How long a tap stays eligible for double-tap and drag upgrades.
pub const TAP_WINDOW_MS: u64 = 200;

/// Gesture state machine for one trackpad surface.
#[derive(Debug, Default)]
pub struct GestureInterpreter {
    /// Timestamp of an uncommitted tap, if one is in the batching window.
    pending_tap_at: Option<u64>,
    /// A double-tap-hold drag is in progress.
    dragging: bool,
}

impl GestureInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while a button is held by a drag gesture.
    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// When the pending tap must be flushed as a single click, if any.
    /// The caller arms a timer for this instant and calls [`Self::on_timer`].
    pub fn pending_flush_at(&self) -> Option<u64> {
        self.pending_tap_at.map(|at| at + TAP_WINDOW_MS)
    }

    /// One-finger tap (touch down and up without movement).
    pub fn on_tap(&mut self, now_ms: u64) -> Vec<ClientCommand> {
        match self.pending_tap_at.take() {
            Some(first) if now_ms.saturating_sub(first) <= TAP_WINDOW_MS => {
                // Second tap inside the window: commit as one double click.
                vec![ClientCommand::Click {
                    button: MouseButtonName::Left,
                    double: true,
                }]
            }
            stale => {
                // A stale tap the timer has not flushed yet is committed
                // now; the new tap opens its own window.
                self.pending_tap_at = Some(now_ms);
                match stale {
                    Some(_) => vec![single_click()],
                    None => Vec::new(),
                }
            }
        }
    }

    /// A pan (one-finger movement) began.
    pub fn on_pan_start(&mut self, now_ms: u64) -> Vec<ClientCommand> {
        match self.pending_tap_at.take() {
            Some(first) if now_ms.saturating_sub(first) <= TAP_WINDOW_MS => {
                // Tap-then-hold: the pan drags with the button held.
                self.dragging = true;
                vec![ClientCommand::MouseDown {
                    button: MouseButtonName::Left,
                }]
            }
            Some(_) => vec![single_click()],
            None => Vec::new(),
        }
    }

    /// Pan movement delta, in touch units.
    pub fn on_pan_delta(&mut self, dx: f64, dy: f64) -> Vec<ClientCommand> {
        vec![ClientCommand::Move { dx, dy }]
    }

    /// The pan ended (finger lifted).
    pub fn on_pan_end(&mut self) -> Vec<ClientCommand> {
        if self.dragging {
            self.dragging = false;
            vec![ClientCommand::MouseUp {
                button: MouseButtonName::Left,
            }]
        } else {
            Vec::new()
        }
    }

    /// Two-finger tap: immediate right click, no batching window (there is
    /// no two-finger double-tap gesture to wait for).
    pub fn on_two_finger_tap(&mut self) -> Vec<ClientCommand> {
        self.pending_tap_at = None;
        vec![ClientCommand::Click {
            button: MouseButtonName::Right,
            double: false,
        }]
    }

    /// Two-finger pan delta, committed as scroll.
    pub fn on_two_finger_pan(&mut self, dx: f64, dy: f64) -> Vec<ClientCommand> {
        vec![ClientCommand::Scroll { dx, dy }]
    }

    /// Timer callback.  Commits the pending tap as a single click once its
    /// window has elapsed; early or spurious timer fires are no-ops.
    pub fn on_timer(&mut self, now_ms: u64) -> Vec<ClientCommand> {
        match self.pending_tap_at {
            Some(first) if now_ms.saturating_sub(first) >= TAP_WINDOW_MS => {
                self.pending_tap_at = None;
                vec![single_click()]
            }
            _ => Vec::new(),
        }
    }
}

fn single_click() -> ClientCommand {
    ClientCommand::Click {
        button: MouseButtonName::Left,
        double: false,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
