//! Line codec for the native input bridge.
//!
//! The bridge is an external long-running helper process that performs the
//! actual OS cursor/keyboard calls.  The relay speaks to it over its stdin:
//! one space-separated text command per line, fire-and-forget (the bridge
//! never acknowledges, and swallows lines it cannot parse).
//!
//! | line           | meaning                                         |
//! |----------------|-------------------------------------------------|
//! | `M <dx> <dy>`  | relative move, integer pixels                   |
//! | `MA <x> <y>`   | absolute move, normalized 0–1 of screen extent  |
//! | `C <L\|R\|M>`  | full click (down + up)                          |
//! | `D <L\|R\|M>`  | button down                                     |
//! | `U <L\|R\|M>`  | button up                                       |
//! | `S <dy> [dx]`  | scroll; vertical required, horizontal optional  |
//! | `K <text>`     | type literal text / special-key token           |

use std::fmt;

use crate::protocol::messages::MouseButtonName;

/// A single command on the bridge line protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeCommand {
    /// Relative cursor move in integer pixels.
    Move { dx: i32, dy: i32 },
    /// Absolute cursor move, coordinates normalized to 0–1 of screen extent.
    MoveTo { x: f64, y: f64 },
    /// Full click (down + up) of a button.
    Click(MouseButtonName),
    /// Button press.
    Down(MouseButtonName),
    /// Button release.
    Up(MouseButtonName),
    /// Scroll; vertical delta required, horizontal optional.
    Scroll { dy: i32, dx: Option<i32> },
    /// Type literal text or a special-key token.
    Key(String),
}

/// Single-letter button code used on the wire.
fn button_code(button: MouseButtonName) -> char {
    match button {
        MouseButtonName::Left => 'L',
        MouseButtonName::Right => 'R',
        MouseButtonName::Middle => 'M',
    }
}

impl BridgeCommand {
    /// Encodes this command as one protocol line (no trailing newline).
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BridgeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeCommand::Move { dx, dy } => write!(f, "M {dx} {dy}"),
            BridgeCommand::MoveTo { x, y } => write!(f, "MA {x} {y}"),
            BridgeCommand::Click(b) => write!(f, "C {}", button_code(*b)),
            BridgeCommand::Down(b) => write!(f, "D {}", button_code(*b)),
            BridgeCommand::Up(b) => write!(f, "U {}", button_code(*b)),
            BridgeCommand::Scroll { dy, dx: Some(dx) } => write!(f, "S {dy} {dx}"),
            BridgeCommand::Scroll { dy, dx: None } => write!(f, "S {dy}"),
            BridgeCommand::Key(text) => write!(f, "K {text}"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_move_encodes_signed_integers() {
        let line = BridgeCommand::Move { dx: -3, dy: 7 }.to_line();
        assert_eq!(line, "M -3 7");
    }

    #[test]
    fn test_absolute_move_encodes_normalized_floats() {
        let line = BridgeCommand::MoveTo { x: 0.5, y: 0.25 }.to_line();
        assert_eq!(line, "MA 0.5 0.25");
    }

    #[test]
    fn test_click_encodes_each_button_code() {
        assert_eq!(BridgeCommand::Click(MouseButtonName::Left).to_line(), "C L");
        assert_eq!(BridgeCommand::Click(MouseButtonName::Right).to_line(), "C R");
        assert_eq!(BridgeCommand::Click(MouseButtonName::Middle).to_line(), "C M");
    }

    #[test]
    fn test_down_and_up_share_button_codes_with_click() {
        assert_eq!(BridgeCommand::Down(MouseButtonName::Left).to_line(), "D L");
        assert_eq!(BridgeCommand::Up(MouseButtonName::Right).to_line(), "U R");
    }

    #[test]
    fn test_scroll_with_horizontal_component() {
        let line = BridgeCommand::Scroll { dy: -15, dx: Some(8) }.to_line();
        assert_eq!(line, "S -15 8");
    }

    #[test]
    fn test_scroll_vertical_only_omits_horizontal() {
        let line = BridgeCommand::Scroll { dy: 23, dx: None }.to_line();
        assert_eq!(line, "S 23");
    }

    #[test]
    fn test_key_passes_text_through_verbatim() {
        assert_eq!(BridgeCommand::Key("hello".into()).to_line(), "K hello");
        assert_eq!(
            BridgeCommand::Key("{BACKSPACE}".into()).to_line(),
            "K {BACKSPACE}"
        );
    }

    #[test]
    fn test_lines_never_contain_newlines() {
        // The bridge reads one command per line; an embedded newline would
        // split a command in two.
        let cmds = vec![
            BridgeCommand::Move { dx: 1, dy: 2 },
            BridgeCommand::Scroll { dy: 1, dx: None },
            BridgeCommand::Key("abc def".into()),
        ];
        for cmd in cmds {
            assert!(!cmd.to_line().contains('\n'));
        }
    }
}
