//! Translation of client commands into bridge commands.
//!
//! Pure planning only: this module decides *which* bridge lines a command
//! produces and *when*, but never touches the bridge or the clock itself.
//! The session handler executes the plan (spawning a sleep for delayed
//! items), which keeps the timing rules unit-testable.
//!
//! `auth` and `move` never reach this module: auth is consumed by the
//! handshake and move deltas feed the motion buffer instead.

use std::time::Duration;

use pocketpad_core::{BridgeCommand, ClientCommand};

/// Timing/scaling knobs for command translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchConfig {
    /// Multiplier applied to scroll deltas before rounding.
    pub scroll_sensitivity: f64,
    /// Gap between the two clicks of a double click.
    pub double_click_delay: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            scroll_sensitivity: 7.5,
            double_click_delay: Duration::from_millis(100),
        }
    }
}

/// One planned bridge command, immediate or deferred.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    /// Send to the bridge right away.
    Now(BridgeCommand),
    /// Send after the given delay, without blocking the session loop.
    After(Duration, BridgeCommand),
}

/// Plans the bridge commands for one input command.
///
/// Returns an empty plan for commands that produce no bridge traffic:
/// `auth` and `move` (handled elsewhere) and scrolls whose scaled deltas
/// round to zero on both axes.
pub fn translate_command(command: &ClientCommand, config: &DispatchConfig) -> Vec<Outgoing> {
    match command {
        ClientCommand::Auth { .. } | ClientCommand::Move { .. } => Vec::new(),

        ClientCommand::Click { button, double } => {
            let mut plan = vec![Outgoing::Now(BridgeCommand::Click(*button))];
            if *double {
                // The second click must land after the OS has registered the
                // first as complete, or it merges into one long press.
                plan.push(Outgoing::After(
                    config.double_click_delay,
                    BridgeCommand::Click(*button),
                ));
            }
            plan
        }

        ClientCommand::MouseDown { button } => {
            vec![Outgoing::Now(BridgeCommand::Down(*button))]
        }

        ClientCommand::MouseUp { button } => {
            vec![Outgoing::Now(BridgeCommand::Up(*button))]
        }

        ClientCommand::Scroll { dx, dy } => {
            let scaled_dy = (dy * config.scroll_sensitivity).round() as i32;
            let scaled_dx = (dx * config.scroll_sensitivity).round() as i32;
            if scaled_dy == 0 && scaled_dx == 0 {
                return Vec::new();
            }
            let dx = if scaled_dx != 0 { Some(scaled_dx) } else { None };
            vec![Outgoing::Now(BridgeCommand::Scroll { dy: scaled_dy, dx })]
        }

        ClientCommand::Keypress { key } => {
            vec![Outgoing::Now(BridgeCommand::Key(key.clone()))]
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pocketpad_core::MouseButtonName;

    #[test]
    fn test_single_click_plans_one_immediate_click() {
        let plan = translate_command(
            &ClientCommand::Click {
                button: MouseButtonName::Left,
                double: false,
            },
            &DispatchConfig::default(),
        );
        assert_eq!(
            plan,
            vec![Outgoing::Now(BridgeCommand::Click(MouseButtonName::Left))]
        );
    }

    #[test]
    fn test_double_click_plans_second_click_after_configured_delay() {
        let plan = translate_command(
            &ClientCommand::Click {
                button: MouseButtonName::Left,
                double: true,
            },
            &DispatchConfig::default(),
        );
        assert_eq!(
            plan,
            vec![
                Outgoing::Now(BridgeCommand::Click(MouseButtonName::Left)),
                Outgoing::After(
                    Duration::from_millis(100),
                    BridgeCommand::Click(MouseButtonName::Left)
                ),
            ]
        );
    }

    #[test]
    fn test_mousedown_and_mouseup_preserve_button() {
        let down = translate_command(
            &ClientCommand::MouseDown {
                button: MouseButtonName::Right,
            },
            &DispatchConfig::default(),
        );
        let up = translate_command(
            &ClientCommand::MouseUp {
                button: MouseButtonName::Right,
            },
            &DispatchConfig::default(),
        );
        assert_eq!(
            down,
            vec![Outgoing::Now(BridgeCommand::Down(MouseButtonName::Right))]
        );
        assert_eq!(
            up,
            vec![Outgoing::Now(BridgeCommand::Up(MouseButtonName::Right))]
        );
    }

    #[test]
    fn test_scroll_scales_by_sensitivity_and_rounds() {
        // -2.0 * 7.5 = -15 vertical, 1.0 * 7.5 ≈ 8 horizontal
        let plan = translate_command(
            &ClientCommand::Scroll { dx: 1.0, dy: -2.0 },
            &DispatchConfig::default(),
        );
        assert_eq!(
            plan,
            vec![Outgoing::Now(BridgeCommand::Scroll {
                dy: -15,
                dx: Some(8)
            })]
        );
    }

    #[test]
    fn test_vertical_only_scroll_omits_horizontal_component() {
        let plan = translate_command(
            &ClientCommand::Scroll { dx: 0.0, dy: 3.0 },
            &DispatchConfig::default(),
        );
        assert_eq!(
            plan,
            vec![Outgoing::Now(BridgeCommand::Scroll { dy: 23, dx: None })]
        );
    }

    #[test]
    fn test_negligible_scroll_produces_no_traffic() {
        let plan = translate_command(
            &ClientCommand::Scroll { dx: 0.01, dy: -0.02 },
            &DispatchConfig::default(),
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn test_keypress_passes_token_through() {
        let plan = translate_command(
            &ClientCommand::Keypress {
                key: "{ENTER}".into(),
            },
            &DispatchConfig::default(),
        );
        assert_eq!(
            plan,
            vec![Outgoing::Now(BridgeCommand::Key("{ENTER}".into()))]
        );
    }

    #[test]
    fn test_auth_and_move_plan_nothing() {
        let auth = translate_command(
            &ClientCommand::Auth { token: "t".into() },
            &DispatchConfig::default(),
        );
        let mv = translate_command(
            &ClientCommand::Move { dx: 3.0, dy: 4.0 },
            &DispatchConfig::default(),
        );
        assert!(auth.is_empty());
        assert!(mv.is_empty());
    }
}
