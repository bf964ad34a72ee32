//! Recording bridge transport for tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use pocketpad_core::BridgeCommand;

use super::BridgeTransport;

/// Test double that records every delivered line instead of spawning the
/// helper process.  `set_should_fail(true)` simulates a dead bridge: sends
/// are dropped, matching the real transport's fire-and-forget contract.
#[derive(Default)]
pub struct RecordingBridge {
    lines: Mutex<Vec<String>>,
    should_fail: AtomicBool,
}

impl RecordingBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// All lines delivered so far, in order.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Number of delivered lines.
    pub fn len(&self) -> usize {
        self.lines.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
    }

    /// When set, subsequent sends are dropped instead of recorded.
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BridgeTransport for RecordingBridge {
    async fn send(&self, command: &BridgeCommand) {
        if self.should_fail.load(Ordering::SeqCst) {
            return;
        }
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(command.to_line());
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pocketpad_core::MouseButtonName;

    #[tokio::test]
    async fn test_recording_bridge_captures_lines_in_order() {
        let bridge = RecordingBridge::new();

        bridge.send(&BridgeCommand::Move { dx: 1, dy: 2 }).await;
        bridge
            .send(&BridgeCommand::Click(MouseButtonName::Right))
            .await;

        assert_eq!(bridge.lines(), vec!["M 1 2".to_string(), "C R".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_bridge_drops_sends_silently() {
        let bridge = RecordingBridge::new();
        bridge.set_should_fail(true);

        bridge.send(&BridgeCommand::Key("x".into())).await;

        assert!(bridge.is_empty());
    }

    #[tokio::test]
    async fn test_clear_resets_recording() {
        let bridge = RecordingBridge::new();
        bridge.send(&BridgeCommand::Move { dx: 1, dy: 1 }).await;
        bridge.clear();
        assert_eq!(bridge.len(), 0);
    }
}
