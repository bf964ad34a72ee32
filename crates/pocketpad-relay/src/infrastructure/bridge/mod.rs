//! Native input bridge transport.
//!
//! The relay does not call OS input APIs itself.  It delegates to a helper
//! executable (`pocketpad-bridge` by default) that reads one command per
//! line on stdin, which keeps the privileged/native surface in a separate
//! process and lets tests substitute a recording fake behind
//! [`BridgeTransport`].
//!
//! Delivery is fire-and-forget: the helper never acknowledges, and a line
//! that cannot be delivered is logged and dropped.  A stalled cursor for a
//! few frames beats a wedged session loop.

pub mod mock;

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use pocketpad_core::BridgeCommand;

/// Sink for bridge commands.  Implemented by the real child process and by
/// the recording fake in [`mock`].
#[async_trait]
pub trait BridgeTransport: Send + Sync {
    /// Delivers one command.  Infallible by contract: implementations
    /// absorb and log delivery failures.
    async fn send(&self, command: &BridgeCommand);
}

struct BridgeProcess {
    child: Child,
    stdin: ChildStdin,
}

/// Bridge transport backed by the helper executable.
///
/// The child is spawned lazily on first use and respawned transparently if
/// it exits, so a crashed helper costs at most the commands sent while it
/// was down.
pub struct ProcessBridge {
    program: String,
    process: Mutex<Option<BridgeProcess>>,
}

impl ProcessBridge {
    /// Creates a transport for the given helper executable path or name.
    /// Does not spawn anything yet.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            process: Mutex::new(None),
        }
    }

    fn spawn(&self) -> std::io::Result<BridgeProcess> {
        let mut child = Command::new(&self.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        let stdin = child.stdin.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "bridge stdin not captured")
        })?;
        info!(program = %self.program, "input bridge started");
        Ok(BridgeProcess { child, stdin })
    }

    /// Ensures a live child is present in the slot, respawning if the
    /// previous one exited.
    async fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut slot = self.process.lock().await;

        let needs_spawn = match slot.as_mut() {
            None => true,
            Some(proc) => match proc.child.try_wait() {
                Ok(Some(status)) => {
                    warn!(%status, "input bridge exited, respawning");
                    true
                }
                Ok(None) => false,
                Err(e) => {
                    warn!(error = %e, "could not poll input bridge, respawning");
                    true
                }
            },
        };

        if needs_spawn {
            *slot = Some(self.spawn()?);
        }

        // The slot was just refilled on the spawn path, so it is present.
        let proc = match slot.as_mut() {
            Some(p) => p,
            None => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotConnected,
                    "bridge process slot empty after spawn",
                ))
            }
        };

        proc.stdin.write_all(line.as_bytes()).await?;
        proc.stdin.write_all(b"\n").await?;
        proc.stdin.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl BridgeTransport for ProcessBridge {
    async fn send(&self, command: &BridgeCommand) {
        let line = command.to_line();
        match self.write_line(&line).await {
            Ok(()) => debug!(%line, "bridge command sent"),
            Err(e) => {
                // Drop the dead process so the next send respawns cleanly.
                warn!(error = %e, %line, "bridge command dropped");
                *self.process.lock().await = None;
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_to_missing_executable_does_not_panic_or_block() {
        // Arrange: a program that cannot exist
        let bridge = ProcessBridge::new("/nonexistent/pocketpad-bridge-test");

        // Act: delivery must absorb the spawn failure
        bridge.send(&BridgeCommand::Move { dx: 1, dy: 1 }).await;
        bridge
            .send(&BridgeCommand::Click(pocketpad_core::MouseButtonName::Left))
            .await;

        // Assert: the slot stays empty so a later send retries the spawn
        assert!(bridge.process.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_commands_arrive_as_lines_on_child_stdin() {
        // `cat > file` is a stand-in bridge that records its stdin.
        let dir = std::env::temp_dir().join(format!("pocketpad-bridge-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let out = dir.join("lines.txt");

        let script = format!("cat > {}", out.display());
        let bridge = ProcessBridge::new("/bin/sh");
        // Route through `sh -c` by spawning manually for this test.
        {
            let mut child = Command::new("/bin/sh")
                .arg("-c")
                .arg(&script)
                .stdin(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .unwrap();
            let stdin = child.stdin.take().unwrap();
            *bridge.process.lock().await = Some(BridgeProcess { child, stdin });
        }

        bridge.send(&BridgeCommand::Move { dx: 5, dy: -2 }).await;
        bridge.send(&BridgeCommand::Key("hi".into())).await;

        // Close stdin so `cat` flushes and exits, then reap it before the
        // kill-on-drop guard can fire.
        let mut proc = bridge.process.lock().await.take().unwrap();
        drop(proc.stdin);
        proc.child.wait().await.unwrap();

        let content = tokio::fs::read_to_string(&out).await.unwrap();
        assert_eq!(content, "M 5 -2\nK hi\n");

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
