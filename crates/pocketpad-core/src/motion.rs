//! Motion smoothing engine.
//!
//! Touch sampling on the phone is not synchronized with the cursor's
//! effective refresh rate: gesture deltas arrive in irregular, sometimes
//! large bursts.  Forwarding them verbatim makes the cursor visibly jump.
//! The [`MotionBuffer`] re-quantizes bursts into a fixed-cadence stream of
//! small integer moves.
//!
//! # Algorithm
//!
//! Incoming deltas are scaled by a sensitivity factor and accumulated into
//! per-axis pending values.  A fixed-rate tick (every [`TICK_INTERVAL`],
//! armed only while the buffer is non-empty) drains the pending values:
//!
//! 1. When both pending magnitudes fall under the settle threshold the
//!    buffer is drained: the accumulators are zeroed exactly, clearing any
//!    negligible residue, and the caller stops ticking.
//! 2. Otherwise each axis steps by `pending / drain_chunks`, so a burst
//!    clears in roughly three ticks, long enough to look smooth but short
//!    enough not to feel laggy.  Once the remaining pending value on an
//!    axis is under one unit the step takes all of it, cutting off the
//!    asymptotic tail.
//! 3. The fractional part of each emitted step is carried to the next tick
//!    so rounding never accumulates drift: the sum of emitted integer moves
//!    converges to the scaled input sum within ±1 per axis.
//!
//! Absolute positioning and every other gesture action bypass this buffer
//! entirely and reach the bridge as single immediate commands.

use std::time::Duration;

/// Cadence of the drain tick: 8 ms ≈ 120 Hz.
pub const TICK_INTERVAL: Duration = Duration::from_millis(8);

/// Tuning parameters for the smoothing engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingConfig {
    /// Multiplier applied to incoming gesture deltas.
    pub sensitivity: f64,
    /// Number of ticks a burst is stretched over.
    pub drain_chunks: f64,
    /// Pending magnitude below which an axis counts as settled.
    pub settle_threshold: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            sensitivity: 2.5,
            drain_chunks: 3.0,
            settle_threshold: 0.1,
        }
    }
}

/// Result of one drain tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionTick {
    /// Both accumulators settled; they have been zeroed and the caller
    /// should disarm its ticker until the next `push`.
    Drained,
    /// The tick consumed pending motion but the rounded step was zero on
    /// both axes; nothing to emit this tick.
    Settled,
    /// Emit a relative move of exactly this many pixels.
    Move { dx: i32, dy: i32 },
}

/// Per-session accumulator of un-flushed movement.
///
/// Owned exclusively by one session's handler task; created lazily on the
/// first `move` command and dropped with the session.  Never persisted.
#[derive(Debug)]
pub struct MotionBuffer {
    config: SmoothingConfig,
    pending_x: f64,
    pending_y: f64,
    remainder_x: f64,
    remainder_y: f64,
}

impl MotionBuffer {
    /// Creates an empty buffer with the given tuning.
    pub fn new(config: SmoothingConfig) -> Self {
        Self {
            config,
            pending_x: 0.0,
            pending_y: 0.0,
            remainder_x: 0.0,
            remainder_y: 0.0,
        }
    }

    /// Scales an incoming gesture delta and adds it to the pending motion.
    pub fn push(&mut self, dx: f64, dy: f64) {
        self.pending_x += dx * self.config.sensitivity;
        self.pending_y += dy * self.config.sensitivity;
    }

    /// `true` when both pending magnitudes are under the settle threshold.
    pub fn is_drained(&self) -> bool {
        self.pending_x.abs() < self.config.settle_threshold
            && self.pending_y.abs() < self.config.settle_threshold
    }

    /// Advances the drain by one tick.
    pub fn tick(&mut self) -> MotionTick {
        if self.is_drained() {
            // Clear the negligible residue so the accumulators end an
            // episode at exactly (0, 0).
            self.pending_x = 0.0;
            self.pending_y = 0.0;
            return MotionTick::Drained;
        }

        let mut step_x = self.pending_x / self.config.drain_chunks;
        let mut step_y = self.pending_y / self.config.drain_chunks;

        // Under one unit the chunked step would decay asymptotically;
        // take the whole remainder instead.
        if self.pending_x.abs() < 1.0 {
            step_x = self.pending_x;
        }
        if self.pending_y.abs() < 1.0 {
            step_y = self.pending_y;
        }

        self.pending_x -= step_x;
        self.pending_y -= step_y;

        // Carry sub-pixel remainders across ticks so rounding never drifts.
        let raw_x = step_x + self.remainder_x;
        let raw_y = step_y + self.remainder_y;

        let move_x = raw_x.round() as i32;
        let move_y = raw_y.round() as i32;

        self.remainder_x = raw_x - f64::from(move_x);
        self.remainder_y = raw_y - f64::from(move_y);

        if move_x != 0 || move_y != 0 {
            MotionTick::Move {
                dx: move_x,
                dy: move_y,
            }
        } else {
            MotionTick::Settled
        }
    }
}

impl Default for MotionBuffer {
    fn default() -> Self {
        Self::new(SmoothingConfig::default())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
