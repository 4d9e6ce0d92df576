use crate::codec::DialCodec;
use crate::types::{Celsius, Degrees};
use std::time::{Duration, Instant};

/// How long the dial animates into its snapped position after release
pub const SETTLE_DURATION: Duration = Duration::from_millis(200);

/// Vibration length of one haptic tick
pub const TICK_PULSE: Duration = Duration::from_millis(10);

/// Touches shorter than this count as taps
pub const TAP_MAX: Duration = Duration::from_millis(300);

/// Haptic feedback sink
pub trait Haptics: Send + Sync {
    fn pulse(&self, duration: Duration);
}

/// Haptics for platforms without a vibration motor
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHaptics;

impl Haptics for NoHaptics {
    fn pulse(&self, duration: Duration) {
        tracing::debug!(
            "Can't vibrate {}ms, vibration not supported",
            duration.as_millis()
        );
    }
}

/// Gesture phase of a dial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialPhase {
    Idle,
    Dragging,
    /// Released; the dial animates into its snapped position
    Settling,
}

/// Result of one drag move
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DialUpdate {
    /// Continuous rotation after the move
    pub rotation: Degrees,
    /// Rotation snapped to the major step
    pub major_angle: Degrees,
    /// Minor-step boundaries crossed by this move
    pub ticks: u32,
}

/// Value committed when a drag ends
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DialCommit {
    pub temperature: Celsius,
    pub angle: Degrees,
}

/// Turns vertical drags on the thermostat dial into target temperatures
///
/// Rotation accumulates incrementally from successive touch positions and is
/// never wrapped. Every move is snapped twice: to the major step for the
/// value that will be committed, and to the minor step for haptic ticks.
#[derive(Debug, Clone)]
pub struct DialTracker {
    codec: DialCodec,
    active: bool,
    phase: DialPhase,
    rotation: Degrees,
    last_y: f64,
    major: Degrees,
    minor: Degrees,
    committed: Degrees,
}

impl DialTracker {
    /// Create a dial showing `target`
    pub fn new(codec: DialCodec, target: Celsius) -> Self {
        let angle = codec.temperature_to_angle(target);
        Self {
            codec,
            active: false,
            phase: DialPhase::Idle,
            rotation: angle,
            last_y: 0.0,
            major: angle,
            minor: codec.snap_minor(angle),
            committed: angle,
        }
    }

    pub fn codec(&self) -> &DialCodec {
        &self.codec
    }

    pub fn phase(&self) -> DialPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_dragging(&self) -> bool {
        self.phase == DialPhase::Dragging
    }

    pub fn rotation(&self) -> Degrees {
        self.rotation
    }

    pub fn major_angle(&self) -> Degrees {
        self.major
    }

    /// Angle of the last committed (or externally synced) value
    pub fn committed_angle(&self) -> Degrees {
        self.committed
    }

    /// Whether the snap animation should be applied when rendering
    pub fn transition_enabled(&self) -> bool {
        self.phase == DialPhase::Settling
    }

    /// Temperature under the pointer, snapped to the major step
    pub fn preview_temperature(&self) -> Celsius {
        self.codec.angle_to_temperature(self.major)
    }

    /// Label drawn large; none while dragging
    pub fn emphasized_temperature(&self) -> Option<Celsius> {
        if self.is_dragging() {
            None
        } else {
            Some(self.codec.angle_to_temperature(self.committed))
        }
    }

    /// Switch between card and full-screen display. Leaving full screen
    /// abandons a drag in progress.
    pub fn set_active(&mut self, active: bool) {
        if !active && self.is_dragging() {
            tracing::debug!("Dial deactivated mid-drag, restoring {}", self.committed);
            self.reset_to(self.committed);
        }
        self.active = active;
    }

    /// Touch down at `y`. Ignored unless the dial is active.
    pub fn start(&mut self, y: f64) -> bool {
        if !self.active {
            return false;
        }
        self.last_y = y;
        self.phase = DialPhase::Dragging;
        true
    }

    /// Touch moved to `y`
    pub fn move_to(&mut self, y: f64) -> Option<DialUpdate> {
        if !self.active || !self.is_dragging() {
            return None;
        }

        let delta = y - self.last_y;
        self.last_y = y;
        self.rotation += delta * self.codec.config().sensitivity;
        self.major = self.codec.snap_major(self.rotation);

        let minor = self.codec.snap_minor(self.rotation);
        let crossed = (minor - self.minor).abs() / self.codec.config().minor_step;
        let ticks = crossed.round() as u32;
        self.minor = minor;

        Some(DialUpdate {
            rotation: self.rotation,
            major_angle: self.major,
            ticks,
        })
    }

    /// Touch released: commit the major-snapped value
    pub fn end(&mut self) -> Option<DialCommit> {
        if !self.active || !self.is_dragging() {
            return None;
        }

        let temperature = self
            .codec
            .clamp_temperature(self.codec.angle_to_temperature(self.major));
        let angle = self.codec.temperature_to_angle(temperature);

        self.rotation = angle;
        self.major = angle;
        self.minor = self.codec.snap_minor(angle);
        self.committed = angle;
        self.phase = DialPhase::Settling;

        Some(DialCommit { temperature, angle })
    }

    /// The settle animation finished
    pub fn settle_elapsed(&mut self) {
        if self.phase == DialPhase::Settling {
            self.phase = DialPhase::Idle;
        }
    }

    /// The room's target changed outside of this dial. Returns whether the
    /// dial was reset; a drag in progress wins.
    pub fn sync_external(&mut self, target: Celsius) -> bool {
        if self.is_dragging() {
            return false;
        }
        let angle = self.codec.temperature_to_angle(target);
        if angle == self.committed && self.rotation == angle {
            return false;
        }
        self.reset_to(angle);
        true
    }

    fn reset_to(&mut self, angle: Degrees) {
        self.rotation = angle;
        self.major = angle;
        self.minor = self.codec.snap_minor(angle);
        self.committed = angle;
        self.phase = DialPhase::Idle;
    }
}

/// Tells taps from long presses
#[derive(Debug, Clone, Copy, Default)]
pub struct TapDetector {
    pressed_at: Option<Instant>,
}

impl TapDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, at: Instant) {
        self.pressed_at = Some(at);
    }

    /// Whether the touch ending at `at` was a tap
    pub fn release(&mut self, at: Instant) -> bool {
        match self.pressed_at.take() {
            Some(pressed) => at.saturating_duration_since(pressed) < TAP_MAX,
            None => false,
        }
    }
}
