//! Tolerance constants for audio testing.

/// Floating point rounding errors (for passthrough, exact gain).
/// Use for operations that should be mathematically exact.
pub const FLOAT_EPSILON: f32 = 1e-6;

/// Silence threshold (~-80dB).
/// Values below this are considered silent.
pub const SILENCE_THRESHOLD: f32 = 0.0001;

/// Tolerance for tempo derived from timestamped clock pulses.
pub const BPM_EPSILON: f32 = 0.05;
