//! User-visible autofocus modes, controls and per-frame status.

/// Focus distance range to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfRange {
    /// Infinity to reasonably close, not the closest macro positions.
    Normal,
    /// Close distances only.
    Macro,
    /// The union of Normal and Macro.
    Full,
}

pub const NUM_AF_RANGES: usize = 3;

/// Trade-off between focusing speed and a smooth image stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfSpeed {
    Normal,
    Fast,
}

pub const NUM_AF_SPEEDS: usize = 2;

/// User-visible operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfMode {
    /// The lens only moves on `set_lens_position`.
    Manual,
    /// A scan runs once per `trigger_scan`.
    Auto,
    /// The algorithm refocuses whenever the scene changes.
    Continuous,
}

/// Pause request for continuous mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfPause {
    /// Stop the lens wherever it is, abandoning any scan in flight.
    Immediate,
    /// Let a scan in flight run to completion, then hold.
    Deferred,
    /// Resume continuous operation.
    Resume,
}

/// Overall algorithm state, as reported to applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfState {
    Idle,
    Scanning,
    Focused,
    Failed,
}

/// Pause progress, as reported to applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfPauseState {
    Running,
    Pausing,
    Paused,
}

/// Per-frame autofocus status written into the output metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AfStatus {
    pub state: AfState,
    pub pause_state: AfPauseState,
    /// Hardware lens-driver code, once the lens position is known.
    pub lens_setting: Option<i32>,
}
