//! Single-writer async runtime, snapshot scheduler and event stream.

/// Event stream types emitted by the runtime.
pub mod events;
/// Handle and command loop implementation.
pub mod handle;
