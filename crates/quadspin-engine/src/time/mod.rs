//! Time subsystem.
//!
//! Fixed-interval frame timing and the rotation it drives, kept independent of
//! the window runtime so both can be tested without an event loop.

mod frame_clock;
mod spin;

pub use frame_clock::{FrameClock, FrameTime};
pub use spin::Spin;
