//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and Window, and drives the quad renderer at a
//! fixed tick.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
