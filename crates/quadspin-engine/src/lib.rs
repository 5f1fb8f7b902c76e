//! Quadspin engine crate.
//!
//! Owns the GPU context, the quad renderer and the windowed runtime that
//! drives it at a fixed tick.

pub mod device;
pub mod error;
pub mod logging;
pub mod render;
pub mod time;
pub mod window;

pub use error::{FrameError, InitError, PipelineError};
