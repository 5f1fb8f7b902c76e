//! GPU context + drawing surface management.
//!
//! This module is responsible for:
//! - acquiring an adapter/device, primary backends first, compatibility backends second
//! - owning the draw target (window surface or offscreen texture) and its depth buffer
//! - keeping the drawing buffer in sync with the client (logical) size

mod error;
mod init;
mod surface;

pub use error::SurfaceErrorAction;
pub use init::ContextConfig;
pub use surface::{DEPTH_FORMAT, FrameTarget, RenderSurface, SurfaceSize, SurfaceSource};
