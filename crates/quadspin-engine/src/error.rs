//! Error taxonomy surfaced to the host.
//!
//! Initialization failures are fatal and never retried; the host decides how to
//! present them. Per-frame failures only occur when the context goes away.

use thiserror::Error;

use crate::render::StageKind;

/// Failure while turning shader sources into a usable program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// A stage failed to parse or validate. `log` carries the rendered diagnostic.
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: StageKind, log: String },

    /// The two stages could not be combined into one program.
    #[error("shader program failed to link:\n{log}")]
    Link { log: String },

    /// A name the draw path depends on is not referenced by the program.
    #[error("shader program does not reference required input `{name}`")]
    MissingLocation { name: &'static str },
}

/// Failure returned by `FrameRenderer::initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitError {
    /// Neither the primary nor the fallback backends produced a device.
    #[error("no rendering context available (primary and fallback backends both failed)")]
    NoContext,

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("renderer is already initialized")]
    AlreadyInitialized,
}

/// Failure returned by `FrameRenderer::render_frame`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("render_frame called before a successful initialize")]
    NotInitialized,

    /// The device or surface was lost; the renderer must be initialized again.
    #[error("rendering context lost")]
    ContextLost,
}
