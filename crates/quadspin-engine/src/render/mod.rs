//! Quad rendering subsystem.
//!
//! Turns shader sources into a linked program, uploads the quad once and
//! drives one draw per frame through `FrameRenderer`.
//!
//! Convention:
//! - Geometry is in model space; the quad spans [-1, 1] on X and Y.
//! - Matrices are column-major, right-handed, camera looking down -Z.

mod frame;
mod geometry;
mod pipeline;
mod program;
mod shader;
mod transform;

pub use frame::{FrameRenderer, RendererConfig, RendererState};
pub use geometry::{
    COLOR_COMPONENTS, GeometryBuffers, POSITION_COMPONENTS, QUAD_COLORS, QUAD_POSITIONS,
    QUAD_VERTEX_COUNT,
};
pub use pipeline::ShaderPipeline;
pub use program::{
    Attribute, AttributeLocations, COLOR, MODEL_VIEW, POSITION, PROJECTION, Program, Resource,
    ResourceKind, UniformLocations, UniformSlot,
};
pub use shader::{CompiledStage, FRAGMENT_SHADER, ShaderStage, StageKind, VERTEX_SHADER};
pub use transform::{
    FIELD_OF_VIEW_DEGREES, MODEL_OFFSET, Transform, Z_FAR, Z_NEAR, normalize_angle,
};
