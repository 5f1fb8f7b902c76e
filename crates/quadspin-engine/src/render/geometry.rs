use std::ops::Range;

use wgpu::util::DeviceExt;

pub const POSITION_COMPONENTS: usize = 2;
pub const COLOR_COMPONENTS: usize = 4;

/// Vertices in the quad strip.
pub const QUAD_VERTEX_COUNT: u32 = 4;

/// Unit-square corners, ordered for a triangle strip.
pub const QUAD_POSITIONS: [f32; 8] = [
    1.0, 1.0, //
    -1.0, 1.0, //
    1.0, -1.0, //
    -1.0, -1.0, //
];

/// One straight-alpha RGBA colour per vertex: white, red, green, blue.
pub const QUAD_COLORS: [f32; 16] = [
    1.0, 1.0, 1.0, 1.0, //
    1.0, 0.0, 0.0, 1.0, //
    0.0, 1.0, 0.0, 1.0, //
    0.0, 0.0, 1.0, 1.0, //
];

/// Static per-vertex position and colour buffers.
///
/// Uploaded once at creation; there is no re-upload path.
pub struct GeometryBuffers {
    positions: wgpu::Buffer,
    colors: wgpu::Buffer,
    vertex_count: u32,
}

impl GeometryBuffers {
    /// Creates both vertex buffers and fills them with `positions` and `colors`.
    pub fn upload(device: &wgpu::Device, positions: &[f32; 8], colors: &[f32; 16]) -> Self {
        let vertex_count = (positions.len() / POSITION_COMPONENTS) as u32;
        debug_assert_eq!(vertex_count as usize, colors.len() / COLOR_COMPONENTS);
        debug_assert!(
            colors.iter().all(|c| (0.0..=1.0).contains(c)),
            "colour channels must be in [0, 1]"
        );

        let positions = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quadspin position vbo"),
            contents: bytemuck::cast_slice(positions),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let colors = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quadspin color vbo"),
            contents: bytemuck::cast_slice(colors),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Self {
            positions,
            colors,
            vertex_count,
        }
    }

    /// The bundled quad.
    pub fn quad(device: &wgpu::Device) -> Self {
        Self::upload(device, &QUAD_POSITIONS, &QUAD_COLORS)
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Vertex range for the draw call.
    pub fn vertices(&self) -> Range<u32> {
        0..self.vertex_count
    }

    pub fn positions(&self) -> &wgpu::Buffer {
        &self.positions
    }

    pub fn colors(&self) -> &wgpu::Buffer {
        &self.colors
    }
}
