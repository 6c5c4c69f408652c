//! Dynamic multi-texture compositing
//!
//! Tracks the mutable set of active overlay images, generates a shader
//! program sized to that set on every change, and swaps the resulting
//! material onto the target mesh surfaces between frames.

mod compositor;
mod material;
mod overlay_set;
mod shader_gen;
mod snapshot;

pub use compositor::{CompositeBuild, Compositor};
pub use material::CompositeMaterial;
pub use overlay_set::{OverlayEntry, OverlaySet, Toggle};
pub use shader_gen::{composite_shader, validate, BlendProfile, ShaderSource};
pub use snapshot::{CompositeSnapshot, PendingComposite};

/// Vertex format for composited surfaces: model-space position plus the
/// surface UV the fragment stage samples at.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x2,
            },
        ],
    };

    pub fn new(position: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, uv }
    }
}

/// Identity-transform quad covering clip space, UV-mapped; used by the
/// preview pass to show the composite flat.
pub fn fullscreen_quad() -> [Vertex; 6] {
    [
        Vertex::new([-1.0, -1.0, 0.0], [0.0, 1.0]),
        Vertex::new([1.0, -1.0, 0.0], [1.0, 1.0]),
        Vertex::new([1.0, 1.0, 0.0], [1.0, 0.0]),
        Vertex::new([-1.0, -1.0, 0.0], [0.0, 1.0]),
        Vertex::new([1.0, 1.0, 0.0], [1.0, 0.0]),
        Vertex::new([-1.0, 1.0, 0.0], [0.0, 0.0]),
    ]
}
