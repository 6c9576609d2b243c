//! Geometry for drawing points as instanced quads.
//!
//! With emulation on, slot 0 holds a six-vertex quad (two triangles) and every user attribute
//! steps once per instance, so each instance expands one point.

use bytemuck::{Pod, Zeroable};

use crate::error::{Result, StateError};
use crate::native::{BufferDesc, BufferUsage, DeviceContext};
use crate::serial::BufferId;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PointSpriteVertex {
    pub position: [f32; 3],
    pub tex_coord: [f32; 2],
}

/// Byte stride of [`PointSpriteVertex`].
pub const POINT_SPRITE_VERTEX_STRIDE: u32 = std::mem::size_of::<PointSpriteVertex>() as u32;

const _: () = assert!(POINT_SPRITE_VERTEX_STRIDE == 20);

const fn vertex(x: f32, y: f32, s: f32, t: f32) -> PointSpriteVertex {
    PointSpriteVertex {
        position: [x, y, 0.0],
        tex_coord: [s, t],
    }
}

pub const POINT_SPRITE_VERTICES: [PointSpriteVertex; 6] = [
    vertex(-1.0, -1.0, 0.0, 1.0),
    vertex(-1.0, 1.0, 0.0, 0.0),
    vertex(1.0, 1.0, 1.0, 0.0),
    vertex(1.0, -1.0, 1.0, 1.0),
    vertex(-1.0, -1.0, 0.0, 1.0),
    vertex(1.0, 1.0, 1.0, 0.0),
];

pub const POINT_SPRITE_INDICES: [u16; 6] = [0, 1, 2, 3, 4, 5];

/// Lazily created quad vertex and index buffers.
#[derive(Debug, Default)]
pub struct PointSpriteBuffers {
    vertices: Option<BufferId>,
    indices: Option<BufferId>,
}

impl PointSpriteBuffers {
    pub fn vertex_buffer(&self) -> Option<BufferId> {
        self.vertices
    }

    pub fn index_buffer(&self) -> Option<BufferId> {
        self.indices
    }

    /// Creates the buffers on first use. Returns `(vertices, indices)`.
    pub fn ensure(&mut self, device: &mut dyn DeviceContext) -> Result<(BufferId, BufferId)> {
        let vertices = match self.vertices {
            Some(buffer) => buffer,
            None => {
                let data = bytemuck::cast_slice(&POINT_SPRITE_VERTICES);
                let buffer = device
                    .create_buffer(
                        &BufferDesc {
                            size: data.len() as u32,
                            usage: BufferUsage::Vertex,
                            dynamic: false,
                        },
                        Some(data),
                    )
                    .map_err(StateError::allocation("point sprite vertex buffer"))?;
                tracing::debug!(?buffer, "created point sprite vertex buffer");
                *self.vertices.insert(buffer)
            }
        };
        let indices = match self.indices {
            Some(buffer) => buffer,
            None => {
                let data = bytemuck::cast_slice(&POINT_SPRITE_INDICES);
                let buffer = device
                    .create_buffer(
                        &BufferDesc {
                            size: data.len() as u32,
                            usage: BufferUsage::Index,
                            dynamic: false,
                        },
                        Some(data),
                    )
                    .map_err(StateError::allocation("point sprite index buffer"))?;
                *self.indices.insert(buffer)
            }
        };
        Ok((vertices, indices))
    }
}
