//! Internal dirty-bit set and the fixed flush order.

use std::fmt;

use bitflags::bitflags;

/// A state category the state manager re-synchronizes on flush.
///
/// Declaration order is flush order: later syncs read what earlier syncs wrote (driver uniforms
/// read the viewport, vertex input reads the shaders, topology reads the point-sprite decision).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DirtyBit {
    RenderTarget,
    ViewportState,
    ScissorState,
    RasterizerState,
    BlendState,
    DepthStencilState,
    TexturesAndSamplers,
    ProgramUniforms,
    DriverUniforms,
    ProgramUniformBuffers,
    Shaders,
    CurrentValueAttribs,
    TransformFeedback,
    VertexBuffersAndInputLayout,
    PrimitiveTopology,
}

impl DirtyBit {
    pub const COUNT: usize = 15;

    pub const FLUSH_ORDER: [DirtyBit; Self::COUNT] = [
        Self::RenderTarget,
        Self::ViewportState,
        Self::ScissorState,
        Self::RasterizerState,
        Self::BlendState,
        Self::DepthStencilState,
        Self::TexturesAndSamplers,
        Self::ProgramUniforms,
        Self::DriverUniforms,
        Self::ProgramUniformBuffers,
        Self::Shaders,
        Self::CurrentValueAttribs,
        Self::TransformFeedback,
        Self::VertexBuffersAndInputLayout,
        Self::PrimitiveTopology,
    ];

    pub const fn flag(self) -> DirtyBits {
        DirtyBits::from_bits_retain(1 << self as u16)
    }
}

impl fmt::Display for DirtyBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DirtyBit::RenderTarget => "render_target",
            DirtyBit::ViewportState => "viewport",
            DirtyBit::ScissorState => "scissor",
            DirtyBit::RasterizerState => "rasterizer",
            DirtyBit::BlendState => "blend",
            DirtyBit::DepthStencilState => "depth_stencil",
            DirtyBit::TexturesAndSamplers => "textures_and_samplers",
            DirtyBit::ProgramUniforms => "program_uniforms",
            DirtyBit::DriverUniforms => "driver_uniforms",
            DirtyBit::ProgramUniformBuffers => "program_uniform_buffers",
            DirtyBit::Shaders => "shaders",
            DirtyBit::CurrentValueAttribs => "current_value_attribs",
            DirtyBit::TransformFeedback => "transform_feedback",
            DirtyBit::VertexBuffersAndInputLayout => "vertex_buffers_and_input_layout",
            DirtyBit::PrimitiveTopology => "primitive_topology",
        })
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct DirtyBits: u16 {
        const RENDER_TARGET = 1 << DirtyBit::RenderTarget as u16;
        const VIEWPORT_STATE = 1 << DirtyBit::ViewportState as u16;
        const SCISSOR_STATE = 1 << DirtyBit::ScissorState as u16;
        const RASTERIZER_STATE = 1 << DirtyBit::RasterizerState as u16;
        const BLEND_STATE = 1 << DirtyBit::BlendState as u16;
        const DEPTH_STENCIL_STATE = 1 << DirtyBit::DepthStencilState as u16;
        const TEXTURES_AND_SAMPLERS = 1 << DirtyBit::TexturesAndSamplers as u16;
        const PROGRAM_UNIFORMS = 1 << DirtyBit::ProgramUniforms as u16;
        const DRIVER_UNIFORMS = 1 << DirtyBit::DriverUniforms as u16;
        const PROGRAM_UNIFORM_BUFFERS = 1 << DirtyBit::ProgramUniformBuffers as u16;
        const SHADERS = 1 << DirtyBit::Shaders as u16;
        const CURRENT_VALUE_ATTRIBS = 1 << DirtyBit::CurrentValueAttribs as u16;
        const TRANSFORM_FEEDBACK = 1 << DirtyBit::TransformFeedback as u16;
        const VERTEX_BUFFERS_AND_INPUT_LAYOUT = 1 << DirtyBit::VertexBuffersAndInputLayout as u16;
        const PRIMITIVE_TOPOLOGY = 1 << DirtyBit::PrimitiveTopology as u16;
    }
}

impl DirtyBits {
    /// Set bits in flush order.
    pub fn iter_ordered(self) -> impl Iterator<Item = DirtyBit> {
        DirtyBit::FLUSH_ORDER
            .into_iter()
            .filter(move |bit| self.contains(bit.flag()))
    }

    /// Bits flushed after `bit`.
    pub const fn later_than(bit: DirtyBit) -> DirtyBits {
        DirtyBits::from_bits_truncate(!((1u16 << (bit as u16 + 1)) - 1))
    }
}

impl fmt::Display for DirtyBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for bit in self.iter_ordered() {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "{bit}")?;
            first = false;
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}
