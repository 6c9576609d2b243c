use std::fmt;

/// Programmable stage that owns textures, samplers and a driver constant block.
///
/// Per-stage data is stored in `[T; ShaderStage::COUNT]` tables indexed by [`ShaderStage::index`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl ShaderStage {
    pub const COUNT: usize = 3;
    pub const ALL: [ShaderStage; Self::COUNT] = [Self::Vertex, Self::Fragment, Self::Compute];
    /// Stages touched by a draw call.
    pub const GRAPHICS: [ShaderStage; 2] = [Self::Vertex, Self::Fragment];

    pub const fn index(self) -> usize {
        match self {
            ShaderStage::Vertex => 0,
            ShaderStage::Fragment => 1,
            ShaderStage::Compute => 2,
        }
    }

    pub const fn as_pipeline_stage(self) -> PipelineStage {
        match self {
            ShaderStage::Vertex => PipelineStage::Vertex,
            ShaderStage::Fragment => PipelineStage::Pixel,
            ShaderStage::Compute => PipelineStage::Compute,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Compute => "compute",
        })
    }
}

/// Native pipeline stage. Adds the geometry stage, which only receives shaders and constant
/// buffers (point-sprite expansion and stream output).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Vertex,
    Geometry,
    Pixel,
    Compute,
}

impl PipelineStage {
    pub const COUNT: usize = 4;

    pub const fn index(self) -> usize {
        match self {
            PipelineStage::Vertex => 0,
            PipelineStage::Geometry => 1,
            PipelineStage::Pixel => 2,
            PipelineStage::Compute => 3,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineStage::Vertex => "VS",
            PipelineStage::Geometry => "GS",
            PipelineStage::Pixel => "PS",
            PipelineStage::Compute => "CS",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_indices_are_dense() {
        for (i, stage) in ShaderStage::ALL.into_iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
        assert_eq!(ShaderStage::Fragment.as_pipeline_stage(), PipelineStage::Pixel);
        assert_eq!(PipelineStage::Compute.index(), PipelineStage::COUNT - 1);
    }
}
