use crate::gl::PrimitiveMode;
use crate::native::PrimitiveTopology;

/// Minimum draw count that no draw can reach. Draws checked against it are skipped.
pub const UNREACHABLE_DRAW_COUNT: u32 = u32::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TopologyInputs {
    pub mode: PrimitiveMode,
    /// The program writes `gl_PointSize`.
    pub uses_point_size: bool,
    pub instanced_point_sprite_emulation: bool,
    pub transform_feedback_active: bool,
    /// Both faces are culled.
    pub culls_everything: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TopologyTranslation {
    /// `None` leaves the native topology untouched because the draw will be skipped.
    pub topology: Option<PrimitiveTopology>,
    /// Draws with fewer vertices than this produce nothing and can be skipped.
    pub minimum_draw_count: u32,
}

impl TopologyTranslation {
    /// Point draw whose rasterized size is undefined.
    pub fn is_undefined_point_size(&self) -> bool {
        self.topology.is_none() && self.minimum_draw_count == UNREACHABLE_DRAW_COUNT
    }
}

/// Maps a draw mode onto the native topology.
///
/// Triangle fans and line loops rely on the index data manager having rewritten the indices into a
/// triangle list or a closed line strip.
pub fn translate_primitive_topology(inputs: &TopologyInputs) -> TopologyTranslation {
    let triangles = |topology| TopologyTranslation {
        topology: Some(topology),
        minimum_draw_count: if inputs.culls_everything {
            UNREACHABLE_DRAW_COUNT
        } else {
            3
        },
    };
    let lines = |topology| TopologyTranslation {
        topology: Some(topology),
        minimum_draw_count: 2,
    };

    match inputs.mode {
        PrimitiveMode::Points => {
            // Point size is undefined unless the shader writes it; skip instead of guessing.
            if !inputs.uses_point_size && !inputs.transform_feedback_active {
                return TopologyTranslation {
                    topology: None,
                    minimum_draw_count: UNREACHABLE_DRAW_COUNT,
                };
            }
            let topology = if inputs.uses_point_size && inputs.instanced_point_sprite_emulation {
                PrimitiveTopology::TriangleList
            } else {
                PrimitiveTopology::PointList
            };
            TopologyTranslation {
                topology: Some(topology),
                minimum_draw_count: 1,
            }
        }
        PrimitiveMode::Lines => lines(PrimitiveTopology::LineList),
        PrimitiveMode::LineLoop | PrimitiveMode::LineStrip => lines(PrimitiveTopology::LineStrip),
        PrimitiveMode::Triangles | PrimitiveMode::TriangleFan => {
            triangles(PrimitiveTopology::TriangleList)
        }
        PrimitiveMode::TriangleStrip => triangles(PrimitiveTopology::TriangleStrip),
    }
}
