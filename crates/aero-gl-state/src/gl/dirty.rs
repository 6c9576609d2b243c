use bitflags::bitflags;

bitflags! {
    /// Change notifications delivered by the higher-level context.
    ///
    /// Each bit names a piece of [`crate::gl::GlState`] that changed since the previous
    /// [`crate::StateManager::sync_state`] call. The state manager compares the new value against
    /// its own snapshot before invalidating anything.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct GlDirtyBits: u64 {
        const SCISSOR_TEST_ENABLED = 1 << 0;
        const SCISSOR = 1 << 1;
        const VIEWPORT = 1 << 2;
        const DEPTH_RANGE = 1 << 3;
        const BLEND_ENABLED = 1 << 4;
        const BLEND_COLOR = 1 << 5;
        const BLEND_FUNCS = 1 << 6;
        const BLEND_EQUATIONS = 1 << 7;
        const COLOR_MASK = 1 << 8;
        const SAMPLE_ALPHA_TO_COVERAGE_ENABLED = 1 << 9;
        const SAMPLE_COVERAGE = 1 << 10;
        const SAMPLE_MASK = 1 << 11;
        const DEPTH_TEST_ENABLED = 1 << 12;
        const DEPTH_FUNC = 1 << 13;
        const DEPTH_MASK = 1 << 14;
        const STENCIL_TEST_ENABLED = 1 << 15;
        const STENCIL_FUNCS_FRONT = 1 << 16;
        const STENCIL_FUNCS_BACK = 1 << 17;
        const STENCIL_OPS_FRONT = 1 << 18;
        const STENCIL_OPS_BACK = 1 << 19;
        const STENCIL_WRITEMASK_FRONT = 1 << 20;
        const STENCIL_WRITEMASK_BACK = 1 << 21;
        const CULL_FACE_ENABLED = 1 << 22;
        const CULL_FACE = 1 << 23;
        const FRONT_FACE = 1 << 24;
        const POLYGON_OFFSET_FILL_ENABLED = 1 << 25;
        const POLYGON_OFFSET = 1 << 26;
        const RASTERIZER_DISCARD_ENABLED = 1 << 27;
        const DITHER_ENABLED = 1 << 28;
        const DRAW_FRAMEBUFFER_BINDING = 1 << 29;
        const VERTEX_ARRAY_BINDING = 1 << 30;
        const PROGRAM_EXECUTABLE = 1 << 31;
        const TEXTURE_BINDINGS = 1 << 32;
        const SAMPLER_BINDINGS = 1 << 33;
        const UNIFORM_BUFFER_BINDINGS = 1 << 34;
        const TRANSFORM_FEEDBACK_BINDING = 1 << 35;
        const CURRENT_VALUES = 1 << 36;
        const IMAGE_BINDINGS = 1 << 37;
    }
}
