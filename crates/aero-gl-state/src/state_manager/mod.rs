//! The dirty-bit state machine.
//!
//! [`StateManager`] keeps a last-applied copy of every piece of native pipeline state. The owning
//! context reports changes through [`StateManager::sync_state`] (or the `invalidate_*` methods),
//! which only mark internal [`DirtyBits`]. Before every draw, [`StateManager::update_state`] visits
//! the dirty bits in [`DirtyBit::FLUSH_ORDER`] and issues native calls for whatever differs from
//! the snapshots.
//!
//! A sync routine may schedule bits that come later in the order, never earlier ones; invalidating
//! anything from inside a flush is a contract violation caught by a debug assertion.

mod compute;
mod input;
mod output;
mod resources;
mod setters;
mod sync;

use hashbrown::HashMap;

use crate::cache::RenderStateCache;
use crate::caps::{StateManagerConfig, MAX_CONSTANT_BUFFER_SLOTS, MAX_VERTEX_ATTRIBS};
use crate::dirty_bits::{DirtyBit, DirtyBits};
use crate::error::{Result, StateError};
use crate::gl::{
    BlendState, ColorF, DepthStencilState, DrawCall, ElementArrayBuffer, Extents, GlState,
    ImageIndex, IndexedDraw, Offset, PrimitiveMode, ProgramInfo, RasterizerState, Rectangle,
    SampleCoverage, TextureBinding,
};
use crate::index::{IndexDataManager, TranslatedIndexData};
use crate::native::{
    DeviceContext, DeviceError, IndexFormat, PrimitiveTopology, ScissorRect, ShaderResourceView,
    UnorderedAccessView, Viewport,
};
use crate::query::QueryId;
use crate::serial::{BufferId, InputLayoutId, ResourceSerial, ShaderId, StateObjectId, ViewId};
use crate::shader_constants::ShaderConstants;
use crate::stage::{PipelineStage, ShaderStage};
use crate::stats::StateStats;
use crate::vertex::{
    InputLayoutKey, PointSpriteBuffers, TranslatedAttribute, VertexBufferState, VertexDataManager,
};
use crate::view_cache::ViewCache;

/// Shaders for one draw.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawExecutables {
    pub vertex: Option<ShaderId>,
    pub pixel: Option<ShaderId>,
    /// Point-sprite expansion; `None` when the draw needs no geometry stage.
    pub geometry: Option<ShaderId>,
    /// Geometry stage writing to the stream-output targets, used while transform feedback runs.
    pub stream_output: Option<ShaderId>,
}

/// Boundary to the shader compiler.
pub trait ExecutableProvider {
    /// Shaders matching the program, the draw mode and the vertex input shape.
    fn draw_executables(
        &mut self,
        program: &ProgramInfo,
        mode: PrimitiveMode,
        input_layout: &InputLayoutKey,
    ) -> std::result::Result<DrawExecutables, DeviceError>;

    fn compute_executable(&mut self, program: &ProgramInfo) -> std::result::Result<Option<ShaderId>, DeviceError>;
}

/// Boundary to texture storage. Textures with a non-identity swizzle are sampled through a
/// swizzled copy that has to be regenerated before the views are bound.
pub trait SwizzleGenerator {
    fn generate_swizzle(
        &mut self,
        device: &mut dyn DeviceContext,
        texture: &TextureBinding,
    ) -> std::result::Result<(), DeviceError>;
}

/// External collaborators a flush talks to.
pub struct Backend<'a> {
    pub device: &'a mut dyn DeviceContext,
    pub states: &'a mut dyn RenderStateCache,
    pub executables: &'a mut dyn ExecutableProvider,
    pub vertex_data: &'a mut dyn VertexDataManager,
    pub index_data: &'a mut dyn IndexDataManager,
    pub swizzles: &'a mut dyn SwizzleGenerator,
}

/// Outcome of [`StateManager::update_state`] the caller needs to issue the draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreparedDraw {
    /// Draws with fewer vertices produce nothing and should be skipped.
    pub minimum_draw_count: u32,
    /// Index buffer to draw from, when the draw is indexed or needed rewriting.
    pub index_data: Option<TranslatedIndexData>,
    /// Points are drawn as instanced quads: draw six indices per point.
    pub instanced_point_sprites: bool,
}

impl PreparedDraw {
    pub fn skips(&self, count: u32) -> bool {
        count < self.minimum_draw_count
    }
}

fn linked_program(state: &GlState) -> Result<&ProgramInfo> {
    state.program().ok_or(StateError::MissingProgram)
}

/// Bits still to be synced by the running flush.
struct Pending {
    bits: DirtyBits,
    current: DirtyBit,
}

impl Pending {
    fn defer(&mut self, later: DirtyBits) {
        debug_assert!(
            DirtyBits::later_than(self.current).contains(later),
            "{} cannot schedule {later} during a flush",
            self.current
        );
        self.bits |= later;
    }
}

/// GL-level values as of the last sync of their category. `sync_state` compares against these.
#[derive(Clone, Debug)]
struct GlSnapshot {
    blend: BlendState,
    blend_color: ColorF,
    sample_coverage: Option<SampleCoverage>,
    sample_mask: Option<u32>,
    depth_stencil: DepthStencilState,
    stencil_ref: i32,
    stencil_back_ref: i32,
    rasterizer: RasterizerState,
    scissor_test: bool,
    scissor: Rectangle,
    viewport: Rectangle,
    near_z: f32,
    far_z: f32,
}

impl Default for GlSnapshot {
    fn default() -> Self {
        Self {
            blend: BlendState::default(),
            blend_color: ColorF::default(),
            sample_coverage: None,
            sample_mask: None,
            depth_stencil: DepthStencilState::default(),
            stencil_ref: 0,
            stencil_back_ref: 0,
            rasterizer: RasterizerState::default(),
            scissor_test: false,
            scissor: Rectangle::default(),
            viewport: Rectangle::default(),
            near_z: 0.0,
            far_z: 1.0,
        }
    }
}

/// Native state as last issued. `None` means unknown, which never compares equal.
#[derive(Clone, Debug, Default)]
struct AppliedState {
    render_targets: Option<(Vec<Option<ViewId>>, Option<ViewId>)>,
    viewports: Option<Vec<Viewport>>,
    viewport_constants: Option<(Rectangle, Viewport, bool)>,
    scissor_rects: Option<Vec<ScissorRect>>,
    rasterizer: Option<Option<StateObjectId>>,
    blend: Option<(Option<StateObjectId>, [f32; 4], u32)>,
    depth_stencil: Option<(Option<StateObjectId>, u32)>,
    shaders: [Option<Option<ShaderId>>; PipelineStage::COUNT],
    input_layout: Option<Option<InputLayoutId>>,
    index_buffer: Option<(Option<BufferId>, IndexFormat, u32)>,
    topology: Option<PrimitiveTopology>,
    /// `(serial, version)` of the bound transform feedback; `None` while no targets are bound.
    transform_feedback: Option<(ResourceSerial, u64)>,
}

/// A constant-buffer slot as last bound: buffer identity plus the bound byte window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ConstantBufferBinding {
    buffer: Option<BufferId>,
    offset: u64,
    size: u64,
}

/// Identity of the last prepared index data.
#[derive(Clone, Debug, PartialEq, Eq)]
struct IndexKey {
    mode: PrimitiveMode,
    draw: IndexedDraw,
    element_array: Option<ElementArrayBuffer>,
}

pub struct StateManager {
    config: StateManagerConfig,
    internal_dirty: DirtyBits,
    in_flush: bool,
    stats: StateStats,

    // Derived from the draw framebuffer, refreshed lazily.
    render_target_is_dirty: bool,
    disable_depth: bool,
    disable_stencil: bool,
    stencil_size: u32,
    multisample: bool,
    present_path_fast: bool,
    present_path_height: i32,
    viewport_bounds: Option<Extents>,
    view_offsets: Vec<Offset>,
    multiview_write_index: f32,

    gl: GlSnapshot,
    applied: AppliedState,

    srv_caches: [ViewCache<ShaderResourceView>; ShaderStage::COUNT],
    uav_cache: ViewCache<UnorderedAccessView>,
    applied_samplers: [Vec<Option<StateObjectId>>; ShaderStage::COUNT],
    /// Resources written by the bound render targets.
    render_target_writes: Vec<(ResourceSerial, Option<ImageIndex>)>,
    /// A texture sync left a view unbound because it is also a render target.
    withheld_views: bool,
    /// Swizzled texture copies must be regenerated before the next draw.
    dirty_swizzles: bool,

    constant_buffers: [[Option<ConstantBufferBinding>; MAX_CONSTANT_BUFFER_SLOTS]; PipelineStage::COUNT],
    uploaded_uniforms: [Option<(BufferId, u64)>; ShaderStage::COUNT],
    driver_buffers: [Option<BufferId>; ShaderStage::COUNT],
    shader_constants: ShaderConstants,

    current_mode: Option<PrimitiveMode>,
    first_vertex: i32,
    minimum_draw_count: u32,

    current_value_attribs: [TranslatedAttribute; MAX_VERTEX_ATTRIBS],
    dirty_current_values: u32,
    vertex_buffers: VertexBufferState,
    point_sprites: PointSpriteBuffers,
    instanced_point_sprites: bool,

    index_buffer_dirty: bool,
    last_index: Option<(IndexKey, TranslatedIndexData)>,

    /// Native queries started on this context, keyed by serial.
    current_queries: HashMap<ResourceSerial, QueryId>,
}

impl StateManager {
    pub fn new(config: StateManagerConfig) -> Self {
        let caps = &config.caps;
        let srv_caches = ShaderStage::ALL.map(|stage| {
            let mut slots = caps.max_shader_texture_units(stage) as usize;
            if stage == ShaderStage::Compute {
                // Read-only images follow the textures.
                slots += caps.max_image_units as usize;
            }
            ViewCache::with_capacity(slots)
        });
        let applied_samplers =
            ShaderStage::ALL.map(|stage| vec![None; caps.max_shader_texture_units(stage) as usize]);
        Self {
            config,
            internal_dirty: DirtyBits::all(),
            in_flush: false,
            stats: StateStats::new(),
            render_target_is_dirty: true,
            disable_depth: false,
            disable_stencil: false,
            stencil_size: 0,
            multisample: false,
            present_path_fast: false,
            present_path_height: 0,
            viewport_bounds: None,
            view_offsets: vec![Offset::default()],
            multiview_write_index: 0.0,
            gl: GlSnapshot::default(),
            applied: AppliedState::default(),
            srv_caches,
            uav_cache: ViewCache::with_capacity(caps.max_image_units as usize),
            applied_samplers,
            render_target_writes: Vec::new(),
            withheld_views: false,
            dirty_swizzles: true,
            constant_buffers: [[None; MAX_CONSTANT_BUFFER_SLOTS]; PipelineStage::COUNT],
            uploaded_uniforms: [None; ShaderStage::COUNT],
            driver_buffers: [None; ShaderStage::COUNT],
            shader_constants: ShaderConstants::new(caps),
            current_mode: None,
            first_vertex: 0,
            minimum_draw_count: 0,
            current_value_attribs: [TranslatedAttribute::default(); MAX_VERTEX_ATTRIBS],
            dirty_current_values: u32::MAX,
            vertex_buffers: VertexBufferState::new(),
            point_sprites: PointSpriteBuffers::default(),
            instanced_point_sprites: false,
            index_buffer_dirty: true,
            last_index: None,
            current_queries: HashMap::new(),
        }
    }

    pub fn config(&self) -> &StateManagerConfig {
        &self.config
    }

    /// Categories that the next flush will sync.
    pub fn dirty_bits(&self) -> DirtyBits {
        self.internal_dirty
    }

    pub fn stats(&self) -> &StateStats {
        &self.stats
    }

    pub fn shader_constants(&self) -> &ShaderConstants {
        &self.shader_constants
    }

    /// Minimum vertex count computed by the last topology sync.
    pub fn minimum_draw_count(&self) -> u32 {
        self.minimum_draw_count
    }

    pub fn shader_resources(&self, stage: ShaderStage) -> &ViewCache<ShaderResourceView> {
        &self.srv_caches[stage.index()]
    }

    pub fn unordered_access_views(&self) -> &ViewCache<UnorderedAccessView> {
        &self.uav_cache
    }

    pub fn is_present_path_fast_active(&self) -> bool {
        self.present_path_fast
    }

    fn invalidate(&mut self, bits: DirtyBits) {
        debug_assert!(!self.in_flush, "{bits} invalidated during a flush");
        self.internal_dirty |= bits;
    }

    /// Number of native queries currently started on this context.
    pub fn current_query_count(&self) -> usize {
        self.current_queries.len()
    }

    /// The draw framebuffer changed. Depth/stencil emulation, multisampling and the present path
    /// are re-derived on the next sync or flush.
    pub fn invalidate_render_target(&mut self) {
        self.render_target_is_dirty = true;
        self.invalidate(DirtyBits::RENDER_TARGET | DirtyBits::SHADERS | DirtyBits::BLEND_STATE);
    }

    pub fn invalidate_viewport(&mut self) {
        self.invalidate(DirtyBits::VIEWPORT_STATE);
    }

    pub fn invalidate_scissor(&mut self) {
        self.invalidate(DirtyBits::SCISSOR_STATE);
    }

    /// Scissor enablement is part of the native rasterizer object.
    pub fn invalidate_scissor_enabled(&mut self) {
        self.invalidate(DirtyBits::SCISSOR_STATE | DirtyBits::RASTERIZER_STATE);
    }

    pub fn invalidate_rasterizer(&mut self) {
        self.invalidate(DirtyBits::RASTERIZER_STATE);
    }

    /// Discard disables the pixel stage.
    pub fn invalidate_rasterizer_discard(&mut self) {
        self.invalidate(DirtyBits::RASTERIZER_STATE | DirtyBits::SHADERS);
    }

    pub fn invalidate_blend(&mut self) {
        self.invalidate(DirtyBits::BLEND_STATE);
    }

    pub fn invalidate_depth_stencil(&mut self) {
        self.invalidate(DirtyBits::DEPTH_STENCIL_STATE);
    }

    pub fn invalidate_textures(&mut self) {
        self.invalidate(DirtyBits::TEXTURES_AND_SAMPLERS);
        self.invalidate_swizzles();
    }

    pub fn invalidate_swizzles(&mut self) {
        self.dirty_swizzles = true;
    }

    pub fn invalidate_program_uniforms(&mut self) {
        self.invalidate(DirtyBits::PROGRAM_UNIFORMS);
    }

    pub fn invalidate_driver_uniforms(&mut self) {
        self.invalidate(DirtyBits::DRIVER_UNIFORMS);
    }

    pub fn invalidate_program_uniform_buffers(&mut self) {
        self.invalidate(DirtyBits::PROGRAM_UNIFORM_BUFFERS);
    }

    pub fn invalidate_shaders(&mut self) {
        self.invalidate(DirtyBits::SHADERS);
    }

    /// Transform feedback picks the stream-output geometry stage and forbids the
    /// point-size check in the topology sync.
    pub fn invalidate_transform_feedback(&mut self) {
        self.invalidate(
            DirtyBits::TRANSFORM_FEEDBACK | DirtyBits::SHADERS | DirtyBits::PRIMITIVE_TOPOLOGY,
        );
    }

    /// Vertex buffers and input layout are re-derived; bindings that did not change are not
    /// re-issued.
    pub fn invalidate_vertex_buffer(&mut self) {
        self.invalidate(DirtyBits::VERTEX_BUFFERS_AND_INPUT_LAYOUT);
    }

    pub fn invalidate_index_buffer(&mut self) {
        self.index_buffer_dirty = true;
    }

    pub fn invalidate_primitive_topology(&mut self) {
        self.invalidate(DirtyBits::PRIMITIVE_TOPOLOGY);
    }

    pub fn invalidate_current_value(&mut self, attrib: usize) {
        debug_assert!(attrib < MAX_VERTEX_ATTRIBS, "attribute {attrib} out of range");
        self.dirty_current_values |= 1 << attrib;
        // The value's type feeds the input layout and the vertex shader variant.
        self.invalidate(
            DirtyBits::CURRENT_VALUE_ATTRIBS
                | DirtyBits::VERTEX_BUFFERS_AND_INPUT_LAYOUT
                | DirtyBits::SHADERS,
        );
    }

    /// A different vertex array was bound.
    pub fn invalidate_vertex_array(&mut self) {
        self.dirty_current_values = u32::MAX;
        self.index_buffer_dirty = true;
        self.invalidate(
            DirtyBits::VERTEX_BUFFERS_AND_INPUT_LAYOUT | DirtyBits::CURRENT_VALUE_ATTRIBS,
        );
    }

    /// The linked program changed. Almost everything downstream reads its reflection data.
    pub fn invalidate_program(&mut self) {
        // Active outputs decide which render targets are bound.
        self.invalidate_render_target();
        self.invalidate_swizzles();
        self.invalidate(
            DirtyBits::SHADERS
                | DirtyBits::VERTEX_BUFFERS_AND_INPUT_LAYOUT
                | DirtyBits::TEXTURES_AND_SAMPLERS
                | DirtyBits::PROGRAM_UNIFORMS
                | DirtyBits::PROGRAM_UNIFORM_BUFFERS
                | DirtyBits::DRIVER_UNIFORMS
                | DirtyBits::PRIMITIVE_TOPOLOGY,
        );
    }

    /// Forgets which views are bound, e.g. after the device context was cleared behind the state
    /// manager's back. Issues no native calls.
    pub fn invalidate_bound_views(&mut self) {
        for cache in &mut self.srv_caches {
            cache.clear();
        }
        self.uav_cache.clear();
        self.invalidate_render_target();
        self.invalidate(DirtyBits::TEXTURES_AND_SAMPLERS);
    }

    /// Drops every snapshot; the next flush re-applies all state.
    pub fn invalidate_everything(&mut self) {
        self.invalidate(DirtyBits::all());
        self.render_target_is_dirty = true;
        self.dirty_swizzles = true;
        self.applied = AppliedState::default();
        self.gl = GlSnapshot::default();
        for samplers in &mut self.applied_samplers {
            samplers.fill(None);
        }
        self.constant_buffers = [[None; MAX_CONSTANT_BUFFER_SLOTS]; PipelineStage::COUNT];
        self.uploaded_uniforms = [None; ShaderStage::COUNT];
        self.shader_constants.mark_dirty();
        self.vertex_buffers.reset();
        self.dirty_current_values = u32::MAX;
        self.index_buffer_dirty = true;
        self.last_index = None;
        self.current_mode = None;
        self.present_path_height = 0;
        self.view_offsets = vec![Offset::default()];
        self.invalidate_bound_views();
    }

    /// Brings the native state in line with `state` for `draw`.
    ///
    /// On error the failed category and everything after it stay dirty, so the next call retries.
    pub fn update_state(
        &mut self,
        backend: &mut Backend<'_>,
        state: &GlState,
        draw: &DrawCall,
    ) -> Result<PreparedDraw> {
        let program = linked_program(state)?;
        self.process_framebuffer_invalidation(state);
        self.track_draw(program, draw);

        // Generation may run blit passes that disturb state the flush then restores.
        if self.dirty_swizzles {
            for stage in ShaderStage::GRAPHICS {
                self.generate_swizzles_for_stage(backend, state, stage)?;
            }
            self.dirty_swizzles = false;
        }

        let pending = std::mem::replace(&mut self.internal_dirty, DirtyBits::empty());
        self.flush(pending, |manager, bit, pending| {
            manager.sync_graphics_bit(backend, state, bit, pending)
        })?;
        self.stats.inc_flushes();

        let index_data = self.sync_index_data(backend, state, draw)?;
        Ok(PreparedDraw {
            minimum_draw_count: self.minimum_draw_count,
            index_data,
            instanced_point_sprites: self.instanced_point_sprites,
        })
    }

    /// Draw parameters that invalidate state when they change.
    fn track_draw(&mut self, program: &ProgramInfo, draw: &DrawCall) {
        if self.current_mode != Some(draw.mode) {
            let was_points = self.current_mode == Some(PrimitiveMode::Points);
            let is_points = draw.mode == PrimitiveMode::Points;
            let mut bits = DirtyBits::PRIMITIVE_TOPOLOGY;
            if was_points != is_points {
                // Geometry-stage selection, the point rasterizer flag and the sprite layout.
                bits |= DirtyBits::SHADERS
                    | DirtyBits::RASTERIZER_STATE
                    | DirtyBits::VERTEX_BUFFERS_AND_INPUT_LAYOUT;
            }
            self.current_mode = Some(draw.mode);
            self.invalidate(bits);
        }
        if self.first_vertex != draw.first_vertex {
            self.first_vertex = draw.first_vertex;
            self.invalidate(DirtyBits::VERTEX_BUFFERS_AND_INPUT_LAYOUT);
        }
        let uniforms_changed = ShaderStage::GRAPHICS.into_iter().any(|stage| {
            program
                .uniform_storage(stage)
                .is_some_and(|storage| self.uploaded_uniforms[stage.index()] != Some((storage.buffer, storage.version)))
        });
        if uniforms_changed {
            self.invalidate(DirtyBits::PROGRAM_UNIFORMS);
        }
    }

    /// Runs `sync` for every pending bit in flush order.
    fn flush<F>(&mut self, bits: DirtyBits, mut sync: F) -> Result<()>
    where
        F: FnMut(&mut Self, DirtyBit, &mut Pending) -> Result<()>,
    {
        self.in_flush = true;
        let mut pending = Pending {
            bits,
            current: DirtyBit::RenderTarget,
        };
        let mut synced = 0u64;
        while let Some(bit) = pending.bits.iter_ordered().next() {
            pending.bits.remove(bit.flag());
            pending.current = bit;
            tracing::trace!(%bit, "syncing");
            if let Err(err) = sync(self, bit, &mut pending) {
                self.in_flush = false;
                self.internal_dirty |= pending.bits | bit.flag();
                tracing::debug!(%bit, error = %err, "flush failed");
                return Err(err);
            }
            synced += 1;
        }
        self.in_flush = false;
        debug_assert!(
            self.internal_dirty.is_empty(),
            "dirty bits {} set during a flush",
            self.internal_dirty
        );
        if synced > 0 {
            self.stats.add_dirty_bits_synced(synced);
            tracing::debug!(synced, "flushed state");
        }
        Ok(())
    }

    fn sync_graphics_bit(
        &mut self,
        backend: &mut Backend<'_>,
        state: &GlState,
        bit: DirtyBit,
        pending: &mut Pending,
    ) -> Result<()> {
        match bit {
            DirtyBit::RenderTarget => self.sync_render_targets(backend.device, state, pending),
            DirtyBit::ViewportState => self.sync_viewport(backend.device, state, pending),
            DirtyBit::ScissorState => self.sync_scissor(backend.device, state),
            DirtyBit::RasterizerState => self.sync_rasterizer(backend, state),
            DirtyBit::BlendState => self.sync_blend(backend, state),
            DirtyBit::DepthStencilState => self.sync_depth_stencil(backend, state),
            DirtyBit::TexturesAndSamplers => {
                for stage in ShaderStage::GRAPHICS {
                    self.sync_stage_textures(backend, state, stage)?;
                }
                if ShaderStage::GRAPHICS
                    .into_iter()
                    .any(|stage| self.shader_constants.is_dirty(stage))
                {
                    pending.defer(DirtyBits::DRIVER_UNIFORMS);
                }
                Ok(())
            }
            DirtyBit::ProgramUniforms => {
                for stage in ShaderStage::GRAPHICS {
                    self.sync_default_uniforms(backend.device, state, stage)?;
                }
                Ok(())
            }
            DirtyBit::DriverUniforms => {
                for stage in ShaderStage::GRAPHICS {
                    self.sync_driver_uniforms(backend.device, state, stage)?;
                }
                Ok(())
            }
            DirtyBit::ProgramUniformBuffers => {
                for stage in ShaderStage::GRAPHICS {
                    self.sync_uniform_buffers(backend.device, state, stage);
                }
                Ok(())
            }
            DirtyBit::Shaders => self.sync_shaders(backend, state),
            DirtyBit::CurrentValueAttribs => self.sync_current_values(backend, state, pending),
            DirtyBit::TransformFeedback => {
                self.sync_transform_feedback(backend.device, state);
                Ok(())
            }
            DirtyBit::VertexBuffersAndInputLayout => self.sync_vertex_buffers(backend, state),
            DirtyBit::PrimitiveTopology => {
                self.sync_primitive_topology(backend.device, state);
                Ok(())
            }
        }
    }
}
