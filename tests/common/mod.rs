#![allow(dead_code)]

use std::sync::Arc;

use aero_gl_state::cache::HashingStateCache;
use aero_gl_state::caps::StateManagerConfig;
use aero_gl_state::gl::{
    AttachmentSource, ColorAttachment, DrawCall, Extents, GlState, ImageIndex, PrimitiveMode,
    ProgramInfo, Rectangle, SamplerBinding, SamplerState, SizedFormat, SwizzleState,
    TextureBinding, TextureState, TextureType,
};
use aero_gl_state::index::StreamingIndexDataManager;
use aero_gl_state::native::{
    DeviceContext, DeviceError, RecordingContext, ShaderResourceView, SrvDimension, TargetView,
};
use aero_gl_state::serial::{ResourceSerial, SerialFactory, ShaderId, ViewId};
use aero_gl_state::vertex::{CurrentValueBuffers, InputLayoutKey};
use aero_gl_state::{
    Backend, DrawExecutables, ExecutableProvider, PreparedDraw, ShaderStage, StateManager,
    SwizzleGenerator,
};

/// Routes `tracing` output to the test writer when `RUST_LOG` is set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Hands out fixed shader ids and records what was asked for.
pub struct TestExecutables {
    pub vertex: ShaderId,
    pub pixel: ShaderId,
    pub point_geometry: ShaderId,
    pub stream_output: ShaderId,
    pub compute: ShaderId,
    pub requests: Vec<(PrimitiveMode, InputLayoutKey)>,
    pub fail_next: Option<DeviceError>,
}

impl TestExecutables {
    fn new(serials: &mut SerialFactory) -> Self {
        Self {
            vertex: ShaderId(serials.generate()),
            pixel: ShaderId(serials.generate()),
            point_geometry: ShaderId(serials.generate()),
            stream_output: ShaderId(serials.generate()),
            compute: ShaderId(serials.generate()),
            requests: Vec::new(),
            fail_next: None,
        }
    }
}

impl ExecutableProvider for TestExecutables {
    fn draw_executables(
        &mut self,
        program: &ProgramInfo,
        mode: PrimitiveMode,
        input_layout: &InputLayoutKey,
    ) -> Result<DrawExecutables, DeviceError> {
        if let Some(err) = self.fail_next.take() {
            return Err(err);
        }
        self.requests.push((mode, input_layout.clone()));
        let point_geometry = mode == PrimitiveMode::Points
            && program.uses_point_size
            && !input_layout.point_sprite_quad;
        Ok(DrawExecutables {
            vertex: Some(self.vertex),
            pixel: Some(self.pixel),
            geometry: point_geometry.then_some(self.point_geometry),
            stream_output: Some(self.stream_output),
        })
    }

    fn compute_executable(&mut self, _program: &ProgramInfo) -> Result<Option<ShaderId>, DeviceError> {
        Ok(Some(self.compute))
    }
}

/// Records each swizzle request by the view it was made for.
#[derive(Default)]
pub struct RecordingSwizzles {
    pub generated: Vec<(ViewId, SwizzleState)>,
    pub fail_next: Option<DeviceError>,
}

impl SwizzleGenerator for RecordingSwizzles {
    fn generate_swizzle(
        &mut self,
        _device: &mut dyn DeviceContext,
        texture: &TextureBinding,
    ) -> Result<(), DeviceError> {
        if let Some(err) = self.fail_next.take() {
            return Err(err);
        }
        self.generated.push((texture.srv.id, texture.texture.swizzle));
        Ok(())
    }
}

/// A state manager wired to in-memory collaborators.
pub struct Harness {
    pub serials: SerialFactory,
    pub device: RecordingContext,
    pub states: HashingStateCache,
    pub executables: TestExecutables,
    pub vertex_data: CurrentValueBuffers,
    pub index_data: StreamingIndexDataManager,
    pub swizzles: RecordingSwizzles,
    pub manager: StateManager,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(StateManagerConfig::default())
    }

    pub fn with_config(config: StateManagerConfig) -> Self {
        init_tracing();
        let mut serials = SerialFactory::new();
        let executables = TestExecutables::new(&mut serials);
        Self {
            serials,
            device: RecordingContext::new(),
            states: HashingStateCache::new(),
            executables,
            vertex_data: CurrentValueBuffers::default(),
            index_data: StreamingIndexDataManager::new(),
            swizzles: RecordingSwizzles::default(),
            manager: StateManager::new(config),
        }
    }

    pub fn serial(&mut self) -> ResourceSerial {
        self.serials.generate()
    }

    pub fn draw(&mut self, state: &GlState, draw: &DrawCall) -> aero_gl_state::Result<PreparedDraw> {
        let mut backend = Backend {
            device: &mut self.device,
            states: &mut self.states,
            executables: &mut self.executables,
            vertex_data: &mut self.vertex_data,
            index_data: &mut self.index_data,
            swizzles: &mut self.swizzles,
        };
        self.manager.update_state(&mut backend, state, draw)
    }

    pub fn dispatch(&mut self, state: &GlState, groups: [u32; 3]) -> aero_gl_state::Result<()> {
        let mut backend = Backend {
            device: &mut self.device,
            states: &mut self.states,
            executables: &mut self.executables,
            vertex_data: &mut self.vertex_data,
            index_data: &mut self.index_data,
            swizzles: &mut self.swizzles,
        };
        self.manager.update_state_for_compute(&mut backend, state, groups)
    }

    /// A state with a linked program rendering into one 64x64 texture.
    pub fn default_state(&mut self) -> GlState {
        let caps = self.manager.config().caps;
        let vertex_array = self.serial();
        let mut state = GlState::new(&caps, vertex_array);
        state.program = Some(Arc::new(ProgramInfo::new(self.serial())));
        let color = self.serial();
        state.draw_framebuffer.serial = Some(self.serial());
        state.draw_framebuffer.color_attachments = vec![Some(self.color_attachment(color, ImageIndex::make_2d(0)))];
        state.draw_framebuffer.draw_buffer_mask = 0b1;
        state.viewport = Rectangle::new(0, 0, 64, 64);
        state.scissor = Rectangle::new(0, 0, 64, 64);
        state
    }

    pub fn color_attachment(&mut self, resource: ResourceSerial, index: ImageIndex) -> ColorAttachment {
        ColorAttachment {
            view: TargetView {
                id: ViewId(self.serial()),
                resource,
            },
            source: AttachmentSource::Texture(index),
            size: Extents {
                width: 64,
                height: 64,
            },
            format: SizedFormat::Rgba8,
        }
    }

    /// A complete 2D texture with `mip_levels` levels backed by `resource`.
    pub fn texture_2d(&mut self, resource: ResourceSerial, mip_levels: u32) -> TextureBinding {
        TextureBinding {
            srv: ShaderResourceView {
                id: ViewId(self.serial()),
                resource,
                dimension: SrvDimension::Texture2D {
                    most_detailed_mip: 0,
                    mip_levels,
                },
            },
            texture: TextureState::new(TextureType::Texture2D, SizedFormat::Rgba8),
            sampler: SamplerState::default(),
        }
    }
}

/// Replaces the program, leaving every other field alone.
pub fn edit_program(state: &mut GlState, edit: impl FnOnce(&mut ProgramInfo)) {
    let program = state.program.as_mut().expect("state has a program");
    edit(Arc::make_mut(program));
}

/// Makes the program sample `units` from `stage`, one 2D sampler per unit.
pub fn sample_units(state: &mut GlState, stage: ShaderStage, units: &[u32]) {
    edit_program(state, |program| {
        program.samplers[stage.index()] = units
            .iter()
            .map(|&texture_unit| SamplerBinding {
                texture_unit,
                texture_type: TextureType::Texture2D,
            })
            .collect();
    });
}
