mod common;

use std::io;
use std::sync::{Arc, Mutex};

use aero_gl_state::gl::{
    BlendFactor, ColorF, CullFaceMode, DrawCall, GlDirtyBits, GlState, PrimitiveMode, Rectangle,
    SwizzleChannel, SwizzleState,
};
use aero_gl_state::native::{DeviceError, NativeCall, PrimitiveTopology};
use aero_gl_state::serial::ViewId;
use aero_gl_state::topology::UNREACHABLE_DRAW_COUNT;
use aero_gl_state::{DirtyBits, ShaderStage, StateError, StateObjectKind};
use common::*;
use pretty_assertions::assert_eq;

const UNDEFINED_POINT_SIZE: &str = "point draw without a written point size";

fn triangles() -> DrawCall {
    DrawCall::arrays(PrimitiveMode::Triangles, 0, 3)
}

fn position(calls: &[NativeCall], name: &str) -> usize {
    calls
        .iter()
        .position(|call| call.name() == name)
        .unwrap_or_else(|| panic!("no {name} in {:?}", calls.iter().map(NativeCall::name).collect::<Vec<_>>()))
}

#[test]
fn first_draw_applies_everything_and_repeat_draw_is_free() {
    let mut h = Harness::new();
    let state = h.default_state();
    assert_eq!(h.manager.dirty_bits(), DirtyBits::all());

    let prepared = h.draw(&state, &triangles()).unwrap();
    assert_eq!(prepared.minimum_draw_count, 3);
    assert_eq!(prepared.index_data, None);
    assert!(!prepared.instanced_point_sprites);
    assert!(h.manager.dirty_bits().is_empty());

    let names = h.device.call_names();
    for expected in [
        "SetRenderTargets",
        "SetViewports",
        "SetRasterizerState",
        "SetBlendState",
        "SetDepthStencilState",
        "CreateBuffer",
        "SetConstantBuffer",
        "WriteDiscard",
        "SetShader",
        "SetInputLayout",
        "SetVertexBuffers",
        "SetPrimitiveTopology",
    ] {
        assert!(names.contains(&expected), "missing {expected} in {names:?}");
    }
    // The scissor test is off.
    assert!(!names.contains(&"SetScissorRects"));
    h.device.take_calls();

    h.draw(&state, &triangles()).unwrap();
    assert_eq!(h.device.calls(), &[] as &[NativeCall]);

    let stats = h.manager.stats().snapshot();
    assert_eq!(stats.flushes, 2);
    assert_eq!(stats.dirty_bits_synced, DirtyBits::all().iter().count() as u64);
}

#[test]
fn redundant_invalidation_issues_no_calls() {
    let mut h = Harness::new();
    let state = h.default_state();
    h.draw(&state, &triangles()).unwrap();
    h.device.take_calls();

    h.manager.invalidate_blend();
    h.manager.invalidate_depth_stencil();
    h.manager.invalidate_rasterizer();
    h.manager.invalidate_vertex_buffer();
    h.draw(&state, &triangles()).unwrap();
    assert_eq!(h.device.calls(), &[] as &[NativeCall]);
    assert!(h.states.stats().hits > 0);
}

#[test]
fn values_toggled_back_invalidate_nothing() {
    let mut h = Harness::new();
    let mut state = h.default_state();
    h.draw(&state, &triangles()).unwrap();

    let original = state.viewport;
    state.viewport = Rectangle::new(1, 2, 3, 4);
    state.viewport = original;
    h.manager.sync_state(&state, GlDirtyBits::VIEWPORT | GlDirtyBits::BLEND_FUNCS);
    assert!(h.manager.dirty_bits().is_empty());

    state.viewport = Rectangle::new(1, 2, 3, 4);
    h.manager.sync_state(&state, GlDirtyBits::VIEWPORT);
    assert_eq!(h.manager.dirty_bits(), DirtyBits::VIEWPORT_STATE);
}

#[test]
fn viewport_change_lands_before_driver_constants() {
    let mut h = Harness::new();
    let mut state = h.default_state();
    h.draw(&state, &triangles()).unwrap();
    h.device.take_calls();

    state.viewport = Rectangle::new(8, 4, 32, 16);
    h.manager.sync_state(&state, GlDirtyBits::VIEWPORT);
    h.draw(&state, &triangles()).unwrap();

    let calls = h.device.take_calls();
    let viewports = position(&calls, "SetViewports");
    let upload = position(&calls, "WriteDiscard");
    assert!(viewports < upload, "viewport must be applied before the driver constants");
    assert!(!calls.iter().any(|call| call.name() == "SetRenderTargets"));

    let NativeCall::SetViewports(applied) = &calls[viewports] else {
        unreachable!();
    };
    assert_eq!(applied.len(), 1);
    assert_eq!(
        (applied[0].top_left_x, applied[0].top_left_y, applied[0].width, applied[0].height),
        (8.0, 4.0, 32.0, 16.0)
    );
    assert_eq!(h.manager.shader_constants().pixel().view_coords, [16.0, 8.0, 24.0, 12.0]);
    // Vertex and fragment driver constants were both rewritten.
    assert_eq!(calls.iter().filter(|call| call.name() == "WriteDiscard").count(), 2);
}

/// Formatted log output shared with a scoped subscriber.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn count(&self, message: &str) -> usize {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes).matches(message).count()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with warnings and errors written to the returned buffer.
fn capture_warnings(f: impl FnOnce()) -> CapturedLogs {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    logs
}

#[test]
fn points_without_point_size_warn_once_per_topology_sync() {
    let mut h = Harness::new();
    let state = h.default_state();
    let points = DrawCall::arrays(PrimitiveMode::Points, 0, 4);

    let logs = capture_warnings(|| {
        let prepared = h.draw(&state, &points).unwrap();
        assert_eq!(prepared.minimum_draw_count, UNREACHABLE_DRAW_COUNT);
        assert!(prepared.skips(4));
        h.draw(&state, &points).unwrap();
    });
    assert_eq!(h.device.count("SetPrimitiveTopology"), 0);
    assert_eq!(logs.count(UNDEFINED_POINT_SIZE), 1);
    assert_eq!(h.manager.stats().snapshot().undefined_point_size_warnings, 1);

    let logs = capture_warnings(|| {
        h.manager.invalidate_primitive_topology();
        h.draw(&state, &points).unwrap();
    });
    assert_eq!(logs.count(UNDEFINED_POINT_SIZE), 1);
    assert_eq!(h.manager.stats().snapshot().undefined_point_size_warnings, 2);
}

const BLUE_RED: SwizzleState = SwizzleState {
    red: SwizzleChannel::Blue,
    blue: SwizzleChannel::Red,
    ..SwizzleState::IDENTITY
};

/// Fragment samplers read units 0 and 1; only unit 1 is swizzled.
fn swizzled_state(h: &mut Harness, stage: ShaderStage) -> (GlState, ViewId) {
    let mut state = h.default_state();
    sample_units(&mut state, stage, &[0, 1]);
    let plain = h.serial();
    state.texture_units[0] = Some(h.texture_2d(plain, 1));
    let swizzled = h.serial();
    let mut binding = h.texture_2d(swizzled, 1);
    binding.texture.swizzle = BLUE_RED;
    state.texture_units[1] = Some(binding);
    (state, binding.srv.id)
}

#[test]
fn swizzles_regenerate_after_texture_or_program_changes() {
    let mut h = Harness::new();
    let (state, view) = swizzled_state(&mut h, ShaderStage::Fragment);

    h.draw(&state, &triangles()).unwrap();
    assert_eq!(h.swizzles.generated, vec![(view, BLUE_RED)]);

    h.draw(&state, &triangles()).unwrap();
    assert_eq!(h.swizzles.generated.len(), 1);

    h.manager.sync_state(&state, GlDirtyBits::TEXTURE_BINDINGS);
    h.draw(&state, &triangles()).unwrap();
    assert_eq!(h.swizzles.generated.len(), 2);

    h.manager.invalidate_program();
    h.draw(&state, &triangles()).unwrap();
    assert_eq!(h.swizzles.generated.len(), 3);
}

#[test]
fn failed_swizzle_generation_is_retried_on_the_next_draw() {
    let mut h = Harness::new();
    let (state, view) = swizzled_state(&mut h, ShaderStage::Fragment);
    h.swizzles.fail_next = Some(DeviceError::DeviceLost);

    let err = h.draw(&state, &triangles()).unwrap_err();
    assert!(matches!(
        err,
        StateError::Swizzle {
            unit: 1,
            source: DeviceError::DeviceLost,
        }
    ));
    assert!(h.swizzles.generated.is_empty());

    h.draw(&state, &triangles()).unwrap();
    assert_eq!(h.swizzles.generated, vec![(view, BLUE_RED)]);
}

#[test]
fn every_dispatch_regenerates_compute_swizzles() {
    let mut h = Harness::new();
    let (state, view) = swizzled_state(&mut h, ShaderStage::Compute);

    h.dispatch(&state, [1, 1, 1]).unwrap();
    h.dispatch(&state, [1, 1, 1]).unwrap();
    assert_eq!(h.swizzles.generated, vec![(view, BLUE_RED), (view, BLUE_RED)]);
}

#[test]
fn culling_both_faces_makes_triangles_unreachable() {
    let mut h = Harness::new();
    let mut state = h.default_state();
    h.draw(&state, &triangles()).unwrap();

    state.rasterizer.cull_face = true;
    state.rasterizer.cull_mode = CullFaceMode::FrontAndBack;
    h.manager
        .sync_state(&state, GlDirtyBits::CULL_FACE_ENABLED | GlDirtyBits::CULL_FACE);
    assert!(h.manager.dirty_bits().contains(DirtyBits::PRIMITIVE_TOPOLOGY));

    let prepared = h.draw(&state, &triangles()).unwrap();
    assert_eq!(prepared.minimum_draw_count, UNREACHABLE_DRAW_COUNT);
    assert!(prepared.skips(3));
    assert_eq!(h.manager.stats().snapshot().culled_everything_topologies, 1);

    // Lines are not culled.
    let prepared = h.draw(&state, &DrawCall::arrays(PrimitiveMode::Lines, 0, 2)).unwrap();
    assert_eq!(prepared.minimum_draw_count, 2);
    assert!(h
        .device
        .calls()
        .contains(&NativeCall::SetPrimitiveTopology(PrimitiveTopology::LineList)));
}

#[test]
fn constant_alpha_blending_broadcasts_the_alpha() {
    let mut h = Harness::new();
    let mut state = h.default_state();
    state.blend.blend = true;
    state.blend.source_blend_rgb = BlendFactor::ConstantAlpha;
    state.blend_color = ColorF::new(0.1, 0.2, 0.3, 0.5);
    h.draw(&state, &triangles()).unwrap();

    let blend = h
        .device
        .calls()
        .iter()
        .find_map(|call| match call {
            NativeCall::SetBlendState {
                blend_factor,
                sample_mask,
                ..
            } => Some((*blend_factor, *sample_mask)),
            _ => None,
        })
        .unwrap();
    assert_eq!(blend, ([0.5; 4], u32::MAX));
}

#[test]
fn failed_sync_keeps_the_category_dirty() {
    let mut h = Harness::new();
    let state = h.default_state();
    h.states.fail_next_creation(DeviceError::OutOfMemory);

    let err = h.draw(&state, &triangles()).unwrap_err();
    assert!(matches!(
        err,
        StateError::StateObject {
            kind: StateObjectKind::Rasterizer,
            source: DeviceError::OutOfMemory,
        }
    ));
    let dirty = h.manager.dirty_bits();
    assert!(!dirty.contains(DirtyBits::RENDER_TARGET));
    assert!(!dirty.contains(DirtyBits::VIEWPORT_STATE));
    assert!(dirty.contains(DirtyBits::RASTERIZER_STATE | DirtyBits::BLEND_STATE | DirtyBits::PRIMITIVE_TOPOLOGY));
    assert_eq!(h.manager.stats().snapshot().flushes, 0);

    h.device.take_calls();
    h.draw(&state, &triangles()).unwrap();
    assert!(h.manager.dirty_bits().is_empty());
    let names = h.device.call_names();
    assert!(names.contains(&"SetRasterizerState"));
    assert!(!names.contains(&"SetRenderTargets"));
}

#[test]
fn executable_failure_is_reported() {
    let mut h = Harness::new();
    let state = h.default_state();
    h.executables.fail_next = Some(DeviceError::DeviceLost);
    let err = h.draw(&state, &triangles()).unwrap_err();
    assert!(matches!(err, StateError::Executable(DeviceError::DeviceLost)));
    assert!(h.manager.dirty_bits().contains(DirtyBits::SHADERS));

    h.draw(&state, &triangles()).unwrap();
    assert!(h.manager.dirty_bits().is_empty());
}

#[test]
fn drawing_without_a_program_fails_before_syncing() {
    let mut h = Harness::new();
    let mut state = h.default_state();
    state.program = None;
    let err = h.draw(&state, &triangles()).unwrap_err();
    assert!(matches!(err, StateError::MissingProgram));
    assert!(h.device.calls().is_empty());
    assert_eq!(h.manager.dirty_bits(), DirtyBits::all());
}

#[test]
fn invalidate_everything_reapplies_state() {
    let mut h = Harness::new();
    let state = h.default_state();
    h.draw(&state, &triangles()).unwrap();
    let first = h.device.take_calls();

    h.manager.invalidate_everything();
    assert_eq!(h.manager.dirty_bits(), DirtyBits::all());
    h.draw(&state, &triangles()).unwrap();
    let second = h.device.take_calls();

    // Same bindings, minus the driver buffers that already exist.
    let created = |calls: &[NativeCall]| calls.iter().filter(|call| call.name() == "CreateBuffer").count();
    assert_eq!(created(&first), 2);
    assert_eq!(created(&second), 0);
    assert_eq!(
        second.iter().filter(|call| call.name() == "SetRenderTargets").count(),
        1
    );
}
