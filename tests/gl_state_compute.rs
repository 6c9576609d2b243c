mod common;

use aero_gl_state::caps::DRIVER_UNIFORM_SLOT;
use aero_gl_state::native::{
    DeviceError, NativeCall, ShaderResourceView, SrvDimension, UavDimension, UnorderedAccessView,
};
use aero_gl_state::query::{QueryControl, QueryId, QueryType};
use aero_gl_state::serial::ViewId;
use aero_gl_state::shader_constants::ComputeConstants;
use aero_gl_state::{PipelineStage, ShaderStage, StateError};
use common::*;
use pretty_assertions::assert_eq;

#[test]
fn dispatch_binds_the_compute_pipeline_once() {
    let mut h = Harness::new();
    let mut state = h.default_state();
    sample_units(&mut state, ShaderStage::Compute, &[0]);
    let resource = h.serial();
    let texture = h.texture_2d(resource, 1);
    state.texture_units[0] = Some(texture);

    h.dispatch(&state, [4, 2, 1]).unwrap();
    let calls = h.device.take_calls();
    assert!(calls.contains(&NativeCall::SetShader {
        stage: PipelineStage::Compute,
        shader: Some(h.executables.compute),
    }));
    assert!(calls.contains(&NativeCall::SetShaderResources {
        stage: ShaderStage::Compute,
        start_slot: 0,
        views: vec![Some(texture.srv.id)],
    }));
    let driver_buffer = calls
        .iter()
        .find_map(|call| match call {
            NativeCall::SetConstantBuffer {
                stage: PipelineStage::Compute,
                slot,
                buffer,
                ..
            } if *slot == DRIVER_UNIFORM_SLOT => *buffer,
            _ => None,
        })
        .unwrap();
    let groups = ComputeConstants {
        num_work_groups: [4, 2, 1],
        padding: 0,
    };
    assert_eq!(
        &h.device.buffer_contents(driver_buffer).unwrap()[..16],
        bytemuck::bytes_of(&groups)
    );
    // Graphics state is left alone.
    assert!(!calls.iter().any(|call| call.name() == "SetRenderTargets"));

    h.dispatch(&state, [4, 2, 1]).unwrap();
    assert!(h.device.calls().is_empty());

    h.dispatch(&state, [8, 1, 1]).unwrap();
    assert_eq!(h.device.call_names(), vec!["WriteDiscard"]);
    assert_eq!(h.manager.shader_constants().compute().num_work_groups, [8, 1, 1]);
    assert_eq!(h.manager.stats().snapshot().compute_flushes, 3);
}

#[test]
fn readonly_images_bind_after_the_textures() {
    let mut h = Harness::new();
    let mut state = h.default_state();
    edit_program(&mut state, |program| program.readonly_image_units = vec![2]);
    let image = ShaderResourceView {
        id: ViewId(h.serial()),
        resource: h.serial(),
        dimension: SrvDimension::Texture2D {
            most_detailed_mip: 0,
            mip_levels: 1,
        },
    };
    state.image_units[2].srv = Some(image);

    h.dispatch(&state, [1, 1, 1]).unwrap();
    let first_image_slot = h.manager.config().caps.max_compute_texture_image_units;
    assert_eq!(first_image_slot, 16);
    assert!(h.device.calls().contains(&NativeCall::SetShaderResources {
        stage: ShaderStage::Compute,
        start_slot: first_image_slot,
        views: vec![Some(image.id)],
    }));
    assert_eq!(
        h.manager
            .shader_resources(ShaderStage::Compute)
            .view_id(first_image_slot as usize),
        Some(image.id)
    );
    h.device.take_calls();

    // The image unit was emptied.
    state.image_units[2].srv = None;
    h.dispatch(&state, [1, 1, 1]).unwrap();
    assert_eq!(
        h.device.take_calls(),
        vec![NativeCall::SetShaderResources {
            stage: ShaderStage::Compute,
            start_slot: first_image_slot,
            views: vec![None],
        }]
    );
}

#[test]
fn writable_image_unbinds_a_view_of_the_same_resource() {
    let mut h = Harness::new();
    let mut state = h.default_state();
    let resource = h.serial();
    sample_units(&mut state, ShaderStage::Compute, &[0]);
    state.texture_units[0] = Some(h.texture_2d(resource, 1));
    edit_program(&mut state, |program| program.image_units = vec![0]);
    let uav = UnorderedAccessView {
        id: ViewId(h.serial()),
        resource,
        dimension: UavDimension::Texture2D { mip_slice: 0 },
    };
    state.image_units[0].uav = Some(uav);

    h.dispatch(&state, [1, 1, 1]).unwrap();
    let calls = h.device.take_calls();
    let unbind = calls
        .iter()
        .position(|call| {
            *call
                == NativeCall::SetShaderResources {
                    stage: ShaderStage::Compute,
                    start_slot: 0,
                    views: vec![None],
                }
        })
        .unwrap();
    let bind = calls
        .iter()
        .position(|call| {
            *call
                == NativeCall::SetUnorderedAccessViews {
                    start_slot: 0,
                    views: vec![Some(uav.id)],
                }
        })
        .unwrap();
    assert!(unbind < bind);
    assert_eq!(h.manager.shader_resources(ShaderStage::Compute).view_id(0), None);
    assert_eq!(h.manager.unordered_access_views().view_id(0), Some(uav.id));
    assert_eq!(h.manager.stats().snapshot().conflicting_views_unbound, 1);
}

#[test]
fn dispatch_without_a_program_fails() {
    let mut h = Harness::new();
    let mut state = h.default_state();
    state.program = None;
    let err = h.dispatch(&state, [1, 1, 1]).unwrap_err();
    assert!(matches!(err, StateError::MissingProgram));
    assert!(h.device.calls().is_empty());
}

#[derive(Default)]
struct RecordingQueries {
    log: Vec<(&'static str, QueryId)>,
    fail_pause: Option<DeviceError>,
}

impl QueryControl for RecordingQueries {
    fn pause(&mut self, query: QueryId) -> Result<(), DeviceError> {
        if let Some(err) = self.fail_pause.take() {
            return Err(err);
        }
        self.log.push(("pause", query));
        Ok(())
    }

    fn resume(&mut self, query: QueryId) -> Result<(), DeviceError> {
        self.log.push(("resume", query));
        Ok(())
    }
}

#[test]
fn making_current_pauses_old_queries_and_resumes_active_ones() {
    let mut h = Harness::new();
    let mut state = h.default_state();
    let older = QueryId {
        serial: h.serial(),
        query_type: QueryType::TimeElapsed,
    };
    let newer = QueryId {
        serial: h.serial(),
        query_type: QueryType::AnySamples,
    };
    h.manager.on_begin_query(newer);
    h.manager.on_begin_query(older);
    assert_eq!(h.manager.current_query_count(), 2);

    let elapsed = QueryId {
        serial: h.serial(),
        query_type: QueryType::TimeElapsed,
    };
    let samples = QueryId {
        serial: h.serial(),
        query_type: QueryType::AnySamples,
    };
    state.active_queries[QueryType::TimeElapsed.index()] = Some(elapsed);
    state.active_queries[QueryType::AnySamples.index()] = Some(samples);

    let mut control = RecordingQueries::default();
    h.manager.on_make_current(&state, &mut control).unwrap();
    assert_eq!(
        control.log,
        vec![
            ("pause", older),
            ("pause", newer),
            ("resume", samples),
            ("resume", elapsed),
        ]
    );
    assert_eq!(h.manager.current_query_count(), 2);

    h.manager.on_delete_query(samples.serial);
    assert_eq!(h.manager.current_query_count(), 1);
}

#[test]
fn failed_pause_is_reported() {
    let mut h = Harness::new();
    let state = h.default_state();
    let query = QueryId {
        serial: h.serial(),
        query_type: QueryType::AnySamplesConservative,
    };
    h.manager.on_begin_query(query);

    let mut control = RecordingQueries {
        fail_pause: Some(DeviceError::DeviceLost),
        ..Default::default()
    };
    let err = h.manager.on_make_current(&state, &mut control).unwrap_err();
    assert!(matches!(
        err,
        StateError::Query {
            action: "pause",
            query_type: QueryType::AnySamplesConservative,
            source: DeviceError::DeviceLost,
        }
    ));
    // The query is still tracked, so the next make-current pauses it.
    assert_eq!(h.manager.current_query_count(), 1);
    h.manager.on_make_current(&state, &mut control).unwrap();
    assert_eq!(control.log, vec![("pause", query)]);
    assert_eq!(h.manager.current_query_count(), 0);
}
