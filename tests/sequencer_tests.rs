//! Stage Sequencer Tests
//!
//! Tests for:
//! - Stage order: debug groups, native event placement, completed stages
//! - Steady state: frame index, accumulation mode, ring slots, TAA parity
//! - Resets: external resize between frames, forced history reset
//! - Skips: untraced cameras, empty packed scene
//! - Failures: kernel errors, misaligned instances
//! - Ray reconstruction: gating, event order, descriptor contents

mod common;

use common::{
    MockAllocator, MockDenoiser, MockScene, StageLog, camera, failing_stage_set, init_logger,
    mock_entry_point, moving_camera, preview_camera, render_view, stage_set,
};
use trace_pipeline::Result;
use trace_pipeline::denoiser::reconstruction::{RECONSTRUCT_EVENT_ID, UpscalerMode};
use trace_pipeline::denoiser::{DENOISE_EVENT_ID, InstanceId};
use trace_pipeline::denoiser::frame_data::AccumulationMode;
use trace_pipeline::errors::PipelineError;
use trace_pipeline::gpu::{BlitDecode, GpuTexture, RecordedCommand, RecordingCommandStream};
use trace_pipeline::pipeline::{
    CHANNEL_COUNT, FrameOutcome, FrameReport, FrameServices, PipelineStage, ResourceChannel,
    ResourcePool, SkipReason, StageSequencer, StageSet, taa_destination, taa_source,
};
use trace_pipeline::scene::{CameraState, ViewId};
use trace_pipeline::settings::{DisplayMode, PathTracingSettings};

const INSTANCE: InstanceId = InstanceId(11);
const RR_INSTANCE: InstanceId = InstanceId(21);

struct Harness {
    pool: ResourcePool,
    sequencer: StageSequencer,
    alloc: MockAllocator,
    denoiser: MockDenoiser,
    stages: StageSet,
    log: StageLog,
    scene: MockScene,
    settings: PathTracingSettings,
    reconstruction: Option<InstanceId>,
    output: GpuTexture,
    frame_count: u32,
}

impl Harness {
    fn new() -> Self {
        init_logger();
        let log = StageLog::default();
        let mut alloc = MockAllocator::new();
        let output = alloc.output(1920, 1080);
        Self {
            pool: ResourcePool::new(),
            sequencer: StageSequencer::new(3).unwrap(),
            alloc,
            denoiser: MockDenoiser::new(),
            stages: stage_set(&log),
            log,
            scene: MockScene::with_instances(4),
            settings: PathTracingSettings::default(),
            reconstruction: None,
            output,
            frame_count: 0,
        }
    }

    fn frame(&mut self, camera: CameraState, commands: &mut RecordingCommandStream) -> Result<FrameOutcome> {
        let view = render_view(ViewId::mono(1), camera, self.output, self.frame_count);
        self.frame_count += 1;
        let mut services = FrameServices {
            textures: &mut self.alloc,
            denoiser: &mut self.denoiser,
            entry_point: mock_entry_point(),
            stages: &self.stages,
            scene: &self.scene,
            settings: &self.settings,
            reconstruction: self.reconstruction,
        };
        self.sequencer
            .run_frame(&view, INSTANCE, &mut self.pool, &mut services, commands)
    }

    fn rendered(&mut self, camera: CameraState) -> FrameReport {
        let mut commands = RecordingCommandStream::new();
        match self.frame(camera, &mut commands).unwrap() {
            FrameOutcome::Rendered(report) => *report,
            FrameOutcome::Skipped(reason) => panic!("frame skipped: {reason:?}"),
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.pool.release(&mut self.alloc, &mut self.denoiser);
    }
}

// ============================================================================
// Stage Order
// ============================================================================

#[test]
fn stages_run_in_fixed_order() {
    let mut h = Harness::new();
    let mut commands = RecordingCommandStream::new();
    let outcome = h.frame(camera(1920, 1080), &mut commands).unwrap();

    let groups: Vec<_> = commands.debug_groups().collect();
    assert_eq!(
        groups,
        [
            "Setup",
            "PrimaryTrace",
            "Denoise",
            "Composition",
            "SecondaryTrace",
            "TemporalFilter",
            "Display"
        ]
    );
    let expected: Vec<_> = PipelineStage::ALL
        .into_iter()
        .filter(|s| *s != PipelineStage::Reconstruct)
        .collect();
    assert_eq!(outcome.report().unwrap().stages.as_slice(), expected.as_slice());
    assert!(outcome.report().unwrap().reconstruction.is_none());
}

#[test]
fn denoise_event_sits_between_trace_and_composition() {
    let mut h = Harness::new();
    let mut commands = RecordingCommandStream::new();
    h.frame(camera(1920, 1080), &mut commands).unwrap();

    let cmds = commands.commands();
    let event_at = cmds
        .iter()
        .position(|c| matches!(c, RecordedCommand::NativeEvent { .. }))
        .unwrap();
    let group_at = |label: &str| {
        cmds.iter()
            .position(|c| matches!(c, RecordedCommand::PushDebugGroup(l) if l == label))
            .unwrap()
    };
    assert!(group_at("Denoise") < event_at);
    assert!(event_at < group_at("Composition"));
    assert_eq!(commands.native_events().count(), 1);
}

#[test]
fn kernels_see_their_own_stage() {
    let mut h = Harness::new();
    h.rendered(camera(1920, 1080));

    let stages: Vec<_> = h.log.borrow().iter().map(|c| c.stage).collect();
    assert_eq!(
        stages,
        [
            PipelineStage::PrimaryTrace,
            PipelineStage::Composition,
            PipelineStage::SecondaryTrace,
            PipelineStage::TemporalFilter
        ]
    );
}

// ============================================================================
// Steady State
// ============================================================================

#[test]
fn six_frames_at_1080p() {
    let mut h = Harness::new();

    for f in 0..6u32 {
        let mut commands = RecordingCommandStream::new();
        let outcome = h.frame(moving_camera(f, 1920, 1080), &mut commands).unwrap();
        let report = outcome.report().unwrap();
        let seq = u64::from(f);

        assert_eq!(report.frame_index, f);
        let expected_mode = if f == 0 {
            AccumulationMode::Restart
        } else {
            AccumulationMode::Continue
        };
        assert_eq!(report.accumulation, expected_mode, "frame {f}");
        assert_eq!(report.reallocated, f == 0);
        assert_eq!(report.slot.slot(), (f % 3) as usize);
        assert_eq!(report.slot.sequence(), seq);

        assert_eq!(report.history.source, taa_source(seq));
        assert_eq!(report.history.destination, taa_destination(seq));
        assert_eq!(report.history.valid, f != 0);
        assert_eq!(report.displayed, Some(taa_destination(seq).channel()));

        let (event_id, payload) = commands.native_events().next().unwrap();
        assert_eq!(event_id, DENOISE_EVENT_ID);
        assert_eq!(payload, report.slot);

        let desc = h.sequencer.ring().get(report.slot).unwrap();
        assert_eq!(desc.frame_index(), f);
        assert_eq!(desc.size(), (1920, 1080));
        assert_eq!(desc.instance_id, INSTANCE.0);
        if f > 0 {
            assert_eq!(
                desc.previous_world_to_view(),
                moving_camera(f - 1, 1920, 1080).world_to_view
            );
        }

        let blit = commands
            .commands()
            .iter()
            .find_map(|c| match c {
                RecordedCommand::Blit {
                    source,
                    target,
                    decode,
                } => Some((*source, *target, *decode)),
                _ => None,
            })
            .unwrap();
        let expected = h.pool.texture(taa_destination(seq).channel()).unwrap().texture;
        assert_eq!(blit, (expected, h.output, BlitDecode::Copy));
    }

    assert_eq!(h.alloc.created, CHANNEL_COUNT);
    assert_eq!(h.pool.frames_since_allocation(), 6);
}

#[test]
fn temporal_filter_alternates_history_buffers() {
    let mut h = Harness::new();
    for f in 0..4 {
        h.rendered(moving_camera(f, 320, 240));
    }

    let log = h.log.borrow();
    let taa: Vec<_> = log
        .iter()
        .filter(|c| c.stage == PipelineStage::TemporalFilter)
        .collect();
    assert_eq!(taa.len(), 4);
    for pair in taa.windows(2) {
        // Last frame's destination is this frame's source.
        assert_eq!(pair[1].history.source, pair[0].history.destination);
    }
}

#[test]
fn steady_bindings_are_pushed_once() {
    let mut h = Harness::new();
    h.rendered(camera(640, 480));
    assert_eq!(h.denoiser.log.borrow().updates.len(), 2);
    h.rendered(camera(640, 480));
    h.rendered(camera(640, 480));
    assert_eq!(h.denoiser.log.borrow().updates.len(), 2);
}

// ============================================================================
// Resets
// ============================================================================

#[test]
fn external_resize_restarts_history() {
    let mut h = Harness::new();
    h.rendered(camera(1920, 1080));
    h.rendered(camera(1920, 1080));
    let before: Vec<u64> = h.pool.slots().iter().map(|s| s.texture.id).collect();
    h.log.borrow_mut().clear();

    h.pool
        .ensure(&mut h.alloc, &mut h.denoiser, INSTANCE, 2560, 1440)
        .unwrap();
    let report = h.rendered(camera(2560, 1440));

    assert_eq!(report.frame_index, 0);
    assert_eq!(report.accumulation, AccumulationMode::Restart);
    assert!(report.reallocated);
    assert!(!report.history.valid);

    let after: Vec<u64> = h.pool.slots().iter().map(|s| s.texture.id).collect();
    assert!(before.iter().all(|id| !after.contains(id)));
    for call in h.log.borrow().iter() {
        assert!(call.bound.iter().all(|id| after.contains(id)), "{:?}", call.stage);
    }

    let desc = h.sequencer.ring().get(report.slot).unwrap();
    assert_eq!(desc.size(), (2560, 1440));
    assert_eq!(desc.previous_resource_size(), (1920, 1080));

    let next = h.rendered(camera(2560, 1440));
    assert_eq!(next.frame_index, 1);
    assert_eq!(next.accumulation, AccumulationMode::Continue);
}

#[test]
fn camera_resize_reallocates_in_setup() {
    let mut h = Harness::new();
    h.rendered(camera(800, 600));
    h.rendered(camera(800, 600));

    let report = h.rendered(camera(1024, 768));
    assert!(report.reallocated);
    assert_eq!(report.frame_index, 0);
    assert_eq!(h.pool.size(), Some((1024, 768)));
    // Ring sequence keeps counting across the reset.
    assert_eq!(report.slot.sequence(), 2);
}

#[test]
fn forced_reset_clears_history_for_one_frame() {
    let mut h = Harness::new();
    h.rendered(camera(256, 256));
    h.rendered(camera(256, 256));

    h.settings.force_history_reset = true;
    let reset = h.rendered(camera(256, 256));
    assert_eq!(reset.accumulation, AccumulationMode::ClearAndRestart);
    assert!(!reset.history.valid);
    let desc = h.sequencer.ring().get(reset.slot).unwrap();
    assert_eq!(desc.accumulation_mode(), Some(AccumulationMode::ClearAndRestart));

    h.settings.force_history_reset = false;
    let after = h.rendered(camera(256, 256));
    assert_eq!(after.accumulation, AccumulationMode::Continue);
    assert!(after.history.valid);
}

// ============================================================================
// Skips
// ============================================================================

#[test]
fn preview_camera_records_nothing() {
    let mut h = Harness::new();
    let mut commands = RecordingCommandStream::new();

    let outcome = h.frame(preview_camera(512, 512), &mut commands).unwrap();

    assert!(matches!(outcome, FrameOutcome::Skipped(SkipReason::UntracedCamera)));
    assert!(commands.commands().is_empty());
    assert!(!h.pool.is_allocated());
    assert_eq!(h.sequencer.ring().next_sequence(), 0);
}

#[test]
fn empty_packed_scene_is_skipped() {
    let mut h = Harness::new();
    h.settings.use_packed_data = true;
    h.scene.instance_count = 0;
    let mut commands = RecordingCommandStream::new();

    let outcome = h.frame(camera(512, 512), &mut commands).unwrap();

    assert!(matches!(outcome, FrameOutcome::Skipped(SkipReason::EmptyScene)));
    assert!(commands.commands().is_empty());
    assert_eq!(h.sequencer.frame_index(), 0);
}

#[test]
fn empty_scene_without_packed_data_still_traces() {
    let mut h = Harness::new();
    h.scene.instance_count = 0;
    let report = h.rendered(camera(64, 64));
    assert_eq!(report.stages.len(), 7);
}

// ============================================================================
// Display
// ============================================================================

#[test]
fn display_none_leaves_target_untouched() {
    let mut h = Harness::new();
    h.settings.display_mode = DisplayMode::None;
    let mut commands = RecordingCommandStream::new();

    let outcome = h.frame(camera(64, 64), &mut commands).unwrap();

    assert_eq!(outcome.report().unwrap().displayed, None);
    assert!(
        !commands
            .commands()
            .iter()
            .any(|c| matches!(c, RecordedCommand::Blit { .. }))
    );
}

#[test]
fn debug_modes_blit_their_channel() {
    let mut h = Harness::new();
    h.settings.display_mode = DisplayMode::Normal;
    h.settings.show_validation = true;
    let mut commands = RecordingCommandStream::new();

    let outcome = h.frame(camera(64, 64), &mut commands).unwrap();
    assert_eq!(
        outcome.report().unwrap().displayed,
        Some(ResourceChannel::NormalRoughness)
    );

    let decodes: Vec<_> = commands
        .commands()
        .iter()
        .filter_map(|c| match c {
            RecordedCommand::Blit { decode, .. } => Some(*decode),
            _ => None,
        })
        .collect();
    assert_eq!(decodes, [BlitDecode::Normal, BlitDecode::Overlay]);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn kernel_failure_stops_the_frame() {
    let mut h = Harness::new();
    h.stages = failing_stage_set(&h.log, PipelineStage::Composition);
    let mut commands = RecordingCommandStream::new();

    let err = h.frame(camera(128, 128), &mut commands).unwrap_err();

    assert!(matches!(err, PipelineError::StageFailed { stage: "Composition", .. }));
    let groups: Vec<_> = commands.debug_groups().collect();
    assert_eq!(groups, ["Setup", "PrimaryTrace", "Denoise", "Composition"]);
    // The denoise event was issued, so the frame still counts.
    assert_eq!(h.pool.frames_since_allocation(), 1);
}

#[test]
fn failed_frame_still_chains_camera_history() {
    let mut h = Harness::new();
    h.rendered(moving_camera(0, 128, 128));

    h.stages = failing_stage_set(&h.log, PipelineStage::Composition);
    let mut commands = RecordingCommandStream::new();
    assert!(h.frame(moving_camera(1, 128, 128), &mut commands).is_err());
    assert_eq!(commands.native_events().count(), 1);
    assert_eq!(h.sequencer.frame_index(), 2);
    assert_eq!(
        h.sequencer.previous_context().unwrap().world_to_view,
        moving_camera(1, 128, 128).world_to_view
    );

    h.stages = stage_set(&h.log);
    let report = h.rendered(moving_camera(2, 128, 128));
    let desc = h.sequencer.ring().get(report.slot).unwrap();
    assert_eq!(report.frame_index, 2);
    assert_eq!(
        desc.previous_world_to_view(),
        moving_camera(1, 128, 128).world_to_view
    );
}

#[test]
fn setup_failure_leaves_camera_history_alone() {
    let mut h = Harness::new();
    h.rendered(moving_camera(0, 128, 128));

    let mut commands = RecordingCommandStream::new();
    assert!(h.frame(moving_camera(1, 0, 128), &mut commands).is_err());
    assert_eq!(h.sequencer.frame_index(), 1);

    let report = h.rendered(moving_camera(2, 128, 128));
    let desc = h.sequencer.ring().get(report.slot).unwrap();
    assert_eq!(
        desc.previous_world_to_view(),
        moving_camera(0, 128, 128).world_to_view
    );
}

#[test]
fn misaligned_instances_fail_setup() {
    let mut h = Harness::new();
    h.scene.misaligned = true;
    let mut commands = RecordingCommandStream::new();

    let err = h.frame(camera(128, 128), &mut commands).unwrap_err();

    assert!(matches!(err, PipelineError::InstanceMisaligned { .. }));
    assert_eq!(commands.native_events().count(), 0);
}

#[test]
fn reordered_tlas_is_caught_at_unchanged_count() {
    let mut h = Harness::new();
    h.rendered(camera(128, 128));

    // Same instance count, new TLAS order.
    h.scene.misaligned = true;
    let mut commands = RecordingCommandStream::new();
    let err = h.frame(camera(128, 128), &mut commands).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::InstanceMisaligned {
            instance: 0,
            tlas_index: Some(1)
        }
    ));
    assert_eq!(commands.native_events().count(), 0);
    assert_eq!(h.sequencer.frame_index(), 1);

    h.scene.misaligned = false;
    assert_eq!(h.rendered(camera(128, 128)).frame_index, 1);
}

#[test]
fn invalid_resolution_fails_setup() {
    let mut h = Harness::new();
    let mut commands = RecordingCommandStream::new();

    let err = h.frame(camera(0, 720), &mut commands).unwrap_err();

    assert!(matches!(err, PipelineError::InvalidResolution { .. }));
    assert_eq!(h.sequencer.ring().next_sequence(), 0);
}

// ============================================================================
// Ray Reconstruction
// ============================================================================

fn enable_reconstruction(h: &mut Harness) {
    h.reconstruction = Some(RR_INSTANCE);
    h.settings.reconstruction.enabled = true;
    h.settings.reconstruction.resolution_scale = 0.5;
    h.settings.reconstruction.upscaler_mode = UpscalerMode::Performance;
}

#[test]
fn reconstruction_runs_after_temporal_filter() {
    let mut h = Harness::new();
    enable_reconstruction(&mut h);
    let mut commands = RecordingCommandStream::new();

    let outcome = h.frame(moving_camera(0, 1920, 1080), &mut commands).unwrap();
    let report = outcome.report().unwrap();

    let groups: Vec<_> = commands.debug_groups().collect();
    assert_eq!(
        groups,
        [
            "Setup",
            "PrimaryTrace",
            "Denoise",
            "Composition",
            "SecondaryTrace",
            "TemporalFilter",
            "Reconstruct",
            "Display"
        ]
    );
    assert_eq!(report.stages.as_slice(), PipelineStage::ALL);

    let rr_slot = report.reconstruction.unwrap();
    let events: Vec<_> = commands.native_events().collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].0, DENOISE_EVENT_ID);
    assert_eq!(events[0].1, report.slot);
    assert_eq!(events[1].0, RECONSTRUCT_EVENT_ID);
    assert_eq!(events[1].1, rr_slot);
}

#[test]
fn reconstruction_descriptor_points_at_pool_textures() {
    let mut h = Harness::new();
    enable_reconstruction(&mut h);
    let camera = moving_camera(3, 1920, 1080);

    let report = h.rendered(camera);
    let desc = *h
        .sequencer
        .reconstruction_ring()
        .get(report.reconstruction.unwrap())
        .unwrap();

    assert_eq!(desc.instance_id, RR_INSTANCE.0);
    assert_eq!(desc.output_size(), (1920, 1080));
    assert_eq!(desc.render_size(), (960, 540));
    assert_eq!(desc.upscaler_mode(), Some(UpscalerMode::Performance));
    assert_eq!(desc.jitter(), camera.jitter);
    assert_eq!(desc.world_to_view, camera.world_to_view.to_cols_array());
    for channel in [
        ResourceChannel::Composed,
        ResourceChannel::ReconstructionOutput,
        ResourceChannel::ViewZ,
        ResourceChannel::GuideSpecularHitDistance,
    ] {
        let native = h.pool.texture(channel).unwrap().texture.native;
        assert_eq!(desc.texture(channel), Some(native.0), "{channel:?}");
    }
}

#[test]
fn reconstruction_ring_recycles_like_the_frame_ring() {
    let mut h = Harness::new();
    enable_reconstruction(&mut h);

    let first = h.rendered(camera(256, 256)).reconstruction.unwrap();
    for _ in 0..2 {
        h.rendered(camera(256, 256));
    }
    assert!(h.sequencer.reconstruction_ring().get(first).is_some());

    let fourth = h.rendered(camera(256, 256)).reconstruction.unwrap();
    assert_eq!(fourth.slot(), first.slot());
    assert!(h.sequencer.reconstruction_ring().get(first).is_none());
}

#[test]
fn reconstruction_needs_instance_and_setting() {
    let mut h = Harness::new();
    h.settings.reconstruction.enabled = true;
    let mut commands = RecordingCommandStream::new();
    let outcome = h.frame(camera(128, 128), &mut commands).unwrap();
    assert!(outcome.report().unwrap().reconstruction.is_none());
    assert_eq!(commands.native_events().count(), 1);

    h.settings.reconstruction.enabled = false;
    h.reconstruction = Some(RR_INSTANCE);
    let mut commands = RecordingCommandStream::new();
    let outcome = h.frame(camera(128, 128), &mut commands).unwrap();
    assert!(outcome.report().unwrap().reconstruction.is_none());
    assert!(!commands.debug_groups().any(|g| g == "Reconstruct"));
    assert_eq!(h.sequencer.reconstruction_ring().next_sequence(), 0);
}

#[test]
fn kernel_failure_skips_reconstruction() {
    let mut h = Harness::new();
    enable_reconstruction(&mut h);
    h.stages = failing_stage_set(&h.log, PipelineStage::TemporalFilter);
    let mut commands = RecordingCommandStream::new();

    assert!(h.frame(camera(128, 128), &mut commands).is_err());

    let events: Vec<_> = commands.native_events().map(|(id, _)| id).collect();
    assert_eq!(events, [DENOISE_EVENT_ID]);
    assert_eq!(h.sequencer.reconstruction_ring().next_sequence(), 0);
}

#[test]
fn reconstructed_mode_displays_the_pass_output() {
    let mut h = Harness::new();
    enable_reconstruction(&mut h);
    h.settings.display_mode = DisplayMode::Reconstructed;

    let report = h.rendered(camera(64, 64));
    assert_eq!(report.displayed, Some(ResourceChannel::ReconstructionOutput));
}
