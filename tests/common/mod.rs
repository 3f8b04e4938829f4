//! Shared test fixtures: in-memory GPU allocator, denoiser library, scene
//! and stage kernels. Nothing here touches a real GPU.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::c_void;
use std::rc::Rc;

use glam::Vec3;

use trace_pipeline::denoiser::reconstruction::ReconstructionLibrary;
use trace_pipeline::denoiser::{
    DenoiserLibrary, ExecutionEntryPoint, InstanceId, LibraryView, ResourceBinding,
};
use trace_pipeline::errors::{PipelineError, Result};
use trace_pipeline::gpu::{
    CommandStream, GpuTexture, NativeHandle, PixelFormat, TextureAllocator, TextureDesc,
};
use trace_pipeline::pipeline::{
    FrameStage, HistoryPair, PipelineStage, ResourceChannel, StageContext, StageSet,
};
use trace_pipeline::scene::{
    BufferHandle, CameraKind, CameraState, RenderView, SceneAccelerationStructure, TlasHandle,
    ViewId,
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Texture allocator
// ============================================================================

#[derive(Debug, Default)]
pub struct MockAllocator {
    next_id: u64,
    pub live: BTreeMap<u64, GpuTexture>,
    pub created: usize,
    pub destroyed: usize,
    /// Fail the n-th creation (0-based, counted over the allocator's life).
    pub fail_at: Option<usize>,
}

impl MockAllocator {
    pub fn new() -> Self {
        Self {
            next_id: 1000,
            ..Self::default()
        }
    }

    /// A display target, not owned by any pool.
    pub fn output(&mut self, width: u32, height: u32) -> GpuTexture {
        self.next_id += 1;
        GpuTexture {
            id: self.next_id,
            native: NativeHandle(self.next_id),
            width,
            height,
            format: PixelFormat::Bgra8UnormSrgb,
        }
    }
}

impl TextureAllocator for MockAllocator {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<GpuTexture> {
        if self.fail_at == Some(self.created) {
            self.created += 1;
            return Err(PipelineError::AllocationFailed(format!("{} refused", desc.label)));
        }
        self.created += 1;
        self.next_id += 1;
        let texture = GpuTexture {
            id: self.next_id,
            native: NativeHandle(self.next_id),
            width: desc.width,
            height: desc.height,
            format: desc.format,
        };
        self.live.insert(texture.id, texture);
        Ok(texture)
    }

    fn destroy_texture(&mut self, texture: &GpuTexture) {
        if self.live.remove(&texture.id).is_some() {
            self.destroyed += 1;
        }
    }
}

// ============================================================================
// Denoiser library
// ============================================================================

unsafe extern "C" fn mock_render_event(_event_id: i32, _data: *mut c_void) {}

pub fn mock_entry_point() -> ExecutionEntryPoint {
    ExecutionEntryPoint::new(mock_render_event)
}

/// Everything the mock library observed. Shared with the test through `Rc`.
#[derive(Debug, Default)]
pub struct DenoiserLog {
    next_instance: i32,
    next_view: u64,
    pub create_calls: usize,
    pub live_instances: BTreeSet<i32>,
    pub destroyed_instances: Vec<i32>,
    /// Wrapped views still live when each instance was destroyed.
    pub views_at_destroy: Vec<usize>,
    pub updates: Vec<(InstanceId, Vec<ResourceBinding>)>,
    pub live_views: BTreeSet<u64>,
    /// Make `create_instance` return an invalid id.
    pub fail_instances: bool,
    /// Make every wrap return a null view.
    pub fail_wrap: bool,
    pub missing_entry_point: bool,
}

impl DenoiserLog {
    pub fn last_update(&self) -> Option<&(InstanceId, Vec<ResourceBinding>)> {
        self.updates.last()
    }
}

#[derive(Debug, Default, Clone)]
pub struct MockDenoiser {
    pub log: Rc<RefCell<DenoiserLog>>,
}

impl MockDenoiser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DenoiserLibrary for MockDenoiser {
    fn create_instance(&mut self) -> InstanceId {
        let mut log = self.log.borrow_mut();
        log.create_calls += 1;
        if log.fail_instances {
            return InstanceId(0);
        }
        log.next_instance += 1;
        let id = log.next_instance;
        log.live_instances.insert(id);
        InstanceId(id)
    }

    fn destroy_instance(&mut self, instance: InstanceId) {
        let mut log = self.log.borrow_mut();
        log.live_instances.remove(&instance.0);
        log.destroyed_instances.push(instance.0);
        let live_views = log.live_views.len();
        log.views_at_destroy.push(live_views);
    }

    fn update_resources(&mut self, instance: InstanceId, bindings: &[ResourceBinding]) {
        self.log
            .borrow_mut()
            .updates
            .push((instance, bindings.to_vec()));
    }

    fn execution_entry_point(&self) -> Option<ExecutionEntryPoint> {
        if self.log.borrow().missing_entry_point {
            return None;
        }
        Some(mock_entry_point())
    }

    fn wrap_native_texture(&mut self, _texture: NativeHandle, _format_tag: u32) -> LibraryView {
        let mut log = self.log.borrow_mut();
        if log.fail_wrap {
            return LibraryView::NULL;
        }
        log.next_view += 1;
        let view = 0x1_0000 + log.next_view;
        log.live_views.insert(view);
        LibraryView(view)
    }

    fn release_wrapped_texture(&mut self, view: LibraryView) {
        self.log.borrow_mut().live_views.remove(&view.0);
    }
}

// ============================================================================
// Reconstruction library
// ============================================================================

#[derive(Debug, Default)]
pub struct ReconstructionLog {
    next_instance: i32,
    pub create_calls: usize,
    pub live_instances: BTreeSet<i32>,
    pub destroyed_instances: Vec<i32>,
    /// Make `create_instance` return an invalid id.
    pub fail_instances: bool,
}

#[derive(Debug, Default, Clone)]
pub struct MockReconstruction {
    pub log: Rc<RefCell<ReconstructionLog>>,
}

impl MockReconstruction {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReconstructionLibrary for MockReconstruction {
    fn create_instance(&mut self) -> InstanceId {
        let mut log = self.log.borrow_mut();
        log.create_calls += 1;
        if log.fail_instances {
            return InstanceId(-1);
        }
        log.next_instance += 1;
        let id = 500 + log.next_instance;
        log.live_instances.insert(id);
        InstanceId(id)
    }

    fn destroy_instance(&mut self, instance: InstanceId) {
        let mut log = self.log.borrow_mut();
        log.live_instances.remove(&instance.0);
        log.destroyed_instances.push(instance.0);
    }
}

// ============================================================================
// Scene
// ============================================================================

#[derive(Debug, Clone)]
pub struct MockScene {
    pub instance_count: u32,
    /// Swap the TLAS indices of the first two instances.
    pub misaligned: bool,
}

impl MockScene {
    pub fn with_instances(instance_count: u32) -> Self {
        Self {
            instance_count,
            misaligned: false,
        }
    }
}

impl SceneAccelerationStructure for MockScene {
    fn tlas(&self) -> TlasHandle {
        TlasHandle(77)
    }

    fn instance_buffer(&self) -> BufferHandle {
        BufferHandle(78)
    }

    fn primitive_buffer(&self) -> BufferHandle {
        BufferHandle(79)
    }

    fn instance_count(&self) -> u32 {
        self.instance_count
    }

    fn tlas_instance_index(&self, instance: u32) -> Option<u32> {
        if self.misaligned && instance < 2 {
            Some(1 - instance)
        } else {
            Some(instance)
        }
    }
}

// ============================================================================
// Stage kernels
// ============================================================================

/// One recorded kernel invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct StageCall {
    pub stage: PipelineStage,
    pub sequence: u64,
    pub frame_index: u32,
    pub history: HistoryPair,
    /// Ids of the textures the kernel bound.
    pub bound: Vec<u64>,
}

pub type StageLog = Rc<RefCell<Vec<StageCall>>>;

/// Binds the channels a real kernel would and logs the call.
pub struct RecordingStage {
    name: &'static str,
    channels: &'static [ResourceChannel],
    log: StageLog,
    pub fail: bool,
}

impl FrameStage for RecordingStage {
    fn name(&self) -> &str {
        self.name
    }

    fn execute(&self, ctx: &StageContext<'_>, _commands: &mut dyn CommandStream) -> Result<()> {
        if self.fail {
            return Err(PipelineError::StageFailed {
                stage: ctx.stage.name(),
                reason: "kernel refused".into(),
            });
        }

        let mut bound = Vec::new();
        for &channel in self.channels {
            bound.push(ctx.texture(channel)?.id);
        }
        if ctx.stage == PipelineStage::TemporalFilter {
            let src = ctx.history_source()?;
            let dst = ctx.history_destination()?;
            assert_ne!(src.id, dst.id, "TAA must not read and write one buffer");
            bound.push(src.id);
            bound.push(dst.id);
        }

        self.log.borrow_mut().push(StageCall {
            stage: ctx.stage,
            sequence: ctx.sequence,
            frame_index: ctx.frame_index,
            history: ctx.history,
            bound,
        });
        Ok(())
    }
}

pub fn stage_set(log: &StageLog) -> StageSet {
    use ResourceChannel as C;
    let stage = |name, channels| {
        Box::new(RecordingStage {
            name,
            channels,
            log: Rc::clone(log),
            fail: false,
        })
    };
    StageSet {
        primary_trace: stage(
            "trace_primary",
            &[C::MotionVector, C::ViewZ, C::NormalRoughness, C::DiffuseRadianceIn, C::Penumbra],
        ),
        composition: stage("compose", &[C::DiffuseRadianceOut, C::ComposedDiffuse]),
        secondary_trace: stage("trace_secondary", &[C::Composed]),
        temporal_filter: stage("taa", &[C::Composed]),
    }
}

pub fn failing_stage_set(log: &StageLog, failing: PipelineStage) -> StageSet {
    let mut set = stage_set(log);
    let replacement = Box::new(RecordingStage {
        name: "broken",
        channels: &[],
        log: Rc::clone(log),
        fail: true,
    });
    match failing {
        PipelineStage::PrimaryTrace => set.primary_trace = replacement,
        PipelineStage::Composition => set.composition = replacement,
        PipelineStage::SecondaryTrace => set.secondary_trace = replacement,
        PipelineStage::TemporalFilter => set.temporal_filter = replacement,
        _ => {}
    }
    set
}

// ============================================================================
// Views
// ============================================================================

pub fn camera(width: u32, height: u32) -> CameraState {
    CameraState::perspective(
        Vec3::new(0.0, 2.0, 8.0),
        Vec3::ZERO,
        60f32.to_radians(),
        width,
        height,
    )
}

pub fn render_view(id: ViewId, camera: CameraState, output: GpuTexture, frame_count: u32) -> RenderView<'static> {
    RenderView {
        id,
        label: "Main Camera",
        camera,
        sun_direction: Vec3::new(0.3, 1.0, 0.2),
        output,
        frame_count,
    }
}

/// Camera that moves a little every frame so matrices differ.
pub fn moving_camera(frame: u32, width: u32, height: u32) -> CameraState {
    let eye = Vec3::new(frame as f32 * 0.25, 2.0, 8.0);
    CameraState::perspective(eye, Vec3::ZERO, 60f32.to_radians(), width, height)
}

pub fn preview_camera(width: u32, height: u32) -> CameraState {
    camera(width, height).with_kind(CameraKind::Preview)
}
