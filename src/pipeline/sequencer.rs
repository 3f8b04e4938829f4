//! Stage Sequencer
//!
//! Runs the fixed stage order of one traced frame for one view.
//!
//! # Design
//!
//! ```text
//!  run_frame(view)
//!    │
//!    ├─ Setup           pool.ensure → ring.record → bind scene
//!    ├─ PrimaryTrace    host kernel
//!    ├─ Denoise         native event(slot view)   (GPU timeline, async)
//!    ├─ Composition     host kernel
//!    ├─ SecondaryTrace  host kernel
//!    ├─ TemporalFilter  host kernel, parity-selected history
//!    ├─ Reconstruct     native event(reconstruction slot), when enabled
//!    └─ Display         blit selected channel + overlays
//! ```
//!
//! The sequencer owns the view's [`FrameSnapshotRing`] and
//! [`ReconstructionRing`], the denoiser's accumulation counter and the
//! camera context of the last recorded frame. It borrows the view's
//! [`ResourcePool`] per call.
//!
//! A frame counts as recorded once its descriptor is in the ring. A kernel
//! failure after that point still advances the frame index and the previous
//! context, since the library has already been handed the descriptor.
//!
//! # History resets
//!
//! Any reallocation of the pool, whether triggered here or by a caller
//! resizing the pool between frames, restarts the denoiser frame index at 0
//! and marks TAA history invalid for that frame.

use smallvec::SmallVec;

use crate::denoiser::frame_data::AccumulationMode;
use crate::denoiser::reconstruction::{RECONSTRUCT_EVENT_ID, RECONSTRUCTION_CHANNELS};
use crate::denoiser::{DENOISE_EVENT_ID, DenoiserLibrary, ExecutionEntryPoint, InstanceId};
use crate::errors::{PipelineError, Result};
use crate::gpu::command::CommandStream;
use crate::gpu::texture::TextureAllocator;
use crate::pipeline::channel::ResourceChannel;
use crate::pipeline::constants::TraceConstants;
use crate::pipeline::display;
use crate::pipeline::reconstruction::{
    ReconstructionInputs, ReconstructionRing, ReconstructionSlotView, build_reconstruction_descriptor,
};
use crate::pipeline::resource_pool::ResourcePool;
use crate::pipeline::snapshot_ring::{FrameInputs, FrameSlotView, FrameSnapshotRing, PreviousFrameContext};
use crate::pipeline::stage::{PipelineStage, StageContext, StageSet};
use crate::pipeline::temporal::HistoryPair;
use crate::scene::accel::{SceneAccelerationStructure, SceneBindings, validate_instance_alignment};
use crate::scene::camera::{CameraState, RenderView, ViewId};
use crate::settings::PathTracingSettings;

// ─── Public Types ─────────────────────────────────────────────────────────────

/// Shared collaborators lent to the sequencer for one frame.
pub struct FrameServices<'a> {
    pub textures: &'a mut dyn TextureAllocator,
    pub denoiser: &'a mut dyn DenoiserLibrary,
    pub entry_point: ExecutionEntryPoint,
    pub stages: &'a StageSet,
    pub scene: &'a dyn SceneAccelerationStructure,
    pub settings: &'a PathTracingSettings,
    /// The view's reconstruction instance, if a reconstruction library is
    /// attached.
    pub reconstruction: Option<InstanceId>,
}

/// Why a frame recorded nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Preview or reflection camera.
    UntracedCamera,
    /// Packed scene data was requested but the scene has no instances.
    EmptyScene,
}

/// What one traced frame did.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub view: ViewId,
    pub frame_index: u32,
    pub accumulation: AccumulationMode,
    pub slot: FrameSlotView,
    /// The pool was (re)allocated for this frame.
    pub reallocated: bool,
    pub history: HistoryPair,
    /// Reconstruction descriptor of this frame, if the pass ran.
    pub reconstruction: Option<ReconstructionSlotView>,
    /// Stages that completed, in order.
    pub stages: SmallVec<[PipelineStage; 8]>,
    /// Channel blitted to the view target, if any.
    pub displayed: Option<ResourceChannel>,
    pub constants: TraceConstants,
}

#[derive(Debug, Clone)]
pub enum FrameOutcome {
    Skipped(SkipReason),
    Rendered(Box<FrameReport>),
}

impl FrameOutcome {
    #[must_use]
    pub fn report(&self) -> Option<&FrameReport> {
        match self {
            Self::Rendered(report) => Some(report),
            Self::Skipped(_) => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

/// Result of the Setup stage.
struct FrameSetup {
    frame_index: u32,
    accumulation: AccumulationMode,
    reallocated: bool,
    slot: FrameSlotView,
    constants: TraceConstants,
    scene: SceneBindings,
    history: HistoryPair,
}

// ─── StageSequencer ───────────────────────────────────────────────────────────

/// Per-view frame orchestration.
#[derive(Debug)]
pub struct StageSequencer {
    ring: FrameSnapshotRing,
    reconstruction_ring: ReconstructionRing,
    /// Denoiser frame index of the next frame.
    frame_index: u32,
    /// Pool generation seen by the last frame.
    pool_generation: u64,
    /// Camera context of the last recorded frame.
    previous: Option<PreviousFrameContext>,
}

impl StageSequencer {
    pub fn new(ring_depth: usize) -> Result<Self> {
        Ok(Self {
            ring: FrameSnapshotRing::new(ring_depth)?,
            reconstruction_ring: ReconstructionRing::new(ring_depth)?,
            frame_index: 0,
            pool_generation: 0,
            previous: None,
        })
    }

    #[inline]
    #[must_use]
    pub fn ring(&self) -> &FrameSnapshotRing {
        &self.ring
    }

    #[inline]
    #[must_use]
    pub fn reconstruction_ring(&self) -> &ReconstructionRing {
        &self.reconstruction_ring
    }

    /// Denoiser frame index the next frame will record.
    #[inline]
    #[must_use]
    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    /// Camera context the next frame will record as "previous".
    ///
    /// `None` until the first descriptor is recorded.
    #[inline]
    #[must_use]
    pub fn previous_context(&self) -> Option<&PreviousFrameContext> {
        self.previous.as_ref()
    }

    /// Records one frame of `view`.
    pub fn run_frame(
        &mut self,
        view: &RenderView<'_>,
        instance: InstanceId,
        pool: &mut ResourcePool,
        services: &mut FrameServices<'_>,
        commands: &mut dyn CommandStream,
    ) -> Result<FrameOutcome> {
        let settings = services.settings;

        if !view.camera.kind.is_traced() {
            log::trace!("Skipping view `{}`: {:?} camera", view.label, view.camera.kind);
            return Ok(FrameOutcome::Skipped(SkipReason::UntracedCamera));
        }
        if settings.use_packed_data && services.scene.instance_count() == 0 {
            log::trace!("Skipping view `{}`: packed scene data is empty", view.label);
            return Ok(FrameOutcome::Skipped(SkipReason::EmptyScene));
        }

        // ── Setup ──
        commands.push_debug_group(PipelineStage::Setup.name());
        let setup = self.setup(view, instance, pool, services);
        commands.pop_debug_group();
        let setup = setup?;

        let mut stages: SmallVec<[PipelineStage; 8]> = SmallVec::new();
        stages.push(PipelineStage::Setup);

        let descriptor = self.ring.resolve(setup.slot)?;
        let ctx = StageContext {
            stage: PipelineStage::Setup,
            view: view.id,
            frame_index: setup.frame_index,
            sequence: setup.slot.sequence(),
            camera: &view.camera,
            settings,
            constants: &setup.constants,
            scene: &setup.scene,
            descriptor,
            history: setup.history,
            pool: &*pool,
        };

        // ── PrimaryTrace ──
        Self::run_external(PipelineStage::PrimaryTrace, &ctx, services.stages, commands, &mut stages)?;

        // ── Denoise ──
        commands.push_debug_group(PipelineStage::Denoise.name());
        commands.issue_native_event(services.entry_point, DENOISE_EVENT_ID, setup.slot.into());
        commands.pop_debug_group();
        stages.push(PipelineStage::Denoise);

        // ── Composition → SecondaryTrace → TemporalFilter ──
        let kernels = [
            PipelineStage::Composition,
            PipelineStage::SecondaryTrace,
            PipelineStage::TemporalFilter,
        ];
        let mut result = Ok(());
        for stage in kernels {
            result = Self::run_external(stage, &ctx, services.stages, commands, &mut stages);
            if result.is_err() {
                break;
            }
        }

        // ── Reconstruct ──
        let mut reconstruction = None;
        let reconstruction_instance = services
            .reconstruction
            .filter(|_| result.is_ok() && settings.reconstruction.enabled);
        if let Some(rr_instance) = reconstruction_instance {
            commands.push_debug_group(PipelineStage::Reconstruct.name());
            let recorded = Self::reconstruct(
                &mut self.reconstruction_ring,
                &view.camera,
                rr_instance,
                ctx.pool,
                services,
                commands,
            );
            commands.pop_debug_group();
            match recorded {
                Ok(slot) => {
                    reconstruction = Some(slot);
                    stages.push(PipelineStage::Reconstruct);
                }
                Err(err) => result = Err(err),
            }
        }

        // ── Display ──
        let displayed = match result {
            Ok(()) => {
                commands.push_debug_group(PipelineStage::Display.name());
                let displayed = Self::display(&ctx, view, commands);
                commands.pop_debug_group();
                displayed
            }
            Err(err) => Err(err),
        };

        // The denoise event has consumed this frame's bindings either way.
        pool.advance_frame(services.denoiser, instance);

        let displayed = displayed?;
        stages.push(PipelineStage::Display);

        Ok(FrameOutcome::Rendered(Box::new(FrameReport {
            view: view.id,
            frame_index: setup.frame_index,
            accumulation: setup.accumulation,
            slot: setup.slot,
            reconstruction,
            reallocated: setup.reallocated,
            history: setup.history,
            stages,
            displayed,
            constants: setup.constants,
        })))
    }

    fn setup(
        &mut self,
        view: &RenderView<'_>,
        instance: InstanceId,
        pool: &mut ResourcePool,
        services: &mut FrameServices<'_>,
    ) -> Result<FrameSetup> {
        let settings = services.settings;
        let (width, height) = view.camera.pixel_size();

        let outcome = pool.ensure(services.textures, services.denoiser, instance, width, height)?;
        let reallocated = outcome.is_reallocated() || pool.generation() != self.pool_generation;
        self.pool_generation = pool.generation();
        if reallocated && self.frame_index != 0 {
            log::debug!(
                "View `{}` resources reallocated at frame {}; restarting denoiser history",
                view.label,
                self.frame_index
            );
            self.frame_index = 0;
        }

        let frame_index = self.frame_index;
        let accumulation = if settings.force_history_reset {
            AccumulationMode::ClearAndRestart
        } else if frame_index == 0 {
            AccumulationMode::Restart
        } else {
            AccumulationMode::Continue
        };

        // Hosts may rebuild the TLAS in a new order at any instance count.
        let scene = SceneBindings::capture(services.scene);
        validate_instance_alignment(services.scene)?;

        let resources = pool.shared_resources()?;
        let previous = self
            .previous
            .unwrap_or_else(|| PreviousFrameContext::from_camera(&view.camera, (width, height)));

        let inputs = FrameInputs {
            instance,
            frame_index,
            accumulation,
            camera: &view.camera,
            sun_direction: view.sun_direction,
            settings,
            resources: &resources,
        };
        let (slot, next_context) = self.ring.record(&inputs, &previous);
        self.previous = Some(next_context);
        self.frame_index = self.frame_index.wrapping_add(1);

        let constants = TraceConstants::new(
            &view.camera,
            &previous,
            view.sun_direction,
            settings,
            frame_index,
            view.frame_count,
        );
        let history = HistoryPair::for_frame(slot.sequence(), !accumulation.resets_history());
        debug_assert_ne!(history.source, history.destination);

        Ok(FrameSetup {
            frame_index,
            accumulation,
            reallocated,
            slot,
            constants,
            scene,
            history,
        })
    }

    fn run_external(
        stage: PipelineStage,
        ctx: &StageContext<'_>,
        stages: &StageSet,
        commands: &mut dyn CommandStream,
        completed: &mut SmallVec<[PipelineStage; 8]>,
    ) -> Result<()> {
        let Some(kernel) = stages.stage(stage) else {
            return Ok(());
        };

        commands.push_debug_group(stage.name());
        let result = kernel.execute(&ctx.for_stage(stage), commands);
        commands.pop_debug_group();

        if let Err(err) = &result {
            log::error!("Stage {} (`{}`) failed: {err}", stage.name(), kernel.name());
        }
        result?;
        completed.push(stage);
        Ok(())
    }

    fn reconstruct(
        ring: &mut ReconstructionRing,
        camera: &CameraState,
        instance: InstanceId,
        pool: &ResourcePool,
        services: &FrameServices<'_>,
        commands: &mut dyn CommandStream,
    ) -> Result<ReconstructionSlotView> {
        let output_size = pool
            .size()
            .ok_or(PipelineError::ResourceNotReady(ResourceChannel::ReconstructionOutput))?;
        let inputs = ReconstructionInputs {
            instance,
            camera,
            output_size,
            textures: pool.native_handles(RECONSTRUCTION_CHANNELS)?,
            settings: &services.settings.reconstruction,
        };
        let slot = ring.push(build_reconstruction_descriptor(&inputs));
        commands.issue_native_event(services.entry_point, RECONSTRUCT_EVENT_ID, slot.into());
        Ok(slot)
    }

    fn display(
        ctx: &StageContext<'_>,
        view: &RenderView<'_>,
        commands: &mut dyn CommandStream,
    ) -> Result<Option<ResourceChannel>> {
        let selection = display::select(ctx.settings.display_mode, ctx.history);
        if let Some(sel) = selection {
            let source = ctx.texture(sel.channel)?;
            commands.blit(source, &view.output, sel.decode);
        }
        for overlay in display::overlays(ctx.settings) {
            let source = ctx.texture(overlay.channel)?;
            commands.blit(source, &view.output, overlay.decode);
        }
        Ok(selection.map(|sel| sel.channel))
    }
}
