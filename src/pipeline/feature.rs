//! Path Tracing Feature
//!
//! The host-facing entry point. The host calls
//! [`PathTracingFeature::on_view_render`] once per rendered view per frame;
//! the feature keeps one [`ViewState`] per view and drives its sequencer.
//!
//! # Lifecycle
//!
//! ```text
//!   on_view_render(view)            first sight of a view id
//!     └─ create_instance ─────────▶ ViewState { instance, reconstruction, pool, sequencer }
//!
//!   remove_view(id) / dispose()     removal of a map entry
//!     └─ destroy_instance(s) + pool.release on the same path
//! ```
//!
//! With a [`ReconstructionLibrary`] attached, every view also owns a
//! reconstruction instance, created and destroyed next to its denoiser
//! instance.
//!
//! A view whose instance creation failed is remembered as failed and keeps
//! returning the error until the host calls [`PathTracingFeature::remove_view`].

use rustc_hash::{FxHashMap, FxHashSet};

use crate::denoiser::reconstruction::ReconstructionLibrary;
use crate::denoiser::{DenoiserLibrary, ExecutionEntryPoint, InstanceId};
use crate::errors::{PipelineError, Result};
use crate::gpu::command::CommandStream;
use crate::gpu::texture::TextureAllocator;
use crate::pipeline::resource_pool::ResourcePool;
use crate::pipeline::sequencer::{FrameOutcome, FrameServices, SkipReason, StageSequencer};
use crate::pipeline::stage::StageSet;
use crate::scene::accel::SceneAccelerationStructure;
use crate::scene::camera::{RenderView, ViewId};
use crate::settings::{PathTracingSettings, PipelineConfig};

/// Everything owned on behalf of one view.
#[derive(Debug)]
struct ViewState {
    label: String,
    instance: InstanceId,
    reconstruction: Option<InstanceId>,
    pool: ResourcePool,
    sequencer: StageSequencer,
}

/// Per-view path tracing with an external denoiser.
pub struct PathTracingFeature {
    config: PipelineConfig,
    settings: PathTracingSettings,
    denoiser: Box<dyn DenoiserLibrary>,
    reconstruction: Option<Box<dyn ReconstructionLibrary>>,
    /// `None` once disposed.
    entry_point: Option<ExecutionEntryPoint>,
    stages: StageSet,
    views: FxHashMap<ViewId, ViewState>,
    failed_views: FxHashSet<ViewId>,
}

impl PathTracingFeature {
    /// Validates configuration and binds the denoiser's entry point.
    pub fn new(
        config: PipelineConfig,
        settings: PathTracingSettings,
        denoiser: Box<dyn DenoiserLibrary>,
        stages: StageSet,
    ) -> Result<Self> {
        config.validate()?;
        settings.validate()?;
        let entry_point = denoiser
            .execution_entry_point()
            .ok_or(PipelineError::MissingEntryPoint("execution entry point"))?;

        log::info!(
            "Path tracing feature ready (ring depth {}, {} frames in flight)",
            config.ring_depth,
            config.max_frames_in_flight
        );

        Ok(Self {
            config,
            settings,
            denoiser,
            reconstruction: None,
            entry_point: Some(entry_point),
            stages,
            views: FxHashMap::default(),
            failed_views: FxHashSet::default(),
        })
    }

    /// Attaches the ray reconstruction pass. Views created from now on get a
    /// reconstruction instance next to their denoiser instance.
    #[must_use]
    pub fn with_reconstruction(mut self, library: Box<dyn ReconstructionLibrary>) -> Self {
        self.reconstruction = Some(library);
        self
    }

    #[inline]
    #[must_use]
    pub fn has_reconstruction(&self) -> bool {
        self.reconstruction.is_some()
    }

    /// Records one frame of `view`.
    pub fn on_view_render(
        &mut self,
        view: &RenderView<'_>,
        textures: &mut dyn TextureAllocator,
        scene: &dyn SceneAccelerationStructure,
        commands: &mut dyn CommandStream,
    ) -> Result<FrameOutcome> {
        let entry_point = self.entry_point.ok_or(PipelineError::Disposed)?;

        // Untraced cameras never allocate anything.
        if !view.camera.kind.is_traced() {
            log::trace!("Skipping view `{}`: {:?} camera", view.label, view.camera.kind);
            return Ok(FrameOutcome::Skipped(SkipReason::UntracedCamera));
        }

        if self.failed_views.contains(&view.id) {
            return Err(PipelineError::InstanceCreationFailed {
                view: view.id,
                reason: "instance creation failed earlier; remove the view to retry".into(),
            });
        }

        if !self.views.contains_key(&view.id) {
            let state = self.create_view_state(view)?;
            self.views.insert(view.id, state);
        }
        let Some(state) = self.views.get_mut(&view.id) else {
            return Err(PipelineError::Disposed);
        };

        let mut services = FrameServices {
            textures,
            denoiser: self.denoiser.as_mut(),
            entry_point,
            stages: &self.stages,
            scene,
            settings: &self.settings,
            reconstruction: state.reconstruction,
        };

        state
            .sequencer
            .run_frame(view, state.instance, &mut state.pool, &mut services, commands)
    }

    fn create_view_state(&mut self, view: &RenderView<'_>) -> Result<ViewState> {
        let sequencer = StageSequencer::new(self.config.ring_depth)?;

        let instance = self.denoiser.create_instance();
        if !instance.is_valid() {
            log::error!(
                "Denoiser returned invalid instance id {} for view `{}`",
                instance.0,
                view.label
            );
            self.failed_views.insert(view.id);
            return Err(PipelineError::InstanceCreationFailed {
                view: view.id,
                reason: format!("library returned instance id {}", instance.0),
            });
        }

        log::info!("Created denoiser instance {} for view `{}`", instance.0, view.label);

        let reconstruction = match self.reconstruction.as_mut() {
            Some(library) => {
                let rr_instance = library.create_instance();
                if !rr_instance.is_valid() {
                    log::error!(
                        "Reconstruction library returned invalid instance id {} for view `{}`",
                        rr_instance.0,
                        view.label
                    );
                    self.denoiser.destroy_instance(instance);
                    self.failed_views.insert(view.id);
                    return Err(PipelineError::InstanceCreationFailed {
                        view: view.id,
                        reason: format!("reconstruction library returned instance id {}", rr_instance.0),
                    });
                }
                log::info!(
                    "Created reconstruction instance {} for view `{}`",
                    rr_instance.0,
                    view.label
                );
                Some(rr_instance)
            }
            None => {
                if self.settings.reconstruction.enabled {
                    log::warn!(
                        "Reconstruction is enabled but no reconstruction library is attached; view `{}` skips it",
                        view.label
                    );
                }
                None
            }
        };

        Ok(ViewState {
            label: view.label.to_owned(),
            instance,
            reconstruction,
            pool: ResourcePool::new(),
            sequencer,
        })
    }

    /// Tears down one view. Returns `false` if the view was unknown.
    pub fn remove_view(&mut self, id: ViewId, textures: &mut dyn TextureAllocator) -> bool {
        let was_failed = self.failed_views.remove(&id);
        match self.views.remove(&id) {
            Some(state) => {
                self.teardown(textures, state);
                true
            }
            None => was_failed,
        }
    }

    fn teardown(&mut self, textures: &mut dyn TextureAllocator, mut state: ViewState) {
        // Instances go first: the library must stop reading ring slots
        // before the sequencer (and its rings) is dropped.
        self.destroy_instances(&state);
        state.pool.release(textures, self.denoiser.as_mut());
        log::info!(
            "Released view `{}` (instance {})",
            state.label,
            state.instance.0
        );
    }

    fn destroy_instances(&mut self, state: &ViewState) {
        self.denoiser.destroy_instance(state.instance);
        if let (Some(library), Some(rr_instance)) = (self.reconstruction.as_mut(), state.reconstruction) {
            library.destroy_instance(rr_instance);
        }
    }

    /// Releases every view and drops the execution entry point. Idempotent.
    pub fn dispose(&mut self, textures: &mut dyn TextureAllocator) {
        if self.entry_point.is_none() {
            return;
        }
        let count = self.views.len();
        for (_, state) in std::mem::take(&mut self.views) {
            self.teardown(textures, state);
        }
        self.failed_views.clear();
        self.entry_point = None;
        log::info!("Path tracing feature disposed ({count} views released)");
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &PathTracingSettings {
        &self.settings
    }

    /// Replaces the settings; takes effect on the next frame.
    pub fn set_settings(&mut self, settings: PathTracingSettings) -> Result<()> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    #[must_use]
    pub fn contains_view(&self, id: ViewId) -> bool {
        self.views.contains_key(&id)
    }

    #[must_use]
    pub fn view_instance(&self, id: ViewId) -> Option<InstanceId> {
        self.views.get(&id).map(|s| s.instance)
    }

    /// The view's reconstruction instance, if one was created.
    #[must_use]
    pub fn view_reconstruction_instance(&self, id: ViewId) -> Option<InstanceId> {
        self.views.get(&id).and_then(|s| s.reconstruction)
    }

    #[must_use]
    pub fn view_pool(&self, id: ViewId) -> Option<&ResourcePool> {
        self.views.get(&id).map(|s| &s.pool)
    }

    #[must_use]
    pub fn view_sequencer(&self, id: ViewId) -> Option<&StageSequencer> {
        self.views.get(&id).map(|s| &s.sequencer)
    }

    /// Resizes a view's resources outside of a frame.
    ///
    /// The next frame of the view treats this as a history reset.
    pub fn resize_view(
        &mut self,
        id: ViewId,
        textures: &mut dyn TextureAllocator,
        width: u32,
        height: u32,
    ) -> Result<bool> {
        let Some(state) = self.views.get_mut(&id) else {
            return Ok(false);
        };
        let outcome = state
            .pool
            .ensure(textures, self.denoiser.as_mut(), state.instance, width, height)?;
        Ok(outcome.is_reallocated())
    }

    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.entry_point.is_none()
    }
}

impl Drop for PathTracingFeature {
    fn drop(&mut self) {
        if !self.views.is_empty() {
            log::warn!(
                "PathTracingFeature dropped with {} live views; destroying denoiser instances",
                self.views.len()
            );
            // Textures belong to the host's allocator and are left to it.
            for (_, mut state) in std::mem::take(&mut self.views) {
                self.destroy_instances(&state);
                state.pool.release_wrappers(self.denoiser.as_mut());
            }
        }
    }
}
