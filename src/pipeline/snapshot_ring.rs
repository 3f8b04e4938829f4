//! Frame Snapshot Ring
//!
//! The denoiser runs on the GPU timeline, frames after the CPU recorded its
//! inputs. Each recorded frame therefore gets its own descriptor slot, and a
//! slot is only rewritten once the ring has wrapped around.
//!
//! # Design
//!
//! ```text
//!   sequence:   0    1    2    3    4    5  ...
//!   slot:      [0]  [1]  [2]  [0]  [1]  [2]
//!                              ▲
//!                              └─ rewritten only after `depth` records
//! ```
//!
//! - Storage is one boxed slice allocated in [`DescriptorRing::new`]; it
//!   never moves, so raw pointers handed to the native library stay valid
//!   for the ring's lifetime.
//! - [`SlotView`] remembers the write sequence it was created for.
//!   [`DescriptorRing::get`] refuses views whose slot has since been
//!   rewritten.
//! - Previous-frame inputs arrive as an explicit [`PreviousFrameContext`];
//!   the ring holds no camera history of its own.
//!
//! The ring is generic over the descriptor type. [`FrameSnapshotRing`] holds
//! denoiser descriptors; the reconstruction pass keeps a second ring of its
//! own descriptors. Native events see either one as an [`EventPayload`].

use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;

use glam::{Mat4, Vec2, Vec3};

use crate::denoiser::InstanceId;
use crate::denoiser::frame_data::{AccumulationMode, CommonParams, FrameDescriptor, ShadowDenoiseParams};
use crate::errors::{PipelineError, Result};
use crate::pipeline::resource_pool::SharedResources;
use crate::scene::camera::CameraState;
use crate::settings::PathTracingSettings;

/// Default number of descriptor slots.
pub const DEFAULT_RING_DEPTH: usize = 3;

// ─── Public Types ─────────────────────────────────────────────────────────────

/// Camera state of the frame before the one being recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviousFrameContext {
    pub world_to_view: Mat4,
    pub view_to_clip: Mat4,
    pub jitter: Vec2,
    pub resource_size: (u32, u32),
}

impl PreviousFrameContext {
    /// Context for a frame with no predecessor: the current state.
    #[must_use]
    pub fn from_camera(camera: &CameraState, resource_size: (u32, u32)) -> Self {
        Self {
            world_to_view: camera.world_to_view,
            view_to_clip: camera.view_to_clip,
            jitter: camera.jitter,
            resource_size,
        }
    }

    #[must_use]
    pub fn world_to_clip(&self) -> Mat4 {
        self.view_to_clip * self.world_to_view
    }
}

/// Inputs of one [`FrameSnapshotRing::record`] call.
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs<'a> {
    pub instance: InstanceId,
    /// Denoiser frame index; restarts at 0 after a reallocation.
    pub frame_index: u32,
    pub accumulation: AccumulationMode,
    pub camera: &'a CameraState,
    /// Direction towards the sun, world space.
    pub sun_direction: Vec3,
    pub settings: &'a PathTracingSettings,
    pub resources: &'a SharedResources,
}

/// Stable, generation-checked reference to a recorded descriptor.
pub struct SlotView<D> {
    ptr: NonNull<D>,
    slot: usize,
    sequence: u64,
}

/// View of a denoiser descriptor slot.
pub type FrameSlotView = SlotView<FrameDescriptor>;

impl<D> SlotView<D> {
    #[inline]
    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }

    #[inline]
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Raw pointer handed to the native library.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *const D {
        self.ptr.as_ptr()
    }
}

// No bounds on `D`; derives would add them.
impl<D> Clone for SlotView<D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D> Copy for SlotView<D> {}

impl<D> PartialEq for SlotView<D> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr && self.slot == other.slot && self.sequence == other.sequence
    }
}

impl<D> Eq for SlotView<D> {}

impl<D> fmt::Debug for SlotView<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotView")
            .field("ptr", &self.ptr)
            .field("slot", &self.slot)
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// A [`SlotView`] with its descriptor type erased, as carried by native events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventPayload {
    ptr: NonNull<c_void>,
    slot: usize,
    sequence: u64,
}

impl EventPayload {
    #[inline]
    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }

    #[inline]
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *mut c_void {
        self.ptr.as_ptr()
    }
}

impl<D> From<SlotView<D>> for EventPayload {
    fn from(view: SlotView<D>) -> Self {
        Self {
            ptr: view.ptr.cast(),
            slot: view.slot,
            sequence: view.sequence,
        }
    }
}

impl<D> PartialEq<SlotView<D>> for EventPayload {
    fn eq(&self, other: &SlotView<D>) -> bool {
        *self == Self::from(*other)
    }
}

// ─── Descriptor Construction ─────────────────────────────────────────────────

pub(crate) fn size_u16((w, h): (u32, u32)) -> [u16; 2] {
    [
        u16::try_from(w).unwrap_or(u16::MAX),
        u16::try_from(h).unwrap_or(u16::MAX),
    ]
}

/// Builds the descriptor for one frame. Pure; performs no allocation.
#[must_use]
pub fn build_descriptor(inputs: &FrameInputs<'_>, previous: &PreviousFrameContext) -> FrameDescriptor {
    let FrameInputs {
        instance,
        frame_index,
        accumulation,
        camera,
        sun_direction,
        settings,
        resources,
    } = *inputs;

    let size = (resources.width, resources.height);
    let [width, height] = size_u16(size);

    let mut common = CommonParams {
        view_to_clip: camera.view_to_clip.to_cols_array(),
        view_to_clip_prev: previous.view_to_clip.to_cols_array(),
        world_to_view: camera.world_to_view.to_cols_array(),
        world_to_view_prev: previous.world_to_view.to_cols_array(),
        motion_vector_scale: [
            1.0 / resources.width as f32,
            1.0 / resources.height as f32,
            if settings.motion_vectors_2d { 0.0 } else { 1.0 },
        ],
        camera_jitter: camera.jitter.to_array(),
        camera_jitter_prev: previous.jitter.to_array(),
        resource_size: [width, height],
        resource_size_prev: size_u16(previous.resource_size),
        rect_size: [width, height],
        rect_size_prev: size_u16(previous.resource_size),
        denoising_range: settings.denoising_range,
        disocclusion_threshold: settings.disocclusion_threshold,
        disocclusion_threshold_alternate: settings.disocclusion_threshold_alternate,
        split_screen: settings.split_screen,
        frame_index,
        accumulation_mode: accumulation as u32,
        flags: settings.capability_flags().bits(),
    };

    let overrides = &settings.common_override;
    if overrides.enabled {
        common.view_to_clip = overrides.view_to_clip.to_cols_array();
        common.view_to_clip_prev = overrides.view_to_clip_prev.to_cols_array();
        common.world_to_view = overrides.world_to_view.to_cols_array();
        common.world_to_view_prev = overrides.world_to_view_prev.to_cols_array();
        common.motion_vector_scale = overrides.motion_vector_scale.to_array();
    }

    let light_direction = settings
        .light_direction_override
        .unwrap_or(sun_direction)
        .normalize_or_zero();

    FrameDescriptor {
        resources: resources.handles.map(|h| h.0),
        common,
        shadow: ShadowDenoiseParams {
            light_direction: light_direction.to_array(),
            plane_distance_sensitivity: settings.shadow.plane_distance_sensitivity,
            max_stabilized_frame_num: settings.shadow.max_stabilized_frame_num,
        },
        radiance: settings.radiance.to_params(),
        width,
        height,
        instance_id: instance.0,
        _pad: 0,
    }
}

// ─── DescriptorRing ───────────────────────────────────────────────────────────

/// Fixed-depth ring of descriptors.
#[derive(Debug)]
pub struct DescriptorRing<D> {
    slots: Box<[D]>,
    /// Write sequence currently held by each slot.
    written: Box<[Option<u64>]>,
    next_sequence: u64,
}

/// Ring of denoiser frame descriptors.
pub type FrameSnapshotRing = DescriptorRing<FrameDescriptor>;

impl<D: Default + Clone> DescriptorRing<D> {
    pub fn new(depth: usize) -> Result<Self> {
        if depth == 0 {
            return Err(PipelineError::ZeroRingDepth);
        }
        Ok(Self {
            slots: vec![D::default(); depth].into_boxed_slice(),
            written: vec![None; depth].into_boxed_slice(),
            next_sequence: 0,
        })
    }
}

impl<D> DescriptorRing<D> {
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Sequence number the next write will use.
    #[inline]
    #[must_use]
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    #[inline]
    #[must_use]
    pub fn slot_for(&self, sequence: u64) -> usize {
        (sequence % self.slots.len() as u64) as usize
    }

    /// Writes `descriptor` into the next slot.
    pub fn push(&mut self, descriptor: D) -> SlotView<D> {
        let sequence = self.next_sequence;
        let slot = self.slot_for(sequence);

        let target = &mut self.slots[slot];
        *target = descriptor;
        let ptr = NonNull::from(&mut *target);
        self.written[slot] = Some(sequence);
        self.next_sequence += 1;

        SlotView { ptr, slot, sequence }
    }

    /// The descriptor behind `view`, if it has not been overwritten.
    #[must_use]
    pub fn get(&self, view: SlotView<D>) -> Option<&D> {
        let descriptor = self.slots.get(view.slot)?;
        let same_storage = std::ptr::eq(descriptor, view.as_ptr());
        (same_storage && self.written[view.slot] == Some(view.sequence)).then_some(descriptor)
    }

    /// Like [`Self::get`], as an error.
    pub fn resolve(&self, view: SlotView<D>) -> Result<&D> {
        self.get(view).ok_or(PipelineError::StaleSnapshot {
            slot: view.slot,
            sequence: view.sequence,
        })
    }
}

impl DescriptorRing<FrameDescriptor> {
    /// Writes this frame's descriptor into the next slot.
    ///
    /// Returns a view of the slot and the context to pass as `previous` to
    /// the next call.
    pub fn record(
        &mut self,
        inputs: &FrameInputs<'_>,
        previous: &PreviousFrameContext,
    ) -> (FrameSlotView, PreviousFrameContext) {
        let view = self.push(build_descriptor(inputs, previous));

        let next = PreviousFrameContext {
            world_to_view: inputs.camera.world_to_view,
            view_to_clip: inputs.camera.view_to_clip,
            jitter: inputs.camera.jitter,
            resource_size: (inputs.resources.width, inputs.resources.height),
        };

        (view, next)
    }
}
