//! Denoiser Library Boundary
//!
//! The spatio-temporal denoiser lives in a native library that owns its own
//! GPU state. The pipeline talks to it through a narrow surface:
//!
//! ```text
//! ┌──────────────┐  create / destroy instance   ┌──────────────────────┐
//! │ PathTracing  │ ───────────────────────────▶ │                      │
//! │ Feature      │                              │                      │
//! ├──────────────┤  wrap / release textures     │   DenoiserLibrary    │
//! │ ResourcePool │ ───────────────────────────▶ │                      │
//! │              │  update_resources(bindings)  │   (native, opaque)   │
//! ├──────────────┤                              │                      │
//! │ Sequencer    │  native event + slot view ─▶ │  execution entry pt  │
//! └──────────────┘                              └──────────────────────┘
//! ```
//!
//! [`DenoiserLibrary`] is the trait seam; [`native::NativeDenoiserLibrary`]
//! binds it to C entry points and tests substitute an in-memory mock. The
//! optional ray reconstruction pass has its own instance seam,
//! [`reconstruction::ReconstructionLibrary`], and reuses the entry point.

pub mod frame_data;
pub mod native;
pub mod reconstruction;
pub mod state;

use std::ffi::c_void;
use std::fmt;

use crate::gpu::texture::NativeHandle;
use crate::pipeline::channel::ResourceChannel;
use crate::pipeline::snapshot_ring::EventPayload;

use self::state::ResourceState;

/// Event id the execution entry point interprets as "denoise this frame".
pub const DENOISE_EVENT_ID: i32 = 1;

/// Handle to a denoiser instance. Only strictly positive ids are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(pub i32);

impl InstanceId {
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }
}

/// A texture as seen from inside the denoiser library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LibraryView(pub u64);

impl LibraryView {
    pub const NULL: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// One shared channel as registered with a denoiser instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceBinding {
    pub channel: ResourceChannel,
    /// The library's own id for this resource slot.
    pub native_type: u32,
    pub view: LibraryView,
    pub state: ResourceState,
}

/// Native callback executed on the GPU timeline.
pub type RenderEventFn = unsafe extern "C" fn(event_id: i32, data: *mut c_void);

/// The library's render-event callback.
#[derive(Clone, Copy)]
pub struct ExecutionEntryPoint(RenderEventFn);

impl ExecutionEntryPoint {
    #[must_use]
    pub const fn new(callback: RenderEventFn) -> Self {
        Self(callback)
    }

    #[inline]
    #[must_use]
    pub fn address(self) -> usize {
        self.0 as usize
    }

    /// Runs the callback against a recorded descriptor.
    ///
    /// # Safety
    ///
    /// The ring that produced `payload` must still be alive and must not
    /// have recycled the slot. `event_id` must match the descriptor type.
    pub unsafe fn invoke(self, event_id: i32, payload: EventPayload) {
        // SAFETY: upheld by the caller; the pointer targets a live descriptor.
        unsafe { (self.0)(event_id, payload.as_ptr()) }
    }
}

impl PartialEq for ExecutionEntryPoint {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for ExecutionEntryPoint {}

impl fmt::Debug for ExecutionEntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExecutionEntryPoint({:#x})", self.address())
    }
}

/// Operations the pipeline needs from the native denoiser.
///
/// Instance ids come from the library and are opaque to the pipeline.
/// Calls with an unknown instance or view are the library's to ignore.
pub trait DenoiserLibrary {
    /// Returns a new instance id; a non-positive id signals failure.
    fn create_instance(&mut self) -> InstanceId;

    fn destroy_instance(&mut self, instance: InstanceId);

    /// Replaces the instance's resource table.
    fn update_resources(&mut self, instance: InstanceId, bindings: &[ResourceBinding]);

    /// The callback consumed by native render events.
    fn execution_entry_point(&self) -> Option<ExecutionEntryPoint>;

    /// Registers a texture with the library. Returns [`LibraryView::NULL`]
    /// on failure.
    fn wrap_native_texture(&mut self, texture: NativeHandle, format_tag: u32) -> LibraryView;

    fn release_wrapped_texture(&mut self, view: LibraryView);
}
