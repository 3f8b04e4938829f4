//! Native Denoiser Binding
//!
//! Adapts a table of C entry points (as resolved by the host from the
//! plugin's export table) to [`DenoiserLibrary`]. The table is validated once
//! at construction so a missing export fails loudly at startup rather than
//! on the first frame.

use std::ffi::c_void;
use std::ptr;

use smallvec::SmallVec;

use crate::errors::{PipelineError, Result};
use crate::gpu::texture::NativeHandle;
use crate::pipeline::channel::SHARED_CHANNEL_COUNT;

use super::{DenoiserLibrary, ExecutionEntryPoint, InstanceId, LibraryView, RenderEventFn, ResourceBinding};

/// `ResourceState` as the library's ABI expects it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawResourceState {
    pub access: u32,
    pub layout: u32,
    pub stages: u32,
}

/// One entry of the array passed to `update_resources`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawResourceInput {
    pub resource_type: u32,
    pub texture: *mut c_void,
    pub state: RawResourceState,
}

impl From<&ResourceBinding> for RawResourceInput {
    fn from(binding: &ResourceBinding) -> Self {
        Self {
            resource_type: binding.native_type,
            texture: ptr::with_exposed_provenance_mut(binding.view.0 as usize),
            state: RawResourceState {
                access: binding.state.access.bits(),
                layout: binding.state.layout as u32,
                stages: binding.state.stages,
            },
        }
    }
}

pub type CreateInstanceFn = unsafe extern "C" fn() -> i32;
pub type DestroyInstanceFn = unsafe extern "C" fn(i32);
pub type UpdateResourcesFn = unsafe extern "C" fn(i32, *const RawResourceInput, i32);
pub type GetRenderEventFn = unsafe extern "C" fn() -> Option<RenderEventFn>;
pub type WrapTextureFn = unsafe extern "C" fn(*mut c_void, u32) -> *mut c_void;
pub type ReleaseTextureFn = unsafe extern "C" fn(*mut c_void);

/// Raw exports of the plugin. Any entry may be missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEntryPoints {
    pub create_instance: Option<CreateInstanceFn>,
    pub destroy_instance: Option<DestroyInstanceFn>,
    pub update_resources: Option<UpdateResourcesFn>,
    pub get_render_event_func: Option<GetRenderEventFn>,
    pub wrap_texture: Option<WrapTextureFn>,
    pub release_texture: Option<ReleaseTextureFn>,
    /// Only needed for [`NativeReconstructionLibrary`](super::reconstruction::NativeReconstructionLibrary).
    pub create_reconstruction_instance: Option<CreateInstanceFn>,
    pub destroy_reconstruction_instance: Option<DestroyInstanceFn>,
}

/// [`DenoiserLibrary`] backed by a loaded native plugin.
#[derive(Debug)]
pub struct NativeDenoiserLibrary {
    create_instance: CreateInstanceFn,
    destroy_instance: DestroyInstanceFn,
    update_resources: UpdateResourcesFn,
    wrap_texture: WrapTextureFn,
    release_texture: ReleaseTextureFn,
    entry_point: ExecutionEntryPoint,
}

impl NativeDenoiserLibrary {
    /// Validates the export table and fetches the execution entry point.
    ///
    /// # Safety
    ///
    /// Every function in `exports` must be a valid export of the same loaded
    /// plugin and remain callable for the lifetime of the returned value.
    pub unsafe fn new(exports: NativeEntryPoints) -> Result<Self> {
        let get_render_event_func = exports
            .get_render_event_func
            .ok_or(PipelineError::MissingEntryPoint("GetRenderEventAndDataFunc"))?;

        // SAFETY: the caller guarantees the export is callable.
        let callback = unsafe { get_render_event_func() }
            .ok_or(PipelineError::MissingEntryPoint("RenderEventAndData"))?;

        let library = Self {
            create_instance: exports
                .create_instance
                .ok_or(PipelineError::MissingEntryPoint("CreateDenoiserInstance"))?,
            destroy_instance: exports
                .destroy_instance
                .ok_or(PipelineError::MissingEntryPoint("DestroyDenoiserInstance"))?,
            update_resources: exports
                .update_resources
                .ok_or(PipelineError::MissingEntryPoint("UpdateDenoiserResources"))?,
            wrap_texture: exports
                .wrap_texture
                .ok_or(PipelineError::MissingEntryPoint("WrapD3D12Texture"))?,
            release_texture: exports
                .release_texture
                .ok_or(PipelineError::MissingEntryPoint("ReleaseTexture"))?,
            entry_point: ExecutionEntryPoint::new(callback),
        };

        log::debug!("Native denoiser bound, entry point {:?}", library.entry_point);
        Ok(library)
    }
}

impl DenoiserLibrary for NativeDenoiserLibrary {
    fn create_instance(&mut self) -> InstanceId {
        // SAFETY: export validated in `new`.
        InstanceId(unsafe { (self.create_instance)() })
    }

    fn destroy_instance(&mut self, instance: InstanceId) {
        // SAFETY: export validated in `new`; unknown ids are ignored natively.
        unsafe { (self.destroy_instance)(instance.0) }
    }

    fn update_resources(&mut self, instance: InstanceId, bindings: &[ResourceBinding]) {
        let raw: SmallVec<[RawResourceInput; SHARED_CHANNEL_COUNT]> =
            bindings.iter().map(RawResourceInput::from).collect();
        // SAFETY: `raw` outlives the call and `len` matches its length.
        unsafe { (self.update_resources)(instance.0, raw.as_ptr(), raw.len() as i32) }
    }

    fn execution_entry_point(&self) -> Option<ExecutionEntryPoint> {
        Some(self.entry_point)
    }

    fn wrap_native_texture(&mut self, texture: NativeHandle, format_tag: u32) -> LibraryView {
        let handle: *mut c_void = ptr::with_exposed_provenance_mut(texture.0 as usize);
        // SAFETY: export validated in `new`; the handle is a live native texture.
        let wrapped = unsafe { (self.wrap_texture)(handle, format_tag) };
        LibraryView(wrapped.expose_provenance() as u64)
    }

    fn release_wrapped_texture(&mut self, view: LibraryView) {
        if view.is_null() {
            return;
        }
        // SAFETY: `view` was produced by `wrap_native_texture`.
        unsafe { (self.release_texture)(ptr::with_exposed_provenance_mut(view.0 as usize)) }
    }
}
