//! Per-View Resource Pool
//!
//! Owns every intermediate image of one view, plus the denoiser-side
//! wrappers of the shared channels.
//!
//! # Design
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   ResourcePool                      │
//! │                                                     │
//! │  slots: [PooledTexture; CHANNEL_COUNT] or empty     │
//! │  size:  last ensured (w, h)                         │
//! │                                                     │
//! │  ensure(w, h)    size change → full reallocation    │
//! │  texture(ch)     stage binding (&self)              │
//! │  bindings()      table pushed to the denoiser       │
//! │  advance_frame() first-frame → steady-state states  │
//! │  release()       teardown, idempotent               │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Reallocation
//!
//! A size change replaces the whole generation at once. New textures are
//! created and wrapped first; only when every one of them is live are the
//! old ones released. If any creation fails the partial new generation is
//! rolled back and the old one stays in place untouched.

use smallvec::SmallVec;

use crate::denoiser::{DenoiserLibrary, InstanceId, LibraryView, ResourceBinding};
use crate::errors::{PipelineError, Result};
use crate::gpu::texture::{GpuTexture, NativeHandle, TextureAllocator, TextureDesc};
use crate::pipeline::channel::{CHANNEL_TABLE, ChannelInfo, ResourceChannel, SHARED_CHANNEL_COUNT};

/// Largest dimension the denoiser descriptor can record.
pub const MAX_DIMENSION: u32 = u16::MAX as u32;

// ─── Public Types ─────────────────────────────────────────────────────────────

/// A channel's texture and, for shared channels, its library wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PooledTexture {
    pub channel: ResourceChannel,
    pub texture: GpuTexture,
    /// [`LibraryView::NULL`] for internal channels.
    pub view: LibraryView,
}

/// Result of [`ResourcePool::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// Size unchanged; nothing was touched.
    Unchanged,
    /// Every channel was (re)created.
    Allocated {
        /// Size of the released generation, if there was one.
        previous: Option<(u32, u32)>,
    },
}

impl EnsureOutcome {
    #[inline]
    #[must_use]
    pub const fn is_reallocated(self) -> bool {
        matches!(self, Self::Allocated { .. })
    }
}

/// Native handles and size of the shared channels, as recorded in a
/// frame descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedResources {
    pub width: u32,
    pub height: u32,
    pub handles: [NativeHandle; SHARED_CHANNEL_COUNT],
}

// ─── ResourcePool ─────────────────────────────────────────────────────────────

/// All intermediate images of one view.
#[derive(Debug, Default)]
pub struct ResourcePool {
    /// Indexed by `ResourceChannel::index`; empty until the first `ensure`.
    slots: Vec<PooledTexture>,
    size: Option<(u32, u32)>,
    /// Frames recorded since the last allocation.
    frames_since_allocation: u32,
    /// Bumped on every allocation.
    generation: u64,
}

impl ResourcePool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every channel match `width` x `height`.
    ///
    /// On reallocation the new binding table is pushed to `instance`.
    pub fn ensure(
        &mut self,
        allocator: &mut dyn TextureAllocator,
        library: &mut dyn DenoiserLibrary,
        instance: InstanceId,
        width: u32,
        height: u32,
    ) -> Result<EnsureOutcome> {
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidResolution { width, height });
        }
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(PipelineError::ResolutionTooLarge {
                width,
                height,
                max: MAX_DIMENSION,
            });
        }
        if self.size == Some((width, height)) {
            return Ok(EnsureOutcome::Unchanged);
        }

        let mut fresh = Vec::with_capacity(CHANNEL_TABLE.len());
        for info in &CHANNEL_TABLE {
            match Self::allocate_slot(allocator, library, info, width, height) {
                Ok(slot) => fresh.push(slot),
                Err(err) => {
                    log::error!(
                        "Failed to allocate {} at {width}x{height}: {err}; keeping previous generation",
                        info.label
                    );
                    Self::release_slots(allocator, library, fresh);
                    return Err(err);
                }
            }
        }

        let previous = self.size;
        let old = std::mem::replace(&mut self.slots, fresh);
        Self::release_slots(allocator, library, old);

        self.size = Some((width, height));
        self.frames_since_allocation = 0;
        self.generation += 1;

        library.update_resources(instance, &self.bindings());

        match previous {
            Some((w, h)) => log::info!("Resource pool resized {w}x{h} -> {width}x{height}"),
            None => log::info!("Resource pool allocated at {width}x{height}"),
        }
        Ok(EnsureOutcome::Allocated { previous })
    }

    fn allocate_slot(
        allocator: &mut dyn TextureAllocator,
        library: &mut dyn DenoiserLibrary,
        info: &ChannelInfo,
        width: u32,
        height: u32,
    ) -> Result<PooledTexture> {
        let texture = allocator.create_texture(&TextureDesc {
            label: info.label,
            width,
            height,
            format: info.format,
            usage: TextureDesc::CHANNEL_USAGE,
        })?;

        let view = if info.channel.is_shared() {
            let view = library.wrap_native_texture(texture.native, info.format.native_tag());
            if view.is_null() {
                allocator.destroy_texture(&texture);
                return Err(PipelineError::TextureWrapFailed(info.channel));
            }
            view
        } else {
            LibraryView::NULL
        };

        Ok(PooledTexture {
            channel: info.channel,
            texture,
            view,
        })
    }

    fn release_slots(
        allocator: &mut dyn TextureAllocator,
        library: &mut dyn DenoiserLibrary,
        slots: Vec<PooledTexture>,
    ) {
        for slot in slots {
            if !slot.view.is_null() {
                library.release_wrapped_texture(slot.view);
            }
            allocator.destroy_texture(&slot.texture);
        }
    }

    /// Frees every texture and wrapper. Safe to call repeatedly.
    pub fn release(&mut self, allocator: &mut dyn TextureAllocator, library: &mut dyn DenoiserLibrary) {
        if self.slots.is_empty() {
            return;
        }
        let slots = std::mem::take(&mut self.slots);
        log::debug!("Releasing {} pooled textures", slots.len());
        Self::release_slots(allocator, library, slots);
        self.size = None;
        self.frames_since_allocation = 0;
    }

    /// Releases the library wrappers and keeps the textures.
    ///
    /// For teardown paths without an allocator. A later [`release`](Self::release)
    /// frees the textures without touching the wrappers again.
    pub fn release_wrappers(&mut self, library: &mut dyn DenoiserLibrary) {
        for slot in &mut self.slots {
            if !slot.view.is_null() {
                library.release_wrapped_texture(slot.view);
                slot.view = LibraryView::NULL;
            }
        }
    }

    /// The live texture of `channel`.
    pub fn texture(&self, channel: ResourceChannel) -> Result<&PooledTexture> {
        self.slots
            .get(channel.index())
            .ok_or(PipelineError::ResourceNotReady(channel))
    }

    /// Native handles of `channels`, in the given order.
    pub fn native_handles<const N: usize>(&self, channels: [ResourceChannel; N]) -> Result<[NativeHandle; N]> {
        let mut handles = [NativeHandle::NULL; N];
        for (handle, channel) in handles.iter_mut().zip(channels) {
            *handle = self.texture(channel)?.texture.native;
        }
        Ok(handles)
    }

    /// Binding table for the denoiser, in channel order.
    ///
    /// Empty before the first `ensure`.
    #[must_use]
    pub fn bindings(&self) -> SmallVec<[ResourceBinding; SHARED_CHANNEL_COUNT]> {
        let first_frame = self.frames_since_allocation == 0;
        self.slots
            .iter()
            .filter_map(|slot| {
                let info = slot.channel.info();
                info.library_slot.map(|native_type| ResourceBinding {
                    channel: slot.channel,
                    native_type,
                    view: slot.view,
                    state: if first_frame {
                        info.first_frame_state
                    } else {
                        info.steady_state
                    },
                })
            })
            .collect()
    }

    /// Marks one frame as recorded against the current generation.
    ///
    /// After the first frame the steady-state table replaces the first-frame
    /// one in the library.
    pub fn advance_frame(&mut self, library: &mut dyn DenoiserLibrary, instance: InstanceId) {
        if self.slots.is_empty() {
            return;
        }
        self.frames_since_allocation = self.frames_since_allocation.saturating_add(1);
        if self.frames_since_allocation == 1 {
            log::debug!("Switching denoiser bindings to steady-state access");
            library.update_resources(instance, &self.bindings());
        }
    }

    /// Size and native handles of the shared channels.
    ///
    /// Fails if any shared texture disagrees with the pool size.
    pub fn shared_resources(&self) -> Result<SharedResources> {
        let (width, height) = self
            .size
            .ok_or(PipelineError::ResourceNotReady(ResourceChannel::MotionVector))?;

        let mut handles = [NativeHandle::NULL; SHARED_CHANNEL_COUNT];
        for (i, handle) in handles.iter_mut().enumerate() {
            let slot = &self.slots[i];
            if slot.texture.size() != (width, height) {
                log::warn!(
                    "{} is {:?} but the pool is {width}x{height}",
                    slot.channel.label(),
                    slot.texture.size()
                );
                return Err(PipelineError::DescriptorSizeMismatch {
                    channel: slot.channel,
                    expected: (width, height),
                    actual: slot.texture.size(),
                });
            }
            *handle = slot.texture.native;
        }

        Ok(SharedResources {
            width,
            height,
            handles,
        })
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> Option<(u32, u32)> {
        self.size
    }

    #[inline]
    #[must_use]
    pub fn is_allocated(&self) -> bool {
        !self.slots.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn frames_since_allocation(&self) -> u32 {
        self.frames_since_allocation
    }

    /// Number of allocations so far. Changes whenever every handle changes.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// All live slots in channel order.
    #[must_use]
    pub fn slots(&self) -> &[PooledTexture] {
        &self.slots
    }
}

impl Drop for ResourcePool {
    fn drop(&mut self) {
        if !self.slots.is_empty() {
            log::warn!(
                "ResourcePool dropped with {} live textures; call release() first",
                self.slots.len()
            );
        }
    }
}
