//! GPU Texture Handles
//!
//! The orchestrator never touches texture memory. It only needs to create,
//! identify and destroy 2D textures, so allocation sits behind the
//! [`TextureAllocator`] trait and the rest of the crate passes around the
//! small `Copy` handle [`GpuTexture`].

use crate::errors::Result;
use crate::gpu::format::PixelFormat;

/// Opaque handle the native library understands (a resource pointer or id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NativeHandle(pub u64);

impl NativeHandle {
    pub const NULL: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// A 2D texture owned by a [`TextureAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuTexture {
    /// Allocator-unique id. Never reused while the process lives.
    pub id: u64,
    pub native: NativeHandle,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl GpuTexture {
    #[inline]
    #[must_use]
    pub const fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Request for a single-mip, single-sample 2D texture.
#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub usage: wgpu::TextureUsages,
}

impl TextureDesc {
    /// Usage shared by every pipeline channel: written by compute kernels,
    /// sampled by later stages, copied for display.
    pub const CHANNEL_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::STORAGE_BINDING
        .union(wgpu::TextureUsages::TEXTURE_BINDING)
        .union(wgpu::TextureUsages::COPY_SRC)
        .union(wgpu::TextureUsages::COPY_DST);
}

/// Creates and destroys GPU textures on behalf of a resource pool.
pub trait TextureAllocator {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<GpuTexture>;

    /// Releases a texture. Unknown textures are ignored.
    fn destroy_texture(&mut self, texture: &GpuTexture);
}
