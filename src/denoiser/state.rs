//! Resource Access States
//!
//! Describes how the denoiser should treat each bound texture: which access
//! it was last written with, what layout it is in, and which pipeline stages
//! touched it. Numeric values follow the native library's ABI.

use bitflags::bitflags;

bitflags! {
    /// Access kinds a texture may be in when handed to the denoiser.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessBits: u32 {
        const COLOR_ATTACHMENT        = 1 << 5;
        const SHADER_RESOURCE         = 1 << 13;
        const SHADER_RESOURCE_STORAGE = 1 << 14;
        const COPY_SOURCE             = 1 << 16;
        const COPY_DESTINATION        = 1 << 17;
    }
}

/// Image layouts, in native ABI order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Layout {
    Undefined = 0,
    General = 1,
    Present = 2,
    ColorAttachment = 3,
    ShadingRateAttachment = 4,
    DepthStencilAttachment = 5,
    DepthStencilReadonly = 6,
    ShaderResource = 7,
    ShaderResourceStorage = 8,
    CopySource = 9,
    CopyDestination = 10,
    ResolveSource = 11,
    ResolveDestination = 12,
}

/// Stage bit for pixel-shader access.
pub const STAGE_FRAGMENT: u32 = 1 << 7;
/// Stage bit for compute access.
pub const STAGE_COMPUTE: u32 = 1 << 10;

/// Access, layout and stage mask of one bound texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceState {
    pub access: AccessBits,
    pub layout: Layout,
    pub stages: u32,
}

impl ResourceState {
    /// Sampled by shaders.
    pub const SHADER_READ: Self = Self {
        access: AccessBits::SHADER_RESOURCE,
        layout: Layout::ShaderResource,
        stages: STAGE_FRAGMENT,
    };

    /// Read-write storage image.
    pub const STORAGE: Self = Self {
        access: AccessBits::SHADER_RESOURCE_STORAGE,
        layout: Layout::ShaderResourceStorage,
        stages: STAGE_COMPUTE,
    };

    /// Freshly created render target.
    pub const COLOR_ATTACHMENT: Self = Self {
        access: AccessBits::COLOR_ATTACHMENT,
        layout: Layout::ColorAttachment,
        stages: STAGE_FRAGMENT,
    };
}
