//! Pixel Formats
//!
//! The pipeline only ever allocates a handful of formats. [`PixelFormat`]
//! names them once and maps each to the two vocabularies that consume it:
//! the wgpu texture format used for allocation, and the numeric format tag
//! the native denoiser expects when wrapping a texture (DXGI numbering).

use serde::{Deserialize, Serialize};

/// Texture formats used by pipeline channels and display targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Four-channel half float. Motion vectors and radiance.
    Rgba16Float,
    /// Single-channel float. Linear view depth.
    R32Float,
    /// Packed 10:10:10:2. Normal and roughness.
    Rgb10a2Unorm,
    /// Single-channel half float. Penumbra and shadow.
    R16Float,
    /// Four-channel 8-bit. Validation overlay and base color.
    Rgba8Unorm,
    /// Packed 11:11:10 float. Lighting terms.
    Rg11b10Float,
    /// Typical swapchain formats for display targets.
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
}

impl PixelFormat {
    pub const ALL: [Self; 9] = [
        Self::Rgba16Float,
        Self::R32Float,
        Self::Rgb10a2Unorm,
        Self::R16Float,
        Self::Rgba8Unorm,
        Self::Rg11b10Float,
        Self::Rgba8UnormSrgb,
        Self::Bgra8Unorm,
        Self::Bgra8UnormSrgb,
    ];

    /// Maps to the wgpu format used when allocating the texture.
    #[must_use]
    pub const fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            Self::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            Self::R32Float => wgpu::TextureFormat::R32Float,
            Self::Rgb10a2Unorm => wgpu::TextureFormat::Rgb10a2Unorm,
            Self::R16Float => wgpu::TextureFormat::R16Float,
            Self::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            Self::Rg11b10Float => wgpu::TextureFormat::Rg11b10Ufloat,
            Self::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            Self::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            Self::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
        }
    }

    /// Reverse of [`Self::to_wgpu`] for imported textures.
    #[must_use]
    pub fn from_wgpu(format: wgpu::TextureFormat) -> Option<Self> {
        let mapped = match format {
            wgpu::TextureFormat::Rgba16Float => Self::Rgba16Float,
            wgpu::TextureFormat::R32Float => Self::R32Float,
            wgpu::TextureFormat::Rgb10a2Unorm => Self::Rgb10a2Unorm,
            wgpu::TextureFormat::R16Float => Self::R16Float,
            wgpu::TextureFormat::Rgba8Unorm => Self::Rgba8Unorm,
            wgpu::TextureFormat::Rg11b10Ufloat => Self::Rg11b10Float,
            wgpu::TextureFormat::Rgba8UnormSrgb => Self::Rgba8UnormSrgb,
            wgpu::TextureFormat::Bgra8Unorm => Self::Bgra8Unorm,
            wgpu::TextureFormat::Bgra8UnormSrgb => Self::Bgra8UnormSrgb,
            _ => return None,
        };
        Some(mapped)
    }

    /// Format tag passed to the native library when wrapping a texture.
    #[must_use]
    pub const fn native_tag(self) -> u32 {
        match self {
            Self::Rgba16Float => 10,
            Self::Rgb10a2Unorm => 24,
            Self::Rg11b10Float => 26,
            Self::Rgba8Unorm => 28,
            Self::Rgba8UnormSrgb => 29,
            Self::R32Float => 41,
            Self::R16Float => 54,
            Self::Bgra8Unorm => 87,
            Self::Bgra8UnormSrgb => 91,
        }
    }

    #[inline]
    #[must_use]
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Rgba16Float => 8,
            Self::R16Float => 2,
            Self::R32Float
            | Self::Rgb10a2Unorm
            | Self::Rgba8Unorm
            | Self::Rg11b10Float
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Bgra8UnormSrgb => 4,
        }
    }
}
