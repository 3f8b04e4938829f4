//! Process-unique ids for GPU objects.
//!
//! A tracked object's id is what crosses the native boundary as its
//! [`NativeHandle`], so ids never repeat while the process lives, across
//! every allocator and thread.

use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::gpu::texture::NativeHandle;

/// Zero is reserved for [`NativeHandle::NULL`].
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A GPU object paired with its id.
#[derive(Debug)]
pub struct Tracked<T> {
    inner: T,
    id: u64,
}

impl<T> Tracked<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Handle the denoiser library receives for this object.
    #[inline]
    #[must_use]
    pub fn native(&self) -> NativeHandle {
        NativeHandle(self.id)
    }
}

impl<T> Deref for Tracked<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
