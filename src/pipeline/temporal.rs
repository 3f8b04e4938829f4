//! Temporal History Ping-Pong
//!
//! TAA reads last frame's result and writes this frame's. Two buffers
//! alternate by frame parity:
//!
//! ```text
//!   even sequence:  read A ──▶ write B
//!   odd  sequence:  read B ──▶ write A
//! ```
//!
//! Selection is a pure function of the ring write sequence, so it never
//! depends on how many frames were skipped or reallocated.

use crate::pipeline::channel::ResourceChannel;

/// One of the two TAA history buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryBuffer {
    A,
    B,
}

impl HistoryBuffer {
    #[inline]
    #[must_use]
    pub const fn channel(self) -> ResourceChannel {
        match self {
            Self::A => ResourceChannel::TaaHistoryA,
            Self::B => ResourceChannel::TaaHistoryB,
        }
    }

    #[inline]
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// History buffer read on frame `sequence`.
#[inline]
#[must_use]
pub const fn taa_source(sequence: u64) -> HistoryBuffer {
    if sequence & 1 == 0 {
        HistoryBuffer::A
    } else {
        HistoryBuffer::B
    }
}

/// History buffer written on frame `sequence`.
#[inline]
#[must_use]
pub const fn taa_destination(sequence: u64) -> HistoryBuffer {
    taa_source(sequence).other()
}

/// History buffers of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryPair {
    pub source: HistoryBuffer,
    pub destination: HistoryBuffer,
    /// `false` on the first frame and after a reallocation; the source then
    /// holds garbage and must not be blended.
    pub valid: bool,
}

impl HistoryPair {
    #[must_use]
    pub const fn for_frame(sequence: u64, valid: bool) -> Self {
        Self {
            source: taa_source(sequence),
            destination: taa_destination(sequence),
            valid,
        }
    }
}
