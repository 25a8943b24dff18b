//! Streaming Pipeline
//!
//! The double-buffered sample path between the sample-clocked core and
//! the USB bulk endpoints: shared state block, DMA/USB admission
//! policies, and the sweep capture plan.

pub mod pipeline;
pub mod state;
pub mod sweep;

pub use pipeline::StreamPipeline;
pub use state::{SampleCore, StateRecord, StreamControl, StreamState};
pub use sweep::{SweepConfig, SweepPlan, SweepStyle};

use crate::config::{BULK_BUFFER_SIZE, SAMPLE_BUFFER_SIZE};

/// The two fixed-size ring buffers of the streaming path.
///
/// The sample ring is filled or drained at the sample clock rate; the
/// bulk ring is filled or drained by USB transfers; a memory-to-memory
/// DMA engine bridges them. On target both live at addresses fixed by
/// the linker script.
pub struct StreamBuffers {
    /// Sample-clock ring
    pub sample: [u8; SAMPLE_BUFFER_SIZE as usize],
    /// USB bulk ring
    pub bulk: [u8; BULK_BUFFER_SIZE as usize],
}

impl StreamBuffers {
    /// Zero-initialized buffers
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sample: [0; SAMPLE_BUFFER_SIZE as usize],
            bulk: [0; BULK_BUFFER_SIZE as usize],
        }
    }
}

impl Default for StreamBuffers {
    fn default() -> Self {
        Self::new()
    }
}
