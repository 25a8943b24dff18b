//! Shared streaming state
//!
//! One block of counters and mode words shared between the
//! sample-clocked core and the USB/control side. Every field has
//! exactly one writer; the other side only reads it. The two sides are
//! handed out as separate views so the single-writer convention is
//! enforced by the type system instead of by comment.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::config::STREAM_REQUEST_FLAG;
use crate::types::{StreamError, StreamMode};

/// The shared state block.
///
/// Created once at system init and never destroyed; on target it sits
/// at an address fixed by the linker script so both cores agree on it.
/// Byte counters are cumulative and wrap; all arithmetic on them is
/// modular.
#[derive(Debug, Default)]
pub struct StreamState {
    requested_mode: AtomicU32,
    active_mode: AtomicU32,
    m0_count: AtomicU32,
    m4_count: AtomicU32,
    num_shortfalls: AtomicU32,
    longest_shortfall: AtomicU32,
    shortfall_limit: AtomicU32,
    threshold: AtomicU32,
    next_mode: AtomicU32,
    error: AtomicU32,
}

impl StreamState {
    /// A zeroed state block (idle, no error, counters at zero)
    #[must_use]
    pub const fn new() -> Self {
        Self {
            requested_mode: AtomicU32::new(0),
            active_mode: AtomicU32::new(0),
            m0_count: AtomicU32::new(0),
            m4_count: AtomicU32::new(0),
            num_shortfalls: AtomicU32::new(0),
            longest_shortfall: AtomicU32::new(0),
            shortfall_limit: AtomicU32::new(0),
            threshold: AtomicU32::new(0),
            next_mode: AtomicU32::new(0),
            error: AtomicU32::new(0),
        }
    }

    /// Split the block into its two single-writer views: the
    /// sample-core side and the control side.
    pub fn split(&mut self) -> (SampleCore<'_>, StreamControl<'_>) {
        let state: &Self = self;
        (SampleCore { state }, StreamControl { state })
    }

    /// Set the shortfall limit that aborts a run; zero disables the
    /// check. This is a control-side field; callable from the vendor
    /// request path, which runs on the control core.
    pub fn set_shortfall_limit(&self, limit: u32) {
        self.shortfall_limit.store(limit, Ordering::Release);
    }

    /// Coherent copy of every field, for the streaming-state query
    #[must_use]
    pub fn record(&self) -> StateRecord {
        StateRecord {
            requested_mode: self.requested_mode.load(Ordering::Acquire),
            active_mode: self.active_mode.load(Ordering::Acquire),
            m0_count: self.m0_count.load(Ordering::Acquire),
            m4_count: self.m4_count.load(Ordering::Acquire),
            num_shortfalls: self.num_shortfalls.load(Ordering::Acquire),
            longest_shortfall: self.longest_shortfall.load(Ordering::Acquire),
            shortfall_limit: self.shortfall_limit.load(Ordering::Acquire),
            threshold: self.threshold.load(Ordering::Acquire),
            next_mode: self.next_mode.load(Ordering::Acquire),
            error: self.error.load(Ordering::Acquire),
        }
    }
}

/// The sample-clocked side's view.
///
/// Owns `active_mode`, `m0_count`, the shortfall counters and the
/// error code; reads the control side's request, threshold and limit
/// fields.
pub struct SampleCore<'a> {
    state: &'a StreamState,
}

impl SampleCore<'_> {
    /// Currently acknowledged execution mode
    #[must_use]
    pub fn active_mode(&self) -> StreamMode {
        StreamMode::from_id(self.state.active_mode.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Bytes moved through the sample ring so far
    #[must_use]
    pub fn count(&self) -> u32 {
        self.state.m0_count.load(Ordering::Relaxed)
    }

    /// Bytes the control side has moved over USB (read-only here)
    #[must_use]
    pub fn consumed(&self) -> u32 {
        self.state.m4_count.load(Ordering::Acquire)
    }

    /// Account `bytes` produced (RX) or consumed (TX) at the sample
    /// clock
    pub fn advance(&mut self, bytes: u32) {
        let count = self.state.m0_count.load(Ordering::Relaxed);
        self.state
            .m0_count
            .store(count.wrapping_add(bytes), Ordering::Release);
    }

    /// Service the two handshakes: acknowledge a flagged immediate
    /// request, then fire a pending threshold switch once the byte
    /// count has crossed it. Returns the mode in effect afterwards.
    pub fn service(&mut self) -> StreamMode {
        let requested = self.state.requested_mode.load(Ordering::Acquire);
        if requested & STREAM_REQUEST_FLAG != 0 {
            let mode = StreamMode::from_id(requested & !STREAM_REQUEST_FLAG).unwrap_or_default();
            if mode == StreamMode::Wait {
                // a fresh arm starts a fresh run
                self.state.error.store(0, Ordering::Release);
            }
            self.state.active_mode.store(mode as u32, Ordering::Release);
            self.state
                .requested_mode
                .store(requested & !STREAM_REQUEST_FLAG, Ordering::Release);
            return mode;
        }

        let next = self.state.next_mode.load(Ordering::Acquire);
        let active = self.state.active_mode.load(Ordering::Relaxed);
        if next != active {
            let threshold = self.state.threshold.load(Ordering::Acquire);
            let count = self.state.m0_count.load(Ordering::Relaxed);
            if count.wrapping_sub(threshold) as i32 >= 0 {
                self.state.active_mode.store(next, Ordering::Release);
            }
        }

        self.active_mode()
    }

    /// Record an overrun (RX) or underrun (TX) of `bytes`. Crossing
    /// the configured limit raises the error code and drops the core
    /// back to idle.
    pub fn record_shortfall(&mut self, bytes: u32) {
        let count = self.state.num_shortfalls.load(Ordering::Relaxed) + 1;
        self.state.num_shortfalls.store(count, Ordering::Release);
        if bytes > self.state.longest_shortfall.load(Ordering::Relaxed) {
            self.state.longest_shortfall.store(bytes, Ordering::Release);
        }
        let limit = self.state.shortfall_limit.load(Ordering::Acquire);
        if limit != 0 && count >= limit {
            self.state
                .error
                .store(StreamError::ShortfallLimit as u32, Ordering::Release);
            self.state
                .active_mode
                .store(StreamMode::Idle as u32, Ordering::Release);
        }
    }

    /// Raise an error code
    pub fn set_error(&mut self, error: StreamError) {
        self.state.error.store(error as u32, Ordering::Release);
    }
}

/// The USB/control side's view.
///
/// Owns the request word, the threshold/next-mode pair, `m4_count` and
/// the shortfall limit; reads the sample core's mode, count and error
/// fields.
pub struct StreamControl<'a> {
    state: &'a StreamState,
}

impl StreamControl<'_> {
    /// Post an immediate mode request. The sample core acknowledges by
    /// clearing the flag bit.
    pub fn request_mode(&mut self, mode: StreamMode) {
        self.state
            .requested_mode
            .store(STREAM_REQUEST_FLAG | mode as u32, Ordering::Release);
    }

    /// Whether a posted request has not been acknowledged yet
    #[must_use]
    pub fn request_pending(&self) -> bool {
        self.state.requested_mode.load(Ordering::Acquire) & STREAM_REQUEST_FLAG != 0
    }

    /// Spin until the sample core acknowledges the posted request.
    /// `should_abort` is checked every iteration; returns false when it
    /// fired first.
    pub fn wait_request_ack(&self, mut should_abort: impl FnMut() -> bool) -> bool {
        while self.request_pending() {
            if should_abort() {
                return false;
            }
            core::hint::spin_loop();
        }
        true
    }

    /// Schedule a mode switch at an exact byte count: once the sample
    /// core's counter crosses `threshold` it moves itself to `next`.
    pub fn set_threshold_switch(&mut self, threshold: u32, next: StreamMode) {
        self.state.threshold.store(threshold, Ordering::Relaxed);
        self.state.next_mode.store(next as u32, Ordering::Release);
    }

    /// Mode the sample core last acknowledged
    #[must_use]
    pub fn active_mode(&self) -> StreamMode {
        StreamMode::from_id(self.state.active_mode.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Sample-core byte counter (read-only here)
    #[must_use]
    pub fn produced(&self) -> u32 {
        self.state.m0_count.load(Ordering::Acquire)
    }

    /// Bytes moved over USB so far
    #[must_use]
    pub fn consumed(&self) -> u32 {
        self.state.m4_count.load(Ordering::Relaxed)
    }

    /// Account `bytes` moved over USB
    pub fn advance_consumed(&mut self, bytes: u32) {
        let count = self.state.m4_count.load(Ordering::Relaxed);
        self.state
            .m4_count
            .store(count.wrapping_add(bytes), Ordering::Release);
    }

    /// Set the shortfall limit for subsequent runs; zero disables
    pub fn set_shortfall_limit(&mut self, limit: u32) {
        self.state.set_shortfall_limit(limit);
    }

    /// Shortfall statistics: (count, longest in bytes)
    #[must_use]
    pub fn shortfalls(&self) -> (u32, u32) {
        (
            self.state.num_shortfalls.load(Ordering::Acquire),
            self.state.longest_shortfall.load(Ordering::Acquire),
        )
    }

    /// Error raised by the sample core, if any
    #[must_use]
    pub fn error(&self) -> StreamError {
        StreamError::from_id(self.state.error.load(Ordering::Acquire)).unwrap_or_default()
    }
}

/// Fixed-layout copy of the shared state for the streaming-state
/// query. Field order and width are part of the wire contract with the
/// host tools.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateRecord {
    /// Posted request word, flag bit included
    pub requested_mode: u32,
    /// Acknowledged execution mode
    pub active_mode: u32,
    /// Sample-core byte counter
    pub m0_count: u32,
    /// USB-side byte counter
    pub m4_count: u32,
    /// Shortfalls since boot
    pub num_shortfalls: u32,
    /// Longest single shortfall in bytes
    pub longest_shortfall: u32,
    /// Configured shortfall limit
    pub shortfall_limit: u32,
    /// Pending threshold byte count
    pub threshold: u32,
    /// Pending threshold target mode
    pub next_mode: u32,
    /// Sample-core error code
    pub error: u32,
}

impl StateRecord {
    /// Encoded size in bytes
    pub const SIZE: usize = 40;

    /// Little-endian wire encoding, fields in declaration order
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        let fields = [
            self.requested_mode,
            self.active_mode,
            self.m0_count,
            self.m4_count,
            self.num_shortfalls,
            self.longest_shortfall,
            self.shortfall_limit,
            self.threshold,
            self.next_mode,
            self.error,
        ];
        for (chunk, field) in out.chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&field.to_le_bytes());
        }
        out
    }

    /// Decode a wire record
    #[must_use]
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let mut fields = [0u32; 10];
        for (field, chunk) in fields.iter_mut().zip(bytes.chunks_exact(4)) {
            *field = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self {
            requested_mode: fields[0],
            active_mode: fields[1],
            m0_count: fields[2],
            m4_count: fields[3],
            num_shortfalls: fields[4],
            longest_shortfall: fields[5],
            shortfall_limit: fields[6],
            threshold: fields[7],
            next_mode: fields[8],
            error: fields[9],
        }
    }
}
