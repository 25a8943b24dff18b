//! Transceiver Mode Loop
//!
//! The top-level control loop. Mode changes arrive as sequenced
//! requests from the USB control path; a run ends the moment a newer
//! sequence number is observed, so cancellation is supersession rather
//! than an explicit stop call. Comparing sequence numbers, not mode
//! values, is what distinguishes "still my run" from "restart, even to
//! the same mode".

use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;

use crate::config::{BUFFER_HALF, SWEEP_BLOCK_SIZE, SWEEP_HEADER_SIZE, SWEEP_THROWAWAY_BLOCKS};
use crate::hw::{Endpoint, RfHardware, SampleDma, TransferScheduler, UiNotifier};
use crate::radio::Radio;
use crate::stream::sweep::{stamp_header, SweepConfig, SweepPlan};
use crate::stream::{StreamBuffers, StreamPipeline};
use crate::types::{
    Bank, Direction, RadioError, RegValue, Register, StreamError, StreamMode, TransceiverMode,
};

/// A sequenced mode-change request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransceiverRequest {
    /// Requested operating mode
    pub mode: TransceiverMode,
    /// Monotonically incrementing sequence number
    pub seq: u32,
}

/// The request mailbox between the USB control path and the mode loop.
///
/// Writes happen under a critical section on the control path; the
/// mode loop polls. Every write bumps the sequence number, including a
/// re-request of the current mode.
pub struct RequestCell {
    inner: Mutex<Cell<TransceiverRequest>>,
}

impl RequestCell {
    /// A mailbox holding an initial OFF request
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(TransceiverRequest {
                mode: TransceiverMode::Off,
                seq: 0,
            })),
        }
    }

    /// Post a mode request; returns the new sequence number
    pub fn request(&self, mode: TransceiverMode) -> u32 {
        critical_section::with(|cs| {
            let cell = self.inner.borrow(cs);
            let seq = cell.get().seq.wrapping_add(1);
            cell.set(TransceiverRequest { mode, seq });
            seq
        })
    }

    /// Current request
    #[must_use]
    pub fn get(&self) -> TransceiverRequest {
        critical_section::with(|cs| self.inner.borrow(cs).get())
    }

    /// Current sequence number
    #[must_use]
    pub fn seq(&self) -> u32 {
        self.get().seq
    }
}

impl Default for RequestCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Control-path state shared with the mode loop: the request mailbox,
/// the pending sweep configuration, and the TX flush policy.
pub struct ControlShared {
    /// Mode-change request mailbox
    pub requests: RequestCell,
    sweep: Mutex<RefCell<Option<SweepConfig>>>,
    tx_flush: AtomicBool,
}

impl ControlShared {
    /// Initial state: OFF requested, no sweep configured, graceful TX
    /// flush enabled
    #[must_use]
    pub const fn new() -> Self {
        Self {
            requests: RequestCell::new(),
            sweep: Mutex::new(RefCell::new(None)),
            tx_flush: AtomicBool::new(true),
        }
    }

    /// Stage a sweep configuration for the next sweep run
    pub fn set_sweep(&self, config: SweepConfig) {
        critical_section::with(|cs| {
            *self.sweep.borrow_ref_mut(cs) = Some(config);
        });
    }

    /// Currently staged sweep configuration
    #[must_use]
    pub fn sweep(&self) -> Option<SweepConfig> {
        critical_section::with(|cs| self.sweep.borrow_ref(cs).clone())
    }

    /// Choose whether leaving TX drains buffered samples first. Hosts
    /// that track device buffering themselves turn this off to get an
    /// immediate stop.
    pub fn set_tx_flush(&self, enable: bool) {
        self.tx_flush.store(enable, Ordering::Release);
    }

    /// Whether leaving TX drains buffered samples first
    #[must_use]
    pub fn tx_flush(&self) -> bool {
        self.tx_flush.load(Ordering::Acquire)
    }
}

impl Default for ControlShared {
    fn default() -> Self {
        Self::new()
    }
}

/// The transceiver: radio engine, streaming pipeline, and the mode
/// loop tying them together.
pub struct Transceiver<'a, H, U, D, T>
where
    H: RfHardware,
    U: UiNotifier,
    D: SampleDma,
    T: TransferScheduler,
{
    radio: Radio<H, U>,
    pipeline: StreamPipeline<'a, D, T>,
    shared: &'a ControlShared,
    buffers: &'a mut StreamBuffers,
}

impl<'a, H, U, D, T> Transceiver<'a, H, U, D, T>
where
    H: RfHardware,
    U: UiNotifier,
    D: SampleDma,
    T: TransferScheduler,
{
    /// Assemble the transceiver
    pub fn new(
        radio: Radio<H, U>,
        pipeline: StreamPipeline<'a, D, T>,
        shared: &'a ControlShared,
        buffers: &'a mut StreamBuffers,
    ) -> Self {
        Self {
            radio,
            pipeline,
            shared,
            buffers,
        }
    }

    /// The radio engine, for the control dispatch path
    pub fn radio(&self) -> &Radio<H, U> {
        &self.radio
    }

    /// The radio engine, mutable
    pub fn radio_mut(&mut self) -> &mut Radio<H, U> {
        &mut self.radio
    }

    /// Run the currently requested mode until a newer request
    /// supersedes it, then tear down. Call in a loop.
    pub fn run_once(&mut self) -> Result<(), RadioError> {
        let request = self.shared.requests.get();
        match request.mode {
            TransceiverMode::Off => self.off_mode(request),
            TransceiverMode::Rx => self.rx_mode(request),
            TransceiverMode::Tx => self.tx_mode(request),
            TransceiverMode::RxSweep => self.sweep_mode(request),
        }
    }

    /// OFF: no streaming; keep running update passes so register
    /// writes take effect while idle.
    fn off_mode(&mut self, request: TransceiverRequest) -> Result<(), RadioError> {
        let shared = self.shared;
        while shared.requests.seq() == request.seq {
            self.radio.update()?;
            core::hint::spin_loop();
        }
        Ok(())
    }

    /// RX: continuous streaming from the sample clock to the bulk IN
    /// endpoint.
    fn rx_mode(&mut self, request: TransceiverRequest) -> Result<(), RadioError> {
        let shared = self.shared;
        let seq = request.seq;

        self.radio.switch_mode(TransceiverMode::Rx)?;
        self.pipeline.start(Direction::Rx);

        if self.arm_sample_core(StreamMode::Rx, seq) {
            while shared.requests.seq() == seq {
                self.pipeline.service();
                self.pipeline.start_dma_if_possible()?;
                self.pipeline.start_usb_if_possible()?;
                if self.pipeline.stream_error() != StreamError::None {
                    break;
                }
                core::hint::spin_loop();
            }
        }

        self.teardown(Endpoint::BulkIn)
    }

    /// TX: continuous streaming from the bulk OUT endpoint to the
    /// sample clock, with a graceful drain on the way out unless the
    /// host opted out.
    fn tx_mode(&mut self, request: TransceiverRequest) -> Result<(), RadioError> {
        let shared = self.shared;
        let seq = request.seq;

        self.radio.switch_mode(TransceiverMode::Tx)?;
        self.pipeline.start(Direction::Tx);

        if self.arm_sample_core(StreamMode::TxStart, seq) {
            let mut primed = false;
            while shared.requests.seq() == seq {
                self.pipeline.service();
                self.pipeline.start_usb_if_possible()?;
                self.pipeline.start_dma_if_possible()?;
                if !primed && self.pipeline.bridged_bytes() >= BUFFER_HALF {
                    // enough real data buffered; leave the warm-up fill
                    let control = self.pipeline.control_mut();
                    let count = control.produced();
                    control.set_threshold_switch(count, StreamMode::TxRun);
                    primed = true;
                }
                if self.pipeline.stream_error() != StreamError::None {
                    break;
                }
                core::hint::spin_loop();
            }

            if shared.tx_flush() {
                // never truncate a transmission the host believes was
                // queued; a further request aborts the drain
                let stop_seq = shared.requests.seq();
                self.pipeline
                    .drain_tx(|| shared.requests.seq() != stop_seq)?;
            }
        }

        self.teardown(Endpoint::BulkOut)
    }

    /// Sweep: RX in fixed capture windows with a retune between
    /// windows and per-block frequency metadata.
    fn sweep_mode(&mut self, request: TransceiverRequest) -> Result<(), RadioError> {
        let shared = self.shared;
        let seq = request.seq;

        // the control path guards this, but a raw request can still
        // arrive without a staged plan
        let mut plan = match shared.sweep().map(SweepPlan::new) {
            Some(Ok(plan)) => plan,
            _ => return Err(RadioError::InvalidParameter),
        };

        self.radio.switch_mode(TransceiverMode::RxSweep)?;
        self.radio.write(
            Bank::Active,
            Register::RfFrequency,
            RegValue::new(plan.tune_target()),
        )?;
        self.pipeline.start(Direction::Rx);

        if self.arm_sample_core(StreamMode::Rx, seq) {
            let mut blocks_queued: u32 = 0;
            let mut disposed: u32 = 0;
            while shared.requests.seq() == seq {
                self.pipeline.service();
                self.pipeline.start_dma_if_possible()?;

                let ready = self.pipeline.bridged_bytes().wrapping_sub(disposed);
                if ready >= SWEEP_BLOCK_SIZE && !self.pipeline.usb_busy() {
                    blocks_queued += 1;
                    if blocks_queued > SWEEP_THROWAWAY_BLOCKS {
                        let offset = self.pipeline.usb_offset() as usize;
                        stamp_header(
                            plan.frequency(),
                            &mut self.buffers.bulk[offset..offset + SWEEP_HEADER_SIZE],
                        );
                        self.pipeline.schedule_block(SWEEP_BLOCK_SIZE)?;
                    } else {
                        self.pipeline.skip_block(SWEEP_BLOCK_SIZE);
                    }
                    disposed = disposed.wrapping_add(SWEEP_BLOCK_SIZE);
                }

                if blocks_queued >= plan.dwell_blocks() + SWEEP_THROWAWAY_BLOCKS {
                    plan.advance();
                    self.radio.write(
                        Bank::Active,
                        Register::RfFrequency,
                        RegValue::new(plan.tune_target()),
                    )?;
                    blocks_queued = 0;
                }

                if self.pipeline.stream_error() != StreamError::None {
                    break;
                }
                core::hint::spin_loop();
            }
        }

        self.teardown(Endpoint::BulkIn)
    }

    /// Arm the sample core: WAIT first, then a threshold switch into
    /// the run mode at the current byte count. Returns false when a
    /// newer request superseded the run while arming.
    fn arm_sample_core(&mut self, run_mode: StreamMode, seq: u32) -> bool {
        let shared = self.shared;
        let control = self.pipeline.control_mut();
        // neutralize any leftover threshold pair before re-arming
        let count = control.produced();
        control.set_threshold_switch(count, StreamMode::Wait);
        control.request_mode(StreamMode::Wait);
        if !control.wait_request_ack(|| shared.requests.seq() != seq) {
            return false;
        }
        let count = control.produced();
        control.set_threshold_switch(count, run_mode);
        true
    }

    /// Common teardown: stop the sample core, quiesce the endpoint,
    /// and force the radio to OFF.
    fn teardown(&mut self, endpoint: Endpoint) -> Result<(), RadioError> {
        let shared = self.shared;
        let stop_seq = shared.requests.seq();
        self.pipeline
            .shutdown(endpoint, || shared.requests.seq() != stop_seq)?;
        self.radio.switch_mode(TransceiverMode::Off)?;
        Ok(())
    }
}
