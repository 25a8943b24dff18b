//! DMA and USB admission policies
//!
//! The control-side half of the streaming path. Byte counters trace
//! three cursors through the two rings: the sample clock's counter
//! (owned by the sample core), the DMA bridge cursor, and the USB
//! cursor. The admission policies keep every in-flight transfer inside
//! a region no other mover is touching; the buffers themselves need no
//! locking.

use crate::config::{BUFFER_HALF, BULK_BUFFER_SIZE, SAMPLE_BUFFER_SIZE, USB_TRANSFER_SIZE};
use crate::hw::{DmaTransfer, Endpoint, SampleDma, TransferScheduler};
use crate::stream::state::StreamControl;
use crate::types::{Direction, RadioError, StreamError, StreamMode};

/// The control-side streaming pipeline.
pub struct StreamPipeline<'a, D: SampleDma, T: TransferScheduler> {
    control: StreamControl<'a>,
    dma: D,
    usb: T,
    direction: Direction,
    /// Bytes bridged between the rings
    dma_count: u32,
    /// Bytes moved over USB; kept ring-aligned with `dma_count`
    usb_count: u32,
    /// `dma_count` at run start, for block accounting
    base: u32,
}

impl<'a, D: SampleDma, T: TransferScheduler> StreamPipeline<'a, D, T> {
    /// Build a pipeline over the control view and the two transfer
    /// engines
    pub fn new(control: StreamControl<'a>, dma: D, usb: T) -> Self {
        Self {
            control,
            dma,
            usb,
            direction: Direction::Off,
            dma_count: 0,
            usb_count: 0,
            base: 0,
        }
    }

    /// Begin a run in the given direction. Cursors are baselined to
    /// the sample core's current counter so both rings start empty and
    /// aligned.
    pub fn start(&mut self, direction: Direction) {
        self.direction = direction;
        let base = self.control.produced();
        self.dma_count = base;
        self.usb_count = base;
        self.base = base;
    }

    /// The control view, for arming and teardown handshakes
    pub fn control_mut(&mut self) -> &mut StreamControl<'a> {
        &mut self.control
    }

    /// The DMA engine, mutable (board glue and tests)
    pub fn dma_mut(&mut self) -> &mut D {
        &mut self.dma
    }

    /// The transfer scheduler, mutable (board glue and tests)
    pub fn usb_mut(&mut self) -> &mut T {
        &mut self.usb
    }

    /// Error raised by the sample core, if any
    #[must_use]
    pub fn stream_error(&self) -> StreamError {
        self.control.error()
    }

    /// Bytes bridged since the run started
    #[must_use]
    pub fn bridged_bytes(&self) -> u32 {
        self.dma_count.wrapping_sub(self.base)
    }

    /// Bytes handed to USB since the run started
    #[must_use]
    pub fn usb_bytes(&self) -> u32 {
        self.usb_count.wrapping_sub(self.base)
    }

    /// Ring offset where the next USB transfer will start
    #[must_use]
    pub fn usb_offset(&self) -> u32 {
        self.usb_count % BULK_BUFFER_SIZE
    }

    /// Whether a USB transfer is in flight
    #[must_use]
    pub fn usb_busy(&self) -> bool {
        self.usb.is_busy()
    }

    /// Poll both engines and fold completed transfers into the
    /// cursors. Call once per loop iteration, before the admission
    /// checks.
    pub fn service(&mut self) {
        if let Some(len) = self.dma.poll_complete() {
            self.dma_count = self.dma_count.wrapping_add(len);
        }
        if let Some(len) = self.usb.poll_complete() {
            self.usb_count = self.usb_count.wrapping_add(len);
            self.control.advance_consumed(len);
        }
    }

    /// Issue a bridge transfer when one is admissible.
    ///
    /// A transfer never starts while one is pending, never crosses a
    /// half-buffer boundary, and never enters the half the sample
    /// clock is currently working unless a full half of margin exists.
    /// Returns whether a transfer was started.
    pub fn start_dma_if_possible(&mut self) -> Result<bool, RadioError> {
        if self.dma.is_busy() {
            return Ok(false);
        }

        let produced = self.control.produced();
        let (available, space) = match self.direction {
            Direction::Rx => (
                produced.wrapping_sub(self.dma_count),
                BULK_BUFFER_SIZE - self.dma_count.wrapping_sub(self.usb_count),
            ),
            _ => {
                // an underrunning sample clock can consume past the
                // bridge cursor; the ring is simply empty then
                let occupancy = self.dma_count.wrapping_sub(produced) as i32;
                (
                    self.usb_count.wrapping_sub(self.dma_count),
                    if occupancy <= 0 {
                        SAMPLE_BUFFER_SIZE
                    } else {
                        SAMPLE_BUFFER_SIZE - occupancy as u32
                    },
                )
            }
        };

        let half_remainder = BUFFER_HALF - (self.dma_count % BUFFER_HALF);
        let len = available.min(space).min(half_remainder);
        if len == 0 {
            return Ok(false);
        }

        let clock_half = (produced % SAMPLE_BUFFER_SIZE) / BUFFER_HALF;
        let bridge_half = (self.dma_count % SAMPLE_BUFFER_SIZE) / BUFFER_HALF;
        let margin = match self.direction {
            Direction::Rx => available,
            _ => space,
        };
        if clock_half == bridge_half && margin < BUFFER_HALF {
            return Ok(false);
        }

        self.dma.start(DmaTransfer {
            direction: self.direction,
            offset: self.dma_count % SAMPLE_BUFFER_SIZE,
            len,
        })?;
        Ok(true)
    }

    /// Schedule the next fixed-size bulk transfer when the ring has a
    /// full chunk ready (RX) or a full chunk of space (TX). One
    /// transfer in flight at a time; this is what throttles the
    /// pipeline to USB's actual throughput. Returns whether a transfer
    /// was scheduled.
    pub fn start_usb_if_possible(&mut self) -> Result<bool, RadioError> {
        if self.usb.is_busy() {
            return Ok(false);
        }

        match self.direction {
            Direction::Rx => {
                let available = self.dma_count.wrapping_sub(self.usb_count);
                if available < USB_TRANSFER_SIZE {
                    return Ok(false);
                }
                self.usb
                    .schedule(Endpoint::BulkIn, self.usb_offset(), USB_TRANSFER_SIZE)?;
            }
            _ => {
                let space = BULK_BUFFER_SIZE - self.usb_count.wrapping_sub(self.dma_count);
                if space < USB_TRANSFER_SIZE {
                    return Ok(false);
                }
                self.usb
                    .schedule(Endpoint::BulkOut, self.usb_offset(), USB_TRANSFER_SIZE)?;
            }
        }
        Ok(true)
    }

    /// Schedule one sweep capture block on the IN endpoint
    pub fn schedule_block(&mut self, len: u32) -> Result<(), RadioError> {
        self.usb.schedule(Endpoint::BulkIn, self.usb_offset(), len)
    }

    /// Drop a bridged block without sending it (sweep throwaway
    /// blocks), releasing its ring space
    pub fn skip_block(&mut self, len: u32) {
        self.usb_count = self.usb_count.wrapping_add(len);
        self.control.advance_consumed(len);
    }

    /// Drain every host-supplied byte to the sample clock before a TX
    /// stop.
    ///
    /// The partially completed in-flight transfer is accounted from
    /// the controller's own bytes-remaining counter, the remaining
    /// bulk bytes are bridged, and the sample core is told to go idle
    /// exactly at the last bridged byte. `should_abort` is checked on
    /// every spin iteration.
    pub fn drain_tx(&mut self, mut should_abort: impl FnMut() -> bool) -> Result<(), RadioError> {
        if let Some(len) = self.usb.poll_complete() {
            self.usb_count = self.usb_count.wrapping_add(len);
            self.control.advance_consumed(len);
        }
        if self.usb.is_busy() {
            let done = self.usb.abort();
            self.usb_count = self.usb_count.wrapping_add(done);
            self.control.advance_consumed(done);
        }

        while self.dma_count != self.usb_count || self.dma.is_busy() {
            if should_abort() {
                return Ok(());
            }
            self.service();
            self.start_dma_if_possible()?;
            core::hint::spin_loop();
        }

        self.control
            .set_threshold_switch(self.dma_count, StreamMode::Idle);
        while self.control.active_mode() != StreamMode::Idle {
            if should_abort() {
                return Ok(());
            }
            core::hint::spin_loop();
        }
        Ok(())
    }

    /// Stop the sample core and quiesce the endpoints at the end of a
    /// run. `should_abort` is checked on every spin iteration.
    pub fn shutdown(
        &mut self,
        endpoint: Endpoint,
        should_abort: impl FnMut() -> bool,
    ) -> Result<(), RadioError> {
        // a leftover threshold pair must not restart the core after it
        // acknowledges the stop
        let count = self.control.produced();
        self.control.set_threshold_switch(count, StreamMode::Idle);
        self.control.request_mode(StreamMode::Idle);
        self.control.wait_request_ack(should_abort);
        if self.usb.is_busy() {
            let done = self.usb.abort();
            self.usb_count = self.usb_count.wrapping_add(done);
            self.control.advance_consumed(done);
        }
        self.usb.flush(endpoint)?;
        self.direction = Direction::Off;
        Ok(())
    }
}
