//! Tests for the streaming state block and the pipeline admission
//! policies
//!
//! The sample-core side is driven directly through its split view, so
//! the producer/consumer handshakes run exactly as they would across
//! the two cores; one test exercises the handshake from a real second
//! thread.

use usdr_firmware::config::{BUFFER_HALF, USB_TRANSFER_SIZE};
use usdr_firmware::hw::{DmaTransfer, Endpoint, SampleDma, TransferScheduler};
use usdr_firmware::stream::{StateRecord, StreamPipeline, StreamState};
use usdr_firmware::types::{Direction, RadioError, StreamError, StreamMode};

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct FakeDma {
    in_flight: Option<DmaTransfer>,
    done: Vec<u32>,
    started: Vec<DmaTransfer>,
    auto_complete: bool,
}

impl FakeDma {
    fn auto() -> Self {
        Self {
            auto_complete: true,
            ..Self::default()
        }
    }

    fn finish(&mut self) {
        if let Some(t) = self.in_flight.take() {
            self.done.push(t.len);
        }
    }
}

impl SampleDma for FakeDma {
    fn start(&mut self, transfer: DmaTransfer) -> Result<(), RadioError> {
        assert!(self.in_flight.is_none(), "dma started while busy");
        self.started.push(transfer);
        if self.auto_complete {
            self.done.push(transfer.len);
        } else {
            self.in_flight = Some(transfer);
        }
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    fn poll_complete(&mut self) -> Option<u32> {
        if self.done.is_empty() {
            None
        } else {
            Some(self.done.remove(0))
        }
    }
}

#[derive(Default)]
struct FakeUsb {
    in_flight: Option<(Endpoint, u32, u32)>,
    done: Vec<u32>,
    scheduled: Vec<(Endpoint, u32, u32)>,
    abort_done_bytes: u32,
    flushed: Vec<Endpoint>,
}

impl FakeUsb {
    fn finish(&mut self, len: u32) {
        assert!(self.in_flight.take().is_some(), "no transfer to finish");
        self.done.push(len);
    }
}

impl TransferScheduler for FakeUsb {
    fn schedule(&mut self, endpoint: Endpoint, offset: u32, len: u32) -> Result<(), RadioError> {
        assert!(self.in_flight.is_none(), "usb scheduled while busy");
        self.scheduled.push((endpoint, offset, len));
        self.in_flight = Some((endpoint, offset, len));
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    fn poll_complete(&mut self) -> Option<u32> {
        if self.done.is_empty() {
            None
        } else {
            Some(self.done.remove(0))
        }
    }

    fn abort(&mut self) -> u32 {
        if self.in_flight.take().is_some() {
            self.abort_done_bytes
        } else {
            0
        }
    }

    fn flush(&mut self, endpoint: Endpoint) -> Result<(), RadioError> {
        self.flushed.push(endpoint);
        Ok(())
    }
}

// ============================================================================
// State Block: Handshakes
// ============================================================================

#[test]
fn immediate_request_is_acknowledged() {
    let mut state = StreamState::new();
    let (mut core, mut ctrl) = state.split();

    ctrl.request_mode(StreamMode::Wait);
    assert!(ctrl.request_pending());
    assert_eq!(core.active_mode(), StreamMode::Idle);

    assert_eq!(core.service(), StreamMode::Wait);
    assert!(!ctrl.request_pending());
    assert_eq!(ctrl.active_mode(), StreamMode::Wait);
}

#[test]
fn threshold_switch_fires_at_exact_byte_count() {
    let mut state = StreamState::new();
    let (mut core, mut ctrl) = state.split();

    ctrl.request_mode(StreamMode::Wait);
    core.service();
    ctrl.set_threshold_switch(100, StreamMode::Rx);

    assert_eq!(core.service(), StreamMode::Wait);
    core.advance(99);
    assert_eq!(core.service(), StreamMode::Wait);
    core.advance(1);
    assert_eq!(core.service(), StreamMode::Rx);
}

#[test]
fn threshold_comparison_survives_counter_wrap() {
    let mut state = StreamState::new();
    let (mut core, mut ctrl) = state.split();

    ctrl.request_mode(StreamMode::Wait);
    core.service();
    core.advance(u32::MAX);
    // threshold sits past the wrap point
    ctrl.set_threshold_switch(10, StreamMode::Rx);
    assert_eq!(core.service(), StreamMode::Wait);

    core.advance(11);
    assert_eq!(core.service(), StreamMode::Rx);
}

#[test]
fn shortfall_limit_raises_error_and_idles() {
    let mut state = StreamState::new();
    let (mut core, mut ctrl) = state.split();

    ctrl.request_mode(StreamMode::Rx);
    core.service();
    ctrl.set_shortfall_limit(2);

    core.record_shortfall(100);
    assert_eq!(ctrl.error(), StreamError::None);
    assert_eq!(ctrl.active_mode(), StreamMode::Rx);

    core.record_shortfall(50);
    assert_eq!(ctrl.error(), StreamError::ShortfallLimit);
    assert_eq!(ctrl.active_mode(), StreamMode::Idle);
    assert_eq!(ctrl.shortfalls(), (2, 100));
}

#[test]
fn rearming_clears_a_previous_error() {
    let mut state = StreamState::new();
    let (mut core, mut ctrl) = state.split();

    ctrl.set_shortfall_limit(1);
    ctrl.request_mode(StreamMode::Rx);
    core.service();
    core.record_shortfall(64);
    assert_eq!(ctrl.error(), StreamError::ShortfallLimit);

    ctrl.request_mode(StreamMode::Wait);
    core.service();
    assert_eq!(ctrl.error(), StreamError::None);
}

#[test]
fn handshake_across_a_real_thread() {
    let mut state = StreamState::new();
    let (mut core, mut ctrl) = state.split();

    std::thread::scope(|s| {
        let producer = s.spawn(move || {
            loop {
                if core.service() == StreamMode::Rx {
                    break;
                }
                std::hint::spin_loop();
            }
            core.advance(BUFFER_HALF);
        });

        ctrl.request_mode(StreamMode::Wait);
        assert!(ctrl.wait_request_ack(|| false));
        let count = ctrl.produced();
        ctrl.set_threshold_switch(count, StreamMode::Rx);
        producer.join().unwrap();
    });

    assert_eq!(ctrl.active_mode(), StreamMode::Rx);
    assert_eq!(ctrl.produced(), BUFFER_HALF);
}

// ============================================================================
// State Block: Wire Record
// ============================================================================

#[test]
fn record_layout_is_pinned() {
    let mut state = StreamState::new();
    {
        let (mut core, mut ctrl) = state.split();
        ctrl.request_mode(StreamMode::Rx);
        core.service();
        core.advance(0x11223344);
        ctrl.advance_consumed(0x0a0b0c0d);
        ctrl.set_shortfall_limit(7);
        ctrl.set_threshold_switch(0x55667788, StreamMode::TxRun);
    }

    let bytes = state.record().to_bytes();
    assert_eq!(bytes.len(), StateRecord::SIZE);
    // active_mode at offset 4, little endian
    assert_eq!(&bytes[4..8], &[2, 0, 0, 0]);
    // m0_count at offset 8
    assert_eq!(&bytes[8..12], &[0x44, 0x33, 0x22, 0x11]);
    // m4_count at offset 12
    assert_eq!(&bytes[12..16], &[0x0d, 0x0c, 0x0b, 0x0a]);
    // shortfall_limit at offset 24
    assert_eq!(&bytes[24..28], &[7, 0, 0, 0]);
    // threshold at offset 28
    assert_eq!(&bytes[28..32], &[0x88, 0x77, 0x66, 0x55]);
    // next_mode at offset 32
    assert_eq!(&bytes[32..36], &[4, 0, 0, 0]);

    let decoded = StateRecord::from_bytes(&bytes);
    assert_eq!(decoded, state.record());
}

// ============================================================================
// Pipeline: RX Admission
// ============================================================================

#[test]
fn rx_dma_waits_for_a_safe_half() {
    let mut state = StreamState::new();
    let (mut core, ctrl) = state.split();
    let mut p = StreamPipeline::new(ctrl, FakeDma::default(), FakeUsb::default());
    p.start(Direction::Rx);

    // nothing produced
    assert!(!p.start_dma_if_possible().unwrap());

    // producer mid-half: stay out of it
    core.advance(BUFFER_HALF / 2);
    assert!(!p.start_dma_if_possible().unwrap());

    // producer crossed into the second half: bridge the first
    core.advance(BUFFER_HALF / 2);
    assert!(p.start_dma_if_possible().unwrap());
    assert_eq!(
        p.dma_mut().started[0],
        DmaTransfer {
            direction: Direction::Rx,
            offset: 0,
            len: BUFFER_HALF,
        }
    );

    // never two in flight
    assert!(!p.start_dma_if_possible().unwrap());
}

#[test]
fn rx_usb_waits_for_a_full_chunk() {
    let mut state = StreamState::new();
    let (mut core, ctrl) = state.split();
    let mut p = StreamPipeline::new(ctrl, FakeDma::default(), FakeUsb::default());
    p.start(Direction::Rx);

    assert!(!p.start_usb_if_possible().unwrap());

    core.advance(BUFFER_HALF);
    p.start_dma_if_possible().unwrap();
    p.dma_mut().finish();
    p.service();
    assert_eq!(p.bridged_bytes(), BUFFER_HALF);

    assert!(p.start_usb_if_possible().unwrap());
    assert_eq!(
        p.usb_mut().scheduled[0],
        (Endpoint::BulkIn, 0, USB_TRANSFER_SIZE)
    );
    // one transfer in flight at a time
    assert!(!p.start_usb_if_possible().unwrap());

    p.usb_mut().finish(USB_TRANSFER_SIZE);
    p.service();
    assert_eq!(core.consumed(), USB_TRANSFER_SIZE);
}

#[test]
fn rx_second_half_bridges_at_the_right_offset() {
    let mut state = StreamState::new();
    let (mut core, ctrl) = state.split();
    let mut p = StreamPipeline::new(ctrl, FakeDma::auto(), FakeUsb::default());
    p.start(Direction::Rx);

    core.advance(BUFFER_HALF);
    p.start_dma_if_possible().unwrap();
    p.service();

    // producer wraps back into the first half; bridge the second
    core.advance(BUFFER_HALF);
    assert!(p.start_dma_if_possible().unwrap());
    assert_eq!(p.dma_mut().started[1].offset, BUFFER_HALF);
}

#[test]
fn skip_block_releases_ring_space_without_usb() {
    let mut state = StreamState::new();
    let (mut core, ctrl) = state.split();
    let mut p = StreamPipeline::new(ctrl, FakeDma::auto(), FakeUsb::default());
    p.start(Direction::Rx);

    core.advance(BUFFER_HALF);
    p.start_dma_if_possible().unwrap();
    p.service();

    p.skip_block(BUFFER_HALF);
    assert_eq!(p.usb_offset(), BUFFER_HALF);
    assert_eq!(core.consumed(), BUFFER_HALF);
    assert!(p.usb_mut().scheduled.is_empty());
}

// ============================================================================
// Pipeline: TX and the Graceful Drain
// ============================================================================

#[test]
fn tx_usb_fills_while_space_remains() {
    let mut state = StreamState::new();
    let (_core, ctrl) = state.split();
    let mut p = StreamPipeline::new(ctrl, FakeDma::default(), FakeUsb::default());
    p.start(Direction::Tx);

    assert!(p.start_usb_if_possible().unwrap());
    assert_eq!(
        p.usb_mut().scheduled[0],
        (Endpoint::BulkOut, 0, USB_TRANSFER_SIZE)
    );
    p.usb_mut().finish(USB_TRANSFER_SIZE);
    p.service();

    // second chunk fits, third must wait for the bridge
    assert!(p.start_usb_if_possible().unwrap());
    p.usb_mut().finish(USB_TRANSFER_SIZE);
    p.service();
    assert!(!p.start_usb_if_possible().unwrap());
}

#[test]
fn tx_drain_accounts_the_partial_transfer_exactly() {
    let mut state = StreamState::new();
    let (mut core, ctrl) = state.split();
    let mut p = StreamPipeline::new(ctrl, FakeDma::auto(), FakeUsb::default());
    p.start(Direction::Tx);

    // arm the sample core into the transmit path
    let ctrl = p.control_mut();
    ctrl.request_mode(StreamMode::Wait);
    core.service();
    let count = ctrl.produced();
    ctrl.set_threshold_switch(count, StreamMode::TxStart);
    core.service();
    assert_eq!(core.active_mode(), StreamMode::TxStart);

    // one full chunk from the host
    p.start_usb_if_possible().unwrap();
    p.usb_mut().finish(USB_TRANSFER_SIZE);
    p.service();

    // a second transfer stops partway through
    p.start_usb_if_possible().unwrap();
    p.usb_mut().abort_done_bytes = 1_000;

    p.drain_tx(|| {
        // the clocked side keeps consuming while we drain
        core.service();
        core.advance(512);
        false
    })
    .unwrap();

    // exactly the 1000 partial bytes joined the full chunk
    assert_eq!(core.consumed(), USB_TRANSFER_SIZE + 1_000);
    assert!(core.count() >= USB_TRANSFER_SIZE + 1_000);
    assert_eq!(core.active_mode(), StreamMode::Idle);
}

#[test]
fn shutdown_idles_the_core_and_flushes_the_endpoint() {
    let mut state = StreamState::new();
    let (mut core, ctrl) = state.split();
    let mut p = StreamPipeline::new(ctrl, FakeDma::default(), FakeUsb::default());
    p.start(Direction::Rx);

    p.control_mut().request_mode(StreamMode::Wait);
    core.service();

    p.shutdown(Endpoint::BulkIn, || {
        core.service();
        false
    })
    .unwrap();

    assert_eq!(core.active_mode(), StreamMode::Idle);
    assert_eq!(p.usb_mut().flushed, vec![Endpoint::BulkIn]);
}
