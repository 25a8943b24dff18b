//! uSDR Firmware Main Application
//!
//! Entry point for the LPC43xx control core. Wires the configuration
//! engine, streaming pipeline and mode loop together over the board
//! collaborators and runs the request loop.

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use usdr_firmware::prelude::*;
use usdr_firmware::hw::{DmaTransfer, Endpoint, NullUi, RateCommit, Tuning};

static STREAM_STATE: StaticCell<StreamState> = StaticCell::new();
static BUFFERS: StaticCell<StreamBuffers> = StaticCell::new();
static SHARED: ControlShared = ControlShared::new();

// TODO: replace with the SPI-backed front-end drivers once board
// bring-up lands
struct UnwiredRf;

impl RfHardware for UnwiredRf {
    fn set_sample_rate(
        &mut self,
        afe_rate: SampleRate,
        _commit: RateCommit,
    ) -> Result<SampleRate, RadioError> {
        Ok(afe_rate)
    }

    fn set_frequency(&mut self, _tuning: Tuning) -> Result<(), RadioError> {
        Ok(())
    }

    fn set_bandwidth(&mut self, _hz: u32) -> Result<(), RadioError> {
        Ok(())
    }

    fn set_narrowband_filter(&mut self, _enable: bool) -> Result<(), RadioError> {
        Ok(())
    }

    fn set_rf_gain(&mut self, _direction: Direction, _enable: bool) -> Result<(), RadioError> {
        Ok(())
    }

    fn set_if_gain(&mut self, _db: u8) -> Result<(), RadioError> {
        Ok(())
    }

    fn set_baseband_gain(&mut self, _db: u8) -> Result<(), RadioError> {
        Ok(())
    }

    fn set_bias_tee(&mut self, _enable: bool) -> Result<(), RadioError> {
        Ok(())
    }

    fn set_trigger(&mut self, _enable: bool) -> Result<(), RadioError> {
        Ok(())
    }

    fn set_dc_block(&mut self, _enable: bool) -> Result<(), RadioError> {
        Ok(())
    }

    fn set_direction(&mut self, _direction: Direction) -> Result<(), RadioError> {
        Ok(())
    }
}

struct UnwiredDma;

impl SampleDma for UnwiredDma {
    fn start(&mut self, _transfer: DmaTransfer) -> Result<(), RadioError> {
        Ok(())
    }

    fn is_busy(&self) -> bool {
        false
    }

    fn poll_complete(&mut self) -> Option<u32> {
        None
    }
}

struct UnwiredUsb;

impl TransferScheduler for UnwiredUsb {
    fn schedule(&mut self, _endpoint: Endpoint, _offset: u32, _len: u32) -> Result<(), RadioError> {
        Ok(())
    }

    fn is_busy(&self) -> bool {
        false
    }

    fn poll_complete(&mut self) -> Option<u32> {
        None
    }

    fn abort(&mut self) -> u32 {
        0
    }

    fn flush(&mut self, _endpoint: Endpoint) -> Result<(), RadioError> {
        Ok(())
    }
}

/// Main entry point
#[entry]
fn main() -> ! {
    info!("uSDR firmware v{}", env!("CARGO_PKG_VERSION"));

    let state = STREAM_STATE.init(StreamState::new());
    let (sample_core, control) = state.split();
    // handed to the datapath mailbox once the sample-core glue lands
    let _ = sample_core;

    let buffers = BUFFERS.init(StreamBuffers::new());
    let radio = Radio::new(UnwiredRf, NullUi);
    let pipeline = StreamPipeline::new(control, UnwiredDma, UnwiredUsb);
    let mut transceiver = Transceiver::new(radio, pipeline, &SHARED, buffers);

    info!("control loop running");

    loop {
        if let Err(e) = transceiver.run_once() {
            warn!("control error: {}", e);
        }
    }
}
