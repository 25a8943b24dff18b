//! Hardware collaborator interfaces
//!
//! The control core drives the board through these traits. Concrete
//! implementations wrap the SPI/I2C peripheral drivers, the USB device
//! controller, and the memory-to-memory DMA engine; none of that glue
//! lives in this crate. Each call is synchronous and is issued at most
//! once per detected configuration change.

use crate::types::{Direction, FilterPath, RadioError, SampleRate, TransceiverMode};

/// Whether a sample-rate call may touch hardware.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateCommit {
    /// Report the achievable rate without programming anything
    DryRun,
    /// Program the clock generator
    Program,
}

/// A tuning request for the frequency setter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tuning {
    /// Single target frequency; the front end derives IF, LO and filter
    /// path internally
    Auto {
        /// Center frequency in Hz
        hz: u64,
    },
    /// Explicit IF + LO + filter path, bypassing the automatic
    /// translation
    Explicit {
        /// Intermediate frequency in Hz
        if_hz: u64,
        /// Front-end local oscillator frequency in Hz
        lo_hz: u64,
        /// Image-reject filter path
        path: FilterPath,
    },
}

/// RF front-end programming interface.
///
/// Implementations sit directly on the peripheral drivers and do not
/// retry; a validation failure is reported as
/// [`RadioError::InvalidParameter`] and a missing capability as
/// [`RadioError::UnsupportedOperation`].
pub trait RfHardware {
    /// Program (or probe, for [`RateCommit::DryRun`]) the analog
    /// front-end clock. Returns the rate the clock generator can
    /// actually produce for the request.
    fn set_sample_rate(
        &mut self,
        afe_rate: SampleRate,
        commit: RateCommit,
    ) -> Result<SampleRate, RadioError>;

    /// Tune the front end.
    fn set_frequency(&mut self, tuning: Tuning) -> Result<(), RadioError>;

    /// Program the analog baseband low-pass filter.
    fn set_bandwidth(&mut self, hz: u32) -> Result<(), RadioError>;

    /// Switch the auxiliary narrowband anti-alias filter.
    fn set_narrowband_filter(&mut self, enable: bool) -> Result<(), RadioError>;

    /// Switch the RF amplifier for the given path. One control line is
    /// shared between the RX and TX amplifiers.
    fn set_rf_gain(&mut self, direction: Direction, enable: bool) -> Result<(), RadioError>;

    /// Program the IF gain stage.
    fn set_if_gain(&mut self, db: u8) -> Result<(), RadioError>;

    /// Program the baseband gain stage.
    fn set_baseband_gain(&mut self, db: u8) -> Result<(), RadioError>;

    /// Switch the antenna port bias tee.
    fn set_bias_tee(&mut self, enable: bool) -> Result<(), RadioError>;

    /// Arm or disarm the hardware trigger input.
    fn set_trigger(&mut self, enable: bool) -> Result<(), RadioError>;

    /// Switch the digital DC blocking filter.
    fn set_dc_block(&mut self, enable: bool) -> Result<(), RadioError>;

    /// Reconfigure the RF path direction. Called after every other
    /// parameter of a pass has been programmed.
    fn set_direction(&mut self, direction: Direction) -> Result<(), RadioError>;
}

/// Fire-and-forget notifications toward an attached display or status
/// surface. Return values are never consulted; every method defaults to
/// a no-op.
pub trait UiNotifier {
    /// Applied host-visible sample rate, rounded to the nearest Hz
    fn sample_rate(&mut self, hz: u32) {
        let _ = hz;
    }

    /// Applied center frequency
    fn frequency(&mut self, hz: u64) {
        let _ = hz;
    }

    /// Applied baseband filter bandwidth
    fn bandwidth(&mut self, hz: u32) {
        let _ = hz;
    }

    /// Applied IF gain
    fn if_gain(&mut self, db: u8) {
        let _ = db;
    }

    /// Applied baseband gain
    fn baseband_gain(&mut self, db: u8) {
        let _ = db;
    }

    /// Applied RF amplifier state
    fn rf_gain(&mut self, direction: Direction, enable: bool) {
        let _ = (direction, enable);
    }

    /// Applied RF path direction
    fn direction(&mut self, direction: Direction) {
        let _ = direction;
    }

    /// Applied transceiver mode
    fn mode(&mut self, mode: TransceiverMode) {
        let _ = mode;
    }

    /// End of an update pass; `changed` is true when any hardware call
    /// was made
    fn update_done(&mut self, changed: bool) {
        let _ = changed;
    }
}

/// Notifier for headless boards.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullUi;

impl UiNotifier for NullUi {}

/// USB bulk endpoint selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// Device-to-host streaming endpoint
    BulkIn,
    /// Host-to-device streaming endpoint
    BulkOut,
}

/// Bulk transfer scheduling interface over the USB device controller.
///
/// At most one streaming transfer is in flight at a time; completion is
/// polled rather than delivered by callback so the mode loop stays in
/// control of ordering.
pub trait TransferScheduler {
    /// Queue a transfer of `len` bytes at `offset` into the bulk ring.
    fn schedule(&mut self, endpoint: Endpoint, offset: u32, len: u32) -> Result<(), RadioError>;

    /// Whether a scheduled transfer has not yet completed.
    fn is_busy(&self) -> bool;

    /// Completed transfer length, if one finished since the last poll.
    /// A short OUT transfer reports the bytes actually received.
    fn poll_complete(&mut self) -> Option<u32>;

    /// Stop the in-flight transfer and report how many bytes it had
    /// already moved, read back from the controller's transfer
    /// descriptor rather than assumed.
    fn abort(&mut self) -> u32;

    /// Drop any queued data on the endpoint at teardown.
    fn flush(&mut self, endpoint: Endpoint) -> Result<(), RadioError>;
}

/// A memory-to-memory bridge transfer between the sample ring and the
/// bulk ring. Both rings share one cursor: the same `offset` addresses
/// the source in one ring and the destination in the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DmaTransfer {
    /// `Rx` moves sample → bulk, `Tx` moves bulk → sample
    pub direction: Direction,
    /// Ring offset of the first byte
    pub offset: u32,
    /// Transfer length in bytes
    pub len: u32,
}

/// Memory-to-memory DMA engine bridging the two ring buffers.
pub trait SampleDma {
    /// Begin a bridge transfer. Only called while idle.
    fn start(&mut self, transfer: DmaTransfer) -> Result<(), RadioError>;

    /// Whether a started transfer has not yet completed.
    fn is_busy(&self) -> bool;

    /// Completed transfer length, if one finished since the last poll.
    fn poll_complete(&mut self) -> Option<u32>;
}
