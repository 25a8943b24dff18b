//! Shared types used across the SDR firmware
//!
//! This module defines domain-specific types that enforce invariants
//! at compile time: radio registers and banks, the dirty-bit mask,
//! operating modes, and the error taxonomy.

use core::fmt;

use fixed::types::extra::U24;
use fixed::FixedU64;

/// Sample rate in Hz as a 40.24 fixed-point value.
///
/// The integer part covers every rate the clock generator can produce;
/// the fractional part carries sub-Hz resolution through the rate
/// derivation without rounding until the final UI report.
pub type SampleRate = FixedU64<U24>;

/// Build a [`SampleRate`] from a whole number of Hz.
#[must_use]
pub const fn sample_rate_from_hz(hz: u32) -> SampleRate {
    SampleRate::from_bits((hz as u64) << 24)
}

/// Round a [`SampleRate`] to the nearest whole Hz.
#[must_use]
pub const fn sample_rate_round_hz(rate: SampleRate) -> u32 {
    ((rate.to_bits() + (1 << 23)) >> 24) as u32
}

/// A configurable radio parameter.
///
/// Every register is stored as a raw 64-bit value (see [`RegValue`]);
/// the meaning of the value depends on the register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    /// Operating mode ([`TransceiverMode`] discriminant)
    OpMode = 0,
    /// RF center frequency in Hz (automatic tuning model)
    RfFrequency = 1,
    /// Intermediate frequency in Hz (explicit tuning model)
    IfFrequency = 2,
    /// Front-end local oscillator frequency in Hz (explicit tuning model)
    LoFrequency = 3,
    /// Image-reject filter path ([`FilterPath`] discriminant)
    FilterPath = 4,
    /// Digital quarter-rate rotation ([`Rotation`] discriminant)
    Rotation = 5,
    /// Host-visible sample rate, 40.24 fixed-point Hz
    SampleRate = 6,
    /// Maximum RX decimation ratio as a log2 exponent
    RxResampleRatio = 7,
    /// Maximum TX interpolation ratio as a log2 exponent
    TxResampleRatio = 8,
    /// RX RF amplifier enable (boolean)
    RxAmp = 9,
    /// TX RF amplifier enable (boolean)
    TxAmp = 10,
    /// IF gain in dB
    IfGain = 11,
    /// Baseband gain in dB
    BasebandGain = 12,
    /// RX baseband filter bandwidth override in Hz
    RxBandwidth = 13,
    /// TX baseband filter bandwidth override in Hz
    TxBandwidth = 14,
    /// Antenna port bias tee enable (boolean)
    BiasTee = 15,
    /// Hardware trigger enable (boolean)
    Trigger = 16,
    /// Digital DC blocking filter enable (boolean)
    DcBlock = 17,
}

impl Register {
    /// Number of registers
    pub const COUNT: usize = 18;

    /// All registers in index order
    pub const ALL: [Self; Self::COUNT] = [
        Self::OpMode,
        Self::RfFrequency,
        Self::IfFrequency,
        Self::LoFrequency,
        Self::FilterPath,
        Self::Rotation,
        Self::SampleRate,
        Self::RxResampleRatio,
        Self::TxResampleRatio,
        Self::RxAmp,
        Self::TxAmp,
        Self::IfGain,
        Self::BasebandGain,
        Self::RxBandwidth,
        Self::TxBandwidth,
        Self::BiasTee,
        Self::Trigger,
        Self::DcBlock,
    ];

    /// Look up a register by its wire identifier
    #[must_use]
    pub const fn from_id(id: u8) -> Option<Self> {
        if (id as usize) < Self::COUNT {
            Some(Self::ALL[id as usize])
        } else {
            None
        }
    }

    /// Table index of this register
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Bit position of this register in a [`DirtyMask`]
    #[must_use]
    pub const fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

/// A named collection of register values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Bank {
    /// Mirror of the values currently programmed into hardware.
    /// Read-only at the API; only the update engine mutates it.
    Applied = 0,
    /// Live operating configuration; writes are dirty-tracked
    Active = 1,
    /// Preset restored when switching to an inactive mode
    Idle = 2,
    /// Preset restored when switching to RX
    Rx = 3,
    /// Preset restored when switching to TX
    Tx = 4,
    /// Write-only pseudo-bank fanning out to every preset plus `Active`
    All = 5,
}

impl Bank {
    /// Look up a bank by its wire identifier
    #[must_use]
    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::Applied),
            1 => Some(Self::Active),
            2 => Some(Self::Idle),
            3 => Some(Self::Rx),
            4 => Some(Self::Tx),
            5 => Some(Self::All),
            _ => None,
        }
    }
}

/// A raw register value with a reserved "unset" sentinel.
///
/// `u64::MAX` means unset/inherit. No register's legitimate value
/// domain reaches the sentinel: frequencies top out near 2^33 and the
/// 40.24 sample-rate encoding near 2^49.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RegValue(u64);

impl RegValue {
    /// The unset sentinel
    pub const UNSET: Self = Self(u64::MAX);

    /// Wrap a raw value
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Encode a boolean switch value
    #[must_use]
    pub const fn from_bool(on: bool) -> Self {
        Self(on as u64)
    }

    /// The raw 64-bit value, sentinel included
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Whether a value has been stored
    #[must_use]
    pub const fn is_set(self) -> bool {
        self.0 != u64::MAX
    }

    /// The stored value, if any
    #[must_use]
    pub const fn get(self) -> Option<u64> {
        if self.is_set() {
            Some(self.0)
        } else {
            None
        }
    }

    /// The stored value, or `default` when unset
    #[must_use]
    pub const fn or(self, default: u64) -> u64 {
        if self.is_set() {
            self.0
        } else {
            default
        }
    }

    /// Interpret as a boolean switch, substituting `default` when unset
    #[must_use]
    pub const fn flag(self, default: bool) -> bool {
        if self.is_set() {
            self.0 != 0
        } else {
            default
        }
    }
}

impl fmt::Debug for RegValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_set() {
            write!(f, "RegValue({})", self.0)
        } else {
            write!(f, "RegValue(unset)")
        }
    }
}

impl From<u64> for RegValue {
    fn from(raw: u64) -> Self {
        Self::new(raw)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for RegValue {
    fn format(&self, f: defmt::Formatter) {
        if self.is_set() {
            defmt::write!(f, "{}", self.0);
        } else {
            defmt::write!(f, "unset");
        }
    }
}

/// Bitset marking which `Active` registers changed since the last
/// successful hardware apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct DirtyMask(u32);

impl DirtyMask {
    /// No register dirty
    pub const EMPTY: Self = Self(0);

    /// Registers feeding the sample-rate derivation. The mode register
    /// is a member of every group: a mode switch re-derives the whole
    /// configuration, and the idempotence checks keep that cheap.
    pub const RATE: Self = Self(
        Register::SampleRate.bit()
            | Register::RxResampleRatio.bit()
            | Register::TxResampleRatio.bit()
            | Register::OpMode.bit(),
    );

    /// Registers feeding the tuning derivation
    pub const FREQUENCY: Self = Self(
        Register::RfFrequency.bit()
            | Register::IfFrequency.bit()
            | Register::LoFrequency.bit()
            | Register::FilterPath.bit()
            | Register::OpMode.bit(),
    );

    /// Registers feeding the bandwidth derivation. The digital rotation
    /// widens the derived filter, so it lives here rather than with the
    /// tuning group; the mode register routes the per-direction
    /// override.
    pub const BANDWIDTH: Self = Self(
        Register::RxBandwidth.bit()
            | Register::TxBandwidth.bit()
            | Register::Rotation.bit()
            | Register::OpMode.bit(),
    );

    /// Registers feeding the gain derivation; the mode register routes
    /// the shared amplifier control line
    pub const GAIN: Self = Self(
        Register::RxAmp.bit()
            | Register::TxAmp.bit()
            | Register::IfGain.bit()
            | Register::BasebandGain.bit()
            | Register::OpMode.bit(),
    );

    /// Mark a register dirty
    pub fn mark(&mut self, register: Register) {
        self.0 |= register.bit();
    }

    /// Check a single register
    #[must_use]
    pub const fn contains(self, register: Register) -> bool {
        self.0 & register.bit() != 0
    }

    /// Check for overlap with a group mask
    #[must_use]
    pub const fn intersects(self, group: Self) -> bool {
        self.0 & group.0 != 0
    }

    /// Whether no register is marked
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Take the current mask, leaving this one empty
    pub fn take(&mut self) -> Self {
        core::mem::replace(self, Self::EMPTY)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for DirtyMask {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "DirtyMask({=u32:b})", self.0);
    }
}

/// Transceiver operating mode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u16)]
pub enum TransceiverMode {
    /// Front end powered down, streaming stopped
    #[default]
    Off = 0,
    /// Continuous receive streaming
    Rx = 1,
    /// Continuous transmit streaming
    Tx = 2,
    /// Stepped-frequency receive capture
    RxSweep = 5,
}

impl TransceiverMode {
    /// Look up a mode by its wire identifier
    #[must_use]
    pub const fn from_id(id: u16) -> Option<Self> {
        match id {
            0 => Some(Self::Off),
            1 => Some(Self::Rx),
            2 => Some(Self::Tx),
            5 => Some(Self::RxSweep),
            _ => None,
        }
    }

    /// RF path direction implied by this mode
    #[must_use]
    pub const fn direction(self) -> Direction {
        match self {
            Self::Rx | Self::RxSweep => Direction::Rx,
            Self::Tx => Direction::Tx,
            Self::Off => Direction::Off,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for TransceiverMode {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Off => defmt::write!(f, "OFF"),
            Self::Rx => defmt::write!(f, "RX"),
            Self::Tx => defmt::write!(f, "TX"),
            Self::RxSweep => defmt::write!(f, "RX-SWEEP"),
        }
    }
}

/// RF path direction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Direction {
    /// Neither path active
    #[default]
    Off,
    /// Receive path
    Rx,
    /// Transmit path
    Tx,
}

#[cfg(feature = "embedded")]
impl defmt::Format for Direction {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Off => defmt::write!(f, "OFF"),
            Self::Rx => defmt::write!(f, "RX"),
            Self::Tx => defmt::write!(f, "TX"),
        }
    }
}

/// Image-reject filter path through the RF front end
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FilterPath {
    /// Mixer bypassed, IF converted directly
    Bypass = 0,
    /// Low-pass filter ahead of the mixer
    LowPass = 1,
    /// High-pass filter ahead of the mixer
    HighPass = 2,
}

impl FilterPath {
    /// Look up a path by its wire identifier
    #[must_use]
    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::Bypass),
            1 => Some(Self::LowPass),
            2 => Some(Self::HighPass),
            _ => None,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for FilterPath {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Bypass => defmt::write!(f, "BYPASS"),
            Self::LowPass => defmt::write!(f, "LP"),
            Self::HighPass => defmt::write!(f, "HP"),
        }
    }
}

/// Digital quarter-rate spectrum rotation applied in the sample datapath
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Rotation {
    /// No rotation
    #[default]
    Off = 0,
    /// Shift up by a quarter of the sample rate
    Up = 1,
    /// Shift down by a quarter of the sample rate
    Down = 2,
}

impl Rotation {
    /// Look up a rotation by its wire identifier
    #[must_use]
    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::Off),
            1 => Some(Self::Up),
            2 => Some(Self::Down),
            _ => None,
        }
    }

    /// Whether a rotation is in effect
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Off)
    }
}

/// Sample-core execution mode, shared through the streaming state block
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum StreamMode {
    /// Not running
    #[default]
    Idle = 0,
    /// Armed; buffer position held until the threshold handshake fires
    Wait = 1,
    /// Receiving at the sample clock
    Rx = 2,
    /// Transmit warm-up; clocking fill while the buffer primes
    TxStart = 3,
    /// Transmitting buffered data at the sample clock
    TxRun = 4,
}

impl StreamMode {
    /// Look up a mode by its wire identifier
    #[must_use]
    pub const fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::Idle),
            1 => Some(Self::Wait),
            2 => Some(Self::Rx),
            3 => Some(Self::TxStart),
            4 => Some(Self::TxRun),
            _ => None,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for StreamMode {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Idle => defmt::write!(f, "IDLE"),
            Self::Wait => defmt::write!(f, "WAIT"),
            Self::Rx => defmt::write!(f, "RX"),
            Self::TxStart => defmt::write!(f, "TX-START"),
            Self::TxRun => defmt::write!(f, "TX-RUN"),
        }
    }
}

/// Sample-core error code, shared through the streaming state block
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum StreamError {
    /// No error
    #[default]
    None = 0,
    /// Receive path stalled waiting for the sample clock
    RxTimeout = 1,
    /// Transmit path stalled waiting for the sample clock
    TxTimeout = 2,
    /// Shortfall count exceeded the configured limit
    ShortfallLimit = 3,
}

impl StreamError {
    /// Look up an error by its wire identifier
    #[must_use]
    pub const fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::None),
            1 => Some(Self::RxTimeout),
            2 => Some(Self::TxTimeout),
            3 => Some(Self::ShortfallLimit),
            _ => None,
        }
    }
}

/// Errors surfaced at the control API boundary.
///
/// Hardware-programming collaborators also report through this type;
/// validation failures map to a protocol stall with no retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RadioError {
    /// Unknown bank identifier, or a write to a read-only bank
    InvalidBank,
    /// Unknown register identifier
    InvalidRegister,
    /// Value outside the register's legal domain
    InvalidParameter,
    /// Capability not present in this hardware configuration
    UnsupportedOperation,
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBank => write!(f, "invalid register bank"),
            Self::InvalidRegister => write!(f, "invalid register"),
            Self::InvalidParameter => write!(f, "parameter out of range"),
            Self::UnsupportedOperation => write!(f, "operation not supported"),
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for RadioError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::InvalidBank => defmt::write!(f, "InvalidBank"),
            Self::InvalidRegister => defmt::write!(f, "InvalidRegister"),
            Self::InvalidParameter => defmt::write!(f, "InvalidParameter"),
            Self::UnsupportedOperation => defmt::write!(f, "UnsupportedOperation"),
        }
    }
}
