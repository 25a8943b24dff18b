//! System configuration and hardware constants
//!
//! Compile-time constants for the radio board: rate limits, tuning
//! windows, filter geometry, buffer layout, and protocol defaults.
//! All board-specific numbers are centralized here.

use crate::types::{sample_rate_from_hz, SampleRate};

/// Lowest sample rate the datapath supports (200 kHz)
pub const MIN_MCU_RATE_HZ: u32 = 200_000;

/// Highest sample rate the datapath supports (21.8 MHz)
pub const MAX_MCU_RATE_HZ: u32 = 21_800_000;

/// Sample rate substituted when none was ever requested
pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 10_000_000;

/// Fastest rate the analog front end may be clocked at (40 MHz)
pub const AFE_RATE_CEILING_HZ: u32 = 40_000_000;

/// Widest decimation/interpolation exponent the datapath register holds
pub const RESAMPLE_RATIO_LIMIT: u8 = 7;

/// Lowest sample rate as a fixed-point value
pub const MIN_MCU_RATE: SampleRate = sample_rate_from_hz(MIN_MCU_RATE_HZ);

/// Highest sample rate as a fixed-point value
pub const MAX_MCU_RATE: SampleRate = sample_rate_from_hz(MAX_MCU_RATE_HZ);

/// Front-end clock ceiling as a fixed-point value
pub const AFE_RATE_CEILING: SampleRate = sample_rate_from_hz(AFE_RATE_CEILING_HZ);

/// Center frequency substituted when none was ever applied (2.45 GHz)
pub const DEFAULT_FREQUENCY_HZ: u64 = 2_450_000_000;

/// Highest tunable center frequency (7.25 GHz)
pub const MAX_FREQUENCY_HZ: u64 = 7_250_000_000;

/// Lower edge of the IF converter's tuning window
pub const IF_MIN_HZ: u64 = 2_150_000_000;

/// Upper edge of the IF converter's tuning window
pub const IF_MAX_HZ: u64 = 2_750_000_000;

/// Lowest front-end local oscillator frequency
pub const LO_MIN_HZ: u64 = 84_375_000;

/// Highest front-end local oscillator frequency
pub const LO_MAX_HZ: u64 = 5_400_000_000;

/// Narrowest analog baseband filter setting (1.75 MHz)
pub const BASEBAND_BW_MIN_HZ: u32 = 1_750_000;

/// Widest analog baseband filter setting (28 MHz)
pub const BASEBAND_BW_MAX_HZ: u32 = 28_000_000;

/// Derived bandwidths at or below this engage the narrowband filter
pub const NARROWBAND_THRESHOLD_HZ: u32 = 1_750_000;

/// IF gain substituted when none was ever requested
pub const DEFAULT_IF_GAIN_DB: u8 = 16;

/// Baseband gain substituted when none was ever requested
pub const DEFAULT_BB_GAIN_DB: u8 = 20;

/// Widest IF gain setting
pub const MAX_IF_GAIN_DB: u8 = 40;

/// Widest baseband gain setting
pub const MAX_BB_GAIN_DB: u8 = 62;

/// Sample-clock ring buffer size in bytes
pub const SAMPLE_BUFFER_SIZE: u32 = 32_768;

/// USB bulk ring buffer size in bytes
pub const BULK_BUFFER_SIZE: u32 = 32_768;

/// Half-buffer granularity shared by both rings
pub const BUFFER_HALF: u32 = 16_384;

/// Fixed USB bulk transfer chunk size in bytes
pub const USB_TRANSFER_SIZE: u32 = 16_384;

/// Sweep capture block size in bytes
pub const SWEEP_BLOCK_SIZE: u32 = 16_384;

/// Bytes of sync + frequency metadata at the head of each sweep block
pub const SWEEP_HEADER_SIZE: usize = 10;

/// Maximum number of sweep frequency ranges
pub const SWEEP_MAX_RANGES: usize = 10;

/// Capture blocks discarded after each retune while the front end settles
pub const SWEEP_THROWAWAY_BLOCKS: u32 = 2;

/// Sweep range boundaries are expressed in this granularity (1 MHz)
pub const FREQ_GRANULARITY_HZ: u64 = 1_000_000;

/// Flag bit set alongside a requested stream mode until the sample core
/// acknowledges it
pub const STREAM_REQUEST_FLAG: u32 = 1 << 16;

/// Shortfall count that aborts a streaming run; zero disables the check
pub const DEFAULT_SHORTFALL_LIMIT: u32 = 0;

/// USB VID (pid.codes test VID during development)
pub const USB_VID: u16 = 0x1209;

/// USB PID (assigned from pid.codes for production)
pub const USB_PID: u16 = 0x0002;
