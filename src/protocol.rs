//! Vendor control protocol
//!
//! Parsing and dispatch for the USB vendor requests the control core
//! exposes. Requests follow the control-transfer staging model: the
//! SETUP packet selects and validates the operation, an optional OUT
//! data stage carries the payload, and validation failures surface as
//! a protocol stall. Dispatch is a match over the request code; there
//! is no handler table.

use heapless::Vec;

use crate::config::{SWEEP_BLOCK_SIZE, SWEEP_MAX_RANGES};
use crate::hw::{RfHardware, UiNotifier};
use crate::radio::Radio;
use crate::stream::state::StreamState;
use crate::stream::sweep::{SweepConfig, SweepPlan, SweepStyle};
use crate::transceiver::ControlShared;
use crate::types::{Bank, RadioError, RegValue, Register, TransceiverMode};

/// Largest IN reply payload (the streaming-state record)
pub const MAX_REPLY_LEN: usize = 64;

/// Bytes of fixed sweep parameters ahead of the range list
pub const SWEEP_PARAMS_LEN: usize = 9;

/// Largest accepted OUT data stage (a full sweep configuration)
pub const MAX_DATA_LEN: usize = SWEEP_PARAMS_LEN + SWEEP_MAX_RANGES * 4;

/// Vendor request codes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestCode {
    /// Post a sequenced transceiver mode request
    SetTransceiverMode = 1,
    /// Write a register in a named bank (8-byte LE data stage)
    WriteRegister = 2,
    /// Read a register from a named bank (8-byte LE reply)
    ReadRegister = 3,
    /// Apply a mode preset to the hardware immediately
    SwitchMode = 4,
    /// Read the streaming-state record (40-byte reply)
    ReadStreamState = 5,
    /// Set the streaming shortfall limit
    SetShortfallLimit = 6,
    /// Stage a sweep configuration (data stage carries the plan)
    InitSweep = 7,
    /// Choose whether leaving TX drains buffered samples first
    SetTxFlush = 8,
}

impl RequestCode {
    /// Look up a code by its wire identifier
    #[must_use]
    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::SetTransceiverMode),
            2 => Some(Self::WriteRegister),
            3 => Some(Self::ReadRegister),
            4 => Some(Self::SwitchMode),
            5 => Some(Self::ReadStreamState),
            6 => Some(Self::SetShortfallLimit),
            7 => Some(Self::InitSweep),
            8 => Some(Self::SetTxFlush),
            _ => None,
        }
    }
}

/// The fields of a SETUP packet the dispatcher consumes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetupPacket {
    /// bRequest
    pub request: u8,
    /// wValue
    pub value: u16,
    /// wIndex
    pub index: u16,
    /// wLength
    pub length: u16,
}

/// A validated control request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlRequest {
    /// Post a sequenced mode request to the mode loop
    SetTransceiverMode(TransceiverMode),
    /// Store a register value; the raw value follows in the data stage
    WriteRegister {
        /// Target bank
        bank: Bank,
        /// Target register
        register: Register,
    },
    /// Read a register value
    ReadRegister {
        /// Source bank
        bank: Bank,
        /// Source register
        register: Register,
    },
    /// Apply a mode preset immediately
    SwitchMode(TransceiverMode),
    /// Read the streaming-state record
    ReadStreamState,
    /// Set the streaming shortfall limit
    SetShortfallLimit(u32),
    /// Stage a sweep configuration; the plan follows in the data stage
    InitSweep {
        /// Capture blocks to keep per tuning
        dwell_blocks: u32,
    },
    /// Choose the TX stop behavior
    SetTxFlush(bool),
}

impl ControlRequest {
    /// Validate a SETUP packet into a request
    pub fn parse(setup: &SetupPacket) -> Result<Self, RadioError> {
        let code = RequestCode::from_id(setup.request).ok_or(RadioError::InvalidParameter)?;
        match code {
            RequestCode::SetTransceiverMode => {
                let mode =
                    TransceiverMode::from_id(setup.value).ok_or(RadioError::InvalidParameter)?;
                Ok(Self::SetTransceiverMode(mode))
            }
            RequestCode::WriteRegister => {
                let (bank, register) = parse_target(setup.index)?;
                Ok(Self::WriteRegister { bank, register })
            }
            RequestCode::ReadRegister => {
                let (bank, register) = parse_target(setup.index)?;
                Ok(Self::ReadRegister { bank, register })
            }
            RequestCode::SwitchMode => {
                let mode =
                    TransceiverMode::from_id(setup.value).ok_or(RadioError::InvalidParameter)?;
                Ok(Self::SwitchMode(mode))
            }
            RequestCode::ReadStreamState => Ok(Self::ReadStreamState),
            RequestCode::SetShortfallLimit => {
                let limit = u32::from(setup.value) | (u32::from(setup.index) << 16);
                Ok(Self::SetShortfallLimit(limit))
            }
            RequestCode::InitSweep => {
                let num_samples = u32::from(setup.value) | (u32::from(setup.index) << 16);
                let dwell_blocks = num_samples / SWEEP_BLOCK_SIZE;
                if dwell_blocks == 0 {
                    return Err(RadioError::InvalidParameter);
                }
                Ok(Self::InitSweep { dwell_blocks })
            }
            RequestCode::SetTxFlush => match setup.value {
                0 => Ok(Self::SetTxFlush(false)),
                1 => Ok(Self::SetTxFlush(true)),
                _ => Err(RadioError::InvalidParameter),
            },
        }
    }

    /// Whether an OUT data stage follows the SETUP packet
    #[must_use]
    pub const fn has_data_stage(self) -> bool {
        matches!(self, Self::WriteRegister { .. } | Self::InitSweep { .. })
    }
}

/// bank in the high byte of wIndex, register in the low byte
fn parse_target(index: u16) -> Result<(Bank, Register), RadioError> {
    let bank = Bank::from_id((index >> 8) as u8).ok_or(RadioError::InvalidBank)?;
    let register = Register::from_id((index & 0xff) as u8).ok_or(RadioError::InvalidRegister)?;
    Ok((bank, register))
}

/// A staged reply for the status/IN stage
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlReply {
    /// Zero-length acknowledgement
    Ack,
    /// IN data payload
    Data(Vec<u8, MAX_REPLY_LEN>),
}

/// The vendor request dispatcher.
///
/// Holds a request between its SETUP and data stages the way the
/// endpoint hardware does.
#[derive(Default)]
pub struct VendorControl {
    pending: Option<ControlRequest>,
}

impl VendorControl {
    /// An idle dispatcher
    #[must_use]
    pub const fn new() -> Self {
        Self { pending: None }
    }

    /// Handle a SETUP packet. Requests without a data stage execute
    /// immediately and return their reply; requests with one are held
    /// and `None` asks the caller to run the OUT data stage.
    pub fn handle_setup<H: RfHardware, U: UiNotifier>(
        &mut self,
        setup: &SetupPacket,
        radio: &mut Radio<H, U>,
        shared: &ControlShared,
        state: &StreamState,
    ) -> Result<Option<ControlReply>, RadioError> {
        let request = ControlRequest::parse(setup)?;
        if request.has_data_stage() {
            self.pending = Some(request);
            return Ok(None);
        }
        execute(request, &[], radio, shared, state).map(Some)
    }

    /// Handle the OUT data stage of the held request
    pub fn handle_data<H: RfHardware, U: UiNotifier>(
        &mut self,
        payload: &[u8],
        radio: &mut Radio<H, U>,
        shared: &ControlShared,
        state: &StreamState,
    ) -> Result<ControlReply, RadioError> {
        let request = self.pending.take().ok_or(RadioError::InvalidParameter)?;
        execute(request, payload, radio, shared, state)
    }
}

fn execute<H: RfHardware, U: UiNotifier>(
    request: ControlRequest,
    payload: &[u8],
    radio: &mut Radio<H, U>,
    shared: &ControlShared,
    state: &StreamState,
) -> Result<ControlReply, RadioError> {
    match request {
        ControlRequest::SetTransceiverMode(mode) => {
            if mode == TransceiverMode::RxSweep && shared.sweep().is_none() {
                return Err(RadioError::InvalidParameter);
            }
            shared.requests.request(mode);
            Ok(ControlReply::Ack)
        }
        ControlRequest::WriteRegister { bank, register } => {
            let raw: [u8; 8] = payload
                .try_into()
                .map_err(|_| RadioError::InvalidParameter)?;
            radio.write(bank, register, RegValue::new(u64::from_le_bytes(raw)))?;
            Ok(ControlReply::Ack)
        }
        ControlRequest::ReadRegister { bank, register } => {
            let value = radio.read(bank, register)?;
            let mut reply = Vec::new();
            reply
                .extend_from_slice(&value.raw().to_le_bytes())
                .map_err(|()| RadioError::InvalidParameter)?;
            Ok(ControlReply::Data(reply))
        }
        ControlRequest::SwitchMode(mode) => {
            radio.switch_mode(mode)?;
            Ok(ControlReply::Ack)
        }
        ControlRequest::ReadStreamState => {
            let mut reply = Vec::new();
            reply
                .extend_from_slice(&state.record().to_bytes())
                .map_err(|()| RadioError::InvalidParameter)?;
            Ok(ControlReply::Data(reply))
        }
        ControlRequest::SetShortfallLimit(limit) => {
            state.set_shortfall_limit(limit);
            Ok(ControlReply::Ack)
        }
        ControlRequest::InitSweep { dwell_blocks } => {
            let config = parse_sweep(payload, dwell_blocks)?;
            // reject plans the sweep loop could not run
            SweepPlan::new(config.clone())?;
            shared.set_sweep(config);
            Ok(ControlReply::Ack)
        }
        ControlRequest::SetTxFlush(enable) => {
            shared.set_tx_flush(enable);
            Ok(ControlReply::Ack)
        }
    }
}

/// Decode a sweep data stage: step width and tuning offset as LE u32,
/// a style byte, then [start, stop] MHz pairs as LE u16
fn parse_sweep(payload: &[u8], dwell_blocks: u32) -> Result<SweepConfig, RadioError> {
    if payload.len() < SWEEP_PARAMS_LEN + 4 || (payload.len() - SWEEP_PARAMS_LEN) % 4 != 0 {
        return Err(RadioError::InvalidParameter);
    }
    let count = (payload.len() - SWEEP_PARAMS_LEN) / 4;
    if count > SWEEP_MAX_RANGES {
        return Err(RadioError::InvalidParameter);
    }

    let step_hz = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
    let offset_hz = u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);
    let style = SweepStyle::from_id(payload[8]).ok_or(RadioError::InvalidParameter)?;
    if step_hz == 0 {
        return Err(RadioError::InvalidParameter);
    }

    let mut ranges = Vec::new();
    for pair in payload[SWEEP_PARAMS_LEN..].chunks_exact(4) {
        let start = u16::from_le_bytes([pair[0], pair[1]]);
        let stop = u16::from_le_bytes([pair[2], pair[3]]);
        ranges
            .push((start, stop))
            .map_err(|_| RadioError::InvalidParameter)?;
    }

    Ok(SweepConfig {
        ranges,
        dwell_blocks,
        step_hz,
        offset_hz,
        style,
    })
}
