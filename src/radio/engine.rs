//! Radio Update Engine
//!
//! Converts the dirty mask plus the `Active` bank into hardware
//! programming calls. Stages run in a fixed order because later
//! derivations consume earlier applied values: sample rate, then
//! frequency, bandwidth, gain, the switch toggles, and finally the RF
//! path direction. Every stage is idempotent against the `Applied`
//! bank, so a pass with nothing dirty makes no hardware calls.

use crate::config::{
    AFE_RATE_CEILING, BASEBAND_BW_MAX_HZ, BASEBAND_BW_MIN_HZ, DEFAULT_BB_GAIN_DB,
    DEFAULT_FREQUENCY_HZ, DEFAULT_IF_GAIN_DB, DEFAULT_SAMPLE_RATE_HZ, IF_MAX_HZ, IF_MIN_HZ,
    LO_MAX_HZ, LO_MIN_HZ, MAX_BB_GAIN_DB, MAX_FREQUENCY_HZ, MAX_IF_GAIN_DB, MAX_MCU_RATE,
    MIN_MCU_RATE, NARROWBAND_THRESHOLD_HZ, RESAMPLE_RATIO_LIMIT,
};
use crate::hw::{RateCommit, RfHardware, Tuning, UiNotifier};
use crate::radio::bank::{BankSnapshot, RegisterFile};
use crate::types::{
    sample_rate_from_hz, sample_rate_round_hz, Bank, Direction, DirtyMask, FilterPath, RadioError,
    RegValue, Register, Rotation, SampleRate, TransceiverMode,
};

/// The radio configuration engine.
///
/// Owns the register bank store and the hardware/UI collaborators.
/// `write` and `read` are the only mutation entry points; every
/// successful write runs an update pass (write-through).
pub struct Radio<H: RfHardware, U: UiNotifier> {
    regs: RegisterFile,
    hw: H,
    ui: U,
}

impl<H: RfHardware, U: UiNotifier> Radio<H, U> {
    /// Create an engine over the given collaborators with an empty
    /// register store
    pub fn new(hw: H, ui: U) -> Self {
        Self {
            regs: RegisterFile::new(),
            hw,
            ui,
        }
    }

    /// Store a register value and run an update pass.
    ///
    /// Returns whether the pass changed any hardware state. Writes to
    /// preset banks store without touching hardware until the preset is
    /// loaded by a mode switch.
    pub fn write(
        &mut self,
        bank: Bank,
        register: Register,
        value: RegValue,
    ) -> Result<bool, RadioError> {
        self.regs.write(bank, register, value)?;
        self.update()
    }

    /// Read a register value
    pub fn read(&self, bank: Bank, register: Register) -> Result<RegValue, RadioError> {
        self.regs.read(bank, register)
    }

    /// Load the preset bank for `mode` into `Active` and run an update
    /// pass. The mode register is always re-derived, even when no
    /// preset value differed.
    pub fn switch_mode(&mut self, mode: TransceiverMode) -> Result<bool, RadioError> {
        self.regs.load_preset(mode);
        self.update()
    }

    /// Run one update pass: snapshot the dirty mask and the `Active`
    /// bank atomically, then derive and program whatever changed.
    ///
    /// Returns whether any hardware call was made.
    pub fn update(&mut self) -> Result<bool, RadioError> {
        let (dirty, snap) = self.regs.begin_pass();
        if dirty.is_empty() {
            return Ok(false);
        }

        let rate_changed = self.apply_sample_rate(&snap, dirty)?;
        let freq_changed = self.apply_frequency(&snap, dirty)?;
        let bw_changed = self.apply_bandwidth(&snap, dirty, rate_changed)?;
        let gain_changed = self.apply_gain(&snap, dirty)?;
        let switch_changed = self.apply_switches(&snap, dirty)?;
        let dir_changed = self.apply_direction(&snap, dirty)?;

        let changed = rate_changed
            || freq_changed
            || bw_changed
            || gain_changed
            || switch_changed
            || dir_changed;
        self.ui.update_done(changed);
        Ok(changed)
    }

    /// The hardware collaborator
    pub fn hw(&self) -> &H {
        &self.hw
    }

    /// The hardware collaborator, mutable (board glue and tests)
    pub fn hw_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    /// The UI collaborator
    pub fn ui(&self) -> &U {
        &self.ui
    }

    /// Currently applied transceiver mode
    #[must_use]
    pub fn mode(&self) -> TransceiverMode {
        self.regs
            .applied(Register::OpMode)
            .get()
            .and_then(|v| TransceiverMode::from_id(v as u16))
            .unwrap_or_default()
    }

    /// Currently applied RF path direction
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.mode().direction()
    }

    /// Applied analog front-end clock rate
    #[must_use]
    pub fn afe_sample_rate(&self) -> SampleRate {
        SampleRate::from_bits(
            self.regs
                .applied(Register::SampleRate)
                .or(sample_rate_from_hz(DEFAULT_SAMPLE_RATE_HZ).to_bits()),
        )
    }

    /// Applied RX decimation exponent; the datapath reads this at
    /// streaming startup
    #[must_use]
    pub fn rx_decimation_log2(&self) -> u8 {
        self.regs.applied(Register::RxResampleRatio).or(0) as u8
    }

    /// Host-visible sample rate after decimation
    #[must_use]
    pub fn host_sample_rate(&self) -> SampleRate {
        SampleRate::from_bits(self.afe_sample_rate().to_bits() >> self.rx_decimation_log2())
    }

    /// Active digital rotation; the datapath reads this at streaming
    /// startup
    #[must_use]
    pub fn rotation(&self) -> Rotation {
        self.regs
            .read(Bank::Active, Register::Rotation)
            .ok()
            .and_then(|v| v.get())
            .and_then(|v| Rotation::from_id(v as u8))
            .unwrap_or_default()
    }

    fn snapshot_mode(snap: &BankSnapshot) -> TransceiverMode {
        snap.get(Register::OpMode)
            .get()
            .and_then(|v| TransceiverMode::from_id(v as u16))
            .unwrap_or_default()
    }

    /// Stage 1: sample rate and resampling ratio.
    ///
    /// The requested rate is clamped to the datapath limits, the RX
    /// decimation exponent is derived by doubling the front-end clock
    /// toward its ceiling, and the clock generator is probed dry-run
    /// first so it is only reprogrammed when the achievable rate
    /// actually moved.
    fn apply_sample_rate(
        &mut self,
        snap: &BankSnapshot,
        dirty: DirtyMask,
    ) -> Result<bool, RadioError> {
        if !dirty.intersects(DirtyMask::RATE) {
            return Ok(false);
        }

        let requested = SampleRate::from_bits(
            snap.get(Register::SampleRate)
                .or(sample_rate_from_hz(DEFAULT_SAMPLE_RATE_HZ).to_bits()),
        );
        let host = requested.clamp(MIN_MCU_RATE, MAX_MCU_RATE);

        let ratio_limit = snap
            .get(Register::RxResampleRatio)
            .or(u64::from(RESAMPLE_RATIO_LIMIT))
            .min(u64::from(RESAMPLE_RATIO_LIMIT)) as u8;
        let rx_ratio = afe_ratio_log2(host, ratio_limit);
        let tx_ratio: u8 = 0; // TX runs the front end at the host rate

        let afe = SampleRate::from_bits(host.to_bits() << rx_ratio);
        let achievable = self.hw.set_sample_rate(afe, RateCommit::DryRun)?;

        let clock_changed =
            self.regs.applied(Register::SampleRate) != RegValue::new(achievable.to_bits());
        let applied_rate = if clock_changed {
            let programmed = self.hw.set_sample_rate(afe, RateCommit::Program)?;
            self.regs
                .set_applied(Register::SampleRate, RegValue::new(programmed.to_bits()));
            programmed
        } else {
            achievable
        };

        let ratio_changed = self.regs.applied(Register::RxResampleRatio)
            != RegValue::new(u64::from(rx_ratio))
            || self.regs.applied(Register::TxResampleRatio) != RegValue::new(u64::from(tx_ratio));
        if ratio_changed {
            self.regs
                .set_applied(Register::RxResampleRatio, RegValue::new(u64::from(rx_ratio)));
            self.regs
                .set_applied(Register::TxResampleRatio, RegValue::new(u64::from(tx_ratio)));
        }

        if clock_changed || ratio_changed {
            let host_rate = SampleRate::from_bits(applied_rate.to_bits() >> rx_ratio);
            self.ui.sample_rate(sample_rate_round_hz(host_rate));
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Stage 2: tuning.
    ///
    /// When all three explicit registers are set they take precedence
    /// and the automatic RF frequency is invalidated; otherwise the RF
    /// frequency (or its default, when nothing was ever applied) drives
    /// the tuning collaborator and the explicit entries are
    /// invalidated. The two models never coexist in `Applied`.
    fn apply_frequency(
        &mut self,
        snap: &BankSnapshot,
        dirty: DirtyMask,
    ) -> Result<bool, RadioError> {
        if !dirty.intersects(DirtyMask::FREQUENCY) {
            return Ok(false);
        }

        let if_v = snap.get(Register::IfFrequency);
        let lo_v = snap.get(Register::LoFrequency);
        let path_v = snap.get(Register::FilterPath);

        // The explicit model drives the pass when its registers were
        // just written, or when it is the model currently applied; a
        // fresh RF-frequency write always selects the automatic model.
        let explicit_set = if_v.is_set() && lo_v.is_set() && path_v.is_set();
        let explicit_dirty = dirty.contains(Register::IfFrequency)
            || dirty.contains(Register::LoFrequency)
            || dirty.contains(Register::FilterPath);
        let explicit_applied = self.regs.applied(Register::IfFrequency).is_set();
        let rf_dirty = dirty.contains(Register::RfFrequency);

        if explicit_set && (explicit_dirty || explicit_applied) && !rf_dirty {
            let differs = self.regs.applied(Register::IfFrequency) != if_v
                || self.regs.applied(Register::LoFrequency) != lo_v
                || self.regs.applied(Register::FilterPath) != path_v;
            if !differs {
                return Ok(false);
            }

            let path = u8::try_from(path_v.raw())
                .ok()
                .and_then(FilterPath::from_id)
                .ok_or(RadioError::InvalidParameter)?;
            let if_hz = if_v.raw();
            let lo_hz = lo_v.raw();
            if !(IF_MIN_HZ..=IF_MAX_HZ).contains(&if_hz) {
                return Err(RadioError::InvalidParameter);
            }
            if path != FilterPath::Bypass && !(LO_MIN_HZ..=LO_MAX_HZ).contains(&lo_hz) {
                return Err(RadioError::InvalidParameter);
            }

            self.hw.set_frequency(Tuning::Explicit { if_hz, lo_hz, path })?;
            self.regs.set_applied(Register::IfFrequency, if_v);
            self.regs.set_applied(Register::LoFrequency, lo_v);
            self.regs.set_applied(Register::FilterPath, path_v);
            self.regs.clear_applied(Register::RfFrequency);
            return Ok(true);
        }

        let applied_rf = self.regs.applied(Register::RfFrequency);
        if snap.get(Register::RfFrequency).is_set() || !applied_rf.is_set() {
            let hz = snap.get(Register::RfFrequency).or(DEFAULT_FREQUENCY_HZ);
            if RegValue::new(hz) != applied_rf {
                if hz > MAX_FREQUENCY_HZ {
                    return Err(RadioError::InvalidParameter);
                }
                self.hw.set_frequency(Tuning::Auto { hz })?;
                self.regs.set_applied(Register::RfFrequency, RegValue::new(hz));
                self.regs.clear_applied(Register::IfFrequency);
                self.regs.clear_applied(Register::LoFrequency);
                self.regs.clear_applied(Register::FilterPath);
                self.ui.frequency(hz);
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Stage 3: baseband filter bandwidth.
    ///
    /// Uses the per-direction override when set, otherwise 75% of the
    /// host sample rate, doubled while a digital rotation is active
    /// (the rotation parks the signal a quarter rate off center).
    fn apply_bandwidth(
        &mut self,
        snap: &BankSnapshot,
        dirty: DirtyMask,
        rate_changed: bool,
    ) -> Result<bool, RadioError> {
        if !dirty.intersects(DirtyMask::BANDWIDTH) && !rate_changed {
            return Ok(false);
        }

        let mode = Self::snapshot_mode(snap);
        let override_reg = match mode.direction() {
            Direction::Tx => Register::TxBandwidth,
            _ => Register::RxBandwidth,
        };
        let rotation = snap
            .get(Register::Rotation)
            .get()
            .and_then(|v| Rotation::from_id(v as u8))
            .unwrap_or_default();

        let hz = match snap.get(override_reg).get() {
            Some(v) => u32::try_from(v).map_err(|_| RadioError::InvalidParameter)?,
            None => {
                let host_hz = sample_rate_round_hz(self.host_sample_rate());
                let mut auto = (u64::from(host_hz) * 3 / 4) as u32;
                if rotation.is_active() {
                    auto = auto.saturating_mul(2);
                }
                auto
            }
        };
        let hz = hz.clamp(BASEBAND_BW_MIN_HZ, BASEBAND_BW_MAX_HZ);

        let prev = self.regs.applied(override_reg);
        if prev == RegValue::new(u64::from(hz)) {
            return Ok(false);
        }

        self.hw.set_bandwidth(hz)?;

        let narrow = hz <= NARROWBAND_THRESHOLD_HZ;
        let prev_narrow = prev.get().map(|v| v as u32 <= NARROWBAND_THRESHOLD_HZ);
        if prev_narrow != Some(narrow) {
            match self.hw.set_narrowband_filter(narrow) {
                Ok(()) => {}
                // a missing narrowband filter only matters when it
                // would have to engage
                Err(RadioError::UnsupportedOperation) if !narrow => {}
                Err(e) => return Err(e),
            }
        }

        self.regs.set_applied(override_reg, RegValue::new(u64::from(hz)));
        if let Some(r) = snap.get(Register::Rotation).get() {
            self.regs.set_applied(Register::Rotation, RegValue::new(r));
        }
        self.ui.bandwidth(hz);
        Ok(true)
    }

    /// Stage 4: gains.
    ///
    /// The RF amplifier enable is routed by direction and shares one
    /// control line, so programming one side forces the applied value
    /// of the other side to disabled. IF and baseband gains are
    /// independent and defaulted when unset.
    fn apply_gain(&mut self, snap: &BankSnapshot, dirty: DirtyMask) -> Result<bool, RadioError> {
        if !dirty.intersects(DirtyMask::GAIN) {
            return Ok(false);
        }

        let mode = Self::snapshot_mode(snap);
        let direction = mode.direction();
        let mut changed = false;

        let (own, other) = match direction {
            Direction::Tx => (Register::TxAmp, Register::RxAmp),
            _ => (Register::RxAmp, Register::TxAmp),
        };
        let want = snap.get(own).flag(false);
        if self.regs.applied(own) != RegValue::from_bool(want)
            || self.regs.applied(other) != RegValue::from_bool(false)
        {
            self.hw.set_rf_gain(direction, want)?;
            self.regs.set_applied(own, RegValue::from_bool(want));
            self.regs.set_applied(other, RegValue::from_bool(false));
            self.ui.rf_gain(direction, want);
            changed = true;
        }

        let if_db = snap.get(Register::IfGain).or(u64::from(DEFAULT_IF_GAIN_DB));
        if if_db > u64::from(MAX_IF_GAIN_DB) {
            return Err(RadioError::InvalidParameter);
        }
        if self.regs.applied(Register::IfGain) != RegValue::new(if_db) {
            self.hw.set_if_gain(if_db as u8)?;
            self.regs.set_applied(Register::IfGain, RegValue::new(if_db));
            self.ui.if_gain(if_db as u8);
            changed = true;
        }

        let bb_db = snap
            .get(Register::BasebandGain)
            .or(u64::from(DEFAULT_BB_GAIN_DB));
        if bb_db > u64::from(MAX_BB_GAIN_DB) {
            return Err(RadioError::InvalidParameter);
        }
        if self.regs.applied(Register::BasebandGain) != RegValue::new(bb_db) {
            self.hw.set_baseband_gain(bb_db as u8)?;
            self.regs
                .set_applied(Register::BasebandGain, RegValue::new(bb_db));
            self.ui.baseband_gain(bb_db as u8);
            changed = true;
        }

        Ok(changed)
    }

    /// Stage 5: bias tee, trigger and DC block toggles, each an
    /// independent changed-since-applied dispatch.
    fn apply_switches(
        &mut self,
        snap: &BankSnapshot,
        dirty: DirtyMask,
    ) -> Result<bool, RadioError> {
        let mut changed = false;

        if dirty.contains(Register::BiasTee) {
            let on = snap.get(Register::BiasTee).flag(false);
            if self.regs.applied(Register::BiasTee) != RegValue::from_bool(on) {
                self.hw.set_bias_tee(on)?;
                self.regs.set_applied(Register::BiasTee, RegValue::from_bool(on));
                changed = true;
            }
        }

        if dirty.contains(Register::Trigger) {
            let on = snap.get(Register::Trigger).flag(false);
            if self.regs.applied(Register::Trigger) != RegValue::from_bool(on) {
                self.hw.set_trigger(on)?;
                self.regs.set_applied(Register::Trigger, RegValue::from_bool(on));
                changed = true;
            }
        }

        if dirty.contains(Register::DcBlock) {
            let on = snap.get(Register::DcBlock).flag(true);
            if self.regs.applied(Register::DcBlock) != RegValue::from_bool(on) {
                self.hw.set_dc_block(on)?;
                self.regs.set_applied(Register::DcBlock, RegValue::from_bool(on));
                changed = true;
            }
        }

        Ok(changed)
    }

    /// Stage 6: RF path direction.
    ///
    /// Dispatched whenever the mode register is dirty, without a
    /// changed-since-applied check: a mode switch must re-route the
    /// path even when the mode value itself did not change. Runs last
    /// so the path comes up with every other parameter consistent.
    fn apply_direction(
        &mut self,
        snap: &BankSnapshot,
        dirty: DirtyMask,
    ) -> Result<bool, RadioError> {
        if !dirty.contains(Register::OpMode) {
            return Ok(false);
        }

        let mode = Self::snapshot_mode(snap);
        let direction = mode.direction();
        self.hw.set_direction(direction)?;
        self.regs
            .set_applied(Register::OpMode, RegValue::new(mode as u64));
        self.ui.direction(direction);
        self.ui.mode(mode);
        Ok(true)
    }
}

/// Decimation exponent for a host rate: double the front-end clock
/// until the next doubling would pass the ceiling, or the requested
/// maximum ratio is reached.
fn afe_ratio_log2(host: SampleRate, max_ratio: u8) -> u8 {
    let ceiling = AFE_RATE_CEILING.to_bits();
    let mut ratio = 0u8;
    let mut afe = host.to_bits();
    while ratio < max_ratio && (afe << 1) <= ceiling {
        afe <<= 1;
        ratio += 1;
    }
    ratio
}
