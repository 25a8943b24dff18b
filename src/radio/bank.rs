//! Register Bank Store
//!
//! An owned table of requested and applied radio configuration values.
//! `Active` is the live target and is dirty-tracked; `Idle`/`Rx`/`Tx`
//! hold mode presets; `Applied` mirrors what the hardware currently
//! has and can only be mutated by the update engine.

use crate::types::{Bank, DirtyMask, RadioError, RegValue, Register, TransceiverMode};

/// One bank's worth of register values
type Values = [RegValue; Register::COUNT];

const UNSET_BANK: Values = [RegValue::UNSET; Register::COUNT];

/// A copy of the `Active` bank taken at the start of an update pass.
///
/// The engine derives hardware state from the copy so that a register
/// write landing mid-pass is deferred to the next pass instead of being
/// observed torn.
#[derive(Clone, Copy, Debug)]
pub struct BankSnapshot(Values);

impl BankSnapshot {
    /// Value of `register` at snapshot time
    #[must_use]
    pub fn get(&self, register: Register) -> RegValue {
        self.0[register.index()]
    }
}

/// The register bank store.
#[derive(Clone, Debug)]
pub struct RegisterFile {
    applied: Values,
    active: Values,
    idle: Values,
    rx: Values,
    tx: Values,
    dirty: DirtyMask,
}

impl RegisterFile {
    /// Create a store with every register unset in every bank
    #[must_use]
    pub const fn new() -> Self {
        Self {
            applied: UNSET_BANK,
            active: UNSET_BANK,
            idle: UNSET_BANK,
            rx: UNSET_BANK,
            tx: UNSET_BANK,
            dirty: DirtyMask::EMPTY,
        }
    }

    /// Store a register value.
    ///
    /// `Active` writes mark the register dirty; preset writes do not.
    /// `All` fans out to every preset bank plus `Active` and marks
    /// dirty. `Applied` rejects direct writes with
    /// [`RadioError::InvalidBank`].
    pub fn write(
        &mut self,
        bank: Bank,
        register: Register,
        value: RegValue,
    ) -> Result<(), RadioError> {
        let i = register.index();
        match bank {
            Bank::Applied => Err(RadioError::InvalidBank),
            Bank::Active => {
                critical_section::with(|_| {
                    self.active[i] = value;
                    self.dirty.mark(register);
                });
                Ok(())
            }
            Bank::Idle => {
                self.idle[i] = value;
                Ok(())
            }
            Bank::Rx => {
                self.rx[i] = value;
                Ok(())
            }
            Bank::Tx => {
                self.tx[i] = value;
                Ok(())
            }
            Bank::All => {
                critical_section::with(|_| {
                    self.idle[i] = value;
                    self.rx[i] = value;
                    self.tx[i] = value;
                    self.active[i] = value;
                    self.dirty.mark(register);
                });
                Ok(())
            }
        }
    }

    /// Read a register value. `All` is a write-only target and rejects
    /// reads with [`RadioError::InvalidBank`].
    pub fn read(&self, bank: Bank, register: Register) -> Result<RegValue, RadioError> {
        let i = register.index();
        match bank {
            Bank::Applied => Ok(self.applied[i]),
            Bank::Active => Ok(self.active[i]),
            Bank::Idle => Ok(self.idle[i]),
            Bank::Rx => Ok(self.rx[i]),
            Bank::Tx => Ok(self.tx[i]),
            Bank::All => Err(RadioError::InvalidBank),
        }
    }

    /// Registers written to `Active` since the last completed pass
    #[must_use]
    pub fn dirty(&self) -> DirtyMask {
        self.dirty
    }

    /// Consume the dirty mask and copy the `Active` bank, both inside
    /// one critical section so the pair is coherent. Writes racing this
    /// call land in the next pass.
    pub(crate) fn begin_pass(&mut self) -> (DirtyMask, BankSnapshot) {
        critical_section::with(|_| (self.dirty.take(), BankSnapshot(self.active)))
    }

    /// Copy a mode preset into `Active`.
    ///
    /// Only values that are set in the preset and differ from the
    /// current active value are copied (and marked dirty). The mode
    /// register itself is always stored and always marked dirty, so a
    /// switch re-derives direction-dependent state even when nothing
    /// else changed.
    pub(crate) fn load_preset(&mut self, mode: TransceiverMode) {
        critical_section::with(|_| {
            let preset = match mode {
                TransceiverMode::Rx | TransceiverMode::RxSweep => self.rx,
                TransceiverMode::Tx => self.tx,
                TransceiverMode::Off => self.idle,
            };
            for register in Register::ALL {
                let i = register.index();
                if preset[i].is_set() && preset[i] != self.active[i] {
                    self.active[i] = preset[i];
                    self.dirty.mark(register);
                }
            }
            self.active[Register::OpMode.index()] = RegValue::new(mode as u64);
            self.dirty.mark(Register::OpMode);
        });
    }

    /// Applied value of `register`
    pub(crate) fn applied(&self, register: Register) -> RegValue {
        self.applied[register.index()]
    }

    /// Record a successfully programmed value
    pub(crate) fn set_applied(&mut self, register: Register, value: RegValue) {
        self.applied[register.index()] = value;
    }

    /// Invalidate an applied value
    pub(crate) fn clear_applied(&mut self, register: Register) {
        self.applied[register.index()] = RegValue::UNSET;
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}
