//! Tests for shared types
//!
//! Register/bank identifiers, the unset sentinel, dirty-mask groups,
//! and the fixed-point sample-rate helpers.

use usdr_firmware::types::{
    sample_rate_from_hz, sample_rate_round_hz, Bank, Direction, DirtyMask, FilterPath, RadioError,
    RegValue, Register, Rotation, SampleRate, StreamError, StreamMode, TransceiverMode,
};

// ============================================================================
// RegValue Tests
// ============================================================================

#[test]
fn reg_value_unset_sentinel() {
    assert!(!RegValue::UNSET.is_set());
    assert_eq!(RegValue::UNSET.get(), None);
    assert_eq!(RegValue::UNSET.raw(), u64::MAX);
}

#[test]
fn reg_value_set() {
    let v = RegValue::new(42);
    assert!(v.is_set());
    assert_eq!(v.get(), Some(42));
}

#[test]
fn reg_value_zero_is_set() {
    // zero is a legitimate value, not the sentinel
    assert!(RegValue::new(0).is_set());
}

#[test]
fn reg_value_or_substitutes_default() {
    assert_eq!(RegValue::UNSET.or(7), 7);
    assert_eq!(RegValue::new(3).or(7), 3);
}

#[test]
fn reg_value_flag() {
    assert!(RegValue::new(1).flag(false));
    assert!(!RegValue::new(0).flag(true));
    assert!(RegValue::UNSET.flag(true));
    assert!(!RegValue::UNSET.flag(false));
}

#[test]
fn reg_value_from_bool() {
    assert_eq!(RegValue::from_bool(true).raw(), 1);
    assert_eq!(RegValue::from_bool(false).raw(), 0);
}

#[test]
fn sentinel_clear_of_value_domains() {
    // widest real values stay far below the sentinel
    let max_freq = RegValue::new(7_250_000_000);
    let max_rate = RegValue::new(sample_rate_from_hz(21_800_000).to_bits());
    assert!(max_freq.raw() < u64::MAX);
    assert!(max_rate.raw() < u64::MAX);
}

// ============================================================================
// Register / Bank Identifier Tests
// ============================================================================

#[test]
fn register_from_id_roundtrip() {
    for (i, register) in Register::ALL.iter().enumerate() {
        assert_eq!(Register::from_id(i as u8), Some(*register));
        assert_eq!(register.index(), i);
    }
}

#[test]
fn register_from_id_rejects_unknown() {
    assert_eq!(Register::from_id(Register::COUNT as u8), None);
    assert_eq!(Register::from_id(0xff), None);
}

#[test]
fn bank_from_id() {
    assert_eq!(Bank::from_id(0), Some(Bank::Applied));
    assert_eq!(Bank::from_id(1), Some(Bank::Active));
    assert_eq!(Bank::from_id(2), Some(Bank::Idle));
    assert_eq!(Bank::from_id(3), Some(Bank::Rx));
    assert_eq!(Bank::from_id(4), Some(Bank::Tx));
    assert_eq!(Bank::from_id(5), Some(Bank::All));
    assert_eq!(Bank::from_id(6), None);
}

// ============================================================================
// DirtyMask Tests
// ============================================================================

#[test]
fn dirty_mask_mark_and_take() {
    let mut mask = DirtyMask::EMPTY;
    assert!(mask.is_empty());

    mask.mark(Register::SampleRate);
    assert!(mask.contains(Register::SampleRate));
    assert!(!mask.contains(Register::RfFrequency));

    let taken = mask.take();
    assert!(mask.is_empty());
    assert!(taken.contains(Register::SampleRate));
}

#[test]
fn dirty_mask_groups() {
    let mut mask = DirtyMask::EMPTY;
    mask.mark(Register::SampleRate);
    assert!(mask.intersects(DirtyMask::RATE));
    assert!(!mask.intersects(DirtyMask::FREQUENCY));

    let mut mask = DirtyMask::EMPTY;
    mask.mark(Register::Rotation);
    // rotation feeds the bandwidth derivation
    assert!(mask.intersects(DirtyMask::BANDWIDTH));

    let mut mask = DirtyMask::EMPTY;
    mask.mark(Register::OpMode);
    // the mode register routes gain
    assert!(mask.intersects(DirtyMask::GAIN));
}

// ============================================================================
// Mode / Enum Tests
// ============================================================================

#[test]
fn transceiver_mode_ids() {
    assert_eq!(TransceiverMode::from_id(0), Some(TransceiverMode::Off));
    assert_eq!(TransceiverMode::from_id(1), Some(TransceiverMode::Rx));
    assert_eq!(TransceiverMode::from_id(2), Some(TransceiverMode::Tx));
    assert_eq!(TransceiverMode::from_id(5), Some(TransceiverMode::RxSweep));
    assert_eq!(TransceiverMode::from_id(3), None);
    assert_eq!(TransceiverMode::from_id(4), None);
}

#[test]
fn transceiver_mode_direction() {
    assert_eq!(TransceiverMode::Off.direction(), Direction::Off);
    assert_eq!(TransceiverMode::Rx.direction(), Direction::Rx);
    assert_eq!(TransceiverMode::RxSweep.direction(), Direction::Rx);
    assert_eq!(TransceiverMode::Tx.direction(), Direction::Tx);
}

#[test]
fn filter_path_ids() {
    assert_eq!(FilterPath::from_id(0), Some(FilterPath::Bypass));
    assert_eq!(FilterPath::from_id(1), Some(FilterPath::LowPass));
    assert_eq!(FilterPath::from_id(2), Some(FilterPath::HighPass));
    assert_eq!(FilterPath::from_id(3), None);
}

#[test]
fn rotation_activity() {
    assert!(!Rotation::Off.is_active());
    assert!(Rotation::Up.is_active());
    assert!(Rotation::Down.is_active());
}

#[test]
fn stream_mode_ids() {
    assert_eq!(StreamMode::from_id(0), Some(StreamMode::Idle));
    assert_eq!(StreamMode::from_id(1), Some(StreamMode::Wait));
    assert_eq!(StreamMode::from_id(2), Some(StreamMode::Rx));
    assert_eq!(StreamMode::from_id(3), Some(StreamMode::TxStart));
    assert_eq!(StreamMode::from_id(4), Some(StreamMode::TxRun));
    assert_eq!(StreamMode::from_id(5), None);
}

#[test]
fn stream_error_ids() {
    assert_eq!(StreamError::from_id(0), Some(StreamError::None));
    assert_eq!(StreamError::from_id(3), Some(StreamError::ShortfallLimit));
    assert_eq!(StreamError::from_id(9), None);
}

// ============================================================================
// Sample Rate Helper Tests
// ============================================================================

#[test]
fn sample_rate_fixed_point_encoding() {
    let rate = sample_rate_from_hz(10_000_000);
    assert_eq!(rate.to_bits(), 10_000_000u64 << 24);
    assert_eq!(sample_rate_round_hz(rate), 10_000_000);
}

#[test]
fn sample_rate_rounds_to_nearest_hz() {
    // exactly half an Hz rounds up
    let half = SampleRate::from_bits((1_000u64 << 24) | (1 << 23));
    assert_eq!(sample_rate_round_hz(half), 1_001);

    let just_under = SampleRate::from_bits((1_000u64 << 24) | ((1 << 23) - 1));
    assert_eq!(sample_rate_round_hz(just_under), 1_000);
}

#[test]
fn error_display() {
    assert_eq!(
        format!("{}", RadioError::InvalidBank),
        "invalid register bank"
    );
    assert_eq!(format!("{}", RadioError::InvalidRegister), "invalid register");
}
