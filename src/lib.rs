//! uSDR USB Peripheral Firmware Library
//!
//! Control core for an LPC43xx-based software-defined-radio USB
//! peripheral: an RF front end (mixer, VGA/LNA, synthesizer), an
//! FPGA/CPLD sample datapath, and a USB bulk streaming interface.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CONTROL LAYER                            │
//! │  Transceiver Mode Loop  │  Vendor Request Dispatch           │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   CONFIGURATION LAYER                        │
//! │  Register Bank Store  │  Update Engine  │  Mode Sequencer    │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     STREAMING LAYER                          │
//! │  Shared State Block  │  DMA/USB Admission  │  Sweep Plan     │
//! ├─────────────────────────────────────────────────────────────┤
//! │                 HARDWARE COLLABORATORS                       │
//! │  RF Front End  │  Transfer Scheduler  │  Bridge DMA  │  UI   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The two execution contexts (the sample-clocked core and the
//! control core) communicate only through the shared streaming state
//! block and the two ring buffers; every shared field has exactly one
//! writer.
//!
//! # Design Principles
//!
//! - **Type-driven design**: registers, banks and modes are enumerated
//!   types; the unset sentinel and the single-writer split are encoded
//!   in the types
//! - **Snapshot then work**: critical sections only cover the
//!   dirty-mask swap and bank copy, never hardware programming
//! - **No unsafe in application code**: hardware access lives behind
//!   collaborator traits
//! - **Explicit error handling**: all fallible operations return
//!   `Result`

#![cfg_attr(feature = "embedded", no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// System configuration and constants
pub mod config;

/// Shared types used across modules
pub mod types;

/// Hardware collaborator interfaces
///
/// Traits the control core drives the board through.
pub mod hw;

/// Radio Configuration Engine
///
/// Register bank store, update engine, and mode-switch sequencer.
pub mod radio;

/// Streaming Pipeline
///
/// Shared state block, DMA/USB admission policies, sweep plan.
pub mod stream;

/// Transceiver Mode Loop
///
/// Sequenced mode requests and the off/rx/tx/sweep run loops.
pub mod transceiver;

/// Vendor Control Protocol
///
/// USB vendor request parsing and dispatch.
pub mod protocol;

/// Prelude module for common imports
#[cfg(feature = "embedded")]
pub mod prelude {
    //! Convenient re-exports for common types and traits.

    pub use crate::config::*;
    pub use crate::types::*;

    pub use crate::hw::{RfHardware, SampleDma, TransferScheduler, UiNotifier};
    pub use crate::radio::Radio;
    pub use crate::stream::{StreamBuffers, StreamPipeline, StreamState};
    pub use crate::transceiver::{ControlShared, Transceiver};

    // Error handling
    pub use core::result::Result;

    // Logging
    pub use defmt::{debug, error, info, trace, warn};
}
