//! CAN log file formats
//!
//! Recorded bus traffic can be replayed through the engine in place of a live
//! adapter.

pub mod candump;

pub use candump::{CandumpFrameIterator, CandumpParser};
