//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - raw and summarized measurements (`Observation`, `SummaryPoint`)
//! - fit outputs (`CosineFit`, `Classification`, `RhythmRow`)
//! - run configuration and the saved report format (`RhythmConfig`, `RhythmFile`)

pub mod types;

pub use types::*;
