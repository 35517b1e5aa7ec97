//! Reporting utilities: plain-text tables for every pipeline.

pub mod format;

pub use format::*;
