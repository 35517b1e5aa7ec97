//! `toadlight` library crate.
//!
//! The binary (`toadlight`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the rhythm fitter can be driven from other front-ends
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod rhythm;
pub mod stats;
