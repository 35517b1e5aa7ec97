//! Cosinor model implementation.
//!
//! The model is implemented as small, pure functions so that the fitter and the
//! plotting code can share it without carrying fit state around.

pub mod cosine;

pub use cosine::*;
