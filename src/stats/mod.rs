//! Classical tests for the behavior, survival and hormone sheets.

pub mod anova;
pub mod regression;
pub mod survival;
pub mod tukey;

pub use anova::*;
pub use regression::*;
pub use survival::*;
pub use tukey::*;
