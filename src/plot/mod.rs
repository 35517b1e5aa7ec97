//! Plotting: terminal (`ascii`) and file (`svg`) renderings of rhythm fits.

pub mod ascii;
pub mod svg;

pub use ascii::*;
pub use svg::*;
