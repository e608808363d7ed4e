//! Configuration constants for paths and the image format.

mod constants;

pub use constants::*;
