//! Terrain analysis algorithms
//!
//! - Slope: rate of change of elevation, in degrees

mod slope;

pub use slope::{slope, Slope, SlopeParams};
