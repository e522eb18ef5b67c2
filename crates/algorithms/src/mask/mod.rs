//! Binary flood mask operations
//!
//! - Components: connected-group labelling
//! - Water: permanent water from seasonality
//! - Refine: water, group size and slope suppression

pub mod components;
pub mod refine;
pub mod water;

pub use components::{label_components, Components};
pub use refine::{refine_mask, MaskRefiner, RefineParams, RefinedMask, StageCounts};
pub use water::{permanent_water, PERMANENT_WATER_MONTHS};
