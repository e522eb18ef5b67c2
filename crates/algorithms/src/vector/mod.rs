//! Vector operations
//!
//! - Buffer: circular buffers around points
//! - Polygonize: flood mask to polygons

pub mod buffer;
pub mod polygonize;

pub use buffer::{buffer_bounds, buffer_points, BufferParams};
pub use polygonize::{polygonize, PolygonizeParams, Polygonized};
