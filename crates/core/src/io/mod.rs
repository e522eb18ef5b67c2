//! I/O for rasters, ground-truth points and exported products

mod catalog;
mod delimited;
mod geojson;
mod geotiff;

pub use catalog::{Catalog, SceneEntry};
pub use delimited::{CsvPointSource, parse_points, write_table};
pub use geojson::{geometry_to_json, to_geojson, write_geojson};
pub use geotiff::{
    read_geotiff, read_geotiff_from_buffer, read_geotiff_header, write_geotiff, write_geotiff_to_buffer,
    GeoTiffHeader,
};
