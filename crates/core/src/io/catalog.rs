//! File-backed scene catalog
//!
//! A JSON manifest lists GeoTIFF scenes with their acquisition metadata and
//! the auxiliary layers. Relative paths resolve against the manifest's
//! directory. The manifest `crs` applies to files without a CRS of their own.
//!
//! A query reads only the georeferencing of each matching file to test it
//! against the region; pixels are decoded for overlapping scenes only.
//!
//! ```json
//! {
//!   "crs": "EPSG:32646",
//!   "scenes": [
//!     { "id": "S1A_IW_GRDH_20240705", "date": "2024-07-05", "direction": "ASCENDING",
//!       "track": 114, "instrument_mode": "IW", "resolution": 10.0,
//!       "bands": { "VH": "s1/20240705_vh.tif" } }
//!   ],
//!   "auxiliary": { "water_seasonality": "jrc_seasonality.tif", "elevation": "dem.tif" }
//! }
//! ```

use crate::crs::CRS;
use crate::error::Result;
use crate::io::geotiff::{read_geotiff, read_geotiff_header};
use crate::raster::{Image, Raster};
use crate::scene::{OrbitDirection, Scene, TimeSeries};
use crate::store::{AuxiliaryLayer, RasterStore, SceneQuery};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
struct Manifest {
    #[serde(default)]
    crs: Option<String>,
    #[serde(default)]
    scenes: Vec<SceneEntry>,
    #[serde(default)]
    auxiliary: BTreeMap<String, PathBuf>,
}

/// Catalog metadata of one scene
#[derive(Debug, Clone, Deserialize)]
pub struct SceneEntry {
    pub id: String,
    pub date: NaiveDate,
    pub direction: OrbitDirection,
    pub track: u32,
    #[serde(default = "default_mode")]
    pub instrument_mode: String,
    #[serde(default = "default_resolution")]
    pub resolution: f64,
    /// Polarization name to raster path
    pub bands: BTreeMap<String, PathBuf>,
}

fn default_mode() -> String {
    "IW".to_string()
}

fn default_resolution() -> f64 {
    10.0
}

impl SceneEntry {
    fn matches(&self, query: &SceneQuery<'_>) -> bool {
        self.instrument_mode.eq_ignore_ascii_case(query.sensor)
            && self.bands.contains_key(query.polarization)
            && (self.resolution - query.resolution).abs() < 1e-6
            && query.range.contains(self.date)
            && self.direction == query.direction
            && self.track == query.track
    }
}

/// Scenes and auxiliary layers described by a JSON manifest
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
    crs: Option<CRS>,
    scenes: Vec<SceneEntry>,
    auxiliary: BTreeMap<String, PathBuf>,
}

impl Catalog {
    /// Load a manifest file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_json(&text, root)
    }

    /// Parse a manifest whose relative paths resolve against `root`
    pub fn from_json(text: &str, root: impl Into<PathBuf>) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(text)?;
        Ok(Self {
            root: root.into(),
            crs: manifest.crs.as_deref().map(CRS::parse),
            scenes: manifest.scenes,
            auxiliary: manifest.auxiliary,
        })
    }

    pub fn entries(&self) -> &[SceneEntry] {
        &self.scenes
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn load(&self, path: &Path) -> Result<Raster<f64>> {
        let mut raster = read_geotiff(self.resolve(path))?;
        if raster.crs().is_none() {
            raster.set_crs(self.crs.clone());
        }
        Ok(raster)
    }
}

impl RasterStore for Catalog {
    fn query(&self, query: &SceneQuery<'_>) -> Result<TimeSeries> {
        let mut scenes = Vec::new();
        for entry in self.scenes.iter().filter(|e| e.matches(query)) {
            let path = &entry.bands[query.polarization];
            let header = read_geotiff_header(self.resolve(path))?;
            let crs = header.crs.clone().or_else(|| self.crs.clone());
            let region = query.region.to_crs(crs.as_ref())?;
            if !region.intersects_bounds(header.bounds()) {
                continue;
            }
            let raster = self.load(path)?;
            scenes.push(Scene {
                id: entry.id.clone(),
                date: entry.date,
                direction: entry.direction,
                track: entry.track,
                image: Image::single(query.polarization, raster),
            });
        }
        Ok(TimeSeries::new(scenes))
    }

    fn auxiliary_layer(&self, layer: AuxiliaryLayer) -> Result<Option<Raster<f64>>> {
        self.auxiliary
            .get(layer.name())
            .map(|path| self.load(path))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::geotiff::write_geotiff;
    use crate::raster::GeoTransform;
    use crate::scene::DateRange;
    use crate::vector::Region;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_query_filters_metadata_and_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let mut tile = Raster::filled(4, 4, 0.03);
        tile.set_transform(GeoTransform::new(0.0, 40.0, 10.0, -10.0));
        write_geotiff(&tile, dir.path().join("a.tif")).unwrap();

        let manifest = r#"{
            "crs": "EPSG:32646",
            "scenes": [
                { "id": "a", "date": "2024-07-05", "direction": "ASCENDING", "track": 114,
                  "bands": { "VH": "a.tif" } },
                { "id": "b", "date": "2024-07-05", "direction": "ASCENDING", "track": 114,
                  "instrument_mode": "EW", "bands": { "VH": "a.tif" } },
                { "id": "c", "date": "2024-07-05", "direction": "ASCENDING", "track": 114,
                  "bands": { "VV": "a.tif" } },
                { "id": "d", "date": "2024-07-05", "direction": "DESCENDING", "track": 150,
                  "bands": { "VH": "a.tif" } }
            ],
            "auxiliary": { "water_seasonality": "a.tif" }
        }"#;
        let catalog = Catalog::from_json(manifest, dir.path()).unwrap();

        let inside = Region::from_bounds("aoi", (5.0, 5.0, 30.0, 30.0));
        let query = SceneQuery {
            sensor: "IW",
            polarization: "VH",
            resolution: 10.0,
            region: &inside,
            range: DateRange::new(date("2024-07-01"), date("2024-07-10")).unwrap(),
            direction: OrbitDirection::Ascending,
            track: 114,
        };
        let series = catalog.query(&query).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.scenes()[0].id, "a");
        assert_eq!(series.scenes()[0].image.band_names(), vec!["VH"]);
        assert_eq!(
            series.scenes()[0].image.single_band().unwrap().raster.crs(),
            Some(&CRS::from_epsg(32646))
        );

        let outside = Region::from_bounds("far", (500.0, 500.0, 600.0, 600.0));
        let query = SceneQuery { region: &outside, ..query };
        assert!(catalog.query(&query).unwrap().is_empty());

        assert!(catalog.auxiliary_layer(AuxiliaryLayer::WaterSeasonality).unwrap().is_some());
        assert!(catalog.auxiliary_layer(AuxiliaryLayer::Slope).unwrap().is_none());
    }

    fn query_for<'a>(region: &'a Region) -> SceneQuery<'a> {
        SceneQuery {
            sensor: "IW",
            polarization: "VH",
            resolution: 10.0,
            region,
            range: DateRange::new(date("2024-07-01"), date("2024-07-10")).unwrap(),
            direction: OrbitDirection::Ascending,
            track: 114,
        }
    }

    #[test]
    fn test_lonlat_region_selects_utm_tile() {
        let dir = tempfile::tempdir().unwrap();
        let (x, y) = crate::crs::wgs84_to_utm(90.4, 23.8, 46, true);
        let mut tile = Raster::filled(10, 10, 0.03);
        tile.set_transform(GeoTransform::new(x, y, 10.0, -10.0));
        tile.set_crs(Some(CRS::from_epsg(32646)));
        write_geotiff(&tile, dir.path().join("a.tif")).unwrap();

        let manifest = r#"{ "scenes": [
            { "id": "a", "date": "2024-07-05", "direction": "ASCENDING", "track": 114,
              "bands": { "VH": "a.tif" } } ] }"#;
        let catalog = Catalog::from_json(manifest, dir.path()).unwrap();

        let around = Region::from_bounds("aoi", (90.39, 23.79, 90.41, 23.81)).with_crs(Some(CRS::wgs84()));
        assert_eq!(catalog.query(&query_for(&around)).unwrap().len(), 1);

        let elsewhere = Region::from_bounds("far", (91.0, 24.5, 91.1, 24.6)).with_crs(Some(CRS::wgs84()));
        assert!(catalog.query(&query_for(&elsewhere)).unwrap().is_empty());
    }

    #[test]
    fn test_query_decodes_only_overlapping_tiles() {
        use tiff::encoder::{colortype::Gray64, TiffEncoder};
        use tiff::tags::Tag;

        // Georeferenced tile whose pixel type the raster reader rejects
        let dir = tempfile::tempdir().unwrap();
        {
            let file = fs::File::create(dir.path().join("u64.tif")).unwrap();
            let mut encoder = TiffEncoder::new(std::io::BufWriter::new(file)).unwrap();
            let mut image = encoder.new_image::<Gray64>(4, 4).unwrap();
            image
                .encoder()
                .write_tag(Tag::from_u16_exhaustive(33550), &[10.0f64, 10.0, 0.0][..])
                .unwrap();
            image
                .encoder()
                .write_tag(Tag::from_u16_exhaustive(33922), &[0.0f64, 0.0, 0.0, 0.0, 40.0, 0.0][..])
                .unwrap();
            image.write_data(&[7u64; 16][..]).unwrap();
        }

        let manifest = r#"{ "crs": "EPSG:32646", "scenes": [
            { "id": "u", "date": "2024-07-05", "direction": "ASCENDING", "track": 114,
              "bands": { "VH": "u64.tif" } } ] }"#;
        let catalog = Catalog::from_json(manifest, dir.path()).unwrap();

        let far = Region::from_bounds("far", (500.0, 500.0, 600.0, 600.0));
        assert!(catalog.query(&query_for(&far)).unwrap().is_empty());

        let over = Region::from_bounds("aoi", (5.0, 5.0, 30.0, 30.0));
        assert!(matches!(
            catalog.query(&query_for(&over)),
            Err(crate::error::Error::UnsupportedDataType(_))
        ));
    }
}
