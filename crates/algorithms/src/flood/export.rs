//! Export boundary for flood results
//!
//! Polygons leave as one GeoJSON unit per result named
//! `<region>-Floods-<date>-S1-<DIRECTION>`; zonal batches leave as CSV units
//! named `flood_analysis_batch_<n>`, grouped in a folder named after the
//! result.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use chrono::NaiveDate;
use tracing::debug;
use sarflood_core::crs::CRS;
use sarflood_core::io::{write_geojson, write_table};
use sarflood_core::scene::OrbitDirection;
use sarflood_core::vector::{AttributeValue, FeatureCollection};
use sarflood_core::{Error, Result};
use crate::maybe_rayon::*;
use crate::statistics::{ZonalBatch, ZONAL_COLUMNS};

/// Name of the vector unit of one flood result
pub fn export_name(region: &str, date: NaiveDate, direction: OrbitDirection) -> String {
    format!("{}-Floods-{}-S1-{}", region, date.format("%Y-%m-%d"), direction.as_str())
}

/// Name of the table unit of one zonal batch
pub fn batch_table_name(batch_number: usize) -> String {
    format!("flood_analysis_batch_{}", batch_number)
}

/// Destination of exported units
///
/// A unit is either written completely or not at all.
pub trait ExportSink: Sync {
    fn write_features(&self, name: &str, features: &FeatureCollection, crs: Option<&CRS>) -> Result<()>;

    fn write_table(&self, folder: &str, name: &str, columns: &[&str], rows: &[Vec<AttributeValue>]) -> Result<()>;
}

/// Export every batch of one result into its folder
///
/// Batches are written independently. Returns the number and error of each
/// batch that could not be written, in batch order.
pub fn export_batches(sink: &dyn ExportSink, folder: &str, batches: &[ZonalBatch]) -> Vec<(usize, Error)> {
    batches
        .into_par_iter()
        .filter_map(|batch| {
            let rows: Vec<Vec<AttributeValue>> = batch.records.iter().map(|r| r.to_row()).collect();
            sink.write_table(folder, &batch_table_name(batch.number), &ZONAL_COLUMNS, &rows)
                .err()
                .map(|e| (batch.number, e))
        })
        .collect()
}

/// Writes units as files below a root directory
#[derive(Debug, Clone)]
pub struct DirectoryExporter {
    root: PathBuf,
}

impl DirectoryExporter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn features_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.geojson", name))
    }

    pub fn table_path(&self, folder: &str, name: &str) -> PathBuf {
        self.root.join(folder).join(format!("{}.csv", name))
    }
}

impl ExportSink for DirectoryExporter {
    fn write_features(&self, name: &str, features: &FeatureCollection, crs: Option<&CRS>) -> Result<()> {
        let path = self.features_path(name);
        write_atomic(&path, |w| write_geojson(w, features, crs))?;
        debug!(path = %path.display(), features = features.len(), "wrote features");
        Ok(())
    }

    fn write_table(&self, folder: &str, name: &str, columns: &[&str], rows: &[Vec<AttributeValue>]) -> Result<()> {
        let path = self.table_path(folder, name);
        write_atomic(&path, |w| write_table(w, columns, rows))?;
        debug!(path = %path.display(), rows = rows.len(), "wrote table");
        Ok(())
    }
}

/// Write through `{path}.tmp`, then rename into place
///
/// On failure the temporary file is removed and any earlier file at `path`
/// is left untouched.
fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&File>) -> Result<()>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::InvalidInput(format!("export path has no file name: {}", path.display())))?;
    let tmp_path = path.with_file_name(format!("{}.tmp", file_name.to_string_lossy()));

    let result = File::create(&tmp_path).map_err(Error::from).and_then(|file| {
        let mut writer = BufWriter::new(&file);
        write(&mut writer)?;
        writer.flush()?;
        drop(writer);
        file.sync_all()?;
        Ok(())
    });

    match result {
        Ok(()) => {
            fs::rename(&tmp_path, path)?;
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::ZonalStatRecord;
    use geo::{Geometry, Rect};
    use sarflood_core::vector::Feature;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 3).unwrap()
    }

    #[test]
    fn test_names() {
        assert_eq!(
            export_name("BGD", date(), OrbitDirection::Descending),
            "BGD-Floods-2024-07-03-S1-DESCENDING"
        );
        assert_eq!(batch_table_name(7), "flood_analysis_batch_7");
    }

    #[test]
    fn test_directory_exporter_writes_units() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectoryExporter::new(dir.path());
        let name = export_name("BGD", date(), OrbitDirection::Ascending);

        let mut feature = Feature::new(Geometry::Polygon(Rect::new((0.0, 0.0), (10.0, 10.0)).to_polygon()));
        feature.set_property("label", AttributeValue::Int(1));
        let features: FeatureCollection = std::iter::once(feature).collect();
        sink.write_features(&name, &features, None).unwrap();

        let batches: Vec<ZonalBatch> = (1..=2)
            .map(|number| ZonalBatch {
                number,
                records: vec![ZonalStatRecord {
                    point_id: format!("p{}", number),
                    value: Some(0.25),
                    batch_number: number,
                    analysis_date: date(),
                }],
            })
            .collect();
        assert!(export_batches(&sink, &name, &batches).is_empty());

        let geojson = fs::read_to_string(sink.features_path(&name)).unwrap();
        assert!(geojson.contains("FeatureCollection"));

        let table = fs::read_to_string(sink.table_path(&name, "flood_analysis_batch_2")).unwrap();
        let mut lines = table.lines();
        assert_eq!(lines.next(), Some("point_id,flood_status,batch_number,analysis_date"));
        assert_eq!(lines.next(), Some("p2,0.25,2,2024-07-03"));

        let leftovers: Vec<_> = fs::read_dir(dir.path().join(&name))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    /// Directory sink that refuses one batch table
    struct RefusingSink {
        inner: DirectoryExporter,
        refused: String,
    }

    impl ExportSink for RefusingSink {
        fn write_features(&self, name: &str, features: &FeatureCollection, crs: Option<&CRS>) -> Result<()> {
            self.inner.write_features(name, features, crs)
        }

        fn write_table(&self, folder: &str, name: &str, columns: &[&str], rows: &[Vec<AttributeValue>]) -> Result<()> {
            if name == self.refused {
                return Err(Error::Io(std::io::Error::other("disk full")));
            }
            self.inner.write_table(folder, name, columns, rows)
        }
    }

    #[test]
    fn test_failed_batch_does_not_stop_later_batches() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RefusingSink {
            inner: DirectoryExporter::new(dir.path()),
            refused: batch_table_name(2),
        };
        let batches: Vec<ZonalBatch> = (1..=3)
            .map(|number| ZonalBatch {
                number,
                records: Vec::new(),
            })
            .collect();

        let failed = export_batches(&sink, "result", &batches);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, 2);
        assert!(matches!(failed[0].1, Error::Io(_)));

        assert!(sink.inner.table_path("result", "flood_analysis_batch_1").exists());
        assert!(!sink.inner.table_path("result", "flood_analysis_batch_2").exists());
        assert!(sink.inner.table_path("result", "flood_analysis_batch_3").exists());
    }

    #[test]
    fn test_failed_write_leaves_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unit.csv");
        fs::write(&path, "previous").unwrap();

        let err = write_atomic(&path, |w| {
            w.write_all(b"partial")?;
            Err(Error::Other("interrupted".into()))
        });
        assert!(err.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "previous");
        assert!(!dir.path().join("unit.csv.tmp").exists());
    }
}
