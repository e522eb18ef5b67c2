//! Batched zonal sampling at ground-truth points
//!
//! Every point is buffered into a small square (the bounding box of its
//! circular buffer) and the raster is averaged over the pixels whose centers
//! fall inside it. Points are processed in consecutive fixed-size batches;
//! each record carries its 1-based batch number and the analysis date.

use std::ops::Range;
use chrono::NaiveDate;
use geo::Point;
use tracing::debug;
use crate::maybe_rayon::*;
use crate::vector::buffer::{buffer_bounds, BufferParams};
use sarflood_core::raster::{Raster, RasterElement};
use sarflood_core::vector::{AttributeValue, PointFeatureSet};
use sarflood_core::{Error, Result};

/// Column names of exported zonal records
pub const ZONAL_COLUMNS: [&str; 4] = ["point_id", "flood_status", "batch_number", "analysis_date"];

/// Parameters for zonal sampling
#[derive(Debug, Clone)]
pub struct ZonalParams {
    /// Buffer radius around each point, in map units
    pub buffer_radius: f64,
    /// Points per batch
    pub batch_size: usize,
}

impl Default for ZonalParams {
    fn default() -> Self {
        Self {
            buffer_radius: 15.0,
            batch_size: 1000,
        }
    }
}

/// One batch of a [`BatchPlan`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSpec {
    /// 1-based batch number
    pub number: usize,
    /// Point indices covered by the batch
    pub range: Range<usize>,
}

impl BatchSpec {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Partition of `total` points into batches of `batch_size`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    pub total: usize,
    pub batch_size: usize,
}

impl BatchPlan {
    pub fn new(total: usize, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::invalid_param("batch_size", 0, "must be at least 1"));
        }
        Ok(Self { total, batch_size })
    }

    /// `ceil(total / batch_size)`
    pub fn batch_count(&self) -> usize {
        self.total.div_ceil(self.batch_size)
    }

    /// The batch starting at point index `start`
    ///
    /// # Errors
    /// [`Error::BatchIndex`] if `start` is at or beyond the end of the point set.
    pub fn batch_at(&self, start: usize) -> Result<BatchSpec> {
        if start >= self.total {
            return Err(Error::BatchIndex {
                start,
                len: self.total,
            });
        }
        Ok(BatchSpec {
            number: start / self.batch_size + 1,
            range: start..(start + self.batch_size).min(self.total),
        })
    }

    /// All batches in order
    pub fn batches(&self) -> impl Iterator<Item = BatchSpec> + '_ {
        (0..self.batch_count()).map(|k| {
            let start = k * self.batch_size;
            BatchSpec {
                number: k + 1,
                range: start..(start + self.batch_size).min(self.total),
            }
        })
    }
}

/// Sampled flood value at one point
#[derive(Debug, Clone, PartialEq)]
pub struct ZonalStatRecord {
    pub point_id: String,
    /// Mean raster value in the buffer, `None` if it holds no valid pixel
    pub value: Option<f64>,
    pub batch_number: usize,
    pub analysis_date: NaiveDate,
}

impl ZonalStatRecord {
    /// Record fields in [`ZONAL_COLUMNS`] order
    pub fn to_row(&self) -> Vec<AttributeValue> {
        vec![
            AttributeValue::String(self.point_id.clone()),
            self.value.map_or(AttributeValue::Null, AttributeValue::Float),
            AttributeValue::Int(self.batch_number as i64),
            AttributeValue::String(self.analysis_date.format("%Y-%m-%d").to_string()),
        ]
    }
}

/// Records of one batch
#[derive(Debug, Clone)]
pub struct ZonalBatch {
    pub number: usize,
    pub records: Vec<ZonalStatRecord>,
}

/// Mean of the valid pixels whose centers lie in the buffer box of `point`
///
/// Falls back to the pixel containing the point when no center lies in the
/// box. Returns `None` when no valid pixel contributes.
pub fn buffered_mean<T: RasterElement>(raster: &Raster<T>, point: &Point<f64>, radius: f64) -> Option<f64> {
    let bounds = buffer_bounds(
        point,
        &BufferParams {
            distance: radius,
            ..Default::default()
        },
    );
    let (rows, cols) = raster.transform().center_window(bounds, raster.rows(), raster.cols());

    if rows.is_empty() || cols.is_empty() {
        let (row, col) = raster.pixel_at(point.x(), point.y())?;
        return raster.valid_at(row, col)?.to_f64();
    }

    let mut sum = 0.0;
    let mut count = 0usize;
    for row in rows {
        for col in cols.clone() {
            if let Some(v) = raster.valid_at(row, col).and_then(|v| v.to_f64()) {
                sum += v;
                count += 1;
            }
        }
    }
    (count > 0).then(|| sum / count as f64)
}

/// Samples one raster at a point set, batch by batch
#[derive(Debug, Clone)]
pub struct ZonalSampler<'a, T: RasterElement> {
    raster: &'a Raster<T>,
    points: &'a PointFeatureSet,
    params: &'a ZonalParams,
    analysis_date: NaiveDate,
}

impl<'a, T: RasterElement> ZonalSampler<'a, T> {
    pub fn new(
        raster: &'a Raster<T>,
        points: &'a PointFeatureSet,
        params: &'a ZonalParams,
        analysis_date: NaiveDate,
    ) -> Self {
        Self {
            raster,
            points,
            params,
            analysis_date,
        }
    }

    pub fn plan(&self) -> Result<BatchPlan> {
        BatchPlan::new(self.points.len(), self.params.batch_size)
    }

    /// Sample the batch starting at point index `start`
    ///
    /// # Errors
    /// [`Error::BatchIndex`] if `start` is at or beyond the end of the point set.
    pub fn batch(&self, start: usize) -> Result<ZonalBatch> {
        let batch = self.plan()?.batch_at(start)?;
        Ok(self.sample(&batch))
    }

    /// Sample every batch of the plan, batches in parallel
    pub fn run(&self) -> Result<Vec<ZonalBatch>> {
        let batches: Vec<BatchSpec> = self.plan()?.batches().collect();
        debug!(points = self.points.len(), batches = batches.len(), "sampling points");
        Ok(batches.into_par_iter().map(|batch| self.sample(&batch)).collect())
    }

    fn sample(&self, batch: &BatchSpec) -> ZonalBatch {
        let records = self
            .points
            .slice(batch.range.clone())
            .iter()
            .map(|p| ZonalStatRecord {
                point_id: p.id.clone(),
                value: buffered_mean(self.raster, &p.location, self.params.buffer_radius),
                batch_number: batch.number,
                analysis_date: self.analysis_date,
            })
            .collect();
        ZonalBatch {
            number: batch.number,
            records,
        }
    }
}
