//! End-to-end flood mapping run
//!
//! For each pass direction a baseline is composited from the `before`
//! window. Every distinct acquisition date of the `during` window then goes
//! through change detection, mask refinement and polygonization on its own;
//! dates run in parallel. Results are exported in a separate step, where each
//! flood mask is sampled at the ground-truth points batch by batch.
//!
//! The region and the ground-truth points may be given in longitude/latitude;
//! they are moved onto the CRS of the baseline grid before use.
//!
//! A date without imagery is skipped with a warning. Any other failure of a
//! direction, date or export batch is logged as an error and recorded in the
//! [`RunReport`]; the remaining units still run.

use chrono::NaiveDate;
use tracing::{error, info, warn};
use crate::flood::config::FloodConfig;
use crate::flood::export::{export_batches, export_name, ExportSink};
use crate::imagery::{baseline_composite, detect_change, warp_nearest, Composite};
use crate::mask::{permanent_water, MaskRefiner, StageCounts};
use crate::maybe_rayon::*;
use crate::statistics::ZonalSampler;
use crate::terrain::{slope, SlopeParams};
use crate::vector::{polygonize, Polygonized};
use sarflood_core::raster::{Raster, MASK_NODATA};
use sarflood_core::scene::{OrbitDirection, SelectionSummary, TimeSeries};
use sarflood_core::store::{AuxiliaryLayer, RasterStore};
use sarflood_core::vector::{PointFeatureSet, Region};
use sarflood_core::{Error, Result};

/// Refined flood extent of one acquisition date and pass direction
#[derive(Debug, Clone)]
pub struct FloodResult {
    pub date: NaiveDate,
    pub direction: OrbitDirection,
    /// Otsu threshold of the change ratio
    pub threshold: f64,
    /// Tiles in the same-day mosaic
    pub tiles: SelectionSummary,
    pub counts: StageCounts,
    /// 0/1 flood mask on the baseline grid
    pub mask: Raster<u8>,
    pub polygons: Polygonized,
}

impl FloodResult {
    /// Export name of this result within `region`
    pub fn name(&self, region: &str) -> String {
        export_name(region, self.date, self.direction)
    }

    pub fn flooded_pixels(&self) -> usize {
        self.counts.output
    }
}

/// Refinement layers on the baseline grid
#[derive(Debug, Clone)]
pub struct AuxiliaryRasters {
    pub permanent_water: Raster<u8>,
    /// Slope in degrees
    pub slope: Raster<f64>,
}

impl AuxiliaryRasters {
    /// Load the refinement layers and sample them onto `grid`
    ///
    /// Slope is taken from the store's slope layer, or derived from its
    /// elevation layer. Without a water seasonality layer nothing is masked
    /// as permanent water.
    ///
    /// # Errors
    /// [`Error::InvalidInput`] if the store has neither slope nor elevation.
    pub fn load(store: &dyn RasterStore, grid: &Raster<f64>, permanent_water_months: f64) -> Result<Self> {
        let permanent_water = match store.auxiliary_layer(AuxiliaryLayer::WaterSeasonality)? {
            Some(seasonality) => permanent_water(
                &warp_nearest(&seasonality, grid, AuxiliaryLayer::WaterSeasonality.name())?,
                permanent_water_months,
            ),
            None => {
                warn!("no water seasonality layer, permanent water is not masked");
                grid.like(MASK_NODATA, Some(MASK_NODATA))
            }
        };

        let terrain = match store.auxiliary_layer(AuxiliaryLayer::Slope)? {
            Some(layer) => layer,
            None => match store.auxiliary_layer(AuxiliaryLayer::Elevation)? {
                Some(dem) => slope(&dem, SlopeParams::default())?,
                None => {
                    return Err(Error::InvalidInput(
                        "the raster store has neither a slope nor an elevation layer".into(),
                    ));
                }
            },
        };

        Ok(Self {
            permanent_water,
            slope: warp_nearest(&terrain, grid, AuxiliaryLayer::Slope.name())?,
        })
    }
}

/// Everything a single date needs besides the baseline
#[derive(Debug, Clone, Copy)]
pub struct DateInputs<'a> {
    /// Scenes of the monitoring window
    pub series: &'a TimeSeries,
    pub region: &'a Region,
    pub auxiliary: &'a AuxiliaryRasters,
}

/// Change detection, refinement and polygonization for one date
///
/// # Errors
/// * [`Error::NoImagery`] if no tile was acquired on `date`
/// * [`Error::EmptyHistogram`] if the change ratio has no valid pixel in the region
/// * [`Error::ShapeMismatch`] if tiles or layers do not fit the baseline grid
pub fn process_date(
    date: NaiveDate,
    direction: OrbitDirection,
    baseline: &Raster<f64>,
    inputs: &DateInputs<'_>,
    config: &FloodConfig,
) -> Result<FloodResult> {
    let change = detect_change(
        inputs.series,
        date,
        direction,
        config.track(direction),
        baseline,
        inputs.region,
        &config.change_params(),
    )?;
    info!(
        %date,
        %direction,
        tiles = change.summary.count,
        threshold = change.threshold,
        "change detected"
    );

    let refine_params = config.refine_params();
    let refined = MaskRefiner::new(&inputs.auxiliary.permanent_water, &inputs.auxiliary.slope, &refine_params)
        .refine(&change.mask, inputs.region)?;
    let polygons = polygonize(&refined.mask, inputs.region, &config.polygonize_params())?;
    info!(
        %date,
        %direction,
        flooded = refined.counts.output,
        polygons = polygons.features.len(),
        "flood mask refined"
    );

    Ok(FloodResult {
        date,
        direction,
        threshold: change.threshold,
        tiles: change.summary,
        counts: refined.counts,
        mask: refined.mask,
        polygons,
    })
}

/// A unit of work that did not produce a result
#[derive(Debug)]
pub struct UnitFailure {
    pub direction: OrbitDirection,
    /// `None` when the whole direction failed
    pub date: Option<NaiveDate>,
    /// Zonal batch whose export failed
    pub batch: Option<usize>,
    pub error: Error,
}

impl UnitFailure {
    fn record(direction: OrbitDirection, date: Option<NaiveDate>, error: Error) -> Self {
        Self::new(direction, date, None, error)
    }

    fn record_batch(direction: OrbitDirection, date: NaiveDate, batch: usize, error: Error) -> Self {
        Self::new(direction, Some(date), Some(batch), error)
    }

    fn new(direction: OrbitDirection, date: Option<NaiveDate>, batch: Option<usize>, error: Error) -> Self {
        let failure = Self {
            direction,
            date,
            batch,
            error,
        };
        let unit = failure.unit();
        if failure.is_skip() {
            warn!(%direction, %unit, error = %failure.error, "skipped");
        } else {
            error!(%direction, %unit, error = %failure.error, "failed");
        }
        failure
    }

    /// Date and batch of the unit, e.g. `2024-07-05 batch 3`
    pub fn unit(&self) -> String {
        let date = self.date.map_or_else(|| "all dates".to_string(), |d| d.to_string());
        match self.batch {
            Some(n) => format!("{} batch {}", date, n),
            None => date,
        }
    }

    /// Whether the unit was skipped for lack of imagery
    pub fn is_skip(&self) -> bool {
        self.error.aborts_unit_only()
    }
}

/// Exported units of one flood result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub name: String,
    pub features: usize,
    /// Batch tables written
    pub batches: usize,
    /// Records in the written batch tables
    pub records: usize,
}

/// Outcome of one pass direction
#[derive(Debug)]
pub struct DirectionRun {
    pub direction: OrbitDirection,
    pub baseline: SelectionSummary,
    pub results: Vec<FloodResult>,
    pub failures: Vec<UnitFailure>,
}

/// Outcome of a run
#[derive(Debug, Default)]
pub struct RunReport {
    /// Baseline selection per direction
    pub baselines: Vec<(OrbitDirection, SelectionSummary)>,
    pub results: Vec<FloodResult>,
    pub failures: Vec<UnitFailure>,
    pub exports: Vec<ExportSummary>,
}

impl RunReport {
    /// Failures other than missing imagery
    pub fn errors(&self) -> impl Iterator<Item = &UnitFailure> {
        self.failures.iter().filter(|f| !f.is_skip())
    }
}

/// A configured flood run against one raster store
pub struct FloodPipeline<'a> {
    config: &'a FloodConfig,
    store: &'a dyn RasterStore,
    region: Region,
}

impl<'a> FloodPipeline<'a> {
    pub fn new(config: &'a FloodConfig, store: &'a dyn RasterStore) -> Result<Self> {
        config.validate()?;
        let region = config.region()?;
        Ok(Self { config, store, region })
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Smoothed baseline of the `before` window
    pub fn baseline(&self, direction: OrbitDirection) -> Result<Composite> {
        let range = self.config.before;
        let series = self.store.query(&self.config.scene_query(&self.region, range, direction))?;
        let composite = baseline_composite(
            &series,
            &self.config.scene_filter(range, direction),
            self.config.processing.smoothing_radius,
        )?;
        info!(
            %direction,
            tiles = composite.summary.count,
            span = %composite.summary.span(),
            "baseline composited"
        );
        Ok(composite)
    }

    /// Every date of the `during` window for one direction
    ///
    /// Per-date failures are collected; the error is returned only when the
    /// direction as a whole cannot run.
    pub fn run_direction(&self, direction: OrbitDirection) -> Result<DirectionRun> {
        let baseline = self.baseline(direction)?;
        let region = self.region.to_crs(baseline.raster.crs())?;

        let range = self.config.during;
        let during = self.store.query(&self.config.scene_query(&self.region, range, direction))?;
        let dates = during.distinct_dates(&self.config.scene_filter(range, direction));
        info!(%direction, dates = dates.len(), window = %range, "acquisition dates");

        let auxiliary = AuxiliaryRasters::load(
            self.store,
            &baseline.raster,
            self.config.processing.permanent_water_months,
        )?;
        let inputs = DateInputs {
            series: &during,
            region: &region,
            auxiliary: &auxiliary,
        };

        let outcomes: Vec<(NaiveDate, Result<FloodResult>)> = dates
            .into_par_iter()
            .map(|date| (date, process_date(date, direction, &baseline.raster, &inputs, self.config)))
            .collect();

        let mut run = DirectionRun {
            direction,
            baseline: baseline.summary,
            results: Vec::new(),
            failures: Vec::new(),
        };
        for (date, outcome) in outcomes {
            match outcome {
                Ok(result) => run.results.push(result),
                Err(e) => run.failures.push(UnitFailure::record(direction, Some(date), e)),
            }
        }
        Ok(run)
    }

    /// Both directions, results ordered by direction then date
    pub fn run(&self) -> RunReport {
        let mut report = RunReport::default();
        for direction in OrbitDirection::ALL {
            match self.run_direction(direction) {
                Ok(run) => {
                    report.baselines.push((direction, run.baseline));
                    report.results.extend(run.results);
                    report.failures.extend(run.failures);
                }
                Err(e) => report.failures.push(UnitFailure::record(direction, None, e)),
            }
        }
        info!(
            results = report.results.len(),
            failures = report.failures.len(),
            "run finished"
        );
        report
    }

    /// Export the polygons and point samples of every result in `report`
    ///
    /// A result or batch whose export fails is recorded as a failure; the
    /// others are still exported.
    pub fn export(
        &self,
        report: &mut RunReport,
        points: &PointFeatureSet,
        sink: &dyn ExportSink,
        analysis_date: NaiveDate,
    ) {
        let outcomes: Vec<(usize, Result<(ExportSummary, Vec<UnitFailure>)>)> = (0..report.results.len())
            .into_par_iter()
            .map(|i| (i, self.export_result(&report.results[i], points, sink, analysis_date)))
            .collect();

        for (i, outcome) in outcomes {
            match outcome {
                Ok((summary, failed_batches)) => {
                    report.exports.push(summary);
                    report.failures.extend(failed_batches);
                }
                Err(e) => {
                    let result = &report.results[i];
                    let failure = UnitFailure::record(result.direction, Some(result.date), e);
                    report.failures.push(failure);
                }
            }
        }
    }

    /// Export one result: its polygons, then one table per zonal batch
    ///
    /// Returns the summary of what was written and a failure for every batch
    /// that could not be written.
    ///
    /// # Errors
    /// Failures before any batch is written: the polygon unit, moving the
    /// points onto the mask's CRS, or sampling.
    pub fn export_result(
        &self,
        result: &FloodResult,
        points: &PointFeatureSet,
        sink: &dyn ExportSink,
        analysis_date: NaiveDate,
    ) -> Result<(ExportSummary, Vec<UnitFailure>)> {
        let name = result.name(&self.region.name);
        sink.write_features(&name, &result.polygons.features, result.mask.crs())?;

        let points = points.to_crs(result.mask.crs())?;
        let params = self.config.zonal_params();
        let batches = ZonalSampler::new(&result.mask, &points, &params, analysis_date).run()?;
        let failed: Vec<UnitFailure> = export_batches(sink, &name, &batches)
            .into_iter()
            .map(|(n, e)| UnitFailure::record_batch(result.direction, result.date, n, e))
            .collect();

        let written = batches
            .iter()
            .filter(|b| !failed.iter().any(|f| f.batch == Some(b.number)));
        let summary = ExportSummary {
            features: result.polygons.features.len(),
            batches: batches.len() - failed.len(),
            records: written.map(|b| b.records.len()).sum(),
            name,
        };
        info!(
            name = %summary.name,
            features = summary.features,
            batches = summary.batches,
            failed = failed.len(),
            "exported"
        );
        Ok((summary, failed))
    }
}
