//! Flood mapping runs
//!
//! - Config: the TOML run configuration
//! - Pipeline: baseline, per-date detection and refinement, point sampling
//! - Export: naming and the export sink

pub mod config;
pub mod export;
pub mod pipeline;

pub use config::FloodConfig;
pub use export::{batch_table_name, export_batches, export_name, DirectoryExporter, ExportSink};
pub use pipeline::{
    process_date, AuxiliaryRasters, DateInputs, DirectionRun, ExportSummary, FloodPipeline, FloodResult,
    RunReport, UnitFailure,
};
