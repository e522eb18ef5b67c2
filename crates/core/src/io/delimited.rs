//! Delimited (CSV) records: ground-truth point loading and table encoding

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::store::PointSource;
use crate::vector::{AttributeValue, PointFeature, PointFeatureSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const ID_COLUMNS: &[&str] = &["id", "point_id", "system:index"];
const X_COLUMNS: &[&str] = &["x", "lon", "longitude", "easting"];
const Y_COLUMNS: &[&str] = &["y", "lat", "latitude", "northing"];

/// Parse ground-truth points from CSV text.
///
/// The header must name an identifier column and x/y columns (several common
/// spellings are accepted). Blank lines are skipped.
pub fn parse_points(text: &str, source_name: &str) -> Result<PointFeatureSet> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());

    let (_, header) = lines.next().ok_or_else(|| Error::Parse {
        source_name: source_name.to_string(),
        line: 1,
        reason: "missing header".into(),
    })?;
    let header: Vec<String> = split_record(header)
        .into_iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();

    let find = |names: &[&str], what: &str| {
        header
            .iter()
            .position(|h| names.contains(&h.as_str()))
            .ok_or_else(|| Error::Parse {
                source_name: source_name.to_string(),
                line: 1,
                reason: format!("no {} column (expected one of {})", what, names.join(", ")),
            })
    };
    let id_col = find(ID_COLUMNS, "identifier")?;
    let x_col = find(X_COLUMNS, "x")?;
    let y_col = find(Y_COLUMNS, "y")?;

    let mut points = Vec::new();
    for (idx, line) in lines {
        let fields = split_record(line);
        let parse_err = |reason: String| Error::Parse {
            source_name: source_name.to_string(),
            line: idx + 1,
            reason,
        };
        let field = |col: usize| {
            fields
                .get(col)
                .map(|s| s.trim())
                .ok_or_else(|| parse_err(format!("missing column {}", col + 1)))
        };
        let coord = |col: usize| -> Result<f64> {
            let raw = field(col)?;
            raw.parse::<f64>()
                .map_err(|_| parse_err(format!("invalid coordinate '{}'", raw)))
        };

        points.push(PointFeature::new(field(id_col)?, coord(x_col)?, coord(y_col)?));
    }

    Ok(PointFeatureSet::new(points))
}

/// Split one CSV record, honoring double-quoted fields.
fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Encode a header and rows as CSV.
pub fn write_table<W: Write>(
    mut writer: W,
    columns: &[&str],
    rows: &[Vec<AttributeValue>],
) -> Result<()> {
    let header: Vec<String> = columns.iter().map(|c| escape_field(c)).collect();
    writeln!(writer, "{}", header.join(","))?;

    for row in rows {
        if row.len() != columns.len() {
            return Err(Error::InvalidInput(format!(
                "row has {} fields, table has {} columns",
                row.len(),
                columns.len()
            )));
        }
        let fields: Vec<String> = row.iter().map(|v| escape_field(&v.to_string())).collect();
        writeln!(writer, "{}", fields.join(","))?;
    }
    writer.flush()?;
    Ok(())
}

/// Ground-truth points stored in a CSV file
///
/// Coordinates are read in `crs`, or in the frame of the flood mask when no
/// CRS is set.
#[derive(Debug, Clone)]
pub struct CsvPointSource {
    path: PathBuf,
    crs: Option<CRS>,
}

impl CsvPointSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            crs: None,
        }
    }

    pub fn with_crs(mut self, crs: Option<CRS>) -> Self {
        self.crs = crs;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PointSource for CsvPointSource {
    fn load_points(&self) -> Result<PointFeatureSet> {
        let text = fs::read_to_string(&self.path)?;
        let points = parse_points(&text, &self.path.display().to_string())?;
        Ok(points.with_crs(self.crs.clone()))
    }
}
