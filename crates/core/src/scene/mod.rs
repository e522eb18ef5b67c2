//! Acquisitions and time series of radar scenes

use crate::error::{Error, Result};
use crate::raster::Image;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Satellite pass direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrbitDirection {
    Ascending,
    Descending,
}

impl OrbitDirection {
    pub const ALL: [OrbitDirection; 2] = [OrbitDirection::Ascending, OrbitDirection::Descending];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrbitDirection::Ascending => "ASCENDING",
            OrbitDirection::Descending => "DESCENDING",
        }
    }
}

impl fmt::Display for OrbitDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrbitDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ASCENDING" | "ASC" => Ok(OrbitDirection::Ascending),
            "DESCENDING" | "DESC" => Ok(OrbitDirection::Descending),
            _ => Err(Error::invalid_param("orbit_direction", s, "expected ASCENDING or DESCENDING")),
        }
    }
}

/// Half-open date interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        let range = Self { start, end };
        range.validate("date_range")?;
        Ok(range)
    }

    /// The single day `[date, date + 1)`
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date.succ_opt().unwrap_or(NaiveDate::MAX),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// Reject empty or inverted ranges
    pub fn validate(&self, name: &'static str) -> Result<()> {
        if self.start >= self.end {
            return Err(Error::invalid_param(name, self, "start must be before end"));
        }
        Ok(())
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// One radar acquisition tile
#[derive(Debug, Clone)]
pub struct Scene {
    /// Product identifier from the data store
    pub id: String,
    pub date: NaiveDate,
    pub direction: OrbitDirection,
    /// Relative orbit (repeat-path) number
    pub track: u32,
    pub image: Image,
}

/// Selection of scenes by date range and orbit geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneFilter {
    pub range: DateRange,
    pub direction: OrbitDirection,
    pub track: u32,
}

impl SceneFilter {
    pub fn matches(&self, scene: &Scene) -> bool {
        self.range.contains(scene.date)
            && scene.direction == self.direction
            && scene.track == self.track
    }
}

impl fmt::Display for SceneFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} track {}", self.range, self.direction, self.track)
    }
}

/// Scenes ordered by acquisition date
#[derive(Debug, Clone, Default)]
pub struct TimeSeries {
    scenes: Vec<Scene>,
}

impl TimeSeries {
    /// Build a series; scenes are stably sorted by date.
    pub fn new(mut scenes: Vec<Scene>) -> Self {
        scenes.sort_by_key(|s| s.date);
        Self { scenes }
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Scenes matching a filter, in date order
    pub fn select(&self, filter: &SceneFilter) -> Vec<&Scene> {
        self.scenes.iter().filter(|s| filter.matches(s)).collect()
    }

    /// Like [`TimeSeries::select`] but fails with [`Error::NoImagery`] when
    /// nothing matches.
    pub fn require(&self, filter: &SceneFilter) -> Result<Vec<&Scene>> {
        let selected = self.select(filter);
        if selected.is_empty() {
            return Err(Error::NoImagery {
                what: filter.to_string(),
            });
        }
        Ok(selected)
    }

    /// Distinct acquisition dates of the matching scenes, ascending
    pub fn distinct_dates(&self, filter: &SceneFilter) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.select(filter).iter().map(|s| s.date).collect();
        dates.dedup();
        dates
    }
}

/// Tile count and date span of a scene selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSummary {
    pub count: usize,
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
}

impl SelectionSummary {
    pub fn of(scenes: &[&Scene]) -> Self {
        Self {
            count: scenes.len(),
            first: scenes.iter().map(|s| s.date).min(),
            last: scenes.iter().map(|s| s.date).max(),
        }
    }

    /// `from YYYY-MM-DD to YYYY-MM-DD`
    pub fn span(&self) -> String {
        match (self.first, self.last) {
            (Some(first), Some(last)) => format!("from {} to {}", first, last),
            _ => "empty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Raster;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn scene(d: &str, direction: OrbitDirection, track: u32) -> Scene {
        Scene {
            id: format!("S1_{}_{}", d, track),
            date: date(d),
            direction,
            track,
            image: Image::single("VH", Raster::filled(2, 2, 0.05)),
        }
    }

    #[test]
    fn test_range_is_end_exclusive() {
        let range = DateRange::new(date("2024-06-30"), date("2024-07-30")).unwrap();
        assert!(range.contains(date("2024-06-30")));
        assert!(range.contains(date("2024-07-29")));
        assert!(!range.contains(date("2024-07-30")));
        assert!(DateRange::new(date("2024-07-30"), date("2024-07-30")).is_err());
    }

    #[test]
    fn test_select_and_distinct_dates() {
        let series = TimeSeries::new(vec![
            scene("2024-07-12", OrbitDirection::Ascending, 114),
            scene("2024-07-05", OrbitDirection::Ascending, 114),
            scene("2024-07-05", OrbitDirection::Ascending, 114),
            scene("2024-07-06", OrbitDirection::Descending, 150),
            scene("2024-07-08", OrbitDirection::Ascending, 41),
        ]);
        let filter = SceneFilter {
            range: DateRange::new(date("2024-06-30"), date("2024-07-30")).unwrap(),
            direction: OrbitDirection::Ascending,
            track: 114,
        };

        assert_eq!(series.select(&filter).len(), 3);
        assert_eq!(
            series.distinct_dates(&filter),
            vec![date("2024-07-05"), date("2024-07-12")]
        );

        let summary = SelectionSummary::of(&series.select(&filter));
        assert_eq!(summary.count, 3);
        assert_eq!(summary.span(), "from 2024-07-05 to 2024-07-12");
    }

    #[test]
    fn test_require_reports_no_imagery() {
        let series = TimeSeries::new(vec![scene("2024-07-05", OrbitDirection::Ascending, 114)]);
        let filter = SceneFilter {
            range: DateRange::day(date("2024-07-06")),
            direction: OrbitDirection::Ascending,
            track: 114,
        };
        assert!(matches!(series.require(&filter), Err(Error::NoImagery { .. })));
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("descending".parse::<OrbitDirection>().unwrap(), OrbitDirection::Descending);
        assert_eq!(OrbitDirection::Ascending.to_string(), "ASCENDING");
        assert!("sideways".parse::<OrbitDirection>().is_err());
    }
}
