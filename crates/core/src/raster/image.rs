//! Multi-band images built from named single-band rasters

use crate::error::{Error, Result};
use crate::raster::Raster;

/// A named band of backscatter (or derived) values
#[derive(Debug, Clone)]
pub struct Band {
    pub name: String,
    pub raster: Raster<f64>,
}

impl Band {
    pub fn new(name: impl Into<String>, raster: Raster<f64>) -> Self {
        Self {
            name: name.into(),
            raster,
        }
    }
}

/// An ordered set of bands on one pixel grid
#[derive(Debug, Clone)]
pub struct Image {
    bands: Vec<Band>,
}

impl Image {
    /// Build an image, checking that every band shares the first band's grid.
    pub fn new(bands: Vec<Band>) -> Result<Self> {
        let Some(first) = bands.first() else {
            return Err(Error::InvalidInput("image must have at least one band".into()));
        };
        for band in &bands[1..] {
            first.raster.ensure_aligned(&band.raster, &band.name)?;
        }
        Ok(Self { bands })
    }

    /// Wrap a single raster as a one-band image
    pub fn single(name: impl Into<String>, raster: Raster<f64>) -> Self {
        Self {
            bands: vec![Band::new(name, raster)],
        }
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }

    /// Look up a band by name
    pub fn band(&self, name: &str) -> Option<&Band> {
        self.bands.iter().find(|b| b.name == name)
    }

    /// Keep only the named band
    pub fn select(&self, name: &str) -> Result<Image> {
        let band = self.band(name).ok_or_else(|| {
            Error::InvalidInput(format!(
                "band '{}' not found (available: {})",
                name,
                self.band_names().join(", ")
            ))
        })?;
        Ok(Image {
            bands: vec![band.clone()],
        })
    }

    /// The only band of a single-band image.
    ///
    /// Fails with [`Error::InvalidInput`] for any other band count.
    pub fn single_band(&self) -> Result<&Band> {
        match self.bands.as_slice() {
            [band] => Ok(band),
            bands => Err(Error::InvalidInput(format!(
                "expected exactly one band, found {}",
                bands.len()
            ))),
        }
    }

    /// Shape shared by all bands
    pub fn shape(&self) -> (usize, usize) {
        self.bands[0].raster.shape()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_band_requires_one() {
        let img = Image::single("VH", Raster::filled(3, 3, 0.1));
        assert_eq!(img.single_band().unwrap().name, "VH");

        let two = Image::new(vec![
            Band::new("VV", Raster::filled(3, 3, 0.2)),
            Band::new("VH", Raster::filled(3, 3, 0.1)),
        ])
        .unwrap();
        assert!(matches!(two.single_band(), Err(Error::InvalidInput(_))));
        assert_eq!(two.select("VH").unwrap().single_band().unwrap().name, "VH");
        assert!(two.select("HH").is_err());
    }

    #[test]
    fn test_bands_must_share_grid() {
        let result = Image::new(vec![
            Band::new("VV", Raster::filled(3, 3, 0.2)),
            Band::new("VH", Raster::filled(4, 3, 0.1)),
        ]);
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
        assert!(Image::new(Vec::new()).is_err());
    }
}
