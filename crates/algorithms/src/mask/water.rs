//! Permanent water from surface-water seasonality

use sarflood_core::raster::{Raster, MASK_NODATA};

/// Default number of months per year above which water counts as permanent
pub const PERMANENT_WATER_MONTHS: f64 = 10.0;

/// Mask of pixels with surface water for at least `min_months` per year
///
/// The result is 1 where `seasonality >= min_months` and no-data everywhere
/// else, so it only ever marks pixels to suppress.
pub fn permanent_water(seasonality: &Raster<f64>, min_months: f64) -> Raster<u8> {
    let mut mask = seasonality.like(MASK_NODATA, Some(MASK_NODATA));
    for (dst, &months) in mask.data_mut().iter_mut().zip(seasonality.data().iter()) {
        if !seasonality.is_nodata(months) && months >= min_months {
            *dst = 1;
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanent_water_threshold() {
        let seasonality = Raster::from_vec(vec![0.0, 9.0, 10.0, 12.0, f64::NAN, 11.5], 2, 3).unwrap();
        let mask = permanent_water(&seasonality, PERMANENT_WATER_MONTHS);

        assert_eq!(
            mask.data().iter().copied().collect::<Vec<_>>(),
            vec![MASK_NODATA, MASK_NODATA, 1, 1, MASK_NODATA, 1]
        );
        assert_eq!(mask.valid_count(), 3);
    }
}
