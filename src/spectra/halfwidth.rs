use ndarray::{ArrayViewD, Axis, Ix2};

use crate::error::{Result, SpectraError};

/// Bins dropped from each end of the mean spectrum before peak search.
pub const EDGE_TRIM: usize = 5;

/// Half-width of the dominant peak of the voxel-averaged spectrum.
///
/// `data` must already be a masked `voxels × bins` matrix. The threshold sits
/// `level` percent of the way from the trimmed mean spectrum's floor to its
/// peak; the result is the larger of the distances from the peak bin to the
/// first and last bins at or above that threshold. Above-threshold bins need
/// not be contiguous.
pub fn get_hw(data: &ArrayViewD<'_, f64>, level: f64) -> Result<usize> {
    let data = data
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|_| {
            SpectraError::Shape(format!(
                "input must already be masked to two dimensions, got {} axes",
                data.ndim()
            ))
        })?;
    if !(0.0..=100.0).contains(&level) {
        return Err(SpectraError::Config(format!(
            "half-width level must be a percentage in [0, 100], got {level}"
        )));
    }

    let (voxels, bins) = data.dim();
    if voxels == 0 || bins <= 2 * EDGE_TRIM {
        return Err(SpectraError::Shape(format!(
            "need at least one voxel and more than {} bins, got {voxels} × {bins}",
            2 * EDGE_TRIM
        )));
    }

    let mean = data
        .mean_axis(Axis(0))
        .ok_or_else(|| SpectraError::Shape("empty spectral matrix".into()))?;
    let trimmed = mean.slice(ndarray::s![EDGE_TRIM..bins - EDGE_TRIM]);

    let (vmax, peak) = trimmed
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| {
            if v > bv {
                (i, v)
            } else {
                (bi, bv)
            }
        });
    let floor = trimmed.iter().copied().fold(f64::INFINITY, f64::min);
    let thresh = level / 100.0 * (peak - floor) + floor;

    let mut above = trimmed
        .iter()
        .enumerate()
        .filter(|(_, &v)| v >= thresh)
        .map(|(i, _)| i);
    let v0 = above.next().unwrap_or(vmax);
    let vf = above.last().unwrap_or(v0);

    Ok(vmax.abs_diff(v0).max(vmax.abs_diff(vf)))
}
