use std::collections::BTreeMap;

use log::{debug, warn};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayViewD, Axis, Ix2};
use serde::{Deserialize, Serialize};

use super::asymmetry::{window_asymmetry, IntegrationMethod};
use crate::error::{Result, SpectraError};

/// Spectral length of the EPSI acquisitions this pipeline was built for.
pub const EPSI_SPECTRAL_LENGTH: usize = 192;
/// Bin where a correctly registered EPSI peak sits.
pub const EPSI_CENTER_INDEX: usize = 95;

/// Expected spectral length and canonical peak bin.
///
/// Recentering only makes sense for data acquired with this geometry, so it is
/// passed explicitly and checked against the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralGeometry {
    pub length: usize,
    pub center: usize,
}

impl Default for SpectralGeometry {
    fn default() -> Self {
        Self {
            length: EPSI_SPECTRAL_LENGTH,
            center: EPSI_CENTER_INDEX,
        }
    }
}

impl SpectralGeometry {
    pub fn validate(&self) -> Result<()> {
        if self.center >= self.length {
            return Err(SpectraError::Config(format!(
                "center bin {} lies outside a {}-bin spectrum",
                self.center, self.length
            )));
        }
        Ok(())
    }
}

/// Output of [`shift_asym`].
#[derive(Debug, Clone)]
pub struct ShiftAsymmetry {
    /// Per-voxel asymmetry; NaN where the recentred window left the spectrum.
    pub asymmetry: Array1<f64>,
    /// `center - argmax` per voxel. Large magnitudes flag mis-registered or
    /// corrupted spectra.
    pub shifts: Array1<i64>,
}

/// Recentre each spectrum on its own peak, then take the trapezoidal,
/// peak-inclusive asymmetry over a `2*hw + 1` window.
///
/// `data` is `voxels × bins` with `bins == geometry.length`. Voxels sharing a
/// shift are re-sliced together.
pub fn shift_asym(
    data: &ArrayViewD<'_, f64>,
    hw: usize,
    geometry: &SpectralGeometry,
) -> Result<ShiftAsymmetry> {
    geometry.validate()?;
    let width = hw
        .checked_mul(2)
        .and_then(|w| w.checked_add(1))
        .filter(|&w| w <= geometry.length)
        .ok_or_else(|| {
            SpectraError::Shape(format!(
                "half-width {hw} gives a window wider than {} bins",
                geometry.length
            ))
        })?;
    let data = data.view().into_dimensionality::<Ix2>().map_err(|_| {
        SpectraError::Shape(format!(
            "recentering expects a voxels × bins matrix, got {} axes",
            data.ndim()
        ))
    })?;
    let (voxels, bins) = data.dim();
    if bins != geometry.length {
        return Err(SpectraError::Shape(format!(
            "recentering expects {} bins, got {bins}",
            geometry.length
        )));
    }

    let center = geometry.center as i64;
    let shifts: Array1<i64> = data
        .outer_iter()
        .map(|spectrum| center - argmax(spectrum) as i64)
        .collect();

    let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (voxel, &shift) in shifts.iter().enumerate() {
        groups.entry(shift).or_default().push(voxel);
    }

    let mut shifted = Array2::<f64>::from_elem((voxels, width), f64::NAN);
    for (shift, members) in &groups {
        let peak = center - shift;
        let (lo, hi) = (peak - hw as i64, peak + hw as i64);
        if lo < 0 || hi >= bins as i64 {
            warn!(
                "{} voxel(s) with shift {shift} have no full {width}-bin window; asymmetry set to NaN",
                members.len()
            );
            continue;
        }
        let (lo, hi) = (lo as usize, hi as usize);
        for &voxel in members {
            shifted
                .row_mut(voxel)
                .assign(&data.slice(s![voxel, lo..=hi]));
        }
    }
    debug!("recentered {voxels} spectra in {} shift groups", groups.len());

    let asymmetry = shifted.map_axis(Axis(1), |spectrum| {
        window_asymmetry(spectrum, hw, hw, IntegrationMethod::Trapz, true)
    });

    Ok(ShiftAsymmetry { asymmetry, shifts })
}

/// Index of the first maximum; NaNs never win.
fn argmax(values: ArrayView1<'_, f64>) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| {
            if v > bv {
                (i, v)
            } else {
                (bi, bv)
            }
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectra::asymmetry::{asym, AsymmetryParams};
    use approx::assert_abs_diff_eq;

    fn gaussian_rows(peaks: &[f64], skew: f64) -> Array2<f64> {
        Array2::from_shape_fn((peaks.len(), EPSI_SPECTRAL_LENGTH), |(v, i)| {
            let d = i as f64 - peaks[v];
            let sigma = if d > 0.0 { 4.0 * skew } else { 4.0 };
            (-d * d / (2.0 * sigma * sigma)).exp()
        })
    }

    #[test]
    fn shifts_measure_peak_offset() {
        let data = gaussian_rows(&[95.0, 100.0, 90.0], 1.0);
        let out = shift_asym(&data.view().into_dyn(), 20, &SpectralGeometry::default()).unwrap();
        assert_eq!(out.shifts.to_vec(), vec![0, -5, 5]);
        for &a in out.asymmetry.iter() {
            assert_abs_diff_eq!(a, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn recentered_matches_centered_asymmetry() {
        let skewed = gaussian_rows(&[103.0], 1.5);
        let centered = gaussian_rows(&[95.0], 1.5);

        let shifted = shift_asym(&skewed.view().into_dyn(), 20, &SpectralGeometry::default()).unwrap();
        let reference = asym(&centered.view().into_dyn(), &AsymmetryParams::default()).unwrap();

        assert!(shifted.asymmetry[0] > 0.0);
        assert_abs_diff_eq!(
            shifted.asymmetry[0],
            *reference.iter().next().unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn peak_near_edge_yields_nan() {
        let data = gaussian_rows(&[5.0, 95.0], 1.0);
        let out = shift_asym(&data.view().into_dyn(), 20, &SpectralGeometry::default()).unwrap();
        assert_eq!(out.shifts[0], 90);
        assert!(out.asymmetry[0].is_nan());
        assert!(out.asymmetry[1].is_finite());
    }

    #[test]
    fn wrong_spectral_length_is_rejected() {
        let data = Array2::<f64>::zeros((2, 128));
        assert!(matches!(
            shift_asym(&data.view().into_dyn(), 20, &SpectralGeometry::default()),
            Err(SpectraError::Shape(_))
        ));
    }

    #[test]
    fn oversized_half_width_is_rejected() {
        let data = gaussian_rows(&[95.0], 1.0);
        for hw in [96, 200, usize::MAX / 2 + 1, usize::MAX] {
            assert!(
                matches!(
                    shift_asym(&data.view().into_dyn(), hw, &SpectralGeometry::default()),
                    Err(SpectraError::Shape(_))
                ),
                "hw = {hw}"
            );
        }
        // widest window that still fits: 2 * 95 + 1 = 191 bins
        assert!(shift_asym(&data.view().into_dyn(), 95, &SpectralGeometry::default()).is_ok());
    }

    #[test]
    fn custom_geometry_is_honoured() {
        let data = Array2::from_shape_fn((1, 64), |(_, i)| {
            let d = i as f64 - 40.0;
            (-d * d / 8.0).exp()
        });
        let geometry = SpectralGeometry {
            length: 64,
            center: 31,
        };
        let out = shift_asym(&data.view().into_dyn(), 8, &geometry).unwrap();
        assert_eq!(out.shifts[0], -9);
        assert_abs_diff_eq!(out.asymmetry[0], 0.0, epsilon = 1e-12);
    }
}
