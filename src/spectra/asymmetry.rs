use ndarray::{s, ArrayD, ArrayView1, ArrayViewD, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectraError};

/// How window integrals are taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationMethod {
    /// Plain sum of bin values.
    Sum,
    /// Trapezoidal rule with unit bin spacing.
    #[default]
    Trapz,
}

impl IntegrationMethod {
    pub fn integrate(self, values: ArrayView1<'_, f64>) -> f64 {
        match self {
            IntegrationMethod::Sum => values.sum(),
            IntegrationMethod::Trapz => trapz(values),
        }
    }
}

/// Trapezoidal integral with unit spacing; zero for fewer than two samples.
pub fn trapz(values: ArrayView1<'_, f64>) -> f64 {
    values
        .windows(2)
        .into_iter()
        .map(|w| 0.5 * (w[0] + w[1]))
        .sum()
}

/// Window settings for [`asym`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsymmetryParams {
    /// Window half-width in bins.
    pub hw: usize,
    pub method: IntegrationMethod,
    /// Count the centre bin in both the low and the high window.
    pub include_peak: bool,
}

impl Default for AsymmetryParams {
    fn default() -> Self {
        Self {
            hw: 20,
            method: IntegrationMethod::Trapz,
            include_peak: true,
        }
    }
}

/// Normalised high-minus-low window asymmetry of every spectrum in `data`.
///
/// The last axis is frequency and must have even length `n`; windows are
/// placed about `n0 = n/2 - 1`. The result drops the frequency axis. A zero
/// normaliser yields NaN for that voxel rather than an error.
pub fn asym(data: &ArrayViewD<'_, f64>, params: &AsymmetryParams) -> Result<ArrayD<f64>> {
    if data.ndim() == 0 {
        return Err(SpectraError::Shape("spectra need a frequency axis".into()));
    }
    let last = Axis(data.ndim() - 1);
    let n = data.len_of(last);
    if n == 0 || n % 2 != 0 {
        return Err(SpectraError::Shape(format!(
            "asymmetry needs an even, non-zero number of bins, got {n}"
        )));
    }
    let n0 = n / 2 - 1;
    if params.hw > n0 || n0 + params.hw >= n {
        return Err(SpectraError::Shape(format!(
            "half-width {} does not fit around centre bin {n0} of {n} bins",
            params.hw
        )));
    }

    Ok(data.map_axis(last, |spectrum| {
        window_asymmetry(spectrum, n0, params.hw, params.method, params.include_peak)
    }))
}

/// Asymmetry of one spectrum about `n0`. Caller guarantees the windows fit.
pub(crate) fn window_asymmetry(
    spectrum: ArrayView1<'_, f64>,
    n0: usize,
    hw: usize,
    method: IntegrationMethod,
    include_peak: bool,
) -> f64 {
    let (lo, hi, total) = if include_peak {
        let lo = method.integrate(spectrum.slice(s![n0 - hw..=n0]));
        let hi = method.integrate(spectrum.slice(s![n0..=n0 + hw]));
        let total = method.integrate(spectrum.slice(s![n0 - hw..=n0 + hw]));
        (lo, hi, total)
    } else {
        let lo = method.integrate(spectrum.slice(s![n0 - hw..n0]));
        let hi = method.integrate(spectrum.slice(s![n0 + 1..=n0 + hw]));
        (lo, hi, lo + hi)
    };

    if total == 0.0 {
        f64::NAN
    } else {
        (hi - lo) / total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, Array2};

    const METHODS: [IntegrationMethod; 2] = [IntegrationMethod::Sum, IntegrationMethod::Trapz];

    fn first(a: &ArrayD<f64>) -> f64 {
        a.iter().next().copied().unwrap()
    }

    fn params(hw: usize, method: IntegrationMethod, include_peak: bool) -> AsymmetryParams {
        AsymmetryParams {
            hw,
            method,
            include_peak,
        }
    }

    #[test]
    fn trapz_matches_hand_computation() {
        let v = Array1::from(vec![1.0, 3.0, 2.0, 4.0]);
        assert_abs_diff_eq!(trapz(v.view()), 2.0 + 2.5 + 3.0);
        assert_eq!(trapz(Array1::from(vec![5.0]).view()), 0.0);
    }

    #[test]
    fn symmetric_spectrum_has_zero_asymmetry() {
        let n = 192;
        let n0 = (n / 2 - 1) as f64;
        let data = Array2::from_shape_fn((3, n), |(v, i)| {
            let d = i as f64 - n0;
            (v + 1) as f64 * (-d * d / 50.0).exp()
        });

        for method in METHODS {
            for include_peak in [true, false] {
                let a = asym(&data.view().into_dyn(), &params(20, method, include_peak)).unwrap();
                assert_eq!(a.shape(), &[3]);
                for &x in a.iter() {
                    assert_abs_diff_eq!(x, 0.0, epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn all_mass_above_centre_gives_one() {
        let n = 64;
        let n0 = n / 2 - 1;
        let mut spectrum = Array1::<f64>::zeros(n);
        for i in n0 + 2..n0 + 8 {
            spectrum[i] = 1.0 + i as f64;
        }
        let data = spectrum.insert_axis(Axis(0));

        for method in METHODS {
            for include_peak in [true, false] {
                let a = asym(&data.view().into_dyn(), &params(10, method, include_peak)).unwrap();
                assert_abs_diff_eq!(first(&a), 1.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn shared_centre_bin_only_counts_with_include_peak() {
        // mass only in the centre bin and one bin above it
        let n = 32;
        let n0 = n / 2 - 1;
        let mut spectrum = Array1::<f64>::zeros(n);
        spectrum[n0] = 2.0;
        spectrum[n0 + 1] = 1.0;
        let data = spectrum.into_dyn();

        let with = asym(&data.view(), &params(4, IntegrationMethod::Sum, true)).unwrap();
        // hi = 3, lo = 2, total = 3
        assert_abs_diff_eq!(first(&with), 1.0 / 3.0, epsilon = 1e-12);

        let without = asym(&data.view(), &params(4, IntegrationMethod::Sum, false)).unwrap();
        assert_abs_diff_eq!(first(&without), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_normaliser_propagates_nan() {
        let data = Array2::<f64>::zeros((2, 48));
        let a = asym(&data.view().into_dyn(), &AsymmetryParams::default()).unwrap();
        assert!(a.iter().all(|x| x.is_nan()));
    }

    #[test]
    fn leading_axes_are_broadcast() {
        let data = ndarray::Array4::<f64>::from_elem((2, 3, 4, 48), 1.0);
        let a = asym(&data.view().into_dyn(), &params(10, IntegrationMethod::Trapz, true)).unwrap();
        assert_eq!(a.shape(), &[2, 3, 4]);
        assert!(a.iter().all(|&x| x.abs() < 1e-12));
    }

    #[test]
    fn odd_length_is_rejected() {
        let data = Array2::<f64>::zeros((1, 41));
        assert!(matches!(
            asym(&data.view().into_dyn(), &AsymmetryParams::default()),
            Err(SpectraError::Shape(_))
        ));
    }

    #[test]
    fn window_wider_than_spectrum_is_rejected() {
        let data = Array2::<f64>::zeros((1, 20));
        assert!(asym(&data.view().into_dyn(), &AsymmetryParams::default()).is_err());
    }
}
