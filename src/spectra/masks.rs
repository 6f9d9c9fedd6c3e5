use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectraError};

/// Shape of the default signal and noise bands.
///
/// The signal band is `|i - s0| <= ds`; the noise bands are
/// `|i - (s0 - n0)| <= dn` and `|i - (s0 + n0)| <= dn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskParams {
    /// Spectral length.
    pub n: usize,
    /// Signal (peak) index.
    pub s0: usize,
    /// Signal half-width.
    pub ds: usize,
    /// Offset of each noise band centre from `s0`.
    pub n0: usize,
    /// Noise half-width.
    pub dn: usize,
}

impl Default for MaskParams {
    fn default() -> Self {
        Self {
            n: 192,
            s0: 95,
            ds: 5,
            n0: 60,
            dn: 15,
        }
    }
}

impl MaskParams {
    /// Build the signal and noise masks described by these parameters.
    pub fn build(&self) -> Result<SignalNoiseMasks> {
        let s0 = self.s0 as i64;
        let within = |i: usize, centre: i64, half: usize| (i as i64 - centre).abs() <= half as i64;

        let signal = Array1::from_shape_fn(self.n, |i| within(i, s0, self.ds));
        let noise = Array1::from_shape_fn(self.n, |i| {
            within(i, s0 - self.n0 as i64, self.dn) || within(i, s0 + self.n0 as i64, self.dn)
        });
        SignalNoiseMasks::new(signal, noise)
    }
}

/// Frequency masks flagging known-signal and known-noise bins.
///
/// Always the same length, both non-empty, and disjoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalNoiseMasks {
    signal: Array1<bool>,
    noise: Array1<bool>,
}

impl SignalNoiseMasks {
    pub fn new(signal: Array1<bool>, noise: Array1<bool>) -> Result<Self> {
        if signal.len() != noise.len() {
            return Err(SpectraError::Shape(format!(
                "signal mask has {} bins but noise mask has {}",
                signal.len(),
                noise.len()
            )));
        }
        if let Some(i) = signal.iter().zip(noise.iter()).position(|(&s, &n)| s && n) {
            return Err(SpectraError::Config(format!(
                "signal and noise masks overlap at bin {i}"
            )));
        }
        if !signal.iter().any(|&s| s) {
            return Err(SpectraError::Config("signal mask selects no bins".into()));
        }
        if !noise.iter().any(|&n| n) {
            return Err(SpectraError::Config("noise mask selects no bins".into()));
        }
        Ok(Self { signal, noise })
    }

    pub fn signal(&self) -> &Array1<bool> {
        &self.signal
    }

    pub fn noise(&self) -> &Array1<bool> {
        &self.noise
    }

    /// Number of frequency bins both masks span.
    pub fn len(&self) -> usize {
        self.signal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signal.is_empty()
    }

    /// Values of `v` at the signal bins and at the noise bins.
    pub fn split(&self, v: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let pick = |mask: &Array1<bool>| {
            v.iter()
                .zip(mask.iter())
                .filter(|(_, &m)| m)
                .map(|(&x, _)| x)
                .collect::<Vec<_>>()
        };
        (pick(&self.signal), pick(&self.noise))
    }
}

/// Masks for the standard 192-bin EPSI acquisition.
pub fn default_signal_noise_masks() -> Result<SignalNoiseMasks> {
    MaskParams::default().build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flagged(mask: &Array1<bool>) -> Vec<usize> {
        mask.iter()
            .enumerate()
            .filter(|(_, &m)| m)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn default_bands() {
        let masks = default_signal_noise_masks().unwrap();
        assert_eq!(masks.len(), 192);
        assert_eq!(flagged(masks.signal()), (90..=100).collect::<Vec<_>>());

        let expected_noise: Vec<usize> = (20..=50).chain(140..=170).collect();
        assert_eq!(flagged(masks.noise()), expected_noise);
    }

    #[test]
    fn overlapping_bands_are_a_config_error() {
        let params = MaskParams {
            n0: 10,
            ..MaskParams::default()
        };
        assert!(matches!(params.build(), Err(SpectraError::Config(_))));
    }

    #[test]
    fn bands_are_clipped_to_the_spectrum() {
        let params = MaskParams {
            n: 64,
            s0: 32,
            ds: 2,
            n0: 28,
            dn: 6,
        };
        let masks = params.build().unwrap();
        assert_eq!(flagged(masks.noise()), (0..=10).chain(54..=63).collect::<Vec<_>>());
    }

    #[test]
    fn length_mismatch_is_a_shape_error() {
        let signal = Array1::from_elem(10, false);
        let noise = Array1::from_elem(12, false);
        assert!(matches!(
            SignalNoiseMasks::new(signal, noise),
            Err(SpectraError::Shape(_))
        ));
    }

    #[test]
    fn split_picks_masked_values() {
        let masks = SignalNoiseMasks::new(
            Array1::from(vec![false, true, true, false]),
            Array1::from(vec![true, false, false, true]),
        )
        .unwrap();
        let (s, n) = masks.split(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(s, vec![2.0, 3.0]);
        assert_eq!(n, vec![1.0, 4.0]);
    }
}
