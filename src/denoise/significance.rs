use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

use crate::error::{Result, SpectraError};

/// Two-sample test deciding whether a component separates signal from noise.
///
/// Implementations return a p-value; the denoiser keeps a component when it is
/// at or below its significance level.
pub trait SignificanceTest {
    fn p_value(&self, signal: &[f64], noise: &[f64]) -> Result<f64>;
}

/// Location each Levene group is centred on before taking deviations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeveneCenter {
    /// Brown–Forsythe variant.
    #[default]
    Median,
    Mean,
}

/// Levene test for equal variances.
#[derive(Debug, Clone, Copy, Default)]
pub struct Levene {
    pub center: LeveneCenter,
}

impl Levene {
    /// Levene `W` statistic and its `(k - 1, N - k)` degrees of freedom.
    pub fn statistic(&self, groups: &[&[f64]]) -> Result<(f64, f64, f64)> {
        let k = groups.len();
        let total: usize = groups.iter().map(|g| g.len()).sum();
        if k < 2 || groups.iter().any(|g| g.is_empty()) || total <= k {
            return Err(SpectraError::Denoise(format!(
                "Levene test needs at least two non-empty groups and more samples than groups \
                 (group sizes {:?})",
                groups.iter().map(|g| g.len()).collect::<Vec<_>>()
            )));
        }

        let deviations: Vec<Vec<f64>> = groups
            .iter()
            .map(|g| {
                let c = match self.center {
                    LeveneCenter::Median => median(g),
                    LeveneCenter::Mean => mean(g),
                };
                g.iter().map(|&y| (y - c).abs()).collect()
            })
            .collect();

        let group_means: Vec<f64> = deviations.iter().map(|z| mean(z)).collect();
        let grand_mean = deviations.iter().flatten().sum::<f64>() / total as f64;

        let between: f64 = deviations
            .iter()
            .zip(&group_means)
            .map(|(z, &m)| z.len() as f64 * (m - grand_mean).powi(2))
            .sum();
        let within: f64 = deviations
            .iter()
            .zip(&group_means)
            .map(|(z, &m)| z.iter().map(|&v| (v - m).powi(2)).sum::<f64>())
            .sum();

        if within == 0.0 || !within.is_finite() {
            return Err(SpectraError::Denoise(
                "zero spread of absolute deviations within groups; variance test is undefined"
                    .into(),
            ));
        }

        let df_between = (k - 1) as f64;
        let df_within = (total - k) as f64;
        let w = (df_within / df_between) * between / within;
        Ok((w, df_between, df_within))
    }
}

impl SignificanceTest for Levene {
    fn p_value(&self, signal: &[f64], noise: &[f64]) -> Result<f64> {
        let (w, d1, d2) = self.statistic(&[signal, noise])?;
        let f = FisherSnedecor::new(d1, d2).map_err(|e| SpectraError::Denoise(e.to_string()))?;
        let p = f.sf(w);
        if p.is_nan() {
            return Err(SpectraError::Denoise(format!(
                "variance test produced a NaN p-value for W = {w}"
            )));
        }
        Ok(p)
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let m = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[m]
    } else {
        0.5 * (sorted[m - 1] + sorted[m])
    }
}
