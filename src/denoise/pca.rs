use std::cmp::Ordering;

use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::error::{Result, SpectraError};

/// Full-rank principal component decomposition of a `voxels × bins` matrix.
///
/// There are always as many components as bins, ordered by decreasing
/// explained variance, so keeping every component reproduces the input.
#[derive(Debug, Clone)]
pub struct PrincipalComponents {
    /// Projection scores, `voxels × components`.
    pub scores: Array2<f64>,
    /// Orthonormal component vectors as rows, `components × bins`.
    pub components: Array2<f64>,
    /// Variance along each component.
    pub explained_variance: Array1<f64>,
    /// Mean spectrum removed before projection.
    pub mean: Array1<f64>,
}

impl PrincipalComponents {
    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    /// Mean spectrum plus the contribution of the components flagged in `keep`.
    pub fn reconstruct(&self, keep: &[bool]) -> Result<Array2<f64>> {
        if keep.len() != self.n_components() {
            return Err(SpectraError::Shape(format!(
                "{} keep flags for {} components",
                keep.len(),
                self.n_components()
            )));
        }

        let voxels = self.scores.nrows();
        let mut out = Array2::from_shape_fn((voxels, self.mean.len()), |(_, j)| self.mean[j]);
        for (k, _) in keep.iter().enumerate().filter(|(_, &kept)| kept) {
            let component = self.components.row(k);
            for (mut row, &score) in out.outer_iter_mut().zip(self.scores.column(k)) {
                row.scaled_add(score, &component);
            }
        }
        Ok(out)
    }
}

/// Decompose `x` via the eigenvectors of its sample covariance.
pub fn decompose(x: &ArrayView2<'_, f64>) -> Result<PrincipalComponents> {
    let (voxels, bins) = x.dim();
    if voxels == 0 || bins == 0 {
        return Err(SpectraError::Shape(format!(
            "cannot decompose an empty {voxels} × {bins} matrix"
        )));
    }

    let mean = x
        .mean_axis(Axis(0))
        .ok_or_else(|| SpectraError::Shape("empty spectral matrix".into()))?;
    let centered = x - &mean;
    let dof = voxels.saturating_sub(1).max(1) as f64;
    let cov = centered.t().dot(&centered) / dof;

    let eigen = SymmetricEigen::new(DMatrix::from_fn(bins, bins, |i, j| cov[[i, j]]));

    let mut order: Vec<usize> = (0..bins).collect();
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .partial_cmp(&eigen.eigenvalues[a])
            .unwrap_or(Ordering::Equal)
    });

    let mut components = Array2::<f64>::zeros((bins, bins));
    let mut explained_variance = Array1::<f64>::zeros(bins);
    for (k, &idx) in order.iter().enumerate() {
        let vector = eigen.eigenvectors.column(idx);
        // sign convention: largest-magnitude loading is positive
        let pivot = vector
            .iter()
            .copied()
            .fold(0.0_f64, |best, v| if v.abs() > best.abs() { v } else { best });
        let sign = if pivot < 0.0 { -1.0 } else { 1.0 };
        for (j, &v) in vector.iter().enumerate() {
            components[[k, j]] = sign * v;
        }
        explained_variance[k] = eigen.eigenvalues[idx].max(0.0);
    }

    let scores = centered.dot(&components.t());
    Ok(PrincipalComponents {
        scores,
        components,
        explained_variance,
        mean,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_matrix(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-1.0..1.0))
    }

    #[test]
    fn components_are_orthonormal() {
        let x = random_matrix(30, 12, 1);
        let pcs = decompose(&x.view()).unwrap();
        let gram = pcs.components.dot(&pcs.components.t());
        for i in 0..12 {
            for j in 0..12 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(gram[[i, j]], expected, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn variance_is_sorted_descending() {
        let x = random_matrix(40, 10, 2);
        let pcs = decompose(&x.view()).unwrap();
        let v = pcs.explained_variance.to_vec();
        assert!(v.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn full_reconstruction_is_exact_even_when_rank_deficient() {
        // fewer voxels than bins
        let x = random_matrix(8, 20, 3);
        let pcs = decompose(&x.view()).unwrap();
        assert_eq!(pcs.n_components(), 20);

        let back = pcs.reconstruct(&[true; 20]).unwrap();
        for (a, b) in back.iter().zip(x.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-10);
        }
    }

    #[test]
    fn empty_selection_gives_mean() {
        let x = random_matrix(15, 6, 4);
        let pcs = decompose(&x.view()).unwrap();
        let back = pcs.reconstruct(&[false; 6]).unwrap();
        for row in back.outer_iter() {
            for (a, b) in row.iter().zip(pcs.mean.iter()) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-15);
            }
        }
    }

    #[test]
    fn keep_flags_must_match_component_count() {
        let x = random_matrix(5, 4, 5);
        let pcs = decompose(&x.view()).unwrap();
        assert!(pcs.reconstruct(&[true; 3]).is_err());
    }
}
