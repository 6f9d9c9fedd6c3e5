use nalgebra::Matrix4;
use ndarray::{Array2, Array4, ArrayView1, Axis};

use crate::error::{Result, SpectraError};

// ---------------------------------------------------------------------------
// SpectralDataset – the assembled 4-D EPSI volume
// ---------------------------------------------------------------------------

/// Spectra indexed `(row, column, slice, frequency)` plus the shared spatial
/// transform. The frequency axis is always last and every slice has the same
/// spatial shape and bin count.
#[derive(Debug, Clone)]
pub struct SpectralDataset {
    pub affine: Matrix4<f64>,
    pub data: Array4<f64>,
}

impl SpectralDataset {
    pub fn new(affine: Matrix4<f64>, data: Array4<f64>) -> Self {
        SpectralDataset { affine, data }
    }

    /// `(rows, columns, slices)`.
    pub fn spatial_shape(&self) -> (usize, usize, usize) {
        let (r, c, s, _) = self.data.dim();
        (r, c, s)
    }

    /// Number of frequency bins per spectrum.
    pub fn n_bins(&self) -> usize {
        self.data.len_of(Axis(3))
    }

    /// Number of spatial voxels.
    pub fn n_voxels(&self) -> usize {
        let (r, c, s) = self.spatial_shape();
        r * c * s
    }

    /// Spectrum at one voxel.
    pub fn spectrum(&self, row: usize, col: usize, slice: usize) -> ArrayView1<'_, f64> {
        self.data.slice(ndarray::s![row, col, slice, ..])
    }

    /// All voxels as a `voxels × bins` matrix, in row-major voxel order.
    pub fn to_matrix(&self) -> Result<Array2<f64>> {
        let n = self.n_bins();
        Array2::from_shape_vec((self.n_voxels(), n), self.data.iter().copied().collect())
            .map_err(|e| SpectraError::Shape(e.to_string()))
    }

    /// Isotropic voxel size, read off the affine diagonal.
    pub fn voxel_size(&self) -> f64 {
        self.affine[(0, 0)].abs()
    }
}
