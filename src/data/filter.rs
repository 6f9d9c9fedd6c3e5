use ndarray::{Array2, ArrayD, ArrayViewD, Axis, Dimension, IxDyn};

use crate::error::{Result, SpectraError};

// ---------------------------------------------------------------------------
// Spatial mask selection: N-D spectra ⇄ voxels × bins matrix
// ---------------------------------------------------------------------------

/// Boolean selector over spatial voxels. Its shape is the spectral array's
/// shape without the trailing frequency axis.
pub type SpatialMask = ArrayD<bool>;

fn check_mask_shape(spectral_shape: &[usize], mask: &ArrayViewD<'_, bool>) -> Result<()> {
    let spatial = &spectral_shape[..spectral_shape.len().saturating_sub(1)];
    if mask.shape() != spatial {
        return Err(SpectraError::Shape(format!(
            "spatial mask shape {:?} does not match spectral array spatial shape {:?}",
            mask.shape(),
            spatial
        )));
    }
    Ok(())
}

/// Gather the spectra of every selected voxel into a `voxels × bins` matrix.
///
/// Rows follow the mask's row-major voxel order, which is also the order
/// [`scatter_rows`] expects.
pub fn masked_matrix(x: &ArrayViewD<'_, f64>, mask: &ArrayViewD<'_, bool>) -> Result<Array2<f64>> {
    if x.ndim() < 2 {
        return Err(SpectraError::Shape(format!(
            "spectral array must have at least 2 axes, got {}",
            x.ndim()
        )));
    }
    check_mask_shape(x.shape(), mask)?;

    let bins = x.len_of(Axis(x.ndim() - 1));
    let mut values = Vec::new();
    let mut n_rows = 0;
    for (lane, &keep) in x.lanes(Axis(x.ndim() - 1)).into_iter().zip(mask.iter()) {
        if keep {
            values.extend(lane.iter().copied());
            n_rows += 1;
        }
    }

    Array2::from_shape_vec((n_rows, bins), values).map_err(|e| SpectraError::Shape(e.to_string()))
}

/// Write `rows` back into a zero array of `shape` at the selected voxels.
///
/// Voxels outside the mask are exactly zero.
pub fn scatter_rows(
    shape: &[usize],
    mask: &ArrayViewD<'_, bool>,
    rows: &Array2<f64>,
) -> Result<ArrayD<f64>> {
    check_mask_shape(shape, mask)?;
    let selected = mask.iter().filter(|&&m| m).count();
    let bins = shape[shape.len() - 1];
    if rows.dim() != (selected, bins) {
        return Err(SpectraError::Shape(format!(
            "cannot scatter {:?} rows into {selected} masked voxels of {bins} bins",
            rows.dim()
        )));
    }

    let mut out = ArrayD::<f64>::zeros(IxDyn(shape));
    let last = Axis(shape.len() - 1);
    let mut source = rows.outer_iter();
    for (mut lane, &keep) in out.lanes_mut(last).into_iter().zip(mask.iter()) {
        if keep {
            if let Some(row) = source.next() {
                lane.assign(&row);
            }
        }
    }
    Ok(out)
}

/// Spatial coordinates of every selected voxel, in [`masked_matrix`] row order.
pub fn masked_coordinates(mask: &ArrayViewD<'_, bool>) -> Vec<Vec<usize>> {
    mask.indexed_iter()
        .filter(|(_, &keep)| keep)
        .map(|(ix, _)| ix.slice().to_vec())
        .collect()
}
