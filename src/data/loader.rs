use std::path::PathBuf;

use log::debug;
use ndarray::{s, Array4, Axis, Ix3};

use super::model::SpectralDataset;
use crate::error::{Result, SpectraError};
use crate::volume::VolumeLoader;

/// Number of slices in a standard EPSI acquisition.
pub const DEFAULT_SLICE_COUNT: usize = 80;

/// Default slice labels: `"001"` through `"080"`.
pub fn default_labels() -> Vec<String> {
    (1..=DEFAULT_SLICE_COUNT).map(|i| format!("{i:03}")).collect()
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Assemble a 4-D EPSI dataset from one volume file per slice.
///
/// File names are `{prefix}{label}{ext}`, e.g. `epsi/001.nii.gz`. Each file is
/// squeezed and must leave a `(row, column, frequency)` block; blocks are
/// stacked along a new third axis. The affine comes from the first file.
///
/// Layout:
/// ```text
///  prefix + "001" + ext ──┐
///  prefix + "002" + ext ──┼─► squeeze ─► (row, col, freq) ─► stack ─► (row, col, slice, freq)
///  ...                  ──┘
/// ```
pub fn load_spect<L: VolumeLoader + ?Sized>(
    loader: &L,
    prefix: &str,
    labels: Option<&[String]>,
    ext: &str,
) -> Result<SpectralDataset> {
    let defaults;
    let labels = match labels {
        Some(l) => l,
        None => {
            defaults = default_labels();
            &defaults
        }
    };
    let Some(first_label) = labels.first() else {
        return Err(SpectraError::Config("no slice labels given".into()));
    };

    let first_path = slice_path(prefix, first_label, ext);
    let first = loader.load(&first_path)?;
    let affine = first.affine;
    let first_block = squeeze(first.data)
        .into_dimensionality::<Ix3>()
        .map_err(|_| {
            SpectraError::Shape(format!(
                "{}: expected a (row, column, frequency) volume after squeezing",
                first_path.display()
            ))
        })?;
    let (rows, cols, bins) = first_block.dim();

    let mut data = Array4::<f64>::zeros((rows, cols, labels.len(), bins));
    data.slice_mut(s![.., .., 0, ..]).assign(&first_block);

    for (i, label) in labels.iter().enumerate().skip(1) {
        let path = slice_path(prefix, label, ext);
        let block = squeeze(loader.load(&path)?.data);
        if block.shape() != [rows, cols, bins].as_slice() {
            return Err(SpectraError::ShapeMismatch {
                path,
                expected: vec![rows, cols, bins],
                found: block.shape().to_vec(),
            });
        }
        let block = block
            .into_dimensionality::<Ix3>()
            .map_err(|e| SpectraError::Shape(e.to_string()))?;
        data.slice_mut(s![.., .., i, ..]).assign(&block);
    }

    debug!(
        "assembled EPSI dataset {:?} from {} slices under {prefix}",
        data.dim(),
        labels.len()
    );
    Ok(SpectralDataset::new(affine, data))
}

fn slice_path(prefix: &str, label: &str, ext: &str) -> PathBuf {
    PathBuf::from(format!("{prefix}{label}{ext}"))
}

/// Drop every length-1 axis.
pub fn squeeze<A>(mut array: ndarray::ArrayD<A>) -> ndarray::ArrayD<A> {
    let mut axis = 0;
    while axis < array.ndim() {
        if array.len_of(Axis(axis)) == 1 {
            array = array.index_axis_move(Axis(axis), 0);
        } else {
            axis += 1;
        }
    }
    array
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;

    use nalgebra::Matrix4;
    use ndarray::{Array, ArrayD, IxDyn};

    use super::*;
    use crate::volume::{isotropic_affine, Volume};

    /// In-memory volume store keyed by path.
    struct MemLoader(HashMap<PathBuf, Volume>);

    impl VolumeLoader for MemLoader {
        fn load(&self, path: &Path) -> Result<Volume> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| SpectraError::FileNotFound(path.to_path_buf()))
        }

        fn save(&self, _: &ArrayD<f64>, _: &Matrix4<f64>, _: &Path) -> Result<()> {
            Ok(())
        }
    }

    fn slice_volume(shape: &[usize], fill: f64) -> Volume {
        Volume {
            affine: isotropic_affine(0.5),
            data: Array::from_elem(IxDyn(shape), fill),
        }
    }

    fn labels(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{i:03}")).collect()
    }

    #[test]
    fn default_labels_are_zero_padded() {
        let l = default_labels();
        assert_eq!(l.len(), 80);
        assert_eq!(l[0], "001");
        assert_eq!(l[79], "080");
    }

    #[test]
    fn stacks_slices_along_third_axis() {
        let mut store = HashMap::new();
        for (i, label) in labels(3).iter().enumerate() {
            store.insert(
                PathBuf::from(format!("epsi/{label}.nii.gz")),
                slice_volume(&[4, 4, 1, 8], i as f64),
            );
        }
        let loader = MemLoader(store);

        let ds = load_spect(&loader, "epsi/", Some(&labels(3)), ".nii.gz").unwrap();
        assert_eq!(ds.data.dim(), (4, 4, 3, 8));
        assert_eq!(ds.data[[1, 2, 0, 7]], 0.0);
        assert_eq!(ds.data[[3, 0, 2, 5]], 2.0);
        assert_eq!(ds.affine, isotropic_affine(0.5));
    }

    #[test]
    fn mismatched_slice_shape_is_rejected() {
        let mut store = HashMap::new();
        store.insert(PathBuf::from("s001.nii"), slice_volume(&[4, 4, 8], 0.0));
        store.insert(PathBuf::from("s002.nii"), slice_volume(&[4, 4, 8], 0.0));
        store.insert(PathBuf::from("s003.nii"), slice_volume(&[4, 5, 8], 0.0));
        let loader = MemLoader(store);

        let err = load_spect(&loader, "s", Some(&labels(3)), ".nii").unwrap_err();
        match err {
            SpectraError::ShapeMismatch { expected, found, .. } => {
                assert_eq!(expected, vec![4, 4, 8]);
                assert_eq!(found, vec![4, 5, 8]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_slice_propagates_loader_error() {
        let mut store = HashMap::new();
        store.insert(PathBuf::from("s001.nii"), slice_volume(&[4, 4, 8], 0.0));
        let loader = MemLoader(store);

        let err = load_spect(&loader, "s", Some(&labels(2)), ".nii").unwrap_err();
        assert!(matches!(err, SpectraError::FileNotFound(p) if p == Path::new("s002.nii")));
    }

    #[test]
    fn squeeze_drops_singletons_only() {
        let a: ArrayD<f64> = Array::zeros(IxDyn(&[1, 4, 1, 3, 1]));
        assert_eq!(squeeze(a).shape(), &[4, 3]);
    }
}
