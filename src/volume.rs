//! Volume file collaborator.
//!
//! The analysis core never parses volume files itself; it goes through the
//! [`VolumeLoader`] trait so callers (and tests) can inject any source of
//! `(affine, array)` pairs. [`NiftiLoader`] is the production implementation.

use std::path::Path;

use log::debug;
use nalgebra::{Matrix4, Vector4};
use ndarray::ArrayD;
use nifti::volume::ndarray::IntoNdArray;
use nifti::writer::WriterOptions;
use nifti::{NiftiHeader, NiftiObject, ReaderOptions};

use crate::error::{Result, SpectraError};

/// Recognised volume file suffixes, lower case.
pub const VOLUME_EXTENSIONS: [&str; 2] = [".nii.gz", ".nii"];

/// A loaded volume: spatial transform plus N-D samples.
#[derive(Debug, Clone)]
pub struct Volume {
    /// 4x4 voxel → physical transform.
    pub affine: Matrix4<f64>,
    pub data: ArrayD<f64>,
}

/// Narrow load/save contract for volume files.
pub trait VolumeLoader {
    fn load(&self, path: &Path) -> Result<Volume>;

    fn save(&self, data: &ArrayD<f64>, affine: &Matrix4<f64>, path: &Path) -> Result<()>;
}

/// Affine for isotropic voxels of edge length `voxel_size`.
pub fn isotropic_affine(voxel_size: f64) -> Matrix4<f64> {
    Matrix4::from_diagonal(&Vector4::new(voxel_size, voxel_size, voxel_size, 1.0))
}

/// Boolean spatial mask from a numeric mask volume (non-zero = selected).
pub fn mask_from_volume(data: &ArrayD<f64>) -> ArrayD<bool> {
    data.mapv(|v| v != 0.0)
}

/// Reject paths that do not carry a `.nii` / `.nii.gz` suffix.
pub fn check_extension(path: &Path) -> Result<()> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    if VOLUME_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
        Ok(())
    } else {
        Err(SpectraError::UnsupportedExtension(path.to_path_buf()))
    }
}

// ---------------------------------------------------------------------------
// NIfTI implementation
// ---------------------------------------------------------------------------

/// [`VolumeLoader`] backed by the `nifti` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct NiftiLoader;

impl VolumeLoader for NiftiLoader {
    fn load(&self, path: &Path) -> Result<Volume> {
        check_extension(path)?;
        if !path.exists() {
            return Err(SpectraError::FileNotFound(path.to_path_buf()));
        }

        let obj = ReaderOptions::new()
            .read_file(path)
            .map_err(|e| codec_error(path, e))?;
        let affine = header_affine(obj.header());
        let data = obj
            .into_volume()
            .into_ndarray::<f64>()
            .map_err(|e| codec_error(path, e))?;

        debug!("loaded {} with shape {:?}", path.display(), data.shape());
        Ok(Volume { affine, data })
    }

    fn save(&self, data: &ArrayD<f64>, affine: &Matrix4<f64>, path: &Path) -> Result<()> {
        check_extension(path)?;

        let mut header = NiftiHeader::default();
        header.sform_code = 2;
        header.srow_x = affine_row(affine, 0);
        header.srow_y = affine_row(affine, 1);
        header.srow_z = affine_row(affine, 2);
        for axis in 0..3 {
            let column = affine.fixed_view::<3, 1>(0, axis);
            header.pixdim[axis + 1] = column.norm() as f32;
        }

        WriterOptions::new(path)
            .reference_header(&header)
            .write_nifti(data)
            .map_err(|e| codec_error(path, e))?;

        debug!("saved {} with shape {:?}", path.display(), data.shape());
        Ok(())
    }
}

/// Prefer the sform rows; fall back to a diagonal built from `pixdim`.
fn header_affine(header: &NiftiHeader) -> Matrix4<f64> {
    if header.sform_code > 0 {
        let rows = [header.srow_x, header.srow_y, header.srow_z];
        let mut affine = Matrix4::identity();
        for (r, row) in rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                affine[(r, c)] = f64::from(*v);
            }
        }
        affine
    } else {
        Matrix4::from_diagonal(&Vector4::new(
            f64::from(header.pixdim[1]),
            f64::from(header.pixdim[2]),
            f64::from(header.pixdim[3]),
            1.0,
        ))
    }
}

fn affine_row(affine: &Matrix4<f64>, r: usize) -> [f32; 4] {
    [
        affine[(r, 0)] as f32,
        affine[(r, 1)] as f32,
        affine[(r, 2)] as f32,
        affine[(r, 3)] as f32,
    ]
}

fn codec_error(path: &Path, e: impl std::fmt::Display) -> SpectraError {
    SpectraError::Volume {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}
