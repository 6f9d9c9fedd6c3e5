/// Data layer: dataset assembly, spatial masking, and table export.
///
/// Architecture:
/// ```text
///  {prefix}001.nii.gz, {prefix}002.nii.gz, ...
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  squeeze + stack slices → SpectralDataset
///   └──────────┘
///        │
///        ▼
///   ┌────────────────┐
///   │ SpectralDataset │  Array4 (row, col, slice, freq) + affine
///   └────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  spatial mask → voxels × bins matrix (and back)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  export   │  per-voxel rows → .parquet / .csv / .json
///   └──────────┘
/// ```

pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
