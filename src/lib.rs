//! Analysis core for spectroscopic MRI (EPSI / MRSI) data.
//!
//! ```text
//!   volume ──► data::loader ──► SpectralDataset (row, col, slice, freq)
//!                                   │
//!                 data::filter ◄────┘  spatial mask → voxels × bins
//!                      │
//!          ┌───────────┼─────────────┐
//!          ▼           ▼             ▼
//!    spectra::*   denoise::sspc   data::export
//!    hw / asym    PCA + Levene    parquet / csv / json
//! ```

pub mod config;
pub mod data;
pub mod denoise;
pub mod error;
pub mod spectra;
pub mod volume;

pub use config::AnalysisConfig;
pub use data::loader::load_spect;
pub use data::model::SpectralDataset;
pub use error::{Result, SpectraError};
pub use volume::{NiftiLoader, Volume, VolumeLoader};
