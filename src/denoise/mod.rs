/// SSPC denoising of spectral matrices.
///
/// ```text
///   voxels × bins ──► pca (full rank) ──► per-component loadings
///                                             │
///        signal / noise bands ──► significance test (Levene) ──► keep flags
///                                             │
///   mean + Σ kept score·component ◄───────────┘ ──► scatter into spatial mask
/// ```

pub mod pca;
pub mod significance;
pub mod sspc;

pub use pca::{decompose, PrincipalComponents};
pub use significance::{Levene, LeveneCenter, SignificanceTest};
pub use sspc::{denoise_sspc, SspcDenoiser, SspcOptions, SspcOutcome, DEFAULT_ALPHA};
