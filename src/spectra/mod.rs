/// Peak-shape characterisation of EPSI spectra.
///
/// ```text
///   voxels × bins ──► halfwidth  ──► hw (bins)
///         │
///         ├────────► asymmetry  ──► (hi − lo) / total   about n0 = n/2 − 1
///         │
///         └────────► shift      ──► recentre on argmax, then asymmetry
///
///   masks: signal / noise frequency bands consumed by the SSPC denoiser
/// ```

pub mod asymmetry;
pub mod halfwidth;
pub mod masks;
pub mod shift;

pub use asymmetry::{asym, AsymmetryParams, IntegrationMethod};
pub use halfwidth::get_hw;
pub use masks::{default_signal_noise_masks, MaskParams, SignalNoiseMasks};
pub use shift::{shift_asym, ShiftAsymmetry, SpectralGeometry};
