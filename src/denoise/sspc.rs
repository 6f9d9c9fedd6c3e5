//! Statistical selection of principal components (SSPC).
//!
//! Abdoli, Stoyanova, Maudsley, "Denoising of MR spectroscopic imaging data
//! using statistical selection of principal components", MAGMA 29(6), 2016.

use log::{debug, info};
use ndarray::{Array2, ArrayD, ArrayViewD, Ix2};

use super::pca::{decompose, PrincipalComponents};
use super::significance::{Levene, SignificanceTest};
use crate::data::filter::{masked_matrix, scatter_rows};
use crate::data::loader::squeeze;
use crate::error::{Result, SpectraError};
use crate::spectra::masks::{MaskParams, SignalNoiseMasks};

/// Default significance level for keeping a component.
pub const DEFAULT_ALPHA: f64 = 0.5e-3;

#[derive(Debug, Clone)]
pub struct SspcOptions {
    /// Keep a component when its p-value is at or below this level.
    pub alpha: f64,
    /// Explicit signal/noise bands; built from `mask_params` when absent.
    pub masks: Option<SignalNoiseMasks>,
    pub mask_params: MaskParams,
    /// Log the retained rank at `info` level.
    pub report_rank: bool,
}

impl Default for SspcOptions {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            masks: None,
            mask_params: MaskParams::default(),
            report_rank: false,
        }
    }
}

/// Result of one denoising call.
#[derive(Debug, Clone)]
pub struct SspcOutcome {
    /// Denoised spectra in the squeezed input shape. Voxels outside the
    /// spatial mask are zero.
    pub denoised: ArrayD<f64>,
    /// Denoised spectra of the analysed voxels only, `voxels × bins`.
    pub matrix: Array2<f64>,
    /// Per-component keep flags, in decreasing-variance order.
    pub significant: Vec<bool>,
    /// Number of kept components.
    pub rank: usize,
}

/// SSPC denoiser with a pluggable significance test.
#[derive(Debug, Clone)]
pub struct SspcDenoiser<T = Levene> {
    test: T,
    options: SspcOptions,
}

impl SspcDenoiser<Levene> {
    pub fn new(options: SspcOptions) -> Self {
        Self::with_test(Levene::default(), options)
    }
}

impl Default for SspcDenoiser<Levene> {
    fn default() -> Self {
        Self::new(SspcOptions::default())
    }
}

impl<T: SignificanceTest> SspcDenoiser<T> {
    pub fn with_test(test: T, options: SspcOptions) -> Self {
        Self { test, options }
    }

    pub fn options(&self) -> &SspcOptions {
        &self.options
    }

    /// Denoise `x`, whose last axis is frequency.
    ///
    /// Singleton axes of `x` and `mask` are dropped first. Arrays with more
    /// than two remaining axes need a spatial `mask`; a 2-D `x` may take a
    /// 1-D mask over its rows. With a mask, unselected voxels come back as
    /// exact zeros.
    pub fn denoise(
        &self,
        x: &ArrayViewD<'_, f64>,
        mask: Option<&ArrayViewD<'_, bool>>,
    ) -> Result<SspcOutcome> {
        if !(0.0..=1.0).contains(&self.options.alpha) {
            return Err(SpectraError::Config(format!(
                "significance level must lie in [0, 1], got {}",
                self.options.alpha
            )));
        }

        let x = squeeze(x.to_owned());
        let mask = mask.map(|m| squeeze(m.to_owned()));
        let shape = x.shape().to_vec();

        let matrix = match (&mask, x.ndim()) {
            (_, n) if n < 2 => {
                return Err(SpectraError::Shape(format!(
                    "need a voxels × bins matrix, got {n} axes after squeezing"
                )))
            }
            (Some(m), _) => masked_matrix(&x.view(), &m.view())?,
            (None, 2) => x
                .view()
                .into_dimensionality::<Ix2>()
                .map_err(|e| SpectraError::Shape(e.to_string()))?
                .to_owned(),
            (None, n) => return Err(SpectraError::MaskRequired(n)),
        };
        debug!("SSPC on a {:?} spectral matrix", matrix.dim());

        let pcs = decompose(&matrix.view())?;
        let significant = self.select(&pcs)?;
        let rank = significant.iter().filter(|&&kept| kept).count();

        if self.options.report_rank {
            info!("SSPC rank: {rank} of {} components", significant.len());
        } else {
            debug!("SSPC rank: {rank} of {} components", significant.len());
        }

        let rows = pcs.reconstruct(&significant)?;
        let denoised = match &mask {
            Some(m) => scatter_rows(&shape, &m.view(), &rows)?,
            None => rows.clone().into_dyn(),
        };

        Ok(SspcOutcome {
            denoised,
            matrix: rows,
            significant,
            rank,
        })
    }

    /// Flag every component whose loadings on the signal band and on the
    /// noise band differ significantly in spread. Kept components need not be
    /// the leading ones.
    pub fn select(&self, pcs: &PrincipalComponents) -> Result<Vec<bool>> {
        let bins = pcs.components.ncols();
        let built;
        let masks = match &self.options.masks {
            Some(m) => m,
            None => {
                built = self.options.mask_params.build()?;
                &built
            }
        };
        if masks.len() != bins {
            return Err(SpectraError::Shape(format!(
                "signal/noise masks span {} bins but spectra have {bins}",
                masks.len()
            )));
        }

        pcs.components
            .outer_iter()
            .map(|component| {
                let loadings = component.to_vec();
                let (signal, noise) = masks.split(&loadings);
                let p = self.test.p_value(&signal, &noise)?;
                Ok(p <= self.options.alpha)
            })
            .collect()
    }
}

/// Denoise with the Levene test and default bands at significance `alpha`.
pub fn denoise_sspc(
    x: &ArrayViewD<'_, f64>,
    mask: Option<&ArrayViewD<'_, bool>>,
    alpha: f64,
) -> Result<ArrayD<f64>> {
    let options = SspcOptions {
        alpha,
        ..SspcOptions::default()
    };
    Ok(SspcDenoiser::new(options).denoise(x, mask)?.denoised)
}
