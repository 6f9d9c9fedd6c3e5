use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::denoise::sspc::{SspcOptions, DEFAULT_ALPHA};
use crate::error::{Result, SpectraError};
use crate::spectra::asymmetry::{AsymmetryParams, IntegrationMethod};
use crate::spectra::masks::MaskParams;
use crate::spectra::shift::SpectralGeometry;

// ---------------------------------------------------------------------------
// AnalysisConfig – everything one pipeline run needs
// ---------------------------------------------------------------------------

/// Pipeline configuration, read from JSON. Every field has a default, so a
/// file only needs the keys it changes:
///
/// ```json
/// {
///   "input":  { "prefix": "epsi/", "mask": "epsi/brain.nii.gz" },
///   "denoise": { "alpha": 0.001, "report_rank": true },
///   "output": { "denoised": "epsi_denoised.nii.gz", "table": "voxels.parquet" }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub input: InputConfig,
    pub geometry: SpectralGeometry,
    pub halfwidth: HalfWidthConfig,
    pub asymmetry: AsymmetryConfig,
    pub masks: MaskParams,
    pub denoise: DenoiseConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Slice files are `{prefix}{label}{ext}`.
    pub prefix: String,
    /// Defaults to `"001"` … `"080"`.
    pub labels: Option<Vec<String>>,
    pub ext: String,
    /// Spatial mask volume; every voxel is analysed when absent.
    pub mask: Option<PathBuf>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            labels: None,
            ext: ".nii.gz".to_string(),
            mask: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HalfWidthConfig {
    /// Percentage of the floor-to-peak height.
    pub level: f64,
}

impl Default for HalfWidthConfig {
    fn default() -> Self {
        Self { level: 50.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsymmetryConfig {
    pub hw: usize,
    pub method: IntegrationMethod,
    pub include_peak: bool,
    /// Recentre each spectrum on its own peak first.
    pub recenter: bool,
}

impl Default for AsymmetryConfig {
    fn default() -> Self {
        let params = AsymmetryParams::default();
        Self {
            hw: params.hw,
            method: params.method,
            include_peak: params.include_peak,
            recenter: false,
        }
    }
}

impl AsymmetryConfig {
    pub fn params(&self) -> AsymmetryParams {
        AsymmetryParams {
            hw: self.hw,
            method: self.method,
            include_peak: self.include_peak,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenoiseConfig {
    pub alpha: f64,
    pub report_rank: bool,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            report_rank: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where to save the denoised volume.
    pub denoised: Option<PathBuf>,
    /// Per-voxel table (.parquet, .csv or .json).
    pub table: Option<PathBuf>,
}

impl AnalysisConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| SpectraError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| SpectraError::Config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no pipeline run could honour.
    pub fn validate(&self) -> Result<()> {
        self.geometry.validate()?;
        self.masks.build()?;
        if !(0.0..=100.0).contains(&self.halfwidth.level) {
            return Err(SpectraError::Config(format!(
                "half-width level must be in [0, 100], got {}",
                self.halfwidth.level
            )));
        }
        if !(0.0..=1.0).contains(&self.denoise.alpha) {
            return Err(SpectraError::Config(format!(
                "alpha must be in [0, 1], got {}",
                self.denoise.alpha
            )));
        }
        // window of 2*hw + 1 bins around a centre at length/2 - 1
        if self.asymmetry.hw >= self.geometry.length / 2 {
            return Err(SpectraError::Config(format!(
                "asymmetry half-width {} does not fit in {} bins",
                self.asymmetry.hw, self.geometry.length
            )));
        }
        if self.masks.n != self.geometry.length {
            return Err(SpectraError::Config(format!(
                "mask length {} differs from spectral length {}",
                self.masks.n, self.geometry.length
            )));
        }
        Ok(())
    }

    pub fn sspc_options(&self) -> SspcOptions {
        SspcOptions {
            alpha: self.denoise.alpha,
            masks: None,
            mask_params: self.masks,
            report_rank: self.denoise.report_rank,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config = AnalysisConfig::from_json("{}").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.input.ext, ".nii.gz");
        assert_eq!(config.geometry.length, 192);
        assert_eq!(config.geometry.center, 95);
        assert_eq!(config.asymmetry.hw, 20);
        assert_eq!(config.asymmetry.method, IntegrationMethod::Trapz);
        assert_eq!(config.denoise.alpha, 0.0005);
        assert_eq!(config.masks, MaskParams::default());
    }

    #[test]
    fn partial_sections_override_defaults() {
        let config = AnalysisConfig::from_json(
            r#"{
                "input": { "prefix": "scan/", "labels": ["001", "002"] },
                "asymmetry": { "method": "sum", "include_peak": false },
                "denoise": { "alpha": 0.01 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.input.prefix, "scan/");
        assert_eq!(config.input.ext, ".nii.gz");
        assert_eq!(config.input.labels.as_deref().map(|l| l.len()), Some(2));
        assert_eq!(config.asymmetry.params().method, IntegrationMethod::Sum);
        assert!(!config.asymmetry.params().include_peak);
        assert_eq!(config.asymmetry.hw, 20);
        assert_eq!(config.sspc_options().alpha, 0.01);
    }

    #[test]
    fn overlapping_masks_fail_validation() {
        let err = AnalysisConfig::from_json(r#"{ "masks": { "n0": 5 } }"#).unwrap_err();
        assert!(matches!(err, SpectraError::Config(_)));
    }

    #[test]
    fn mask_length_must_match_geometry() {
        let err = AnalysisConfig::from_json(r#"{ "geometry": { "length": 256, "center": 127 } }"#)
            .unwrap_err();
        assert!(matches!(err, SpectraError::Config(_)));
    }

    #[test]
    fn asymmetry_window_must_fit_spectrum() {
        for hw in [96, 200] {
            let text = format!(r#"{{ "asymmetry": {{ "hw": {hw}, "recenter": true }} }}"#);
            let err = AnalysisConfig::from_json(&text).unwrap_err();
            assert!(matches!(err, SpectraError::Config(_)), "hw = {hw}");
        }
        let config = AnalysisConfig::from_json(r#"{ "asymmetry": { "hw": 95 } }"#).unwrap();
        assert_eq!(config.asymmetry.hw, 95);
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert!(AnalysisConfig::from_json(r#"{ "asymmetry": { "method": "simpson" } }"#).is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let config = AnalysisConfig::default();
        let text = serde_json::to_string(&config).unwrap();
        assert_eq!(AnalysisConfig::from_json(&text).unwrap(), config);
    }
}
