use std::path::Path;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use ndarray::{ArrayD, IxDyn};

use mrspec::config::AnalysisConfig;
use mrspec::data::export::{export_table, voxel_records};
use mrspec::data::filter::{masked_coordinates, masked_matrix, SpatialMask};
use mrspec::denoise::SspcDenoiser;
use mrspec::spectra::{asym, get_hw, shift_asym};
use mrspec::volume::{mask_from_volume, NiftiLoader, VolumeLoader};
use mrspec::{load_spect, SpectralDataset};

fn main() -> Result<()> {
    env_logger::init();

    let Some(config_path) = std::env::args().nth(1) else {
        bail!("usage: mrspec <config.json>");
    };
    let config = AnalysisConfig::from_file(Path::new(&config_path))
        .with_context(|| format!("reading configuration {config_path}"))?;

    run(&config)
}

fn run(config: &AnalysisConfig) -> Result<()> {
    let loader = NiftiLoader;
    let input = &config.input;

    let dataset = load_spect(&loader, &input.prefix, input.labels.as_deref(), &input.ext)
        .context("assembling spectral dataset")?;
    info!(
        "dataset {:?} ({} voxels × {} bins)",
        dataset.data.dim(),
        dataset.n_voxels(),
        dataset.n_bins()
    );

    let mask = spatial_mask(&loader, config, &dataset)?;
    let spectra = dataset.data.view().into_dyn();
    let matrix = masked_matrix(&spectra, &mask.view())?;
    if matrix.nrows() == 0 {
        bail!("spatial mask selects no voxels");
    }
    info!("analysing {} of {} voxels", matrix.nrows(), dataset.n_voxels());

    let hw = get_hw(&matrix.view().into_dyn(), config.halfwidth.level)?;
    info!("half-width at {}%: {hw} bins", config.halfwidth.level);

    let (asymmetry, shifts) = if config.asymmetry.recenter {
        let result = shift_asym(&matrix.view().into_dyn(), config.asymmetry.hw, &config.geometry)?;
        (result.asymmetry.to_vec(), Some(result.shifts.to_vec()))
    } else {
        let values = asym(&matrix.view().into_dyn(), &config.asymmetry.params())?;
        (values.iter().copied().collect::<Vec<f64>>(), None)
    };
    let finite: Vec<f64> = asymmetry.iter().copied().filter(|a| a.is_finite()).collect();
    if finite.len() < asymmetry.len() {
        warn!("{} voxels have undefined asymmetry", asymmetry.len() - finite.len());
    }

    let outcome = SspcDenoiser::new(config.sspc_options())
        .denoise(&spectra, Some(&mask.view()))
        .context("SSPC denoising")?;

    if let Some(path) = &config.output.denoised {
        // the denoiser returns squeezed axes; restore the dataset layout
        let volume = ArrayD::from_shape_vec(
            IxDyn(dataset.data.shape()),
            outcome.denoised.iter().copied().collect(),
        )?;
        loader
            .save(&volume, &dataset.affine, path)
            .with_context(|| format!("saving denoised volume {}", path.display()))?;
        info!("wrote denoised volume to {}", path.display());
    }

    if let Some(path) = &config.output.table {
        let coords = masked_coordinates(&mask.view());
        let records = voxel_records(&outcome.matrix, &coords, Some(asymmetry.as_slice()), shifts.as_deref())?;
        export_table(path, &records)?;
    }

    let mean_asym = if finite.is_empty() {
        f64::NAN
    } else {
        finite.iter().sum::<f64>() / finite.len() as f64
    };
    println!(
        "{:?} spectra, {} voxels analysed, hw = {hw} bins, mean asymmetry = {mean_asym:.4}, SSPC rank = {} of {}",
        dataset.data.dim(),
        matrix.nrows(),
        outcome.rank,
        outcome.significant.len()
    );
    Ok(())
}

/// Spatial mask in the dataset's `(row, col, slice)` shape; all voxels when
/// no mask file is configured.
fn spatial_mask(
    loader: &NiftiLoader,
    config: &AnalysisConfig,
    dataset: &SpectralDataset,
) -> Result<SpatialMask> {
    let (rows, cols, slices) = dataset.spatial_shape();
    let shape = [rows, cols, slices];

    let Some(path) = &config.input.mask else {
        return Ok(SpatialMask::from_elem(IxDyn(&shape), true));
    };

    let volume = loader
        .load(path)
        .with_context(|| format!("loading mask {}", path.display()))?;
    let mask = mask_from_volume(&volume.data);
    if mask.len() != rows * cols * slices {
        bail!(
            "mask {} has shape {:?}, dataset spatial shape is {:?}",
            path.display(),
            mask.shape(),
            shape
        );
    }
    Ok(SpatialMask::from_shape_vec(IxDyn(&shape), mask.iter().copied().collect())?)
}
