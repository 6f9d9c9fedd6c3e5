use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{Array3, Array4};

use mrspec::config::AnalysisConfig;
use mrspec::spectra::shift::{EPSI_CENTER_INDEX, EPSI_SPECTRAL_LENGTH};
use mrspec::volume::{isotropic_affine, NiftiLoader, VolumeLoader};

const OUTPUT_DIR: &str = "sample_epsi";
const ROWS: usize = 12;
const COLS: usize = 12;
const SLICES: usize = 4;
const VOXEL_SIZE_MM: f64 = 5.6;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Water-like line at `center + shift` with a weaker shoulder on the high side.
fn generate_spectrum(shift: f64, amplitude: f64, noise_level: f64, rng: &mut SimpleRng) -> Vec<f64> {
    let mu = EPSI_CENTER_INDEX as f64 + shift;
    (0..EPSI_SPECTRAL_LENGTH)
        .map(|i| {
            let x = i as f64;
            let signal = gaussian(x, mu, 3.0, amplitude) + gaussian(x, mu + 6.0, 4.0, 0.2 * amplitude);
            signal + rng.gauss(0.0, noise_level)
        })
        .collect()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Elliptical "head" footprint inside the field of view.
fn inside_head(row: usize, col: usize) -> bool {
    let dr = (row as f64 - (ROWS as f64 - 1.0) / 2.0) / (ROWS as f64 * 0.42);
    let dc = (col as f64 - (COLS as f64 - 1.0) / 2.0) / (COLS as f64 * 0.36);
    dr * dr + dc * dc <= 1.0
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let loader = NiftiLoader;
    let affine = isotropic_affine(VOXEL_SIZE_MM);
    let dir = Path::new(OUTPUT_DIR);
    std::fs::create_dir_all(dir).with_context(|| format!("creating {OUTPUT_DIR}"))?;

    let mut mask = Array3::<f64>::zeros((ROWS, COLS, SLICES));
    let mut labels = Vec::with_capacity(SLICES);

    for slice in 0..SLICES {
        let mut block = Array4::<f64>::zeros((ROWS, COLS, 1, EPSI_SPECTRAL_LENGTH));
        for row in 0..ROWS {
            for col in 0..COLS {
                let spectrum = if inside_head(row, col) {
                    mask[[row, col, slice]] = 1.0;
                    // B0 drift across the field of view
                    let shift = ((row as f64 - ROWS as f64 / 2.0) * 0.5).round();
                    let amplitude = 8.0 + 2.0 * rng.next_f64();
                    generate_spectrum(shift, amplitude, 0.3, &mut rng)
                } else {
                    (0..EPSI_SPECTRAL_LENGTH).map(|_| rng.gauss(0.0, 0.3)).collect()
                };
                for (bin, value) in spectrum.into_iter().enumerate() {
                    block[[row, col, 0, bin]] = value;
                }
            }
        }

        let label = format!("{:03}", slice + 1);
        let path = dir.join(format!("{label}.nii.gz"));
        loader.save(&block.into_dyn(), &affine, &path)?;
        labels.push(label);
    }

    let mask_path = dir.join("mask.nii.gz");
    loader.save(&mask.into_dyn(), &affine, &mask_path)?;

    let mut config = AnalysisConfig::default();
    config.input.prefix = format!("{OUTPUT_DIR}/");
    config.input.labels = Some(labels);
    config.input.mask = Some(mask_path);
    config.asymmetry.recenter = true;
    config.denoise.report_rank = true;
    config.output.denoised = Some(dir.join("denoised.nii.gz"));
    config.output.table = Some(dir.join("voxels.parquet"));

    let config_path = dir.join("config.json");
    let text = serde_json::to_string_pretty(&config).context("serialising configuration")?;
    std::fs::write(&config_path, text)
        .with_context(|| format!("writing {}", config_path.display()))?;

    println!(
        "Wrote {SLICES} slices of {ROWS}×{COLS}×{EPSI_SPECTRAL_LENGTH} spectra to {OUTPUT_DIR}/; run `mrspec {}`",
        config_path.display()
    );
    Ok(())
}
