//! Writes a small synthetic data set so the viewer works offline:
//! a calibrated FFI cutout, a star catalog, one extracted light-curve file
//! and a settings file pointing at all of them.

use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{Array2, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;

use tess_quicklook::config::{ApertureConfig, PipelineConfig, DEFAULT_CONFIG_FILE};
use tess_quicklook::data::extract::light_curve_file_name;
use tess_quicklook::data::fits::{save_image, save_light_curve};
use tess_quicklook::data::model::{CalibratedImage, CatalogEntry, ImageHeader, TargetData, WcsHeader};

const SECTOR: u32 = 1;
/// Sector 1 start in BTJD and the 30-minute FFI cadence in days.
const T0: f64 = 1325.2931;
const CADENCE: f64 = 30.0 / 1440.0;

/// WASP-100 b ephemeris used for the injected transit.
const PERIOD: f64 = 2.849375;
const EPOCH: f64 = 1326.9310;
const DURATION: f64 = 0.1558;
const DEPTH: f64 = 0.0076;

fn catalog() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry {
            name: "WASP-100".to_string(),
            tic: 38846515,
            gaia: Some(4675352109658261376),
            tess_mag: 10.3,
            ra: 68.959732,
            dec: -64.02704,
        },
        CatalogEntry {
            name: "WASP-126".to_string(),
            tic: 25155310,
            gaia: Some(4664427011521452416),
            tess_mag: 10.4,
            ra: 69.372013,
            dec: -69.101913,
        },
        CatalogEntry {
            name: "TOI-270".to_string(),
            tic: 259377017,
            gaia: Some(4781196115469953024),
            tess_mag: 10.4,
            ra: 68.414798,
            dec: -51.956806,
        },
        CatalogEntry {
            name: "HD 21749".to_string(),
            tic: 279741379,
            gaia: None,
            tess_mag: 7.1,
            ra: 52.999786,
            dec: -63.491806,
        },
    ]
}

/// Symmetric 2-D Gaussian with unit peak.
fn psf(row: f64, col: f64, center: (f64, f64), sigma: f64) -> f64 {
    let (r0, c0) = center;
    (-((row - r0).powi(2) + (col - c0).powi(2)) / (2.0 * sigma * sigma)).exp()
}

fn in_transit(time: f64) -> bool {
    let phase = (time - EPOCH).rem_euclid(PERIOD);
    phase.min(PERIOD - phase) < DURATION / 2.0
}

// ---------------------------------------------------------------------------
// Calibrated FFI cutout
// ---------------------------------------------------------------------------

fn ffi_cutout(rng: &mut StdRng) -> Result<CalibratedImage> {
    let size = 64;
    let sky = Normal::new(150.0, 6.0)?;
    let stars: Vec<((f64, f64), f64)> = (0..40)
        .map(|_| {
            let center = (rng.random_range(0.0..size as f64), rng.random_range(0.0..size as f64));
            let peak = 10f64.powf(rng.random_range(1.5..4.2));
            (center, peak)
        })
        .chain(std::iter::once(((31.5, 31.5), 2.0e4)))
        .collect();

    let mut pixels = Array2::from_shape_fn((size, size), |(r, c)| {
        stars
            .iter()
            .map(|&(center, peak)| peak * psf(r as f64, c as f64, center, 0.9))
            .sum::<f64>()
    });
    pixels.mapv_inplace(|v| v + rng.sample(sky));
    // A couple of dead pixels, as in real calibrated frames.
    pixels[[3, 60]] = f64::NAN;
    pixels[[47, 12]] = f64::NAN;

    let arcsec_per_px = 21.0 / 3600.0;
    Ok(CalibratedImage {
        pixels,
        header: ImageHeader {
            extname: Some("CALIBRATED".to_string()),
            tstart: T0,
            tstop: T0 + CADENCE,
            sector: Some(SECTOR as i64),
            camera: Some(4),
            ccd: Some(2),
            wcs: Some(WcsHeader {
                ctype: ["RA---TAN".to_string(), "DEC--TAN".to_string()],
                crval: [68.959732, -64.02704],
                crpix: [32.5, 32.5],
                cd: [[-arcsec_per_px, 0.0], [0.0, arcsec_per_px]],
            }),
        },
    })
}

// ---------------------------------------------------------------------------
// Extracted light curve
// ---------------------------------------------------------------------------

fn light_curve(rng: &mut StdRng, target: CatalogEntry) -> Result<TargetData> {
    let aperture_size = ApertureConfig::default();
    let (rows, cols) = (aperture_size.height, aperture_size.width);
    let center = ((rows as f64 - 1.0) / 2.0, (cols as f64 - 1.0) / 2.0);
    let n = (27.4 / CADENCE) as usize;

    let time: Vec<f64> = (0..n).map(|i| T0 + i as f64 * CADENCE).collect();
    // Momentum dumps every 2.5 days, the mid-sector downlink gap and a few
    // scattered flags.
    let quality: Vec<i32> = time
        .iter()
        .map(|&t| {
            if (t - T0).rem_euclid(2.5) < CADENCE {
                32
            } else if (1338.5..1339.65).contains(&t) {
                1024
            } else if rng.random_bool(0.01) {
                128
            } else {
                0
            }
        })
        .collect();

    let flux_noise = Normal::new(0.0, 25.0)?;
    let star_flux = 1.2e4;
    let model: Vec<f64> = time
        .iter()
        .map(|&t| star_flux * if in_transit(t) { 1.0 - DEPTH } else { 1.0 })
        .collect();
    let systematics: Vec<f64> = time
        .iter()
        .map(|&t| 1.0 + 0.004 * ((t - T0) / 13.7 * std::f64::consts::PI).sin())
        .collect();
    let mut noisy = |base: &[f64], scale: f64| -> Vec<f64> {
        base.iter().map(|&f| f * scale + rng.sample(flux_noise)).collect()
    };

    let raw_with_trend: Vec<f64> = model.iter().zip(&systematics).map(|(m, s)| m * s).collect();
    let raw_flux = noisy(&raw_with_trend[..], 1.0);
    let corr_flux = noisy(&model[..], 1.0);
    let pca_flux = noisy(&model[..], 0.998);
    let psf_flux = noisy(&model[..], 1.003);

    let flux_bkg: Vec<f64> = time
        .iter()
        .map(|&t| 150.0 + 40.0 * (-(t - T0 - 12.0).powi(2) / 2.0).exp())
        .collect();
    let tpf_noise = Normal::new(0.0, 1.5)?;
    let tpf_flux_bkg: Vec<f64> = flux_bkg.iter().map(|&b| b + rng.sample(tpf_noise)).collect();

    let bkg_tpf = Array3::from_shape_fn((n, rows, cols), |(t, r, c)| {
        flux_bkg[t] * (1.0 + 0.002 * (r as f64 - center.0) + 0.001 * (c as f64 - center.1))
    });
    let mut tpf = Array3::from_shape_fn((n, rows, cols), |(t, r, c)| {
        model[t] / 12.0 * psf(r as f64, c as f64, center, 1.1)
    });
    let pixel_noise = Normal::new(0.0, 3.0)?;
    tpf.zip_mut_with(&bkg_tpf, |pix, &bkg| {
        *pix += bkg + rng.sample(pixel_noise);
    });

    let aperture = Array2::from_shape_fn((rows, cols), |(r, c)| {
        (r as f64 - center.0).hypot(c as f64 - center.1) <= 2.0
    });

    Ok(TargetData {
        target,
        sector: SECTOR,
        aperture_size,
        bkg_type: "PC_LEVEL".to_string(),
        time,
        quality,
        raw_flux,
        corr_flux,
        pca_flux,
        psf_flux,
        flux_bkg,
        tpf_flux_bkg,
        tpf,
        bkg_tpf,
        aperture,
    })
}

fn write_catalog(entries: &[CatalogEntry], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for entry in entries {
        writer.serialize(entry)?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(42);
    let config = PipelineConfig::default();

    let image_path = &config.image.local_path;
    let lc_dir = &config.archive.light_curve_dir;
    for dir in [image_path.parent(), Some(lc_dir.as_path())].into_iter().flatten() {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let image = ffi_cutout(&mut rng)?;
    save_image(&image, image_path)?;
    println!(
        "Wrote {}x{} FFI cutout to {}",
        image.height(),
        image.width(),
        image_path.display()
    );

    let entries = catalog();
    write_catalog(&entries, &config.archive.catalog_path)?;
    println!("Wrote {} catalog entries to {}", entries.len(), config.archive.catalog_path.display());

    let data = light_curve(&mut rng, entries[0].clone())?;
    let lc_path = lc_dir.join(light_curve_file_name(data.target.tic, data.sector));
    save_light_curve(&data, &lc_path)?;
    println!("Wrote {} cadences for TIC {} to {}", data.len(), data.target.tic, lc_path.display());

    config.save(Path::new(DEFAULT_CONFIG_FILE))?;
    println!("Wrote {DEFAULT_CONFIG_FILE}");
    Ok(())
}
