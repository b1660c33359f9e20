//! The two quick-look pipelines.
//!
//! Both are straight sequences of stages with no retries; the first failing
//! stage aborts the run and its error is returned with context attached.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::PipelineConfig;
use crate::data::catalog::{Catalog, TargetResolver};
use crate::data::extract::{light_curve_file_name, LightCurveArchive, LightCurveSource};
use crate::data::fits::{list_hdus, read_image, save_light_curve};
use crate::data::locator::FileLocator;
use crate::data::filter::GoodCadences;
use crate::data::model::{CalibratedImage, CatalogEntry, HduSummary, ImageHeader, TargetData};
use crate::stats::{display_range, normalize, DisplayRange};

// ---------------------------------------------------------------------------
// Image display
// ---------------------------------------------------------------------------

/// Everything the image view needs.
#[derive(Debug, Clone)]
pub struct ImageProduct {
    pub locator: FileLocator,
    pub hdus: Vec<HduSummary>,
    pub image: CalibratedImage,
    pub range: DisplayRange,
    pub title: String,
}

/// Plot title built from the header.
pub fn image_title(header: &ImageHeader) -> String {
    let mid_time = header.mid_time();
    match (header.sector, header.camera, header.ccd) {
        (Some(sector), Some(camera), Some(ccd)) => format!(
            "TESS Calibrated FFI for Sector {sector}, Camera {camera}, CCD {ccd}, \
             Timestamp {mid_time:.6} BTJD"
        ),
        _ => format!("Calibrated image, Timestamp {mid_time:.6} BTJD"),
    }
}

/// Open the configured FITS file, read the calibrated image and compute its
/// display range.
pub fn run_image_display(config: &PipelineConfig) -> Result<ImageProduct> {
    let source = config.image.selected();
    let locator = FileLocator::parse(&source).context("parsing image location")?;
    run_image_display_from(config, locator)
}

/// Same as [`run_image_display`] for an explicit locator (e.g. a file picked
/// in the UI).
pub fn run_image_display_from(config: &PipelineConfig, locator: FileLocator) -> Result<ImageProduct> {
    let fetched = locator
        .fetch()
        .with_context(|| format!("fetching {locator}"))?;

    if fetched.is_download() {
        log::info!("Downloaded {locator} to {}", fetched.path().display());
    }
    let hdus = list_hdus(fetched.path()).with_context(|| format!("listing HDUs of {locator}"))?;
    log::info!("Filename: {locator}");
    for hdu in &hdus {
        log::info!("{hdu}");
    }

    let image = read_image(fetched.path(), config.image.hdu)
        .with_context(|| format!("reading HDU {} of {locator}", config.image.hdu))?;
    // The downloaded copy, if any, is removed here.
    drop(fetched);

    log::info!("Image shape: ({}, {})", image.height(), image.width());
    log::info!("Mid-exposure time: {:.6} BTJD", image.header.mid_time());

    let range = display_range(
        &image.pixels,
        config.display.lower_percentile,
        config.display.upper_percentile,
    )
    .context("computing display range")?;
    log::info!(
        "Display range: {:.3} .. {:.3} ({}th to {}th percentile)",
        range.vmin,
        range.vmax,
        config.display.lower_percentile,
        config.display.upper_percentile
    );

    let title = image_title(&image.header);
    Ok(ImageProduct {
        locator,
        hdus,
        image,
        range,
        title,
    })
}

// ---------------------------------------------------------------------------
// Light-curve extraction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LightCurveProduct {
    pub data: TargetData,
    /// Where the record was persisted, if saving is configured.
    pub saved_to: Option<PathBuf>,
}

/// One normalized flux series of the stacked light-curve view.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFlux {
    pub label: &'static str,
    pub offset: f64,
    pub values: Vec<f64>,
}

/// Vertical offsets of the stacked view, top to bottom.
pub const STACK_OFFSETS: [(&str, f64); 4] = [
    ("raw", 0.06),
    ("corrected", 0.03),
    ("PCA", 0.0),
    ("PSF", -0.02),
];

/// Raw, corrected, PCA and PSF flux of the good cadences, each divided by its
/// median and shifted by its stack offset.
///
/// A series without a finite median (no good cadences, or all NaN) is left
/// out of the stack with a warning; the other series are still returned.
pub fn normalized_fluxes(good: &GoodCadences) -> Vec<NormalizedFlux> {
    let series = [&good.raw_flux, &good.corr_flux, &good.pca_flux, &good.psf_flux];
    STACK_OFFSETS
        .iter()
        .zip(series)
        .filter_map(|(&(label, offset), values)| match normalize(values, offset) {
            Ok(values) => Some(NormalizedFlux {
                label,
                offset,
                values,
            }),
            Err(err) => {
                log::warn!("Skipping {label} flux in the normalized stack: {err}");
                None
            }
        })
        .collect()
}

/// Log line announcing the resolved target.
pub fn describe_target(entry: &CatalogEntry) -> String {
    let gaia = entry
        .gaia
        .map(|g| g.to_string())
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "Found TIC {} (Gaia {gaia}), with TESS magnitude {}, RA {}, and Dec {}",
        entry.tic, entry.tess_mag, entry.ra, entry.dec
    )
}

/// Resolve, extract and persist using explicit capabilities.
pub fn extract_light_curve(
    config: &PipelineConfig,
    resolver: &dyn TargetResolver,
    source: &dyn LightCurveSource,
) -> Result<LightCurveProduct> {
    let query = &config.target.query;
    let target = resolver
        .resolve(query)
        .with_context(|| format!("resolving {query}"))?;
    log::info!("{}", describe_target(&target));

    let sector = config.target.sector;
    let data = source
        .extract(&target, sector, &config.aperture)
        .with_context(|| format!("extracting TIC {} sector {sector}", target.tic))?;
    log::info!("Background model: {}", data.bkg_type);
    log::info!(
        "{} cadences, {} with good quality",
        data.len(),
        data.good_cadences().len()
    );

    let saved_to = match &config.archive.output_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating output directory {}", dir.display()))?;
            let path = dir.join(light_curve_file_name(target.tic, sector));
            save_light_curve(&data, &path)
                .with_context(|| format!("saving light curve to {}", path.display()))?;
            log::info!("Saved light curve to {}", path.display());
            Some(path)
        }
        None => None,
    };

    Ok(LightCurveProduct { data, saved_to })
}

/// Resolve the configured target against the configured catalog and archive.
pub fn run_light_curve(config: &PipelineConfig) -> Result<LightCurveProduct> {
    let catalog = Catalog::from_csv(&config.archive.catalog_path, config.target.match_radius_arcsec)
        .with_context(|| format!("loading catalog {}", config.archive.catalog_path.display()))?;
    let archive = LightCurveArchive::from_config(&config.archive);
    extract_light_curve(config, &catalog, &archive)
}
