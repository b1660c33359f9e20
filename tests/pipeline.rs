use std::path::Path;

use approx::assert_relative_eq;
use ndarray::{Array2, Array3};

use tess_quicklook::config::{ApertureConfig, PipelineConfig};
use tess_quicklook::data::catalog::TargetQuery;
use tess_quicklook::data::export::export_table;
use tess_quicklook::data::extract::light_curve_file_name;
use tess_quicklook::data::fits::{read_light_curve, save_image, save_light_curve};
use tess_quicklook::data::model::{CalibratedImage, CatalogEntry, ImageHeader, TargetData};
use tess_quicklook::pipeline::{run_image_display, run_light_curve};

fn wasp_100() -> CatalogEntry {
    CatalogEntry {
        name: "WASP-100".to_string(),
        tic: 38846515,
        gaia: Some(4675352109658261376),
        tess_mag: 10.3,
        ra: 68.959732,
        dec: -64.02704,
    }
}

fn write_catalog(path: &Path) {
    let mut writer = csv::Writer::from_path(path).unwrap();
    writer.serialize(wasp_100()).unwrap();
    writer
        .serialize(CatalogEntry {
            name: "HD 21749".to_string(),
            tic: 279741379,
            gaia: None,
            tess_mag: 7.1,
            ra: 52.999786,
            dec: -63.491806,
        })
        .unwrap();
    writer.flush().unwrap();
}

/// 20 cadences of 5x5 frames; cadences 7 and 13 are flagged.
fn light_curve() -> TargetData {
    let n = 20;
    let time: Vec<f64> = (0..n).map(|i| 1325.3 + i as f64 * 0.02).collect();
    let quality: Vec<i32> = (0..n).map(|i| if i == 7 || i == 13 { 4 } else { 0 }).collect();
    let flux = |level: f64| vec![level; n];
    TargetData {
        target: wasp_100(),
        sector: 1,
        aperture_size: ApertureConfig {
            height: 5,
            width: 5,
            bkg_size: 31,
        },
        bkg_type: "PC_LEVEL".to_string(),
        time,
        quality,
        raw_flux: flux(12000.0),
        corr_flux: flux(11950.0),
        pca_flux: flux(11900.0),
        psf_flux: flux(12100.0),
        flux_bkg: flux(150.0),
        tpf_flux_bkg: flux(151.0),
        tpf: Array3::from_elem((n, 5, 5), 200.0),
        bkg_tpf: Array3::from_elem((n, 5, 5), 150.0),
        aperture: Array2::from_shape_fn((5, 5), |(r, c)| r == 2 && c == 2),
    }
}

#[test]
fn test_both_pipelines_against_local_files() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    // ---- Inputs ----
    let image_path = root.join("cutout.fits");
    let ramp = Array2::from_shape_fn((10, 10), |(r, c)| (r * 10 + c + 1) as f64);
    save_image(
        &CalibratedImage {
            pixels: ramp,
            header: ImageHeader {
                extname: None,
                tstart: 1325.2931,
                tstop: 1325.3139,
                sector: Some(1),
                camera: Some(4),
                ccd: Some(2),
                wcs: None,
            },
        },
        &image_path,
    )
    .unwrap();

    let catalog_path = root.join("catalog.csv");
    write_catalog(&catalog_path);

    let archive_dir = root.join("archive");
    std::fs::create_dir_all(&archive_dir).unwrap();
    save_light_curve(&light_curve(), &archive_dir.join(light_curve_file_name(38846515, 1))).unwrap();

    let mut config = PipelineConfig::default();
    config.image.local_path = image_path;
    config.target.query = TargetQuery::Coordinates {
        ra: 68.9598,
        dec: -64.0271,
    };
    config.aperture = ApertureConfig {
        height: 5,
        width: 5,
        bkg_size: 31,
    };
    config.archive.catalog_path = catalog_path;
    config.archive.light_curve_dir = archive_dir;
    config.archive.output_dir = Some(root.join("output"));

    // ---- Image display ----
    let image = run_image_display(&config).unwrap();
    assert_eq!((image.image.height(), image.image.width()), (10, 10));
    assert_relative_eq!(image.range.vmin, 4.96, epsilon = 1e-9);
    assert_relative_eq!(image.range.vmax, 98.02, epsilon = 1e-9);
    assert!(image.title.starts_with("TESS Calibrated FFI for Sector 1, Camera 4, CCD 2"));
    assert_eq!(image.hdus.len(), 2);

    // ---- Light curve ----
    let product = run_light_curve(&config).unwrap();
    assert_eq!(product.data.target.tic, 38846515);
    assert_eq!(product.data.good_cadences().len(), 18);

    let saved = product.saved_to.unwrap();
    let reread = read_light_curve(&saved).unwrap();
    assert_eq!(reread.quality, product.data.quality);
    assert_eq!(reread.aperture.iter().filter(|&&on| on).count(), 1);

    // ---- Table export ----
    let csv_path = root.join("output").join("wasp100.csv");
    export_table(&reread, &csv_path).unwrap();
    let rows = csv::Reader::from_path(&csv_path).unwrap().records().count();
    assert_eq!(rows, 20);
}

#[test]
fn test_wrong_cutout_size_aborts_light_curve() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let catalog_path = root.join("catalog.csv");
    write_catalog(&catalog_path);
    save_light_curve(&light_curve(), &root.join(light_curve_file_name(38846515, 1))).unwrap();

    let mut config = PipelineConfig::default();
    config.archive.catalog_path = catalog_path;
    config.archive.light_curve_dir = root.to_path_buf();
    config.archive.output_dir = Some(root.join("output"));

    // Default 15x15 cutout does not match the 5x5 file.
    let err = run_light_curve(&config).unwrap_err();
    assert!(format!("{err:#}").contains("target pixel file is 5x5, expected 15x15"));
    assert!(!root.join("output").exists());
}
