//! FITS reading and writing.
//!
//! Every function opens its own [`FitsFile`] and lets it drop before
//! returning, so the handle is released on success and on every error path.
//!
//! Light-curve file layout:
//!
//! | HDU | EXTNAME      | Content                                               |
//! |-----|--------------|-------------------------------------------------------|
//! | 0   | (primary)    | `OBJECT`, `TIC_ID`, `GAIA_ID`, `TESSMAG`, `RA_OBJ`, `DEC_OBJ`, `SECTOR`, `BKG_TYPE`, `AP_HEIGHT`, `AP_WIDTH`, `BKG_SIZE` |
//! | 1   | `LIGHTCURVE` | `TIME`, `QUALITY`, `RAW_FLUX`, `CORR_FLUX`, `PCA_FLUX`, `PSF_FLUX`, `FLUX_BKG`, `TPF_FLUX_BKG` |
//! | 2   | `TPF`        | cube, NAXIS1 = col, NAXIS2 = row, NAXIS3 = cadence     |
//! | 3   | `BKG_TPF`    | cube, same shape as `TPF`                              |
//! | 4   | `APERTURE`   | 32-bit integer mask, 1 = pixel in aperture             |

use std::path::Path;

use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::images::{ImageDescription, ImageType};
use fitsio::tables::{ColumnDataType, ColumnDescription};
use fitsio::FitsFile;
use ndarray::{Array2, Array3};
use thiserror::Error;

use super::model::{
    CalibratedImage, CatalogEntry, HduKind, HduSummary, ImageHeader, TargetData, WcsHeader,
};
use crate::config::ApertureConfig;

/// Errors that can occur during FITS file operations
#[derive(Error, Debug)]
pub enum FitsError {
    #[error("FITS I/O error: {0}")]
    FitsIo(#[from] fitsio::errors::Error),
    #[error("HDU not found: {0}")]
    HduNotFound(String),
    #[error("HDU {0} is not an image")]
    NotAnImage(String),
    #[error("missing header keyword {key} in HDU {hdu}")]
    MissingKeyword { hdu: String, key: String },
    #[error("unexpected data shape in HDU {hdu}: {detail}")]
    Shape { hdu: String, detail: String },
    #[error("inconsistent light curve: {0}")]
    Inconsistent(String),
}

const LIGHTCURVE_EXT: &str = "LIGHTCURVE";
const TPF_EXT: &str = "TPF";
const BKG_TPF_EXT: &str = "BKG_TPF";
const APERTURE_EXT: &str = "APERTURE";
const IMAGE_EXT: &str = "CALIBRATED";

// ---------------------------------------------------------------------------
// Header helpers
// ---------------------------------------------------------------------------

fn hdu_label(fptr: &mut FitsFile, hdu: &FitsHdu, index: usize) -> String {
    if index == 0 {
        return "PRIMARY".to_string();
    }
    hdu.read_key::<String>(fptr, "EXTNAME")
        .map(|name| name.trim().to_string())
        .unwrap_or_else(|_| format!("HDU{index}"))
}

fn optional_key<T: fitsio::headers::ReadsKey>(
    fptr: &mut FitsFile,
    hdu: &FitsHdu,
    key: &str,
) -> Option<T> {
    hdu.read_key::<T>(fptr, key).ok()
}

fn required_key<T: fitsio::headers::ReadsKey>(
    fptr: &mut FitsFile,
    hdu: &FitsHdu,
    hdu_name: &str,
    key: &str,
) -> Result<T, FitsError> {
    hdu.read_key::<T>(fptr, key)
        .map_err(|_| FitsError::MissingKeyword {
            hdu: hdu_name.to_string(),
            key: key.to_string(),
        })
}

/// `NAXISn` values in FITS order (NAXIS1 first, fastest varying).
fn naxes(fptr: &mut FitsFile, hdu: &FitsHdu, hdu_name: &str) -> Result<Vec<usize>, FitsError> {
    let naxis: i64 = required_key(fptr, hdu, hdu_name, "NAXIS")?;
    (1..=naxis)
        .map(|i| {
            required_key::<i64>(fptr, hdu, hdu_name, &format!("NAXIS{i}")).map(|n| n as usize)
        })
        .collect()
}

fn named_hdu(fptr: &mut FitsFile, name: &str) -> Result<FitsHdu, FitsError> {
    fptr.hdu(name)
        .map_err(|_| FitsError::HduNotFound(name.to_string()))
}

fn read_wcs(fptr: &mut FitsFile, hdu: &FitsHdu) -> Option<WcsHeader> {
    let ctype1: String = optional_key(fptr, hdu, "CTYPE1")?;
    let ctype2: String = optional_key(fptr, hdu, "CTYPE2")?;
    let mut key = |name: &str| optional_key::<f64>(fptr, hdu, name);

    let crval = [key("CRVAL1")?, key("CRVAL2")?];
    let crpix = [key("CRPIX1")?, key("CRPIX2")?];
    let cd = match (key("CD1_1"), key("CD1_2"), key("CD2_1"), key("CD2_2")) {
        (Some(a), Some(b), Some(c), Some(d)) => [[a, b], [c, d]],
        _ => [
            [key("CDELT1").unwrap_or(0.0), 0.0],
            [0.0, key("CDELT2").unwrap_or(0.0)],
        ],
    };

    Some(WcsHeader {
        ctype: [ctype1.trim().to_string(), ctype2.trim().to_string()],
        crval,
        crpix,
        cd,
    })
}

// ---------------------------------------------------------------------------
// File listing
// ---------------------------------------------------------------------------

/// One summary line per HDU.
pub fn list_hdus(path: &Path) -> Result<Vec<HduSummary>, FitsError> {
    let mut fptr = FitsFile::open(path)?;
    let mut summaries = Vec::new();

    let mut index = 0;
    while let Ok(hdu) = fptr.hdu(index) {
        let name = hdu_label(&mut fptr, &hdu, index);
        let kind = match &hdu.info {
            HduInfo::ImageInfo { .. } => HduKind::Image {
                naxes: naxes(&mut fptr, &hdu, &name)?,
            },
            HduInfo::TableInfo {
                column_descriptions,
                num_rows,
            } => HduKind::Table {
                rows: *num_rows,
                columns: column_descriptions.len(),
            },
            _ => HduKind::Other,
        };
        summaries.push(HduSummary { index, name, kind });
        index += 1;
    }

    Ok(summaries)
}

// ---------------------------------------------------------------------------
// Calibrated image
// ---------------------------------------------------------------------------

/// Read the 2-D image and its header from HDU `hdu_index`.
///
/// `SECTOR`, `CAMERA` and `CCD` are taken from the image HDU when present and
/// from the primary header otherwise. `TSTART`/`TSTOP` are required.
pub fn read_image(path: &Path, hdu_index: usize) -> Result<CalibratedImage, FitsError> {
    let mut fptr = FitsFile::open(path)?;
    let hdu = fptr
        .hdu(hdu_index)
        .map_err(|_| FitsError::HduNotFound(format!("#{hdu_index}")))?;
    let name = hdu_label(&mut fptr, &hdu, hdu_index);

    if !matches!(hdu.info, HduInfo::ImageInfo { .. }) {
        return Err(FitsError::NotAnImage(name));
    }
    let (width, height) = match naxes(&mut fptr, &hdu, &name)?.as_slice() {
        [w, h] => (*w, *h),
        other => {
            return Err(FitsError::Shape {
                hdu: name,
                detail: format!("expected a 2-D image, found NAXIS = {}", other.len()),
            })
        }
    };

    let data: Vec<f64> = hdu.read_image(&mut fptr)?;
    let pixels = Array2::from_shape_vec((height, width), data).map_err(|e| FitsError::Shape {
        hdu: name.clone(),
        detail: e.to_string(),
    })?;

    let primary = fptr.primary_hdu()?;
    let mut id_key = |key: &str| {
        optional_key::<i64>(&mut fptr, &hdu, key).or_else(|| optional_key(&mut fptr, &primary, key))
    };
    let sector = id_key("SECTOR");
    let camera = id_key("CAMERA");
    let ccd = id_key("CCD");

    let header = ImageHeader {
        extname: (hdu_index > 0).then(|| name.clone()),
        tstart: required_key(&mut fptr, &hdu, &name, "TSTART")?,
        tstop: required_key(&mut fptr, &hdu, &name, "TSTOP")?,
        sector,
        camera,
        ccd,
        wcs: read_wcs(&mut fptr, &hdu),
    };

    Ok(CalibratedImage { pixels, header })
}

/// Write `image` as a primary header plus one `CALIBRATED` image extension.
pub fn save_image(image: &CalibratedImage, path: &Path) -> Result<(), FitsError> {
    let mut fptr = FitsFile::create(path).overwrite().open()?;

    let primary = fptr.primary_hdu()?;
    let ids = [
        ("SECTOR", image.header.sector),
        ("CAMERA", image.header.camera),
        ("CCD", image.header.ccd),
    ];
    for (key, value) in ids {
        if let Some(value) = value {
            primary.write_key(&mut fptr, key, value)?;
        }
    }

    let (height, width) = image.pixels.dim();
    let description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: &[height, width],
    };
    let extname = image.header.extname.as_deref().unwrap_or(IMAGE_EXT);
    let hdu = fptr.create_image(extname.to_string(), &description)?;
    let flat: Vec<f64> = image.pixels.iter().copied().collect();
    hdu.write_image(&mut fptr, &flat)?;

    hdu.write_key(&mut fptr, "TSTART", image.header.tstart)?;
    hdu.write_key(&mut fptr, "TSTOP", image.header.tstop)?;
    if let Some(wcs) = &image.header.wcs {
        hdu.write_key(&mut fptr, "CTYPE1", wcs.ctype[0].as_str())?;
        hdu.write_key(&mut fptr, "CTYPE2", wcs.ctype[1].as_str())?;
        let numeric = [
            ("CRVAL1", wcs.crval[0]),
            ("CRVAL2", wcs.crval[1]),
            ("CRPIX1", wcs.crpix[0]),
            ("CRPIX2", wcs.crpix[1]),
            ("CD1_1", wcs.cd[0][0]),
            ("CD1_2", wcs.cd[0][1]),
            ("CD2_1", wcs.cd[1][0]),
            ("CD2_2", wcs.cd[1][1]),
        ];
        for (key, value) in numeric {
            hdu.write_key(&mut fptr, key, value)?;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Light-curve files
// ---------------------------------------------------------------------------

fn read_cube(fptr: &mut FitsFile, name: &str) -> Result<Array3<f64>, FitsError> {
    let hdu = named_hdu(fptr, name)?;
    let (cols, rows, frames) = match naxes(fptr, &hdu, name)?.as_slice() {
        [c, r, n] => (*c, *r, *n),
        other => {
            return Err(FitsError::Shape {
                hdu: name.to_string(),
                detail: format!("expected a 3-D cube, found NAXIS = {}", other.len()),
            })
        }
    };
    let data: Vec<f64> = hdu.read_image(fptr)?;
    Array3::from_shape_vec((frames, rows, cols), data).map_err(|e| FitsError::Shape {
        hdu: name.to_string(),
        detail: e.to_string(),
    })
}

fn read_mask(fptr: &mut FitsFile, name: &str) -> Result<Array2<bool>, FitsError> {
    let hdu = named_hdu(fptr, name)?;
    let (cols, rows) = match naxes(fptr, &hdu, name)?.as_slice() {
        [c, r] => (*c, *r),
        other => {
            return Err(FitsError::Shape {
                hdu: name.to_string(),
                detail: format!("expected a 2-D mask, found NAXIS = {}", other.len()),
            })
        }
    };
    let data: Vec<i32> = hdu.read_image(fptr)?;
    let mask: Vec<bool> = data.into_iter().map(|v| v != 0).collect();
    Array2::from_shape_vec((rows, cols), mask).map_err(|e| FitsError::Shape {
        hdu: name.to_string(),
        detail: e.to_string(),
    })
}

/// Read a light-curve file written by [`save_light_curve`] (or the upstream
/// extraction with the same layout).
pub fn read_light_curve(path: &Path) -> Result<TargetData, FitsError> {
    let mut fptr = FitsFile::open(path)?;

    let primary = fptr.primary_hdu()?;
    let p = "PRIMARY";
    let tic: i64 = required_key(&mut fptr, &primary, p, "TIC_ID")?;
    let target = CatalogEntry {
        name: optional_key::<String>(&mut fptr, &primary, "OBJECT")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| format!("TIC {tic}")),
        tic: tic as u64,
        gaia: optional_key::<i64>(&mut fptr, &primary, "GAIA_ID").map(|g| g as u64),
        tess_mag: required_key(&mut fptr, &primary, p, "TESSMAG")?,
        ra: required_key(&mut fptr, &primary, p, "RA_OBJ")?,
        dec: required_key(&mut fptr, &primary, p, "DEC_OBJ")?,
    };
    let sector: i64 = required_key(&mut fptr, &primary, p, "SECTOR")?;
    let bkg_type = optional_key::<String>(&mut fptr, &primary, "BKG_TYPE")
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let aperture_size = ApertureConfig {
        height: required_key::<i64>(&mut fptr, &primary, p, "AP_HEIGHT")? as usize,
        width: required_key::<i64>(&mut fptr, &primary, p, "AP_WIDTH")? as usize,
        bkg_size: required_key::<i64>(&mut fptr, &primary, p, "BKG_SIZE")? as usize,
    };

    let table = named_hdu(&mut fptr, LIGHTCURVE_EXT)?;
    let time: Vec<f64> = table.read_col(&mut fptr, "TIME")?;
    let quality: Vec<i32> = table.read_col(&mut fptr, "QUALITY")?;
    let raw_flux: Vec<f64> = table.read_col(&mut fptr, "RAW_FLUX")?;
    let corr_flux: Vec<f64> = table.read_col(&mut fptr, "CORR_FLUX")?;
    let pca_flux: Vec<f64> = table.read_col(&mut fptr, "PCA_FLUX")?;
    let psf_flux: Vec<f64> = table.read_col(&mut fptr, "PSF_FLUX")?;
    let flux_bkg: Vec<f64> = table.read_col(&mut fptr, "FLUX_BKG")?;
    let tpf_flux_bkg: Vec<f64> = table.read_col(&mut fptr, "TPF_FLUX_BKG")?;

    let data = TargetData {
        target,
        sector: sector as u32,
        aperture_size,
        bkg_type,
        time,
        quality,
        raw_flux,
        corr_flux,
        pca_flux,
        psf_flux,
        flux_bkg,
        tpf_flux_bkg,
        tpf: read_cube(&mut fptr, TPF_EXT)?,
        bkg_tpf: read_cube(&mut fptr, BKG_TPF_EXT)?,
        aperture: read_mask(&mut fptr, APERTURE_EXT)?,
    };
    data.validate().map_err(FitsError::Inconsistent)?;
    Ok(data)
}

fn write_cube(fptr: &mut FitsFile, name: &str, cube: &Array3<f64>) -> Result<(), FitsError> {
    let (frames, rows, cols) = cube.dim();
    let description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: &[frames, rows, cols],
    };
    let hdu = fptr.create_image(name.to_string(), &description)?;
    let flat: Vec<f64> = cube.iter().copied().collect();
    hdu.write_image(fptr, &flat)?;
    Ok(())
}

/// Persist the full record in the light-curve layout described above.
/// An existing file at `path` is replaced.
pub fn save_light_curve(data: &TargetData, path: &Path) -> Result<(), FitsError> {
    data.validate().map_err(FitsError::Inconsistent)?;
    let mut fptr = FitsFile::create(path).overwrite().open()?;

    let primary = fptr.primary_hdu()?;
    primary.write_key(&mut fptr, "OBJECT", data.target.name.as_str())?;
    primary.write_key(&mut fptr, "TIC_ID", data.target.tic as i64)?;
    if let Some(gaia) = data.target.gaia {
        primary.write_key(&mut fptr, "GAIA_ID", gaia as i64)?;
    }
    primary.write_key(&mut fptr, "TESSMAG", data.target.tess_mag)?;
    primary.write_key(&mut fptr, "RA_OBJ", data.target.ra)?;
    primary.write_key(&mut fptr, "DEC_OBJ", data.target.dec)?;
    primary.write_key(&mut fptr, "SECTOR", i64::from(data.sector))?;
    primary.write_key(&mut fptr, "BKG_TYPE", data.bkg_type.as_str())?;
    primary.write_key(&mut fptr, "AP_HEIGHT", data.aperture_size.height as i64)?;
    primary.write_key(&mut fptr, "AP_WIDTH", data.aperture_size.width as i64)?;
    primary.write_key(&mut fptr, "BKG_SIZE", data.aperture_size.bkg_size as i64)?;

    let float_columns: [(&str, &[f64]); 7] = [
        ("TIME", &data.time),
        ("RAW_FLUX", &data.raw_flux),
        ("CORR_FLUX", &data.corr_flux),
        ("PCA_FLUX", &data.pca_flux),
        ("PSF_FLUX", &data.psf_flux),
        ("FLUX_BKG", &data.flux_bkg),
        ("TPF_FLUX_BKG", &data.tpf_flux_bkg),
    ];
    let mut descriptions = vec![ColumnDescription::new("QUALITY")
        .with_type(ColumnDataType::Int)
        .create()?];
    for (name, _) in &float_columns {
        descriptions.push(
            ColumnDescription::new(*name)
                .with_type(ColumnDataType::Double)
                .create()?,
        );
    }
    let table = fptr.create_table(LIGHTCURVE_EXT.to_string(), &descriptions)?;
    table.write_col(&mut fptr, "QUALITY", &data.quality)?;
    for (name, values) in float_columns {
        table.write_col(&mut fptr, name, values)?;
    }

    write_cube(&mut fptr, TPF_EXT, &data.tpf)?;
    write_cube(&mut fptr, BKG_TPF_EXT, &data.bkg_tpf)?;

    let (rows, cols) = data.aperture.dim();
    let description = ImageDescription {
        data_type: ImageType::Long,
        dimensions: &[rows, cols],
    };
    let hdu = fptr.create_image(APERTURE_EXT.to_string(), &description)?;
    let mask: Vec<i32> = data.aperture.iter().map(|&inside| i32::from(inside)).collect();
    hdu.write_image(&mut fptr, &mask)?;

    Ok(())
}
