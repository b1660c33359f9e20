use std::fmt;

use ndarray::{Array2, Array3, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::config::ApertureConfig;

// ---------------------------------------------------------------------------
// HduSummary – one line of the file listing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum HduKind {
    /// Shape in FITS axis order (NAXIS1, NAXIS2, ...). Empty for a header-only HDU.
    Image { naxes: Vec<usize> },
    Table { rows: usize, columns: usize },
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HduSummary {
    pub index: usize,
    pub name: String,
    pub kind: HduKind,
}

impl fmt::Display for HduSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            HduKind::Image { naxes } if naxes.is_empty() => {
                write!(f, "{:>3}  {:<12} Image    (no data)", self.index, self.name)
            }
            HduKind::Image { naxes } => {
                let shape: Vec<String> = naxes.iter().map(|n| n.to_string()).collect();
                write!(f, "{:>3}  {:<12} Image    ({})", self.index, self.name, shape.join(" x "))
            }
            HduKind::Table { rows, columns } => write!(
                f,
                "{:>3}  {:<12} BinTable {rows} rows x {columns} cols",
                self.index, self.name
            ),
            HduKind::Other => write!(f, "{:>3}  {:<12} (unknown)", self.index, self.name),
        }
    }
}

// ---------------------------------------------------------------------------
// Calibrated image
// ---------------------------------------------------------------------------

/// Linear WCS keywords as found in the header. Kept for display only; no
/// projection math is done with them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WcsHeader {
    pub ctype: [String; 2],
    pub crval: [f64; 2],
    pub crpix: [f64; 2],
    /// `CDi_j` matrix, or `CDELTi` on the diagonal when no CD matrix exists.
    pub cd: [[f64; 2]; 2],
}

/// Header metadata of the calibrated image HDU.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageHeader {
    pub extname: Option<String>,
    /// Exposure start, BTJD.
    pub tstart: f64,
    /// Exposure end, BTJD.
    pub tstop: f64,
    pub sector: Option<i64>,
    pub camera: Option<i64>,
    pub ccd: Option<i64>,
    pub wcs: Option<WcsHeader>,
}

impl ImageHeader {
    /// Mid-point of the exposure.
    pub fn mid_time(&self) -> f64 {
        (self.tstop + self.tstart) / 2.0
    }
}

/// A 2-D calibrated image. Row 0 is the first row on disk, which is drawn at
/// the bottom.
#[derive(Debug, Clone)]
pub struct CalibratedImage {
    pub pixels: Array2<f64>,
    pub header: ImageHeader,
}

impl CalibratedImage {
    pub fn width(&self) -> usize {
        self.pixels.ncols()
    }

    pub fn height(&self) -> usize {
        self.pixels.nrows()
    }
}

// ---------------------------------------------------------------------------
// Catalog entry
// ---------------------------------------------------------------------------

/// A resolved star.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub tic: u64,
    pub gaia: Option<u64>,
    pub tess_mag: f64,
    /// Degrees.
    pub ra: f64,
    /// Degrees.
    pub dec: f64,
}

// ---------------------------------------------------------------------------
// TargetData – extracted time series for one target and sector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TargetData {
    pub target: CatalogEntry,
    pub sector: u32,
    /// Cutout and background box sizing the photometry was extracted with.
    pub aperture_size: ApertureConfig,
    /// Background model used upstream, e.g. `PC_LEVEL` or `TPF_LEVEL`.
    pub bkg_type: String,

    /// Cadence timestamps, BTJD.
    pub time: Vec<f64>,
    pub quality: Vec<i32>,
    pub raw_flux: Vec<f64>,
    pub corr_flux: Vec<f64>,
    pub pca_flux: Vec<f64>,
    pub psf_flux: Vec<f64>,
    /// 1-D background from the postcard.
    pub flux_bkg: Vec<f64>,
    /// 1-D background from the target pixel file.
    pub tpf_flux_bkg: Vec<f64>,

    /// Target pixel stack, (cadence, row, col).
    pub tpf: Array3<f64>,
    /// Interpolated 2-D background, (cadence, row, col).
    pub bkg_tpf: Array3<f64>,
    /// Pixels summed into the light curve, (row, col).
    pub aperture: Array2<bool>,
}

impl TargetData {
    /// Number of cadences.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Check that every per-cadence series has one value per cadence and the
    /// image stacks agree with each other.
    pub fn validate(&self) -> Result<(), String> {
        let n = self.len();
        let series: [(&str, usize); 7] = [
            ("QUALITY", self.quality.len()),
            ("RAW_FLUX", self.raw_flux.len()),
            ("CORR_FLUX", self.corr_flux.len()),
            ("PCA_FLUX", self.pca_flux.len()),
            ("PSF_FLUX", self.psf_flux.len()),
            ("FLUX_BKG", self.flux_bkg.len()),
            ("TPF_FLUX_BKG", self.tpf_flux_bkg.len()),
        ];
        for (name, len) in series {
            if len != n {
                return Err(format!("{name} has {len} values but TIME has {n}"));
            }
        }
        if self.tpf.dim().0 != n {
            return Err(format!("TPF has {} frames but TIME has {n}", self.tpf.dim().0));
        }
        if self.bkg_tpf.dim() != self.tpf.dim() {
            return Err(format!(
                "BKG_TPF shape {:?} differs from TPF shape {:?}",
                self.bkg_tpf.dim(),
                self.tpf.dim()
            ));
        }
        let (_, rows, cols) = self.tpf.dim();
        if self.aperture.dim() != (rows, cols) {
            return Err(format!(
                "APERTURE shape {:?} differs from TPF frame shape {:?}",
                self.aperture.dim(),
                (rows, cols)
            ));
        }
        Ok(())
    }

    /// First TPF frame, if any.
    pub fn first_tpf_frame(&self) -> Option<ArrayView2<'_, f64>> {
        (self.tpf.dim().0 > 0).then(|| self.tpf.index_axis(ndarray::Axis(0), 0))
    }

    /// First 2-D background frame, if any.
    pub fn first_bkg_frame(&self) -> Option<ArrayView2<'_, f64>> {
        (self.bkg_tpf.dim().0 > 0).then(|| self.bkg_tpf.index_axis(ndarray::Axis(0), 0))
    }
}
