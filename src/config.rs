use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::catalog::TargetQuery;

/// File looked up in the working directory at startup.
pub const DEFAULT_CONFIG_FILE: &str = "tess-quicklook.json";

// ---------------------------------------------------------------------------
// Pipeline configuration
// ---------------------------------------------------------------------------

/// Everything both pipelines need, passed explicitly into each entry function.
///
/// Every field has a default so a partial JSON file is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub image: ImageSourceConfig,
    pub display: DisplayConfig,
    pub target: TargetConfig,
    pub aperture: ApertureConfig,
    pub archive: ArchiveConfig,
}

/// Where the image pipeline reads its FITS file from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSourceConfig {
    /// `true` reads `local_path`, `false` reads `remote_url`.
    pub use_local: bool,
    pub local_path: PathBuf,
    pub remote_url: String,
    /// HDU holding the calibrated image.
    pub hdu: usize,
}

impl Default for ImageSourceConfig {
    fn default() -> Self {
        Self {
            use_local: true,
            local_path: PathBuf::from("sample_data/tess-s0001-4-2_cutout.fits"),
            remote_url: "https://archive.stsci.edu/missions/tess/ffi/s0001/2018/206/4-2/\
                         tess2018206192942-s0001-4-2-0120-s_ffic.fits"
                .to_string(),
            hdu: 1,
        }
    }
}

impl ImageSourceConfig {
    /// The locator string selected by `use_local`.
    pub fn selected(&self) -> String {
        if self.use_local {
            self.local_path.display().to_string()
        } else {
            self.remote_url.clone()
        }
    }
}

/// Percentiles used for the display stretch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub lower_percentile: f64,
    pub upper_percentile: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            lower_percentile: 4.0,
            upper_percentile: 98.0,
        }
    }
}

/// Which star and sector the light-curve pipeline extracts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub query: TargetQuery,
    pub sector: u32,
    /// Search radius for coordinate queries.
    pub match_radius_arcsec: f64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            query: TargetQuery::Name("WASP-100".to_string()),
            sector: 1,
            match_radius_arcsec: 21.0,
        }
    }
}

/// Target pixel file cutout and background box sizing, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApertureConfig {
    pub height: usize,
    pub width: usize,
    pub bkg_size: usize,
}

impl Default for ApertureConfig {
    fn default() -> Self {
        Self {
            height: 15,
            width: 15,
            bkg_size: 31,
        }
    }
}

/// Catalog, light-curve archive and output locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub catalog_path: PathBuf,
    /// Directory holding extracted light-curve files.
    pub light_curve_dir: PathBuf,
    /// When set, light-curve files are downloaded from this base URL instead
    /// of read from `light_curve_dir`.
    pub remote_base_url: Option<String>,
    /// Where the extracted record is saved. `None` skips saving.
    pub output_dir: Option<PathBuf>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("sample_data/catalog.csv"),
            light_curve_dir: PathBuf::from("sample_data/lightcurves"),
            remote_base_url: None,
            output_dir: Some(PathBuf::from("output")),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading / saving
// ---------------------------------------------------------------------------

impl PipelineConfig {
    /// Read a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Read `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            log::info!("Loading configuration from {}", path.display());
            Self::load(path)
        } else {
            log::info!("No {} found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Write the config as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("serialising config")?;
        std::fs::write(path, text).with_context(|| format!("writing config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_quicklook_settings() {
        let config = PipelineConfig::default();
        assert!(config.image.use_local);
        assert_eq!(config.image.hdu, 1);
        assert_eq!(config.display.lower_percentile, 4.0);
        assert_eq!(config.display.upper_percentile, 98.0);
        assert_eq!(config.target.sector, 1);
        assert_eq!(config.aperture, ApertureConfig { height: 15, width: 15, bkg_size: 31 });
    }

    #[test]
    fn test_partial_json_fills_in_defaults() {
        let json = r#"{
            "image": { "use_local": false },
            "target": { "query": { "tic": 38846515 }, "sector": 2 }
        }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert!(!config.image.use_local);
        assert!(config.image.selected().starts_with("https://"));
        assert_eq!(config.target.query, TargetQuery::Tic(38846515));
        assert_eq!(config.target.sector, 2);
        assert_eq!(config.target.match_radius_arcsec, 21.0);
        assert_eq!(config.aperture.bkg_size, 31);
    }

    #[test]
    fn test_coordinate_query_json_shape() {
        let json = r#"{ "target": { "query": { "coordinates": { "ra": 68.959732, "dec": -64.02704 } } } }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.target.query,
            TargetQuery::Coordinates { ra: 68.959732, dec: -64.02704 }
        );
    }

    #[test]
    fn test_save_then_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);

        let mut config = PipelineConfig::default();
        config.display.upper_percentile = 99.5;
        config.archive.remote_base_url = Some("https://example.org/lc".to_string());
        config.save(&path).unwrap();

        assert_eq!(PipelineConfig::load_or_default(&path).unwrap(), config);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, r#"{ "display": { "lower_percentile": "four" } }"#).unwrap();

        let err = PipelineConfig::load_or_default(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parsing config"));
        // The file is left as it was.
        assert!(std::fs::read_to_string(&path).unwrap().contains("four"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }
}
