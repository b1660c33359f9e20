use std::path::PathBuf;

use thiserror::Error;

use super::fits::{read_light_curve, FitsError};
use super::locator::{FetchError, FileLocator};
use super::model::{CatalogEntry, TargetData};
use crate::config::{ApertureConfig, ArchiveConfig};

/// Version tag in archive light-curve file names.
pub const LC_FORMAT_VERSION: &str = "0.2.8";

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Fits(#[from] FitsError),
    #[error("light curve file is for TIC {found}, expected TIC {expected}")]
    WrongTarget { expected: u64, found: u64 },
    #[error("light curve file is for sector {found}, expected sector {expected}")]
    WrongSector { expected: u32, found: u32 },
    #[error("target pixel file is {found_height}x{found_width}, expected {height}x{width}")]
    CutoutSize {
        height: usize,
        width: usize,
        found_height: usize,
        found_width: usize,
    },
}

/// Capability: produce the extracted time series of one target in one sector.
pub trait LightCurveSource {
    fn extract(
        &self,
        target: &CatalogEntry,
        sector: u32,
        aperture: &ApertureConfig,
    ) -> Result<TargetData, ExtractError>;
}

/// Archive file name of the light curve for `tic` in `sector`.
pub fn light_curve_file_name(tic: u64, sector: u32) -> String {
    format!("hlsp_eleanor_tess_ffi_tic{tic}_s{sector:02}_tess_v{LC_FORMAT_VERSION}_lc.fits")
}

// ---------------------------------------------------------------------------
// Archive of extracted light-curve files
// ---------------------------------------------------------------------------

/// Light-curve files stored either in a local directory or under a base URL.
/// Exactly one location is consulted.
#[derive(Debug, Clone, PartialEq)]
pub enum LightCurveArchive {
    Directory(PathBuf),
    Remote(String),
}

impl LightCurveArchive {
    pub fn from_config(config: &ArchiveConfig) -> Self {
        match &config.remote_base_url {
            Some(base) => LightCurveArchive::Remote(base.clone()),
            None => LightCurveArchive::Directory(config.light_curve_dir.clone()),
        }
    }

    pub fn locate(&self, tic: u64, sector: u32) -> Result<FileLocator, FetchError> {
        let file_name = light_curve_file_name(tic, sector);
        match self {
            LightCurveArchive::Directory(dir) => Ok(FileLocator::Local(dir.join(file_name))),
            LightCurveArchive::Remote(base) => {
                FileLocator::parse(&format!("{}/{file_name}", base.trim_end_matches('/')))
            }
        }
    }
}

/// Compare a loaded record against what was asked for.
///
/// The cutout size must match; a different background box only warns since
/// it does not change the shape of anything that is plotted.
pub fn check_extraction(
    data: &TargetData,
    target: &CatalogEntry,
    sector: u32,
    aperture: &ApertureConfig,
) -> Result<(), ExtractError> {
    if data.target.tic != target.tic {
        return Err(ExtractError::WrongTarget {
            expected: target.tic,
            found: data.target.tic,
        });
    }
    if data.sector != sector {
        return Err(ExtractError::WrongSector {
            expected: sector,
            found: data.sector,
        });
    }
    let (_, rows, cols) = data.tpf.dim();
    if (rows, cols) != (aperture.height, aperture.width) {
        return Err(ExtractError::CutoutSize {
            height: aperture.height,
            width: aperture.width,
            found_height: rows,
            found_width: cols,
        });
    }
    if data.aperture_size.bkg_size != aperture.bkg_size {
        log::warn!(
            "Background box is {} px in the file but {} px was requested",
            data.aperture_size.bkg_size,
            aperture.bkg_size
        );
    }
    Ok(())
}

impl LightCurveSource for LightCurveArchive {
    fn extract(
        &self,
        target: &CatalogEntry,
        sector: u32,
        aperture: &ApertureConfig,
    ) -> Result<TargetData, ExtractError> {
        let locator = self.locate(target.tic, sector)?;
        log::info!("Reading light curve for TIC {} sector {sector} from {locator}", target.tic);

        let fetched = locator.fetch()?;
        let data = read_light_curve(fetched.path())?;
        check_extraction(&data, target, sector, aperture)?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fits::save_light_curve;
    use crate::data::model::fixtures::{target_data, wasp_100};

    fn cutout(height: usize, width: usize) -> ApertureConfig {
        ApertureConfig {
            height,
            width,
            bkg_size: 31,
        }
    }

    #[test]
    fn test_file_name_pads_sector() {
        assert_eq!(
            light_curve_file_name(38846515, 1),
            "hlsp_eleanor_tess_ffi_tic38846515_s01_tess_v0.2.8_lc.fits"
        );
    }

    #[test]
    fn test_remote_archive_joins_base_url() {
        let archive = LightCurveArchive::Remote("https://example.org/hlsp/".to_string());
        let locator = archive.locate(38846515, 12).unwrap();
        assert_eq!(
            locator.to_string(),
            "https://example.org/hlsp/hlsp_eleanor_tess_ffi_tic38846515_s12_tess_v0.2.8_lc.fits"
        );
    }

    #[test]
    fn test_config_selects_exactly_one_location() {
        let mut config = ArchiveConfig::default();
        assert!(matches!(
            LightCurveArchive::from_config(&config),
            LightCurveArchive::Directory(_)
        ));
        config.remote_base_url = Some("https://example.org".to_string());
        assert!(matches!(
            LightCurveArchive::from_config(&config),
            LightCurveArchive::Remote(_)
        ));
    }

    #[test]
    fn test_extract_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let data = target_data(3);
        save_light_curve(&data, &dir.path().join(light_curve_file_name(38846515, 1))).unwrap();

        let archive = LightCurveArchive::Directory(dir.path().to_path_buf());
        let extracted = archive.extract(&wasp_100(), 1, &cutout(3, 3)).unwrap();
        assert_eq!(extracted.len(), 3);
        assert_eq!(extracted.corr_flux, data.corr_flux);
    }

    #[test]
    fn test_missing_sector_is_a_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = LightCurveArchive::Directory(dir.path().to_path_buf());
        assert!(matches!(
            archive.extract(&wasp_100(), 2, &cutout(3, 3)),
            Err(ExtractError::Fetch(FetchError::NotFound(_)))
        ));
    }

    #[test]
    fn test_check_rejects_wrong_cutout_size() {
        let data = target_data(2);
        let err = check_extraction(&data, &wasp_100(), 1, &cutout(15, 15)).unwrap_err();
        assert_eq!(err.to_string(), "target pixel file is 3x3, expected 15x15");
    }

    #[test]
    fn test_check_rejects_wrong_target_and_sector() {
        let data = target_data(2);
        let mut other = wasp_100();
        other.tic = 1;
        assert!(matches!(
            check_extraction(&data, &other, 1, &cutout(3, 3)),
            Err(ExtractError::WrongTarget { expected: 1, found: 38846515 })
        ));
        assert!(matches!(
            check_extraction(&data, &wasp_100(), 5, &cutout(3, 3)),
            Err(ExtractError::WrongSector { expected: 5, found: 1 })
        ));
    }

    #[test]
    fn test_different_background_box_is_accepted() {
        let data = target_data(2);
        let aperture = ApertureConfig {
            height: 3,
            width: 3,
            bkg_size: 15,
        };
        assert!(check_extraction(&data, &wasp_100(), 1, &aperture).is_ok());
    }
}
