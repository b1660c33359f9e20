use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::CatalogEntry;

// ---------------------------------------------------------------------------
// Target query
// ---------------------------------------------------------------------------

/// One way of identifying a star. Exactly one identifier is tried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetQuery {
    /// Common name, e.g. `WASP-100`.
    Name(String),
    /// TESS Input Catalog id.
    Tic(u64),
    /// Gaia source id.
    Gaia(u64),
    /// ICRS position in degrees.
    Coordinates { ra: f64, dec: f64 },
}

impl fmt::Display for TargetQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetQuery::Name(name) => write!(f, "name '{name}'"),
            TargetQuery::Tic(tic) => write!(f, "TIC {tic}"),
            TargetQuery::Gaia(gaia) => write!(f, "Gaia {gaia}"),
            TargetQuery::Coordinates { ra, dec } => write!(f, "RA {ra:.6}, Dec {dec:.6}"),
        }
    }
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("reading catalog: {0}")]
    Csv(#[from] csv::Error),
    #[error("no catalog entry for {0}")]
    NotFound(TargetQuery),
}

/// Capability: turn a query into a catalog entry.
pub trait TargetResolver {
    fn resolve(&self, query: &TargetQuery) -> Result<CatalogEntry, CatalogError>;
}

// ---------------------------------------------------------------------------
// CSV-backed catalog
// ---------------------------------------------------------------------------

/// An in-memory star catalog.
///
/// CSV layout: header `name,tic,gaia,tess_mag,ra,dec`; `gaia` may be empty.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    /// Largest separation accepted for coordinate queries.
    match_radius_arcsec: f64,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>, match_radius_arcsec: f64) -> Self {
        Self {
            entries,
            match_radius_arcsec,
        }
    }

    pub fn from_csv(path: &Path, match_radius_arcsec: f64) -> Result<Self, CatalogError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        let entries = reader
            .deserialize::<CatalogEntry>()
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("Loaded {} catalog entries from {}", entries.len(), path.display());
        Ok(Self::new(entries, match_radius_arcsec))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn nearest(&self, ra: f64, dec: f64) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .map(|e| (angular_separation_deg(ra, dec, e.ra, e.dec) * 3600.0, e))
            .filter(|(sep, _)| *sep <= self.match_radius_arcsec)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, e)| e)
    }
}

impl TargetResolver for Catalog {
    fn resolve(&self, query: &TargetQuery) -> Result<CatalogEntry, CatalogError> {
        let found = match query {
            TargetQuery::Name(name) => {
                let wanted = name.trim();
                self.entries
                    .iter()
                    .find(|e| e.name.trim().eq_ignore_ascii_case(wanted))
            }
            TargetQuery::Tic(tic) => self.entries.iter().find(|e| e.tic == *tic),
            TargetQuery::Gaia(gaia) => self.entries.iter().find(|e| e.gaia == Some(*gaia)),
            TargetQuery::Coordinates { ra, dec } => self.nearest(*ra, *dec),
        };
        found
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(query.clone()))
    }
}

/// Great-circle separation in degrees (haversine form).
pub fn angular_separation_deg(ra1: f64, dec1: f64, ra2: f64, dec2: f64) -> f64 {
    let (ra1, dec1, ra2, dec2) = (
        ra1.to_radians(),
        dec1.to_radians(),
        ra2.to_radians(),
        dec2.to_radians(),
    );
    let h = ((dec2 - dec1) / 2.0).sin().powi(2)
        + dec1.cos() * dec2.cos() * ((ra2 - ra1) / 2.0).sin().powi(2);
    (2.0 * h.sqrt().min(1.0).asin()).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

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

    fn catalog() -> Catalog {
        let neighbour = CatalogEntry {
            name: "TIC 38846514".to_string(),
            tic: 38846514,
            gaia: None,
            tess_mag: 13.1,
            ra: 68.9640,
            dec: -64.0270,
        };
        Catalog::new(vec![neighbour, wasp_100()], 21.0)
    }

    #[test]
    fn test_resolve_by_name_is_case_insensitive() {
        let entry = catalog()
            .resolve(&TargetQuery::Name("  wasp-100 ".to_string()))
            .unwrap();
        assert_eq!(entry.tic, 38846515);
    }

    #[test]
    fn test_resolve_by_ids() {
        let cat = catalog();
        assert_eq!(cat.resolve(&TargetQuery::Tic(38846515)).unwrap(), wasp_100());
        assert_eq!(
            cat.resolve(&TargetQuery::Gaia(4675352109658261376)).unwrap(),
            wasp_100()
        );
    }

    #[test]
    fn test_resolve_by_coordinates_picks_nearest() {
        let entry = catalog()
            .resolve(&TargetQuery::Coordinates {
                ra: 68.9598,
                dec: -64.0271,
            })
            .unwrap();
        assert_eq!(entry.name, "WASP-100");
    }

    #[test]
    fn test_misses_are_errors() {
        let cat = catalog();
        let far = TargetQuery::Coordinates { ra: 10.0, dec: 10.0 };
        assert!(matches!(cat.resolve(&far), Err(CatalogError::NotFound(q)) if q == far));
        assert!(matches!(
            cat.resolve(&TargetQuery::Tic(1)),
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            cat.resolve(&TargetQuery::Name("WASP-12".to_string())),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn test_separation() {
        assert_relative_eq!(angular_separation_deg(0.0, 0.0, 90.0, 0.0), 90.0, epsilon = 1e-9);
        assert_relative_eq!(angular_separation_deg(10.0, 89.0, 190.0, 89.0), 2.0, epsilon = 1e-9);
        assert_eq!(angular_separation_deg(68.9, -64.0, 68.9, -64.0), 0.0);
    }

    #[test]
    fn test_load_csv_with_missing_gaia() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name,tic,gaia,tess_mag,ra,dec").unwrap();
        writeln!(file, "WASP-100, 38846515, 4675352109658261376, 10.3, 68.959732, -64.02704").unwrap();
        writeln!(file, "Field star,261136679,,9.8,84.291188,-80.469119").unwrap();

        let cat = Catalog::from_csv(file.path(), 21.0).unwrap();
        assert_eq!(cat.len(), 2);
        let star = cat.resolve(&TargetQuery::Tic(261136679)).unwrap();
        assert_eq!(star.gaia, None);
        assert_eq!(star.name, "Field star");
    }
}
