/// Data layer: acquisition, core types, filtering and persistence.
///
/// Architecture:
/// ```text
///  path / file:// / https://        TargetQuery + sector
///        │                                 │
///        ▼                                 ▼
///   ┌──────────┐                     ┌──────────┐
///   │ locator  │  fetch → local file │ catalog  │  resolve → CatalogEntry
///   └──────────┘                     └──────────┘
///        │                                 │
///        ▼                                 ▼
///   ┌──────────┐                     ┌──────────┐
///   │   fits   │  → CalibratedImage  │ extract  │  archive lookup → TargetData
///   └──────────┘                     └──────────┘
///                                          │
///                                          ▼
///                                    ┌──────────┐
///                                    │  filter  │  quality == 0 → GoodCadences
///                                    └──────────┘
///                                          │
///                                          ▼
///                                    ┌──────────┐
///                                    │  export  │  FITS / Parquet / CSV
///                                    └──────────┘
/// ```

pub mod catalog;
pub mod export;
pub mod extract;
pub mod filter;
pub mod fits;
pub mod locator;
pub mod model;
