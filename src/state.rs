use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use eframe::egui::{self, Color32, TextureHandle, TextureOptions};
use ndarray::ArrayView2;

use tess_quicklook::color::{Colormap, RgbaFrame};
use tess_quicklook::config::PipelineConfig;
use tess_quicklook::data::export::export_table;
use tess_quicklook::data::filter::GoodCadences;
use tess_quicklook::data::fits::read_light_curve;
use tess_quicklook::data::locator::FileLocator;
use tess_quicklook::pipeline::{
    normalized_fluxes, run_image_display, run_image_display_from, run_light_curve,
    ImageProduct, LightCurveProduct, NormalizedFlux,
};
use tess_quicklook::stats::display_range;

// ---------------------------------------------------------------------------
// View selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Image,
    LightCurve,
}

/// The diagnostic plots of an extracted light curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightCurvePlot {
    #[default]
    Normalized,
    Background,
    TpfVsBackground,
    TpfVsAperture,
    CorrectedFlux,
}

impl LightCurvePlot {
    pub const ALL: [LightCurvePlot; 5] = [
        LightCurvePlot::Normalized,
        LightCurvePlot::Background,
        LightCurvePlot::TpfVsBackground,
        LightCurvePlot::TpfVsAperture,
        LightCurvePlot::CorrectedFlux,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            LightCurvePlot::Normalized => "Normalized flux",
            LightCurvePlot::Background => "Background",
            LightCurvePlot::TpfVsBackground => "TPF / background",
            LightCurvePlot::TpfVsAperture => "TPF / aperture",
            LightCurvePlot::CorrectedFlux => "Corrected flux",
        }
    }
}

/// Message shown at the right of the top bar.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Info(String),
    Error(String),
}

// ---------------------------------------------------------------------------
// Loaded light curve with its derived views
// ---------------------------------------------------------------------------

/// Textures of the first TPF frame, the first background frame and the
/// aperture mask. A frame without finite pixels has no texture.
#[derive(Clone)]
pub struct FrameTextures {
    pub tpf: Option<TextureHandle>,
    pub bkg: Option<TextureHandle>,
    pub aperture: TextureHandle,
}

pub struct LoadedLightCurve {
    pub product: LightCurveProduct,
    pub good: GoodCadences,
    pub normalized: Vec<NormalizedFlux>,
    frames: Option<FrameTextures>,
}

impl LoadedLightCurve {
    fn new(product: LightCurveProduct) -> Self {
        let good = product.data.good_cadences();
        let normalized = normalized_fluxes(&good);
        Self {
            product,
            good,
            normalized,
            frames: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: PipelineConfig,
    /// Where "Save settings" writes `config`.
    pub config_path: PathBuf,

    pub view: View,
    pub light_curve_plot: LightCurvePlot,
    pub colormap: Colormap,

    pub image: Option<ImageProduct>,
    image_texture: Option<TextureHandle>,
    pub light_curve: Option<LoadedLightCurve>,

    pub status: Option<Status>,
}

impl AppState {
    pub fn new(config: PipelineConfig, config_path: PathBuf) -> Self {
        Self {
            config,
            config_path,
            view: View::default(),
            light_curve_plot: LightCurvePlot::default(),
            colormap: Colormap::default(),
            image: None,
            image_texture: None,
            light_curve: None,
            status: None,
        }
    }

    fn report_error(&mut self, err: anyhow::Error) {
        log::error!("{err:#}");
        self.status = Some(Status::Error(format!("Error: {err:#}")));
    }

    fn report_result(&mut self, result: Result<String>) {
        match result {
            Ok(message) => self.status = Some(Status::Info(message)),
            Err(err) => self.report_error(err),
        }
    }

    // ---- Image pipeline ----

    /// Run the image pipeline on the configured source.
    pub fn display_configured_image(&mut self) {
        match run_image_display(&self.config) {
            Ok(product) => self.set_image(product),
            Err(err) => self.report_error(err),
        }
    }

    /// Run the image pipeline on a file picked by the user.
    pub fn open_image(&mut self, path: PathBuf) {
        match run_image_display_from(&self.config, FileLocator::Local(path)) {
            Ok(product) => self.set_image(product),
            Err(err) => self.report_error(err),
        }
    }

    fn set_image(&mut self, product: ImageProduct) {
        self.status = Some(Status::Info(format!("Loaded {}", product.locator)));
        self.image = Some(product);
        self.image_texture = None;
        self.view = View::Image;
    }

    /// Recompute the display range after the percentiles changed.
    pub fn restretch(&mut self) {
        let Some(product) = self.image.as_mut() else {
            return;
        };
        let display = &self.config.display;
        match display_range(&product.image.pixels, display.lower_percentile, display.upper_percentile) {
            Ok(range) => {
                product.range = range;
                self.image_texture = None;
            }
            Err(err) => self.report_error(anyhow::Error::new(err).context("computing display range")),
        }
    }

    pub fn set_colormap(&mut self, colormap: Colormap) {
        if self.colormap != colormap {
            self.colormap = colormap;
            self.image_texture = None;
            if let Some(lc) = self.light_curve.as_mut() {
                lc.frames = None;
            }
        }
    }

    /// Texture of the stretched image, built on first use.
    pub fn image_texture(&mut self, ctx: &egui::Context) -> Option<TextureHandle> {
        if self.image_texture.is_none() {
            let product = self.image.as_ref()?;
            let frame = RgbaFrame::stretched(product.image.pixels.view(), &product.range, self.colormap);
            self.image_texture = Some(ctx.load_texture(
                "calibrated_image",
                frame.to_color_image(),
                TextureOptions::NEAREST,
            ));
        }
        self.image_texture.clone()
    }

    pub fn save_image_png(&mut self, path: &Path) {
        let result = match &self.image {
            Some(product) => RgbaFrame::stretched(product.image.pixels.view(), &product.range, self.colormap)
                .save_png(path)
                .map(|()| format!("Saved {}", path.display())),
            None => Err(anyhow::anyhow!("no image loaded")),
        };
        self.report_result(result);
    }

    // ---- Light-curve pipeline ----

    /// Resolve the configured target and extract its light curve.
    pub fn extract_configured_light_curve(&mut self) {
        match run_light_curve(&self.config) {
            Ok(product) => self.set_light_curve(product),
            Err(err) => self.report_error(err),
        }
    }

    /// Show a previously saved light-curve file.
    pub fn open_light_curve(&mut self, path: PathBuf) {
        match read_light_curve(&path).with_context(|| format!("reading {}", path.display())) {
            Ok(data) => {
                log::info!("Loaded light curve for TIC {} sector {}", data.target.tic, data.sector);
                self.set_light_curve(LightCurveProduct {
                    data,
                    saved_to: None,
                });
            }
            Err(err) => self.report_error(err),
        }
    }

    fn set_light_curve(&mut self, product: LightCurveProduct) {
        let loaded = LoadedLightCurve::new(product);
        let data = &loaded.product.data;
        let message = match &loaded.product.saved_to {
            Some(path) => format!("TIC {} sector {}, saved to {}", data.target.tic, data.sector, path.display()),
            None => format!("TIC {} sector {}", data.target.tic, data.sector),
        };
        self.status = Some(Status::Info(message));
        self.light_curve = Some(loaded);
        self.view = View::LightCurve;
    }

    /// Textures for the pixel-level plots, built on first use.
    pub fn frame_textures(&mut self, ctx: &egui::Context) -> Option<FrameTextures> {
        let colormap = self.colormap;
        let lc = self.light_curve.as_mut()?;
        if lc.frames.is_none() {
            let data = &lc.product.data;
            let texture = |name: &str, frame: RgbaFrame| {
                ctx.load_texture(name, frame.to_color_image(), TextureOptions::NEAREST)
            };
            let tpf = data
                .first_tpf_frame()
                .and_then(|frame| stretch_frame(frame, colormap))
                .map(|frame| texture("tpf_frame", frame));
            let bkg = data
                .first_bkg_frame()
                .and_then(|frame| stretch_frame(frame, colormap))
                .map(|frame| texture("bkg_frame", frame));
            let aperture = RgbaFrame::mask(data.aperture.view(), Color32::WHITE);
            if aperture.width == 0 || aperture.height == 0 {
                return None;
            }
            lc.frames = Some(FrameTextures {
                tpf,
                bkg,
                aperture: texture("aperture_mask", aperture),
            });
        }
        lc.frames.clone()
    }

    pub fn export_light_curve(&mut self, path: &Path) {
        let result = match &self.light_curve {
            Some(lc) => export_table(&lc.product.data, path).map(|()| format!("Exported {}", path.display())),
            None => Err(anyhow::anyhow!("no light curve loaded")),
        };
        self.report_result(result);
    }

    // ---- Settings ----

    pub fn save_settings(&mut self) {
        let result = self
            .config
            .save(&self.config_path)
            .map(|()| format!("Settings saved to {}", self.config_path.display()));
        self.report_result(result);
    }
}

/// Full-range stretch of a small pixel frame.
fn stretch_frame(frame: ArrayView2<'_, f64>, colormap: Colormap) -> Option<RgbaFrame> {
    match display_range(frame.iter(), 0.0, 100.0) {
        Ok(range) => Some(RgbaFrame::stretched(frame, &range, colormap)),
        Err(err) => {
            log::warn!("Cannot stretch pixel frame: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};
    use tess_quicklook::config::ApertureConfig;
    use tess_quicklook::data::model::{CatalogEntry, TargetData};

    /// Six cadences of 3x3 frames, every one of them flagged.
    fn flagged_light_curve() -> LightCurveProduct {
        let n = 6;
        let series = |level: f64| vec![level; n];
        let data = TargetData {
            target: CatalogEntry {
                name: "WASP-100".to_string(),
                tic: 38846515,
                gaia: Some(4675352109658261376),
                tess_mag: 10.3,
                ra: 68.959732,
                dec: -64.02704,
            },
            sector: 1,
            aperture_size: ApertureConfig {
                height: 3,
                width: 3,
                bkg_size: 31,
            },
            bkg_type: "PC_LEVEL".to_string(),
            time: (0..n).map(|i| 1325.3 + i as f64 * 0.02).collect(),
            quality: vec![32; n],
            raw_flux: series(12000.0),
            corr_flux: series(11950.0),
            pca_flux: series(11900.0),
            psf_flux: series(f64::NAN),
            flux_bkg: series(150.0),
            tpf_flux_bkg: series(151.0),
            tpf: Array3::from_elem((n, 3, 3), 200.0),
            bkg_tpf: Array3::from_elem((n, 3, 3), 150.0),
            aperture: Array2::from_shape_fn((3, 3), |(r, c)| r == 1 && c == 1),
        };
        LightCurveProduct { data, saved_to: None }
    }

    fn state() -> AppState {
        AppState::new(PipelineConfig::default(), PathBuf::from("unused.json"))
    }

    #[test]
    fn test_fully_flagged_record_still_loads() {
        let mut state = state();
        state.set_light_curve(flagged_light_curve());

        assert_eq!(state.view, View::LightCurve);
        assert!(matches!(state.status, Some(Status::Info(_))));
        let lc = state.light_curve.as_ref().unwrap();
        assert!(lc.good.is_empty());
        assert!(lc.normalized.is_empty());
        assert_eq!(lc.product.data.flux_bkg, vec![150.0; 6]);
        assert_eq!(lc.product.data.tpf_flux_bkg, vec![151.0; 6]);
    }

    #[test]
    fn test_aperture_texture_without_finite_tpf_pixels() {
        let mut product = flagged_light_curve();
        product.data.tpf.fill(f64::NAN);
        let mut state = state();
        state.set_light_curve(product);

        let textures = state.frame_textures(&egui::Context::default()).unwrap();
        assert!(textures.tpf.is_none());
        assert!(textures.bkg.is_some());
        assert_eq!(textures.aperture.size(), [3, 3]);
    }
}
