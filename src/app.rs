use std::path::PathBuf;

use eframe::egui;

use tess_quicklook::config::PipelineConfig;

use crate::state::{AppState, View};
use crate::ui::{image, panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct QuickLookApp {
    pub state: AppState,
}

impl QuickLookApp {
    /// Build the app and run the image pipeline once on the configured source.
    pub fn new(cc: &eframe::CreationContext<'_>, config: PipelineConfig, config_path: PathBuf) -> Self {
        // Black plot series need a light background.
        cc.egui_ctx.set_visuals(egui::Visuals::light());

        let mut state = AppState::new(config, config_path);
        state.display_configured_image();
        Self { state }
    }
}

impl eframe::App for QuickLookApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: pipeline settings ----
        egui::SidePanel::left("settings_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: image or light-curve plots ----
        egui::CentralPanel::default().show(ctx, |ui| match self.state.view {
            View::Image => image::image_view(ui, &mut self.state),
            View::LightCurve => plot::light_curve_view(ui, &mut self.state),
        });
    }
}
