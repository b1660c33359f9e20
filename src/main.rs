mod app;
mod state;
mod ui;

use std::path::PathBuf;

use anyhow::Context;
use app::QuickLookApp;
use eframe::egui;
use tess_quicklook::config::{PipelineConfig, DEFAULT_CONFIG_FILE};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // A malformed settings file is fatal; it is never replaced by defaults.
    let config_path = PathBuf::from(DEFAULT_CONFIG_FILE);
    let config = PipelineConfig::load_or_default(&config_path)
        .context("fix or remove the settings file and restart")?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([640.0, 420.0]),
        ..Default::default()
    };

    eframe::run_native(
        "TESS Quick-Look",
        options,
        Box::new(move |cc| Ok(Box::new(QuickLookApp::new(cc, config, config_path)))),
    )
    .map_err(|e| anyhow::anyhow!("running the viewer: {e}"))
}
