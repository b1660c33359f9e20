use std::path::PathBuf;

use eframe::egui::{self, Color32, DragValue, RichText, ScrollArea, Ui};

use tess_quicklook::color::Colormap;
use tess_quicklook::data::catalog::TargetQuery;

use crate::state::{AppState, Status, View};

// ---------------------------------------------------------------------------
// Left side panel – pipeline settings
// ---------------------------------------------------------------------------

/// Render the left settings panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            ui.heading("Image");
            ui.separator();
            image_settings(ui, state);

            ui.add_space(8.0);
            ui.heading("Light curve");
            ui.separator();
            light_curve_settings(ui, state);

            ui.add_space(8.0);
            ui.separator();
            if ui.button("Save settings").clicked() {
                state.save_settings();
            }
        });
}

fn image_settings(ui: &mut Ui, state: &mut AppState) {
    egui::CollapsingHeader::new(RichText::new("Source").strong())
        .id_salt("image_source")
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            let source = &mut state.config.image;
            ui.checkbox(&mut source.use_local, "Use local file");
            if source.use_local {
                path_edit(ui, "Path", &mut source.local_path);
            } else {
                ui.label("URL");
                ui.text_edit_singleline(&mut source.remote_url);
            }
            ui.horizontal(|ui: &mut Ui| {
                ui.label("HDU");
                ui.add(DragValue::new(&mut source.hdu).range(0..=64));
            });
        });

    egui::CollapsingHeader::new(RichText::new("Display").strong())
        .id_salt("image_display")
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            let display = &mut state.config.display;
            let mut changed = false;
            egui::Grid::new("percentiles").num_columns(2).show(ui, |ui: &mut Ui| {
                ui.label("Lower percentile");
                changed |= ui
                    .add(DragValue::new(&mut display.lower_percentile).range(0.0..=100.0).speed(0.1))
                    .changed();
                ui.end_row();
                ui.label("Upper percentile");
                changed |= ui
                    .add(DragValue::new(&mut display.upper_percentile).range(0.0..=100.0).speed(0.1))
                    .changed();
                ui.end_row();
            });
            if changed {
                state.restretch();
            }

            let current = state.colormap;
            egui::ComboBox::from_id_salt("colormap")
                .selected_text(current.to_string())
                .show_ui(ui, |ui: &mut Ui| {
                    for colormap in Colormap::ALL {
                        if ui.selectable_label(current == colormap, colormap.to_string()).clicked() {
                            state.set_colormap(colormap);
                        }
                    }
                });
        });

    if ui.button("Display image").clicked() {
        state.display_configured_image();
    }
}

fn light_curve_settings(ui: &mut Ui, state: &mut AppState) {
    egui::CollapsingHeader::new(RichText::new("Target").strong())
        .id_salt("target")
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            let target = &mut state.config.target;
            query_edit(ui, &mut target.query);
            egui::Grid::new("target_grid").num_columns(2).show(ui, |ui: &mut Ui| {
                ui.label("Sector");
                ui.add(DragValue::new(&mut target.sector).range(1..=200));
                ui.end_row();
                ui.label("Match radius [arcsec]");
                ui.add(DragValue::new(&mut target.match_radius_arcsec).range(0.0..=3600.0));
                ui.end_row();
            });
        });

    egui::CollapsingHeader::new(RichText::new("Aperture").strong())
        .id_salt("aperture")
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            let aperture = &mut state.config.aperture;
            egui::Grid::new("aperture_grid").num_columns(2).show(ui, |ui: &mut Ui| {
                ui.label("Height [px]");
                ui.add(DragValue::new(&mut aperture.height).range(1..=255));
                ui.end_row();
                ui.label("Width [px]");
                ui.add(DragValue::new(&mut aperture.width).range(1..=255));
                ui.end_row();
                ui.label("Background box [px]");
                ui.add(DragValue::new(&mut aperture.bkg_size).range(1..=255));
                ui.end_row();
            });
        });

    egui::CollapsingHeader::new(RichText::new("Archive").strong())
        .id_salt("archive")
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            let archive = &mut state.config.archive;
            path_edit(ui, "Catalog CSV", &mut archive.catalog_path);

            let mut remote = archive.remote_base_url.is_some();
            if ui.checkbox(&mut remote, "Download light curves").changed() {
                archive.remote_base_url = remote.then(String::new);
            }
            match archive.remote_base_url.as_mut() {
                Some(base) => {
                    ui.label("Base URL");
                    ui.text_edit_singleline(base);
                }
                None => path_edit(ui, "Light-curve directory", &mut archive.light_curve_dir),
            }

            let mut save = archive.output_dir.is_some();
            if ui.checkbox(&mut save, "Save extracted file").changed() {
                archive.output_dir = save.then(|| PathBuf::from("output"));
            }
            if let Some(dir) = archive.output_dir.as_mut() {
                path_edit(ui, "Output directory", dir);
            }
        });

    if ui.button("Extract light curve").clicked() {
        state.extract_configured_light_curve();
    }
}

/// Text field bound to a path.
fn path_edit(ui: &mut Ui, label: &str, path: &mut PathBuf) {
    ui.label(label);
    let mut text = path.display().to_string();
    if ui.text_edit_singleline(&mut text).changed() {
        *path = PathBuf::from(text);
    }
}

/// Catalog IDs go through text: Gaia source IDs need all 64 bits.
fn id_edit(ui: &mut Ui, id: &mut u64) {
    let mut text = id.to_string();
    if ui.text_edit_singleline(&mut text).changed() {
        *id = parse_id(&text, *id);
    }
}

/// Parsed ID, or `current` when the text is not a number.
fn parse_id(text: &str, current: u64) -> u64 {
    text.trim().parse().unwrap_or(current)
}

fn query_kind(query: &TargetQuery) -> &'static str {
    match query {
        TargetQuery::Name(_) => "Name",
        TargetQuery::Tic(_) => "TIC",
        TargetQuery::Gaia(_) => "Gaia",
        TargetQuery::Coordinates { .. } => "Coordinates",
    }
}

fn query_edit(ui: &mut Ui, query: &mut TargetQuery) {
    let current = query_kind(query);
    egui::ComboBox::from_id_salt("query_kind")
        .selected_text(current)
        .show_ui(ui, |ui: &mut Ui| {
            for kind in ["Name", "TIC", "Gaia", "Coordinates"] {
                if ui.selectable_label(current == kind, kind).clicked() && current != kind {
                    *query = match kind {
                        "TIC" => TargetQuery::Tic(0),
                        "Gaia" => TargetQuery::Gaia(0),
                        "Coordinates" => TargetQuery::Coordinates { ra: 0.0, dec: 0.0 },
                        _ => TargetQuery::Name(String::new()),
                    };
                }
            }
        });

    match query {
        TargetQuery::Name(name) => {
            ui.text_edit_singleline(name);
        }
        TargetQuery::Tic(id) | TargetQuery::Gaia(id) => id_edit(ui, id),
        TargetQuery::Coordinates { ra, dec } => {
            ui.horizontal(|ui: &mut Ui| {
                ui.label("RA");
                ui.add(DragValue::new(ra).range(0.0..=360.0).speed(0.001).max_decimals(6));
                ui.label("Dec");
                ui.add(DragValue::new(dec).range(-90.0..=90.0).speed(0.001).max_decimals(6));
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open FITS image…").clicked() {
                open_image_dialog(state);
                ui.close_menu();
            }
            if ui.button("Open light curve…").clicked() {
                open_light_curve_dialog(state);
                ui.close_menu();
            }
            ui.separator();
            if ui
                .add_enabled(state.image.is_some(), egui::Button::new("Save image as PNG…"))
                .clicked()
            {
                save_png_dialog(state);
                ui.close_menu();
            }
            if ui
                .add_enabled(state.light_curve.is_some(), egui::Button::new("Export light curve…"))
                .clicked()
            {
                export_dialog(state);
                ui.close_menu();
            }
            ui.separator();
            if ui.button("Save settings").clicked() {
                state.save_settings();
                ui.close_menu();
            }
        });

        ui.separator();

        ui.selectable_value(&mut state.view, View::Image, "Image");
        ui.selectable_value(&mut state.view, View::LightCurve, "Light curve");

        ui.separator();

        match &state.status {
            Some(Status::Error(msg)) => {
                ui.label(RichText::new(msg).color(Color32::RED));
            }
            Some(Status::Info(msg)) => {
                ui.label(msg);
            }
            None => {}
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

const FITS_EXTENSIONS: [&str; 3] = ["fits", "fit", "fts"];

pub fn open_image_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open calibrated FITS image")
        .add_filter("FITS", &FITS_EXTENSIONS)
        .pick_file();
    if let Some(path) = file {
        state.open_image(path);
    }
}

pub fn open_light_curve_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open light curve")
        .add_filter("FITS", &FITS_EXTENSIONS)
        .pick_file();
    if let Some(path) = file {
        state.open_light_curve(path);
    }
}

pub fn save_png_dialog(state: &mut AppState) {
    let suggested = state
        .image
        .as_ref()
        .and_then(|product| product.locator.file_name())
        .map(|name| format!("{}.png", name.trim_end_matches(".fits")))
        .unwrap_or_else(|| "calibrated_image.png".to_string());
    let file = rfd::FileDialog::new()
        .set_title("Save image as PNG")
        .add_filter("PNG", &["png"])
        .set_file_name(suggested)
        .save_file();
    if let Some(path) = file {
        state.save_image_png(&path);
    }
}

pub fn export_dialog(state: &mut AppState) {
    let suggested = state
        .light_curve
        .as_ref()
        .map(|lc| format!("tic{}_s{:02}.parquet", lc.product.data.target.tic, lc.product.data.sector))
        .unwrap_or_else(|| "light_curve.parquet".to_string());
    let file = rfd::FileDialog::new()
        .set_title("Export light curve table")
        .add_filter("Parquet", &["parquet", "pq"])
        .add_filter("CSV", &["csv"])
        .set_file_name(suggested)
        .save_file();
    if let Some(path) = file {
        state.export_light_curve(&path);
    }
}
