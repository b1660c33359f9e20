use eframe::egui::{self, RichText, TextureHandle, Ui};
use egui_plot::{Plot, PlotImage, PlotPoint};

use tess_quicklook::data::model::WcsHeader;

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Calibrated image view (central panel)
// ---------------------------------------------------------------------------

pub fn image_view(ui: &mut Ui, state: &mut AppState) {
    let Some(texture) = state.image_texture(ui.ctx()) else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Display an image  (Image → Display image, or File → Open FITS image…)");
        });
        return;
    };
    let Some(product) = &state.image else {
        return;
    };

    ui.vertical_centered(|ui: &mut Ui| {
        ui.heading(&product.title);
    });

    egui::CollapsingHeader::new("Header")
        .id_salt("image_header")
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            ui.label(RichText::new(product.locator.to_string()).monospace());
            for hdu in &product.hdus {
                ui.label(RichText::new(hdu.to_string()).monospace());
            }
            let header = &product.image.header;
            ui.label(format!(
                "TSTART {:.6}  TSTOP {:.6}  mid {:.6} BTJD",
                header.tstart,
                header.tstop,
                header.mid_time()
            ));
            if let Some(wcs) = &header.wcs {
                wcs_summary(ui, wcs);
            }
        });

    ui.label(format!(
        "{} x {} px, display range {:.2} .. {:.2}",
        product.image.width(),
        product.image.height(),
        product.range.vmin,
        product.range.vmax
    ));

    let size = [product.image.width(), product.image.height()];
    raster_plot(ui, "calibrated_image", &texture, size);
}

fn wcs_summary(ui: &mut Ui, wcs: &WcsHeader) {
    egui::Grid::new("wcs_grid").num_columns(3).show(ui, |ui: &mut Ui| {
        ui.label("");
        ui.strong("axis 1");
        ui.strong("axis 2");
        ui.end_row();
        ui.label("CTYPE");
        ui.label(&wcs.ctype[0]);
        ui.label(&wcs.ctype[1]);
        ui.end_row();
        ui.label("CRVAL");
        ui.label(format!("{:.6}", wcs.crval[0]));
        ui.label(format!("{:.6}", wcs.crval[1]));
        ui.end_row();
        ui.label("CRPIX");
        ui.label(format!("{:.2}", wcs.crpix[0]));
        ui.label(format!("{:.2}", wcs.crpix[1]));
        ui.end_row();
        for (i, row) in wcs.cd.iter().enumerate() {
            ui.label(format!("CD{}_j", i + 1));
            ui.label(format!("{:.3e}", row[0]));
            ui.label(format!("{:.3e}", row[1]));
            ui.end_row();
        }
    });
}

/// Show a texture on pixel axes, origin lower-left, one plot unit per pixel.
pub fn raster_plot(ui: &mut Ui, id: &str, texture: &TextureHandle, [width, height]: [usize; 2]) {
    let (w, h) = (width as f64, height as f64);
    let image = PlotImage::new(
        texture.id(),
        PlotPoint::new(w / 2.0, h / 2.0),
        egui::vec2(w as f32, h as f32),
    );
    Plot::new(id)
        .data_aspect(1.0)
        .x_axis_label("Column [px]")
        .y_axis_label("Row [px]")
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            plot_ui.image(image);
        });
}
