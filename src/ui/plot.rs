use eframe::egui::{Color32, TextureHandle, Ui};
use egui_plot::{Legend, Line, LineStyle, Plot, PlotUi};

use crate::state::{AppState, LightCurvePlot};
use crate::ui::image::raster_plot;

/// Colours of the stacked raw, corrected, PCA and PSF series.
const STACK_COLORS: [(&str, Color32); 4] = [
    ("raw", Color32::BLACK),
    ("corrected", Color32::RED),
    ("PCA", Color32::from_rgb(0, 128, 0)),
    ("PSF", Color32::BLUE),
];

fn stack_color(label: &str) -> Color32 {
    STACK_COLORS
        .iter()
        .find(|(name, _)| *name == label)
        .map_or(Color32::GRAY, |&(_, color)| color)
}

/// Pair up two series, dropping non-finite points.
fn points(x: &[f64], y: &[f64]) -> Vec<[f64; 2]> {
    x.iter()
        .zip(y)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(&x, &y)| [x, y])
        .collect()
}

/// Time-series plot with a legend and a BTJD time axis.
fn time_plot(ui: &mut Ui, id: &str, y_label: &str, add_lines: impl FnOnce(&mut PlotUi)) {
    Plot::new(id)
        .legend(Legend::default())
        .x_axis_label("Time [BTJD]")
        .y_axis_label(y_label)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, add_lines);
}

// ---------------------------------------------------------------------------
// Light-curve views (central panel)
// ---------------------------------------------------------------------------

/// Render the selected diagnostic plot of the loaded light curve.
pub fn light_curve_view(ui: &mut Ui, state: &mut AppState) {
    if state.light_curve.is_none() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Extract a light curve  (Light curve → Extract light curve)");
        });
        return;
    }

    ui.horizontal(|ui: &mut Ui| {
        for plot in LightCurvePlot::ALL {
            ui.selectable_value(&mut state.light_curve_plot, plot, plot.label());
        }
    });
    ui.separator();

    match state.light_curve_plot {
        LightCurvePlot::TpfVsBackground | LightCurvePlot::TpfVsAperture => pixel_view(ui, state),
        _ => series_view(ui, state),
    }
}

fn series_view(ui: &mut Ui, state: &AppState) {
    let Some(lc) = &state.light_curve else {
        return;
    };
    let data = &lc.product.data;
    ui.label(format!(
        "{} – TIC {}, sector {}, {} of {} cadences with good quality",
        data.target.name,
        data.target.tic,
        data.sector,
        lc.good.len(),
        data.len()
    ));

    match state.light_curve_plot {
        LightCurvePlot::Normalized => {
            time_plot(ui, "normalized_flux", "Normalized flux", |plot_ui| {
                for series in &lc.normalized {
                    plot_ui.line(
                        Line::new(points(&lc.good.time, &series.values))
                            .name(format!("{} {:+.2}", series.label, series.offset))
                            .color(stack_color(series.label)),
                    );
                }
            });
        }
        LightCurvePlot::Background => {
            time_plot(ui, "background", "Background flux", |plot_ui| {
                plot_ui.line(
                    Line::new(points(&data.time, &data.flux_bkg))
                        .name("1D postcard")
                        .color(Color32::BLACK)
                        .width(3.0),
                );
                plot_ui.line(
                    Line::new(points(&data.time, &data.tpf_flux_bkg))
                        .name("1D TPF")
                        .color(Color32::RED)
                        .width(2.0)
                        .style(LineStyle::dashed_dense()),
                );
            });
        }
        LightCurvePlot::CorrectedFlux => {
            time_plot(ui, "corrected_flux", "Corrected flux [e-/s]", |plot_ui| {
                plot_ui.line(
                    Line::new(points(&lc.good.time, &lc.good.corr_flux))
                        .name(format!("TIC {}", data.target.tic))
                        .color(Color32::BLACK),
                );
            });
        }
        LightCurvePlot::TpfVsBackground | LightCurvePlot::TpfVsAperture => {}
    }
}

fn pixel_view(ui: &mut Ui, state: &mut AppState) {
    let Some(textures) = state.frame_textures(ui.ctx()) else {
        ui.label("The target pixel file holds no frames.");
        return;
    };
    let Some(lc) = &state.light_curve else {
        return;
    };
    let (_, rows, cols) = lc.product.data.tpf.dim();
    let (right, right_title) = match state.light_curve_plot {
        LightCurvePlot::TpfVsAperture => (Some(&textures.aperture), "Aperture".to_string()),
        _ => (textures.bkg.as_ref(), format!("Background ({})", lc.product.data.bkg_type)),
    };

    ui.columns(2, |columns: &mut [Ui]| {
        columns[0].strong("Target pixel file, first cadence");
        frame_or_note(&mut columns[0], "tpf_frame", textures.tpf.as_ref(), [cols, rows]);
        columns[1].strong(right_title.as_str());
        frame_or_note(&mut columns[1], "right_frame", right, [cols, rows]);
    });
}

fn frame_or_note(ui: &mut Ui, id: &str, texture: Option<&TextureHandle>, size: [usize; 2]) {
    match texture {
        Some(texture) => raster_plot(ui, id, texture, size),
        None => {
            ui.label("No finite pixels in this frame.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tess_quicklook::pipeline::STACK_OFFSETS;

    #[test]
    fn test_every_stacked_series_has_its_colour() {
        for (label, _) in STACK_OFFSETS {
            assert_ne!(stack_color(label), Color32::GRAY, "{label}");
        }
        assert_eq!(stack_color("PCA"), Color32::from_rgb(0, 128, 0));
    }
}
