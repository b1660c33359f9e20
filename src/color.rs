use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use eframe::egui::{Color32, ColorImage};
use ndarray::ArrayView2;
use palette::{LinSrgb, Mix, Srgb};

use crate::stats::DisplayRange;

// ---------------------------------------------------------------------------
// Colormaps
// ---------------------------------------------------------------------------

/// Anchor colours of viridis, evenly spaced over `[0, 1]`.
const VIRIDIS: [(u8, u8, u8); 9] = [
    (68, 1, 84),
    (71, 44, 122),
    (59, 81, 139),
    (44, 113, 142),
    (33, 144, 141),
    (39, 173, 129),
    (92, 200, 99),
    (170, 220, 50),
    (253, 231, 37),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Colormap {
    #[default]
    Viridis,
    Gray,
}

impl Colormap {
    pub const ALL: [Colormap; 2] = [Colormap::Viridis, Colormap::Gray];

    /// Colour at position `t` in `[0, 1]`; out-of-range positions are clamped.
    pub fn color_at(&self, t: f32) -> Color32 {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        match self {
            Colormap::Gray => {
                let v = (t * 255.0).round() as u8;
                Color32::from_gray(v)
            }
            Colormap::Viridis => {
                let scaled = t * (VIRIDIS.len() - 1) as f32;
                let lo = (scaled.floor() as usize).min(VIRIDIS.len() - 2);
                let frac = scaled - lo as f32;
                let a = anchor(VIRIDIS[lo]);
                let b = anchor(VIRIDIS[lo + 1]);
                let mixed: Srgb = Srgb::from_linear(a.mix(b, frac));
                let rgb: Srgb<u8> = mixed.into_format();
                Color32::from_rgb(rgb.red, rgb.green, rgb.blue)
            }
        }
    }
}

fn anchor((r, g, b): (u8, u8, u8)) -> LinSrgb {
    Srgb::new(r, g, b).into_format::<f32>().into_linear()
}

impl fmt::Display for Colormap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Colormap::Viridis => write!(f, "viridis"),
            Colormap::Gray => write!(f, "gray"),
        }
    }
}

// ---------------------------------------------------------------------------
// Stretched RGBA rasters
// ---------------------------------------------------------------------------

/// An RGBA raster in display order: the first row is the top of the screen.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbaFrame {
    pub width: usize,
    pub height: usize,
    pub rgba: Vec<u8>,
}

impl RgbaFrame {
    /// Stretch `pixels` through `range` and `colormap`.
    ///
    /// Array row 0 ends up at the bottom (origin lower). Non-finite pixels
    /// are drawn with the colour of the low end.
    pub fn stretched(pixels: ArrayView2<'_, f64>, range: &DisplayRange, colormap: Colormap) -> Self {
        let (height, width) = pixels.dim();
        let mut rgba = Vec::with_capacity(width * height * 4);
        for row in pixels.rows().into_iter().rev() {
            for &value in row.iter() {
                rgba.extend_from_slice(&colormap.color_at(range.scale(value)).to_array());
            }
        }
        RgbaFrame {
            width,
            height,
            rgba,
        }
    }

    /// Binary mask: selected pixels in `on`, the rest black. Origin lower.
    pub fn mask(mask: ArrayView2<'_, bool>, on: Color32) -> Self {
        let (height, width) = mask.dim();
        let mut rgba = Vec::with_capacity(width * height * 4);
        for row in mask.rows().into_iter().rev() {
            for &selected in row.iter() {
                let color = if selected { on } else { Color32::BLACK };
                rgba.extend_from_slice(&color.to_array());
            }
        }
        RgbaFrame {
            width,
            height,
            rgba,
        }
    }

    pub fn to_color_image(&self) -> ColorImage {
        ColorImage::from_rgba_unmultiplied([self.width, self.height], &self.rgba)
    }

    /// Write the raster as a PNG file.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        let image = image::RgbaImage::from_raw(
            self.width as u32,
            self.height as u32,
            self.rgba.clone(),
        )
        .context("raster size does not match its buffer")?;
        image
            .save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("writing {}", path.display()))?;
        log::info!("Saved {}x{} PNG to {}", self.width, self.height, path.display());
        Ok(())
    }
}
