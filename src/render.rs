use std::io::Cursor;

use ab_glyph::{FontRef, PxScale};
use geo::{BoundingRect, InteriorPoint};
use geo_types::{Coord, MultiPolygon};
use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
    rect::Rect as PixelRect,
};
use thiserror::Error;

use crate::assemble::MergedDataset;
use crate::classify::Classification;

pub mod palette;
pub mod raster;

use palette::Palette;
use raster::Projection;

const FONT_DATA: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

const MAP_TITLE: &str = "Podiel Poľnohospodárskej Pôdy v Obciach Okresu";
const LEGEND_TITLE: &str = "Legenda";
const MUNICIPALITY_BORDER_LABEL: &str = "Hranica obce";
const DISTRICT_BORDER_LABEL: &str = "Hranica okresu";

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const TEXT: Rgba<u8> = Rgba([0, 0, 0, 255]);
const MUNICIPALITY_BORDER: Rgba<u8> = Rgba([0, 0, 0, 255]);
const DISTRICT_BORDER: Rgba<u8> = Rgba([255, 0, 0, 255]);
const LABEL_FILL: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("nothing to draw")]
    EmptyMap,

    #[error("class {class} of {name} has no color among {colors} palette entries")]
    ClassOutOfRange { name: String, class: usize, colors: usize },

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("bundled font is unreadable: {0}")]
    Font(#[from] ab_glyph::InvalidFont),
}

/// One classified municipality.
#[derive(Debug, Clone)]
pub struct Feature {
    pub name: String,
    pub geometry: MultiPolygon<f64>,
    /// Agricultural share in percent, printed next to the name.
    pub ratio: f64,
    pub class: usize,
}

/// Everything needed to draw one district map.
#[derive(Debug, Clone)]
pub struct MapFrame {
    pub district_name: String,
    pub features: Vec<Feature>,
    pub breaks: Vec<f64>,
    pub palette: &'static Palette,
}

impl MapFrame {
    pub fn new(dataset: MergedDataset, classification: Classification, palette: &'static Palette) -> Self {
        let features = dataset
            .records
            .into_iter()
            .zip(classification.classes)
            .map(|(record, class)| Feature {
                name: record.municipality.name,
                geometry: record.municipality.geometry,
                ratio: record.ratio,
                class,
            })
            .collect();

        MapFrame {
            district_name: dataset.district.name,
            features,
            breaks: classification.breaks,
            palette,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.breaks.len().saturating_sub(1).max(1)
    }

    /// `"lower - upper%"` per class, as shown next to the legend swatches.
    pub fn legend_labels(&self) -> Vec<String> {
        self.breaks
            .windows(2)
            .map(|w| format!("{:.1} - {:.1}%", w[0], w[1]))
            .collect()
    }
}

/// Turns a classified district into encoded image bytes.
pub trait Renderer: Send + Sync {
    fn render(&self, frame: &MapFrame) -> Result<Vec<u8>, RenderError>;
}

/// Draws a square PNG choropleth: title on top, labelled municipalities
/// inside a red district outline, legend in the upper-left corner.
pub struct PngRenderer {
    size: u32,
}

impl PngRenderer {
    pub fn new(size: u32) -> Self {
        PngRenderer { size }
    }

    fn draw(&self, frame: &MapFrame) -> Result<RgbaImage, RenderError> {
        let font = FontRef::try_from_slice(FONT_DATA)?;
        let district = raster::dissolve(frame.features.iter().map(|f| &f.geometry));
        let bounds = district.bounding_rect().ok_or(RenderError::EmptyMap)?;
        let colors = frame.palette.class_colors(frame.num_classes());
        let unit = (self.size / 120).max(4) as i32;
        let line_width = (self.size / 1200).max(1);

        let mut image = RgbaImage::from_pixel(self.size, self.size, BACKGROUND);
        let projection = Projection::fit(bounds, self.size, self.size, (unit * 4) as f64);

        for feature in &frame.features {
            let color = *colors.get(feature.class).ok_or_else(|| RenderError::ClassOutOfRange {
                name: feature.name.clone(),
                class: feature.class,
                colors: colors.len(),
            })?;
            for polygon in &feature.geometry.0 {
                let rings: Vec<Vec<Coord<f64>>> = std::iter::once(polygon.exterior())
                    .chain(polygon.interiors())
                    .map(|ring| projection.ring(ring))
                    .collect();
                raster::fill_rings(&mut image, &rings, color);
                for ring in &rings {
                    raster::draw_polyline(&mut image, ring, line_width, MUNICIPALITY_BORDER);
                }
            }
        }

        for polygon in &district.0 {
            for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
                raster::draw_polyline(&mut image, &projection.ring(ring), line_width * 2, DISTRICT_BORDER);
            }
        }

        let label_scale = PxScale::from(unit as f32 * 1.1);
        for feature in &frame.features {
            if let Some(point) = feature.geometry.interior_point() {
                let text = format!("{} {:.1}%", feature.name, feature.ratio);
                draw_label(&mut image, &font, label_scale, projection.apply(point.0), &text);
            }
        }

        draw_title(&mut image, &font, unit, &format!("{MAP_TITLE} {}", frame.district_name));
        draw_legend(&mut image, &font, &colors, &frame.legend_labels(), unit, line_width);
        Ok(image)
    }
}

/// White text with a thin dark halo, centered on `center`.
fn draw_label(image: &mut RgbaImage, font: &FontRef<'_>, scale: PxScale, center: Coord<f64>, text: &str) {
    let (width, height) = text_size(scale, font, text);
    let x = center.x.round() as i32 - width as i32 / 2;
    let y = center.y.round() as i32 - height as i32 / 2;
    for (dx, dy) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
        draw_text_mut(image, MUNICIPALITY_BORDER, x + dx, y + dy, scale, font, text);
    }
    draw_text_mut(image, LABEL_FILL, x, y, scale, font, text);
}

/// Centered on the top margin, shrunk to fit the canvas width.
fn draw_title(image: &mut RgbaImage, font: &FontRef<'_>, unit: i32, text: &str) {
    let mut scale = PxScale::from(unit as f32 * 2.4);
    let available = image.width().saturating_sub(2 * unit as u32).max(1);
    let (width, _) = text_size(scale, font, text);
    if width > available {
        scale = PxScale::from(scale.y * available as f32 / width as f32);
    }
    let (width, _) = text_size(scale, font, text);
    let x = (image.width() as i32 - width as i32) / 2;
    draw_text_mut(image, TEXT, x, unit, scale, font, text);
}

fn draw_legend(
    image: &mut RgbaImage,
    font: &FontRef<'_>,
    colors: &[Rgba<u8>],
    labels: &[String],
    unit: i32,
    line_width: u32,
) {
    let scale = PxScale::from(unit as f32 * 1.4);
    let class_labels = (0..colors.len()).map(|i| labels.get(i).map_or("", String::as_str));
    let entries: Vec<&str> = class_labels
        .chain([MUNICIPALITY_BORDER_LABEL, DISTRICT_BORDER_LABEL])
        .collect();
    let text_width = entries
        .iter()
        .chain(std::iter::once(&LEGEND_TITLE))
        .map(|text| text_size(scale, font, text).0)
        .max()
        .unwrap_or(0) as i32;

    let (x0, y0) = (unit, unit * 5);
    let swatch_x = x0 + unit;
    let text_x = swatch_x + unit * 4;
    let width = text_x - x0 + text_width + unit;
    let height = unit * 3 + entries.len() as i32 * unit * 2;
    let frame = PixelRect::at(x0, y0).of_size(width as u32, height as u32);
    draw_filled_rect_mut(image, frame, BACKGROUND);
    draw_hollow_rect_mut(image, frame, MUNICIPALITY_BORDER);
    draw_text_mut(image, TEXT, swatch_x, y0 + unit / 2, scale, font, LEGEND_TITLE);

    let text_y = |row: i32| row + unit / 2 - (scale.y / 2.0) as i32;
    let mut y = y0 + unit * 3;
    for (color, label) in colors.iter().zip(&entries) {
        let swatch = PixelRect::at(swatch_x, y).of_size(unit as u32 * 3, unit as u32);
        draw_filled_rect_mut(image, swatch, *color);
        draw_hollow_rect_mut(image, swatch, MUNICIPALITY_BORDER);
        draw_text_mut(image, TEXT, text_x, text_y(y), scale, font, label);
        y += unit * 2;
    }

    let borders = [(MUNICIPALITY_BORDER, line_width), (DISTRICT_BORDER, line_width * 2)];
    for ((color, width), label) in borders.into_iter().zip(&entries[colors.len()..]) {
        let mid = (y + unit / 2) as f64;
        let (from, to) = (swatch_x as f64, (swatch_x + unit * 3) as f64);
        raster::draw_line(image, Coord { x: from, y: mid }, Coord { x: to, y: mid }, width, color);
        draw_text_mut(image, TEXT, text_x, text_y(y), scale, font, label);
        y += unit * 2;
    }
}

impl Renderer for PngRenderer {
    fn render(&self, frame: &MapFrame) -> Result<Vec<u8>, RenderError> {
        if frame.features.is_empty() {
            return Err(RenderError::EmptyMap);
        }
        let image = self.draw(frame)?;

        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png)?;
        tracing::debug!("Rendered {} ({} municipalities)", frame.district_name, frame.features.len());
        Ok(bytes.into_inner())
    }
}
