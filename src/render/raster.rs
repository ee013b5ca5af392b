//! Pixel-level drawing primitives that the image crates do not cover.

use geo::BooleanOps;
use geo_types::{Coord, LineString, MultiPolygon, Rect};
use image::{Rgba, RgbaImage};

/// Maps map coordinates onto the canvas, keeping the aspect ratio and
/// flipping the y axis.
#[derive(Debug, Clone, Copy)]
pub struct Projection {
    min: Coord<f64>,
    scale: f64,
    offset: Coord<f64>,
    height: f64,
}

impl Projection {
    pub fn fit(bounds: Rect<f64>, width: u32, height: u32, margin: f64) -> Self {
        let avail_w = (width as f64 - 2.0 * margin).max(1.0);
        let avail_h = (height as f64 - 2.0 * margin).max(1.0);
        let scale = match (bounds.width() > 0.0, bounds.height() > 0.0) {
            (true, true) => (avail_w / bounds.width()).min(avail_h / bounds.height()),
            (true, false) => avail_w / bounds.width(),
            (false, true) => avail_h / bounds.height(),
            (false, false) => 1.0,
        };
        let offset = Coord {
            x: margin + (avail_w - bounds.width() * scale) / 2.0,
            y: margin + (avail_h - bounds.height() * scale) / 2.0,
        };
        Projection { min: bounds.min(), scale, offset, height: height as f64 }
    }

    pub fn apply(&self, c: Coord<f64>) -> Coord<f64> {
        Coord {
            x: self.offset.x + (c.x - self.min.x) * self.scale,
            y: self.height - (self.offset.y + (c.y - self.min.y) * self.scale),
        }
    }

    pub fn ring(&self, ring: &LineString<f64>) -> Vec<Coord<f64>> {
        ring.coords().map(|c| self.apply(*c)).collect()
    }
}

fn put(image: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}

/// Crossings of the horizontal line `y` with the ring edges. An edge counts
/// when its endpoints lie on opposite sides (half-open at the top), so
/// vertices are never counted twice.
fn crossings(rings: &[Vec<Coord<f64>>], y: f64) -> Vec<f64> {
    let mut xs = Vec::new();
    for ring in rings {
        for edge in ring.windows(2) {
            let (a, b) = (edge[0], edge[1]);
            if (a.y > y) != (b.y > y) {
                xs.push(a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
            }
        }
    }
    xs.sort_by(f64::total_cmp);
    xs
}

/// Even-odd scanline fill of a polygon given as closed pixel-space rings;
/// inner rings leave holes. A pixel is filled when its center is inside.
pub fn fill_rings(image: &mut RgbaImage, rings: &[Vec<Coord<f64>>], color: Rgba<u8>) {
    let (min_y, max_y) = rings
        .iter()
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| (lo.min(c.y), hi.max(c.y)));
    if !min_y.is_finite() {
        return;
    }

    let first_row = min_y.floor().max(0.0) as u32;
    let last_row = max_y.ceil().min(image.height() as f64) as u32;
    for row in first_row..last_row {
        let xs = crossings(rings, row as f64 + 0.5);
        for span in xs.chunks_exact(2) {
            let start = (span[0] - 0.5).ceil().max(0.0) as i64;
            let end = (span[1] - 0.5).floor().min(image.width() as f64 - 1.0) as i64;
            for x in start..=end {
                put(image, x, row as i64, color);
            }
        }
    }
}

/// Straight segment stamped with a square brush of `width` pixels.
pub fn draw_line(image: &mut RgbaImage, a: Coord<f64>, b: Coord<f64>, width: u32, color: Rgba<u8>) {
    let steps = (b.x - a.x).abs().max((b.y - a.y).abs()).ceil().max(1.0) as usize;
    let width = width.max(1) as i64;
    let reach = (width - 1) / 2;
    for step in 0..=steps {
        let t = step as f64 / steps as f64;
        let x = (a.x + (b.x - a.x) * t).floor() as i64;
        let y = (a.y + (b.y - a.y) * t).floor() as i64;
        for dy in -reach..(width - reach) {
            for dx in -reach..(width - reach) {
                put(image, x + dx, y + dy, color);
            }
        }
    }
}

pub fn draw_polyline(image: &mut RgbaImage, points: &[Coord<f64>], width: u32, color: Rgba<u8>) {
    for segment in points.windows(2) {
        draw_line(image, segment[0], segment[1], width, color);
    }
}

/// Dissolves adjacent shapes into the outline of their union.
pub fn dissolve<'a, I>(geometries: I) -> MultiPolygon<f64>
where
    I: IntoIterator<Item = &'a MultiPolygon<f64>>,
{
    geometries
        .into_iter()
        .fold(MultiPolygon(Vec::new()), |dissolved, geometry| dissolved.union(geometry))
}
