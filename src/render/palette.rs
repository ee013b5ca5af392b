//! Named sequential and diverging color palettes.
//!
//! Stops are the matplotlib colormaps sampled at even intervals; colors in
//! between are linearly interpolated.

use image::Rgba;

pub struct Palette {
    /// Canonical name, also used in artifact file names.
    pub name: &'static str,
    stops: &'static [[u8; 3]],
}

pub static PALETTES: &[Palette] = &[
    Palette {
        name: "viridis",
        stops: &[
            [68, 1, 84], [72, 40, 120], [62, 73, 137], [49, 104, 142],
            [38, 130, 142], [31, 158, 137], [53, 183, 121], [110, 206, 88],
            [181, 222, 43], [253, 231, 37],
        ],
    },
    Palette {
        name: "plasma",
        stops: &[
            [13, 8, 135], [70, 3, 159], [114, 1, 168], [156, 23, 158],
            [189, 55, 134], [216, 87, 107], [237, 121, 83], [251, 159, 58],
            [253, 202, 38], [240, 249, 33],
        ],
    },
    Palette {
        name: "inferno",
        stops: &[
            [0, 0, 4], [27, 12, 65], [74, 12, 107], [120, 28, 109],
            [165, 44, 96], [207, 68, 70], [237, 105, 37], [251, 155, 6],
            [247, 209, 61], [252, 255, 164],
        ],
    },
    Palette {
        name: "magma",
        stops: &[
            [0, 0, 4], [24, 15, 61], [68, 15, 118], [114, 31, 129],
            [158, 47, 127], [205, 64, 113], [241, 96, 93], [253, 150, 104],
            [254, 202, 141], [252, 253, 191],
        ],
    },
    Palette {
        name: "cividis",
        stops: &[
            [0, 34, 78], [18, 53, 112], [59, 73, 108], [87, 93, 109],
            [112, 113, 115], [138, 135, 121], [166, 157, 117], [196, 181, 108],
            [228, 207, 91], [254, 232, 56],
        ],
    },
    Palette {
        name: "Greens",
        stops: &[
            [247, 252, 245], [229, 245, 224], [199, 233, 192], [161, 217, 155],
            [116, 196, 118], [65, 171, 93], [35, 139, 69], [0, 109, 44],
            [0, 68, 27],
        ],
    },
    Palette {
        name: "Blues",
        stops: &[
            [247, 251, 255], [222, 235, 247], [198, 219, 239], [158, 202, 225],
            [107, 174, 214], [66, 146, 198], [33, 113, 181], [8, 81, 156],
            [8, 48, 107],
        ],
    },
    Palette {
        name: "YlGn",
        stops: &[
            [255, 255, 229], [247, 252, 185], [217, 240, 163], [173, 221, 142],
            [120, 198, 121], [65, 171, 93], [35, 132, 67], [0, 104, 55],
            [0, 69, 41],
        ],
    },
    Palette {
        name: "RdYlGn",
        stops: &[
            [165, 0, 38], [215, 48, 39], [244, 109, 67], [253, 174, 97],
            [254, 224, 139], [255, 255, 191], [217, 239, 139], [166, 217, 106],
            [102, 189, 99], [26, 152, 80], [0, 104, 55],
        ],
    },
];

impl Palette {
    /// Case-insensitive lookup.
    pub fn by_name(name: &str) -> Option<&'static Palette> {
        PALETTES.iter().find(|palette| palette.name.eq_ignore_ascii_case(name))
    }

    /// Color at position `t` in `0.0..=1.0`.
    pub fn sample(&self, t: f64) -> Rgba<u8> {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let scaled = t * (self.stops.len() - 1) as f64;
        let lo = scaled.floor() as usize;
        let hi = (lo + 1).min(self.stops.len() - 1);
        let frac = scaled - lo as f64;

        let channel = |i: usize| {
            let (a, b) = (self.stops[lo][i] as f64, self.stops[hi][i] as f64);
            (a + (b - a) * frac).round() as u8
        };
        Rgba([channel(0), channel(1), channel(2), 255])
    }

    /// One color per class, spread evenly from the first to the last stop.
    pub fn class_colors(&self, num_classes: usize) -> Vec<Rgba<u8>> {
        match num_classes {
            0 => Vec::new(),
            1 => vec![self.sample(0.0)],
            n => (0..n).map(|i| self.sample(i as f64 / (n - 1) as f64)).collect(),
        }
    }
}

impl std::fmt::Debug for Palette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Palette").field(&self.name).finish()
    }
}
