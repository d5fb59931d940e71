//! Colour ramp: one row of 256 colours per spectral class.

use std::sync::OnceLock;

use lithos_config::SpectralClass;

/// Texels per ramp row.
pub const RAMP_WIDTH: usize = 256;

/// Gradient stops `(t, [r, g, b])` per class, in ramp-row order.
const STOPS: [&[(f32, [u8; 3])]; 5] = [
    // C
    &[
        (0.0, [18, 17, 16]),
        (0.5, [46, 43, 40]),
        (0.85, [72, 68, 62]),
        (1.0, [96, 92, 86]),
    ],
    // S
    &[
        (0.0, [74, 58, 46]),
        (0.4, [128, 104, 84]),
        (0.8, [168, 148, 124]),
        (1.0, [196, 182, 160]),
    ],
    // M
    &[
        (0.0, [88, 90, 94]),
        (0.5, [146, 148, 152]),
        (1.0, [206, 208, 212]),
    ],
    // V
    &[
        (0.0, [40, 38, 44]),
        (0.3, [92, 84, 80]),
        (0.7, [178, 170, 156]),
        (1.0, [222, 216, 204]),
    ],
    // D
    &[
        (0.0, [24, 12, 10]),
        (0.6, [62, 34, 26]),
        (1.0, [98, 60, 44]),
    ],
];

/// Immutable colour lookup table shared by every map generator.
#[derive(Debug)]
pub struct ColorRamp {
    rows: Vec<[[u8; 4]; RAMP_WIDTH]>,
}

fn build_row(stops: &[(f32, [u8; 3])]) -> [[u8; 4]; RAMP_WIDTH] {
    let mut row = [[0, 0, 0, 255]; RAMP_WIDTH];
    for (i, texel) in row.iter_mut().enumerate() {
        let t = i as f32 / (RAMP_WIDTH - 1) as f32;
        let upper = stops.iter().position(|s| s.0 >= t).unwrap_or(stops.len() - 1);
        let lower = upper.saturating_sub(1);
        let (t0, c0) = stops[lower];
        let (t1, c1) = stops[upper];
        let f = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
        for ch in 0..3 {
            let v = c0[ch] as f32 + (c1[ch] as f32 - c0[ch] as f32) * f;
            texel[ch] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    row
}

impl ColorRamp {
    /// The process-wide ramp, built on first use.
    pub fn shared() -> &'static ColorRamp {
        static RAMP: OnceLock<ColorRamp> = OnceLock::new();
        RAMP.get_or_init(|| {
            tracing::debug!("Building colour ramp");
            ColorRamp {
                rows: STOPS.iter().map(|stops| build_row(stops)).collect(),
            }
        })
    }

    #[must_use]
    pub fn row(&self, class: SpectralClass) -> &[[u8; 4]; RAMP_WIDTH] {
        &self.rows[class.ramp_row() as usize]
    }

    /// Ramp column for a height value.
    #[inline]
    #[must_use]
    pub fn column(height: f32) -> usize {
        let t = (height * 0.5 + 0.5).clamp(0.0, 1.0);
        ((t * RAMP_WIDTH as f32) as usize).min(RAMP_WIDTH - 1)
    }

    #[must_use]
    pub fn sample(&self, class: SpectralClass, height: f32) -> [u8; 4] {
        self.row(class)[Self::column(height)]
    }

    /// All rows as little-endian packed `u32`s, row-major, for GPU upload.
    #[must_use]
    pub fn packed(&self) -> Vec<u32> {
        self.rows
            .iter()
            .flat_map(|row| row.iter().map(|c| u32::from_le_bytes(*c)))
            .collect()
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
