use embedded_graphics::pixelcolor::Rgb565;

use crate::librelink::MeasurementColor;

/// Convert 8-bit RGB to Rgb565.
pub const fn rgb(r: u8, g: u8, b: u8) -> Rgb565 {
    Rgb565::new(r >> 3, g >> 2, b >> 3)
}

// ── Colors ──────────────────────────────────────────────────────────

pub const BG: Rgb565 = rgb(0x00, 0x00, 0x00);
pub const TEXT_PRIMARY: Rgb565 = rgb(0xf8, 0xf8, 0xff);
pub const TEXT_INFO: Rgb565 = rgb(0xf8, 0xf8, 0xff);

/// Measurement colors the server assigns to readings.
pub const MEASUREMENT_RED: Rgb565 = rgb(0xff, 0x00, 0x00);
pub const MEASUREMENT_GREEN: Rgb565 = rgb(0x8b, 0xbe, 0x1b);
pub const MEASUREMENT_YELLOW: Rgb565 = rgb(0xff, 0xae, 0x42);
pub const MEASUREMENT_ORANGE: Rgb565 = rgb(0xff, 0xa5, 0x00);
/// Neutral fallback for color codes the server has not defined.
pub const MEASUREMENT_NEUTRAL: Rgb565 = rgb(0xf8, 0xf8, 0xff);

pub const TARGET_LOW_LABEL_COLOR: Rgb565 = MEASUREMENT_GREEN;
pub const TARGET_HIGH_LABEL_COLOR: Rgb565 = MEASUREMENT_RED;

pub fn measurement_rgb(color: MeasurementColor) -> Rgb565 {
    match color {
        MeasurementColor::Green => MEASUREMENT_GREEN,
        MeasurementColor::Yellow => MEASUREMENT_YELLOW,
        MeasurementColor::Orange => MEASUREMENT_ORANGE,
        MeasurementColor::Red => MEASUREMENT_RED,
        MeasurementColor::Unknown => MEASUREMENT_NEUTRAL,
    }
}

// ── Layout constants (fixed 320x240 landscape canvas) ───────────────

pub const SCREEN_W: i32 = 320;
pub const SCREEN_H: i32 = 240;

/// Info/error label, top-left.
pub const INFO_X: i32 = 5;
pub const INFO_Y: i32 = 14;

/// Big glucose value, centered.
pub const VALUE_CENTER_X: i32 = SCREEN_W / 2;
pub const VALUE_Y: i32 = 70;

/// Units label under the value, centered.
pub const UNITS_Y: i32 = 142;

/// Target band, bottom-left and bottom-right.
pub const TARGET_MARGIN: i32 = 20;
pub const TARGET_LABEL_Y: i32 = 158;
pub const TARGET_VALUE_Y: i32 = 178;

/// Trend arrow sprite, bottom-center.
pub const TREND_X: i32 = 128;
pub const TREND_Y: i32 = 150;

/// Timestamp line, bottom edge.
pub const TIMESTAMP_Y: i32 = SCREEN_H - 6;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measurement_colors_cover_all_codes() {
        assert_eq!(measurement_rgb(MeasurementColor::Green), MEASUREMENT_GREEN);
        assert_eq!(measurement_rgb(MeasurementColor::Yellow), MEASUREMENT_YELLOW);
        assert_eq!(measurement_rgb(MeasurementColor::Orange), MEASUREMENT_ORANGE);
        assert_eq!(measurement_rgb(MeasurementColor::Red), MEASUREMENT_RED);
        assert_eq!(measurement_rgb(MeasurementColor::Unknown), MEASUREMENT_NEUTRAL);
    }
}
