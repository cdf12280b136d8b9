use embedded_graphics::{pixelcolor::Rgb565, prelude::*, primitives::Rectangle, Pixel};
use tinybmp::Bmp;

use crate::framebuffer::Framebuffer;

/// Trend direction of the latest measurement, decoded from the API's
/// TrendArrow code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendArrow {
    FallingFast,
    Falling,
    Steady,
    Rising,
    RisingFast,
}

// Five 16x16 RGB565 tiles in one 80x16 strip.
static TREND_ARROWS_BMP: &[u8] = include_bytes!("../assets/trend_arrows.bmp");

pub const TILE_SIZE: i32 = 16;
pub const TILE_SCALE: i32 = 4;

impl TrendArrow {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::FallingFast,
            2 => Self::Falling,
            3 => Self::Steady,
            4 => Self::Rising,
            _ => Self::RisingFast,
        }
    }

    /// Short text label for logs.
    pub fn label(self) -> &'static str {
        match self {
            Self::FallingFast => "falling fast",
            Self::Falling => "falling",
            Self::Steady => "steady",
            Self::Rising => "rising",
            Self::RisingFast => "rising fast",
        }
    }

    /// Index into the sprite strip. The strip orders tiles by drawing
    /// convenience, not by API code: level, slow-down, slow-up,
    /// straight-down, straight-up.
    pub fn tile_index(self) -> usize {
        match self {
            Self::FallingFast => 3,
            Self::Falling => 1,
            Self::Steady => 0,
            Self::Rising => 2,
            Self::RisingFast => 4,
        }
    }

    /// Draw the arrow tile scaled up at the given top-left position.
    /// Black strip pixels are treated as transparent.
    pub fn draw(self, fb: &mut Framebuffer, x: i32, y: i32) {
        let Ok(strip) = Bmp::<Rgb565>::from_slice(TREND_ARROWS_BMP) else {
            return;
        };
        let tile_x0 = self.tile_index() as i32 * TILE_SIZE;
        for Pixel(p, color) in strip.pixels() {
            if p.x < tile_x0 || p.x >= tile_x0 + TILE_SIZE || color == Rgb565::BLACK {
                continue;
            }
            fb.fill_solid(
                &Rectangle::new(
                    Point::new(x + (p.x - tile_x0) * TILE_SCALE, y + p.y * TILE_SCALE),
                    Size::new(TILE_SCALE as u32, TILE_SCALE as u32),
                ),
                color,
            )
            .ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_codes_map_to_strip_tiles() {
        assert_eq!(TrendArrow::from_code(1).tile_index(), 3);
        assert_eq!(TrendArrow::from_code(2).tile_index(), 1);
        assert_eq!(TrendArrow::from_code(3).tile_index(), 0);
        assert_eq!(TrendArrow::from_code(4).tile_index(), 2);
    }

    #[test]
    fn unknown_codes_fall_back_to_the_last_tile() {
        assert_eq!(TrendArrow::from_code(0).tile_index(), 4);
        assert_eq!(TrendArrow::from_code(5).tile_index(), 4);
        assert_eq!(TrendArrow::from_code(-3).tile_index(), 4);
        assert_eq!(TrendArrow::from_code(99).tile_index(), 4);
    }
}
