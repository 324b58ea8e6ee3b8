//! Colors and fills used by tile drawing
//!
//! Colors are written as CSS-style hex strings in option files
//! (`"#rrggbb"` or `"#rrggbbaa"`). A fill is either one color or a list of
//! colors spread evenly from the top to the bottom of a tile.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Straight-alpha RGBA color, components in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::from_rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::from_rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Color = Color::from_rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn from_rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn from_rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Build from 8-bit components
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::from_rgba(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a as f32 / 255.0,
        )
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`
    pub fn parse_hex(text: &str) -> Option<Self> {
        let hex = text.trim().strip_prefix('#')?;
        let nibble = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok();
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            3 => Some(Self::from_rgba8(
                nibble(0)? * 17,
                nibble(1)? * 17,
                nibble(2)? * 17,
                255,
            )),
            6 => Some(Self::from_rgba8(byte(0)?, byte(2)?, byte(4)?, 255)),
            8 => Some(Self::from_rgba8(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }

    /// 8-bit components
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    /// Linear interpolation towards `other`
    pub fn mix(self, other: Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        Color {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.to_rgba8();
        if a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", r, g, b, a)
        }
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::parse_hex(&value).ok_or_else(|| format!("invalid color: {value:?}"))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// Solid color or vertical gradient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fill {
    Solid(Color),
    /// Colors spread evenly from top (first) to bottom (last)
    Gradient(Vec<Color>),
}

impl Fill {
    /// Color at a vertical position, `y` in [0, 1] from the top
    pub fn color_at(&self, y: f32) -> Color {
        match self {
            Fill::Solid(color) => *color,
            Fill::Gradient(stops) => match stops.len() {
                0 => Color::TRANSPARENT,
                1 => stops[0],
                n => {
                    let pos = y.clamp(0.0, 1.0) * (n - 1) as f32;
                    let i = (pos.floor() as usize).min(n - 2);
                    stops[i].mix(stops[i + 1], pos - i as f32)
                }
            },
        }
    }

    /// Per-row 8-bit colors for a raster of `height` rows
    pub fn rows(&self, height: u32) -> Vec<[u8; 4]> {
        let span = height.saturating_sub(1).max(1) as f32;
        (0..height)
            .map(|row| self.color_at(row as f32 / span).to_rgba8())
            .collect()
    }
}

impl From<Color> for Fill {
    fn from(color: Color) -> Self {
        Fill::Solid(color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!(Color::parse_hex("#fff"), Some(Color::WHITE));
        assert_eq!(Color::parse_hex("#000000"), Some(Color::BLACK));
        assert_eq!(
            Color::parse_hex("#ff000080").map(Color::to_rgba8),
            Some([255, 0, 0, 128])
        );
        assert_eq!(Color::parse_hex("ff0000"), None);
        assert_eq!(Color::parse_hex("#12345"), None);
    }

    #[test]
    fn test_display_roundtrips_through_parse() {
        let color = Color::from_rgba8(0x4f, 0x4a, 0x85, 0xff);
        assert_eq!(color.to_string(), "#4f4a85");
        assert_eq!(Color::parse_hex(&color.to_string()).map(Color::to_rgba8), Some(color.to_rgba8()));
    }

    #[test]
    fn test_gradient_endpoints_and_middle() {
        let fill = Fill::Gradient(vec![Color::BLACK, Color::WHITE]);
        assert_eq!(fill.color_at(0.0).to_rgba8(), [0, 0, 0, 255]);
        assert_eq!(fill.color_at(1.0).to_rgba8(), [255, 255, 255, 255]);
        assert_eq!(fill.color_at(0.5).to_rgba8(), [128, 128, 128, 255]);
    }

    #[test]
    fn test_fill_from_yaml() {
        let solid: Fill = serde_yaml::from_str("\"#ff0000\"").unwrap();
        assert_eq!(solid, Fill::Solid(Color::from_rgb(1.0, 0.0, 0.0)));

        let gradient: Fill = serde_yaml::from_str("[\"#000\", \"#fff\"]").unwrap();
        assert!(matches!(gradient, Fill::Gradient(ref stops) if stops.len() == 2));
    }
}
