//! Shared theme constants for the waveform widget

use iced::Color;

/// Canvas background behind the waveform
pub const BACKGROUND: Color = Color::from_rgb(0.1, 0.1, 0.12);

/// Scrollbar track and thumb
pub const SCROLLBAR_TRACK: Color = Color::from_rgba(1.0, 1.0, 1.0, 0.06);
pub const SCROLLBAR_THUMB: Color = Color::from_rgba(1.0, 1.0, 1.0, 0.35);

/// Scrollbar thickness in pixels
pub const SCROLLBAR_HEIGHT: f32 = 6.0;

/// Two releases closer than this (ms) form a double click
pub const DOUBLE_CLICK_MS: f64 = 300.0;

/// Press and release further apart than this (px) are not a click
pub const CLICK_SLOP: f32 = 3.0;

/// Convert an engine color to an iced color
pub fn to_iced(color: wavesurf_core::Color) -> Color {
    Color::from_rgba(color.r, color.g, color.b, color.a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_iced_keeps_components() {
        let color = to_iced(wavesurf_core::Color::from_rgba(0.1, 0.2, 0.3, 0.4));
        assert_eq!((color.r, color.g, color.b, color.a), (0.1, 0.2, 0.3, 0.4));
    }
}
