//! Render options snapshot
//!
//! Everything the renderer reads at render time. The whole struct is serde
//! (de)serializable with defaults for missing fields, so a partial YAML file
//! such as
//!
//! ```yaml
//! wave_color: "#4f4a85"
//! progress_color: ["#383351", "#1d1a2b"]
//! bar_width: 2
//! min_px_per_sec: 100
//! ```
//!
//! is a valid options file. The custom render function cannot be
//! serialized and is always `None` after loading.

use std::fmt;
use std::path::Path;
use std::rc::Rc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::color::{Color, Fill};
use crate::config;
use crate::drag::DragConfig;
use crate::scroll::ScrollConfig;

/// Height of one lane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HeightRepr", into = "HeightRepr")]
pub enum Height {
    /// Fixed CSS pixel height
    Px(f64),
    /// Take the height of the scroll viewport
    Auto,
}

impl Default for Height {
    fn default() -> Self {
        Height::Px(128.0)
    }
}

impl Height {
    /// Concrete height given the viewport height
    pub fn resolve(self, viewport_height: f64) -> f64 {
        match self {
            Height::Px(px) => px.max(0.0),
            Height::Auto if viewport_height > 0.0 => viewport_height,
            Height::Auto => 128.0,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum HeightRepr {
    Px(f64),
    Keyword(String),
}

impl TryFrom<HeightRepr> for Height {
    type Error = String;

    fn try_from(value: HeightRepr) -> Result<Self, Self::Error> {
        match value {
            HeightRepr::Px(px) => Ok(Height::Px(px)),
            HeightRepr::Keyword(word) if word == "auto" => Ok(Height::Auto),
            HeightRepr::Keyword(word) => Err(format!("invalid height: {word:?}")),
        }
    }
}

impl From<Height> for HeightRepr {
    fn from(height: Height) -> Self {
        match height {
            Height::Px(px) => HeightRepr::Px(px),
            Height::Auto => HeightRepr::Keyword("auto".to_string()),
        }
    }
}

/// Vertical alignment of bars
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarAlign {
    Top,
    #[default]
    Center,
    Bottom,
}

/// Custom tile drawing
///
/// Receives the tile's slice of every channel and a transparent raster the
/// size of the tile in device pixels, and paints the waveform into it. The
/// progress copy is derived from whatever alpha it leaves behind.
#[derive(Clone)]
pub struct RenderFn(pub Rc<dyn Fn(&[&[f32]], &mut RgbaImage, &Fill)>);

impl RenderFn {
    pub fn new(f: impl Fn(&[&[f32]], &mut RgbaImage, &Fill) + 'static) -> Self {
        Self(Rc::new(f))
    }
}

impl fmt::Debug for RenderFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RenderFn(..)")
    }
}

/// Per-channel overrides in split-channel mode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelOptions {
    pub height: Option<Height>,
    pub wave_color: Option<Fill>,
    pub progress_color: Option<Fill>,
    pub bar_width: Option<f64>,
    pub bar_gap: Option<f64>,
    pub bar_radius: Option<f64>,
    pub bar_height: Option<f64>,
    pub bar_align: Option<BarAlign>,
    /// Draw over the previous lane instead of below it
    pub overlay: bool,
}

/// Renderer options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub height: Height,
    pub wave_color: Fill,
    pub progress_color: Fill,
    pub cursor_color: Color,
    /// Cursor line width in CSS pixels
    pub cursor_width: f64,
    /// Bar mode is active when any of width, gap or radius is set
    pub bar_width: Option<f64>,
    pub bar_gap: Option<f64>,
    pub bar_radius: Option<f64>,
    /// Vertical scale of bars (1.0 = full height)
    pub bar_height: Option<f64>,
    pub bar_align: Option<BarAlign>,
    /// Zoom level: minimum pixels per second of audio
    pub min_px_per_sec: f64,
    /// Stretch the waveform to the viewport when it fits
    pub fill_parent: bool,
    /// Scale every lane so its loudest sample reaches full height
    pub normalize: bool,
    /// Keep the cursor in view during playback
    pub auto_scroll: bool,
    /// Follow the cursor in small steps while playing
    pub auto_center: bool,
    /// Seek by dragging across the waveform
    pub drag_to_seek: bool,
    pub hide_scrollbar: bool,
    /// Ease scroll offsets instead of writing them directly
    pub inertial_scroll: bool,
    /// Override of the surface's device pixel ratio
    pub pixel_ratio: Option<f64>,
    /// One lane per channel, with optional overrides
    pub split_channels: Option<Vec<ChannelOptions>>,
    pub drag: DragConfig,
    pub scroll: ScrollConfig,
    #[serde(skip)]
    pub render_function: Option<RenderFn>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            height: Height::default(),
            wave_color: Fill::Solid(Color::from_rgba8(0x99, 0x99, 0x99, 0xff)),
            progress_color: Fill::Solid(Color::from_rgba8(0x55, 0x55, 0x55, 0xff)),
            cursor_color: Color::from_rgba8(0x55, 0x55, 0x55, 0xff),
            cursor_width: 2.0,
            bar_width: None,
            bar_gap: None,
            bar_radius: None,
            bar_height: None,
            bar_align: None,
            min_px_per_sec: 0.0,
            fill_parent: true,
            normalize: false,
            auto_scroll: true,
            auto_center: true,
            drag_to_seek: true,
            hide_scrollbar: false,
            inertial_scroll: true,
            pixel_ratio: None,
            split_channels: None,
            drag: DragConfig::default(),
            scroll: ScrollConfig::default(),
            render_function: None,
        }
    }
}

/// Options of a single lane after applying channel overrides
#[derive(Debug, Clone, PartialEq)]
pub struct LaneStyle {
    pub height: Height,
    pub wave_color: Fill,
    pub progress_color: Fill,
    pub bar_width: Option<f64>,
    pub bar_gap: Option<f64>,
    pub bar_radius: Option<f64>,
    pub bar_height: Option<f64>,
    pub bar_align: Option<BarAlign>,
    pub normalize: bool,
}

impl LaneStyle {
    /// True when tiles are drawn as bars rather than a line envelope
    pub fn uses_bars(&self) -> bool {
        self.bar_width.is_some() || self.bar_gap.is_some() || self.bar_radius.is_some()
    }

    /// Bar width in CSS pixels (0.5 when only gap or radius is set)
    pub fn effective_bar_width(&self) -> f64 {
        self.bar_width.unwrap_or(0.5)
    }

    /// Bar gap in CSS pixels (half the bar width by default)
    pub fn effective_bar_gap(&self) -> f64 {
        self.bar_gap.unwrap_or(self.effective_bar_width() / 2.0)
    }
}

impl RenderOptions {
    /// Load from a YAML file, falling back to defaults
    pub fn load(path: &Path) -> Self {
        config::load_config(path)
    }

    /// Write to a YAML file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        config::save_config(self, path)
    }

    /// True when any bar option is set
    pub fn uses_bars(&self) -> bool {
        self.lane_style(None).uses_bars()
    }

    /// Effective style of a lane, with `channel` overrides applied
    pub fn lane_style(&self, channel: Option<&ChannelOptions>) -> LaneStyle {
        let base = LaneStyle {
            height: self.height,
            wave_color: self.wave_color.clone(),
            progress_color: self.progress_color.clone(),
            bar_width: self.bar_width,
            bar_gap: self.bar_gap,
            bar_radius: self.bar_radius,
            bar_height: self.bar_height,
            bar_align: self.bar_align,
            normalize: self.normalize,
        };
        let Some(over) = channel else {
            return base;
        };
        LaneStyle {
            height: over.height.unwrap_or(base.height),
            wave_color: over.wave_color.clone().unwrap_or(base.wave_color),
            progress_color: over.progress_color.clone().unwrap_or(base.progress_color),
            bar_width: over.bar_width.or(base.bar_width),
            bar_gap: over.bar_gap.or(base.bar_gap),
            bar_radius: over.bar_radius.or(base.bar_radius),
            bar_height: over.bar_height.or(base.bar_height),
            bar_align: over.bar_align.or(base.bar_align),
            normalize: base.normalize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "wave_color: \"#ff0000\"\nbar_width: 2\nheight: auto\nmin_px_per_sec: 100\n";
        let options: RenderOptions = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(options.wave_color, Fill::Solid(Color::from_rgb(1.0, 0.0, 0.0)));
        assert_eq!(options.bar_width, Some(2.0));
        assert_eq!(options.height, Height::Auto);
        assert_eq!(options.min_px_per_sec, 100.0);
        assert!(options.fill_parent);
        assert_eq!(options.drag, DragConfig::default());
        assert!(options.uses_bars());
    }

    #[test]
    fn test_invalid_height_keyword_rejected() {
        let result: Result<RenderOptions, _> = serde_yaml::from_str("height: tall\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_channel_overrides() {
        let options = RenderOptions {
            bar_width: Some(3.0),
            ..RenderOptions::default()
        };
        let channel = ChannelOptions {
            wave_color: Some(Fill::Solid(Color::WHITE)),
            height: Some(Height::Px(40.0)),
            ..ChannelOptions::default()
        };
        let style = options.lane_style(Some(&channel));
        assert_eq!(style.wave_color, Fill::Solid(Color::WHITE));
        assert_eq!(style.height, Height::Px(40.0));
        assert_eq!(style.bar_width, Some(3.0), "Unset overrides inherit");
        assert_eq!(style.progress_color, options.progress_color);
    }

    #[test]
    fn test_bar_defaults() {
        let style = RenderOptions {
            bar_gap: Some(1.0),
            ..RenderOptions::default()
        }
        .lane_style(None);
        assert!(style.uses_bars());
        assert_eq!(style.effective_bar_width(), 0.5);
        assert_eq!(style.effective_bar_gap(), 1.0);

        let style = RenderOptions {
            bar_width: Some(4.0),
            ..RenderOptions::default()
        }
        .lane_style(None);
        assert_eq!(style.effective_bar_gap(), 2.0);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.yaml");
        let options = RenderOptions {
            progress_color: Fill::Gradient(vec![Color::BLACK, Color::WHITE]),
            split_channels: Some(vec![ChannelOptions {
                overlay: true,
                ..ChannelOptions::default()
            }]),
            ..RenderOptions::default()
        };
        options.save(&path).unwrap();

        let loaded = RenderOptions::load(&path);
        assert_eq!(loaded.progress_color, options.progress_color);
        assert_eq!(loaded.split_channels, options.split_channels);
        assert!(loaded.render_function.is_none());
    }

    #[test]
    fn test_auto_height_uses_viewport() {
        assert_eq!(Height::Auto.resolve(200.0), 200.0);
        assert_eq!(Height::Auto.resolve(0.0), 128.0);
        assert_eq!(Height::Px(64.0).resolve(200.0), 64.0);
    }
}
