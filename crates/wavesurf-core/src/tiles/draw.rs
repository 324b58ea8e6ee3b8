//! Tile rasterization
//!
//! Drawing happens in two steps. First a coverage mask is built (one `f32`
//! per device pixel, 0 = empty, 1 = fully covered) from either a line
//! envelope or a bar grid. Then the mask is colorized with the wave fill.
//! The progress raster is the waveform raster with the progress fill
//! composited "source-in": progress color, waveform alpha.

use image::{Rgba, RgbaImage};

use crate::color::Fill;
use crate::options::{BarAlign, LaneStyle};

/// Per-pixel coverage of one tile
#[derive(Debug, Clone)]
pub struct Coverage {
    width: u32,
    height: u32,
    alpha: Vec<f32>,
}

impl Coverage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            alpha: vec![0.0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.alpha[(y * self.width + x) as usize]
    }

    /// Cover a (possibly rounded) rectangle given in fractional device pixels
    ///
    /// Edges get partial coverage; pixels whose centre falls outside a
    /// rounded corner stay empty.
    pub fn fill_rect(&mut self, x0: f64, y0: f64, w: f64, h: f64, radius: f64) {
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        let (x1, y1) = (x0 + w, y0 + h);
        let r = radius.clamp(0.0, w.min(h) / 2.0);

        let col_start = x0.floor().max(0.0) as u32;
        let col_end = (x1.ceil().max(0.0) as u32).min(self.width);
        let row_start = y0.floor().max(0.0) as u32;
        let row_end = (y1.ceil().max(0.0) as u32).min(self.height);

        for py in row_start..row_end {
            let top = py as f64;
            let v = (y1.min(top + 1.0) - y0.max(top)).clamp(0.0, 1.0);
            for px in col_start..col_end {
                let left = px as f64;
                let u = (x1.min(left + 1.0) - x0.max(left)).clamp(0.0, 1.0);
                if r > 0.0 && outside_corner(left + 0.5, top + 0.5, x0, y0, x1, y1, r) {
                    continue;
                }
                let idx = (py * self.width + px) as usize;
                let cov = (u * v) as f32;
                if cov > self.alpha[idx] {
                    self.alpha[idx] = cov;
                }
            }
        }
    }

    /// Colorize with a fill spread over the tile height
    pub fn colorize(&self, fill: &Fill) -> RgbaImage {
        let rows = fill.rows(self.height);
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let [r, g, b, a] = rows[y as usize];
            let alpha = (a as f32 * self.get(x, y)).round() as u8;
            Rgba([r, g, b, alpha])
        })
    }
}

fn outside_corner(cx: f64, cy: f64, x0: f64, y0: f64, x1: f64, y1: f64, r: f64) -> bool {
    let corner_x = if cx < x0 + r {
        x0 + r
    } else if cx > x1 - r {
        x1 - r
    } else {
        return false;
    };
    let corner_y = if cy < y0 + r {
        y0 + r
    } else if cy > y1 - r {
        y1 - r
    } else {
        return false;
    };
    (cx - corner_x).hypot(cy - corner_y) > r
}

/// Largest absolute sample in `samples`
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |max, s| max.max(s.abs()))
}

/// Line envelope: per pixel column, the loudest sample of the first channel
/// above the centre line and of the second (or first) channel below it
pub fn line_envelope(channels: &[&[f32]], v_scale: f64, width: u32, height: u32) -> Coverage {
    let mut coverage = Coverage::new(width, height);
    let Some(&top) = channels.first() else {
        return coverage;
    };
    let bottom = channels.get(1).copied().unwrap_or(top);
    let len = top.len().min(bottom.len());
    if len == 0 || width == 0 {
        return coverage;
    }

    let half = height as f64 / 2.0;
    for x in 0..width {
        let s0 = x as usize * len / width as usize;
        let s1 = ((x as usize + 1) * len / width as usize).max(s0 + 1).min(len);
        let top_h = peak(&top[s0..s1]) as f64 * half * v_scale;
        let bottom_h = peak(&bottom[s0..s1]) as f64 * half * v_scale;
        let column_h = (top_h + bottom_h).max(1.0);
        let y = if top_h + bottom_h < 1.0 { half - 0.5 } else { half - top_h };
        coverage.fill_rect(x as f64, y, 1.0, column_h, 0.0);
    }
    coverage
}

/// Bar grid: one bar per `bar_width + bar_gap` period, height from the
/// loudest samples that fall into the period
pub fn bars(
    channels: &[&[f32]],
    style: &LaneStyle,
    v_scale: f64,
    width: u32,
    height: u32,
    pixel_ratio: f64,
) -> Coverage {
    let mut coverage = Coverage::new(width, height);
    let Some(&top) = channels.first() else {
        return coverage;
    };
    let bottom = channels.get(1).copied().unwrap_or(top);
    let len = top.len().min(bottom.len());
    if len == 0 || width == 0 {
        return coverage;
    }

    let bar_width = style.effective_bar_width() * pixel_ratio;
    let bar_gap = style.effective_bar_gap() * pixel_ratio;
    let period = bar_width + bar_gap;
    let radius = style.bar_radius.unwrap_or(0.0) * pixel_ratio;
    let align = style.bar_align.unwrap_or_default();
    let half = height as f64 / 2.0;

    let bar_count = (width as f64 / period).ceil() as usize;
    let samples_per_bar = len as f64 * period / width as f64;

    for bar in 0..bar_count {
        let s0 = (bar as f64 * samples_per_bar).floor() as usize;
        if s0 >= len {
            break;
        }
        let s1 = (((bar + 1) as f64 * samples_per_bar).floor() as usize).clamp(s0 + 1, len);

        let top_h = (peak(&top[s0..s1]) as f64 * half * v_scale).round();
        let bottom_h = (peak(&bottom[s0..s1]) as f64 * half * v_scale).round();
        let bar_h = (top_h + bottom_h).max(1.0);
        let y = match align {
            BarAlign::Top => 0.0,
            BarAlign::Bottom => height as f64 - bar_h,
            BarAlign::Center => half - top_h,
        };
        coverage.fill_rect(bar as f64 * period, y, bar_width, bar_h, radius);
    }
    coverage
}

/// Progress fill composited "source-in" over a waveform raster
pub fn source_in(waveform: &RgbaImage, fill: &Fill) -> RgbaImage {
    let rows = fill.rows(waveform.height());
    RgbaImage::from_fn(waveform.width(), waveform.height(), |x, y| {
        let [r, g, b, a] = rows[y as usize];
        let dst = waveform.get_pixel(x, y)[3];
        Rgba([r, g, b, ((a as u16 * dst as u16 + 127) / 255) as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::options::RenderOptions;

    fn column_alpha(coverage: &Coverage, x: u32) -> Vec<f32> {
        (0..coverage.height()).map(|y| coverage.get(x, y)).collect()
    }

    #[test]
    fn test_silence_draws_centre_line() {
        let silence = vec![0.0f32; 100];
        let coverage = line_envelope(&[&silence], 1.0, 10, 20);
        let column = column_alpha(&coverage, 3);
        let covered: f32 = column.iter().sum();
        assert!((covered - 1.0).abs() < 1e-6, "Exactly one pixel of centre line");
        assert!(column[9] > 0.0 || column[10] > 0.0);
    }

    #[test]
    fn test_full_scale_fills_column() {
        let loud = vec![1.0f32, -1.0].repeat(50);
        let coverage = line_envelope(&[&loud], 1.0, 10, 20);
        assert!(column_alpha(&coverage, 0).iter().all(|&a| a == 1.0));
    }

    #[test]
    fn test_second_channel_drives_bottom_half() {
        let top = vec![1.0f32; 40];
        let bottom = vec![0.0f32; 40];
        let coverage = line_envelope(&[&top, &bottom], 1.0, 4, 20);
        let column = column_alpha(&coverage, 0);
        assert!(column[..10].iter().all(|&a| a == 1.0));
        assert!(column[10..].iter().all(|&a| a == 0.0));
    }

    #[test]
    fn test_bars_leave_gaps() {
        let style = RenderOptions {
            bar_width: Some(2.0),
            bar_gap: Some(2.0),
            ..RenderOptions::default()
        }
        .lane_style(None);
        let loud = vec![1.0f32; 80];
        let coverage = bars(&[&loud], &style, 1.0, 16, 8, 1.0);
        assert_eq!(coverage.get(0, 4), 1.0);
        assert_eq!(coverage.get(1, 4), 1.0);
        assert_eq!(coverage.get(2, 4), 0.0);
        assert_eq!(coverage.get(3, 4), 0.0);
        assert_eq!(coverage.get(4, 4), 1.0);
    }

    #[test]
    fn test_bar_alignment() {
        let mut style = RenderOptions {
            bar_width: Some(2.0),
            ..RenderOptions::default()
        }
        .lane_style(None);
        let quiet = vec![0.5f32; 40];

        style.bar_align = Some(BarAlign::Bottom);
        let coverage = bars(&[&quiet], &style, 1.0, 6, 20, 1.0);
        assert_eq!(coverage.get(0, 19), 1.0);
        assert_eq!(coverage.get(0, 0), 0.0);

        style.bar_align = Some(BarAlign::Top);
        let coverage = bars(&[&quiet], &style, 1.0, 6, 20, 1.0);
        assert_eq!(coverage.get(0, 0), 1.0);
        assert_eq!(coverage.get(0, 19), 0.0);
    }

    #[test]
    fn test_rounded_corner_is_cut() {
        let mut coverage = Coverage::new(10, 10);
        coverage.fill_rect(0.0, 0.0, 10.0, 10.0, 4.0);
        assert_eq!(coverage.get(0, 0), 0.0);
        assert_eq!(coverage.get(5, 5), 1.0);
        assert_eq!(coverage.get(5, 0), 1.0);
    }

    #[test]
    fn test_source_in_keeps_waveform_alpha() {
        let mut coverage = Coverage::new(2, 1);
        coverage.fill_rect(0.0, 0.0, 1.0, 1.0, 0.0);
        let waveform = coverage.colorize(&Fill::Solid(Color::WHITE));
        let progress = source_in(&waveform, &Fill::Solid(Color::from_rgb(1.0, 0.0, 0.0)));
        assert_eq!(progress.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(progress.get_pixel(1, 0).0[3], 0);
    }

    #[test]
    fn test_peak() {
        assert_eq!(peak(&[0.1, -0.7, 0.3]), 0.7);
        assert_eq!(peak(&[]), 0.0);
    }
}
