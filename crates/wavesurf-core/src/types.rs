//! Core types for the waveform engine

use std::sync::Arc;

/// Decoded audio as consumed by the renderer
///
/// The engine only reads through this trait and never mutates the buffer.
pub trait AudioSource {
    /// Duration in seconds
    fn duration(&self) -> f64;

    /// Number of channels
    fn channel_count(&self) -> usize;

    /// Samples of one channel (values in [-1, 1]), `None` past the last channel
    fn channel(&self, index: usize) -> Option<&[f32]>;
}

/// Per-channel sample arrays of one decoded buffer
///
/// Cheap to clone: channels are shared. A new `render` call replaces the
/// whole value rather than editing it.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChannelData {
    channels: Vec<Arc<[f32]>>,
    duration: f64,
}

impl AudioChannelData {
    /// Wrap decoded channels
    ///
    /// Channels shorter than the first one are padded with silence so every
    /// channel has the same length.
    pub fn new(channels: Vec<Vec<f32>>, duration: f64) -> Self {
        let len = channels.first().map_or(0, Vec::len);
        let channels = channels
            .into_iter()
            .map(|mut channel| {
                channel.resize(len, 0.0);
                Arc::from(channel)
            })
            .collect();
        Self {
            channels,
            duration: duration.max(0.0),
        }
    }

    /// Build from interleaved frames at a given sample rate
    pub fn from_interleaved(samples: &[f32], channel_count: usize, sample_rate: u32) -> Self {
        let channel_count = channel_count.max(1);
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }
        let duration = if sample_rate > 0 {
            frames as f64 / sample_rate as f64
        } else {
            0.0
        };
        Self::new(channels, duration)
    }

    /// Samples per channel
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    /// True when there are no samples at all
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shared handle to one channel
    pub fn channel_arc(&self, index: usize) -> Option<Arc<[f32]>> {
        self.channels.get(index).cloned()
    }
}

impl AudioSource for AudioChannelData {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(|c| &c[..])
    }
}

/// Screen-space rectangle in CSS pixels
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Geometry of one render pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewportGeometry {
    /// Full waveform width in CSS pixels
    pub total_content_width: f64,
    /// Width of the scroll container's visible area
    pub visible_width: f64,
    /// Device pixels per CSS pixel
    pub pixel_ratio: f64,
    /// Always `total_content_width > visible_width`
    pub is_scrollable: bool,
}

impl ViewportGeometry {
    /// Derive the geometry for `duration` seconds at `px_per_sec`
    pub fn new(duration: f64, px_per_sec: f64, visible_width: f64, pixel_ratio: f64) -> Self {
        let total_content_width = (duration.max(0.0) * px_per_sec.max(0.0)).ceil();
        Self {
            total_content_width,
            visible_width,
            pixel_ratio: pixel_ratio.max(1.0),
            is_scrollable: total_content_width > visible_width,
        }
    }
}

/// Clamp a progress value into [0, 1], mapping NaN to 0
#[inline]
pub fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_scrollable_when_content_wider() {
        let geometry = ViewportGeometry::new(10.0, 100.0, 500.0, 1.0);
        assert_eq!(geometry.total_content_width, 1000.0);
        assert!(geometry.is_scrollable);

        let geometry = ViewportGeometry::new(10.0, 40.0, 500.0, 1.0);
        assert_eq!(geometry.total_content_width, 400.0);
        assert!(!geometry.is_scrollable);
    }

    #[test]
    fn test_geometry_rounds_width_up() {
        let geometry = ViewportGeometry::new(1.001, 100.0, 500.0, 2.0);
        assert_eq!(geometry.total_content_width, 101.0);
        assert_eq!(geometry.pixel_ratio, 2.0);
    }

    #[test]
    fn test_channels_padded_to_equal_length() {
        let data = AudioChannelData::new(vec![vec![0.1, 0.2, 0.3], vec![0.5]], 1.0);
        assert_eq!(data.channel_count(), 2);
        assert_eq!(data.channel(1), Some(&[0.5, 0.0, 0.0][..]));
        assert!(data.channel(2).is_none());
    }

    #[test]
    fn test_from_interleaved_splits_frames() {
        let data = AudioChannelData::from_interleaved(&[0.1, -0.1, 0.2, -0.2], 2, 2);
        assert_eq!(data.len(), 2);
        assert_eq!(data.channel(0), Some(&[0.1, 0.2][..]));
        assert_eq!(data.channel(1), Some(&[-0.1, -0.2][..]));
        assert_eq!(data.duration(), 1.0);
    }

    #[test]
    fn test_clamp_progress() {
        assert_eq!(clamp_progress(-0.5), 0.0);
        assert_eq!(clamp_progress(1.5), 1.0);
        assert_eq!(clamp_progress(f64::NAN), 0.0);
        assert_eq!(clamp_progress(0.25), 0.25);
    }
}
