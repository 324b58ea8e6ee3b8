//! Simulated playback clock
//!
//! The demo has no audio output; position advances with wall time while
//! playing and stops at the end.

use std::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct Transport {
    duration: f64,
    /// Position when playback last started or was seeked
    anchor: f64,
    playing_since: Option<Instant>,
}

impl Transport {
    pub fn new(duration: f64) -> Self {
        Self {
            duration: duration.max(0.0),
            ..Self::default()
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn is_playing(&self) -> bool {
        self.playing_since.is_some()
    }

    /// Position in seconds at `now`
    pub fn position(&self, now: Instant) -> f64 {
        let elapsed = self
            .playing_since
            .map_or(0.0, |since| now.saturating_duration_since(since).as_secs_f64());
        (self.anchor + elapsed).min(self.duration)
    }

    /// Position as a share of the duration
    pub fn progress(&self, now: Instant) -> f64 {
        if self.duration > 0.0 {
            self.position(now) / self.duration
        } else {
            0.0
        }
    }

    pub fn play(&mut self, now: Instant) {
        if self.playing_since.is_none() {
            if self.anchor >= self.duration {
                self.anchor = 0.0;
            }
            self.playing_since = Some(now);
        }
    }

    pub fn pause(&mut self, now: Instant) {
        self.anchor = self.position(now);
        self.playing_since = None;
    }

    pub fn toggle(&mut self, now: Instant) {
        if self.is_playing() {
            self.pause(now);
        } else {
            self.play(now);
        }
    }

    /// Jump to `progress` (0..1), keeping the play state
    pub fn seek(&mut self, progress: f64, now: Instant) {
        self.anchor = progress.clamp(0.0, 1.0) * self.duration;
        if self.playing_since.is_some() {
            self.playing_since = Some(now);
        }
    }

    /// Stop at the end. Returns true when playback just finished.
    pub fn settle(&mut self, now: Instant) -> bool {
        if self.is_playing() && self.position(now) >= self.duration {
            self.anchor = self.duration;
            self.playing_since = None;
            return true;
        }
        false
    }
}
