//! Player application state, update and view

use std::path::PathBuf;
use std::time::Instant;

use iced::widget::{button, column, container, row, text, Space};
use iced::{time, Alignment, Element, Length, Subscription, Task, Theme};
use wavesurf_core::{AudioChannelData, AudioSource, ExportType, ExportedImages, RenderOptions, RendererEvent};
use wavesurf_widgets::{waveform_view, WaveformMessage, WaveformView};

use crate::audio;
use crate::transport::Transport;

/// Zoom bounds in pixels per second
const MIN_ZOOM: f64 = 1.0;
const MAX_ZOOM: f64 = 4000.0;

#[derive(Debug, Clone)]
pub enum Message {
    Tick(Instant),
    Waveform(WaveformMessage),
    Loaded(Result<AudioChannelData, String>),
    TogglePlay,
    ZoomIn,
    ZoomOut,
    Export,
}

pub struct PlayerApp {
    waveform: Option<WaveformView>,
    transport: Transport,
    path: Option<PathBuf>,
    status: String,
}

impl PlayerApp {
    pub fn new(options: RenderOptions, path: Option<PathBuf>) -> (Self, Task<Message>) {
        let (waveform, status) = match WaveformView::new(options) {
            Ok(view) => (Some(view), String::from("No file loaded")),
            Err(e) => {
                log::error!("Failed to create waveform view: {}", e);
                (None, format!("Waveform unavailable: {}", e))
            }
        };
        let task = match &path {
            Some(path) => Task::perform(audio::load_wav_async(path.clone()), Message::Loaded),
            None => Task::none(),
        };
        let status = if path.is_some() {
            String::from("Loading...")
        } else {
            status
        };
        (
            Self {
                waveform,
                transport: Transport::default(),
                path,
                status,
            },
            task,
        )
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Tick(now) => {
                if self.transport.settle(now) {
                    self.status = String::from("Finished");
                }
                if let Some(view) = self.waveform.as_mut() {
                    if self.transport.is_playing() {
                        view.set_progress(self.transport.progress(now), true);
                    }
                    view.tick(now);
                }
            }
            Message::Waveform(message) => {
                if let Some(view) = self.waveform.as_mut() {
                    view.handle(message);
                }
            }
            Message::Loaded(Ok(audio)) => {
                self.transport = Transport::new(audio.duration());
                if let Some(view) = &self.waveform {
                    view.load(&audio);
                    view.set_progress(0.0, false);
                }
                self.status = format!("{:.1}s, {} channel(s)", audio.duration(), audio.channel_count());
            }
            Message::Loaded(Err(e)) => {
                log::error!("Load failed: {}", e);
                self.status = format!("Error loading file: {}", e);
            }
            Message::TogglePlay => self.transport.toggle(Instant::now()),
            Message::ZoomIn => self.zoom_by(2.0),
            Message::ZoomOut => self.zoom_by(0.5),
            Message::Export => self.export(),
        }
        self.apply_renderer_events();
        Task::none()
    }

    /// Follow seeks made on the waveform
    fn apply_renderer_events(&mut self) {
        let Some(view) = &self.waveform else { return };
        let now = Instant::now();
        for event in view.take_events() {
            match event {
                RendererEvent::Click { x, .. } => {
                    self.transport.seek(x, now);
                    view.set_progress(x, self.transport.is_playing());
                }
                RendererEvent::DragEnd(progress) => self.transport.seek(progress, now),
                RendererEvent::Drag(_) | RendererEvent::DragStart(_) => {}
                RendererEvent::Scroll { start, end, .. } => {
                    log::trace!("visible {:.3}..{:.3}", start, end);
                }
                RendererEvent::DoubleClick { .. } => self.transport.toggle(now),
                RendererEvent::Resize | RendererEvent::Render | RendererEvent::Rendered => {}
            }
        }
    }

    fn zoom_by(&mut self, factor: f64) {
        let Some(view) = &self.waveform else { return };
        let renderer = view.renderer();
        let duration = self.transport.duration();
        if duration <= 0.0 {
            return;
        }
        // Zero means "fit", so start from the fitted density
        let current = match renderer.options().min_px_per_sec {
            px if px > 0.0 => px,
            _ => renderer.width() / duration,
        };
        let next = (current * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        view.zoom(next);
        self.status = format!("Zoom {:.0} px/s", next);
    }

    fn export(&mut self) {
        let Some(view) = &self.waveform else { return };
        let stem = self
            .path
            .as_ref()
            .and_then(|p| p.file_stem())
            .map_or_else(|| String::from("waveform"), |s| s.to_string_lossy().into_owned());

        let blobs = match view.export("image/png", 100, ExportType::Blob) {
            Ok(ExportedImages::Blobs(blobs)) => blobs,
            Ok(ExportedImages::DataUrls(_)) => Vec::new(),
            Err(e) => {
                self.status = format!("Export failed: {}", e);
                return;
            }
        };
        for (i, bytes) in blobs.iter().enumerate() {
            let target = PathBuf::from(format!("{}-{}.png", stem, i));
            if let Err(e) = std::fs::write(&target, bytes) {
                log::warn!("Failed to write {:?}: {}", target, e);
                self.status = format!("Export failed: {}", e);
                return;
            }
        }
        self.status = format!("Exported {} tile(s)", blobs.len());
    }

    pub fn subscription(&self) -> Subscription<Message> {
        // Engine frames at ~60fps
        time::every(std::time::Duration::from_millis(16)).map(Message::Tick)
    }

    pub fn view(&self) -> Element<'_, Message> {
        let play_label = if self.transport.is_playing() { "Pause" } else { "Play" };
        let controls = row![
            button(play_label).on_press(Message::TogglePlay),
            button("Zoom -").on_press(Message::ZoomOut),
            button("Zoom +").on_press(Message::ZoomIn),
            button("Export PNG").on_press(Message::Export),
            Space::new().width(Length::Fill),
            text(&self.status),
        ]
        .spacing(10)
        .align_y(Alignment::Center);

        let waveform: Element<'_, Message> = match &self.waveform {
            Some(view) => waveform_view(view, Message::Waveform),
            None => text("Waveform unavailable").into(),
        };

        container(column![waveform, controls].spacing(12))
            .padding(16)
            .width(Length::Fill)
            .into()
    }

    pub fn theme(&self) -> Theme {
        Theme::Dark
    }
}
