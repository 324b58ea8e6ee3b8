//! Canvas Program for the waveform widget
//!
//! Translates iced mouse events into pointer batches for the engine and
//! draws the surface: waveform tiles, the progress-colored copies clipped to
//! the progress width, the cursor line and a thin scrollbar.

use std::time::Instant;

use iced::widget::canvas::{self, Event, Frame, Geometry, Program};
use iced::{mouse, window, Point, Rectangle, Size, Theme};
use wavesurf_core::{PointerButton, PointerKind, SurfaceProvider};

use super::{PointerInput, WaveformMessage, WaveformView};
use crate::theme;

/// Canvas state: press tracking for click synthesis
#[derive(Debug, Clone, Copy, Default)]
pub struct CanvasInteraction {
    /// Where the held button went down
    pub press: Option<(Point, PointerButton)>,
    /// Furthest the pointer travelled from the press
    pub travel: f32,
    /// Time of the last synthesized click
    pub last_click: Option<Instant>,
    /// Bounds last reported to the view
    pub bounds: Option<Rectangle>,
}

fn map_button(button: mouse::Button) -> Option<PointerButton> {
    match button {
        mouse::Button::Left => Some(PointerButton::Primary),
        mouse::Button::Right => Some(PointerButton::Secondary),
        mouse::Button::Middle => Some(PointerButton::Middle),
        _ => None,
    }
}

/// Canvas program drawing one [`WaveformView`]
pub struct WaveformCanvas<'a, Message, F>
where
    F: Fn(WaveformMessage) -> Message,
{
    pub view: &'a WaveformView,
    pub on_event: F,
}

impl<'a, Message, F> WaveformCanvas<'a, Message, F>
where
    F: Fn(WaveformMessage) -> Message,
{
    fn pointer(&self, bounds: Rectangle, events: Vec<PointerInput>) -> Option<canvas::Action<Message>> {
        if events.is_empty() {
            return None;
        }
        let message = (self.on_event)(WaveformMessage::Pointer { bounds, events });
        Some(canvas::Action::publish(message).and_capture())
    }
}

impl<'a, Message, F> Program<Message> for WaveformCanvas<'a, Message, F>
where
    Message: Clone,
    F: Fn(WaveformMessage) -> Message,
{
    type State = CanvasInteraction;

    fn update(
        &self,
        interaction: &mut Self::State,
        event: &Event,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> Option<canvas::Action<Message>> {
        let input = |kind, position: Point, button| PointerInput {
            kind,
            x: position.x,
            y: position.y,
            button,
        };

        match event {
            Event::Mouse(mouse::Event::ButtonPressed(button)) => {
                let (Some(button), Some(position)) = (map_button(*button), cursor.position_over(bounds)) else {
                    return None;
                };
                interaction.press = Some((position, button));
                interaction.travel = 0.0;
                self.pointer(bounds, vec![input(PointerKind::Down, position, button)])
            }
            Event::Mouse(mouse::Event::CursorMoved { position }) => {
                let (origin, button) = interaction.press?;
                interaction.travel = interaction.travel.max(origin.distance(*position));
                self.pointer(bounds, vec![input(PointerKind::Move, *position, button)])
            }
            Event::Mouse(mouse::Event::ButtonReleased(released)) => {
                let (_, button) = interaction.press?;
                if map_button(*released) != Some(button) {
                    return None;
                }
                interaction.press = None;
                let position = cursor.position().unwrap_or(Point::ORIGIN);
                let mut events = vec![input(PointerKind::Up, position, button)];

                if interaction.travel <= theme::CLICK_SLOP && cursor.is_over(bounds) {
                    let now = Instant::now();
                    let double = interaction.last_click.is_some_and(|last| {
                        now.duration_since(last).as_secs_f64() * 1000.0 <= theme::DOUBLE_CLICK_MS
                    });
                    events.push(input(PointerKind::Click, position, button));
                    if double {
                        events.push(input(PointerKind::DoubleClick, position, button));
                        interaction.last_click = None;
                    } else {
                        interaction.last_click = Some(now);
                    }
                }
                self.pointer(bounds, events)
            }
            Event::Mouse(mouse::Event::CursorLeft) => {
                let (origin, button) = interaction.press.take()?;
                self.pointer(bounds, vec![input(PointerKind::Leave, origin, button)])
            }
            Event::Mouse(mouse::Event::WheelScrolled { delta }) => {
                cursor.position_over(bounds)?;
                let (x, y) = match delta {
                    mouse::ScrollDelta::Lines { x, y } => (x * 40.0, y * 40.0),
                    mouse::ScrollDelta::Pixels { x, y } => (*x, *y),
                };
                // Vertical wheels scroll the timeline too
                let amount = if x != 0.0 { -x } else { -y };
                Some(canvas::Action::publish((self.on_event)(WaveformMessage::Wheel(amount))).and_capture())
            }
            Event::Window(window::Event::RedrawRequested(_)) | Event::Window(window::Event::Resized(_)) => {
                if interaction.bounds == Some(bounds) {
                    return None;
                }
                interaction.bounds = Some(bounds);
                Some(canvas::Action::publish((self.on_event)(WaveformMessage::Bounds(bounds))))
            }
            _ => None,
        }
    }

    fn mouse_interaction(
        &self,
        interaction: &Self::State,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> mouse::Interaction {
        if interaction.press.is_some() {
            mouse::Interaction::Grabbing
        } else if cursor.is_over(bounds) {
            mouse::Interaction::Pointer
        } else {
            mouse::Interaction::default()
        }
    }

    fn draw(
        &self,
        _interaction: &Self::State,
        renderer: &iced::Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        frame.fill_rectangle(Point::ORIGIN, bounds.size(), theme::BACKGROUND);

        let surface = self.view.surface();
        let scroll = surface.scroll_left() as f32;
        let content_width = surface.content_width() as f32;
        let visible = |rect: &Rectangle| rect.x + rect.width >= 0.0 && rect.x <= bounds.width;
        let placed: Vec<_> = surface
            .tiles()
            .iter()
            .map(|t| {
                let rect = Rectangle::new(
                    Point::new(t.tile.left as f32 - scroll, t.tile.top as f32),
                    Size::new(t.tile.width as f32, t.tile.height as f32),
                );
                (rect, t)
            })
            .filter(|(rect, _)| visible(rect))
            .collect();

        for (rect, t) in &placed {
            frame.draw_image(*rect, canvas::Image::new(t.waveform.clone()));
        }

        let progress_x = (content_width * surface.progress() as f32 - scroll).clamp(0.0, bounds.width);
        if progress_x > 0.0 {
            frame.with_clip(
                Rectangle::new(Point::ORIGIN, Size::new(progress_x, bounds.height)),
                |clipped| {
                    for (rect, t) in &placed {
                        clipped.draw_image(*rect, canvas::Image::new(t.progress.clone()));
                    }
                },
            );
        }

        let style = surface.cursor_style();
        let cursor_x = content_width * surface.cursor() as f32 - scroll;
        let content_height = (surface.content_height() as f32).min(bounds.height);
        frame.fill_rectangle(
            Point::new(cursor_x, 0.0),
            Size::new(style.width as f32, content_height),
            theme::to_iced(style.color),
        );

        let scroll_width = surface.content_width().max(surface.viewport().width) as f32;
        if !surface.scrollbar_hidden() && scroll_width > bounds.width && scroll_width > 0.0 {
            let top = bounds.height - theme::SCROLLBAR_HEIGHT;
            frame.fill_rectangle(
                Point::new(0.0, top),
                Size::new(bounds.width, theme::SCROLLBAR_HEIGHT),
                theme::SCROLLBAR_TRACK,
            );
            let thumb_width = bounds.width * bounds.width / scroll_width;
            let thumb_x = bounds.width * scroll / scroll_width;
            frame.fill_rectangle(
                Point::new(thumb_x, top),
                Size::new(thumb_width, theme::SCROLLBAR_HEIGHT),
                theme::SCROLLBAR_THUMB,
            );
        }

        vec![frame.into_geometry()]
    }
}
