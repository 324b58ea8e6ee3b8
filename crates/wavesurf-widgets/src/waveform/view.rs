//! Waveform view function
//!
//! ```ignore
//! fn view(&self) -> Element<Message> {
//!     let waveform = waveform_view(&self.waveform, Message::Waveform);
//!     column![waveform, controls].into()
//! }
//! ```

use iced::widget::Canvas;
use iced::{Element, Length};

use super::canvas::WaveformCanvas;
use super::{WaveformMessage, WaveformView};

/// Create the waveform element for `view`
///
/// `on_event` wraps canvas messages into the application's message type;
/// feed them back through [`WaveformView::handle`].
pub fn waveform_view<'a, Message>(
    view: &'a WaveformView,
    on_event: impl Fn(WaveformMessage) -> Message + 'a,
) -> Element<'a, Message>
where
    Message: Clone + 'a,
{
    let height = view.height().map_or(Length::Fill, Length::Fixed);
    Canvas::new(WaveformCanvas { view, on_event })
        .width(Length::Fill)
        .height(height)
        .into()
}
