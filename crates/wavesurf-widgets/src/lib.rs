//! iced widgets for the wavesurf waveform renderer
//!
//! ## Architecture (iced 0.14 patterns)
//!
//! - **State**: [`WaveformView`] owns the engine and lives in application state
//! - **View function**: [`waveform_view`] takes the state and a message wrapper
//! - **Canvas Program**: translates mouse input and draws the surface
//!
//! The engine is single-threaded and clock-less. The application drives it
//! by calling [`WaveformView::tick`] from a frame subscription.

pub mod surface;
pub mod theme;
pub mod waveform;

pub use surface::{IcedSurface, TileImage};
pub use waveform::{
    waveform_view, CanvasInteraction, PointerInput, WaveformCanvas, WaveformMessage, WaveformView, HOST,
};
