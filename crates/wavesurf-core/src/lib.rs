//! Wavesurf Core - headless engine for scrollable waveform displays
//!
//! The engine draws audio into horizontally tiled rasters, keeps a playback
//! cursor in view, turns pointer drags into seeks and eases the scroll offset.
//! It owns no window and no clock: a [`SurfaceProvider`] supplies layout and
//! takes the drawn tiles, and a [`Scheduler`] drives frame and timer work.
//! [`HeadlessSurface`] and [`CooperativeScheduler`] are in-memory
//! implementations used by the tests and by non-interactive hosts.

pub mod color;
pub mod config;
pub mod drag;
pub mod error;
pub mod events;
pub mod export;
pub mod options;
pub mod renderer;
pub mod scheduler;
pub mod scroll;
pub mod surface;
pub mod tiles;
pub mod types;

pub use color::{Color, Fill};
pub use drag::{
    make_draggable, DragConfig, DragHandlers, DragMove, DragSubscription, DragTarget, PointerButton,
    PointerEvent, PointerKind,
};
pub use error::{WaveError, WaveResult};
pub use events::{EventBus, ListenerId, RendererEvent};
pub use export::{ExportType, ExportedImages, DEFAULT_FORMAT, DEFAULT_QUALITY};
pub use options::{BarAlign, ChannelOptions, Height, RenderFn, RenderOptions};
pub use renderer::{CursorState, DragPhase, DragSession, Renderer};
pub use scheduler::{CooperativeScheduler, Scheduler, SharedScheduler, TaskHandle, TaskKind, FRAME_INTERVAL};
pub use scroll::{InertialScroll, ScrollConfig, ScrollState, ScrollTick, ScrollToOptions};
pub use surface::{
    Container, CursorStyle, DrawnTile, ElementId, HeadlessSurface, Region, SharedSurface, SurfaceProvider,
    TileKey, WrapperWidth,
};
pub use types::{AudioChannelData, AudioSource, Rect, ViewportGeometry};
