//! Options file handling
//!
//! Render options live in a YAML file so a host can tweak colors, bar
//! geometry, drag and scroll tuning without recompiling:
//!
//! ```ignore
//! use wavesurf_core::config::{default_config_path, load_config};
//! use wavesurf_core::RenderOptions;
//!
//! let options: RenderOptions = load_config(&default_config_path());
//! ```

mod io;
mod paths;

pub use io::{load_config, save_config, try_load_config};
pub use paths::{config_dir, default_config_path};
