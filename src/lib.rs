//! flow-viewer
//!
//! An embeddable 3D model viewer widget for native and WASM hosts. A viewer
//! loads one model (glTF/GLB or OBJ), centers and frames it automatically,
//! renders it every display refresh and lets users spin it with a horizontal
//! swipe without hijacking vertical page scrolling. Models can be swapped at
//! any time; the previous model's resources are always released and slow
//! loads never override newer ones.
//!
//! High-level modules
//! - `viewer`: the [`ModelViewer`] handle, element hooks and events
//! - `context`: per-viewer state and its synchronous operations
//! - `gesture`: scroll-vs-rotate disambiguation of touch gestures
//! - `camera`: camera, projection and automatic framing
//! - `loading`: ordering of overlapping model loads
//! - `lifecycle`: installed model ownership and leak-free disposal
//! - `render_loop` / `render`: per-frame updates and frame composition
//! - `backend` / `platform`: seams to the renderer and the host scheduler
//! - `resources`: asset fetching and glTF / OBJ import
//! - `config`: attribute parsing and defaults
//! - `app`: a winit window hosting one viewer (native only)
//! - `web`: browser platform, DOM events and touch listeners (wasm only)
//!

#[cfg(not(target_arch = "wasm32"))]
pub mod app;
pub mod backend;
pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod gesture;
pub mod input;
pub mod lifecycle;
pub mod loading;
pub mod platform;
pub mod render;
pub mod render_loop;
pub mod resources;
pub mod viewer;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use backend::{HeadlessBackend, RenderBackend};
pub use config::ViewConfig;
pub use error::{AttributeError, LoadFailure};
pub use resources::{AssetLoader, FileAssetLoader};
pub use viewer::{ElementHooks, ModelViewer, ViewerEvent};

// Re-exports commonly used types for convenience in downstream code.
pub use winit::dpi::PhysicalSize;
pub use winit::event::WindowEvent;

/// Installs the logger of the current platform: `env_logger` natively
/// (configured through `RUST_LOG`), the browser console on the web.
pub fn init_logging() {
    #[cfg(not(target_arch = "wasm32"))]
    if let Err(e) = env_logger::try_init() {
        log::debug!("Logger already initialised: {}", e);
    }
    #[cfg(target_arch = "wasm32")]
    if let Err(e) = console_log::init_with_level(log::Level::Info) {
        log::debug!("Logger already initialised: {}", e);
    }
}
