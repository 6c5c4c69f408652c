//! Fundus Viewer Library
//!
//! An interactive 3D eye model viewer that composites diagnostic image
//! overlays onto the fundus surface in real time.

pub mod app;
pub mod command;
pub mod composite;
pub mod config;
pub mod error;
pub mod scene;
pub mod texture;
pub mod visibility;

// Re-export commonly used types
pub use app::FundusViewerApp;
pub use command::SceneCommand;
pub use composite::{
    composite_shader, BlendProfile, CompositeMaterial, Compositor, OverlayEntry, OverlaySet,
    ShaderSource,
};
pub use config::{OverlayPreset, ViewerConfig};
pub use error::CompositeError;
pub use scene::{EyeSide, MeshSurface, RenderContext};
pub use texture::{DecodedImage, TextureError, TextureLoader};
pub use visibility::{FadeController, FadePhase, VisibilityGroup};
