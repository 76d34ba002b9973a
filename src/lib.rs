//! Lower thirds - overlay configuration and artifact rebuild pipeline
//!
//! Re-exports all modules for use by the binary target and host plugins.

// Core pipeline (compile, publish, surface sync, coordinator)
pub mod core;

// App modules
pub mod cli;
pub mod config;
pub mod entities;
pub mod paths;
pub mod server;

// Re-export commonly used types from core
pub use core::coordinator::Coordinator;
pub use core::error::{LtError, LtResult};
pub use core::events::{CoreEvent, EventBus};
pub use core::surface::{MemorySurface, RenderSurface, SceneFileSurface};

// Re-export entities
pub use entities::{AnimSelector, LtPosition, Overlay, OverlayId, OverlayStore, VisibilitySet};
