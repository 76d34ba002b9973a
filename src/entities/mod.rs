//! Entities module - overlay definitions and their two persisted views
//!
//! - `Overlay` / `OverlayStore`: content, order and identity (`lt-state.json`)
//! - `VisibilitySet`: shown/hidden per id (`lt-visible.json`)
//!
//! The two files are written independently so that a show/hide never
//! touches template content.

pub mod keys;
pub mod overlay;
pub mod store;
pub mod visibility;

pub use overlay::{AnimSelector, LtPosition, Overlay, OverlayId};
pub use store::OverlayStore;
pub use visibility::VisibilitySet;
