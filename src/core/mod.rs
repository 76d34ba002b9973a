//! Core pipeline modules - compile, publish, sync, coordinate
//!
//! These modules never talk to a UI. Presentation layers call into
//! [`Coordinator`] and poll its [`EventBus`].

pub mod atomic;
pub mod compiler;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod publisher;
pub mod surface;

// Re-exports for convenience
pub use compiler::{CompiledArtifacts, compile};
pub use coordinator::Coordinator;
pub use error::{LtError, LtResult};
pub use events::{CoreEvent, EventBus};
pub use publisher::Publisher;
pub use surface::{MemorySurface, RenderSurface, SceneFileSurface, SourceRecord};
