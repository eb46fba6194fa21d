//! Backend abstraction layer
//!
//! Provides the [`GraphicsApi`] trait and the backends implementing it: a
//! recording dummy backend that is always available, and an OpenGL backend
//! built on glow behind the `glow-backend` feature.

pub mod dummy;
pub mod traits;
pub mod types;

#[cfg(feature = "glow-backend")]
pub mod glow_backend;

pub use dummy::{DummyBackend, RecordedCall, RecordedIndices, RecordedSource};
#[cfg(feature = "glow-backend")]
pub use glow_backend::GlowBackend;
pub use traits::*;
pub use types::*;
