//! GPU resources built on the geometry layer
//!
//! Batches and meshes, textures, and shader programs.

mod batch;
mod error;
mod mesh;
mod shader;
mod texture;

pub use batch::*;
pub use error::*;
pub use mesh::*;
pub use shader::*;
pub use texture::*;
