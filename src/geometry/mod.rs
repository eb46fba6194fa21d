//! Geometry layer: buffer formats, byte layout, storage backends and the
//! geometry buffer built from them.

mod buffer;
mod error;
mod format;
mod layout;
mod storage;

pub use buffer::GeometryBuffer;
pub use error::{GeometryError, GeometryResult};
pub use format::{BufferFormat, FormatFlags, COMPONENT_SIZE, INDEX_SIZE};
pub use layout::{AttributeRegion, GeometryLayout};
pub use storage::{BufferObjectStorage, ClientArrayStorage, GeometryStorage};
