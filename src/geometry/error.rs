//! Geometry layer errors

use thiserror::Error;

use crate::backend::{AttributeKind, BackendError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("{what}: {count} elements at offset {offset} exceed capacity {capacity}")]
    OutOfRange {
        what: &'static str,
        offset: usize,
        count: usize,
        capacity: usize,
    },
    #[error("{what}: {count} elements overflow the addressable size")]
    SizeOverflow { what: &'static str, count: usize },
    #[error("Index {index} at position {position} references vertex outside 0..{vertex_count}")]
    IndexOutOfRange {
        position: usize,
        index: u32,
        vertex_count: usize,
    },
    #[error("Buffer format has no {0:?} attribute")]
    MissingAttribute(AttributeKind),
    #[error("{kind:?} attribute cannot have {components} components")]
    InvalidComponentCount { kind: AttributeKind, components: u32 },
    #[error("{what}: need {needed} values, got {got}")]
    InsufficientData {
        what: &'static str,
        needed: usize,
        got: usize,
    },
    #[error("Geometry buffer is not bound")]
    NotBound,
    #[error("Buffer formats differ: {0}")]
    IncompatibleFormats(String),
    #[error("Buffer format has no vertex components")]
    NoVertices,
    #[error("Buffer format has no indices")]
    NotIndexed,
    #[error("Shared buffer is borrowed elsewhere")]
    SharedBufferBusy,
    #[error("Cannot create a shared buffer for an empty batch list")]
    EmptyBatchList,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type GeometryResult<T> = Result<T, GeometryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = GeometryError::OutOfRange {
            what: "vertices",
            offset: 3,
            count: 4,
            capacity: 5,
        };
        assert_eq!(err.to_string(), "vertices: 4 elements at offset 3 exceed capacity 5");
        let err: GeometryError = BackendError::OutOfMemory.into();
        assert_eq!(err.to_string(), "Out of memory");
    }
}
