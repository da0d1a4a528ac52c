use thiserror::Error;

/// Failures of the deterministic geometry stages.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// Degenerate input such as a zero-extent image or a zero-size target
    #[error("validation error: {0}")]
    Validation(String),

    /// A projective mapping could not be computed for the given corners
    #[error("transform error: {0}")]
    Transform(String),
}

impl GeometryError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform(msg.into())
    }
}

/// Failures while building or indexing a strided tensor view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TensorError {
    #[error("tensor rank {0} is outside the supported range 1..=5")]
    UnsupportedRank(usize),

    #[error("shape {shape:?} and strides {strides:?} have different lengths")]
    StrideMismatch {
        shape: Vec<usize>,
        strides: Vec<usize>,
    },

    #[error("view needs {required} elements but the buffer holds {available}")]
    BufferTooSmall { required: usize, available: usize },

    #[error("index {index:?} is out of bounds for shape {shape:?}")]
    IndexOutOfBounds {
        index: Vec<usize>,
        shape: Vec<usize>,
    },

    #[error("flat index {index} is out of bounds for {count} elements")]
    FlatIndexOutOfBounds { index: usize, count: usize },

    #[error("array is not in standard (row-major contiguous) layout")]
    NonContiguous,

    #[error("shape {shape:?} with strides {strides:?} overflows the addressable range")]
    Overflow {
        shape: Vec<usize>,
        strides: Vec<usize>,
    },
}
