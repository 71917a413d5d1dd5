use thiserror::Error;

/// Errors raised while building recurrent networks or moving tensors to and from disk
#[derive(Debug, Error)]
pub enum RnnError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("shape mismatch for `{name}`: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("input sequence is empty")]
    EmptySequence,

    #[error("tensor `{0}` not found")]
    MissingTensor(String),

    #[error("tensor `{0}` already present")]
    DuplicateTensor(String),

    #[error("tensor `{0}` does not belong in this bundle")]
    UnexpectedTensor(String),

    #[error("fixture mismatch: expected {expected}, found {found}")]
    FixtureMismatch { expected: String, found: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("binary serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RnnError {
    pub(crate) fn shape(name: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
        RnnError::ShapeMismatch {
            name: name.into(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RnnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_message() {
        let err = RnnError::shape("weight_ih_l0", &[60, 10], &[60, 9]);
        assert_eq!(
            err.to_string(),
            "shape mismatch for `weight_ih_l0`: expected [60, 10], got [60, 9]"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: RnnError = io.into();
        assert!(matches!(err, RnnError::Io(_)));
    }
}
