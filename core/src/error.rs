use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building or reading the on-disk index.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt artifact {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("partial index #{seq} missing at {path}")]
    MissingPartial { seq: u32, path: PathBuf },

    #[error("partial index #{seq} at {path} is corrupt: {source}")]
    CorruptPartial {
        seq: u32,
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("term {term:?} has no alphanumeric leading character")]
    InvalidTerm { term: String },

    #[error("invalid metadata in {path}: {source}")]
    Meta {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IndexError::Io { path: path.into(), source }
    }

    /// True when the error only means an artifact was never written.
    pub fn is_not_found(&self) -> bool {
        match self {
            IndexError::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            IndexError::MissingPartial { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_errors_name_the_batch() {
        let err = IndexError::MissingPartial { seq: 7, path: PathBuf::from("/tmp/p/partial_00007.bin") };
        assert_eq!(err.to_string(), "partial index #7 missing at /tmp/p/partial_00007.bin");
        assert!(err.is_not_found());
    }

    #[test]
    fn invalid_term_is_not_a_missing_artifact() {
        let err = IndexError::InvalidTerm { term: "-x".into() };
        assert!(!err.is_not_found());
    }
}
