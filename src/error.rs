//! Retrieval error taxonomy.
//!
//! Load-time index corruption is fatal to store construction. Ingestion-path
//! errors degrade to a boolean failure at the engine boundary. Query-time
//! absence of data is never an error, only an empty result.

/// Errors produced by the retrieval subsystem.
#[derive(Debug)]
pub enum RetrievalError {
    /// Extraction was given a file whose detected content type is unsupported.
    UnsupportedType(String),
    /// A supported file failed to parse during text extraction.
    Extract(String),
    /// Vector batch and metadata batch disagree in count, or a vector has the
    /// wrong dimension.
    ShapeMismatch(String),
    /// The on-disk index artifacts are inconsistent (one missing, or record
    /// counts / dimensions disagree). Never silently repaired.
    CorruptIndex(String),
    /// The embedding provider call failed or returned a malformed batch.
    Provider(String),
    /// Durable read/write failure.
    Io(std::io::Error),
}

impl std::fmt::Display for RetrievalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetrievalError::UnsupportedType(detail) => {
                write!(f, "unsupported content type: {}", detail)
            }
            RetrievalError::Extract(detail) => {
                write!(f, "text extraction failed: {}", detail)
            }
            RetrievalError::ShapeMismatch(detail) => {
                write!(f, "vector/metadata shape mismatch: {}", detail)
            }
            RetrievalError::CorruptIndex(detail) => {
                write!(f, "corrupt index storage: {}", detail)
            }
            RetrievalError::Provider(detail) => {
                write!(f, "embedding provider error: {}", detail)
            }
            RetrievalError::Io(e) => write!(f, "storage I/O error: {}", e),
        }
    }
}

impl std::error::Error for RetrievalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RetrievalError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RetrievalError {
    fn from(e: std::io::Error) -> Self {
        RetrievalError::Io(e)
    }
}
