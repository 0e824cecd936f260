//! Error types and result aliases for Voltaic.
//!
//! One variant per pipeline failure class. Every stage failure surfaces
//! to the orchestrator unchanged; the only place errors are absorbed is
//! the transformer's value-level defaulting, which never reaches this
//! type.

/// The result type used throughout Voltaic.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the archival pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or missing configuration. Fatal before any I/O.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the invalid setting.
        message: String,
    },

    /// The time-series store could not be reached or queried.
    #[error("source unavailable: {message}")]
    SourceUnavailable {
        /// Description of the connection/auth/query failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A raw record could not be normalized into a canonical row.
    #[error("transform error: {message}")]
    Transform {
        /// Description of the malformed record.
        message: String,
    },

    /// Partition serialization or publication failed.
    #[error("partition write failed: {message}")]
    WriteFailed {
        /// Description of the write failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The merge into the shadow database failed before the swap.
    /// The live database is unmodified.
    #[error("merge failed: {message}")]
    MergeFailed {
        /// Description of the schema/insert/commit/verification failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A rename in the swap sequence failed. Highest severity: the
    /// live path may be occupied by the backup generation.
    #[error("swap failed: {message}")]
    SwapFailed {
        /// Description of which rename failed.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a source-unavailable error without an underlying cause.
    #[must_use]
    pub fn source_unavailable(message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a source-unavailable error with an underlying cause.
    #[must_use]
    pub fn source_unavailable_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::SourceUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a transform error.
    #[must_use]
    pub fn transform(message: impl Into<String>) -> Self {
        Self::Transform {
            message: message.into(),
        }
    }

    /// Creates a write-failed error without an underlying cause.
    #[must_use]
    pub fn write_failed(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a write-failed error with an underlying cause.
    #[must_use]
    pub fn write_failed_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::WriteFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a merge-failed error without an underlying cause.
    #[must_use]
    pub fn merge_failed(message: impl Into<String>) -> Self {
        Self::MergeFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a merge-failed error with an underlying cause.
    #[must_use]
    pub fn merge_failed_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::MergeFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a swap-failed error without an underlying cause.
    #[must_use]
    pub fn swap_failed(message: impl Into<String>) -> Self {
        Self::SwapFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a swap-failed error with an underlying cause.
    #[must_use]
    pub fn swap_failed_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::SwapFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
