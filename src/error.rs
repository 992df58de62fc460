// ABOUTME: Typed errors for a sync pass
// ABOUTME: One variant per failure class; every variant aborts the pass

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while configuring or running a sync pass.
///
/// The core never retries. Any of these unwinds the whole pass and the caller
/// decides whether to try again on the next interval.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid configuration detected at construction time
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Could not connect to the source or open the snapshot transaction
    #[error("Connection failed: {context}")]
    Connection {
        context: String,
        #[source]
        source: BoxError,
    },

    /// Schema, table or column listing failed
    #[error("Catalog query failed: {context}")]
    Catalog {
        context: String,
        #[source]
        source: BoxError,
    },

    /// Bulk COPY or temp file I/O failed
    #[error("Export failed: {context}")]
    Export {
        context: String,
        #[source]
        source: BoxError,
    },

    /// An exported row could not be parsed
    #[error("Failed to parse exported data: {context}")]
    Parse {
        context: String,
        #[source]
        source: BoxError,
    },

    /// The destination rejected a write, delete or listing
    #[error("Destination error: {context}")]
    Destination {
        context: String,
        #[source]
        source: BoxError,
    },
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn connection<E>(context: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Connection {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn catalog<E>(context: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Catalog {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn export<E>(context: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Export {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn parse<E>(context: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Parse {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn destination<E>(context: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Destination {
            context: context.into(),
            source: source.into(),
        }
    }
}
