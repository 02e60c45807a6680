use std::fmt::Display;

use thiserror::Error;

use crate::Checksum;

/// An error type for the object-store crate.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid configuration: {0}")]
    ConfigurationFile(#[from] Box<figment::Error>),
    #[error("no bucket was specified")]
    MissingBucket,
    #[error("the bucket name cannot be empty")]
    InvalidBucketName,
    #[error("the object key cannot be empty")]
    InvalidKey,
    /// The underlying error, typically the SDK's, stays reachable through
    /// `anyhow::Error::downcast_ref`.
    #[error("transport error: {0:#}")]
    Transport(anyhow::Error),
    #[error("object `{key}` was not found in bucket `{bucket}`")]
    NotFound { bucket: String, key: String },
    #[error("got {streams} stream(s) for {keys} key(s)")]
    CountMismatch { streams: usize, keys: usize },
    #[error("{} of the uploads failed: {}", .failures.len(), format_upload_failures(.failures))]
    BatchUpload { failures: Vec<(String, Error)> },
    #[error("{} of the deletions failed: {}", .failures.len(), format_key_failures(.failures))]
    BulkDelete { failures: Vec<KeyFailure> },
    #[error("the data sent for `{key}` should have the checksum `{expected}` but it has `{actual}` instead")]
    ChecksumMismatch {
        key: String,
        expected: Checksum,
        actual: Checksum,
    },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn not_found(bucket: &str, key: &str) -> Self {
        Self::NotFound {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Box::new(err).into()
    }
}

/// A per-key failure reported by a bulk request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFailure {
    pub key: String,
    pub code: Option<String>,
    pub message: Option<String>,
}

impl Display for KeyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "`{}`", self.key)?;

        if let Some(code) = &self.code {
            write!(f, " ({})", code)?;
        }

        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }

        Ok(())
    }
}

fn format_upload_failures(failures: &[(String, Error)]) -> String {
    failures
        .iter()
        .map(|(key, err)| format!("`{}`: {}", key, err))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_key_failures(failures: &[KeyFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A result type that can be used to indicate errors.
pub type Result<T, E = Error> = std::result::Result<T, E>;
