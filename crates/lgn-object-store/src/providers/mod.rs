//! Object store backends.

mod aws_s3;
mod memory;

use std::{fmt::Display, pin::Pin};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::AsyncRead;

pub use aws_s3::{AwsS3ObjectStore, AwsS3Url};
pub use memory::{MemoryObjectStore, StoredObject};

use crate::{Checksum, KeyFailure, Result};

/// A reader as returned by `ObjectStore::get_object`.
///
/// Dropping the reader releases the underlying connection, whether or not the
/// content was fully read.
pub type BoxedAsyncRead = Pin<Box<dyn AsyncRead + Send>>;

/// Information about a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketInfo {
    pub name: String,
    pub creation_date: Option<DateTime<Utc>>,
}

/// A single create-or-overwrite request.
#[derive(Debug, Clone)]
pub struct PutObjectRequest {
    pub key: String,
    pub body: Bytes,
    pub content_type: Option<String>,
    pub checksum: Checksum,
}

impl PutObjectRequest {
    /// Builds a request for the specified content, computing its checksum.
    pub fn new(key: impl Into<String>, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        let checksum = Checksum::new_from_data(&body);

        Self {
            key: key.into(),
            body,
            content_type: None,
            checksum,
        }
    }

    #[must_use]
    pub fn with_content_type(self, content_type: Option<impl Into<String>>) -> Self {
        Self {
            content_type: content_type.map(Into::into),
            ..self
        }
    }
}

/// The capabilities an object storage backend must provide.
///
/// All the operations are scoped to a bucket, so that a single connection can
/// be shared between several clients.
#[async_trait]
pub trait ObjectStore: Display + Send + Sync {
    /// List the buckets visible to the current credentials.
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>>;

    /// Create or overwrite an object.
    ///
    /// The store must reject the request if the content does not match its
    /// checksum.
    async fn put_object(&self, bucket: &str, request: PutObjectRequest) -> Result<()>;

    /// Returns a reader on the content of an object.
    ///
    /// If the object does not exist, `Error::NotFound` is returned.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<BoxedAsyncRead>;

    /// Delete an object.
    ///
    /// Deleting an object that does not exist is not an error.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Delete several objects in a single request.
    ///
    /// The returned vector contains the keys that the store reported as not
    /// deleted. A failure of the request as a whole is returned as an error.
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<Vec<KeyFailure>>;
}
