//! Legion Object Store
//!
//! Upload, download and delete objects in a bucket of an object store, either
//! AWS S3 (or any S3-compatible service) or an in-memory store.
//!
//! Every upload carries the SHA-256 checksum of its content, which the store
//! verifies.

// crate-specific lint exceptions:
#![allow(clippy::missing_errors_doc)]

mod checksum;
mod client;
mod config;
mod content_type;
mod errors;
pub mod providers;

pub use checksum::Checksum;
pub use client::ObjectStoreClient;
pub use config::{
    AwsS3ProviderConfig, Config, ProviderConfig, CONFIG_FILE_ENV, DEFAULT_FILENAME, ENV_PREFIX,
};
pub use content_type::content_type_for_key;
pub use errors::{Error, KeyFailure, Result};
pub use providers::{
    AwsS3ObjectStore, AwsS3Url, BoxedAsyncRead, BucketInfo, MemoryObjectStore, ObjectStore,
    PutObjectRequest, StoredObject,
};
