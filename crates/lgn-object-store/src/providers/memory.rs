use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt::Display,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::instrument;

use super::{BoxedAsyncRead, BucketInfo, ObjectStore, PutObjectRequest};
use crate::{Checksum, Error, KeyFailure, Result};

/// An object stored by a `MemoryObjectStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content: Bytes,
    pub content_type: Option<String>,
    pub checksum: Checksum,
}

#[derive(Debug, Default)]
struct RequestCounters {
    put: AtomicUsize,
    get: AtomicUsize,
    delete: AtomicUsize,
    bulk_delete: AtomicUsize,
}

/// A `MemoryObjectStore` is a store that keeps objects in RAM.
///
/// Clones share the same content.
#[derive(Default, Debug, Clone)]
pub struct MemoryObjectStore {
    buckets: Arc<RwLock<BTreeMap<String, DateTime<Utc>>>>,
    objects: Arc<RwLock<HashMap<(String, String), StoredObject>>>,
    rejected_keys: Arc<RwLock<HashSet<String>>>,
    counters: Arc<RequestCounters>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bucket, as reported by `list_buckets`.
    ///
    /// Objects can be written to any bucket name, registered or not.
    pub async fn create_bucket(&self, name: impl Into<String>) {
        self.buckets.write().await.insert(name.into(), Utc::now());
    }

    /// Make every subsequent request on the specified key fail with a
    /// transport error.
    pub async fn reject_key(&self, key: impl Into<String>) {
        self.rejected_keys.write().await.insert(key.into());
    }

    /// Returns a copy of a stored object, if it exists.
    pub async fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_owned(), key.to_owned()))
            .cloned()
    }

    /// The number of objects stored in the specified bucket.
    pub async fn len(&self, bucket: &str) -> usize {
        self.objects
            .read()
            .await
            .keys()
            .filter(|(b, _)| b == bucket)
            .count()
    }

    pub async fn is_empty(&self, bucket: &str) -> bool {
        self.len(bucket).await == 0
    }

    pub fn put_requests(&self) -> usize {
        self.counters.put.load(Ordering::SeqCst)
    }

    pub fn get_requests(&self) -> usize {
        self.counters.get.load(Ordering::SeqCst)
    }

    pub fn delete_requests(&self) -> usize {
        self.counters.delete.load(Ordering::SeqCst)
    }

    pub fn bulk_delete_requests(&self) -> usize {
        self.counters.bulk_delete.load(Ordering::SeqCst)
    }

    /// The total number of requests received by the store.
    pub fn requests(&self) -> usize {
        self.put_requests()
            + self.get_requests()
            + self.delete_requests()
            + self.bulk_delete_requests()
    }

    async fn check_rejected(&self, key: &str) -> Result<()> {
        if self.rejected_keys.read().await.contains(key) {
            Err(Error::Transport(anyhow::anyhow!(
                "request on object `{}` was rejected",
                key
            )))
        } else {
            Ok(())
        }
    }
}

impl Display for MemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "in-memory")
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        Ok(self
            .buckets
            .read()
            .await
            .iter()
            .map(|(name, creation_date)| BucketInfo {
                name: name.clone(),
                creation_date: Some(*creation_date),
            })
            .collect())
    }

    #[instrument(skip(self, request), fields(key = %request.key))]
    async fn put_object(&self, bucket: &str, request: PutObjectRequest) -> Result<()> {
        self.counters.put.fetch_add(1, Ordering::SeqCst);
        self.check_rejected(&request.key).await?;

        let actual = Checksum::new_from_data(&request.body);

        if actual != request.checksum {
            return Err(Error::ChecksumMismatch {
                key: request.key,
                expected: request.checksum,
                actual,
            });
        }

        self.objects.write().await.insert(
            (bucket.to_owned(), request.key),
            StoredObject {
                content: request.body,
                content_type: request.content_type,
                checksum: actual,
            },
        );

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_object(&self, bucket: &str, key: &str) -> Result<BoxedAsyncRead> {
        self.counters.get.fetch_add(1, Ordering::SeqCst);
        self.check_rejected(key).await?;

        match self.object(bucket, key).await {
            Some(object) => Ok(Box::pin(std::io::Cursor::new(object.content))),
            None => Err(Error::not_found(bucket, key)),
        }
    }

    #[instrument(skip(self))]
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.counters.delete.fetch_add(1, Ordering::SeqCst);
        self.check_rejected(key).await?;

        self.objects
            .write()
            .await
            .remove(&(bucket.to_owned(), key.to_owned()));

        Ok(())
    }

    #[instrument(skip(self, keys), fields(count = keys.len()))]
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<Vec<KeyFailure>> {
        self.counters.bulk_delete.fetch_add(1, Ordering::SeqCst);

        let rejected_keys = self.rejected_keys.read().await;
        let mut objects = self.objects.write().await;
        let mut failures = Vec::new();

        for key in keys {
            if rejected_keys.contains(key) {
                failures.push(KeyFailure {
                    key: key.clone(),
                    code: Some("AccessDenied".to_owned()),
                    message: Some("Access Denied".to_owned()),
                });
            } else {
                objects.remove(&(bucket.to_owned(), key.clone()));
            }
        }

        Ok(failures)
    }
}
