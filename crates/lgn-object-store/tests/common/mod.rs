use std::{fmt::Display, sync::Arc};

use async_trait::async_trait;
use lgn_object_store::{
    BoxedAsyncRead, BucketInfo, KeyFailure, MemoryObjectStore, ObjectStore, ObjectStoreClient,
    PutObjectRequest, Result,
};
use tokio::sync::Barrier;
use tokio_util::io::StreamReader;

pub(crate) const BUCKET: &str = "test-bucket";

pub(crate) fn new_memory_client() -> (MemoryObjectStore, ObjectStoreClient) {
    let store = MemoryObjectStore::new();
    let client = ObjectStoreClient::new(Arc::new(store.clone()), BUCKET).unwrap();

    (store, client)
}

/// A store whose uploads only complete once a given number of them are in
/// flight at the same time.
pub(crate) struct BarrierObjectStore {
    inner: MemoryObjectStore,
    barrier: Barrier,
}

impl BarrierObjectStore {
    pub(crate) fn new(inner: MemoryObjectStore, concurrent_uploads: usize) -> Self {
        Self {
            inner,
            barrier: Barrier::new(concurrent_uploads),
        }
    }
}

impl Display for BarrierObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "barrier over {}", self.inner)
    }
}

#[async_trait]
impl ObjectStore for BarrierObjectStore {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        self.inner.list_buckets().await
    }

    async fn put_object(&self, bucket: &str, request: PutObjectRequest) -> Result<()> {
        self.barrier.wait().await;
        self.inner.put_object(bucket, request).await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<BoxedAsyncRead> {
        self.inner.get_object(bucket, key).await
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.inner.delete_object(bucket, key).await
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<Vec<KeyFailure>> {
        self.inner.delete_objects(bucket, keys).await
    }
}

/// A store whose downloads fail after the first chunk of content.
pub(crate) struct TruncatingObjectStore {
    inner: MemoryObjectStore,
}

impl TruncatingObjectStore {
    pub(crate) fn new(inner: MemoryObjectStore) -> Self {
        Self { inner }
    }
}

impl Display for TruncatingObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "truncating {}", self.inner)
    }
}

#[async_trait]
impl ObjectStore for TruncatingObjectStore {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        self.inner.list_buckets().await
    }

    async fn put_object(&self, bucket: &str, request: PutObjectRequest) -> Result<()> {
        self.inner.put_object(bucket, request).await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<BoxedAsyncRead> {
        let object = self
            .inner
            .object(bucket, key)
            .await
            .ok_or_else(|| lgn_object_store::Error::NotFound {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            })?;

        let half = object.content.len() / 2;
        let chunks = vec![
            Ok(object.content.slice(..half)),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )),
        ];

        Ok(Box::pin(StreamReader::new(tokio_stream::iter(chunks))))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.inner.delete_object(bucket, key).await
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<Vec<KeyFailure>> {
        self.inner.delete_objects(bucket, keys).await
    }
}
