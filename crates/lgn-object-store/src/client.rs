use std::{fmt::Display, path::Path, sync::Arc};

use bytes::Bytes;
use futures::future::join_all;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    checksum::HashingReader, content_type_for_key, AwsS3ObjectStore, AwsS3ProviderConfig,
    BoxedAsyncRead, BucketInfo, Config, Error, ObjectStore, PutObjectRequest, Result,
};

/// A handle on a bucket of an object store.
///
/// The handle is cheap to clone and can be used concurrently.
#[derive(Clone)]
pub struct ObjectStoreClient {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStoreClient {
    /// Creates a client on the specified bucket of an existing store.
    ///
    /// # Errors
    ///
    /// If the bucket name is empty, `Error::InvalidBucketName` is returned.
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();

        if bucket.is_empty() {
            return Err(Error::InvalidBucketName);
        }

        Ok(Self { store, bucket })
    }

    /// Creates a client on the specified AWS S3 bucket, resolving the region
    /// and credentials from the environment.
    ///
    /// # Errors
    ///
    /// If no region or credentials can be resolved, `Error::Configuration` is
    /// returned.
    pub async fn from_env(bucket: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();

        if bucket.is_empty() {
            return Err(Error::InvalidBucketName);
        }

        let store = AwsS3ObjectStore::new(&AwsS3ProviderConfig::default()).await?;

        Self::new(Arc::new(store), bucket)
    }

    /// Creates a client from a configuration.
    ///
    /// # Errors
    ///
    /// If the configuration has no bucket, `Error::MissingBucket` is returned.
    ///
    /// If the store cannot be instantiated, an error is returned.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let bucket = config.bucket_or(None)?;

        if bucket.is_empty() {
            return Err(Error::InvalidBucketName);
        }

        let store = config.provider.instantiate().await?;

        Self::new(store, bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// List the buckets visible from the underlying store.
    ///
    /// # Errors
    ///
    /// If the request fails, `Error::Transport` is returned.
    pub async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        self.store.list_buckets().await
    }

    /// Upload an object, overwriting any previous version.
    ///
    /// The reader is consumed entirely. The content type is guessed from the
    /// key's extension and the SHA-256 checksum of the content is sent along
    /// so that the store can verify it.
    ///
    /// # Errors
    ///
    /// If the key is empty, `Error::InvalidKey` is returned.
    ///
    /// If reading fails, `Error::Io` is returned. Otherwise, the store's error
    /// is returned as-is.
    #[instrument(skip(self, reader), fields(bucket = %self.bucket))]
    pub async fn put_object(
        &self,
        key: &str,
        reader: impl AsyncRead + Send + Unpin,
    ) -> Result<()> {
        check_key(key)?;

        let mut reader = HashingReader::new(reader);
        let mut body = Vec::new();

        reader.read_to_end(&mut body).await?;

        let request = PutObjectRequest {
            key: key.to_owned(),
            body: Bytes::from(body),
            content_type: content_type_for_key(key).map(ToOwned::to_owned),
            checksum: reader.finalize(),
        };

        debug!(
            size = request.body.len(),
            checksum = %request.checksum,
            content_type = request.content_type.as_deref().unwrap_or_default(),
            "uploading object"
        );

        self.store.put_object(&self.bucket, request).await
    }

    /// Upload several objects concurrently.
    ///
    /// All the uploads run to completion, even if some of them fail.
    ///
    /// # Errors
    ///
    /// If `readers` and `keys` have different lengths, `Error::CountMismatch`
    /// is returned and nothing is uploaded.
    ///
    /// If any upload fails, `Error::BatchUpload` is returned with the failed
    /// keys and their errors, in the order of `keys`.
    #[instrument(skip(self, readers, keys), fields(bucket = %self.bucket, count = keys.len()))]
    pub async fn put_objects<R, K>(&self, readers: Vec<R>, keys: &[K]) -> Result<()>
    where
        R: AsyncRead + Send + Unpin,
        K: AsRef<str> + Sync,
    {
        if readers.len() != keys.len() {
            return Err(Error::CountMismatch {
                streams: readers.len(),
                keys: keys.len(),
            });
        }

        let futures = readers
            .into_iter()
            .zip(keys)
            .map(|(reader, key)| async move {
                let key = key.as_ref();
                let result = self.put_object(key, reader).await;

                if let Err(err) = &result {
                    error!(key, error = %err, "failed to upload object");
                }

                (key, result)
            })
            .collect::<Vec<_>>();

        let failures: Vec<_> = join_all(futures)
            .await
            .into_iter()
            .filter_map(|(key, result)| result.err().map(|err| (key.to_owned(), err)))
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::BatchUpload { failures })
        }
    }

    /// Upload a local file.
    ///
    /// # Errors
    ///
    /// If the file cannot be opened, `Error::Io` is returned. See
    /// `put_object` for the other errors.
    pub async fn upload_file(&self, path: impl AsRef<Path>, key: &str) -> Result<()> {
        let file = tokio::fs::File::open(path.as_ref()).await?;

        self.put_object(key, file).await
    }

    /// Returns a reader on the content of an object.
    ///
    /// Dropping the reader releases the connection, whether or not the content
    /// was read entirely.
    ///
    /// # Errors
    ///
    /// If the object does not exist, `Error::NotFound` is returned.
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn get_object(&self, key: &str) -> Result<BoxedAsyncRead> {
        check_key(key)?;

        self.store.get_object(&self.bucket, key).await
    }

    /// Reads the full content of an object.
    ///
    /// # Errors
    ///
    /// If the object does not exist, `Error::NotFound` is returned.
    pub async fn read_object(&self, key: &str) -> Result<Vec<u8>> {
        let mut reader = self.get_object(key).await?;
        let mut content = Vec::new();

        reader.read_to_end(&mut content).await?;

        Ok(content)
    }

    /// Download an object and persist it to disk at the specified location.
    ///
    /// # Errors
    ///
    /// If the object does not exist, `Error::NotFound` is returned and the
    /// destination file is not created.
    ///
    /// If the download fails midway, `Error::Io` is returned and the partial
    /// destination file is removed.
    pub async fn download_object(&self, key: &str, path: impl AsRef<Path>) -> Result<u64> {
        let path = path.as_ref();
        let mut reader = self.get_object(key).await?;
        let mut writer = tokio::fs::File::create(path).await?;

        let result = async {
            let size = tokio::io::copy(&mut reader, &mut writer).await?;
            writer.flush().await?;

            Ok::<_, std::io::Error>(size)
        }
        .await;

        match result {
            Ok(size) => {
                info!(key, size, path = %path.display(), "object downloaded");

                Ok(size)
            }
            Err(err) => {
                drop(writer);

                if let Err(remove_err) = tokio::fs::remove_file(path).await {
                    warn!(
                        path = %path.display(),
                        error = %remove_err,
                        "failed to remove partially downloaded file"
                    );
                }

                Err(err.into())
            }
        }
    }

    /// Check whether an object exists.
    ///
    /// # Errors
    ///
    /// Only if an object's existence cannot be determined, an error is returned.
    pub async fn object_exists(&self, key: &str) -> Result<bool> {
        match self.get_object(key).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Delete an object.
    ///
    /// Deleting an object that does not exist succeeds.
    ///
    /// # Errors
    ///
    /// If the request fails, `Error::Transport` is returned.
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn delete_object(&self, key: &str) -> Result<()> {
        check_key(key)?;

        self.store.delete_object(&self.bucket, key).await
    }

    /// Delete several objects in a single request.
    ///
    /// An empty list of keys succeeds without any request.
    ///
    /// # Errors
    ///
    /// If the request fails, `Error::Transport` is returned.
    ///
    /// If the store reports that some keys could not be deleted,
    /// `Error::BulkDelete` is returned with those keys.
    #[instrument(skip(self, keys), fields(bucket = %self.bucket, count = keys.len()))]
    pub async fn delete_objects<K: AsRef<str>>(&self, keys: &[K]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let keys = keys
            .iter()
            .map(|key| check_key(key.as_ref()).map(|_| key.as_ref().to_owned()))
            .collect::<Result<Vec<_>>>()?;

        let failures = self.store.delete_objects(&self.bucket, &keys).await?;

        if failures.is_empty() {
            Ok(())
        } else {
            for failure in &failures {
                warn!(%failure, "failed to delete object");
            }

            Err(Error::BulkDelete { failures })
        }
    }
}

impl Display for ObjectStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (bucket: {})", self.store, self.bucket)
    }
}

impl std::fmt::Debug for ObjectStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreClient")
            .field("store", &self.store.to_string())
            .field("bucket", &self.bucket)
            .finish()
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        Err(Error::InvalidKey)
    } else {
        Ok(())
    }
}
