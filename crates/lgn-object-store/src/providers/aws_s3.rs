use std::{
    fmt::Display,
    pin::Pin,
    str::FromStr,
    task::{Context, Poll},
};

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_s3::{
    config::Region,
    error::DisplayErrorContext,
    primitives::ByteStream,
    types::{ChecksumAlgorithm, Delete, ObjectIdentifier},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use pin_project::pin_project;
use tokio_stream::Stream;
use tokio_util::io::StreamReader;
use tracing::{debug, info, instrument};

use super::{BoxedAsyncRead, BucketInfo, ObjectStore, PutObjectRequest};
use crate::{AwsS3ProviderConfig, Error, KeyFailure, Result};

/// An object store backed by AWS S3, or any S3-compatible service.
#[derive(Debug, Clone)]
pub struct AwsS3ObjectStore {
    client: aws_sdk_s3::Client,
    region: Option<String>,
}

impl AwsS3ObjectStore {
    /// Creates a new AWS S3 store.
    ///
    /// Region and credentials are resolved through the default AWS chain
    /// (environment, shared configuration files, web identity, container and
    /// instance metadata) unless overridden by the configuration.
    ///
    /// # Errors
    ///
    /// If no region can be resolved or no credentials can be obtained,
    /// `Error::Configuration` is returned.
    #[instrument(skip(config))]
    pub async fn new(config: &AwsS3ProviderConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }

        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }

        if let Some(endpoint_url) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }

        let sdk_config = loader.load().await;

        let region = sdk_config
            .region()
            .map(ToString::to_string)
            .ok_or_else(|| Error::Configuration("no AWS region could be resolved".to_owned()))?;

        let credentials_provider = sdk_config.credentials_provider().ok_or_else(|| {
            Error::Configuration("no AWS credentials provider is configured".to_owned())
        })?;

        credentials_provider
            .provide_credentials()
            .await
            .map_err(|err| {
                Error::Configuration(format!(
                    "failed to resolve AWS credentials: {}",
                    DisplayErrorContext(&err)
                ))
            })?;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        info!(
            region = %region,
            endpoint_url = config.endpoint_url.as_deref().unwrap_or("default"),
            "AWS S3 object store initialized"
        );

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            region: Some(region),
        })
    }

    /// Wraps an already configured client.
    pub fn from_client(client: aws_sdk_s3::Client) -> Self {
        Self {
            region: client.config().region().map(ToString::to_string),
            client,
        }
    }
}

impl Display for AwsS3ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.region {
            Some(region) => write!(f, "AWS S3 (region: {})", region),
            None => write!(f, "AWS S3"),
        }
    }
}

#[pin_project]
#[derive(Debug)]
struct ByteStreamReader(#[pin] ByteStream);

impl Stream for ByteStreamReader {
    type Item = std::result::Result<Bytes, std::io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project()
            .0
            .poll_next(cx)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e))
    }
}

fn transport_error<E>(err: E, context: impl Display + Send + Sync + 'static) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    Error::Transport(anyhow::Error::new(err).context(context))
}

fn to_chrono(date: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(date.secs(), date.subsec_nanos())
}

#[async_trait]
impl ObjectStore for AwsS3ObjectStore {
    #[instrument(skip(self))]
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|err| transport_error(err, "failed to list buckets from AWS S3"))?;

        Ok(output
            .buckets()
            .iter()
            .map(|bucket| BucketInfo {
                name: bucket.name().unwrap_or_default().to_owned(),
                creation_date: bucket.creation_date().and_then(to_chrono),
            })
            .collect())
    }

    #[instrument(skip(self, request), fields(key = %request.key, size = request.body.len()))]
    async fn put_object(&self, bucket: &str, request: PutObjectRequest) -> Result<()> {
        let content_length = i64::try_from(request.body.len())
            .map_err(|_err| Error::Transport(anyhow::anyhow!("object is too large")))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(&request.key)
            .content_length(content_length)
            .set_content_type(request.content_type)
            .checksum_algorithm(ChecksumAlgorithm::Sha256)
            .checksum_sha256(request.checksum.to_base64())
            .body(ByteStream::from(request.body))
            .send()
            .await
            .map_err(|err| {
                transport_error(
                    err,
                    format!("failed to put object `{}` to AWS S3", request.key),
                )
            })?;

        debug!("object uploaded");

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_object(&self, bucket: &str, key: &str) -> Result<BoxedAsyncRead> {
        let object = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(object) => object,
            Err(err) => {
                let not_found = err
                    .as_service_error()
                    .map_or(false, aws_sdk_s3::operation::get_object::GetObjectError::is_no_such_key)
                    || err.raw_response().map(|r| r.status().as_u16()) == Some(404);

                return Err(if not_found {
                    Error::not_found(bucket, key)
                } else {
                    transport_error(err, format!("failed to get object `{}` from AWS S3", key))
                });
            }
        };

        let stream = StreamReader::new(ByteStreamReader(object.body));

        Ok(Box::pin(stream))
    }

    #[instrument(skip(self))]
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                transport_error(err, format!("failed to delete object `{}` from AWS S3", key))
            })?;

        Ok(())
    }

    #[instrument(skip(self, keys), fields(count = keys.len()))]
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<Vec<KeyFailure>> {
        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|err| transport_error(err, "invalid object key"))?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(false)
            .build()
            .map_err(|err| transport_error(err, "invalid delete request"))?;

        let output = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|err| {
                transport_error(
                    err,
                    format!("failed to delete {} object(s) from AWS S3", keys.len()),
                )
            })?;

        debug!(deleted = output.deleted().len(), "bulk delete completed");

        Ok(output
            .errors()
            .iter()
            .map(|err| KeyFailure {
                key: err.key().unwrap_or_default().to_owned(),
                code: err.code().map(ToOwned::to_owned),
                message: err.message().map(ToOwned::to_owned),
            })
            .collect())
    }
}

/// An S3 location: a bucket and an optional root prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AwsS3Url {
    pub bucket_name: String,
    pub root: String,
}

impl AwsS3Url {
    /// The full key of an object relative to the root.
    pub fn key(&self, name: &str) -> String {
        if self.root.is_empty() {
            name.to_owned()
        } else {
            format!("{}/{}", self.root.trim_end_matches('/'), name)
        }
    }
}

impl Display for AwsS3Url {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.root.is_empty() {
            write!(f, "s3://{}", self.bucket_name)
        } else {
            write!(f, "s3://{}/{}", self.bucket_name, self.root)
        }
    }
}

impl FromStr for AwsS3Url {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s.strip_prefix("s3://").ok_or_else(|| {
            Error::Configuration(format!(
                "invalid S3 URL: should start with `s3://` in `{}`",
                s
            ))
        })?;

        let mut splitter = rest.splitn(2, '/');

        Ok(Self {
            bucket_name: splitter
                .next()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    Error::Configuration(format!("invalid S3 URL: missing bucket name in `{}`", s))
                })?
                .into(),
            root: splitter.next().unwrap_or_default().to_string(),
        })
    }
}
