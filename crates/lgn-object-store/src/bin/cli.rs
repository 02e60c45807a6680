//! Command-line access to an object store.

use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use lgn_object_store::{AwsS3Url, BucketInfo, Config, ObjectStoreClient};
use tokio::io::AsyncWriteExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// The bucket to operate on, instead of the configured one.
    ///
    /// Either a bucket name or an `s3://bucket/root` URL, in which case keys
    /// are relative to the root.
    #[arg(long = "bucket", short = 'b', global = true)]
    bucket: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the buckets and their creation time.
    ListBuckets,
    /// Upload a file, or the standard input, as an object.
    Put {
        key: String,

        file_path: Option<PathBuf>,
    },
    /// Download an object to a file, or to the standard output.
    Get {
        key: String,

        file_path: Option<PathBuf>,
    },
    /// Delete one or several objects.
    Rm {
        #[arg(required = true)]
        keys: Vec<String>,
    },
}

fn format_bucket(bucket: &BucketInfo) -> String {
    match bucket.creation_date {
        Some(creation_date) => format!(
            "bucket={} creation time={}",
            bucket.name,
            creation_date
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S %A")
        ),
        None => format!("bucket={} creation time=unknown", bucket.name),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load().context("failed to load the configuration")?;

    match args.command.unwrap_or(Commands::ListBuckets) {
        Commands::ListBuckets => {
            let store = config
                .provider
                .instantiate()
                .await
                .context("failed to create object store")?;

            for bucket in store.list_buckets().await? {
                println!("{}", format_bucket(&bucket));
            }
        }
        Commands::Put { key, file_path } => {
            let (client, target) = connect(&config, args.bucket).await?;
            let key = target.key(&key);

            match file_path {
                Some(file_path) => client
                    .upload_file(&file_path, &key)
                    .await
                    .with_context(|| format!("failed to upload `{}`", file_path.display()))?,
                None => client
                    .put_object(&key, tokio::io::stdin())
                    .await
                    .context("failed to upload the standard input")?,
            }

            info!(%key, "object uploaded to {}", client);
        }
        Commands::Get { key, file_path } => {
            let (client, target) = connect(&config, args.bucket).await?;
            let key = target.key(&key);

            match file_path {
                Some(file_path) => {
                    client
                        .download_object(&key, &file_path)
                        .await
                        .with_context(|| format!("failed to download `{}`", key))?;
                }
                None => {
                    let mut reader = client.get_object(&key).await?;
                    let mut stdout = tokio::io::stdout();

                    tokio::io::copy(&mut reader, &mut stdout)
                        .await
                        .context("failed to copy object")?;
                    stdout.flush().await?;
                }
            }
        }
        Commands::Rm { keys } => {
            let (client, target) = connect(&config, args.bucket).await?;
            let keys: Vec<_> = keys.iter().map(|key| target.key(key)).collect();

            if let [key] = keys.as_slice() {
                client.delete_object(key).await?;
            } else {
                client.delete_objects(&keys).await?;
            }

            info!(count = keys.len(), "object(s) deleted from {}", client);
        }
    }

    Ok(())
}

fn parse_target(bucket: String) -> anyhow::Result<AwsS3Url> {
    if bucket.starts_with("s3://") {
        Ok(bucket.parse()?)
    } else {
        Ok(AwsS3Url {
            bucket_name: bucket,
            root: String::new(),
        })
    }
}

async fn connect(
    config: &Config,
    bucket: Option<String>,
) -> anyhow::Result<(ObjectStoreClient, AwsS3Url)> {
    let target = parse_target(config.bucket_or(bucket)?)?;
    let store = config
        .provider
        .instantiate()
        .await
        .context("failed to create object store")?;

    Ok((
        ObjectStoreClient::new(store, target.bucket_name.clone())?,
        target,
    ))
}
