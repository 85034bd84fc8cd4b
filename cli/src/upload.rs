use aws_config::BehaviorVersion;
use eyre::ContextCompat;
use platform::config::Config;
use std::path::{Path, PathBuf};

#[derive(clap::Args)]
pub struct UploadCommand {
    /// Files to upload
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Key prefix inside the bucket
    #[arg(long, default_value = "raw")]
    prefix: String,

    /// Target bucket; defaults to the data lake bucket
    #[arg(long)]
    bucket: Option<String>,
}

/// Copy local files into the data lake
///
/// Every file is reported on its own; one failed upload does not abort the
/// rest of the batch.
pub async fn run(env: &str, command: UploadCommand) -> eyre::Result<()> {
    let config = Config::load(env)?;
    let bucket = command.bucket.clone().unwrap_or_else(|| config.storage.name.clone());
    let client = client(&config.region).await;

    let mut uploaded = 0;

    for file in &command.files {
        let key = match object_key(&command.prefix, file) {
            Ok(key) => key,
            Err(e) => {
                println!("Error uploading {file:?}: {e:#}");
                continue;
            }
        };

        match put_file(&client, &bucket, &key, file).await {
            Ok(()) => {
                uploaded += 1;
                println!("Uploaded {file:?} to s3://{bucket}/{key}");
            }
            Err(e) => {
                log::error!("{e:?}");
                println!("Error uploading {file:?}: {e:#}");
            }
        }
    }

    println!("Uploaded {uploaded} of {} files", command.files.len());
    Ok(())
}

pub(crate) async fn client(region: &str) -> aws_sdk_s3::Client {
    let config = aws_config::defaults(BehaviorVersion::v2025_01_17())
        .region(aws_config::Region::new(region.to_string()))
        .load()
        .await;

    aws_sdk_s3::Client::new(&config)
}

pub(crate) async fn put_file(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    path: &Path,
) -> eyre::Result<()> {
    let body = aws_sdk_s3::primitives::ByteStream::from_path(path)
        .await
        .map_err(|e| eyre::eyre!("Failed to read {path:?}: {e}"))?;

    client
        .put_object()
        .bucket(bucket)
        .key(key)
        .body(body)
        .send()
        .await
        .map_err(|e| eyre::eyre!("Upload failed: {e}"))?;

    Ok(())
}

/// Bucket key under the prefix, named after the file
fn object_key(prefix: &str, path: &Path) -> eyre::Result<String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .wrap_err_with(|| format!("{path:?} has no usable file name"))?;

    Ok(format!("{}/{name}", prefix.trim_end_matches('/')))
}
