use crate::upload::{client, put_file};
use eyre::WrapErr;
use platform::config::Config;
use std::path::PathBuf;
use walkdir::WalkDir;

#[derive(clap::Args)]
pub struct DagsCommand {
    /// Directory with workflow definitions
    #[arg(long, default_value = "dags")]
    dir: PathBuf,
}

/// Sync workflow definitions into the orchestrator's bucket
///
/// The environment picks DAGs up from the "dags/" key prefix. Non-Python
/// entries are skipped, and one failed upload does not abort the rest.
pub async fn run(env: &str, command: DagsCommand) -> eyre::Result<()> {
    let config = Config::load(env)?;
    let bucket = &config.mwaa.bucket_name;
    let client = client(&config.region).await;

    for entry in WalkDir::new(&command.dir).min_depth(1).max_depth(1) {
        let entry = entry.wrap_err("Failed to read the definitions directory")?;
        let path = entry.path();

        let is_python = path.extension().map(|e| e == "py").unwrap_or(false);

        if entry.file_type().is_dir() || !is_python {
            println!("Skipping {path:?} (not a workflow definition)");
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();

        match put_file(&client, bucket, &format!("dags/{name}"), path).await {
            Ok(()) => println!("Uploaded {name} to s3://{bucket}/dags/{name}"),
            Err(e) => {
                log::error!("{e:?}");
                println!("Error uploading {name}: {e:#}");
            }
        }
    }

    Ok(())
}
