use crate::upload::client;
use eyre::{ContextCompat, WrapErr};
use platform::config::Config;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Supported dataset encodings
///
/// Anything else is a configuration error, rejected before any data access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Csv,
    Json,
    Parquet,
}

impl FromStr for Format {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            "parquet" => Ok(Format::Parquet),
            other => Err(eyre::eyre!("Unsupported format: {other}")),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Format::Csv => "csv",
            Format::Json => "json",
            Format::Parquet => "parquet",
        };

        write!(f, "{name}")
    }
}

/// A tabular dataset at a bucket-relative path
#[derive(Clone, Debug, Deserialize)]
pub struct Dataset {
    pub path: String,
    pub format: Format,
}

/// Named datasets, loaded from the catalog file
#[derive(Debug, Deserialize)]
pub struct Catalog {
    #[serde(flatten)]
    datasets: BTreeMap<String, Dataset>,
}

impl Catalog {
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read catalog {path:?}"))?;

        toml::from_str(&raw).wrap_err("Invalid catalog file")
    }

    pub fn get(&self, name: &str) -> eyre::Result<&Dataset> {
        self.datasets
            .get(name)
            .wrap_err_with(|| format!("No dataset {name:?} in the catalog"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Dataset)> {
        self.datasets.iter()
    }
}

#[derive(clap::Args)]
pub struct ListCommand {
    /// Catalog file
    #[arg(long, default_value = "catalog.toml")]
    catalog: PathBuf,
}

/// Print the datasets the catalog defines
pub fn list(command: ListCommand) -> eyre::Result<()> {
    let catalog = Catalog::load(&command.catalog)?;

    for (name, dataset) in catalog.iter() {
        println!("{name}  {}  {}", dataset.format, dataset.path);
    }

    Ok(())
}

#[derive(clap::Args)]
pub struct PullCommand {
    /// Dataset name from the catalog
    name: String,

    /// Catalog file
    #[arg(long, default_value = "catalog.toml")]
    catalog: PathBuf,

    /// Local file to write; defaults to the dataset's file name
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Download one dataset from the data lake
pub async fn pull(env: &str, command: PullCommand) -> eyre::Result<()> {
    let config = Config::load(env)?;
    let catalog = Catalog::load(&command.catalog)?;
    let dataset = catalog.get(&command.name)?;

    let output = match &command.output {
        Some(path) => path.clone(),
        None => PathBuf::from(
            Path::new(&dataset.path)
                .file_name()
                .wrap_err_with(|| format!("Dataset path {:?} has no file name", dataset.path))?,
        ),
    };

    let client = client(&config.region).await;

    let object = client
        .get_object()
        .bucket(&config.storage.name)
        .key(&dataset.path)
        .send()
        .await
        .map_err(|e| eyre::eyre!("Failed to fetch {}: {e}", dataset.path))?;

    let bytes = object
        .body
        .collect()
        .await
        .wrap_err("Failed to read the object body")?
        .into_bytes();

    std::fs::write(&output, &bytes).wrap_err_with(|| format!("Failed to write {output:?}"))?;
    println!("Pulled {} ({} bytes) to {output:?}", command.name, bytes.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_formats_are_a_hard_error() {
        let err = "avro".parse::<Format>().expect_err("should reject");
        assert!(err.to_string().contains("Unsupported format"), "{err}");
    }

    #[test]
    fn supported_formats_parse() {
        assert_eq!("csv".parse::<Format>().expect("csv"), Format::Csv);
        assert_eq!("json".parse::<Format>().expect("json"), Format::Json);
        assert_eq!("parquet".parse::<Format>().expect("parquet"), Format::Parquet);
    }

    #[test]
    fn catalog_entries_carry_path_and_format() {
        let catalog: Catalog = toml::from_str(
            r#"
            [spacex_raw]
            path = "raw/spacex.json"
            format = "json"

            [spacex_flat]
            path = "staging/spacex.parquet"
            format = "parquet"
            "#,
        )
        .expect("should parse");

        let dataset = catalog.get("spacex_raw").expect("dataset");
        assert_eq!(dataset.path, "raw/spacex.json");
        assert_eq!(dataset.format, Format::Json);
        assert_eq!(catalog.iter().count(), 2);
    }

    #[test]
    fn catalog_rejects_unsupported_encodings() {
        let result: Result<Catalog, _> = toml::from_str(
            r#"
            [spacex_raw]
            path = "raw/spacex.avro"
            format = "avro"
            "#,
        );

        assert!(result.is_err());
    }

    #[test]
    fn unknown_datasets_are_reported() {
        let catalog: Catalog = toml::from_str("").expect("empty catalog");
        assert!(catalog.get("missing").is_err());
    }
}
