use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Synthesize the platform stack and apply it
    Deploy(crate::deploy::DeployCommand),

    /// Tear the platform stack down
    Destroy(crate::destroy::DestroyCommand),

    /// Show the stack status and recent events
    Status(crate::status::StatusCommand),

    /// Submit a transformation job to the batch queue
    Submit(crate::submit::SubmitCommand),

    /// Upload local files to the data lake
    Upload(crate::upload::UploadCommand),

    /// Sync workflow definitions to the orchestrator bucket
    Dags(crate::dags::DagsCommand),

    /// Manage the warehouse admin secret
    #[clap(subcommand)]
    Secret(SecretCommands),

    /// Inspect and fetch catalog datasets
    #[clap(subcommand)]
    Dataset(DatasetCommands),
}

#[derive(Subcommand)]
pub enum SecretCommands {
    /// Generate fresh admin credentials and apply them
    Rotate(crate::secret::RotateCommand),
}

#[derive(Subcommand)]
pub enum DatasetCommands {
    /// List datasets defined in the catalog
    List(crate::dataset::ListCommand),

    /// Download a dataset to a local file
    Pull(crate::dataset::PullCommand),
}
