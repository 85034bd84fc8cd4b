mod commands;
mod credentials;
mod dags;
mod dataset;
mod deploy;
mod destroy;
mod error;
mod logger;
mod secret;
mod status;
mod submit;
mod upload;

use crate::commands::Commands;
use crate::error::Error;
use clap::Parser;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Settings environment, e.g. "dev" or "prod"
    #[arg(long, global = true, env = "DPSTACK_ENV", default_value = "dev")]
    env: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init();
    let cli = Cli::parse();

    // Match all commands here, in one place
    Ok(match cli.command {
        Commands::Deploy(cmd) => deploy::run(&cli.env, cmd).await?,
        Commands::Destroy(cmd) => destroy::run(&cli.env, cmd).await?,
        Commands::Status(cmd) => status::run(&cli.env, cmd).await?,
        Commands::Submit(cmd) => submit::run(&cli.env, cmd).await?,
        Commands::Upload(cmd) => upload::run(&cli.env, cmd).await?,
        Commands::Dags(cmd) => dags::run(&cli.env, cmd).await?,

        Commands::Secret(cmd) => match cmd {
            commands::SecretCommands::Rotate(cmd) => secret::rotate(&cli.env, cmd).await?,
        },

        Commands::Dataset(cmd) => match cmd {
            commands::DatasetCommands::List(cmd) => dataset::list(cmd)?,
            commands::DatasetCommands::Pull(cmd) => dataset::pull(&cli.env, cmd).await?,
        },
    })
}
