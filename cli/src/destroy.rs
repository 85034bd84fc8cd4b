use crate::credentials;
use eyre::WrapErr;
use platform::config::Config;
use platform::stack::{destroy, PlatformStack};

#[derive(clap::Args)]
pub struct DestroyCommand {
    /// Confirm the teardown
    #[arg(long)]
    yes: bool,
}

/// Tear the platform down according to each resource's removal policy
pub async fn run(env: &str, command: DestroyCommand) -> eyre::Result<()> {
    let config = Config::load(env).wrap_err("Failed to load settings")?;

    if !command.yes {
        eyre::bail!(
            "Destroying \"{}\" deletes every resource with a DESTROY policy, \
             including bucket contents. Re-run with --yes to confirm.",
            config.name
        );
    }

    let credentials = credentials::resolve(&config).await?;
    let stack = PlatformStack::synth(&config, &credentials)?;

    println!("Destroying \"{}\"...", stack.name);
    destroy::destroy(&stack).await?;
    println!("Teardown requested, follow it with \"dpstack status\"");

    Ok(())
}
