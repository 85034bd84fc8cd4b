use crate::credentials;
use eyre::WrapErr;
use platform::config::Config;
use platform::stack::{deploy, PlatformStack};

#[derive(clap::Args)]
pub struct RotateCommand {
    /// Confirm the rotation
    #[arg(long)]
    yes: bool,
}

/// Rotate the warehouse admin credentials
///
/// The only operation that regenerates a deployed password. Synthesizes the
/// stack with fresh credentials and applies it, so the secret and the
/// namespace admin password change together.
pub async fn rotate(env: &str, command: RotateCommand) -> eyre::Result<()> {
    let config = Config::load(env).wrap_err("Failed to load settings")?;

    if config.redshift.admin_password.is_some() {
        eyre::bail!(
            "Settings pin admin_password to a plain-text placeholder; \
             remove it before rotating"
        );
    }

    if !command.yes {
        eyre::bail!(
            "Rotating invalidates the current warehouse password for every \
             consumer. Re-run with --yes to confirm."
        );
    }

    let fresh = credentials::rotate(&config)?;
    let stack = PlatformStack::synth(&config, &fresh)?;

    println!("Rotating the admin credentials of \"{}\"...", stack.name);
    deploy::provision(&stack).await?;
    println!("Rotation requested, follow it with \"dpstack status\"");

    Ok(())
}
