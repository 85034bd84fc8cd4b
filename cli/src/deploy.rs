use crate::credentials;
use eyre::WrapErr;
use platform::config::Config;
use platform::stack::{deploy, status, PlatformStack};
use std::time::Duration;

#[derive(clap::Args)]
pub struct DeployCommand {
    /// Print the rendered template instead of applying it
    #[arg(long)]
    synth_only: bool,

    /// Return right after the apply call instead of waiting for completion
    #[arg(long)]
    no_wait: bool,
}

/// Synthesize the whole platform and hand the plan to CloudFormation
pub async fn run(env: &str, command: DeployCommand) -> eyre::Result<()> {
    let config = Config::load(env).wrap_err("Failed to load settings")?;
    let credentials = credentials::resolve(&config).await?;
    let stack = PlatformStack::synth(&config, &credentials)?;

    if command.synth_only {
        println!("{}", stack.template_body()?);
        return Ok(());
    }

    println!("Deploying \"{}\"...", stack.name);
    deploy::provision(&stack).await?;

    if !command.no_wait {
        wait(&stack).await?;
    }

    println!("Done!");
    Ok(())
}

/// Poll the stack until CloudFormation settles
async fn wait(stack: &PlatformStack) -> eyre::Result<()> {
    let spinner = indicatif::ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(120));

    let outcome = loop {
        let status = status::current(&stack.name, &stack.region)
            .await?
            .unwrap_or_else(|| "DELETED".to_string());

        spinner.set_message(status.clone());

        if status.ends_with("_COMPLETE") || status.ends_with("_FAILED") {
            break status;
        }

        tokio::time::sleep(Duration::from_secs(5)).await;
    };

    spinner.finish_and_clear();

    match outcome.as_str() {
        "CREATE_COMPLETE" | "UPDATE_COMPLETE" => Ok(()),
        other => Err(eyre::eyre!(
            "Stack settled in {other}; check \"dpstack status\" for the failing resource"
        )),
    }
}
