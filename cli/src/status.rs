use eyre::WrapErr;
use platform::config::Config;
use platform::stack::status;

#[derive(clap::Args)]
pub struct StatusCommand {
    /// Number of recent events to show
    #[arg(long, default_value_t = 10)]
    events: usize,
}

/// Show the stack status and its most recent events
pub async fn run(env: &str, command: StatusCommand) -> eyre::Result<()> {
    let config = Config::load(env).wrap_err("Failed to load settings")?;

    let Some(current) = status::current(&config.name, &config.region).await? else {
        println!("Stack \"{}\" does not exist", config.name);
        return Ok(());
    };

    println!("{}: {current}", config.name);

    for event in status::events(&config.name, &config.region, command.events).await? {
        println!(
            "{}  {:<40} {:<36} {:<28} {}",
            event.timestamp,
            event.logical_id,
            event.resource_type,
            event.status,
            event.reason.unwrap_or_default()
        );
    }

    Ok(())
}
