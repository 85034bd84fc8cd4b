use aws_config::BehaviorVersion;
use aws_sdk_batch::types::{ContainerOverrides, KeyValuePair};
use eyre::{ContextCompat, WrapErr};
use platform::config::Config;

#[derive(clap::Args)]
pub struct SubmitCommand {
    /// Job name prefix; the submission timestamp is appended
    #[arg(long, default_value = "dbt-run")]
    name: String,

    /// Job definition to run
    #[arg(long, default_value = "dbt-transformation-job")]
    definition: String,

    /// Queue to submit to; defaults to the configured queue
    #[arg(long)]
    queue: Option<String>,

    /// Environment overrides, NAME=VALUE
    #[arg(long = "env-var", short = 'e')]
    env_vars: Vec<String>,

    /// Container command override, e.g. -- dbt run
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

/// Submit a job run to the batch queue
///
/// A rejected submission is logged and reported as a failed operation; it
/// never crashes the invoking process.
pub async fn run(env: &str, command: SubmitCommand) -> eyre::Result<()> {
    let config = Config::load(env).wrap_err("Failed to load settings")?;

    let queue = command
        .queue
        .clone()
        .unwrap_or_else(|| config.batch.queue_name.clone());

    let name = job_name(&command.name, &chrono::Local::now());
    let overrides = overrides(&command)?;

    let aws = aws_config::defaults(BehaviorVersion::v2025_01_17())
        .region(aws_config::Region::new(config.region.clone()))
        .load()
        .await;

    let client = aws_sdk_batch::Client::new(&aws);

    let result = client
        .submit_job()
        .job_name(&name)
        .job_queue(&queue)
        .job_definition(&command.definition)
        .container_overrides(overrides)
        .send()
        .await;

    match result {
        Ok(response) => {
            println!("Job submitted successfully");
            println!("Job ID: {}", response.job_id().wrap_err("No job id returned")?);
            println!("Job name: {}", response.job_name().unwrap_or(&name));
        }

        Err(e) => {
            log::error!("{e:?}");
            println!("Error submitting job: no job was started");
        }
    }

    Ok(())
}

/// Command and environment overrides for the container
fn overrides(command: &SubmitCommand) -> eyre::Result<ContainerOverrides> {
    let mut builder = ContainerOverrides::builder();

    if !command.command.is_empty() {
        builder = builder.set_command(Some(command.command.clone()));
    }

    for pair in &command.env_vars {
        let (name, value) = pair
            .split_once('=')
            .wrap_err_with(|| format!("Environment override is not NAME=VALUE: {pair:?}"))?;

        builder = builder.environment(KeyValuePair::builder().name(name).value(value).build());
    }

    Ok(builder.build())
}

/// Timestamped job name, unique enough for one queue
fn job_name(prefix: &str, now: &chrono::DateTime<chrono::Local>) -> String {
    format!("{prefix}-{}", now.format("%Y%m%d-%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn job_names_are_timestamped() {
        let moment = chrono::Local.with_ymd_and_hms(2025, 7, 3, 14, 9, 26).unwrap();
        assert_eq!(job_name("dbt-run", &moment), "dbt-run-20250703-140926");
    }

    #[test]
    fn job_names_match_the_requested_pattern() {
        let name = job_name("dbt-run", &chrono::Local::now());
        assert!(is_timestamped(&name), "unexpected job name {name:?}");
    }

    fn is_timestamped(name: &str) -> bool {
        let Some(rest) = name.strip_prefix("dbt-run-") else {
            return false;
        };

        let bytes: Vec<char> = rest.chars().collect();
        bytes.len() == 15
            && bytes[..8].iter().all(char::is_ascii_digit)
            && bytes[8] == '-'
            && bytes[9..].iter().all(char::is_ascii_digit)
    }

    #[test]
    fn malformed_environment_overrides_are_rejected() {
        let command = SubmitCommand {
            name: "dbt-run".into(),
            definition: "dbt-transformation-job".into(),
            queue: None,
            env_vars: vec!["NO_EQUALS_SIGN".into()],
            command: vec![],
        };

        assert!(overrides(&command).is_err());
    }

    #[test]
    fn overrides_carry_command_and_environment() {
        let command = SubmitCommand {
            name: "dbt-run".into(),
            definition: "dbt-transformation-job".into(),
            queue: None,
            env_vars: vec!["DBT_TARGET_PATH=dbt/target".into()],
            command: vec!["dbt".into(), "debug".into()],
        };

        let overrides = overrides(&command).expect("should build");
        assert_eq!(overrides.command(), ["dbt", "debug"]);

        let environment = overrides.environment();
        assert_eq!(environment.len(), 1);
        assert_eq!(environment[0].name(), Some("DBT_TARGET_PATH"));
        assert_eq!(environment[0].value(), Some("dbt/target"));
    }
}
