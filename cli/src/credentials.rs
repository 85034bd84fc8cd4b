use platform::config::Config;
use platform::credentials::{AdminCredentials, PasswordPolicy};
use platform::stack::secret::AdminSecret;

/// Resolve the warehouse admin credentials without rotating anything
///
/// Order: the documented placeholder from settings, then the already
/// deployed secret, then fresh generation for a first deploy. A redeploy
/// therefore carries the stored password forward; rotation is its own
/// command.
pub async fn resolve(config: &Config) -> eyre::Result<AdminCredentials> {
    let username = &config.redshift.admin_username;

    if let Some(placeholder) = &config.redshift.admin_password {
        log::warn!("Using the plain-text admin password from settings");
        return Ok(AdminCredentials::new(username, placeholder));
    }

    if let Some(password) = AdminSecret::new(config).fetch_password().await? {
        return Ok(AdminCredentials::new(username, &password));
    }

    AdminCredentials::generate(username, &PasswordPolicy::default())
}

/// Fresh credentials, replacing whatever is deployed
pub fn rotate(config: &Config) -> eyre::Result<AdminCredentials> {
    AdminCredentials::generate(&config.redshift.admin_username, &PasswordPolicy::default())
}
