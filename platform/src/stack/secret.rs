use crate::config::Config;
use aws_config::BehaviorVersion;
use eyre::WrapErr;

/// Deployed warehouse admin secret
///
/// Read on redeploys so the stored password is carried forward instead of
/// rotated. Rotation is a distinct, explicit operation: synthesize with
/// fresh credentials and apply, which updates the secret and the warehouse
/// namespace together.
pub struct AdminSecret {
    name: String,
    region: String,
}

impl AdminSecret {
    pub fn new(config: &Config) -> Self {
        AdminSecret {
            name: format!("{}-admin-secret", config.redshift.namespace_name),
            region: config.region.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The stored admin password, None when the secret does not exist yet
    pub async fn fetch_password(&self) -> eyre::Result<Option<String>> {
        let config = aws_config::defaults(BehaviorVersion::v2025_01_17())
            .region(aws_config::Region::new(self.region.clone()))
            .load()
            .await;

        let client = aws_sdk_secretsmanager::Client::new(&config);

        let result = client
            .get_secret_value()
            .secret_id(&self.name)
            .send()
            .await;

        let value = match result {
            Ok(value) => value,
            Err(e) => {
                if let aws_sdk_secretsmanager::error::SdkError::ServiceError(err) = &e {
                    if err.err().meta().code() == Some("ResourceNotFoundException") {
                        return Ok(None);
                    }
                }

                return Err(eyre::eyre!("Failed to read the admin secret: {e:?}"));
            }
        };

        let body: serde_json::Value = value
            .secret_string()
            .map(serde_json::from_str)
            .transpose()
            .wrap_err("The admin secret is not valid JSON")?
            .unwrap_or_default();

        Ok(body["password"].as_str().map(str::to_string))
    }
}
