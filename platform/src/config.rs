use crate::RemovalPolicy;
use eyre::WrapErr;
use serde::Deserialize;
use std::path::Path;

/// VPC sizing: how many AZs to spread over and how many NAT gateways to pay for
#[derive(Clone, Debug, Deserialize)]
pub struct VpcConfig {
    pub max_azs: u32,
    pub nat_gateways: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StorageConfig {
    pub name: String,
    pub removal_policy: RemovalPolicy,
}

/// Metadata database backing the Airflow environment
#[derive(Clone, Debug, Deserialize)]
pub struct RdsConfig {
    pub instance_type: String,
    pub backup_retention_days: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MwaaConfig {
    pub name: String,
    pub bucket_name: String,
    pub removal_policy: RemovalPolicy,
    pub rds: RdsConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RedshiftConfig {
    pub namespace_name: String,
    pub workgroup_name: String,
    pub database_name: String,
    pub admin_username: String,

    /// Plain-text placeholder for throwaway environments only. When unset
    /// a password is generated and kept in Secrets Manager.
    pub admin_password: Option<String>,

    pub removal_policy: RemovalPolicy,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BatchConfig {
    pub name: String,
    pub queue_name: String,
    pub max_vcpus: u32,
    pub min_vcpus: u32,
    pub desired_vcpus: u32,
    pub instance_types: Vec<String>,
    pub removal_policy: RemovalPolicy,
}

/// One validated settings record per environment
///
/// Nothing else in the platform reads the process environment; the config is
/// loaded once and threaded through every component.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub region: String,
    pub account: Option<String>,
    pub name: String,
    pub vpc: VpcConfig,
    pub storage: StorageConfig,
    pub mwaa: MwaaConfig,
    pub redshift: RedshiftConfig,
    pub batch: BatchConfig,
}

/// The VPC is carved into /22 subnets, two tiers per AZ
const SUBNETS_PER_VPC: u32 = 64;

impl Config {
    /// Read and validate the settings file for the given environment
    ///
    /// Settings live in settings/<env>.toml. The account falls back to the
    /// AWS_ACCOUNT_ID environment variable when not present in the file.
    pub fn load(env: &str) -> eyre::Result<Self> {
        let path = Path::new("settings").join(format!("{env}.toml"));

        let raw = std::fs::read_to_string(&path)
            .wrap_err_with(|| format!("Failed to read settings file {path:?}"))?;

        Self::from_toml(&raw)
    }

    /// Parse and validate a settings document
    pub fn from_toml(raw: &str) -> eyre::Result<Self> {
        let mut config: Config = toml::from_str(raw).wrap_err("Invalid settings file")?;

        if config.account.is_none() {
            config.account = std::env::var("AWS_ACCOUNT_ID").ok();
        }

        config.validate()?;
        Ok(config)
    }

    /// The AWS account the platform deploys into
    pub fn account(&self) -> eyre::Result<&str> {
        self.account
            .as_deref()
            .ok_or_else(|| eyre::eyre!("No account configured"))
    }

    /// Reject bad values before any resource group is built
    fn validate(&self) -> eyre::Result<()> {
        let name = regex::Regex::new(r"^[a-z][a-z0-9-]{1,61}[a-z0-9]$")?;
        let region = regex::Regex::new(r"^[a-z]{2}(-[a-z]+)+-\d$")?;
        let account = regex::Regex::new(r"^\d{12}$")?;
        let identifier = regex::Regex::new(r"^[a-z][a-z0-9_]*$")?;

        if !region.is_match(&self.region) {
            eyre::bail!("region is not a valid AWS region: {:?}", self.region);
        }

        match &self.account {
            Some(id) if !account.is_match(id) => {
                eyre::bail!("account must be a 12-digit AWS account id: {id:?}")
            }
            None => {
                eyre::bail!("account is not set: add it to settings or export AWS_ACCOUNT_ID")
            }
            _ => {}
        }

        for (field, value) in [
            ("name", &self.name),
            ("storage.name", &self.storage.name),
            ("mwaa.name", &self.mwaa.name),
            ("mwaa.bucket_name", &self.mwaa.bucket_name),
            ("redshift.namespace_name", &self.redshift.namespace_name),
            ("redshift.workgroup_name", &self.redshift.workgroup_name),
            ("batch.name", &self.batch.name),
            ("batch.queue_name", &self.batch.queue_name),
        ] {
            if !name.is_match(value) {
                eyre::bail!("{field} is not a valid resource name: {value:?}");
            }
        }

        if !identifier.is_match(&self.redshift.database_name) {
            eyre::bail!(
                "redshift.database_name is not a valid database identifier: {:?}",
                self.redshift.database_name
            );
        }

        if !identifier.is_match(&self.redshift.admin_username) {
            eyre::bail!(
                "redshift.admin_username is not a valid database identifier: {:?}",
                self.redshift.admin_username
            );
        }

        // The orchestrator spreads over two private subnets
        if self.vpc.max_azs < 2 {
            eyre::bail!("vpc.max_azs must be at least 2");
        }

        // Two /22 tiers per AZ must fit into the /16 address range
        if self.vpc.max_azs * 2 > SUBNETS_PER_VPC {
            eyre::bail!(
                "vpc.max_azs of {} does not fit the address range",
                self.vpc.max_azs
            );
        }

        if self.vpc.nat_gateways == 0 {
            eyre::bail!("vpc.nat_gateways must be at least 1, private subnets need egress");
        }

        if self.vpc.nat_gateways > self.vpc.max_azs {
            eyre::bail!(
                "vpc.nat_gateways of {} exceeds the {} public subnets available",
                self.vpc.nat_gateways,
                self.vpc.max_azs
            );
        }

        if self.batch.max_vcpus == 0 {
            eyre::bail!("batch.max_vcpus must be at least 1");
        }

        // min_vcpus of 0 is valid and expected: the fleet scales to zero
        if self.batch.min_vcpus > self.batch.desired_vcpus
            || self.batch.desired_vcpus > self.batch.max_vcpus
        {
            eyre::bail!(
                "batch vCPU bounds must satisfy min <= desired <= max, got {}/{}/{}",
                self.batch.min_vcpus,
                self.batch.desired_vcpus,
                self.batch.max_vcpus
            );
        }

        if self.batch.instance_types.is_empty() {
            eyre::bail!("batch.instance_types must not be empty");
        }

        if self.mwaa.rds.instance_type.is_empty() {
            eyre::bail!("mwaa.rds.instance_type must not be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const DEV: &str = r#"
        region = "eu-west-1"
        account = "000000000000"
        name = "dpstack"

        [vpc]
        max_azs = 3
        nat_gateways = 1

        [storage]
        name = "dpstack-dlake"
        removal_policy = "DESTROY"

        [mwaa]
        name = "dpstack-airflow"
        bucket_name = "dpstack-airflow"
        removal_policy = "DESTROY"

        [mwaa.rds]
        instance_type = "db.t3.micro"
        backup_retention_days = 7

        [redshift]
        namespace_name = "dpstack"
        workgroup_name = "dpstack-workgroup"
        database_name = "dpstack"
        admin_username = "dpstack"
        admin_password = "dpstack"
        removal_policy = "DESTROY"

        [batch]
        name = "dpstack-batch"
        queue_name = "dpstack-batch-queue"
        max_vcpus = 4
        min_vcpus = 0
        desired_vcpus = 0
        instance_types = ["optimal"]
        removal_policy = "DESTROY"
    "#;

    pub(crate) fn dev() -> Config {
        Config::from_toml(DEV).expect("dev settings should validate")
    }

    #[test]
    fn sample_settings_validate() {
        let config = dev();
        assert_eq!(config.name, "dpstack");
        assert_eq!(config.batch.max_vcpus, 4);
        assert_eq!(config.storage.removal_policy, RemovalPolicy::Destroy);
    }

    #[test]
    fn missing_admin_username_fails_before_synthesis() {
        let raw = DEV.replace("admin_username = \"dpstack\"", "");
        let err = Config::from_toml(&raw).expect_err("should reject");
        assert!(err.to_string().contains("Invalid settings file"), "{err}");
        assert!(format!("{err:?}").contains("admin_username"), "{err:?}");
    }

    #[test]
    fn mistyped_field_fails() {
        let raw = DEV.replace("max_vcpus = 4", "max_vcpus = \"four\"");
        assert!(Config::from_toml(&raw).is_err());
    }

    #[test]
    fn vcpu_bounds_are_ordered() {
        let raw = DEV.replace("min_vcpus = 0", "min_vcpus = 8");
        let err = Config::from_toml(&raw).expect_err("should reject");
        assert!(format!("{err:?}").contains("min <= desired <= max"));
    }

    #[test]
    fn zero_minimum_capacity_is_valid() {
        let config = dev();
        assert_eq!(config.batch.min_vcpus, 0);
    }

    #[test]
    fn oversized_az_count_is_rejected_at_validation_time() {
        let raw = DEV.replace("max_azs = 3", "max_azs = 33");
        let err = Config::from_toml(&raw).expect_err("should reject");
        assert!(format!("{err:?}").contains("address range"));
    }

    #[test]
    fn nat_gateways_are_required_for_egress() {
        let raw = DEV.replace("nat_gateways = 1", "nat_gateways = 0");
        assert!(Config::from_toml(&raw).is_err());
    }

    #[test]
    fn unknown_removal_policy_is_rejected() {
        let raw = DEV.replace("removal_policy = \"DESTROY\"", "removal_policy = \"KEEP\"");
        assert!(Config::from_toml(&raw).is_err());
    }

    #[test]
    fn bad_bucket_name_is_rejected() {
        let raw = DEV.replace("name = \"dpstack-dlake\"", "name = \"Dpstack_DLake\"");
        let err = Config::from_toml(&raw).expect_err("should reject");
        assert!(format!("{err:?}").contains("storage.name"));
    }
}
