use crate::config::Config;
use crate::credentials::AdminCredentials;
use crate::template::airflow::Airflow;
use crate::template::compute::BatchCompute;
use crate::template::jobs::ComputeJobs;
use crate::template::network::Network;
use crate::template::registry::EcrRepository;
use crate::template::storage::Storage;
use crate::template::warehouse::Warehouse;
use crate::template::Template;
use crate::RemovalPolicy;
use eyre::WrapErr;

/// The assembled deployment plan for the whole platform
///
/// The single place where cross-component identifiers are resolved:
/// components publish typed handles and the assembler threads them into
/// downstream constructors. If any component fails, synthesis aborts with
/// no partial plan.
pub struct PlatformStack {
    pub name: String,
    pub region: String,
    pub queue_name: String,
    pub lake_bucket: String,
    pub dags_bucket: String,
    template: Template,
    order: Vec<String>,
}

impl PlatformStack {
    /// Compose every component in dependency order and validate the graph
    pub fn synth(config: &Config, credentials: &AdminCredentials) -> eyre::Result<Self> {
        let account = config.account()?;
        let mut template = Template::new();

        let (dbt_image, resources) =
            EcrRepository::new("DbtImage", "dbt-image", RemovalPolicy::Destroy).into_parts();
        template.add_resources(resources).wrap_err("Failed to compose the dbt registry")?;

        let (ingestion_image, resources) =
            EcrRepository::new("IngestionImage", "ingestion-image", RemovalPolicy::Destroy)
                .into_parts();
        template
            .add_resources(resources)
            .wrap_err("Failed to compose the ingestion registry")?;

        let (network, resources) = Network::new(&config.vpc).into_parts();
        template.add_resources(resources).wrap_err("Failed to compose the network")?;

        let (lake, resources) =
            Storage::new("LakeBucket", &config.storage.name, config.storage.removal_policy)
                .into_parts();
        template.add_resources(resources).wrap_err("Failed to compose storage")?;

        let (airflow, resources) = Airflow::new(&network, &config.mwaa, &config.batch).into_parts();
        template.add_resources(resources).wrap_err("Failed to compose the orchestrator")?;

        let (warehouse, resources) = Warehouse::new(
            &network,
            &config.redshift,
            credentials,
            &lake,
            &config.region,
            account,
        )
        .wrap_err("Failed to compose the warehouse")?
        .into_parts();
        template.add_resources(resources).wrap_err("Failed to compose the warehouse")?;

        let (compute, resources) = BatchCompute::new(&network, &config.batch).into_parts();
        template.add_resources(resources).wrap_err("Failed to compose the compute fleet")?;

        let (_jobs, resources) = ComputeJobs::new(
            &dbt_image,
            &ingestion_image,
            &lake,
            &warehouse,
            &compute,
            &config.name,
        )
        .into_parts();
        template.add_resources(resources).wrap_err("Failed to compose job definitions")?;

        // Ordering is a checked property of the plan, not a side effect of
        // the composition sequence above
        let order = template
            .dependency_order()
            .wrap_err("The resource graph is not a valid construction order")?;

        Ok(PlatformStack {
            name: config.name.clone(),
            region: config.region.clone(),
            queue_name: compute.queue_name,
            lake_bucket: lake.name().to_string(),
            dags_bucket: airflow.dags_bucket.name().to_string(),
            template,
            order,
        })
    }

    /// Topological construction order, dependencies first
    pub fn construction_order(&self) -> &[String] {
        &self.order
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// The rendered CloudFormation template body
    pub fn template_body(&self) -> eyre::Result<String> {
        serde_json::to_string_pretty(&self.template.render())
            .wrap_err("Failed to serialize the template")
    }

    /// Buckets that must be emptied before teardown can delete them
    pub fn buckets_to_drain(&self) -> Vec<String> {
        self.template
            .resources()
            .iter()
            .filter(|r| {
                r.resource["Type"] == "AWS::S3::Bucket"
                    && r.removal_policy == Some(RemovalPolicy::Destroy)
            })
            .filter_map(|r| r.resource["Properties"]["BucketName"].as_str())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;

    fn stack() -> PlatformStack {
        let config = config::tests::dev();
        let credentials = AdminCredentials::new("dpstack", "Placeholder4Tests!");
        PlatformStack::synth(&config, &credentials).expect("should synthesize")
    }

    #[test]
    fn identical_input_yields_an_identical_order() {
        let first = stack();
        let second = stack();
        assert_eq!(first.construction_order(), second.construction_order());
    }

    #[test]
    fn namespace_precedes_workgroup_in_the_full_plan() {
        let stack = stack();
        let order = stack.construction_order();
        let pos = |name: &str| order.iter().position(|n| n == name).expect(name);
        assert!(pos("RedshiftNamespace") < pos("RedshiftWorkgroup"));
    }

    #[test]
    fn execution_role_precedes_the_airflow_environment() {
        let stack = stack();
        let order = stack.construction_order();
        let pos = |name: &str| order.iter().position(|n| n == name).expect(name);
        assert!(pos("AirflowExecutionRole") < pos("AirflowEnvironment"));
    }

    #[test]
    fn destroy_policy_marks_resources_for_deletion() {
        let stack = stack();
        let rendered = stack.template.render();

        for name in [
            "LakeBucket",
            "RedshiftNamespace",
            "RedshiftWorkgroup",
            "RedshiftAdminSecret",
            "BatchComputeEnvironment",
            "BatchJobQueue",
        ] {
            assert_eq!(
                rendered["Resources"][name]["DeletionPolicy"], "Delete",
                "{name}"
            );
        }
    }

    #[test]
    fn retain_policy_survives_teardown() {
        let raw = config::tests::DEV.replace(
            "name = \"dpstack-dlake\"\n        removal_policy = \"DESTROY\"",
            "name = \"dpstack-dlake\"\n        removal_policy = \"RETAIN\"",
        );
        let config = Config::from_toml(&raw).expect("should validate");
        let credentials = AdminCredentials::new("dpstack", "Placeholder4Tests!");
        let stack = PlatformStack::synth(&config, &credentials).expect("should synthesize");

        let rendered = stack.template.render();
        assert_eq!(rendered["Resources"]["LakeBucket"]["DeletionPolicy"], "Retain");
        assert!(stack.buckets_to_drain().iter().all(|b| b != "dpstack-dlake"));
    }

    #[test]
    fn destroy_buckets_are_drained_on_teardown() {
        let stack = stack();
        let buckets = stack.buckets_to_drain();
        assert!(buckets.contains(&"dpstack-dlake".to_string()));
        assert!(buckets.contains(&"dpstack-airflow".to_string()));
    }

    #[test]
    fn the_plan_is_one_deployable_unit() {
        let stack = stack();
        let rendered = stack.template.render();
        let resources = rendered["Resources"].as_object().expect("resources");

        // Every composed resource survives into the rendered template
        assert_eq!(resources.len(), stack.construction_order().len());
        assert!(resources.len() > 40, "got {}", resources.len());
    }

    #[test]
    fn published_outputs_match_the_configuration() {
        let stack = stack();
        assert_eq!(stack.queue_name, "dpstack-batch-queue");
        assert_eq!(stack.lake_bucket, "dpstack-dlake");
        assert_eq!(stack.dags_bucket, "dpstack-airflow");
        assert_eq!(stack.name, "dpstack");
        assert_eq!(stack.region, "eu-west-1");
    }
}
