use crate::template::compute::ComputeHandle;
use crate::template::registry::RepositoryHandle;
use crate::template::storage::BucketHandle;
use crate::template::warehouse::WarehouseHandle;
use crate::template::CfnResource;
use serde_json::{json, Value};

pub const DBT_JOB_NAME: &str = "dbt-transformation-job";
pub const INGESTION_JOB_NAME: &str = "ingestion-job";

/// Typed job-definition outputs
#[derive(Clone, Debug)]
pub struct JobsHandle {
    pub dbt_job_name: String,
    pub ingestion_job_name: String,
}

/// Executable job templates for the two job families
///
/// Each definition binds a container image, a fixed resource request and two
/// distinct principals: the execution role bootstraps the task (logs, image
/// pull, secret fetch), the container role is what the workload itself runs
/// as. Conflating the two would hand bootstrap permissions to the workload.
pub struct ComputeJobs {
    handle: JobsHandle,
    resources: Vec<CfnResource>,
}

impl ComputeJobs {
    pub fn new(
        dbt_image: &RepositoryHandle,
        ingestion_image: &RepositoryHandle,
        lake: &BucketHandle,
        warehouse: &WarehouseHandle,
        compute: &ComputeHandle,
        platform_name: &str,
    ) -> Self {
        let resources = vec![
            Self::execution_role(dbt_image, ingestion_image, warehouse, platform_name),
            Self::container_role(lake, warehouse, compute, platform_name),
            Self::job_definition("DbtJobDefinition", DBT_JOB_NAME, dbt_image),
            Self::job_definition("IngestionJobDefinition", INGESTION_JOB_NAME, ingestion_image),
        ];

        ComputeJobs {
            handle: JobsHandle {
                dbt_job_name: DBT_JOB_NAME.to_string(),
                ingestion_job_name: INGESTION_JOB_NAME.to_string(),
            },
            resources,
        }
    }

    pub fn into_parts(self) -> (JobsHandle, Vec<CfnResource>) {
        (self.handle, self.resources)
    }

    fn parameter_path_arn(platform_name: &str) -> Value {
        json!({
            "Fn::Sub": format!(
                "arn:aws:ssm:${{AWS::Region}}:${{AWS::AccountId}}:parameter/{platform_name}/*"
            )
        })
    }

    /// Bootstrap identity: pull the image, deliver logs, read secrets
    fn execution_role(
        dbt_image: &RepositoryHandle,
        ingestion_image: &RepositoryHandle,
        warehouse: &WarehouseHandle,
        platform_name: &str,
    ) -> CfnResource {
        CfnResource::new(
            "JobExecutionRole",
            json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "AssumeRolePolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": { "Service": ["ecs-tasks.amazonaws.com"] },
                            "Action": ["sts:AssumeRole"]
                        }]
                    },
                    "Path": "/",
                    "Policies": [
                        {
                            "PolicyName": "AppendToLogsPolicy",
                            "PolicyDocument": {
                                "Version": "2012-10-17",
                                "Statement": [{
                                    "Effect": "Allow",
                                    "Action": [
                                        "logs:CreateLogGroup",
                                        "logs:CreateLogStream",
                                        "logs:PutLogEvents"
                                    ],
                                    "Resource": [{
                                        "Fn::Sub": "arn:aws:logs:${AWS::Region}:${AWS::AccountId}:log-group:/aws/batch/*"
                                    }]
                                }]
                            }
                        },
                        {
                            "PolicyName": "ImagePullPolicy",
                            "PolicyDocument": {
                                "Version": "2012-10-17",
                                "Statement": [
                                    {
                                        "Effect": "Allow",
                                        "Action": ["ecr:GetAuthorizationToken"],
                                        // Account-level permission, cannot be resource-scoped
                                        "Resource": "*"
                                    },
                                    {
                                        "Effect": "Allow",
                                        "Action": [
                                            "ecr:BatchCheckLayerAvailability",
                                            "ecr:GetDownloadUrlForLayer",
                                            "ecr:BatchGetImage"
                                        ],
                                        "Resource": [dbt_image.arn(), ingestion_image.arn()]
                                    }
                                ]
                            }
                        },
                        {
                            "PolicyName": "BootstrapSecretsPolicy",
                            "PolicyDocument": {
                                "Version": "2012-10-17",
                                "Statement": [
                                    {
                                        "Effect": "Allow",
                                        "Action": ["ssm:GetParameters"],
                                        "Resource": [Self::parameter_path_arn(platform_name)]
                                    },
                                    {
                                        "Effect": "Allow",
                                        "Action": ["secretsmanager:GetSecretValue"],
                                        "Resource": [warehouse.secret_arn()]
                                    },
                                    {
                                        "Effect": "Allow",
                                        "Action": ["kms:Decrypt"],
                                        "Resource": [{
                                            "Fn::Sub": "arn:aws:kms:${AWS::Region}:${AWS::AccountId}:key/*"
                                        }],
                                        "Condition": {
                                            "StringLike": {
                                                "kms:ViaService": {
                                                    "Fn::Sub": "secretsmanager.${AWS::Region}.amazonaws.com"
                                                }
                                            }
                                        }
                                    }
                                ]
                            }
                        }
                    ]
                }
            }),
        )
    }

    /// Workload identity: the permissions the transformation itself needs
    fn container_role(
        lake: &BucketHandle,
        warehouse: &WarehouseHandle,
        compute: &ComputeHandle,
        platform_name: &str,
    ) -> CfnResource {
        let job_definition_arns = json!([
            { "Fn::Sub": format!("arn:aws:batch:${{AWS::Region}}:${{AWS::AccountId}}:job-definition/{DBT_JOB_NAME}:*") },
            { "Fn::Sub": format!("arn:aws:batch:${{AWS::Region}}:${{AWS::AccountId}}:job-definition/{INGESTION_JOB_NAME}:*") },
        ]);

        CfnResource::new(
            "JobContainerRole",
            json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "AssumeRolePolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": { "Service": ["ecs-tasks.amazonaws.com"] },
                            "Action": ["sts:AssumeRole"]
                        }]
                    },
                    "Path": "/",
                    "Policies": [
                        {
                            "PolicyName": "DataLakePolicy",
                            "PolicyDocument": {
                                "Version": "2012-10-17",
                                "Statement": [
                                    {
                                        "Effect": "Allow",
                                        "Action": ["s3:ListBucket", "s3:GetBucketLocation"],
                                        "Resource": [lake.arn()]
                                    },
                                    {
                                        "Effect": "Allow",
                                        "Action": ["s3:GetObject", "s3:PutObject", "s3:DeleteObject"],
                                        "Resource": [lake.objects_arn()]
                                    }
                                ]
                            }
                        },
                        {
                            "PolicyName": "WarehouseAccessPolicy",
                            "PolicyDocument": {
                                "Version": "2012-10-17",
                                "Statement": [
                                    {
                                        "Effect": "Allow",
                                        "Action": [
                                            "redshift-serverless:GetCredentials",
                                            "redshift-serverless:GetNamespace",
                                            "redshift-serverless:GetWorkgroup"
                                        ],
                                        "Resource": [warehouse.namespace_arn(), warehouse.workgroup_arn()]
                                    },
                                    {
                                        "Effect": "Allow",
                                        "Action": [
                                            "redshift-data:ExecuteStatement",
                                            "redshift-data:BatchExecuteStatement"
                                        ],
                                        "Resource": [warehouse.workgroup_arn()]
                                    },
                                    {
                                        "Effect": "Allow",
                                        "Action": [
                                            "redshift-data:DescribeStatement",
                                            "redshift-data:GetStatementResult",
                                            "redshift-data:CancelStatement"
                                        ],
                                        // Statement handles are not resource-scoped
                                        "Resource": "*"
                                    }
                                ]
                            }
                        },
                        {
                            "PolicyName": "BatchSubmitPolicy",
                            "PolicyDocument": {
                                "Version": "2012-10-17",
                                "Statement": [{
                                    "Effect": "Allow",
                                    "Action": ["batch:SubmitJob", "batch:DescribeJobs"],
                                    "Resource": [compute.queue_arn(), job_definition_arns[0].clone(), job_definition_arns[1].clone()]
                                }]
                            }
                        },
                        {
                            "PolicyName": "WorkloadSecretsPolicy",
                            "PolicyDocument": {
                                "Version": "2012-10-17",
                                "Statement": [
                                    {
                                        "Effect": "Allow",
                                        "Action": ["ssm:GetParameters"],
                                        "Resource": [Self::parameter_path_arn(platform_name)]
                                    },
                                    {
                                        "Effect": "Allow",
                                        "Action": ["secretsmanager:GetSecretValue"],
                                        "Resource": [warehouse.secret_arn()]
                                    }
                                ]
                            }
                        }
                    ]
                }
            }),
        )
    }

    /// One job template per family, bound to the latest image
    fn job_definition(logical_id: &str, name: &str, image: &RepositoryHandle) -> CfnResource {
        CfnResource::new(
            logical_id,
            json!({
                "Type": "AWS::Batch::JobDefinition",
                "Properties": {
                    "JobDefinitionName": name,
                    "Type": "container",
                    "PlatformCapabilities": ["FARGATE"],
                    "RetryStrategy": { "Attempts": 1 },
                    "ContainerProperties": {
                        "Image": image.image_uri("latest"),
                        "JobRoleArn": { "Fn::GetAtt": ["JobContainerRole", "Arn"] },
                        "ExecutionRoleArn": { "Fn::GetAtt": ["JobExecutionRole", "Arn"] },
                        "Command": ["echo", "test"],
                        "Environment": [
                            { "Name": "DBT_PROFILES_DIR", "Value": "./" },
                            { "Name": "DBT_TARGET_PATH", "Value": "dbt/target" },
                            { "Name": "DBT_LOG_PATH", "Value": "dbt/logs" }
                        ],
                        "ResourceRequirements": [
                            { "Type": "MEMORY", "Value": "2048" },
                            { "Type": "VCPU", "Value": "1" }
                        ]
                    }
                }
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::credentials::AdminCredentials;
    use crate::template::compute::BatchCompute;
    use crate::template::network::Network;
    use crate::template::registry::EcrRepository;
    use crate::template::storage::Storage;
    use crate::template::warehouse::Warehouse;
    use crate::RemovalPolicy;
    use std::collections::BTreeSet;

    fn jobs() -> (JobsHandle, Vec<CfnResource>) {
        let config = config::tests::dev();
        let (network, _) = Network::new(&config.vpc).into_parts();
        let (dbt, _) = EcrRepository::new("DbtImage", "dbt-image", RemovalPolicy::Destroy).into_parts();
        let (ingestion, _) =
            EcrRepository::new("IngestionImage", "ingestion-image", RemovalPolicy::Destroy).into_parts();
        let (lake, _) = Storage::new("Lake", &config.storage.name, RemovalPolicy::Destroy).into_parts();
        let credentials = AdminCredentials::new("dpstack", "Placeholder4Tests!");

        let (warehouse, _) = Warehouse::new(
            &network,
            &config.redshift,
            &credentials,
            &lake,
            "eu-west-1",
            "000000000000",
        )
        .expect("warehouse")
        .into_parts();

        let (compute, _) = BatchCompute::new(&network, &config.batch).into_parts();

        ComputeJobs::new(&dbt, &ingestion, &lake, &warehouse, &compute, &config.name).into_parts()
    }

    fn find<'a>(resources: &'a [CfnResource], name: &str) -> &'a CfnResource {
        resources.iter().find(|r| r.name == name).expect(name)
    }

    /// Every action granted by the role's inline policies
    fn actions(role: &CfnResource) -> BTreeSet<String> {
        let mut found = BTreeSet::new();

        for policy in role.resource["Properties"]["Policies"].as_array().expect("policies") {
            for statement in policy["PolicyDocument"]["Statement"].as_array().expect("statements") {
                for action in statement["Action"].as_array().expect("actions") {
                    found.insert(action.as_str().expect("action").to_string());
                }
            }
        }

        found
    }

    #[test]
    fn execution_and_container_identities_are_distinct() {
        let (_, resources) = jobs();

        for name in ["DbtJobDefinition", "IngestionJobDefinition"] {
            let properties = &find(&resources, name).resource["Properties"]["ContainerProperties"];
            assert_eq!(properties["JobRoleArn"]["Fn::GetAtt"][0], "JobContainerRole");
            assert_eq!(properties["ExecutionRoleArn"]["Fn::GetAtt"][0], "JobExecutionRole");
        }
    }

    #[test]
    fn grant_overlap_is_limited_to_secret_and_parameter_read() {
        let (_, resources) = jobs();

        let execution = actions(find(&resources, "JobExecutionRole"));
        let container = actions(find(&resources, "JobContainerRole"));

        let overlap: BTreeSet<&String> = execution.intersection(&container).collect();
        let documented: BTreeSet<String> =
            ["ssm:GetParameters", "secretsmanager:GetSecretValue"]
                .iter()
                .map(|s| s.to_string())
                .collect();

        assert_eq!(overlap, documented.iter().collect::<BTreeSet<&String>>());
    }

    #[test]
    fn images_resolve_to_the_latest_tag() {
        let (_, resources) = jobs();

        let dbt = &find(&resources, "DbtJobDefinition").resource["Properties"]["ContainerProperties"];
        assert_eq!(dbt["Image"]["Fn::Sub"], "${DbtImage.RepositoryUri}:latest");

        let ingestion =
            &find(&resources, "IngestionJobDefinition").resource["Properties"]["ContainerProperties"];
        assert_eq!(ingestion["Image"]["Fn::Sub"], "${IngestionImage.RepositoryUri}:latest");
    }

    #[test]
    fn definitions_carry_the_fixed_resource_request() {
        let (_, resources) = jobs();
        let requirements = &find(&resources, "DbtJobDefinition").resource["Properties"]
            ["ContainerProperties"]["ResourceRequirements"];

        assert_eq!(requirements[0]["Type"], "MEMORY");
        assert_eq!(requirements[0]["Value"], "2048");
        assert_eq!(requirements[1]["Type"], "VCPU");
        assert_eq!(requirements[1]["Value"], "1");
    }

    #[test]
    fn no_identity_holds_a_wildcard_data_grant() {
        let (_, resources) = jobs();

        for name in ["JobExecutionRole", "JobContainerRole"] {
            let role = find(&resources, name);

            for policy in role.resource["Properties"]["Policies"].as_array().expect("policies") {
                for statement in policy["PolicyDocument"]["Statement"].as_array().expect("statements") {
                    if statement["Resource"] == json!("*") {
                        let actions = statement["Action"].as_array().expect("actions");

                        // Only permissions AWS defines account-wide stay open
                        for action in actions {
                            let action = action.as_str().expect("action");
                            assert!(
                                action == "ecr:GetAuthorizationToken"
                                    || action.starts_with("redshift-data:"),
                                "unexpected wildcard grant for {action} in {name}"
                            );
                        }
                    }
                }
            }
        }
    }
}
