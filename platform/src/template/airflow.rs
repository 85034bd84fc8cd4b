use crate::config::{BatchConfig, MwaaConfig};
use crate::template::jobs::{DBT_JOB_NAME, INGESTION_JOB_NAME};
use crate::template::network::NetworkHandle;
use crate::template::storage::{BucketHandle, Storage};
use crate::template::CfnResource;
use serde_json::{json, Value};

/// Typed orchestrator outputs
#[derive(Clone, Debug)]
pub struct AirflowHandle {
    pub environment_name: String,
    pub dags_bucket: BucketHandle,
}

/// Managed Airflow environment with its backing store and identity
///
/// Produces the DAGs bucket, the Postgres metadata database with generated
/// credentials, the execution role, a self-referencing network perimeter and
/// the environment itself. The environment carries an explicit dependency
/// edge on the execution role: MWAA validates the role at creation time.
pub struct Airflow {
    handle: AirflowHandle,
    resources: Vec<CfnResource>,
}

impl Airflow {
    pub fn new(network: &NetworkHandle, config: &MwaaConfig, batch: &BatchConfig) -> Self {
        let (dags_bucket, mut resources) =
            Storage::new("AirflowDagsBucket", &config.bucket_name, config.removal_policy)
                .into_parts();

        resources.extend(Self::database(network, config));
        resources.push(Self::execution_role(config, batch, &dags_bucket));
        resources.extend(Self::security_group(network));
        resources.push(Self::environment(network, config, &dags_bucket));

        Airflow {
            handle: AirflowHandle {
                environment_name: config.name.clone(),
                dags_bucket,
            },
            resources,
        }
    }

    pub fn into_parts(self) -> (AirflowHandle, Vec<CfnResource>) {
        (self.handle, self.resources)
    }

    /// Postgres metadata database on the private tier
    ///
    /// Credentials are generated into Secrets Manager and resolved by
    /// reference; the password never appears in configuration.
    fn database(network: &NetworkHandle, config: &MwaaConfig) -> Vec<CfnResource> {
        vec![
            CfnResource::new(
                "AirflowDbSubnetGroup",
                json!({
                    "Type": "AWS::RDS::DBSubnetGroup",
                    "Properties": {
                        "DBSubnetGroupDescription": "Subnet group for the Airflow database",
                        "SubnetIds": network.private_subnet_ids()
                    }
                }),
            ),
            CfnResource::new(
                "AirflowDbSecurityGroup",
                json!({
                    "Type": "AWS::EC2::SecurityGroup",
                    "Properties": {
                        "GroupDescription": "Security group for the Airflow database",
                        "VpcId": network.vpc_id(),
                        "SecurityGroupIngress": [{
                            "IpProtocol": "tcp",
                            "FromPort": 5432,
                            "ToPort": 5432,
                            "CidrIp": network.vpc_cidr()
                        }]
                    }
                }),
            ),
            CfnResource::new(
                "AirflowDbSecret",
                json!({
                    "Type": "AWS::SecretsManager::Secret",
                    "Properties": {
                        "Description": "Airflow database credentials",
                        "GenerateSecretString": {
                            "SecretStringTemplate": "{\"username\": \"airflow\"}",
                            "GenerateStringKey": "password",
                            "ExcludeCharacters": "\"@/\\"
                        }
                    }
                }),
            )
            .removal_policy(config.removal_policy),
            CfnResource::new(
                "AirflowDatabase",
                json!({
                    "Type": "AWS::RDS::DBInstance",
                    "Properties": {
                        "Engine": "postgres",
                        "EngineVersion": "15.4",
                        "DBInstanceClass": config.rds.instance_type,
                        "AllocatedStorage": "20",
                        "DBName": "airflow",
                        "MasterUsername": {
                            "Fn::Sub": "{{resolve:secretsmanager:${AirflowDbSecret}:SecretString:username}}"
                        },
                        "MasterUserPassword": {
                            "Fn::Sub": "{{resolve:secretsmanager:${AirflowDbSecret}:SecretString:password}}"
                        },
                        "DBSubnetGroupName": { "Ref": "AirflowDbSubnetGroup" },
                        "VPCSecurityGroups": [{ "Fn::GetAtt": ["AirflowDbSecurityGroup", "GroupId"] }],
                        "BackupRetentionPeriod": config.rds.backup_retention_days,
                        "StorageEncrypted": true,
                        "MultiAZ": false,
                        "DeletionProtection": false
                    }
                }),
            )
            .removal_policy(config.removal_policy),
        ]
    }

    /// Execution identity with the minimum documented permission set
    fn execution_role(config: &MwaaConfig, batch: &BatchConfig, dags: &BucketHandle) -> CfnResource {
        let environment_arn = json!({
            "Fn::Sub": format!(
                "arn:aws:airflow:${{AWS::Region}}:${{AWS::AccountId}}:environment/{}",
                config.name
            )
        });

        // Scoped to this platform's queue and job definitions, not "*"
        let batch_arns = json!([
            { "Fn::Sub": format!("arn:aws:batch:${{AWS::Region}}:${{AWS::AccountId}}:job-queue/{}", batch.queue_name) },
            { "Fn::Sub": format!("arn:aws:batch:${{AWS::Region}}:${{AWS::AccountId}}:job-definition/{DBT_JOB_NAME}:*") },
            { "Fn::Sub": format!("arn:aws:batch:${{AWS::Region}}:${{AWS::AccountId}}:job-definition/{INGESTION_JOB_NAME}:*") },
        ]);

        CfnResource::new(
            "AirflowExecutionRole",
            json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "AssumeRolePolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": {
                                "Service": ["airflow.amazonaws.com", "airflow-env.amazonaws.com"]
                            },
                            "Action": ["sts:AssumeRole"]
                        }]
                    },
                    "Path": "/",
                    "Policies": [
                        {
                            "PolicyName": "EnvironmentMetricsPolicy",
                            "PolicyDocument": {
                                "Version": "2012-10-17",
                                "Statement": [{
                                    "Effect": "Allow",
                                    "Action": ["airflow:PublishMetrics"],
                                    "Resource": [environment_arn]
                                }]
                            }
                        },
                        {
                            "PolicyName": "BatchSubmitPolicy",
                            "PolicyDocument": {
                                "Version": "2012-10-17",
                                "Statement": [{
                                    "Effect": "Allow",
                                    "Action": [
                                        "batch:SubmitJob",
                                        "batch:DescribeJobs",
                                        "batch:DescribeJobQueues",
                                        "batch:DescribeJobDefinitions",
                                        "batch:ListJobs",
                                        "batch:TerminateJob",
                                        "batch:CancelJob"
                                    ],
                                    "Resource": batch_arns
                                }]
                            }
                        },
                        {
                            "PolicyName": "DagsBucketPolicy",
                            "PolicyDocument": {
                                "Version": "2012-10-17",
                                "Statement": [
                                    {
                                        "Effect": "Allow",
                                        "Action": [
                                            "s3:GetObject*",
                                            "s3:GetBucket*",
                                            "s3:GetBucketVersioning",
                                            "s3:List*"
                                        ],
                                        "Resource": [dags.arn(), dags.objects_arn()]
                                    },
                                    {
                                        "Effect": "Allow",
                                        "Action": ["s3:GetAccountPublicAccessBlock"],
                                        // Account-level permission, cannot be resource-scoped
                                        "Resource": "*"
                                    }
                                ]
                            }
                        },
                        {
                            "PolicyName": "AppendToLogsPolicy",
                            "PolicyDocument": {
                                "Version": "2012-10-17",
                                "Statement": [
                                    {
                                        "Effect": "Allow",
                                        "Action": [
                                            "logs:CreateLogStream",
                                            "logs:CreateLogGroup",
                                            "logs:PutLogEvents",
                                            "logs:GetLogEvents",
                                            "logs:GetLogRecord",
                                            "logs:GetLogGroupFields",
                                            "logs:GetQueryResults"
                                        ],
                                        "Resource": [{
                                            "Fn::Sub": format!(
                                                "arn:aws:logs:${{AWS::Region}}:${{AWS::AccountId}}:log-group:airflow-{}-*",
                                                config.name
                                            )
                                        }]
                                    },
                                    {
                                        "Effect": "Allow",
                                        "Action": ["logs:DescribeLogGroups"],
                                        "Resource": "*"
                                    },
                                    {
                                        "Effect": "Allow",
                                        "Action": ["cloudwatch:PutMetricData"],
                                        "Resource": "*"
                                    }
                                ]
                            }
                        },
                        {
                            "PolicyName": "CeleryQueuePolicy",
                            "PolicyDocument": {
                                "Version": "2012-10-17",
                                "Statement": [{
                                    "Effect": "Allow",
                                    "Action": [
                                        "sqs:ChangeMessageVisibility",
                                        "sqs:DeleteMessage",
                                        "sqs:GetQueueAttributes",
                                        "sqs:GetQueueUrl",
                                        "sqs:ReceiveMessage",
                                        "sqs:SendMessage"
                                    ],
                                    "Resource": [{
                                        "Fn::Sub": "arn:aws:sqs:${AWS::Region}:*:airflow-celery-*"
                                    }]
                                }]
                            }
                        },
                        {
                            "PolicyName": "QueueEncryptionPolicy",
                            "PolicyDocument": {
                                "Version": "2012-10-17",
                                "Statement": [{
                                    "Effect": "Allow",
                                    "Action": [
                                        "kms:Decrypt",
                                        "kms:DescribeKey",
                                        "kms:GenerateDataKey*",
                                        "kms:Encrypt"
                                    ],
                                    "NotResource": [{
                                        "Fn::Sub": "arn:aws:kms:*:${AWS::AccountId}:key/*"
                                    }],
                                    "Condition": {
                                        "StringLike": {
                                            "kms:ViaService": { "Fn::Sub": "sqs.${AWS::Region}.amazonaws.com" }
                                        }
                                    }
                                }]
                            }
                        }
                    ]
                }
            }),
        )
    }

    /// Perimeter allowing self-referential traffic only
    fn security_group(network: &NetworkHandle) -> Vec<CfnResource> {
        vec![
            CfnResource::new(
                "AirflowSecurityGroup",
                json!({
                    "Type": "AWS::EC2::SecurityGroup",
                    "Properties": {
                        "GroupDescription": "Security group for the Airflow environment",
                        "VpcId": network.vpc_id()
                    }
                }),
            ),
            // Declared as a separate resource so the rule can reference the
            // group it belongs to
            CfnResource::new(
                "AirflowSecurityGroupSelfReference",
                json!({
                    "Type": "AWS::EC2::SecurityGroupIngress",
                    "Properties": {
                        "GroupId": { "Fn::GetAtt": ["AirflowSecurityGroup", "GroupId"] },
                        "IpProtocol": "-1",
                        "SourceSecurityGroupId": { "Fn::GetAtt": ["AirflowSecurityGroup", "GroupId"] }
                    }
                }),
            ),
        ]
    }

    fn environment(network: &NetworkHandle, config: &MwaaConfig, dags: &BucketHandle) -> CfnResource {
        fn module_logging(level: &str) -> Value {
            json!({ "Enabled": true, "LogLevel": level })
        }

        // MWAA takes exactly two subnets
        let subnets: Vec<Value> = network.private_subnet_ids().into_iter().take(2).collect();

        CfnResource::new(
            "AirflowEnvironment",
            json!({
                "Type": "AWS::MWAA::Environment",
                "Properties": {
                    "Name": config.name,
                    "AirflowVersion": "3.0.6",
                    "DagS3Path": "dags",
                    "EnvironmentClass": "mw1.small",
                    "ExecutionRoleArn": { "Fn::GetAtt": ["AirflowExecutionRole", "Arn"] },
                    "LoggingConfiguration": {
                        "DagProcessingLogs": module_logging("INFO"),
                        "SchedulerLogs": module_logging("INFO"),
                        "TaskLogs": module_logging("INFO"),
                        "WebserverLogs": module_logging("INFO"),
                        "WorkerLogs": module_logging("INFO")
                    },
                    "MaxWorkers": 10,
                    "MinWorkers": 1,
                    "NetworkConfiguration": {
                        "SecurityGroupIds": [{ "Fn::GetAtt": ["AirflowSecurityGroup", "GroupId"] }],
                        "SubnetIds": subnets
                    },
                    "SourceBucketArn": dags.arn(),
                    "WebserverAccessMode": "PUBLIC_ONLY"
                }
            }),
        )
        .depends_on("AirflowExecutionRole")
        .removal_policy(config.removal_policy)
    }
}
