use crate::config::RedshiftConfig;
use crate::credentials::AdminCredentials;
use crate::template::network::NetworkHandle;
use crate::template::storage::BucketHandle;
use crate::template::CfnResource;
use serde_json::{json, Value};

const REDSHIFT_PORT: u16 = 5439;

/// Typed warehouse outputs
#[derive(Clone, Debug)]
pub struct WarehouseHandle {
    pub namespace_name: String,
    pub workgroup_name: String,
    pub database_name: String,
    secret: String,
}

impl WarehouseHandle {
    /// ARN of the admin secret
    pub fn secret_arn(&self) -> Value {
        json!({ "Ref": self.secret })
    }

    pub fn namespace_arn(&self) -> Value {
        json!({ "Fn::GetAtt": ["RedshiftNamespace", "Namespace.NamespaceArn"] })
    }

    pub fn workgroup_arn(&self) -> Value {
        json!({ "Fn::GetAtt": ["RedshiftWorkgroup", "Workgroup.WorkgroupArn"] })
    }
}

/// Serverless warehouse: namespace, workgroup and admin credential issuance
///
/// The workgroup carries an explicit dependency edge on the namespace; the
/// namespace must come first in every valid construction order. Namespace,
/// workgroup and secret share one removal policy so teardown is
/// all-or-nothing.
pub struct Warehouse {
    handle: WarehouseHandle,
    resources: Vec<CfnResource>,
}

impl Warehouse {
    pub fn new(
        network: &NetworkHandle,
        config: &RedshiftConfig,
        credentials: &AdminCredentials,
        lake: &BucketHandle,
        region: &str,
        account: &str,
    ) -> eyre::Result<Self> {
        let secret_name = format!("{}-admin-secret", config.namespace_name);

        let secret_string = serde_json::to_string(&json!({
            "engine": "redshift",
            "host": format!(
                "{}.{account}.{region}.redshift-serverless.amazonaws.com",
                config.workgroup_name
            ),
            "port": REDSHIFT_PORT,
            "username": credentials.username,
            "dbname": config.database_name,
            "password": credentials.password,
        }))?;

        let resources = vec![
            CfnResource::new(
                "RedshiftRole",
                json!({
                    "Type": "AWS::IAM::Role",
                    "Properties": {
                        "AssumeRolePolicyDocument": {
                            "Version": "2012-10-17",
                            "Statement": [{
                                "Effect": "Allow",
                                "Principal": { "Service": ["redshift.amazonaws.com"] },
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
                                "PolicyName": "AdminSecretPolicy",
                                "PolicyDocument": {
                                    "Version": "2012-10-17",
                                    "Statement": [{
                                        "Effect": "Allow",
                                        "Action": [
                                            "secretsmanager:GetSecretValue",
                                            "secretsmanager:DescribeSecret"
                                        ],
                                        "Resource": [{ "Ref": "RedshiftAdminSecret" }]
                                    }]
                                }
                            }
                        ]
                    }
                }),
            ),
            CfnResource::new(
                "RedshiftSecurityGroup",
                json!({
                    "Type": "AWS::EC2::SecurityGroup",
                    "Properties": {
                        "GroupDescription": "Security group for Redshift Serverless",
                        "VpcId": network.vpc_id(),
                        "SecurityGroupIngress": [{
                            "IpProtocol": "tcp",
                            "FromPort": REDSHIFT_PORT,
                            "ToPort": REDSHIFT_PORT,
                            // Open for local access without a VPN, not ideal
                            "CidrIp": "0.0.0.0/0"
                        }]
                    }
                }),
            ),
            CfnResource::new(
                "RedshiftAdminSecret",
                json!({
                    "Type": "AWS::SecretsManager::Secret",
                    "Properties": {
                        "Name": secret_name,
                        "Description": "Redshift Serverless admin credentials",
                        "SecretString": secret_string
                    }
                }),
            )
            .removal_policy(config.removal_policy),
            CfnResource::new(
                "RedshiftNamespace",
                json!({
                    "Type": "AWS::RedshiftServerless::Namespace",
                    "Properties": {
                        "NamespaceName": config.namespace_name,
                        "AdminUsername": credentials.username,
                        "AdminUserPassword": credentials.password,
                        "DbName": config.database_name,
                        "IamRoles": [{ "Fn::GetAtt": ["RedshiftRole", "Arn"] }]
                    }
                }),
            )
            .removal_policy(config.removal_policy),
            // The compute binding cannot exist before its namespace
            CfnResource::new(
                "RedshiftWorkgroup",
                json!({
                    "Type": "AWS::RedshiftServerless::Workgroup",
                    "Properties": {
                        "WorkgroupName": config.workgroup_name,
                        "NamespaceName": config.namespace_name,
                        "BaseCapacity": 128,
                        "MaxCapacity": 512,
                        "EnhancedVpcRouting": false,
                        "SecurityGroupIds": [{ "Fn::GetAtt": ["RedshiftSecurityGroup", "GroupId"] }],
                        "SubnetIds": network.public_subnet_ids(),
                        "PubliclyAccessible": true
                    }
                }),
            )
            .depends_on("RedshiftNamespace")
            .removal_policy(config.removal_policy),
        ];

        Ok(Warehouse {
            handle: WarehouseHandle {
                namespace_name: config.namespace_name.clone(),
                workgroup_name: config.workgroup_name.clone(),
                database_name: config.database_name.clone(),
                secret: "RedshiftAdminSecret".to_string(),
            },
            resources,
        })
    }

    pub fn into_parts(self) -> (WarehouseHandle, Vec<CfnResource>) {
        (self.handle, self.resources)
    }
}
