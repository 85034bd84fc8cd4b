use crate::config::BatchConfig;
use crate::template::network::NetworkHandle;
use crate::template::CfnResource;
use serde_json::{json, Value};

/// Typed compute outputs
#[derive(Clone, Debug)]
pub struct ComputeHandle {
    pub queue_name: String,
}

impl ComputeHandle {
    /// ARN of the job queue, for scoping submission grants
    pub fn queue_arn(&self) -> Value {
        json!({
            "Fn::Sub": format!(
                "arn:aws:batch:${{AWS::Region}}:${{AWS::AccountId}}:job-queue/{}",
                self.queue_name
            )
        })
    }
}

/// Elastic compute pool and its job queue
///
/// A managed Fargate environment bound to the private tier. Minimum
/// capacity is zero: the fleet scales down completely between runs. The
/// environment and queue share one removal policy.
pub struct BatchCompute {
    handle: ComputeHandle,
    resources: Vec<CfnResource>,
}

impl BatchCompute {
    pub fn new(network: &NetworkHandle, config: &BatchConfig) -> Self {
        let resources = vec![
            CfnResource::new(
                "BatchServiceRole",
                json!({
                    "Type": "AWS::IAM::Role",
                    "Properties": {
                        "AssumeRolePolicyDocument": {
                            "Version": "2012-10-17",
                            "Statement": [{
                                "Effect": "Allow",
                                "Principal": { "Service": ["batch.amazonaws.com"] },
                                "Action": ["sts:AssumeRole"]
                            }]
                        },
                        "Path": "/",
                        "ManagedPolicyArns": [
                            "arn:aws:iam::aws:policy/service-role/AWSBatchServiceRole"
                        ]
                    }
                }),
            ),
            CfnResource::new(
                "BatchInstanceRole",
                json!({
                    "Type": "AWS::IAM::Role",
                    "Properties": {
                        "AssumeRolePolicyDocument": {
                            "Version": "2012-10-17",
                            "Statement": [{
                                "Effect": "Allow",
                                "Principal": { "Service": ["ec2.amazonaws.com"] },
                                "Action": ["sts:AssumeRole"]
                            }]
                        },
                        "Path": "/",
                        "ManagedPolicyArns": [
                            "arn:aws:iam::aws:policy/service-role/AmazonEC2ContainerServiceforEC2Role"
                        ]
                    }
                }),
            ),
            CfnResource::new(
                "BatchHostSecurityGroup",
                json!({
                    "Type": "AWS::EC2::SecurityGroup",
                    "Properties": {
                        "GroupDescription": "Access to the hosts that run batch containers",
                        "VpcId": network.vpc_id()
                    }
                }),
            ),
            CfnResource::new(
                "BatchHostSecurityGroupSelfReference",
                json!({
                    "Type": "AWS::EC2::SecurityGroupIngress",
                    "Properties": {
                        "GroupId": { "Fn::GetAtt": ["BatchHostSecurityGroup", "GroupId"] },
                        "IpProtocol": "-1",
                        "SourceSecurityGroupId": { "Fn::GetAtt": ["BatchHostSecurityGroup", "GroupId"] }
                    }
                }),
            ),
            CfnResource::new(
                "BatchComputeEnvironment",
                json!({
                    "Type": "AWS::Batch::ComputeEnvironment",
                    "Properties": {
                        "Type": "MANAGED",
                        "State": "ENABLED",
                        "ServiceRole": { "Fn::GetAtt": ["BatchServiceRole", "Arn"] },
                        "ComputeResources": {
                            "Type": "FARGATE",
                            "MaxvCpus": config.max_vcpus,
                            "SecurityGroupIds": [{ "Fn::GetAtt": ["BatchHostSecurityGroup", "GroupId"] }],
                            "Subnets": network.private_subnet_ids()
                        }
                    }
                }),
            )
            .removal_policy(config.removal_policy),
            CfnResource::new(
                "BatchJobQueue",
                json!({
                    "Type": "AWS::Batch::JobQueue",
                    "Properties": {
                        "JobQueueName": config.queue_name,
                        "Priority": 1,
                        "State": "ENABLED",
                        "ComputeEnvironmentOrder": [{
                            "Order": 1,
                            "ComputeEnvironment": { "Ref": "BatchComputeEnvironment" }
                        }]
                    }
                }),
            )
            .depends_on("BatchComputeEnvironment")
            .removal_policy(config.removal_policy),
        ];

        BatchCompute {
            handle: ComputeHandle {
                queue_name: config.queue_name.clone(),
            },
            resources,
        }
    }

    pub fn into_parts(self) -> (ComputeHandle, Vec<CfnResource>) {
        (self.handle, self.resources)
    }
}
