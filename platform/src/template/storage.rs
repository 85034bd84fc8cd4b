use crate::template::CfnResource;
use crate::RemovalPolicy;
use serde_json::{json, Value};

/// Typed bucket outputs: name for SDK calls, ARN tokens for policies
#[derive(Clone, Debug)]
pub struct BucketHandle {
    logical_id: String,
    name: String,
}

impl BucketHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arn(&self) -> Value {
        json!({ "Fn::GetAtt": [self.logical_id.clone(), "Arn"] })
    }

    /// ARN pattern covering every object in the bucket
    pub fn objects_arn(&self) -> Value {
        json!({ "Fn::Sub": format!("${{{}.Arn}}/*", self.logical_id) })
    }
}

/// Encrypted bucket with public access fully blocked
///
/// Shared by the data lake and the orchestrator's definitions bucket. Under
/// a destroy policy the teardown path empties the bucket first, so nothing
/// survives out of band.
pub struct Storage {
    handle: BucketHandle,
    resources: Vec<CfnResource>,
}

impl Storage {
    pub fn new(logical_id: &str, name: &str, removal_policy: RemovalPolicy) -> Self {
        let resource = CfnResource::new(
            logical_id,
            json!({
                "Type": "AWS::S3::Bucket",
                "Properties": {
                    "BucketName": name,
                    "BucketEncryption": {
                        "ServerSideEncryptionConfiguration": [{
                            "ServerSideEncryptionByDefault": { "SSEAlgorithm": "AES256" }
                        }]
                    },
                    "PublicAccessBlockConfiguration": {
                        "BlockPublicAcls": true,
                        "BlockPublicPolicy": true,
                        "IgnorePublicAcls": true,
                        "RestrictPublicBuckets": true
                    }
                }
            }),
        )
        .removal_policy(removal_policy);

        Storage {
            handle: BucketHandle {
                logical_id: logical_id.to_string(),
                name: name.to_string(),
            },
            resources: vec![resource],
        }
    }

    pub fn into_parts(self) -> (BucketHandle, Vec<CfnResource>) {
        (self.handle, self.resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_is_encrypted_and_private() {
        let (_, resources) = Storage::new("Lake", "dpstack-dlake", RemovalPolicy::Destroy).into_parts();
        let properties = &resources[0].resource["Properties"];

        assert_eq!(
            properties["BucketEncryption"]["ServerSideEncryptionConfiguration"][0]
                ["ServerSideEncryptionByDefault"]["SSEAlgorithm"],
            "AES256"
        );

        for flag in [
            "BlockPublicAcls",
            "BlockPublicPolicy",
            "IgnorePublicAcls",
            "RestrictPublicBuckets",
        ] {
            assert_eq!(properties["PublicAccessBlockConfiguration"][flag], true);
        }
    }

    #[test]
    fn removal_policy_is_applied() {
        let (_, kept) = Storage::new("Lake", "dpstack-dlake", RemovalPolicy::Retain).into_parts();
        assert_eq!(kept[0].removal_policy, Some(RemovalPolicy::Retain));

        let (_, gone) = Storage::new("Lake", "dpstack-dlake", RemovalPolicy::Destroy).into_parts();
        assert_eq!(gone[0].removal_policy, Some(RemovalPolicy::Destroy));
    }

    #[test]
    fn handle_exposes_arn_tokens() {
        let (handle, _) = Storage::new("Lake", "dpstack-dlake", RemovalPolicy::Destroy).into_parts();
        assert_eq!(handle.name(), "dpstack-dlake");
        assert_eq!(handle.arn(), json!({ "Fn::GetAtt": ["Lake", "Arn"] }));
        assert_eq!(handle.objects_arn(), json!({ "Fn::Sub": "${Lake.Arn}/*" }));
    }
}
