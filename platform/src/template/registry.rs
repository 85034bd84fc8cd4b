use crate::template::CfnResource;
use crate::RemovalPolicy;
use serde_json::{json, Value};

/// Typed repository outputs consumed by job definitions
#[derive(Clone, Debug)]
pub struct RepositoryHandle {
    logical_id: String,
    name: String,
}

impl RepositoryHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arn(&self) -> Value {
        json!({ "Fn::GetAtt": [self.logical_id.clone(), "Arn"] })
    }

    /// Fully qualified image reference for the given tag
    pub fn image_uri(&self, tag: &str) -> Value {
        json!({ "Fn::Sub": format!("${{{}.RepositoryUri}}:{tag}", self.logical_id) })
    }
}

/// Versioned image repository for one job family
///
/// Repository names are unique per account; a duplicate is rejected when
/// the plan is applied. Destroy empties the repository on teardown.
pub struct EcrRepository {
    handle: RepositoryHandle,
    resources: Vec<CfnResource>,
}

impl EcrRepository {
    pub fn new(logical_id: &str, name: &str, removal_policy: RemovalPolicy) -> Self {
        let resource = CfnResource::new(
            logical_id,
            json!({
                "Type": "AWS::ECR::Repository",
                "Properties": {
                    "RepositoryName": name,
                    "EmptyOnDelete": removal_policy == RemovalPolicy::Destroy
                }
            }),
        )
        .removal_policy(removal_policy);

        EcrRepository {
            handle: RepositoryHandle {
                logical_id: logical_id.to_string(),
                name: name.to_string(),
            },
            resources: vec![resource],
        }
    }

    pub fn into_parts(self) -> (RepositoryHandle, Vec<CfnResource>) {
        (self.handle, self.resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destroy_empties_the_repository() {
        let (_, resources) =
            EcrRepository::new("DbtImage", "dbt-image", RemovalPolicy::Destroy).into_parts();
        assert_eq!(resources[0].resource["Properties"]["EmptyOnDelete"], true);
        assert_eq!(resources[0].removal_policy, Some(RemovalPolicy::Destroy));
    }

    #[test]
    fn retain_keeps_images() {
        let (_, resources) =
            EcrRepository::new("DbtImage", "dbt-image", RemovalPolicy::Retain).into_parts();
        assert_eq!(resources[0].resource["Properties"]["EmptyOnDelete"], false);
    }

    #[test]
    fn image_uri_resolves_from_the_repository() {
        let (handle, _) =
            EcrRepository::new("DbtImage", "dbt-image", RemovalPolicy::Destroy).into_parts();

        assert_eq!(
            handle.image_uri("latest"),
            json!({ "Fn::Sub": "${DbtImage.RepositoryUri}:latest" })
        );
    }
}
