pub mod config;
pub mod credentials;
pub mod graph;
pub mod stack;
pub mod template;

/// Whether a resource and its data survive stack teardown
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize)]
pub enum RemovalPolicy {
    #[serde(rename = "RETAIN")]
    Retain,

    #[serde(rename = "DESTROY")]
    Destroy,
}

impl RemovalPolicy {
    /// The CloudFormation DeletionPolicy attribute value
    pub fn deletion_policy(&self) -> &'static str {
        match self {
            RemovalPolicy::Retain => "Retain",
            RemovalPolicy::Destroy => "Delete",
        }
    }
}
