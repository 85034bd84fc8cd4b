use crate::graph::DependencyGraph;
use crate::RemovalPolicy;
use serde_json::{json, Value};

/// One declared resource group in the deployment plan
#[derive(Clone, Debug)]
pub struct CfnResource {
    pub name: String,
    pub resource: Value,

    /// Explicit dependency edges on other logical names, on top of the
    /// edges implied by references inside the resource body
    pub depends_on: Vec<String>,

    pub removal_policy: Option<RemovalPolicy>,
}

impl CfnResource {
    pub fn new(name: &str, resource: Value) -> Self {
        CfnResource {
            name: name.to_string(),
            resource,
            depends_on: Vec::new(),
            removal_policy: None,
        }
    }

    pub fn depends_on(mut self, dependency: &str) -> Self {
        self.depends_on.push(dependency.to_string());
        self
    }

    pub fn removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = Some(policy);
        self
    }
}

/// The synthesized deployment plan: a CFN template plus its dependency edges
///
/// Purely declarative. Composition performs no I/O; the rendered template
/// is handed to CloudFormation, which applies it.
#[derive(Debug, Default)]
pub struct Template {
    resources: Vec<CfnResource>,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource to the plan
    ///
    /// Logical names are unique within the template; a duplicate is a fatal
    /// naming collision, not a merge.
    pub fn add_resource(&mut self, resource: CfnResource) -> eyre::Result<()> {
        if self.resources.iter().any(|r| r.name == resource.name) {
            eyre::bail!("Duplicate logical resource name {:?}", resource.name);
        }

        self.resources.push(resource);
        Ok(())
    }

    pub fn add_resources(&mut self, resources: Vec<CfnResource>) -> eyre::Result<()> {
        for resource in resources {
            self.add_resource(resource)?;
        }

        Ok(())
    }

    pub fn resources(&self) -> &[CfnResource] {
        &self.resources
    }

    pub fn get(&self, name: &str) -> Option<&CfnResource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Logical names referenced by a resource body via Ref, Fn::GetAtt or
    /// Fn::Sub, pseudo parameters excluded
    fn references(value: &Value, found: &mut Vec<String>) {
        match value {
            Value::Object(map) => {
                for (key, inner) in map {
                    match (key.as_str(), inner) {
                        ("Ref", Value::String(name)) => {
                            if !name.starts_with("AWS::") {
                                found.push(name.clone());
                            }
                        }

                        ("Fn::GetAtt", Value::Array(parts)) => {
                            if let Some(name) = parts.first().and_then(Value::as_str) {
                                found.push(name.to_string());
                            }
                        }

                        ("Fn::Sub", sub) => {
                            let body = match sub {
                                Value::String(body) => Some(body.as_str()),
                                Value::Array(parts) => parts.first().and_then(Value::as_str),
                                _ => None,
                            };

                            if let Some(body) = body {
                                Self::sub_references(body, found);
                            }
                        }

                        _ => Self::references(inner, found),
                    }
                }
            }

            Value::Array(items) => {
                for item in items {
                    Self::references(item, found);
                }
            }

            _ => {}
        }
    }

    /// Names interpolated into an Fn::Sub body, e.g. ${Bucket.Arn}
    fn sub_references(body: &str, found: &mut Vec<String>) {
        // ${!Literal} is an escape, ${AWS::*} a pseudo parameter
        let variable =
            regex::Regex::new(r"\$\{([A-Za-z0-9:]+)(?:\.[A-Za-z0-9]+)?\}").expect("static pattern");

        for capture in variable.captures_iter(body) {
            let name = &capture[1];

            if !name.starts_with("AWS::") {
                found.push(name.to_string());
            }
        }
    }

    /// Topological construction order over all resources
    ///
    /// Explicit depends_on edges and scanned references both count. A
    /// reference to a name the template does not define, or a cycle, aborts
    /// composition with no partial plan.
    pub fn dependency_order(&self) -> eyre::Result<Vec<String>> {
        let mut graph = DependencyGraph::new();

        for resource in &self.resources {
            graph.add_resource(&resource.name);
        }

        for resource in &self.resources {
            for dependency in &resource.depends_on {
                graph.add_edge(&resource.name, dependency)?;
            }

            let mut referenced = Vec::new();
            Self::references(&resource.resource, &mut referenced);

            for dependency in referenced {
                graph.add_edge(&resource.name, &dependency)?;
            }
        }

        graph.order()
    }

    /// Render the final CloudFormation template body
    pub fn render(&self) -> Value {
        let mut resources = serde_json::Map::new();

        for resource in &self.resources {
            let mut body = resource.resource.clone();

            if let Some(object) = body.as_object_mut() {
                if !resource.depends_on.is_empty() {
                    object.insert("DependsOn".into(), json!(resource.depends_on));
                }

                if let Some(policy) = resource.removal_policy {
                    object.insert("DeletionPolicy".into(), json!(policy.deletion_policy()));
                }
            }

            resources.insert(resource.name.clone(), body);
        }

        json!({ "Resources": resources })
    }
}
