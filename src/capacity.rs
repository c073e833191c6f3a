//! Expected worker capacity per cluster
//!
//! Node groups are provisioned as CloudFormation stacks. Each stack's
//! template body declares the group's `DesiredCapacity` and a `Name` tag
//! of the form `<cluster>-worker...`. Summing desired capacity per cluster
//! gives the node count the readiness checks expect.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Identifier prefix of resources provisioned through CloudFormation
pub const NODE_GROUP_ID_PREFIX: &str = "arn:aws:cloudformation";

/// Output field holding the serialized template
pub const TEMPLATE_BODY_OUTPUT: &str = "templateBody";

/// Tag key carrying the node group's name
pub const NAME_TAG: &str = "Name";

/// Separator between the cluster name and the rest of a node group name
pub const WORKER_DELIMITER: &str = "-worker";

/// One entry of the provisioning tool's resource graph
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct InfrastructureResource {
    #[serde(default)]
    pub urn: Option<String>,
    /// Provider identifier (an ARN for AWS resources)
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub outputs: serde_json::Map<String, serde_json::Value>,
}

impl InfrastructureResource {
    pub fn id_has_prefix(&self, prefix: &str) -> bool {
        self.id.as_deref().is_some_and(|id| id.starts_with(prefix))
    }
}

/// Tag on a node group
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// Node group declaration decoded from a template body
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeGroupTemplate {
    pub desired_capacity: u32,
    pub tags: Vec<Tag>,
}

impl NodeGroupTemplate {
    /// Decode the `Resources.NodeGroup.Properties` section of a template body
    ///
    /// Missing sections decode as zero capacity and no tags.
    pub fn from_template_body(body: &str) -> Result<Self> {
        let raw: RawTemplate = serde_yaml::from_str(body)
            .map_err(|e| Error::TemplateDecode(e.to_string()))?;
        let properties = raw.resources.node_group.properties;

        let desired_capacity = u32::try_from(properties.desired_capacity).map_err(|_| {
            Error::TemplateDecode(format!(
                "DesiredCapacity must be a non-negative integer, got {}",
                properties.desired_capacity
            ))
        })?;

        let tags = properties
            .tags
            .into_iter()
            .filter_map(|tag| {
                let key = scalar_string(tag.get("Key")?)?;
                let value = tag.get("Value").and_then(scalar_string).unwrap_or_default();
                Some(Tag { key, value })
            })
            .collect();

        Ok(Self {
            desired_capacity,
            tags,
        })
    }

    /// Value of the last tag with the given key
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .rev()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawTemplate {
    #[serde(rename = "Resources")]
    resources: RawResources,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawResources {
    #[serde(rename = "NodeGroup")]
    node_group: RawNodeGroup,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawNodeGroup {
    #[serde(rename = "Properties")]
    properties: RawProperties,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawProperties {
    #[serde(rename = "DesiredCapacity")]
    desired_capacity: i64,
    #[serde(rename = "Tags")]
    tags: Vec<BTreeMap<String, serde_yaml::Value>>,
}

fn scalar_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Maps a node group to the cluster it belongs to
pub trait ClusterNameStrategy {
    fn cluster_name(&self, template: &NodeGroupTemplate) -> String;
}

/// Cluster name is the `Name` tag up to the first `-worker`
///
/// Without a `Name` tag the cluster name is empty.
#[derive(Clone, Debug)]
pub struct WorkerTagStrategy {
    pub tag_key: String,
    pub delimiter: String,
}

impl Default for WorkerTagStrategy {
    fn default() -> Self {
        Self {
            tag_key: NAME_TAG.to_string(),
            delimiter: WORKER_DELIMITER.to_string(),
        }
    }
}

impl ClusterNameStrategy for WorkerTagStrategy {
    fn cluster_name(&self, template: &NodeGroupTemplate) -> String {
        let tag = template.tag(&self.tag_key).unwrap_or_default();
        match tag.split_once(self.delimiter.as_str()) {
            Some((cluster, _)) => cluster.to_string(),
            None => tag.to_string(),
        }
    }
}

/// Aggregated desired worker count per cluster
///
/// A cluster missing from the map has no expectation, which is not the same
/// as expecting zero nodes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExpectedCapacityMap(BTreeMap<String, u32>);

impl ExpectedCapacityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add capacity to a cluster's total
    pub fn add(&mut self, cluster: impl Into<String>, capacity: u32) {
        let total = self.0.entry(cluster.into()).or_insert(0);
        *total = total.saturating_add(capacity);
    }

    pub fn get(&self, cluster: &str) -> Option<u32> {
        self.0.get(cluster).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(name, count)| (name.as_str(), *count))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for ExpectedCapacityMap {
    fn from_iter<T: IntoIterator<Item = (S, u32)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (cluster, capacity) in iter {
            map.add(cluster, capacity);
        }
        map
    }
}

/// Expected capacity using the CloudFormation prefix and `-worker` naming
pub fn extract(resources: &[InfrastructureResource]) -> Result<ExpectedCapacityMap> {
    let strategy = WorkerTagStrategy::default();
    extract_with(resources, NODE_GROUP_ID_PREFIX, &strategy)
}

/// Expected capacity for resources whose id starts with `prefix`
pub fn extract_with<S>(
    resources: &[InfrastructureResource],
    prefix: &str,
    strategy: &S,
) -> Result<ExpectedCapacityMap>
where
    S: ClusterNameStrategy + ?Sized,
{
    let mut expected = ExpectedCapacityMap::new();

    for resource in resources.iter().filter(|r| r.id_has_prefix(prefix)) {
        let id = resource.id.as_deref().unwrap_or_default();
        let body = resource
            .outputs
            .get(TEMPLATE_BODY_OUTPUT)
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                Error::TemplateDecode(format!(
                    "resource {} has no string {:?} output",
                    id, TEMPLATE_BODY_OUTPUT
                ))
            })?;

        let template = NodeGroupTemplate::from_template_body(body)
            .map_err(|e| Error::TemplateDecode(format!("resource {}: {}", id, e)))?;
        let cluster = strategy.cluster_name(&template);

        debug!(
            resource = %id,
            cluster = %cluster,
            desired_capacity = template.desired_capacity,
            "Found node group"
        );
        expected.add(cluster, template.desired_capacity);
    }

    Ok(expected)
}

/// Parse a provisioning-state document into its resources
///
/// Accepts a bare array of resources, or an object holding them under
/// `resources` or `deployment.resources` (a stack export).
pub fn load_resources(text: &str) -> Result<Vec<InfrastructureResource>> {
    let mut document: serde_json::Value = serde_json::from_str(text)?;

    let resources = if document.is_array() {
        document
    } else if let Some(resources) = document.get_mut("resources") {
        resources.take()
    } else if let Some(resources) = document
        .get_mut("deployment")
        .and_then(|d| d.get_mut("resources"))
    {
        resources.take()
    } else {
        return Err(Error::TemplateDecode("provisioning state has no resources".to_string()));
    };

    Ok(serde_json::from_value(resources)?)
}
