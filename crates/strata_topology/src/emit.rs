//! Template emission.
//!
//! Renders a [`Topology`] as a provider template document. Resources keep
//! declaration order and property keys are sorted, so the same topology
//! always renders to the same bytes.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::error::TopologyResult;
use crate::resource::{Layer, ResourceNode, StackOutput};
use crate::substrate::Topology;

const FORMAT_VERSION: &str = "2010-09-09";

/// Serializable view of a topology.
pub struct Template<'a> {
    topology: &'a Topology,
    description: String,
}

impl<'a> Template<'a> {
    pub fn new(topology: &'a Topology, project: &str) -> Self {
        Self {
            topology,
            description: format!("{project} topology ({} mode)", topology.mode()),
        }
    }

    pub fn to_json(&self) -> TopologyResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_value(&self) -> TopologyResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl Serialize for Template<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(5))?;
        map.serialize_entry("AWSTemplateFormatVersion", FORMAT_VERSION)?;
        map.serialize_entry("Description", &self.description)?;
        map.serialize_entry("Metadata", &Metadata(self.topology))?;
        map.serialize_entry("Resources", &Resources(self.topology.nodes()))?;
        map.serialize_entry("Outputs", &Outputs(self.topology.outputs()))?;
        map.end()
    }
}

struct Metadata<'a>(&'a Topology);

impl Serialize for Metadata<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let layers: Vec<&str> = Layer::build_order().iter().map(Layer::as_str).collect();
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("strata:mode", self.0.mode().as_str())?;
        map.serialize_entry("strata:layers", &layers)?;
        map.end()
    }
}

struct Resources<'a>(&'a [ResourceNode]);

impl Serialize for Resources<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for node in self.0 {
            map.serialize_entry(&node.id, &Resource(node))?;
        }
        map.end()
    }
}

struct Resource<'a>(&'a ResourceNode);

impl Serialize for Resource<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let node = self.0;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("Type", node.kind.type_name())?;
        if let Some(policy) = node.removal {
            map.serialize_entry("DeletionPolicy", policy.as_str())?;
            map.serialize_entry("UpdateReplacePolicy", policy.as_str())?;
        }
        if !node.depends_on.is_empty() {
            map.serialize_entry("DependsOn", &node.depends_on)?;
        }
        map.serialize_entry("Metadata", &ResourceMetadata(node))?;
        if !node.properties.is_empty() {
            map.serialize_entry("Properties", &node.properties)?;
        }
        map.end()
    }
}

struct ResourceMetadata<'a>(&'a ResourceNode);

impl Serialize for ResourceMetadata<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("strata:layer", &self.0.layer)?;
        if let Some(name) = &self.0.name {
            map.serialize_entry("strata:name", name)?;
        }
        map.end()
    }
}

struct Outputs<'a>(&'a [StackOutput]);

impl Serialize for Outputs<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for output in self.0 {
            map.serialize_entry(&output.key, &Output(output))?;
        }
        map.end()
    }
}

struct Output<'a>(&'a StackOutput);

impl Serialize for Output<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("Description", &self.0.description)?;
        map.serialize_entry("Value", &self.0.value)?;
        map.end()
    }
}
