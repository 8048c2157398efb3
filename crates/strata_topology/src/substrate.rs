//! Declaration target for layer builders.

use std::collections::HashMap;

use strata_config::DeploymentMode;
use tracing::debug;

use crate::error::{TopologyError, TopologyResult};
use crate::resource::{Layer, ResourceId, ResourceNode, ResourceRef, StackOutput};

/// Something layer builders can declare resources and outputs on.
#[cfg_attr(test, mockall::automock)]
pub trait Substrate {
    /// Declares a resource and returns a handle to it.
    fn declare(&mut self, node: ResourceNode) -> TopologyResult<ResourceRef>;

    /// Publishes a named stack output.
    fn output(&mut self, output: StackOutput) -> TopologyResult<()>;
}

/// In-memory resource graph for one deployment mode.
///
/// Nodes keep their declaration order. Every reference is checked on
/// declaration: the target must exist and belong to the same layer or to one
/// of the declaring layer's dependencies.
#[derive(Debug, Clone)]
pub struct Topology {
    mode: DeploymentMode,
    nodes: Vec<ResourceNode>,
    index: HashMap<ResourceId, usize>,
    outputs: Vec<StackOutput>,
}

impl Topology {
    pub fn new(mode: DeploymentMode) -> Self {
        Self {
            mode,
            nodes: Vec::new(),
            index: HashMap::new(),
            outputs: Vec::new(),
        }
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    pub fn get(&self, id: &ResourceId) -> Option<&ResourceNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn layer_nodes(&self, layer: Layer) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.iter().filter(move |n| n.layer == layer)
    }

    pub fn outputs(&self) -> &[StackOutput] {
        &self.outputs
    }

    pub fn output_value(&self, key: &str) -> Option<&StackOutput> {
        self.outputs.iter().find(|o| o.key == key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn check_reference(&self, from: &str, from_layer: Layer, to: &ResourceId) -> TopologyResult<()> {
        let target = self
            .get(to)
            .ok_or_else(|| TopologyError::DanglingReference {
                from: from.to_string(),
                to: to.clone(),
            })?;

        if !from_layer.may_reference(target.layer) {
            return Err(TopologyError::LayerViolation {
                from: from.to_string(),
                from_layer,
                to: to.clone(),
                to_layer: target.layer,
            });
        }
        Ok(())
    }
}

impl Substrate for Topology {
    fn declare(&mut self, node: ResourceNode) -> TopologyResult<ResourceRef> {
        if self.index.contains_key(&node.id) {
            return Err(TopologyError::DuplicateResource(node.id));
        }
        for target in node.references() {
            self.check_reference(node.id.as_str(), node.layer, target)?;
        }

        debug!("Declared {} ({}) in {} layer", node.id, node.kind, node.layer);
        let handle = ResourceRef::new(node.id.clone(), node.kind, node.layer);
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(handle)
    }

    fn output(&mut self, output: StackOutput) -> TopologyResult<()> {
        if self.outputs.iter().any(|o| o.key == output.key) {
            return Err(TopologyError::DuplicateOutput(output.key));
        }
        for target in output.value.referenced_ids() {
            self.check_reference(&output.key, output.layer, target)?;
        }
        self.outputs.push(output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Reference, ResourceKind};

    fn vpc() -> ResourceNode {
        ResourceNode::new(ResourceId::new("Vpc"), ResourceKind::Vpc, Layer::Network)
    }

    #[test]
    fn test_declare_keeps_order() {
        let mut topology = Topology::new(DeploymentMode::Dev);
        let vpc = topology.declare(vpc()).unwrap();
        topology
            .declare(
                ResourceNode::new(ResourceId::new("Subnet"), ResourceKind::Subnet, Layer::Network)
                    .prop("VpcId", vpc.reference()),
            )
            .unwrap();

        let ids: Vec<_> = topology.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["Vpc", "Subnet"]);
        assert_eq!(vpc.kind(), ResourceKind::Vpc);
    }

    #[test]
    fn test_duplicate_resource_rejected() {
        let mut topology = Topology::new(DeploymentMode::Dev);
        topology.declare(vpc()).unwrap();
        let err = topology.declare(vpc()).unwrap_err();
        assert!(matches!(err, TopologyError::DuplicateResource(_)));
    }

    #[test]
    fn test_dangling_reference_rejected() {
        let mut topology = Topology::new(DeploymentMode::Dev);
        let node = ResourceNode::new(ResourceId::new("Subnet"), ResourceKind::Subnet, Layer::Network)
            .prop("VpcId", Reference::to(ResourceId::new("Missing")));
        let err = topology.declare(node).unwrap_err();
        assert!(matches!(err, TopologyError::DanglingReference { .. }));
    }

    #[test]
    fn test_dangling_dependency_rejected() {
        let mut topology = Topology::new(DeploymentMode::Dev);
        let missing = ResourceRef::new(ResourceId::new("Attachment"), ResourceKind::GatewayAttachment, Layer::Network);
        let node = ResourceNode::new(ResourceId::new("Route"), ResourceKind::Route, Layer::Network)
            .after(&missing);
        let err = topology.declare(node).unwrap_err();
        assert!(matches!(err, TopologyError::DanglingReference { to, .. } if to.as_str() == "Attachment"));
    }

    #[test]
    fn test_reference_outside_dependencies_rejected() {
        let mut topology = Topology::new(DeploymentMode::Dev);
        let secret = topology
            .declare(ResourceNode::new(
                ResourceId::new("Secret"),
                ResourceKind::Secret,
                Layer::Secrets,
            ))
            .unwrap();
        let node = ResourceNode::new(ResourceId::new("Svc"), ResourceKind::Service, Layer::Compute)
            .prop("Secret", secret.reference());
        let err = topology.declare(node).unwrap_err();
        assert!(matches!(
            err,
            TopologyError::LayerViolation {
                to_layer: Layer::Secrets,
                ..
            }
        ));
    }

    #[test]
    fn test_outputs_checked() {
        let mut topology = Topology::new(DeploymentMode::Prod);
        let vpc = topology.declare(vpc()).unwrap();
        topology
            .output(StackOutput::new("vpcId", Layer::Network, vpc.reference(), "VPC"))
            .unwrap();
        let err = topology
            .output(StackOutput::new("vpcId", Layer::Network, "x", "again"))
            .unwrap_err();
        assert!(matches!(err, TopologyError::DuplicateOutput(_)));
        assert_eq!(topology.output_value("vpcId").unwrap().description, "VPC");
    }
}
