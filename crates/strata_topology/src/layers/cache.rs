//! Cache layer.

use strata_config::CacheConfig;
use tracing::info;

use super::{LayerContext, NetworkOutputs};
use crate::error::TopologyResult;
use crate::resource::{Layer, Property, Reference, ResourceKind, ResourceNode, ResourceRef};
use crate::security::SecurityGroupKind;
use crate::substrate::Substrate;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEndpoint {
    pub host: Reference,
    pub port: u16,
}

impl CacheEndpoint {
    pub fn port_value(&self) -> Property {
        Property::from(self.port.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CacheOutputs {
    pub cluster: ResourceRef,
    pub endpoint: CacheEndpoint,
}

pub struct CacheLayer<'a> {
    config: &'a CacheConfig,
}

impl<'a> CacheLayer<'a> {
    pub fn new(config: &'a CacheConfig) -> Self {
        Self { config }
    }

    pub fn build(
        &self,
        ctx: &LayerContext<'_>,
        substrate: &mut dyn Substrate,
        network: &NetworkOutputs,
    ) -> TopologyResult<CacheOutputs> {
        let layer = Layer::Cache;
        let shape = ctx.profile.cache;

        let subnet_group_name = ctx.name(layer, "subnet-group");
        let subnet_group = substrate.declare(
            ResourceNode::new(ctx.id(layer, "subnet-group"), ResourceKind::CacheSubnetGroup, layer)
                .named(&subnet_group_name)
                .prop("CacheSubnetGroupName", &subnet_group_name)
                .prop("Description", "Private subnets for the cache")
                .prop("SubnetIds", network.private.ids()),
        )?;

        let name = ctx.name(layer, "memcached");
        let cluster = substrate.declare(
            ResourceNode::new(ctx.id(layer, "memcached"), ResourceKind::CacheCluster, layer)
                .named(&name)
                .prop("ClusterName", &name)
                .prop("Engine", "memcached")
                .prop("EngineVersion", &self.config.engine_version)
                .prop("CacheNodeType", shape.node_type)
                .prop("NumCacheNodes", shape.nodes)
                .prop("AZMode", if shape.nodes > 1 { "cross-az" } else { "single-az" })
                .prop("Port", network.ports.cache)
                .prop("CacheSubnetGroupName", subnet_group.reference())
                .prop(
                    "VpcSecurityGroupIds",
                    network.security_groups.ids(SecurityGroupKind::Cache),
                ),
        )?;

        info!(
            "Cache layer: memcached {} x {}",
            shape.nodes, shape.node_type
        );

        Ok(CacheOutputs {
            endpoint: CacheEndpoint {
                host: cluster.attr("ConfigurationEndpoint.Address"),
                port: network.ports.cache,
            },
            cluster,
        })
    }
}
