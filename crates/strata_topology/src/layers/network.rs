//! Network layer: address space, subnet tiers and security groups.

use strata_config::{Ipv4Cidr, NetworkConfig};
use tracing::{info, warn};

use super::{name_tags, LayerContext};
use crate::error::{TopologyError, TopologyResult};
use crate::resource::{Layer, Properties, Property, ResourceKind, ResourceNode, ResourceRef};
use crate::security::{Peer, SecurityBoundaryGraph, SecurityGroupKind, ServicePorts};
use crate::substrate::Substrate;

/// Availability zones per subnet tier.
pub const ZONES: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubnetKind {
    /// Routed to the internet gateway.
    Public,
    /// Egress through NAT.
    Private,
    /// No route outside the VPC.
    Isolated,
}

impl SubnetKind {
    pub fn all() -> [SubnetKind; 3] {
        [SubnetKind::Public, SubnetKind::Private, SubnetKind::Isolated]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubnetKind::Public => "public",
            SubnetKind::Private => "private",
            SubnetKind::Isolated => "isolated",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubnetTier {
    pub kind: SubnetKind,
    pub subnets: Vec<ResourceRef>,
    /// One table per subnet, same order as `subnets`.
    pub route_tables: Vec<ResourceRef>,
    pub cidrs: Vec<Ipv4Cidr>,
}

/// Default route of a subnet: the gateway property and the gateway, plus a
/// node the route must wait for.
struct DefaultRoute {
    target: (&'static str, ResourceRef),
    after: Option<ResourceRef>,
}

impl SubnetTier {
    /// List of subnet references.
    pub fn ids(&self) -> Property {
        Property::list(self.subnets.iter().map(ResourceRef::reference))
    }
}

#[derive(Debug, Clone)]
pub struct SecurityGroups {
    pub public: ResourceRef,
    pub private: ResourceRef,
    pub bastion: ResourceRef,
    pub cache: ResourceRef,
    pub file_system: ResourceRef,
    pub isolated: ResourceRef,
}

impl SecurityGroups {
    pub fn get(&self, kind: SecurityGroupKind) -> &ResourceRef {
        match kind {
            SecurityGroupKind::Public => &self.public,
            SecurityGroupKind::Private => &self.private,
            SecurityGroupKind::Bastion => &self.bastion,
            SecurityGroupKind::Cache => &self.cache,
            SecurityGroupKind::FileSystem => &self.file_system,
            SecurityGroupKind::Isolated => &self.isolated,
        }
    }

    /// One-element list holding the group id, as most resources expect.
    pub fn ids(&self, kind: SecurityGroupKind) -> Property {
        Property::list(vec![self.get(kind).attr("GroupId")])
    }
}

#[derive(Debug, Clone)]
pub struct NetworkOutputs {
    pub vpc: ResourceRef,
    pub public: SubnetTier,
    pub private: SubnetTier,
    pub isolated: SubnetTier,
    pub nat_gateways: Vec<ResourceRef>,
    pub security_groups: SecurityGroups,
    pub boundary: SecurityBoundaryGraph,
    pub ports: ServicePorts,
}

pub struct NetworkLayer<'a> {
    config: &'a NetworkConfig,
}

impl<'a> NetworkLayer<'a> {
    pub fn new(config: &'a NetworkConfig) -> Self {
        Self { config }
    }

    pub fn build(
        &self,
        ctx: &LayerContext<'_>,
        substrate: &mut dyn Substrate,
    ) -> TopologyResult<NetworkOutputs> {
        let layer = Layer::Network;
        let cidr = self.config.vpc_cidr()?;
        let mask = self.config.subnet_cidr_mask;

        let vpc_name = ctx.name(layer, "vpc");
        let vpc = substrate.declare(
            ResourceNode::new(ctx.id(layer, "vpc"), ResourceKind::Vpc, layer)
                .named(&vpc_name)
                .prop("CidrBlock", cidr.to_string())
                .prop("EnableDnsHostnames", true)
                .prop("EnableDnsSupport", true)
                .prop("Tags", name_tags(&vpc_name)),
        )?;

        let igw = substrate.declare(
            ResourceNode::new(ctx.id(layer, "igw"), ResourceKind::InternetGateway, layer)
                .prop("Tags", name_tags(&ctx.name(layer, "igw"))),
        )?;
        let attachment = substrate.declare(
            ResourceNode::new(ctx.id(layer, "igw-attachment"), ResourceKind::GatewayAttachment, layer)
                .prop("VpcId", vpc.reference())
                .prop("InternetGatewayId", igw.reference()),
        )?;

        let public = self.subnet_tier(ctx, substrate, &vpc, SubnetKind::Public, cidr, mask, |_| {
            Some(DefaultRoute {
                target: ("GatewayId", igw.clone()),
                after: Some(attachment.clone()),
            })
        })?;

        let mut nat_gateways = Vec::new();
        for i in 0..ctx.profile.nat_gateways {
            let eip = substrate.declare(
                ResourceNode::new(ctx.id(layer, &format!("nat-eip-{}", i + 1)), ResourceKind::ElasticIp, layer)
                    .prop("Domain", "vpc"),
            )?;
            let subnet = &public.subnets[usize::from(i % ZONES)];
            nat_gateways.push(substrate.declare(
                ResourceNode::new(ctx.id(layer, &format!("nat-{}", i + 1)), ResourceKind::NatGateway, layer)
                    .prop("AllocationId", eip.attr("AllocationId"))
                    .prop("SubnetId", subnet.reference())
                    .prop("Tags", name_tags(&ctx.name(layer, &format!("nat-{}", i + 1)))),
            )?);
        }

        let private = self.subnet_tier(ctx, substrate, &vpc, SubnetKind::Private, cidr, mask, |az| {
            nat_gateways
                .get(usize::from(az) % nat_gateways.len().max(1))
                .map(|nat| DefaultRoute {
                    target: ("NatGatewayId", nat.clone()),
                    after: None,
                })
        })?;
        let isolated =
            self.subnet_tier(ctx, substrate, &vpc, SubnetKind::Isolated, cidr, mask, |_| None)?;

        let ports = ServicePorts::with_app_port(self.config.app_port);
        let boundary = SecurityBoundaryGraph::standard(ports);
        let violations = boundary.violations();
        if !violations.is_empty() {
            return Err(TopologyError::InvalidSecurityRule(violations.join("; ")));
        }
        let security_groups = self.security_groups(ctx, substrate, &vpc, &boundary)?;

        info!(
            "Network layer: {} with {} subnets and {} NAT gateway(s)",
            cidr,
            public.subnets.len() + private.subnets.len() + isolated.subnets.len(),
            nat_gateways.len()
        );

        Ok(NetworkOutputs {
            vpc,
            public,
            private,
            isolated,
            nat_gateways,
            security_groups,
            boundary,
            ports,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn subnet_tier(
        &self,
        ctx: &LayerContext<'_>,
        substrate: &mut dyn Substrate,
        vpc: &ResourceRef,
        kind: SubnetKind,
        cidr: Ipv4Cidr,
        mask: u8,
        route: impl Fn(u8) -> Option<DefaultRoute>,
    ) -> TopologyResult<SubnetTier> {
        let layer = Layer::Network;
        let tier_index = SubnetKind::all()
            .iter()
            .position(|k| *k == kind)
            .unwrap_or_default() as u64;

        let mut subnets = Vec::new();
        let mut route_tables = Vec::new();
        let mut cidrs = Vec::new();
        for az in 0..ZONES {
            let block = cidr.subnet(mask, tier_index * u64::from(ZONES) + u64::from(az))?;
            let label = format!("{}-subnet-{}", kind.as_str(), az + 1);
            let name = ctx.name(layer, &label);

            let subnet = substrate.declare(
                ResourceNode::new(ctx.id(layer, &label), ResourceKind::Subnet, layer)
                    .named(&name)
                    .prop("VpcId", vpc.reference())
                    .prop("CidrBlock", block.to_string())
                    .prop("AvailabilityZone", Property::AvailabilityZone(az))
                    .prop("MapPublicIpOnLaunch", kind == SubnetKind::Public)
                    .prop("Tags", name_tags(&name)),
            )?;

            let table_label = format!("{label}-routes");
            let table = substrate.declare(
                ResourceNode::new(ctx.id(layer, &table_label), ResourceKind::RouteTable, layer)
                    .prop("VpcId", vpc.reference())
                    .prop("Tags", name_tags(&ctx.name(layer, &table_label))),
            )?;
            substrate.declare(
                ResourceNode::new(
                    ctx.id(layer, &format!("{label}-route-association")),
                    ResourceKind::RouteTableAssociation,
                    layer,
                )
                .prop("RouteTableId", table.reference())
                .prop("SubnetId", subnet.reference()),
            )?;

            if let Some(DefaultRoute { target: (key, gateway), after }) = route(az) {
                let mut node = ResourceNode::new(
                    ctx.id(layer, &format!("{label}-default-route")),
                    ResourceKind::Route,
                    layer,
                )
                .prop("RouteTableId", table.reference())
                .prop("DestinationCidrBlock", "0.0.0.0/0")
                .prop(key, gateway.reference());
                if let Some(after) = &after {
                    node = node.after(after);
                }
                substrate.declare(node)?;
            }

            subnets.push(subnet);
            route_tables.push(table);
            cidrs.push(block);
        }

        Ok(SubnetTier {
            kind,
            subnets,
            route_tables,
            cidrs,
        })
    }

    fn security_groups(
        &self,
        ctx: &LayerContext<'_>,
        substrate: &mut dyn Substrate,
        vpc: &ResourceRef,
        boundary: &SecurityBoundaryGraph,
    ) -> TopologyResult<SecurityGroups> {
        let layer = Layer::Network;
        let mut groups = Vec::new();

        for kind in SecurityGroupKind::all() {
            let label = format!("sg-{}", kind.as_str());
            let name = ctx.name(layer, &label);
            let group = substrate.declare(
                ResourceNode::new(ctx.id(layer, &label), ResourceKind::SecurityGroup, layer)
                    .named(&name)
                    .prop("GroupName", &name)
                    .prop("GroupDescription", kind.description())
                    .prop("VpcId", vpc.reference())
                    .prop(
                        "SecurityGroupEgress",
                        Property::list(vec![Properties::new()
                            .with("CidrIp", "0.0.0.0/0")
                            .with("IpProtocol", "-1")]),
                    ),
            )?;
            groups.push((kind, group));
        }

        let group = |kind: SecurityGroupKind| -> TopologyResult<ResourceRef> {
            groups
                .iter()
                .find(|(k, _)| *k == kind)
                .map(|(_, g)| g.clone())
                .ok_or_else(|| TopologyError::InvalidSecurityRule(format!("missing group {kind}")))
        };

        for rule in boundary.rules() {
            if rule.source == Peer::AnyIpv4 && rule.target == SecurityGroupKind::Bastion {
                warn!(
                    "Bastion accepts SSH on port {} from any address; restrict it with external hardening",
                    rule.port
                );
            }

            let label = format!("ingress-{}-from-{}-{}", rule.target, peer_label(rule.source), rule.port);
            let mut node = ResourceNode::new(ctx.id(layer, &label), ResourceKind::SecurityGroupIngress, layer)
                .prop("GroupId", group(rule.target)?.attr("GroupId"))
                .prop("IpProtocol", "tcp")
                .prop("FromPort", rule.port)
                .prop("ToPort", rule.port)
                .prop("Description", &rule.description);
            node = match rule.source {
                Peer::AnyIpv4 => node.prop("CidrIp", "0.0.0.0/0"),
                Peer::Group(source) => {
                    node.prop("SourceSecurityGroupId", group(source)?.attr("GroupId"))
                }
            };
            substrate.declare(node)?;
        }

        Ok(SecurityGroups {
            public: group(SecurityGroupKind::Public)?,
            private: group(SecurityGroupKind::Private)?,
            bastion: group(SecurityGroupKind::Bastion)?,
            cache: group(SecurityGroupKind::Cache)?,
            file_system: group(SecurityGroupKind::FileSystem)?,
            isolated: group(SecurityGroupKind::Isolated)?,
        })
    }
}

fn peer_label(peer: Peer) -> &'static str {
    match peer {
        Peer::AnyIpv4 => "anywhere",
        Peer::Group(kind) => kind.as_str(),
    }
}
