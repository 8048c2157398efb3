//! Edge layer: public load balancer, listener and target group.

use strata_config::EdgeConfig;
use tracing::info;

use super::{LayerContext, NetworkOutputs};
use crate::error::{TopologyError, TopologyResult};
use crate::resource::{Layer, Properties, Property, Reference, ResourceKind, ResourceNode, ResourceRef, StackOutput};
use crate::security::{SecurityGroupKind, HTTP_PORT};
use crate::substrate::Substrate;

/// Provider limit on load balancer and target group names.
const MAX_NAME_LEN: usize = 32;

/// Target group services register with.
#[derive(Debug, Clone)]
pub struct TargetGroupHandle {
    pub target_group: ResourceRef,
    pub port: u16,
}

impl TargetGroupHandle {
    pub fn arn(&self) -> Reference {
        self.target_group.reference()
    }
}

#[derive(Debug, Clone)]
pub struct EdgeOutputs {
    pub load_balancer: ResourceRef,
    pub listener: ResourceRef,
    pub target_group: TargetGroupHandle,
}

pub struct EdgeLayer<'a> {
    config: &'a EdgeConfig,
}

impl<'a> EdgeLayer<'a> {
    pub fn new(config: &'a EdgeConfig) -> Self {
        Self { config }
    }

    pub fn build(
        &self,
        ctx: &LayerContext<'_>,
        substrate: &mut dyn Substrate,
        network: &NetworkOutputs,
    ) -> TopologyResult<EdgeOutputs> {
        let layer = Layer::Edge;
        let lb_name = short_name(ctx.name(layer, "lb"))?;
        let tg_name = short_name(ctx.name(layer, "tg"))?;

        let load_balancer = substrate.declare(
            ResourceNode::new(ctx.id(layer, "lb"), ResourceKind::LoadBalancer, layer)
                .named(&lb_name)
                .prop("Name", &lb_name)
                .prop("Type", "application")
                .prop("Scheme", "internet-facing")
                .prop("Subnets", network.public.ids())
                .prop(
                    "SecurityGroups",
                    network.security_groups.ids(SecurityGroupKind::Public),
                ),
        )?;

        let target_group = substrate.declare(
            ResourceNode::new(ctx.id(layer, "tg"), ResourceKind::TargetGroup, layer)
                .named(&tg_name)
                .prop("Name", &tg_name)
                .prop("TargetType", "ip")
                .prop("Protocol", "HTTP")
                .prop("Port", network.ports.app)
                .prop("VpcId", network.vpc.reference())
                .prop("HealthCheckProtocol", "HTTP")
                .prop("HealthCheckPath", &self.config.health_check_path),
        )?;

        let listener = substrate.declare(
            ResourceNode::new(ctx.id(layer, "listener"), ResourceKind::Listener, layer)
                .prop("LoadBalancerArn", load_balancer.reference())
                .prop("Protocol", "HTTP")
                .prop("Port", HTTP_PORT)
                .prop(
                    "DefaultActions",
                    Property::list(vec![Properties::new()
                        .with("Type", "forward")
                        .with("TargetGroupArn", target_group.reference())]),
                ),
        )?;

        substrate.output(StackOutput::new(
            "loadBalancerDns",
            layer,
            load_balancer.attr("DNSName"),
            "Public DNS name of the load balancer",
        ))?;

        info!("Edge layer: load balancer {} -> port {}", lb_name, network.ports.app);

        Ok(EdgeOutputs {
            load_balancer,
            listener,
            target_group: TargetGroupHandle {
                target_group,
                port: network.ports.app,
            },
        })
    }
}

fn short_name(name: String) -> TopologyResult<String> {
    if name.len() > MAX_NAME_LEN {
        return Err(TopologyError::InvalidName {
            message: format!("must be at most {MAX_NAME_LEN} characters"),
            name,
        });
    }
    Ok(name)
}
