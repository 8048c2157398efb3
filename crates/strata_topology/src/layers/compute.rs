//! Compute layer: container cluster, web and worker services.
//!
//! Both services are declared through [`ComputeLayer::declare_service`], so
//! they share the network placement and the capacity strategy of the mode
//! profile. The web service runs a proxy and an app container sharing an
//! ephemeral socket volume and is registered with the edge target group. The
//! worker mounts the shared filesystem read-only.

use strata_config::{ComputeConfig, WebServiceConfig, WorkerServiceConfig};
use tracing::info;

use super::{
    assume_role_policy, policy_document, EdgeOutputs, LayerContext, NetworkOutputs,
    RegistryOutputs, StorageOutputs,
};
use crate::error::TopologyResult;
use crate::layers::storage::MountAccess;
use crate::resource::{Layer, Properties, Property, ResourceKind, ResourceNode, ResourceRef};
use crate::security::SecurityGroupKind;
use crate::substrate::Substrate;

const EXECUTION_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy";
const PERSISTENT_VOLUME: &str = "persistent";
const LOG_RETENTION_DAYS: u16 = 30;
const EPHEMERAL_STORAGE_GIB: u16 = 21;
const IMAGE_TAG: &str = "latest";

/// Upstream handles the compute layer wires to.
#[derive(Debug, Clone, Copy)]
pub struct ComputeInputs<'a> {
    pub network: &'a NetworkOutputs,
    pub registry: &'a RegistryOutputs,
    pub storage: &'a StorageOutputs,
    pub edge: &'a EdgeOutputs,
}

#[derive(Debug, Clone)]
pub struct ServiceHandle {
    pub name: String,
    pub service: ResourceRef,
    pub task_definition: ResourceRef,
    pub task_role: ResourceRef,
    pub execution_role: ResourceRef,
    pub log_group: ResourceRef,
    pub containers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ComputeOutputs {
    pub cluster: ResourceRef,
    pub cluster_name: String,
    pub web: ServiceHandle,
    pub worker: ServiceHandle,
}

/// Task-level settings shared by both services.
struct TaskSpec {
    label: &'static str,
    cpu: u32,
    memory_mib: u32,
    desired_count: u32,
    mount: MountAccess,
    volumes: Vec<Property>,
    containers: Vec<Property>,
    container_names: Vec<String>,
    load_balancer: Option<Property>,
}

pub struct ComputeLayer<'a> {
    config: &'a ComputeConfig,
}

impl<'a> ComputeLayer<'a> {
    pub fn new(config: &'a ComputeConfig) -> Self {
        Self { config }
    }

    pub fn build(
        &self,
        ctx: &LayerContext<'_>,
        substrate: &mut dyn Substrate,
        inputs: ComputeInputs<'_>,
    ) -> TopologyResult<ComputeOutputs> {
        let layer = Layer::Compute;
        let cluster_name = ctx.name(layer, "cluster");
        let cluster = substrate.declare(
            ResourceNode::new(ctx.id(layer, "cluster"), ResourceKind::Cluster, layer)
                .named(&cluster_name)
                .prop("ClusterName", &cluster_name)
                .prop(
                    "CapacityProviders",
                    Property::list(
                        ctx.profile
                            .capacity
                            .strategy()
                            .iter()
                            .map(|(provider, _)| provider.as_str()),
                    ),
                ),
        )?;

        let web = self.declare_service(ctx, substrate, &cluster, &inputs, self.web_task(ctx, &inputs))?;
        let worker =
            self.declare_service(ctx, substrate, &cluster, &inputs, self.worker_task(ctx, &inputs))?;

        info!(
            "Compute layer: cluster {} with services {} ({}) and {} ({})",
            cluster_name,
            web.name,
            self.config.web.desired_count,
            worker.name,
            self.config.worker.desired_count
        );

        Ok(ComputeOutputs {
            cluster,
            cluster_name,
            web,
            worker,
        })
    }

    fn web_task(&self, ctx: &LayerContext<'_>, inputs: &ComputeInputs<'_>) -> TaskSpec {
        let web: &WebServiceConfig = &self.config.web;
        let volume = &web.shared_volume;
        let log = log_configuration(ctx, "web");
        let app_port = inputs.network.ports.app;

        let proxy = Properties::new()
            .with("Name", &web.proxy_container_name)
            .with("Image", inputs.registry.proxy.image(IMAGE_TAG))
            .with("Essential", true)
            .with(
                "PortMappings",
                Property::list(vec![Properties::new()
                    .with("Name", &web.port_mapping_name)
                    .with("ContainerPort", app_port)
                    .with("Protocol", "tcp")
                    .with("AppProtocol", "http")]),
            )
            .with("MountPoints", Property::list(vec![mount_point(&volume.name, &volume.proxy_path, false)]))
            .with("LogConfiguration", log.clone());

        let mut app_mounts = vec![mount_point(&volume.name, &volume.app_path, false)];
        let mut volumes = vec![Property::from(Properties::new().with("Name", &volume.name))];
        if let Some(path) = &web.persistent_mount_path {
            app_mounts.push(mount_point(PERSISTENT_VOLUME, path, false));
            volumes.push(inputs.storage.volume(PERSISTENT_VOLUME));
        }

        let app = Properties::new()
            .with("Name", &web.app_container_name)
            .with("Image", inputs.registry.app.image(IMAGE_TAG))
            .with("Essential", true)
            .with("MountPoints", Property::list(app_mounts))
            .with("LogConfiguration", log);

        TaskSpec {
            label: "web",
            cpu: web.cpu,
            memory_mib: web.memory_mib,
            desired_count: web.desired_count,
            mount: MountAccess::ReadWrite,
            volumes,
            containers: vec![proxy.into(), app.into()],
            container_names: vec![web.proxy_container_name.clone(), web.app_container_name.clone()],
            load_balancer: Some(
                Properties::new()
                    .with("ContainerName", &web.proxy_container_name)
                    .with("ContainerPort", app_port)
                    .with("TargetGroupArn", inputs.edge.target_group.arn())
                    .into(),
            ),
        }
    }

    fn worker_task(&self, ctx: &LayerContext<'_>, inputs: &ComputeInputs<'_>) -> TaskSpec {
        let worker: &WorkerServiceConfig = &self.config.worker;
        let container = Properties::new()
            .with("Name", &worker.container_name)
            .with("Image", inputs.registry.worker.image(IMAGE_TAG))
            .with("Essential", true)
            .with("EntryPoint", Property::list(worker.entry_point.iter()))
            .with(
                "Command",
                (!worker.command.is_empty()).then(|| Property::list(worker.command.iter())),
            )
            .with("WorkingDirectory", &worker.working_dir)
            .with(
                "MountPoints",
                Property::list(vec![mount_point(
                    PERSISTENT_VOLUME,
                    &worker.shared_assets_path,
                    MountAccess::ReadOnly.read_only(),
                )]),
            )
            .with("LogConfiguration", log_configuration(ctx, "worker"));

        TaskSpec {
            label: "worker",
            cpu: worker.cpu,
            memory_mib: worker.memory_mib,
            desired_count: worker.desired_count,
            mount: MountAccess::ReadOnly,
            volumes: vec![inputs.storage.volume(PERSISTENT_VOLUME)],
            containers: vec![container.into()],
            container_names: vec![worker.container_name.clone()],
            load_balancer: None,
        }
    }

    /// Declares roles, log group, task definition and service for one task.
    fn declare_service(
        &self,
        ctx: &LayerContext<'_>,
        substrate: &mut dyn Substrate,
        cluster: &ResourceRef,
        inputs: &ComputeInputs<'_>,
        task: TaskSpec,
    ) -> TopologyResult<ServiceHandle> {
        let layer = Layer::Compute;
        let label = task.label;
        let name = ctx.name(layer, label);

        let log_group = substrate.declare(
            ResourceNode::new(ctx.id(layer, &format!("{label}-logs")), ResourceKind::LogGroup, layer)
                .removal(ctx.profile.stateful_removal)
                .prop("LogGroupName", log_group_name(ctx, label))
                .prop("RetentionInDays", LOG_RETENTION_DAYS),
        )?;

        let execution_role = substrate.declare(
            ResourceNode::new(
                ctx.id(layer, &format!("{label}-execution-role")),
                ResourceKind::Role,
                layer,
            )
            .prop("AssumeRolePolicyDocument", assume_role_policy("ecs-tasks.amazonaws.com"))
            .prop("ManagedPolicyArns", Property::list(vec![EXECUTION_POLICY_ARN])),
        )?;

        let task_role = substrate.declare(
            ResourceNode::new(ctx.id(layer, &format!("{label}-task-role")), ResourceKind::Role, layer)
                .prop("AssumeRolePolicyDocument", assume_role_policy("ecs-tasks.amazonaws.com"))
                .prop(
                    "Policies",
                    Property::list(vec![Properties::new()
                        .with("PolicyName", format!("{name}-filesystem"))
                        .with(
                            "PolicyDocument",
                            policy_document(vec![inputs.storage.mount_grant(task.mount)]),
                        )]),
                ),
        )?;

        let task_definition = substrate.declare(
            ResourceNode::new(ctx.id(layer, &format!("{label}-task")), ResourceKind::TaskDefinition, layer)
                .prop("Family", &name)
                .prop("Cpu", task.cpu.to_string())
                .prop("Memory", task.memory_mib.to_string())
                .prop("NetworkMode", "awsvpc")
                .prop(
                    "EphemeralStorage",
                    Properties::new().with("SizeInGiB", EPHEMERAL_STORAGE_GIB),
                )
                .prop("RequiresCompatibilities", Property::list(vec!["FARGATE"]))
                .prop("ExecutionRoleArn", execution_role.attr("Arn"))
                .prop("TaskRoleArn", task_role.attr("Arn"))
                .prop("Volumes", Property::List(task.volumes))
                .prop("ContainerDefinitions", Property::List(task.containers)),
        )?;

        let network = inputs.network;
        let strategy = Property::list(ctx.profile.capacity.strategy().iter().map(|(provider, weight)| {
            Properties::new()
                .with("CapacityProvider", provider.as_str())
                .with("Weight", *weight)
        }));

        let service = substrate.declare(
            ResourceNode::new(ctx.id(layer, &format!("{label}-service")), ResourceKind::Service, layer)
                .named(&name)
                .prop("ServiceName", &name)
                .prop("Cluster", cluster.reference())
                .prop("TaskDefinition", task_definition.reference())
                .prop("DesiredCount", task.desired_count)
                .prop("CapacityProviderStrategy", strategy)
                .prop(
                    "DeploymentConfiguration",
                    Properties::new()
                        .with("MinimumHealthyPercent", 100u8)
                        .with("MaximumPercent", 200u8),
                )
                .prop(
                    "NetworkConfiguration",
                    Properties::new().with(
                        "AwsvpcConfiguration",
                        Properties::new()
                            .with("AssignPublicIp", "DISABLED")
                            .with("Subnets", network.private.ids())
                            .with(
                                "SecurityGroups",
                                network.security_groups.ids(SecurityGroupKind::Private),
                            ),
                    ),
                )
                .prop("LoadBalancers", task.load_balancer.map(|lb| Property::list(vec![lb]))),
        )?;

        Ok(ServiceHandle {
            name,
            service,
            task_definition,
            task_role,
            execution_role,
            log_group,
            containers: task.container_names,
        })
    }
}

fn log_group_name(ctx: &LayerContext<'_>, label: &str) -> String {
    format!("/ecs/{}", ctx.name(Layer::Compute, label))
}

fn log_configuration(ctx: &LayerContext<'_>, label: &str) -> Properties {
    Properties::new().with("LogDriver", "awslogs").with(
        "Options",
        Properties::new()
            .with("awslogs-group", log_group_name(ctx, label))
            .with("awslogs-region", ctx.region)
            .with("awslogs-stream-prefix", label),
    )
}

fn mount_point(volume: &str, path: &str, read_only: bool) -> Property {
    Properties::new()
        .with("SourceVolume", volume)
        .with("ContainerPath", path)
        .with("ReadOnly", read_only)
        .into()
}

#[cfg(test)]
mod tests {
    use crate::resource::{Property, ResourceNode};
    use crate::{SynthesizedTopology, TopologyAssembler};
    use strata_config::{ConfigLoader, DeploymentMode};

    fn synthesize(mode: DeploymentMode) -> SynthesizedTopology {
        let overlay = match mode {
            DeploymentMode::Dev => include_str!("../../../../env/dev.yml"),
            DeploymentMode::Prod => include_str!("../../../../env/prod.yml"),
        };
        let config =
            ConfigLoader::from_documents(include_str!("../../../../env/base.yml"), overlay).unwrap();
        TopologyAssembler::new(&config, mode).assemble().unwrap()
    }

    fn node<'a>(synth: &'a SynthesizedTopology, handle: &crate::ResourceRef) -> &'a ResourceNode {
        synth.topology.get(handle.id()).unwrap()
    }

    fn read_only_flags(container: &Property) -> Vec<(String, bool)> {
        container
            .get("MountPoints")
            .and_then(Property::as_list)
            .unwrap_or_default()
            .iter()
            .map(|m| {
                (
                    m.get("SourceVolume").and_then(Property::as_str).unwrap().to_string(),
                    m.get("ReadOnly").and_then(Property::as_bool).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_tasks_get_ephemeral_storage() {
        let synth = synthesize(DeploymentMode::Dev);
        for service in [&synth.outputs.compute.web, &synth.outputs.compute.worker] {
            let task = node(&synth, &service.task_definition);
            let storage = task.get("EphemeralStorage").unwrap();
            assert_eq!(storage.get("SizeInGiB"), Some(&Property::Int(21)));
        }
    }

    #[test]
    fn test_mount_access_per_service() {
        let synth = synthesize(DeploymentMode::Dev);

        let web = node(&synth, &synth.outputs.compute.web.task_definition);
        let web_containers = web.get("ContainerDefinitions").and_then(Property::as_list).unwrap();
        let app = &web_containers[1];
        assert_eq!(
            read_only_flags(app),
            vec![("gunicorn-socket".to_string(), false), ("persistent".to_string(), false)]
        );

        let worker = node(&synth, &synth.outputs.compute.worker.task_definition);
        let worker_container = &worker.get("ContainerDefinitions").and_then(Property::as_list).unwrap()[0];
        assert_eq!(read_only_flags(worker_container), vec![("persistent".to_string(), true)]);

        let volume = &worker.get("Volumes").and_then(Property::as_list).unwrap()[0];
        let efs = volume.get("EFSVolumeConfiguration").unwrap();
        assert_eq!(efs.get("TransitEncryption").and_then(Property::as_str), Some("ENABLED"));
    }

    #[test]
    fn test_web_service_registers_with_target_group() {
        let synth = synthesize(DeploymentMode::Prod);
        let web = node(&synth, &synth.outputs.compute.web.service);
        let balancers = web.get("LoadBalancers").and_then(Property::as_list).unwrap();
        assert_eq!(balancers.len(), 1);
        assert_eq!(
            balancers[0].get("TargetGroupArn"),
            Some(&Property::Ref(synth.outputs.edge.target_group.arn()))
        );
        assert_eq!(balancers[0].get("ContainerName").and_then(Property::as_str), Some("proxy"));

        let worker = node(&synth, &synth.outputs.compute.worker.service);
        assert!(worker.get("LoadBalancers").is_none());
    }

    #[test]
    fn test_services_have_no_public_ip() {
        for mode in [DeploymentMode::Dev, DeploymentMode::Prod] {
            let synth = synthesize(mode);
            for service in [&synth.outputs.compute.web, &synth.outputs.compute.worker] {
                let awsvpc = node(&synth, &service.service)
                    .get("NetworkConfiguration")
                    .and_then(|n| n.get("AwsvpcConfiguration"))
                    .unwrap();
                assert_eq!(awsvpc.get("AssignPublicIp").and_then(Property::as_str), Some("DISABLED"));
                assert_eq!(awsvpc.get("Subnets"), Some(&synth.outputs.network.private.ids()));
            }
        }
    }
}
