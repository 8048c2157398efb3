//! Storage layer: shared filesystem, mount targets and access point.

use strata_config::StorageConfig;
use tracing::info;

use super::{name_tags, LayerContext, NetworkOutputs};
use crate::error::TopologyResult;
use crate::resource::{Layer, Properties, Property, ResourceKind, ResourceNode, ResourceRef};
use crate::security::SecurityGroupKind;
use crate::substrate::Substrate;

const POSIX_ID: &str = "1000";

/// Access a consumer gets to the shared filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountAccess {
    ReadWrite,
    ReadOnly,
}

impl MountAccess {
    pub fn actions(&self) -> Vec<&'static str> {
        match self {
            MountAccess::ReadWrite => vec![
                "elasticfilesystem:ClientMount",
                "elasticfilesystem:ClientWrite",
            ],
            MountAccess::ReadOnly => vec!["elasticfilesystem:ClientMount"],
        }
    }

    pub fn read_only(&self) -> bool {
        matches!(self, MountAccess::ReadOnly)
    }
}

#[derive(Debug, Clone)]
pub struct StorageOutputs {
    pub file_system: ResourceRef,
    pub access_point: ResourceRef,
    pub mount_targets: Vec<ResourceRef>,
}

impl StorageOutputs {
    /// Policy statement granting mount access through the access point only.
    pub fn mount_grant(&self, access: MountAccess) -> Property {
        Properties::new()
            .with("Effect", "Allow")
            .with("Action", Property::list(access.actions()))
            .with("Resource", self.file_system.attr("Arn"))
            .with(
                "Condition",
                Properties::new().with(
                    "StringEquals",
                    Properties::new()
                        .with("elasticfilesystem:AccessPointArn", self.access_point.attr("Arn")),
                ),
            )
            .into()
    }

    /// Task volume definition mounting the filesystem through the access point.
    pub fn volume(&self, name: &str) -> Property {
        Properties::new()
            .with("Name", name)
            .with(
                "EFSVolumeConfiguration",
                Properties::new()
                    .with("FilesystemId", self.file_system.reference())
                    .with("TransitEncryption", "ENABLED")
                    .with(
                        "AuthorizationConfig",
                        Properties::new()
                            .with("AccessPointId", self.access_point.reference())
                            .with("IAM", "ENABLED"),
                    ),
            )
            .into()
    }
}

pub struct StorageLayer<'a> {
    config: &'a StorageConfig,
}

impl<'a> StorageLayer<'a> {
    pub fn new(config: &'a StorageConfig) -> Self {
        Self { config }
    }

    pub fn build(
        &self,
        ctx: &LayerContext<'_>,
        substrate: &mut dyn Substrate,
        network: &NetworkOutputs,
    ) -> TopologyResult<StorageOutputs> {
        let layer = Layer::Storage;
        let name = ctx.name(layer, "fs");

        let insecure_transport = Properties::new()
            .with("Effect", "Deny")
            .with("Principal", Properties::new().with("AWS", "*"))
            .with("Action", "*")
            .with(
                "Condition",
                Properties::new().with(
                    "Bool",
                    Properties::new().with("aws:SecureTransport", "false"),
                ),
            );

        let file_system = substrate.declare(
            ResourceNode::new(ctx.id(layer, "fs"), ResourceKind::FileSystem, layer)
                .named(&name)
                .removal(ctx.profile.stateful_removal)
                .prop("Encrypted", true)
                .prop("PerformanceMode", "generalPurpose")
                .prop("ThroughputMode", "bursting")
                .prop(
                    "LifecyclePolicies",
                    Property::list(vec![
                        Properties::new().with("TransitionToIA", "AFTER_1_DAY"),
                        Properties::new()
                            .with("TransitionToPrimaryStorageClass", "AFTER_1_ACCESS"),
                    ]),
                )
                .prop("BackupPolicy", Properties::new().with("Status", "DISABLED"))
                .prop(
                    "FileSystemPolicy",
                    Properties::new()
                        .with("Version", "2012-10-17")
                        .with("Statement", Property::list(vec![insecure_transport])),
                )
                .prop("FileSystemTags", name_tags(&name)),
        )?;

        let mut mount_targets = Vec::new();
        for (i, subnet) in network.private.subnets.iter().enumerate() {
            mount_targets.push(substrate.declare(
                ResourceNode::new(
                    ctx.id(layer, &format!("mount-target-{}", i + 1)),
                    ResourceKind::MountTarget,
                    layer,
                )
                .prop("FileSystemId", file_system.reference())
                .prop("SubnetId", subnet.reference())
                .prop(
                    "SecurityGroups",
                    network.security_groups.ids(SecurityGroupKind::FileSystem),
                ),
            )?);
        }

        let access_point = substrate.declare(
            ResourceNode::new(ctx.id(layer, "access-point"), ResourceKind::AccessPoint, layer)
                .prop("FileSystemId", file_system.reference())
                .prop(
                    "PosixUser",
                    Properties::new().with("Uid", POSIX_ID).with("Gid", POSIX_ID),
                )
                .prop(
                    "RootDirectory",
                    Properties::new()
                        .with("Path", &self.config.access_point.path)
                        .with(
                            "CreationInfo",
                            Properties::new()
                                .with("OwnerUid", POSIX_ID)
                                .with("OwnerGid", POSIX_ID)
                                .with("Permissions", "755"),
                        ),
                ),
        )?;

        info!(
            "Storage layer: filesystem with {} mount target(s), access point {}",
            mount_targets.len(),
            self.config.access_point.path
        );

        Ok(StorageOutputs {
            file_system,
            access_point,
            mount_targets,
        })
    }
}
