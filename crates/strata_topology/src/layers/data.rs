//! Data layer: relational database and bastion host.
//!
//! The database shape comes entirely from the mode profile: a single
//! instance with autoscaled storage in dev, a writer plus reader cluster in
//! prod. Either way the layer hands downstream consumers the same
//! [`DatabaseInfo`] contract.

use strata_config::DataConfig;
use tracing::{info, warn};

use super::network::ZONES;
use super::{name_tags, LayerContext, NetworkOutputs, SecretsOutputs};
use crate::error::TopologyResult;
use crate::profile::DatabaseTopology;
use crate::resource::{
    Layer, Properties, Property, Reference, ResourceKind, ResourceNode, ResourceRef, StackOutput,
};
use crate::security::{SecurityGroupKind, MYSQL_PORT};
use crate::substrate::Substrate;

const BASTION_INSTANCE_TYPE: &str = "t2.micro";
const BASTION_IMAGE: &str =
    "{{resolve:ssm:/aws/service/ami-amazon-linux-latest/amzn2-ami-hvm-x86_64-gp2}}";

/// What consumers need to connect to the database.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseInfo {
    pub name: String,
    pub endpoint: Reference,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DataOutputs {
    pub database: DatabaseInfo,
    /// The instance or cluster holding the primary endpoint.
    pub primary: ResourceRef,
    pub instances: Vec<ResourceRef>,
    pub bastion: ResourceRef,
}

pub struct DataLayer<'a> {
    config: &'a DataConfig,
}

impl<'a> DataLayer<'a> {
    pub fn new(config: &'a DataConfig) -> Self {
        Self { config }
    }

    pub fn build(
        &self,
        ctx: &LayerContext<'_>,
        substrate: &mut dyn Substrate,
        network: &NetworkOutputs,
        secrets: &SecretsOutputs,
    ) -> TopologyResult<DataOutputs> {
        let layer = Layer::Data;
        let shape = ctx.profile.database;
        let sgs = &network.security_groups;

        let bastion_name = self
            .config
            .bastion
            .host_name
            .as_deref()
            .map(|name| ctx.naming.qualify(name))
            .unwrap_or_else(|| ctx.name(layer, "bastion"));
        let bastion = substrate.declare(
            ResourceNode::new(ctx.id(layer, "bastion"), ResourceKind::Instance, layer)
                .named(&bastion_name)
                .prop("InstanceType", BASTION_INSTANCE_TYPE)
                .prop("ImageId", BASTION_IMAGE)
                .prop("KeyName", &self.config.bastion.key_name)
                .prop("SubnetId", network.public.subnets[0].reference())
                .prop("SecurityGroupIds", sgs.ids(SecurityGroupKind::Bastion))
                .prop("Tags", name_tags(&bastion_name)),
        )?;

        let clustered = matches!(shape.topology, DatabaseTopology::Cluster { .. });
        let parameter_group = substrate.declare(
            ResourceNode::new(
                ctx.id(layer, "parameter-group"),
                if clustered {
                    ResourceKind::DbClusterParameterGroup
                } else {
                    ResourceKind::DbParameterGroup
                },
                layer,
            )
            .prop("Description", format!("{} parameters", ctx.naming.project()))
            .prop("Family", shape.engine.parameter_family())
            .prop("Parameters", self.parameters()),
        )?;

        let subnet_group = substrate.declare(
            ResourceNode::new(ctx.id(layer, "subnet-group"), ResourceKind::DbSubnetGroup, layer)
                .prop("DBSubnetGroupDescription", "Isolated subnets for the database")
                .prop("SubnetIds", network.isolated.ids()),
        )?;

        let retention = if shape.automated_backups {
            self.config.backup_retention
        } else {
            if self.config.backup_retention > 0 {
                warn!(
                    "Ignoring backupRetention {} in {} mode; automated backups are disabled",
                    self.config.backup_retention, ctx.profile.mode
                );
            }
            0
        };
        let window = if shape.automated_backups {
            self.config.backup_preferred_window.clone()
        } else {
            None
        };

        let username = secrets.db_credential.field("username");
        let password = secrets.db_credential.field("password");
        let identifier = ctx.name(layer, "db");

        let (primary, instances, endpoint) = match shape.topology {
            DatabaseTopology::SingleInstance => {
                let mut node = ResourceNode::new(ctx.id(layer, "db"), ResourceKind::DbInstance, layer)
                    .named(&identifier)
                    .removal(shape.removal)
                    .prop("DBInstanceIdentifier", &identifier)
                    .prop("Engine", shape.engine.engine())
                    .prop("EngineVersion", shape.engine.version())
                    .prop("DBInstanceClass", shape.instance_class)
                    .prop("DBName", &self.config.db_name)
                    .prop("MasterUsername", username)
                    .prop("MasterUserPassword", password)
                    .prop("DBParameterGroupName", parameter_group.reference())
                    .prop("DBSubnetGroupName", subnet_group.reference())
                    .prop("VPCSecurityGroups", sgs.ids(SecurityGroupKind::Isolated))
                    .prop("Port", MYSQL_PORT)
                    .prop("MultiAZ", shape.multi_az)
                    .prop("PubliclyAccessible", false)
                    .prop("AllowMajorVersionUpgrade", false)
                    .prop("AutoMinorVersionUpgrade", true)
                    .prop("BackupRetentionPeriod", retention)
                    .prop("PreferredBackupWindow", window)
                    .prop("DeleteAutomatedBackups", !shape.automated_backups)
                    .prop("DeletionProtection", shape.deletion_protection);
                if let Some(storage) = shape.storage {
                    node = node
                        .prop("AllocatedStorage", storage.allocated_gib.to_string())
                        .prop("MaxAllocatedStorage", storage.max_gib);
                }
                let instance = substrate.declare(node)?;
                let endpoint = instance.attr("Endpoint.Address");
                (instance.clone(), vec![instance], endpoint)
            }
            DatabaseTopology::Cluster { readers } => {
                let cluster = substrate.declare(
                    ResourceNode::new(ctx.id(layer, "db"), ResourceKind::DbCluster, layer)
                        .named(&identifier)
                        .removal(shape.removal)
                        .prop("DBClusterIdentifier", &identifier)
                        .prop("Engine", shape.engine.engine())
                        .prop("EngineVersion", shape.engine.version())
                        .prop("DatabaseName", &self.config.db_name)
                        .prop("MasterUsername", username)
                        .prop("MasterUserPassword", password)
                        .prop("DBClusterParameterGroupName", parameter_group.reference())
                        .prop("DBSubnetGroupName", subnet_group.reference())
                        .prop("VpcSecurityGroupIds", sgs.ids(SecurityGroupKind::Isolated))
                        .prop("Port", MYSQL_PORT)
                        .prop("StorageEncrypted", true)
                        .prop("BackupRetentionPeriod", retention)
                        .prop("PreferredBackupWindow", window)
                        .prop("DeletionProtection", shape.deletion_protection),
                )?;

                let mut instances = Vec::new();
                for i in 0..=readers {
                    let (label, tier) = if i == 0 {
                        ("db-writer".to_string(), 0u8)
                    } else {
                        (format!("db-reader-{i}"), 1u8)
                    };
                    let zone = shape.multi_az.then_some(Property::AvailabilityZone(i % ZONES));
                    instances.push(substrate.declare(
                        ResourceNode::new(ctx.id(layer, &label), ResourceKind::DbInstance, layer)
                            .removal(shape.removal)
                            .prop("DBClusterIdentifier", cluster.reference())
                            .prop("AvailabilityZone", zone)
                            .prop("DBInstanceClass", shape.instance_class)
                            .prop("Engine", shape.engine.engine())
                            .prop("PromotionTier", tier)
                            .prop("PubliclyAccessible", false),
                    )?);
                }
                let endpoint = cluster.attr("Endpoint.Address");
                (cluster, instances, endpoint)
            }
        };

        substrate.output(StackOutput::new(
            "dbEndpoint",
            layer,
            endpoint.clone(),
            "Database endpoint address",
        ))?;
        substrate.output(StackOutput::new(
            "bastionHostIP",
            layer,
            bastion.attr("PublicIp"),
            "Public IP of the bastion host",
        ))?;

        info!(
            "Data layer: {} {} with {} instance(s)",
            shape.engine.engine(),
            shape.engine.version(),
            instances.len()
        );

        Ok(DataOutputs {
            database: DatabaseInfo {
                name: self.config.db_name.clone(),
                endpoint,
                port: MYSQL_PORT,
            },
            primary,
            instances,
            bastion,
        })
    }

    fn parameters(&self) -> Properties {
        Properties::new()
            .with("time_zone", &self.config.time_zone)
            .with("character_set_client", "utf8mb4")
            .with("character_set_connection", "utf8mb4")
            .with("character_set_database", "utf8mb4")
            .with("character_set_results", "utf8mb4")
            .with("character_set_server", "utf8mb4")
            .with("general_log", "1")
            .with("log_output", "FILE")
    }
}

impl DatabaseInfo {
    /// Port as a string property, for environment variables.
    pub fn port_value(&self) -> Property {
        Property::from(self.port.to_string())
    }
}
