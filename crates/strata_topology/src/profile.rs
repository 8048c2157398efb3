//! Per-mode shapes.
//!
//! Every difference between dev and prod lives in a [`ModeProfile`]. Layer
//! builders read the profile and never branch on the mode themselves.

use strata_config::DeploymentMode;

use crate::resource::RemovalPolicy;

/// Relational engine flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseEngine {
    Mysql,
    AuroraMysql,
}

impl DatabaseEngine {
    pub fn engine(&self) -> &'static str {
        match self {
            DatabaseEngine::Mysql => "mysql",
            DatabaseEngine::AuroraMysql => "aurora-mysql",
        }
    }

    pub fn version(&self) -> &'static str {
        match self {
            DatabaseEngine::Mysql => "8.0.32",
            DatabaseEngine::AuroraMysql => "8.0.mysql_aurora.3.02.2",
        }
    }

    pub fn parameter_family(&self) -> &'static str {
        match self {
            DatabaseEngine::Mysql => "mysql8.0",
            DatabaseEngine::AuroraMysql => "aurora-mysql8.0",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseTopology {
    SingleInstance,
    /// One writer plus `readers` replicas.
    Cluster { readers: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageAutoscaling {
    pub allocated_gib: u32,
    pub max_gib: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseShape {
    pub engine: DatabaseEngine,
    pub topology: DatabaseTopology,
    pub instance_class: &'static str,
    /// Standby for a single instance; zone spread for cluster instances.
    pub multi_az: bool,
    pub automated_backups: bool,
    pub storage: Option<StorageAutoscaling>,
    pub removal: RemovalPolicy,
    pub deletion_protection: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheShape {
    pub node_type: &'static str,
    pub nodes: u8,
}

/// Teardown behaviour of image repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub removal: RemovalPolicy,
    pub auto_delete_images: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityProvider {
    FargateSpot,
    Fargate,
}

impl CapacityProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapacityProvider::FargateSpot => "FARGATE_SPOT",
            CapacityProvider::Fargate => "FARGATE",
        }
    }
}

/// Relative weights of interruptible and on-demand capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityWeights {
    pub spot: u8,
    pub on_demand: u8,
}

impl CapacityWeights {
    pub fn strategy(&self) -> [(CapacityProvider, u8); 2] {
        [
            (CapacityProvider::FargateSpot, self.spot),
            (CapacityProvider::Fargate, self.on_demand),
        ]
    }

    /// Exactly one class is used, with weight 1.
    pub fn is_exclusive(&self) -> bool {
        matches!((self.spot, self.on_demand), (1, 0) | (0, 1))
    }
}

/// Everything that differs between dev and prod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeProfile {
    pub mode: DeploymentMode,
    pub nat_gateways: u8,
    pub database: DatabaseShape,
    pub cache: CacheShape,
    pub registry: RetentionPolicy,
    pub stateful_removal: RemovalPolicy,
    pub capacity: CapacityWeights,
    pub manual_approval: bool,
    pub default_branch: &'static str,
}

impl ModeProfile {
    pub fn for_mode(mode: DeploymentMode) -> Self {
        match mode {
            DeploymentMode::Dev => Self::dev(),
            DeploymentMode::Prod => Self::prod(),
        }
    }

    fn dev() -> Self {
        Self {
            mode: DeploymentMode::Dev,
            nat_gateways: 1,
            database: DatabaseShape {
                engine: DatabaseEngine::Mysql,
                topology: DatabaseTopology::SingleInstance,
                instance_class: "db.t3.micro",
                multi_az: false,
                automated_backups: false,
                storage: Some(StorageAutoscaling {
                    allocated_gib: 20,
                    max_gib: 1000,
                }),
                removal: RemovalPolicy::Destroy,
                deletion_protection: false,
            },
            cache: CacheShape {
                node_type: "cache.t3.micro",
                nodes: 1,
            },
            registry: RetentionPolicy {
                removal: RemovalPolicy::Destroy,
                auto_delete_images: true,
            },
            stateful_removal: RemovalPolicy::Destroy,
            capacity: CapacityWeights {
                spot: 1,
                on_demand: 0,
            },
            manual_approval: false,
            default_branch: "develop",
        }
    }

    fn prod() -> Self {
        Self {
            mode: DeploymentMode::Prod,
            nat_gateways: 2,
            database: DatabaseShape {
                engine: DatabaseEngine::AuroraMysql,
                topology: DatabaseTopology::Cluster { readers: 1 },
                instance_class: "db.t3.medium",
                multi_az: true,
                automated_backups: true,
                storage: None,
                removal: RemovalPolicy::Retain,
                deletion_protection: true,
            },
            cache: CacheShape {
                node_type: "cache.t3.small",
                nodes: 2,
            },
            registry: RetentionPolicy {
                removal: RemovalPolicy::Retain,
                auto_delete_images: false,
            },
            stateful_removal: RemovalPolicy::Retain,
            capacity: CapacityWeights {
                spot: 0,
                on_demand: 1,
            },
            manual_approval: true,
            default_branch: "main",
        }
    }
}
