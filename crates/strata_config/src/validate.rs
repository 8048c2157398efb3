//! Configuration validation.
//!
//! Runs before any resource is declared; the first problem found aborts
//! synthesis.

use chrono::{NaiveTime, Timelike};
use regex::Regex;
use tracing::debug;

use crate::cidr::Ipv4Cidr;
use crate::error::{ConfigError, ConfigResult};
use crate::mode::DeploymentMode;
use crate::model::{
    ComputeConfig, DataConfig, EnvironmentConfig, MessagingConfig, NetworkConfig,
    PipelineConfig, QueueConfig,
};

/// Subnet tiers times availability zones.
pub(crate) const REQUIRED_SUBNETS: u64 = 6;

const MAX_PROJECT_LEN: usize = 16;
const FARGATE_CPU_UNITS: [u32; 5] = [256, 512, 1024, 2048, 4096];

impl EnvironmentConfig {
    /// Validate the merged tree for the given mode.
    pub fn validate(&self, mode: DeploymentMode) -> ConfigResult<()> {
        debug!("Validating {} configuration for project {}", mode, self.project);

        validate_identifier("project", &self.project, r"^[a-z][a-z0-9-]*[a-z0-9]$")?;
        if self.project.len() > MAX_PROJECT_LEN {
            return Err(ConfigError::invalid(
                "project",
                format!("must be at most {} characters", MAX_PROJECT_LEN),
            ));
        }
        validate_identifier("region", &self.region, r"^[a-z]{2}(-[a-z]+)+-[0-9]$")?;
        if let Some(account) = &self.account {
            validate_identifier("account", account, r"^[0-9]{12}$")?;
        }

        validate_network(&self.network)?;

        validate_identifier(
            "secrets.dbUsername",
            &self.secrets.db_username,
            r"^[A-Za-z][A-Za-z0-9_]{0,15}$",
        )?;
        validate_identifier(
            "secrets.serviceUserName",
            &self.secrets.service_user_name,
            r"^[A-Za-z0-9+=,.@_-]{1,64}$",
        )?;

        validate_data(&self.data, mode)?;
        validate_absolute_path("storage.accessPoint.path", &self.storage.access_point.path)?;

        if self.registry.max_image_age_days == 0 {
            return Err(ConfigError::invalid("registry.maxImageAgeDays", "must be at least 1"));
        }
        validate_absolute_path("edge.healthCheckPath", &self.edge.health_check_path)?;

        validate_compute(&self.compute)?;
        validate_messaging(&self.messaging)?;
        validate_pipeline(&self.pipeline)?;

        Ok(())
    }
}

fn validate_identifier(field: &str, value: &str, pattern: &str) -> ConfigResult<()> {
    let regex = Regex::new(pattern)
        .map_err(|e| ConfigError::invalid(field, format!("bad pattern: {}", e)))?;
    if !regex.is_match(value) {
        return Err(ConfigError::invalid(
            field,
            format!("'{}' does not match {}", value, pattern),
        ));
    }
    Ok(())
}

fn validate_absolute_path(field: &str, value: &str) -> ConfigResult<()> {
    if !value.starts_with('/') {
        return Err(ConfigError::invalid(field, format!("'{}' must start with '/'", value)));
    }
    Ok(())
}

fn validate_not_empty(field: &str, value: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::invalid(field, "must not be empty"));
    }
    Ok(())
}

fn validate_network(network: &NetworkConfig) -> ConfigResult<()> {
    let vpc = network.vpc_cidr()?;
    let mask = network.subnet_cidr_mask;

    if mask <= vpc.prefix() || mask > 28 {
        return Err(ConfigError::invalid(
            "network.subnetCidrMask",
            format!("/{} must be longer than /{} and at most /28", mask, vpc.prefix()),
        ));
    }

    let available = vpc.subnet_capacity(mask);
    if available < REQUIRED_SUBNETS {
        return Err(ConfigError::AddressSpaceExhausted {
            cidr: vpc.to_string(),
            mask,
            required: REQUIRED_SUBNETS,
            available,
        });
    }

    for reserved in &network.reserved_cidrs {
        let reserved = Ipv4Cidr::new(reserved)?;
        if vpc.overlaps(&reserved) {
            return Err(ConfigError::CidrOverlap {
                cidr: vpc.to_string(),
                reserved: reserved.to_string(),
            });
        }
    }

    if network.app_port == 0 {
        return Err(ConfigError::invalid("network.appPort", "must not be 0"));
    }

    Ok(())
}

fn validate_data(data: &DataConfig, mode: DeploymentMode) -> ConfigResult<()> {
    validate_identifier("data.dbName", &data.db_name, r"^[A-Za-z][A-Za-z0-9_]{0,63}$")?;
    validate_not_empty("data.timeZone", &data.time_zone)?;
    validate_not_empty("data.bastion.keyName", &data.bastion.key_name)?;

    if let Some(window) = &data.backup_preferred_window {
        parse_window(window)?;
    }

    if mode.is_prod() {
        if !(1..=35).contains(&data.backup_retention) {
            return Err(ConfigError::invalid(
                "data.backupRetention",
                format!("{} days is outside 1-35 (prod requires automated backups)", data.backup_retention),
            ));
        }
        if data.backup_preferred_window.is_none() {
            return Err(ConfigError::invalid(
                "data.backupPreferredWindow",
                "required in prod",
            ));
        }
    }

    Ok(())
}

/// Parse a `HH:MM-HH:MM` UTC window of at least 30 minutes.
pub(crate) fn parse_window(window: &str) -> ConfigResult<(NaiveTime, NaiveTime)> {
    let field = "data.backupPreferredWindow";
    let (start, end) = window
        .split_once('-')
        .ok_or_else(|| ConfigError::invalid(field, format!("'{}' is not HH:MM-HH:MM", window)))?;

    let parse = |s: &str| {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map_err(|e| ConfigError::invalid(field, format!("'{}': {}", s, e)))
    };
    let (start, end) = (parse(start)?, parse(end)?);

    let minutes = |t: NaiveTime| t.hour() * 60 + t.minute();
    let duration = (minutes(end) + 24 * 60 - minutes(start)) % (24 * 60);
    if duration < 30 {
        return Err(ConfigError::invalid(
            field,
            format!("'{}' must span at least 30 minutes", window),
        ));
    }

    Ok((start, end))
}

fn validate_compute(compute: &ComputeConfig) -> ConfigResult<()> {
    let sizing = [
        ("compute.web", compute.web.cpu, compute.web.memory_mib),
        ("compute.worker", compute.worker.cpu, compute.worker.memory_mib),
    ];
    for (field, cpu, memory) in sizing {
        if !FARGATE_CPU_UNITS.contains(&cpu) {
            return Err(ConfigError::invalid(
                format!("{}.cpu", field),
                format!("{} is not one of {:?}", cpu, FARGATE_CPU_UNITS),
            ));
        }
        if !(512..=30720).contains(&memory) || memory < cpu {
            return Err(ConfigError::invalid(
                format!("{}.memoryMib", field),
                format!("{} MiB is not valid for {} cpu units", memory, cpu),
            ));
        }
    }

    let web = &compute.web;
    validate_not_empty("compute.web.appContainerName", &web.app_container_name)?;
    validate_not_empty("compute.web.proxyContainerName", &web.proxy_container_name)?;
    if web.app_container_name == web.proxy_container_name {
        return Err(ConfigError::invalid(
            "compute.web.proxyContainerName",
            "must differ from appContainerName",
        ));
    }
    validate_not_empty("compute.web.sharedVolume.name", &web.shared_volume.name)?;
    validate_absolute_path("compute.web.sharedVolume.appPath", &web.shared_volume.app_path)?;
    validate_absolute_path("compute.web.sharedVolume.proxyPath", &web.shared_volume.proxy_path)?;
    if let Some(path) = &web.persistent_mount_path {
        validate_absolute_path("compute.web.persistentMountPath", path)?;
    }

    let worker = &compute.worker;
    validate_not_empty("compute.worker.containerName", &worker.container_name)?;
    if worker.entry_point.is_empty() {
        return Err(ConfigError::invalid("compute.worker.entryPoint", "must not be empty"));
    }
    validate_absolute_path("compute.worker.workingDir", &worker.working_dir)?;
    validate_absolute_path("compute.worker.sharedAssetsPath", &worker.shared_assets_path)?;

    Ok(())
}

fn validate_queue(field: &str, queue: &QueueConfig) -> ConfigResult<()> {
    if !(1..=14).contains(&queue.retention_period_days) {
        return Err(ConfigError::invalid(
            format!("{}.retentionPeriodDays", field),
            format!("{} is outside 1-14", queue.retention_period_days),
        ));
    }
    if queue.visibility_timeout_hours > 12 {
        return Err(ConfigError::invalid(
            format!("{}.visibilityTimeoutHours", field),
            format!("{} is outside 0-12", queue.visibility_timeout_hours),
        ));
    }
    Ok(())
}

fn validate_messaging(messaging: &MessagingConfig) -> ConfigResult<()> {
    validate_queue("messaging.mainQueue", &messaging.main_queue)?;
    validate_queue("messaging.deadLetterQueue", &messaging.dead_letter_queue.queue)?;
    if !(1..=1000).contains(&messaging.dead_letter_queue.max_receive_count) {
        return Err(ConfigError::invalid(
            "messaging.deadLetterQueue.maxReceiveCount",
            format!("{} is outside 1-1000", messaging.dead_letter_queue.max_receive_count),
        ));
    }
    Ok(())
}

fn validate_pipeline(pipeline: &PipelineConfig) -> ConfigResult<()> {
    if !pipeline.source.connection_arn.starts_with("arn:") {
        return Err(ConfigError::invalid(
            "pipeline.source.connectionArn",
            format!("'{}' is not an ARN", pipeline.source.connection_arn),
        ));
    }
    validate_not_empty("pipeline.source.owner", &pipeline.source.owner)?;
    validate_not_empty("pipeline.source.repository", &pipeline.source.repository)?;
    if let Some(branch) = &pipeline.source.branch {
        validate_not_empty("pipeline.source.branch", branch)?;
    }
    validate_not_empty("pipeline.buildSpec", &pipeline.build_spec)?;
    Ok(())
}
