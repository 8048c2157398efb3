//! End-to-end assembly tests against the shipped environment files.

use std::collections::BTreeSet;

use strata_config::{ConfigLoader, DeploymentMode, EnvironmentConfig};
use strata_topology::layers::{BuildValue, ImageComponent};
use strata_topology::{
    Layer, Property, RemovalPolicy, ResourceKind, ResourceNode, SecurityGroupKind, StageKind,
    SynthesizedTopology, Template, TopologyAssembler, TopologyError,
};

const BASE: &str = include_str!("../../../env/base.yml");
const DEV: &str = include_str!("../../../env/dev.yml");
const PROD: &str = include_str!("../../../env/prod.yml");

fn config(mode: DeploymentMode) -> EnvironmentConfig {
    let overlay = match mode {
        DeploymentMode::Dev => DEV,
        DeploymentMode::Prod => PROD,
    };
    ConfigLoader::from_documents(BASE, overlay).unwrap()
}

fn assemble(mode: DeploymentMode) -> SynthesizedTopology {
    TopologyAssembler::new(&config(mode), mode).assemble().unwrap()
}

fn nodes_of(synth: &SynthesizedTopology, kind: ResourceKind) -> Vec<&ResourceNode> {
    synth.topology.nodes().iter().filter(|n| n.kind == kind).collect()
}

#[test]
fn test_dev_database_is_single_instance() {
    let synth = assemble(DeploymentMode::Dev);

    assert!(nodes_of(&synth, ResourceKind::DbCluster).is_empty());
    let instances = nodes_of(&synth, ResourceKind::DbInstance);
    assert_eq!(instances.len(), 1);

    let db = instances[0];
    assert_eq!(db.get("MultiAZ"), Some(&Property::Bool(false)));
    assert_eq!(db.get("BackupRetentionPeriod"), Some(&Property::Int(0)));
    assert_eq!(db.get("DeletionProtection"), Some(&Property::Bool(false)));
    assert_eq!(db.get("DeleteAutomatedBackups"), Some(&Property::Bool(true)));
    assert!(db.get("PreferredBackupWindow").is_none());
    assert_eq!(db.removal, Some(RemovalPolicy::Destroy));
    assert_eq!(db.get("DBInstanceClass").and_then(Property::as_str), Some("db.t3.micro"));
}

#[test]
fn test_prod_database_is_cluster_with_reader() {
    let synth = assemble(DeploymentMode::Prod);

    let clusters = nodes_of(&synth, ResourceKind::DbCluster);
    assert_eq!(clusters.len(), 1);
    let cluster = clusters[0];
    assert_eq!(cluster.get("BackupRetentionPeriod"), Some(&Property::Int(7)));
    assert_eq!(
        cluster.get("PreferredBackupWindow").and_then(Property::as_str),
        Some("03:00-04:00")
    );
    assert_eq!(cluster.removal, Some(RemovalPolicy::Retain));
    assert_eq!(cluster.get("DeletionProtection"), Some(&Property::Bool(true)));

    let tiers: Vec<i64> = nodes_of(&synth, ResourceKind::DbInstance)
        .iter()
        .filter_map(|n| n.get("PromotionTier").and_then(Property::as_int))
        .collect();
    assert_eq!(tiers, vec![0, 1]);
}

#[test]
fn test_database_info_in_both_modes() {
    for mode in [DeploymentMode::Dev, DeploymentMode::Prod] {
        let synth = assemble(mode);
        let db = &synth.outputs.data.database;
        assert_eq!(db.name, "shop");
        assert_eq!(db.port, 3306);
        assert!(synth.topology.get(&db.endpoint.target).is_some());
        assert_eq!(db.endpoint.attribute.as_deref(), Some("Endpoint.Address"));
    }
}

#[test]
fn test_nat_gateways_follow_mode() {
    assert_eq!(nodes_of(&assemble(DeploymentMode::Dev), ResourceKind::NatGateway).len(), 1);
    assert_eq!(nodes_of(&assemble(DeploymentMode::Prod), ResourceKind::NatGateway).len(), 2);
}

#[test]
fn test_isolated_tier_not_reachable_around_private() {
    for mode in [DeploymentMode::Dev, DeploymentMode::Prod] {
        let synth = assemble(mode);
        let boundary = &synth.outputs.network.boundary;
        assert!(boundary.violations().is_empty());
        assert!(!boundary.reachable(
            SecurityGroupKind::Public,
            SecurityGroupKind::Isolated,
            Some(SecurityGroupKind::Private),
        ));
        assert!(boundary.reachable(SecurityGroupKind::Public, SecurityGroupKind::Isolated, None));
    }
}

#[test]
fn test_least_privilege_holds_for_custom_app_port() {
    let mut config = config(DeploymentMode::Prod);
    config.network.app_port = 8080;
    let synth = TopologyAssembler::new(&config, DeploymentMode::Prod)
        .assemble()
        .unwrap();
    let private_rules: Vec<u16> = synth
        .outputs
        .network
        .boundary
        .ingress_for(SecurityGroupKind::Private)
        .map(|rule| rule.port)
        .collect();
    assert_eq!(private_rules, vec![8080]);
}

#[test]
fn test_registry_retention_by_mode() {
    let dev = assemble(DeploymentMode::Dev);
    let repositories = nodes_of(&dev, ResourceKind::Repository);
    assert_eq!(repositories.len(), 3);
    for repo in repositories {
        assert_eq!(repo.removal, Some(RemovalPolicy::Destroy));
        assert_eq!(repo.get("EmptyOnDelete"), Some(&Property::Bool(true)));
    }

    let prod = assemble(DeploymentMode::Prod);
    for repo in nodes_of(&prod, ResourceKind::Repository) {
        assert_eq!(repo.removal, Some(RemovalPolicy::Retain));
        assert_eq!(repo.get("EmptyOnDelete"), Some(&Property::Bool(false)));
    }
}

#[test]
fn test_pipeline_stage_order() {
    let dev = assemble(DeploymentMode::Dev);
    assert_eq!(
        dev.outputs.pipeline.plan.kinds(),
        vec![StageKind::Source, StageKind::Build, StageKind::Deploy]
    );

    let prod = assemble(DeploymentMode::Prod);
    assert_eq!(
        prod.outputs.pipeline.plan.kinds(),
        vec![
            StageKind::Source,
            StageKind::Approve,
            StageKind::Build,
            StageKind::Deploy
        ]
    );
    let deploy = prod.outputs.pipeline.plan.stage(StageKind::Deploy).unwrap();
    assert!(deploy.has_parallel_actions());
}

#[test]
fn test_capacity_strategy_shared_by_services() {
    for mode in [DeploymentMode::Dev, DeploymentMode::Prod] {
        let synth = assemble(mode);
        let weights = synth.profile.capacity;
        assert_eq!(weights.spot + weights.on_demand, 1);

        let services = nodes_of(&synth, ResourceKind::Service);
        assert_eq!(services.len(), 2);
        assert_eq!(
            services[0].get("CapacityProviderStrategy"),
            services[1].get("CapacityProviderStrategy")
        );
    }
    assert_eq!(assemble(DeploymentMode::Dev).profile.capacity.spot, 1);
    assert_eq!(assemble(DeploymentMode::Prod).profile.capacity.on_demand, 1);
}

#[test]
fn test_synthesis_is_byte_identical() {
    for mode in [DeploymentMode::Dev, DeploymentMode::Prod] {
        let first = assemble(mode);
        let second = assemble(mode);
        let a = Template::new(&first.topology, "shop").to_json().unwrap();
        let b = Template::new(&second.topology, "shop").to_json().unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn test_stack_outputs_carry_no_secret_values() {
    let synth = assemble(DeploymentMode::Prod);
    let keys: BTreeSet<&str> = synth.topology.outputs().iter().map(|o| o.key.as_str()).collect();
    let expected: BTreeSet<&str> = [
        "appSecretName",
        "dbSecretName",
        "serviceUserSecretName",
        "dbEndpoint",
        "bastionHostIP",
        "loadBalancerDns",
        "queueUrl",
        "queueAccessKeyId",
        "pipelineName",
    ]
    .into_iter()
    .collect();
    assert_eq!(keys, expected);

    for output in synth.topology.outputs() {
        assert!(!output.value.contains_secret(), "{}", output.key);
        assert!(!output.value.reads_attribute("SecretAccessKey"), "{}", output.key);
    }
    assert!(synth.report.passed);
}

#[test]
fn test_build_environment_passes_credentials_by_handle() {
    let synth = assemble(DeploymentMode::Dev);
    let env = &synth.outputs.pipeline.environment;
    for key in ["DB_USER", "DB_PASSWORD", "APP_SECRET_KEY", "QUEUE_SECRET_ACCESS_KEY"] {
        assert!(matches!(env.get(key), Some(BuildValue::Secret(_))), "{key}");
    }
    for key in ["DB_HOST", "DB_PORT", "CACHE_HOST", "QUEUE_URL", "APP_REPO_URI"] {
        assert!(matches!(env.get(key), Some(BuildValue::Plain(_))), "{key}");
    }
}

#[test]
fn test_dev_names_are_suffixed() {
    let dev = assemble(DeploymentMode::Dev);
    let repo = &dev.outputs.registry.get(ImageComponent::App).name;
    assert!(repo.ends_with("-dev"), "{repo}");
    assert!(dev.topology.nodes().iter().all(|n| n.id.as_str().ends_with("Dev")));

    let prod = assemble(DeploymentMode::Prod);
    assert!(!prod.outputs.registry.get(ImageComponent::App).name.ends_with("-dev"));
}

#[test]
fn test_template_lists_layers_and_resources() {
    let synth = assemble(DeploymentMode::Prod);
    let value = Template::new(&synth.topology, "shop").to_value().unwrap();

    assert_eq!(value["Metadata"]["strata:mode"], "prod");
    let resources = value["Resources"].as_object().unwrap();
    assert_eq!(resources.len(), synth.topology.len());

    for layer in Layer::build_order() {
        assert!(
            synth.topology.layer_nodes(layer).next().is_some(),
            "layer {} declared nothing",
            layer.as_str()
        );
    }
}

#[test]
fn test_prod_without_backup_window_is_rejected() {
    let mut config = config(DeploymentMode::Prod);
    config.data.backup_preferred_window = None;
    let err = TopologyAssembler::new(&config, DeploymentMode::Prod)
        .assemble()
        .unwrap_err();
    assert!(matches!(err, TopologyError::Config(_)));
}

#[test]
fn test_reserved_cidr_overlap_is_rejected() {
    let mut config = config(DeploymentMode::Dev);
    config.network.reserved_cidrs = vec!["10.0.16.0/20".to_string()];
    let err = TopologyAssembler::new(&config, DeploymentMode::Dev)
        .assemble()
        .unwrap_err();
    assert!(matches!(err, TopologyError::Config(_)));
}
