//! Topology assembly.

use strata_config::{DeploymentMode, EnvironmentConfig};
use tracing::{debug, info};

use crate::error::{TopologyError, TopologyResult};
use crate::layers::{
    CacheLayer, CacheOutputs, ComputeInputs, ComputeLayer, ComputeOutputs, DataLayer, DataOutputs,
    EdgeLayer, EdgeOutputs, LayerContext, MessagingLayer, MessagingOutputs, NetworkLayer,
    NetworkOutputs, PipelineInputs, PipelineLayer, PipelineOutputs, RegistryLayer,
    RegistryOutputs, SecretsLayer, SecretsOutputs, StorageLayer, StorageOutputs,
};
use crate::naming::NamingPolicy;
use crate::profile::ModeProfile;
use crate::substrate::{Substrate, Topology};
use crate::validator::{TopologyValidator, ValidationReport};

/// Typed outputs of every layer.
#[derive(Debug, Clone)]
pub struct LayerOutputs {
    pub network: NetworkOutputs,
    pub secrets: SecretsOutputs,
    pub data: DataOutputs,
    pub storage: StorageOutputs,
    pub cache: CacheOutputs,
    pub registry: RegistryOutputs,
    pub edge: EdgeOutputs,
    pub compute: ComputeOutputs,
    pub messaging: MessagingOutputs,
    pub pipeline: PipelineOutputs,
}

/// A fully assembled and validated topology.
#[derive(Debug, Clone)]
pub struct SynthesizedTopology {
    pub topology: Topology,
    pub outputs: LayerOutputs,
    pub profile: ModeProfile,
    pub report: ValidationReport,
}

impl SynthesizedTopology {
    pub fn mode(&self) -> DeploymentMode {
        self.topology.mode()
    }

    /// Stack outputs as `(key, value)` pairs for display.
    pub fn output_pairs(&self) -> Vec<(String, String)> {
        self.topology
            .outputs()
            .iter()
            .map(|o| (o.key.clone(), o.value.to_string()))
            .collect()
    }
}

/// Builds every layer in dependency order for one mode.
pub struct TopologyAssembler<'a> {
    config: &'a EnvironmentConfig,
    mode: DeploymentMode,
}

impl<'a> TopologyAssembler<'a> {
    pub fn new(config: &'a EnvironmentConfig, mode: DeploymentMode) -> Self {
        Self { config, mode }
    }

    /// Validates the configuration, builds all layers and checks the result.
    pub fn assemble(&self) -> TopologyResult<SynthesizedTopology> {
        let synthesized = self.synthesize()?;
        if !synthesized.report.passed {
            return Err(TopologyError::ValidationFailed(
                synthesized.report.failures().join("; "),
            ));
        }
        Ok(synthesized)
    }

    /// Like [`assemble`](Self::assemble), but returns the topology together
    /// with a failing validation report instead of an error.
    pub fn synthesize(&self) -> TopologyResult<SynthesizedTopology> {
        info!("Assembling {} topology for {}", self.mode, self.config.project);
        self.config.validate(self.mode)?;

        let profile = ModeProfile::for_mode(self.mode);
        let mut topology = Topology::new(self.mode);
        let outputs = self.build_layers(&profile, &mut topology)?;
        let report = TopologyValidator::new(&profile).validate(&topology, &outputs);

        info!(
            "Assembled {} resources and {} outputs",
            topology.len(),
            topology.outputs().len()
        );
        Ok(SynthesizedTopology {
            topology,
            outputs,
            profile,
            report,
        })
    }

    /// Runs the layer builders against any substrate.
    pub fn build_layers(
        &self,
        profile: &ModeProfile,
        substrate: &mut dyn Substrate,
    ) -> TopologyResult<LayerOutputs> {
        let config = self.config;
        let naming = NamingPolicy::new(&config.project, self.mode);
        let ctx = LayerContext::new(&naming, profile, &config.region)
            .with_account(config.account.as_deref());

        debug!("Building network layer");
        let network = NetworkLayer::new(&config.network).build(&ctx, substrate)?;
        debug!("Building secrets layer");
        let secrets = SecretsLayer::new(&config.secrets).build(&ctx, substrate)?;
        debug!("Building data layer");
        let data = DataLayer::new(&config.data).build(&ctx, substrate, &network, &secrets)?;
        debug!("Building storage layer");
        let storage = StorageLayer::new(&config.storage).build(&ctx, substrate, &network)?;
        debug!("Building cache layer");
        let cache = CacheLayer::new(&config.cache).build(&ctx, substrate, &network)?;
        debug!("Building registry layer");
        let registry = RegistryLayer::new(&config.registry).build(&ctx, substrate)?;
        debug!("Building edge layer");
        let edge = EdgeLayer::new(&config.edge).build(&ctx, substrate, &network)?;

        debug!("Building compute layer");
        let compute = ComputeLayer::new(&config.compute).build(
            &ctx,
            substrate,
            ComputeInputs {
                network: &network,
                registry: &registry,
                storage: &storage,
                edge: &edge,
            },
        )?;

        debug!("Building messaging layer");
        let messaging = MessagingLayer::new(&config.messaging).build(&ctx, substrate, &secrets)?;

        debug!("Building pipeline layer");
        let pipeline = PipelineLayer::new(&config.pipeline).build(
            &ctx,
            substrate,
            PipelineInputs {
                network: &network,
                secrets: &secrets,
                data: &data,
                cache: &cache,
                registry: &registry,
                compute: &compute,
                messaging: &messaging,
            },
        )?;

        Ok(LayerOutputs {
            network,
            secrets,
            data,
            storage,
            cache,
            registry,
            edge,
            compute,
            messaging,
            pipeline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Layer, ResourceId, ResourceKind, ResourceRef};
    use crate::substrate::MockSubstrate;
    use strata_config::ConfigLoader;

    const BASE: &str = include_str!("../../../env/base.yml");
    const DEV: &str = include_str!("../../../env/dev.yml");

    #[test]
    fn test_substrate_error_stops_assembly() {
        let config = ConfigLoader::from_documents(BASE, DEV).unwrap();
        let assembler = TopologyAssembler::new(&config, DeploymentMode::Dev);
        let profile = ModeProfile::for_mode(DeploymentMode::Dev);

        let mut substrate = MockSubstrate::new();
        substrate
            .expect_declare()
            .times(1)
            .returning(|node| Err(TopologyError::DuplicateResource(node.id)));
        substrate.expect_output().never();

        let err = assembler.build_layers(&profile, &mut substrate).unwrap_err();
        assert!(matches!(err, TopologyError::DuplicateResource(_)));
    }

    #[test]
    fn test_layers_declare_in_build_order() {
        let config = ConfigLoader::from_documents(BASE, DEV).unwrap();
        let assembler = TopologyAssembler::new(&config, DeploymentMode::Dev);
        let profile = ModeProfile::for_mode(DeploymentMode::Dev);

        let mut layers = Vec::new();
        let mut substrate = MockSubstrate::new();
        substrate.expect_declare().returning(|node| {
            Ok(ResourceRef::new(node.id.clone(), node.kind, node.layer))
        });
        substrate.expect_output().returning(|_| Ok(()));
        let outputs = assembler.build_layers(&profile, &mut substrate).unwrap();

        for handle in [
            outputs.network.vpc.clone(),
            outputs.secrets.app_secret.resource.clone(),
            outputs.data.primary.clone(),
            outputs.storage.file_system.clone(),
            outputs.cache.cluster.clone(),
            outputs.registry.app.repository.clone(),
            outputs.edge.load_balancer.clone(),
            outputs.compute.cluster.clone(),
            outputs.messaging.main_queue.queue.clone(),
            outputs.pipeline.pipeline.clone(),
        ] {
            layers.push(handle.layer());
        }
        assert_eq!(layers, Layer::build_order().to_vec());
        assert_eq!(outputs.data.primary.kind(), ResourceKind::DbInstance);
        assert_eq!(
            outputs.network.vpc.id(),
            &ResourceId::new("ShopNetworkVpcDev")
        );
    }

    #[test]
    fn test_invalid_config_rejected_before_declaring() {
        let mut config = ConfigLoader::from_documents(BASE, DEV).unwrap();
        config.network.cidr = "10.0.0.0/33".to_string();
        let err = TopologyAssembler::new(&config, DeploymentMode::Dev)
            .assemble()
            .unwrap_err();
        assert!(matches!(err, TopologyError::Config(_)));
    }
}
