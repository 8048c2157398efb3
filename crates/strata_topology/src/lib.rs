//! # strata_topology
//!
//! Layered cloud topology assembly for strata.
//!
//! A topology is built from ten layers in dependency order: network,
//! secrets, data, storage, cache, registry, edge, compute, messaging and
//! pipeline. Each layer declares resources on a [`Substrate`] and hands typed
//! outputs to the layers after it. Everything that differs between dev and
//! prod comes from a [`ModeProfile`], so the layers themselves never branch
//! on the mode.
//!
//! ## Features
//!
//! - Deterministic logical ids and physical names per mode
//! - Security boundary graph with trust-hierarchy validation
//! - Secret values passed by handle only, never materialised
//! - Release pipeline plan with ordering checks
//! - Stable JSON template emission
//!
//! ## Example
//!
//! ```rust,no_run
//! use strata_config::{ConfigLoader, DeploymentMode};
//! use strata_topology::{Template, TopologyAssembler};
//!
//! let mode = DeploymentMode::Prod;
//! let config = ConfigLoader::new("env").load(mode).unwrap();
//! let synthesized = TopologyAssembler::new(&config, mode).assemble().unwrap();
//!
//! let json = Template::new(&synthesized.topology, &config.project).to_json().unwrap();
//! println!("{json}");
//! ```

pub mod assembler;
pub mod emit;
pub mod error;
pub mod layers;
pub mod naming;
pub mod plan;
pub mod profile;
pub mod resource;
pub mod security;
pub mod substrate;
pub mod validator;

pub use assembler::{LayerOutputs, SynthesizedTopology, TopologyAssembler};
pub use emit::Template;
pub use error::{TopologyError, TopologyResult};
pub use layers::LayerContext;
pub use naming::NamingPolicy;
pub use plan::{PipelinePlan, PipelineStage, StageKind};
pub use profile::{CapacityWeights, ModeProfile};
pub use resource::{
    Layer, Properties, Property, Reference, RemovalPolicy, ResourceId, ResourceKind,
    ResourceNode, ResourceRef, SecretRef, StackOutput,
};
pub use security::{SecurityBoundaryGraph, SecurityGroupKind};
pub use substrate::{Substrate, Topology};
pub use validator::{TopologyValidator, ValidationReport};
