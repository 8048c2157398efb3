//! Layer builders.
//!
//! Each layer takes its slice of the configuration plus the typed outputs of
//! the layers it depends on, declares its resources on a [`Substrate`] and
//! returns typed outputs for the layers after it.
//!
//! [`Substrate`]: crate::substrate::Substrate

pub mod cache;
pub mod compute;
pub mod data;
pub mod edge;
pub mod messaging;
pub mod network;
pub mod pipeline;
pub mod registry;
pub mod secrets;
pub mod storage;

use crate::naming::NamingPolicy;
use crate::profile::ModeProfile;
use crate::resource::{Layer, Properties, Property, ResourceId};

pub use cache::{CacheEndpoint, CacheLayer, CacheOutputs};
pub use compute::{ComputeInputs, ComputeLayer, ComputeOutputs, ServiceHandle};
pub use data::{DataLayer, DataOutputs, DatabaseInfo};
pub use edge::{EdgeLayer, EdgeOutputs, TargetGroupHandle};
pub use messaging::{MessagingLayer, MessagingOutputs, QueueHandle};
pub use network::{NetworkLayer, NetworkOutputs, SecurityGroups, SubnetKind, SubnetTier};
pub use pipeline::{BuildValue, PipelineInputs, PipelineLayer, PipelineOutputs};
pub use registry::{ImageComponent, RegistryLayer, RegistryOutputs, RepositoryHandle};
pub use secrets::{SecretHandle, SecretsLayer, SecretsOutputs, ServiceUserCredential};
pub use storage::{MountAccess, StorageLayer, StorageOutputs};

/// Shared inputs of every layer builder.
#[derive(Debug, Clone, Copy)]
pub struct LayerContext<'a> {
    pub naming: &'a NamingPolicy,
    pub profile: &'a ModeProfile,
    pub region: &'a str,
    pub account: Option<&'a str>,
}

impl<'a> LayerContext<'a> {
    pub fn new(naming: &'a NamingPolicy, profile: &'a ModeProfile, region: &'a str) -> Self {
        Self {
            naming,
            profile,
            region,
            account: None,
        }
    }

    pub fn with_account(mut self, account: Option<&'a str>) -> Self {
        self.account = account;
        self
    }

    pub fn id(&self, layer: Layer, kind: &str) -> ResourceId {
        self.naming.logical_id(layer, kind)
    }

    pub fn name(&self, layer: Layer, kind: &str) -> String {
        self.naming.physical_name(layer, kind)
    }
}

/// `[{Key: Name, Value: name}]`
pub(crate) fn name_tags(name: &str) -> Property {
    Property::list(vec![Properties::new().with("Key", "Name").with("Value", name)])
}

/// IAM policy document with the given statements.
pub(crate) fn policy_document(statements: Vec<Property>) -> Properties {
    Properties::new()
        .with("Version", "2012-10-17")
        .with("Statement", Property::List(statements))
}

pub(crate) fn allow_statement(actions: Vec<&str>, resources: Vec<Property>) -> Property {
    Properties::new()
        .with("Effect", "Allow")
        .with("Action", Property::list(actions))
        .with("Resource", Property::List(resources))
        .into()
}

/// Trust policy letting a service principal assume a role.
pub(crate) fn assume_role_policy(service: &str) -> Properties {
    policy_document(vec![Properties::new()
        .with("Effect", "Allow")
        .with("Principal", Properties::new().with("Service", service))
        .with("Action", "sts:AssumeRole")
        .into()])
}
