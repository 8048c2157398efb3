//! Registry layer: one image repository per deployable component.

use std::fmt;

use strata_config::RegistryConfig;
use tracing::info;

use super::LayerContext;
use crate::error::TopologyResult;
use crate::resource::{Layer, Properties, Property, Reference, ResourceKind, ResourceNode, ResourceRef};
use crate::substrate::Substrate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageComponent {
    App,
    Proxy,
    Worker,
}

impl ImageComponent {
    pub fn all() -> [ImageComponent; 3] {
        [ImageComponent::App, ImageComponent::Proxy, ImageComponent::Worker]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageComponent::App => "app",
            ImageComponent::Proxy => "proxy",
            ImageComponent::Worker => "worker",
        }
    }
}

impl fmt::Display for ImageComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct RepositoryHandle {
    pub component: ImageComponent,
    pub repository: ResourceRef,
    pub name: String,
}

impl RepositoryHandle {
    pub fn uri(&self) -> Reference {
        self.repository.attr("RepositoryUri")
    }

    pub fn arn(&self) -> Reference {
        self.repository.attr("Arn")
    }

    /// Image reference for the given tag.
    pub fn image(&self, tag: &str) -> Property {
        Property::join("", vec![self.uri().into(), format!(":{tag}").into()])
    }
}

#[derive(Debug, Clone)]
pub struct RegistryOutputs {
    pub app: RepositoryHandle,
    pub proxy: RepositoryHandle,
    pub worker: RepositoryHandle,
}

impl RegistryOutputs {
    pub fn get(&self, component: ImageComponent) -> &RepositoryHandle {
        match component {
            ImageComponent::App => &self.app,
            ImageComponent::Proxy => &self.proxy,
            ImageComponent::Worker => &self.worker,
        }
    }

    pub fn all(&self) -> [&RepositoryHandle; 3] {
        [&self.app, &self.proxy, &self.worker]
    }
}

pub struct RegistryLayer<'a> {
    config: &'a RegistryConfig,
}

impl<'a> RegistryLayer<'a> {
    pub fn new(config: &'a RegistryConfig) -> Self {
        Self { config }
    }

    pub fn build(
        &self,
        ctx: &LayerContext<'_>,
        substrate: &mut dyn Substrate,
    ) -> TopologyResult<RegistryOutputs> {
        let layer = Layer::Registry;
        let retention = ctx.profile.registry;
        let lifecycle = self.lifecycle_policy()?;

        let mut declare = |component: ImageComponent| -> TopologyResult<RepositoryHandle> {
            let label = format!("{component}-repo");
            let name = ctx.name(layer, &label);
            let repository = substrate.declare(
                ResourceNode::new(ctx.id(layer, &label), ResourceKind::Repository, layer)
                    .named(&name)
                    .removal(retention.removal)
                    .prop("RepositoryName", &name)
                    .prop("EmptyOnDelete", retention.auto_delete_images)
                    .prop(
                        "ImageScanningConfiguration",
                        Properties::new().with("ScanOnPush", true),
                    )
                    .prop(
                        "LifecyclePolicy",
                        Properties::new().with("LifecyclePolicyText", &lifecycle),
                    ),
            )?;
            Ok(RepositoryHandle {
                component,
                repository,
                name,
            })
        };

        let outputs = RegistryOutputs {
            app: declare(ImageComponent::App)?,
            proxy: declare(ImageComponent::Proxy)?,
            worker: declare(ImageComponent::Worker)?,
        };

        info!(
            "Registry layer: {} repositories, removal {}",
            ImageComponent::all().len(),
            retention.removal.as_str()
        );
        Ok(outputs)
    }

    fn lifecycle_policy(&self) -> TopologyResult<String> {
        let policy = serde_json::json!({
            "rules": [{
                "rulePriority": 1,
                "description": format!("Expire images older than {} days", self.config.max_image_age_days),
                "selection": {
                    "tagStatus": "any",
                    "countType": "sinceImagePushed",
                    "countUnit": "days",
                    "countNumber": self.config.max_image_age_days,
                },
                "action": { "type": "expire" },
            }]
        });
        Ok(serde_json::to_string(&policy)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::NamingPolicy;
    use crate::profile::ModeProfile;
    use crate::resource::RemovalPolicy;
    use crate::substrate::Topology;
    use strata_config::DeploymentMode;

    fn build(mode: DeploymentMode) -> Topology {
        let naming = NamingPolicy::new("shop", mode);
        let profile = ModeProfile::for_mode(mode);
        let ctx = LayerContext::new(&naming, &profile, "ap-northeast-1");
        let mut topology = Topology::new(mode);
        RegistryLayer::new(&RegistryConfig::default())
            .build(&ctx, &mut topology)
            .unwrap();
        topology
    }

    #[test]
    fn test_repositories_follow_retention_policy() {
        let dev = build(DeploymentMode::Dev);
        let prod = build(DeploymentMode::Prod);

        assert_eq!(dev.len(), 3);
        for node in dev.nodes() {
            assert_eq!(node.removal, Some(RemovalPolicy::Destroy));
            assert_eq!(node.get("EmptyOnDelete"), Some(&Property::Bool(true)));
        }
        for node in prod.nodes() {
            assert_eq!(node.removal, Some(RemovalPolicy::Retain));
            assert_eq!(node.get("EmptyOnDelete"), Some(&Property::Bool(false)));
        }
    }

    #[test]
    fn test_lifecycle_policy_text() {
        let topology = build(DeploymentMode::Prod);
        let text = topology.nodes()[0]
            .get("LifecyclePolicy")
            .and_then(|p| p.get("LifecyclePolicyText"))
            .and_then(Property::as_str)
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed["rules"][0]["selection"]["countNumber"], 30);
    }
}
