//! Secrets layer: generated credentials and the queue service user.

use strata_config::SecretsConfig;
use tracing::info;

use super::LayerContext;
use crate::error::TopologyResult;
use crate::resource::{
    Layer, Properties, Property, Reference, ResourceKind, ResourceNode, ResourceRef, SecretRef, StackOutput,
};
use crate::substrate::Substrate;

/// A declared secret. Consumers get references, never values.
#[derive(Debug, Clone)]
pub struct SecretHandle {
    pub resource: ResourceRef,
    pub name: String,
}

impl SecretHandle {
    /// One field of a JSON secret.
    pub fn field(&self, field: &str) -> SecretRef {
        SecretRef::new(self.resource.id().clone(), Some(field.to_string()))
    }

    /// The whole secret string.
    pub fn whole(&self) -> SecretRef {
        SecretRef::new(self.resource.id().clone(), None)
    }

    pub fn arn(&self) -> Reference {
        self.resource.reference()
    }
}

/// Programmatic identity used by queue clients.
#[derive(Debug, Clone)]
pub struct ServiceUserCredential {
    pub user: ResourceRef,
    pub access_key: ResourceRef,
    pub secret: SecretHandle,
}

impl ServiceUserCredential {
    /// Access key id; not secret material.
    pub fn access_key_id(&self) -> Reference {
        self.access_key.reference()
    }

    pub fn secret_access_key(&self) -> SecretRef {
        self.secret.field("secretAccessKey")
    }
}

#[derive(Debug, Clone)]
pub struct SecretsOutputs {
    pub app_secret: SecretHandle,
    pub db_credential: SecretHandle,
    pub service_user: ServiceUserCredential,
}

pub struct SecretsLayer<'a> {
    config: &'a SecretsConfig,
}

impl<'a> SecretsLayer<'a> {
    pub fn new(config: &'a SecretsConfig) -> Self {
        Self { config }
    }

    pub fn build(
        &self,
        ctx: &LayerContext<'_>,
        substrate: &mut dyn Substrate,
    ) -> TopologyResult<SecretsOutputs> {
        let layer = Layer::Secrets;

        let app_name = ctx.name(layer, "app-secret");
        let app_secret = substrate.declare(
            ResourceNode::new(ctx.id(layer, "app-secret"), ResourceKind::Secret, layer)
                .named(&app_name)
                .prop("Name", &app_name)
                .prop("Description", "Application secret key")
                .prop(
                    "GenerateSecretString",
                    Properties::new()
                        .with("SecretStringTemplate", "{}")
                        .with("GenerateStringKey", "key")
                        .with("PasswordLength", 50u8)
                        .with("ExcludePunctuation", true),
                ),
        )?;

        let db_name = ctx.name(layer, "db-credential");
        let username_template = serde_json::json!({ "username": self.config.db_username });
        let db_credential = substrate.declare(
            ResourceNode::new(ctx.id(layer, "db-credential"), ResourceKind::Secret, layer)
                .named(&db_name)
                .prop("Name", &db_name)
                .prop("Description", "Database master credential")
                .prop(
                    "GenerateSecretString",
                    Properties::new()
                        .with("SecretStringTemplate", username_template.to_string())
                        .with("GenerateStringKey", "password")
                        .with("PasswordLength", 30u8)
                        .with("ExcludePunctuation", true),
                ),
        )?;

        let user_name = ctx.naming.qualify(&self.config.service_user_name);
        let user = substrate.declare(
            ResourceNode::new(ctx.id(layer, "service-user"), ResourceKind::User, layer)
                .named(&user_name)
                .prop("UserName", &user_name),
        )?;
        let access_key = substrate.declare(
            ResourceNode::new(ctx.id(layer, "service-user-key"), ResourceKind::AccessKey, layer)
                .prop("UserName", user.reference())
                .prop("Status", "Active"),
        )?;

        let key_secret_name = ctx.name(layer, "service-user-credential");
        let key_secret = substrate.declare(
            ResourceNode::new(ctx.id(layer, "service-user-credential"), ResourceKind::Secret, layer)
                .named(&key_secret_name)
                .prop("Name", &key_secret_name)
                .prop("Description", "Access key of the queue service user")
                .prop(
                    "SecretString",
                    Property::json_string(vec![
                        ("username", user.reference().into()),
                        ("accessKeyId", access_key.reference().into()),
                        ("secretAccessKey", access_key.attr("SecretAccessKey").into()),
                    ]),
                ),
        )?;

        substrate.output(StackOutput::new(
            "appSecretName",
            layer,
            &app_name,
            "Name of the application secret",
        ))?;
        substrate.output(StackOutput::new(
            "dbSecretName",
            layer,
            &db_name,
            "Name of the database credential secret",
        ))?;
        substrate.output(StackOutput::new(
            "serviceUserSecretName",
            layer,
            &key_secret_name,
            "Name of the queue service user credential secret",
        ))?;

        info!("Secrets layer: 3 secrets, service user {}", user_name);

        Ok(SecretsOutputs {
            app_secret: SecretHandle {
                resource: app_secret,
                name: app_name,
            },
            db_credential: SecretHandle {
                resource: db_credential,
                name: db_name,
            },
            service_user: ServiceUserCredential {
                user,
                access_key,
                secret: SecretHandle {
                    resource: key_secret,
                    name: key_secret_name,
                },
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::NamingPolicy;
    use crate::profile::ModeProfile;
    use crate::resource::ResourceId;
    use crate::substrate::Topology;
    use strata_config::DeploymentMode;

    #[test]
    fn test_secret_material_stays_in_secret_resources() {
        let mode = DeploymentMode::Dev;
        let naming = NamingPolicy::new("shop", mode);
        let profile = ModeProfile::for_mode(mode);
        let ctx = LayerContext::new(&naming, &profile, "ap-northeast-1");
        let mut topology = Topology::new(mode);
        let config = SecretsConfig {
            db_username: "admin".to_string(),
            service_user_name: "shop-queue-user".to_string(),
        };

        let secrets = SecretsLayer::new(&config).build(&ctx, &mut topology).unwrap();

        for node in topology.nodes() {
            if node.reads_attribute("SecretAccessKey") {
                assert_eq!(node.kind, ResourceKind::Secret);
            }
        }
        assert!(topology.outputs().iter().all(|o| !o.value.contains_secret()));
        assert_eq!(
            Property::from(secrets.service_user.secret_access_key()),
            Property::Secret(SecretRef::new(
                ResourceId::new("ShopSecretsServiceUserCredentialDev"),
                Some("secretAccessKey".to_string())
            ))
        );
        let user = topology.get(secrets.service_user.user.id()).unwrap();
        assert_eq!(user.get("UserName").and_then(Property::as_str), Some("shop-queue-user-dev"));
    }

    fn build_dev() -> (Topology, SecretsOutputs) {
        let mode = DeploymentMode::Dev;
        let naming = NamingPolicy::new("shop", mode);
        let profile = ModeProfile::for_mode(mode);
        let ctx = LayerContext::new(&naming, &profile, "ap-northeast-1");
        let mut topology = Topology::new(mode);
        let config = SecretsConfig {
            db_username: "admin".to_string(),
            service_user_name: "shop-queue-user".to_string(),
        };
        let secrets = SecretsLayer::new(&config).build(&ctx, &mut topology).unwrap();
        (topology, secrets)
    }

    #[test]
    fn test_app_secret_excludes_punctuation() {
        let (topology, secrets) = build_dev();
        let node = topology.get(secrets.app_secret.resource.id()).unwrap();
        let generate = node.get("GenerateSecretString").unwrap();

        assert_eq!(generate.get("ExcludePunctuation"), Some(&Property::Bool(true)));
        assert!(generate.get("ExcludeCharacters").is_none());
        assert_eq!(generate.get("GenerateStringKey").and_then(Property::as_str), Some("key"));
    }

    #[test]
    fn test_service_user_secret_is_json_string() {
        let (topology, secrets) = build_dev();
        let node = topology.get(secrets.service_user.secret.resource.id()).unwrap();
        let secret_string = node.get("SecretString").unwrap();

        assert!(matches!(secret_string, Property::Join { .. }));
        assert_eq!(
            secret_string.to_string(),
            concat!(
                r#"{"username":"${ShopSecretsServiceUserDev}","#,
                r#""accessKeyId":"${ShopSecretsServiceUserKeyDev}","#,
                r#""secretAccessKey":"${ShopSecretsServiceUserKeyDev.SecretAccessKey}"}"#
            )
        );
        let rendered = serde_json::to_value(secret_string).unwrap();
        assert!(rendered.get("Fn::Join").is_some());
    }
}
