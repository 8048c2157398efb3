//! Messaging layer: work queue with dead-letter redrive.

use strata_config::{MessagingConfig, QueueConfig};
use tracing::info;

use super::{allow_statement, policy_document, LayerContext, SecretsOutputs, ServiceUserCredential};
use crate::error::TopologyResult;
use crate::resource::{Layer, Properties, Reference, ResourceKind, ResourceNode, ResourceRef, StackOutput};
use crate::substrate::Substrate;

const SECONDS_PER_DAY: u32 = 86_400;
const SECONDS_PER_HOUR: u32 = 3_600;

#[derive(Debug, Clone)]
pub struct QueueHandle {
    pub queue: ResourceRef,
    pub name: String,
}

impl QueueHandle {
    pub fn url(&self) -> Reference {
        self.queue.reference()
    }

    pub fn arn(&self) -> Reference {
        self.queue.attr("Arn")
    }
}

#[derive(Debug, Clone)]
pub struct MessagingOutputs {
    pub main_queue: QueueHandle,
    pub dead_letter_queue: QueueHandle,
    pub access_policy: ResourceRef,
    /// Identity granted full access to both queues.
    pub credential: ServiceUserCredential,
}

pub struct MessagingLayer<'a> {
    config: &'a MessagingConfig,
}

impl<'a> MessagingLayer<'a> {
    pub fn new(config: &'a MessagingConfig) -> Self {
        Self { config }
    }

    pub fn build(
        &self,
        ctx: &LayerContext<'_>,
        substrate: &mut dyn Substrate,
        secrets: &SecretsOutputs,
    ) -> TopologyResult<MessagingOutputs> {
        let layer = Layer::Messaging;
        let dlq_config = &self.config.dead_letter_queue;

        let dlq_name = ctx.name(layer, "dlq");
        let dead_letter_queue = QueueHandle {
            queue: substrate.declare(
                queue_node(ctx, "dlq", &dlq_name, &dlq_config.queue),
            )?,
            name: dlq_name,
        };

        let main_name = ctx.name(layer, "queue");
        let main_queue = QueueHandle {
            queue: substrate.declare(
                queue_node(ctx, "queue", &main_name, &self.config.main_queue).prop(
                    "RedrivePolicy",
                    Properties::new()
                        .with("deadLetterTargetArn", dead_letter_queue.arn())
                        .with("maxReceiveCount", dlq_config.max_receive_count),
                ),
            )?,
            name: main_name,
        };

        let credential = secrets.service_user.clone();
        let policy_name = ctx.name(layer, "queue-access");
        let access_policy = substrate.declare(
            ResourceNode::new(ctx.id(layer, "queue-access"), ResourceKind::Policy, layer)
                .named(&policy_name)
                .prop("PolicyName", &policy_name)
                .prop("Users", vec![credential.user.reference()])
                .prop(
                    "PolicyDocument",
                    policy_document(vec![allow_statement(
                        vec!["sqs:*"],
                        vec![main_queue.arn().into(), dead_letter_queue.arn().into()],
                    )]),
                ),
        )?;

        substrate.output(StackOutput::new(
            "queueUrl",
            layer,
            main_queue.url(),
            "URL of the work queue",
        ))?;
        substrate.output(StackOutput::new(
            "queueAccessKeyId",
            layer,
            credential.access_key_id(),
            "Access key id of the queue service user",
        ))?;

        info!(
            "Messaging layer: {} with dead-letter queue after {} receive(s)",
            main_queue.name, dlq_config.max_receive_count
        );

        Ok(MessagingOutputs {
            main_queue,
            dead_letter_queue,
            access_policy,
            credential,
        })
    }
}

fn queue_node(ctx: &LayerContext<'_>, label: &str, name: &str, config: &QueueConfig) -> ResourceNode {
    let layer = Layer::Messaging;
    ResourceNode::new(ctx.id(layer, label), ResourceKind::Queue, layer)
        .named(name)
        .prop("QueueName", name)
        .prop("SqsManagedSseEnabled", true)
        .prop("MessageRetentionPeriod", config.retention_period_days * SECONDS_PER_DAY)
        .prop("VisibilityTimeout", config.visibility_timeout_hours * SECONDS_PER_HOUR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::SecretsLayer;
    use crate::naming::NamingPolicy;
    use crate::profile::ModeProfile;
    use crate::resource::Property;
    use crate::substrate::Topology;
    use strata_config::{DeadLetterQueueConfig, DeploymentMode, SecretsConfig};

    #[test]
    fn test_queues_and_scoped_policy() {
        let mode = DeploymentMode::Prod;
        let naming = NamingPolicy::new("shop", mode);
        let profile = ModeProfile::for_mode(mode);
        let ctx = LayerContext::new(&naming, &profile, "ap-northeast-1");
        let mut topology = Topology::new(mode);
        let secrets = SecretsLayer::new(&SecretsConfig {
            db_username: "admin".to_string(),
            service_user_name: "queue-user".to_string(),
        })
        .build(&ctx, &mut topology)
        .unwrap();

        let config = MessagingConfig {
            main_queue: QueueConfig::default(),
            dead_letter_queue: DeadLetterQueueConfig {
                queue: QueueConfig {
                    retention_period_days: 14,
                    visibility_timeout_hours: 1,
                },
                max_receive_count: 3,
            },
        };
        let messaging = MessagingLayer::new(&config)
            .build(&ctx, &mut topology, &secrets)
            .unwrap();

        let main = topology.get(messaging.main_queue.queue.id()).unwrap();
        assert_eq!(main.get("MessageRetentionPeriod"), Some(&Property::Int(4 * 86_400)));
        let redrive = main.get("RedrivePolicy").unwrap();
        assert_eq!(redrive.get("maxReceiveCount"), Some(&Property::Int(3)));

        let dlq = topology.get(messaging.dead_letter_queue.queue.id()).unwrap();
        assert_eq!(dlq.get("MessageRetentionPeriod"), Some(&Property::Int(14 * 86_400)));

        let policy = topology.get(messaging.access_policy.id()).unwrap();
        let statement = &policy
            .get("PolicyDocument")
            .and_then(|d| d.get("Statement"))
            .and_then(Property::as_list)
            .unwrap()[0];
        assert_eq!(
            statement.get("Resource").and_then(Property::as_list).map(<[Property]>::len),
            Some(2)
        );
        assert!(topology.output_value("queueUrl").is_some());
    }
}
