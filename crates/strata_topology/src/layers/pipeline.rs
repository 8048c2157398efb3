//! Pipeline layer: build project and release pipeline.

use std::collections::BTreeMap;

use strata_config::PipelineConfig;
use tracing::info;

use super::{
    allow_statement, assume_role_policy, policy_document, CacheOutputs, ComputeOutputs,
    DataOutputs, LayerContext, MessagingOutputs, NetworkOutputs, RegistryOutputs,
    SecretsOutputs, ServiceHandle,
};
use crate::error::TopologyResult;
use crate::plan::{ActionCategory, PipelineAction, PipelinePlan, PipelineStage, StageKind};
use crate::resource::{
    Layer, Properties, Property, ResourceKind, ResourceNode, ResourceRef, SecretRef, StackOutput,
};
use crate::security::SecurityGroupKind;
use crate::substrate::Substrate;

const BUILD_IMAGE: &str = "aws/codebuild/amazonlinux2-x86_64-standard:4.0";
const SOURCE_ARTIFACT: &str = "Source";
const IMAGE_DEFINITIONS: &str = "imagedefinitions.json";

/// Everything the pipeline wires into its build environment and deploy stage.
#[derive(Debug, Clone, Copy)]
pub struct PipelineInputs<'a> {
    pub network: &'a NetworkOutputs,
    pub secrets: &'a SecretsOutputs,
    pub data: &'a DataOutputs,
    pub cache: &'a CacheOutputs,
    pub registry: &'a RegistryOutputs,
    pub compute: &'a ComputeOutputs,
    pub messaging: &'a MessagingOutputs,
}

/// Value of a build environment variable.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildValue {
    Plain(Property),
    /// Resolved from the secret store by the build service at run time.
    Secret(SecretRef),
}

impl BuildValue {
    fn to_property(&self, name: &str) -> Property {
        let (kind, value) = match self {
            BuildValue::Plain(value) => ("PLAINTEXT", value.clone()),
            BuildValue::Secret(secret) => ("SECRETS_MANAGER", secret.arn_form()),
        };
        Properties::new()
            .with("Name", name)
            .with("Type", kind)
            .with("Value", value)
            .into()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutputs {
    pub pipeline: ResourceRef,
    pub build_project: ResourceRef,
    pub artifact_bucket: ResourceRef,
    pub plan: PipelinePlan,
    pub environment: BTreeMap<String, BuildValue>,
}

pub struct PipelineLayer<'a> {
    config: &'a PipelineConfig,
}

impl<'a> PipelineLayer<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    pub fn build(
        &self,
        ctx: &LayerContext<'_>,
        substrate: &mut dyn Substrate,
        inputs: PipelineInputs<'_>,
    ) -> TopologyResult<PipelineOutputs> {
        let layer = Layer::Pipeline;
        let mode = ctx.profile.mode;
        let branch = self
            .config
            .source
            .branch
            .as_deref()
            .unwrap_or(ctx.profile.default_branch);

        let artifact_bucket = substrate.declare(
            ResourceNode::new(ctx.id(layer, "artifacts"), ResourceKind::Bucket, layer)
                .removal(ctx.profile.stateful_removal)
                .prop(
                    "PublicAccessBlockConfiguration",
                    Properties::new()
                        .with("BlockPublicAcls", true)
                        .with("BlockPublicPolicy", true)
                        .with("IgnorePublicAcls", true)
                        .with("RestrictPublicBuckets", true),
                )
                .prop(
                    "BucketEncryption",
                    Properties::new().with(
                        "ServerSideEncryptionConfiguration",
                        Property::list(vec![Properties::new().with(
                            "ServerSideEncryptionByDefault",
                            Properties::new().with("SSEAlgorithm", "AES256"),
                        )]),
                    ),
                ),
        )?;

        let log_name = format!("/codebuild/{}", ctx.name(layer, "build"));
        let log_group = substrate.declare(
            ResourceNode::new(ctx.id(layer, "build-logs"), ResourceKind::LogGroup, layer)
                .removal(ctx.profile.stateful_removal)
                .prop("LogGroupName", &log_name),
        )?;

        let environment = self.environment(ctx, &inputs);
        let build_role = substrate.declare(
            ResourceNode::new(ctx.id(layer, "build-role"), ResourceKind::Role, layer)
                .prop("AssumeRolePolicyDocument", assume_role_policy("codebuild.amazonaws.com"))
                .prop(
                    "Policies",
                    Property::list(vec![Properties::new()
                        .with("PolicyName", ctx.name(layer, "build"))
                        .with(
                            "PolicyDocument",
                            policy_document(self.build_statements(&inputs, &log_group, &artifact_bucket)),
                        )]),
                ),
        )?;

        let project_name = ctx.name(layer, "build");
        let network = inputs.network;
        let build_project = substrate.declare(
            ResourceNode::new(ctx.id(layer, "build"), ResourceKind::BuildProject, layer)
                .named(&project_name)
                .prop("Name", &project_name)
                .prop("ServiceRole", build_role.attr("Arn"))
                .prop("Artifacts", Properties::new().with("Type", "CODEPIPELINE"))
                .prop(
                    "Source",
                    Properties::new()
                        .with("Type", "CODEPIPELINE")
                        .with("BuildSpec", &self.config.build_spec),
                )
                .prop(
                    "Environment",
                    Properties::new()
                        .with("Type", "LINUX_CONTAINER")
                        .with("Image", BUILD_IMAGE)
                        .with("ComputeType", "BUILD_GENERAL1_SMALL")
                        .with("PrivilegedMode", true)
                        .with(
                            "EnvironmentVariables",
                            Property::list(
                                environment.iter().map(|(name, value)| value.to_property(name)),
                            ),
                        ),
                )
                .prop(
                    "VpcConfig",
                    Properties::new()
                        .with("VpcId", network.vpc.reference())
                        .with("Subnets", network.private.ids())
                        .with(
                            "SecurityGroupIds",
                            network.security_groups.ids(SecurityGroupKind::Private),
                        ),
                )
                .prop(
                    "LogsConfig",
                    Properties::new().with(
                        "CloudWatchLogs",
                        Properties::new()
                            .with("Status", "ENABLED")
                            .with("GroupName", log_group.reference()),
                    ),
                ),
        )?;

        let plan = self.plan(ctx, branch, &build_project, inputs.compute);
        plan.ensure_valid(mode)?;

        let pipeline_role = substrate.declare(
            ResourceNode::new(ctx.id(layer, "pipeline-role"), ResourceKind::Role, layer)
                .prop("AssumeRolePolicyDocument", assume_role_policy("codepipeline.amazonaws.com"))
                .prop(
                    "Policies",
                    Property::list(vec![Properties::new()
                        .with("PolicyName", ctx.name(layer, "pipeline"))
                        .with(
                            "PolicyDocument",
                            policy_document(self.pipeline_statements(&inputs, &build_project, &artifact_bucket)),
                        )]),
                ),
        )?;

        let pipeline_name = ctx.name(layer, "pipeline");
        let pipeline = substrate.declare(
            ResourceNode::new(ctx.id(layer, "pipeline"), ResourceKind::Pipeline, layer)
                .named(&pipeline_name)
                .prop("Name", &pipeline_name)
                .prop("RoleArn", pipeline_role.attr("Arn"))
                .prop("RestartExecutionOnUpdate", false)
                .prop(
                    "ArtifactStore",
                    Properties::new()
                        .with("Type", "S3")
                        .with("Location", artifact_bucket.reference()),
                )
                .prop(
                    "Stages",
                    Property::list(plan.stages().iter().map(PipelineStage::to_property)),
                ),
        )?;

        substrate.output(StackOutput::new(
            "pipelineName",
            layer,
            &pipeline_name,
            "Name of the release pipeline",
        ))?;

        info!(
            "Pipeline layer: {} on branch {} with stages {:?}",
            pipeline_name,
            branch,
            plan.kinds()
        );

        Ok(PipelineOutputs {
            pipeline,
            build_project,
            artifact_bucket,
            plan,
            environment,
        })
    }

    /// Build environment. Secret material is only ever passed by handle.
    fn environment(
        &self,
        ctx: &LayerContext<'_>,
        inputs: &PipelineInputs<'_>,
    ) -> BTreeMap<String, BuildValue> {
        let plain = |value: Property| BuildValue::Plain(value);
        let web = &inputs.compute.web;
        let worker = &inputs.compute.worker;
        let registry = inputs.registry;
        let db = &inputs.data.database;
        let credential = &inputs.messaging.credential;

        let mut env = BTreeMap::new();
        let mut set = |name: &str, value: BuildValue| {
            env.insert(name.to_string(), value);
        };

        set("AWS_ACCOUNT_ID", plain(ctx.account.map(Property::from).unwrap_or_else(account_id)));
        set("AWS_REGION", plain(ctx.region.into()));
        set("DB_NAME", plain((&db.name).into()));
        set("DB_HOST", plain(db.endpoint.clone().into()));
        set("DB_PORT", plain(db.port_value()));
        set("DB_USER", BuildValue::Secret(inputs.secrets.db_credential.field("username")));
        set("DB_PASSWORD", BuildValue::Secret(inputs.secrets.db_credential.field("password")));
        set("APP_SECRET_KEY", BuildValue::Secret(inputs.secrets.app_secret.field("key")));
        set("CACHE_HOST", plain(inputs.cache.endpoint.host.clone().into()));
        set("CACHE_PORT", plain(inputs.cache.endpoint.port_value()));
        set("QUEUE_URL", plain(inputs.messaging.main_queue.url().into()));
        set("QUEUE_REGION", plain(ctx.region.into()));
        set("QUEUE_ACCESS_KEY_ID", plain(credential.access_key_id().into()));
        set("QUEUE_SECRET_ACCESS_KEY", BuildValue::Secret(credential.secret_access_key()));
        set("APP_REPO_URI", plain(registry.app.uri().into()));
        set("PROXY_REPO_URI", plain(registry.proxy.uri().into()));
        set("WORKER_REPO_URI", plain(registry.worker.uri().into()));
        set("WEB_CONTAINER_NAMES", plain(web.containers.join(",").into()));
        set("WORKER_CONTAINER_NAME", plain(worker.containers.join(",").into()));
        env
    }

    fn plan(
        &self,
        ctx: &LayerContext<'_>,
        branch: &str,
        build_project: &ResourceRef,
        compute: &ComputeOutputs,
    ) -> PipelinePlan {
        let source = &self.config.source;
        let mut plan = PipelinePlan::new().with_stage(
            PipelineStage::new(StageKind::Source).with_action(
                PipelineAction::new("Checkout", ActionCategory::Source, "CodeStarSourceConnection")
                    .with_output(SOURCE_ARTIFACT)
                    .with_config("ConnectionArn", &source.connection_arn)
                    .with_config("FullRepositoryId", format!("{}/{}", source.owner, source.repository))
                    .with_config("BranchName", branch)
                    .with_config("OutputArtifactFormat", "CODE_ZIP"),
            ),
        );

        if ctx.profile.manual_approval {
            plan = plan.with_stage(
                PipelineStage::new(StageKind::Approve).with_action(
                    PipelineAction::new("ManualApproval", ActionCategory::Approval, "Manual")
                        .with_config("CustomData", format!("Approve release of {branch}")),
                ),
            );
        }

        let deploy = |service: &ServiceHandle, artifact: &str| {
            PipelineAction::new(
                format!("Deploy{}", artifact.trim_end_matches("Image")),
                ActionCategory::Deploy,
                "ECS",
            )
            .with_run_order(1)
            .with_input(artifact)
            .with_config("ClusterName", &compute.cluster_name)
            .with_config("ServiceName", &service.name)
            .with_config("FileName", IMAGE_DEFINITIONS)
        };

        plan.with_stage(
            PipelineStage::new(StageKind::Build).with_action(
                PipelineAction::new("BuildImages", ActionCategory::Build, "CodeBuild")
                    .with_input(SOURCE_ARTIFACT)
                    .with_output("WebImage")
                    .with_output("WorkerImage")
                    .with_config("ProjectName", build_project.reference()),
            ),
        )
        .with_stage(
            PipelineStage::new(StageKind::Deploy)
                .with_action(deploy(&compute.web, "WebImage"))
                .with_action(deploy(&compute.worker, "WorkerImage")),
        )
    }

    fn build_statements(
        &self,
        inputs: &PipelineInputs<'_>,
        log_group: &ResourceRef,
        bucket: &ResourceRef,
    ) -> Vec<Property> {
        let secrets = inputs.secrets;
        let repositories: Vec<Property> = inputs
            .registry
            .all()
            .iter()
            .map(|repo| Property::from(repo.arn()))
            .collect();

        vec![
            allow_statement(
                vec!["secretsmanager:GetSecretValue"],
                vec![
                    secrets.app_secret.arn().into(),
                    secrets.db_credential.arn().into(),
                    secrets.service_user.secret.arn().into(),
                ],
            ),
            allow_statement(
                vec![
                    "ecr:BatchCheckLayerAvailability",
                    "ecr:BatchGetImage",
                    "ecr:CompleteLayerUpload",
                    "ecr:GetDownloadUrlForLayer",
                    "ecr:InitiateLayerUpload",
                    "ecr:PutImage",
                    "ecr:UploadLayerPart",
                ],
                repositories,
            ),
            allow_statement(vec!["ecr:GetAuthorizationToken"], vec!["*".into()]),
            allow_statement(
                vec!["logs:CreateLogStream", "logs:PutLogEvents"],
                vec![log_group.attr("Arn").into()],
            ),
            allow_statement(
                vec!["s3:GetObject", "s3:PutObject"],
                vec![bucket_objects(bucket)],
            ),
            allow_statement(
                vec![
                    "ec2:CreateNetworkInterface",
                    "ec2:CreateNetworkInterfacePermission",
                    "ec2:DeleteNetworkInterface",
                    "ec2:DescribeDhcpOptions",
                    "ec2:DescribeNetworkInterfaces",
                    "ec2:DescribeSecurityGroups",
                    "ec2:DescribeSubnets",
                    "ec2:DescribeVpcs",
                ],
                vec!["*".into()],
            ),
        ]
    }

    fn pipeline_statements(
        &self,
        inputs: &PipelineInputs<'_>,
        build_project: &ResourceRef,
        bucket: &ResourceRef,
    ) -> Vec<Property> {
        let compute = inputs.compute;
        let task_roles: Vec<Property> = [&compute.web, &compute.worker]
            .iter()
            .flat_map(|s| {
                [
                    Property::from(s.task_role.attr("Arn")),
                    Property::from(s.execution_role.attr("Arn")),
                ]
            })
            .collect();

        vec![
            allow_statement(
                vec!["codebuild:BatchGetBuilds", "codebuild:StartBuild"],
                vec![build_project.attr("Arn").into()],
            ),
            allow_statement(
                vec!["codestar-connections:UseConnection"],
                vec![(&self.config.source.connection_arn).into()],
            ),
            allow_statement(
                vec!["s3:GetObject", "s3:PutObject", "s3:GetBucketVersioning"],
                vec![bucket.attr("Arn").into(), bucket_objects(bucket)],
            ),
            allow_statement(
                vec![
                    "ecs:DescribeServices",
                    "ecs:DescribeTaskDefinition",
                    "ecs:RegisterTaskDefinition",
                    "ecs:UpdateService",
                ],
                vec!["*".into()],
            ),
            allow_statement(vec!["iam:PassRole"], task_roles),
        ]
    }
}

fn bucket_objects(bucket: &ResourceRef) -> Property {
    Property::join("", vec![bucket.attr("Arn").into(), "/*".into()])
}

/// Account id of the deploying account, resolved by the provider.
fn account_id() -> Property {
    Properties::new().with("Ref", "AWS::AccountId").into()
}
