//! Release pipeline plan.
//!
//! A [`PipelinePlan`] is an ordered list of stages. Ordering rules are
//! checked by [`PipelinePlan::violations`]: source first, an approval gate
//! only in prod, build immediately before deploy, deploy last. Within a stage
//! actions sharing a run order execute concurrently; only the deploy stage
//! may do that.

use std::collections::BTreeSet;
use std::fmt;

use strata_config::DeploymentMode;

use crate::error::{TopologyError, TopologyResult};
use crate::resource::{Properties, Property};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StageKind {
    Source,
    Approve,
    Build,
    Deploy,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Source => "Source",
            StageKind::Approve => "Approve",
            StageKind::Build => "Build",
            StageKind::Deploy => "Deploy",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCategory {
    Source,
    Approval,
    Build,
    Deploy,
}

impl ActionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionCategory::Source => "Source",
            ActionCategory::Approval => "Approval",
            ActionCategory::Build => "Build",
            ActionCategory::Deploy => "Deploy",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineAction {
    pub name: String,
    pub category: ActionCategory,
    pub provider: String,
    pub run_order: u32,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub configuration: Properties,
}

impl PipelineAction {
    pub fn new(name: impl Into<String>, category: ActionCategory, provider: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category,
            provider: provider.into(),
            run_order: 1,
            inputs: Vec::new(),
            outputs: Vec::new(),
            configuration: Properties::new(),
        }
    }

    pub fn with_run_order(mut self, run_order: u32) -> Self {
        self.run_order = run_order;
        self
    }

    pub fn with_input(mut self, artifact: impl Into<String>) -> Self {
        self.inputs.push(artifact.into());
        self
    }

    pub fn with_output(mut self, artifact: impl Into<String>) -> Self {
        self.outputs.push(artifact.into());
        self
    }

    pub fn with_config(mut self, key: &str, value: impl Into<Property>) -> Self {
        self.configuration.insert(key, value);
        self
    }

    /// Provider action declaration.
    pub fn to_property(&self) -> Property {
        let artifacts = |names: &[String]| {
            Property::list(
                names
                    .iter()
                    .map(|name| Properties::new().with("Name", name)),
            )
        };
        Properties::new()
            .with("Name", &self.name)
            .with(
                "ActionTypeId",
                Properties::new()
                    .with("Category", self.category.as_str())
                    .with("Owner", "AWS")
                    .with("Provider", &self.provider)
                    .with("Version", "1"),
            )
            .with("RunOrder", self.run_order)
            .with("Configuration", self.configuration.clone())
            .with("InputArtifacts", artifacts(&self.inputs))
            .with("OutputArtifacts", artifacts(&self.outputs))
            .into()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStage {
    pub kind: StageKind,
    pub actions: Vec<PipelineAction>,
}

impl PipelineStage {
    pub fn new(kind: StageKind) -> Self {
        Self {
            kind,
            actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: PipelineAction) -> Self {
        self.actions.push(action);
        self
    }

    /// True if two or more actions share a run order.
    pub fn has_parallel_actions(&self) -> bool {
        let mut orders = BTreeSet::new();
        self.actions.iter().any(|a| !orders.insert(a.run_order))
    }

    pub fn to_property(&self) -> Property {
        Properties::new()
            .with("Name", self.kind.as_str())
            .with(
                "Actions",
                Property::list(self.actions.iter().map(PipelineAction::to_property)),
            )
            .into()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelinePlan {
    stages: Vec<PipelineStage>,
}

impl PipelinePlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, stage: PipelineStage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    pub fn stage(&self, kind: StageKind) -> Option<&PipelineStage> {
        self.stages.iter().find(|s| s.kind == kind)
    }

    pub fn kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.kind).collect()
    }

    /// Ordering violations for the given mode.
    pub fn violations(&self, mode: DeploymentMode) -> Vec<String> {
        let mut violations = Vec::new();
        let kinds = self.kinds();

        if kinds.first() != Some(&StageKind::Source) {
            violations.push("first stage must be Source".to_string());
        }
        if kinds.last() != Some(&StageKind::Deploy) {
            violations.push("last stage must be Deploy".to_string());
        }

        let mut seen = BTreeSet::new();
        for kind in &kinds {
            if !seen.insert(*kind) {
                violations.push(format!("stage {kind} appears more than once"));
            }
        }

        let approval = kinds.contains(&StageKind::Approve);
        match (mode.is_prod(), approval) {
            (true, false) => violations.push("prod pipeline requires an Approve stage".to_string()),
            (false, true) => violations.push("Approve stage is only used in prod".to_string()),
            _ => {}
        }

        let build = kinds.iter().position(|k| *k == StageKind::Build);
        let deploy = kinds.iter().position(|k| *k == StageKind::Deploy);
        match (build, deploy) {
            (Some(b), Some(d)) if d == b + 1 => {}
            _ => violations.push("Build must immediately precede Deploy".to_string()),
        }

        let mut produced = BTreeSet::new();
        for stage in &self.stages {
            if stage.actions.is_empty() {
                violations.push(format!("stage {} has no actions", stage.kind));
            }
            if stage.kind != StageKind::Deploy && stage.has_parallel_actions() {
                violations.push(format!("stage {} runs actions concurrently", stage.kind));
            }
            for action in &stage.actions {
                for input in &action.inputs {
                    if !produced.contains(input) {
                        violations.push(format!(
                            "action {} consumes artifact {} before it is produced",
                            action.name, input
                        ));
                    }
                }
            }
            for action in &stage.actions {
                produced.extend(action.outputs.iter().cloned());
            }
        }

        violations
    }

    pub fn ensure_valid(&self, mode: DeploymentMode) -> TopologyResult<()> {
        let violations = self.violations(mode);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(TopologyError::InvalidPipeline(violations.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(kind: StageKind, category: ActionCategory) -> PipelineStage {
        PipelineStage::new(kind).with_action(PipelineAction::new(kind.as_str(), category, "X"))
    }

    fn plan(kinds: &[StageKind]) -> PipelinePlan {
        kinds.iter().fold(PipelinePlan::new(), |plan, kind| {
            let category = match kind {
                StageKind::Source => ActionCategory::Source,
                StageKind::Approve => ActionCategory::Approval,
                StageKind::Build => ActionCategory::Build,
                StageKind::Deploy => ActionCategory::Deploy,
            };
            plan.with_stage(stage(*kind, category))
        })
    }

    #[test]
    fn test_valid_orders() {
        use StageKind::*;
        assert!(plan(&[Source, Build, Deploy]).violations(DeploymentMode::Dev).is_empty());
        assert!(plan(&[Source, Approve, Build, Deploy])
            .violations(DeploymentMode::Prod)
            .is_empty());
    }

    #[test]
    fn test_approval_follows_mode() {
        use StageKind::*;
        assert!(!plan(&[Source, Build, Deploy]).violations(DeploymentMode::Prod).is_empty());
        assert!(!plan(&[Source, Approve, Build, Deploy])
            .violations(DeploymentMode::Dev)
            .is_empty());
    }

    #[test]
    fn test_build_must_precede_deploy() {
        use StageKind::*;
        let violations = plan(&[Source, Build, Approve, Deploy]).violations(DeploymentMode::Prod);
        assert!(violations.iter().any(|v| v.contains("immediately precede")));
        assert!(plan(&[Source, Deploy, Build]).ensure_valid(DeploymentMode::Dev).is_err());
    }

    #[test]
    fn test_parallel_actions_only_in_deploy() {
        let parallel = |kind| {
            PipelineStage::new(kind)
                .with_action(PipelineAction::new("a", ActionCategory::Deploy, "ECS"))
                .with_action(PipelineAction::new("b", ActionCategory::Deploy, "ECS"))
        };
        let ok = PipelinePlan::new()
            .with_stage(stage(StageKind::Source, ActionCategory::Source))
            .with_stage(stage(StageKind::Build, ActionCategory::Build))
            .with_stage(parallel(StageKind::Deploy));
        assert!(ok.violations(DeploymentMode::Dev).is_empty());

        let bad = PipelinePlan::new()
            .with_stage(stage(StageKind::Source, ActionCategory::Source))
            .with_stage(parallel(StageKind::Build))
            .with_stage(stage(StageKind::Deploy, ActionCategory::Deploy));
        assert!(bad.violations(DeploymentMode::Dev)[0].contains("concurrently"));
    }

    #[test]
    fn test_artifacts_must_be_produced_first() {
        let plan = PipelinePlan::new()
            .with_stage(stage(StageKind::Source, ActionCategory::Source))
            .with_stage(stage(StageKind::Build, ActionCategory::Build))
            .with_stage(
                PipelineStage::new(StageKind::Deploy).with_action(
                    PipelineAction::new("web", ActionCategory::Deploy, "ECS").with_input("WebImage"),
                ),
            );
        let violations = plan.violations(DeploymentMode::Dev);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("WebImage"));
    }
}
