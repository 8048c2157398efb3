//! Whole-topology checks run after all layers are built.

use serde::Serialize;
use tracing::{debug, warn};

use crate::assembler::LayerOutputs;
use crate::profile::ModeProfile;
use crate::resource::{Property, ResourceKind};
use crate::security::SecurityGroupKind;
use crate::substrate::Topology;

/// Secret attribute of a programmatic access key.
const SECRET_KEY_ATTRIBUTE: &str = "SecretAccessKey";

/// Result of validating an assembled topology.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub checks: Vec<ValidationCheck>,
    pub passed: bool,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            checks: Vec::new(),
            passed: true,
        }
    }

    pub fn add_check(&mut self, name: &str, passed: bool, message: &str) {
        if !passed {
            self.passed = false;
        }
        self.checks.push(ValidationCheck {
            name: name.to_string(),
            passed,
            message: message.to_string(),
        });
    }

    /// Adds a check that passes when `problems` is empty.
    fn add_problems(&mut self, name: &str, problems: Vec<String>, ok: &str) {
        if problems.is_empty() {
            self.add_check(name, true, ok);
        } else {
            self.add_check(name, false, &problems.join("; "));
        }
    }

    pub fn failures(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| format!("{}: {}", c.name, c.message))
            .collect()
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationCheck {
    pub name: String,
    pub passed: bool,
    pub message: String,
}

pub struct TopologyValidator<'a> {
    profile: &'a ModeProfile,
}

impl<'a> TopologyValidator<'a> {
    pub fn new(profile: &'a ModeProfile) -> Self {
        Self { profile }
    }

    pub fn validate(&self, topology: &Topology, outputs: &LayerOutputs) -> ValidationReport {
        let mut report = ValidationReport::new();

        self.check_security(&mut report, outputs);
        self.check_pipeline(&mut report, outputs);
        self.check_capacity(&mut report, topology);
        self.check_data_contract(&mut report, topology, outputs);
        self.check_outputs(&mut report, topology);
        self.check_secret_material(&mut report, topology);

        for check in report.checks.iter().filter(|c| !c.passed) {
            warn!("Validation check '{}' failed: {}", check.name, check.message);
        }
        debug!("Ran {} validation checks", report.checks.len());
        report
    }

    fn check_security(&self, report: &mut ValidationReport, outputs: &LayerOutputs) {
        let boundary = &outputs.network.boundary;
        report.add_problems(
            "security-boundaries",
            boundary.violations(),
            "All ingress rules follow the trust hierarchy",
        );

        let bypass = boundary.reachable(
            SecurityGroupKind::Public,
            SecurityGroupKind::Isolated,
            Some(SecurityGroupKind::Private),
        );
        report.add_check(
            "least-privilege",
            !bypass,
            if bypass {
                "Isolated tier reachable from public tier without private tier"
            } else {
                "Isolated tier only reachable through private tier"
            },
        );
    }

    fn check_pipeline(&self, report: &mut ValidationReport, outputs: &LayerOutputs) {
        report.add_problems(
            "pipeline-order",
            outputs.pipeline.plan.violations(self.profile.mode),
            "Pipeline stages are correctly ordered",
        );
    }

    fn check_capacity(&self, report: &mut ValidationReport, topology: &Topology) {
        let weights = self.profile.capacity;
        let mut problems = Vec::new();
        if !weights.is_exclusive() {
            problems.push(format!(
                "capacity weights must select exactly one class (spot {}, on-demand {})",
                weights.spot, weights.on_demand
            ));
        }

        let strategies: Vec<&Property> = topology
            .nodes()
            .iter()
            .filter(|n| n.kind == ResourceKind::Service)
            .filter_map(|n| n.get("CapacityProviderStrategy"))
            .collect();
        if strategies.windows(2).any(|pair| pair[0] != pair[1]) {
            problems.push("services use different capacity strategies".to_string());
        }

        report.add_problems("capacity-weights", problems, "Services share one capacity class");
    }

    fn check_data_contract(
        &self,
        report: &mut ValidationReport,
        topology: &Topology,
        outputs: &LayerOutputs,
    ) {
        let db = &outputs.data.database;
        let mut problems = Vec::new();
        if db.name.is_empty() {
            problems.push("database name is empty".to_string());
        }
        if db.port == 0 {
            problems.push("database port is zero".to_string());
        }
        if topology.get(&db.endpoint.target).is_none() {
            problems.push(format!("database endpoint points at unknown {}", db.endpoint.target));
        }
        report.add_problems("data-contract", problems, "Database info is complete");
    }

    fn check_outputs(&self, report: &mut ValidationReport, topology: &Topology) {
        let problems = topology
            .outputs()
            .iter()
            .filter(|o| o.value.contains_secret() || o.value.reads_attribute(SECRET_KEY_ATTRIBUTE))
            .map(|o| format!("output {} exposes secret material", o.key))
            .collect();
        report.add_problems("no-secret-outputs", problems, "No output carries secret material");
    }

    fn check_secret_material(&self, report: &mut ValidationReport, topology: &Topology) {
        let problems = topology
            .nodes()
            .iter()
            .filter(|n| n.kind != ResourceKind::Secret && n.reads_attribute(SECRET_KEY_ATTRIBUTE))
            .map(|n| format!("{} reads {} outside a secret", n.id, SECRET_KEY_ATTRIBUTE))
            .collect();
        report.add_problems(
            "secret-material",
            problems,
            "Generated credentials only flow into secrets",
        );
    }
}
