//! Logical ids and physical names.

use strata_config::DeploymentMode;

use crate::resource::{Layer, ResourceId};

/// Derives identifiers for every resource from the project and mode.
///
/// Dev names carry a `Dev` / `-dev` suffix; prod names carry none. Both are
/// pure functions of their inputs, so assembling twice yields identical ids.
#[derive(Debug, Clone)]
pub struct NamingPolicy {
    project: String,
    mode: DeploymentMode,
}

impl NamingPolicy {
    pub fn new(project: impl Into<String>, mode: DeploymentMode) -> Self {
        Self {
            project: project.into(),
            mode,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    /// PascalCase logical id, e.g. `ShopNetworkVpcDev`.
    pub fn logical_id(&self, layer: Layer, kind: &str) -> ResourceId {
        let suffix = if self.mode.is_prod() { "" } else { "Dev" };
        ResourceId::new(format!(
            "{}{}{}{}",
            pascal_case(&self.project),
            pascal_case(layer.as_str()),
            pascal_case(kind),
            suffix
        ))
    }

    /// kebab-case physical name, e.g. `shop-network-vpc-dev`.
    pub fn physical_name(&self, layer: Layer, kind: &str) -> String {
        self.qualify(&format!(
            "{}-{}-{}",
            kebab_case(&self.project),
            layer.as_str(),
            kebab_case(kind)
        ))
    }

    /// Appends the mode suffix to a name chosen in configuration.
    pub fn qualify(&self, base: &str) -> String {
        if self.mode.is_prod() {
            base.to_string()
        } else {
            format!("{base}-dev")
        }
    }
}

fn words(s: &str) -> impl Iterator<Item = &str> {
    s.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
}

fn pascal_case(s: &str) -> String {
    words(s)
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

fn kebab_case(s: &str) -> String {
    words(s)
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}
