//! Security boundary graph.
//!
//! Security groups form a small trust hierarchy:
//!
//! ```text
//! internet -> public | bastion -> private -> cache | filesystem | isolated
//! ```
//!
//! Each ingress rule is an edge from a source to a target group on one port.
//! [`SecurityBoundaryGraph::violations`] checks that every edge points up the
//! hierarchy, that the internet only reaches the two public entry points, and
//! that the isolated tier cannot be reached from the public tier without
//! passing through the private tier.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

pub const HTTP_PORT: u16 = 80;
pub const HTTPS_PORT: u16 = 443;
pub const SSH_PORT: u16 = 22;
pub const MEMCACHED_PORT: u16 = 11211;
pub const NFS_PORT: u16 = 2049;
pub const MYSQL_PORT: u16 = 3306;

/// Security groups of the topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SecurityGroupKind {
    Public,
    Private,
    Bastion,
    Cache,
    FileSystem,
    Isolated,
}

impl SecurityGroupKind {
    pub fn all() -> [SecurityGroupKind; 6] {
        [
            SecurityGroupKind::Public,
            SecurityGroupKind::Private,
            SecurityGroupKind::Bastion,
            SecurityGroupKind::Cache,
            SecurityGroupKind::FileSystem,
            SecurityGroupKind::Isolated,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityGroupKind::Public => "public",
            SecurityGroupKind::Private => "private",
            SecurityGroupKind::Bastion => "bastion",
            SecurityGroupKind::Cache => "cache",
            SecurityGroupKind::FileSystem => "filesystem",
            SecurityGroupKind::Isolated => "isolated",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SecurityGroupKind::Public => "Load balancer ingress from the internet",
            SecurityGroupKind::Private => "Application services",
            SecurityGroupKind::Bastion => "Operator SSH access",
            SecurityGroupKind::Cache => "Cache nodes",
            SecurityGroupKind::FileSystem => "Shared filesystem mount targets",
            SecurityGroupKind::Isolated => "Relational database",
        }
    }

    pub fn tier(&self) -> TrustTier {
        match self {
            SecurityGroupKind::Public | SecurityGroupKind::Bastion => TrustTier::Public,
            SecurityGroupKind::Private => TrustTier::Private,
            SecurityGroupKind::Cache
            | SecurityGroupKind::FileSystem
            | SecurityGroupKind::Isolated => TrustTier::Restricted,
        }
    }
}

impl fmt::Display for SecurityGroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trust level; traffic may only flow towards higher tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrustTier {
    Internet,
    Public,
    Private,
    Restricted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Peer {
    AnyIpv4,
    Group(SecurityGroupKind),
}

impl Peer {
    pub fn tier(&self) -> TrustTier {
        match self {
            Peer::AnyIpv4 => TrustTier::Internet,
            Peer::Group(kind) => kind.tier(),
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::AnyIpv4 => f.write_str("0.0.0.0/0"),
            Peer::Group(kind) => write!(f, "{kind}"),
        }
    }
}

/// Ports the rules are built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServicePorts {
    pub app: u16,
    pub cache: u16,
    pub nfs: u16,
    pub database: u16,
}

impl ServicePorts {
    pub fn with_app_port(app: u16) -> Self {
        Self {
            app,
            cache: MEMCACHED_PORT,
            nfs: NFS_PORT,
            database: MYSQL_PORT,
        }
    }
}

/// One allowed TCP flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    pub source: Peer,
    pub target: SecurityGroupKind,
    pub port: u16,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityBoundaryGraph {
    rules: Vec<IngressRule>,
}

impl SecurityBoundaryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The rule set every topology uses.
    pub fn standard(ports: ServicePorts) -> Self {
        use SecurityGroupKind::*;

        let mut graph = Self::new();
        graph
            .allow(Peer::AnyIpv4, Public, HTTP_PORT, "HTTP from anywhere")
            .allow(Peer::AnyIpv4, Public, HTTPS_PORT, "HTTPS from anywhere")
            .allow(Peer::Group(Public), Private, ports.app, "App traffic from load balancer")
            .allow(Peer::AnyIpv4, Bastion, SSH_PORT, "SSH from anywhere")
            .allow(Peer::Group(Private), Cache, ports.cache, "Cache access from services")
            .allow(Peer::Group(Private), FileSystem, ports.nfs, "NFS from services")
            .allow(Peer::Group(Private), Isolated, ports.database, "Database access from services")
            .allow(Peer::Group(Bastion), Isolated, ports.database, "Database access from bastion");
        graph
    }

    pub fn allow(
        &mut self,
        source: Peer,
        target: SecurityGroupKind,
        port: u16,
        description: impl Into<String>,
    ) -> &mut Self {
        self.rules.push(IngressRule {
            source,
            target,
            port,
            description: description.into(),
        });
        self
    }

    pub fn rules(&self) -> &[IngressRule] {
        &self.rules
    }

    pub fn ingress_for(&self, target: SecurityGroupKind) -> impl Iterator<Item = &IngressRule> {
        self.rules.iter().filter(move |r| r.target == target)
    }

    /// True if `to` is reachable from `from` along group-to-group edges,
    /// optionally without passing through `avoiding`.
    pub fn reachable(
        &self,
        from: SecurityGroupKind,
        to: SecurityGroupKind,
        avoiding: Option<SecurityGroupKind>,
    ) -> bool {
        let mut seen = BTreeSet::from([from]);
        let mut queue = VecDeque::from([from]);

        while let Some(current) = queue.pop_front() {
            if current == to {
                return true;
            }
            for rule in &self.rules {
                if rule.source != Peer::Group(current) || Some(rule.target) == avoiding {
                    continue;
                }
                if seen.insert(rule.target) {
                    queue.push_back(rule.target);
                }
            }
        }
        false
    }

    /// Every rule that breaks the trust hierarchy, as readable messages.
    pub fn violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let mut seen = BTreeSet::new();

        for rule in &self.rules {
            let edge = format!("{} -> {}:{}", rule.source, rule.target, rule.port);

            if rule.port == 0 {
                violations.push(format!("{edge}: port must be explicit"));
            }
            if !seen.insert((rule.source, rule.target, rule.port)) {
                violations.push(format!("{edge}: duplicate rule"));
            }

            match rule.source {
                Peer::AnyIpv4 => {
                    let entry_point = matches!(
                        (rule.target, rule.port),
                        (SecurityGroupKind::Public, HTTP_PORT | HTTPS_PORT)
                            | (SecurityGroupKind::Bastion, SSH_PORT)
                    );
                    if !entry_point {
                        violations.push(format!("{edge}: internet ingress not allowed here"));
                    }
                }
                Peer::Group(source) => {
                    if source.tier() >= rule.target.tier() {
                        violations.push(format!("{edge}: traffic must flow to a higher trust tier"));
                    } else if rule.target.tier() == TrustTier::Restricted
                        && source != SecurityGroupKind::Private
                        && !(source == SecurityGroupKind::Bastion
                            && rule.target == SecurityGroupKind::Isolated)
                    {
                        violations.push(format!("{edge}: restricted tier skipped private tier"));
                    }
                }
            }
        }

        if self.reachable(
            SecurityGroupKind::Public,
            SecurityGroupKind::Isolated,
            Some(SecurityGroupKind::Private),
        ) {
            violations.push("isolated tier reachable from public tier without private tier".into());
        }

        violations
    }
}
