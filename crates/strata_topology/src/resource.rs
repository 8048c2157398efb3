//! Resource graph model.
//!
//! A topology is a list of [`ResourceNode`]s. Each node has a stable logical
//! id, a provider resource kind, the layer that owns it and a property tree.
//! Property values may point at other nodes through [`Reference`]s and at
//! secret material through [`SecretRef`]s; both serialize to provider
//! intrinsics so the emitted document never contains resolved values.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// Stable logical identifier of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Topology layers in build order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Network,
    Secrets,
    Data,
    Storage,
    Cache,
    Registry,
    Edge,
    Compute,
    Messaging,
    Pipeline,
}

impl Layer {
    /// All layers in the order they are built.
    pub fn build_order() -> [Layer; 10] {
        [
            Layer::Network,
            Layer::Secrets,
            Layer::Data,
            Layer::Storage,
            Layer::Cache,
            Layer::Registry,
            Layer::Edge,
            Layer::Compute,
            Layer::Messaging,
            Layer::Pipeline,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Network => "network",
            Layer::Secrets => "secrets",
            Layer::Data => "data",
            Layer::Storage => "storage",
            Layer::Cache => "cache",
            Layer::Registry => "registry",
            Layer::Edge => "edge",
            Layer::Compute => "compute",
            Layer::Messaging => "messaging",
            Layer::Pipeline => "pipeline",
        }
    }

    /// Layers whose resources this layer may reference.
    pub fn dependencies(&self) -> &'static [Layer] {
        match self {
            Layer::Network | Layer::Secrets | Layer::Registry => &[],
            Layer::Data => &[Layer::Network, Layer::Secrets],
            Layer::Storage | Layer::Cache | Layer::Edge => &[Layer::Network],
            Layer::Compute => &[Layer::Network, Layer::Registry, Layer::Storage, Layer::Edge],
            Layer::Messaging => &[Layer::Secrets],
            Layer::Pipeline => &[
                Layer::Network,
                Layer::Secrets,
                Layer::Data,
                Layer::Storage,
                Layer::Cache,
                Layer::Registry,
                Layer::Edge,
                Layer::Compute,
                Layer::Messaging,
            ],
        }
    }

    pub fn may_reference(&self, other: Layer) -> bool {
        *self == other || self.dependencies().contains(&other)
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider resource kinds used by the layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Vpc,
    InternetGateway,
    GatewayAttachment,
    RouteTable,
    Route,
    RouteTableAssociation,
    ElasticIp,
    NatGateway,
    Subnet,
    SecurityGroup,
    SecurityGroupIngress,
    Instance,
    Secret,
    User,
    AccessKey,
    Role,
    Policy,
    DbParameterGroup,
    DbClusterParameterGroup,
    DbSubnetGroup,
    DbInstance,
    DbCluster,
    FileSystem,
    MountTarget,
    AccessPoint,
    CacheSubnetGroup,
    CacheCluster,
    Repository,
    LoadBalancer,
    TargetGroup,
    Listener,
    Cluster,
    TaskDefinition,
    Service,
    LogGroup,
    Queue,
    Bucket,
    BuildProject,
    Pipeline,
}

impl ResourceKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ResourceKind::Vpc => "AWS::EC2::VPC",
            ResourceKind::InternetGateway => "AWS::EC2::InternetGateway",
            ResourceKind::GatewayAttachment => "AWS::EC2::VPCGatewayAttachment",
            ResourceKind::RouteTable => "AWS::EC2::RouteTable",
            ResourceKind::Route => "AWS::EC2::Route",
            ResourceKind::RouteTableAssociation => "AWS::EC2::SubnetRouteTableAssociation",
            ResourceKind::ElasticIp => "AWS::EC2::EIP",
            ResourceKind::NatGateway => "AWS::EC2::NatGateway",
            ResourceKind::Subnet => "AWS::EC2::Subnet",
            ResourceKind::SecurityGroup => "AWS::EC2::SecurityGroup",
            ResourceKind::SecurityGroupIngress => "AWS::EC2::SecurityGroupIngress",
            ResourceKind::Instance => "AWS::EC2::Instance",
            ResourceKind::Secret => "AWS::SecretsManager::Secret",
            ResourceKind::User => "AWS::IAM::User",
            ResourceKind::AccessKey => "AWS::IAM::AccessKey",
            ResourceKind::Role => "AWS::IAM::Role",
            ResourceKind::Policy => "AWS::IAM::Policy",
            ResourceKind::DbParameterGroup => "AWS::RDS::DBParameterGroup",
            ResourceKind::DbClusterParameterGroup => "AWS::RDS::DBClusterParameterGroup",
            ResourceKind::DbSubnetGroup => "AWS::RDS::DBSubnetGroup",
            ResourceKind::DbInstance => "AWS::RDS::DBInstance",
            ResourceKind::DbCluster => "AWS::RDS::DBCluster",
            ResourceKind::FileSystem => "AWS::EFS::FileSystem",
            ResourceKind::MountTarget => "AWS::EFS::MountTarget",
            ResourceKind::AccessPoint => "AWS::EFS::AccessPoint",
            ResourceKind::CacheSubnetGroup => "AWS::ElastiCache::SubnetGroup",
            ResourceKind::CacheCluster => "AWS::ElastiCache::CacheCluster",
            ResourceKind::Repository => "AWS::ECR::Repository",
            ResourceKind::LoadBalancer => "AWS::ElasticLoadBalancingV2::LoadBalancer",
            ResourceKind::TargetGroup => "AWS::ElasticLoadBalancingV2::TargetGroup",
            ResourceKind::Listener => "AWS::ElasticLoadBalancingV2::Listener",
            ResourceKind::Cluster => "AWS::ECS::Cluster",
            ResourceKind::TaskDefinition => "AWS::ECS::TaskDefinition",
            ResourceKind::Service => "AWS::ECS::Service",
            ResourceKind::LogGroup => "AWS::Logs::LogGroup",
            ResourceKind::Queue => "AWS::SQS::Queue",
            ResourceKind::Bucket => "AWS::S3::Bucket",
            ResourceKind::BuildProject => "AWS::CodeBuild::Project",
            ResourceKind::Pipeline => "AWS::CodePipeline::Pipeline",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// What happens to a resource when its topology is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalPolicy {
    Destroy,
    Retain,
}

impl RemovalPolicy {
    /// Provider deletion policy keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalPolicy::Destroy => "Delete",
            RemovalPolicy::Retain => "Retain",
        }
    }
}

/// Pointer to another node, optionally to one of its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub target: ResourceId,
    pub attribute: Option<String>,
}

impl Reference {
    pub fn to(target: ResourceId) -> Self {
        Self {
            target,
            attribute: None,
        }
    }

    pub fn attr(target: ResourceId, attribute: impl Into<String>) -> Self {
        Self {
            target,
            attribute: Some(attribute.into()),
        }
    }
}

impl Serialize for Reference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match &self.attribute {
            None => map.serialize_entry("Ref", &self.target)?,
            Some(attribute) => {
                map.serialize_entry("Fn::GetAtt", &(&self.target, attribute))?
            }
        }
        map.end()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.attribute {
            None => write!(f, "${{{}}}", self.target),
            Some(attribute) => write!(f, "${{{}.{}}}", self.target, attribute),
        }
    }
}

/// Handle to a value stored inside a secret. Never carries the value itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRef {
    pub secret: ResourceId,
    pub field: Option<String>,
}

impl SecretRef {
    pub fn new(secret: ResourceId, field: Option<String>) -> Self {
        Self { secret, field }
    }

    /// Dynamic reference resolved by the provider at deploy time.
    pub fn dynamic_reference(&self) -> Property {
        let suffix = match &self.field {
            Some(field) => format!(":SecretString:{field}}}}}"),
            None => "}}".to_string(),
        };
        Property::join(
            "",
            vec![
                Property::from("{{resolve:secretsmanager:"),
                Property::Ref(Reference::to(self.secret.clone())),
                Property::from(suffix),
            ],
        )
    }

    /// `secret-arn:field` form consumed by build environments.
    pub fn arn_form(&self) -> Property {
        let mut parts = vec![Property::Ref(Reference::to(self.secret.clone()))];
        if let Some(field) = &self.field {
            parts.push(Property::from(field.as_str()));
        }
        Property::join(":", parts)
    }
}

impl Serialize for SecretRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.dynamic_reference().serialize(serializer)
    }
}

/// Property value of a resource node.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Property>),
    Map(Properties),
    Ref(Reference),
    Secret(SecretRef),
    /// The n-th availability zone of the deployment region.
    AvailabilityZone(u8),
    Join { separator: String, parts: Vec<Property> },
}

impl Property {
    pub fn join(separator: impl Into<String>, parts: Vec<Property>) -> Self {
        Property::Join {
            separator: separator.into(),
            parts,
        }
    }

    /// A JSON object rendered as a string at deploy time, e.g. for
    /// `SecretString`. Values are emitted as JSON strings without escaping.
    pub fn json_string(fields: Vec<(&str, Property)>) -> Self {
        let mut parts = Vec::with_capacity(fields.len() * 2 + 1);
        for (i, (key, value)) in fields.into_iter().enumerate() {
            let lead = if i == 0 { "{" } else { "\"," };
            parts.push(Property::Str(format!("{lead}\"{key}\":\"")));
            parts.push(value);
        }
        parts.push(Property::Str(if parts.is_empty() { "{}" } else { "\"}" }.to_string()));
        Property::join("", parts)
    }

    pub fn list<T: Into<Property>>(items: impl IntoIterator<Item = T>) -> Self {
        Property::List(items.into_iter().map(Into::into).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Property::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Property::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Property::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Property]> {
        match self {
            Property::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Property::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// Looks up a key when this property is a map.
    pub fn get(&self, key: &str) -> Option<&Property> {
        match self {
            Property::Map(props) => props.get(key),
            _ => None,
        }
    }

    /// Visits every property in this tree, depth first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Property)) {
        visit(self);
        match self {
            Property::List(items) | Property::Join { parts: items, .. } => {
                for item in items {
                    item.walk(visit);
                }
            }
            Property::Map(props) => {
                for (_, value) in props.iter() {
                    value.walk(visit);
                }
            }
            _ => {}
        }
    }

    /// Ids of every node this property points at.
    pub fn referenced_ids(&self) -> Vec<&ResourceId> {
        let mut ids = Vec::new();
        self.walk(&mut |prop| match prop {
            Property::Ref(r) => ids.push(&r.target),
            Property::Secret(s) => ids.push(&s.secret),
            _ => {}
        });
        ids
    }

    pub fn contains_secret(&self) -> bool {
        let mut found = false;
        self.walk(&mut |prop| {
            if matches!(prop, Property::Secret(_)) {
                found = true;
            }
        });
        found
    }

    /// True if any reference in this tree reads the given attribute.
    pub fn reads_attribute(&self, attribute: &str) -> bool {
        let mut found = false;
        self.walk(&mut |prop| {
            if let Property::Ref(r) = prop {
                if r.attribute.as_deref() == Some(attribute) {
                    found = true;
                }
            }
        });
        found
    }
}

impl Serialize for Property {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Property::Null => serializer.serialize_unit(),
            Property::Bool(b) => serializer.serialize_bool(*b),
            Property::Int(i) => serializer.serialize_i64(*i),
            Property::Str(s) => serializer.serialize_str(s),
            Property::List(items) => items.serialize(serializer),
            Property::Map(props) => props.serialize(serializer),
            Property::Ref(r) => r.serialize(serializer),
            Property::Secret(s) => s.serialize(serializer),
            Property::AvailabilityZone(index) => {
                let mut azs = BTreeMap::new();
                azs.insert("Fn::GetAZs", "");
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::Select", &(index, azs))?;
                map.end()
            }
            Property::Join { separator, parts } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::Join", &(separator, parts))?;
                map.end()
            }
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::Null => f.write_str("null"),
            Property::Bool(b) => write!(f, "{b}"),
            Property::Int(i) => write!(f, "{i}"),
            Property::Str(s) => f.write_str(s),
            Property::Ref(r) => write!(f, "{r}"),
            Property::Secret(s) => match &s.field {
                Some(field) => write!(f, "{{{{secret:{}:{}}}}}", s.secret, field),
                None => write!(f, "{{{{secret:{}}}}}", s.secret),
            },
            Property::AvailabilityZone(index) => write!(f, "${{AZ[{index}]}}"),
            Property::Join { separator, parts } => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(separator)?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
            Property::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Property::Map(_) => f.write_str("{...}"),
        }
    }
}

macro_rules! int_property {
    ($($t:ty),*) => {
        $(impl From<$t> for Property {
            fn from(value: $t) -> Self {
                Property::Int(i64::from(value))
            }
        })*
    };
}

int_property!(u8, u16, u32, i32, i64);

impl From<bool> for Property {
    fn from(value: bool) -> Self {
        Property::Bool(value)
    }
}

impl From<&str> for Property {
    fn from(value: &str) -> Self {
        Property::Str(value.to_string())
    }
}

impl From<String> for Property {
    fn from(value: String) -> Self {
        Property::Str(value)
    }
}

impl From<&String> for Property {
    fn from(value: &String) -> Self {
        Property::Str(value.clone())
    }
}

impl From<Reference> for Property {
    fn from(value: Reference) -> Self {
        Property::Ref(value)
    }
}

impl From<SecretRef> for Property {
    fn from(value: SecretRef) -> Self {
        Property::Secret(value)
    }
}

impl From<Properties> for Property {
    fn from(value: Properties) -> Self {
        Property::Map(value)
    }
}

impl<T: Into<Property>> From<Vec<T>> for Property {
    fn from(value: Vec<T>) -> Self {
        Property::list(value)
    }
}

impl<T: Into<Property>> From<Option<T>> for Property {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Property::Null)
    }
}

/// Ordered property map. Keys serialize in sorted order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(BTreeMap<String, Property>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert. Null values are skipped.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Property>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Property>) {
        let value = value.into();
        if value != Property::Null {
            self.0.insert(key.into(), value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Property> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Property)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Properties {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// A declared infrastructure resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceNode {
    pub id: ResourceId,
    pub kind: ResourceKind,
    pub layer: Layer,
    pub name: Option<String>,
    pub removal: Option<RemovalPolicy>,
    /// Explicit ordering for dependencies no property expresses.
    pub depends_on: Vec<ResourceId>,
    pub properties: Properties,
}

impl ResourceNode {
    pub fn new(id: ResourceId, kind: ResourceKind, layer: Layer) -> Self {
        Self {
            id,
            kind,
            layer,
            name: None,
            removal: None,
            depends_on: Vec::new(),
            properties: Properties::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn removal(mut self, policy: RemovalPolicy) -> Self {
        self.removal = Some(policy);
        self
    }

    pub fn prop(mut self, key: impl Into<String>, value: impl Into<Property>) -> Self {
        self.properties.insert(key, value);
        self
    }

    /// Declares this node only after `other` exists.
    pub fn after(mut self, other: &ResourceRef) -> Self {
        self.depends_on.push(other.id().clone());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Property> {
        self.properties.get(key)
    }

    /// Ids of every node this node points at, explicit dependencies included.
    pub fn references(&self) -> Vec<&ResourceId> {
        self.properties
            .iter()
            .flat_map(|(_, value)| value.referenced_ids())
            .chain(self.depends_on.iter())
            .collect()
    }

    pub fn reads_attribute(&self, attribute: &str) -> bool {
        self.properties
            .iter()
            .any(|(_, value)| value.reads_attribute(attribute))
    }
}

/// Handle to a node that has been declared on a substrate.
///
/// Handles are only produced by a substrate, so a layer can only wire to
/// resources that already exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    id: ResourceId,
    kind: ResourceKind,
    layer: Layer,
}

impl ResourceRef {
    pub(crate) fn new(id: ResourceId, kind: ResourceKind, layer: Layer) -> Self {
        Self { id, kind, layer }
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// Plain reference to the resource.
    pub fn reference(&self) -> Reference {
        Reference::to(self.id.clone())
    }

    /// Reference to an attribute of the resource.
    pub fn attr(&self, attribute: &str) -> Reference {
        Reference::attr(self.id.clone(), attribute)
    }
}

/// Named stack output.
#[derive(Debug, Clone, PartialEq)]
pub struct StackOutput {
    pub key: String,
    pub description: String,
    pub layer: Layer,
    pub value: Property,
}

impl StackOutput {
    pub fn new(
        key: impl Into<String>,
        layer: Layer,
        value: impl Into<Property>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
            layer,
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_serializes_to_intrinsics() {
        let plain = Property::Ref(Reference::to(ResourceId::new("Vpc")));
        assert_eq!(serde_json::to_string(&plain).unwrap(), r#"{"Ref":"Vpc"}"#);

        let attr = Property::Ref(Reference::attr(ResourceId::new("Db"), "Endpoint.Address"));
        assert_eq!(
            serde_json::to_string(&attr).unwrap(),
            r#"{"Fn::GetAtt":["Db","Endpoint.Address"]}"#
        );
    }

    #[test]
    fn test_secret_serializes_as_dynamic_reference() {
        let secret = Property::Secret(SecretRef::new(
            ResourceId::new("DbSecret"),
            Some("password".to_string()),
        ));
        let json = serde_json::to_string(&secret).unwrap();
        assert_eq!(
            json,
            r#"{"Fn::Join":["",["{{resolve:secretsmanager:",{"Ref":"DbSecret"},":SecretString:password}}"]]}"#
        );
    }

    #[test]
    fn test_secret_arn_form() {
        let secret = SecretRef::new(ResourceId::new("AppSecret"), Some("key".to_string()));
        let json = serde_json::to_string(&secret.arn_form()).unwrap();
        assert_eq!(json, r#"{"Fn::Join":[":",[{"Ref":"AppSecret"},"key"]]}"#);
    }

    #[test]
    fn test_availability_zone_serialization() {
        let az = Property::AvailabilityZone(1);
        assert_eq!(
            serde_json::to_string(&az).unwrap(),
            r#"{"Fn::Select":[1,{"Fn::GetAZs":""}]}"#
        );
    }

    #[test]
    fn test_properties_skip_null_and_sort_keys() {
        let props = Properties::new()
            .with("b", 1u8)
            .with("a", "x")
            .with("c", Option::<String>::None);
        assert_eq!(props.len(), 2);
        assert_eq!(serde_json::to_string(&props).unwrap(), r#"{"a":"x","b":1}"#);
    }

    #[test]
    fn test_node_references() {
        let node = ResourceNode::new(ResourceId::new("Sub"), ResourceKind::Subnet, Layer::Network)
            .prop("VpcId", Reference::to(ResourceId::new("Vpc")))
            .prop(
                "Nested",
                Properties::new().with("Group", Reference::attr(ResourceId::new("Sg"), "GroupId")),
            );
        let mut refs: Vec<_> = node.references().into_iter().map(|r| r.as_str()).collect();
        refs.sort();
        assert_eq!(refs, vec!["Sg", "Vpc"]);
    }

    #[test]
    fn test_contains_secret_and_attribute_reads() {
        let prop = Property::list(vec![
            Property::from("plain"),
            Property::Ref(Reference::attr(ResourceId::new("Key"), "SecretAccessKey")),
        ]);
        assert!(!prop.contains_secret());
        assert!(prop.reads_attribute("SecretAccessKey"));

        let secret = Property::Secret(SecretRef::new(ResourceId::new("S"), None));
        assert!(secret.contains_secret());
    }

    #[test]
    fn test_layer_dependencies() {
        assert!(Layer::Compute.may_reference(Layer::Edge));
        assert!(Layer::Compute.may_reference(Layer::Compute));
        assert!(!Layer::Compute.may_reference(Layer::Secrets));
        assert!(!Layer::Network.may_reference(Layer::Data));
        for layer in Layer::build_order() {
            assert!(Layer::Pipeline.may_reference(layer));
            for dep in layer.dependencies() {
                assert!(dep < &layer, "{layer} depends on later layer {dep}");
            }
        }
    }

    #[test]
    fn test_property_display() {
        let joined = Property::join(
            "",
            vec![
                Property::Ref(Reference::attr(ResourceId::new("Repo"), "RepositoryUri")),
                Property::from(":latest"),
            ],
        );
        assert_eq!(joined.to_string(), "${Repo.RepositoryUri}:latest");
    }

    #[test]
    fn test_json_string_renders_join() {
        let prop = Property::json_string(vec![
            ("username", "svc".into()),
            ("accessKeyId", Reference::to(ResourceId::new("Key")).into()),
        ]);
        assert_eq!(prop.to_string(), r#"{"username":"svc","accessKeyId":"${Key}"}"#);
        assert_eq!(
            serde_json::to_string(&prop).unwrap(),
            r#"{"Fn::Join":["",["{\"username\":\"","svc","\",\"accessKeyId\":\"",{"Ref":"Key"},"\"}"]]}"#
        );
        assert_eq!(Property::json_string(vec![]).to_string(), "{}");
    }
}
