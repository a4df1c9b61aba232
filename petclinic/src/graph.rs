use std::{
  collections::{BTreeMap, BTreeSet},
  fmt,
};

use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

use crate::{
  cluster::{Cluster, InterfaceVpcEndpoint, Nodegroup},
  database::ServerlessCluster,
  error::{Error, Result},
  helm::HelmChart,
  iam::Role,
  identity::{OpenIdConnectProvider, ServiceAccountBinding},
  k8s::{KubernetesResource, Manifest},
  network::{SecurityGroup, Vpc},
};

/// Logical identifier of a resource within the graph
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Placeholder for an attribute that is only known once the resource has been provisioned
  ///
  /// Rendered as `${<id>.<attribute>}` and resolved by the provisioning engine
  pub fn attribute(&self, attribute: &str) -> String {
    format!("${{{}.{attribute}}}", self.0)
  }
}

impl fmt::Display for ResourceId {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<&str> for ResourceId {
  fn from(id: &str) -> Self {
    Self(id.to_owned())
  }
}

/// Resources that point at other resources in the graph
///
/// Every reference becomes a dependency edge when the resource is added
pub trait References {
  fn references(&self) -> Vec<ResourceId>;
}

/// The kind of object a graph node describes
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
  Vpc,
  SecurityGroup,
  Cluster,
  Role,
  Nodegroup,
  VpcEndpoint,
  OpenIdConnectProvider,
  IdentityBinding,
  HelmChart,
  ServerlessCluster,
  Namespace,
  Deployment,
  Service,
  ServiceAccount,
  Ingress,
}

impl fmt::Display for Kind {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Kind::Vpc => write!(f, "AWS::EC2::VPC"),
      Kind::SecurityGroup => write!(f, "AWS::EC2::SecurityGroup"),
      Kind::Cluster => write!(f, "AWS::EKS::Cluster"),
      Kind::Role => write!(f, "AWS::IAM::Role"),
      Kind::Nodegroup => write!(f, "AWS::EKS::Nodegroup"),
      Kind::VpcEndpoint => write!(f, "AWS::EC2::VPCEndpoint"),
      Kind::OpenIdConnectProvider => write!(f, "Custom::OpenIdConnectProvider"),
      Kind::IdentityBinding => write!(f, "Custom::ServiceAccountBinding"),
      Kind::HelmChart => write!(f, "Custom::HelmChart"),
      Kind::ServerlessCluster => write!(f, "AWS::RDS::DBCluster"),
      Kind::Namespace => write!(f, "Kubernetes::Namespace"),
      Kind::Deployment => write!(f, "Kubernetes::Deployment"),
      Kind::Service => write!(f, "Kubernetes::Service"),
      Kind::ServiceAccount => write!(f, "Kubernetes::ServiceAccount"),
      Kind::Ingress => write!(f, "Kubernetes::Ingress"),
    }
  }
}

/// Declarative description of a single resource
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Resource {
  Vpc(Vpc),
  SecurityGroup(SecurityGroup),
  Cluster(Cluster),
  Role(Role),
  Nodegroup(Nodegroup),
  VpcEndpoint(InterfaceVpcEndpoint),
  OpenIdConnectProvider(OpenIdConnectProvider),
  IdentityBinding(ServiceAccountBinding),
  HelmChart(HelmChart),
  ServerlessCluster(ServerlessCluster),
  Kubernetes(KubernetesResource),
}

macro_rules! impl_from_resource {
  ($($variant:ident($type:ty)),* $(,)?) => {
    $(
      impl From<$type> for Resource {
        fn from(resource: $type) -> Self {
          Resource::$variant(resource)
        }
      }
    )*
  };
}

impl_from_resource!(
  Vpc(Vpc),
  SecurityGroup(SecurityGroup),
  Cluster(Cluster),
  Role(Role),
  Nodegroup(Nodegroup),
  VpcEndpoint(InterfaceVpcEndpoint),
  OpenIdConnectProvider(OpenIdConnectProvider),
  IdentityBinding(ServiceAccountBinding),
  HelmChart(HelmChart),
  ServerlessCluster(ServerlessCluster),
  Kubernetes(KubernetesResource),
);

impl Resource {
  pub fn kind(&self) -> Kind {
    match self {
      Resource::Vpc(_) => Kind::Vpc,
      Resource::SecurityGroup(_) => Kind::SecurityGroup,
      Resource::Cluster(_) => Kind::Cluster,
      Resource::Role(_) => Kind::Role,
      Resource::Nodegroup(_) => Kind::Nodegroup,
      Resource::VpcEndpoint(_) => Kind::VpcEndpoint,
      Resource::OpenIdConnectProvider(_) => Kind::OpenIdConnectProvider,
      Resource::IdentityBinding(_) => Kind::IdentityBinding,
      Resource::HelmChart(_) => Kind::HelmChart,
      Resource::ServerlessCluster(_) => Kind::ServerlessCluster,
      Resource::Kubernetes(resource) => resource.manifest.kind(),
    }
  }

  /// Kubernetes objects carried by this resource, if any
  pub fn manifests(&self) -> Vec<&Manifest> {
    match self {
      Resource::Kubernetes(resource) => vec![&resource.manifest],
      Resource::IdentityBinding(binding) => vec![&binding.service_account],
      _ => vec![],
    }
  }
}

impl References for Resource {
  fn references(&self) -> Vec<ResourceId> {
    match self {
      Resource::Vpc(vpc) => vpc.references(),
      Resource::SecurityGroup(sg) => sg.references(),
      Resource::Cluster(cluster) => cluster.references(),
      Resource::Role(role) => role.references(),
      Resource::Nodegroup(nodegroup) => nodegroup.references(),
      Resource::VpcEndpoint(endpoint) => endpoint.references(),
      Resource::OpenIdConnectProvider(provider) => provider.references(),
      Resource::IdentityBinding(binding) => binding.references(),
      Resource::HelmChart(chart) => chart.references(),
      Resource::ServerlessCluster(db) => db.references(),
      Resource::Kubernetes(resource) => resource.references(),
    }
  }
}

/// A resource together with its logical identifier
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
  pub id: ResourceId,
  pub resource: Resource,
}

impl Node {
  pub fn kind(&self) -> Kind {
    self.resource.kind()
  }
}

/// How an edge came to exist
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum EdgeKind {
  /// Declared ordering constraint
  Explicit,
  /// Inferred from one resource referring to another
  Reference,
}

/// `dependent` must not be applied before `dependency` exists
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyEdge {
  pub dependent: ResourceId,
  pub dependency: ResourceId,
  pub kind: EdgeKind,
}

/// Value surfaced to the operator once the graph has been applied
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
  pub name: String,
  pub value: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

/// Dependency-ordered graph of everything handed to the provisioning engine
///
/// Nodes are immutable once added; the only way to grow the graph is through [`Graph::add`]
/// and [`Graph::add_dependency`], both of which validate before mutating
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Graph {
  nodes: Vec<Node>,
  index: BTreeMap<ResourceId, usize>,
  edges: Vec<DependencyEdge>,
  outputs: Vec<Output>,
}

impl Graph {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a resource, recording a reference edge for everything it points at
  pub fn add(&mut self, id: impl Into<ResourceId>, resource: impl Into<Resource>) -> Result<ResourceId> {
    let id = id.into();
    let resource = resource.into();

    if self.index.contains_key(&id) {
      return Err(Error::DuplicateResource(id));
    }

    let mut references = resource.references();
    references.dedup();
    if let Some(missing) = references.iter().find(|r| !self.index.contains_key(*r)) {
      return Err(Error::UnknownResource {
        dependent: id,
        dependency: missing.to_owned(),
      });
    }

    debug!("Adding {} {id}", resource.kind());
    for dependency in references {
      self.push_edge(&id, dependency, EdgeKind::Reference);
    }
    self.index.insert(id.clone(), self.nodes.len());
    self.nodes.push(Node {
      id: id.clone(),
      resource,
    });

    Ok(id)
  }

  /// Declare that `dependent` must only be applied after `dependency`
  pub fn add_dependency(&mut self, dependent: &ResourceId, dependency: &ResourceId) -> Result<()> {
    for id in [dependent, dependency] {
      if !self.index.contains_key(id) {
        return Err(Error::UnknownResource {
          dependent: dependent.to_owned(),
          dependency: id.to_owned(),
        });
      }
    }

    self.push_edge(dependent, dependency.to_owned(), EdgeKind::Explicit);
    Ok(())
  }

  fn push_edge(&mut self, dependent: &ResourceId, dependency: ResourceId, kind: EdgeKind) {
    let edge = DependencyEdge {
      dependent: dependent.to_owned(),
      dependency,
      kind,
    };
    if !self.edges.contains(&edge) {
      self.edges.push(edge);
    }
  }

  pub fn add_output(&mut self, name: &str, value: impl Into<String>, description: Option<&str>) {
    self.outputs.push(Output {
      name: name.to_owned(),
      value: value.into(),
      description: description.map(str::to_owned),
    });
  }

  pub fn get(&self, id: &ResourceId) -> Option<&Resource> {
    self.index.get(id).map(|&i| &self.nodes[i].resource)
  }

  pub fn contains(&self, id: &ResourceId) -> bool {
    self.index.contains_key(id)
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Nodes in the order they were added
  pub fn nodes(&self) -> impl Iterator<Item = &Node> {
    self.nodes.iter()
  }

  pub fn edges(&self) -> &[DependencyEdge] {
    &self.edges
  }

  pub fn outputs(&self) -> &[Output] {
    &self.outputs
  }

  pub fn of_kind(&self, kind: Kind) -> impl Iterator<Item = &Node> {
    self.nodes.iter().filter(move |n| n.kind() == kind)
  }

  pub fn count(&self, kind: Kind) -> usize {
    self.of_kind(kind).count()
  }

  /// Everything `id` must wait for, without duplicates, in the order the edges were declared
  pub fn dependencies_of(&self, id: &ResourceId) -> Vec<&ResourceId> {
    let mut deps: Vec<&ResourceId> = Vec::new();
    for edge in self.edges.iter().filter(|e| &e.dependent == id) {
      if !deps.contains(&&edge.dependency) {
        deps.push(&edge.dependency);
      }
    }
    deps
  }

  /// Order in which the provisioning engine may apply the nodes
  ///
  /// Kahn's algorithm; among resources that are ready at the same time the one added first wins,
  /// so identical graphs always produce identical orders
  pub fn topological_order(&self) -> Result<Vec<&Node>> {
    let mut in_degree = vec![0usize; self.nodes.len()];
    let mut dependents: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); self.nodes.len()];

    for edge in &self.edges {
      let (from, to) = (self.index[&edge.dependency], self.index[&edge.dependent]);
      if dependents[from].insert(to) {
        in_degree[to] += 1;
      }
    }

    let mut ready: BTreeSet<usize> = (0..self.nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(self.nodes.len());

    while let Some(next) = ready.pop_first() {
      order.push(&self.nodes[next]);
      for &dependent in &dependents[next] {
        in_degree[dependent] -= 1;
        if in_degree[dependent] == 0 {
          ready.insert(dependent);
        }
      }
    }

    if order.len() != self.nodes.len() {
      let stuck = (0..self.nodes.len())
        .filter(|&i| in_degree[i] > 0)
        .map(|i| self.nodes[i].id.to_owned())
        .collect();
      return Err(Error::DependencyCycle(stuck));
    }

    Ok(order)
  }

  /// Kubernetes objects in the order they can be applied to the cluster
  ///
  /// Namespaces go first, since a namespaced object can be ready before its namespace without an
  /// edge between them; the rest keep their topological order
  pub fn manifests(&self) -> Result<Vec<&Manifest>> {
    let mut manifests: Vec<&Manifest> = self
      .topological_order()?
      .into_iter()
      .flat_map(|node| node.resource.manifests())
      .collect();
    manifests.sort_by_key(|m| m.kind() != Kind::Namespace);

    Ok(manifests)
  }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NodeView<'a> {
  id: &'a ResourceId,
  #[serde(rename = "type")]
  kind: String,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  depends_on: Vec<&'a ResourceId>,
  properties: &'a Resource,
}

#[derive(Serialize)]
struct Assembly<'a> {
  resources: Vec<NodeView<'a>>,
  edges: &'a [DependencyEdge],
  outputs: &'a [Output],
}

impl Serialize for Graph {
  fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    let resources = self
      .nodes
      .iter()
      .map(|node| NodeView {
        id: &node.id,
        kind: node.kind().to_string(),
        depends_on: self.dependencies_of(&node.id),
        properties: &node.resource,
      })
      .collect();

    Assembly {
      resources,
      edges: &self.edges,
      outputs: &self.outputs,
    }
    .serialize(serializer)
  }
}
