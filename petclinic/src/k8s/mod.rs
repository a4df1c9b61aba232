mod apps;
mod core;
mod networking;

use std::collections::BTreeMap;

pub use self::apps::{
  Container, ContainerPort, Deployment, DeploymentSpec, EnvVar, HttpGetAction, LabelSelector, PodSpec, PodTemplateMeta,
  PodTemplateSpec, Probe, SecurityContext,
};
pub use self::core::{Namespace, Service, ServiceAccount, ServicePort, ServiceSpec};
pub use self::networking::{
  HttpIngressPath, HttpIngressRuleValue, Ingress, IngressApi, IngressBackend, IngressRule, IngressServiceBackend,
  IngressSpec, ServiceBackendPort,
};
use serde::{Deserialize, Serialize};

use crate::graph::{Kind, References, ResourceId};

/// Standard metadata every persisted Kubernetes object carries
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
  /// Name must be unique within a namespace.
  pub name: String,

  /// Namespace defines the space within which each name must be unique.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub namespace: Option<String>,

  /// Map of string keys and values that can be used to organize and categorize objects.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub labels: BTreeMap<String, String>,

  /// Unstructured key value map stored with a resource that may be set by external tools.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
  pub fn namespaced(name: &str, namespace: &str) -> Self {
    Self {
      name: name.to_owned(),
      namespace: Some(namespace.to_owned()),
      ..Self::default()
    }
  }
}

/// Any Kubernetes object this crate renders
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Manifest {
  Namespace(Namespace),
  ServiceAccount(ServiceAccount),
  Deployment(Deployment),
  Service(Service),
  Ingress(Ingress),
}

impl Manifest {
  pub fn kind(&self) -> Kind {
    match self {
      Manifest::Namespace(_) => Kind::Namespace,
      Manifest::ServiceAccount(_) => Kind::ServiceAccount,
      Manifest::Deployment(_) => Kind::Deployment,
      Manifest::Service(_) => Kind::Service,
      Manifest::Ingress(_) => Kind::Ingress,
    }
  }

  pub fn metadata(&self) -> &ObjectMeta {
    match self {
      Manifest::Namespace(o) => &o.metadata,
      Manifest::ServiceAccount(o) => &o.metadata,
      Manifest::Deployment(o) => &o.metadata,
      Manifest::Service(o) => &o.metadata,
      Manifest::Ingress(o) => &o.metadata,
    }
  }
}

/// A Kubernetes object applied to a cluster through its API server
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesResource {
  pub cluster: ResourceId,
  pub manifest: Manifest,
  /// Other resources the object consumes, such as the database whose secret it names
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub uses: Vec<ResourceId>,
}

impl KubernetesResource {
  pub fn new(cluster: &ResourceId, manifest: Manifest) -> Self {
    Self {
      cluster: cluster.to_owned(),
      manifest,
      uses: vec![],
    }
  }

  pub fn using(mut self, resource: &ResourceId) -> Self {
    self.uses.push(resource.to_owned());
    self
  }
}

impl References for KubernetesResource {
  fn references(&self) -> Vec<ResourceId> {
    let mut refs = vec![self.cluster.to_owned()];
    refs.extend(self.uses.iter().cloned());
    refs
  }
}
