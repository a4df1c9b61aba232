use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ObjectMeta;

/// Namespace provides a scope for names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Namespace {
  pub api_version: String,
  pub kind: String,
  pub metadata: ObjectMeta,
}

impl Namespace {
  pub fn new(name: &str) -> Self {
    Self {
      api_version: "v1".to_owned(),
      kind: "Namespace".to_owned(),
      metadata: ObjectMeta {
        name: name.to_owned(),
        ..ObjectMeta::default()
      },
    }
  }
}

/// ServiceAccount binds together a name, understood by users and by peripheral systems,
/// for an identity, and a principal that can be authenticated and authorized
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccount {
  pub api_version: String,
  pub kind: String,
  pub metadata: ObjectMeta,
}

impl ServiceAccount {
  pub fn new(metadata: ObjectMeta) -> Self {
    Self {
      api_version: "v1".to_owned(),
      kind: "ServiceAccount".to_owned(),
      metadata,
    }
  }
}

/// Service is a named abstraction of software service consisting of local port
/// that the proxy listens on, and the selector that determines which pods will
/// answer requests sent through the proxy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
  pub api_version: String,
  pub kind: String,
  pub metadata: ObjectMeta,
  pub spec: ServiceSpec,
}

impl Service {
  pub fn new(metadata: ObjectMeta, spec: ServiceSpec) -> Self {
    Self {
      api_version: "v1".to_owned(),
      kind: "Service".to_owned(),
      metadata,
      spec,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
  /// The list of ports that are exposed by this service.
  pub ports: Vec<ServicePort>,

  /// type determines how the Service is exposed: ClusterIP, NodePort, LoadBalancer or ExternalName.
  #[serde(rename = "type")]
  pub type_: String,

  /// Route service traffic to pods with label keys and values matching this selector.
  pub selector: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
  /// The port that will be exposed by this service.
  pub port: i32,

  /// Number of the port to access on the pods targeted by the service.
  pub target_port: i32,

  pub protocol: String,
}
