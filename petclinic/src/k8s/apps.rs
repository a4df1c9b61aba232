use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ObjectMeta;

/// Deployment enables declarative updates for Pods and ReplicaSets.
///
/// https://kubernetes.io/docs/reference/kubernetes-api/workload-resources/deployment-v1/
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
  pub api_version: String,
  pub kind: String,
  pub metadata: ObjectMeta,
  pub spec: DeploymentSpec,
}

impl Deployment {
  pub fn new(metadata: ObjectMeta, spec: DeploymentSpec) -> Self {
    Self {
      api_version: "apps/v1".to_owned(),
      kind: "Deployment".to_owned(),
      metadata,
      spec,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
  /// Label selector for pods. It must match the pod template's labels.
  pub selector: LabelSelector,

  /// Number of desired pods.
  pub replicas: i32,

  /// Template describes the pods that will be created.
  pub template: PodTemplateSpec,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
  pub match_labels: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodTemplateMeta {
  pub labels: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodTemplateSpec {
  pub metadata: PodTemplateMeta,
  pub spec: PodSpec,
}

impl PodTemplateSpec {
  pub fn new(labels: BTreeMap<String, String>, spec: PodSpec) -> Self {
    Self {
      metadata: PodTemplateMeta { labels },
      spec,
    }
  }

  pub fn labels(&self) -> &BTreeMap<String, String> {
    &self.metadata.labels
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSpec {
  pub containers: Vec<Container>,
}

/// A single application container that you want to run within a pod.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
  pub image: String,

  /// Always, Never, IfNotPresent
  pub image_pull_policy: String,

  pub name: String,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub security_context: Option<SecurityContext>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub ports: Vec<ContainerPort>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub env: Vec<EnvVar>,

  /// Periodic probe of container liveness. Container will be restarted if the probe fails.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub liveness_probe: Option<Probe>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityContext {
  /// The UID to run the entrypoint of the container process.
  pub run_as_user: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
  pub container_port: i32,
  pub protocol: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
  pub name: String,
  pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Probe {
  pub http_get: HttpGetAction,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpGetAction {
  pub path: String,
  pub port: i32,
}
