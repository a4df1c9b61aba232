use serde::{Deserialize, Serialize};

use super::ObjectMeta;

/// Group/version an Ingress is served under
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngressApi {
  /// `extensions/v1beta1`, removed in Kubernetes 1.22
  ExtensionsV1beta1,
  /// `networking.k8s.io/v1`, served starting with Kubernetes 1.19
  NetworkingV1,
}

impl IngressApi {
  pub fn api_version(&self) -> &'static str {
    match self {
      IngressApi::ExtensionsV1beta1 => "extensions/v1beta1",
      IngressApi::NetworkingV1 => "networking.k8s.io/v1",
    }
  }
}

/// Ingress is a collection of rules that allow inbound connections to reach the
/// endpoints defined by a backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingress {
  pub api_version: String,
  pub kind: String,
  pub metadata: ObjectMeta,
  pub spec: IngressSpec,
}

impl Ingress {
  pub fn new(api: IngressApi, metadata: ObjectMeta, spec: IngressSpec) -> Self {
    Self {
      api_version: api.api_version().to_owned(),
      kind: "Ingress".to_owned(),
      metadata,
      spec,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressSpec {
  pub rules: Vec<IngressRule>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
  pub http: HttpIngressRuleValue,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpIngressRuleValue {
  /// Evaluated in order by the load balancer controller
  pub paths: Vec<HttpIngressPath>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpIngressPath {
  pub path: String,

  /// Required by `networking.k8s.io/v1`, unknown to `extensions/v1beta1`
  #[serde(skip_serializing_if = "Option::is_none")]
  pub path_type: Option<String>,

  pub backend: IngressBackend,
}

/// Where matching traffic is sent; the wire shape differs between API versions
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IngressBackend {
  #[serde(rename_all = "camelCase")]
  Legacy { service_name: String, service_port: i32 },
  V1 { service: IngressServiceBackend },
}

impl IngressBackend {
  pub fn new(api: IngressApi, name: &str, port: i32) -> Self {
    match api {
      IngressApi::ExtensionsV1beta1 => IngressBackend::Legacy {
        service_name: name.to_owned(),
        service_port: port,
      },
      IngressApi::NetworkingV1 => IngressBackend::V1 {
        service: IngressServiceBackend {
          name: name.to_owned(),
          port: ServiceBackendPort { number: port },
        },
      },
    }
  }

  pub fn service_name(&self) -> &str {
    match self {
      IngressBackend::Legacy { service_name, .. } => service_name,
      IngressBackend::V1 { service } => &service.name,
    }
  }

  pub fn service_port(&self) -> i32 {
    match self {
      IngressBackend::Legacy { service_port, .. } => *service_port,
      IngressBackend::V1 { service } => service.port.number,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressServiceBackend {
  pub name: String,
  pub port: ServiceBackendPort,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBackendPort {
  pub number: i32,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn it_serializes_backend_per_api() {
    let legacy = serde_json::to_value(IngressBackend::new(
      IngressApi::ExtensionsV1beta1,
      "petclinic-ui-service",
      80,
    ))
    .unwrap();
    assert_eq!(legacy["serviceName"], "petclinic-ui-service");
    assert_eq!(legacy["servicePort"], 80);

    let v1 = serde_json::to_value(IngressBackend::new(IngressApi::NetworkingV1, "petclinic-ui-service", 80)).unwrap();
    assert_eq!(v1["service"]["name"], "petclinic-ui-service");
    assert_eq!(v1["service"]["port"]["number"], 80);
  }

  #[test]
  fn it_deserializes_legacy_backend() {
    let backend: IngressBackend =
      serde_json::from_str(r#"{"serviceName": "petclinic-vets-service", "servicePort": 80}"#).unwrap();
    assert_eq!(backend.service_name(), "petclinic-vets-service");
    assert_eq!(backend.service_port(), 80);
  }
}
