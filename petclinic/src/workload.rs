use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
  error::{Error, Result},
  graph::{Graph, Resource, ResourceId},
  k8s::{
    self, Container, ContainerPort, Deployment, DeploymentSpec, EnvVar, HttpGetAction, KubernetesResource,
    LabelSelector, Manifest, ObjectMeta, PodSpec, PodTemplateSpec, Probe, SecurityContext, Service, ServicePort,
  },
  network::HTTP_PORT,
};

/// Label tying a service's selector to its deployment's pods
pub const NAME_LABEL: &str = "app.kubernetes.io/name";

/// Environment variable naming the database credentials secret
pub const SECRETS_ENV: &str = "SECRETS_NAME";

pub const HEALTH_CHECK_PATH: &str = "/actuator/health";

/// One logical PetClinic service and the image it runs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
  pub suffix: String,
  pub image: String,
}

impl ServiceSpec {
  pub fn new(suffix: &str, image: &str) -> Self {
    Self {
      suffix: suffix.to_owned(),
      image: image.to_owned(),
    }
  }

  /// `petclinic-<suffix>`, shared by the deployment, its container and its pods' label
  pub fn name(&self) -> String {
    format!("petclinic-{}", self.suffix)
  }

  /// `petclinic-<suffix>-service`
  pub fn service_name(&self) -> String {
    service_name(&self.suffix)
  }

  pub fn deployment_id(&self) -> ResourceId {
    ResourceId::new(format!("deployment-{}", self.suffix))
  }

  pub fn service_id(&self) -> ResourceId {
    ResourceId::new(format!("service-{}", self.suffix))
  }

  fn labels(&self) -> BTreeMap<String, String> {
    BTreeMap::from([(NAME_LABEL.to_owned(), self.name())])
  }

  /// Single replica, single root container on port 80 with a health probe and the secret's name
  pub fn deployment(&self, namespace: &str, secret_name: &str) -> Deployment {
    let port = i32::from(HTTP_PORT);
    let container = Container {
      image: self.image.to_owned(),
      image_pull_policy: "Always".to_owned(),
      name: self.name(),
      security_context: Some(SecurityContext { run_as_user: 0 }),
      ports: vec![ContainerPort {
        container_port: port,
        protocol: "TCP".to_owned(),
      }],
      env: vec![EnvVar {
        name: SECRETS_ENV.to_owned(),
        value: secret_name.to_owned(),
      }],
      liveness_probe: Some(Probe {
        http_get: HttpGetAction {
          path: HEALTH_CHECK_PATH.to_owned(),
          port,
        },
      }),
    };

    Deployment::new(
      ObjectMeta::namespaced(&self.name(), namespace),
      DeploymentSpec {
        selector: LabelSelector {
          match_labels: self.labels(),
        },
        replicas: 1,
        template: PodTemplateSpec::new(
          self.labels(),
          PodSpec {
            containers: vec![container],
          },
        ),
      },
    )
  }

  /// NodePort service forwarding port 80 to the deployment's pods
  pub fn service(&self, namespace: &str) -> Service {
    let port = i32::from(HTTP_PORT);
    Service::new(
      ObjectMeta::namespaced(&self.service_name(), namespace),
      k8s::ServiceSpec {
        ports: vec![ServicePort {
          port,
          target_port: port,
          protocol: "TCP".to_owned(),
        }],
        type_: "NodePort".to_owned(),
        selector: self.labels(),
      },
    )
  }
}

/// Name of the Kubernetes service fronting the logical service `suffix`
pub fn service_name(suffix: &str) -> String {
  format!("petclinic-{suffix}-service")
}

/// Name of the namespace object `id` describes
pub(crate) fn namespace_name(graph: &Graph, dependent: &ResourceId, id: &ResourceId) -> Result<String> {
  match graph.get(id) {
    Some(Resource::Kubernetes(KubernetesResource {
      manifest: Manifest::Namespace(namespace),
      ..
    })) => Ok(namespace.metadata.name.to_owned()),
    _ => Err(Error::UnknownResource {
      dependent: dependent.to_owned(),
      dependency: id.to_owned(),
    }),
  }
}

/// Add the deployment and service of one logical service to the graph
///
/// Both objects live in the namespace `namespace` names and depend on it explicitly; the
/// deployment also refers to `database` for its credentials secret
pub fn compose(
  graph: &mut Graph,
  cluster: &ResourceId,
  spec: &ServiceSpec,
  database: &ResourceId,
  namespace: &ResourceId,
) -> Result<(ResourceId, ResourceId)> {
  let deployment_id = spec.deployment_id();
  let service_id = spec.service_id();

  let secret_name = match graph.get(database) {
    Some(Resource::ServerlessCluster(db)) => db.secret_name().to_owned(),
    _ => {
      return Err(Error::UnknownResource {
        dependent: deployment_id,
        dependency: database.to_owned(),
      })
    }
  };
  let namespace_name = namespace_name(graph, &deployment_id, namespace)?;
  for id in [&deployment_id, &service_id] {
    if graph.contains(id) {
      return Err(Error::DuplicateResource(id.to_owned()));
    }
  }

  let deployment = KubernetesResource::new(
    cluster,
    Manifest::Deployment(spec.deployment(&namespace_name, &secret_name)),
  )
  .using(database);
  let service = KubernetesResource::new(cluster, Manifest::Service(spec.service(&namespace_name)));

  let deployment_id = graph.add(deployment_id, deployment)?;
  graph.add_dependency(&deployment_id, namespace)?;
  let service_id = graph.add(service_id, service)?;
  graph.add_dependency(&service_id, namespace)?;
  debug!("Composed {} as {deployment_id} and {service_id}", spec.name());

  Ok((deployment_id, service_id))
}

#[cfg(test)]
mod tests {
  use rstest::*;

  use super::*;

  #[rstest]
  #[case("ui", "petclinic-ui", "petclinic-ui-service")]
  #[case("customer", "petclinic-customer", "petclinic-customer-service")]
  #[case("vets", "petclinic-vets", "petclinic-vets-service")]
  #[case("visits", "petclinic-visits", "petclinic-visits-service")]
  fn naming_test(#[case] suffix: &str, #[case] name: &str, #[case] service_name: &str) {
    let spec = ServiceSpec::new(suffix, "img");
    assert_eq!(spec.name(), name);
    assert_eq!(spec.service_name(), service_name);
  }

  #[test]
  fn it_builds_deployment() {
    let spec = ServiceSpec::new("vets", "img-vets");
    let deployment = spec.deployment("petclinic-namespace", "petclinic-db-credentials");

    assert_eq!(deployment.metadata.namespace.as_deref(), Some("petclinic-namespace"));
    assert_eq!(deployment.spec.replicas, 1);
    assert_eq!(deployment.spec.selector.match_labels, *deployment.spec.template.labels());

    let containers = &deployment.spec.template.spec.containers;
    assert_eq!(containers.len(), 1);
    let container = &containers[0];
    assert_eq!(container.image, "img-vets");
    assert_eq!(container.image_pull_policy, "Always");
    assert_eq!(container.security_context, Some(SecurityContext { run_as_user: 0 }));
    assert_eq!(container.ports[0].container_port, 80);
    assert_eq!(
      container.env,
      vec![EnvVar {
        name: "SECRETS_NAME".to_owned(),
        value: "petclinic-db-credentials".to_owned()
      }]
    );
    let probe = container.liveness_probe.as_ref().unwrap();
    assert_eq!(probe.http_get.path, "/actuator/health");
    assert_eq!(probe.http_get.port, 80);
  }

  #[test]
  fn it_selects_deployment_pods() {
    let spec = ServiceSpec::new("customer", "img-cust");
    let deployment = spec.deployment("petclinic-namespace", "secret");
    let service = spec.service("petclinic-namespace");

    assert_eq!(service.spec.type_, "NodePort");
    assert_eq!(service.spec.ports[0].port, 80);
    assert_eq!(service.spec.ports[0].target_port, 80);
    assert_eq!(&service.spec.selector, deployment.spec.template.labels());
    assert_eq!(service.spec.selector[NAME_LABEL], "petclinic-customer");
  }

  #[test]
  fn it_serializes_service() {
    let service = ServiceSpec::new("ui", "img-ui").service("petclinic-namespace");
    insta::assert_json_snapshot!(service, @r###"
    {
      "apiVersion": "v1",
      "kind": "Service",
      "metadata": {
        "name": "petclinic-ui-service",
        "namespace": "petclinic-namespace"
      },
      "spec": {
        "ports": [
          {
            "port": 80,
            "targetPort": 80,
            "protocol": "TCP"
          }
        ],
        "type": "NodePort",
        "selector": {
          "app.kubernetes.io/name": "petclinic-ui"
        }
      }
    }
    "###);
  }

  #[test]
  fn it_requires_namespace_in_graph() {
    let mut graph = Graph::new();
    let err = compose(
      &mut graph,
      &ResourceId::from("ekscluster"),
      &ServiceSpec::new("ui", "img-ui"),
      &ResourceId::from("Db"),
      &ResourceId::from("namespace"),
    )
    .unwrap_err();
    assert!(matches!(err, Error::UnknownResource { .. }));
    assert!(graph.is_empty());
  }
}
