use std::{collections::BTreeMap, fmt};

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
  cluster::KubernetesVersion,
  error::{Error, Result},
  graph::{Graph, ResourceId},
  k8s::{
    HttpIngressPath, HttpIngressRuleValue, Ingress, IngressApi, IngressBackend, IngressRule, IngressSpec,
    KubernetesResource, Manifest, ObjectMeta,
  },
  network::HTTP_PORT,
  workload::{self, service_name, HEALTH_CHECK_PATH},
};

/// Pattern every request matches; routed to the UI
pub const CATCH_ALL: &str = "/*";

pub const INGRESS_NAME: &str = "petclinic-ingress";

/// A path pattern and the service port matching requests are sent to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
  pub path: String,
  pub service_name: String,
  pub service_port: u16,
}

impl Route {
  pub fn new(path: &str, service_name: &str, service_port: u16) -> Self {
    Self {
      path: path.to_owned(),
      service_name: service_name.to_owned(),
      service_port,
    }
  }
}

impl fmt::Display for Route {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{} -> {}:{}", self.path, self.service_name, self.service_port)
  }
}

/// Ordered routes evaluated first-match-wins, with the catch-all held apart so it is always last
#[derive(Clone, Debug)]
pub struct RoutingTable {
  routes: Vec<Route>,
  matchers: Vec<Regex>,
  default: Route,
}

impl RoutingTable {
  /// `default_service` receives everything no route in `routes` matched
  pub fn new(routes: Vec<Route>, default_service: &str, default_port: u16) -> Result<Self> {
    if let Some(route) = routes.iter().find(|r| r.path == CATCH_ALL) {
      return Err(Error::InvalidRoutingTable(format!(
        "{route} shadows every route after it; use the default service instead"
      )));
    }
    if let Some(route) = routes.iter().find(|r| !r.path.starts_with('/')) {
      return Err(Error::InvalidRoutingTable(format!("{route} is not an absolute path")));
    }

    let matchers = routes
      .iter()
      .map(|r| path_pattern(&r.path))
      .collect::<Result<Vec<_>>>()?;

    Ok(Self {
      routes,
      matchers,
      default: Route::new(CATCH_ALL, default_service, default_port),
    })
  }

  /// `/owners*`, `/vets*` and `/visits*` to their services, everything else to the UI
  pub fn petclinic() -> Result<Self> {
    Self::new(
      vec![
        Route::new("/owners*", &service_name("customer"), HTTP_PORT),
        Route::new("/vets*", &service_name("vets"), HTTP_PORT),
        Route::new("/visits*", &service_name("visits"), HTTP_PORT),
      ],
      &service_name("ui"),
      HTTP_PORT,
    )
  }

  /// Every route in evaluation order, catch-all last
  pub fn routes(&self) -> impl Iterator<Item = &Route> {
    self.routes.iter().chain(std::iter::once(&self.default))
  }

  pub fn len(&self) -> usize {
    self.routes.len() + 1
  }

  pub fn is_empty(&self) -> bool {
    false
  }

  /// Route the load balancer sends `path` to
  pub fn resolve(&self, path: &str) -> &Route {
    self
      .routes
      .iter()
      .zip(&self.matchers)
      .find(|(_, matcher)| matcher.is_match(path))
      .map_or(&self.default, |(route, _)| route)
  }
}

/// Anchored regex for an ALB path condition, where `*` matches any run of characters and `?` exactly one
///
/// <https://docs.aws.amazon.com/elasticloadbalancing/latest/application/load-balancer-listeners.html#path-conditions>
fn path_pattern(path: &str) -> Result<Regex> {
  let mut pattern = String::from("^");
  for c in path.chars() {
    match c {
      '*' => pattern.push_str(".*"),
      '?' => pattern.push('.'),
      c => pattern.push_str(&regex_lite::escape(c.encode_utf8(&mut [0; 4]))),
    }
  }
  pattern.push('$');

  Ok(Regex::new(&pattern)?)
}

/// Annotations for an internet-facing ALB registering pod IPs and probing the health endpoint
fn annotations() -> BTreeMap<String, String> {
  [
    ("kubernetes.io/ingress.class", "alb".to_owned()),
    ("alb.ingress.kubernetes.io/scheme", "internet-facing".to_owned()),
    ("alb.ingress.kubernetes.io/healthcheck-port", HTTP_PORT.to_string()),
    ("alb.ingress.kubernetes.io/healthcheck-path", HEALTH_CHECK_PATH.to_owned()),
    ("alb.ingress.kubernetes.io/healthcheck-protocol", "HTTP".to_owned()),
    ("alb.ingress.kubernetes.io/target-type", "ip".to_owned()),
  ]
  .into_iter()
  .map(|(k, v)| (k.to_owned(), v))
  .collect()
}

/// Ingress object for `table`, in the wire shape the cluster's version serves
pub fn ingress(table: &RoutingTable, namespace: &str, version: &KubernetesVersion) -> Ingress {
  let api = if version.supports_networking_v1_ingress() {
    IngressApi::NetworkingV1
  } else {
    IngressApi::ExtensionsV1beta1
  };
  debug!("Ingress served as {} on Kubernetes {version}", api.api_version());

  let paths = table
    .routes()
    .map(|route| HttpIngressPath {
      path: route.path.to_owned(),
      path_type: match api {
        IngressApi::NetworkingV1 => Some("ImplementationSpecific".to_owned()),
        IngressApi::ExtensionsV1beta1 => None,
      },
      backend: IngressBackend::new(api, &route.service_name, i32::from(route.service_port)),
    })
    .collect();

  let mut metadata = ObjectMeta::namespaced(INGRESS_NAME, namespace);
  metadata.annotations = annotations();

  Ingress::new(
    api,
    metadata,
    IngressSpec {
      rules: vec![IngressRule {
        http: HttpIngressRuleValue { paths },
      }],
    },
  )
}

/// Add the ingress for `table` to the graph, in the namespace object `namespace` describes
pub fn compose(
  graph: &mut Graph,
  cluster: &ResourceId,
  version: &KubernetesVersion,
  namespace: &ResourceId,
  table: &RoutingTable,
) -> Result<ResourceId> {
  let id = ResourceId::from(INGRESS_NAME);
  let namespace_name = workload::namespace_name(graph, &id, namespace)?;

  let ingress = ingress(table, &namespace_name, version);
  for route in table.routes() {
    info!("Route {route}");
  }

  graph.add(id, KubernetesResource::new(cluster, Manifest::Ingress(ingress)))
}

#[cfg(test)]
mod tests {
  use rstest::*;

  use super::*;

  fn table() -> RoutingTable {
    RoutingTable::petclinic().unwrap()
  }

  #[test]
  fn it_keeps_catch_all_last() {
    let table = table();
    let paths: Vec<&str> = table.routes().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["/owners*", "/vets*", "/visits*", "/*"]);
    assert_eq!(table.len(), 4);
  }

  #[rstest]
  #[case("/owners", "petclinic-customer-service")]
  #[case("/owners/3/pets", "petclinic-customer-service")]
  #[case("/ownersearch", "petclinic-customer-service")]
  #[case("/vets", "petclinic-vets-service")]
  #[case("/visits/7", "petclinic-visits-service")]
  #[case("/", "petclinic-ui-service")]
  #[case("/index.html", "petclinic-ui-service")]
  #[case("/api/owners", "petclinic-ui-service")]
  #[case("/VETS", "petclinic-ui-service")]
  fn resolve_test(#[case] path: &str, #[case] expected: &str) {
    let table = table();
    let route = table.resolve(path);
    assert_eq!(route.service_name, expected);
    assert_eq!(route.service_port, 80);
  }

  #[rstest]
  #[case("/*", "/anything", true)]
  #[case("/vets*", "/vet", false)]
  #[case("/v?ts", "/vets", true)]
  #[case("/v?ts", "/vts", false)]
  #[case("/a*b*c", "/aXXbYYc", true)]
  #[case("/a*b*c", "/aXXbYY", false)]
  #[case("/exact", "/exact", true)]
  #[case("/exact", "/exactly", false)]
  #[case("/a.b", "/aXb", false)]
  #[case("/owners+(1)", "/owners+(1)", true)]
  fn path_pattern_test(#[case] pattern: &str, #[case] path: &str, #[case] expected: bool) {
    assert_eq!(path_pattern(pattern).unwrap().is_match(path), expected);
  }

  #[rstest]
  #[case(Route::new("/*", "petclinic-ui-service", 80))]
  #[case(Route::new("owners*", "petclinic-customer-service", 80))]
  fn invalid_table_test(#[case] route: Route) {
    let result = RoutingTable::new(vec![route], "petclinic-ui-service", 80);
    assert!(matches!(result, Err(Error::InvalidRoutingTable(_))));
  }

  #[test]
  fn it_builds_legacy_ingress() {
    let ingress = ingress(&table(), "petclinic-namespace", &KubernetesVersion::new(1, 18));
    assert_eq!(ingress.api_version, "extensions/v1beta1");
    assert_eq!(ingress.metadata.annotations["kubernetes.io/ingress.class"], "alb");
    assert_eq!(ingress.metadata.annotations["alb.ingress.kubernetes.io/target-type"], "ip");
    assert_eq!(
      ingress.metadata.annotations["alb.ingress.kubernetes.io/healthcheck-path"],
      "/actuator/health"
    );

    let serialized = serde_json::to_value(&ingress).unwrap();
    let first = &serialized["spec"]["rules"][0]["http"]["paths"][0];
    assert_eq!(first["path"], "/owners*");
    assert_eq!(first["backend"]["serviceName"], "petclinic-customer-service");
    assert_eq!(first["backend"]["servicePort"], 80);
    assert!(first.get("pathType").is_none());
  }

  #[test]
  fn it_builds_networking_v1_ingress() {
    let ingress = ingress(&table(), "petclinic-namespace", &KubernetesVersion::new(1, 21));
    assert_eq!(ingress.api_version, "networking.k8s.io/v1");

    let paths = &ingress.spec.rules[0].http.paths;
    assert_eq!(paths.len(), 4);
    assert_eq!(paths[3].path, "/*");
    assert_eq!(paths[3].backend.service_name(), "petclinic-ui-service");
    assert_eq!(paths[3].path_type.as_deref(), Some("ImplementationSpecific"));
  }
}
