use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
  cluster::Cluster,
  error::{Error, Result},
  graph::{Graph, References, Resource, ResourceId},
  iam::{Conditions, PolicyDocument, Role},
  k8s::{Manifest, ObjectMeta, ServiceAccount},
};

/// Name shared by the controller's chart, service account and policy
pub const CONTROLLER_NAME: &str = "aws-load-balancer-controller";

/// Embedded, versioned permission envelope of the load balancer controller
pub const CONTROLLER_POLICY: &str = "aws-load-balancer-controller-policy.json";

/// Number of statements the controller policy must carry
pub const CONTROLLER_POLICY_STATEMENTS: usize = 11;

/// Audience web identity tokens are exchanged for
pub const STS_AUDIENCE: &str = "sts.amazonaws.com";

/// IAM OpenID Connect provider trusting the cluster's service account token issuer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenIdConnectProvider {
  pub cluster: ResourceId,
  pub url: String,
  pub client_ids: Vec<String>,
}

impl OpenIdConnectProvider {
  /// Fails when the cluster was created without an issuer to federate with
  pub fn new(cluster_id: &ResourceId, cluster: &Cluster) -> Result<Self> {
    if !cluster.openid_connect {
      return Err(Error::IdentityFederationUnavailable {
        cluster: cluster.name.to_owned(),
      });
    }

    Ok(Self {
      cluster: cluster_id.to_owned(),
      url: cluster_id.attribute("OpenIdConnectIssuerUrl"),
      client_ids: vec![STS_AUDIENCE.to_owned()],
    })
  }
}

impl References for OpenIdConnectProvider {
  fn references(&self) -> Vec<ResourceId> {
    vec![self.cluster.to_owned()]
  }
}

/// A Kubernetes service account federated with an IAM role, plus the policy the role carries
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccountBinding {
  pub cluster: ResourceId,
  pub provider: ResourceId,
  pub role: Role,
  pub policy: PolicyDocument,
  pub service_account: Manifest,
}

impl ServiceAccountBinding {
  /// Bind `namespace/name` to a new role trusting `provider`
  ///
  /// The role only accepts tokens issued for this exact service account
  pub fn new(
    id: &ResourceId,
    cluster_id: &ResourceId,
    provider: &ResourceId,
    name: &str,
    namespace: &str,
    policy: PolicyDocument,
  ) -> Self {
    let issuer = cluster_id.attribute("OpenIdConnectIssuer");
    let condition = Conditions::from([(
      "StringEquals".to_owned(),
      BTreeMap::from([
        (format!("{issuer}:aud"), STS_AUDIENCE.to_owned()),
        (format!("{issuer}:sub"), format!("system:serviceaccount:{namespace}:{name}")),
      ]),
    )]);
    let role = Role::for_web_identity(provider, condition);

    let mut metadata = ObjectMeta::namespaced(name, namespace);
    metadata.labels.insert("app.kubernetes.io/name".to_owned(), name.to_owned());
    metadata
      .annotations
      .insert("eks.amazonaws.com/role-arn".to_owned(), id.attribute("RoleArn"));

    Self {
      cluster: cluster_id.to_owned(),
      provider: provider.to_owned(),
      role,
      policy,
      service_account: Manifest::ServiceAccount(ServiceAccount::new(metadata)),
    }
  }

  pub fn service_account_name(&self) -> &str {
    &self.service_account.metadata().name
  }
}

impl References for ServiceAccountBinding {
  fn references(&self) -> Vec<ResourceId> {
    let mut refs = vec![self.cluster.to_owned(), self.provider.to_owned()];
    refs.extend(self.role.references().into_iter().filter(|r| r != &self.provider));
    refs
  }
}

/// Controller policy, validated to be exactly the expected set of grants
pub fn controller_policy() -> Result<PolicyDocument> {
  let policy = PolicyDocument::load(CONTROLLER_POLICY)?;
  validate_controller_policy(&policy)?;

  Ok(policy)
}

/// Reject a controller policy with the wrong number of statements or any `Deny`
pub fn validate_controller_policy(policy: &PolicyDocument) -> Result<()> {
  if policy.statement.len() != CONTROLLER_POLICY_STATEMENTS {
    return Err(Error::InvalidPolicy {
      name: CONTROLLER_POLICY.to_owned(),
      reason: format!(
        "expected {CONTROLLER_POLICY_STATEMENTS} statements, found {}",
        policy.statement.len()
      ),
    });
  }
  if !policy.is_additive() {
    return Err(Error::InvalidPolicy {
      name: CONTROLLER_POLICY.to_owned(),
      reason: "Deny statements are not allowed".to_owned(),
    });
  }

  Ok(())
}

/// Add the OIDC provider and the load balancer controller's service account binding to the graph
///
/// Everything is validated before the graph is touched; on error the graph is unchanged
pub fn bind_controller(graph: &mut Graph, id: &str, cluster_id: &ResourceId, namespace: &str) -> Result<ResourceId> {
  let id = ResourceId::new(id);
  let provider_id = ResourceId::new(format!("{cluster_id}-oidc-provider"));

  let cluster = match graph.get(cluster_id) {
    Some(Resource::Cluster(cluster)) => cluster,
    _ => {
      return Err(Error::UnknownResource {
        dependent: id,
        dependency: cluster_id.to_owned(),
      })
    }
  };
  let provider = OpenIdConnectProvider::new(cluster_id, cluster)?;
  let policy = controller_policy()?;

  for candidate in [&provider_id, &id] {
    if graph.contains(candidate) {
      return Err(Error::DuplicateResource(candidate.to_owned()));
    }
  }

  let binding = ServiceAccountBinding::new(&id, cluster_id, &provider_id, CONTROLLER_NAME, namespace, policy);
  debug!("Service account binding: {binding:#?}");

  graph.add(provider_id, provider)?;
  let id = graph.add(id, binding)?;
  info!("Bound service account {namespace}/{CONTROLLER_NAME} as {id}");

  Ok(id)
}
