use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::{
  graph::{References, ResourceId},
  identity::CONTROLLER_NAME,
};

/// Chart repository the load balancer controller is published to
pub const EKS_CHARTS_REPOSITORY: &str = "https://aws.github.io/eks-charts";

/// Longest release name Helm accepts
const MAX_RELEASE_NAME: usize = 53;

/// Helm chart release installed into the cluster
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmChart {
  pub cluster: ResourceId,
  pub chart: String,
  pub repository: String,
  pub namespace: String,
  pub release: String,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,

  pub create_namespace: bool,
  pub values: Value,

  /// Resources the release needs in place before it is installed
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub uses: Vec<ResourceId>,
}

impl HelmChart {
  /// AWS Load Balancer Controller running as an existing, pre-authorized service account
  pub fn load_balancer_controller(
    id: &str,
    cluster_id: &ResourceId,
    cluster_name: &str,
    namespace: &str,
    binding: &ResourceId,
    service_account: &str,
  ) -> Self {
    let chart = Self {
      cluster: cluster_id.to_owned(),
      chart: CONTROLLER_NAME.to_owned(),
      repository: EKS_CHARTS_REPOSITORY.to_owned(),
      namespace: namespace.to_owned(),
      release: release_name(id),
      version: None,
      create_namespace: true,
      values: json!({
        "clusterName": cluster_name,
        "serviceAccount": {
          "create": false,
          "name": service_account,
        },
      }),
      uses: vec![binding.to_owned()],
    };
    info!("Installing chart {} as release {}", chart.chart, chart.release);

    chart
  }
}

impl References for HelmChart {
  fn references(&self) -> Vec<ResourceId> {
    let mut refs = vec![self.cluster.to_owned()];
    refs.extend(self.uses.iter().cloned());
    refs
  }
}

/// Helm release names are lowercase DNS labels of at most 53 characters
fn release_name(id: &str) -> String {
  let name: String = id
    .chars()
    .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
    .map(|c| c.to_ascii_lowercase())
    .take(MAX_RELEASE_NAME)
    .collect();
  name.trim_matches('-').to_owned()
}
