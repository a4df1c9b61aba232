use std::{fmt, str::FromStr};

use regex_lite::Regex;
use semver::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, info};

use crate::{
  error::{Error, Result},
  graph::{References, ResourceId},
  iam::Role,
  network::{SubnetType, Vpc},
};

/// Managed policies every PetClinic worker node carries
pub const NODE_MANAGED_POLICIES: [&str; 6] = [
  "AmazonEKSWorkerNodePolicy",
  "AmazonEC2ContainerRegistryReadOnly",
  "AmazonEKS_CNI_Policy",
  "AmazonRDSFullAccess",
  "SecretsManagerReadWrite",
  "CloudWatchLogsFullAccess",
];

/// Kubernetes control plane version, `major.minor`
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct KubernetesVersion(Version);

impl KubernetesVersion {
  pub fn new(major: u64, minor: u64) -> Self {
    Self(Version::new(major, minor, 0))
  }

  /// `networking.k8s.io/v1` Ingress is served starting with 1.19
  pub fn supports_networking_v1_ingress(&self) -> bool {
    self.0 >= Version::new(1, 19, 0)
  }
}

impl FromStr for KubernetesVersion {
  type Err = Error;

  /// Accepts `1.18`, `v1.18` or `1.18.9`; the patch level is dropped
  fn from_str(s: &str) -> Result<Self> {
    let re = Regex::new(r"^v?(\d+)\.(\d+)(?:\.\d+)?$")?;
    let caps = re
      .captures(s.trim())
      .ok_or_else(|| Error::InvalidKubernetesVersion(s.to_owned()))?;
    let part = |i: usize| -> Result<u64> {
      caps
        .get(i)
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| Error::InvalidKubernetesVersion(s.to_owned()))
    };

    Ok(Self::new(part(1)?, part(2)?))
  }
}

impl fmt::Display for KubernetesVersion {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}.{}", self.0.major, self.0.minor)
  }
}

impl Serialize for KubernetesVersion {
  fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for KubernetesVersion {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
  }
}

#[derive(Clone, Debug)]
pub struct ClusterProps {
  pub name: String,
  pub version: KubernetesVersion,
  /// Instances the control plane would provision by itself; capacity comes from the node group
  pub default_capacity: u32,
  /// Create an OpenID Connect issuer so service accounts can assume IAM roles
  pub openid_connect: bool,
}

impl Default for ClusterProps {
  fn default() -> Self {
    Self {
      name: "Cluster".to_owned(),
      version: KubernetesVersion::new(1, 18),
      default_capacity: 0,
      openid_connect: true,
    }
  }
}

/// Managed Kubernetes control plane
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
  pub name: String,
  pub version: KubernetesVersion,
  pub role: ResourceId,
  pub vpc: ResourceId,
  pub security_group: ResourceId,
  pub subnets: Vec<String>,
  pub default_capacity: u32,
  pub endpoint_public_access: bool,
  pub endpoint_private_access: bool,
  pub openid_connect: bool,
}

impl Cluster {
  /// Control plane placed in every subnet of the VPC and bound to the shared security group
  pub fn new(
    props: &ClusterProps,
    role: &ResourceId,
    vpc_id: &ResourceId,
    vpc: &Vpc,
    security_group: &ResourceId,
  ) -> Self {
    info!("Cluster {} on Kubernetes {}", props.name, props.version);

    Cluster {
      name: props.name.to_owned(),
      version: props.version.to_owned(),
      role: role.to_owned(),
      vpc: vpc_id.to_owned(),
      security_group: security_group.to_owned(),
      subnets: vpc.subnets.iter().map(|s| s.name.to_owned()).collect(),
      default_capacity: props.default_capacity,
      endpoint_public_access: true,
      endpoint_private_access: true,
      openid_connect: props.openid_connect,
    }
  }

  /// Service role the control plane runs as
  pub fn service_role() -> Role {
    let mut role = Role::for_service(None, "eks.amazonaws.com");
    role.add_managed_policy("AmazonEKSClusterPolicy");
    role
  }

  /// Command that writes a kubeconfig entry for this cluster
  pub fn config_command(&self) -> String {
    format!("aws eks update-kubeconfig --name {} --region ${{AWS::Region}}", self.name)
  }
}

impl References for Cluster {
  fn references(&self) -> Vec<ResourceId> {
    vec![self.role.to_owned(), self.vpc.to_owned(), self.security_group.to_owned()]
  }
}

/// https://docs.aws.amazon.com/eks/latest/APIReference/API_Nodegroup.html#AmazonEKS-Type-Nodegroup-amiType
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmiType {
  #[serde(rename = "AL2_x86_64")]
  Al2X86_64,
  #[serde(rename = "AL2_x86_64_GPU")]
  Al2X86_64Gpu,
  #[serde(rename = "AL2_ARM_64")]
  Al2Arm64,
}

#[derive(Clone, Debug)]
pub struct NodegroupProps {
  pub ami_type: AmiType,
  pub instance_type: String,
  pub min_size: u32,
  pub max_size: u32,
}

impl Default for NodegroupProps {
  fn default() -> Self {
    Self {
      ami_type: AmiType::Al2X86_64,
      instance_type: "m5a.large".to_owned(),
      min_size: 2,
      max_size: 3,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalingConfig {
  pub min_size: u32,
  pub max_size: u32,
  pub desired_size: u32,
}

/// Managed pool of worker nodes attached to the cluster
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nodegroup {
  pub cluster: ResourceId,
  pub cluster_name: String,
  pub node_role: ResourceId,
  pub node_role_arn: String,
  pub security_group: ResourceId,
  pub subnets: Vec<String>,
  pub ami_type: AmiType,
  pub instance_types: Vec<String>,
  pub scaling_config: ScalingConfig,
}

impl Nodegroup {
  /// Workers in the private subnets, starting at the minimum size
  pub fn new(
    props: &NodegroupProps,
    cluster_id: &ResourceId,
    cluster: &Cluster,
    node_role: &ResourceId,
    vpc: &Vpc,
  ) -> Result<Self> {
    if props.min_size == 0 || props.min_size > props.max_size {
      return Err(Error::InvalidCapacity(format!(
        "node group size {}..{} is not a valid range",
        props.min_size, props.max_size
      )));
    }

    let nodegroup = Nodegroup {
      cluster: cluster_id.to_owned(),
      cluster_name: cluster.name.to_owned(),
      node_role: node_role.to_owned(),
      node_role_arn: node_role.attribute("Arn"),
      security_group: cluster.security_group.to_owned(),
      subnets: vpc.private_subnet_names(),
      ami_type: props.ami_type,
      instance_types: vec![props.instance_type.to_owned()],
      scaling_config: ScalingConfig {
        min_size: props.min_size,
        max_size: props.max_size,
        desired_size: props.min_size,
      },
    };
    debug!("Node group: {nodegroup:#?}");

    Ok(nodegroup)
  }

  /// Identity the worker nodes run as
  pub fn node_role() -> Role {
    let mut role = Role::for_service(Some("nodeRole"), "ec2.amazonaws.com");
    for policy in NODE_MANAGED_POLICIES {
      role.add_managed_policy(policy);
    }
    role
  }
}

impl References for Nodegroup {
  fn references(&self) -> Vec<ResourceId> {
    vec![
      self.cluster.to_owned(),
      self.node_role.to_owned(),
      self.security_group.to_owned(),
    ]
  }
}

/// Private connectivity to a regional AWS service from inside the VPC
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceVpcEndpoint {
  pub vpc: ResourceId,
  pub service_name: String,
  pub subnets: Vec<String>,
  pub security_groups: Vec<ResourceId>,
  /// Allow traffic from anywhere in the VPC
  pub open: bool,
  pub private_dns_enabled: bool,
}

impl InterfaceVpcEndpoint {
  /// STS endpoint; worker nodes in private subnets cannot otherwise exchange their web identity tokens
  pub fn sts(vpc_id: &ResourceId, vpc: &Vpc, security_group: &ResourceId) -> Self {
    Self {
      vpc: vpc_id.to_owned(),
      service_name: "com.amazonaws.${AWS::Region}.sts".to_owned(),
      subnets: vpc
        .subnets_of(SubnetType::Private)
        .iter()
        .map(|s| s.name.to_owned())
        .collect(),
      security_groups: vec![security_group.to_owned()],
      open: true,
      private_dns_enabled: true,
    }
  }
}

impl References for InterfaceVpcEndpoint {
  fn references(&self) -> Vec<ResourceId> {
    let mut refs = vec![self.vpc.to_owned()];
    refs.extend(self.security_groups.iter().cloned());
    refs
  }
}

#[cfg(test)]
mod tests {
  use rstest::*;

  use super::*;
  use crate::network::VpcProps;

  fn cluster(props: &ClusterProps) -> (Vpc, Cluster) {
    let vpc = Vpc::new(&VpcProps::default()).unwrap();
    let cluster = Cluster::new(
      props,
      &ResourceId::from("ekscluster-role"),
      &ResourceId::from("Vpc"),
      &vpc,
      &ResourceId::from("ecs-security-group"),
    );
    (vpc, cluster)
  }

  #[rstest]
  #[case("1.18", "1.18", false)]
  #[case("v1.19", "1.19", true)]
  #[case("1.21.14", "1.21", true)]
  #[case("1.9", "1.9", false)]
  #[should_panic]
  #[case("1", "1", false)]
  #[should_panic]
  #[case("latest", "", false)]
  fn kubernetes_version_test(#[case] input: &str, #[case] expected: &str, #[case] networking_v1: bool) {
    let version: KubernetesVersion = input.parse().unwrap();
    assert_eq!(version.to_string(), expected);
    assert_eq!(version.supports_networking_v1_ingress(), networking_v1);
  }

  #[test]
  fn it_builds_cluster_without_default_capacity() {
    let (_, cluster) = cluster(&ClusterProps::default());
    assert_eq!(cluster.name, "Cluster");
    assert_eq!(cluster.default_capacity, 0);
    assert_eq!(cluster.subnets.len(), 4);
    assert_eq!(
      cluster.config_command(),
      "aws eks update-kubeconfig --name Cluster --region ${AWS::Region}"
    );

    let serialized = serde_json::to_value(&cluster).unwrap();
    assert_eq!(serialized["version"], "1.18");
  }

  #[test]
  fn it_builds_nodegroup() {
    let (vpc, cluster) = cluster(&ClusterProps::default());
    let nodegroup = Nodegroup::new(
      &NodegroupProps::default(),
      &ResourceId::from("ekscluster"),
      &cluster,
      &ResourceId::from("nodeRole"),
      &vpc,
    )
    .unwrap();

    assert_eq!(nodegroup.scaling_config.min_size, 2);
    assert_eq!(nodegroup.scaling_config.max_size, 3);
    assert_eq!(nodegroup.instance_types, vec!["m5a.large".to_owned()]);
    assert_eq!(nodegroup.subnets, vec!["PrivateSubnet1".to_owned(), "PrivateSubnet2".to_owned()]);
    assert_eq!(nodegroup.security_group, cluster.security_group);
    assert_eq!(
      nodegroup.references(),
      vec![
        ResourceId::from("ekscluster"),
        ResourceId::from("nodeRole"),
        ResourceId::from("ecs-security-group")
      ]
    );
    assert_eq!(serde_json::to_value(nodegroup.ami_type).unwrap(), "AL2_x86_64");
  }

  #[rstest]
  #[case(0, 3)]
  #[case(4, 3)]
  fn invalid_nodegroup_size_test(#[case] min_size: u32, #[case] max_size: u32) {
    let (vpc, cluster) = cluster(&ClusterProps::default());
    let props = NodegroupProps {
      min_size,
      max_size,
      ..NodegroupProps::default()
    };
    let result = Nodegroup::new(&props, &ResourceId::from("ekscluster"), &cluster, &ResourceId::from("nodeRole"), &vpc);
    assert!(matches!(result, Err(Error::InvalidCapacity(_))));
  }

  #[test]
  fn it_attaches_six_node_policies() {
    let role = Nodegroup::node_role();
    let names: Vec<&str> = role.managed_policy_arns.iter().map(|p| p.name()).collect();
    assert_eq!(names, NODE_MANAGED_POLICIES.to_vec());
    assert_eq!(role.role_name.as_deref(), Some("nodeRole"));
  }

  #[test]
  fn it_scopes_sts_endpoint_to_security_group() {
    let vpc = Vpc::new(&VpcProps::default()).unwrap();
    let endpoint = InterfaceVpcEndpoint::sts(&ResourceId::from("Vpc"), &vpc, &ResourceId::from("ecs-security-group"));
    assert!(endpoint.open);
    assert!(endpoint.service_name.ends_with(".sts"));
    assert_eq!(endpoint.security_groups, vec![ResourceId::from("ecs-security-group")]);
  }
}
