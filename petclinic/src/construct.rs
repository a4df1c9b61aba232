use tracing::info;

use crate::{
  cluster::{Cluster, ClusterProps, InterfaceVpcEndpoint, Nodegroup, NodegroupProps},
  config::ConstructInput,
  database::{DatabaseProps, ServerlessCluster},
  error::Result,
  graph::Graph,
  helm::HelmChart,
  identity::{self, CONTROLLER_NAME},
  ingress::{self, RoutingTable},
  k8s::{KubernetesResource, Manifest, Namespace},
  network::{SecurityGroup, Vpc, VpcProps},
  workload,
};

/// Namespace every Kubernetes object of the application lives in
pub const NAMESPACE: &str = "petclinic-namespace";

/// Everything about the topology that is not an image
#[derive(Clone, Debug)]
pub struct PetClinicProps {
  pub vpc: VpcProps,
  pub cluster: ClusterProps,
  pub nodegroup: NodegroupProps,
  pub database: DatabaseProps,
  pub namespace: String,
}

impl Default for PetClinicProps {
  fn default() -> Self {
    Self {
      vpc: VpcProps::default(),
      cluster: ClusterProps::default(),
      nodegroup: NodegroupProps::default(),
      database: DatabaseProps::default(),
      namespace: NAMESPACE.to_owned(),
    }
  }
}

/// Compose the PetClinic topology with the default props
pub fn compose(input: &ConstructInput) -> Result<Graph> {
  compose_with(input, &PetClinicProps::default())
}

/// Build the whole resource graph for `input`
///
/// The input is validated up front and the graph is only returned once every resource has been
/// added, so callers never observe a partial topology
pub fn compose_with(input: &ConstructInput, props: &PetClinicProps) -> Result<Graph> {
  input.validate()?;
  let mut graph = Graph::new();

  // Network and perimeter
  let vpc = Vpc::new(&props.vpc)?;
  let vpc_id = graph.add("Vpc", vpc.clone())?;
  let sg_id = graph.add("ecs-security-group", SecurityGroup::petclinic(&vpc_id))?;

  // Control plane, workers and the STS endpoint they exchange tokens through
  let role_id = graph.add("ekscluster-role", Cluster::service_role())?;
  let cluster = Cluster::new(&props.cluster, &role_id, &vpc_id, &vpc, &sg_id);
  let cluster_id = graph.add("ekscluster", cluster.clone())?;

  let node_role_id = graph.add("nodeRole", Nodegroup::node_role())?;
  let nodegroup = Nodegroup::new(&props.nodegroup, &cluster_id, &cluster, &node_role_id, &vpc)?;
  graph.add("eksNodeGroup", nodegroup)?;
  graph.add("stsendpoint", InterfaceVpcEndpoint::sts(&vpc_id, &vpc, &sg_id))?;

  // Load balancer controller
  let binding_id = identity::bind_controller(&mut graph, "awsloadbalancersa", &cluster_id, &props.namespace)?;
  let chart = HelmChart::load_balancer_controller(
    "albIngressControllerChart",
    &cluster_id,
    &cluster.name,
    &props.namespace,
    &binding_id,
    CONTROLLER_NAME,
  );
  graph.add("albIngressControllerChart", chart)?;

  let db_id = graph.add("Db", ServerlessCluster::new(&vpc_id, &vpc, &sg_id, &props.database)?)?;

  // Application
  let namespace = Manifest::Namespace(Namespace::new(&props.namespace));
  let namespace_id = graph.add("namespace", KubernetesResource::new(&cluster_id, namespace))?;

  for spec in input.services() {
    workload::compose(&mut graph, &cluster_id, &spec, &db_id, &namespace_id)?;
  }

  let table = RoutingTable::petclinic()?;
  ingress::compose(&mut graph, &cluster_id, &cluster.version, &namespace_id, &table)?;

  graph.add_output("ClusterName", cluster.name.to_owned(), Some("The name of the EKS cluster"));
  graph.add_output(
    "ConfigCommand",
    cluster.config_command(),
    Some("The command to run to update kubeconfig for the cluster"),
  );
  info!("Composed {} resources and {} edges", graph.len(), graph.edges().len());

  Ok(graph)
}
