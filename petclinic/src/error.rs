use thiserror::Error;

use crate::graph::ResourceId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures detected while composing the resource graph
///
/// Composition is all-or-nothing: any of these aborts before the graph is handed off
#[derive(Debug, Error)]
pub enum Error {
  /// An image reference was empty
  #[error("missing image reference for the {service} service")]
  MissingImage { service: String },

  /// An image reference does not follow the `[registry/]name[:tag][@digest]` grammar
  #[error("invalid image reference for the {service} service: {image:?}")]
  InvalidImage { service: String, image: String },

  #[error("resource {0} is already defined")]
  DuplicateResource(ResourceId),

  /// An edge points at a resource that was never added to the graph
  #[error("resource {dependent} depends on unknown resource {dependency}")]
  UnknownResource {
    dependent: ResourceId,
    dependency: ResourceId,
  },

  #[error("dependency cycle detected involving: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
  DependencyCycle(Vec<ResourceId>),

  /// The cluster was built without an OpenID Connect issuer so service accounts cannot assume IAM roles
  #[error("identity federation is unavailable on cluster {cluster}")]
  IdentityFederationUnavailable { cluster: String },

  #[error("invalid policy document {name}: {reason}")]
  InvalidPolicy { name: String, reason: String },

  #[error("invalid routing table: {0}")]
  InvalidRoutingTable(String),

  #[error("invalid Kubernetes version {0:?}")]
  InvalidKubernetesVersion(String),

  #[error("invalid network layout: {0}")]
  InvalidNetwork(String),

  /// Scaling bounds that are inverted or otherwise unusable
  #[error("invalid capacity: {0}")]
  InvalidCapacity(String),

  #[error("unable to read configuration: {0}")]
  Io(#[from] std::io::Error),

  #[error("invalid configuration file: {0}")]
  Config(#[from] toml::de::Error),

  #[error(transparent)]
  Regex(#[from] regex_lite::Error),

  #[error(transparent)]
  Json(#[from] serde_json::Error),
}
