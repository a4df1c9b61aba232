pub mod cli;
pub mod cluster;
pub mod commands;
pub mod config;
pub mod construct;
pub mod database;
pub mod error;
pub mod graph;
pub mod helm;
pub mod iam;
pub mod identity;
pub mod ingress;
pub mod k8s;
pub mod network;
pub mod utils;
pub mod workload;

pub use cli::{Cli, Commands};
pub use config::{ConstructInput, ImageConfig};
pub use construct::{compose, compose_with, PetClinicProps, NAMESPACE};
pub use error::{Error, Result};
pub use graph::{DependencyEdge, EdgeKind, Graph, Kind, Resource, ResourceId};
use rust_embed::RustEmbed;

/// Embeds the contents of the `files/` directory into the binary
///
/// This struct contains the static data used within `petclinic`
#[derive(RustEmbed)]
#[folder = "files/"]
pub struct Assets;
