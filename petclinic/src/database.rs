use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
  error::{Error, Result},
  graph::{References, ResourceId},
  network::{Vpc, DATABASE_PORT},
};

/// Aurora Serverless v1 only accepts these capacity steps
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum AuroraCapacityUnit {
  Acu1,
  Acu2,
  Acu4,
  Acu8,
  Acu16,
  Acu32,
  Acu64,
  Acu128,
  Acu256,
}

impl From<AuroraCapacityUnit> for u32 {
  fn from(acu: AuroraCapacityUnit) -> u32 {
    match acu {
      AuroraCapacityUnit::Acu1 => 1,
      AuroraCapacityUnit::Acu2 => 2,
      AuroraCapacityUnit::Acu4 => 4,
      AuroraCapacityUnit::Acu8 => 8,
      AuroraCapacityUnit::Acu16 => 16,
      AuroraCapacityUnit::Acu32 => 32,
      AuroraCapacityUnit::Acu64 => 64,
      AuroraCapacityUnit::Acu128 => 128,
      AuroraCapacityUnit::Acu256 => 256,
    }
  }
}

impl TryFrom<u32> for AuroraCapacityUnit {
  type Error = Error;

  fn try_from(value: u32) -> Result<Self> {
    match value {
      1 => Ok(AuroraCapacityUnit::Acu1),
      2 => Ok(AuroraCapacityUnit::Acu2),
      4 => Ok(AuroraCapacityUnit::Acu4),
      8 => Ok(AuroraCapacityUnit::Acu8),
      16 => Ok(AuroraCapacityUnit::Acu16),
      32 => Ok(AuroraCapacityUnit::Acu32),
      64 => Ok(AuroraCapacityUnit::Acu64),
      128 => Ok(AuroraCapacityUnit::Acu128),
      256 => Ok(AuroraCapacityUnit::Acu256),
      _ => Err(Error::InvalidCapacity(format!("{value} is not an Aurora capacity unit"))),
    }
  }
}

#[derive(Clone, Debug)]
pub struct DatabaseProps {
  pub engine: String,
  pub min_capacity: AuroraCapacityUnit,
  pub max_capacity: AuroraCapacityUnit,
  /// Minutes of inactivity before compute is paused; `None` keeps it running
  pub auto_pause_minutes: Option<u32>,
  pub username: String,
  pub secret_name: String,
  pub enable_data_api: bool,
}

impl Default for DatabaseProps {
  fn default() -> Self {
    Self {
      engine: "aurora-mysql".to_owned(),
      min_capacity: AuroraCapacityUnit::Acu8,
      max_capacity: AuroraCapacityUnit::Acu32,
      auto_pause_minutes: Some(5),
      username: "syscdk".to_owned(),
      secret_name: "petclinic-db-credentials".to_owned(),
      enable_data_api: true,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerlessScaling {
  pub min_capacity: AuroraCapacityUnit,
  pub max_capacity: AuroraCapacityUnit,
  pub auto_pause: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub seconds_until_auto_pause: Option<u32>,
}

/// Credentials generated at deploy time and stored in Secrets Manager
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSecret {
  pub secret_name: String,
  pub username: String,
  pub password_length: u32,
  pub exclude_characters: String,
}

impl GeneratedSecret {
  pub const PASSWORD_LENGTH: u32 = 30;
  pub const EXCLUDE_CHARACTERS: &'static str = " %+~`#$&*()|[]{}:;<>?!'/@\"\\";

  pub fn new(secret_name: &str, username: &str) -> Self {
    Self {
      secret_name: secret_name.to_owned(),
      username: username.to_owned(),
      password_length: Self::PASSWORD_LENGTH,
      exclude_characters: Self::EXCLUDE_CHARACTERS.to_owned(),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionPolicy {
  Delete,
  Retain,
  Snapshot,
}

/// Aurora serverless cluster in the private subnets behind the shared security group
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerlessCluster {
  pub engine: String,
  pub engine_mode: String,
  pub port: u16,
  pub vpc: ResourceId,
  pub subnets: Vec<String>,
  pub security_groups: Vec<ResourceId>,
  /// Data API access
  pub enable_http_endpoint: bool,
  pub scaling: ServerlessScaling,
  pub master_user_secret: GeneratedSecret,
  pub deletion_policy: DeletionPolicy,
}

impl ServerlessCluster {
  pub fn new(vpc_id: &ResourceId, vpc: &Vpc, security_group: &ResourceId, props: &DatabaseProps) -> Result<Self> {
    if props.min_capacity > props.max_capacity {
      return Err(Error::InvalidCapacity(format!(
        "database capacity {}..{} is not a valid range",
        u32::from(props.min_capacity),
        u32::from(props.max_capacity)
      )));
    }

    let seconds_until_auto_pause = match props.auto_pause_minutes {
      Some(minutes) => Some(minutes.checked_mul(60).ok_or_else(|| {
        Error::InvalidCapacity(format!("auto-pause after {minutes} minutes is out of range"))
      })?),
      None => None,
    };

    let cluster = Self {
      engine: props.engine.to_owned(),
      engine_mode: "serverless".to_owned(),
      port: DATABASE_PORT,
      vpc: vpc_id.to_owned(),
      subnets: vpc.private_subnet_names(),
      security_groups: vec![security_group.to_owned()],
      enable_http_endpoint: props.enable_data_api,
      scaling: ServerlessScaling {
        min_capacity: props.min_capacity,
        max_capacity: props.max_capacity,
        auto_pause: props.auto_pause_minutes.is_some(),
        seconds_until_auto_pause,
      },
      master_user_secret: GeneratedSecret::new(&props.secret_name, &props.username),
      deletion_policy: DeletionPolicy::Snapshot,
    };
    info!(
      "Serverless {} cluster, {}..{} ACU, secret {}",
      cluster.engine,
      u32::from(props.min_capacity),
      u32::from(props.max_capacity),
      cluster.secret_name()
    );
    debug!("Database: {cluster:#?}");

    Ok(cluster)
  }

  /// Name workloads resolve the credentials by
  pub fn secret_name(&self) -> &str {
    &self.master_user_secret.secret_name
  }
}

impl References for ServerlessCluster {
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

  fn database(props: &DatabaseProps) -> Result<ServerlessCluster> {
    let vpc = Vpc::new(&VpcProps::default())?;
    ServerlessCluster::new(&ResourceId::from("Vpc"), &vpc, &ResourceId::from("ecs-security-group"), props)
  }

  #[test]
  fn it_builds_serverless_cluster() {
    let db = database(&DatabaseProps::default()).unwrap();
    assert_eq!(db.engine, "aurora-mysql");
    assert_eq!(db.port, 3306);
    assert!(db.enable_http_endpoint);
    assert_eq!(db.secret_name(), "petclinic-db-credentials");
    assert_eq!(db.master_user_secret.username, "syscdk");
    assert_eq!(db.master_user_secret.password_length, 30);
    assert_eq!(db.scaling.seconds_until_auto_pause, Some(300));
    assert_eq!(db.subnets, vec!["PrivateSubnet1".to_owned(), "PrivateSubnet2".to_owned()]);

    let serialized = serde_json::to_value(&db).unwrap();
    assert_eq!(serialized["scaling"]["minCapacity"], 8);
    assert_eq!(serialized["scaling"]["maxCapacity"], 32);
    assert_eq!(serialized["deletionPolicy"], "Snapshot");
  }

  #[test]
  fn it_rejects_inverted_capacity() {
    let props = DatabaseProps {
      min_capacity: AuroraCapacityUnit::Acu64,
      max_capacity: AuroraCapacityUnit::Acu2,
      ..DatabaseProps::default()
    };
    assert!(matches!(database(&props), Err(Error::InvalidCapacity(_))));
  }

  #[test]
  fn it_rejects_unrepresentable_auto_pause() {
    let props = DatabaseProps {
      auto_pause_minutes: Some(u32::MAX),
      ..DatabaseProps::default()
    };
    assert!(matches!(database(&props), Err(Error::InvalidCapacity(_))));
  }

  #[rstest]
  #[case(1, AuroraCapacityUnit::Acu1)]
  #[case(16, AuroraCapacityUnit::Acu16)]
  #[case(256, AuroraCapacityUnit::Acu256)]
  #[should_panic]
  #[case(3, AuroraCapacityUnit::Acu4)]
  fn capacity_unit_test(#[case] input: u32, #[case] expected: AuroraCapacityUnit) {
    assert_eq!(AuroraCapacityUnit::try_from(input).unwrap(), expected);
  }
}
