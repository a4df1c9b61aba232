use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
  error::{Error, Result},
  graph::{References, ResourceId},
  Assets,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
  Allow,
  Deny,
}

/// Condition operator (`StringEquals`, `Null`, ...) to a map of condition key and expected value
pub type Conditions = BTreeMap<String, BTreeMap<String, String>>;

/// Who a trust policy statement applies to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Principal {
  /// An AWS service such as `ec2.amazonaws.com`
  Service(String),
  /// An identity provider, by ARN
  Federated(String),
}

/// IAM policy statement
///
/// https://docs.aws.amazon.com/IAM/latest/UserGuide/reference_policies_elements.html
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
  pub effect: Effect,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub principal: Option<Principal>,

  pub action: Vec<String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub resource: Vec<String>,

  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub condition: Conditions,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
  pub version: String,
  pub statement: Vec<PolicyStatement>,
}

impl PolicyDocument {
  pub const VERSION: &'static str = "2012-10-17";

  pub fn new(statement: Vec<PolicyStatement>) -> Self {
    Self {
      version: Self::VERSION.to_owned(),
      statement,
    }
  }

  /// Load a policy document embedded under `files/`
  pub fn load(name: &str) -> Result<Self> {
    let file = Assets::get(name).ok_or_else(|| Error::InvalidPolicy {
      name: name.to_owned(),
      reason: "not found".to_owned(),
    })?;
    let document: PolicyDocument = serde_json::from_slice(file.data.as_ref())?;
    debug!("Loaded policy {name} with {} statements", document.statement.len());

    if document.version != Self::VERSION {
      return Err(Error::InvalidPolicy {
        name: name.to_owned(),
        reason: format!("unsupported version {}", document.version),
      });
    }

    Ok(document)
  }

  /// True when every statement grants rather than denies
  pub fn is_additive(&self) -> bool {
    self.statement.iter().all(|s| s.effect == Effect::Allow)
  }

  /// Union of the actions granted by all statements
  pub fn actions(&self) -> BTreeSet<&str> {
    self
      .statement
      .iter()
      .flat_map(|s| s.action.iter().map(String::as_str))
      .collect()
  }
}

/// AWS managed policy, referenced by ARN
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManagedPolicy(String);

impl ManagedPolicy {
  pub fn aws_managed(name: &str) -> Self {
    Self(format!("arn:${{AWS::Partition}}:iam::aws:policy/{name}"))
  }

  pub fn arn(&self) -> &str {
    &self.0
  }

  pub fn name(&self) -> &str {
    self.0.rsplit('/').next().unwrap_or_default()
  }
}

/// IAM role with its trust policy and any managed policies attached to it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub role_name: Option<String>,

  pub assume_role_policy_document: PolicyDocument,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub managed_policy_arns: Vec<ManagedPolicy>,

  /// Identity providers the trust policy federates with
  #[serde(skip)]
  trusted: Vec<ResourceId>,
}

impl Role {
  /// Role assumable by an AWS service
  pub fn for_service(role_name: Option<&str>, service: &str) -> Self {
    Self {
      role_name: role_name.map(str::to_owned),
      assume_role_policy_document: PolicyDocument::new(vec![PolicyStatement {
        effect: Effect::Allow,
        principal: Some(Principal::Service(service.to_owned())),
        action: vec!["sts:AssumeRole".to_owned()],
        resource: vec![],
        condition: Conditions::new(),
      }]),
      managed_policy_arns: vec![],
      trusted: vec![],
    }
  }

  /// Role assumable through web identity federation with the given provider
  pub fn for_web_identity(provider: &ResourceId, condition: Conditions) -> Self {
    Self {
      role_name: None,
      assume_role_policy_document: PolicyDocument::new(vec![PolicyStatement {
        effect: Effect::Allow,
        principal: Some(Principal::Federated(provider.attribute("Arn"))),
        action: vec!["sts:AssumeRoleWithWebIdentity".to_owned()],
        resource: vec![],
        condition,
      }]),
      managed_policy_arns: vec![],
      trusted: vec![provider.to_owned()],
    }
  }

  pub fn add_managed_policy(&mut self, name: &str) {
    self.managed_policy_arns.push(ManagedPolicy::aws_managed(name));
  }
}

impl References for Role {
  fn references(&self) -> Vec<ResourceId> {
    self.trusted.clone()
  }
}
