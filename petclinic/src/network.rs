use std::fmt;

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
  error::{Error, Result},
  graph::{References, ResourceId},
};

/// MySQL
pub const DATABASE_PORT: u16 = 3306;
/// Load balancer to pod traffic
pub const HTTP_PORT: u16 = 80;

/// Smallest subnet that can still be carved out of the VPC range
const MAX_SUBNET_PREFIX: u8 = 28;

#[derive(Clone, Debug)]
pub struct VpcProps {
  pub cidr: Ipv4Net,
  /// Number of availability zones to spread subnets across
  pub max_azs: usize,
  pub nat_gateways: usize,
}

impl Default for VpcProps {
  fn default() -> Self {
    Self {
      cidr: Ipv4Net::new_assert(std::net::Ipv4Addr::new(10, 0, 0, 0), 16),
      max_azs: 2,
      nat_gateways: 1,
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubnetType {
  Public,
  Private,
}

impl fmt::Display for SubnetType {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      SubnetType::Public => write!(f, "Public"),
      SubnetType::Private => write!(f, "Private"),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
  pub name: String,
  pub subnet_type: SubnetType,
  pub availability_zone: String,
  pub cidr: Ipv4Net,
  /// Public subnets hosting a NAT gateway for the private subnets
  #[serde(default)]
  pub nat_gateway: bool,
}

/// Virtual network with one public and one private subnet per availability zone
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vpc {
  pub cidr: Ipv4Net,
  pub enable_dns_hostnames: bool,
  pub enable_dns_support: bool,
  pub nat_gateways: usize,
  pub subnets: Vec<Subnet>,
}

impl Vpc {
  /// Carve the VPC range into equally sized public then private subnets, one of each per AZ
  pub fn new(props: &VpcProps) -> Result<Self> {
    if props.max_azs == 0 {
      return Err(Error::InvalidNetwork("at least one availability zone is required".to_owned()));
    }
    if props.nat_gateways > props.max_azs {
      return Err(Error::InvalidNetwork(format!(
        "{} NAT gateways requested but only {} public subnets exist",
        props.nat_gateways, props.max_azs
      )));
    }

    let too_many = || Error::InvalidNetwork(format!("{} availability zones is too many", props.max_azs));
    let count = props.max_azs.checked_mul(2).ok_or_else(too_many)?;
    let bits = count.checked_next_power_of_two().ok_or_else(too_many)?.trailing_zeros() as u8;
    let prefix = props.cidr.prefix_len() + bits;
    if prefix > MAX_SUBNET_PREFIX {
      return Err(Error::InvalidNetwork(format!(
        "{} is too small for {count} subnets",
        props.cidr
      )));
    }

    let mut cidrs = props
      .cidr
      .subnets(prefix)
      .map_err(|e| Error::InvalidNetwork(e.to_string()))?;

    let mut subnets = Vec::with_capacity(count);
    for subnet_type in [SubnetType::Public, SubnetType::Private] {
      for az in 0..props.max_azs {
        let cidr = cidrs
          .next()
          .ok_or_else(|| Error::InvalidNetwork(format!("{} ran out of subnets", props.cidr)))?;
        subnets.push(Subnet {
          name: format!("{subnet_type}Subnet{}", az + 1),
          subnet_type,
          availability_zone: format!("${{AWS::AvailabilityZones.{az}}}"),
          cidr,
          nat_gateway: subnet_type == SubnetType::Public && az < props.nat_gateways,
        });
      }
    }
    debug!("VPC {} subnets: {subnets:#?}", props.cidr);

    Ok(Vpc {
      cidr: props.cidr,
      enable_dns_hostnames: true,
      enable_dns_support: true,
      nat_gateways: props.nat_gateways,
      subnets,
    })
  }

  pub fn subnets_of(&self, subnet_type: SubnetType) -> Vec<&Subnet> {
    self.subnets.iter().filter(|s| s.subnet_type == subnet_type).collect()
  }

  /// Names of the private subnets, where workers, endpoints and the database live
  pub fn private_subnet_names(&self) -> Vec<String> {
    self
      .subnets_of(SubnetType::Private)
      .iter()
      .map(|s| s.name.to_owned())
      .collect()
  }
}

impl References for Vpc {
  fn references(&self) -> Vec<ResourceId> {
    vec![]
  }
}

/// Source of inbound traffic
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Peer(IpNet);

impl Peer {
  pub fn any_ipv4() -> Self {
    Self(IpNet::V4(Ipv4Net::default()))
  }

  pub fn any_ipv6() -> Self {
    Self(IpNet::V6(Ipv6Net::default()))
  }

  pub fn cidr(&self) -> IpNet {
    self.0
  }

  fn family(&self) -> &'static str {
    match self.0 {
      IpNet::V4(_) => "IPv4",
      IpNet::V6(_) => "IPv6",
    }
  }

  /// Covers every address of its family
  pub fn is_any(&self) -> bool {
    self.0.prefix_len() == 0
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
  Tcp,
  /// Every protocol (`-1`)
  All,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupRule {
  pub peer: Peer,
  pub protocol: Protocol,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub port: Option<u16>,
  pub description: String,
}

/// Security group shared by the control plane, worker nodes, STS endpoint and database
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroup {
  pub vpc: ResourceId,
  pub description: String,
  pub ingress: Vec<SecurityGroupRule>,
  pub egress: Vec<SecurityGroupRule>,
}

impl SecurityGroup {
  /// Security group that allows all outbound traffic and nothing inbound
  pub fn new(vpc: &ResourceId, description: &str) -> Self {
    Self {
      vpc: vpc.to_owned(),
      description: description.to_owned(),
      ingress: vec![],
      egress: vec![SecurityGroupRule {
        peer: Peer::any_ipv4(),
        protocol: Protocol::All,
        port: None,
        description: "Allow all outbound traffic by default".to_owned(),
      }],
    }
  }

  pub fn add_ingress_rule(&mut self, peer: Peer, port: u16, description: &str) {
    self.ingress.push(SecurityGroupRule {
      peer,
      protocol: Protocol::Tcp,
      port: Some(port),
      description: description.to_owned(),
    });
  }

  /// The PetClinic perimeter: TCP 3306 and TCP 80 from anywhere, over IPv4 and IPv6
  ///
  /// Exposing the database port publicly is carried over unchanged from the reference deployment
  pub fn petclinic(vpc: &ResourceId) -> Self {
    let mut sg = Self::new(vpc, "PetClinic cluster, node and database traffic");

    for port in [DATABASE_PORT, HTTP_PORT] {
      for peer in [Peer::any_ipv4(), Peer::any_ipv6()] {
        let description = format!("Port {port} for inbound traffic from {}", peer.family());
        sg.add_ingress_rule(peer, port, &description);
      }
    }

    if sg.exposes(DATABASE_PORT) {
      warn!("Security group allows inbound TCP {DATABASE_PORT} from 0.0.0.0/0 and ::/0; the database port is publicly reachable");
    }

    sg
  }

  /// Whether the port is reachable from the whole internet
  pub fn exposes(&self, port: u16) -> bool {
    self
      .ingress
      .iter()
      .any(|r| r.port == Some(port) && r.peer.is_any())
  }
}

impl References for SecurityGroup {
  fn references(&self) -> Vec<ResourceId> {
    vec![self.vpc.to_owned()]
  }
}

#[cfg(test)]
mod tests {
  use rstest::*;

  use super::*;

  #[test]
  fn it_builds_default_vpc() {
    let vpc = Vpc::new(&VpcProps::default()).unwrap();

    let cidrs: Vec<String> = vpc.subnets.iter().map(|s| s.cidr.to_string()).collect();
    assert_eq!(
      cidrs,
      vec!["10.0.0.0/18", "10.0.64.0/18", "10.0.128.0/18", "10.0.192.0/18"]
    );
    assert_eq!(
      vpc.private_subnet_names(),
      vec!["PrivateSubnet1".to_owned(), "PrivateSubnet2".to_owned()]
    );

    let nat: Vec<&str> = vpc
      .subnets
      .iter()
      .filter(|s| s.nat_gateway)
      .map(|s| s.name.as_str())
      .collect();
    assert_eq!(nat, vec!["PublicSubnet1"]);
  }

  #[rstest]
  #[case("10.0.0.0/16", 1, 17)]
  #[case("10.0.0.0/16", 2, 18)]
  #[case("10.0.0.0/16", 3, 19)]
  #[case("192.168.0.0/24", 2, 26)]
  #[should_panic]
  #[case("192.168.0.0/27", 2, 29)]
  #[should_panic]
  #[case("10.0.0.0/16", 0, 16)]
  fn subnet_prefix_test(#[case] cidr: &str, #[case] max_azs: usize, #[case] expected: u8) {
    let props = VpcProps {
      cidr: cidr.parse().unwrap(),
      max_azs,
      nat_gateways: 0,
    };
    let vpc = Vpc::new(&props).unwrap();
    assert_eq!(vpc.subnets.len(), max_azs * 2);
    assert!(vpc.subnets.iter().all(|s| s.cidr.prefix_len() == expected));
  }

  #[test]
  fn it_rejects_more_nat_gateways_than_public_subnets() {
    let props = VpcProps {
      nat_gateways: 3,
      ..VpcProps::default()
    };
    assert!(matches!(Vpc::new(&props), Err(Error::InvalidNetwork(_))));
  }

  #[test]
  fn it_rejects_unaddressable_availability_zones() {
    let props = VpcProps {
      max_azs: usize::MAX,
      ..VpcProps::default()
    };
    assert!(matches!(Vpc::new(&props), Err(Error::InvalidNetwork(_))));
  }

  #[test]
  fn it_opens_exactly_four_ingress_rules() {
    let sg = SecurityGroup::petclinic(&ResourceId::from("Vpc"));
    assert_eq!(sg.ingress.len(), 4);

    let rules: Vec<(String, Option<u16>)> = sg
      .ingress
      .iter()
      .map(|r| (r.peer.cidr().to_string(), r.port))
      .collect();
    assert_eq!(
      rules,
      vec![
        ("0.0.0.0/0".to_owned(), Some(3306)),
        ("::/0".to_owned(), Some(3306)),
        ("0.0.0.0/0".to_owned(), Some(80)),
        ("::/0".to_owned(), Some(80)),
      ]
    );
    assert!(sg.ingress.iter().all(|r| r.protocol == Protocol::Tcp));
    assert_eq!(sg.ingress[1].description, "Port 3306 for inbound traffic from IPv6");
  }

  #[test]
  fn it_allows_all_outbound() {
    let sg = SecurityGroup::petclinic(&ResourceId::from("Vpc"));
    assert_eq!(sg.egress.len(), 1);
    assert_eq!(sg.egress[0].protocol, Protocol::All);
    assert_eq!(sg.references(), vec![ResourceId::from("Vpc")]);
  }

  #[rstest]
  #[case(DATABASE_PORT, true)]
  #[case(HTTP_PORT, true)]
  #[case(443, false)]
  fn exposes_test(#[case] port: u16, #[case] expected: bool) {
    let sg = SecurityGroup::petclinic(&ResourceId::from("Vpc"));
    assert_eq!(sg.exposes(port), expected);
  }
}
