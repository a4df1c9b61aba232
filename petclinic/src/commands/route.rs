use anyhow::Result;
use clap::Args;
use tracing::debug;

use crate::ingress::RoutingTable;

#[derive(Args, Debug)]
pub struct Route {
  /// Request path, e.g. `/owners/1`
  pub path: String,
}

impl Route {
  pub fn resolve(&self) -> Result<()> {
    let table = RoutingTable::petclinic()?;
    let route = table.resolve(&self.path);
    debug!("{} matched {}", self.path, route.path);

    println!("{}:{}", route.service_name, route.service_port);

    Ok(())
  }
}
