use anyhow::Result;
use clap::Args;

use crate::identity;

#[derive(Args, Debug)]
pub struct Policy {}

impl Policy {
  pub fn print(&self) -> Result<()> {
    let policy = identity::controller_policy()?;
    println!("{}", serde_json::to_string_pretty(&policy)?);

    Ok(())
  }
}
