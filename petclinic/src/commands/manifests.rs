use anyhow::Result;
use clap::Args;

use super::ImageArgs;
use crate::{construct, utils};

#[derive(Args, Debug)]
pub struct Manifests {
  #[command(flatten)]
  pub images: ImageArgs,
}

impl Manifests {
  pub fn render(&self) -> Result<()> {
    let graph = construct::compose(&self.images.input()?)?;
    print!("{}", utils::yaml_stream(graph.manifests()?)?);

    Ok(())
  }
}
