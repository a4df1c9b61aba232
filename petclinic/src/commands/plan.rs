use anyhow::Result;
use clap::Args;

use super::ImageArgs;
use crate::construct;

#[derive(Args, Debug)]
pub struct Plan {
  #[command(flatten)]
  pub images: ImageArgs,
}

impl Plan {
  pub fn plan(&self) -> Result<()> {
    let graph = construct::compose(&self.images.input()?)?;

    for node in graph.topological_order()? {
      let dependencies = graph.dependencies_of(&node.id);
      if dependencies.is_empty() {
        println!("{} {}", node.kind(), node.id);
      } else {
        let dependencies: Vec<&str> = dependencies.iter().map(|d| d.as_str()).collect();
        println!("{} {} <- {}", node.kind(), node.id, dependencies.join(", "));
      }
    }

    Ok(())
  }
}
