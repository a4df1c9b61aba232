use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ImageArgs;
use crate::{construct, utils};

#[derive(Copy, Clone, Debug, Default, ValueEnum, Serialize, Deserialize)]
pub enum Format {
  #[default]
  Yaml,
  Json,
}

#[derive(Args, Debug)]
pub struct Synth {
  #[command(flatten)]
  pub images: ImageArgs,

  /// Output format of the resource graph
  #[arg(short, long, value_enum, default_value_t)]
  pub format: Format,

  /// Also write each Kubernetes object to its own file in this directory, in apply order
  #[arg(short, long)]
  pub output_dir: Option<PathBuf>,
}

impl Synth {
  pub fn synth(&self) -> Result<()> {
    let graph = construct::compose(&self.images.input()?)?;

    let rendered = match self.format {
      Format::Yaml => serde_yaml::to_string(&graph)?,
      Format::Json => format!("{}\n", serde_json::to_string_pretty(&graph)?),
    };
    print!("{rendered}");

    if let Some(dir) = &self.output_dir {
      let manifests = graph.manifests()?;
      for (position, manifest) in manifests.iter().enumerate() {
        let path = dir.join(utils::manifest_file_name(position, manifest));
        utils::write_file(serde_yaml::to_string(manifest)?.as_bytes(), &path, None)?;
      }
      info!("Wrote {} manifests to {}", manifests.len(), dir.display());
    }

    Ok(())
  }
}
