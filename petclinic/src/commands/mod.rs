pub mod manifests;
pub mod plan;
pub mod policy;
pub mod route;
pub mod synth;

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::config::{ConstructInput, ImageConfig};

/// Image references for the four PetClinic services
///
/// Flags and environment variables take precedence over `--config`
#[derive(Args, Debug, Default)]
pub struct ImageArgs {
  /// TOML file with `ui_image`, `customer_image`, `vets_image` and `visits_image`
  #[arg(short, long, env = "PETCLINIC_CONFIG")]
  pub config: Option<PathBuf>,

  /// Image of the UI (API gateway) service
  #[arg(long, env = "PETCLINIC_UI_IMAGE")]
  pub ui_image: Option<String>,

  /// Image of the customers service
  #[arg(long, env = "PETCLINIC_CUSTOMER_IMAGE")]
  pub customer_image: Option<String>,

  /// Image of the vets service
  #[arg(long, env = "PETCLINIC_VETS_IMAGE")]
  pub vets_image: Option<String>,

  /// Image of the visits service
  #[arg(long, env = "PETCLINIC_VISITS_IMAGE")]
  pub visits_image: Option<String>,
}

impl ImageArgs {
  pub fn input(&self) -> Result<ConstructInput> {
    let file = match &self.config {
      Some(path) => Some(ImageConfig::read(path)?),
      None => None,
    };
    let overrides = ImageConfig {
      ui_image: self.ui_image.to_owned(),
      customer_image: self.customer_image.to_owned(),
      vets_image: self.vets_image.to_owned(),
      visits_image: self.visits_image.to_owned(),
    };

    Ok(ConstructInput::from_layers(file, overrides)?)
  }
}
