use std::{fs, path::Path};

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
  error::{Error, Result},
  workload::ServiceSpec,
};

/// Container image reference: `[registry[:port]/]path[/path...][:tag][@sha256:digest]`
const IMAGE_REFERENCE: &str = r"^(?:[a-zA-Z0-9][a-zA-Z0-9.-]*(?::[0-9]+)?/)?[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*(?:/[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*)*(?::\w[\w.-]{0,127})?(?:@sha256:[a-f0-9]{64})?$";

/// The four images PetClinic is deployed from
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructInput {
  pub ui_image: String,
  pub customer_image: String,
  pub vets_image: String,
  pub visits_image: String,
}

impl ConstructInput {
  pub fn new(ui_image: &str, customer_image: &str, vets_image: &str, visits_image: &str) -> Self {
    Self {
      ui_image: ui_image.to_owned(),
      customer_image: customer_image.to_owned(),
      vets_image: vets_image.to_owned(),
      visits_image: visits_image.to_owned(),
    }
  }

  /// Combine a configuration file with overrides from the command line or environment
  ///
  /// Overrides win; every image must be supplied by one of the two
  pub fn from_layers(file: Option<ImageConfig>, overrides: ImageConfig) -> Result<Self> {
    let file = file.unwrap_or_default();
    let pick = |service: &str, value: Option<String>, fallback: Option<String>| -> Result<String> {
      value.or(fallback).ok_or_else(|| Error::MissingImage {
        service: service.to_owned(),
      })
    };

    let input = Self {
      ui_image: pick("ui", overrides.ui_image, file.ui_image)?,
      customer_image: pick("customer", overrides.customer_image, file.customer_image)?,
      vets_image: pick("vets", overrides.vets_image, file.vets_image)?,
      visits_image: pick("visits", overrides.visits_image, file.visits_image)?,
    };
    input.validate()?;

    Ok(input)
  }

  /// Reject empty or malformed image references
  pub fn validate(&self) -> Result<()> {
    let re = Regex::new(IMAGE_REFERENCE)?;
    for spec in self.services() {
      if spec.image.trim().is_empty() {
        return Err(Error::MissingImage { service: spec.suffix });
      }
      if spec.image.len() > 255 || !re.is_match(&spec.image) {
        return Err(Error::InvalidImage {
          service: spec.suffix,
          image: spec.image,
        });
      }
    }

    Ok(())
  }

  /// Logical services in deployment order: ui, customer, vets, visits
  pub fn services(&self) -> Vec<ServiceSpec> {
    vec![
      ServiceSpec::new("ui", &self.ui_image),
      ServiceSpec::new("customer", &self.customer_image),
      ServiceSpec::new("vets", &self.vets_image),
      ServiceSpec::new("visits", &self.visits_image),
    ]
  }
}

/// Images as read from a TOML file, any of which may be left for the command line to supply
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageConfig {
  pub ui_image: Option<String>,
  pub customer_image: Option<String>,
  pub vets_image: Option<String>,
  pub visits_image: Option<String>,
}

impl ImageConfig {
  pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: ImageConfig = toml::from_str(&contents)?;
    debug!("Read {}: {config:?}", path.as_ref().display());

    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use rstest::*;

  use super::*;

  fn input(ui: &str) -> ConstructInput {
    ConstructInput::new(ui, "img-cust", "img-vets", "img-visits")
  }

  #[rstest]
  #[case("img-ui")]
  #[case("nginx:1.25")]
  #[case("library/nginx")]
  #[case("public.ecr.aws/petclinic/ui:latest")]
  #[case("123456789012.dkr.ecr.us-east-1.amazonaws.com/petclinic-ui:v2.0.1")]
  #[case("localhost:5000/petclinic_ui")]
  #[case("ghcr.io/acme/ui@sha256:0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef")]
  fn valid_image_test(#[case] image: &str) {
    input(image).validate().unwrap();
  }

  #[rstest]
  #[case("Img-UI")]
  #[case("img ui")]
  #[case("img-ui:")]
  #[case("img-ui@sha256:abc")]
  #[case("/img-ui")]
  #[case("img--")]
  fn invalid_image_test(#[case] image: &str) {
    let err = input(image).validate().unwrap_err();
    assert!(matches!(err, Error::InvalidImage { service, .. } if service == "ui"));
  }

  #[test]
  fn it_rejects_empty_image() {
    let err = input("  ").validate().unwrap_err();
    assert!(matches!(err, Error::MissingImage { service } if service == "ui"));
  }

  #[test]
  fn it_lists_services_in_order() {
    let suffixes: Vec<String> = input("img-ui").services().into_iter().map(|s| s.suffix).collect();
    assert_eq!(suffixes, vec!["ui", "customer", "vets", "visits"]);
  }

  #[test]
  fn it_layers_overrides_on_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
      file,
      r#"
ui_image = "file-ui"
customer_image = "file-cust"
vets_image = "file-vets"
"#
    )
    .unwrap();

    let config = ImageConfig::read(file.path()).unwrap();
    let overrides = ImageConfig {
      ui_image: Some("flag-ui".to_owned()),
      visits_image: Some("flag-visits".to_owned()),
      ..ImageConfig::default()
    };

    let input = ConstructInput::from_layers(Some(config), overrides).unwrap();
    assert_eq!(input, ConstructInput::new("flag-ui", "file-cust", "file-vets", "flag-visits"));
  }

  #[test]
  fn it_reports_missing_image() {
    let overrides = ImageConfig {
      ui_image: Some("img-ui".to_owned()),
      ..ImageConfig::default()
    };
    let err = ConstructInput::from_layers(None, overrides).unwrap_err();
    assert!(matches!(err, Error::MissingImage { service } if service == "customer"));
  }

  #[test]
  fn it_rejects_unknown_keys() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"ui-image = "img-ui""#).unwrap();
    assert!(matches!(ImageConfig::read(file.path()), Err(Error::Config(_))));
  }
}
