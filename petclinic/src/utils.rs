use std::{
  fs::{self, OpenOptions},
  io::Write,
  os::unix::fs::OpenOptionsExt,
  path::Path,
};

use anyhow::Result;

use crate::k8s::Manifest;

/// Write a file to disk, replacing any previous contents and setting the file mode on creation
pub fn write_file<P: AsRef<Path>>(contents: &[u8], path: P, mode: Option<u32>) -> Result<()> {
  if let Some(parent) = path.as_ref().parent() {
    fs::create_dir_all(parent)?;
  }

  let mut file = OpenOptions::new()
    .write(true)
    .create(true)
    .truncate(true)
    .mode(mode.unwrap_or(0o644))
    .open(&path)?;
  file.write_all(contents)?;

  Ok(())
}

/// Render manifests as a multi-document YAML stream
pub fn yaml_stream<'a, I>(manifests: I) -> Result<String>
where
  I: IntoIterator<Item = &'a Manifest>,
{
  let mut stream = String::new();
  for manifest in manifests {
    stream.push_str("---\n");
    stream.push_str(&serde_yaml::to_string(manifest)?);
  }

  Ok(stream)
}

/// `<position>-<kind>-<name>.yaml`, so a directory listing sorts in apply order
pub fn manifest_file_name(position: usize, manifest: &Manifest) -> String {
  let kind = manifest.kind().to_string();
  let kind = kind.rsplit("::").next().unwrap_or_default().to_lowercase();

  format!("{position:02}-{kind}-{}.yaml", manifest.metadata().name)
}
